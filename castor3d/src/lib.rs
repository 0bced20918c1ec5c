//! Frame scheduling and rendering core of castor3d.
//!
//! An [`Engine`] owns a [`RenderSystem`](backend::RenderSystem) picked by
//! name from a [`BackendRegistry`](backend::BackendRegistry), a
//! [`RenderTechnique`](technique::RenderTechnique) picked from a
//! [`TechniqueRegistry`](technique::TechniqueRegistry), the scenes and the
//! [`FrameListener`]s. Work posted to a listener from any thread runs at the
//! next pre render, queue render or post render point of
//! [`Engine::render_frame`].

pub mod backend;
pub mod binary;
mod config;
mod engine;
mod error;
pub mod event;
pub mod graph;
mod listener;
pub mod parse;
pub mod pipeline;
pub mod scene;
pub mod shader;
pub mod technique;
pub mod util;
pub mod variable;

pub use castor3d_types as types;

pub use config::{EngineConfig, RenderSystemOptions, VSyncMode};
pub use engine::{Engine, FrameStatistics, DEFAULT_LISTENER_NAME, DEFAULT_SCENE_NAME};
pub use error::*;
pub use event::{CpuFrameEvent, CpuResource, EventHandle, GpuFrameEvent, GpuResource};
pub use listener::{FireReport, FrameListener};
