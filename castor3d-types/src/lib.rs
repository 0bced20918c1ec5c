//! Type declarations for the castor3d rendering engine.
//!
//! This is reexported in the castor3d crate proper and includes all the
//! "surface" api arguments: handles, variable types, pipeline state enums and
//! mesh data.

/// Reexport of the glam version castor3d is using.
pub use glam;

mod handle;
mod mesh;
mod state;
mod variable;

pub use handle::*;
pub use mesh::*;
pub use state::*;
pub use variable::*;

/// Lifecycle phase a frame event is queued for.
///
/// The render loop fires each phase once per frame, CPU bucket first.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum EventType {
    /// Before anything is rendered: scene mutation, resource creation.
    PreRender,
    /// After the scene is updated, before the technique renders.
    QueueRender,
    /// After the frame has been submitted.
    PostRender,
}

impl EventType {
    pub const COUNT: usize = 3;
    pub const ARRAY: [Self; Self::COUNT] = [Self::PreRender, Self::QueueRender, Self::PostRender];

    pub const fn index(self) -> usize {
        self as usize
    }
}

/// Status of a shader program as it moves through compilation and linking.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ProgramStatus {
    Created,
    ObjectsCreated,
    Compiled,
    CompileError,
    Linked,
    LinkError,
}

impl ProgramStatus {
    /// Terminal failure states. Only a fresh initialise leaves them.
    pub const fn is_error(self) -> bool {
        matches!(self, Self::CompileError | Self::LinkError)
    }
}

/// Kind of object attached to a scene node.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum MovableKind {
    Geometry,
    Light,
    Camera,
}

/// Kind of light source.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum LightKind {
    Directional,
    Point,
    Spot,
}
