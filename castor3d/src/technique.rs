//! Render technique contract and the registry techniques are picked from.

use castor3d_types::SampleCount;
use glam::{UVec2, Vec4};

use crate::{
    backend::RenderSystem,
    graph::RenderGraph,
    scene::Scene,
    util::typedefs::{FastIndexMap, SsoString},
    EngineError, ShaderError,
};

/// Per frame parameters handed to a technique.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct RenderInfo {
    pub resolution: UVec2,
    pub samples: SampleCount,
    pub exposure: f32,
    pub background_colour: Vec4,
    /// Index of the frame being rendered, starting at 0.
    pub frame: u64,
}

impl Default for RenderInfo {
    fn default() -> Self {
        Self {
            resolution: UVec2::new(1280, 720),
            samples: SampleCount::One,
            exposure: 1.0,
            background_colour: Vec4::new(0.0, 0.0, 0.0, 1.0),
            frame: 0,
        }
    }
}

/// An ordered sequence of passes producing one frame.
///
/// Every frame the engine calls [`Self::begin_frame`], then [`Self::render`]
/// and executes the graph it filled, then [`Self::end_frame`]. Nodes added by
/// `render` may borrow the technique, so all the mutable per frame
/// preparation belongs in `begin_frame`.
pub trait RenderTechnique: Send {
    fn name(&self) -> &str;

    /// Creates the pipelines. Called once the render system exists, and again
    /// after a [`Self::cleanup`].
    fn initialise(&mut self, render_system: &mut dyn RenderSystem, info: &RenderInfo) -> Result<(), ShaderError>;

    fn cleanup(&mut self, render_system: &mut dyn RenderSystem);

    /// Runs before the graph is built: sorting, culling, uniform data.
    fn begin_frame(&mut self, _scene: &mut Scene, _info: &RenderInfo) {}

    /// Adds the frame's passes to `graph`: shadows and opaque geometry, then
    /// shadows and transparent geometry, then whatever resolves into the
    /// back buffer.
    fn render<'node>(&'node mut self, info: &RenderInfo, scene: &Scene, graph: &mut RenderGraph<'node>);

    /// Runs after the graph executed.
    fn end_frame(&mut self, _render_system: &mut dyn RenderSystem) {}
}

/// Builds a technique for a render system. A technique may refuse a render
/// system it can't run on.
pub type TechniqueFactory = fn(&dyn RenderSystem, &RenderInfo) -> Option<Box<dyn RenderTechnique>>;

/// Techniques by name.
#[derive(Clone, Default)]
pub struct TechniqueRegistry {
    factories: FastIndexMap<SsoString, TechniqueFactory>,
}

impl TechniqueRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a factory, replacing any previous one with the same name.
    pub fn register(&mut self, name: &str, factory: TechniqueFactory) {
        if self.factories.insert(SsoString::from(name), factory).is_some() {
            log::warn!("Render technique {:?} registered twice, keeping the latest", name);
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(SsoString::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn create(
        &self,
        name: &str,
        render_system: &dyn RenderSystem,
        info: &RenderInfo,
    ) -> Result<Box<dyn RenderTechnique>, EngineError> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| EngineError::UnknownTechnique { name: name.into() })?;
        let technique = factory(render_system, info).ok_or_else(|| EngineError::UnsupportedTechnique {
            name: name.into(),
            render_system: render_system.name().into(),
        })?;
        log::info!("Using render technique {:?} on {}", name, render_system.name());
        Ok(technique)
    }
}

impl std::fmt::Debug for TechniqueRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.factories.keys()).finish()
    }
}
