//! Deferred rendering: opaque nodes write a geometry buffer which one
//! fullscreen pass lights. Transparent nodes are still drawn forward.

use castor3d::{
    backend::RenderSystem,
    graph::RenderGraph,
    scene::Scene,
    technique::{RenderInfo, RenderTechnique},
    types::SampleCount,
    ShaderError,
};
use glam::Vec4;

use crate::{
    base::{gbuffer_target, hdr_target, FrameInputs, TransparentStage},
    lighting::LightingPass,
    pass::{PassStage, RenderTechniquePass},
    shaders::ShaderPreProcessor,
    tonemapping::TonemappingPass,
};

#[derive(Debug)]
pub struct DeferredTechnique {
    geometry: RenderTechniquePass,
    lighting: LightingPass,
    transparent: TransparentStage,
    tonemapping: TonemappingPass,
    frame: FrameInputs,
}

impl DeferredTechnique {
    pub const NAME: &'static str = "deferred";

    pub fn new(preprocessor: &ShaderPreProcessor) -> Self {
        Self {
            geometry: RenderTechniquePass::new(preprocessor, "geometry buffer", PassStage::GeometryBuffer),
            lighting: LightingPass::new(preprocessor),
            transparent: TransparentStage::new(preprocessor, SampleCount::One),
            tonemapping: TonemappingPass::new(preprocessor),
            frame: FrameInputs::default(),
        }
    }

    /// Refuses render systems without programs.
    pub fn factory(render_system: &dyn RenderSystem, _info: &RenderInfo) -> Option<Box<dyn RenderTechnique>> {
        if !render_system.use_shaders() {
            log::warn!("{} can't run the deferred technique without programs", render_system.name());
            return None;
        }
        Some(Box::new(Self::new(&ShaderPreProcessor::new())))
    }

    pub fn geometry(&self) -> &RenderTechniquePass {
        &self.geometry
    }

    pub fn transparent(&self) -> &RenderTechniquePass {
        self.transparent.pass()
    }
}

impl RenderTechnique for DeferredTechnique {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn initialise(&mut self, render_system: &mut dyn RenderSystem, _info: &RenderInfo) -> Result<(), ShaderError> {
        self.geometry.initialise(render_system, SampleCount::One)?;
        self.lighting.initialise(render_system)?;
        self.transparent.initialise(render_system)?;
        self.tonemapping.initialise(render_system)
    }

    fn cleanup(&mut self, render_system: &mut dyn RenderSystem) {
        self.geometry.cleanup(render_system);
        self.lighting.cleanup(render_system);
        self.transparent.cleanup(render_system);
        self.tonemapping.cleanup(render_system);
    }

    fn begin_frame(&mut self, scene: &mut Scene, info: &RenderInfo) {
        self.frame = FrameInputs::gather(scene);
        self.geometry.prepare(scene, info, &self.frame.nodes, &self.frame.scene);
        self.lighting.prepare(&self.frame.scene);
        self.transparent.prepare(scene, info, &self.frame);
    }

    fn render<'node>(&'node mut self, info: &RenderInfo, _scene: &Scene, graph: &mut RenderGraph<'node>) {
        profiling::scope!("DeferredTechnique::render");

        let gbuffer = gbuffer_target(graph, info);
        let hdr = hdr_target(graph, info, SampleCount::One);
        self.geometry.add_to_graph(graph, gbuffer, None, Some(Vec4::ZERO));
        self.lighting.add_to_graph(graph, gbuffer, hdr, info.background_colour);
        self.transparent.add_to_graph(graph, info, hdr, gbuffer);
        self.tonemapping.add_to_graph(graph, hdr, info.exposure);
    }
}
