//! Forward rendering: lit opaque nodes, weighted blended transparency, tone
//! mapping.

use castor3d::{
    backend::RenderSystem,
    graph::{RenderGraph, RenderTargetHandle},
    scene::Scene,
    technique::{RenderInfo, RenderTechnique},
    types::SampleCount,
    ShaderError,
};

use crate::{
    base::{hdr_target, FrameInputs, TransparentStage},
    pass::{PassStage, RenderTechniquePass},
    shaders::ShaderPreProcessor,
    tonemapping::TonemappingPass,
};

/// Opaque then transparent stages into one hdr target.
#[derive(Debug)]
pub(crate) struct ForwardPasses {
    samples: SampleCount,
    opaque: RenderTechniquePass,
    transparent: TransparentStage,
}

impl ForwardPasses {
    pub(crate) fn new(preprocessor: &ShaderPreProcessor, samples: SampleCount) -> Self {
        Self {
            samples,
            opaque: RenderTechniquePass::new(preprocessor, "opaque", PassStage::Opaque),
            transparent: TransparentStage::new(preprocessor, samples),
        }
    }

    pub(crate) fn opaque(&self) -> &RenderTechniquePass {
        &self.opaque
    }

    pub(crate) fn transparent(&self) -> &RenderTechniquePass {
        self.transparent.pass()
    }

    pub(crate) fn initialise(&mut self, render_system: &mut dyn RenderSystem) -> Result<(), ShaderError> {
        self.opaque.initialise(render_system, self.samples)?;
        self.transparent.initialise(render_system)
    }

    pub(crate) fn cleanup(&mut self, render_system: &mut dyn RenderSystem) {
        self.opaque.cleanup(render_system);
        self.transparent.cleanup(render_system);
    }

    pub(crate) fn prepare(&mut self, scene: &mut Scene, info: &RenderInfo, frame: &FrameInputs) {
        self.opaque.prepare(scene, info, &frame.nodes, &frame.scene);
        self.transparent.prepare(scene, info, frame);
    }

    /// Returns the hdr target holding the result.
    pub(crate) fn add_to_graph<'node>(
        &'node mut self,
        graph: &mut RenderGraph<'node>,
        info: &RenderInfo,
    ) -> RenderTargetHandle {
        let hdr = hdr_target(graph, info, self.samples);
        self.opaque.add_to_graph(graph, hdr, None, Some(info.background_colour));
        self.transparent.add_to_graph(graph, info, hdr, hdr);
        hdr
    }
}

#[derive(Debug)]
pub struct ForwardTechnique {
    passes: ForwardPasses,
    tonemapping: TonemappingPass,
    frame: FrameInputs,
}

impl ForwardTechnique {
    pub const NAME: &'static str = "forward";

    pub fn new(preprocessor: &ShaderPreProcessor) -> Self {
        Self {
            passes: ForwardPasses::new(preprocessor, SampleCount::One),
            tonemapping: TonemappingPass::new(preprocessor),
            frame: FrameInputs::default(),
        }
    }

    pub fn factory(_render_system: &dyn RenderSystem, info: &RenderInfo) -> Option<Box<dyn RenderTechnique>> {
        if info.samples.needs_resolve() {
            log::info!("The forward technique renders single sampled, use \"msaa\" for {:?}", info.samples);
        }
        Some(Box::new(Self::new(&ShaderPreProcessor::new())))
    }

    pub fn opaque(&self) -> &RenderTechniquePass {
        self.passes.opaque()
    }

    pub fn transparent(&self) -> &RenderTechniquePass {
        self.passes.transparent()
    }
}

impl RenderTechnique for ForwardTechnique {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn initialise(&mut self, render_system: &mut dyn RenderSystem, _info: &RenderInfo) -> Result<(), ShaderError> {
        self.passes.initialise(render_system)?;
        self.tonemapping.initialise(render_system)
    }

    fn cleanup(&mut self, render_system: &mut dyn RenderSystem) {
        self.passes.cleanup(render_system);
        self.tonemapping.cleanup(render_system);
    }

    fn begin_frame(&mut self, scene: &mut Scene, info: &RenderInfo) {
        self.frame = FrameInputs::gather(scene);
        self.passes.prepare(scene, info, &self.frame);
    }

    fn render<'node>(&'node mut self, info: &RenderInfo, _scene: &Scene, graph: &mut RenderGraph<'node>) {
        profiling::scope!("ForwardTechnique::render");

        let hdr = self.passes.add_to_graph(graph, info);
        self.tonemapping.add_to_graph(graph, hdr, info.exposure);
    }
}
