//! Forward rendering into multisampled targets, resolved before tone
//! mapping.

use castor3d::{
    backend::RenderSystem,
    graph::{NodeResourceUsage, RenderGraph, RenderTargetHandle},
    scene::Scene,
    technique::{RenderInfo, RenderTechnique},
    types::{BufferComponents, SampleCount},
    ShaderError,
};

use crate::{
    base::{hdr_target, FrameInputs},
    forward::ForwardPasses,
    pass::RenderTechniquePass,
    shaders::ShaderPreProcessor,
    tonemapping::TonemappingPass,
};

pub const MSAA_SAMPLES: SampleCount = SampleCount::Four;

/// Copies colour and depth of the multisampled `source` into `destination`.
pub fn add_resolve_node(graph: &mut RenderGraph<'_>, source: RenderTargetHandle, destination: RenderTargetHandle) {
    let mut builder = graph.add_node("msaa resolve");
    let source_handle = builder.add_render_target(source, NodeResourceUsage::Input);
    let destination_handle = builder.add_render_target(destination, NodeResourceUsage::Output);

    builder.build(move |mut ctx| match ctx.frame_buffer(source_handle) {
        Some(src) => {
            let dst = ctx.frame_buffer(destination_handle);
            ctx.render_system
                .blit(src, dst, BufferComponents::COLOUR | BufferComponents::DEPTH);
        }
        None => log::warn!("msaa resolve: the multisampled target wasn't allocated"),
    });
}

#[derive(Debug)]
pub struct MsaaForwardTechnique {
    passes: ForwardPasses,
    tonemapping: TonemappingPass,
    frame: FrameInputs,
}

impl MsaaForwardTechnique {
    pub const NAME: &'static str = "msaa";

    pub fn new(preprocessor: &ShaderPreProcessor) -> Self {
        Self {
            passes: ForwardPasses::new(preprocessor, MSAA_SAMPLES),
            tonemapping: TonemappingPass::new(preprocessor),
            frame: FrameInputs::default(),
        }
    }

    /// Refuses render systems without multisampled targets.
    pub fn factory(render_system: &dyn RenderSystem, _info: &RenderInfo) -> Option<Box<dyn RenderTechnique>> {
        let max_samples = render_system.capabilities().max_samples;
        if (max_samples as u8) < (MSAA_SAMPLES as u8) {
            log::warn!(
                "{} supports at most {:?}, the msaa technique needs {:?}",
                render_system.name(),
                max_samples,
                MSAA_SAMPLES
            );
            return None;
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

impl RenderTechnique for MsaaForwardTechnique {
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
        profiling::scope!("MsaaForwardTechnique::render");

        let multisampled = self.passes.add_to_graph(graph, info);
        let resolved = hdr_target(graph, info, SampleCount::One);
        add_resolve_node(graph, multisampled, resolved);
        self.tonemapping.add_to_graph(graph, resolved, info.exposure);
    }
}
