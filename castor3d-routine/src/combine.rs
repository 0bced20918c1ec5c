//! Composites the weighted blended transparency targets over the opaque
//! result.

use castor3d::{
    backend::RenderSystem,
    graph::{NodeResourceUsage, RenderGraph, RenderTargetHandle},
    pipeline::{BlendState, RenderTargetBlend},
    types::{BlendOperand, SampleCount},
    ShaderError,
};

use crate::{
    fullscreen::FullscreenPass,
    pass::HDR_FORMAT,
    shaders::ShaderPreProcessor,
    uniforms::{PassUniform, SceneUniform},
};

#[derive(Debug)]
pub struct CombinePass {
    pass: FullscreenPass,
}

impl CombinePass {
    pub fn new(preprocessor: &ShaderPreProcessor, samples: SampleCount) -> Self {
        Self {
            pass: FullscreenPass::new(
                preprocessor,
                "weighted blend combine",
                "castor3d/combine.frag.glsl",
                &[HDR_FORMAT],
                BlendState::single(RenderTargetBlend::uniform(BlendOperand::SrcAlpha, BlendOperand::InvSrcAlpha)),
                samples,
            ),
        }
    }

    pub fn initialise(&mut self, render_system: &mut dyn RenderSystem) -> Result<(), ShaderError> {
        self.pass.initialise(render_system)
    }

    pub fn cleanup(&mut self, render_system: &mut dyn RenderSystem) {
        self.pass.cleanup(render_system);
    }

    /// Blends `accumulation` (accumulation and revealage attachments) into
    /// `hdr`.
    pub fn add_to_graph<'node>(
        &'node mut self,
        graph: &mut RenderGraph<'node>,
        accumulation: RenderTargetHandle,
        hdr: RenderTargetHandle,
    ) {
        let mut builder = graph.add_node("weighted blend combine");
        builder.add_render_target(accumulation, NodeResourceUsage::Input);
        let hdr_handle = builder.add_render_target(hdr, NodeResourceUsage::InputOutput);

        let pass = &mut self.pass;

        builder.build(move |mut ctx| {
            ctx.bind_target(hdr_handle);
            pass.draw(ctx.render_system, &SceneUniform::default(), &PassUniform::default());
        });
    }
}
