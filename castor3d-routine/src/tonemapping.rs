//! Maps the hdr target to the back buffer with the frame's exposure.

use castor3d::{
    backend::RenderSystem,
    graph::{NodeResourceUsage, RenderGraph, RenderTargetHandle},
    pipeline::BlendState,
    types::{PixelFormat, SampleCount},
    ShaderError,
};

use crate::{
    fullscreen::FullscreenPass,
    shaders::ShaderPreProcessor,
    uniforms::{PassUniform, SceneUniform},
};

pub const OUTPUT_FORMAT: PixelFormat = PixelFormat::R8G8B8A8Srgb;

#[derive(Debug)]
pub struct TonemappingPass {
    pass: FullscreenPass,
}

impl TonemappingPass {
    pub fn new(preprocessor: &ShaderPreProcessor) -> Self {
        Self {
            pass: FullscreenPass::new(
                preprocessor,
                "tonemapping",
                "castor3d/tonemapping.frag.glsl",
                &[OUTPUT_FORMAT],
                BlendState::default(),
                SampleCount::One,
            ),
        }
    }

    pub fn initialise(&mut self, render_system: &mut dyn RenderSystem) -> Result<(), ShaderError> {
        self.pass.initialise(render_system)
    }

    pub fn cleanup(&mut self, render_system: &mut dyn RenderSystem) {
        self.pass.cleanup(render_system);
    }

    pub fn add_to_graph<'node>(
        &'node mut self,
        graph: &mut RenderGraph<'node>,
        source: RenderTargetHandle,
        exposure: f32,
    ) {
        let output = graph.output_target();
        let mut builder = graph.add_node("tonemapping");
        builder.add_render_target(source, NodeResourceUsage::Input);
        let output_handle = builder.add_render_target(output, NodeResourceUsage::Output);

        let pass = &mut self.pass;

        builder.build(move |mut ctx| {
            ctx.bind_target(output_handle);
            let uniform = PassUniform {
                exposure,
                ..PassUniform::default()
            };
            pass.draw(ctx.render_system, &SceneUniform::default(), &uniform);
        });
    }
}
