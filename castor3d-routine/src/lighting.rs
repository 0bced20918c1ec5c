//! Deferred lighting: shades the geometry buffer into the hdr target.

use castor3d::{
    backend::RenderSystem,
    graph::{NodeResourceUsage, RenderGraph, RenderTargetHandle},
    pipeline::BlendState,
    types::{BufferComponents, SampleCount},
    ShaderError,
};
use glam::Vec4;

use crate::{
    fullscreen::FullscreenPass,
    pass::HDR_FORMAT,
    shaders::ShaderPreProcessor,
    uniforms::{PassUniform, SceneUniform},
};

#[derive(Debug)]
pub struct LightingPass {
    pass: FullscreenPass,
    scene: SceneUniform,
}

impl LightingPass {
    pub fn new(preprocessor: &ShaderPreProcessor) -> Self {
        Self {
            pass: FullscreenPass::new(
                preprocessor,
                "deferred lighting",
                "castor3d/lighting.frag.glsl",
                &[HDR_FORMAT],
                BlendState::default(),
                SampleCount::One,
            ),
            scene: SceneUniform::default(),
        }
    }

    pub fn initialise(&mut self, render_system: &mut dyn RenderSystem) -> Result<(), ShaderError> {
        self.pass.initialise(render_system)
    }

    pub fn cleanup(&mut self, render_system: &mut dyn RenderSystem) {
        self.pass.cleanup(render_system);
    }

    pub fn prepare(&mut self, scene: &SceneUniform) {
        self.scene = *scene;
    }

    /// Reads `gbuffer` and writes `hdr`, cleared to `background` first.
    pub fn add_to_graph<'node>(
        &'node mut self,
        graph: &mut RenderGraph<'node>,
        gbuffer: RenderTargetHandle,
        hdr: RenderTargetHandle,
        background: Vec4,
    ) {
        let mut builder = graph.add_node("deferred lighting");
        builder.add_render_target(gbuffer, NodeResourceUsage::Input);
        let hdr_handle = builder.add_render_target(hdr, NodeResourceUsage::Output);

        let pass = &mut self.pass;
        let scene = &self.scene;

        builder.build(move |mut ctx| {
            ctx.bind_target(hdr_handle);
            ctx.render_system.clear(background, BufferComponents::COLOUR);
            pass.draw(ctx.render_system, scene, &PassUniform::default());
        });
    }
}
