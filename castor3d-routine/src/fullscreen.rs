//! Passes drawing one triangle covering the target, reading earlier targets.

use arrayvec::ArrayVec;
use castor3d::{
    backend::{BufferDescriptor, BufferUsage, RenderSystem},
    pipeline::{BlendState, DepthStencilState, MultisampleState, Pipeline, PipelineDescriptor, RasteriserState},
    shader::ShaderProgram,
    types::{BufferHandle, CullMode, PixelFormat, SampleCount, Topology},
    util::typedefs::SsoString,
    ShaderError,
};
use glam::Vec2;

use crate::{
    shaders::{ShaderConfig, ShaderPreProcessor},
    uniforms::{PassUniform, SceneUniform, UniformBlock},
};

/// Covers the [-1, 1] square once clipped.
const FULLSCREEN_TRIANGLE: [Vec2; 3] = [Vec2::new(-1.0, -1.0), Vec2::new(3.0, -1.0), Vec2::new(-1.0, 3.0)];

#[derive(Debug)]
pub struct FullscreenPass {
    label: SsoString,
    pipeline: Pipeline,
    vertices: Option<BufferHandle>,
    scene_data: UniformBlock<SceneUniform>,
    pass_data: UniformBlock<PassUniform>,
}

impl FullscreenPass {
    pub fn new(
        preprocessor: &ShaderPreProcessor,
        label: &str,
        pixel: &str,
        colour_formats: &[PixelFormat],
        blend: BlendState,
        samples: SampleCount,
    ) -> Self {
        let program: ShaderProgram = preprocessor.program(
            label,
            "castor3d/fullscreen.vert.glsl",
            pixel,
            &ShaderConfig::default(),
        );
        let desc = PipelineDescriptor {
            label: Some(label.into()),
            topology: Topology::Triangles,
            depth_stencil: DepthStencilState::disabled(),
            rasteriser: RasteriserState {
                cull_mode: CullMode::None,
                multisample: samples.needs_resolve(),
                ..RasteriserState::default()
            },
            blend,
            multisample: MultisampleState {
                samples,
                alpha_to_coverage: false,
            },
            colour_formats: colour_formats.iter().copied().collect::<ArrayVec<_, 8>>(),
            depth_format: None,
        };
        Self {
            label: label.into(),
            pipeline: Pipeline::new(desc, Some(program)),
            vertices: None,
            scene_data: UniformBlock::new("SceneData"),
            pass_data: UniformBlock::new("PassData"),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn initialise(&mut self, render_system: &mut dyn RenderSystem) -> Result<(), ShaderError> {
        self.cleanup(render_system);

        let data: &[u8] = bytemuck::cast_slice(&FULLSCREEN_TRIANGLE);
        let vertices = render_system.create_buffer(&BufferDescriptor {
            label: Some(self.label.clone()),
            size: data.len(),
            usage: BufferUsage::VERTEX,
        });
        render_system.write_buffer(vertices, 0, data);
        self.vertices = Some(vertices);

        if render_system.use_shaders() {
            self.scene_data.initialise(render_system);
            self.pass_data.initialise(render_system);
        }
        self.pipeline.initialise(render_system)
    }

    /// Draws the triangle into the bound target. Returns false when the
    /// pipeline isn't usable.
    pub fn draw(&mut self, render_system: &mut dyn RenderSystem, scene: &SceneUniform, pass: &PassUniform) -> bool {
        let Some(vertices) = self.vertices else {
            return false;
        };
        if !self.pipeline.apply(render_system) {
            return false;
        }
        if let Some(program) = self.pipeline.program().and_then(ShaderProgram::handle) {
            self.scene_data.write(render_system, scene);
            self.pass_data.write(render_system, pass);
            self.scene_data.bind(render_system, program);
            self.pass_data.bind(render_system, program);
        }
        render_system.draw(Topology::Triangles, vertices, None, FULLSCREEN_TRIANGLE.len() as u32);
        self.pipeline.unapply(render_system);
        true
    }

    pub fn cleanup(&mut self, render_system: &mut dyn RenderSystem) {
        self.pipeline.cleanup(render_system);
        if let Some(vertices) = self.vertices.take() {
            render_system.destroy_buffer(vertices);
        }
        self.scene_data.cleanup(render_system);
        self.pass_data.cleanup(render_system);
    }
}
