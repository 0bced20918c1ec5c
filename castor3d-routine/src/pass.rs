//! Geometry passes: the draw loop shared by every pass drawing scene meshes,
//! and [`RenderTechniquePass`], which adds one stage of geometry to a frame.

use arrayvec::ArrayVec;
use castor3d::{
    backend::RenderSystem,
    format_sso,
    graph::{NodeResourceUsage, RenderGraph, RenderTargetHandle},
    pipeline::{BlendState, DepthStencilState, MultisampleState, Pipeline, PipelineDescriptor, RasteriserState},
    scene::{Pass, Scene},
    shader::ShaderProgram,
    technique::RenderInfo,
    types::{BlendMode, BufferComponents, CullMode, PixelFormat, SampleCount, Topology},
    util::typedefs::{FastHashMap, SsoString},
    ShaderError,
};
use glam::{Mat4, Vec3, Vec4};

use crate::{
    shaders::{ShaderConfig, ShaderPreProcessor},
    shadow::ShadowPass,
    sorting::{sort_nodes, Sorting},
    uniforms::{MatrixUniform, PassUniform, SceneUniform, UniformBlock},
};

pub const HDR_FORMAT: PixelFormat = PixelFormat::RGBA16F;
pub const DEPTH_FORMAT: PixelFormat = PixelFormat::D24S8;
pub const SHADOW_FORMAT: PixelFormat = PixelFormat::D32F;

/// What a geometry pass draws and how.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum PassStage {
    /// Depth only, from a light.
    Shadow,
    /// Lit opaque geometry into the hdr target.
    Opaque,
    /// Weighted blended transparent geometry into the accumulation and
    /// revealage targets.
    Transparent,
    /// Opaque geometry attributes for deferred lighting.
    GeometryBuffer,
}

impl PassStage {
    pub const fn pixel_shader(self) -> &'static str {
        match self {
            Self::Shadow => "castor3d/shadow.frag.glsl",
            Self::Opaque => "castor3d/forward.frag.glsl",
            Self::Transparent => "castor3d/weighted.frag.glsl",
            Self::GeometryBuffer => "castor3d/gbuffer.frag.glsl",
        }
    }

    pub fn colour_formats(self) -> ArrayVec<PixelFormat, 8> {
        let formats: &[PixelFormat] = match self {
            Self::Shadow => &[],
            Self::Opaque => &[HDR_FORMAT],
            Self::Transparent => &[PixelFormat::RGBA16F, PixelFormat::R16F],
            Self::GeometryBuffer => &[PixelFormat::RGBA16F, PixelFormat::RGBA16F, PixelFormat::RGBA32F],
        };
        formats.iter().copied().collect()
    }

    pub const fn depth_format(self) -> PixelFormat {
        match self {
            Self::Shadow => SHADOW_FORMAT,
            Self::Opaque | Self::Transparent | Self::GeometryBuffer => DEPTH_FORMAT,
        }
    }

    /// Whether a material pass belongs to this stage.
    pub fn accepts(self, pass: &Pass) -> bool {
        match self {
            Self::Transparent => pass.is_transparent(),
            Self::Opaque | Self::GeometryBuffer => !pass.is_transparent(),
            Self::Shadow => true,
        }
    }

    pub const fn sorting(self) -> Sorting {
        match self {
            Self::Transparent => Sorting::BackToFront,
            Self::Shadow | Self::Opaque | Self::GeometryBuffer => Sorting::FrontToBack,
        }
    }
}

/// One geometry to draw this frame.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderNode {
    pub geometry: SsoString,
    pub mesh: SsoString,
    /// World matrix of the geometry's node.
    pub model: Mat4,
    pub pass: Pass,
}

impl RenderNode {
    pub fn location(&self) -> Vec3 {
        self.model.w_axis.truncate()
    }
}

/// Every visible geometry of the scene with its world matrix. Call after the
/// scene graph was updated.
pub fn collect_render_nodes(scene: &mut Scene) -> Vec<RenderNode> {
    profiling::scope!("collect_render_nodes");

    let candidates: Vec<_> = scene
        .geometries()
        .filter(|geometry| {
            let graph = scene.graph();
            graph.is_visible(geometry.node) && graph.node(geometry.node).map_or(false, |n| n.is_displayable())
        })
        .map(|geometry| (geometry.name.clone(), geometry.node, geometry.mesh.clone(), geometry.pass.clone()))
        .collect();

    candidates
        .into_iter()
        .filter_map(|(geometry, node, mesh, pass)| {
            let model = scene.graph_mut().derived_transformation_matrix(node).ok()?;
            Some(RenderNode {
                geometry,
                mesh,
                model,
                pass,
            })
        })
        .collect()
}

/// Viewpoint of a pass.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct FrameCamera {
    pub projection: Mat4,
    pub view: Mat4,
    pub location: Vec3,
}

impl FrameCamera {
    /// The scene's camera, or a default perspective at the origin.
    pub fn from_scene(scene: &mut Scene, info: &RenderInfo) -> Self {
        let view = scene.view_matrix();
        let projection = match scene.camera() {
            Some(camera) => camera.projection,
            None => {
                let aspect = info.resolution.x.max(1) as f32 / info.resolution.y.max(1) as f32;
                Mat4::perspective_rh(45_f32.to_radians(), aspect, 0.1, 1000.0)
            }
        };
        Self {
            projection,
            view,
            location: view.inverse().w_axis.truncate(),
        }
    }
}

impl Default for FrameCamera {
    fn default() -> Self {
        Self {
            projection: Mat4::IDENTITY,
            view: Mat4::IDENTITY,
            location: Vec3::ZERO,
        }
    }
}

/// Uniform data shared by every draw of one pass in one frame.
#[derive(Debug, Copy, Clone, Default)]
pub struct FrameUniforms {
    pub camera: FrameCamera,
    pub scene: SceneUniform,
    pub exposure: f32,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
struct PipelineKey {
    colour: BlendMode,
    alpha: BlendMode,
    samples: SampleCount,
    two_sided: bool,
}

/// Draws render nodes with one pipeline per blend mode, sample count and
/// face culling.
#[derive(Debug)]
pub struct GeometryRenderer {
    label: SsoString,
    stage: PassStage,
    samples: SampleCount,
    program: ShaderProgram,
    pipelines: FastHashMap<PipelineKey, Pipeline>,
    matrices: UniformBlock<MatrixUniform>,
    scene_data: UniformBlock<SceneUniform>,
    pass_data: UniformBlock<PassUniform>,
}

impl GeometryRenderer {
    pub fn new(preprocessor: &ShaderPreProcessor, label: &str, stage: PassStage) -> Self {
        let program = preprocessor.program(
            label,
            "castor3d/mesh.vert.glsl",
            stage.pixel_shader(),
            &ShaderConfig::default(),
        );
        Self {
            label: label.into(),
            stage,
            samples: SampleCount::One,
            program,
            pipelines: FastHashMap::default(),
            matrices: UniformBlock::new("Matrices"),
            scene_data: UniformBlock::new("SceneData"),
            pass_data: UniformBlock::new("PassData"),
        }
    }

    pub fn stage(&self) -> PassStage {
        self.stage
    }

    pub fn pipeline_count(&self) -> usize {
        self.pipelines.len()
    }

    /// Creates the uniform buffers and the pipeline of a default material,
    /// which reports shader errors early.
    pub fn initialise(&mut self, render_system: &mut dyn RenderSystem, samples: SampleCount) -> Result<(), ShaderError> {
        self.cleanup(render_system);
        self.samples = samples;
        if render_system.use_shaders() {
            self.matrices.initialise(render_system);
            self.scene_data.initialise(render_system);
            self.pass_data.initialise(render_system);
        }

        let key = self.key(&Pass::default());
        let mut pipeline = self.create_pipeline(key);
        let result = pipeline.initialise(render_system);
        // A failed pipeline stays in the map so it isn't rebuilt every frame
        self.pipelines.insert(key, pipeline);
        result
    }

    fn key(&self, pass: &Pass) -> PipelineKey {
        PipelineKey {
            colour: pass.colour_blend_mode,
            alpha: pass.alpha_blend_mode,
            samples: self.samples,
            two_sided: pass.two_sided,
        }
    }

    fn descriptor(&self, key: PipelineKey) -> PipelineDescriptor {
        let blend = match self.stage {
            PassStage::Opaque => BlendState::from_modes(key.colour, key.alpha),
            PassStage::Transparent => BlendState::weighted_blend(),
            PassStage::Shadow | PassStage::GeometryBuffer => BlendState::default(),
        };
        let depth_stencil = match self.stage {
            PassStage::Transparent => DepthStencilState::read_only(),
            _ => DepthStencilState::default(),
        };
        let rasteriser = RasteriserState {
            cull_mode: if key.two_sided { CullMode::None } else { CullMode::Back },
            multisample: key.samples.needs_resolve(),
            depth_bias: if self.stage == PassStage::Shadow { 1.0 } else { 0.0 },
            ..RasteriserState::default()
        };
        PipelineDescriptor {
            label: Some(format_sso!("{} {:?}/{:?} x{}", self.label, key.colour, key.alpha, key.samples as u8)),
            topology: Topology::Triangles,
            depth_stencil,
            rasteriser,
            blend,
            multisample: MultisampleState {
                samples: key.samples,
                alpha_to_coverage: false,
            },
            colour_formats: self.stage.colour_formats(),
            depth_format: Some(self.stage.depth_format()),
        }
    }

    fn create_pipeline(&self, key: PipelineKey) -> Pipeline {
        let name = format_sso!("{} #{}", self.label, self.pipelines.len());
        Pipeline::new(self.descriptor(key), Some(self.program.duplicate(name)))
    }

    /// Draws `nodes`, updating the uniform blocks before each draw. Nodes
    /// whose mesh has no buffers yet, or whose pipeline failed, are skipped.
    /// Returns the number of draw calls.
    pub fn draw(
        &mut self,
        render_system: &mut dyn RenderSystem,
        scene: &mut Scene,
        nodes: &[RenderNode],
        uniforms: &FrameUniforms,
    ) -> u32 {
        profiling::scope!("GeometryRenderer::draw");

        let use_shaders = render_system.use_shaders();
        if use_shaders {
            self.scene_data.write(render_system, &uniforms.scene);
        }

        let mut draws = 0;
        for node in nodes {
            let Some(buffers) = scene.mesh_buffers(&node.mesh).map(<[_]>::to_vec) else {
                log::trace!("{}: mesh {:?} isn't uploaded yet", self.label, node.mesh);
                continue;
            };

            let key = self.key(&node.pass);
            if !self.pipelines.contains_key(&key) {
                let mut pipeline = self.create_pipeline(key);
                if let Err(error) = pipeline.initialise(render_system) {
                    log::error!("{}: {}", self.label, error);
                }
                self.pipelines.insert(key, pipeline);
            }
            let Some(pipeline) = self.pipelines.get_mut(&key) else {
                continue;
            };
            if !pipeline.apply(render_system) {
                continue;
            }

            let mut program = pipeline.program().and_then(ShaderProgram::handle);
            let mut custom = None;
            if use_shaders {
                if let Some(name) = &node.pass.program {
                    let bound = scene.program_mut(name).and_then(|scene_program| {
                        if scene_program.bind(render_system) {
                            scene_program.handle()
                        } else {
                            None
                        }
                    });
                    match bound {
                        Some(handle) => {
                            program = Some(handle);
                            custom = Some(name.clone());
                        }
                        None => log::trace!("{}: program {:?} isn't usable, using the stock one", self.label, name),
                    }
                }
            }

            if let Some(program) = program {
                let matrices = MatrixUniform::new(uniforms.camera.projection, uniforms.camera.view, node.model);
                self.matrices.write(render_system, &matrices);
                self.pass_data.write(
                    render_system,
                    &PassUniform {
                        colour: node.pass.colour,
                        opacity: node.pass.opacity,
                        exposure: uniforms.exposure,
                    },
                );
                self.matrices.bind(render_system, program);
                self.scene_data.bind(render_system, program);
                self.pass_data.bind(render_system, program);
            }

            for submesh in buffers {
                render_system.draw(Topology::Triangles, submesh.vertices, submesh.indices, submesh.count);
                draws += 1;
            }

            if let Some(scene_program) = custom.and_then(|name| scene.program_mut(&name)) {
                scene_program.unbind(render_system);
            }
            pipeline.unapply(render_system);
        }
        draws
    }

    pub fn cleanup(&mut self, render_system: &mut dyn RenderSystem) {
        for (_, mut pipeline) in self.pipelines.drain() {
            pipeline.cleanup(render_system);
        }
        self.matrices.cleanup(render_system);
        self.scene_data.cleanup(render_system);
        self.pass_data.cleanup(render_system);
    }
}

/// One stage of geometry in a technique: its shadow maps, then its
/// nodes drawn into a target.
#[derive(Debug)]
pub struct RenderTechniquePass {
    label: SsoString,
    renderer: GeometryRenderer,
    shadows: ShadowPass,
    nodes: Vec<RenderNode>,
    uniforms: FrameUniforms,
}

impl RenderTechniquePass {
    pub fn new(preprocessor: &ShaderPreProcessor, label: &str, stage: PassStage) -> Self {
        Self {
            label: label.into(),
            renderer: GeometryRenderer::new(preprocessor, label, stage),
            shadows: ShadowPass::new(preprocessor, &format_sso!("{} shadows", label)),
            nodes: Vec::new(),
            uniforms: FrameUniforms::default(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn stage(&self) -> PassStage {
        self.renderer.stage()
    }

    /// Nodes queued by the last [`Self::prepare`], in draw order.
    pub fn nodes(&self) -> &[RenderNode] {
        &self.nodes
    }

    pub fn shadows(&self) -> &ShadowPass {
        &self.shadows
    }

    pub fn renderer(&self) -> &GeometryRenderer {
        &self.renderer
    }

    pub fn initialise(&mut self, render_system: &mut dyn RenderSystem, samples: SampleCount) -> Result<(), ShaderError> {
        self.renderer.initialise(render_system, samples)?;
        self.shadows.initialise(render_system)
    }

    pub fn cleanup(&mut self, render_system: &mut dyn RenderSystem) {
        self.renderer.cleanup(render_system);
        self.shadows.cleanup(render_system);
        self.nodes.clear();
    }

    /// Picks this stage's nodes out of `nodes`, sorts them and prepares the
    /// shadow maps they need.
    pub fn prepare(&mut self, scene: &mut Scene, info: &RenderInfo, nodes: &[RenderNode], scene_uniform: &SceneUniform) {
        profiling::scope!("RenderTechniquePass::prepare");

        let stage = self.renderer.stage();
        let camera = FrameCamera::from_scene(scene, info);
        self.nodes.clear();
        self.nodes.extend(nodes.iter().filter(|node| stage.accepts(&node.pass)).cloned());
        sort_nodes(&mut self.nodes, camera.location, stage.sorting());

        self.uniforms = FrameUniforms {
            camera,
            scene: *scene_uniform,
            exposure: info.exposure,
        };
        self.shadows.prepare(scene, &self.nodes);
    }

    /// Adds the shadow node and the draw node. `depth_source`, if any, has
    /// its depth copied into `target` first. `clear` clears the target.
    pub fn add_to_graph<'node>(
        &'node mut self,
        graph: &mut RenderGraph<'node>,
        target: RenderTargetHandle,
        depth_source: Option<RenderTargetHandle>,
        clear: Option<Vec4>,
    ) {
        let shadow_maps = self.shadows.add_to_graph(graph);

        let mut builder = graph.add_node(self.label.as_str());
        let usage = match clear {
            Some(_) => NodeResourceUsage::Output,
            None => NodeResourceUsage::InputOutput,
        };
        let target_handle = builder.add_render_target(target, usage);
        let depth_handle = builder.add_optional_render_target(depth_source, NodeResourceUsage::Input);
        for shadow_map in shadow_maps {
            builder.add_render_target(shadow_map, NodeResourceUsage::Input);
        }

        let renderer = &mut self.renderer;
        let nodes = &self.nodes;
        let uniforms = &self.uniforms;

        builder.build(move |mut ctx| {
            if let Some(depth_handle) = depth_handle {
                match (ctx.frame_buffer(depth_handle), ctx.frame_buffer(target_handle)) {
                    (Some(src), dst @ Some(_)) => ctx.render_system.blit(src, dst, BufferComponents::DEPTH),
                    _ => log::warn!("{}: no depth to copy", renderer.label),
                }
            }
            ctx.bind_target(target_handle);
            if let Some(colour) = clear {
                let components = match depth_handle {
                    Some(_) => BufferComponents::COLOUR,
                    None => BufferComponents::COLOUR | BufferComponents::DEPTH,
                };
                ctx.render_system.clear(colour, components);
            }
            renderer.draw(ctx.render_system, ctx.scene, nodes, uniforms);
        });
    }
}

#[cfg(test)]
mod tests {
    use castor3d::{scene::Pass, types::PixelFormat};

    use super::PassStage;
    use crate::sorting::Sorting;

    #[test]
    fn stages_split_on_opacity() {
        let opaque = Pass::default();
        let glass = Pass {
            opacity: 0.5,
            ..Pass::default()
        };
        assert!(PassStage::Opaque.accepts(&opaque));
        assert!(!PassStage::Opaque.accepts(&glass));
        assert!(PassStage::Transparent.accepts(&glass));
        assert!(PassStage::GeometryBuffer.accepts(&opaque));
        assert!(PassStage::Shadow.accepts(&glass));
        assert_eq!(PassStage::Transparent.sorting(), Sorting::BackToFront);
    }

    #[test]
    fn weighted_blend_targets() {
        assert_eq!(
            PassStage::Transparent.colour_formats().as_slice(),
            [PixelFormat::RGBA16F, PixelFormat::R16F]
        );
        assert!(PassStage::Shadow.colour_formats().is_empty());
        assert_eq!(PassStage::Shadow.depth_format(), PixelFormat::D32F);
    }
}
