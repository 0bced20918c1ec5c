//! Depth maps seen from the shadow casting lights.

use castor3d::{
    backend::RenderSystem,
    format_sso,
    graph::{NodeResourceUsage, RenderGraph, RenderTargetDescriptor, RenderTargetHandle},
    scene::Scene,
    types::{BufferComponents, LightKind, SampleCount},
    util::typedefs::SsoString,
    ShaderError,
};
use glam::{Mat4, UVec2, Vec3, Vec4};
use smallvec::SmallVec;

use crate::{
    pass::{FrameCamera, FrameUniforms, GeometryRenderer, PassStage, RenderNode, SHADOW_FORMAT},
    shaders::ShaderPreProcessor,
};

pub const SHADOW_MAP_SIZE: u32 = 1024;

const DIRECTIONAL_EXTENT: f32 = 50.0;
const DIRECTIONAL_DISTANCE: f32 = 100.0;

/// Camera looking along the light. Directional lights get an orthographic
/// box centred on the origin, the others a 90 degree frustum.
pub fn light_camera(kind: LightKind, world: Mat4) -> FrameCamera {
    let direction = world.transform_vector3(Vec3::NEG_Z).normalize_or_zero();
    let direction = if direction == Vec3::ZERO { Vec3::NEG_Z } else { direction };
    let up = if direction.abs().dot(Vec3::Y) > 0.99 { Vec3::Z } else { Vec3::Y };

    let (location, projection) = match kind {
        LightKind::Directional => (
            -direction * DIRECTIONAL_DISTANCE,
            Mat4::orthographic_rh(
                -DIRECTIONAL_EXTENT,
                DIRECTIONAL_EXTENT,
                -DIRECTIONAL_EXTENT,
                DIRECTIONAL_EXTENT,
                0.1,
                2.0 * DIRECTIONAL_DISTANCE,
            ),
        ),
        LightKind::Point | LightKind::Spot => (
            world.w_axis.truncate(),
            Mat4::perspective_rh(90_f32.to_radians(), 1.0, 0.1, 100.0),
        ),
    };

    FrameCamera {
        projection,
        view: Mat4::look_to_rh(location, direction, up),
        location,
    }
}

#[derive(Debug, Clone)]
struct ShadowCaster {
    light: SsoString,
    camera: FrameCamera,
}

/// Renders one depth map per shadow casting light, all in one graph node.
#[derive(Debug)]
pub struct ShadowPass {
    label: SsoString,
    renderer: GeometryRenderer,
    lights: SmallVec<[ShadowCaster; 4]>,
    nodes: Vec<RenderNode>,
}

impl ShadowPass {
    pub fn new(preprocessor: &ShaderPreProcessor, label: &str) -> Self {
        Self {
            label: label.into(),
            renderer: GeometryRenderer::new(preprocessor, label, PassStage::Shadow),
            lights: SmallVec::new(),
            nodes: Vec::new(),
        }
    }

    pub fn initialise(&mut self, render_system: &mut dyn RenderSystem) -> Result<(), ShaderError> {
        self.renderer.initialise(render_system, SampleCount::One)
    }

    pub fn cleanup(&mut self, render_system: &mut dyn RenderSystem) {
        self.renderer.cleanup(render_system);
        self.lights.clear();
        self.nodes.clear();
    }

    /// Names of the lights which get a map this frame.
    pub fn lights(&self) -> impl Iterator<Item = &str> {
        self.lights.iter().map(|caster| caster.light.as_str())
    }

    pub fn prepare(&mut self, scene: &mut Scene, casters: &[RenderNode]) {
        profiling::scope!("ShadowPass::prepare");

        self.lights.clear();
        self.nodes.clear();
        if casters.is_empty() {
            return;
        }

        let lights: SmallVec<[_; 4]> = scene
            .lights()
            .filter(|light| light.casts_shadows)
            .map(|light| (light.name.clone(), light.kind, light.node))
            .collect();
        for (light, kind, node) in lights {
            match scene.graph_mut().derived_transformation_matrix(node) {
                Ok(world) => self.lights.push(ShadowCaster {
                    light,
                    camera: light_camera(kind, world),
                }),
                Err(error) => log::warn!("{}: light {:?} skipped: {}", self.label, light, error),
            }
        }
        if !self.lights.is_empty() {
            self.nodes.extend_from_slice(casters);
        }
    }

    /// Declares the maps and the node filling them. Returns the maps, for
    /// the passes sampling them to declare as inputs.
    pub fn add_to_graph<'node>(&'node mut self, graph: &mut RenderGraph<'node>) -> SmallVec<[RenderTargetHandle; 4]> {
        let maps: SmallVec<[RenderTargetHandle; 4]> = self
            .lights
            .iter()
            .map(|caster| {
                graph.add_render_target(RenderTargetDescriptor::single(
                    format_sso!("shadow map {}", caster.light),
                    UVec2::splat(SHADOW_MAP_SIZE),
                    SampleCount::One,
                    None,
                    Some(SHADOW_FORMAT),
                ))
            })
            .collect();
        if maps.is_empty() {
            return maps;
        }

        let mut builder = graph.add_node(self.label.as_str());
        let outputs: SmallVec<[_; 4]> = maps
            .iter()
            .map(|&map| builder.add_render_target(map, NodeResourceUsage::Output))
            .collect();

        let renderer = &mut self.renderer;
        let lights = &self.lights;
        let nodes = &self.nodes;

        builder.build(move |mut ctx| {
            for (caster, output) in lights.iter().zip(outputs) {
                ctx.bind_target(output);
                ctx.render_system.clear(Vec4::ONE, BufferComponents::DEPTH);
                let uniforms = FrameUniforms {
                    camera: caster.camera,
                    exposure: 1.0,
                    ..FrameUniforms::default()
                };
                renderer.draw(ctx.render_system, ctx.scene, nodes, &uniforms);
            }
        });

        maps
    }
}

#[cfg(test)]
mod tests {
    use castor3d::types::LightKind;
    use glam::{Mat4, Vec3};

    use super::light_camera;

    #[test]
    fn directional_camera_backs_off_along_the_light() {
        let camera = light_camera(LightKind::Directional, Mat4::IDENTITY);
        assert!(camera.location.abs_diff_eq(Vec3::new(0.0, 0.0, 100.0), 1e-4));
        let origin = camera.view.transform_point3(Vec3::ZERO);
        assert!(origin.abs_diff_eq(Vec3::new(0.0, 0.0, -100.0), 1e-3));
    }

    #[test]
    fn downward_light_picks_another_up() {
        let world = Mat4::from_rotation_x(-std::f32::consts::FRAC_PI_2);
        let camera = light_camera(LightKind::Spot, world);
        assert!(camera.view.is_finite());
    }
}
