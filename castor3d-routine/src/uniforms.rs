//! Uniform blocks shared by the passes, laid out as std140 through `encase`.

use std::marker::PhantomData;

use castor3d::{
    backend::{BufferDescriptor, BufferUsage, RenderSystem},
    scene::{Light, Scene},
    types::{BufferHandle, LightKind, ProgramHandle},
    util::typedefs::SsoString,
};
use encase::{internal::WriteInto, ShaderType, UniformBuffer};
use glam::{Mat4, Vec3, Vec4};

use crate::shaders::MAX_LIGHTS;

/// `Matrices` block of the mesh vertex shader.
#[derive(Debug, Copy, Clone, ShaderType)]
pub struct MatrixUniform {
    pub projection: Mat4,
    pub view: Mat4,
    pub model: Mat4,
    pub normal_matrix: Mat4,
}

impl MatrixUniform {
    pub fn new(projection: Mat4, view: Mat4, model: Mat4) -> Self {
        Self {
            projection,
            view,
            model,
            normal_matrix: model.inverse().transpose(),
        }
    }
}

#[derive(Debug, Copy, Clone, Default, ShaderType)]
pub struct LightUniform {
    /// w is 0 for directional lights.
    pub position: Vec4,
    pub colour: Vec4,
    pub direction: Vec4,
}

/// `SceneData` block: ambient light, camera and lights.
#[derive(Debug, Copy, Clone, ShaderType)]
pub struct SceneUniform {
    pub ambient: Vec4,
    pub camera_position: Vec4,
    pub light_count: u32,
    pub lights: [LightUniform; MAX_LIGHTS],
}

impl Default for SceneUniform {
    fn default() -> Self {
        Self {
            ambient: Vec4::ZERO,
            camera_position: Vec4::W,
            light_count: 0,
            lights: [LightUniform::default(); MAX_LIGHTS],
        }
    }
}

impl SceneUniform {
    /// Gathers the scene's lights. Lights past [`MAX_LIGHTS`] are dropped.
    pub fn from_scene(scene: &mut Scene) -> Self {
        profiling::scope!("SceneUniform::from_scene");

        let mut uniform = Self {
            ambient: scene.ambient_light,
            ..Self::default()
        };
        if let Some(node) = scene.camera().map(|camera| camera.node) {
            let position = scene.graph_mut().derived_position(node).unwrap_or(Vec3::ZERO);
            uniform.camera_position = position.extend(1.0);
        }

        let lights: Vec<Light> = scene.lights().cloned().collect();
        if lights.len() > MAX_LIGHTS {
            log::warn!(
                "Scene {:?} has {} lights, only {} are used",
                scene.name(),
                lights.len(),
                MAX_LIGHTS
            );
        }
        for (slot, light) in uniform.lights.iter_mut().zip(&lights) {
            let world = scene
                .graph_mut()
                .derived_transformation_matrix(light.node)
                .unwrap_or(Mat4::IDENTITY);
            let w = match light.kind {
                LightKind::Directional => 0.0,
                LightKind::Point | LightKind::Spot => 1.0,
            };
            *slot = LightUniform {
                position: world.w_axis.truncate().extend(w),
                colour: light.colour.extend(1.0),
                direction: world.transform_vector3(Vec3::NEG_Z).normalize_or_zero().extend(0.0),
            };
        }
        uniform.light_count = lights.len().min(MAX_LIGHTS) as u32;
        uniform
    }
}

/// `PassData` block: material colour and the exposure used when tone mapping.
#[derive(Debug, Copy, Clone, ShaderType)]
pub struct PassUniform {
    pub colour: Vec4,
    pub opacity: f32,
    pub exposure: f32,
}

impl Default for PassUniform {
    fn default() -> Self {
        Self {
            colour: Vec4::ONE,
            opacity: 1.0,
            exposure: 1.0,
        }
    }
}

/// A render system buffer backing one named uniform block.
#[derive(Debug)]
pub struct UniformBlock<T> {
    name: &'static str,
    buffer: Option<BufferHandle>,
    size: usize,
    _phantom: PhantomData<T>,
}

impl<T: ShaderType + WriteInto> UniformBlock<T> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            buffer: None,
            size: 0,
            _phantom: PhantomData,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn buffer(&self) -> Option<BufferHandle> {
        self.buffer
    }

    pub fn initialise(&mut self, render_system: &mut dyn RenderSystem) {
        self.cleanup(render_system);
        self.size = T::min_size().get() as usize;
        self.buffer = Some(render_system.create_buffer(&BufferDescriptor {
            label: Some(SsoString::from(self.name)),
            size: self.size,
            usage: BufferUsage::UNIFORM,
        }));
    }

    /// Writes `value` into the buffer. Failures are logged and leave the
    /// previous contents.
    pub fn write(&mut self, render_system: &mut dyn RenderSystem, value: &T) -> bool {
        let Some(buffer) = self.buffer else {
            return false;
        };
        let mut data = UniformBuffer::new(Vec::with_capacity(self.size));
        if let Err(error) = data.write(value) {
            log::error!("Uniform block {}: {}", self.name, error);
            return false;
        }
        render_system.write_buffer(buffer, 0, &data.into_inner());
        true
    }

    /// Binds the buffer to the block of the same name in `program`. Programs
    /// without that block are skipped.
    pub fn bind(&self, render_system: &mut dyn RenderSystem, program: ProgramHandle) {
        let Some(buffer) = self.buffer else {
            return;
        };
        if let Some(binding) = render_system.uniform_block_binding(program, self.name) {
            render_system.bind_uniform_buffer(program, binding, buffer);
        }
    }

    pub fn cleanup(&mut self, render_system: &mut dyn RenderSystem) {
        if let Some(buffer) = self.buffer.take() {
            render_system.destroy_buffer(buffer);
        }
    }
}

#[cfg(test)]
mod tests {
    use encase::ShaderType;

    use super::{MatrixUniform, PassUniform, SceneUniform};
    use crate::shaders::MAX_LIGHTS;

    #[test]
    fn std140_sizes() {
        assert_eq!(MatrixUniform::min_size().get(), 4 * 64);
        // vec4 colour, two floats, padded to 16
        assert_eq!(PassUniform::min_size().get(), 32);
        // two vec4, a uint padded to 16, then the light array
        assert_eq!(SceneUniform::min_size().get() as usize, 48 + MAX_LIGHTS * 48);
    }
}
