use castor3d_types::{BufferHandle, ProgramHandle, ShaderTypeFlags, VariableType};

use crate::{
    backend::{BufferDescriptor, BufferUsage, RenderSystem},
    util::typedefs::SsoString,
    variable::FrameVariable,
    VariableError,
};

/// A named uniform block: an ordered list of frame variables laid out with
/// std140 rules, uploaded as one buffer.
///
/// On render systems without uniform buffers every member is written as a
/// loose uniform instead.
#[derive(Debug, Clone)]
pub struct FrameVariableBuffer {
    name: SsoString,
    stages: ShaderTypeFlags,
    variables: Vec<FrameVariable>,
    offsets: Vec<usize>,
    size: usize,
    binding: Option<u32>,
    buffer: Option<BufferHandle>,
    locations: Vec<Option<u32>>,
}

const fn align_to(value: usize, align: usize) -> usize {
    (value + align - 1) / align * align
}

impl FrameVariableBuffer {
    pub fn new(name: impl Into<SsoString>, stages: ShaderTypeFlags) -> Self {
        Self {
            name: name.into(),
            stages,
            variables: Vec::new(),
            offsets: Vec::new(),
            size: 0,
            binding: None,
            buffer: None,
            locations: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stages(&self) -> ShaderTypeFlags {
        self.stages
    }

    /// Appends a member after every existing one.
    pub fn create_variable(
        &mut self,
        name: impl Into<SsoString>,
        ty: VariableType,
        occurrences: usize,
    ) -> Result<&mut FrameVariable, VariableError> {
        let name = name.into();
        if self.variables.iter().any(|v| v.name() == name) {
            return Err(VariableError::DuplicateName { name });
        }

        let variable = FrameVariable::new(name, ty, occurrences);
        let layout = ty.std140(variable.occurrences());
        let offset = align_to(self.size, layout.align);
        self.size = offset + layout.size;
        self.offsets.push(offset);
        self.variables.push(variable);

        let index = self.variables.len() - 1;
        Ok(&mut self.variables[index])
    }

    pub fn find_variable(&self, name: &str) -> Option<&FrameVariable> {
        self.variables.iter().find(|v| v.name() == name)
    }

    pub fn find_variable_mut(&mut self, name: &str) -> Option<&mut FrameVariable> {
        self.variables.iter_mut().find(|v| v.name() == name)
    }

    pub fn variables(&self) -> &[FrameVariable] {
        &self.variables
    }

    /// Byte offset of a member inside the block.
    pub fn offset_of(&self, name: &str) -> Option<usize> {
        let index = self.variables.iter().position(|v| v.name() == name)?;
        Some(self.offsets[index])
    }

    /// Size of the whole block, rounded to a vec4.
    pub fn size(&self) -> usize {
        align_to(self.size.max(1), 16)
    }

    pub fn binding(&self) -> Option<u32> {
        self.binding
    }

    pub fn gpu_buffer(&self) -> Option<BufferHandle> {
        self.buffer
    }

    /// Std140 image of the block.
    pub fn bytes(&self) -> Vec<u8> {
        let mut bytes = vec![0; self.size()];
        for (variable, &offset) in self.variables.iter().zip(&self.offsets) {
            variable.write_std140(&mut bytes[offset..]);
        }
        bytes
    }

    /// Resolves where the block lives in a linked program and creates the
    /// buffer backing it. Returns false if the program doesn't use the block.
    pub fn initialise(&mut self, render_system: &mut dyn RenderSystem, program: ProgramHandle) -> bool {
        self.cleanup(render_system);

        if render_system.capabilities().uniform_buffers {
            let Some(binding) = render_system.uniform_block_binding(program, &self.name) else {
                log::warn!("Uniform block {:?} isn't used by the program", self.name);
                return false;
            };
            self.binding = Some(binding);
            self.buffer = Some(render_system.create_buffer(&BufferDescriptor {
                label: Some(self.name.clone()),
                size: self.size(),
                usage: BufferUsage::UNIFORM,
            }));
        } else {
            self.locations = self
                .variables
                .iter()
                .map(|v| render_system.uniform_location(program, v.name()))
                .collect();
            if self.locations.iter().all(Option::is_none) {
                log::warn!("No member of uniform block {:?} is used by the program", self.name);
                return false;
            }
        }

        self.variables.iter_mut().for_each(FrameVariable::mark_changed);
        true
    }

    /// Uploads the block if any member changed since the last update.
    /// Returns whether anything was written.
    pub fn update(&mut self, render_system: &mut dyn RenderSystem, program: ProgramHandle) -> bool {
        profiling::scope!("FrameVariableBuffer::update");

        if !self.variables.iter().any(FrameVariable::any_changed) {
            return false;
        }

        match self.buffer {
            Some(buffer) => {
                let bytes = self.bytes();
                self.variables.iter_mut().for_each(|v| {
                    v.take_changed();
                });
                render_system.write_buffer(buffer, 0, &bytes);
            }
            None => {
                for (variable, location) in self.variables.iter_mut().zip(&self.locations) {
                    if let Some(location) = *location {
                        if variable.take_changed() {
                            render_system.write_uniform(program, location, variable);
                        }
                    }
                }
            }
        }
        true
    }

    /// Binds the backing buffer to the block's binding point. Does nothing
    /// for loose uniform blocks.
    pub fn bind(&self, render_system: &mut dyn RenderSystem, program: ProgramHandle) {
        if let (Some(binding), Some(buffer)) = (self.binding, self.buffer) {
            render_system.bind_uniform_buffer(program, binding, buffer);
        }
    }

    /// Drops the render system side without releasing it, for copies.
    pub(crate) fn forget_gpu_objects(&mut self) {
        self.buffer = None;
        self.binding = None;
        self.locations.clear();
        self.variables.iter_mut().for_each(FrameVariable::mark_changed);
    }

    pub fn cleanup(&mut self, render_system: &mut dyn RenderSystem) {
        if let Some(buffer) = self.buffer.take() {
            render_system.destroy_buffer(buffer);
        }
        self.binding = None;
        self.locations.clear();
    }
}

#[cfg(test)]
mod tests {
    use castor3d_types::{ShaderTypeFlags, VariableType};
    use glam::{Mat4, Vec3};

    use super::FrameVariableBuffer;
    use crate::VariableError;

    #[test]
    fn members_follow_std140() {
        let mut buffer = FrameVariableBuffer::new("Scene", ShaderTypeFlags::VERTEX | ShaderTypeFlags::PIXEL);
        buffer
            .create_variable("c3d_v3CameraPosition", VariableType::from_name("vec3f").unwrap(), 1)
            .unwrap();
        buffer
            .create_variable("c3d_fExposure", VariableType::from_name("float").unwrap(), 1)
            .unwrap();
        buffer
            .create_variable("c3d_mtxView", VariableType::from_name("mat4x4f").unwrap(), 1)
            .unwrap();

        assert_eq!(buffer.offset_of("c3d_v3CameraPosition"), Some(0));
        // a float fits in the tail of the vec3
        assert_eq!(buffer.offset_of("c3d_fExposure"), Some(12));
        assert_eq!(buffer.offset_of("c3d_mtxView"), Some(16));
        assert_eq!(buffer.size(), 80);

        let error = buffer
            .create_variable("c3d_fExposure", VariableType::from_name("float").unwrap(), 1)
            .unwrap_err();
        assert!(matches!(error, VariableError::DuplicateName { .. }));
    }

    #[test]
    fn bytes_reflect_values() {
        let mut buffer = FrameVariableBuffer::new("Matrices", ShaderTypeFlags::VERTEX);
        buffer
            .create_variable("c3d_v3Offset", VariableType::from_name("vec3f").unwrap(), 1)
            .unwrap()
            .set_value(Vec3::new(1.0, 2.0, 3.0), 0)
            .unwrap();
        buffer
            .create_variable("c3d_mtxModel", VariableType::from_name("mat4x4f").unwrap(), 1)
            .unwrap()
            .set_value(Mat4::IDENTITY, 0)
            .unwrap();

        let bytes = buffer.bytes();
        assert_eq!(bytes.len(), 80);
        assert_eq!(&bytes[8..12], &3.0_f32.to_le_bytes());
        assert_eq!(&bytes[16..20], &1.0_f32.to_le_bytes());
        assert_eq!(&bytes[36..40], &1.0_f32.to_le_bytes());
    }
}
