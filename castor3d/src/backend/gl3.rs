use castor3d_types::{BufferComponents, BufferHandle, SampleCount, ShaderObjectHandle, ShaderType, Topology};
use glam::Vec4;

use super::{
    gl2::{self, GlBuffer, GlFrameBuffer, GlNames},
    gl_enums::*,
    software::{self, SoftwareProgram, SoftwareShader},
    BufferDescriptor, Capabilities, CommandRecorder, FrameBufferDescriptor, GpuBackend, RecordedCommand, StageOutput,
};
use crate::{pipeline::PipelineDescriptor, variable::FrameVariable};

/// Programmable OpenGL: loose uniforms by location plus uniform buffer
/// objects bound to block binding points.
#[derive(Debug, Default)]
pub struct Gl3Backend {
    names: GlNames,
}

impl Gl3Backend {
    pub fn new() -> Self {
        Self::default()
    }
}

const fn stage_enum(stage: ShaderType) -> u32 {
    match stage {
        ShaderType::Vertex => 0x8B31,
        ShaderType::Hull => 0x8E88,
        ShaderType::Domain => 0x8E87,
        ShaderType::Geometry => 0x8DD9,
        ShaderType::Pixel => 0x8B30,
        ShaderType::Compute => 0x91B9,
    }
}

impl GpuBackend for Gl3Backend {
    type Buffer = GlBuffer;
    type Shader = SoftwareShader;
    type Program = SoftwareProgram;
    type Pipeline = PipelineDescriptor;
    type FrameBuffer = GlFrameBuffer;

    fn name(&self) -> &'static str {
        "gl3"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            use_shaders: true,
            uniform_buffers: true,
            descriptor_sets: false,
            max_samples: SampleCount::Four,
        }
    }

    fn create_buffer(&mut self, rec: &mut CommandRecorder, desc: &BufferDescriptor) -> GlBuffer {
        gl2::create_buffer(&mut self.names, rec, desc)
    }

    fn write_buffer(&mut self, rec: &mut CommandRecorder, buffer: &mut GlBuffer, offset: usize, data: &[u8]) {
        gl2::write_buffer(rec, buffer, offset, data)
    }

    fn create_shader(&mut self, rec: &mut CommandRecorder, stage: ShaderType) -> Option<SoftwareShader> {
        rec.call("glCreateShader", &[stage_enum(stage)]);
        Some(SoftwareShader {
            stage,
            reflection: None,
        })
    }

    fn compile_shader(&mut self, rec: &mut CommandRecorder, shader: &mut SoftwareShader, source: &str) -> StageOutput {
        rec.call("glCompileShader", &[stage_enum(shader.stage)]);
        match software::compile(shader.stage, source) {
            Ok(reflection) => {
                shader.reflection = Some(reflection);
                StageOutput::ok()
            }
            Err(log) => {
                shader.reflection = None;
                StageOutput::failed(log)
            }
        }
    }

    fn create_program(&mut self, rec: &mut CommandRecorder) -> Option<SoftwareProgram> {
        let id = self.names.generate();
        rec.call("glCreateProgram", &[id]);
        Some(SoftwareProgram::new(id))
    }

    fn attach_shader(
        &mut self,
        rec: &mut CommandRecorder,
        program: &mut SoftwareProgram,
        handle: ShaderObjectHandle,
        shader: &SoftwareShader,
    ) {
        rec.call("glAttachShader", &[program.id, handle.idx as u32]);
        program.attach(handle, shader);
    }

    fn detach_shader(&mut self, rec: &mut CommandRecorder, program: &mut SoftwareProgram, handle: ShaderObjectHandle) {
        rec.call("glDetachShader", &[program.id, handle.idx as u32]);
        program.detach(handle);
    }

    fn link_program(&mut self, rec: &mut CommandRecorder, program: &mut SoftwareProgram) -> StageOutput {
        rec.call("glLinkProgram", &[program.id]);
        program.link()
    }

    fn uniform_location(&self, program: &SoftwareProgram, name: &str) -> Option<u32> {
        program.location(name)
    }

    fn uniform_block_binding(&self, program: &SoftwareProgram, name: &str) -> Option<u32> {
        program.binding(name)
    }

    fn use_program(&mut self, rec: &mut CommandRecorder, program: Option<&SoftwareProgram>) {
        rec.call("glUseProgram", &[program.map_or(0, |p| p.id)]);
    }

    fn write_uniform(
        &mut self,
        rec: &mut CommandRecorder,
        program: &SoftwareProgram,
        location: u32,
        variable: &FrameVariable,
    ) {
        if let Err(message) = program.check_write(location, variable.ty(), variable.occurrences()) {
            rec.push_error(GL_INVALID_OPERATION, message);
            return;
        }
        let Some(call) = uniform_call(variable.ty()) else {
            rec.push_error(GL_INVALID_OPERATION, format!("no uniform call takes a {}", variable.ty()));
            return;
        };
        rec.record(RecordedCommand::WriteUniform {
            call,
            name: variable.name().into(),
            location,
            bytes: variable.packed_bytes(),
        });
    }

    fn bind_uniform_buffer(
        &mut self,
        rec: &mut CommandRecorder,
        program: &SoftwareProgram,
        binding: u32,
        handle: BufferHandle,
        buffer: &GlBuffer,
    ) {
        if binding as usize >= program.blocks.len() {
            rec.push_error(GL_INVALID_VALUE, format!("program {} has no block binding {}", program.id, binding));
            return;
        }
        rec.call("glUniformBlockBinding", &[program.id, binding, binding]);
        rec.call("glBindBufferBase", &[GL_UNIFORM_BUFFER, binding, buffer.id]);
        rec.record(RecordedCommand::BindUniformBuffer {
            call: "glBindBufferBase",
            binding,
            buffer: handle,
        });
    }

    fn create_pipeline(&mut self, _rec: &mut CommandRecorder, desc: &PipelineDescriptor) -> Option<PipelineDescriptor> {
        Some(desc.clone())
    }

    fn bind_pipeline(&mut self, rec: &mut CommandRecorder, pipeline: &PipelineDescriptor) {
        gl2::apply_state(rec, pipeline, true);
    }

    fn create_frame_buffer(&mut self, rec: &mut CommandRecorder, desc: &FrameBufferDescriptor) -> GlFrameBuffer {
        gl2::create_frame_buffer(&mut self.names, rec, desc, SampleCount::Four as u32)
    }

    fn bind_frame_buffer(&mut self, rec: &mut CommandRecorder, frame_buffer: Option<&GlFrameBuffer>) {
        rec.call("glBindFramebuffer", &[GL_FRAMEBUFFER, frame_buffer.map_or(0, |f| f.id)]);
    }

    fn clear(&mut self, rec: &mut CommandRecorder, _colour: Vec4, components: BufferComponents) {
        rec.call("glClear", &[clear_mask(components)]);
    }

    fn blit(
        &mut self,
        rec: &mut CommandRecorder,
        src: &GlFrameBuffer,
        dst: Option<&GlFrameBuffer>,
        components: BufferComponents,
    ) {
        gl2::blit(rec, src, dst, components)
    }

    fn draw(
        &mut self,
        rec: &mut CommandRecorder,
        primitive: Topology,
        vertices: &GlBuffer,
        indices: Option<&GlBuffer>,
        count: u32,
    ) {
        if is_legacy_topology(primitive) {
            rec.push_error(GL_INVALID_ENUM, format!("{:?} isn't available in core profiles", primitive));
            return;
        }
        rec.call("glBindVertexArray", &[vertices.id]);
        match indices {
            Some(indices) => {
                rec.call("glBindBuffer", &[GL_ELEMENT_ARRAY_BUFFER, indices.id]);
                rec.draw("glDrawElements", primitive, count, true);
            }
            None => rec.draw("glDrawArrays", primitive, count, false),
        }
    }
}

#[cfg(test)]
mod tests {
    use castor3d_types::{ElementKind, ShaderType, Topology, VariableType};

    use super::Gl3Backend;
    use crate::{
        backend::{BufferDescriptor, BufferUsage, Device, RecordedCommand, RenderSystem},
        variable::FrameVariable,
        RenderSystemOptions,
    };

    fn device() -> Device<Gl3Backend> {
        let options = RenderSystemOptions {
            record_commands: true,
            ..RenderSystemOptions::default()
        };
        Device::new(Gl3Backend::new(), &options)
    }

    #[test]
    fn uniform_type_mismatch_is_an_api_error() {
        let mut device = device();
        let shader = device.create_shader(ShaderType::Vertex).unwrap();
        assert!(device.compile_shader(shader, "uniform float scale; void main() {}").success);
        let program = device.create_program().unwrap();
        device.attach_shader(program, shader);
        assert!(device.link_program(program).success);

        let location = device.uniform_location(program, "scale").unwrap();
        let wrong = FrameVariable::new("scale", VariableType::scalar(ElementKind::Int), 1);
        device.write_uniform(program, location, &wrong);
        assert!(!device.check_error("uniform_type_mismatch_is_an_api_error"));

        let right = FrameVariable::new("scale", VariableType::scalar(ElementKind::Float), 1);
        device.write_uniform(program, location, &right);
        assert!(device.check_error("uniform_type_mismatch_is_an_api_error"));
        assert!(device.recorder().commands().iter().any(|c| matches!(
            c,
            RecordedCommand::WriteUniform { call: "glUniform1fv", .. }
        )));
    }

    #[test]
    fn quads_are_rejected_in_core_profile() {
        let mut device = device();
        let vertices = device.create_buffer(&BufferDescriptor {
            label: None,
            size: 48,
            usage: BufferUsage::VERTEX,
        });
        device.draw(Topology::Quads, vertices, None, 4);
        assert!(!device.check_error("quads_are_rejected_in_core_profile"));
        device.draw(Topology::Triangles, vertices, None, 3);
        assert_eq!(device.recorder_mut().take_draw_calls(), 1);
    }
}
