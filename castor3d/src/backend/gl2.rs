use std::convert::Infallible;

use castor3d_types::{BufferComponents, BufferHandle, SampleCount, ShaderObjectHandle, ShaderType, Topology};
use glam::Vec4;

use super::{
    gl_enums::*, BufferDescriptor, BufferUsage, Capabilities, CommandRecorder, FrameBufferDescriptor, GpuBackend,
    StageOutput,
};
use crate::{pipeline::PipelineDescriptor, variable::FrameVariable};

#[derive(Debug)]
pub struct GlBuffer {
    pub id: u32,
    pub usage: BufferUsage,
    pub data: Vec<u8>,
}

impl GlBuffer {
    fn target(&self) -> u32 {
        if self.usage.contains(BufferUsage::UNIFORM) {
            GL_UNIFORM_BUFFER
        } else if self.usage.contains(BufferUsage::INDEX) {
            GL_ELEMENT_ARRAY_BUFFER
        } else {
            GL_ARRAY_BUFFER
        }
    }
}

#[derive(Debug)]
pub struct GlFrameBuffer {
    pub id: u32,
    pub desc: FrameBufferDescriptor,
}

#[derive(Debug, Default)]
pub(super) struct GlNames {
    next: u32,
}

impl GlNames {
    pub fn generate(&mut self) -> u32 {
        self.next += 1;
        self.next
    }
}

pub(super) fn create_buffer(names: &mut GlNames, rec: &mut CommandRecorder, desc: &BufferDescriptor) -> GlBuffer {
    let buffer = GlBuffer {
        id: names.generate(),
        usage: desc.usage,
        data: vec![0; desc.size],
    };
    rec.call("glBufferData", &[buffer.target(), desc.size as u32]);
    buffer
}

pub(super) fn write_buffer(rec: &mut CommandRecorder, buffer: &mut GlBuffer, offset: usize, data: &[u8]) {
    let end = offset + data.len();
    if end > buffer.data.len() {
        rec.push_error(
            GL_INVALID_VALUE,
            format!("write of {}..{} past the end of a {} byte buffer", offset, end, buffer.data.len()),
        );
        return;
    }
    buffer.data[offset..end].copy_from_slice(data);
    rec.call("glBufferSubData", &[buffer.target(), offset as u32, data.len() as u32]);
}

fn enable(rec: &mut CommandRecorder, capability: u32, enabled: bool) {
    rec.call(if enabled { "glEnable" } else { "glDisable" }, &[capability]);
}

/// Issues the state calls for a whole pipeline. Without indexed blending only
/// the first target's blend state can be honoured.
pub(super) fn apply_state(rec: &mut CommandRecorder, desc: &PipelineDescriptor, indexed_blend: bool) {
    let ds = &desc.depth_stencil;
    enable(rec, GL_DEPTH_TEST, ds.depth_test);
    if ds.depth_test {
        rec.call("glDepthFunc", &[comparison(ds.depth_func)]);
    }
    rec.call("glDepthMask", &[ds.depth_write as u32]);

    enable(rec, GL_STENCIL_TEST, ds.stencil_test);
    if ds.stencil_test {
        for (face, state) in [(GL_FRONT, &ds.front), (GL_BACK, &ds.back)] {
            rec.call(
                "glStencilFuncSeparate",
                &[face, comparison(state.func), ds.stencil_ref, ds.stencil_read_mask],
            );
            rec.call(
                "glStencilOpSeparate",
                &[face, stencil_op(state.fail), stencil_op(state.depth_fail), stencil_op(state.pass)],
            );
        }
        rec.call("glStencilMask", &[ds.stencil_write_mask]);
    }

    let rs = &desc.rasteriser;
    rec.call("glPolygonMode", &[GL_FRONT_AND_BACK, fill_mode(rs.fill_mode)]);
    match cull_face(rs.cull_mode) {
        Some(face) => {
            enable(rec, GL_CULL_FACE, true);
            rec.call("glCullFace", &[face]);
        }
        None => enable(rec, GL_CULL_FACE, false),
    }
    rec.call("glFrontFace", &[if rs.front_ccw { GL_CCW } else { GL_CW }]);
    enable(rec, GL_DEPTH_CLAMP, !rs.depth_clipping);
    enable(rec, GL_SCISSOR_TEST, rs.scissor);
    enable(rec, GL_POLYGON_OFFSET_FILL, rs.depth_bias != 0.0);

    let ms = &desc.multisample;
    enable(rec, GL_MULTISAMPLE, rs.multisample || ms.samples.needs_resolve());
    enable(rec, GL_SAMPLE_ALPHA_TO_COVERAGE, ms.alpha_to_coverage);

    let blend = &desc.blend;
    enable(rec, GL_BLEND, blend.targets.iter().any(|t| t.enabled));
    if blend.independent && indexed_blend {
        for (index, target) in blend.targets.iter().enumerate() {
            let index = index as u32;
            rec.call(
                "glBlendFuncSeparatei",
                &[
                    index,
                    blend_operand(target.src),
                    blend_operand(target.dst),
                    blend_operand(target.alpha_src),
                    blend_operand(target.alpha_dst),
                ],
            );
            rec.call(
                "glBlendEquationSeparatei",
                &[index, blend_operation(target.op), blend_operation(target.alpha_op)],
            );
        }
    } else {
        if blend.independent {
            rec.push_error(GL_INVALID_OPERATION, "independent blending isn't available, using the first target");
        }
        if let Some(target) = blend.targets.first() {
            rec.call(
                "glBlendFuncSeparate",
                &[
                    blend_operand(target.src),
                    blend_operand(target.dst),
                    blend_operand(target.alpha_src),
                    blend_operand(target.alpha_dst),
                ],
            );
            rec.call(
                "glBlendEquationSeparate",
                &[blend_operation(target.op), blend_operation(target.alpha_op)],
            );
        }
    }
}

pub(super) fn create_frame_buffer(
    names: &mut GlNames,
    rec: &mut CommandRecorder,
    desc: &FrameBufferDescriptor,
    max_samples: u32,
) -> GlFrameBuffer {
    let samples = desc.samples as u32;
    if samples > max_samples {
        rec.push_error(
            GL_INVALID_VALUE,
            format!("{} samples requested, the context supports {}", samples, max_samples),
        );
    }
    let samples = samples.min(max_samples);
    for &format in desc.attachments.iter().chain(desc.depth.iter()) {
        rec.call(
            "glRenderbufferStorageMultisample",
            &[samples, internal_format(format), desc.size.x, desc.size.y],
        );
    }
    GlFrameBuffer {
        id: names.generate(),
        desc: desc.clone(),
    }
}

pub(super) fn blit(
    rec: &mut CommandRecorder,
    src: &GlFrameBuffer,
    dst: Option<&GlFrameBuffer>,
    components: BufferComponents,
) {
    if !src.desc.components().contains(components) {
        rec.push_error(
            GL_INVALID_OPERATION,
            format!("blit of {:?} from a target holding {:?}", components, src.desc.components()),
        );
        return;
    }
    let size = src.desc.size;
    rec.call("glBindFramebuffer", &[GL_READ_FRAMEBUFFER, src.id]);
    rec.call("glBindFramebuffer", &[GL_DRAW_FRAMEBUFFER, dst.map_or(0, |d| d.id)]);
    rec.call(
        "glBlitFramebuffer",
        &[0, 0, size.x, size.y, 0, 0, size.x, size.y, clear_mask(components), GL_NEAREST],
    );
}

/// Fixed function OpenGL. Has no programs: shaders and uniforms are refused
/// before they reach it, and its program types are uninhabited.
#[derive(Debug, Default)]
pub struct Gl2Backend {
    names: GlNames,
}

impl Gl2Backend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl GpuBackend for Gl2Backend {
    type Buffer = GlBuffer;
    type Shader = Infallible;
    type Program = Infallible;
    type Pipeline = PipelineDescriptor;
    type FrameBuffer = GlFrameBuffer;

    fn name(&self) -> &'static str {
        "gl2"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            use_shaders: false,
            uniform_buffers: false,
            descriptor_sets: false,
            max_samples: SampleCount::One,
        }
    }

    fn create_buffer(&mut self, rec: &mut CommandRecorder, desc: &BufferDescriptor) -> GlBuffer {
        create_buffer(&mut self.names, rec, desc)
    }

    fn write_buffer(&mut self, rec: &mut CommandRecorder, buffer: &mut GlBuffer, offset: usize, data: &[u8]) {
        write_buffer(rec, buffer, offset, data)
    }

    fn create_shader(&mut self, _rec: &mut CommandRecorder, _stage: ShaderType) -> Option<Infallible> {
        None
    }

    fn compile_shader(&mut self, _rec: &mut CommandRecorder, shader: &mut Infallible, _source: &str) -> StageOutput {
        match *shader {}
    }

    fn create_program(&mut self, _rec: &mut CommandRecorder) -> Option<Infallible> {
        None
    }

    fn attach_shader(
        &mut self,
        _rec: &mut CommandRecorder,
        program: &mut Infallible,
        _handle: ShaderObjectHandle,
        _shader: &Infallible,
    ) {
        match *program {}
    }

    fn detach_shader(&mut self, _rec: &mut CommandRecorder, program: &mut Infallible, _handle: ShaderObjectHandle) {
        match *program {}
    }

    fn link_program(&mut self, _rec: &mut CommandRecorder, program: &mut Infallible) -> StageOutput {
        match *program {}
    }

    fn uniform_location(&self, program: &Infallible, _name: &str) -> Option<u32> {
        match *program {}
    }

    fn uniform_block_binding(&self, program: &Infallible, _name: &str) -> Option<u32> {
        match *program {}
    }

    fn use_program(&mut self, _rec: &mut CommandRecorder, program: Option<&Infallible>) {
        if let Some(program) = program {
            match *program {}
        }
    }

    fn write_uniform(
        &mut self,
        _rec: &mut CommandRecorder,
        program: &Infallible,
        _location: u32,
        _variable: &FrameVariable,
    ) {
        match *program {}
    }

    fn bind_uniform_buffer(
        &mut self,
        _rec: &mut CommandRecorder,
        program: &Infallible,
        _binding: u32,
        _handle: BufferHandle,
        _buffer: &GlBuffer,
    ) {
        match *program {}
    }

    fn create_pipeline(&mut self, _rec: &mut CommandRecorder, desc: &PipelineDescriptor) -> Option<PipelineDescriptor> {
        Some(desc.clone())
    }

    fn bind_pipeline(&mut self, rec: &mut CommandRecorder, pipeline: &PipelineDescriptor) {
        apply_state(rec, pipeline, false);
    }

    fn create_frame_buffer(&mut self, rec: &mut CommandRecorder, desc: &FrameBufferDescriptor) -> GlFrameBuffer {
        create_frame_buffer(&mut self.names, rec, desc, 1)
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
        blit(rec, src, dst, components)
    }

    fn draw(
        &mut self,
        rec: &mut CommandRecorder,
        topology: Topology,
        vertices: &GlBuffer,
        indices: Option<&GlBuffer>,
        count: u32,
    ) {
        rec.call("glBindBuffer", &[GL_ARRAY_BUFFER, vertices.id]);
        match indices {
            Some(indices) => {
                rec.call("glBindBuffer", &[GL_ELEMENT_ARRAY_BUFFER, indices.id]);
                rec.draw("glDrawElements", topology, count, true);
            }
            None => {
                rec.draw("glDrawArrays", topology, count, false);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use castor3d_types::ShaderType;

    use super::Gl2Backend;
    use crate::{
        backend::{Device, RecordedCommand, RenderSystem},
        pipeline::PipelineDescriptor,
        RenderSystemOptions,
    };

    #[test]
    fn shaders_are_refused() {
        let mut device = Device::new(Gl2Backend::new(), &RenderSystemOptions::default());
        assert!(!device.use_shaders());
        assert_eq!(device.create_shader(ShaderType::Vertex), None);
        assert_eq!(device.create_program(), None);
    }

    #[test]
    fn pipeline_state_goes_through_enables() {
        let options = RenderSystemOptions {
            record_commands: true,
            ..RenderSystemOptions::default()
        };
        let mut device = Device::new(Gl2Backend::new(), &options);
        let pipeline = device.create_pipeline(&PipelineDescriptor::default()).unwrap();
        device.bind_pipeline(pipeline);
        let commands = device.recorder().commands();
        assert!(commands.iter().any(|c| matches!(
            c,
            RecordedCommand::Call { call: "glEnable", args } if args[0] == super::GL_DEPTH_TEST
        )));
        assert_eq!(commands.last(), Some(&RecordedCommand::BindPipeline { pipeline }));
    }
}
