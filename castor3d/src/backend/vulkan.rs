use arrayvec::ArrayVec;
use castor3d_types::{
    BlendOperand, BlendOperation, BufferComponents, BufferHandle, SampleCount, ShaderObjectHandle, ShaderType, Topology,
};
use glam::Vec4;

use super::{
    software::{self, SoftwareProgram, SoftwareShader},
    BufferDescriptor, Capabilities, CommandRecorder, FrameBufferDescriptor, GpuBackend, RecordedCommand, StageOutput,
};
use crate::{
    pipeline::{PipelineDescriptor, RenderTargetBlend, StencilFaceState},
    variable::FrameVariable,
};

const VALIDATION_FAILED: &str = "VK_ERROR_VALIDATION_FAILED_EXT";
const FORMAT_NOT_SUPPORTED: &str = "VK_ERROR_FORMAT_NOT_SUPPORTED";

#[derive(Debug)]
pub struct VkBuffer {
    pub id: u32,
    pub data: Vec<u8>,
}

#[derive(Debug)]
pub struct VkFrameBuffer {
    pub id: u32,
    pub desc: FrameBufferDescriptor,
}

/// Baked pipeline state, translated once at creation.
#[derive(Debug, Clone)]
pub struct VkPipeline {
    pub id: u32,
    pub primitive: wgt::PrimitiveState,
    pub depth_stencil: Option<wgt::DepthStencilState>,
    pub multisample: wgt::MultisampleState,
    pub targets: ArrayVec<Option<wgt::ColorTargetState>, 8>,
}

fn blend_component(src: BlendOperand, dst: BlendOperand, op: BlendOperation) -> wgt::BlendComponent {
    wgt::BlendComponent {
        src_factor: src.into(),
        dst_factor: dst.into(),
        operation: op.into(),
    }
}

fn colour_target(format: wgt::TextureFormat, blend: &RenderTargetBlend) -> wgt::ColorTargetState {
    wgt::ColorTargetState {
        format,
        blend: blend.enabled.then(|| wgt::BlendState {
            color: blend_component(blend.src, blend.dst, blend.op),
            alpha: blend_component(blend.alpha_src, blend.alpha_dst, blend.alpha_op),
        }),
        write_mask: wgt::ColorWrites::from_bits_truncate(blend.write_mask as u32),
    }
}

fn stencil_face(state: &StencilFaceState) -> wgt::StencilFaceState {
    wgt::StencilFaceState {
        compare: state.func.into(),
        fail_op: state.fail.into(),
        depth_fail_op: state.depth_fail.into(),
        pass_op: state.pass.into(),
    }
}

/// Translates a descriptor into baked state. Fails on formats and topologies
/// the api has no equivalent for.
fn bake(id: u32, desc: &PipelineDescriptor) -> Result<VkPipeline, String> {
    let topology = desc
        .topology
        .to_wgt()
        .ok_or_else(|| format!("{:?} has no pipeline topology", desc.topology))?;

    let rs = &desc.rasteriser;
    let primitive = wgt::PrimitiveState {
        topology,
        strip_index_format: None,
        front_face: if rs.front_ccw {
            wgt::FrontFace::Ccw
        } else {
            wgt::FrontFace::Cw
        },
        cull_mode: rs.cull_mode.to_wgt(),
        unclipped_depth: !rs.depth_clipping,
        polygon_mode: rs.fill_mode.into(),
        conservative: false,
    };

    let ds = &desc.depth_stencil;
    let depth_stencil = match desc.depth_format {
        Some(format) => Some(wgt::DepthStencilState {
            format: format
                .to_wgt()
                .ok_or_else(|| format!("{:?} has no depth format", format))?,
            depth_write_enabled: ds.depth_write,
            depth_compare: if ds.depth_test {
                ds.depth_func.into()
            } else {
                wgt::CompareFunction::Always
            },
            stencil: if ds.stencil_test {
                wgt::StencilState {
                    front: stencil_face(&ds.front),
                    back: stencil_face(&ds.back),
                    read_mask: ds.stencil_read_mask,
                    write_mask: ds.stencil_write_mask,
                }
            } else {
                wgt::StencilState::default()
            },
            bias: wgt::DepthBiasState {
                constant: rs.depth_bias as i32,
                slope_scale: 0.0,
                clamp: 0.0,
            },
        }),
        None => None,
    };

    let mut targets = ArrayVec::new();
    for (index, &format) in desc.colour_formats.iter().enumerate() {
        let format = format.to_wgt().ok_or_else(|| format!("{:?} has no colour format", format))?;
        let blend = if desc.blend.independent {
            desc.blend.targets.get(index)
        } else {
            desc.blend.targets.first()
        };
        targets.push(Some(colour_target(format, blend.unwrap_or(&RenderTargetBlend::default()))));
    }

    Ok(VkPipeline {
        id,
        primitive,
        depth_stencil,
        multisample: wgt::MultisampleState {
            count: desc.multisample.samples as u32,
            mask: !0,
            alpha_to_coverage_enabled: desc.multisample.alpha_to_coverage,
        },
        targets,
    })
}

/// Offset of the loose uniform at `location` inside the push constant range,
/// every uniform laid out after the previous one with std140 rules.
fn push_constant_offset(program: &SoftwareProgram, location: u32) -> usize {
    let mut offset = 0;
    for (index, decl) in program.uniforms.values().enumerate() {
        let layout = decl.ty.std140(decl.occurrences);
        offset = (offset + layout.align - 1) / layout.align * layout.align;
        if index == location as usize {
            break;
        }
        offset += layout.size;
    }
    offset
}

/// Descriptor based api: loose uniforms are push constants, uniform blocks are
/// descriptor set bindings, state is baked into pipelines.
#[derive(Debug, Default)]
pub struct VulkanBackend {
    next_id: u32,
}

impl VulkanBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn generate(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }
}

impl GpuBackend for VulkanBackend {
    type Buffer = VkBuffer;
    type Shader = SoftwareShader;
    type Program = SoftwareProgram;
    type Pipeline = VkPipeline;
    type FrameBuffer = VkFrameBuffer;

    fn name(&self) -> &'static str {
        "vulkan"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            use_shaders: true,
            uniform_buffers: true,
            descriptor_sets: true,
            max_samples: SampleCount::Four,
        }
    }

    fn create_buffer(&mut self, rec: &mut CommandRecorder, desc: &BufferDescriptor) -> VkBuffer {
        let id = self.generate();
        rec.call("vkCreateBuffer", &[id, desc.size as u32]);
        VkBuffer {
            id,
            data: vec![0; desc.size],
        }
    }

    fn write_buffer(&mut self, rec: &mut CommandRecorder, buffer: &mut VkBuffer, offset: usize, data: &[u8]) {
        let end = offset + data.len();
        if end > buffer.data.len() {
            rec.push_error(
                VALIDATION_FAILED,
                format!("update of {}..{} exceeds buffer {} of {} bytes", offset, end, buffer.id, buffer.data.len()),
            );
            return;
        }
        buffer.data[offset..end].copy_from_slice(data);
        rec.call("vkCmdUpdateBuffer", &[buffer.id, offset as u32, data.len() as u32]);
    }

    fn create_shader(&mut self, rec: &mut CommandRecorder, stage: ShaderType) -> Option<SoftwareShader> {
        rec.call("vkCreateShaderModule", &[stage.index() as u32]);
        Some(SoftwareShader {
            stage,
            reflection: None,
        })
    }

    fn compile_shader(&mut self, _rec: &mut CommandRecorder, shader: &mut SoftwareShader, source: &str) -> StageOutput {
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

    fn create_program(&mut self, _rec: &mut CommandRecorder) -> Option<SoftwareProgram> {
        Some(SoftwareProgram::new(self.generate()))
    }

    fn attach_shader(
        &mut self,
        _rec: &mut CommandRecorder,
        program: &mut SoftwareProgram,
        handle: ShaderObjectHandle,
        shader: &SoftwareShader,
    ) {
        program.attach(handle, shader);
    }

    fn detach_shader(&mut self, _rec: &mut CommandRecorder, program: &mut SoftwareProgram, handle: ShaderObjectHandle) {
        program.detach(handle);
    }

    fn link_program(&mut self, rec: &mut CommandRecorder, program: &mut SoftwareProgram) -> StageOutput {
        let output = program.link();
        if output.success {
            rec.call(
                "vkCreatePipelineLayout",
                &[program.id, program.blocks.len() as u32, program.uniforms.len() as u32],
            );
        }
        output
    }

    fn uniform_location(&self, program: &SoftwareProgram, name: &str) -> Option<u32> {
        program.location(name)
    }

    fn uniform_block_binding(&self, program: &SoftwareProgram, name: &str) -> Option<u32> {
        program.binding(name)
    }

    fn use_program(&mut self, _rec: &mut CommandRecorder, _program: Option<&SoftwareProgram>) {
        // Programs are part of the pipeline object.
    }

    fn write_uniform(
        &mut self,
        rec: &mut CommandRecorder,
        program: &SoftwareProgram,
        location: u32,
        variable: &FrameVariable,
    ) {
        if let Err(message) = program.check_write(location, variable.ty(), variable.occurrences()) {
            rec.push_error(VALIDATION_FAILED, message);
            return;
        }
        let mut bytes = vec![0; variable.ty().std140(variable.occurrences()).size];
        variable.write_std140(&mut bytes);
        rec.record(RecordedCommand::WriteUniform {
            call: "vkCmdPushConstants",
            name: variable.name().into(),
            location: push_constant_offset(program, location) as u32,
            bytes,
        });
    }

    fn bind_uniform_buffer(
        &mut self,
        rec: &mut CommandRecorder,
        program: &SoftwareProgram,
        binding: u32,
        handle: BufferHandle,
        buffer: &VkBuffer,
    ) {
        if binding as usize >= program.blocks.len() {
            rec.push_error(
                VALIDATION_FAILED,
                format!("pipeline layout {} has no binding {}", program.id, binding),
            );
            return;
        }
        rec.call("vkCmdBindDescriptorSets", &[program.id, binding, buffer.id]);
        rec.record(RecordedCommand::BindUniformBuffer {
            call: "vkUpdateDescriptorSets",
            binding,
            buffer: handle,
        });
    }

    fn create_pipeline(&mut self, rec: &mut CommandRecorder, desc: &PipelineDescriptor) -> Option<VkPipeline> {
        let id = self.generate();
        match bake(id, desc) {
            Ok(pipeline) => {
                rec.call("vkCreateGraphicsPipelines", &[id]);
                Some(pipeline)
            }
            Err(message) => {
                log::error!("Pipeline {:?} can't be created: {}", desc.label, message);
                rec.push_error(FORMAT_NOT_SUPPORTED, message);
                None
            }
        }
    }

    fn bind_pipeline(&mut self, rec: &mut CommandRecorder, pipeline: &VkPipeline) {
        rec.call("vkCmdBindPipeline", &[pipeline.id]);
    }

    fn create_frame_buffer(&mut self, rec: &mut CommandRecorder, desc: &FrameBufferDescriptor) -> VkFrameBuffer {
        let id = self.generate();
        for &format in desc.attachments.iter().chain(desc.depth.iter()) {
            if format.to_wgt().is_none() {
                rec.push_error(FORMAT_NOT_SUPPORTED, format!("{:?} can't be an attachment", format));
            }
        }
        rec.call("vkCreateFramebuffer", &[id, desc.size.x, desc.size.y, desc.samples as u32]);
        VkFrameBuffer { id, desc: desc.clone() }
    }

    fn bind_frame_buffer(&mut self, rec: &mut CommandRecorder, frame_buffer: Option<&VkFrameBuffer>) {
        rec.call("vkCmdBeginRenderPass", &[frame_buffer.map_or(0, |f| f.id)]);
    }

    fn clear(&mut self, rec: &mut CommandRecorder, _colour: Vec4, components: BufferComponents) {
        rec.call("vkCmdClearAttachments", &[components.bits() as u32]);
    }

    fn blit(
        &mut self,
        rec: &mut CommandRecorder,
        src: &VkFrameBuffer,
        dst: Option<&VkFrameBuffer>,
        components: BufferComponents,
    ) {
        if !src.desc.components().contains(components) {
            rec.push_error(
                VALIDATION_FAILED,
                format!("copy of {:?} from a framebuffer holding {:?}", components, src.desc.components()),
            );
            return;
        }
        let call = if src.desc.samples.needs_resolve() {
            "vkCmdResolveImage"
        } else {
            "vkCmdBlitImage"
        };
        rec.call(call, &[src.id, dst.map_or(0, |d| d.id), components.bits() as u32]);
    }

    fn draw(
        &mut self,
        rec: &mut CommandRecorder,
        topology: Topology,
        vertices: &VkBuffer,
        indices: Option<&VkBuffer>,
        count: u32,
    ) {
        if topology.to_wgt().is_none() {
            log::error!("{:?} can't be drawn with the vulkan render system, skipping draw", topology);
            return;
        }
        rec.call("vkCmdBindVertexBuffers", &[vertices.id]);
        match indices {
            Some(indices) => {
                rec.call("vkCmdBindIndexBuffer", &[indices.id]);
                rec.draw("vkCmdDrawIndexed", topology, count, true);
            }
            None => rec.draw("vkCmdDraw", topology, count, false),
        }
    }
}

#[cfg(test)]
mod tests {
    use castor3d_types::{PixelFormat, ShaderType, Topology, VariableType};
    use glam::Vec3;

    use super::VulkanBackend;
    use crate::{
        backend::{Device, RecordedCommand, RenderSystem},
        pipeline::{BlendState, PipelineDescriptor},
        variable::FrameVariable,
        RenderSystemOptions,
    };

    fn device() -> Device<VulkanBackend> {
        let options = RenderSystemOptions {
            record_commands: true,
            ..RenderSystemOptions::default()
        };
        Device::new(VulkanBackend::new(), &options)
    }

    #[test]
    fn loose_uniforms_become_push_constants() {
        let mut device = device();
        let shader = device.create_shader(ShaderType::Vertex).unwrap();
        let source = "uniform float a; uniform vec3 b; void main() {}";
        assert!(device.compile_shader(shader, source).success);
        let program = device.create_program().unwrap();
        device.attach_shader(program, shader);
        assert!(device.link_program(program).success);

        let mut b = FrameVariable::new("b", VariableType::from_name("vec3f").unwrap(), 1);
        b.set_value(Vec3::ONE, 0).unwrap();
        let location = device.uniform_location(program, "b").unwrap();
        device.write_uniform(program, location, &b);

        let written = device.recorder().commands().iter().find_map(|c| match c {
            RecordedCommand::WriteUniform { call, location, bytes, .. } => Some((*call, *location, bytes.len())),
            _ => None,
        });
        // vec3 aligns to 16 bytes after the leading float
        assert_eq!(written, Some(("vkCmdPushConstants", 16, 12)));
    }

    #[test]
    fn unsupported_state_fails_pipeline_creation() {
        let mut device = device();
        let desc = PipelineDescriptor {
            topology: Topology::Quads,
            ..PipelineDescriptor::default()
        };
        assert_eq!(device.create_pipeline(&desc), None);

        let desc = PipelineDescriptor {
            colour_formats: [PixelFormat::RGBA16F, PixelFormat::R16F].into_iter().collect(),
            blend: BlendState::weighted_blend(),
            ..PipelineDescriptor::default()
        };
        assert!(device.create_pipeline(&desc).is_some());
    }
}
