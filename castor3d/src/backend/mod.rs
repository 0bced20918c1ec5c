//! Render system abstraction.
//!
//! Every layer above this module talks to the object safe [`RenderSystem`]
//! through typed handles. Concrete apis implement [`GpuBackend`], whose
//! associated types are the native objects, and get wrapped in a
//! [`Device`] which owns those objects and hands out the handles.
//!
//! The bundled backends don't reach a driver: they validate and reflect
//! shader sources in software and record what they would issue into a
//! [`CommandRecorder`].

use arrayvec::ArrayVec;
use bitflags::bitflags;
use castor3d_types::{
    BufferComponents, BufferHandle, FrameBufferHandle, PipelineHandle, PixelFormat, ProgramHandle, SampleCount,
    ShaderObjectHandle, ShaderType, Topology,
};
use glam::{UVec2, Vec4};
use smallvec::SmallVec;

use crate::{
    pipeline::PipelineDescriptor,
    util::{freelist::FreelistVec, typedefs::SsoString},
    variable::FrameVariable,
    RenderSystemOptions,
};

pub mod gl_enums;
mod gl2;
mod gl3;
mod registry;
mod software;
mod vulkan;

pub use gl2::Gl2Backend;
pub use gl3::Gl3Backend;
pub use registry::*;
pub use software::{glsl_type, BlockDecl, UniformDecl};
pub use vulkan::VulkanBackend;

/// What a render system can do.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Capabilities {
    /// Programmable pipeline. When false every shader related call is
    /// refused and passes fall back to fixed function state.
    pub use_shaders: bool,
    /// Uniform blocks can be backed by buffers.
    pub uniform_buffers: bool,
    /// Resources are bound through descriptor sets rather than binding points.
    pub descriptor_sets: bool,
    pub max_samples: SampleCount,
}

bitflags! {
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
    pub struct BufferUsage: u8 {
        const VERTEX = 1 << 0;
        const INDEX = 1 << 1;
        const UNIFORM = 1 << 2;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferDescriptor {
    pub label: Option<SsoString>,
    pub size: usize,
    pub usage: BufferUsage,
}

/// Off screen render target made of colour attachments and an optional
/// depth attachment, all sharing one size and sample count.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FrameBufferDescriptor {
    pub label: Option<SsoString>,
    pub size: UVec2,
    pub samples: SampleCount,
    pub attachments: ArrayVec<PixelFormat, 8>,
    pub depth: Option<PixelFormat>,
}

impl FrameBufferDescriptor {
    /// Which buffers a blit from or to this target can touch.
    pub fn components(&self) -> BufferComponents {
        let mut components = BufferComponents::empty();
        if !self.attachments.is_empty() {
            components |= BufferComponents::COLOUR;
        }
        if let Some(depth) = self.depth {
            components |= depth.components();
        }
        components
    }
}

/// Result of compiling a stage or linking a program.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StageOutput {
    pub success: bool,
    pub log: String,
}

impl StageOutput {
    pub fn ok() -> Self {
        Self {
            success: true,
            log: String::new(),
        }
    }

    pub fn failed(log: impl Into<String>) -> Self {
        Self {
            success: false,
            log: log.into(),
        }
    }
}

/// One call a render system issued, kept when command recording is enabled.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCommand {
    SetCurrent,
    EndCurrent,
    SwapBuffers,
    CreateBuffer {
        buffer: BufferHandle,
        size: usize,
    },
    WriteBuffer {
        buffer: BufferHandle,
        offset: usize,
        size: usize,
    },
    CreateFrameBuffer {
        frame_buffer: FrameBufferHandle,
        samples: SampleCount,
    },
    UseProgram {
        program: Option<ProgramHandle>,
    },
    BindPipeline {
        pipeline: PipelineHandle,
    },
    BindFrameBuffer {
        frame_buffer: Option<FrameBufferHandle>,
    },
    Clear {
        colour: Vec4,
        components: BufferComponents,
    },
    Blit {
        src: FrameBufferHandle,
        dst: Option<FrameBufferHandle>,
        components: BufferComponents,
    },
    /// A loose uniform write. `location` is a byte offset on apis without
    /// uniform locations.
    WriteUniform {
        call: &'static str,
        name: SsoString,
        location: u32,
        bytes: Vec<u8>,
    },
    BindUniformBuffer {
        call: &'static str,
        binding: u32,
        buffer: BufferHandle,
    },
    Draw {
        call: &'static str,
        topology: Topology,
        count: u32,
        indexed: bool,
    },
    /// Any other native call, with its integer arguments.
    Call {
        call: &'static str,
        args: SmallVec<[u32; 4]>,
    },
}

/// A native error waiting to be reported by [`RenderSystem::check_error`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendError {
    pub code: &'static str,
    pub message: String,
}

/// Sink for everything a backend issues.
///
/// Native errors are queued, the way `glGetError` accumulates them, and only
/// reported when someone checks.
#[derive(Debug, Default)]
pub struct CommandRecorder {
    recording: bool,
    commands: Vec<RecordedCommand>,
    errors: Vec<BackendError>,
    draw_calls: u32,
}

impl CommandRecorder {
    pub fn new(recording: bool) -> Self {
        Self {
            recording,
            ..Self::default()
        }
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }

    pub fn set_recording(&mut self, recording: bool) {
        self.recording = recording;
    }

    pub fn record(&mut self, command: RecordedCommand) {
        if self.recording {
            self.commands.push(command);
        }
    }

    pub fn call(&mut self, call: &'static str, args: &[u32]) {
        if self.recording {
            self.commands.push(RecordedCommand::Call {
                call,
                args: SmallVec::from_slice(args),
            });
        }
    }

    pub fn draw(&mut self, call: &'static str, topology: Topology, count: u32, indexed: bool) {
        self.draw_calls += 1;
        self.record(RecordedCommand::Draw {
            call,
            topology,
            count,
            indexed,
        });
    }

    pub fn push_error(&mut self, code: &'static str, message: impl Into<String>) {
        self.errors.push(BackendError {
            code,
            message: message.into(),
        });
    }

    pub fn commands(&self) -> &[RecordedCommand] {
        &self.commands
    }

    pub fn take_commands(&mut self) -> Vec<RecordedCommand> {
        std::mem::take(&mut self.commands)
    }

    pub fn pending_errors(&self) -> &[BackendError] {
        &self.errors
    }

    pub fn take_draw_calls(&mut self) -> u32 {
        std::mem::take(&mut self.draw_calls)
    }

    /// Logs and clears every queued error, tagged with `call_site`. Returns
    /// true if there were none.
    pub fn check_error(&mut self, call_site: &str) -> bool {
        if self.errors.is_empty() {
            return true;
        }
        for error in self.errors.drain(..) {
            log::error!("{}: {} ({})", call_site, error.message, error.code);
        }
        false
    }
}

/// A graphics api.
///
/// Implementations own nothing but api wide state; every object they create
/// is returned to the [`Device`] which stores it behind a handle.
pub trait GpuBackend: Send + 'static {
    type Buffer: Send;
    type Shader: Send;
    type Program: Send;
    type Pipeline: Send;
    type FrameBuffer: Send;

    fn name(&self) -> &'static str;
    fn capabilities(&self) -> Capabilities;

    fn create_buffer(&mut self, rec: &mut CommandRecorder, desc: &BufferDescriptor) -> Self::Buffer;
    fn write_buffer(&mut self, rec: &mut CommandRecorder, buffer: &mut Self::Buffer, offset: usize, data: &[u8]);

    fn create_shader(&mut self, rec: &mut CommandRecorder, stage: ShaderType) -> Option<Self::Shader>;
    fn compile_shader(&mut self, rec: &mut CommandRecorder, shader: &mut Self::Shader, source: &str) -> StageOutput;
    fn create_program(&mut self, rec: &mut CommandRecorder) -> Option<Self::Program>;
    fn attach_shader(
        &mut self,
        rec: &mut CommandRecorder,
        program: &mut Self::Program,
        handle: ShaderObjectHandle,
        shader: &Self::Shader,
    );
    fn detach_shader(&mut self, rec: &mut CommandRecorder, program: &mut Self::Program, handle: ShaderObjectHandle);
    fn link_program(&mut self, rec: &mut CommandRecorder, program: &mut Self::Program) -> StageOutput;
    fn uniform_location(&self, program: &Self::Program, name: &str) -> Option<u32>;
    fn uniform_block_binding(&self, program: &Self::Program, name: &str) -> Option<u32>;
    fn use_program(&mut self, rec: &mut CommandRecorder, program: Option<&Self::Program>);
    fn write_uniform(
        &mut self,
        rec: &mut CommandRecorder,
        program: &Self::Program,
        location: u32,
        variable: &FrameVariable,
    );
    fn bind_uniform_buffer(
        &mut self,
        rec: &mut CommandRecorder,
        program: &Self::Program,
        binding: u32,
        handle: BufferHandle,
        buffer: &Self::Buffer,
    );

    fn create_pipeline(&mut self, rec: &mut CommandRecorder, desc: &PipelineDescriptor) -> Option<Self::Pipeline>;
    fn bind_pipeline(&mut self, rec: &mut CommandRecorder, pipeline: &Self::Pipeline);

    fn create_frame_buffer(&mut self, rec: &mut CommandRecorder, desc: &FrameBufferDescriptor) -> Self::FrameBuffer;
    fn bind_frame_buffer(&mut self, rec: &mut CommandRecorder, frame_buffer: Option<&Self::FrameBuffer>);
    fn clear(&mut self, rec: &mut CommandRecorder, colour: Vec4, components: BufferComponents);
    fn blit(
        &mut self,
        rec: &mut CommandRecorder,
        src: &Self::FrameBuffer,
        dst: Option<&Self::FrameBuffer>,
        components: BufferComponents,
    );
    fn draw(
        &mut self,
        rec: &mut CommandRecorder,
        topology: Topology,
        vertices: &Self::Buffer,
        indices: Option<&Self::Buffer>,
        count: u32,
    );
}

/// Object safe face of a [`Device`], used by everything above the backends.
///
/// Calls taking a stale or foreign handle log an error and do nothing; gpu
/// work is best effort and never aborts a frame.
pub trait RenderSystem: Send {
    fn name(&self) -> &str;
    fn capabilities(&self) -> Capabilities;
    fn size(&self) -> UVec2;

    /// Whether the programmable pipeline is available. Must be checked before
    /// any shader related call.
    fn use_shaders(&self) -> bool {
        self.capabilities().use_shaders
    }

    fn set_current(&mut self);
    fn end_current(&mut self);
    fn is_current(&self) -> bool;
    fn swap_buffers(&mut self);

    fn create_buffer(&mut self, desc: &BufferDescriptor) -> BufferHandle;
    fn write_buffer(&mut self, buffer: BufferHandle, offset: usize, data: &[u8]);
    fn destroy_buffer(&mut self, buffer: BufferHandle);

    fn create_shader(&mut self, stage: ShaderType) -> Option<ShaderObjectHandle>;
    fn compile_shader(&mut self, shader: ShaderObjectHandle, source: &str) -> StageOutput;
    fn destroy_shader(&mut self, shader: ShaderObjectHandle);
    fn create_program(&mut self) -> Option<ProgramHandle>;
    fn attach_shader(&mut self, program: ProgramHandle, shader: ShaderObjectHandle);
    fn detach_shader(&mut self, program: ProgramHandle, shader: ShaderObjectHandle);
    fn link_program(&mut self, program: ProgramHandle) -> StageOutput;
    fn uniform_location(&self, program: ProgramHandle, name: &str) -> Option<u32>;
    fn uniform_block_binding(&self, program: ProgramHandle, name: &str) -> Option<u32>;
    fn use_program(&mut self, program: Option<ProgramHandle>);
    fn write_uniform(&mut self, program: ProgramHandle, location: u32, variable: &FrameVariable);
    fn bind_uniform_buffer(&mut self, program: ProgramHandle, binding: u32, buffer: BufferHandle);
    fn destroy_program(&mut self, program: ProgramHandle);

    fn create_pipeline(&mut self, desc: &PipelineDescriptor) -> Option<PipelineHandle>;
    fn bind_pipeline(&mut self, pipeline: PipelineHandle);
    fn destroy_pipeline(&mut self, pipeline: PipelineHandle);

    fn create_frame_buffer(&mut self, desc: &FrameBufferDescriptor) -> FrameBufferHandle;
    /// Binds an off screen target, or the window surface for `None`.
    fn bind_frame_buffer(&mut self, frame_buffer: Option<FrameBufferHandle>);
    fn clear(&mut self, colour: Vec4, components: BufferComponents);
    fn blit(&mut self, src: FrameBufferHandle, dst: Option<FrameBufferHandle>, components: BufferComponents);
    fn destroy_frame_buffer(&mut self, frame_buffer: FrameBufferHandle);

    fn draw(&mut self, topology: Topology, vertices: BufferHandle, indices: Option<BufferHandle>, count: u32);

    /// Reports queued native errors. Returns true if there were none.
    fn check_error(&mut self, call_site: &str) -> bool;
    fn recorder(&self) -> &CommandRecorder;
    fn recorder_mut(&mut self) -> &mut CommandRecorder;

    /// Releases every object still alive.
    fn cleanup(&mut self);
}

/// A [`GpuBackend`] together with the objects it created.
pub struct Device<B: GpuBackend> {
    backend: B,
    recorder: CommandRecorder,
    size: UVec2,
    current: bool,
    buffers: FreelistVec<B::Buffer>,
    shaders: FreelistVec<B::Shader>,
    programs: FreelistVec<B::Program>,
    pipelines: FreelistVec<B::Pipeline>,
    frame_buffers: FreelistVec<B::FrameBuffer>,
}

impl<B: GpuBackend> Device<B> {
    pub fn new(backend: B, options: &RenderSystemOptions) -> Self {
        Self {
            backend,
            recorder: CommandRecorder::new(options.record_commands),
            size: UVec2::from(options.size),
            current: false,
            buffers: FreelistVec::new(),
            shaders: FreelistVec::new(),
            programs: FreelistVec::new(),
            pipelines: FreelistVec::new(),
            frame_buffers: FreelistVec::new(),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    fn shaders_supported(&self, operation: &str) -> bool {
        if self.backend.capabilities().use_shaders {
            true
        } else {
            log::error!("{}: render system {} has no programmable pipeline", operation, self.backend.name());
            false
        }
    }
}

fn stale<T>(kind: &str, idx: usize, operation: &str) -> Option<T> {
    log::error!("{}: {} handle {} doesn't refer to a live object", operation, kind, idx);
    None
}

macro_rules! lookup {
    ($storage:expr, $handle:expr, $kind:literal, $operation:literal) => {
        match $storage.get($handle) {
            Some(object) => Some(object),
            None => stale($kind, $handle.idx, $operation),
        }
    };
}

macro_rules! lookup_mut {
    ($storage:expr, $handle:expr, $kind:literal, $operation:literal) => {
        match $storage.get_mut($handle) {
            Some(object) => Some(object),
            None => stale($kind, $handle.idx, $operation),
        }
    };
}

impl<B: GpuBackend> RenderSystem for Device<B> {
    fn name(&self) -> &str {
        self.backend.name()
    }

    fn capabilities(&self) -> Capabilities {
        self.backend.capabilities()
    }

    fn size(&self) -> UVec2 {
        self.size
    }

    fn set_current(&mut self) {
        if self.current {
            log::warn!("Render system {} is already current", self.backend.name());
        }
        self.current = true;
        self.recorder.record(RecordedCommand::SetCurrent);
    }

    fn end_current(&mut self) {
        self.current = false;
        self.recorder.record(RecordedCommand::EndCurrent);
    }

    fn is_current(&self) -> bool {
        self.current
    }

    fn swap_buffers(&mut self) {
        self.recorder.record(RecordedCommand::SwapBuffers);
    }

    fn create_buffer(&mut self, desc: &BufferDescriptor) -> BufferHandle {
        let native = self.backend.create_buffer(&mut self.recorder, desc);
        let buffer = self.buffers.push(native);
        self.recorder.record(RecordedCommand::CreateBuffer {
            buffer,
            size: desc.size,
        });
        buffer
    }

    fn write_buffer(&mut self, buffer: BufferHandle, offset: usize, data: &[u8]) {
        let Some(native) = lookup_mut!(self.buffers, buffer, "buffer", "write_buffer") else {
            return;
        };
        self.backend.write_buffer(&mut self.recorder, native, offset, data);
        self.recorder.record(RecordedCommand::WriteBuffer {
            buffer,
            offset,
            size: data.len(),
        });
    }

    fn destroy_buffer(&mut self, buffer: BufferHandle) {
        if self.buffers.remove(buffer).is_none() {
            stale::<()>("buffer", buffer.idx, "destroy_buffer");
        }
    }

    fn create_shader(&mut self, stage: ShaderType) -> Option<ShaderObjectHandle> {
        if !self.shaders_supported("create_shader") {
            return None;
        }
        let native = self.backend.create_shader(&mut self.recorder, stage)?;
        Some(self.shaders.push(native))
    }

    fn compile_shader(&mut self, shader: ShaderObjectHandle, source: &str) -> StageOutput {
        match lookup_mut!(self.shaders, shader, "shader", "compile_shader") {
            Some(native) => self.backend.compile_shader(&mut self.recorder, native, source),
            None => StageOutput::failed("ERROR: invalid shader object"),
        }
    }

    fn destroy_shader(&mut self, shader: ShaderObjectHandle) {
        if self.shaders.remove(shader).is_none() {
            stale::<()>("shader", shader.idx, "destroy_shader");
        }
    }

    fn create_program(&mut self) -> Option<ProgramHandle> {
        if !self.shaders_supported("create_program") {
            return None;
        }
        let native = self.backend.create_program(&mut self.recorder)?;
        Some(self.programs.push(native))
    }

    fn attach_shader(&mut self, program: ProgramHandle, shader: ShaderObjectHandle) {
        let Some(native_program) = lookup_mut!(self.programs, program, "program", "attach_shader") else {
            return;
        };
        let Some(native_shader) = lookup!(self.shaders, shader, "shader", "attach_shader") else {
            return;
        };
        self.backend
            .attach_shader(&mut self.recorder, native_program, shader, native_shader);
    }

    fn detach_shader(&mut self, program: ProgramHandle, shader: ShaderObjectHandle) {
        if let Some(native) = lookup_mut!(self.programs, program, "program", "detach_shader") {
            self.backend.detach_shader(&mut self.recorder, native, shader);
        }
    }

    fn link_program(&mut self, program: ProgramHandle) -> StageOutput {
        match lookup_mut!(self.programs, program, "program", "link_program") {
            Some(native) => self.backend.link_program(&mut self.recorder, native),
            None => StageOutput::failed("ERROR: invalid program object"),
        }
    }

    fn uniform_location(&self, program: ProgramHandle, name: &str) -> Option<u32> {
        let native = lookup!(self.programs, program, "program", "uniform_location")?;
        self.backend.uniform_location(native, name)
    }

    fn uniform_block_binding(&self, program: ProgramHandle, name: &str) -> Option<u32> {
        let native = lookup!(self.programs, program, "program", "uniform_block_binding")?;
        self.backend.uniform_block_binding(native, name)
    }

    fn use_program(&mut self, program: Option<ProgramHandle>) {
        let native = match program {
            Some(program) => match lookup!(self.programs, program, "program", "use_program") {
                Some(native) => Some(native),
                None => return,
            },
            None => None,
        };
        self.backend.use_program(&mut self.recorder, native);
        self.recorder.record(RecordedCommand::UseProgram { program });
    }

    fn write_uniform(&mut self, program: ProgramHandle, location: u32, variable: &FrameVariable) {
        if let Some(native) = lookup!(self.programs, program, "program", "write_uniform") {
            self.backend.write_uniform(&mut self.recorder, native, location, variable);
        }
    }

    fn bind_uniform_buffer(&mut self, program: ProgramHandle, binding: u32, buffer: BufferHandle) {
        let Some(native_program) = lookup!(self.programs, program, "program", "bind_uniform_buffer") else {
            return;
        };
        let Some(native_buffer) = lookup!(self.buffers, buffer, "buffer", "bind_uniform_buffer") else {
            return;
        };
        self.backend
            .bind_uniform_buffer(&mut self.recorder, native_program, binding, buffer, native_buffer);
    }

    fn destroy_program(&mut self, program: ProgramHandle) {
        if self.programs.remove(program).is_none() {
            stale::<()>("program", program.idx, "destroy_program");
        }
    }

    fn create_pipeline(&mut self, desc: &PipelineDescriptor) -> Option<PipelineHandle> {
        let native = self.backend.create_pipeline(&mut self.recorder, desc)?;
        Some(self.pipelines.push(native))
    }

    fn bind_pipeline(&mut self, pipeline: PipelineHandle) {
        if let Some(native) = lookup!(self.pipelines, pipeline, "pipeline", "bind_pipeline") {
            self.backend.bind_pipeline(&mut self.recorder, native);
            self.recorder.record(RecordedCommand::BindPipeline { pipeline });
        }
    }

    fn destroy_pipeline(&mut self, pipeline: PipelineHandle) {
        if self.pipelines.remove(pipeline).is_none() {
            stale::<()>("pipeline", pipeline.idx, "destroy_pipeline");
        }
    }

    fn create_frame_buffer(&mut self, desc: &FrameBufferDescriptor) -> FrameBufferHandle {
        let native = self.backend.create_frame_buffer(&mut self.recorder, desc);
        let frame_buffer = self.frame_buffers.push(native);
        self.recorder.record(RecordedCommand::CreateFrameBuffer {
            frame_buffer,
            samples: desc.samples,
        });
        frame_buffer
    }

    fn bind_frame_buffer(&mut self, frame_buffer: Option<FrameBufferHandle>) {
        let native = match frame_buffer {
            Some(handle) => match lookup!(self.frame_buffers, handle, "frame buffer", "bind_frame_buffer") {
                Some(native) => Some(native),
                None => return,
            },
            None => None,
        };
        self.backend.bind_frame_buffer(&mut self.recorder, native);
        self.recorder.record(RecordedCommand::BindFrameBuffer { frame_buffer });
    }

    fn clear(&mut self, colour: Vec4, components: BufferComponents) {
        self.backend.clear(&mut self.recorder, colour, components);
        self.recorder.record(RecordedCommand::Clear { colour, components });
    }

    fn blit(&mut self, src: FrameBufferHandle, dst: Option<FrameBufferHandle>, components: BufferComponents) {
        let Some(native_src) = lookup!(self.frame_buffers, src, "frame buffer", "blit") else {
            return;
        };
        let native_dst = match dst {
            Some(handle) => match lookup!(self.frame_buffers, handle, "frame buffer", "blit") {
                Some(native) => Some(native),
                None => return,
            },
            None => None,
        };
        self.backend.blit(&mut self.recorder, native_src, native_dst, components);
        self.recorder.record(RecordedCommand::Blit { src, dst, components });
    }

    fn destroy_frame_buffer(&mut self, frame_buffer: FrameBufferHandle) {
        if self.frame_buffers.remove(frame_buffer).is_none() {
            stale::<()>("frame buffer", frame_buffer.idx, "destroy_frame_buffer");
        }
    }

    fn draw(&mut self, topology: Topology, vertices: BufferHandle, indices: Option<BufferHandle>, count: u32) {
        let Some(native_vertices) = lookup!(self.buffers, vertices, "buffer", "draw") else {
            return;
        };
        let native_indices = match indices {
            Some(handle) => match lookup!(self.buffers, handle, "buffer", "draw") {
                Some(native) => Some(native),
                None => return,
            },
            None => None,
        };
        self.backend
            .draw(&mut self.recorder, topology, native_vertices, native_indices, count);
    }

    fn check_error(&mut self, call_site: &str) -> bool {
        self.recorder.check_error(call_site)
    }

    fn recorder(&self) -> &CommandRecorder {
        &self.recorder
    }

    fn recorder_mut(&mut self) -> &mut CommandRecorder {
        &mut self.recorder
    }

    fn cleanup(&mut self) {
        let live = self.buffers.len()
            + self.shaders.len()
            + self.programs.len()
            + self.pipelines.len()
            + self.frame_buffers.len();
        if live != 0 {
            log::debug!("Render system {} releasing {} live objects", self.backend.name(), live);
        }
        self.buffers.drain().for_each(drop);
        self.shaders.drain().for_each(drop);
        self.programs.drain().for_each(drop);
        self.pipelines.drain().for_each(drop);
        self.frame_buffers.drain().for_each(drop);
        self.current = false;
    }
}

#[cfg(test)]
mod tests {
    use castor3d_types::{BufferHandle, Topology};

    use super::{BufferDescriptor, BufferUsage, Device, Gl3Backend, RecordedCommand, RenderSystem};
    use crate::RenderSystemOptions;

    fn device() -> Device<Gl3Backend> {
        let options = RenderSystemOptions {
            record_commands: true,
            ..RenderSystemOptions::default()
        };
        Device::new(Gl3Backend::new(), &options)
    }

    #[test]
    fn stale_handles_are_ignored() {
        let mut device = device();
        let buffer = device.create_buffer(&BufferDescriptor {
            label: None,
            size: 16,
            usage: BufferUsage::VERTEX,
        });
        device.destroy_buffer(buffer);
        device.recorder_mut().take_commands();

        device.write_buffer(buffer, 0, &[0; 4]);
        device.draw(Topology::Triangles, BufferHandle::new(42), None, 3);
        assert!(device.recorder().commands().is_empty());
        assert_eq!(device.recorder_mut().take_draw_calls(), 0);
    }

    #[test]
    fn write_out_of_bounds_is_reported() {
        let mut device = device();
        let buffer = device.create_buffer(&BufferDescriptor {
            label: None,
            size: 4,
            usage: BufferUsage::UNIFORM,
        });
        device.write_buffer(buffer, 2, &[0; 4]);
        assert!(!device.check_error("write_out_of_bounds_is_reported"));
        assert!(device.check_error("write_out_of_bounds_is_reported"));
        assert!(device
            .recorder()
            .commands()
            .contains(&RecordedCommand::CreateBuffer { buffer, size: 4 }));
    }
}
