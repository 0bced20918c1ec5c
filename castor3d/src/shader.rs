//! Shader programs and their state machine.
//!
//! ```text
//! Created -> ObjectsCreated -> Compiled -> Linked
//!                          \-> CompileError  \-> LinkError
//! ```
//!
//! Both error states are latched: nothing but a fresh
//! [`ShaderProgram::initialise`] leaves them, and while latched every bind is
//! a no-op.

use arrayvec::ArrayVec;
use castor3d_types::{ProgramHandle, ProgramStatus, ShaderObjectHandle, ShaderType, ShaderTypeFlags, VariableType};

use crate::{
    backend::RenderSystem,
    event::GpuResource,
    util::typedefs::SsoString,
    variable::{FrameVariable, FrameVariableBuffer},
    ShaderError, VariableError,
};

#[derive(Debug, Clone)]
struct ProgramVariable {
    variable: FrameVariable,
    stage: ShaderType,
    location: Option<u32>,
}

/// A set of stage sources linked together, with the uniforms they declare.
#[derive(Debug)]
pub struct ShaderProgram {
    name: SsoString,
    sources: [Option<String>; ShaderType::COUNT],
    variables: Vec<ProgramVariable>,
    buffers: Vec<FrameVariableBuffer>,
    status: ProgramStatus,
    error_log: Option<String>,
    handle: Option<ProgramHandle>,
    objects: ArrayVec<(ShaderType, ShaderObjectHandle), { ShaderType::COUNT }>,
    bound: bool,
}

impl ShaderProgram {
    pub fn new(name: impl Into<SsoString>) -> Self {
        Self {
            name: name.into(),
            sources: Default::default(),
            variables: Vec::new(),
            buffers: Vec::new(),
            status: ProgramStatus::Created,
            error_log: None,
            handle: None,
            objects: ArrayVec::new(),
            bound: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn status(&self) -> ProgramStatus {
        self.status
    }

    /// Whether a compile or link failure is latched.
    pub fn is_error(&self) -> bool {
        self.status.is_error()
    }

    /// Log of the failure that latched the error state.
    pub fn error_log(&self) -> Option<&str> {
        self.error_log.as_deref()
    }

    pub fn handle(&self) -> Option<ProgramHandle> {
        self.handle
    }

    pub fn is_bound(&self) -> bool {
        self.bound
    }

    /// Sets the source of one stage. Takes effect at the next initialise.
    pub fn set_source(&mut self, stage: ShaderType, source: impl Into<String>) {
        self.sources[stage.index()] = Some(source.into());
    }

    pub fn source(&self, stage: ShaderType) -> Option<&str> {
        self.sources[stage.index()].as_deref()
    }

    /// Stages with a source.
    pub fn stages(&self) -> ShaderTypeFlags {
        ShaderType::ARRAY
            .into_iter()
            .filter(|stage| self.sources[stage.index()].is_some())
            .fold(ShaderTypeFlags::empty(), |flags, stage| flags | stage.flag())
    }

    fn name_taken(&self, name: &str) -> bool {
        self.find_frame_variable(name).is_some()
    }

    /// Declares a loose uniform of the given stage. Names are unique across
    /// the whole program, buffers included.
    pub fn create_frame_variable(
        &mut self,
        name: impl Into<SsoString>,
        ty: VariableType,
        occurrences: usize,
        stage: ShaderType,
    ) -> Result<&mut FrameVariable, VariableError> {
        let name = name.into();
        if self.name_taken(&name) {
            return Err(VariableError::DuplicateName { name });
        }
        self.variables.push(ProgramVariable {
            variable: FrameVariable::new(name, ty, occurrences),
            stage,
            location: None,
        });
        let index = self.variables.len() - 1;
        Ok(&mut self.variables[index].variable)
    }

    /// Finds a variable by name, loose uniforms first, then buffer members.
    pub fn find_frame_variable(&self, name: &str) -> Option<&FrameVariable> {
        self.variables
            .iter()
            .map(|v| &v.variable)
            .find(|v| v.name() == name)
            .or_else(|| self.buffers.iter().find_map(|b| b.find_variable(name)))
    }

    pub fn find_frame_variable_mut(&mut self, name: &str) -> Option<&mut FrameVariable> {
        if let Some(index) = self.variables.iter().position(|v| v.variable.name() == name) {
            return Some(&mut self.variables[index].variable);
        }
        self.buffers.iter_mut().find_map(|b| b.find_variable_mut(name))
    }

    /// Loose uniforms declared for one stage.
    pub fn frame_variables(&self, stage: ShaderType) -> impl Iterator<Item = &FrameVariable> {
        self.variables
            .iter()
            .filter(move |v| v.stage == stage)
            .map(|v| &v.variable)
    }

    /// Declares a uniform block. Creating an existing block returns it.
    pub fn create_frame_variable_buffer(
        &mut self,
        name: impl Into<SsoString>,
        stages: ShaderTypeFlags,
    ) -> &mut FrameVariableBuffer {
        let name = name.into();
        let index = match self.buffers.iter().position(|b| b.name() == name) {
            Some(index) => index,
            None => {
                self.buffers.push(FrameVariableBuffer::new(name, stages));
                self.buffers.len() - 1
            }
        };
        &mut self.buffers[index]
    }

    pub fn find_frame_variable_buffer(&self, name: &str) -> Option<&FrameVariableBuffer> {
        self.buffers.iter().find(|b| b.name() == name)
    }

    pub fn find_frame_variable_buffer_mut(&mut self, name: &str) -> Option<&mut FrameVariableBuffer> {
        self.buffers.iter_mut().find(|b| b.name() == name)
    }

    pub fn frame_variable_buffers(&self) -> &[FrameVariableBuffer] {
        &self.buffers
    }

    fn latch(&mut self, status: ProgramStatus, log: String) {
        log::error!("Shader program {:?} latched {:?}:\n{}", self.name, status, log);
        self.status = status;
        self.error_log = Some(log);
    }

    /// Creates the stage objects, compiles them and links the program.
    ///
    /// This is the only way out of a latched error: any previous objects are
    /// released and the program starts over from `Created`.
    pub fn initialise(&mut self, render_system: &mut dyn RenderSystem) -> Result<(), ShaderError> {
        profiling::scope!("ShaderProgram::initialise");

        if !render_system.use_shaders() {
            return Err(ShaderError::ShadersUnsupported {
                backend: render_system.name().into(),
            });
        }

        self.cleanup(render_system);
        self.error_log = None;

        if self.sources.iter().all(Option::is_none) {
            return Err(ShaderError::NoSource {
                program: self.name.clone(),
            });
        }

        let Some(handle) = render_system.create_program() else {
            return Err(ShaderError::ShadersUnsupported {
                backend: render_system.name().into(),
            });
        };
        self.handle = Some(handle);

        for stage in ShaderType::ARRAY {
            if self.sources[stage.index()].is_none() {
                continue;
            }
            let Some(object) = render_system.create_shader(stage) else {
                return Err(ShaderError::ShadersUnsupported {
                    backend: render_system.name().into(),
                });
            };
            self.objects.push((stage, object));
        }
        self.status = ProgramStatus::ObjectsCreated;

        let objects = self.objects.clone();
        for (stage, object) in objects {
            let source = self.sources[stage.index()].as_deref().unwrap_or_default();
            let output = render_system.compile_shader(object, source);
            if !output.success {
                self.latch(ProgramStatus::CompileError, output.log.clone());
                return Err(ShaderError::Compile {
                    program: self.name.clone(),
                    stage,
                    log: output.log,
                });
            }
            if !output.log.is_empty() {
                log::warn!("Shader program {:?} {} stage: {}", self.name, stage.name(), output.log);
            }
        }
        self.status = ProgramStatus::Compiled;

        self.link(render_system)
    }

    /// Links the compiled stages. Relinking a linked program detaches and
    /// reattaches every stage first.
    pub fn link(&mut self, render_system: &mut dyn RenderSystem) -> Result<(), ShaderError> {
        profiling::scope!("ShaderProgram::link");

        if !render_system.use_shaders() {
            return Err(ShaderError::ShadersUnsupported {
                backend: render_system.name().into(),
            });
        }
        if self.status.is_error() {
            return Err(ShaderError::Latched {
                program: self.name.clone(),
                status: self.status,
            });
        }
        let handle = match (self.status, self.handle) {
            (ProgramStatus::Compiled | ProgramStatus::Linked, Some(handle)) => handle,
            _ => {
                return Err(ShaderError::InvalidState {
                    program: self.name.clone(),
                    operation: "link",
                    status: self.status,
                })
            }
        };

        if self.status == ProgramStatus::Linked {
            log::warn!("Shader program {:?} is already linked, relinking", self.name);
            for &(_, object) in &self.objects {
                render_system.detach_shader(handle, object);
            }
        }
        for &(_, object) in &self.objects {
            render_system.attach_shader(handle, object);
        }

        let output = render_system.link_program(handle);
        if !output.success || output.log.contains("ERROR") {
            self.latch(ProgramStatus::LinkError, output.log.clone());
            return Err(ShaderError::Link {
                program: self.name.clone(),
                log: output.log,
            });
        }

        for variable in &mut self.variables {
            variable.location = render_system.uniform_location(handle, variable.variable.name());
            if variable.location.is_none() {
                log::debug!(
                    "Uniform {:?} isn't used by shader program {:?}",
                    variable.variable.name(),
                    self.name
                );
            }
            variable.variable.mark_changed();
        }
        for buffer in &mut self.buffers {
            buffer.initialise(render_system, handle);
        }

        self.status = ProgramStatus::Linked;
        Ok(())
    }

    /// Writes every changed loose uniform. Returns how many were written.
    pub fn apply_all_variables(&mut self, render_system: &mut dyn RenderSystem) -> usize {
        let Some(handle) = self.handle else {
            return 0;
        };
        let mut applied = 0;
        for variable in &mut self.variables {
            if let Some(location) = variable.location {
                if variable.variable.take_changed() {
                    render_system.write_uniform(handle, location, &variable.variable);
                    applied += 1;
                }
            }
        }
        applied
    }

    /// Makes the program current and pushes its uniforms. Does nothing and
    /// returns false unless the program is linked.
    pub fn bind(&mut self, render_system: &mut dyn RenderSystem) -> bool {
        let Some(handle) = self.handle.filter(|_| self.status == ProgramStatus::Linked) else {
            return false;
        };

        render_system.use_program(Some(handle));
        self.apply_all_variables(render_system);
        for buffer in &mut self.buffers {
            buffer.update(render_system, handle);
            buffer.bind(render_system, handle);
        }
        self.bound = true;
        true
    }

    pub fn unbind(&mut self, render_system: &mut dyn RenderSystem) {
        if self.bound {
            render_system.use_program(None);
            self.bound = false;
        }
    }

    /// Releases the render system objects and goes back to `Created`.
    /// Sources and variables are kept.
    pub fn cleanup(&mut self, render_system: &mut dyn RenderSystem) {
        self.unbind(render_system);
        for buffer in &mut self.buffers {
            buffer.cleanup(render_system);
        }
        for (_, object) in self.objects.drain(..) {
            render_system.destroy_shader(object);
        }
        if let Some(handle) = self.handle.take() {
            render_system.destroy_program(handle);
        }
        for variable in &mut self.variables {
            variable.location = None;
        }
        self.status = ProgramStatus::Created;
    }

    /// Copies sources and every variable value into a new program which has
    /// no render system objects yet.
    pub fn duplicate(&self, name: impl Into<SsoString>) -> Self {
        let mut copy = Self::new(name);
        copy.sources = self.sources.clone();
        copy.variables = self
            .variables
            .iter()
            .map(|v| ProgramVariable {
                variable: v.variable.clone(),
                stage: v.stage,
                location: None,
            })
            .collect();
        copy.buffers = self.buffers.clone();
        for buffer in &mut copy.buffers {
            buffer.forget_gpu_objects();
        }
        copy
    }
}

impl GpuResource for ShaderProgram {
    fn initialise(&mut self, render_system: &mut dyn RenderSystem) -> bool {
        match ShaderProgram::initialise(self, render_system) {
            Ok(()) => true,
            Err(error) => {
                log::warn!("{}", error);
                false
            }
        }
    }

    fn cleanup(&mut self, render_system: &mut dyn RenderSystem) {
        ShaderProgram::cleanup(self, render_system)
    }
}

#[cfg(test)]
mod tests {
    use castor3d_types::{ElementKind, ProgramStatus, ShaderType, VariableType};

    use super::ShaderProgram;
    use crate::{
        backend::{Device, Gl2Backend, Gl3Backend, RecordedCommand, RenderSystem},
        RenderSystemOptions, ShaderError,
    };

    const VERTEX: &str = "uniform float scale; void main() { gl_Position = vec4(scale); }";
    const PIXEL: &str = "uniform int mode; void main() {}";

    fn device() -> Device<Gl3Backend> {
        let options = RenderSystemOptions {
            record_commands: true,
            ..RenderSystemOptions::default()
        };
        Device::new(Gl3Backend::new(), &options)
    }

    fn program() -> ShaderProgram {
        let mut program = ShaderProgram::new("test");
        program.set_source(ShaderType::Vertex, VERTEX);
        program.set_source(ShaderType::Pixel, PIXEL);
        program
            .create_frame_variable("scale", VariableType::scalar(ElementKind::Float), 1, ShaderType::Vertex)
            .unwrap();
        program
            .create_frame_variable("mode", VariableType::scalar(ElementKind::Int), 1, ShaderType::Pixel)
            .unwrap();
        program
    }

    #[test]
    fn initialise_links() {
        let mut device = device();
        let mut program = program();
        program.initialise(&mut device).unwrap();
        assert_eq!(program.status(), ProgramStatus::Linked);
        assert!(program.bind(&mut device));
        assert!(device.check_error("initialise_links"));
    }

    #[test]
    fn compile_error_latches() {
        let mut device = device();
        let mut program = program();
        program.set_source(ShaderType::Pixel, "void main() {");
        let error = program.initialise(&mut device).unwrap_err();
        assert!(matches!(error, ShaderError::Compile { stage: ShaderType::Pixel, .. }));
        assert_eq!(program.status(), ProgramStatus::CompileError);
        assert!(matches!(program.link(&mut device), Err(ShaderError::Latched { .. })));

        device.recorder_mut().take_commands();
        assert!(!program.bind(&mut device));
        assert!(device.recorder().commands().is_empty());

        program.set_source(ShaderType::Pixel, PIXEL);
        program.initialise(&mut device).unwrap();
        assert!(program.error_log().is_none());
    }

    #[test]
    fn relink_reattaches() {
        let mut device = device();
        let mut program = program();
        program.initialise(&mut device).unwrap();
        device.recorder_mut().take_commands();
        program.link(&mut device).unwrap();
        let detaches = device
            .recorder()
            .commands()
            .iter()
            .filter(|c| matches!(c, RecordedCommand::Call { call: "glDetachShader", .. }))
            .count();
        assert_eq!(detaches, 2);
        assert_eq!(program.status(), ProgramStatus::Linked);
    }

    #[test]
    fn fixed_function_refuses_programs() {
        let mut device = Device::new(Gl2Backend::new(), &RenderSystemOptions::default());
        let mut program = program();
        assert!(matches!(
            program.initialise(&mut device),
            Err(ShaderError::ShadersUnsupported { .. })
        ));
        assert!(!program.bind(&mut device));
    }

    #[test]
    fn duplicate_copies_values() {
        let mut program = program();
        program.find_frame_variable_mut("scale").unwrap().set_value(2.0_f32, 0).unwrap();
        let mut copy = program.duplicate("copy");
        copy.find_frame_variable_mut("scale").unwrap().set_value(3.0_f32, 0).unwrap();
        assert_eq!(program.find_frame_variable("scale").unwrap().value::<f32>(0), Some(2.0));
        assert_eq!(copy.find_frame_variable("scale").unwrap().value::<f32>(0), Some(3.0));
        assert_eq!(copy.status(), ProgramStatus::Created);
    }
}
