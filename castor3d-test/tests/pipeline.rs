use castor3d::{
    backend::{Device, Gl3Backend, RenderSystem, VulkanBackend},
    pipeline::{Pipeline, PipelineDescriptor},
    shader::ShaderProgram,
    types::ShaderType,
    RenderSystemOptions, ShaderError,
};

const VERTEX: &str = "void main() { gl_Position = vec4(0.0); }\n";
const BROKEN_PIXEL: &str = "void shade() {}\n";
const PIXEL: &str = "void main() {}\n";

fn pipeline(pixel: &str) -> Pipeline {
    let mut program = ShaderProgram::new("latched");
    program.set_source(ShaderType::Vertex, VERTEX);
    program.set_source(ShaderType::Pixel, pixel);
    Pipeline::new(PipelineDescriptor::default(), Some(program))
}

fn link_errors_latch(render_system: &mut dyn RenderSystem) {
    let mut pipeline = pipeline(BROKEN_PIXEL);

    let error = pipeline.initialise(render_system).unwrap_err();
    assert!(matches!(error, ShaderError::Link { .. }), "{:?}", error);
    assert!(pipeline.is_error());
    assert!(pipeline.program().unwrap().error_log().is_some());
    render_system.recorder_mut().take_commands();

    for _ in 0..3 {
        assert!(!pipeline.apply(render_system));
        assert!(render_system.recorder().commands().is_empty());
    }

    // only a new initialise leaves the error state
    pipeline
        .program_mut()
        .unwrap()
        .set_source(ShaderType::Pixel, PIXEL);
    assert!(pipeline.is_error());
    pipeline.initialise(render_system).unwrap();
    assert!(!pipeline.is_error());
    assert!(pipeline.apply(render_system));
    pipeline.unapply(render_system);
    pipeline.cleanup(render_system);
}

fn recording() -> RenderSystemOptions {
    RenderSystemOptions {
        record_commands: true,
        ..RenderSystemOptions::default()
    }
}

#[test]
fn link_errors_latch_on_gl() {
    link_errors_latch(&mut Device::new(Gl3Backend::new(), &recording()));
}

#[test]
fn link_errors_latch_on_vulkan() {
    link_errors_latch(&mut Device::new(VulkanBackend::new(), &recording()));
}

#[test]
fn relinking_a_latched_program_is_refused() {
    let mut render_system = Device::new(Gl3Backend::new(), &recording());
    let mut program = ShaderProgram::new("latched");
    program.set_source(ShaderType::Vertex, VERTEX);
    program.set_source(ShaderType::Pixel, BROKEN_PIXEL);

    assert!(program.initialise(&mut render_system).is_err());
    let error = program.link(&mut render_system).unwrap_err();
    assert!(matches!(error, ShaderError::Latched { .. }), "{:?}", error);
    assert!(!program.bind(&mut render_system));
}

#[test]
fn compile_errors_keep_the_log() {
    let mut render_system = Device::new(Gl3Backend::new(), &recording());
    let mut program = ShaderProgram::new("broken");
    program.set_source(ShaderType::Vertex, VERTEX);
    program.set_source(ShaderType::Pixel, "#error missing material\nvoid main() {}\n");

    let error = program.initialise(&mut render_system).unwrap_err();
    assert!(matches!(error, ShaderError::Compile { stage: ShaderType::Pixel, .. }), "{:?}", error);
    assert!(program.error_log().unwrap().contains("missing material"));
}
