use castor3d::{
    backend::{Device, Gl3Backend, RecordedCommand, RenderSystem, VulkanBackend},
    shader::ShaderProgram,
    types::{glam::Vec3, ElementKind, ShaderType, VariableType},
    variable::FrameVariable,
    RenderSystemOptions,
};

fn recording() -> RenderSystemOptions {
    RenderSystemOptions {
        record_commands: true,
        ..RenderSystemOptions::default()
    }
}

fn components(text: &str) -> Vec<f32> {
    text.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(|s| s.parse().unwrap())
        .collect()
}

#[test]
fn vector_text_round_trips() {
    let ty = VariableType::from_name("vec3f").unwrap();
    let mut variable = FrameVariable::new("direction", ty, 1);

    assert!(variable.set_str_value("1.5, 2.5, 3.5", 0));
    let parsed = components(variable.str_value(0));
    assert_eq!(parsed.len(), 3);
    for (got, expected) in parsed.iter().zip([1.5, 2.5, 3.5]) {
        assert!((got - expected).abs() < f32::EPSILON);
    }

    assert!(!variable.set_str_value("1.5, 2.5", 0));
    assert_eq!(variable.value::<Vec3>(0), Some(Vec3::new(1.5, 2.5, 3.5)));
    assert_eq!(components(variable.str_value(0)), [1.5, 2.5, 3.5]);
}

#[test]
fn element_kind_follows_the_type() {
    for (name, kind) in [
        ("int", ElementKind::Int),
        ("float", ElementKind::Float),
        ("vec2b", ElementKind::Bool),
        ("mat4x4f", ElementKind::Float),
    ] {
        let variable = FrameVariable::new(name, VariableType::from_name(name).unwrap(), 2);
        assert_eq!(variable.kind(), kind, "{}", name);
        assert_eq!(variable.data().kind(), kind, "{}", name);
    }
}

const VERTEX: &str = "uniform int mode;\nuniform float scale;\nvoid main() {}\n";
const PIXEL: &str = "void main() {}\n";

fn program() -> ShaderProgram {
    let mut program = ShaderProgram::new("mixed");
    program.set_source(ShaderType::Vertex, VERTEX);
    program.set_source(ShaderType::Pixel, PIXEL);
    program
        .create_frame_variable("mode", VariableType::scalar(ElementKind::Int), 1, ShaderType::Vertex)
        .unwrap()
        .set_value(3_i32, 0)
        .unwrap();
    program
        .create_frame_variable("scale", VariableType::scalar(ElementKind::Float), 1, ShaderType::Vertex)
        .unwrap()
        .set_value(0.5_f32, 0)
        .unwrap();
    program
}

fn uniform_writes(commands: &[RecordedCommand]) -> Vec<&str> {
    commands
        .iter()
        .filter_map(|c| match c {
            RecordedCommand::WriteUniform { name, .. } => Some(name.as_str()),
            _ => None,
        })
        .collect()
}

fn applies_each_variable_once(render_system: &mut dyn RenderSystem) {
    let mut program = program();
    program.initialise(render_system).unwrap();
    render_system.recorder_mut().take_commands();

    assert_eq!(program.apply_all_variables(render_system), 2);
    let commands = render_system.recorder_mut().take_commands();
    let mut written = uniform_writes(&commands);
    written.sort_unstable();
    assert_eq!(written, ["mode", "scale"]);

    // unchanged values aren't written again
    assert_eq!(program.apply_all_variables(render_system), 0);

    program.find_frame_variable_mut("scale").unwrap().set_value(2.0_f32, 0).unwrap();
    assert_eq!(program.apply_all_variables(render_system), 1);
    let commands = render_system.recorder_mut().take_commands();
    assert_eq!(uniform_writes(&commands), ["scale"]);
}

#[test]
fn int_and_float_apply_once_on_gl() {
    applies_each_variable_once(&mut Device::new(Gl3Backend::new(), &recording()));
}

#[test]
fn int_and_float_apply_once_on_vulkan() {
    applies_each_variable_once(&mut Device::new(VulkanBackend::new(), &recording()));
}

#[test]
fn buffer_members_keep_std140_offsets() {
    let mut program = ShaderProgram::new("buffer");
    let buffer = program.create_frame_variable_buffer("Material", castor3d::types::ShaderTypeFlags::PIXEL);
    buffer
        .create_variable("colour", VariableType::from_name("vec3f").unwrap(), 1)
        .unwrap();
    buffer
        .create_variable("shininess", VariableType::from_name("float").unwrap(), 1)
        .unwrap();
    buffer
        .create_variable("weights", VariableType::from_name("float").unwrap(), 2)
        .unwrap();

    let buffer = program.find_frame_variable_buffer("Material").unwrap();
    assert_eq!(buffer.offset_of("colour"), Some(0));
    assert_eq!(buffer.offset_of("shininess"), Some(12));
    // array elements are padded to 16 bytes
    assert_eq!(buffer.offset_of("weights"), Some(16));
    assert_eq!(buffer.size(), 48);
    assert!(program.find_frame_variable("shininess").is_some());
}
