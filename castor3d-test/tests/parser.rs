use std::path::{Path, PathBuf};

use castor3d::{
    backend::RecordedCommand,
    parse::SceneFileParser,
    scene::Scene,
    types::{glam::Vec4, LightKind, ShaderType},
    ParseError,
};
use castor3d_test::{draw_count, TestRunner};

fn data_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests").join("data")
}

fn parse(scene: Scene) -> Scene {
    let (scene, report) = SceneFileParser::new()
        .parse_file(scene, data_dir().join("scene.cscn"))
        .unwrap();
    assert!(report.diagnostics.is_empty(), "{:?}", report.diagnostics);
    scene
}

#[test]
fn scene_file_declares_everything() {
    let scene = parse(Scene::new("tmp"));
    assert_eq!(scene.name(), "Parsed");

    let program = scene.program("tint").unwrap();
    assert!(program.source(ShaderType::Vertex).unwrap().contains("lift"));
    assert!(program.source(ShaderType::Pixel).unwrap().contains("tint"));
    let tint = program.find_frame_variable("tint").unwrap();
    assert_eq!(tint.value::<Vec4>(0), Some(Vec4::new(1.0, 0.5, 0.25, 1.0)));
    let weights = program.find_frame_variable("weights").unwrap();
    assert_eq!(weights.occurrences(), 2);
    assert_eq!(weights.value::<f32>(1), Some(0.5));

    let geometry = scene.geometry("tinted").unwrap();
    assert_eq!(geometry.pass.program.as_deref(), Some("tint"));
    assert_eq!(scene.mesh("quad").unwrap().submeshes[0].indices.len(), 6);

    let sun = scene.light("sun").unwrap();
    assert_eq!(sun.kind, LightKind::Directional);
    assert!(sun.casts_shadows);
    assert!(scene.camera().is_some());
}

#[test]
fn rejected_values_warn_and_keep_the_previous_one() {
    let text = r#"
scene {
    shader_program "p" {
        variable "offset" {
            type vec3f
            value 1 2
        }
    }
}
"#;
    let (scene, report) = SceneFileParser::new().parse_str(Scene::new("tmp"), data_dir(), text);
    assert!(!report.has_errors(), "{:?}", report.diagnostics);
    let warning = report.warnings().next().unwrap();
    assert_eq!(warning.line, 7);

    let offset = scene.program("p").unwrap().find_frame_variable("offset").unwrap();
    assert_eq!(offset.str_value(0), "0, 0, 0");
}

#[test]
fn missing_shader_files_are_reported() {
    let text = "scene {\n  shader_program \"p\" {\n    vertex_program \"nowhere.vert\"\n  }\n}\n";
    let (scene, report) = SceneFileParser::new().parse_str(Scene::new("tmp"), data_dir(), text);
    let error = report.errors().next().unwrap();
    assert!(matches!(error.error, ParseError::Io { .. }), "{:?}", error.error);
    assert!(scene.program("p").unwrap().source(ShaderType::Vertex).is_none());
}

#[test]
fn missing_scene_file_is_an_error() {
    let result = SceneFileParser::new().parse_file(Scene::new("tmp"), data_dir().join("nowhere.cscn"));
    assert!(result.is_err());
}

#[test]
fn parsed_scene_renders_with_its_program() {
    let mut runner = TestRunner::builder().render_system("gl3").build().unwrap();
    {
        let scene = runner.scene();
        let mut scene = scene.lock();
        let parsed = parse(Scene::new("tmp"));
        *scene = parsed;
    }
    runner.upload_scene();

    let (statistics, commands) = runner.render_frame();
    assert_eq!(statistics.failed_batches, 0);
    // opaque, one shadow map, tone mapping
    assert_eq!(draw_count(&commands), 3);

    let writes: Vec<&str> = commands
        .iter()
        .filter_map(|c| match c {
            RecordedCommand::WriteUniform { name, .. } => Some(name.as_str()),
            _ => None,
        })
        .collect();
    for name in ["lift", "tint", "weights"] {
        assert!(writes.contains(&name), "{} not written: {:?}", name, writes);
    }

    // values only go out again once they change
    let (_, commands) = runner.render_frame();
    assert!(!commands
        .iter()
        .any(|c| matches!(c, RecordedCommand::WriteUniform { name, .. } if name == "tint")));
}
