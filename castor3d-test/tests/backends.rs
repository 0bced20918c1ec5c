use castor3d::{
    backend::{BackendRegistry, RecordedCommand, RenderSystem},
    scene::Pass,
    types::{glam::Vec3, SampleCount},
    EngineError, RenderSystemOptions,
};
use castor3d_test::{add_plane, draw_count, TestRunner};

fn create(name: &str) -> Box<dyn RenderSystem> {
    BackendRegistry::with_builtin()
        .create(name, &RenderSystemOptions::default())
        .unwrap()
}

#[test]
fn builtin_capabilities() {
    let gl2 = create("gl2").capabilities();
    assert!(!gl2.use_shaders);
    assert!(!gl2.uniform_buffers);
    assert_eq!(gl2.max_samples, SampleCount::One);

    let gl3 = create("gl3").capabilities();
    assert!(gl3.use_shaders && gl3.uniform_buffers);
    assert!(!gl3.descriptor_sets);
    assert_eq!(gl3.max_samples, SampleCount::Four);

    let vulkan = create("vulkan").capabilities();
    assert!(vulkan.use_shaders && vulkan.descriptor_sets);
    assert_eq!(vulkan.max_samples, SampleCount::Four);
}

#[test]
fn registry_names_and_lookup_failures() {
    let registry = BackendRegistry::with_builtin();
    assert_eq!(registry.names().collect::<Vec<_>>(), ["gl2", "gl3", "vulkan"]);

    match registry.create("d3d11", &RenderSystemOptions::default()) {
        Err(EngineError::UnknownRenderSystem { available, .. }) => assert_eq!(available.len(), 3),
        other => panic!("unexpected {:?}", other.map(|rs| rs.name().to_owned())),
    }
    match BackendRegistry::empty().create("gl3", &RenderSystemOptions::default()) {
        Err(EngineError::NoRenderSystem) => {}
        other => panic!("unexpected {:?}", other.map(|rs| rs.name().to_owned())),
    }

    let options = RenderSystemOptions {
        size: [0, 720],
        ..RenderSystemOptions::default()
    };
    assert!(matches!(
        registry.create("vulkan", &options),
        Err(EngineError::RenderSystemInitialisation { .. })
    ));
}

#[test]
fn every_backend_renders_the_same_frame() {
    for name in ["gl2", "gl3", "vulkan"] {
        let mut runner = TestRunner::builder().render_system(name).build().unwrap();
        assert_eq!(runner.engine.render_system().name(), name);
        {
            let scene = runner.scene();
            let mut scene = scene.lock();
            add_plane(&mut scene, "plane", Vec3::new(0.0, 0.0, -3.0), Pass::default()).unwrap();
        }
        runner.upload_scene();

        let (statistics, commands) = runner.render_frame();
        assert_eq!(draw_count(&commands), 2, "{}", name);
        assert_eq!(statistics.failed_batches, 0, "{}", name);
        assert!(commands.contains(&RecordedCommand::SwapBuffers), "{}", name);
        assert_eq!(commands.last(), Some(&RecordedCommand::EndCurrent), "{}", name);
    }
}

#[test]
fn current_context_is_released_after_a_frame() {
    let mut runner = TestRunner::builder().render_system("gl3").build().unwrap();
    runner.render_frame();
    assert!(!runner.engine.render_system().is_current());
}
