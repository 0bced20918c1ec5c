use anyhow::Result;
use castor3d::{
    backend::RecordedCommand,
    scene::Pass,
    types::{glam::Vec3, BufferComponents, LightKind},
    EngineError,
};
use castor3d_test::{add_light, add_plane, blits, draw_count, TestRunner};

fn translucent() -> Pass {
    Pass {
        opacity: 0.5,
        ..Pass::default()
    }
}

fn populate(runner: &TestRunner, transparent: bool, shadows: bool) -> Result<()> {
    let scene = runner.scene();
    let mut scene = scene.lock();
    add_plane(&mut scene, "opaque", Vec3::new(0.0, 0.0, -5.0), Pass::default())?;
    if transparent {
        add_plane(&mut scene, "glass", Vec3::new(0.0, 0.0, -2.0), translucent())?;
    }
    if shadows {
        add_light(&mut scene, "sun", LightKind::Directional, true)?;
    }
    drop(scene);
    runner.upload_scene();
    Ok(())
}

fn refusal(result: Result<TestRunner>) -> EngineError {
    let error = result.unwrap_err();
    match error.downcast::<EngineError>() {
        Ok(error) => error,
        Err(error) => panic!("unexpected error {:?}", error),
    }
}

#[test]
fn forward_draws_opaque_then_tonemaps() {
    let mut runner = TestRunner::builder().build().unwrap();
    populate(&runner, false, false).unwrap();

    let (statistics, commands) = runner.render_frame();
    assert_eq!(statistics.failed_batches, 0);
    assert_eq!(draw_count(&commands), 2);
    assert_eq!(statistics.draw_calls, 2);
    assert_eq!(blits(&commands).count(), 0);

    // the last draw lands on the swap chain
    let last_target = commands.iter().rev().find_map(|c| match c {
        RecordedCommand::BindFrameBuffer { frame_buffer } => Some(*frame_buffer),
        _ => None,
    });
    assert_eq!(last_target, Some(None));
}

#[test]
fn forward_composites_transparent_nodes() {
    let mut runner = TestRunner::builder().build().unwrap();
    populate(&runner, true, false).unwrap();

    let (_, commands) = runner.render_frame();
    // opaque, transparent, combine, tone mapping
    assert_eq!(draw_count(&commands), 4);
    // the transparent stage starts from the opaque depth
    let depth_copies = blits(&commands)
        .filter(|c| matches!(c, RecordedCommand::Blit { components, .. } if *components == BufferComponents::DEPTH))
        .count();
    assert_eq!(depth_copies, 1);
}

#[test]
fn shadow_casting_lights_add_shadow_draws() {
    let mut runner = TestRunner::builder().build().unwrap();
    populate(&runner, true, true).unwrap();

    let (_, commands) = runner.render_frame();
    // each stage renders its own casters into the light's map
    assert_eq!(draw_count(&commands), 6);
    let depth_clears = commands
        .iter()
        .filter(|c| matches!(c, RecordedCommand::Clear { components, .. } if *components == BufferComponents::DEPTH))
        .count();
    assert_eq!(depth_clears, 2);
}

#[test]
fn lights_without_shadows_cost_nothing() {
    let mut runner = TestRunner::builder().build().unwrap();
    populate(&runner, false, false).unwrap();
    {
        let scene = runner.scene();
        let mut scene = scene.lock();
        add_light(&mut scene, "lamp", LightKind::Point, false).unwrap();
    }

    let (_, commands) = runner.render_frame();
    assert_eq!(draw_count(&commands), 2);
}

#[test]
fn msaa_resolves_before_tonemapping() {
    let mut runner = TestRunner::builder().technique("msaa").samples(4).build().unwrap();
    populate(&runner, false, false).unwrap();

    let (_, commands) = runner.render_frame();
    assert_eq!(draw_count(&commands), 2);
    let resolves: Vec<_> = blits(&commands).collect();
    assert_eq!(resolves.len(), 1);
    assert!(matches!(
        resolves[0],
        RecordedCommand::Blit { components, dst: Some(_), .. }
            if *components == BufferComponents::COLOUR | BufferComponents::DEPTH
    ));
}

#[test]
fn msaa_needs_multisampled_targets() {
    let error = refusal(TestRunner::builder().render_system("gl2").technique("msaa").build());
    assert!(matches!(error, EngineError::UnsupportedTechnique { .. }), "{:?}", error);
}

#[test]
fn deferred_lights_the_geometry_buffer() {
    let mut runner = TestRunner::builder().technique("deferred").build().unwrap();
    populate(&runner, false, false).unwrap();

    let (statistics, commands) = runner.render_frame();
    // geometry buffer, lighting, tone mapping
    assert_eq!(draw_count(&commands), 3);
    assert_eq!(statistics.graph.nodes_culled, 0);
}

#[test]
fn deferred_draws_transparent_nodes_forward() {
    let mut runner = TestRunner::builder().technique("deferred").build().unwrap();
    populate(&runner, true, false).unwrap();

    let (_, commands) = runner.render_frame();
    assert_eq!(draw_count(&commands), 5);
}

#[test]
fn deferred_needs_programs() {
    let error = refusal(TestRunner::builder().render_system("gl2").technique("deferred").build());
    assert!(matches!(error, EngineError::UnsupportedTechnique { .. }), "{:?}", error);
}

#[test]
fn unknown_techniques_are_refused() {
    let error = refusal(TestRunner::builder().technique("raytraced").build());
    assert!(matches!(error, EngineError::UnknownTechnique { .. }), "{:?}", error);
}

#[test]
fn forward_runs_without_programs() {
    let mut runner = TestRunner::builder().render_system("gl2").build().unwrap();
    populate(&runner, true, false).unwrap();

    let (_, commands) = runner.render_frame();
    assert_eq!(draw_count(&commands), 4);
    assert!(!commands
        .iter()
        .any(|c| matches!(c, RecordedCommand::UseProgram { .. } | RecordedCommand::WriteUniform { .. })));
}

#[test]
fn missing_custom_program_falls_back_to_the_stock_one() {
    let mut runner = TestRunner::builder().build().unwrap();
    populate(&runner, false, false).unwrap();
    runner
        .scene()
        .lock()
        .geometry_mut("opaque")
        .unwrap()
        .pass
        .program = Some("nowhere".into());

    let (_, commands) = runner.render_frame();
    assert_eq!(draw_count(&commands), 2);
}

#[test]
fn hidden_nodes_are_not_drawn() {
    let mut runner = TestRunner::builder().build().unwrap();
    populate(&runner, false, false).unwrap();
    {
        let scene = runner.scene();
        let mut scene = scene.lock();
        let node = scene.graph().find("opaque").unwrap();
        scene.graph_mut().set_visible(node, false).unwrap();
    }

    let (_, commands) = runner.render_frame();
    // tone mapping only
    assert_eq!(draw_count(&commands), 1);
}
