use castor3d::{
    scene::{SceneGraph, ROOT_NODE_NAME},
    types::glam::{Quat, Vec3},
    SceneError,
};

fn chain() -> anyhow::Result<(SceneGraph, [castor3d::types::NodeHandle; 3])> {
    let mut graph = SceneGraph::new();
    let root = graph.create_node(Some("root"), None)?;
    let a = graph.create_node(Some("a"), Some(root))?;
    let b = graph.create_node(Some("b"), Some(a))?;
    graph.set_position(a, Vec3::new(1.0, 0.0, 0.0))?;
    graph.set_position(b, Vec3::new(0.0, 1.0, 0.0))?;
    Ok((graph, [root, a, b]))
}

#[test]
fn translated_root_moves_grandchild() -> anyhow::Result<()> {
    let (mut graph, [root, _, b]) = chain()?;
    assert!(graph.derived_position(b)?.abs_diff_eq(Vec3::new(1.0, 1.0, 0.0), 1e-5));

    graph.translate(root, Vec3::new(10.0, 0.0, 0.0))?;
    assert!(graph.derived_position(b)?.abs_diff_eq(Vec3::new(11.0, 1.0, 0.0), 1e-5));
    Ok(())
}

#[test]
fn ancestor_changes_reach_cached_descendants() -> anyhow::Result<()> {
    let (mut graph, [root, a, b]) = chain()?;
    // fill every cache first
    graph.update();
    graph.derived_transformation_matrix(b)?;

    graph.set_scale(root, Vec3::splat(2.0))?;
    assert!(graph.derived_position(b)?.abs_diff_eq(Vec3::new(2.0, 2.0, 0.0), 1e-5));

    graph.set_orientation(root, Quat::from_rotation_z(std::f32::consts::FRAC_PI_2))?;
    assert!(graph.derived_position(b)?.abs_diff_eq(Vec3::new(-2.0, 2.0, 0.0), 1e-4));

    graph.set_position(a, Vec3::ZERO)?;
    graph.update();
    let world = graph.derived_transformation_matrix(b)?;
    assert!(world.w_axis.truncate().abs_diff_eq(Vec3::new(-2.0, 0.0, 0.0), 1e-4));
    Ok(())
}

#[test]
fn reparenting_keeps_local_transform() -> anyhow::Result<()> {
    let (mut graph, [_, a, b]) = chain()?;
    let other = graph.create_node(Some("other"), None)?;
    graph.set_position(other, Vec3::new(0.0, 0.0, 5.0))?;
    graph.attach_to(b, other)?;

    assert!(!graph.has_child(a, b));
    assert!(graph.has_child(other, b));
    assert!(graph.derived_position(b)?.abs_diff_eq(Vec3::new(0.0, 1.0, 5.0), 1e-5));
    assert_eq!(graph.node(b).and_then(|n| n.parent()), Some(other));
    Ok(())
}

#[test]
fn attaching_to_a_descendant_is_refused() -> anyhow::Result<()> {
    let (mut graph, [root, _, b]) = chain()?;
    assert!(matches!(graph.attach_to(root, b), Err(SceneError::Cycle { .. })));
    assert!(matches!(graph.attach_to(root, root), Err(SceneError::Cycle { .. })));

    let scene_root = graph.find(ROOT_NODE_NAME).expect("root node");
    assert!(matches!(graph.attach_to(scene_root, b), Err(SceneError::RootNode)));
    Ok(())
}

#[test]
fn hidden_parent_hides_children() -> anyhow::Result<()> {
    let (mut graph, [root, a, b]) = chain()?;
    assert!(graph.is_visible(b));
    graph.set_visible(a, false)?;
    assert!(!graph.is_visible(b));
    assert!(graph.is_visible(root));
    Ok(())
}
