use anyhow::{Context, Result};
use castor3d::{
    backend::RecordedCommand,
    scene::{Light, Pass, Scene},
    types::{glam::Vec3, LightKind, Mesh, NodeHandle, SubmeshBuilder},
};

/// A [-1, 1] quad facing +z.
pub fn plane_mesh(name: &str) -> Result<Mesh> {
    let submesh = SubmeshBuilder::new(vec![
        Vec3::new(-1.0, -1.0, 0.0),
        Vec3::new(1.0, -1.0, 0.0),
        Vec3::new(1.0, 1.0, 0.0),
        Vec3::new(-1.0, 1.0, 0.0),
    ])
    .with_normals(vec![Vec3::Z; 4])
    .with_indices(vec![0, 1, 2, 0, 2, 3])
    .build()
    .context("Failed to build the plane")?;

    let mut mesh = Mesh::new(name);
    mesh.submeshes.push(submesh);
    Ok(mesh)
}

/// Adds a plane geometry on a new node at `position`, registering the plane
/// mesh the first time.
pub fn add_plane(scene: &mut Scene, name: &str, position: Vec3, pass: Pass) -> Result<NodeHandle> {
    if scene.mesh("plane").is_none() {
        scene.add_mesh(plane_mesh("plane")?);
    }
    let root = scene.graph().root();
    let node = scene.graph_mut().create_node(Some(name), Some(root))?;
    scene.graph_mut().set_position(node, position)?;
    scene.create_geometry(name, node, "plane")?.pass = pass;
    Ok(node)
}

pub fn add_light(scene: &mut Scene, name: &str, kind: LightKind, casts_shadows: bool) -> Result<NodeHandle> {
    let root = scene.graph().root();
    let node = scene.graph_mut().create_node(Some(name), Some(root))?;
    scene.add_light(Light {
        name: name.into(),
        node,
        kind,
        colour: Vec3::ONE,
        casts_shadows,
    })?;
    Ok(node)
}

pub fn draw_count(commands: &[RecordedCommand]) -> usize {
    commands
        .iter()
        .filter(|c| matches!(c, RecordedCommand::Draw { .. }))
        .count()
}

pub fn blits(commands: &[RecordedCommand]) -> impl Iterator<Item = &RecordedCommand> {
    commands.iter().filter(|c| matches!(c, RecordedCommand::Blit { .. }))
}
