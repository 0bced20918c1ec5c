//! Scene contents: the node graph and the objects hanging off it.

use castor3d_types::{BlendMode, BufferHandle, LightKind, Mesh, MovableKind, NodeHandle, Submesh};
use glam::{Mat4, UVec2, Vec3, Vec4};

use crate::{
    backend::{BufferDescriptor, BufferUsage, RenderSystem},
    event::{CpuResource, GpuResource},
    format_sso,
    shader::ShaderProgram,
    util::typedefs::{FastIndexMap, SsoString},
    SceneError,
};

mod node;

pub use node::{SceneGraph, SceneNode, ROOT_NODE_NAME};

/// Material of a geometry: how it is shaded and how it blends.
#[derive(Debug, Clone, PartialEq)]
pub struct Pass {
    pub colour: Vec4,
    /// Below 1 the pass goes through the transparent stage.
    pub opacity: f32,
    pub colour_blend_mode: BlendMode,
    pub alpha_blend_mode: BlendMode,
    pub two_sided: bool,
    /// Name of a scene shader program replacing the stock one.
    pub program: Option<SsoString>,
}

impl Default for Pass {
    fn default() -> Self {
        Self {
            colour: Vec4::ONE,
            opacity: 1.0,
            colour_blend_mode: BlendMode::NoBlend,
            alpha_blend_mode: BlendMode::default(),
            two_sided: false,
            program: None,
        }
    }
}

impl Pass {
    pub fn is_transparent(&self) -> bool {
        self.opacity < 1.0
    }
}

/// A mesh placed in the scene.
#[derive(Debug, Clone)]
pub struct Geometry {
    pub name: SsoString,
    pub node: NodeHandle,
    pub mesh: SsoString,
    pub pass: Pass,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    pub name: SsoString,
    pub node: NodeHandle,
    pub projection: Mat4,
    pub viewport: UVec2,
}

impl Camera {
    /// Right handed perspective camera, angle in radians.
    pub fn perspective(name: impl Into<SsoString>, node: NodeHandle, fov_y: f32, viewport: UVec2) -> Self {
        let aspect = viewport.x.max(1) as f32 / viewport.y.max(1) as f32;
        Self {
            name: name.into(),
            node,
            projection: Mat4::perspective_rh(fov_y, aspect, 0.1, 1000.0),
            viewport,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Light {
    pub name: SsoString,
    pub node: NodeHandle,
    pub kind: LightKind,
    pub colour: Vec3,
    pub casts_shadows: bool,
}

/// Render system buffers of one submesh.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SubmeshBuffers {
    pub vertices: BufferHandle,
    pub indices: Option<BufferHandle>,
    pub count: u32,
}

/// Interleaved position, normal and uv of one vertex.
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
struct GpuVertex {
    position: [f32; 3],
    normal: [f32; 3],
    uv: [f32; 2],
}

impl SubmeshBuffers {
    fn upload(render_system: &mut dyn RenderSystem, label: &str, submesh: &Submesh) -> Self {
        let vertices: Vec<GpuVertex> = (0..submesh.vertex_count())
            .map(|i| GpuVertex {
                position: submesh.positions[i].to_array(),
                normal: submesh.normals.get(i).copied().unwrap_or(Vec3::Z).to_array(),
                uv: submesh.uvs.get(i).map_or([0.0; 2], |uv| uv.to_array()),
            })
            .collect();
        let vertex_bytes: &[u8] = bytemuck::cast_slice(&vertices);
        let vertex_buffer = render_system.create_buffer(&BufferDescriptor {
            label: Some(format_sso!("{} vertices", label)),
            size: vertex_bytes.len(),
            usage: BufferUsage::VERTEX,
        });
        render_system.write_buffer(vertex_buffer, 0, vertex_bytes);

        let (indices, count) = if submesh.indices.is_empty() {
            (None, submesh.vertex_count() as u32)
        } else {
            let index_bytes: &[u8] = bytemuck::cast_slice(&submesh.indices);
            let index_buffer = render_system.create_buffer(&BufferDescriptor {
                label: Some(format_sso!("{} indices", label)),
                size: index_bytes.len(),
                usage: BufferUsage::INDEX,
            });
            render_system.write_buffer(index_buffer, 0, index_bytes);
            (Some(index_buffer), submesh.indices.len() as u32)
        };

        Self {
            vertices: vertex_buffer,
            indices,
            count,
        }
    }

    fn destroy(self, render_system: &mut dyn RenderSystem) {
        render_system.destroy_buffer(self.vertices);
        if let Some(indices) = self.indices {
            render_system.destroy_buffer(indices);
        }
    }
}

/// Everything drawn by one render target: a node graph, meshes, programs,
/// the geometries placing meshes on nodes, lights and the camera.
#[derive(Debug)]
pub struct Scene {
    name: SsoString,
    graph: SceneGraph,
    meshes: FastIndexMap<SsoString, Mesh>,
    mesh_buffers: FastIndexMap<SsoString, Vec<SubmeshBuffers>>,
    /// Buffers of replaced meshes, destroyed at the next initialise or
    /// cleanup.
    retired_buffers: Vec<SubmeshBuffers>,
    programs: FastIndexMap<SsoString, ShaderProgram>,
    geometries: FastIndexMap<SsoString, Geometry>,
    lights: FastIndexMap<SsoString, Light>,
    camera: Option<Camera>,
    pub ambient_light: Vec4,
    pub background_colour: Vec4,
}

impl Scene {
    pub fn new(name: impl Into<SsoString>) -> Self {
        Self {
            name: name.into(),
            graph: SceneGraph::new(),
            meshes: FastIndexMap::default(),
            mesh_buffers: FastIndexMap::default(),
            retired_buffers: Vec::new(),
            programs: FastIndexMap::default(),
            geometries: FastIndexMap::default(),
            lights: FastIndexMap::default(),
            camera: None,
            ambient_light: Vec4::new(0.0, 0.0, 0.0, 1.0),
            background_colour: Vec4::new(0.0, 0.0, 0.0, 1.0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<SsoString>) {
        self.name = name.into();
    }

    pub fn graph(&self) -> &SceneGraph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut SceneGraph {
        &mut self.graph
    }

    /// Recomputes the world matrices of every stale node.
    pub fn update(&mut self) -> usize {
        self.graph.update()
    }

    /// Adds or replaces a mesh. A replaced mesh is uploaded again by the
    /// next [`Self::initialise`].
    pub fn add_mesh(&mut self, mesh: Mesh) {
        if self.meshes.contains_key(mesh.name.as_str()) {
            log::warn!("Scene {:?}: replacing mesh {:?}", self.name, mesh.name);
            if let Some(old) = self.mesh_buffers.shift_remove(mesh.name.as_str()) {
                self.retired_buffers.extend(old);
            }
        }
        self.meshes.insert(SsoString::from(mesh.name.as_str()), mesh);
    }

    pub fn mesh(&self, name: &str) -> Option<&Mesh> {
        self.meshes.get(name)
    }

    pub fn meshes(&self) -> impl Iterator<Item = &Mesh> {
        self.meshes.values()
    }

    pub fn mesh_buffers(&self, name: &str) -> Option<&[SubmeshBuffers]> {
        self.mesh_buffers.get(name).map(Vec::as_slice)
    }

    pub fn add_program(&mut self, program: ShaderProgram) {
        self.programs.insert(SsoString::from(program.name()), program);
    }

    pub fn program(&self, name: &str) -> Option<&ShaderProgram> {
        self.programs.get(name)
    }

    pub fn program_mut(&mut self, name: &str) -> Option<&mut ShaderProgram> {
        self.programs.get_mut(name)
    }

    pub fn programs(&self) -> impl Iterator<Item = &ShaderProgram> {
        self.programs.values()
    }

    /// Places `mesh` on `node`. The mesh doesn't need to exist yet.
    pub fn create_geometry(&mut self, name: &str, node: NodeHandle, mesh: &str) -> Result<&mut Geometry, SceneError> {
        if self.graph.node(node).is_none() {
            return Err(SceneError::UnknownNode {
                name: format_sso!("#{}", node.idx),
            });
        }
        self.graph.attach_object(node, MovableKind::Geometry, name)?;
        let geometry = Geometry {
            name: name.into(),
            node,
            mesh: mesh.into(),
            pass: Pass::default(),
        };
        let entry = self.geometries.entry(name.into());
        Ok(match entry {
            indexmap::map::Entry::Occupied(mut occupied) => {
                occupied.insert(geometry);
                occupied.into_mut()
            }
            indexmap::map::Entry::Vacant(vacant) => vacant.insert(geometry),
        })
    }

    pub fn geometry(&self, name: &str) -> Option<&Geometry> {
        self.geometries.get(name)
    }

    pub fn geometry_mut(&mut self, name: &str) -> Option<&mut Geometry> {
        self.geometries.get_mut(name)
    }

    pub fn geometries(&self) -> impl Iterator<Item = &Geometry> {
        self.geometries.values()
    }

    pub fn remove_geometry(&mut self, name: &str) -> Option<Geometry> {
        let geometry = self.geometries.shift_remove(name)?;
        if let Err(e) = self.graph.detach_object(geometry.node, MovableKind::Geometry, name) {
            log::warn!("Scene {:?}: geometry {:?} had no node to detach from: {}", self.name, name, e);
        }
        Some(geometry)
    }

    /// Removes a node along with the geometries, lights and camera attached
    /// to it. Its children stay in the graph, without a parent.
    pub fn remove_node(&mut self, handle: NodeHandle) -> Result<SceneNode, SceneError> {
        let node = self.graph.remove_node(handle)?;
        for (kind, name) in node.objects() {
            let removed = match kind {
                MovableKind::Geometry => self.geometries.shift_remove(name).is_some(),
                MovableKind::Light => self.lights.shift_remove(name).is_some(),
                MovableKind::Camera => {
                    let attached = self.camera.as_ref().map_or(false, |camera| camera.name.as_str() == name);
                    if attached {
                        self.camera = None;
                    }
                    attached
                }
            };
            if removed {
                log::debug!("Scene {:?}: dropped {:?} {:?} with node {:?}", self.name, kind, name, node.name());
            }
        }
        Ok(node)
    }

    pub fn add_light(&mut self, light: Light) -> Result<(), SceneError> {
        self.graph.attach_object(light.node, MovableKind::Light, &light.name)?;
        self.lights.insert(light.name.clone(), light);
        Ok(())
    }

    pub fn light(&self, name: &str) -> Option<&Light> {
        self.lights.get(name)
    }

    pub fn lights(&self) -> impl Iterator<Item = &Light> {
        self.lights.values()
    }

    pub fn set_camera(&mut self, camera: Camera) -> Result<(), SceneError> {
        self.graph.attach_object(camera.node, MovableKind::Camera, &camera.name)?;
        if let Some(old) = self.camera.replace(camera) {
            if let Err(e) = self.graph.detach_object(old.node, MovableKind::Camera, &old.name) {
                log::warn!("Scene {:?}: camera {:?} had no node to detach from: {}", self.name, old.name, e);
            }
        }
        Ok(())
    }

    pub fn camera(&self) -> Option<&Camera> {
        self.camera.as_ref()
    }

    /// View matrix of the camera, or identity without one. Call after
    /// [`Self::update`].
    pub fn view_matrix(&mut self) -> Mat4 {
        let Some(node) = self.camera.as_ref().map(|c| c.node) else {
            return Mat4::IDENTITY;
        };
        self.graph
            .derived_transformation_matrix(node)
            .map_or(Mat4::IDENTITY, |world| world.inverse())
    }

    /// Uploads the meshes which have no buffers yet and initialises the
    /// scene's programs. Failures are logged and skipped.
    pub fn initialise(&mut self, render_system: &mut dyn RenderSystem) -> bool {
        profiling::scope!("Scene::initialise");

        for buffers in self.retired_buffers.drain(..) {
            buffers.destroy(render_system);
        }

        for (name, mesh) in &self.meshes {
            if self.mesh_buffers.contains_key(name) {
                continue;
            }
            let buffers = mesh
                .submeshes
                .iter()
                .enumerate()
                .map(|(i, submesh)| SubmeshBuffers::upload(render_system, &format_sso!("{}[{}]", name, i), submesh))
                .collect();
            self.mesh_buffers.insert(name.clone(), buffers);
        }

        let mut success = true;
        if render_system.use_shaders() {
            for program in self.programs.values_mut() {
                if let Err(error) = program.initialise(render_system) {
                    log::error!("Scene {:?}: {}", self.name, error);
                    success = false;
                }
            }
        }
        success && render_system.check_error("Scene::initialise")
    }

    pub fn cleanup(&mut self, render_system: &mut dyn RenderSystem) {
        for buffers in self.retired_buffers.drain(..) {
            buffers.destroy(render_system);
        }
        for (_, buffers) in self.mesh_buffers.drain(..) {
            buffers.into_iter().for_each(|b| b.destroy(render_system));
        }
        if render_system.use_shaders() {
            for program in self.programs.values_mut() {
                program.cleanup(render_system);
            }
        }
    }
}

impl GpuResource for Scene {
    fn initialise(&mut self, render_system: &mut dyn RenderSystem) -> bool {
        Scene::initialise(self, render_system)
    }

    fn cleanup(&mut self, render_system: &mut dyn RenderSystem) {
        Scene::cleanup(self, render_system)
    }
}

impl CpuResource for Scene {
    /// Drops every object and node, keeping the root.
    fn cleanup(&mut self) {
        if !self.mesh_buffers.is_empty() || !self.retired_buffers.is_empty() {
            log::warn!("Scene {:?} cleared while render system buffers are alive", self.name);
        }
        self.geometries.clear();
        self.lights.clear();
        self.camera = None;
        self.meshes.clear();
        self.programs.clear();
        self.graph = SceneGraph::new();
    }
}

#[cfg(test)]
mod tests {
    use castor3d_types::{LightKind, Mesh, MovableKind, SubmeshBuilder};
    use glam::{UVec2, Vec3};

    use super::{Camera, Light, Scene};
    use crate::{
        backend::{Device, Gl3Backend, RenderSystem},
        RenderSystemOptions,
    };

    fn triangle() -> Mesh {
        let mut mesh = Mesh::new("triangle");
        mesh.submeshes.push(
            SubmeshBuilder::new(vec![Vec3::ZERO, Vec3::X, Vec3::Y])
                .with_indices(vec![0, 1, 2])
                .build()
                .unwrap(),
        );
        mesh
    }

    #[test]
    fn geometry_is_attached_to_its_node() {
        let mut scene = Scene::new("test");
        let node = scene.graph_mut().create_node(Some("n"), None).unwrap();
        scene.create_geometry("g", node, "triangle").unwrap().pass.opacity = 0.5;

        let objects: Vec<_> = scene.graph().node(node).unwrap().objects().collect();
        assert_eq!(objects, vec![(MovableKind::Geometry, "g")]);
        assert!(scene.geometry("g").unwrap().pass.is_transparent());

        scene.remove_geometry("g").unwrap();
        assert_eq!(scene.graph().node(node).unwrap().objects().count(), 0);
    }

    #[test]
    fn removing_a_node_drops_its_objects() {
        let mut scene = Scene::new("test");
        let node = scene.graph_mut().create_node(Some("n"), None).unwrap();
        let child = scene.graph_mut().create_node(Some("child"), Some(node)).unwrap();
        scene.create_geometry("g", node, "triangle").unwrap();
        scene.create_geometry("kept", child, "triangle").unwrap();
        scene
            .add_light(Light {
                name: "sun".into(),
                node,
                kind: LightKind::Directional,
                colour: Vec3::ONE,
                casts_shadows: false,
            })
            .unwrap();
        scene
            .set_camera(Camera::perspective("main", node, 1.0, UVec2::new(64, 64)))
            .unwrap();

        scene.remove_node(node).unwrap();
        assert!(scene.geometry("g").is_none());
        assert!(scene.light("sun").is_none());
        assert!(scene.camera().is_none());
        assert_eq!(scene.geometry("kept").unwrap().node, child);

        // the freed slot is reused without reviving the removed objects
        let replacement = scene.graph_mut().create_node(Some("replacement"), None).unwrap();
        assert_ne!(replacement, node);
        assert_eq!(scene.geometries().count(), 1);
        assert!(scene.create_geometry("late", node, "triangle").is_err());
        assert!(scene.remove_geometry("kept").is_some());
    }

    #[test]
    fn meshes_are_uploaded_once() {
        let mut device = Device::new(Gl3Backend::new(), &RenderSystemOptions::default());
        let mut scene = Scene::new("test");
        scene.add_mesh(triangle());

        assert!(scene.initialise(&mut device));
        let buffers = scene.mesh_buffers("triangle").unwrap().to_vec();
        assert_eq!(buffers.len(), 1);
        assert_eq!(buffers[0].count, 3);
        assert!(buffers[0].indices.is_some());

        assert!(scene.initialise(&mut device));
        assert_eq!(scene.mesh_buffers("triangle").unwrap(), buffers.as_slice());

        scene.cleanup(&mut device);
        assert!(scene.mesh_buffers("triangle").is_none());
        device.cleanup();
    }
}
