use std::path::{Path, PathBuf};

use castor3d_types::{
    BlendMode, LightKind, Mesh, NodeHandle, ShaderType, ShaderTypeFlags, SubmeshBuilder, VariableType,
};
use glam::{Quat, UVec2, Vec2, Vec3, Vec4};

use crate::{
    parse::{Directive, FileParser, ParseReport, Section},
    scene::{Camera, Light, Pass, Scene},
    shader::ShaderProgram,
    util::typedefs::SsoString,
    ParseError,
};

/// Sections of a scene file.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum SceneSection {
    Root,
    Scene,
    Node,
    Mesh,
    Submesh,
    Geometry,
    Camera,
    Light,
    ShaderProgram,
    ConstantsBuffer,
    Variable,
}

impl Section for SceneSection {
    const ROOT: Self = Self::Root;

    fn name(self) -> &'static str {
        match self {
            Self::Root => "Root",
            Self::Scene => "scene",
            Self::Node => "scene_node",
            Self::Mesh => "mesh",
            Self::Submesh => "submesh",
            Self::Geometry => "geometry",
            Self::Camera => "camera",
            Self::Light => "light",
            Self::ShaderProgram => "shader_program",
            Self::ConstantsBuffer => "constants_buffer",
            Self::Variable => "variable",
        }
    }
}

#[derive(Debug, Default)]
struct SubmeshDecl {
    positions: Vec<Vec3>,
    normals: Vec<Vec3>,
    uvs: Vec<Vec2>,
    indices: Vec<u32>,
}

#[derive(Debug)]
struct GeometryDecl {
    name: SsoString,
    node: Option<NodeHandle>,
    mesh: Option<SsoString>,
    pass: Pass,
}

#[derive(Debug)]
struct CameraDecl {
    name: SsoString,
    node: Option<NodeHandle>,
    fov_y: f32,
    viewport: UVec2,
}

#[derive(Debug)]
struct LightDecl {
    name: SsoString,
    node: Option<NodeHandle>,
    kind: LightKind,
    colour: Vec3,
    casts_shadows: bool,
}

#[derive(Debug)]
struct VariableDecl {
    name: SsoString,
    ty: Option<VariableType>,
    count: usize,
    stage: ShaderType,
    values: Vec<String>,
}

/// State threaded through the scene file directives.
#[derive(Debug)]
pub struct SceneFileContext {
    pub scene: Scene,
    base_dir: PathBuf,
    node: Option<NodeHandle>,
    mesh: Option<Mesh>,
    submesh: Option<SubmeshDecl>,
    geometry: Option<GeometryDecl>,
    camera: Option<CameraDecl>,
    light: Option<LightDecl>,
    program: Option<ShaderProgram>,
    buffer: Option<SsoString>,
    variable: Option<VariableDecl>,
}

impl SceneFileContext {
    pub fn new(scene: Scene, base_dir: impl Into<PathBuf>) -> Self {
        Self {
            scene,
            base_dir: base_dir.into(),
            node: None,
            mesh: None,
            submesh: None,
            geometry: None,
            camera: None,
            light: None,
            program: None,
            buffer: None,
            variable: None,
        }
    }

    fn find_node(&self, directive: &Directive<'_>) -> Result<NodeHandle> {
        Ok(self.scene.graph().find_or_err(directive.name_param()?)?)
    }
}

type Result<T> = std::result::Result<T, ParseError>;

fn colour(directive: &Directive<'_>) -> Result<Vec4> {
    Ok(Vec4::from_array(directive.numbers::<f32, 4>(3, 1.0)?))
}

fn vec3(directive: &Directive<'_>) -> Result<Vec3> {
    Ok(Vec3::from_array(directive.numbers::<f32, 3>(3, 0.0)?))
}

// Root

fn root_scene(ctx: &mut SceneFileContext, d: &mut Directive<'_>) -> Result<Option<SceneSection>> {
    if let Some(name) = d.optional_name_param() {
        ctx.scene.set_name(name);
    }
    Ok(Some(SceneSection::Scene))
}

fn root_mesh(ctx: &mut SceneFileContext, d: &mut Directive<'_>) -> Result<Option<SceneSection>> {
    ctx.mesh = Some(Mesh::new(d.name_param()?));
    Ok(Some(SceneSection::Mesh))
}

// Scene

fn scene_node(ctx: &mut SceneFileContext, d: &mut Directive<'_>) -> Result<Option<SceneSection>> {
    ctx.node = Some(ctx.scene.graph_mut().create_node(d.optional_name_param(), None)?);
    Ok(Some(SceneSection::Node))
}

fn scene_geometry(ctx: &mut SceneFileContext, d: &mut Directive<'_>) -> Result<Option<SceneSection>> {
    ctx.geometry = Some(GeometryDecl {
        name: d.name_param()?.into(),
        node: None,
        mesh: None,
        pass: Pass::default(),
    });
    Ok(Some(SceneSection::Geometry))
}

fn scene_camera(ctx: &mut SceneFileContext, d: &mut Directive<'_>) -> Result<Option<SceneSection>> {
    ctx.camera = Some(CameraDecl {
        name: d.name_param()?.into(),
        node: None,
        fov_y: 45.0,
        viewport: UVec2::new(1280, 720),
    });
    Ok(Some(SceneSection::Camera))
}

fn scene_light(ctx: &mut SceneFileContext, d: &mut Directive<'_>) -> Result<Option<SceneSection>> {
    ctx.light = Some(LightDecl {
        name: d.name_param()?.into(),
        node: None,
        kind: LightKind::Point,
        colour: Vec3::ONE,
        casts_shadows: false,
    });
    Ok(Some(SceneSection::Light))
}

fn scene_ambient_light(ctx: &mut SceneFileContext, d: &mut Directive<'_>) -> Result<Option<SceneSection>> {
    ctx.scene.ambient_light = colour(d)?;
    Ok(None)
}

fn scene_background_colour(ctx: &mut SceneFileContext, d: &mut Directive<'_>) -> Result<Option<SceneSection>> {
    ctx.scene.background_colour = colour(d)?;
    Ok(None)
}

fn scene_shader_program(ctx: &mut SceneFileContext, d: &mut Directive<'_>) -> Result<Option<SceneSection>> {
    ctx.program = Some(ShaderProgram::new(d.name_param()?));
    Ok(Some(SceneSection::ShaderProgram))
}

// Node

fn current_node(ctx: &SceneFileContext, d: &Directive<'_>) -> Result<NodeHandle> {
    ctx.node.ok_or_else(|| d.invalid("no node is being defined"))
}

fn node_parent(ctx: &mut SceneFileContext, d: &mut Directive<'_>) -> Result<Option<SceneSection>> {
    let node = current_node(ctx, d)?;
    let parent = ctx.find_node(d)?;
    ctx.scene.graph_mut().attach_to(node, parent)?;
    Ok(None)
}

fn node_position(ctx: &mut SceneFileContext, d: &mut Directive<'_>) -> Result<Option<SceneSection>> {
    let node = current_node(ctx, d)?;
    ctx.scene.graph_mut().set_position(node, vec3(d)?)?;
    Ok(None)
}

/// `orientation x y z degrees`, an axis and an angle.
fn node_orientation(ctx: &mut SceneFileContext, d: &mut Directive<'_>) -> Result<Option<SceneSection>> {
    let node = current_node(ctx, d)?;
    let [x, y, z, degrees] = d.numbers::<f32, 4>(4, 0.0)?;
    let axis = Vec3::new(x, y, z);
    if axis.length_squared() == 0.0 {
        return Err(d.invalid("rotation axis is zero"));
    }
    let orientation = Quat::from_axis_angle(axis.normalize(), degrees.to_radians());
    ctx.scene.graph_mut().set_orientation(node, orientation)?;
    Ok(None)
}

fn node_scale(ctx: &mut SceneFileContext, d: &mut Directive<'_>) -> Result<Option<SceneSection>> {
    let node = current_node(ctx, d)?;
    ctx.scene.graph_mut().set_scale(node, vec3(d)?)?;
    Ok(None)
}

fn node_end(ctx: &mut SceneFileContext, _: &mut Directive<'_>) -> Result<()> {
    ctx.node = None;
    Ok(())
}

// Mesh

fn mesh_submesh(ctx: &mut SceneFileContext, d: &mut Directive<'_>) -> Result<Option<SceneSection>> {
    if ctx.mesh.is_none() {
        return Err(d.invalid("no mesh is being defined"));
    }
    ctx.submesh = Some(SubmeshDecl::default());
    Ok(Some(SceneSection::Submesh))
}

fn mesh_end(ctx: &mut SceneFileContext, _: &mut Directive<'_>) -> Result<()> {
    if let Some(mesh) = ctx.mesh.take() {
        ctx.scene.add_mesh(mesh);
    }
    Ok(())
}

// Submesh

fn current_submesh<'a>(ctx: &'a mut SceneFileContext, d: &Directive<'_>) -> Result<&'a mut SubmeshDecl> {
    ctx.submesh.as_mut().ok_or_else(|| d.invalid("no submesh is being defined"))
}

fn submesh_vertex(ctx: &mut SceneFileContext, d: &mut Directive<'_>) -> Result<Option<SceneSection>> {
    let position = vec3(d)?;
    current_submesh(ctx, d)?.positions.push(position);
    Ok(None)
}

fn submesh_normal(ctx: &mut SceneFileContext, d: &mut Directive<'_>) -> Result<Option<SceneSection>> {
    let normal = vec3(d)?;
    current_submesh(ctx, d)?.normals.push(normal);
    Ok(None)
}

fn submesh_uv(ctx: &mut SceneFileContext, d: &mut Directive<'_>) -> Result<Option<SceneSection>> {
    let uv = Vec2::from_array(d.numbers::<f32, 2>(2, 0.0)?);
    current_submesh(ctx, d)?.uvs.push(uv);
    Ok(None)
}

/// `face a b c` or `face a b c d`. Quads become two triangles.
fn submesh_face(ctx: &mut SceneFileContext, d: &mut Directive<'_>) -> Result<Option<SceneSection>> {
    let tokens = d.tokens().count();
    let [a, b, c, e] = d.numbers::<u32, 4>(3, 0)?;
    let submesh = current_submesh(ctx, d)?;
    submesh.indices.extend_from_slice(&[a, b, c]);
    if tokens == 4 {
        submesh.indices.extend_from_slice(&[a, c, e]);
    }
    Ok(None)
}

fn submesh_end(ctx: &mut SceneFileContext, d: &mut Directive<'_>) -> Result<()> {
    let Some(decl) = ctx.submesh.take() else {
        return Ok(());
    };
    let vertex_count = decl.positions.len();
    let mut builder = SubmeshBuilder::new(decl.positions);
    if !decl.indices.is_empty() {
        builder = builder.with_indices(decl.indices);
    }
    if !decl.normals.is_empty() {
        if decl.normals.len() == vertex_count {
            builder = builder.with_normals(decl.normals);
        } else {
            d.warn(d.invalid(format!(
                "{} normals for {} vertices, computing them instead",
                decl.normals.len(),
                vertex_count
            )));
        }
    }
    if !decl.uvs.is_empty() {
        builder = builder.with_uvs(decl.uvs);
    }
    let submesh = builder.build()?;
    match &mut ctx.mesh {
        Some(mesh) => mesh.submeshes.push(submesh),
        None => return Err(d.invalid("submesh outside of a mesh")),
    }
    Ok(())
}

// Geometry

fn current_geometry<'a>(ctx: &'a mut SceneFileContext, d: &Directive<'_>) -> Result<&'a mut GeometryDecl> {
    ctx.geometry.as_mut().ok_or_else(|| d.invalid("no geometry is being defined"))
}

fn geometry_parent(ctx: &mut SceneFileContext, d: &mut Directive<'_>) -> Result<Option<SceneSection>> {
    let node = ctx.find_node(d)?;
    current_geometry(ctx, d)?.node = Some(node);
    Ok(None)
}

fn geometry_mesh(ctx: &mut SceneFileContext, d: &mut Directive<'_>) -> Result<Option<SceneSection>> {
    let name = d.name_param()?;
    if ctx.scene.mesh(name).is_none() {
        d.warn(d.invalid(format!("mesh {:?} isn't defined yet", name)));
    }
    current_geometry(ctx, d)?.mesh = Some(name.into());
    Ok(None)
}

fn geometry_opacity(ctx: &mut SceneFileContext, d: &mut Directive<'_>) -> Result<Option<SceneSection>> {
    let opacity: f32 = d.parse()?;
    current_geometry(ctx, d)?.pass.opacity = opacity.clamp(0.0, 1.0);
    Ok(None)
}

/// `blend_mode colour [alpha]`. A single mode is used for both.
fn geometry_blend_mode(ctx: &mut SceneFileContext, d: &mut Directive<'_>) -> Result<Option<SceneSection>> {
    let mut modes = d.tokens().map(|token| {
        BlendMode::from_name(token).ok_or_else(|| d.invalid(format!("unknown blend mode {:?}", token)))
    });
    let colour = modes.next().ok_or_else(|| d.invalid("expected a blend mode"))??;
    let alpha = modes.next().transpose()?.unwrap_or(colour);
    let pass = &mut current_geometry(ctx, d)?.pass;
    pass.colour_blend_mode = colour;
    pass.alpha_blend_mode = alpha;
    Ok(None)
}

fn geometry_two_sided(ctx: &mut SceneFileContext, d: &mut Directive<'_>) -> Result<Option<SceneSection>> {
    let two_sided = d.boolean()?;
    current_geometry(ctx, d)?.pass.two_sided = two_sided;
    Ok(None)
}

fn geometry_colour(ctx: &mut SceneFileContext, d: &mut Directive<'_>) -> Result<Option<SceneSection>> {
    let colour = colour(d)?;
    current_geometry(ctx, d)?.pass.colour = colour;
    Ok(None)
}

fn geometry_shader_program(ctx: &mut SceneFileContext, d: &mut Directive<'_>) -> Result<Option<SceneSection>> {
    let name = d.name_param()?;
    if ctx.scene.program(name).is_none() {
        d.warn(d.invalid(format!("shader program {:?} isn't defined yet", name)));
    }
    current_geometry(ctx, d)?.pass.program = Some(name.into());
    Ok(None)
}

fn geometry_end(ctx: &mut SceneFileContext, d: &mut Directive<'_>) -> Result<()> {
    let Some(decl) = ctx.geometry.take() else {
        return Ok(());
    };
    let mesh = decl
        .mesh
        .ok_or_else(|| d.invalid(format!("geometry {:?} has no mesh", decl.name)))?;
    let node = decl.node.unwrap_or_else(|| ctx.scene.graph().root());
    ctx.scene.create_geometry(&decl.name, node, &mesh)?.pass = decl.pass;
    Ok(())
}

// Camera

fn current_camera<'a>(ctx: &'a mut SceneFileContext, d: &Directive<'_>) -> Result<&'a mut CameraDecl> {
    ctx.camera.as_mut().ok_or_else(|| d.invalid("no camera is being defined"))
}

fn camera_parent(ctx: &mut SceneFileContext, d: &mut Directive<'_>) -> Result<Option<SceneSection>> {
    let node = ctx.find_node(d)?;
    current_camera(ctx, d)?.node = Some(node);
    Ok(None)
}

fn camera_viewport(ctx: &mut SceneFileContext, d: &mut Directive<'_>) -> Result<Option<SceneSection>> {
    let viewport = UVec2::from_array(d.numbers::<u32, 2>(2, 0)?);
    current_camera(ctx, d)?.viewport = viewport;
    Ok(None)
}

/// Vertical field of view, in degrees.
fn camera_fov(ctx: &mut SceneFileContext, d: &mut Directive<'_>) -> Result<Option<SceneSection>> {
    let fov: f32 = d.parse()?;
    current_camera(ctx, d)?.fov_y = fov;
    Ok(None)
}

fn camera_end(ctx: &mut SceneFileContext, _: &mut Directive<'_>) -> Result<()> {
    let Some(decl) = ctx.camera.take() else {
        return Ok(());
    };
    let node = decl.node.unwrap_or_else(|| ctx.scene.graph().root());
    ctx.scene
        .set_camera(Camera::perspective(decl.name, node, decl.fov_y.to_radians(), decl.viewport))?;
    Ok(())
}

// Light

fn current_light<'a>(ctx: &'a mut SceneFileContext, d: &Directive<'_>) -> Result<&'a mut LightDecl> {
    ctx.light.as_mut().ok_or_else(|| d.invalid("no light is being defined"))
}

fn light_parent(ctx: &mut SceneFileContext, d: &mut Directive<'_>) -> Result<Option<SceneSection>> {
    let node = ctx.find_node(d)?;
    current_light(ctx, d)?.node = Some(node);
    Ok(None)
}

fn light_type(ctx: &mut SceneFileContext, d: &mut Directive<'_>) -> Result<Option<SceneSection>> {
    let kind = match d.name_param()? {
        "directional" => LightKind::Directional,
        "point" => LightKind::Point,
        "spot" => LightKind::Spot,
        other => return Err(d.invalid(format!("unknown light type {:?}", other))),
    };
    current_light(ctx, d)?.kind = kind;
    Ok(None)
}

fn light_colour(ctx: &mut SceneFileContext, d: &mut Directive<'_>) -> Result<Option<SceneSection>> {
    let colour = vec3(d)?;
    current_light(ctx, d)?.colour = colour;
    Ok(None)
}

fn light_shadows(ctx: &mut SceneFileContext, d: &mut Directive<'_>) -> Result<Option<SceneSection>> {
    let shadows = d.boolean()?;
    current_light(ctx, d)?.casts_shadows = shadows;
    Ok(None)
}

fn light_end(ctx: &mut SceneFileContext, _: &mut Directive<'_>) -> Result<()> {
    let Some(decl) = ctx.light.take() else {
        return Ok(());
    };
    let node = decl.node.unwrap_or_else(|| ctx.scene.graph().root());
    ctx.scene.add_light(Light {
        name: decl.name,
        node,
        kind: decl.kind,
        colour: decl.colour,
        casts_shadows: decl.casts_shadows,
    })?;
    Ok(())
}

// Shader program

fn current_program<'a>(ctx: &'a mut SceneFileContext, d: &Directive<'_>) -> Result<&'a mut ShaderProgram> {
    ctx.program.as_mut().ok_or_else(|| d.invalid("no shader program is being defined"))
}

fn read_source(base_dir: &Path, d: &Directive<'_>) -> Result<String> {
    let path = base_dir.join(d.name_param()?);
    std::fs::read_to_string(&path).map_err(|source| ParseError::Io { path, source })
}

fn program_vertex(ctx: &mut SceneFileContext, d: &mut Directive<'_>) -> Result<Option<SceneSection>> {
    let source = read_source(&ctx.base_dir, d)?;
    current_program(ctx, d)?.set_source(ShaderType::Vertex, source);
    Ok(None)
}

fn program_pixel(ctx: &mut SceneFileContext, d: &mut Directive<'_>) -> Result<Option<SceneSection>> {
    let source = read_source(&ctx.base_dir, d)?;
    current_program(ctx, d)?.set_source(ShaderType::Pixel, source);
    Ok(None)
}

fn program_constants_buffer(ctx: &mut SceneFileContext, d: &mut Directive<'_>) -> Result<Option<SceneSection>> {
    let name = d.name_param()?;
    current_program(ctx, d)?.create_frame_variable_buffer(name, ShaderTypeFlags::VERTEX | ShaderTypeFlags::PIXEL);
    ctx.buffer = Some(name.into());
    Ok(Some(SceneSection::ConstantsBuffer))
}

fn program_variable(ctx: &mut SceneFileContext, d: &mut Directive<'_>) -> Result<Option<SceneSection>> {
    current_program(ctx, d)?;
    ctx.variable = Some(VariableDecl {
        name: d.name_param()?.into(),
        ty: None,
        count: 1,
        stage: ShaderType::Pixel,
        values: Vec::new(),
    });
    Ok(Some(SceneSection::Variable))
}

fn program_end(ctx: &mut SceneFileContext, _: &mut Directive<'_>) -> Result<()> {
    if let Some(program) = ctx.program.take() {
        ctx.scene.add_program(program);
    }
    Ok(())
}

fn buffer_end(ctx: &mut SceneFileContext, _: &mut Directive<'_>) -> Result<()> {
    ctx.buffer = None;
    Ok(())
}

// Variable

fn current_variable<'a>(ctx: &'a mut SceneFileContext, d: &Directive<'_>) -> Result<&'a mut VariableDecl> {
    ctx.variable.as_mut().ok_or_else(|| d.invalid("no variable is being defined"))
}

fn variable_type(ctx: &mut SceneFileContext, d: &mut Directive<'_>) -> Result<Option<SceneSection>> {
    let name = d.name_param()?;
    let ty = VariableType::from_name(name).ok_or_else(|| d.invalid(format!("unknown variable type {:?}", name)))?;
    current_variable(ctx, d)?.ty = Some(ty);
    Ok(None)
}

fn variable_count(ctx: &mut SceneFileContext, d: &mut Directive<'_>) -> Result<Option<SceneSection>> {
    let count: usize = d.parse()?;
    if count == 0 {
        return Err(d.invalid("a variable needs at least one occurrence"));
    }
    current_variable(ctx, d)?.count = count;
    Ok(None)
}

fn variable_stage(ctx: &mut SceneFileContext, d: &mut Directive<'_>) -> Result<Option<SceneSection>> {
    let name = d.name_param()?;
    let stage = ShaderType::ARRAY
        .into_iter()
        .find(|stage| stage.name() == name)
        .ok_or_else(|| d.invalid(format!("unknown shader stage {:?}", name)))?;
    current_variable(ctx, d)?.stage = stage;
    Ok(None)
}

/// One `value` per occurrence, in order.
fn variable_value(ctx: &mut SceneFileContext, d: &mut Directive<'_>) -> Result<Option<SceneSection>> {
    let value = d.params.to_owned();
    current_variable(ctx, d)?.values.push(value);
    Ok(None)
}

fn variable_end(ctx: &mut SceneFileContext, d: &mut Directive<'_>) -> Result<()> {
    let Some(decl) = ctx.variable.take() else {
        return Ok(());
    };
    let ty = decl
        .ty
        .ok_or_else(|| d.invalid(format!("variable {:?} has no type", decl.name)))?;
    let buffer = ctx.buffer.clone();
    let program = current_program(ctx, d)?;
    let variable = match &buffer {
        Some(buffer) => program
            .find_frame_variable_buffer_mut(buffer)
            .ok_or_else(|| d.invalid(format!("constants buffer {:?} is gone", buffer)))?
            .create_variable(decl.name.clone(), ty, decl.count)?,
        None => program.create_frame_variable(decl.name.clone(), ty, decl.count, decl.stage)?,
    };

    let mut rejected = Vec::new();
    for (index, value) in decl.values.iter().enumerate() {
        if !variable.set_str_value(value, index) {
            rejected.push((index, value.clone()));
        }
    }
    for (index, value) in rejected {
        d.warn(d.invalid(format!(
            "value {:?} for slot {} of {} variable {:?} was rejected, keeping the previous one",
            value, index, ty, decl.name
        )));
    }
    Ok(())
}

/// Reads scene files into a [`Scene`].
pub struct SceneFileParser {
    parser: FileParser<SceneSection, SceneFileContext>,
}

impl Default for SceneFileParser {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneFileParser {
    pub fn new() -> Self {
        use SceneSection as S;

        let mut parser = FileParser::new();
        parser
            .add_directive(S::Root, "scene", root_scene)
            .add_directive(S::Root, "mesh", root_mesh)
            .add_directive(S::Scene, "mesh", root_mesh)
            .add_directive(S::Scene, "scene_node", scene_node)
            .add_directive(S::Scene, "geometry", scene_geometry)
            .add_directive(S::Scene, "camera", scene_camera)
            .add_directive(S::Scene, "light", scene_light)
            .add_directive(S::Scene, "ambient_light", scene_ambient_light)
            .add_directive(S::Scene, "background_colour", scene_background_colour)
            .add_directive(S::Scene, "shader_program", scene_shader_program)
            .add_directive(S::Node, "parent", node_parent)
            .add_directive(S::Node, "position", node_position)
            .add_directive(S::Node, "orientation", node_orientation)
            .add_directive(S::Node, "scale", node_scale)
            .on_close(S::Node, node_end)
            .add_directive(S::Mesh, "submesh", mesh_submesh)
            .on_close(S::Mesh, mesh_end)
            .add_directive(S::Submesh, "vertex", submesh_vertex)
            .add_directive(S::Submesh, "normal", submesh_normal)
            .add_directive(S::Submesh, "uv", submesh_uv)
            .add_directive(S::Submesh, "face", submesh_face)
            .on_close(S::Submesh, submesh_end)
            .add_directive(S::Geometry, "parent", geometry_parent)
            .add_directive(S::Geometry, "mesh", geometry_mesh)
            .add_directive(S::Geometry, "opacity", geometry_opacity)
            .add_directive(S::Geometry, "blend_mode", geometry_blend_mode)
            .add_directive(S::Geometry, "two_sided", geometry_two_sided)
            .add_directive(S::Geometry, "colour", geometry_colour)
            .add_directive(S::Geometry, "shader_program", geometry_shader_program)
            .on_close(S::Geometry, geometry_end)
            .add_directive(S::Camera, "parent", camera_parent)
            .add_directive(S::Camera, "viewport", camera_viewport)
            .add_directive(S::Camera, "fov", camera_fov)
            .on_close(S::Camera, camera_end)
            .add_directive(S::Light, "parent", light_parent)
            .add_directive(S::Light, "type", light_type)
            .add_directive(S::Light, "colour", light_colour)
            .add_directive(S::Light, "shadows", light_shadows)
            .on_close(S::Light, light_end)
            .add_directive(S::ShaderProgram, "vertex_program", program_vertex)
            .add_directive(S::ShaderProgram, "pixel_program", program_pixel)
            .add_directive(S::ShaderProgram, "constants_buffer", program_constants_buffer)
            .add_directive(S::ShaderProgram, "variable", program_variable)
            .on_close(S::ShaderProgram, program_end)
            .add_directive(S::ConstantsBuffer, "variable", program_variable)
            .on_close(S::ConstantsBuffer, buffer_end)
            .add_directive(S::Variable, "type", variable_type)
            .add_directive(S::Variable, "count", variable_count)
            .add_directive(S::Variable, "stage", variable_stage)
            .add_directive(S::Variable, "value", variable_value)
            .on_close(S::Variable, variable_end);

        Self { parser }
    }

    /// Parses `text` into `scene`. Shader sources are looked up relative to
    /// `base_dir`.
    pub fn parse_str(&self, scene: Scene, base_dir: impl Into<PathBuf>, text: &str) -> (Scene, ParseReport) {
        let mut context = SceneFileContext::new(scene, base_dir);
        let report = self.parser.parse_str(&mut context, "<memory>", text);
        (context.scene, report)
    }

    /// Parses a file into `scene`. Only failing to read the file is an error;
    /// everything else is in the report.
    pub fn parse_file(&self, scene: Scene, path: impl AsRef<Path>) -> Result<(Scene, ParseReport)> {
        let path = path.as_ref();
        let base_dir = path.parent().map(Path::to_owned).unwrap_or_default();
        let mut context = SceneFileContext::new(scene, base_dir);
        let report = self.parser.parse_file(&mut context, path)?;
        log::info!(
            "Parsed {}: {} lines, {} diagnostics",
            report.source,
            report.lines,
            report.diagnostics.len()
        );
        Ok((context.scene, report))
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::SceneFileParser;
    use crate::{parse::Severity, scene::Scene, ParseError};

    const SCENE: &str = r#"
scene "Test"
{
    background_colour 0.5 0.5 0.5
    /* a block
       comment */
    scene_node "a" {
        position 1 0 0
    }
    scene_node "b" {
        parent "a"
        position 0 1 0 // trailing
    }
    mesh "quad" {
        submesh {
            vertex 0 0 0
            vertex 1 0 0
            vertex 1 1 0
            vertex 0 1 0
            face 0 1 2 3
        }
    }
    geometry "g" {
        parent "b"
        mesh "quad"
        opacity 0.5
        blend_mode additive interpolative
    }
}
"#;

    #[test]
    fn scene_is_populated() {
        let (mut scene, report) = SceneFileParser::new().parse_str(Scene::new("tmp"), ".", SCENE);
        assert!(report.diagnostics.is_empty(), "{:?}", report.diagnostics);
        assert_eq!(scene.name(), "Test");
        assert_eq!(scene.background_colour.x, 0.5);

        let b = scene.graph().find("b").unwrap();
        let position = scene.graph_mut().derived_position(b).unwrap();
        assert!((position - Vec3::new(1.0, 1.0, 0.0)).length() < 1e-5);

        let mesh = scene.mesh("quad").unwrap();
        assert_eq!(mesh.submeshes[0].indices, vec![0, 1, 2, 0, 2, 3]);

        let geometry = scene.geometry("g").unwrap();
        assert_eq!(geometry.node, b);
        assert!(geometry.pass.is_transparent());
    }

    #[test]
    fn unknown_directives_are_reported_with_context() {
        let text = "scene \"s\" {\n  scene_node \"n\" {\n    wobble 3 {\n      position 1 2 3\n    }\n  }\n}\n";
        let (mut scene, report) = SceneFileParser::new().parse_str(Scene::new("tmp"), ".", text);
        let warning = report.warnings().next().unwrap();
        assert_eq!(warning.line, 3);
        assert_eq!(warning.context, "Root::scene::scene_node::wobble");
        let n = scene.graph().find("n").unwrap();
        assert_eq!(scene.graph_mut().derived_position(n).unwrap(), Vec3::ZERO);
    }

    #[test]
    fn geometry_without_mesh_is_an_error() {
        let text = "scene {\n  geometry \"g\" {\n    opacity 0.5\n  }\n}\n";
        let (scene, report) = SceneFileParser::new().parse_str(Scene::new("tmp"), ".", text);
        assert!(scene.geometry("g").is_none());
        let error = report.errors().next().unwrap();
        assert_eq!(error.severity, Severity::Error);
        assert!(matches!(error.error, ParseError::InvalidParameters { .. }));
    }
}
