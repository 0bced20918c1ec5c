use std::sync::atomic::{AtomicUsize, Ordering};

use castor3d_types::{MovableKind, NodeHandle, SceneNodeTag};
use glam::{Mat4, Quat, Vec3};
use smallvec::SmallVec;

use crate::{
    format_sso,
    util::{
        freelist::FreelistVec,
        typedefs::{FastHashMap, FastIndexMap, SsoString},
    },
    SceneError,
};

/// Name of the node every scene starts with.
pub const ROOT_NODE_NAME: &str = "RootNode";

static NODE_COUNTER: AtomicUsize = AtomicUsize::new(0);

/// A transform in a hierarchy, with cached local and world matrices.
#[derive(Debug, Clone)]
pub struct SceneNode {
    name: SsoString,
    parent: Option<NodeHandle>,
    children: FastIndexMap<SsoString, NodeHandle>,
    objects: SmallVec<[(MovableKind, SsoString); 2]>,

    position: Vec3,
    orientation: Quat,
    scale: Vec3,

    transform: Mat4,
    derived: Mat4,
    mtx_changed: bool,
    derived_changed: bool,

    visible: bool,
    displayable: bool,
}

impl SceneNode {
    fn new(name: SsoString) -> Self {
        Self {
            name,
            parent: None,
            children: FastIndexMap::default(),
            objects: SmallVec::new(),
            position: Vec3::ZERO,
            orientation: Quat::IDENTITY,
            scale: Vec3::ONE,
            transform: Mat4::IDENTITY,
            derived: Mat4::IDENTITY,
            mtx_changed: true,
            derived_changed: true,
            visible: true,
            displayable: true,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<NodeHandle> {
        self.parent
    }

    /// Direct children, by name.
    pub fn children(&self) -> impl Iterator<Item = (&str, NodeHandle)> {
        self.children.iter().map(|(name, &handle)| (name.as_str(), handle))
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    /// Movable objects attached to the node.
    pub fn objects(&self) -> impl Iterator<Item = (MovableKind, &str)> {
        self.objects.iter().map(|(kind, name)| (*kind, name.as_str()))
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn orientation(&self) -> Quat {
        self.orientation
    }

    pub fn scale(&self) -> Vec3 {
        self.scale
    }

    /// Whether either cached matrix is stale.
    pub fn is_modified(&self) -> bool {
        self.mtx_changed || self.derived_changed
    }

    pub fn is_displayable(&self) -> bool {
        self.displayable
    }

    fn local_matrix(&mut self) -> Mat4 {
        if self.mtx_changed {
            self.transform = Mat4::from_scale_rotation_translation(self.scale, self.orientation, self.position);
            self.mtx_changed = false;
        }
        self.transform
    }
}

/// Arena of scene nodes under a single root.
///
/// Nodes refer to each other by handle; the arena owns all of them. Node
/// names are unique inside one graph.
#[derive(Debug)]
pub struct SceneGraph {
    nodes: FreelistVec<SceneNode>,
    names: FastHashMap<SsoString, NodeHandle>,
    root: NodeHandle,
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self::new()
    }
}

macro_rules! node_or_err {
    ($self:ident . $method:ident ($handle:expr)) => {
        $self.nodes.$method($handle).ok_or_else(|| SceneError::UnknownNode {
            name: format_sso!("#{}", $handle.idx),
        })
    };
}

impl SceneGraph {
    pub fn new() -> Self {
        let mut nodes = FreelistVec::new();
        let root: NodeHandle = nodes.push(SceneNode::new(SsoString::from(ROOT_NODE_NAME)));
        let mut names = FastHashMap::default();
        names.insert(SsoString::from(ROOT_NODE_NAME), root);
        Self { nodes, names, root }
    }

    pub fn root(&self) -> NodeHandle {
        self.root
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, handle: NodeHandle) -> Option<&SceneNode> {
        self.nodes.get(handle)
    }

    pub fn find(&self, name: &str) -> Option<NodeHandle> {
        self.names.get(name).copied()
    }

    pub fn find_or_err(&self, name: &str) -> Result<NodeHandle, SceneError> {
        self.find(name).ok_or_else(|| SceneError::UnknownNode { name: name.into() })
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeHandle, &SceneNode)> {
        self.nodes.iter::<SceneNodeTag>()
    }

    /// Creates a node under `parent`, or under the root. Without a name one
    /// is generated.
    pub fn create_node(&mut self, name: Option<&str>, parent: Option<NodeHandle>) -> Result<NodeHandle, SceneError> {
        let name = match name {
            Some(name) => SsoString::from(name),
            None => loop {
                let candidate = format_sso!("SceneNode_{}", NODE_COUNTER.fetch_add(1, Ordering::Relaxed));
                if !self.names.contains_key(&candidate) {
                    break candidate;
                }
            },
        };
        if self.names.contains_key(&name) {
            return Err(SceneError::DuplicateNode { name });
        }
        let parent = parent.unwrap_or(self.root);
        node_or_err!(self.get(parent))?;

        let handle: NodeHandle = self.nodes.push(SceneNode::new(name.clone()));
        self.names.insert(name, handle);
        self.attach_to(handle, parent)?;
        Ok(handle)
    }

    /// Removes a node. Its children are detached, not destroyed, and are
    /// left without a parent.
    pub fn remove_node(&mut self, handle: NodeHandle) -> Result<SceneNode, SceneError> {
        if handle == self.root {
            return Err(SceneError::RootNode);
        }
        self.detach(handle)?;
        self.detach_all_children(handle)?;
        let node = node_or_err!(self.remove(handle))?;
        self.names.remove(&node.name);
        Ok(node)
    }

    /// Whether `child` is anywhere below `node`.
    pub fn has_child(&self, node: NodeHandle, child: NodeHandle) -> bool {
        let mut stack: SmallVec<[NodeHandle; 16]> = SmallVec::new();
        stack.push(node);
        while let Some(handle) = stack.pop() {
            let Some(node) = self.nodes.get(handle) else {
                continue;
            };
            if node.children.values().any(|&direct| direct == child) {
                return true;
            }
            stack.extend(node.children.values().copied());
        }
        false
    }

    /// Same as [`Self::has_child`], by name.
    pub fn has_child_named(&self, node: NodeHandle, name: &str) -> bool {
        self.find(name).map_or(false, |child| self.has_child(node, child))
    }

    /// Moves `child` under `parent`, detaching it from its previous parent.
    /// The child takes the parent's displayable flag.
    pub fn attach_to(&mut self, child: NodeHandle, parent: NodeHandle) -> Result<(), SceneError> {
        if child == self.root {
            return Err(SceneError::RootNode);
        }
        let displayable = node_or_err!(self.get(parent))?.displayable;
        let child_name = node_or_err!(self.get(child))?.name.clone();
        if child == parent || self.has_child(child, parent) {
            return Err(SceneError::Cycle {
                child: child_name,
                parent: self.nodes.get(parent).map(|p| p.name.clone()).unwrap_or_default(),
            });
        }

        self.detach(child)?;
        if let Some(parent_node) = self.nodes.get_mut(parent) {
            parent_node.children.insert(child_name, child);
        }
        if let Some(child_node) = self.nodes.get_mut(child) {
            child_node.parent = Some(parent);
            child_node.displayable = displayable;
        }
        self.invalidate_derived(child);
        Ok(())
    }

    pub fn add_child(&mut self, parent: NodeHandle, child: NodeHandle) -> Result<(), SceneError> {
        self.attach_to(child, parent)
    }

    /// Detaches a node from its parent. Detaching a parentless node does
    /// nothing.
    pub fn detach(&mut self, handle: NodeHandle) -> Result<(), SceneError> {
        let node = node_or_err!(self.get_mut(handle))?;
        let Some(parent) = node.parent.take() else {
            return Ok(());
        };
        let name = node.name.clone();
        if let Some(parent) = self.nodes.get_mut(parent) {
            parent.children.shift_remove(&name);
        }
        self.invalidate_derived(handle);
        Ok(())
    }

    /// Detaches `child` if it is a direct child of `parent`. Returns whether
    /// it was.
    pub fn detach_child(&mut self, parent: NodeHandle, child: NodeHandle) -> Result<bool, SceneError> {
        let is_child = node_or_err!(self.get(child))?.parent == Some(parent);
        if is_child {
            self.detach(child)?;
        }
        Ok(is_child)
    }

    pub fn detach_child_named(&mut self, parent: NodeHandle, name: &str) -> Result<bool, SceneError> {
        let child = node_or_err!(self.get(parent))?.children.get(name).copied();
        match child {
            Some(child) => self.detach_child(parent, child),
            None => Ok(false),
        }
    }

    pub fn detach_all_children(&mut self, parent: NodeHandle) -> Result<(), SceneError> {
        let children: Vec<NodeHandle> = node_or_err!(self.get(parent))?.children.values().copied().collect();
        for child in children {
            self.detach(child)?;
        }
        Ok(())
    }

    pub fn attach_object(&mut self, handle: NodeHandle, kind: MovableKind, name: &str) -> Result<(), SceneError> {
        let node = node_or_err!(self.get_mut(handle))?;
        if !node.objects.iter().any(|(k, n)| *k == kind && n == name) {
            node.objects.push((kind, name.into()));
        }
        Ok(())
    }

    pub fn detach_object(&mut self, handle: NodeHandle, kind: MovableKind, name: &str) -> Result<bool, SceneError> {
        let node = node_or_err!(self.get_mut(handle))?;
        let before = node.objects.len();
        node.objects.retain(|(k, n)| !(*k == kind && n == name));
        Ok(node.objects.len() != before)
    }

    pub fn set_visible(&mut self, handle: NodeHandle, visible: bool) -> Result<(), SceneError> {
        node_or_err!(self.get_mut(handle))?.visible = visible;
        Ok(())
    }

    /// Visible if the node and all its ancestors are.
    pub fn is_visible(&self, handle: NodeHandle) -> bool {
        let mut current = Some(handle);
        while let Some(handle) = current {
            match self.nodes.get(handle) {
                Some(node) if node.visible => current = node.parent,
                _ => return false,
            }
        }
        true
    }

    pub fn set_displayable(&mut self, handle: NodeHandle, displayable: bool) -> Result<(), SceneError> {
        node_or_err!(self.get_mut(handle))?.displayable = displayable;
        Ok(())
    }

    /// Marks a node's world matrix stale, along with every descendant's.
    fn invalidate_derived(&mut self, handle: NodeHandle) {
        let mut stack: SmallVec<[NodeHandle; 16]> = SmallVec::new();
        stack.push(handle);
        while let Some(handle) = stack.pop() {
            if let Some(node) = self.nodes.get_mut(handle) {
                node.derived_changed = true;
                stack.extend(node.children.values().copied());
            }
        }
    }

    fn modify(&mut self, handle: NodeHandle, edit: impl FnOnce(&mut SceneNode)) -> Result<(), SceneError> {
        let node = node_or_err!(self.get_mut(handle))?;
        edit(node);
        node.mtx_changed = true;
        self.invalidate_derived(handle);
        Ok(())
    }

    pub fn set_position(&mut self, handle: NodeHandle, position: Vec3) -> Result<(), SceneError> {
        self.modify(handle, |node| node.position = position)
    }

    pub fn set_orientation(&mut self, handle: NodeHandle, orientation: Quat) -> Result<(), SceneError> {
        self.modify(handle, |node| node.orientation = orientation.normalize())
    }

    pub fn set_scale(&mut self, handle: NodeHandle, scale: Vec3) -> Result<(), SceneError> {
        self.modify(handle, |node| node.scale = scale)
    }

    pub fn translate(&mut self, handle: NodeHandle, offset: Vec3) -> Result<(), SceneError> {
        self.modify(handle, |node| node.position += offset)
    }

    /// Applies `rotation` after the current orientation.
    pub fn rotate(&mut self, handle: NodeHandle, rotation: Quat) -> Result<(), SceneError> {
        self.modify(handle, |node| node.orientation = (node.orientation * rotation).normalize())
    }

    /// Multiplies the current scale.
    pub fn scale(&mut self, handle: NodeHandle, factor: Vec3) -> Result<(), SceneError> {
        self.modify(handle, |node| node.scale *= factor)
    }

    /// Rotation around the local Y axis, in radians.
    pub fn yaw(&mut self, handle: NodeHandle, angle: f32) -> Result<(), SceneError> {
        self.rotate(handle, Quat::from_rotation_y(angle))
    }

    /// Rotation around the local X axis, in radians.
    pub fn pitch(&mut self, handle: NodeHandle, angle: f32) -> Result<(), SceneError> {
        self.rotate(handle, Quat::from_rotation_x(angle))
    }

    /// Rotation around the local Z axis, in radians.
    pub fn roll(&mut self, handle: NodeHandle, angle: f32) -> Result<(), SceneError> {
        self.rotate(handle, Quat::from_rotation_z(angle))
    }

    /// Local transform, recomputed if stale.
    pub fn transformation_matrix(&mut self, handle: NodeHandle) -> Result<Mat4, SceneError> {
        Ok(node_or_err!(self.get_mut(handle))?.local_matrix())
    }

    /// World transform, recomputed along with any stale ancestor.
    pub fn derived_transformation_matrix(&mut self, handle: NodeHandle) -> Result<Mat4, SceneError> {
        // stale chain from `handle` up to the first fresh ancestor
        let mut stale: SmallVec<[NodeHandle; 16]> = SmallVec::new();
        let mut parent = Mat4::IDENTITY;
        let mut current = Some(handle);
        while let Some(current_handle) = current {
            let node = node_or_err!(self.get(current_handle))?;
            if !node.derived_changed {
                parent = node.derived;
                break;
            }
            stale.push(current_handle);
            current = node.parent;
        }

        while let Some(stale_handle) = stale.pop() {
            let node = node_or_err!(self.get_mut(stale_handle))?;
            node.derived = parent * node.local_matrix();
            node.derived_changed = false;
            parent = node.derived;
        }
        Ok(parent)
    }

    pub fn derived_position(&mut self, handle: NodeHandle) -> Result<Vec3, SceneError> {
        let (_, _, translation) = self.derived_transformation_matrix(handle)?.to_scale_rotation_translation();
        Ok(translation)
    }

    pub fn derived_orientation(&mut self, handle: NodeHandle) -> Result<Quat, SceneError> {
        let (_, rotation, _) = self.derived_transformation_matrix(handle)?.to_scale_rotation_translation();
        Ok(rotation)
    }

    pub fn derived_scale(&mut self, handle: NodeHandle) -> Result<Vec3, SceneError> {
        let (scale, _, _) = self.derived_transformation_matrix(handle)?.to_scale_rotation_translation();
        Ok(scale)
    }

    /// Recomputes every stale matrix, parents before children. Returns how
    /// many nodes were refreshed.
    pub fn update(&mut self) -> usize {
        profiling::scope!("SceneGraph::update");

        let mut updated = 0;
        // detached nodes are their own roots
        let root = self.root;
        let mut stack: Vec<(NodeHandle, Mat4, bool)> = self
            .nodes
            .iter()
            .filter(|&(handle, node)| node.parent.is_none() && handle != root)
            .map(|(handle, _)| (handle, Mat4::IDENTITY, false))
            .collect();
        stack.push((root, Mat4::IDENTITY, false));

        while let Some((handle, parent, parent_changed)) = stack.pop() {
            let Some(node) = self.nodes.get_mut(handle) else {
                continue;
            };
            let changed = parent_changed || node.derived_changed || node.mtx_changed;
            if changed {
                node.derived = parent * node.local_matrix();
                node.derived_changed = false;
                updated += 1;
            }
            let derived = node.derived;
            stack.extend(node.children.values().map(|&child| (child, derived, changed)));
        }
        updated
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::SceneGraph;
    use crate::SceneError;

    #[test]
    fn names_are_unique() {
        let mut graph = SceneGraph::new();
        graph.create_node(Some("a"), None).unwrap();
        assert!(matches!(
            graph.create_node(Some("a"), None),
            Err(SceneError::DuplicateNode { .. })
        ));
        let generated = graph.create_node(None, None).unwrap();
        assert!(graph.node(generated).unwrap().name().starts_with("SceneNode_"));
    }

    #[test]
    fn cycles_are_refused() {
        let mut graph = SceneGraph::new();
        let a = graph.create_node(Some("a"), None).unwrap();
        let b = graph.create_node(Some("b"), Some(a)).unwrap();
        let c = graph.create_node(Some("c"), Some(b)).unwrap();
        assert!(matches!(graph.attach_to(a, c), Err(SceneError::Cycle { .. })));
        assert!(matches!(graph.attach_to(a, a), Err(SceneError::Cycle { .. })));
        assert!(matches!(graph.attach_to(graph.root(), a), Err(SceneError::RootNode)));
        assert!(graph.has_child(a, c));
        assert!(graph.has_child_named(graph.root(), "c"));
    }

    #[test]
    fn removed_node_orphans_children() {
        let mut graph = SceneGraph::new();
        let a = graph.create_node(Some("a"), None).unwrap();
        let b = graph.create_node(Some("b"), Some(a)).unwrap();
        graph.set_position(a, Vec3::X).unwrap();
        graph.set_position(b, Vec3::Y).unwrap();

        let removed = graph.remove_node(a).unwrap();
        assert_eq!(removed.child_count(), 0);
        assert_eq!(graph.node(b).unwrap().parent(), None);
        assert_eq!(graph.find("a"), None);
        assert!((graph.derived_position(b).unwrap() - Vec3::Y).length() < 1e-6);
    }

    #[test]
    fn removed_handles_dont_resolve_to_new_nodes() {
        let mut graph = SceneGraph::new();
        let a = graph.create_node(Some("a"), None).unwrap();
        graph.remove_node(a).unwrap();
        let b = graph.create_node(Some("b"), None).unwrap();
        graph.set_position(b, Vec3::new(5.0, 0.0, 0.0)).unwrap();

        assert_ne!(a, b);
        assert!(graph.node(a).is_none());
        assert!(matches!(graph.derived_position(a), Err(SceneError::UnknownNode { .. })));
        assert!(matches!(graph.set_position(a, Vec3::Y), Err(SceneError::UnknownNode { .. })));
        assert!(matches!(graph.remove_node(a), Err(SceneError::UnknownNode { .. })));
        assert_eq!(graph.find("b"), Some(b));
    }

    #[test]
    fn deep_chains_dont_recurse() {
        let mut graph = SceneGraph::new();
        let top = graph.create_node(Some("top"), None).unwrap();
        let mut leaf = top;
        for _ in 0..100_000 {
            leaf = graph.create_node(None, Some(leaf)).unwrap();
            graph.translate(leaf, Vec3::X).unwrap();
        }
        assert!(graph.has_child(top, leaf));
        assert!(!graph.has_child(leaf, top));
        assert!((graph.derived_position(leaf).unwrap().x - 100_000.0).abs() < 1.0);
    }

    #[test]
    fn displayable_is_inherited() {
        let mut graph = SceneGraph::new();
        let hidden = graph.create_node(Some("hidden"), None).unwrap();
        graph.set_displayable(hidden, false).unwrap();
        let child = graph.create_node(Some("child"), Some(hidden)).unwrap();
        assert!(!graph.node(child).unwrap().is_displayable());
    }

    #[test]
    fn update_refreshes_stale_nodes_only() {
        let mut graph = SceneGraph::new();
        let a = graph.create_node(Some("a"), None).unwrap();
        graph.create_node(Some("b"), Some(a)).unwrap();
        assert_eq!(graph.update(), 3);
        assert_eq!(graph.update(), 0);
        graph.translate(a, Vec3::Z).unwrap();
        assert_eq!(graph.update(), 2);
    }
}
