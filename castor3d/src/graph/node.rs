use castor3d_types::FrameBufferHandle;

use crate::{
    backend::RenderSystem,
    graph::{GraphResource, RenderGraph, RenderTargetHandle},
    scene::Scene,
    util::typedefs::SsoString,
};

/// Wraps a handle proving you have declared it as a dependency.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct DeclaredDependency<Handle> {
    pub(super) handle: Handle,
}

/// Everything a node gets to work with when it runs.
pub struct NodeExecutionContext<'a> {
    pub render_system: &'a mut dyn RenderSystem,
    pub scene: &'a mut Scene,
    pub(super) targets: &'a [Option<FrameBufferHandle>],
}

impl<'a> NodeExecutionContext<'a> {
    /// Frame buffer backing a declared target. `None` is the back buffer,
    /// which is also what a target that failed to allocate falls back to.
    pub fn frame_buffer(&self, dependency: DeclaredDependency<RenderTargetHandle>) -> Option<FrameBufferHandle> {
        match dependency.handle.resource {
            GraphResource::Target(idx) => self.targets.get(idx).copied().flatten(),
            GraphResource::Output | GraphResource::External => None,
        }
    }

    /// Binds a declared target for drawing.
    pub fn bind_target(&mut self, dependency: DeclaredDependency<RenderTargetHandle>) {
        let frame_buffer = self.frame_buffer(dependency);
        self.render_system.bind_frame_buffer(frame_buffer);
    }
}

pub(super) type NodeExec<'node> = Box<dyn for<'a> FnOnce(NodeExecutionContext<'a>) + 'node>;

pub(super) struct RenderGraphNode<'node> {
    pub inputs: Vec<GraphResource>,
    pub outputs: Vec<GraphResource>,
    pub references: Vec<GraphResource>,
    pub label: SsoString,
    pub exec: NodeExec<'node>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeResourceUsage {
    /// Doesn't access the resource at all, just need access to the resource.
    Reference,
    /// Only reads the resource.
    Input,
    /// Only writes to the resource
    Output,
    /// Reads and writes to the resource.
    InputOutput,
}

/// Builder for a graph node.
///
/// Calling build will automatically add the node to the rendergraph.
pub struct RenderGraphNodeBuilder<'a, 'node> {
    pub(super) graph: &'a mut RenderGraph<'node>,
    pub(super) label: SsoString,
    pub(super) inputs: Vec<GraphResource>,
    pub(super) outputs: Vec<GraphResource>,
    pub(super) references: Vec<GraphResource>,
}

impl<'a, 'node> RenderGraphNodeBuilder<'a, 'node> {
    /// Declares how the node uses a render target.
    pub fn add_render_target(
        &mut self,
        handle: RenderTargetHandle,
        usage: NodeResourceUsage,
    ) -> DeclaredDependency<RenderTargetHandle> {
        match usage {
            NodeResourceUsage::Reference => self.references.push(handle.resource),
            NodeResourceUsage::Input => self.inputs.push(handle.resource),
            NodeResourceUsage::Output => self.outputs.push(handle.resource),
            NodeResourceUsage::InputOutput => {
                self.inputs.push(handle.resource);
                self.outputs.push(handle.resource);
            }
        }
        DeclaredDependency { handle }
    }

    /// Same as [`Self::add_render_target`], for an optional target.
    pub fn add_optional_render_target(
        &mut self,
        handle: Option<RenderTargetHandle>,
        usage: NodeResourceUsage,
    ) -> Option<DeclaredDependency<RenderTargetHandle>> {
        Some(self.add_render_target(handle?, usage))
    }

    /// Declares that this node has an "external" output, meaning it can never
    /// be culled.
    pub fn add_side_effect(&mut self) {
        self.inputs.push(GraphResource::External);
        self.outputs.push(GraphResource::External);
    }

    /// Builds the rendergraph node and adds it into the rendergraph.
    ///
    /// Takes a function that is the body of the node. Nodes will only run if
    /// a following node consumes the result of this node, or the node has a
    /// side effect.
    pub fn build<F>(self, exec: F)
    where
        F: for<'b> FnOnce(NodeExecutionContext<'b>) + 'node,
    {
        self.graph.nodes.push(RenderGraphNode {
            label: self.label,
            inputs: self.inputs,
            outputs: self.outputs,
            references: self.references,
            exec: Box::new(exec),
        });
    }
}
