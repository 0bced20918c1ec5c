use castor3d_types::FrameBufferHandle;

use crate::{
    backend::RenderSystem,
    graph::{
        FrameBufferStore, GraphResource, NodeExecutionContext, RenderGraphNode, RenderGraphNodeBuilder,
        RenderTargetDescriptor, RenderTargetHandle,
    },
    scene::Scene,
    util::typedefs::{FastHashMap, FastHashSet, SsoString},
};

/// What one graph execution did.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct GraphStatistics {
    pub nodes_run: usize,
    pub nodes_culled: usize,
    pub targets_allocated: usize,
}

/// Implementation of a rendergraph. See module docs for details.
pub struct RenderGraph<'node> {
    pub(super) targets: Vec<RenderTargetDescriptor>,
    pub(super) nodes: Vec<RenderGraphNode<'node>>,
}

impl<'node> RenderGraph<'node> {
    pub fn new() -> Self {
        Self {
            targets: Vec::with_capacity(16),
            nodes: Vec::with_capacity(32),
        }
    }

    pub fn add_node<'a, S>(&'a mut self, label: S) -> RenderGraphNodeBuilder<'a, 'node>
    where
        SsoString: From<S>,
    {
        RenderGraphNodeBuilder {
            label: SsoString::from(label),
            graph: self,
            inputs: Vec::with_capacity(8),
            outputs: Vec::with_capacity(8),
            references: Vec::with_capacity(4),
        }
    }

    pub fn add_render_target(&mut self, desc: RenderTargetDescriptor) -> RenderTargetHandle {
        let idx = self.targets.len();
        self.targets.push(desc);
        RenderTargetHandle {
            resource: GraphResource::Target(idx),
        }
    }

    /// The back buffer of the render system.
    pub fn output_target(&self) -> RenderTargetHandle {
        RenderTargetHandle {
            resource: GraphResource::Output,
        }
    }

    pub fn target_descriptor(&self, handle: RenderTargetHandle) -> Option<&RenderTargetDescriptor> {
        match handle.resource {
            GraphResource::Target(idx) => self.targets.get(idx),
            _ => None,
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Labels of the declared nodes, in declaration order.
    pub fn node_labels(&self) -> impl Iterator<Item = &str> {
        self.nodes.iter().map(|node| node.label.as_str())
    }

    pub fn execute(
        self,
        render_system: &mut dyn RenderSystem,
        scene: &mut Scene,
        store: &mut FrameBufferStore,
    ) -> GraphStatistics {
        profiling::scope!("RenderGraph::execute");

        let declared = self.nodes.len();

        let mut awaiting_inputs = FastHashSet::default();
        // The back buffer is presented
        awaiting_inputs.insert(GraphResource::Output);
        // External deps are used externally
        awaiting_inputs.insert(GraphResource::External);

        let mut pruned_node_list = Vec::with_capacity(self.nodes.len());
        {
            profiling::scope!("Dead Node Elimination");
            // Iterate the nodes backwards to track dependencies
            for node in self.nodes.into_iter().rev() {
                // Outputs stay awaited: several nodes may write the same target.
                let outputs_used = node.outputs.iter().any(|o| awaiting_inputs.contains(o));

                if outputs_used {
                    awaiting_inputs.extend(node.inputs.iter().copied());
                    pruned_node_list.push(node);
                } else {
                    log::trace!("Culling render graph node {:?}", node.label);
                }
            }
            pruned_node_list.reverse();
        }

        let mut resource_spans = FastHashMap::<usize, (usize, usize)>::default();
        {
            profiling::scope!("Resource Span Analysis");
            for (idx, node) in pruned_node_list.iter().enumerate() {
                let used = node.inputs.iter().chain(&node.outputs).chain(&node.references);
                for &resource in used {
                    if let GraphResource::Target(target) = resource {
                        resource_spans
                            .entry(target)
                            .and_modify(|span| span.1 = idx)
                            .or_insert((idx, idx));
                    }
                }
            }
        }

        // For each node, the targets whose spans start and end there.
        let mut resource_changes = vec![(Vec::new(), Vec::new()); pruned_node_list.len()];
        for (&target, &(start, end)) in &resource_spans {
            resource_changes[start].0.push(target);
            resource_changes[end].1.push(target);
        }

        store.mark_unused();

        let mut statistics = GraphStatistics {
            nodes_run: 0,
            nodes_culled: declared - pruned_node_list.len(),
            targets_allocated: 0,
        };
        let mut live_targets: Vec<Option<FrameBufferHandle>> = vec![None; self.targets.len()];

        let nodes = pruned_node_list.into_iter().zip(resource_changes);
        for (RenderGraphNode { label, exec, .. }, (starting, ending)) in nodes {
            for &target in &starting {
                let desc = self.targets[target].to_frame_buffer();
                live_targets[target] = Some(store.get(render_system, &desc));
                statistics.targets_allocated += 1;
            }

            {
                profiling::scope!("Execute Node", label.as_str());
                exec(NodeExecutionContext {
                    render_system: &mut *render_system,
                    scene: &mut *scene,
                    targets: &live_targets,
                });
            }
            render_system.check_error(&label);
            statistics.nodes_run += 1;

            for &target in &ending {
                if let Some(handle) = live_targets[target].take() {
                    store.put(self.targets[target].to_frame_buffer(), handle);
                }
            }
        }

        store.remove_unused(render_system);
        statistics
    }
}

impl<'node> Default for RenderGraph<'node> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use castor3d_types::{PixelFormat, SampleCount};
    use glam::UVec2;

    use super::RenderGraph;
    use crate::{
        backend::{Device, Gl3Backend, RenderSystem},
        graph::{FrameBufferStore, NodeResourceUsage, RenderTargetDescriptor},
        scene::Scene,
        RenderSystemOptions,
    };

    fn target(name: &str) -> RenderTargetDescriptor {
        RenderTargetDescriptor::single(
            name,
            UVec2::new(64, 64),
            SampleCount::One,
            Some(PixelFormat::RGBA16F),
            None,
        )
    }

    #[test]
    fn unconsumed_nodes_are_culled() {
        let mut device = Device::new(Gl3Backend::new(), &RenderSystemOptions::default());
        let mut scene = Scene::new("test");
        let mut store = FrameBufferStore::new();
        let ran = Rc::new(RefCell::new(Vec::new()));

        let mut graph = RenderGraph::new();
        let used = graph.add_render_target(target("used"));
        let unused = graph.add_render_target(target("unused"));
        let output = graph.output_target();

        let mut builder = graph.add_node("dead");
        builder.add_render_target(unused, NodeResourceUsage::Output);
        let log = Rc::clone(&ran);
        builder.build(move |_| log.borrow_mut().push("dead"));

        let mut builder = graph.add_node("producer");
        builder.add_render_target(used, NodeResourceUsage::Output);
        let log = Rc::clone(&ran);
        builder.build(move |ctx| {
            assert!(ctx.render_system.size().x > 0);
            log.borrow_mut().push("producer")
        });

        let mut builder = graph.add_node("consumer");
        let input = builder.add_render_target(used, NodeResourceUsage::Input);
        builder.add_render_target(output, NodeResourceUsage::Output);
        let log = Rc::clone(&ran);
        builder.build(move |ctx| {
            assert!(ctx.frame_buffer(input).is_some());
            log.borrow_mut().push("consumer")
        });

        let statistics = graph.execute(&mut device, &mut scene, &mut store);
        assert_eq!(*ran.borrow(), vec!["producer", "consumer"]);
        assert_eq!(statistics.nodes_culled, 1);
        assert_eq!(statistics.targets_allocated, 1);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn frame_buffers_are_reused_across_frames() {
        let mut device = Device::new(Gl3Backend::new(), &RenderSystemOptions::default());
        let mut scene = Scene::new("test");
        let mut store = FrameBufferStore::new();

        for _ in 0..3 {
            let mut graph = RenderGraph::new();
            let intermediate = graph.add_render_target(target("intermediate"));
            let mut builder = graph.add_node("write");
            builder.add_render_target(intermediate, NodeResourceUsage::Output);
            builder.build(|_| {});
            let mut builder = graph.add_node("read");
            builder.add_render_target(intermediate, NodeResourceUsage::Input);
            builder.add_side_effect();
            builder.build(|_| {});
            graph.execute(&mut device, &mut scene, &mut store);
        }

        assert_eq!(store.created(), 1);
        store.clear(&mut device);
        assert!(store.is_empty());
    }
}
