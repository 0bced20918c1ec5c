//! Per frame render graph.
//!
//! Techniques describe a frame as a list of nodes, each declaring which
//! render targets it reads and writes. When the graph runs, nodes whose
//! outputs nobody consumes are culled, transient targets are pulled out of
//! a [`FrameBufferStore`] for exactly the span of nodes using them, and the
//! remaining nodes run in declaration order.
//!
//! The back buffer is the graph's output: any node writing it, or declaring
//! a side effect, is kept.

use arrayvec::ArrayVec;
use castor3d_types::{PixelFormat, SampleCount};
use glam::UVec2;

use crate::{backend::FrameBufferDescriptor, util::typedefs::SsoString};

mod graph;
mod node;
mod store;

pub use graph::*;
pub use node::*;
pub use store::*;

/// Description of a single transient render target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderTargetDescriptor {
    pub label: Option<SsoString>,
    pub resolution: UVec2,
    pub samples: SampleCount,
    pub colour: ArrayVec<PixelFormat, 8>,
    pub depth: Option<PixelFormat>,
}

impl RenderTargetDescriptor {
    /// One colour attachment and an optional depth attachment.
    pub fn single(
        label: impl Into<SsoString>,
        resolution: UVec2,
        samples: SampleCount,
        colour: Option<PixelFormat>,
        depth: Option<PixelFormat>,
    ) -> Self {
        Self {
            label: Some(label.into()),
            resolution,
            samples,
            colour: colour.into_iter().collect(),
            depth,
        }
    }

    pub(crate) fn to_frame_buffer(&self) -> FrameBufferDescriptor {
        FrameBufferDescriptor {
            label: self.label.clone(),
            size: self.resolution,
            samples: self.samples,
            attachments: self.colour.clone(),
            depth: self.depth,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
enum GraphResource {
    /// Index into the graph's transient targets.
    Target(usize),
    /// The back buffer.
    Output,
    /// Anything outside of the graph, for side effects.
    External,
}

/// Handle to a render target of one graph.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct RenderTargetHandle {
    resource: GraphResource,
}

impl RenderTargetHandle {
    pub fn is_output(&self) -> bool {
        self.resource == GraphResource::Output
    }
}
