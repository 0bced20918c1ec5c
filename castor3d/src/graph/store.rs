use castor3d_types::FrameBufferHandle;

use crate::{
    backend::{FrameBufferDescriptor, RenderSystem},
    util::typedefs::FastHashMap,
};

struct StoredFrameBuffer {
    handle: FrameBufferHandle,
    used: bool,
}

/// Frame buffers kept alive between frames, keyed by what they were made
/// from, so a graph asking for the same targets every frame doesn't create
/// them every frame.
#[derive(Default)]
pub struct FrameBufferStore {
    pool: FastHashMap<FrameBufferDescriptor, Vec<StoredFrameBuffer>>,
    created: usize,
}

impl FrameBufferStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pulls a frame buffer matching `desc` out of the store, or creates one.
    pub fn get(&mut self, render_system: &mut dyn RenderSystem, desc: &FrameBufferDescriptor) -> FrameBufferHandle {
        if let Some(stored) = self.pool.get_mut(desc).and_then(Vec::pop) {
            return stored.handle;
        }
        self.created += 1;
        render_system.create_frame_buffer(desc)
    }

    /// Gives a frame buffer back for later reuse.
    pub fn put(&mut self, desc: FrameBufferDescriptor, handle: FrameBufferHandle) {
        self.pool
            .entry(desc)
            .or_default()
            .push(StoredFrameBuffer { handle, used: true });
    }

    /// Marks every stored frame buffer as unused. Whatever isn't taken and
    /// put back before [`Self::remove_unused`] gets destroyed.
    pub fn mark_unused(&mut self) {
        for stored in self.pool.values_mut().flatten() {
            stored.used = false;
        }
    }

    pub fn remove_unused(&mut self, render_system: &mut dyn RenderSystem) {
        for list in self.pool.values_mut() {
            list.retain(|stored| {
                if !stored.used {
                    render_system.destroy_frame_buffer(stored.handle);
                }
                stored.used
            });
        }
        self.pool.retain(|_, list| !list.is_empty());
    }

    /// Number of frame buffers ever created through the store.
    pub fn created(&self) -> usize {
        self.created
    }

    pub fn len(&self) -> usize {
        self.pool.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self, render_system: &mut dyn RenderSystem) {
        for (_, list) in self.pool.drain() {
            for stored in list {
                render_system.destroy_frame_buffer(stored.handle);
            }
        }
    }
}

impl std::fmt::Debug for FrameBufferStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameBufferStore")
            .field("stored", &self.len())
            .field("created", &self.created)
            .finish()
    }
}
