use std::{fmt::Debug, hash::Hash, marker::PhantomData};

/// Non-owning resource handle.
///
/// Handles index the storage of whoever created them. The generation tells
/// apart successive values stored in the same slot, so a handle to a removed
/// value never resolves to its replacement. The type parameter only keeps
/// handles of different resource kinds apart.
pub struct RawResourceHandle<T> {
    /// Underlying value of the handle.
    pub idx: usize,
    /// Generation of the slot when the handle was created.
    pub generation: u32,
    _phantom: PhantomData<T>,
}

impl<T> RawResourceHandle<T> {
    /// Creates a new first-generation handle with the given value
    pub const fn new(idx: usize) -> Self {
        Self::with_generation(idx, 0)
    }

    pub const fn with_generation(idx: usize, generation: u32) -> Self {
        Self {
            idx,
            generation,
            _phantom: PhantomData,
        }
    }
}

// Need Debug/Copy/Clone impls that don't require T: Trait.
impl<T> Debug for RawResourceHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawResourceHandle")
            .field("idx", &self.idx)
            .field("generation", &self.generation)
            .finish()
    }
}

impl<T> Copy for RawResourceHandle<T> {}

impl<T> Clone for RawResourceHandle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> PartialEq for RawResourceHandle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.idx == other.idx && self.generation == other.generation
    }
}

impl<T> Eq for RawResourceHandle<T> {}

impl<T> Hash for RawResourceHandle<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.idx.hash(state);
        self.generation.hash(state);
    }
}

/// Tag type for differentiating gpu buffers on the type level.
#[doc(hidden)]
pub struct BufferTag;
/// Tag type for differentiating shader stage objects on the type level.
#[doc(hidden)]
pub struct ShaderObjectTag;
/// Tag type for differentiating linked programs on the type level.
#[doc(hidden)]
pub struct ProgramTag;
/// Tag type for differentiating pipeline objects on the type level.
#[doc(hidden)]
pub struct PipelineTag;
/// Tag type for differentiating frame buffers on the type level.
#[doc(hidden)]
pub struct FrameBufferTag;
/// Tag type for differentiating scene nodes on the type level.
#[doc(hidden)]
pub struct SceneNodeTag;

/// Handle to a buffer living in a render system.
pub type BufferHandle = RawResourceHandle<BufferTag>;
/// Handle to a compiled shader stage living in a render system.
pub type ShaderObjectHandle = RawResourceHandle<ShaderObjectTag>;
/// Handle to a program living in a render system.
pub type ProgramHandle = RawResourceHandle<ProgramTag>;
/// Handle to a pipeline living in a render system.
pub type PipelineHandle = RawResourceHandle<PipelineTag>;
/// Handle to a frame buffer living in a render system.
pub type FrameBufferHandle = RawResourceHandle<FrameBufferTag>;
/// Handle to a node of a scene graph.
pub type NodeHandle = RawResourceHandle<SceneNodeTag>;
