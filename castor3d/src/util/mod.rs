//! Utilities shared by the whole engine.

pub mod freelist;
pub mod typedefs;
