//! Render passes and techniques for castor3d.
//!
//! Registers the `forward`, `msaa` and `deferred` techniques. Each one draws
//! shadow maps for shadow casting lights, lit opaque nodes, then transparent
//! nodes through weighted blended order independent transparency, and tone
//! maps the result into the back buffer.

use castor3d::technique::TechniqueRegistry;

pub mod base;
pub mod combine;
pub mod deferred;
pub mod forward;
pub mod fullscreen;
pub mod lighting;
pub mod msaa;
pub mod pass;
pub mod shaders;
pub mod shadow;
pub mod sorting;
pub mod tonemapping;
pub mod uniforms;

pub use deferred::DeferredTechnique;
pub use forward::ForwardTechnique;
pub use msaa::MsaaForwardTechnique;

/// Adds the built-in techniques to `registry`.
pub fn register_builtin_techniques(registry: &mut TechniqueRegistry) {
    registry.register(ForwardTechnique::NAME, ForwardTechnique::factory);
    registry.register(MsaaForwardTechnique::NAME, MsaaForwardTechnique::factory);
    registry.register(DeferredTechnique::NAME, DeferredTechnique::factory);
}

/// A registry holding only the built-in techniques.
pub fn builtin_techniques() -> TechniqueRegistry {
    let mut registry = TechniqueRegistry::new();
    register_builtin_techniques(&mut registry);
    registry
}
