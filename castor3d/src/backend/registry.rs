use crate::{
    backend::{Device, Gl2Backend, Gl3Backend, RenderSystem, VulkanBackend},
    util::typedefs::{FastIndexMap, SsoString},
    EngineError, RenderSystemOptions,
};

/// Creates a render system, or explains why it can't.
pub type RenderSystemFactory = fn(&RenderSystemOptions) -> Result<Box<dyn RenderSystem>, String>;

fn check_surface(options: &RenderSystemOptions) -> Result<(), String> {
    if options.size.contains(&0) {
        return Err(format!("surface of {}x{} has no pixels", options.size[0], options.size[1]));
    }
    Ok(())
}

fn gl2(options: &RenderSystemOptions) -> Result<Box<dyn RenderSystem>, String> {
    check_surface(options)?;
    Ok(Box::new(Device::new(Gl2Backend::new(), options)))
}

fn gl3(options: &RenderSystemOptions) -> Result<Box<dyn RenderSystem>, String> {
    check_surface(options)?;
    Ok(Box::new(Device::new(Gl3Backend::new(), options)))
}

fn vulkan(options: &RenderSystemOptions) -> Result<Box<dyn RenderSystem>, String> {
    check_surface(options)?;
    Ok(Box::new(Device::new(VulkanBackend::new(), options)))
}

/// Render systems available by name. Selection happens once, at engine
/// start.
#[derive(Debug, Clone)]
pub struct BackendRegistry {
    factories: FastIndexMap<SsoString, RenderSystemFactory>,
}

impl BackendRegistry {
    /// A registry without any render system.
    pub fn empty() -> Self {
        Self {
            factories: FastIndexMap::default(),
        }
    }

    /// A registry with the bundled `gl2`, `gl3` and `vulkan` render systems.
    pub fn with_builtin() -> Self {
        let mut registry = Self::empty();
        registry.register("gl2", gl2);
        registry.register("gl3", gl3);
        registry.register("vulkan", vulkan);
        registry
    }

    /// Registers a factory, replacing any previous one with the same name.
    pub fn register(&mut self, name: &str, factory: RenderSystemFactory) {
        if self.factories.insert(SsoString::from(name), factory).is_some() {
            log::warn!("Render system {:?} registered twice, keeping the latest", name);
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(|name| name.as_str())
    }

    pub fn create(&self, name: &str, options: &RenderSystemOptions) -> Result<Box<dyn RenderSystem>, EngineError> {
        if self.factories.is_empty() {
            return Err(EngineError::NoRenderSystem);
        }
        let factory = self.factories.get(name).ok_or_else(|| EngineError::UnknownRenderSystem {
            name: SsoString::from(name),
            available: self.factories.keys().cloned().collect(),
        })?;

        let render_system = factory(options).map_err(|reason| EngineError::RenderSystemInitialisation {
            name: SsoString::from(name),
            reason,
        })?;
        log::info!("Using render system {}", render_system.name());
        Ok(render_system)
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::BackendRegistry;
    use crate::{EngineError, RenderSystemOptions};

    #[test]
    fn selection_by_name() {
        let registry = BackendRegistry::with_builtin();
        assert_eq!(registry.names().collect::<Vec<_>>(), ["gl2", "gl3", "vulkan"]);

        let render_system = registry.create("gl3", &RenderSystemOptions::default()).unwrap();
        assert_eq!(render_system.name(), "gl3");

        let error = registry.create("d3d11", &RenderSystemOptions::default()).err().unwrap();
        assert!(matches!(error, EngineError::UnknownRenderSystem { available, .. } if available.len() == 3));
    }

    #[test]
    fn empty_registry() {
        let error = BackendRegistry::empty()
            .create("gl3", &RenderSystemOptions::default())
            .err()
            .unwrap();
        assert!(matches!(error, EngineError::NoRenderSystem));
    }

    #[test]
    fn zero_sized_surface() {
        let options = RenderSystemOptions {
            size: [0, 600],
            ..RenderSystemOptions::default()
        };
        let error = BackendRegistry::with_builtin().create("vulkan", &options).err().unwrap();
        assert!(matches!(error, EngineError::RenderSystemInitialisation { .. }));
    }
}
