use std::sync::Arc;

use castor3d_types::EventType;
use parking_lot::Mutex;

use crate::{
    backend::{BackendRegistry, RenderSystem},
    graph::{FrameBufferStore, GraphStatistics, RenderGraph},
    listener::{FireReport, FrameListener},
    scene::Scene,
    technique::{RenderInfo, RenderTechnique, TechniqueRegistry},
    util::typedefs::{FastIndexMap, SsoString},
    EngineConfig, EngineError,
};

/// Name of the listener every engine starts with.
pub const DEFAULT_LISTENER_NAME: &str = "Default";
/// Name of the scene every engine starts with.
pub const DEFAULT_SCENE_NAME: &str = "Default";

/// What one call to [`Engine::render_frame`] did.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct FrameStatistics {
    pub frame: u64,
    /// Events applied, across every listener and phase.
    pub events_fired: usize,
    pub events_skipped: usize,
    /// Bucket fires which had at least one event panic.
    pub failed_batches: usize,
    /// Scene nodes whose world matrix was recomputed.
    pub nodes_updated: usize,
    pub draw_calls: u32,
    pub graph: GraphStatistics,
}

impl FrameStatistics {
    fn record(&mut self, report: FireReport) {
        self.events_fired += report.applied;
        self.events_skipped += report.skipped;
        if !report.succeeded() {
            self.failed_batches += 1;
        }
    }
}

/// Owns the render system, the technique, the scenes and the frame
/// listeners, and drives one frame at a time.
pub struct Engine {
    config: EngineConfig,
    render_system: Box<dyn RenderSystem>,
    technique: Box<dyn RenderTechnique>,
    listeners: FastIndexMap<SsoString, Arc<FrameListener>>,
    scenes: FastIndexMap<SsoString, Arc<Mutex<Scene>>>,
    active_scene: SsoString,
    frame_buffers: FrameBufferStore,
    frame: u64,
    cleaned_up: bool,
}

impl Engine {
    /// Picks the render system and technique named in `config` and
    /// initialises the technique.
    pub fn new(
        config: EngineConfig,
        backends: &BackendRegistry,
        techniques: &TechniqueRegistry,
    ) -> Result<Self, EngineError> {
        profiling::scope!("Engine::new");

        let mut render_system = backends.create(&config.render_system, &config.render_system_options())?;

        let mut scenes = FastIndexMap::default();
        scenes.insert(
            SsoString::from(DEFAULT_SCENE_NAME),
            Arc::new(Mutex::new(Scene::new(DEFAULT_SCENE_NAME))),
        );
        let mut listeners = FastIndexMap::default();
        listeners.insert(
            SsoString::from(DEFAULT_LISTENER_NAME),
            Arc::new(FrameListener::new(DEFAULT_LISTENER_NAME).with_backtraces(config.debug_backtraces)),
        );

        let info = RenderInfo {
            resolution: config.resolution(),
            samples: config.sample_count(),
            exposure: config.exposure,
            ..RenderInfo::default()
        };
        let mut technique = techniques.create(&config.technique, &*render_system, &info)?;

        render_system.set_current();
        let initialised = technique.initialise(&mut *render_system, &info);
        render_system.end_current();
        if let Err(source) = initialised {
            technique.cleanup(&mut *render_system);
            render_system.cleanup();
            return Err(EngineError::TechniqueInitialisation {
                name: config.technique.as_str().into(),
                source,
            });
        }

        Ok(Self {
            config,
            render_system,
            technique,
            listeners,
            scenes,
            active_scene: SsoString::from(DEFAULT_SCENE_NAME),
            frame_buffers: FrameBufferStore::new(),
            frame: 0,
            cleaned_up: false,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn render_system(&self) -> &dyn RenderSystem {
        &*self.render_system
    }

    pub fn render_system_mut(&mut self) -> &mut dyn RenderSystem {
        &mut *self.render_system
    }

    pub fn technique(&self) -> &dyn RenderTechnique {
        &*self.technique
    }

    /// Number of frames rendered so far.
    pub fn frame_count(&self) -> u64 {
        self.frame
    }

    /// Listener every engine has, for events without a better home.
    pub fn default_listener(&self) -> Arc<FrameListener> {
        Arc::clone(&self.listeners[0])
    }

    pub fn add_frame_listener(&mut self, name: &str) -> Result<Arc<FrameListener>, EngineError> {
        if self.listeners.contains_key(name) {
            return Err(EngineError::DuplicateListener { name: name.into() });
        }
        let listener = Arc::new(FrameListener::new(name).with_backtraces(self.config.debug_backtraces));
        self.listeners.insert(name.into(), Arc::clone(&listener));
        Ok(listener)
    }

    pub fn frame_listener(&self, name: &str) -> Option<Arc<FrameListener>> {
        self.listeners.get(name).cloned()
    }

    /// Removes a listener, discarding its pending events. The default
    /// listener can't be removed.
    pub fn remove_frame_listener(&mut self, name: &str) -> bool {
        if name == DEFAULT_LISTENER_NAME {
            log::warn!("The default frame listener can't be removed");
            return false;
        }
        match self.listeners.shift_remove(name) {
            Some(listener) => {
                listener.flush();
                true
            }
            None => false,
        }
    }

    /// Creates an empty scene, or returns the existing one with that name.
    pub fn create_scene(&mut self, name: &str) -> Arc<Mutex<Scene>> {
        Arc::clone(
            self.scenes
                .entry(name.into())
                .or_insert_with(|| Arc::new(Mutex::new(Scene::new(name)))),
        )
    }

    pub fn scene(&self, name: &str) -> Option<Arc<Mutex<Scene>>> {
        self.scenes.get(name).cloned()
    }

    /// The scene drawn by [`Self::render_frame`].
    pub fn active_scene(&self) -> Arc<Mutex<Scene>> {
        match self.scenes.get(&self.active_scene) {
            Some(scene) => Arc::clone(scene),
            None => Arc::clone(&self.scenes[0]),
        }
    }

    pub fn set_active_scene(&mut self, name: &str) -> Result<(), EngineError> {
        if !self.scenes.contains_key(name) {
            return Err(EngineError::UnknownScene { name: name.into() });
        }
        self.active_scene = name.into();
        Ok(())
    }

    fn fire_cpu(&self, ty: EventType, statistics: &mut FrameStatistics) {
        for listener in self.listeners.values() {
            statistics.record(listener.run_cpu_events(ty));
        }
    }

    fn fire_gpu(&mut self, ty: EventType, statistics: &mut FrameStatistics) {
        for listener in self.listeners.values() {
            statistics.record(listener.run_gpu_events(ty, &mut *self.render_system));
        }
    }

    fn fire(&mut self, ty: EventType, statistics: &mut FrameStatistics) {
        self.fire_cpu(ty, statistics);
        self.fire_gpu(ty, statistics);
    }

    /// Renders one frame of the active scene.
    ///
    /// Each phase fires the CPU events of every listener before their GPU
    /// events. GPU events and the technique run with the render system
    /// current.
    pub fn render_frame(&mut self) -> FrameStatistics {
        profiling::scope!("Engine::render_frame");

        let mut statistics = FrameStatistics {
            frame: self.frame,
            ..FrameStatistics::default()
        };
        self.render_system.set_current();

        self.fire(EventType::PreRender, &mut statistics);

        let scene = self.active_scene();
        statistics.nodes_updated = scene.lock().update();

        self.fire(EventType::QueueRender, &mut statistics);

        {
            profiling::scope!("Render Technique");
            let mut scene = scene.lock();
            let info = RenderInfo {
                resolution: self.render_system.size(),
                samples: self.config.sample_count(),
                exposure: self.config.exposure,
                background_colour: scene.background_colour,
                frame: self.frame,
            };
            self.technique.begin_frame(&mut scene, &info);

            let mut graph = RenderGraph::new();
            self.technique.render(&info, &scene, &mut graph);
            statistics.graph = graph.execute(&mut *self.render_system, &mut scene, &mut self.frame_buffers);

            self.technique.end_frame(&mut *self.render_system);
        }

        self.render_system.swap_buffers();
        statistics.draw_calls = self.render_system.recorder_mut().take_draw_calls();
        self.render_system.check_error("Engine::render_frame");

        self.fire(EventType::PostRender, &mut statistics);
        self.render_system.end_current();

        if statistics.failed_batches != 0 {
            log::warn!(
                "Frame {}: {} event batches failed",
                statistics.frame,
                statistics.failed_batches
            );
        }
        self.frame += 1;
        statistics
    }

    /// Discards every pending event, then releases the technique, the
    /// scenes' render system objects and the render system itself.
    pub fn cleanup(&mut self) {
        if self.cleaned_up {
            return;
        }
        profiling::scope!("Engine::cleanup");

        for listener in self.listeners.values() {
            listener.flush();
        }
        self.render_system.set_current();
        self.technique.cleanup(&mut *self.render_system);
        for scene in self.scenes.values() {
            scene.lock().cleanup(&mut *self.render_system);
        }
        self.frame_buffers.clear(&mut *self.render_system);
        self.render_system.end_current();
        self.render_system.cleanup();
        self.cleaned_up = true;
        log::info!("Engine cleaned up after {} frames", self.frame);
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.cleanup();
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("render_system", &self.render_system.name())
            .field("technique", &self.technique.name())
            .field("frame", &self.frame)
            .finish_non_exhaustive()
    }
}
