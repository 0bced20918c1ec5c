use std::sync::Arc;

use anyhow::{Context, Result};
use castor3d::{
    backend::{BackendRegistry, RecordedCommand},
    scene::Scene,
    types::EventType,
    Engine, EngineConfig, FrameStatistics, GpuFrameEvent,
};
use parking_lot::Mutex;

#[derive(Debug, Clone)]
pub struct TestRunnerBuilder {
    config: EngineConfig,
}

impl Default for TestRunnerBuilder {
    fn default() -> Self {
        Self {
            config: EngineConfig {
                resolution: [64, 64],
                record_commands: true,
                ..EngineConfig::default()
            },
        }
    }
}

impl TestRunnerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn render_system(mut self, name: &str) -> Self {
        self.config.render_system = name.into();
        self
    }

    pub fn technique(mut self, name: &str) -> Self {
        self.config.technique = name.into();
        self
    }

    pub fn samples(mut self, samples: u8) -> Self {
        self.config.samples = samples;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn build(self) -> Result<TestRunner> {
        let _ = env_logger::builder().is_test(true).try_init();

        let backends = BackendRegistry::with_builtin();
        let techniques = castor3d_routine::builtin_techniques();
        let engine = Engine::new(self.config, &backends, &techniques).context("Engine creation failed")?;
        Ok(TestRunner { engine })
    }
}

/// An engine recording every render system call, with its default scene.
#[derive(Debug)]
pub struct TestRunner {
    pub engine: Engine,
}

impl TestRunner {
    pub fn builder() -> TestRunnerBuilder {
        TestRunnerBuilder::new()
    }

    pub fn scene(&self) -> Arc<Mutex<Scene>> {
        self.engine.active_scene()
    }

    /// Queues the upload of the scene's meshes and programs for the next
    /// frame.
    pub fn upload_scene(&self) {
        self.engine
            .default_listener()
            .post_gpu_event(GpuFrameEvent::initialise(EventType::PreRender, self.scene()));
    }

    /// Renders a frame and returns its statistics with every command the
    /// render system issued since the last call.
    pub fn render_frame(&mut self) -> (FrameStatistics, Vec<RecordedCommand>) {
        let statistics = self.engine.render_frame();
        let commands = self.engine.render_system_mut().recorder_mut().take_commands();
        (statistics, commands)
    }

    pub fn take_commands(&mut self) -> Vec<RecordedCommand> {
        self.engine.render_system_mut().recorder_mut().take_commands()
    }
}
