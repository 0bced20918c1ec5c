//! Pieces every technique shares: the frame's render nodes, the transient
//! targets and the weighted blended transparent stage.

use castor3d::{
    backend::RenderSystem,
    graph::{RenderGraph, RenderTargetDescriptor, RenderTargetHandle},
    scene::Scene,
    technique::RenderInfo,
    types::SampleCount,
    ShaderError,
};
use glam::Vec4;

use crate::{
    combine::CombinePass,
    pass::{collect_render_nodes, PassStage, RenderNode, RenderTechniquePass, DEPTH_FORMAT, HDR_FORMAT},
    shaders::ShaderPreProcessor,
    uniforms::SceneUniform,
};

/// What the passes of one frame draw.
#[derive(Debug, Default)]
pub struct FrameInputs {
    pub nodes: Vec<RenderNode>,
    pub scene: SceneUniform,
}

impl FrameInputs {
    pub fn gather(scene: &mut Scene) -> Self {
        profiling::scope!("FrameInputs::gather");
        Self {
            nodes: collect_render_nodes(scene),
            scene: SceneUniform::from_scene(scene),
        }
    }
}

/// Colour and depth target the lit passes draw into.
pub fn hdr_target(graph: &mut RenderGraph<'_>, info: &RenderInfo, samples: SampleCount) -> RenderTargetHandle {
    graph.add_render_target(RenderTargetDescriptor::single(
        "hdr",
        info.resolution,
        samples,
        Some(HDR_FORMAT),
        Some(DEPTH_FORMAT),
    ))
}

pub fn accumulation_target(graph: &mut RenderGraph<'_>, info: &RenderInfo, samples: SampleCount) -> RenderTargetHandle {
    graph.add_render_target(RenderTargetDescriptor {
        label: Some("weighted blend accumulation".into()),
        resolution: info.resolution,
        samples,
        colour: PassStage::Transparent.colour_formats(),
        depth: Some(DEPTH_FORMAT),
    })
}

pub fn gbuffer_target(graph: &mut RenderGraph<'_>, info: &RenderInfo) -> RenderTargetHandle {
    graph.add_render_target(RenderTargetDescriptor {
        label: Some("geometry buffer".into()),
        resolution: info.resolution,
        samples: SampleCount::One,
        colour: PassStage::GeometryBuffer.colour_formats(),
        depth: Some(DEPTH_FORMAT),
    })
}

/// Transparent nodes drawn into an accumulation target, then composited
/// over the opaque result.
#[derive(Debug)]
pub struct TransparentStage {
    pass: RenderTechniquePass,
    combine: CombinePass,
    samples: SampleCount,
}

impl TransparentStage {
    pub fn new(preprocessor: &ShaderPreProcessor, samples: SampleCount) -> Self {
        Self {
            pass: RenderTechniquePass::new(preprocessor, "transparent", PassStage::Transparent),
            combine: CombinePass::new(preprocessor, samples),
            samples,
        }
    }

    pub fn pass(&self) -> &RenderTechniquePass {
        &self.pass
    }

    pub fn initialise(&mut self, render_system: &mut dyn RenderSystem) -> Result<(), ShaderError> {
        self.pass.initialise(render_system, self.samples)?;
        self.combine.initialise(render_system)
    }

    pub fn cleanup(&mut self, render_system: &mut dyn RenderSystem) {
        self.pass.cleanup(render_system);
        self.combine.cleanup(render_system);
    }

    pub fn prepare(&mut self, scene: &mut Scene, info: &RenderInfo, frame: &FrameInputs) {
        self.pass.prepare(scene, info, &frame.nodes, &frame.scene);
    }

    /// Draws over `hdr`, depth tested against `depth_source`.
    pub fn add_to_graph<'node>(
        &'node mut self,
        graph: &mut RenderGraph<'node>,
        info: &RenderInfo,
        hdr: RenderTargetHandle,
        depth_source: RenderTargetHandle,
    ) {
        if self.pass.nodes().is_empty() {
            return;
        }
        let accumulation = accumulation_target(graph, info, self.samples);
        self.pass
            .add_to_graph(graph, accumulation, Some(depth_source), Some(Vec4::ZERO));
        self.combine.add_to_graph(graph, accumulation, hdr);
    }
}
