//! Fixed pipeline state and pipeline objects.

use arrayvec::ArrayVec;
use castor3d_types::{
    BlendMode, BlendOperand, BlendOperation, ComparisonFunc, CullMode, FillMode, PipelineHandle, PixelFormat,
    SampleCount, StencilOp, Topology,
};

use crate::{backend::RenderSystem, shader::ShaderProgram, util::typedefs::SsoString, ShaderError};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct StencilFaceState {
    pub func: ComparisonFunc,
    pub fail: StencilOp,
    pub depth_fail: StencilOp,
    pub pass: StencilOp,
}

impl Default for StencilFaceState {
    fn default() -> Self {
        Self {
            func: ComparisonFunc::Always,
            fail: StencilOp::Keep,
            depth_fail: StencilOp::Keep,
            pass: StencilOp::Keep,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct DepthStencilState {
    pub depth_test: bool,
    pub depth_write: bool,
    pub depth_func: ComparisonFunc,
    pub stencil_test: bool,
    pub stencil_ref: u32,
    pub stencil_read_mask: u32,
    pub stencil_write_mask: u32,
    pub front: StencilFaceState,
    pub back: StencilFaceState,
}

impl Default for DepthStencilState {
    fn default() -> Self {
        Self {
            depth_test: true,
            depth_write: true,
            depth_func: ComparisonFunc::Less,
            stencil_test: false,
            stencil_ref: 0,
            stencil_read_mask: 0xFF,
            stencil_write_mask: 0xFF,
            front: StencilFaceState::default(),
            back: StencilFaceState::default(),
        }
    }
}

impl DepthStencilState {
    /// Tests against the depth buffer without writing it, for blended
    /// geometry.
    pub fn read_only() -> Self {
        Self {
            depth_write: false,
            ..Self::default()
        }
    }

    /// Full screen passes.
    pub fn disabled() -> Self {
        Self {
            depth_test: false,
            depth_write: false,
            ..Self::default()
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct RasteriserState {
    pub fill_mode: FillMode,
    pub cull_mode: CullMode,
    pub front_ccw: bool,
    pub depth_clipping: bool,
    pub scissor: bool,
    pub multisample: bool,
    /// Constant depth bias, in depth buffer units.
    pub depth_bias: f32,
}

impl Default for RasteriserState {
    fn default() -> Self {
        Self {
            fill_mode: FillMode::Solid,
            cull_mode: CullMode::Back,
            front_ccw: true,
            depth_clipping: true,
            scissor: false,
            multisample: false,
            depth_bias: 0.0,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct MultisampleState {
    pub samples: SampleCount,
    pub alpha_to_coverage: bool,
}

/// Blending of one colour attachment.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RenderTargetBlend {
    pub enabled: bool,
    pub src: BlendOperand,
    pub dst: BlendOperand,
    pub op: BlendOperation,
    pub alpha_src: BlendOperand,
    pub alpha_dst: BlendOperand,
    pub alpha_op: BlendOperation,
    /// RGBA bits, red lowest.
    pub write_mask: u8,
}

impl Default for RenderTargetBlend {
    fn default() -> Self {
        Self {
            enabled: false,
            src: BlendOperand::One,
            dst: BlendOperand::Zero,
            op: BlendOperation::Add,
            alpha_src: BlendOperand::One,
            alpha_dst: BlendOperand::Zero,
            alpha_op: BlendOperation::Add,
            write_mask: 0xF,
        }
    }
}

impl RenderTargetBlend {
    /// Same factors for colour and alpha.
    pub const fn uniform(src: BlendOperand, dst: BlendOperand) -> Self {
        Self {
            enabled: true,
            src,
            dst,
            op: BlendOperation::Add,
            alpha_src: src,
            alpha_dst: dst,
            alpha_op: BlendOperation::Add,
            write_mask: 0xF,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlendState {
    /// Each attachment uses its own entry of `targets` instead of the first.
    pub independent: bool,
    pub targets: ArrayVec<RenderTargetBlend, 8>,
}

impl Default for BlendState {
    fn default() -> Self {
        let mut targets = ArrayVec::new();
        targets.push(RenderTargetBlend::default());
        Self {
            independent: false,
            targets,
        }
    }
}

impl BlendState {
    pub fn single(target: RenderTargetBlend) -> Self {
        let mut targets = ArrayVec::new();
        targets.push(target);
        Self {
            independent: false,
            targets,
        }
    }

    /// Blend of a material pass, from its colour and alpha blend modes.
    ///
    /// The alpha mode also overrides the colour factors for the
    /// multiplicative and interpolative cases.
    pub fn from_modes(colour: BlendMode, alpha: BlendMode) -> Self {
        let mut target = RenderTargetBlend::default();
        let mut enabled = true;

        (target.src, target.dst) = match colour {
            BlendMode::NoBlend => {
                enabled = false;
                (BlendOperand::One, BlendOperand::Zero)
            }
            BlendMode::Additive => (BlendOperand::One, BlendOperand::One),
            BlendMode::Multiplicative => (BlendOperand::Zero, BlendOperand::InvSrcColour),
            BlendMode::Interpolative | BlendMode::ABuffer => (BlendOperand::SrcColour, BlendOperand::InvSrcColour),
        };

        match alpha {
            BlendMode::NoBlend => {
                (target.alpha_src, target.alpha_dst) = (BlendOperand::One, BlendOperand::Zero);
            }
            BlendMode::Additive => {
                enabled = true;
                (target.alpha_src, target.alpha_dst) = (BlendOperand::One, BlendOperand::One);
            }
            BlendMode::Multiplicative => {
                enabled = true;
                (target.alpha_src, target.alpha_dst) = (BlendOperand::Zero, BlendOperand::InvSrcAlpha);
                (target.src, target.dst) = (BlendOperand::Zero, BlendOperand::InvSrcAlpha);
            }
            BlendMode::Interpolative | BlendMode::ABuffer => {
                enabled = true;
                (target.alpha_src, target.alpha_dst) = (BlendOperand::SrcAlpha, BlendOperand::InvSrcAlpha);
                (target.src, target.dst) = (BlendOperand::SrcAlpha, BlendOperand::InvSrcAlpha);
            }
        }

        target.enabled = enabled;
        Self::single(target)
    }

    pub fn from_mode(mode: BlendMode) -> Self {
        Self::from_modes(mode, mode)
    }

    /// Weighted blended order independent transparency: an accumulation
    /// target summing weighted colours, and a revealage target multiplying
    /// coverage.
    pub fn weighted_blend() -> Self {
        let mut targets = ArrayVec::new();
        targets.push(RenderTargetBlend::uniform(BlendOperand::One, BlendOperand::One));
        targets.push(RenderTargetBlend::uniform(BlendOperand::Zero, BlendOperand::InvSrcColour));
        Self {
            independent: true,
            targets,
        }
    }
}

/// Everything a pipeline object is baked from, apart from the program.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineDescriptor {
    pub label: Option<SsoString>,
    pub topology: Topology,
    pub depth_stencil: DepthStencilState,
    pub rasteriser: RasteriserState,
    pub blend: BlendState,
    pub multisample: MultisampleState,
    pub colour_formats: ArrayVec<PixelFormat, 8>,
    pub depth_format: Option<PixelFormat>,
}

impl Default for PipelineDescriptor {
    fn default() -> Self {
        let mut colour_formats = ArrayVec::new();
        colour_formats.push(PixelFormat::R8G8B8A8);
        Self {
            label: None,
            topology: Topology::Triangles,
            depth_stencil: DepthStencilState::default(),
            rasteriser: RasteriserState::default(),
            blend: BlendState::default(),
            multisample: MultisampleState::default(),
            colour_formats,
            depth_format: Some(PixelFormat::D24S8),
        }
    }
}

/// A program bound together with the fixed state it draws with.
///
/// Render systems without programs draw with the state alone.
#[derive(Debug)]
pub struct Pipeline {
    desc: PipelineDescriptor,
    program: Option<ShaderProgram>,
    handle: Option<PipelineHandle>,
}

impl Pipeline {
    pub fn new(desc: PipelineDescriptor, program: Option<ShaderProgram>) -> Self {
        Self {
            desc,
            program,
            handle: None,
        }
    }

    pub fn desc(&self) -> &PipelineDescriptor {
        &self.desc
    }

    pub fn program(&self) -> Option<&ShaderProgram> {
        self.program.as_ref()
    }

    pub fn program_mut(&mut self) -> Option<&mut ShaderProgram> {
        self.program.as_mut()
    }

    pub fn handle(&self) -> Option<PipelineHandle> {
        self.handle
    }

    /// Whether the program latched a compile or link error.
    pub fn is_error(&self) -> bool {
        self.program.as_ref().map_or(false, ShaderProgram::is_error)
    }

    /// Bakes the state and builds the program if the render system runs
    /// programs. A failed state bake leaves the pipeline unusable, which is
    /// only logged.
    pub fn initialise(&mut self, render_system: &mut dyn RenderSystem) -> Result<(), ShaderError> {
        self.cleanup(render_system);
        self.handle = render_system.create_pipeline(&self.desc);
        if self.handle.is_none() {
            log::warn!("Pipeline {:?} has no state object", self.desc.label);
        }
        match &mut self.program {
            Some(program) if render_system.use_shaders() => program.initialise(render_system),
            _ => Ok(()),
        }
    }

    /// Binds state and program. Does nothing and returns false while the
    /// program is in an error state or the state failed to bake.
    pub fn apply(&mut self, render_system: &mut dyn RenderSystem) -> bool {
        if self.is_error() {
            return false;
        }
        let Some(handle) = self.handle else {
            return false;
        };
        if let Some(program) = &mut self.program {
            if render_system.use_shaders() && !program.bind(render_system) {
                return false;
            }
        }
        render_system.bind_pipeline(handle);
        true
    }

    pub fn unapply(&mut self, render_system: &mut dyn RenderSystem) {
        if let Some(program) = &mut self.program {
            program.unbind(render_system);
        }
    }

    pub fn cleanup(&mut self, render_system: &mut dyn RenderSystem) {
        if let Some(handle) = self.handle.take() {
            render_system.destroy_pipeline(handle);
        }
        if let Some(program) = &mut self.program {
            if render_system.use_shaders() {
                program.cleanup(render_system);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use castor3d_types::{BlendMode, BlendOperand};

    use super::BlendState;

    #[test]
    fn blend_mode_table() {
        let none = BlendState::from_mode(BlendMode::NoBlend);
        assert!(!none.targets[0].enabled);

        let additive = BlendState::from_mode(BlendMode::Additive);
        assert_eq!(
            (additive.targets[0].src, additive.targets[0].dst),
            (BlendOperand::One, BlendOperand::One)
        );

        let interpolative = BlendState::from_modes(BlendMode::Additive, BlendMode::Interpolative);
        assert_eq!(
            (interpolative.targets[0].src, interpolative.targets[0].dst),
            (BlendOperand::SrcAlpha, BlendOperand::InvSrcAlpha)
        );

        let multiplicative = BlendState::from_mode(BlendMode::Multiplicative);
        assert_eq!(multiplicative.targets[0].dst, BlendOperand::InvSrcAlpha);
        assert!(multiplicative.targets[0].enabled);
    }

    #[test]
    fn weighted_blend_targets() {
        let state = BlendState::weighted_blend();
        assert!(state.independent);
        assert_eq!(state.targets.len(), 2);
        assert_eq!(state.targets[1].dst, BlendOperand::InvSrcColour);
    }
}
