use bitflags::bitflags;

/// Programmable stages a shader program can hold.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ShaderType {
    Vertex,
    Hull,
    Domain,
    Geometry,
    Pixel,
    Compute,
}

impl ShaderType {
    pub const COUNT: usize = 6;
    pub const ARRAY: [Self; Self::COUNT] = [
        Self::Vertex,
        Self::Hull,
        Self::Domain,
        Self::Geometry,
        Self::Pixel,
        Self::Compute,
    ];

    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn flag(self) -> ShaderTypeFlags {
        match self {
            Self::Vertex => ShaderTypeFlags::VERTEX,
            Self::Hull => ShaderTypeFlags::HULL,
            Self::Domain => ShaderTypeFlags::DOMAIN,
            Self::Geometry => ShaderTypeFlags::GEOMETRY,
            Self::Pixel => ShaderTypeFlags::PIXEL,
            Self::Compute => ShaderTypeFlags::COMPUTE,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Vertex => "vertex",
            Self::Hull => "hull",
            Self::Domain => "domain",
            Self::Geometry => "geometry",
            Self::Pixel => "pixel",
            Self::Compute => "compute",
        }
    }
}

bitflags! {
    /// Set of shader stages, used for uniform block visibility.
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
    pub struct ShaderTypeFlags: u8 {
        const VERTEX = 1 << 0;
        const HULL = 1 << 1;
        const DOMAIN = 1 << 2;
        const GEOMETRY = 1 << 3;
        const PIXEL = 1 << 4;
        const COMPUTE = 1 << 5;
    }
}

impl From<ShaderTypeFlags> for wgt::ShaderStages {
    fn from(value: ShaderTypeFlags) -> Self {
        let mut stages = Self::NONE;
        if value.intersects(ShaderTypeFlags::VERTEX | ShaderTypeFlags::HULL | ShaderTypeFlags::DOMAIN | ShaderTypeFlags::GEOMETRY) {
            stages |= Self::VERTEX;
        }
        if value.contains(ShaderTypeFlags::PIXEL) {
            stages |= Self::FRAGMENT;
        }
        if value.contains(ShaderTypeFlags::COMPUTE) {
            stages |= Self::COMPUTE;
        }
        stages
    }
}

bitflags! {
    /// Components of a frame buffer affected by a clear or a blit.
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
    pub struct BufferComponents: u8 {
        const COLOUR = 1 << 0;
        const DEPTH = 1 << 1;
        const STENCIL = 1 << 2;
    }
}

/// Blend factors.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum BlendOperand {
    Zero,
    One,
    SrcColour,
    InvSrcColour,
    DstColour,
    InvDstColour,
    SrcAlpha,
    InvSrcAlpha,
    DstAlpha,
    InvDstAlpha,
    Constant,
    InvConstant,
    SrcAlphaSaturate,
    Src1Colour,
    InvSrc1Colour,
    Src1Alpha,
    InvSrc1Alpha,
}

impl From<BlendOperand> for wgt::BlendFactor {
    fn from(value: BlendOperand) -> Self {
        match value {
            BlendOperand::Zero => Self::Zero,
            BlendOperand::One => Self::One,
            BlendOperand::SrcColour => Self::Src,
            BlendOperand::InvSrcColour => Self::OneMinusSrc,
            BlendOperand::DstColour => Self::Dst,
            BlendOperand::InvDstColour => Self::OneMinusDst,
            BlendOperand::SrcAlpha => Self::SrcAlpha,
            BlendOperand::InvSrcAlpha => Self::OneMinusSrcAlpha,
            BlendOperand::DstAlpha => Self::DstAlpha,
            BlendOperand::InvDstAlpha => Self::OneMinusDstAlpha,
            BlendOperand::Constant => Self::Constant,
            BlendOperand::InvConstant => Self::OneMinusConstant,
            BlendOperand::SrcAlphaSaturate => Self::SrcAlphaSaturated,
            BlendOperand::Src1Colour => Self::Src1,
            BlendOperand::InvSrc1Colour => Self::OneMinusSrc1,
            BlendOperand::Src1Alpha => Self::Src1Alpha,
            BlendOperand::InvSrc1Alpha => Self::OneMinusSrc1Alpha,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub enum BlendOperation {
    #[default]
    Add,
    Subtract,
    RevSubtract,
    Min,
    Max,
}

impl From<BlendOperation> for wgt::BlendOperation {
    fn from(value: BlendOperation) -> Self {
        match value {
            BlendOperation::Add => Self::Add,
            BlendOperation::Subtract => Self::Subtract,
            BlendOperation::RevSubtract => Self::ReverseSubtract,
            BlendOperation::Min => Self::Min,
            BlendOperation::Max => Self::Max,
        }
    }
}

/// How a pass' colour or alpha is combined with what is already in the
/// target.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub enum BlendMode {
    NoBlend,
    Additive,
    Multiplicative,
    Interpolative,
    /// Order independent, weighted accumulation.
    #[default]
    ABuffer,
}

impl BlendMode {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "none" | "no_blend" => Self::NoBlend,
            "additive" => Self::Additive,
            "multiplicative" => Self::Multiplicative,
            "interpolative" => Self::Interpolative,
            "a_buffer" => Self::ABuffer,
            _ => return None,
        })
    }
}

/// Comparison used by depth and stencil tests.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ComparisonFunc {
    Never,
    Less,
    Equal,
    LEqual,
    Greater,
    NotEqual,
    GEqual,
    Always,
}

impl From<ComparisonFunc> for wgt::CompareFunction {
    fn from(value: ComparisonFunc) -> Self {
        match value {
            ComparisonFunc::Never => Self::Never,
            ComparisonFunc::Less => Self::Less,
            ComparisonFunc::Equal => Self::Equal,
            ComparisonFunc::LEqual => Self::LessEqual,
            ComparisonFunc::Greater => Self::Greater,
            ComparisonFunc::NotEqual => Self::NotEqual,
            ComparisonFunc::GEqual => Self::GreaterEqual,
            ComparisonFunc::Always => Self::Always,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum StencilOp {
    Keep,
    Zero,
    Replace,
    Increment,
    IncrWrap,
    Decrement,
    DecrWrap,
    Invert,
}

impl From<StencilOp> for wgt::StencilOperation {
    fn from(value: StencilOp) -> Self {
        match value {
            StencilOp::Keep => Self::Keep,
            StencilOp::Zero => Self::Zero,
            StencilOp::Replace => Self::Replace,
            StencilOp::Increment => Self::IncrementClamp,
            StencilOp::IncrWrap => Self::IncrementWrap,
            StencilOp::Decrement => Self::DecrementClamp,
            StencilOp::DecrWrap => Self::DecrementWrap,
            StencilOp::Invert => Self::Invert,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Topology {
    Points,
    Lines,
    LineLoop,
    LineStrip,
    Triangles,
    TriangleStrips,
    TriangleFan,
    Quads,
    QuadStrips,
    Polygon,
}

impl Topology {
    /// Topologies a descriptor based api can draw directly. The others only
    /// exist on the legacy GL path.
    pub const fn to_wgt(self) -> Option<wgt::PrimitiveTopology> {
        match self {
            Self::Points => Some(wgt::PrimitiveTopology::PointList),
            Self::Lines => Some(wgt::PrimitiveTopology::LineList),
            Self::LineStrip => Some(wgt::PrimitiveTopology::LineStrip),
            Self::Triangles => Some(wgt::PrimitiveTopology::TriangleList),
            Self::TriangleStrips => Some(wgt::PrimitiveTopology::TriangleStrip),
            Self::LineLoop | Self::TriangleFan | Self::Quads | Self::QuadStrips | Self::Polygon => None,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum WrapMode {
    Repeat,
    MirroredRepeat,
    ClampToBorder,
    ClampToEdge,
}

impl From<WrapMode> for wgt::AddressMode {
    fn from(value: WrapMode) -> Self {
        match value {
            WrapMode::Repeat => Self::Repeat,
            WrapMode::MirroredRepeat => Self::MirrorRepeat,
            WrapMode::ClampToBorder => Self::ClampToBorder,
            WrapMode::ClampToEdge => Self::ClampToEdge,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub enum FillMode {
    Point,
    Line,
    #[default]
    Solid,
}

impl From<FillMode> for wgt::PolygonMode {
    fn from(value: FillMode) -> Self {
        match value {
            FillMode::Point => Self::Point,
            FillMode::Line => Self::Line,
            FillMode::Solid => Self::Fill,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub enum CullMode {
    None,
    Front,
    #[default]
    Back,
}

impl CullMode {
    pub const fn to_wgt(self) -> Option<wgt::Face> {
        match self {
            Self::None => None,
            Self::Front => Some(wgt::Face::Front),
            Self::Back => Some(wgt::Face::Back),
        }
    }
}

/// Pixel formats render targets and textures can use.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    L8,
    R5G6B5,
    R8G8B8A8,
    R8G8B8A8Srgb,
    B8G8R8A8Srgb,
    R16F,
    R32F,
    RG16F,
    RGBA16F,
    RGBA32F,
    D16,
    D24S8,
    D32F,
}

impl PixelFormat {
    pub const fn has_depth(self) -> bool {
        matches!(self, Self::D16 | Self::D24S8 | Self::D32F)
    }

    pub const fn has_stencil(self) -> bool {
        matches!(self, Self::D24S8)
    }

    pub const fn components(self) -> BufferComponents {
        match self {
            Self::D16 | Self::D32F => BufferComponents::DEPTH,
            Self::D24S8 => BufferComponents::DEPTH.union(BufferComponents::STENCIL),
            _ => BufferComponents::COLOUR,
        }
    }

    pub const fn to_wgt(self) -> Option<wgt::TextureFormat> {
        Some(match self {
            Self::L8 => wgt::TextureFormat::R8Unorm,
            Self::R5G6B5 => return None,
            Self::R8G8B8A8 => wgt::TextureFormat::Rgba8Unorm,
            Self::R8G8B8A8Srgb => wgt::TextureFormat::Rgba8UnormSrgb,
            Self::B8G8R8A8Srgb => wgt::TextureFormat::Bgra8UnormSrgb,
            Self::R16F => wgt::TextureFormat::R16Float,
            Self::R32F => wgt::TextureFormat::R32Float,
            Self::RG16F => wgt::TextureFormat::Rg16Float,
            Self::RGBA16F => wgt::TextureFormat::Rgba16Float,
            Self::RGBA32F => wgt::TextureFormat::Rgba32Float,
            Self::D16 => wgt::TextureFormat::Depth16Unorm,
            Self::D24S8 => wgt::TextureFormat::Depth24PlusStencil8,
            Self::D32F => wgt::TextureFormat::Depth32Float,
        })
    }
}

/// Multisampling level of a render target.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub enum SampleCount {
    #[default]
    One = 1,
    Four = 4,
}

impl TryFrom<u8> for SampleCount {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            1 => Self::One,
            4 => Self::Four,
            v => return Err(v),
        })
    }
}

impl SampleCount {
    pub const ARRAY: [Self; 2] = [Self::One, Self::Four];

    /// Determines if a resolve texture is needed for this texture.
    pub const fn needs_resolve(self) -> bool {
        !matches!(self, Self::One)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_flags_collapse_onto_wgt_stages() {
        let stages: wgt::ShaderStages = (ShaderTypeFlags::GEOMETRY | ShaderTypeFlags::PIXEL).into();
        assert_eq!(stages, wgt::ShaderStages::VERTEX | wgt::ShaderStages::FRAGMENT);
    }

    #[test]
    fn legacy_topologies_have_no_wgt_equivalent() {
        assert_eq!(Topology::Quads.to_wgt(), None);
        assert_eq!(Topology::Triangles.to_wgt(), Some(wgt::PrimitiveTopology::TriangleList));
    }

    #[test]
    fn depth_formats() {
        assert!(PixelFormat::D24S8.has_stencil());
        assert_eq!(PixelFormat::D32F.components(), BufferComponents::DEPTH);
        assert_eq!(PixelFormat::RGBA16F.components(), BufferComponents::COLOUR);
    }
}
