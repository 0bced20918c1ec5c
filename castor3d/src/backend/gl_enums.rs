//! GLenum values and the translation of engine enums into them.

use castor3d_types::{
    BlendOperand, BlendOperation, BufferComponents, ComparisonFunc, CullMode, ElementKind, FillMode, PixelFormat,
    Shape, StencilOp, Topology, VariableType, WrapMode,
};

pub const GL_ZERO: u32 = 0;
pub const GL_ONE: u32 = 1;
pub const GL_SRC_COLOR: u32 = 0x0300;
pub const GL_ONE_MINUS_SRC_COLOR: u32 = 0x0301;
pub const GL_SRC_ALPHA: u32 = 0x0302;
pub const GL_ONE_MINUS_SRC_ALPHA: u32 = 0x0303;
pub const GL_DST_ALPHA: u32 = 0x0304;
pub const GL_ONE_MINUS_DST_ALPHA: u32 = 0x0305;
pub const GL_DST_COLOR: u32 = 0x0306;
pub const GL_ONE_MINUS_DST_COLOR: u32 = 0x0307;
pub const GL_SRC_ALPHA_SATURATE: u32 = 0x0308;
pub const GL_CONSTANT_COLOR: u32 = 0x8001;
pub const GL_ONE_MINUS_CONSTANT_COLOR: u32 = 0x8002;
pub const GL_SRC1_ALPHA: u32 = 0x8589;
pub const GL_SRC1_COLOR: u32 = 0x88F9;
pub const GL_ONE_MINUS_SRC1_COLOR: u32 = 0x88FA;
pub const GL_ONE_MINUS_SRC1_ALPHA: u32 = 0x88FB;

pub const GL_FUNC_ADD: u32 = 0x8006;
pub const GL_MIN: u32 = 0x8007;
pub const GL_MAX: u32 = 0x8008;
pub const GL_FUNC_SUBTRACT: u32 = 0x800A;
pub const GL_FUNC_REVERSE_SUBTRACT: u32 = 0x800B;

pub const GL_NEVER: u32 = 0x0200;
pub const GL_LESS: u32 = 0x0201;
pub const GL_EQUAL: u32 = 0x0202;
pub const GL_LEQUAL: u32 = 0x0203;
pub const GL_GREATER: u32 = 0x0204;
pub const GL_NOTEQUAL: u32 = 0x0205;
pub const GL_GEQUAL: u32 = 0x0206;
pub const GL_ALWAYS: u32 = 0x0207;

pub const GL_KEEP: u32 = 0x1E00;
pub const GL_REPLACE: u32 = 0x1E01;
pub const GL_INCR: u32 = 0x1E02;
pub const GL_DECR: u32 = 0x1E03;
pub const GL_INVERT: u32 = 0x150A;
pub const GL_INCR_WRAP: u32 = 0x8507;
pub const GL_DECR_WRAP: u32 = 0x8508;

pub const GL_POINTS: u32 = 0x0000;
pub const GL_LINES: u32 = 0x0001;
pub const GL_LINE_LOOP: u32 = 0x0002;
pub const GL_LINE_STRIP: u32 = 0x0003;
pub const GL_TRIANGLES: u32 = 0x0004;
pub const GL_TRIANGLE_STRIP: u32 = 0x0005;
pub const GL_TRIANGLE_FAN: u32 = 0x0006;
pub const GL_QUADS: u32 = 0x0007;
pub const GL_QUAD_STRIP: u32 = 0x0008;
pub const GL_POLYGON: u32 = 0x0009;

pub const GL_REPEAT: u32 = 0x2901;
pub const GL_CLAMP_TO_BORDER: u32 = 0x812D;
pub const GL_CLAMP_TO_EDGE: u32 = 0x812F;
pub const GL_MIRRORED_REPEAT: u32 = 0x8370;

pub const GL_POINT: u32 = 0x1B00;
pub const GL_LINE: u32 = 0x1B01;
pub const GL_FILL: u32 = 0x1B02;

pub const GL_FRONT: u32 = 0x0404;
pub const GL_BACK: u32 = 0x0405;
pub const GL_FRONT_AND_BACK: u32 = 0x0408;
pub const GL_CW: u32 = 0x0900;
pub const GL_CCW: u32 = 0x0901;

pub const GL_CULL_FACE: u32 = 0x0B44;
pub const GL_DEPTH_TEST: u32 = 0x0B71;
pub const GL_STENCIL_TEST: u32 = 0x0B90;
pub const GL_BLEND: u32 = 0x0BE2;
pub const GL_SCISSOR_TEST: u32 = 0x0C11;
pub const GL_POLYGON_OFFSET_FILL: u32 = 0x8037;
pub const GL_MULTISAMPLE: u32 = 0x809D;
pub const GL_SAMPLE_ALPHA_TO_COVERAGE: u32 = 0x809E;
pub const GL_DEPTH_CLAMP: u32 = 0x864F;

pub const GL_DEPTH_BUFFER_BIT: u32 = 0x0100;
pub const GL_STENCIL_BUFFER_BIT: u32 = 0x0400;
pub const GL_COLOR_BUFFER_BIT: u32 = 0x4000;

pub const GL_NEAREST: u32 = 0x2600;
pub const GL_FRAMEBUFFER: u32 = 0x8D40;
pub const GL_READ_FRAMEBUFFER: u32 = 0x8CA8;
pub const GL_DRAW_FRAMEBUFFER: u32 = 0x8CA9;
pub const GL_ARRAY_BUFFER: u32 = 0x8892;
pub const GL_ELEMENT_ARRAY_BUFFER: u32 = 0x8893;
pub const GL_UNIFORM_BUFFER: u32 = 0x8A11;
pub const GL_UNSIGNED_INT: u32 = 0x1405;

pub const GL_LUMINANCE8: u32 = 0x8040;
pub const GL_RGBA8: u32 = 0x8058;
pub const GL_DEPTH_COMPONENT16: u32 = 0x81A5;
pub const GL_R16F: u32 = 0x822D;
pub const GL_R32F: u32 = 0x822E;
pub const GL_RG16F: u32 = 0x822F;
pub const GL_RGBA32F: u32 = 0x8814;
pub const GL_RGBA16F: u32 = 0x881A;
pub const GL_DEPTH24_STENCIL8: u32 = 0x88F0;
pub const GL_SRGB8_ALPHA8: u32 = 0x8C43;
pub const GL_DEPTH_COMPONENT32F: u32 = 0x8CAC;
pub const GL_RGB565: u32 = 0x8D62;

pub const GL_INVALID_ENUM: &str = "GL_INVALID_ENUM";
pub const GL_INVALID_VALUE: &str = "GL_INVALID_VALUE";
pub const GL_INVALID_OPERATION: &str = "GL_INVALID_OPERATION";

pub const fn blend_operand(value: BlendOperand) -> u32 {
    match value {
        BlendOperand::Zero => GL_ZERO,
        BlendOperand::One => GL_ONE,
        BlendOperand::SrcColour => GL_SRC_COLOR,
        BlendOperand::InvSrcColour => GL_ONE_MINUS_SRC_COLOR,
        BlendOperand::DstColour => GL_DST_COLOR,
        BlendOperand::InvDstColour => GL_ONE_MINUS_DST_COLOR,
        BlendOperand::SrcAlpha => GL_SRC_ALPHA,
        BlendOperand::InvSrcAlpha => GL_ONE_MINUS_SRC_ALPHA,
        BlendOperand::DstAlpha => GL_DST_ALPHA,
        BlendOperand::InvDstAlpha => GL_ONE_MINUS_DST_ALPHA,
        BlendOperand::Constant => GL_CONSTANT_COLOR,
        BlendOperand::InvConstant => GL_ONE_MINUS_CONSTANT_COLOR,
        BlendOperand::SrcAlphaSaturate => GL_SRC_ALPHA_SATURATE,
        BlendOperand::Src1Colour => GL_SRC1_COLOR,
        BlendOperand::InvSrc1Colour => GL_ONE_MINUS_SRC1_COLOR,
        BlendOperand::Src1Alpha => GL_SRC1_ALPHA,
        BlendOperand::InvSrc1Alpha => GL_ONE_MINUS_SRC1_ALPHA,
    }
}

pub const fn blend_operation(value: BlendOperation) -> u32 {
    match value {
        BlendOperation::Add => GL_FUNC_ADD,
        BlendOperation::Subtract => GL_FUNC_SUBTRACT,
        BlendOperation::RevSubtract => GL_FUNC_REVERSE_SUBTRACT,
        BlendOperation::Min => GL_MIN,
        BlendOperation::Max => GL_MAX,
    }
}

pub const fn comparison(value: ComparisonFunc) -> u32 {
    match value {
        ComparisonFunc::Never => GL_NEVER,
        ComparisonFunc::Less => GL_LESS,
        ComparisonFunc::Equal => GL_EQUAL,
        ComparisonFunc::LEqual => GL_LEQUAL,
        ComparisonFunc::Greater => GL_GREATER,
        ComparisonFunc::NotEqual => GL_NOTEQUAL,
        ComparisonFunc::GEqual => GL_GEQUAL,
        ComparisonFunc::Always => GL_ALWAYS,
    }
}

pub const fn stencil_op(value: StencilOp) -> u32 {
    match value {
        StencilOp::Keep => GL_KEEP,
        StencilOp::Zero => GL_ZERO,
        StencilOp::Replace => GL_REPLACE,
        StencilOp::Increment => GL_INCR,
        StencilOp::IncrWrap => GL_INCR_WRAP,
        StencilOp::Decrement => GL_DECR,
        StencilOp::DecrWrap => GL_DECR_WRAP,
        StencilOp::Invert => GL_INVERT,
    }
}

pub const fn topology(value: Topology) -> u32 {
    match value {
        Topology::Points => GL_POINTS,
        Topology::Lines => GL_LINES,
        Topology::LineLoop => GL_LINE_LOOP,
        Topology::LineStrip => GL_LINE_STRIP,
        Topology::Triangles => GL_TRIANGLES,
        Topology::TriangleStrips => GL_TRIANGLE_STRIP,
        Topology::TriangleFan => GL_TRIANGLE_FAN,
        Topology::Quads => GL_QUADS,
        Topology::QuadStrips => GL_QUAD_STRIP,
        Topology::Polygon => GL_POLYGON,
    }
}

/// Topologies removed from core profiles.
pub const fn is_legacy_topology(value: Topology) -> bool {
    matches!(value, Topology::Quads | Topology::QuadStrips | Topology::Polygon)
}

pub const fn wrap_mode(value: WrapMode) -> u32 {
    match value {
        WrapMode::Repeat => GL_REPEAT,
        WrapMode::MirroredRepeat => GL_MIRRORED_REPEAT,
        WrapMode::ClampToBorder => GL_CLAMP_TO_BORDER,
        WrapMode::ClampToEdge => GL_CLAMP_TO_EDGE,
    }
}

pub const fn fill_mode(value: FillMode) -> u32 {
    match value {
        FillMode::Point => GL_POINT,
        FillMode::Line => GL_LINE,
        FillMode::Solid => GL_FILL,
    }
}

pub const fn cull_face(value: CullMode) -> Option<u32> {
    match value {
        CullMode::None => None,
        CullMode::Front => Some(GL_FRONT),
        CullMode::Back => Some(GL_BACK),
    }
}

pub const fn internal_format(value: PixelFormat) -> u32 {
    match value {
        PixelFormat::L8 => GL_LUMINANCE8,
        PixelFormat::R5G6B5 => GL_RGB565,
        PixelFormat::R8G8B8A8 => GL_RGBA8,
        PixelFormat::R8G8B8A8Srgb | PixelFormat::B8G8R8A8Srgb => GL_SRGB8_ALPHA8,
        PixelFormat::R16F => GL_R16F,
        PixelFormat::R32F => GL_R32F,
        PixelFormat::RG16F => GL_RG16F,
        PixelFormat::RGBA16F => GL_RGBA16F,
        PixelFormat::RGBA32F => GL_RGBA32F,
        PixelFormat::D16 => GL_DEPTH_COMPONENT16,
        PixelFormat::D24S8 => GL_DEPTH24_STENCIL8,
        PixelFormat::D32F => GL_DEPTH_COMPONENT32F,
    }
}

pub const fn clear_mask(components: BufferComponents) -> u32 {
    let mut mask = 0;
    if components.contains(BufferComponents::COLOUR) {
        mask |= GL_COLOR_BUFFER_BIT;
    }
    if components.contains(BufferComponents::DEPTH) {
        mask |= GL_DEPTH_BUFFER_BIT;
    }
    if components.contains(BufferComponents::STENCIL) {
        mask |= GL_STENCIL_BUFFER_BIT;
    }
    mask
}

/// The `glUniform*` entry point writing a variable of type `ty`. Booleans go
/// through the integer calls; there is no call for boolean or integer
/// matrices.
pub const fn uniform_call(ty: VariableType) -> Option<&'static str> {
    use ElementKind::*;

    Some(match (ty.kind, ty.shape) {
        (Bool | Int, Shape::Scalar) => "glUniform1iv",
        (Bool | Int, Shape::Vec2) => "glUniform2iv",
        (Bool | Int, Shape::Vec3) => "glUniform3iv",
        (Bool | Int, Shape::Vec4) => "glUniform4iv",
        (UInt, Shape::Scalar) => "glUniform1uiv",
        (UInt, Shape::Vec2) => "glUniform2uiv",
        (UInt, Shape::Vec3) => "glUniform3uiv",
        (UInt, Shape::Vec4) => "glUniform4uiv",
        (Float, Shape::Scalar) => "glUniform1fv",
        (Float, Shape::Vec2) => "glUniform2fv",
        (Float, Shape::Vec3) => "glUniform3fv",
        (Float, Shape::Vec4) => "glUniform4fv",
        (Double, Shape::Scalar) => "glUniform1dv",
        (Double, Shape::Vec2) => "glUniform2dv",
        (Double, Shape::Vec3) => "glUniform3dv",
        (Double, Shape::Vec4) => "glUniform4dv",
        (Float, Shape::Mat { columns, rows }) => match (columns, rows) {
            (2, 2) => "glUniformMatrix2fv",
            (2, 3) => "glUniformMatrix2x3fv",
            (2, 4) => "glUniformMatrix2x4fv",
            (3, 2) => "glUniformMatrix3x2fv",
            (3, 3) => "glUniformMatrix3fv",
            (3, 4) => "glUniformMatrix3x4fv",
            (4, 2) => "glUniformMatrix4x2fv",
            (4, 3) => "glUniformMatrix4x3fv",
            (4, 4) => "glUniformMatrix4fv",
            _ => return None,
        },
        (Double, Shape::Mat { columns, rows }) => match (columns, rows) {
            (2, 2) => "glUniformMatrix2dv",
            (2, 3) => "glUniformMatrix2x3dv",
            (2, 4) => "glUniformMatrix2x4dv",
            (3, 2) => "glUniformMatrix3x2dv",
            (3, 3) => "glUniformMatrix3dv",
            (3, 4) => "glUniformMatrix3x4dv",
            (4, 2) => "glUniformMatrix4x2dv",
            (4, 3) => "glUniformMatrix4x3dv",
            (4, 4) => "glUniformMatrix4dv",
            _ => return None,
        },
        (Bool | Int | UInt, Shape::Mat { .. }) => return None,
    })
}

#[cfg(test)]
mod tests {
    use castor3d_types::{BufferComponents, VariableType};

    use super::*;

    #[test]
    fn uniform_calls() {
        let call = |name| uniform_call(VariableType::from_name(name).unwrap());
        assert_eq!(call("vec3f"), Some("glUniform3fv"));
        assert_eq!(call("bool"), Some("glUniform1iv"));
        assert_eq!(call("mat2x3f"), Some("glUniformMatrix2x3fv"));
        assert_eq!(call("mat4x4d"), Some("glUniformMatrix4dv"));
        assert_eq!(call("mat3x3i"), None);
    }

    #[test]
    fn clear_masks() {
        assert_eq!(
            clear_mask(BufferComponents::COLOUR | BufferComponents::DEPTH),
            GL_COLOR_BUFFER_BIT | GL_DEPTH_BUFFER_BIT
        );
    }
}
