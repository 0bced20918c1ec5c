use std::fmt;

/// Primitive type of every component of a frame variable.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ElementKind {
    Bool,
    Int,
    UInt,
    Float,
    Double,
}

impl ElementKind {
    pub const ARRAY: [Self; 5] = [Self::Bool, Self::Int, Self::UInt, Self::Float, Self::Double];

    /// Size in bytes of one component once uploaded. Booleans are 32 bit on
    /// every api we talk to.
    pub const fn size(self) -> usize {
        match self {
            Self::Bool | Self::Int | Self::UInt | Self::Float => 4,
            Self::Double => 8,
        }
    }

    /// Suffix used in the textual type names (`vec3f`, `mat4x4d`, ...).
    pub const fn suffix(self) -> &'static str {
        match self {
            Self::Bool => "b",
            Self::Int => "i",
            Self::UInt => "ui",
            Self::Float => "f",
            Self::Double => "d",
        }
    }

    /// Name of the scalar type.
    pub const fn scalar_name(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Int => "int",
            Self::UInt => "uint",
            Self::Float => "float",
            Self::Double => "double",
        }
    }

    fn from_suffix(suffix: &str) -> Option<Self> {
        Self::ARRAY.into_iter().find(|kind| kind.suffix() == suffix)
    }
}

/// Arity of a frame variable.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Shape {
    Scalar,
    Vec2,
    Vec3,
    Vec4,
    /// Column major matrix, `columns` vectors of `rows` components.
    Mat { columns: u8, rows: u8 },
}

impl Shape {
    pub const fn vector(components: usize) -> Option<Self> {
        match components {
            1 => Some(Self::Scalar),
            2 => Some(Self::Vec2),
            3 => Some(Self::Vec3),
            4 => Some(Self::Vec4),
            _ => None,
        }
    }

    pub const fn matrix(columns: u8, rows: u8) -> Option<Self> {
        if columns >= 2 && columns <= 4 && rows >= 2 && rows <= 4 {
            Some(Self::Mat { columns, rows })
        } else {
            None
        }
    }

    /// Amount of columns, 1 for scalars and vectors.
    pub const fn columns(self) -> usize {
        match self {
            Self::Mat { columns, .. } => columns as usize,
            _ => 1,
        }
    }

    /// Amount of components per column.
    pub const fn rows(self) -> usize {
        match self {
            Self::Scalar => 1,
            Self::Vec2 => 2,
            Self::Vec3 => 3,
            Self::Vec4 => 4,
            Self::Mat { rows, .. } => rows as usize,
        }
    }

    pub const fn components(self) -> usize {
        self.columns() * self.rows()
    }

    pub const fn is_matrix(self) -> bool {
        matches!(self, Self::Mat { .. })
    }
}

/// Complete type of a frame variable: what each component is and how many
/// there are.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct VariableType {
    pub kind: ElementKind,
    pub shape: Shape,
}

/// Placement of a variable inside a std140 uniform block.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Std140Layout {
    /// Required alignment of the first byte.
    pub align: usize,
    /// Distance between two array elements, or the element size if there is
    /// only one occurrence.
    pub stride: usize,
    /// Stride between two matrix columns. Equals the vector size for non
    /// matrices.
    pub column_stride: usize,
    /// Total byte size.
    pub size: usize,
}

const fn round_up(value: usize, align: usize) -> usize {
    (value + align - 1) / align * align
}

impl VariableType {
    pub const fn new(kind: ElementKind, shape: Shape) -> Self {
        Self { kind, shape }
    }

    pub const fn scalar(kind: ElementKind) -> Self {
        Self::new(kind, Shape::Scalar)
    }

    pub const fn components(self) -> usize {
        self.shape.components()
    }

    /// Byte size when components are tightly packed, which is what
    /// `glUniform*` style calls consume.
    pub const fn packed_size(self) -> usize {
        self.components() * self.kind.size()
    }

    /// std140 placement rules:
    ///
    /// - scalars align to their size
    /// - vec2 aligns to twice the scalar, vec3 and vec4 to four times
    /// - matrices are arrays of column vectors
    /// - arrays and matrix columns have their stride rounded up to 16 bytes
    pub const fn std140(self, occurrences: usize) -> Std140Layout {
        let scalar = self.kind.size();
        let rows = self.shape.rows();
        let vector_align = match rows {
            1 => scalar,
            2 => scalar * 2,
            _ => scalar * 4,
        };
        let vector_size = scalar * rows;

        let (align, element_size, column_stride) = if self.shape.is_matrix() {
            let column_stride = round_up(vector_align, 16);
            (column_stride, column_stride * self.shape.columns(), column_stride)
        } else {
            (vector_align, vector_size, vector_size)
        };

        if occurrences > 1 {
            let stride = round_up(element_size, 16);
            let align = round_up(align, 16);
            Std140Layout {
                align,
                stride,
                column_stride,
                size: stride * occurrences,
            }
        } else {
            Std140Layout {
                align,
                stride: element_size,
                column_stride,
                size: element_size,
            }
        }
    }

    /// Parses the type names used by scene files: `float`, `vec3f`,
    /// `vec2ui`, `mat4x4f`, `mat2x3d`...
    pub fn from_name(name: &str) -> Option<Self> {
        if let Some(kind) = ElementKind::ARRAY.into_iter().find(|k| k.scalar_name() == name) {
            return Some(Self::scalar(kind));
        }

        if let Some(rest) = name.strip_prefix("vec") {
            let mut chars = rest.chars();
            let count = chars.next()?.to_digit(10)? as usize;
            let kind = ElementKind::from_suffix(chars.as_str())?;
            return match count {
                2..=4 => Some(Self::new(kind, Shape::vector(count)?)),
                _ => None,
            };
        }

        if let Some(rest) = name.strip_prefix("mat") {
            let bytes = rest.as_bytes();
            if bytes.len() < 4 || bytes[1] != b'x' {
                return None;
            }
            let columns = (bytes[0] as char).to_digit(10)? as u8;
            let rows = (bytes[2] as char).to_digit(10)? as u8;
            let kind = ElementKind::from_suffix(&rest[3..])?;
            return Some(Self::new(kind, Shape::matrix(columns, rows)?));
        }

        None
    }
}

impl fmt::Display for VariableType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.shape {
            Shape::Scalar => f.write_str(self.kind.scalar_name()),
            Shape::Mat { columns, rows } => write!(f, "mat{}x{}{}", columns, rows, self.kind.suffix()),
            shape => write!(f, "vec{}{}", shape.rows(), self.kind.suffix()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip() {
        for name in ["float", "uint", "vec3f", "vec2ui", "vec4b", "mat4x4f", "mat2x3d"] {
            let ty = VariableType::from_name(name).unwrap();
            assert_eq!(ty.to_string(), name);
        }
        assert_eq!(VariableType::from_name("vec5f"), None);
        assert_eq!(VariableType::from_name("mat1x4f"), None);
        assert_eq!(VariableType::from_name("texture"), None);
    }

    #[test]
    fn std140_rules() {
        let vec3 = VariableType::new(ElementKind::Float, Shape::Vec3);
        assert_eq!(vec3.std140(1), Std140Layout { align: 16, stride: 12, column_stride: 12, size: 12 });

        let floats = VariableType::scalar(ElementKind::Float);
        assert_eq!(floats.std140(4).stride, 16);
        assert_eq!(floats.std140(4).size, 64);

        let mat3 = VariableType::new(ElementKind::Float, Shape::Mat { columns: 3, rows: 3 });
        assert_eq!(mat3.std140(1).size, 48);
        assert_eq!(mat3.std140(1).column_stride, 16);

        let dmat4 = VariableType::new(ElementKind::Double, Shape::Mat { columns: 4, rows: 4 });
        assert_eq!(dmat4.std140(1).size, 128);
    }
}
