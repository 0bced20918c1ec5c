use std::ops::Range;

use castor3d_types::{ElementKind, Shape, VariableType};
use glam::{
    BVec2, BVec3, BVec4, DMat2, DMat3, DMat4, DVec2, DVec3, DVec4, IVec2, IVec3, IVec4, Mat2, Mat3, Mat4, UVec2, UVec3,
    UVec4, Vec2, Vec3, Vec4,
};

use super::VariableData;

/// Primitive stored in one [`VariableData`] variant.
pub trait Element: Copy + 'static {
    const KIND: ElementKind;

    fn slice(data: &VariableData) -> Option<&[Self]>;
    fn slice_mut(data: &mut VariableData) -> Option<&mut [Self]>;
}

macro_rules! element {
    ($ty:ty, $kind:ident) => {
        impl Element for $ty {
            const KIND: ElementKind = ElementKind::$kind;

            fn slice(data: &VariableData) -> Option<&[Self]> {
                match data {
                    VariableData::$kind(values) => Some(values),
                    _ => None,
                }
            }

            fn slice_mut(data: &mut VariableData) -> Option<&mut [Self]> {
                match data {
                    VariableData::$kind(values) => Some(values),
                    _ => None,
                }
            }
        }
    };
}

element!(bool, Bool);
element!(i32, Int);
element!(u32, UInt);
element!(f32, Float);
element!(f64, Double);

/// A rust value which can be stored in one occurrence of a frame variable.
///
/// Components are exchanged column major, matching how matrices sit in
/// [`VariableData`].
pub trait VariableValue: Sized {
    type Element: Element;
    const TYPE: VariableType;

    fn write_components(&self, out: &mut [Self::Element]);
    fn read_components(components: &[Self::Element]) -> Self;

    fn store(&self, data: &mut VariableData, range: Range<usize>) {
        if let Some(values) = Self::Element::slice_mut(data) {
            self.write_components(&mut values[range]);
        }
    }

    fn load(data: &VariableData, range: Range<usize>) -> Option<Self> {
        Self::Element::slice(data).map(|values| Self::read_components(&values[range]))
    }
}

macro_rules! scalar {
    ($ty:ty) => {
        impl VariableValue for $ty {
            type Element = $ty;
            const TYPE: VariableType = VariableType::scalar(<$ty as Element>::KIND);

            fn write_components(&self, out: &mut [$ty]) {
                out[0] = *self;
            }

            fn read_components(components: &[$ty]) -> Self {
                components[0]
            }
        }
    };
}

scalar!(bool);
scalar!(i32);
scalar!(u32);
scalar!(f32);
scalar!(f64);

macro_rules! vector {
    ($ty:ty, $element:ty, $shape:ident) => {
        impl VariableValue for $ty {
            type Element = $element;
            const TYPE: VariableType = VariableType::new(<$element as Element>::KIND, Shape::$shape);

            fn write_components(&self, out: &mut [$element]) {
                out.copy_from_slice(&self.to_array());
            }

            fn read_components(components: &[$element]) -> Self {
                <$ty>::from_slice(components)
            }
        }
    };
}

vector!(IVec2, i32, Vec2);
vector!(IVec3, i32, Vec3);
vector!(IVec4, i32, Vec4);
vector!(UVec2, u32, Vec2);
vector!(UVec3, u32, Vec3);
vector!(UVec4, u32, Vec4);
vector!(Vec2, f32, Vec2);
vector!(Vec3, f32, Vec3);
vector!(Vec4, f32, Vec4);
vector!(DVec2, f64, Vec2);
vector!(DVec3, f64, Vec3);
vector!(DVec4, f64, Vec4);

macro_rules! bool_vector {
    ($ty:ident, $count:literal, $shape:ident) => {
        impl VariableValue for $ty {
            type Element = bool;
            const TYPE: VariableType = VariableType::new(ElementKind::Bool, Shape::$shape);

            fn write_components(&self, out: &mut [bool]) {
                out.copy_from_slice(&<[bool; $count]>::from(*self));
            }

            fn read_components(components: &[bool]) -> Self {
                let mut value = $ty::FALSE;
                for (index, &component) in components.iter().take($count).enumerate() {
                    value.set(index, component);
                }
                value
            }
        }
    };
}

bool_vector!(BVec2, 2, Vec2);
bool_vector!(BVec3, 3, Vec3);
bool_vector!(BVec4, 4, Vec4);

macro_rules! matrix {
    ($ty:ty, $element:ty, $size:literal) => {
        impl VariableValue for $ty {
            type Element = $element;
            const TYPE: VariableType = VariableType::new(
                <$element as Element>::KIND,
                Shape::Mat {
                    columns: $size,
                    rows: $size,
                },
            );

            fn write_components(&self, out: &mut [$element]) {
                out.copy_from_slice(&self.to_cols_array());
            }

            fn read_components(components: &[$element]) -> Self {
                <$ty>::from_cols_slice(components)
            }
        }
    };
}

matrix!(Mat2, f32, 2);
matrix!(Mat3, f32, 3);
matrix!(Mat4, f32, 4);
matrix!(DMat2, f64, 2);
matrix!(DMat3, f64, 3);
matrix!(DMat4, f64, 4);

macro_rules! column_arrays {
    ($element:ty) => {
        /// Column major `C`x`R` matrix, for the shapes glam has no type for.
        impl<const C: usize, const R: usize> VariableValue for [[$element; R]; C] {
            type Element = $element;
            const TYPE: VariableType = VariableType::new(
                <$element as Element>::KIND,
                Shape::Mat {
                    columns: C as u8,
                    rows: R as u8,
                },
            );

            fn write_components(&self, out: &mut [$element]) {
                for (column, chunk) in self.iter().zip(out.chunks_exact_mut(R)) {
                    chunk.copy_from_slice(column);
                }
            }

            fn read_components(components: &[$element]) -> Self {
                let mut value = [[<$element>::default(); R]; C];
                for (column, chunk) in value.iter_mut().zip(components.chunks_exact(R)) {
                    column.copy_from_slice(chunk);
                }
                value
            }
        }
    };
}

column_arrays!(f32);
column_arrays!(f64);

#[cfg(test)]
mod tests {
    use castor3d_types::{ElementKind, Shape, VariableType};
    use glam::{BVec3, Mat2, UVec2};

    use crate::variable::FrameVariable;

    #[test]
    fn glam_values() {
        let mut variable = FrameVariable::new("flags", VariableType::new(ElementKind::Bool, Shape::Vec3), 1);
        variable.set_value(BVec3::new(true, false, true), 0).unwrap();
        assert_eq!(variable.value::<BVec3>(0), Some(BVec3::new(true, false, true)));
        assert_eq!(variable.value::<UVec2>(0), None);
    }

    #[test]
    fn non_square_matrix() {
        let ty = VariableType::from_name("mat2x3f").unwrap();
        let mut variable = FrameVariable::new("m", ty, 1);
        let value = [[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]];
        variable.set_value(value, 0).unwrap();
        assert_eq!(variable.value::<[[f32; 3]; 2]>(0), Some(value));
        assert!(variable.set_value(Mat2::IDENTITY, 0).is_err());
    }
}
