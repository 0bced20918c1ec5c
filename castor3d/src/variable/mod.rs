//! Frame variables: named, typed values bound to shader program inputs.
//!
//! A [`FrameVariable`] stores any of the [`VariableType`]s behind one
//! concrete type. The element kind is a closed enum so backends dispatch
//! with a `match` instead of asking the value what it is. Typed access goes
//! through [`VariableValue`], textual access through
//! [`FrameVariable::set_str_value`] which follows the scene file format.

use castor3d_types::{ElementKind, Shape, VariableType};
use smallvec::SmallVec;

use crate::{util::typedefs::SsoString, VariableError};

mod buffer;
mod text;
mod value;

pub use buffer::*;
pub use value::*;

/// Component storage of a frame variable, one vector per element kind.
///
/// Holds `occurrences * components` values, matrices column major.
#[derive(Debug, Clone, PartialEq)]
pub enum VariableData {
    Bool(Vec<bool>),
    Int(Vec<i32>),
    UInt(Vec<u32>),
    Float(Vec<f32>),
    Double(Vec<f64>),
}

impl VariableData {
    pub fn zeroed(kind: ElementKind, len: usize) -> Self {
        match kind {
            ElementKind::Bool => Self::Bool(vec![false; len]),
            ElementKind::Int => Self::Int(vec![0; len]),
            ElementKind::UInt => Self::UInt(vec![0; len]),
            ElementKind::Float => Self::Float(vec![0.0; len]),
            ElementKind::Double => Self::Double(vec![0.0; len]),
        }
    }

    pub fn kind(&self) -> ElementKind {
        match self {
            Self::Bool(_) => ElementKind::Bool,
            Self::Int(_) => ElementKind::Int,
            Self::UInt(_) => ElementKind::UInt,
            Self::Float(_) => ElementKind::Float,
            Self::Double(_) => ElementKind::Double,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Bool(v) => v.len(),
            Self::Int(v) => v.len(),
            Self::UInt(v) => v.len(),
            Self::Float(v) => v.len(),
            Self::Double(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Writes the components in `range` as little endian gpu words, booleans
    /// widened to 32 bits.
    fn write_bytes(&self, range: std::ops::Range<usize>, out: &mut Vec<u8>) {
        match self {
            Self::Bool(v) => v[range].iter().for_each(|&b| out.extend_from_slice(&(b as u32).to_le_bytes())),
            Self::Int(v) => v[range].iter().for_each(|i| out.extend_from_slice(&i.to_le_bytes())),
            Self::UInt(v) => v[range].iter().for_each(|u| out.extend_from_slice(&u.to_le_bytes())),
            Self::Float(v) => v[range].iter().for_each(|f| out.extend_from_slice(&f.to_le_bytes())),
            Self::Double(v) => v[range].iter().for_each(|d| out.extend_from_slice(&d.to_le_bytes())),
        }
    }
}

/// A named shader input with one or more occurrences (array length).
///
/// Every occurrence keeps a changed flag so backends only write what moved,
/// and the text it was last set from so scene files round trip.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameVariable {
    name: SsoString,
    ty: VariableType,
    occurrences: usize,
    data: VariableData,
    changed: SmallVec<[bool; 1]>,
    strings: SmallVec<[SsoString; 1]>,
}

impl FrameVariable {
    /// Creates a zeroed variable. An occurrence count of zero is bumped to one.
    pub fn new(name: impl Into<SsoString>, ty: VariableType, occurrences: usize) -> Self {
        let occurrences = occurrences.max(1);
        let data = VariableData::zeroed(ty.kind, occurrences * ty.components());
        let mut variable = Self {
            name: name.into(),
            ty,
            occurrences,
            data,
            changed: SmallVec::from_elem(true, occurrences),
            strings: SmallVec::new(),
        };
        variable.strings = (0..occurrences).map(|index| text::format_slot(&variable, index)).collect();
        variable
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Full type of the variable.
    pub fn ty(&self) -> VariableType {
        self.ty
    }

    /// Primitive type of each component.
    pub fn kind(&self) -> ElementKind {
        self.ty.kind
    }

    pub fn shape(&self) -> Shape {
        self.ty.shape
    }

    pub fn occurrences(&self) -> usize {
        self.occurrences
    }

    pub fn data(&self) -> &VariableData {
        &self.data
    }

    fn check_index(&self, index: usize) -> Result<(), VariableError> {
        if index < self.occurrences {
            Ok(())
        } else {
            Err(VariableError::IndexOutOfRange {
                name: self.name.clone(),
                index,
                occurrences: self.occurrences,
            })
        }
    }

    fn check_type<V: VariableValue>(&self) -> Result<(), VariableError> {
        if V::TYPE == self.ty {
            Ok(())
        } else {
            Err(VariableError::TypeMismatch {
                name: self.name.clone(),
                expected: self.ty,
                actual: V::TYPE,
            })
        }
    }

    /// Typed assignment of one occurrence. Updates the text cache and marks
    /// the occurrence changed.
    pub fn set_value<V: VariableValue>(&mut self, value: V, index: usize) -> Result<(), VariableError> {
        self.check_type::<V>()?;
        self.check_index(index)?;

        let components = self.ty.components();
        let range = index * components..(index + 1) * components;
        value.store(&mut self.data, range);

        self.strings[index] = text::format_slot(self, index);
        self.changed[index] = true;
        Ok(())
    }

    /// Typed read of one occurrence, `None` on type mismatch or bad index.
    pub fn value<V: VariableValue>(&self, index: usize) -> Option<V> {
        if V::TYPE != self.ty || index >= self.occurrences {
            return None;
        }
        let components = self.ty.components();
        V::load(&self.data, index * components..(index + 1) * components)
    }

    /// Parses `text` into the given occurrence.
    ///
    /// Input with the wrong component count or unparsable components is
    /// ignored and the occurrence keeps its previous value. Returns whether
    /// the text was applied.
    pub fn set_str_value(&mut self, text: &str, index: usize) -> bool {
        if index >= self.occurrences {
            return false;
        }
        match text::parse_slot(self.ty, text) {
            Some(parsed) => {
                let components = self.ty.components();
                text::commit(&mut self.data, parsed, index * components);
                self.strings[index] = SsoString::from(text.trim());
                self.changed[index] = true;
                true
            }
            None => {
                log::debug!("Ignoring malformed value {:?} for {} variable {:?}", text, self.ty, self.name);
                false
            }
        }
    }

    /// Last text set for the given occurrence, or the formatted typed value.
    pub fn str_value(&self, index: usize) -> &str {
        self.strings.get(index).map_or("", |s| s.as_str())
    }

    pub fn is_changed(&self, index: usize) -> bool {
        self.changed.get(index).copied().unwrap_or(false)
    }

    pub fn any_changed(&self) -> bool {
        self.changed.iter().any(|&c| c)
    }

    /// Returns whether any occurrence changed and clears every flag.
    pub fn take_changed(&mut self) -> bool {
        let changed = self.any_changed();
        self.changed.iter_mut().for_each(|c| *c = false);
        changed
    }

    /// Forces the next apply to write every occurrence.
    pub fn mark_changed(&mut self) {
        self.changed.iter_mut().for_each(|c| *c = true);
    }

    /// Every occurrence tightly packed, the layout `glUniform*` expects.
    pub fn packed_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.ty.packed_size() * self.occurrences);
        self.data.write_bytes(0..self.data.len(), &mut out);
        out
    }

    /// Writes every occurrence at the start of `out` following std140 rules.
    /// `out` must be at least `ty().std140(occurrences()).size` long.
    pub fn write_std140(&self, out: &mut [u8]) {
        let layout = self.ty.std140(self.occurrences);
        let rows = self.ty.shape.rows();
        let columns = self.ty.shape.columns();
        let mut column = Vec::with_capacity(rows * self.ty.kind.size());

        for occurrence in 0..self.occurrences {
            for c in 0..columns {
                let first = (occurrence * columns + c) * rows;
                column.clear();
                self.data.write_bytes(first..first + rows, &mut column);
                let offset = occurrence * layout.stride + c * layout.column_stride;
                out[offset..offset + column.len()].copy_from_slice(&column);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use castor3d_types::{ElementKind, Shape, VariableType};
    use glam::{Mat3, Vec3};

    use super::FrameVariable;
    use crate::VariableError;

    fn vec3f() -> VariableType {
        VariableType::new(ElementKind::Float, Shape::Vec3)
    }

    #[test]
    fn typed_set_updates_text() {
        let mut variable = FrameVariable::new("tint", vec3f(), 1);
        variable.take_changed();
        variable.set_value(Vec3::new(1.0, 0.5, 0.25), 0).unwrap();
        assert_eq!(variable.str_value(0), "1, 0.5, 0.25");
        assert!(variable.is_changed(0));
    }

    #[test]
    fn wrong_type_is_rejected() {
        let mut variable = FrameVariable::new("tint", vec3f(), 1);
        let error = variable.set_value(1.0_f32, 0).unwrap_err();
        assert!(matches!(error, VariableError::TypeMismatch { .. }));
        assert!(matches!(
            variable.set_value(Vec3::ONE, 2),
            Err(VariableError::IndexOutOfRange { index: 2, .. })
        ));
    }

    #[test]
    fn std140_pads_matrix_columns() {
        let mut variable = FrameVariable::new("normal", VariableType::new(ElementKind::Float, Shape::Mat { columns: 3, rows: 3 }), 1);
        variable.set_value(Mat3::IDENTITY, 0).unwrap();
        let mut out = vec![0xff; 48];
        variable.write_std140(&mut out);
        assert_eq!(&out[0..4], &1.0_f32.to_le_bytes());
        assert_eq!(&out[16..20], &0.0_f32.to_le_bytes());
        assert_eq!(&out[20..24], &1.0_f32.to_le_bytes());
        // padding is left untouched
        assert_eq!(out[12], 0xff);
    }

    #[test]
    fn clone_is_deep() {
        let mut variable = FrameVariable::new("values", VariableType::scalar(ElementKind::Int), 3);
        variable.set_value(7, 1).unwrap();
        let mut copy = variable.clone();
        copy.set_value(9, 1).unwrap();
        assert_eq!(variable.value::<i32>(1), Some(7));
        assert_eq!(copy.value::<i32>(1), Some(9));
    }
}
