//! Textual form of frame variable values, as found in scene files.
//!
//! Vector components are separated by any run of spaces, tabs or commas.
//! Matrices are written row by row, rows separated by `;`.

use std::fmt::Write as _;

use castor3d_types::{ElementKind, VariableType};

use super::{FrameVariable, VariableData};
use crate::util::typedefs::SsoString;

fn tokens(text: &str) -> impl Iterator<Item = &str> {
    text.split([' ', '\t', ',']).filter(|token| !token.is_empty())
}

fn parse_bool(token: &str) -> Option<bool> {
    match token {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

/// Returns the components of `text` in storage order, or `None` if the
/// component count is wrong or any token is malformed.
fn column_major_tokens(ty: VariableType, text: &str) -> Option<Vec<&str>> {
    let rows = ty.shape.rows();
    let columns = ty.shape.columns();

    if !ty.shape.is_matrix() {
        let tokens: Vec<&str> = tokens(text).collect();
        return (tokens.len() == rows).then_some(tokens);
    }

    let row_groups: Vec<&str> = text.split(';').collect();
    if row_groups.len() != rows {
        return None;
    }

    let mut ordered = vec![""; rows * columns];
    for (r, group) in row_groups.into_iter().enumerate() {
        let row: Vec<&str> = tokens(group).collect();
        if row.len() != columns {
            return None;
        }
        for (c, token) in row.into_iter().enumerate() {
            ordered[c * rows + r] = token;
        }
    }
    Some(ordered)
}

pub(super) fn parse_slot(ty: VariableType, text: &str) -> Option<VariableData> {
    let tokens = column_major_tokens(ty, text)?;
    let iter = tokens.iter();
    Some(match ty.kind {
        ElementKind::Bool => VariableData::Bool(iter.map(|t| parse_bool(t)).collect::<Option<_>>()?),
        ElementKind::Int => VariableData::Int(iter.map(|t| t.parse().ok()).collect::<Option<_>>()?),
        ElementKind::UInt => VariableData::UInt(iter.map(|t| t.parse().ok()).collect::<Option<_>>()?),
        ElementKind::Float => VariableData::Float(iter.map(|t| t.parse().ok()).collect::<Option<_>>()?),
        ElementKind::Double => VariableData::Double(iter.map(|t| t.parse().ok()).collect::<Option<_>>()?),
    })
}

/// Copies a parsed slot into `data` starting at component `offset`.
pub(super) fn commit(data: &mut VariableData, parsed: VariableData, offset: usize) {
    fn copy<T: Copy>(dst: &mut [T], src: &[T], offset: usize) {
        dst[offset..offset + src.len()].copy_from_slice(src);
    }

    match (data, parsed) {
        (VariableData::Bool(dst), VariableData::Bool(src)) => copy(dst, &src, offset),
        (VariableData::Int(dst), VariableData::Int(src)) => copy(dst, &src, offset),
        (VariableData::UInt(dst), VariableData::UInt(src)) => copy(dst, &src, offset),
        (VariableData::Float(dst), VariableData::Float(src)) => copy(dst, &src, offset),
        (VariableData::Double(dst), VariableData::Double(src)) => copy(dst, &src, offset),
        (dst, src) => log::error!("Parsed {:?} components can't be stored as {:?}", src.kind(), dst.kind()),
    }
}

fn write_component(out: &mut SsoString, data: &VariableData, index: usize) {
    // Writing into a SmartString can't fail.
    let _ = match data {
        VariableData::Bool(v) => write!(out, "{}", v[index]),
        VariableData::Int(v) => write!(out, "{}", v[index]),
        VariableData::UInt(v) => write!(out, "{}", v[index]),
        VariableData::Float(v) => write!(out, "{}", v[index]),
        VariableData::Double(v) => write!(out, "{}", v[index]),
    };
}

/// Formats one occurrence the way [`parse_slot`] reads it back.
pub(super) fn format_slot(variable: &FrameVariable, index: usize) -> SsoString {
    let rows = variable.ty.shape.rows();
    let columns = variable.ty.shape.columns();
    let first = index * variable.ty.components();

    let mut out = SsoString::new();
    for r in 0..rows {
        if r > 0 {
            out.push_str(if variable.ty.shape.is_matrix() { "; " } else { ", " });
        }
        for c in 0..columns {
            if c > 0 {
                out.push_str(", ");
            }
            write_component(&mut out, &variable.data, first + c * rows + r);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use castor3d_types::VariableType;
    use glam::{Mat2, Vec3};

    use crate::variable::FrameVariable;

    #[test]
    fn separators() {
        let mut variable = FrameVariable::new("v", VariableType::from_name("vec3f").unwrap(), 1);
        assert!(variable.set_str_value("1.5,\t2.5  3.5", 0));
        assert_eq!(variable.value::<Vec3>(0), Some(Vec3::new(1.5, 2.5, 3.5)));
        assert_eq!(variable.str_value(0), "1.5,\t2.5  3.5");
    }

    #[test]
    fn matrix_rows() {
        let mut variable = FrameVariable::new("m", VariableType::from_name("mat2x2f").unwrap(), 1);
        assert!(variable.set_str_value("1 2; 3 4", 0));
        // first column is the first component of every row
        assert_eq!(variable.value::<Mat2>(0), Some(Mat2::from_cols_array(&[1.0, 3.0, 2.0, 4.0])));

        assert!(!variable.set_str_value("1 2 3 4", 0));
        assert!(!variable.set_str_value("1 2; 3", 0));
        assert_eq!(variable.str_value(0), "1 2; 3 4");
    }

    #[test]
    fn booleans() {
        let mut variable = FrameVariable::new("b", VariableType::from_name("vec2b").unwrap(), 2);
        assert!(variable.set_str_value("true 0", 1));
        assert!(!variable.set_str_value("yes no", 1));
        assert_eq!(variable.value::<glam::BVec2>(1), Some(glam::BVec2::new(true, false)));
        assert_eq!(variable.str_value(0), "false, false");
    }

    #[test]
    fn formatted_matrix_parses_back() {
        let mut variable = FrameVariable::new("m", VariableType::from_name("mat2x2f").unwrap(), 1);
        variable.set_value(Mat2::from_cols_array(&[1.0, 3.0, 2.0, 4.0]), 0).unwrap();
        assert_eq!(variable.str_value(0), "1, 2; 3, 4");
    }
}
