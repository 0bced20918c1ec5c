use glam::{Vec2, Vec3};
use thiserror::Error;

/// The maximum amount of vertices any one submesh can have.
pub const MAX_VERTEX_COUNT: u32 = (1 << 24) - 1;
/// The maximum amount of indices any one submesh can have.
pub const MAX_INDEX_COUNT: u32 = u32::MAX;

/// Error returned from submesh validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MeshValidationError {
    #[error("Submesh's {attribute} buffer has {actual} vertices but the position buffer has {expected}")]
    MismatchedVertexCount {
        attribute: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("Submesh has {count} vertices when the vertex limit is {MAX_VERTEX_COUNT}")]
    ExceededMaxVertexCount { count: usize },
    #[error("Submesh has {count} indicies when maximum index count is {MAX_INDEX_COUNT}")]
    ExceededMaxIndexCount { count: usize },
    #[error("Submesh has {count} indices which is not a multiple of three. Submeshes are always composed of triangles")]
    IndexCountNotMultipleOfThree { count: usize },
    #[error(
        "Index at position {index} has the value {value} which is out of bounds for vertex buffers of {max} length"
    )]
    IndexOutOfBounds { index: usize, value: u32, max: u32 },
}

/// Easy to use builder for a [`Submesh`] that deals with common operations
/// for you.
#[derive(Debug, Default)]
pub struct SubmeshBuilder {
    positions: Vec<Vec3>,
    normals: Option<Vec<Vec3>>,
    uvs: Option<Vec<Vec2>>,
    indices: Option<Vec<u32>>,
}

impl SubmeshBuilder {
    pub fn new(positions: Vec<Vec3>) -> Self {
        Self {
            positions,
            ..Self::default()
        }
    }

    pub fn with_normals(mut self, normals: Vec<Vec3>) -> Self {
        self.normals = Some(normals);
        self
    }

    pub fn with_uvs(mut self, uvs: Vec<Vec2>) -> Self {
        self.uvs = Some(uvs);
        self
    }

    pub fn with_indices(mut self, indices: Vec<u32>) -> Self {
        self.indices = Some(indices);
        self
    }

    /// Build a submesh, adding whatever components weren't provided.
    ///
    /// If normals weren't provided, they will be calculated from the faces.
    /// Missing texture coordinates are zeroed.
    pub fn build(self) -> Result<Submesh, MeshValidationError> {
        let vertex_count = self.positions.len();
        let has_normals = self.normals.is_some();
        let mut submesh = Submesh {
            normals: self.normals.unwrap_or_else(|| vec![Vec3::ZERO; vertex_count]),
            uvs: self.uvs.unwrap_or_else(|| vec![Vec2::ZERO; vertex_count]),
            indices: self.indices.unwrap_or_else(|| (0..vertex_count as u32).collect()),
            positions: self.positions,
        };

        submesh.validate()?;

        if !has_normals {
            submesh.calculate_normals();
        }

        Ok(submesh)
    }
}

/// One indexed triangle list with its vertex attributes.
///
/// Submeshes are in Structure of Array format and all the vertex arrays must
/// be the same length. This can be checked with [`Submesh::validate`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Submesh {
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub uvs: Vec<Vec2>,
    pub indices: Vec<u32>,
}

impl Submesh {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn validate(&self) -> Result<(), MeshValidationError> {
        let position_length = self.positions.len();
        let indices_length = self.indices.len();

        if position_length > MAX_VERTEX_COUNT as usize {
            return Err(MeshValidationError::ExceededMaxVertexCount { count: position_length });
        }

        for (attribute, actual) in [("normal", self.normals.len()), ("uv", self.uvs.len())] {
            if actual != position_length {
                return Err(MeshValidationError::MismatchedVertexCount {
                    attribute,
                    expected: position_length,
                    actual,
                });
            }
        }

        if indices_length % 3 != 0 {
            return Err(MeshValidationError::IndexCountNotMultipleOfThree { count: indices_length });
        }

        if indices_length >= MAX_INDEX_COUNT as usize {
            return Err(MeshValidationError::ExceededMaxIndexCount { count: indices_length });
        }

        for (index, &value) in self.indices.iter().enumerate() {
            if value as usize >= position_length {
                return Err(MeshValidationError::IndexOutOfBounds {
                    index,
                    value,
                    max: position_length as u32,
                });
            }
        }

        Ok(())
    }

    /// Smooth per-vertex normals, accumulated from the face normals of every
    /// triangle touching the vertex. Must only be called on a validated
    /// submesh.
    pub fn calculate_normals(&mut self) {
        self.normals.clear();
        self.normals.resize(self.positions.len(), Vec3::ZERO);

        for triangle in self.indices.chunks_exact(3) {
            let [a, b, c] = [triangle[0] as usize, triangle[1] as usize, triangle[2] as usize];
            let edge0 = self.positions[b] - self.positions[a];
            let edge1 = self.positions[c] - self.positions[a];
            let normal = edge0.cross(edge1);
            self.normals[a] += normal;
            self.normals[b] += normal;
            self.normals[c] += normal;
        }

        for normal in &mut self.normals {
            *normal = normal.normalize_or_zero();
        }
    }
}

/// A named set of submeshes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mesh {
    pub name: String,
    pub submeshes: Vec<Submesh>,
}

impl Mesh {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            submeshes: Vec::new(),
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.submeshes.iter().map(Submesh::vertex_count).sum()
    }

    /// Center of the axis aligned bounds of every vertex.
    pub fn center(&self) -> Vec3 {
        let mut positions = self.submeshes.iter().flat_map(|s| s.positions.iter().copied());
        let Some(first) = positions.next() else {
            return Vec3::ZERO;
        };
        let (min, max) = positions.fold((first, first), |(min, max), p| (min.min(p), max.max(p)));
        (min + max) * 0.5
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normals_are_computed() {
        let submesh = SubmeshBuilder::new(vec![Vec3::ZERO, Vec3::X, Vec3::Y])
            .build()
            .unwrap();
        for normal in &submesh.normals {
            assert!((*normal - Vec3::Z).length() < 1e-6);
        }
    }

    #[test]
    fn out_of_bounds_index() {
        let error = SubmeshBuilder::new(vec![Vec3::ZERO, Vec3::X, Vec3::Y])
            .with_indices(vec![0, 1, 3])
            .build()
            .unwrap_err();
        assert_eq!(error, MeshValidationError::IndexOutOfBounds { index: 2, value: 3, max: 3 });
    }

    #[test]
    fn mismatched_uvs() {
        let error = SubmeshBuilder::new(vec![Vec3::ZERO, Vec3::X, Vec3::Y])
            .with_uvs(vec![Vec2::ZERO])
            .build()
            .unwrap_err();
        assert!(matches!(error, MeshValidationError::MismatchedVertexCount { attribute: "uv", .. }));
    }
}
