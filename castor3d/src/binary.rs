//! Binary mesh files.
//!
//! All values are little endian.
//!
//! ```text
//! "CMSH" u32:version u32:name_len name
//! u32:submesh_count
//! per submesh: u32:vertex_count u32:index_count
//!              [f32; 3] positions, [f32; 3] normals, [f32; 2] uvs, u32 indices
//! ```

use std::path::Path;

use castor3d_types::{Mesh, Submesh};
use glam::{Vec2, Vec3};

use crate::MeshFileError;

pub const MESH_MAGIC: [u8; 4] = *b"CMSH";
pub const MESH_VERSION: u32 = 1;

/// Extension of binary mesh files.
pub const MESH_EXTENSION: &str = "cmsh";

fn put_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn put_floats(out: &mut Vec<u8>, floats: &[f32]) {
    out.reserve(floats.len() * 4);
    for value in floats {
        out.extend_from_slice(&value.to_le_bytes());
    }
}

/// Serializes every submesh of `mesh`.
pub fn write_mesh(mesh: &Mesh) -> Vec<u8> {
    profiling::scope!("write_mesh");

    let mut out = Vec::with_capacity(16 + mesh.vertex_count() * 32);
    out.extend_from_slice(&MESH_MAGIC);
    put_u32(&mut out, MESH_VERSION);
    put_u32(&mut out, mesh.name.len() as u32);
    out.extend_from_slice(mesh.name.as_bytes());
    put_u32(&mut out, mesh.submeshes.len() as u32);

    for submesh in &mesh.submeshes {
        put_u32(&mut out, submesh.vertex_count() as u32);
        put_u32(&mut out, submesh.indices.len() as u32);
        put_floats(&mut out, bytemuck::cast_slice(&submesh.positions));
        put_floats(&mut out, bytemuck::cast_slice(&submesh.normals));
        put_floats(&mut out, bytemuck::cast_slice(&submesh.uvs));
        for &index in &submesh.indices {
            put_u32(&mut out, index);
        }
    }
    out
}

struct Reader<'a> {
    data: &'a [u8],
}

impl<'a> Reader<'a> {
    fn take(&mut self, len: usize, what: &'static str) -> Result<&'a [u8], MeshFileError> {
        if self.data.len() < len {
            return Err(MeshFileError::Truncated { what });
        }
        let (head, tail) = self.data.split_at(len);
        self.data = tail;
        Ok(head)
    }

    fn u32(&mut self, what: &'static str) -> Result<u32, MeshFileError> {
        let bytes = self.take(4, what)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn floats(&mut self, count: usize, what: &'static str) -> Result<Vec<f32>, MeshFileError> {
        let len = count.checked_mul(4).ok_or(MeshFileError::Truncated { what })?;
        Ok(self
            .take(len, what)?
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect())
    }
}

/// Reads a mesh written by [`write_mesh`]. Every submesh is validated.
pub fn read_mesh(data: &[u8]) -> Result<Mesh, MeshFileError> {
    profiling::scope!("read_mesh");

    let mut reader = Reader { data };
    let magic = reader.take(4, "the header")?;
    if magic != MESH_MAGIC {
        return Err(MeshFileError::BadMagic {
            found: [magic[0], magic[1], magic[2], magic[3]],
        });
    }
    let version = reader.u32("the header")?;
    if version != MESH_VERSION {
        return Err(MeshFileError::UnsupportedVersion {
            found: version,
            expected: MESH_VERSION,
        });
    }
    let name_len = reader.u32("the name")? as usize;
    let name = std::str::from_utf8(reader.take(name_len, "the name")?).map_err(|_| MeshFileError::BadName)?;

    let mut mesh = Mesh::new(name);
    let submesh_count = reader.u32("the submesh count")?;
    for _ in 0..submesh_count {
        let vertex_count = reader.u32("a submesh header")? as usize;
        let index_count = reader.u32("a submesh header")? as usize;

        let positions = reader.floats(vertex_count * 3, "positions")?;
        let normals = reader.floats(vertex_count * 3, "normals")?;
        let uvs = reader.floats(vertex_count * 2, "uvs")?;
        let indices = (0..index_count)
            .map(|_| reader.u32("indices"))
            .collect::<Result<Vec<_>, _>>()?;

        let submesh = Submesh {
            positions: positions.chunks_exact(3).map(Vec3::from_slice).collect(),
            normals: normals.chunks_exact(3).map(Vec3::from_slice).collect(),
            uvs: uvs.chunks_exact(2).map(Vec2::from_slice).collect(),
            indices,
        };
        submesh.validate()?;
        mesh.submeshes.push(submesh);
    }
    Ok(mesh)
}

pub fn save_mesh(mesh: &Mesh, path: impl AsRef<Path>) -> Result<(), MeshFileError> {
    let path = path.as_ref();
    std::fs::write(path, write_mesh(mesh)).map_err(|source| MeshFileError::Io {
        path: path.to_owned(),
        source,
    })?;
    log::info!("Wrote mesh {:?} to {}", mesh.name, path.display());
    Ok(())
}

pub fn load_mesh(path: impl AsRef<Path>) -> Result<Mesh, MeshFileError> {
    let path = path.as_ref();
    let data = std::fs::read(path).map_err(|source| MeshFileError::Io {
        path: path.to_owned(),
        source,
    })?;
    read_mesh(&data)
}

#[cfg(test)]
mod tests {
    use castor3d_types::{Mesh, SubmeshBuilder};
    use glam::Vec3;

    use super::{read_mesh, write_mesh, MESH_VERSION};
    use crate::MeshFileError;

    fn triangle() -> Mesh {
        let mut mesh = Mesh::new("tri");
        mesh.submeshes.push(
            SubmeshBuilder::new(vec![Vec3::ZERO, Vec3::X, Vec3::Y])
                .build()
                .unwrap(),
        );
        mesh
    }

    #[test]
    fn header_layout() {
        let bytes = write_mesh(&triangle());
        assert_eq!(&bytes[0..4], b"CMSH");
        assert_eq!(bytes[4..8], MESH_VERSION.to_le_bytes());
        assert_eq!(bytes[8..12], 3u32.to_le_bytes());
        assert_eq!(&bytes[12..15], b"tri");
        // submesh count, then 3 vertices of 8 floats and 3 indices
        assert_eq!(bytes.len(), 15 + 4 + 8 + 3 * 8 * 4 + 3 * 4);
    }

    #[test]
    fn mesh_survives_a_write() {
        let mesh = triangle();
        let read = read_mesh(&write_mesh(&mesh)).unwrap();
        assert_eq!(read, mesh);
    }

    #[test]
    fn damaged_files_are_refused() {
        let mut bytes = write_mesh(&triangle());
        bytes.truncate(bytes.len() - 2);
        assert!(matches!(read_mesh(&bytes), Err(MeshFileError::Truncated { what: "indices" })));

        bytes[0] = b'X';
        assert!(matches!(read_mesh(&bytes), Err(MeshFileError::BadMagic { .. })));

        let mut bytes = write_mesh(&triangle());
        bytes[4] = 9;
        assert!(matches!(
            read_mesh(&bytes),
            Err(MeshFileError::UnsupportedVersion { found: 9, .. })
        ));
    }
}
