use std::collections::HashSet;

use burrow_geom::{Aabb, Vec3};
use thiserror::Error;

/// Which of the two index lists a triangle lives in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Submesh {
    Terrain,
    Tunnel,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SurfaceError {
    #[error("surface has no triangles (terrain {terrain} indices, tunnel {tunnel} indices)")]
    Degenerate { terrain: usize, tunnel: usize },
    #[error("{submesh:?} index list length {len} is not a multiple of 3")]
    Misaligned { submesh: Submesh, len: usize },
    #[error("{submesh:?} index {index} out of range for {vertices} vertices")]
    IndexOutOfRange {
        submesh: Submesh,
        index: u32,
        vertices: usize,
    },
    #[error("triangle {tri:?} appears in both terrain and tunnel lists")]
    Overlap { tri: [u32; 3] },
}

impl SurfaceError {
    /// Degenerate output means "no geometry"; everything else is a malformed buffer.
    #[inline]
    pub fn is_degenerate(&self) -> bool {
        matches!(self, SurfaceError::Degenerate { .. })
    }
}

/// Raw marching-cubes output before terrain/tunnel classification.
#[derive(Clone, Debug, Default)]
pub struct SurfaceBuild {
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub indices: Vec<u32>,
}

impl SurfaceBuild {
    #[inline]
    pub fn push_vertex(&mut self, p: Vec3, n: Vec3) -> u32 {
        let i = self.positions.len() as u32;
        self.positions.push(p);
        self.normals.push(n);
        i
    }

    #[inline]
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// Finished chunk surface: one shared vertex list and two disjoint
/// triangle lists. Positions are in chunk-local lattice space.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ChunkMesh {
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub terrain: Vec<u32>,
    pub tunnel: Vec<u32>,
    pub bbox: Option<Aabb>,
}

impl ChunkMesh {
    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    #[inline]
    pub fn terrain_triangles(&self) -> usize {
        self.terrain.len() / 3
    }

    #[inline]
    pub fn tunnel_triangles(&self) -> usize {
        self.tunnel.len() / 3
    }

    #[inline]
    pub fn triangle_count(&self) -> usize {
        self.terrain_triangles() + self.tunnel_triangles()
    }

    #[inline]
    pub fn indices(&self, submesh: Submesh) -> &[u32] {
        match submesh {
            Submesh::Terrain => &self.terrain,
            Submesh::Tunnel => &self.tunnel,
        }
    }

    pub fn triangles(&self, submesh: Submesh) -> impl Iterator<Item = [u32; 3]> + '_ {
        self.indices(submesh)
            .chunks_exact(3)
            .map(|t| [t[0], t[1], t[2]])
    }

    /// Checks every invariant a consumer relies on before adopting buffers.
    pub fn validate(&self) -> Result<(), SurfaceError> {
        for submesh in [Submesh::Terrain, Submesh::Tunnel] {
            let idx = self.indices(submesh);
            if idx.len() % 3 != 0 {
                return Err(SurfaceError::Misaligned {
                    submesh,
                    len: idx.len(),
                });
            }
            if let Some(&index) = idx.iter().find(|&&i| i as usize >= self.positions.len()) {
                return Err(SurfaceError::IndexOutOfRange {
                    submesh,
                    index,
                    vertices: self.positions.len(),
                });
            }
        }
        if self.terrain.len() < 3 && self.tunnel.len() < 3 {
            return Err(SurfaceError::Degenerate {
                terrain: self.terrain.len(),
                tunnel: self.tunnel.len(),
            });
        }
        let terrain: HashSet<[u32; 3]> = self.triangles(Submesh::Terrain).collect();
        if let Some(tri) = self.triangles(Submesh::Tunnel).find(|t| terrain.contains(t)) {
            return Err(SurfaceError::Overlap { tri });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tri_mesh(terrain: Vec<u32>, tunnel: Vec<u32>) -> ChunkMesh {
        ChunkMesh {
            positions: vec![Vec3::ZERO, Vec3::UP, Vec3::ONE, Vec3::splat(2.0)],
            normals: vec![Vec3::UP; 4],
            terrain,
            tunnel,
            bbox: None,
        }
    }

    #[test]
    fn valid_mesh_passes() {
        assert_eq!(tri_mesh(vec![0, 1, 2], vec![1, 2, 3]).validate(), Ok(()));
        assert_eq!(tri_mesh(vec![], vec![1, 2, 3]).validate(), Ok(()));
    }

    #[test]
    fn empty_lists_are_degenerate() {
        let err = tri_mesh(vec![], vec![]).validate().unwrap_err();
        assert!(err.is_degenerate());
    }

    #[test]
    fn misaligned_list_is_malformed() {
        let err = tri_mesh(vec![0, 1, 2, 3], vec![]).validate().unwrap_err();
        assert_eq!(
            err,
            SurfaceError::Misaligned {
                submesh: Submesh::Terrain,
                len: 4
            }
        );
        assert!(!err.is_degenerate());
    }

    #[test]
    fn out_of_range_index_is_malformed() {
        let err = tri_mesh(vec![0, 1, 9], vec![]).validate().unwrap_err();
        assert!(matches!(
            err,
            SurfaceError::IndexOutOfRange { index: 9, vertices: 4, .. }
        ));
    }

    #[test]
    fn shared_triangle_is_rejected() {
        let err = tri_mesh(vec![0, 1, 2], vec![0, 1, 2]).validate().unwrap_err();
        assert_eq!(err, SurfaceError::Overlap { tri: [0, 1, 2] });
    }
}
