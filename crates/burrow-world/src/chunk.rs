use burrow_geom::{Aabb, ChunkCoord, IVec3, Vec3, lerp, radial_falloff};
use burrow_grid::{AIR_DENSITY, DensityField, GridBounds, SparseVoxelGrid};
use burrow_mesh_cpu::{ChunkMesh, SurfaceError, SurfaceExtractor};

use crate::WorldError;
use crate::seeding::Seeding;

/// Smallest density change a dig counts as real.
pub const DIG_EPSILON: f32 = 1e-5;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DigOutcome {
    /// Stored cells strictly inside the sphere.
    pub cells_visited: usize,
    pub cells_changed: usize,
}

impl DigOutcome {
    #[inline]
    pub fn changed(&self) -> bool {
        self.cells_changed > 0
    }
}

/// What adopting an extraction result did to the cached mesh.
#[derive(Clone, Debug, PartialEq)]
pub enum MeshChange {
    Replaced,
    Cleared,
    Kept(SurfaceError),
}

/// One cell of the world lattice: a density grid plus its current surface.
pub struct Chunk {
    coord: ChunkCoord,
    origin: Vec3,
    width: usize,
    height: usize,
    depth: usize,
    grid: SparseVoxelGrid,
    mesh: Option<ChunkMesh>,
    mesh_rev: u64,
}

impl Chunk {
    /// Seeds a fresh grid over the chunk's extraction window.
    pub fn new(
        coord: ChunkCoord,
        origin: Vec3,
        (width, height, depth): (usize, usize, usize),
        seeding: &Seeding,
    ) -> Result<Self, WorldError> {
        let bounds = GridBounds::for_chunk(width, height, depth);
        let mut grid = SparseVoxelGrid::with_capacity(bounds.volume());
        seeding.seed_grid(&mut grid, bounds, origin);
        Self::from_grid(coord, origin, (width, height, depth), grid)
    }

    /// Wraps an existing grid. Fails unless the whole extraction window,
    /// halo included, is stored.
    pub fn from_grid(
        coord: ChunkCoord,
        origin: Vec3,
        (width, height, depth): (usize, usize, usize),
        grid: SparseVoxelGrid,
    ) -> Result<Self, WorldError> {
        let bounds = GridBounds::for_chunk(width, height, depth);
        let missing = grid.missing_in(bounds);
        if missing > 0 {
            return Err(WorldError::HaloIncomplete { coord, missing });
        }
        Ok(Self {
            coord,
            origin,
            width,
            height,
            depth,
            grid,
            mesh: None,
            mesh_rev: 0,
        })
    }

    #[inline]
    pub fn coord(&self) -> ChunkCoord {
        self.coord
    }

    #[inline]
    pub fn origin(&self) -> Vec3 {
        self.origin
    }

    #[inline]
    pub fn dims(&self) -> (usize, usize, usize) {
        (self.width, self.height, self.depth)
    }

    #[inline]
    pub fn grid(&self) -> &SparseVoxelGrid {
        &self.grid
    }

    #[inline]
    pub fn extraction_bounds(&self) -> GridBounds {
        GridBounds::for_chunk(self.width, self.height, self.depth)
    }

    #[inline]
    pub fn world_to_local(&self, p: Vec3) -> Vec3 {
        p - self.origin
    }

    #[inline]
    pub fn local_to_world(&self, p: Vec3) -> Vec3 {
        p + self.origin
    }

    /// World-space box of every stored sample, halo included.
    pub fn grid_aabb(&self) -> Aabb {
        let b = self.extraction_bounds();
        Aabb::new(
            self.local_to_world(Vec3::from(b.min)),
            self.local_to_world(Vec3::from(b.max)),
        )
    }

    /// Carves a sphere out of this chunk's grid.
    ///
    /// Only cells already stored are touched; density never rises and never
    /// drops below air. Returns how many cells actually moved.
    pub fn dig(&mut self, world_pos: Vec3, radius: f32) -> DigOutcome {
        if radius <= 0.0 || !radius.is_finite() || !world_pos.is_finite() {
            return DigOutcome::default();
        }
        let local = self.world_to_local(world_pos);
        let r = Vec3::splat(radius);
        let reach = GridBounds::new((local - r).floor_to_ivec(), (local + r).ceil_to_ivec());
        let Some(window) = reach.intersect(&self.extraction_bounds()) else {
            return DigOutcome::default();
        };
        let mut visited = 0;
        let changed = self.grid.update_in(window, |c: IVec3, v: &mut f32| {
            let d = Vec3::from(c).distance(local);
            if d >= radius {
                return false;
            }
            visited += 1;
            let fade = radial_falloff(d, radius);
            let old = *v;
            let new = lerp(old, AIR_DENSITY, fade).max(AIR_DENSITY).min(old);
            if (old - new).abs() > DIG_EPSILON {
                *v = new;
                true
            } else {
                false
            }
        });
        DigOutcome {
            cells_visited: visited,
            cells_changed: changed,
        }
    }

    /// Dense copy of the extraction window for a worker.
    pub fn snapshot(&self) -> DensityField {
        self.grid.snapshot(self.extraction_bounds())
    }

    /// Extracts on the calling thread and adopts the result at revision 0.
    pub fn rebuild_now(&mut self, extractor: &SurfaceExtractor) -> MeshChange {
        let result = extractor.extract(&self.snapshot());
        self.adopt(result, 0)
    }

    /// Installs an extraction result. Empty surfaces clear the mesh; malformed
    /// buffers leave the previous mesh in place.
    pub fn adopt(&mut self, result: Result<ChunkMesh, SurfaceError>, rev: u64) -> MeshChange {
        self.mesh_rev = self.mesh_rev.max(rev);
        match result {
            Ok(mesh) => {
                self.mesh = Some(mesh);
                MeshChange::Replaced
            }
            Err(e) if e.is_degenerate() => {
                self.mesh = None;
                MeshChange::Cleared
            }
            Err(e) => MeshChange::Kept(e),
        }
    }

    #[inline]
    pub fn mesh(&self) -> Option<&ChunkMesh> {
        self.mesh.as_ref()
    }

    #[inline]
    pub fn mesh_rev(&self) -> u64 {
        self.mesh_rev
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burrow_grid::SOLID_DENSITY;

    fn box_chunk(w: usize) -> Chunk {
        Chunk::new(
            ChunkCoord::new(0, 0, 0),
            Vec3::ZERO,
            (w, w, w),
            &Seeding::FloatingBox,
        )
        .unwrap()
    }

    #[test]
    fn dig_centre_reaches_air() {
        let mut c = box_chunk(8);
        let out = c.dig(Vec3::splat(4.0), 2.0);
        assert!(out.changed());
        assert_eq!(c.grid().get(IVec3::splat(4)), AIR_DENSITY);
        assert!(c.grid().get(IVec3::new(5, 4, 4)) < SOLID_DENSITY);
        assert!(c.grid().get(IVec3::new(5, 4, 4)) > AIR_DENSITY);
    }

    #[test]
    fn cell_on_radius_is_untouched() {
        let mut c = box_chunk(8);
        c.dig(Vec3::splat(4.0), 2.0);
        assert_eq!(c.grid().get(IVec3::new(6, 4, 4)), SOLID_DENSITY);
        assert_eq!(c.grid().get(IVec3::new(4, 2, 4)), SOLID_DENSITY);
    }

    #[test]
    fn bad_inputs_are_no_ops() {
        let mut c = box_chunk(4);
        for (p, r) in [
            (Vec3::splat(2.0), 0.0),
            (Vec3::splat(2.0), -3.0),
            (Vec3::splat(2.0), f32::NAN),
            (Vec3::splat(2.0), f32::INFINITY),
            (Vec3::new(f32::NAN, 0.0, 0.0), 1.0),
        ] {
            assert_eq!(c.dig(p, r), DigOutcome::default());
        }
    }

    #[test]
    fn far_dig_touches_nothing() {
        let mut c = box_chunk(4);
        let out = c.dig(Vec3::splat(100.0), 3.0);
        assert_eq!(out, DigOutcome::default());
    }

    #[test]
    fn missing_halo_is_rejected() {
        let mut grid = SparseVoxelGrid::new();
        // interior only, no halo
        grid.initialize_box(GridBounds::new(IVec3::ZERO, IVec3::splat(4)), 1.0, -1.0);
        let err = Chunk::from_grid(ChunkCoord::new(0, 0, 0), Vec3::ZERO, (4, 4, 4), grid)
            .err()
            .unwrap();
        assert!(matches!(err, WorldError::HaloIncomplete { missing, .. } if missing == 7 * 7 * 7 - 5 * 5 * 5));
    }

    #[test]
    fn adopt_policy() {
        let mut c = box_chunk(4);
        let ex = SurfaceExtractor::default();
        assert_eq!(c.rebuild_now(&ex), MeshChange::Replaced);
        let before = c.mesh().cloned();
        let bad = SurfaceError::Misaligned {
            submesh: burrow_mesh_cpu::Submesh::Tunnel,
            len: 4,
        };
        assert_eq!(c.adopt(Err(bad.clone()), 3), MeshChange::Kept(bad));
        assert_eq!(c.mesh().cloned(), before);
        let empty = SurfaceError::Degenerate {
            terrain: 0,
            tunnel: 0,
        };
        assert_eq!(c.adopt(Err(empty), 4), MeshChange::Cleared);
        assert!(c.mesh().is_none());
        assert_eq!(c.mesh_rev(), 4);
    }
}
