//! Sparse per-chunk density storage and dense snapshots for meshing.
#![forbid(unsafe_code)]

mod bounds;
mod field;

use burrow_geom::IVec3;
use hashbrown::HashMap;

pub use bounds::GridBounds;
pub use field::DensityField;

/// Density of untouched solid material.
pub const SOLID_DENSITY: f32 = 1.0;
/// Density of open air; also the floor every dig clamps to.
pub const AIR_DENSITY: f32 = -1.0;
/// Value reported for cells that were never stored. Reads as fully carved.
pub const EMPTY_DENSITY: f32 = AIR_DENSITY;

/// Sparse map from lattice coordinate to density.
///
/// Density `<= 0` is air, `> 0` is solid. Values only change through
/// [`SparseVoxelGrid::set`] and the initialization entry points.
#[derive(Clone, Debug, Default)]
pub struct SparseVoxelGrid {
    cells: HashMap<IVec3, f32>,
}

impl SparseVoxelGrid {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            cells: HashMap::with_capacity(capacity),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    #[inline]
    pub fn set(&mut self, coord: IVec3, density: f32) {
        self.cells.insert(coord, density);
    }

    /// Stored density, or [`EMPTY_DENSITY`] when the cell is absent.
    #[inline]
    pub fn get(&self, coord: IVec3) -> f32 {
        self.cells.get(&coord).copied().unwrap_or(EMPTY_DENSITY)
    }

    #[inline]
    pub fn try_get(&self, coord: IVec3) -> Option<f32> {
        self.cells.get(&coord).copied()
    }

    #[inline]
    pub fn contains(&self, coord: IVec3) -> bool {
        self.cells.contains_key(&coord)
    }

    #[inline]
    pub(crate) fn get_mut(&mut self, coord: IVec3) -> Option<&mut f32> {
        self.cells.get_mut(&coord)
    }

    pub fn clear(&mut self) {
        self.cells.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (IVec3, f32)> + '_ {
        self.cells.iter().map(|(k, v)| (*k, *v))
    }

    /// Fills every cell of `bounds` with `classify(coord, on_boundary)`.
    /// `on_boundary` is true for cells on the outer face of the range.
    /// Cells outside `bounds` are left as they are.
    pub fn initialize_with<F>(&mut self, bounds: GridBounds, mut classify: F)
    where
        F: FnMut(IVec3, bool) -> f32,
    {
        self.cells.reserve(bounds.volume());
        for c in bounds.iter() {
            let v = classify(c, bounds.on_boundary(c));
            self.cells.insert(c, v);
        }
    }

    /// Uniform box: `boundary` on the outer shell of `bounds`, `interior` inside.
    pub fn initialize_box(&mut self, bounds: GridBounds, interior: f32, boundary: f32) {
        self.initialize_with(bounds, |_, edge| if edge { boundary } else { interior });
    }

    /// True when every cell of `bounds` has a stored value.
    pub fn covers(&self, bounds: GridBounds) -> bool {
        self.missing_in(bounds) == 0
    }

    pub fn missing_in(&self, bounds: GridBounds) -> usize {
        bounds.iter().filter(|c| !self.cells.contains_key(c)).count()
    }

    /// Applies `f` to every stored cell in `bounds`; returns how many cells
    /// `f` reported as changed. Absent cells are skipped.
    pub fn update_in<F>(&mut self, bounds: GridBounds, mut f: F) -> usize
    where
        F: FnMut(IVec3, &mut f32) -> bool,
    {
        let mut changed = 0;
        for c in bounds.iter() {
            if let Some(v) = self.get_mut(c) {
                if f(c, v) {
                    changed += 1;
                }
            }
        }
        changed
    }

    /// Copies `bounds` into a dense array. Absent cells read as [`EMPTY_DENSITY`].
    pub fn snapshot(&self, bounds: GridBounds) -> DensityField {
        DensityField::from_fn(bounds, |c| self.get(c))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_cells_read_as_carved() {
        let grid = SparseVoxelGrid::new();
        assert_eq!(grid.get(IVec3::new(3, 4, 5)), EMPTY_DENSITY);
        assert!(grid.try_get(IVec3::ZERO).is_none());
    }

    #[test]
    fn set_overwrites() {
        let mut grid = SparseVoxelGrid::new();
        let c = IVec3::new(1, 2, 3);
        grid.set(c, 0.5);
        grid.set(c, -0.25);
        assert_eq!(grid.get(c), -0.25);
        assert_eq!(grid.len(), 1);
    }

    #[test]
    fn box_has_air_shell_and_solid_core() {
        let mut grid = SparseVoxelGrid::new();
        let b = GridBounds::for_chunk(4, 4, 4);
        grid.initialize_box(b, SOLID_DENSITY, AIR_DENSITY);
        assert_eq!(grid.len(), 7 * 7 * 7);
        assert!(grid.covers(b));
        assert_eq!(grid.get(IVec3::new(-1, 2, 2)), AIR_DENSITY);
        assert_eq!(grid.get(IVec3::new(5, 2, 2)), AIR_DENSITY);
        assert_eq!(grid.get(IVec3::new(2, 5, 2)), AIR_DENSITY);
        assert_eq!(grid.get(IVec3::new(0, 0, 0)), SOLID_DENSITY);
        assert_eq!(grid.get(IVec3::new(4, 4, 4)), SOLID_DENSITY);
    }

    #[test]
    fn update_skips_absent_cells() {
        let mut grid = SparseVoxelGrid::new();
        grid.set(IVec3::ZERO, 1.0);
        let b = GridBounds::new(IVec3::splat(-1), IVec3::splat(1));
        let mut visited = 0;
        let changed = grid.update_in(b, |_, v| {
            visited += 1;
            *v = -1.0;
            true
        });
        assert_eq!(visited, 1);
        assert_eq!(changed, 1);
        assert_eq!(grid.len(), 1);
        assert_eq!(grid.get(IVec3::ZERO), -1.0);
    }

    #[test]
    fn missing_cells_are_counted() {
        let mut grid = SparseVoxelGrid::new();
        let b = GridBounds::for_chunk(2, 2, 2);
        grid.initialize_box(b, 1.0, -1.0);
        assert!(grid.covers(b));
        let wider = GridBounds::new(IVec3::splat(-2), IVec3::splat(3));
        assert_eq!(grid.missing_in(wider), wider.volume() - b.volume());
    }
}
