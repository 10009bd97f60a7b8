use burrow_geom::IVec3;
use burrow_grid::{AIR_DENSITY, DensityField, EMPTY_DENSITY, GridBounds, SOLID_DENSITY, SparseVoxelGrid};
use proptest::prelude::*;

fn dim() -> impl Strategy<Value = usize> {
    1usize..=8
}

fn small_i32() -> impl Strategy<Value = i32> {
    -64i32..=64
}

proptest! {
    // idx maps each in-window sample to a unique in-range slot
    #[test]
    fn idx_is_unique_and_in_range(w in dim(), h in dim(), d in dim()) {
        let b = GridBounds::for_chunk(w, h, d);
        let field = DensityField::filled(b, 0.0);
        let expect = b.volume();
        prop_assert_eq!(field.len(), expect);
        let mut seen = vec![false; expect];
        for y in 0..field.sy { for z in 0..field.sz { for x in 0..field.sx {
            let i = field.idx(x, y, z);
            prop_assert!(i < expect);
            prop_assert!(!seen[i]);
            seen[i] = true;
        }}}
        prop_assert!(seen.into_iter().all(|b| b));
    }

    // A snapshot reads back exactly what the sparse grid stores
    #[test]
    fn snapshot_matches_grid(w in dim(), h in dim(), d in dim(), ox in small_i32()) {
        let b = GridBounds::for_chunk(w, h, d);
        let mut grid = SparseVoxelGrid::new();
        grid.initialize_with(b, |c, _| ((c.x * 7 + c.y * 3 - c.z + ox) % 5) as f32 / 5.0);
        let field = grid.snapshot(b);
        for c in b.iter() {
            prop_assert_eq!(field.get(c), Some(grid.get(c)));
        }
        let outside = IVec3::new(b.max.x + 1, 0, 0);
        prop_assert_eq!(field.get(outside), None);
    }

    // Box seeding: shell is air, everything else solid, whole window covered
    #[test]
    fn box_seeding_shell(w in dim(), h in dim(), d in dim()) {
        let b = GridBounds::for_chunk(w, h, d);
        let mut grid = SparseVoxelGrid::new();
        grid.initialize_box(b, SOLID_DENSITY, AIR_DENSITY);
        prop_assert!(grid.covers(b));
        for c in b.iter() {
            let expect = if b.on_boundary(c) { AIR_DENSITY } else { SOLID_DENSITY };
            prop_assert_eq!(grid.get(c), expect);
        }
    }

    // Height classifier: solid strictly below the surface, air at or above
    #[test]
    fn height_classifier_layers(w in dim(), h in 2usize..=8, d in dim(), surface in 0i32..=8) {
        let b = GridBounds::for_chunk(w, h, d);
        let mut grid = SparseVoxelGrid::new();
        grid.initialize_with(b, |c, _| if c.y < surface { SOLID_DENSITY } else { AIR_DENSITY });
        for c in b.iter() {
            prop_assert_eq!(grid.get(c) > 0.0, c.y < surface);
        }
    }
}

#[test]
fn snapshot_of_uncovered_window_falls_back_to_empty() {
    let mut grid = SparseVoxelGrid::new();
    grid.set(IVec3::ZERO, 0.75);
    let b = GridBounds::new(IVec3::splat(-1), IVec3::splat(1));
    let field = grid.snapshot(b);
    assert_eq!(field.get(IVec3::ZERO), Some(0.75));
    assert_eq!(field.get(IVec3::new(1, 1, 1)), Some(EMPTY_DENSITY));
}

#[test]
fn intersect_clips_to_overlap() {
    let a = GridBounds::new(IVec3::splat(-1), IVec3::splat(5));
    let b = GridBounds::new(IVec3::new(3, -4, 0), IVec3::new(9, 2, 1));
    let i = a.intersect(&b).unwrap();
    assert_eq!(i.min, IVec3::new(3, -1, 0));
    assert_eq!(i.max, IVec3::new(5, 2, 1));
    let far = GridBounds::new(IVec3::splat(10), IVec3::splat(12));
    assert!(a.intersect(&far).is_none());
}
