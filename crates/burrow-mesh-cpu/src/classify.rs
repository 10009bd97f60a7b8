//! Terrain/tunnel split of marched triangles.
//!
//! A triangle is tunnel surface when any cell in the 3×3×3 block around the
//! cell holding its centroid has been carved down to the tunnel threshold.
//! Cells outside the snapshot window never count as carved.

use burrow_geom::{IVec3, Vec3};
use burrow_grid::DensityField;

/// True when the neighbourhood of `centroid` holds a cell at or below `threshold`.
pub fn is_tunnel_at(field: &DensityField, centroid: Vec3, threshold: f32) -> bool {
    let cell = centroid.floor_to_ivec();
    for dy in -1..=1 {
        for dz in -1..=1 {
            for dx in -1..=1 {
                if let Some(v) = field.get(cell + IVec3::new(dx, dy, dz)) {
                    if v <= threshold {
                        return true;
                    }
                }
            }
        }
    }
    false
}

/// Splits `indices` into `(terrain, tunnel)` lists. Every triangle lands in
/// exactly one list; a trailing partial triangle is dropped.
pub fn split_tunnel_triangles(
    field: &DensityField,
    positions: &[Vec3],
    indices: &[u32],
    threshold: f32,
) -> (Vec<u32>, Vec<u32>) {
    let mut terrain = Vec::with_capacity(indices.len());
    let mut tunnel = Vec::new();
    for tri in indices.chunks_exact(3) {
        let centroid = (positions[tri[0] as usize]
            + positions[tri[1] as usize]
            + positions[tri[2] as usize])
            / 3.0;
        if is_tunnel_at(field, centroid, threshold) {
            tunnel.extend_from_slice(tri);
        } else {
            terrain.extend_from_slice(tri);
        }
    }
    (terrain, tunnel)
}
