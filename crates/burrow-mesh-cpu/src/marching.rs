use std::cell::Cell;
use std::time::Instant;

use burrow_geom::{Aabb, IVec3, Vec3};
use burrow_grid::DensityField;

use crate::classify::split_tunnel_triangles;
use crate::constants::{DEFAULT_ISO_LEVEL, DEFAULT_TUNNEL_THRESHOLD, EDGE_EPSILON};
use crate::mesh::{ChunkMesh, SurfaceBuild, SurfaceError};
use crate::tables::{CORNER_OFFSETS, EDGE_CORNERS, EDGE_TABLE, TRI_TABLE};

thread_local! {
    static LAST_VERTEX_RESERVE: Cell<usize> = const { Cell::new(256) };
}

fn elapsed_ms(start: Instant) -> u32 {
    start.elapsed().as_millis().min(u128::from(u32::MAX)) as u32
}

/// Marching-cubes surface extractor with terrain/tunnel classification.
///
/// Stateless apart from its two thresholds, so one instance can be shared
/// by every mesh worker.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SurfaceExtractor {
    iso_level: f32,
    tunnel_threshold: f32,
}

impl Default for SurfaceExtractor {
    fn default() -> Self {
        Self {
            iso_level: DEFAULT_ISO_LEVEL,
            tunnel_threshold: DEFAULT_TUNNEL_THRESHOLD,
        }
    }
}

impl SurfaceExtractor {
    pub fn new(iso_level: f32) -> Self {
        Self {
            iso_level,
            ..Self::default()
        }
    }

    pub fn with_tunnel_threshold(mut self, tunnel_threshold: f32) -> Self {
        self.tunnel_threshold = tunnel_threshold;
        self
    }

    #[inline]
    pub fn iso_level(&self) -> f32 {
        self.iso_level
    }

    #[inline]
    pub fn tunnel_threshold(&self) -> f32 {
        self.tunnel_threshold
    }

    /// Marches every cube of `field` and returns the unclassified surface.
    /// Vertex positions are lattice coordinates (the window's `bounds.min`
    /// is applied), so a chunk's halo cubes land just outside `[0, w]`.
    pub fn march(&self, field: &DensityField) -> SurfaceBuild {
        let mut out = SurfaceBuild::default();
        if field.sx < 2 || field.sy < 2 || field.sz < 2 {
            return out;
        }
        let reserve = LAST_VERTEX_RESERVE.with(Cell::get);
        out.positions.reserve(reserve);
        out.normals.reserve(reserve);
        out.indices.reserve(reserve + reserve / 2);

        let origin = field.bounds().min;
        let mut corner_vals = [0.0f32; 8];
        for y in 0..field.sy - 1 {
            for z in 0..field.sz - 1 {
                for x in 0..field.sx - 1 {
                    let mut cube_index = 0usize;
                    for (i, o) in CORNER_OFFSETS.iter().enumerate() {
                        let v = field.get_local(x + o[0] as usize, y + o[1] as usize, z + o[2] as usize);
                        corner_vals[i] = v;
                        if v < self.iso_level {
                            cube_index |= 1 << i;
                        }
                    }
                    let edges = EDGE_TABLE[cube_index];
                    if edges == 0 {
                        continue;
                    }
                    let cube = [x, y, z];
                    // One vertex per crossed edge, shared by this cube's triangles.
                    let mut edge_vertex = [u32::MAX; 12];
                    for (e, slot) in edge_vertex.iter_mut().enumerate() {
                        if edges & (1 << e) == 0 {
                            continue;
                        }
                        let (p, n) = self.edge_vertex(field, origin, cube, e, &corner_vals);
                        *slot = out.push_vertex(p, n);
                    }
                    for tri in TRI_TABLE[cube_index].chunks_exact(3) {
                        if tri[0] < 0 {
                            break;
                        }
                        out.indices.extend_from_slice(&[
                            edge_vertex[tri[0] as usize],
                            edge_vertex[tri[1] as usize],
                            edge_vertex[tri[2] as usize],
                        ]);
                    }
                }
            }
        }

        let used = out.positions.len();
        LAST_VERTEX_RESERVE.with(|c| c.set((used + used / 4).max(256)));
        out
    }

    /// Full extraction: march, classify, validate.
    pub fn extract(&self, field: &DensityField) -> Result<ChunkMesh, SurfaceError> {
        let start = Instant::now();
        let raw = self.march(field);
        let march_ms = elapsed_ms(start);
        let (terrain, tunnel) =
            split_tunnel_triangles(field, &raw.positions, &raw.indices, self.tunnel_threshold);
        let bbox = Aabb::from_points(&raw.positions);
        let mesh = ChunkMesh {
            positions: raw.positions,
            normals: raw.normals,
            terrain,
            tunnel,
            bbox,
        };
        log::debug!(
            target: "rebuild",
            "ms march={} total={} extract dims=({}, {}, {}) verts={} terrain_tris={} tunnel_tris={}",
            march_ms,
            elapsed_ms(start),
            field.sx,
            field.sy,
            field.sz,
            mesh.vertex_count(),
            mesh.terrain_triangles(),
            mesh.tunnel_triangles()
        );
        mesh.validate()?;
        Ok(mesh)
    }

    fn edge_vertex(
        &self,
        field: &DensityField,
        origin: IVec3,
        cube: [usize; 3],
        edge: usize,
        corner_vals: &[f32; 8],
    ) -> (Vec3, Vec3) {
        let [mut a, mut b] = EDGE_CORNERS[edge];
        // Interpolate from the lower corner so neighbouring cubes agree bit for bit.
        if CORNER_OFFSETS[a] > CORNER_OFFSETS[b] {
            core::mem::swap(&mut a, &mut b);
        }
        let (va, vb) = (corner_vals[a], corner_vals[b]);
        let t = if (vb - va).abs() > EDGE_EPSILON {
            ((self.iso_level - va) / (vb - va)).clamp(0.0, 1.0)
        } else {
            0.5
        };
        let la = corner_local(cube, a);
        let lb = corner_local(cube, b);
        let pa = Vec3::from(origin + IVec3::new(la[0] as i32, la[1] as i32, la[2] as i32));
        let pb = Vec3::from(origin + IVec3::new(lb[0] as i32, lb[1] as i32, lb[2] as i32));
        let p = pa.lerp(pb, t);
        let ga = gradient_at(field, la);
        let gb = gradient_at(field, lb);
        // Density rises into solid; the outward normal points the other way.
        let n = (ga.lerp(gb, t) * -1.0).normalized();
        (p, n)
    }
}

#[inline]
fn corner_local(cube: [usize; 3], corner: usize) -> [usize; 3] {
    let o = CORNER_OFFSETS[corner];
    [cube[0] + o[0] as usize, cube[1] + o[1] as usize, cube[2] + o[2] as usize]
}

/// Central-difference density gradient, one-sided on the window faces.
fn gradient_at(field: &DensityField, p: [usize; 3]) -> Vec3 {
    let dims = [field.sx, field.sy, field.sz];
    let mut g = [0.0f32; 3];
    for axis in 0..3 {
        let lo_i = p[axis].saturating_sub(1);
        let hi_i = (p[axis] + 1).min(dims[axis] - 1);
        let span = (hi_i - lo_i) as f32;
        if span == 0.0 {
            continue;
        }
        let mut lo = p;
        let mut hi = p;
        lo[axis] = lo_i;
        hi[axis] = hi_i;
        let d = field.get_local(hi[0], hi[1], hi[2]) - field.get_local(lo[0], lo[1], lo[2]);
        g[axis] = d / span;
    }
    Vec3::new(g[0], g[1], g[2])
}
