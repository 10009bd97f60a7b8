use std::sync::Arc;
use std::time::{Duration, Instant};

use burrow_edit::{DueRebuild, RebuildScheduler, RequestOutcome};
use burrow_geom::{Aabb, ChunkCoord, Vec3};
use burrow_runtime::{JobOut, RebuildHandle, Runtime, RuntimeError};
use hashbrown::HashMap;
use rayon::prelude::*;
use thiserror::Error;

use crate::chunk::{Chunk, MeshChange};
use crate::config::{ConfigError, SeedMode, TerrainConfig};
use crate::consumer::MeshConsumer;

#[derive(Debug, Error)]
pub enum WorldError {
    #[error("chunk {coord} is outside the {lattice:?} lattice")]
    OutOfBounds {
        coord: ChunkCoord,
        lattice: (usize, usize, usize),
    },
    #[error("position {0:?} is not finite")]
    NonFinite(Vec3),
    #[error("chunk {coord} grid is missing {missing} cells of its extraction window")]
    HaloIncomplete { coord: ChunkCoord, missing: usize },
    #[error("flush timed out with {remaining} rebuilds in flight")]
    FlushTimedOut { remaining: usize },
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

/// Result of one world-level dig.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DigReport {
    /// Chunk containing the dig point, when it lies inside the lattice.
    pub primary: Option<ChunkCoord>,
    pub chunks_visited: usize,
    pub chunks_changed: Vec<ChunkCoord>,
    pub cells_changed: usize,
}

impl DigReport {
    #[inline]
    pub fn changed(&self) -> bool {
        self.cells_changed > 0
    }
}

/// Floor division that agrees exactly with `origin + k * size` box edges.
/// Saturates at the `i32` range, so far-away points still map to an
/// out-of-lattice index.
fn axis_index(p: f32, origin: f32, size: f32) -> i32 {
    let mut k = ((p - origin) / size).floor() as i32;
    if p < origin + k as f32 * size {
        k = k.saturating_sub(1);
    } else if p >= origin + k.saturating_add(1) as f32 * size {
        k = k.saturating_add(1);
    }
    k
}

/// Dense lattice of chunks plus the rebuild pipeline that keeps their
/// surfaces current.
///
/// All grid mutation happens through `&mut self`, so digs are serialized by
/// the owner. Extraction runs on the runtime's workers from snapshots; the
/// owner adopts results in [`World::drain_completed`].
pub struct World {
    chunk_w: usize,
    chunk_h: usize,
    chunk_d: usize,
    chunks_x: usize,
    chunks_y: usize,
    chunks_z: usize,
    lattice_origin: Vec3,
    surface_y: f32,
    chunks: Vec<Chunk>,
    scheduler: RebuildScheduler,
    runtime: Runtime,
    in_flight: HashMap<u64, ChunkCoord>,
}

impl World {
    /// Builds and seeds every chunk, then meshes all of them in parallel.
    pub fn new(config: &TerrainConfig) -> Result<Self, WorldError> {
        config.validate()?;
        let (w, h, d) = (config.chunk.width, config.chunk.height, config.chunk.depth);
        let (nx, ny, nz) = (
            config.lattice.chunks_x,
            config.lattice.chunks_y,
            config.lattice.chunks_z,
        );
        let lattice_origin = Vec3::new(0.0, -((ny * h) as f32), 0.0);
        let seeding = config.seeding_policy();
        let extractor = config.extractor();

        let t0 = Instant::now();
        let mut chunks = Vec::with_capacity(nx * ny * nz);
        for cy in 0..ny as i32 {
            for cz in 0..nz as i32 {
                for cx in 0..nx as i32 {
                    let coord = ChunkCoord::new(cx, cy, cz);
                    let origin = lattice_origin
                        + Vec3::new(
                            (cx as usize * w) as f32,
                            (cy as usize * h) as f32,
                            (cz as usize * d) as f32,
                        );
                    chunks.push(Chunk::new(coord, origin, (w, h, d), &seeding)?);
                }
            }
        }
        chunks.par_iter_mut().for_each(|c| {
            if let MeshChange::Kept(e) = c.rebuild_now(&extractor) {
                log::warn!(target: "rebuild", "initial mesh for {} rejected: {}", c.coord(), e);
            }
        });
        log::info!(
            target: "rebuild",
            "ms={} world built chunks={}x{}x{} dims={}x{}x{}",
            t0.elapsed().as_millis(),
            nx,
            ny,
            nz,
            w,
            h,
            d
        );

        let surface_y = match config.seeding.mode {
            SeedMode::Box => lattice_origin.y + (ny * h) as f32,
            SeedMode::Layered => config.seeding.surface_y,
        };
        let runtime = Runtime::new(Arc::new(extractor), config.rebuild.workers)?;
        Ok(Self {
            chunk_w: w,
            chunk_h: h,
            chunk_d: d,
            chunks_x: nx,
            chunks_y: ny,
            chunks_z: nz,
            lattice_origin,
            surface_y,
            chunks,
            scheduler: RebuildScheduler::new(config.debounce()),
            runtime,
            in_flight: HashMap::new(),
        })
    }

    #[inline]
    pub fn chunk_dims(&self) -> (usize, usize, usize) {
        (self.chunk_w, self.chunk_h, self.chunk_d)
    }

    #[inline]
    pub fn lattice_dims(&self) -> (usize, usize, usize) {
        (self.chunks_x, self.chunks_y, self.chunks_z)
    }

    #[inline]
    pub fn lattice_origin(&self) -> Vec3 {
        self.lattice_origin
    }

    /// Total extent in world units.
    pub fn world_size(&self) -> Vec3 {
        Vec3::new(
            (self.chunks_x * self.chunk_w) as f32,
            (self.chunks_y * self.chunk_h) as f32,
            (self.chunks_z * self.chunk_d) as f32,
        )
    }

    /// Top of the seeded ground in world space.
    #[inline]
    pub fn surface_y(&self) -> f32 {
        self.surface_y
    }

    /// A point just above the ground in the middle of the world.
    pub fn center_surface(&self) -> Vec3 {
        let size = self.world_size();
        Vec3::new(
            self.lattice_origin.x + size.x / 2.0,
            self.surface_y + 2.0,
            self.lattice_origin.z + size.z / 2.0,
        )
    }

    #[inline]
    pub fn in_bounds(&self, c: ChunkCoord) -> bool {
        c.cx >= 0
            && c.cy >= 0
            && c.cz >= 0
            && (c.cx as usize) < self.chunks_x
            && (c.cy as usize) < self.chunks_y
            && (c.cz as usize) < self.chunks_z
    }

    #[inline]
    fn index(&self, c: ChunkCoord) -> Option<usize> {
        if !self.in_bounds(c) {
            return None;
        }
        Some((c.cy as usize * self.chunks_z + c.cz as usize) * self.chunks_x + c.cx as usize)
    }

    pub fn chunk(&self, c: ChunkCoord) -> Option<&Chunk> {
        self.index(c).map(|i| &self.chunks[i])
    }

    pub fn chunks(&self) -> impl Iterator<Item = &Chunk> {
        self.chunks.iter()
    }

    /// World position of a chunk's local origin. Defined for any coordinate.
    pub fn chunk_origin(&self, c: ChunkCoord) -> Vec3 {
        self.lattice_origin
            + Vec3::new(
                c.cx as f32 * self.chunk_w as f32,
                c.cy as f32 * self.chunk_h as f32,
                c.cz as f32 * self.chunk_d as f32,
            )
    }

    /// Half-open world box `[origin, origin + dims)` owned by a chunk.
    pub fn chunk_bounds(&self, c: ChunkCoord) -> Aabb {
        let o = self.lattice_origin;
        let (w, h, d) = (self.chunk_w as f32, self.chunk_h as f32, self.chunk_d as f32);
        Aabb::new(
            Vec3::new(
                o.x + c.cx as f32 * w,
                o.y + c.cy as f32 * h,
                o.z + c.cz as f32 * d,
            ),
            Vec3::new(
                o.x + (c.cx + 1) as f32 * w,
                o.y + (c.cy + 1) as f32 * h,
                o.z + (c.cz + 1) as f32 * d,
            ),
        )
    }

    /// Chunk containing `p`. With a single vertical layer the height is
    /// ignored, so digs from above the ground still resolve.
    pub fn world_to_chunk_coord(&self, p: Vec3) -> Result<ChunkCoord, WorldError> {
        if !p.is_finite() {
            return Err(WorldError::NonFinite(p));
        }
        let o = self.lattice_origin;
        let cx = axis_index(p.x, o.x, self.chunk_w as f32);
        let cz = axis_index(p.z, o.z, self.chunk_d as f32);
        let cy = if self.chunks_y == 1 {
            0
        } else {
            axis_index(p.y, o.y, self.chunk_h as f32)
        };
        let coord = ChunkCoord::new(cx, cy, cz);
        if !self.in_bounds(coord) {
            return Err(WorldError::OutOfBounds {
                coord,
                lattice: self.lattice_dims(),
            });
        }
        Ok(coord)
    }

    /// Digs the chunk under `p` and every in-bounds neighbour whose grid the
    /// sphere reaches. Out-of-lattice points are reported and skipped.
    pub fn try_dig_at(&mut self, p: Vec3, radius: f32) -> Result<DigReport, WorldError> {
        let primary = match self.world_to_chunk_coord(p) {
            Ok(c) => c,
            Err(e) => {
                log::warn!(target: "dig", "dig at {:?} skipped: {}", p, e);
                return Err(e);
            }
        };
        let now = Instant::now();
        let mut report = DigReport {
            primary: Some(primary),
            ..DigReport::default()
        };
        for coord in primary.neighborhood() {
            let Some(i) = self.index(coord) else {
                continue;
            };
            if coord != primary && !self.chunks[i].grid_aabb().intersects_sphere(p, radius) {
                continue;
            }
            self.dig_chunk(i, p, radius, now, &mut report);
        }
        self.log_dig(p, radius, &report);
        Ok(report)
    }

    /// Digs every chunk in the lattice.
    pub fn dig(&mut self, p: Vec3, radius: f32) -> DigReport {
        let now = Instant::now();
        let mut report = DigReport {
            primary: self.world_to_chunk_coord(p).ok(),
            ..DigReport::default()
        };
        for i in 0..self.chunks.len() {
            self.dig_chunk(i, p, radius, now, &mut report);
        }
        self.log_dig(p, radius, &report);
        report
    }

    fn dig_chunk(&mut self, i: usize, p: Vec3, radius: f32, now: Instant, report: &mut DigReport) {
        let chunk = &mut self.chunks[i];
        let out = chunk.dig(p, radius);
        report.chunks_visited += 1;
        if !out.changed() {
            return;
        }
        let coord = chunk.coord();
        report.cells_changed += out.cells_changed;
        report.chunks_changed.push(coord);
        if self.scheduler.request_at(coord, now) == RequestOutcome::Coalesced {
            log::trace!(target: "dig", "coalesced into pending rebuild of {}", coord);
        }
    }

    fn log_dig(&self, p: Vec3, radius: f32, report: &DigReport) {
        if report.changed() {
            log::debug!(
                target: "dig",
                "dig at ({:.2}, {:.2}, {:.2}) r={} changed {} cells in {} chunks",
                p.x,
                p.y,
                p.z,
                radius,
                report.cells_changed,
                report.chunks_changed.len()
            );
        } else {
            log::debug!(
                target: "dig",
                "dig at ({:.2}, {:.2}, {:.2}) r={} changed nothing; no rebuild",
                p.x,
                p.y,
                p.z,
                radius
            );
        }
    }

    #[inline]
    pub fn next_rebuild_deadline(&self) -> Option<Instant> {
        self.scheduler.next_deadline()
    }

    #[inline]
    pub fn pending_rebuilds(&self) -> usize {
        self.scheduler.pending_count()
    }

    #[inline]
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    #[inline]
    pub fn scheduler(&self) -> &RebuildScheduler {
        &self.scheduler
    }

    #[inline]
    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    pub fn pump(&mut self) -> Vec<RebuildHandle> {
        self.pump_at(Instant::now())
    }

    /// Submits every chunk whose debounce window closed by `now`. Snapshots
    /// are taken here, so each job reflects all digs made before this call.
    pub fn pump_at(&mut self, now: Instant) -> Vec<RebuildHandle> {
        let due = self.scheduler.poll_due(now);
        self.submit_due(due)
    }

    fn submit_due(&mut self, due: Vec<DueRebuild>) -> Vec<RebuildHandle> {
        let mut handles = Vec::with_capacity(due.len());
        for DueRebuild { coord, rev } in due {
            let Some(i) = self.index(coord) else {
                continue;
            };
            let field = self.chunks[i].snapshot();
            match self.runtime.submit(coord, rev, field) {
                Ok(h) => {
                    self.in_flight.insert(h.job_id(), coord);
                    handles.push(h);
                }
                Err(e) => log::warn!(target: "rebuild", "rebuild of {} not submitted: {}", coord, e),
            }
        }
        handles
    }

    /// Adopts every finished extraction. Returns how many results were applied.
    pub fn drain_completed(&mut self, consumer: &mut dyn MeshConsumer) -> usize {
        let mut applied = 0;
        for out in self.runtime.drain_worker_results() {
            if self.adopt(out, consumer) {
                applied += 1;
            }
        }
        applied
    }

    fn adopt(&mut self, out: JobOut, consumer: &mut dyn MeshConsumer) -> bool {
        let JobOut {
            coord,
            rev,
            job_id,
            result,
            t_queue_ms,
            t_mesh_ms,
        } = out;
        self.in_flight.remove(&job_id);
        if !self.scheduler.is_fresh(coord, rev) {
            log::debug!(target: "rebuild", "dropping stale mesh for {} rev={}", coord, rev);
            return false;
        }
        // Rejected revisions are consumed too, so older results cannot land after them.
        self.scheduler.mark_built(coord, rev);
        let Some(i) = self.index(coord) else {
            return false;
        };
        let chunk = &mut self.chunks[i];
        match chunk.adopt(result, rev) {
            MeshChange::Replaced => {
                consumer.mesh_cleared(coord);
                if let Some(mesh) = chunk.mesh() {
                    consumer.mesh_adopted(coord, chunk.origin(), mesh);
                }
            }
            MeshChange::Cleared => consumer.mesh_cleared(coord),
            MeshChange::Kept(e) => {
                log::warn!(target: "rebuild", "keeping previous mesh for {}: {}", coord, e);
                return false;
            }
        }
        log::debug!(
            target: "rebuild",
            "ms queue={} mesh={} adopted {} rev={}",
            t_queue_ms,
            t_mesh_ms,
            coord,
            rev
        );
        true
    }

    /// One owner-loop step: submit due rebuilds and adopt finished ones.
    pub fn tick(&mut self, consumer: &mut dyn MeshConsumer) -> usize {
        let _ = self.pump();
        self.drain_completed(consumer)
    }

    /// Forces every pending rebuild, then blocks until all in-flight jobs are
    /// adopted or `timeout` passes.
    pub fn flush(
        &mut self,
        timeout: Duration,
        consumer: &mut dyn MeshConsumer,
    ) -> Result<usize, WorldError> {
        let deadline = Instant::now() + timeout;
        let due = self.scheduler.force_all();
        let _ = self.submit_due(due);
        let mut applied = self.drain_completed(consumer);
        while !self.in_flight.is_empty() {
            let left = deadline.saturating_duration_since(Instant::now());
            if left.is_zero() {
                return Err(WorldError::FlushTimedOut {
                    remaining: self.in_flight.len(),
                });
            }
            if let Some(out) = self.runtime.wait_result(left) {
                if self.adopt(out, consumer) {
                    applied += 1;
                }
            }
        }
        Ok(applied)
    }

    /// Hands every chunk's current surface to `consumer`.
    pub fn publish_all(&self, consumer: &mut dyn MeshConsumer) {
        for chunk in &self.chunks {
            consumer.mesh_cleared(chunk.coord());
            if let Some(mesh) = chunk.mesh() {
                consumer.mesh_adopted(chunk.coord(), chunk.origin(), mesh);
            }
        }
    }
}
