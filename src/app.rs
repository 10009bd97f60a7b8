use std::collections::BTreeMap;
use std::thread;
use std::time::{Duration, Instant};

use burrow_geom::Vec3;
use burrow_world::{ChunkCoord, ChunkMesh, MeshConsumer, TerrainConfig, World, WorldError};

use crate::pheromone::PheromoneField;

/// Scent left at every dig that changed terrain.
const DEPOSIT_PER_DIG: f32 = 1.0;
const FLUSH_TIMEOUT: Duration = Duration::from_secs(30);

/// A straight drag-to-dig gesture.
#[derive(Clone, Copy, Debug)]
pub struct Stroke {
    pub from: Vec3,
    pub to: Vec3,
    pub steps: usize,
    pub radius: f32,
    pub interval: Duration,
}

impl Stroke {
    /// Evenly spaced dig points, both ends included.
    pub fn points(&self) -> impl Iterator<Item = Vec3> + '_ {
        let n = self.steps.max(1);
        (0..n).map(move |i| {
            let t = if n == 1 { 0.0 } else { i as f32 / (n - 1) as f32 };
            self.from.lerp(self.to, t)
        })
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ChunkStats {
    pub terrain_triangles: usize,
    pub tunnel_triangles: usize,
    pub uploads: usize,
}

/// Keeps the latest triangle counts per chunk in place of a renderer.
#[derive(Default)]
pub struct StatsSink {
    pub chunks: BTreeMap<ChunkCoord, ChunkStats>,
    pub clears: usize,
}

impl StatsSink {
    pub fn totals(&self) -> (usize, usize) {
        self.chunks.values().fold((0, 0), |(t, u), s| {
            (t + s.terrain_triangles, u + s.tunnel_triangles)
        })
    }
}

impl MeshConsumer for StatsSink {
    fn mesh_cleared(&mut self, coord: ChunkCoord) {
        self.clears += 1;
        let e = self.chunks.entry(coord).or_default();
        e.terrain_triangles = 0;
        e.tunnel_triangles = 0;
    }

    fn mesh_adopted(&mut self, coord: ChunkCoord, _origin: Vec3, mesh: &ChunkMesh) {
        let e = self.chunks.entry(coord).or_default();
        e.terrain_triangles = mesh.terrain_triangles();
        e.tunnel_triangles = mesh.tunnel_triangles();
        e.uploads += 1;
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StrokeSummary {
    pub digs: usize,
    pub changed_digs: usize,
    pub out_of_bounds: usize,
    pub cells_changed: usize,
    pub meshes_adopted: usize,
}

/// Owns the world and its collaborators for one run.
pub struct App {
    pub world: World,
    pub pheromone: PheromoneField,
    pub sink: StatsSink,
}

impl App {
    pub fn new(config: &TerrainConfig) -> Result<Self, WorldError> {
        let world = World::new(config)?;
        let size = world.world_size();
        let pheromone = PheromoneField::new(
            world.lattice_origin(),
            (size.x as usize, size.y as usize, size.z as usize),
        );
        let mut sink = StatsSink::default();
        world.publish_all(&mut sink);
        let (terrain, tunnel) = sink.totals();
        log::info!(
            "world ready: {} chunks, {} terrain / {} tunnel triangles",
            sink.chunks.len(),
            terrain,
            tunnel
        );
        Ok(Self {
            world,
            pheromone,
            sink,
        })
    }

    /// Digs along `stroke`, ticking the world between digs, then drains every
    /// pending rebuild.
    pub fn run_stroke(&mut self, stroke: &Stroke) -> Result<StrokeSummary, WorldError> {
        let mut summary = StrokeSummary::default();
        let mut last = Instant::now();
        for p in stroke.points() {
            summary.digs += 1;
            match self.world.try_dig_at(p, stroke.radius) {
                Ok(report) if report.changed() => {
                    summary.changed_digs += 1;
                    summary.cells_changed += report.cells_changed;
                    if self.pheromone.deposit(p, DEPOSIT_PER_DIG) {
                        let cell = self.pheromone.cell_of(p);
                        log::debug!("scent {:.2} at {:?}", self.pheromone.get(cell), cell);
                    }
                }
                Ok(_) => {}
                Err(WorldError::OutOfBounds { .. }) => summary.out_of_bounds += 1,
                Err(e) => return Err(e),
            }
            if !stroke.interval.is_zero() {
                thread::sleep(stroke.interval);
            }
            let now = Instant::now();
            let dt = now.duration_since(last).as_secs_f32();
            last = now;
            summary.meshes_adopted += self.world.tick(&mut self.sink);
            self.pheromone.tick(dt);
        }
        summary.meshes_adopted += self.world.flush(FLUSH_TIMEOUT, &mut self.sink)?;
        Ok(summary)
    }

    pub fn log_stats(&self) {
        for (coord, s) in &self.sink.chunks {
            log::info!(
                "chunk {}: {} terrain / {} tunnel triangles ({} uploads)",
                coord,
                s.terrain_triangles,
                s.tunnel_triangles,
                s.uploads
            );
        }
        let (terrain, tunnel) = self.sink.totals();
        log::info!(
            "total: {} terrain / {} tunnel triangles after {} clears",
            terrain,
            tunnel,
            self.sink.clears
        );
        if let Some((cell, v)) = self.pheromone.peak() {
            log::info!("strongest scent {:.2} at {:?}", v, cell);
        }
    }
}
