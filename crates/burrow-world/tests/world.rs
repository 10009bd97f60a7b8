use std::time::Duration;

use burrow_geom::IVec3;
use burrow_grid::{AIR_DENSITY, SOLID_DENSITY};
use burrow_world::config::SeedMode;
use burrow_world::{
    ChunkCoord, ChunkMesh, MeshConsumer, RebuildStatus, Submesh, TerrainConfig, Vec3, World,
    WorldError,
};

#[derive(Debug, PartialEq)]
enum Event {
    Cleared(ChunkCoord),
    Adopted(ChunkCoord, usize, usize),
}

#[derive(Default)]
struct Recorder {
    events: Vec<Event>,
}

impl MeshConsumer for Recorder {
    fn mesh_cleared(&mut self, coord: ChunkCoord) {
        self.events.push(Event::Cleared(coord));
    }

    fn mesh_adopted(&mut self, coord: ChunkCoord, _origin: Vec3, mesh: &ChunkMesh) {
        self.events
            .push(Event::Adopted(coord, mesh.terrain_triangles(), mesh.tunnel_triangles()));
    }
}

fn config(size: usize, lattice: (usize, usize, usize)) -> TerrainConfig {
    let mut cfg = TerrainConfig::default();
    cfg.chunk.width = size;
    cfg.chunk.height = size;
    cfg.chunk.depth = size;
    cfg.lattice.chunks_x = lattice.0;
    cfg.lattice.chunks_y = lattice.1;
    cfg.lattice.chunks_z = lattice.2;
    cfg
}

fn tunnel_near(mesh: &ChunkMesh, local: Vec3, within: f32) -> bool {
    mesh.triangles(Submesh::Tunnel).any(|t| {
        let c = (mesh.positions[t[0] as usize]
            + mesh.positions[t[1] as usize]
            + mesh.positions[t[2] as usize])
            / 3.0;
        c.distance(local) < within
    })
}

#[test]
fn construction_meshes_every_chunk() {
    let world = World::new(&config(8, (2, 1, 2))).unwrap();
    assert_eq!(world.chunks().count(), 4);
    for chunk in world.chunks() {
        assert!(chunk.mesh().is_some(), "chunk {} has no mesh", chunk.coord());
        assert!(chunk.grid().covers(chunk.extraction_bounds()));
    }
    let mut rec = Recorder::default();
    world.publish_all(&mut rec);
    assert_eq!(rec.events.len(), 8);
    assert_eq!(rec.events[0], Event::Cleared(ChunkCoord::new(0, 0, 0)));
    assert!(matches!(rec.events[1], Event::Adopted(c, _, _) if c == ChunkCoord::new(0, 0, 0)));
}

#[test]
fn geometry_helpers() {
    let world = World::new(&config(16, (2, 1, 2))).unwrap();
    assert_eq!(world.world_size(), Vec3::new(32.0, 16.0, 32.0));
    assert_eq!(world.chunk_origin(ChunkCoord::new(1, 0, 0)), Vec3::new(16.0, -16.0, 0.0));
    assert_eq!(world.center_surface(), Vec3::new(16.0, 2.0, 16.0));
    // Single layer: height does not matter.
    assert_eq!(
        world.world_to_chunk_coord(Vec3::new(20.0, 40.0, 3.0)).unwrap(),
        ChunkCoord::new(1, 0, 0)
    );
    assert!(matches!(
        world.world_to_chunk_coord(Vec3::new(-0.01, -3.0, 3.0)),
        Err(WorldError::OutOfBounds { coord, .. }) if coord == ChunkCoord::new(-1, 0, 0)
    ));
    assert!(matches!(
        world.world_to_chunk_coord(Vec3::new(f32::NAN, 0.0, 0.0)),
        Err(WorldError::NonFinite(_))
    ));
}

#[test]
fn no_change_dig_is_idempotent() {
    let mut world = World::new(&config(8, (1, 1, 1))).unwrap();
    let c0 = ChunkCoord::new(0, 0, 0);
    let before = world.chunk(c0).unwrap().snapshot();
    // Bottom of the air shell: the only cell in reach is already carved.
    let p = world.chunk_origin(c0) + Vec3::new(0.0, -1.0, 0.0);
    for _ in 0..2 {
        let report = world.try_dig_at(p, 0.9).unwrap();
        assert!(!report.changed());
        assert_eq!(world.pending_rebuilds(), 0);
    }
    assert_eq!(world.chunk(c0).unwrap().snapshot(), before);
    assert_eq!(world.scheduler().stats().requests, 0);
}

#[test]
fn debounce_coalesces_burst() {
    let mut world = World::new(&config(16, (1, 1, 1))).unwrap();
    let c0 = ChunkCoord::new(0, 0, 0);
    for i in 0..5 {
        let p = Vec3::new(8.0 + i as f32 * 0.02, -8.0, 8.0 - i as f32 * 0.01);
        let report = world.try_dig_at(p, 2.0).unwrap();
        assert_eq!(report.primary, Some(c0));
    }
    assert_eq!(world.pending_rebuilds(), 1);
    assert_eq!(world.scheduler().stats().coalesced, 4);

    let deadline = world.next_rebuild_deadline().unwrap();
    let mut handles = world.pump_at(deadline);
    assert_eq!(handles.len(), 1);
    assert!(world.pump_at(deadline).is_empty());

    let status = handles.pop().unwrap().wait().unwrap();
    assert!(matches!(status, RebuildStatus::Meshed { .. }));
    let mut rec = Recorder::default();
    assert_eq!(world.drain_completed(&mut rec), 1);
    assert_eq!(world.scheduler().stats().dispatched, 1);

    let chunk = world.chunk(c0).unwrap();
    let expected = world.runtime().extract_now(&chunk.snapshot()).unwrap();
    assert_eq!(chunk.mesh(), Some(&expected));
    assert!(tunnel_near(&expected, Vec3::new(8.0, 8.0, 8.0), 3.0));
    assert_eq!(rec.events.len(), 2);
    assert_eq!(rec.events[0], Event::Cleared(c0));
}

#[test]
fn dig_near_seam_reaches_neighbour() {
    let mut world = World::new(&config(16, (2, 1, 1))).unwrap();
    let (c0, c1) = (ChunkCoord::new(0, 0, 0), ChunkCoord::new(1, 0, 0));
    // local x = 0.5 in chunk 1, i.e. 16.5 in chunk 0
    let report = world.try_dig_at(Vec3::new(16.5, -8.0, 8.0), 2.0).unwrap();
    assert_eq!(report.primary, Some(c1));
    assert!(report.chunks_changed.contains(&c0));
    assert!(report.chunks_changed.contains(&c1));
    let g0 = world.chunk(c0).unwrap().grid();
    assert!(g0.get(IVec3::new(15, 8, 8)) < SOLID_DENSITY);
    assert!(g0.get(IVec3::new(16, 8, 8)) < g0.get(IVec3::new(15, 8, 8)));
    assert_eq!(g0.get(IVec3::new(13, 8, 8)), SOLID_DENSITY);
    assert_eq!(world.pending_rebuilds(), 2);
}

#[test]
fn far_neighbours_are_skipped() {
    let mut world = World::new(&config(16, (3, 1, 3))).unwrap();
    let report = world.try_dig_at(Vec3::new(24.0, -8.0, 24.0), 2.0).unwrap();
    assert_eq!(report.primary, Some(ChunkCoord::new(1, 0, 1)));
    assert_eq!(report.chunks_visited, 1);
    assert_eq!(report.chunks_changed, vec![ChunkCoord::new(1, 0, 1)]);
}

#[test]
fn out_of_bounds_dig_is_reported_not_applied() {
    let mut world = World::new(&config(8, (1, 1, 1))).unwrap();
    let err = world.try_dig_at(Vec3::new(-5.0, -4.0, 4.0), 2.0).unwrap_err();
    assert!(matches!(err, WorldError::OutOfBounds { .. }));
    assert_eq!(world.pending_rebuilds(), 0);

    // The unconditional variant still reaches the halo of chunk 0.
    let report = world.dig(Vec3::new(-0.5, -4.0, 4.0), 2.0);
    assert_eq!(report.primary, None);
    assert!(report.changed());
    let g = world.chunk(ChunkCoord::new(0, 0, 0)).unwrap().grid();
    assert!(g.get(IVec3::new(0, 4, 4)) < SOLID_DENSITY);
}

#[test]
fn far_away_digs_are_out_of_bounds() {
    let mut world = World::new(&config(8, (2, 2, 2))).unwrap();
    for p in [
        Vec3::new(-1.0e12, -4.0, 4.0),
        Vec3::new(1.0e12, -4.0, 4.0),
        Vec3::new(4.0, -1.0e12, 4.0),
        Vec3::new(4.0, -4.0, f32::MAX),
    ] {
        let err = world.try_dig_at(p, 2.0).unwrap_err();
        assert!(matches!(err, WorldError::OutOfBounds { .. }), "{p:?}: {err}");
        let report = world.dig(p, 2.0);
        assert_eq!(report.primary, None);
        assert!(!report.changed());
    }
    assert_eq!(world.pending_rebuilds(), 0);
}

#[test]
fn dig_during_extraction_lands_in_next_cycle() {
    let mut world = World::new(&config(16, (1, 1, 1))).unwrap();
    let c0 = ChunkCoord::new(0, 0, 0);
    let origin = world.chunk_origin(c0);
    let (a, b) = (Vec3::new(4.0, 8.0, 8.0), Vec3::new(12.0, 8.0, 8.0));

    world.try_dig_at(origin + a, 3.0).unwrap();
    let deadline = world.next_rebuild_deadline().unwrap();
    let handles = world.pump_at(deadline);
    assert_eq!(handles.len(), 1);
    let first_rev = handles[0].rev();
    // Lands after the snapshot was taken.
    world.try_dig_at(origin + b, 3.0).unwrap();
    assert_eq!(world.pending_rebuilds(), 1);

    for h in handles {
        h.wait_timeout(Duration::from_secs(10)).unwrap();
    }
    let mut rec = Recorder::default();
    world.drain_completed(&mut rec);
    let chunk = world.chunk(c0).unwrap();
    assert_eq!(chunk.mesh_rev(), first_rev);
    let mesh = chunk.mesh().unwrap();
    assert!(tunnel_near(mesh, a, 3.5));
    assert!(!tunnel_near(mesh, b, 3.5));

    world.flush(Duration::from_secs(10), &mut rec).unwrap();
    assert_eq!(world.pending_rebuilds(), 0);
    assert_eq!(world.in_flight(), 0);
    let chunk = world.chunk(c0).unwrap();
    assert!(chunk.mesh_rev() > first_rev);
    let mesh = chunk.mesh().unwrap();
    assert!(tunnel_near(mesh, a, 3.5));
    assert!(tunnel_near(mesh, b, 3.5));
    assert!(!world.scheduler().needs_rebuild(c0));
}

#[test]
fn flush_with_nothing_pending_is_immediate() {
    let mut world = World::new(&config(8, (1, 1, 1))).unwrap();
    let mut rec = Recorder::default();
    assert_eq!(world.flush(Duration::ZERO, &mut rec).unwrap(), 0);
    assert!(rec.events.is_empty());
}

#[test]
fn layered_world_digs_from_above() {
    let mut cfg = config(8, (2, 1, 2));
    cfg.seeding.mode = SeedMode::Layered;
    cfg.seeding.surface_y = -3.0;
    let mut world = World::new(&cfg).unwrap();
    let spawn = world.center_surface();
    assert_eq!(spawn, Vec3::new(8.0, -1.0, 8.0));
    // Chunks agree on the density of a shared seam cell.
    let g0 = world.chunk(ChunkCoord::new(0, 0, 0)).unwrap().grid();
    let g1 = world.chunk(ChunkCoord::new(1, 0, 0)).unwrap().grid();
    assert_eq!(g0.get(IVec3::new(8, 2, 3)), g1.get(IVec3::new(0, 2, 3)));

    let report = world.try_dig_at(Vec3::new(8.0, -3.0, 8.0), 2.5).unwrap();
    assert_eq!(report.chunks_changed.len(), 4);
    let mut rec = Recorder::default();
    world.flush(Duration::from_secs(10), &mut rec).unwrap();
    let adopted = rec
        .events
        .iter()
        .filter(|e| matches!(e, Event::Adopted(..)))
        .count();
    assert_eq!(adopted, 4);
    let g = world.chunk(ChunkCoord::new(1, 0, 1)).unwrap().grid();
    assert_eq!(g.get(IVec3::new(0, 5, 0)), AIR_DENSITY);
}
