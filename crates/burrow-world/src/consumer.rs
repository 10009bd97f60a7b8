use burrow_geom::{ChunkCoord, Vec3};
use burrow_mesh_cpu::ChunkMesh;

/// Receiver of finished chunk surfaces (renderer, collider, stats).
///
/// Called on the thread that owns the [`World`](crate::World). A rebuild is
/// delivered as `mesh_cleared` followed by `mesh_adopted`; an empty surface
/// is delivered as `mesh_cleared` alone. Positions in `mesh` are chunk-local;
/// add `origin` for world space.
pub trait MeshConsumer {
    fn mesh_cleared(&mut self, coord: ChunkCoord);
    fn mesh_adopted(&mut self, coord: ChunkCoord, origin: Vec3, mesh: &ChunkMesh);
}

/// Discards everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullConsumer;

impl MeshConsumer for NullConsumer {
    fn mesh_cleared(&mut self, _coord: ChunkCoord) {}
    fn mesh_adopted(&mut self, _coord: ChunkCoord, _origin: Vec3, _mesh: &ChunkMesh) {}
}
