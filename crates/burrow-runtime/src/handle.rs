use std::cell::OnceCell;
use std::time::Duration;

use burrow_geom::ChunkCoord;
use burrow_mesh_cpu::{ChunkMesh, SurfaceError};
use crossbeam_channel::{Receiver, RecvTimeoutError, TryRecvError};

use crate::RuntimeError;

/// How an extraction ended.
#[derive(Clone, Debug, PartialEq)]
pub enum RebuildStatus {
    Meshed {
        terrain_triangles: usize,
        tunnel_triangles: usize,
    },
    /// The surface was empty; the chunk publishes "no geometry".
    NoGeometry,
    /// Buffers failed validation; the previous mesh stays in place.
    Malformed(SurfaceError),
}

impl RebuildStatus {
    pub fn of(result: &Result<ChunkMesh, SurfaceError>) -> Self {
        match result {
            Ok(mesh) => RebuildStatus::Meshed {
                terrain_triangles: mesh.terrain_triangles(),
                tunnel_triangles: mesh.tunnel_triangles(),
            },
            Err(e) if e.is_degenerate() => RebuildStatus::NoGeometry,
            Err(e) => RebuildStatus::Malformed(e.clone()),
        }
    }
}

/// Completion handle for one submitted rebuild.
///
/// Resolves once the worker finishes extracting. The mesh itself travels on
/// the runtime's result queue and is adopted by whoever drains it.
#[derive(Debug)]
pub struct RebuildHandle {
    coord: ChunkCoord,
    rev: u64,
    job_id: u64,
    rx: Receiver<RebuildStatus>,
    // The worker sends exactly once; keep what we saw for later polls.
    seen: OnceCell<RebuildStatus>,
}

impl RebuildHandle {
    pub(crate) fn new(coord: ChunkCoord, rev: u64, job_id: u64, rx: Receiver<RebuildStatus>) -> Self {
        Self {
            coord,
            rev,
            job_id,
            rx,
            seen: OnceCell::new(),
        }
    }

    #[inline]
    pub fn coord(&self) -> ChunkCoord {
        self.coord
    }

    #[inline]
    pub fn rev(&self) -> u64 {
        self.rev
    }

    #[inline]
    pub fn job_id(&self) -> u64 {
        self.job_id
    }

    /// Blocks until the extraction finishes.
    pub fn wait(self) -> Result<RebuildStatus, RuntimeError> {
        if let Some(s) = self.seen.into_inner() {
            return Ok(s);
        }
        self.rx.recv().map_err(|_| RuntimeError::Disconnected)
    }

    pub fn wait_timeout(&self, timeout: Duration) -> Result<RebuildStatus, RuntimeError> {
        if let Some(s) = self.seen.get() {
            return Ok(s.clone());
        }
        match self.rx.recv_timeout(timeout) {
            Ok(s) => Ok(self.seen.get_or_init(|| s).clone()),
            Err(RecvTimeoutError::Timeout) => Err(RuntimeError::Timeout(timeout)),
            Err(RecvTimeoutError::Disconnected) => Err(RuntimeError::Disconnected),
        }
    }

    /// Non-blocking poll; `Ok(None)` while the job is still queued or running.
    pub fn try_status(&self) -> Result<Option<RebuildStatus>, RuntimeError> {
        if let Some(s) = self.seen.get() {
            return Ok(Some(s.clone()));
        }
        match self.rx.try_recv() {
            Ok(s) => Ok(Some(self.seen.get_or_init(|| s).clone())),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(RuntimeError::Disconnected),
        }
    }
}
