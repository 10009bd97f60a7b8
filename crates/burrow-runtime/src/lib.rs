//! Runtime job queue and mesh-extraction workers (engine-only).
#![forbid(unsafe_code)]

mod handle;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use burrow_geom::ChunkCoord;
use burrow_grid::DensityField;
use burrow_mesh_cpu::{ChunkMesh, SurfaceError, SurfaceExtractor};
use crossbeam_channel::{Receiver, Sender, bounded, unbounded};
use rayon::{ThreadPool, ThreadPoolBuilder};
use thiserror::Error;

pub use handle::{RebuildHandle, RebuildStatus};

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("mesh worker count must be at least 1")]
    NoWorkers,
    #[error("failed to build mesh worker pool: {0}")]
    PoolBuild(#[from] rayon::ThreadPoolBuildError),
    #[error("mesh workers have shut down")]
    Disconnected,
    #[error("rebuild did not finish within {0:?}")]
    Timeout(Duration),
}

/// One extraction request: a detached density snapshot plus the revision it reflects.
#[derive(Clone, Debug)]
pub struct RebuildJob {
    pub coord: ChunkCoord,
    pub rev: u64,
    pub job_id: u64,
    pub field: DensityField,
}

pub struct JobOut {
    pub coord: ChunkCoord,
    pub rev: u64,
    pub job_id: u64,
    pub result: Result<ChunkMesh, SurfaceError>,
    pub t_queue_ms: u32,
    pub t_mesh_ms: u32,
}

struct Envelope {
    job: RebuildJob,
    submitted: Instant,
    done: Sender<RebuildStatus>,
}

fn elapsed_ms(start: Instant) -> u32 {
    start.elapsed().as_millis().min(u128::from(u32::MAX)) as u32
}

fn process_rebuild_job(env: Envelope, extractor: &SurfaceExtractor, tx: &Sender<JobOut>) {
    let Envelope {
        job,
        submitted,
        done,
    } = env;
    let RebuildJob {
        coord,
        rev,
        job_id,
        field,
    } = job;
    let t_queue_ms = elapsed_ms(submitted);
    let t0 = Instant::now();
    let result = extractor.extract(&field);
    let t_mesh_ms = elapsed_ms(t0);
    let status = RebuildStatus::of(&result);
    log::debug!(
        target: "rebuild",
        "ms queue={} mesh={} extracted {} rev={} job={}",
        t_queue_ms,
        t_mesh_ms,
        coord,
        rev,
        job_id
    );
    // Result first: a caller woken by the handle must find it on the queue.
    let _ = tx.send(JobOut {
        coord,
        rev,
        job_id,
        result,
        t_queue_ms,
        t_mesh_ms,
    });
    let _ = done.send(status);
}

/// Worker pool that turns density snapshots into meshes off the owning thread.
///
/// Workers never touch chunk state; results come back through
/// [`Runtime::drain_worker_results`] for the owner to adopt.
pub struct Runtime {
    job_tx: Sender<Envelope>,
    res_rx: Receiver<JobOut>,
    _pool: Arc<ThreadPool>,
    extractor: Arc<SurfaceExtractor>,
    q_jobs: Arc<AtomicUsize>,
    inflight: Arc<AtomicUsize>,
    next_job_id: AtomicU64,
    pub workers: usize,
}

impl Runtime {
    pub fn new(extractor: Arc<SurfaceExtractor>, workers: usize) -> Result<Self, RuntimeError> {
        if workers == 0 {
            return Err(RuntimeError::NoWorkers);
        }
        let (job_tx, job_rx) = unbounded::<Envelope>();
        let (res_tx, res_rx) = unbounded::<JobOut>();
        let q_ctr = Arc::new(AtomicUsize::new(0));
        let inflight_ctr = Arc::new(AtomicUsize::new(0));

        let pool = Arc::new(
            ThreadPoolBuilder::new()
                .num_threads(workers)
                .thread_name(|i| format!("burrow-mesh-{i}"))
                .build()?,
        );
        for _ in 0..workers {
            let rx = job_rx.clone();
            let tx = res_tx.clone();
            let extractor = extractor.clone();
            let q_jobs = q_ctr.clone();
            let inflight = inflight_ctr.clone();
            pool.spawn(move || {
                while let Ok(env) = rx.recv() {
                    q_jobs.fetch_sub(1, Ordering::Relaxed);
                    inflight.fetch_add(1, Ordering::Relaxed);
                    process_rebuild_job(env, extractor.as_ref(), &tx);
                    inflight.fetch_sub(1, Ordering::Relaxed);
                }
            });
        }
        log::info!(target: "rebuild", "mesh runtime started workers={}", workers);

        Ok(Self {
            job_tx,
            res_rx,
            _pool: pool,
            extractor,
            q_jobs: q_ctr,
            inflight: inflight_ctr,
            next_job_id: AtomicU64::new(1),
            workers,
        })
    }

    #[inline]
    pub fn extractor(&self) -> &SurfaceExtractor {
        self.extractor.as_ref()
    }

    /// Queues an extraction of `field` for `coord` at revision `rev`.
    pub fn submit(
        &self,
        coord: ChunkCoord,
        rev: u64,
        field: DensityField,
    ) -> Result<RebuildHandle, RuntimeError> {
        let job_id = self.next_job_id.fetch_add(1, Ordering::Relaxed);
        let (done_tx, done_rx) = bounded(1);
        let env = Envelope {
            job: RebuildJob {
                coord,
                rev,
                job_id,
                field,
            },
            submitted: Instant::now(),
            done: done_tx,
        };
        self.q_jobs.fetch_add(1, Ordering::Relaxed);
        if self.job_tx.send(env).is_err() {
            self.q_jobs.fetch_sub(1, Ordering::Relaxed);
            return Err(RuntimeError::Disconnected);
        }
        Ok(RebuildHandle::new(coord, rev, job_id, done_rx))
    }

    /// Extracts on the calling thread, bypassing the queue.
    pub fn extract_now(&self, field: &DensityField) -> Result<ChunkMesh, SurfaceError> {
        self.extractor.extract(field)
    }

    pub fn drain_worker_results(&self) -> Vec<JobOut> {
        self.res_rx.try_iter().collect()
    }

    /// Blocks for the next finished job, up to `timeout`.
    pub fn wait_result(&self, timeout: Duration) -> Option<JobOut> {
        self.res_rx.recv_timeout(timeout).ok()
    }

    /// (queued, in flight)
    pub fn queue_debug_counts(&self) -> (usize, usize) {
        (
            self.q_jobs.load(Ordering::Relaxed),
            self.inflight.load(Ordering::Relaxed),
        )
    }
}
