//! Off-thread packing.
//!
//! Jobs carry their request buffer by value; the worker packs into that same
//! buffer and hands it back. Each grid has at most one meaningful job: a new
//! submission supersedes the previous one, workers skip jobs that are already
//! superseded when they dequeue them, and [`PackerPool::poll`] drops any
//! response whose id is no longer the latest for its grid.

use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, unbounded};
use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, trace, warn};

use super::packer::{LayoutId, LayoutRequest, LayoutResult, Packer};
use super::wire::{self, WireError};
use crate::common::collections::HashMap;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Failed to spawn packing worker: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("Packing workers are gone")]
    Disconnected,
}

struct Job<K> {
    grid: K,
    id: LayoutId,
    buffer: Vec<f32>,
}

struct Response<K> {
    grid: K,
    id: LayoutId,
    buffer: Result<Vec<f32>, WireError>,
}

type Latest<K> = Arc<Mutex<HashMap<K, LayoutId>>>;

pub struct PackerPool<K> {
    jobs: Option<Sender<Job<K>>>,
    responses: Receiver<Response<K>>,
    latest: Latest<K>,
    workers: Vec<JoinHandle<()>>,
}

static_assertions::assert_impl_all!(PackerPool<u64>: Send);

impl<K> PackerPool<K>
where K: Hash + Eq + Copy + Debug + Send + 'static
{
    pub fn new(worker_count: usize) -> Result<Self, WorkerError> {
        let (job_tx, job_rx) = unbounded::<Job<K>>();
        let (response_tx, response_rx) = unbounded::<Response<K>>();
        let latest: Latest<K> = Arc::new(Mutex::new(HashMap::default()));

        let mut workers = Vec::with_capacity(worker_count.max(1));
        for index in 0..worker_count.max(1) {
            let job_rx = job_rx.clone();
            let response_tx = response_tx.clone();
            let latest = latest.clone();
            let handle = thread::Builder::new()
                .name(format!("gridsort-packer-{index}"))
                .spawn(move || run_worker(job_rx, response_tx, latest))?;
            workers.push(handle);
        }

        Ok(PackerPool {
            jobs: Some(job_tx),
            responses: response_rx,
            latest,
            workers,
        })
    }

    pub fn worker_count(&self) -> usize { self.workers.len() }

    /// Queues a packing job for `grid`, superseding any job still pending for
    /// it.
    pub fn submit(&self, grid: K, request: &LayoutRequest) -> Result<(), WorkerError> {
        let Some(jobs) = self.jobs.as_ref() else {
            return Err(WorkerError::Disconnected);
        };
        let previous = self.latest.lock().insert(grid, request.id);
        if let Some(previous) = previous {
            trace!(?grid, ?previous, id = ?request.id, "Superseding pending layout job");
        }
        let job = Job {
            grid,
            id: request.id,
            buffer: wire::encode_request(request),
        };
        jobs.send(job).map_err(|_| {
            self.latest.lock().remove(&grid);
            WorkerError::Disconnected
        })
    }

    /// Forgets the outstanding job for `grid`; its result will be discarded.
    pub fn cancel(&self, grid: K) {
        if self.latest.lock().remove(&grid).is_some() {
            trace!(?grid, "Cancelled pending layout job");
        }
    }

    pub fn is_pending(&self, grid: K) -> bool { self.latest.lock().contains_key(&grid) }

    /// Drains finished jobs without blocking.
    pub fn poll(&self) -> Vec<(K, LayoutResult)> {
        let responses: Vec<_> = self.responses.try_iter().collect();
        self.accept(responses)
    }

    /// Blocks until at least one job finishes or `timeout` passes, then
    /// drains like [`poll`](Self::poll).
    pub fn wait(&self, timeout: Duration) -> Vec<(K, LayoutResult)> {
        let mut responses = match self.responses.recv_timeout(timeout) {
            Ok(response) => vec![response],
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => Vec::new(),
        };
        responses.extend(self.responses.try_iter());
        self.accept(responses)
    }

    fn accept(&self, responses: Vec<Response<K>>) -> Vec<(K, LayoutResult)> {
        let mut latest = self.latest.lock();
        let mut accepted = Vec::with_capacity(responses.len());
        for Response { grid, id, buffer } in responses {
            if latest.get(&grid) != Some(&id) {
                debug!(?grid, ?id, "Discarding stale layout result");
                continue;
            }
            latest.remove(&grid);
            match buffer.and_then(|buffer| wire::decode_response(&buffer)) {
                Ok(mut result) => {
                    // The buffer id is an f32 and only exact up to 2^24.
                    result.id = id;
                    accepted.push((grid, result));
                }
                Err(error) => warn!(?grid, ?id, %error, "Packing worker returned a malformed buffer"),
            }
        }
        accepted
    }
}

impl<K> Drop for PackerPool<K> {
    fn drop(&mut self) {
        self.jobs.take();
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                warn!("Packing worker panicked");
            }
        }
    }
}

fn run_worker<K>(jobs: Receiver<Job<K>>, responses: Sender<Response<K>>, latest: Latest<K>)
where K: Hash + Eq + Copy + Debug {
    let mut packer = Packer::new();
    while let Ok(Job { grid, id, buffer }) = jobs.recv() {
        if latest.lock().get(&grid) != Some(&id) {
            trace!(?grid, ?id, "Skipping superseded layout job");
            continue;
        }
        let buffer = wire::process_buffer(&mut packer, buffer);
        if responses.send(Response { grid, id, buffer }).is_err() {
            break;
        }
    }
}
