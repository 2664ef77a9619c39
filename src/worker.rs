//! Worker (`spec.md` §4.D).
//!
//! One worker owns one lane: a specific GPU index or a CPU slot. It runs at
//! most one job, in a background thread, and reports completion through a
//! small shared state block guarded by [`crate::sync_ext`]'s poison-proof
//! lock so a panicking job thread never wedges the pool.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use tracing::error;

use crate::domain::{Accel, Item, ProgressSnapshot, WorkerKind};
use crate::error::ProcessError;
use crate::ffmpeg_driver::FfmpegDriver;
use crate::processor::{ItemProcessor, ProcessorConfig};
use crate::sync_ext::MutexExt;

/// What a worker reports after a job finishes. Distinct from
/// [`crate::domain::Outcome`] in that `CodecUnsupported` here still needs
/// the worker's own kind (GPU vs CPU) to decide how the Pool should count
/// it; the Pool maps this into an `Outcome` once it knows which worker it
/// came from.
#[derive(Debug)]
pub enum JobResult {
    Ok,
    CodecUnsupported,
    Failed(String),
}

pub enum PollResult {
    Idle,
    Running,
    Done(Item, JobResult),
}

struct Shared {
    busy: bool,
    progress: ProgressSnapshot,
    result: Option<(Item, JobResult)>,
}

pub struct Worker {
    pub id: usize,
    pub kind: WorkerKind,
    pub gpu_index: Option<usize>,
    pub completed_count: u64,
    pub failed_count: u64,
    shared: Arc<Mutex<Shared>>,
    stop_flag: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Worker {
    pub fn new(id: usize, kind: WorkerKind, gpu_index: Option<usize>) -> Self {
        Self {
            id,
            kind,
            gpu_index,
            completed_count: 0,
            failed_count: 0,
            shared: Arc::new(Mutex::new(Shared {
                busy: false,
                progress: ProgressSnapshot::default(),
                result: None,
            })),
            stop_flag: Arc::new(AtomicBool::new(false)),
            handle: None,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.shared.lock_unpoisoned().busy
    }

    pub fn current_progress(&self) -> ProgressSnapshot {
        self.shared.lock_unpoisoned().progress.clone()
    }

    /// Rejects the assignment if this worker already has a live job.
    pub fn assign(
        &mut self,
        item: Item,
        accel: Accel,
        driver: Arc<FfmpegDriver>,
        config: Arc<ProcessorConfig>,
    ) -> Result<(), Item> {
        {
            let mut shared = self.shared.lock_unpoisoned();
            if shared.busy {
                return Err(item);
            }
            shared.busy = true;
            shared.progress = ProgressSnapshot::default();
        }

        let shared = self.shared.clone();
        let stop_flag = self.stop_flag.clone();
        let worker_id = self.id;
        let item_for_thread = item.clone();

        let spawn_result = std::thread::Builder::new()
            .name(format!("worker-{worker_id}"))
            .spawn(move || {
                let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                    run_job(&item_for_thread, &accel, &driver, &config, &shared, &stop_flag)
                }));

                let result = match outcome {
                    Ok(result) => result,
                    Err(_) => JobResult::Failed("worker task panicked".to_string()),
                };

                let mut shared = shared.lock_unpoisoned();
                shared.busy = false;
                shared.result = Some((item_for_thread, result));
            });

        match spawn_result {
            Ok(handle) => {
                self.handle = Some(handle);
                Ok(())
            }
            Err(err) => {
                error!(worker_id, %err, "failed to spawn worker thread");
                self.shared.lock_unpoisoned().busy = false;
                Err(item)
            }
        }
    }

    pub fn poll_completion(&mut self) -> PollResult {
        let taken = {
            let mut shared = self.shared.lock_unpoisoned();
            shared.result.take()
        };

        match taken {
            Some((item, result)) => {
                if let Some(handle) = self.handle.take() {
                    let _ = handle.join();
                }
                match &result {
                    JobResult::Ok => self.completed_count += 1,
                    JobResult::Failed(_) => self.failed_count += 1,
                    JobResult::CodecUnsupported => {}
                }
                PollResult::Done(item, result)
            }
            None => {
                if self.is_busy() {
                    PollResult::Running
                } else {
                    PollResult::Idle
                }
            }
        }
    }

    /// Waits bounded for an in-flight job to finish, then releases the
    /// lane. Does not forcibly kill the FFmpeg child; that happens inside
    /// the driver's own run loop once it observes `stop_flag`.
    pub fn shutdown(&mut self, timeout: Duration) {
        self.stop_flag.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let start = std::time::Instant::now();
            while !handle.is_finished() && start.elapsed() < timeout {
                std::thread::sleep(Duration::from_millis(10));
            }
            if handle.is_finished() {
                let _ = handle.join();
            } else {
                error!(worker_id = self.id, "worker did not stop within shutdown timeout");
            }
        }
    }
}

fn run_job(
    item: &Item,
    accel: &Accel,
    driver: &FfmpegDriver,
    config: &ProcessorConfig,
    shared: &Arc<Mutex<Shared>>,
    stop_flag: &Arc<AtomicBool>,
) -> JobResult {
    if stop_flag.load(Ordering::SeqCst) {
        return JobResult::Failed("worker shut down before job started".to_string());
    }

    let processor = ItemProcessor { driver, config };
    let shared_for_progress = shared.clone();

    let result = processor.process(item, accel, |snapshot| {
        shared_for_progress.lock_unpoisoned().progress = snapshot;
    });

    match result {
        Ok(()) => JobResult::Ok,
        Err(ProcessError::CodecUnsupported(_)) => JobResult::CodecUnsupported,
        Err(ProcessError::MissingSource(path)) => {
            JobResult::Failed(format!("missing source: {}", path.display()))
        }
        Err(other) => JobResult::Failed(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_worker_starts_idle() {
        let worker = Worker::new(0, WorkerKind::Gpu, Some(0));
        assert!(!worker.is_busy());
    }
}
