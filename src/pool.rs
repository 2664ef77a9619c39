//! Worker Pool (`spec.md` §4.E).
//!
//! Owns every worker, the main queue, and the CPU-fallback queue. Its
//! scheduling loop runs on the calling thread (the headless variant from
//! `spec.md` §4.E); a caller wanting it backgrounded spawns its own thread
//! around [`Pool::run_to_completion`].

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{info, warn};

use crate::domain::{Accel, Item, Outcome, PoolSnapshot, SelectedGpu, WorkerKind, WorkerSnapshot};
use crate::ffmpeg_driver::FfmpegDriver;
use crate::processor::ProcessorConfig;
use crate::sync_ext::MutexExt;
use crate::worker::{JobResult, PollResult, Worker};

const SCHEDULER_TICK: Duration = Duration::from_millis(5);
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

struct Counters {
    completed: u64,
    failed: u64,
    skipped: u64,
}

pub struct Pool {
    workers: Vec<Worker>,
    main_queue: VecDeque<Item>,
    fallback_queue: VecDeque<Item>,
    driver: Arc<FfmpegDriver>,
    config: Arc<ProcessorConfig>,
    counters: Mutex<Counters>,
    total: u64,
}

impl Pool {
    pub fn new(
        gpu_worker_count: usize,
        cpu_worker_count: usize,
        selected_gpus: &[SelectedGpu],
        driver: FfmpegDriver,
        config: ProcessorConfig,
    ) -> Self {
        let mut workers = Vec::with_capacity(gpu_worker_count + cpu_worker_count);
        for i in 0..gpu_worker_count {
            workers.push(Worker::new(i, WorkerKind::Gpu, Some(i % selected_gpus.len().max(1))));
        }
        for i in 0..cpu_worker_count {
            workers.push(Worker::new(gpu_worker_count + i, WorkerKind::Cpu, None));
        }

        Self {
            workers,
            main_queue: VecDeque::new(),
            fallback_queue: VecDeque::new(),
            driver: Arc::new(driver),
            config: Arc::new(config),
            counters: Mutex::new(Counters {
                completed: 0,
                failed: 0,
                skipped: 0,
            }),
            total: 0,
        }
    }

    pub fn enqueue(&mut self, item: Item) {
        self.total += 1;
        self.main_queue.push_back(item);
    }

    /// Runs the headless scheduling loop until both queues are empty and no
    /// worker is busy, invoking `progress_cb` with a snapshot after every
    /// tick that changed something.
    ///
    /// Each tick is split into a read/collect pass over `self.workers`
    /// followed by a mutate pass, since `handle_completion` and `assign`
    /// both need `&mut self` while a `&mut self.workers` iterator would
    /// still be live.
    pub fn run_to_completion(
        &mut self,
        selected_gpus: &[SelectedGpu],
        mut progress_cb: impl FnMut(PoolSnapshot),
    ) {
        loop {
            let mut any_busy = false;
            let mut changed = false;

            let mut completions = Vec::new();
            for worker in &mut self.workers {
                match worker.poll_completion() {
                    PollResult::Done(item, result) => {
                        changed = true;
                        completions.push((worker.kind, item, result));
                    }
                    PollResult::Running => any_busy = true,
                    PollResult::Idle => {}
                }
            }
            for (kind, item, result) in completions {
                self.handle_completion(kind, item, result);
            }

            let idle_workers: Vec<usize> = self
                .workers
                .iter()
                .enumerate()
                .filter(|(_, worker)| !worker.is_busy())
                .map(|(index, _)| index)
                .collect();

            for index in idle_workers {
                let kind = self.workers[index].kind;
                let gpu_index = self.workers[index].gpu_index;

                let next = if kind == WorkerKind::Cpu && !self.fallback_queue.is_empty() {
                    self.fallback_queue.pop_front()
                } else {
                    self.main_queue.pop_front()
                };

                let Some(item) = next else { continue };
                let accel = accel_for(kind, gpu_index, selected_gpus);
                changed = true;
                any_busy = true;

                let worker = &mut self.workers[index];
                if worker
                    .assign(item, accel, self.driver.clone(), self.config.clone())
                    .is_err()
                {
                    warn!(worker_id = worker.id, "assign rejected a busy worker");
                }
            }

            if changed {
                progress_cb(self.snapshot());
            }

            if !any_busy && self.main_queue.is_empty() && self.fallback_queue.is_empty() {
                break;
            }

            std::thread::sleep(SCHEDULER_TICK);
        }
    }

    fn handle_completion(&mut self, kind: WorkerKind, item: Item, result: JobResult) {
        let mut counters = self.counters.lock_unpoisoned();
        match (kind, result) {
            (_, JobResult::Ok) => {
                counters.completed += 1;
                info!(item = %item.key, "bundle generated");
            }
            (WorkerKind::Gpu, JobResult::CodecUnsupported) => {
                drop(counters);
                info!(item = %item.key, "codec unsupported on gpu lane, requeuing for cpu");
                self.fallback_queue.push_back(item);
            }
            (WorkerKind::Cpu, JobResult::CodecUnsupported) => {
                counters.failed += 1;
                warn!(item = %item.key, "codec unsupported on cpu lane, no further fallback");
            }
            (_, JobResult::Failed(reason)) => {
                if reason.starts_with("missing source") {
                    counters.skipped += 1;
                } else {
                    counters.failed += 1;
                }
                warn!(item = %item.key, reason = %reason, "item processing failed");
            }
        }
    }

    pub fn snapshot(&self) -> PoolSnapshot {
        let counters = self.counters.lock_unpoisoned();
        let workers = self
            .workers
            .iter()
            .map(|worker| WorkerSnapshot {
                id: worker.id,
                kind: worker.kind,
                gpu_index: worker.gpu_index,
                busy: worker.is_busy(),
                current_item_key: None,
                progress: worker.current_progress(),
                completed_count: worker.completed_count,
                failed_count: worker.failed_count,
            })
            .collect();

        PoolSnapshot {
            completed: counters.completed,
            failed: counters.failed,
            skipped: counters.skipped,
            total: self.total,
            workers,
        }
    }

    pub fn shutdown(&mut self) {
        for worker in &mut self.workers {
            worker.shutdown(SHUTDOWN_GRACE);
        }
    }
}

fn accel_for(kind: WorkerKind, gpu_index: Option<usize>, selected_gpus: &[SelectedGpu]) -> Accel {
    match (kind, gpu_index) {
        (WorkerKind::Gpu, Some(idx)) => selected_gpus
            .get(idx)
            .map(|gpu| gpu.accel())
            .unwrap_or(Accel::None),
        _ => Accel::None,
    }
}

/// Maps a worker's completion into the caller-facing outcome, for callers
/// that want a simpler event than `JobResult` plus queue routing.
pub fn outcome_for(result: &JobResult) -> Outcome {
    match result {
        JobResult::Ok => Outcome::Ok,
        JobResult::CodecUnsupported => Outcome::CodecUnsupported,
        JobResult::Failed(reason) if reason.starts_with("missing source") => {
            Outcome::Skipped(reason.clone())
        }
        JobResult::Failed(reason) => Outcome::Failed(reason.clone()),
    }
}
