//! Background construction of compiled bitmap representations.
//!
//! A compile turns a bitmap's straight-alpha pixels into a premultiplied [`CompiledImage`].
//! Jobs run on a small tokio blocking pool (or are queued until explicitly run) and report back
//! through a channel that the session drains on its own thread. Results carry the bitmap's
//! content revision at scheduling time so stale results can be recognised and dropped.

use std::collections::VecDeque;
use std::sync::Arc;

use log::warn;
use tokio::runtime::Runtime;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::CompileMode;
use crate::handle::BitmapId;
use crate::render::{CompiledImage, RgbaImage};

pub struct CompileJob {
    pub bitmap: BitmapId,
    pub revision: u64,
    pub pixels: Arc<RgbaImage>,
}

#[derive(Debug)]
pub struct CompileOutcome {
    pub bitmap: BitmapId,
    pub revision: u64,
    /// `None` when the pixels could not be compiled (e.g. a zero-sized bitmap).
    pub image: Option<CompiledImage>,
}

impl CompileJob {
    fn run(self) -> CompileOutcome {
        CompileOutcome {
            bitmap: self.bitmap,
            revision: self.revision,
            image: CompiledImage::from_rgba(&self.pixels),
        }
    }
}

pub struct BitmapCompiler {
    runtime: Option<Arc<Runtime>>,
    deferred: VecDeque<CompileJob>,
    tx: mpsc::UnboundedSender<CompileOutcome>,
    rx: mpsc::UnboundedReceiver<CompileOutcome>,
    /// Jobs handed to the runtime and not yet reaped.
    running: Vec<JoinHandle<()>>,
}

impl BitmapCompiler {
    /// Creates a compiler. If the worker pool cannot be started, compiles are deferred instead.
    pub fn new(mode: CompileMode, worker_threads: usize) -> Self {
        let runtime = match mode {
            CompileMode::Deferred => None,
            CompileMode::Worker => match tokio::runtime::Builder::new_multi_thread()
                .worker_threads(worker_threads)
                .max_blocking_threads(worker_threads)
                .thread_name("bitmap-compile")
                .build()
            {
                Ok(rt) => Some(Arc::new(rt)),
                Err(e) => {
                    warn!("cannot start compile workers, deferring compiles: {}", e);
                    None
                }
            },
        };

        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            runtime,
            deferred: VecDeque::new(),
            tx,
            rx,
            running: Vec::new(),
        }
    }

    pub fn is_deferred(&self) -> bool {
        self.runtime.is_none()
    }

    pub fn schedule(&mut self, job: CompileJob) {
        if self.runtime.is_none() {
            self.deferred.push_back(job);
            return;
        }
        self.spawn(move || job.run());
    }

    fn spawn(&mut self, work: impl FnOnce() -> CompileOutcome + Send + 'static) {
        let Some(runtime) = &self.runtime else {
            return;
        };
        let tx = self.tx.clone();
        let handle = runtime.spawn_blocking(move || {
            // The receiver only goes away with the session.
            let _ = tx.send(work());
        });
        self.running.push(handle);
    }

    /// Joins finished jobs, or every job when `wait` is set. A job that panicked sends no
    /// outcome and is only logged.
    fn reap(&mut self, wait: bool) {
        let Some(runtime) = &self.runtime else {
            return;
        };
        let mut still_running = Vec::new();
        for handle in self.running.drain(..) {
            if !wait && !handle.is_finished() {
                still_running.push(handle);
                continue;
            }
            if let Err(e) = runtime.block_on(handle) {
                warn!("bitmap compile failed: {}", e);
            }
        }
        self.running = still_running;
    }

    /// Runs every queued deferred job on the calling thread. Returns how many ran.
    pub fn run_deferred(&mut self) -> usize {
        let mut ran = 0;
        while let Some(job) = self.deferred.pop_front() {
            let _ = self.tx.send(job.run());
            ran += 1;
        }
        ran
    }

    /// Next finished outcome, without waiting.
    pub fn try_next(&mut self) -> Option<CompileOutcome> {
        self.reap(false);
        self.rx.try_recv().ok()
    }

    /// Runs deferred jobs and waits for every in-flight job, returning all finished outcomes.
    pub fn flush(&mut self) -> Vec<CompileOutcome> {
        self.run_deferred();
        self.reap(true);

        let mut outcomes = Vec::new();
        while let Ok(outcome) = self.rx.try_recv() {
            outcomes.push(outcome);
        }
        outcomes
    }

    /// Jobs queued or running.
    pub fn pending(&self) -> usize {
        let running = self.running.iter().filter(|h| !h.is_finished()).count();
        running + self.deferred.len()
    }
}
