//! Background navigation worker.
//!
//! Frames are handed over through a single slot: a frame submitted while an
//! older one is still waiting replaces it, so the worker always runs on the
//! most recent image. The worker thread owns the [`Navigator`].

use anyhow::{Context, Result};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::frame::RgbFrame;
use crate::pipeline::navigator::{FrameOutcome, Navigator};
use crate::pipeline::sink::AlertSink;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub submitted: u64,
    /// Frames replaced in the slot before the worker picked them up.
    pub superseded: u64,
    pub processed: u64,
    pub rate_limited: u64,
    pub failed: u64,
    pub alerts: u64,
    pub consecutive_failures: u32,
}

#[derive(Default)]
struct Counters {
    submitted: AtomicU64,
    superseded: AtomicU64,
    processed: AtomicU64,
    rate_limited: AtomicU64,
    failed: AtomicU64,
    alerts: AtomicU64,
    consecutive_failures: AtomicU32,
}

struct Shared {
    slot: Mutex<Option<RgbFrame>>,
    ready: Condvar,
    stopping: AtomicBool,
    /// A frame has been taken from the slot and is not yet dispatched.
    busy: AtomicBool,
    counters: Counters,
}

pub struct WorkerHandle {
    shared: Arc<Shared>,
    thread: Option<JoinHandle<()>>,
}

/// Start the worker thread.
pub fn spawn(mut navigator: Navigator, mut sink: Box<dyn AlertSink>) -> Result<WorkerHandle> {
    let shared = Arc::new(Shared {
        slot: Mutex::new(None),
        ready: Condvar::new(),
        stopping: AtomicBool::new(false),
        busy: AtomicBool::new(false),
        counters: Counters::default(),
    });
    let worker_shared = shared.clone();
    let thread = std::thread::Builder::new()
        .name("navcue-worker".into())
        .spawn(move || {
            if let Err(e) = navigator.warm_up() {
                log::warn!("backend warm-up failed: {}", e);
            }
            let epoch = Instant::now();
            while let Some(frame) = next_frame(&worker_shared) {
                let now_ms = epoch.elapsed().as_millis() as u64;
                let report = navigator.process_frame(&frame, now_ms);
                if worker_shared.stopping.load(Ordering::SeqCst) {
                    log::debug!("discarding frame {} result: worker stopping", report.frame_id);
                    break;
                }

                let counters = &worker_shared.counters;
                counters
                    .consecutive_failures
                    .store(navigator.consecutive_failures(), Ordering::Relaxed);
                match &report.outcome {
                    FrameOutcome::RateLimited => {
                        counters.rate_limited.fetch_add(1, Ordering::Relaxed);
                    }
                    FrameOutcome::Alerts(alerts) => {
                        counters.processed.fetch_add(1, Ordering::Relaxed);
                        counters
                            .alerts
                            .fetch_add(alerts.len() as u64, Ordering::Relaxed);
                        sink.on_alerts(report.frame_id, alerts);
                    }
                    FrameOutcome::Quiet => {
                        counters.processed.fetch_add(1, Ordering::Relaxed);
                        sink.on_quiet(report.frame_id, report.visible);
                    }
                    FrameOutcome::Clear => {
                        counters.processed.fetch_add(1, Ordering::Relaxed);
                        sink.on_clear(report.frame_id);
                    }
                    FrameOutcome::Failed(error) => {
                        counters.failed.fetch_add(1, Ordering::Relaxed);
                        sink.on_failure(report.frame_id, error, navigator.consecutive_failures());
                    }
                }
                worker_shared.busy.store(false, Ordering::SeqCst);
            }
            log::debug!("navigation worker exiting");
        })
        .context("failed to spawn navigation worker")?;

    Ok(WorkerHandle {
        shared,
        thread: Some(thread),
    })
}

/// Block until a frame is available or the worker is asked to stop.
fn next_frame(shared: &Shared) -> Option<RgbFrame> {
    let mut slot = shared.slot.lock().unwrap_or_else(PoisonError::into_inner);
    loop {
        if shared.stopping.load(Ordering::SeqCst) {
            return None;
        }
        if let Some(frame) = slot.take() {
            shared.busy.store(true, Ordering::SeqCst);
            return Some(frame);
        }
        slot = shared
            .ready
            .wait(slot)
            .unwrap_or_else(PoisonError::into_inner);
    }
}

impl WorkerHandle {
    /// Hand a frame to the worker. Returns true when it replaced a frame that
    /// had not been picked up yet.
    pub fn submit(&self, frame: RgbFrame) -> bool {
        let counters = &self.shared.counters;
        counters.submitted.fetch_add(1, Ordering::Relaxed);
        let replaced = {
            let mut slot = self
                .shared
                .slot
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            slot.replace(frame).is_some()
        };
        if replaced {
            counters.superseded.fetch_add(1, Ordering::Relaxed);
        }
        self.shared.ready.notify_one();
        replaced
    }

    pub fn stats(&self) -> WorkerStats {
        let c = &self.shared.counters;
        WorkerStats {
            submitted: c.submitted.load(Ordering::Relaxed),
            superseded: c.superseded.load(Ordering::Relaxed),
            processed: c.processed.load(Ordering::Relaxed),
            rate_limited: c.rate_limited.load(Ordering::Relaxed),
            failed: c.failed.load(Ordering::Relaxed),
            alerts: c.alerts.load(Ordering::Relaxed),
            consecutive_failures: c.consecutive_failures.load(Ordering::Relaxed),
        }
    }

    /// Wait until no frame is queued or in flight. Returns false on timeout.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            let idle = {
                let slot = self
                    .shared
                    .slot
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner);
                slot.is_none() && !self.shared.busy.load(Ordering::SeqCst)
            };
            if idle {
                return true;
            }
            if Instant::now() >= deadline || !self.is_running() {
                return false;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    pub fn is_running(&self) -> bool {
        self.thread
            .as_ref()
            .map(|t| !t.is_finished())
            .unwrap_or(false)
    }

    /// Stop between frames. An inference already running completes and its
    /// result is dropped.
    pub fn stop(mut self) -> WorkerStats {
        self.shutdown();
        self.stats()
    }

    fn shutdown(&mut self) {
        self.shared.stopping.store(true, Ordering::SeqCst);
        {
            // Taking the lock orders the flag with a worker about to wait.
            let _slot = self
                .shared
                .slot
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            self.shared.ready.notify_all();
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::error!("navigation worker panicked");
            }
        }
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}
