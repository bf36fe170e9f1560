use crate::error::AppError;
use crate::services::settlement::{CycleReport, SettlementService};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{self, MissedTickBehavior};
use tracing::{error, info, warn};

/// Result of asking for a synchronous cycle
#[derive(Debug)]
pub enum CycleRun {
    Completed(CycleReport),
    /// Results feed down or pending work could not be loaded; nothing changed
    /// for the units not yet reached
    Aborted(AppError),
    /// Another cycle holds the guard; the request was dropped
    AlreadyRunning,
}

/// Answer to an on-demand trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerResponse {
    Started,
    AlreadyRunning,
}

/// Releases the single-flight flag when the cycle ends, even on panic
struct CycleGuard {
    running: Arc<AtomicBool>,
}

impl Drop for CycleGuard {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
    }
}

/// Runs settlement cycles on a fixed interval and on demand, never more
/// than one at a time
pub struct SettlementScheduler {
    service: Arc<SettlementService>,
    interval: Duration,
    running: Arc<AtomicBool>,
}

impl SettlementScheduler {
    /// Create a new scheduler
    pub fn new(service: Arc<SettlementService>, interval: Duration) -> Self {
        Self {
            service,
            interval,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Requests while a cycle runs are rejected, not queued
    fn try_acquire(&self) -> Option<CycleGuard> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| CycleGuard {
                running: self.running.clone(),
            })
    }

    /// Run one cycle now and wait for it
    pub async fn run_cycle_once(&self) -> CycleRun {
        let Some(_guard) = self.try_acquire() else {
            info!("Settlement cycle already in progress, request rejected");
            return CycleRun::AlreadyRunning;
        };

        self.execute().await
    }

    /// Start a cycle in the background and return immediately
    pub fn trigger(self: &Arc<Self>) -> TriggerResponse {
        let Some(guard) = self.try_acquire() else {
            info!("Settlement cycle already in progress, trigger rejected");
            return TriggerResponse::AlreadyRunning;
        };

        let scheduler = Arc::clone(self);
        tokio::spawn(async move {
            let _guard = guard;
            scheduler.execute().await;
        });

        info!("On-demand settlement cycle started");
        TriggerResponse::Started
    }

    async fn execute(&self) -> CycleRun {
        match self.service.run_cycle().await {
            Ok(report) => {
                if report.has_failures() {
                    warn!("Settlement cycle completed with failed units; they stay pending");
                }
                CycleRun::Completed(report)
            }
            Err(e) => CycleRun::Aborted(e),
        }
    }

    /// Start the interval loop
    pub async fn start(self: Arc<Self>) {
        let mut interval = time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!("Settlement scheduler started, cycle every {:?}", self.interval);

        loop {
            interval.tick().await;

            match self.run_cycle_once().await {
                CycleRun::Completed(_) | CycleRun::AlreadyRunning => {}
                CycleRun::Aborted(e) if e.is_transient() => {
                    warn!("Settlement cycle aborted, retrying next tick: {}", e);
                }
                CycleRun::Aborted(e) => {
                    error!("Settlement cycle aborted: {}", e);
                }
            }
        }
    }
}
