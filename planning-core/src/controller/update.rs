//! The outer control loop: update every branch, then idle.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::branch::{Branch, BranchController, BranchReport};
use crate::config::Settings;
use crate::download::{Downloader, Fetch, HttpFetcher, RetryPolicy};
use crate::error::{ConfigError, UpdaterError, UpdaterResult};
use crate::reconcile::Reconciler;
use crate::store::EventStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Update,
    Idle,
}

impl fmt::Display for ControllerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControllerState::Update => write!(f, "update"),
            ControllerState::Idle => write!(f, "idle"),
        }
    }
}

/// How the control loop ended, when it ended normally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    /// Single cycle finished (no frequency configured).
    Completed,
    Cancelled,
}

#[derive(Debug, Default)]
pub struct CycleReport {
    pub branches: Vec<BranchReport>,
    /// Branches skipped because shutdown was requested mid-cycle.
    pub skipped: usize,
}

impl CycleReport {
    pub fn failures(&self) -> usize {
        self.branches.iter().filter(|b| b.is_failure()).count()
    }
}

pub struct UpdateController<F> {
    branches: Vec<Branch>,
    downloader: Downloader<F>,
    reconciler: Arc<Reconciler>,
    interval: Option<Duration>,
    error_tolerance: u32,
    consecutive_errors: u32,
    state: ControllerState,
}

impl UpdateController<HttpFetcher> {
    /// Build the controller for validated settings. Compiles every parser,
    /// so unknown modes and malformed patterns surface here.
    pub fn from_settings(settings: &Settings, store: Arc<dyn EventStore>) -> Result<Self, ConfigError> {
        let branches = settings
            .branches
            .iter()
            .enumerate()
            .map(|(i, branch)| Branch::from_settings(&format!("branches[{i}]"), branch))
            .collect::<Result<Vec<_>, _>>()?;

        let downloader = Downloader::new(
            HttpFetcher::new(settings.updater.timeout()),
            RetryPolicy::from(&settings.updater),
        );

        Ok(UpdateController::new(
            branches,
            downloader,
            Reconciler::new(store),
            settings.updater.interval(),
            settings.updater.error_tolerance,
        ))
    }
}

impl<F: Fetch> UpdateController<F> {
    pub fn new(
        branches: Vec<Branch>,
        downloader: Downloader<F>,
        reconciler: Reconciler,
        interval: Option<Duration>,
        error_tolerance: u32,
    ) -> Self {
        UpdateController {
            branches,
            downloader,
            reconciler: Arc::new(reconciler),
            interval,
            error_tolerance,
            consecutive_errors: 0,
            state: ControllerState::Update,
        }
    }

    /// Replace the idle interval; `None` runs a single cycle.
    pub fn with_interval(mut self, interval: Option<Duration>) -> Self {
        self.interval = interval;
        self
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn consecutive_errors(&self) -> u32 {
        self.consecutive_errors
    }

    pub fn branches(&self) -> &[Branch] {
        &self.branches
    }

    /// Run every branch once, in configuration order. Shutdown is checked
    /// between branches, never during one.
    pub async fn run_cycle(&mut self, cancel: &CancellationToken) -> CycleReport {
        let now = Utc::now();
        let mut report = CycleReport::default();

        for (i, branch) in self.branches.iter().enumerate() {
            if cancel.is_cancelled() {
                report.skipped = self.branches.len() - i;
                info!(skipped = report.skipped, "shutdown requested, stopping cycle");
                break;
            }
            let mut controller =
                BranchController::new(branch, &self.downloader, Arc::clone(&self.reconciler));
            report.branches.push(controller.run(now).await);
        }

        report
    }

    /// Alternate between `Update` and `Idle` until the loop completes, is
    /// cancelled, or the error tolerance is exceeded.
    pub async fn run(&mut self, cancel: CancellationToken) -> UpdaterResult<Exit> {
        loop {
            self.state = ControllerState::Update;
            let report = self.run_cycle(&cancel).await;

            if cancel.is_cancelled() {
                return Ok(Exit::Cancelled);
            }

            let failures = report.failures();
            if failures > 0 {
                self.consecutive_errors += 1;
                warn!(
                    failures,
                    consecutive_errors = self.consecutive_errors,
                    error_tolerance = self.error_tolerance,
                    "cycle finished with failing branches"
                );
            } else {
                self.consecutive_errors = 0;
                info!(branches = report.branches.len(), "cycle finished");
            }

            if self.consecutive_errors > self.error_tolerance {
                error!(
                    consecutive_errors = self.consecutive_errors,
                    "error tolerance exceeded, shutting down"
                );
                return Err(UpdaterError::ToleranceExceeded {
                    consecutive: self.consecutive_errors,
                    tolerance: self.error_tolerance,
                });
            }

            let Some(interval) = self.interval else {
                return Ok(Exit::Completed);
            };

            self.state = ControllerState::Idle;
            debug!(next_cycle_in = %humantime::format_duration(interval), "idle");
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("idle cancelled");
                    return Ok(Exit::Cancelled);
                }
                _ = tokio::time::sleep(interval) => {}
            }
        }
    }
}
