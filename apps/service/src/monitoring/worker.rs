use futures::future::join_all;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

use super::checker::Checker;
use super::processor::{Processed, process_outcome};
use super::rotation::{RotationReport, rotate_logs};
use super::validation::validate_check;
use crate::database::{CHECKS, DataStore};
use crate::logs::LogStore;
use crate::notifications::NotificationGateway;

/// Long-lived worker context.
///
/// Built once at startup and cloned into every task; clones share the same
/// stores, gateway and checker.
#[derive(Clone)]
pub struct Worker {
    store: Arc<dyn DataStore>,
    logs: Arc<dyn LogStore>,
    gateway: Arc<dyn NotificationGateway>,
    checker: Arc<dyn Checker>,
    probe_permits: Option<Arc<Semaphore>>,
}

/// Result of one check within a sweep
#[derive(Debug)]
pub enum CheckRun {
    Processed(Box<Processed>),
    /// Record failed validation; left untouched until the next sweep
    Invalid,
    /// Listed but gone by the time it was read
    Vanished,
    ReadFailed,
}

/// Per-sweep tally, mostly for the log line at the end of a sweep
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepSummary {
    pub listed: usize,
    pub probed: usize,
    pub up: usize,
    pub down: usize,
    pub alerts: usize,
    pub invalid: usize,
    pub vanished: usize,
    pub failed: usize,
    /// Processed checks whose log entry could not be written
    pub unlogged: usize,
    /// Processed checks whose new state could not be saved
    pub unsaved: usize,
}

impl SweepSummary {
    fn record(&mut self, run: &CheckRun) {
        match run {
            CheckRun::Processed(processed) => {
                self.probed += 1;
                match processed.check.state {
                    super::types::CheckState::Up => self.up += 1,
                    super::types::CheckState::Down => self.down += 1,
                }
                if processed.alert.is_some() {
                    self.alerts += 1;
                }
                if !processed.logged {
                    self.unlogged += 1;
                }
                if !processed.persisted {
                    self.unsaved += 1;
                }
            }
            CheckRun::Invalid => self.invalid += 1,
            CheckRun::Vanished => self.vanished += 1,
            CheckRun::ReadFailed => self.failed += 1,
        }
    }
}

impl Worker {
    pub fn new(
        store: Arc<dyn DataStore>,
        logs: Arc<dyn LogStore>,
        gateway: Arc<dyn NotificationGateway>,
        checker: Arc<dyn Checker>,
    ) -> Self {
        Self { store, logs, gateway, checker, probe_permits: None }
    }

    /// Cap the number of probes in flight across all sweeps
    pub fn with_probe_limit(mut self, limit: Option<usize>) -> Self {
        self.probe_permits = limit.map(|permits| Arc::new(Semaphore::new(permits)));
        self
    }

    pub fn store(&self) -> &dyn DataStore {
        self.store.as_ref()
    }

    pub fn logs(&self) -> &dyn LogStore {
        self.logs.as_ref()
    }

    pub fn gateway(&self) -> &dyn NotificationGateway {
        self.gateway.as_ref()
    }

    /// List every check and run each one in its own task.
    ///
    /// Returns once all of this sweep's checks are done; the scheduler does
    /// not wait for that before starting the next sweep.
    pub async fn sweep(&self) -> SweepSummary {
        let ids = match self.store.list(CHECKS).await {
            Ok(ids) => ids,
            Err(e) => {
                error!("Could not list checks: {:#}", e);
                return SweepSummary::default();
            }
        };

        if ids.is_empty() {
            warn!("No checks to process");
            return SweepSummary::default();
        }

        let mut summary = SweepSummary { listed: ids.len(), ..SweepSummary::default() };

        let tasks = ids.into_iter().map(|id| {
            let worker = self.clone();
            tokio::spawn(async move { worker.run_check(id).await })
        });

        for joined in join_all(tasks).await {
            match joined {
                Ok(run) => summary.record(&run),
                Err(e) => {
                    error!("Check task failed: {}", e);
                    summary.failed += 1;
                }
            }
        }

        info!(
            listed = summary.listed,
            up = summary.up,
            down = summary.down,
            alerts = summary.alerts,
            invalid = summary.invalid,
            unlogged = summary.unlogged,
            unsaved = summary.unsaved,
            "Sweep finished"
        );
        summary
    }

    /// Read, validate, probe and process a single check.
    pub async fn run_check(&self, id: String) -> CheckRun {
        let record = match self.store.read(CHECKS, &id).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                debug!(check_id = %id, "Check disappeared before it could be read");
                return CheckRun::Vanished;
            }
            Err(e) => {
                error!(check_id = %id, "Error reading check data: {:#}", e);
                return CheckRun::ReadFailed;
            }
        };

        let check = match validate_check(&record) {
            Ok(check) => check,
            Err(e) => {
                warn!(check_id = %id, "Skipping check: {}", e);
                return CheckRun::Invalid;
            }
        };

        // Updates and log lines are keyed by the record's own id.
        if check.id != id {
            warn!(check_id = %id, record_id = %check.id, "Skipping check stored under another id");
            return CheckRun::Invalid;
        }

        let outcome = {
            let _permit = match &self.probe_permits {
                Some(permits) => Arc::clone(permits).acquire_owned().await.ok(),
                None => None,
            };
            self.checker.probe(&check).await
        };

        let processed = process_outcome(self, check, outcome).await;
        debug!(
            check_id = %id,
            state = %processed.check.state,
            response_code = ?processed.entry.outcome.response_code,
            error = ?processed.entry.outcome.error,
            "Check processed"
        );
        CheckRun::Processed(Box::new(processed))
    }

    /// One rotation pass over every live log
    pub async fn rotate_logs(&self) -> RotationReport {
        rotate_logs(self.logs.as_ref()).await
    }
}
