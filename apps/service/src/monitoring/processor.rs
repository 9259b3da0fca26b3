//! Outcome processing: classify a probe, record it, persist the new state
//! and alert the owner on transitions.

use tracing::{debug, error, info, warn};

use super::alert::dispatch_alert;
use super::types::{Check, CheckState, LogEntry, Outcome};
use super::worker::Worker;
use crate::database::CHECKS;
use crate::logs::LogStore;

/// What happened to one check after its probe completed
#[derive(Debug, Clone)]
pub struct Processed {
    /// The check with its new state and `last_checked`
    pub check: Check,
    pub entry: LogEntry,
    pub logged: bool,
    pub persisted: bool,
    /// `Some(sent)` when the transition called for an alert
    pub alert: Option<bool>,
}

/// `up` only for a response whose code is one of the check's success codes
pub fn classify(check: &Check, outcome: &Outcome) -> CheckState {
    match (&outcome.error, outcome.response_code) {
        (None, Some(code)) if check.success_codes.contains(&code) => CheckState::Up,
        _ => CheckState::Down,
    }
}

/// A never-probed check only establishes its baseline.
pub fn alert_warranted(check: &Check, new_state: CheckState) -> bool {
    check.last_checked.is_some() && check.state != new_state
}

/// Append `entry` to the log named after its check; failures are logged only.
pub async fn write_log_entry(logs: &dyn LogStore, entry: &LogEntry) -> bool {
    let line = match serde_json::to_string(entry) {
        Ok(line) => line,
        Err(e) => {
            error!(check_id = %entry.check.id, "Could not serialize log entry: {}", e);
            return false;
        }
    };

    match logs.append(&entry.check.id, &line).await {
        Ok(()) => true,
        Err(e) => {
            warn!(check_id = %entry.check.id, "Could not append to check log: {:#}", e);
            false
        }
    }
}

/// Apply `outcome` to `check`.
///
/// Steps run in order: log entry, check update, alert. A failed step is
/// logged and never stops the ones after it.
pub async fn process_outcome(worker: &Worker, check: Check, outcome: Outcome) -> Processed {
    let new_state = classify(&check, &outcome);
    let alert = alert_warranted(&check, new_state);
    let now = chrono::Utc::now().timestamp_millis();

    let entry = LogEntry { check: check.clone(), outcome, state: new_state, alert, time: now };
    let logged = write_log_entry(worker.logs(), &entry).await;

    let updated = Check { state: new_state, last_checked: Some(now), ..check };
    let persisted = persist_check(worker, &updated).await;

    let alert = if alert {
        Some(dispatch_alert(worker.gateway(), &updated).await)
    } else {
        debug!(check_id = %updated.id, state = %new_state, "Check outcome not changed, no alert needed");
        None
    };

    Processed { check: updated, entry, logged, persisted, alert }
}

async fn persist_check(worker: &Worker, check: &Check) -> bool {
    let record = match serde_json::to_value(check) {
        Ok(record) => record,
        Err(e) => {
            error!(check_id = %check.id, "Could not serialize check: {}", e);
            return false;
        }
    };

    match worker.store().update(CHECKS, &check.id, &record).await {
        Ok(()) => {
            info!(check_id = %check.id, state = %check.state, "Check updated");
            true
        }
        Err(e) => {
            error!(check_id = %check.id, "Error trying to save check updates: {:#}", e);
            false
        }
    }
}
