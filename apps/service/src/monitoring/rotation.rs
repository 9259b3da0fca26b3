//! Log rotation.
//!
//! Each pass moves the current contents of every live log into a new
//! timestamped archive and empties the live log. A live log is only
//! truncated after its archive was written, so a failed compression loses
//! nothing; the same lines simply land in the next archive as well.

use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::logs::{LogKind, LogStore};

/// Outcome of one rotation pass
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RotationReport {
    pub rotated: Vec<String>,
    /// Empty live logs, left alone
    pub skipped: Vec<String>,
    pub failed: Vec<String>,
}

enum Rotation {
    Archived,
    Empty,
    Failed,
}

/// Archive name for `log` rotated at `now_ms`
pub fn archive_name(log: &str, now_ms: i64) -> String {
    format!("{log}-{now_ms}")
}

/// Rotate every live log in `logs`.
pub async fn rotate_logs(logs: &dyn LogStore) -> RotationReport {
    let names = match logs.list(LogKind::Live).await {
        Ok(names) => names,
        Err(e) => {
            warn!("Could not find any logs to rotate: {:#}", e);
            return RotationReport::default();
        }
    };

    let now_ms = chrono::Utc::now().timestamp_millis();
    let results = join_all(names.into_iter().map(|name| async move {
        let rotation = rotate_one(logs, &name, &archive_name(&name, now_ms)).await;
        (name, rotation)
    }))
    .await;

    let mut report = RotationReport::default();
    for (name, rotation) in results {
        match rotation {
            Rotation::Archived => report.rotated.push(name),
            Rotation::Empty => report.skipped.push(name),
            Rotation::Failed => report.failed.push(name),
        }
    }

    info!(
        rotated = report.rotated.len(),
        skipped = report.skipped.len(),
        failed = report.failed.len(),
        "Log rotation finished"
    );
    report
}

async fn rotate_one(logs: &dyn LogStore, name: &str, archive: &str) -> Rotation {
    match logs.compress(name, archive).await {
        Ok(true) => {}
        Ok(false) => {
            debug!(log = name, "Log is empty, nothing to archive");
            return Rotation::Empty;
        }
        Err(e) => {
            warn!(log = name, "Error compressing log, leaving it in place: {:#}", e);
            return Rotation::Failed;
        }
    }

    match logs.truncate(name).await {
        Ok(()) => {
            debug!(log = name, archive, "Log rotated");
            Rotation::Archived
        }
        Err(e) => {
            warn!(log = name, "Error truncating log after compression: {:#}", e);
            Rotation::Failed
        }
    }
}
