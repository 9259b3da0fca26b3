use anyhow::Result;
use std::error::Error as StdError;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::debug;
use url::Url;

use super::types::{Check, Outcome};

/// Checker trait for probing a check target
#[async_trait::async_trait]
pub trait Checker: Send + Sync {
    /// Perform exactly one probe of the check's target.
    ///
    /// Never fails: transport errors and timeouts are reported through the
    /// returned [`Outcome`].
    async fn probe(&self, check: &Check) -> Outcome;
}

/// Single-assignment slot for the result of one probe.
///
/// Several events race to finish a probe (response, transport error,
/// timer). Only the first [`commit`](Completion::commit) is delivered.
pub struct Completion<T> {
    slot: Mutex<Option<oneshot::Sender<T>>>,
}

impl<T> Completion<T> {
    pub fn new() -> (Arc<Self>, oneshot::Receiver<T>) {
        let (tx, rx) = oneshot::channel();
        (Arc::new(Self { slot: Mutex::new(Some(tx)) }), rx)
    }

    /// Returns `false` when another event already completed the probe.
    pub fn commit(&self, value: T) -> bool {
        let sender = self.slot.lock().unwrap_or_else(PoisonError::into_inner).take();
        match sender {
            Some(tx) => {
                // The receiver may be gone if the caller stopped waiting.
                let _ = tx.send(value);
                true
            }
            None => false,
        }
    }
}

/// Build the URL a check is probed at: host, port, path and query of
/// `<protocol>://<url>`.
pub fn probe_target(check: &Check) -> Result<Url, String> {
    let raw = check.target();
    let mut url = Url::parse(&raw).map_err(|e| format!("invalid target {raw}: {e}"))?;

    if url.host_str().is_none_or(str::is_empty) {
        return Err(format!("target {raw} has no host"));
    }
    url.set_fragment(None);

    Ok(url)
}

/// HTTP/HTTPS checker
pub struct HttpChecker {
    client: reqwest::Client,
}

impl HttpChecker {
    pub fn new() -> Result<Self> {
        // Redirects are reported as-is so a 301 can be listed in successCodes.
        let client = reqwest::Client::builder()
            .user_agent(concat!("uppe-worker/", env!("CARGO_PKG_VERSION")))
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl Checker for HttpChecker {
    async fn probe(&self, check: &Check) -> Outcome {
        let timeout_ms = check.timeout_seconds * 1000;
        let timeout = Duration::from_millis(timeout_ms);

        let target = match probe_target(check) {
            Ok(target) => target,
            Err(detail) => return Outcome::transport_error(detail),
        };

        let (completion, outcome_rx) = Completion::new();

        let request = self.client.request(check.method.into(), target).timeout(timeout);
        let on_response = Arc::clone(&completion);
        let check_id = check.id.clone();
        // Not awaited; the per-request timeout bounds it.
        let _request_task = tokio::spawn(async move {
            let outcome = match request.send().await {
                Ok(response) => Outcome::response(response.status().as_u16()),
                Err(e) if e.is_timeout() => Outcome::timeout(timeout_ms),
                Err(e) => Outcome::transport_error(error_chain(&e)),
            };

            if !on_response.commit(outcome) {
                debug!(check_id = %check_id, "Ignoring probe result that arrived after the timeout");
            }
        });

        let on_timeout = Arc::clone(&completion);
        let check_id = check.id.clone();
        let timer_task = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            if !on_timeout.commit(Outcome::timeout(timeout_ms)) {
                debug!(check_id = %check_id, "Probe already completed before its timer fired");
            }
        });

        let outcome = outcome_rx
            .await
            .unwrap_or_else(|_| Outcome::transport_error("probe finished without an outcome"));
        timer_task.abort();

        outcome
    }
}

/// `reqwest` hides the interesting part (DNS, refused, TLS) in the source chain.
fn error_chain(error: &reqwest::Error) -> String {
    let mut detail = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        detail.push_str(": ");
        detail.push_str(&cause.to_string());
        source = cause.source();
    }
    detail
}
