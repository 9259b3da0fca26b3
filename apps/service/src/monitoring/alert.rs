use tracing::{info, warn};

use super::types::Check;
use crate::notifications::NotificationGateway;

/// Human-readable alert text for a check that just changed state
pub fn alert_message(check: &Check) -> String {
    format!(
        "Alert: Your check for {} {} is currently {}",
        check.method.as_str().to_uppercase(),
        check.target(),
        check.state
    )
}

/// Send the alert for `check` (already carrying its new state) to its owner.
///
/// Failures are logged and dropped; the next transition sends a fresh alert.
pub async fn dispatch_alert(gateway: &dyn NotificationGateway, check: &Check) -> bool {
    let message = alert_message(check);
    match gateway.send(&check.user_phone, &message).await {
        Ok(()) => {
            info!(check_id = %check.id, "User alerted to status change: {}", message);
            true
        }
        Err(e) => {
            warn!(check_id = %check.id, "Could not alert user to status change: {}", e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitoring::types::{CheckState, HttpMethod, Protocol};
    use crate::testing::RecordingGateway;
    use std::sync::atomic::Ordering;

    fn check() -> Check {
        Check {
            id: "abcdefghij0123456789".to_string(),
            user_phone: "5551234567".to_string(),
            protocol: Protocol::Https,
            url: "example.com/health".to_string(),
            method: HttpMethod::Post,
            success_codes: vec![200],
            timeout_seconds: 2,
            state: CheckState::Up,
            last_checked: Some(1),
        }
    }

    #[test]
    fn test_message_names_method_target_and_state() {
        assert_eq!(
            alert_message(&check()),
            "Alert: Your check for POST https://example.com/health is currently up"
        );
    }

    #[tokio::test]
    async fn test_dispatch_addresses_owner_phone() {
        let gateway = RecordingGateway::default();

        assert!(dispatch_alert(&gateway, &check()).await);

        let sent = gateway.messages();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "5551234567");
        assert!(sent[0].1.ends_with("is currently up"));
    }

    #[tokio::test]
    async fn test_dispatch_failure_is_swallowed() {
        let gateway = RecordingGateway::default();
        gateway.fail.store(true, Ordering::SeqCst);

        assert!(!dispatch_alert(&gateway, &check()).await);
        assert_eq!(gateway.messages().len(), 1);
    }
}
