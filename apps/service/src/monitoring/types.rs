use serde::{Deserialize, Serialize};
use std::fmt;

/// Transport used to reach a check target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Http,
    Https,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Http => "http",
            Protocol::Https => "https",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// HTTP method a check probes with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "get",
            HttpMethod::Post => "post",
            HttpMethod::Put => "put",
            HttpMethod::Delete => "delete",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<HttpMethod> for reqwest::Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Delete => reqwest::Method::DELETE,
        }
    }
}

/// Classified health of a check
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckState {
    Up,
    /// Never-probed checks start out down
    #[default]
    Down,
}

impl fmt::Display for CheckState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckState::Up => write!(f, "up"),
            CheckState::Down => write!(f, "down"),
        }
    }
}

/// A validated check, as handed to the probe executor.
///
/// Field names serialize in the camelCase layout the check records are
/// stored in, so an updated check can be written straight back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Check {
    pub id: String,
    pub user_phone: String,
    pub protocol: Protocol,
    pub url: String,
    pub method: HttpMethod,
    pub success_codes: Vec<u16>,
    pub timeout_seconds: u64,
    pub state: CheckState,
    /// Epoch millis of the last completed probe
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_checked: Option<i64>,
}

impl Check {
    /// Full target address, e.g. `https://example.com/health?deep=1`
    pub fn target(&self) -> String {
        format!("{}://{}", self.protocol, self.url)
    }
}

/// Why a probe did not produce a response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeErrorKind {
    Transport,
    Timeout,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeError {
    pub kind: ProbeErrorKind,
    pub detail: String,
}

/// Raw result of a single probe attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Outcome {
    pub error: Option<ProbeError>,
    pub response_code: Option<u16>,
}

impl Outcome {
    pub fn response(status: u16) -> Self {
        Self { error: None, response_code: Some(status) }
    }

    pub fn transport_error(detail: impl Into<String>) -> Self {
        Self {
            error: Some(ProbeError { kind: ProbeErrorKind::Transport, detail: detail.into() }),
            response_code: None,
        }
    }

    pub fn timeout(timeout_ms: u64) -> Self {
        Self {
            error: Some(ProbeError {
                kind: ProbeErrorKind::Timeout,
                detail: format!("no response within {timeout_ms}ms"),
            }),
            response_code: None,
        }
    }
}

/// One line of a check's outcome log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// The check as it was before this probe was applied
    pub check: Check,
    pub outcome: Outcome,
    pub state: CheckState,
    #[serde(rename = "alertTriggered")]
    pub alert: bool,
    /// Epoch millis at which the outcome was processed
    pub time: i64,
}
