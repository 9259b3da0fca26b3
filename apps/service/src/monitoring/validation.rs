//! Validation of raw check records read from the data store.
//!
//! Records arrive as untyped JSON. Every required field is checked on its
//! own, so a rejection names all of the fields that failed rather than the
//! first one. `state` and `lastChecked` are optional and fall back to
//! `down` / never-probed.

use serde_json::{Map, Value};
use thiserror::Error;

use super::types::{Check, CheckState, HttpMethod, Protocol};

const ID_LENGTH: usize = 20;
const PHONE_LENGTH: usize = 10;
const MIN_TIMEOUT_SECONDS: u64 = 1;
const MAX_TIMEOUT_SECONDS: u64 = 5;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("check record is not a JSON object")]
    NotAnObject,

    #[error("check record has invalid fields: {}", .0.join(", "))]
    InvalidFields(Vec<&'static str>),
}

/// Turn a raw record into a usable [`Check`], or say why it is not one.
pub fn validate_check(record: &Value) -> Result<Check, ValidationError> {
    let fields = record.as_object().ok_or(ValidationError::NotAnObject)?;
    let mut invalid = Vec::new();

    let id = required(&mut invalid, "id", parse_id(fields));
    let user_phone = required(&mut invalid, "userPhone", parse_phone(fields));
    let protocol = required(&mut invalid, "protocol", parse_protocol(fields));
    let url = required(&mut invalid, "url", parse_url(fields));
    let method = required(&mut invalid, "method", parse_method(fields));
    let success_codes = required(&mut invalid, "successCodes", parse_success_codes(fields));
    let timeout_seconds = required(&mut invalid, "timeoutSeconds", parse_timeout(fields));

    match (id, user_phone, protocol, url, method, success_codes, timeout_seconds) {
        (
            Some(id),
            Some(user_phone),
            Some(protocol),
            Some(url),
            Some(method),
            Some(success_codes),
            Some(timeout_seconds),
        ) => Ok(Check {
            id,
            user_phone,
            protocol,
            url,
            method,
            success_codes,
            timeout_seconds,
            state: parse_state(fields),
            last_checked: parse_last_checked(fields),
        }),
        _ => Err(ValidationError::InvalidFields(invalid)),
    }
}

fn required<T>(invalid: &mut Vec<&'static str>, name: &'static str, value: Option<T>) -> Option<T> {
    if value.is_none() {
        invalid.push(name);
    }
    value
}

fn trimmed_str<'a>(fields: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    fields.get(key).and_then(Value::as_str).map(str::trim)
}

fn parse_id(fields: &Map<String, Value>) -> Option<String> {
    trimmed_str(fields, "id").filter(|id| id.chars().count() == ID_LENGTH).map(str::to_string)
}

fn parse_phone(fields: &Map<String, Value>) -> Option<String> {
    trimmed_str(fields, "userPhone")
        .filter(|phone| phone.len() == PHONE_LENGTH && phone.bytes().all(|b| b.is_ascii_digit()))
        .map(str::to_string)
}

fn parse_protocol(fields: &Map<String, Value>) -> Option<Protocol> {
    match fields.get("protocol").and_then(Value::as_str)? {
        "http" => Some(Protocol::Http),
        "https" => Some(Protocol::Https),
        _ => None,
    }
}

fn parse_url(fields: &Map<String, Value>) -> Option<String> {
    trimmed_str(fields, "url").filter(|url| !url.is_empty()).map(str::to_string)
}

fn parse_method(fields: &Map<String, Value>) -> Option<HttpMethod> {
    match fields.get("method").and_then(Value::as_str)? {
        "get" => Some(HttpMethod::Get),
        "post" => Some(HttpMethod::Post),
        "put" => Some(HttpMethod::Put),
        "delete" => Some(HttpMethod::Delete),
        _ => None,
    }
}

fn parse_success_codes(fields: &Map<String, Value>) -> Option<Vec<u16>> {
    let codes = fields.get("successCodes")?.as_array()?;
    if codes.is_empty() {
        return None;
    }

    codes
        .iter()
        .map(|code| whole_number(code).and_then(|n| u16::try_from(n).ok()))
        .collect()
}

fn parse_timeout(fields: &Map<String, Value>) -> Option<u64> {
    fields
        .get("timeoutSeconds")
        .and_then(whole_number)
        .filter(|secs| (MIN_TIMEOUT_SECONDS..=MAX_TIMEOUT_SECONDS).contains(secs))
}

fn parse_state(fields: &Map<String, Value>) -> CheckState {
    match fields.get("state").and_then(Value::as_str) {
        Some("up") => CheckState::Up,
        _ => CheckState::Down,
    }
}

fn parse_last_checked(fields: &Map<String, Value>) -> Option<i64> {
    fields
        .get("lastChecked")
        .and_then(|value| value.as_i64().or_else(|| value.as_f64().map(|ms| ms as i64)))
        .filter(|ms| *ms > 0)
}

/// Accept `3` and `3.0`, reject `3.5` and negatives.
fn whole_number(value: &Value) -> Option<u64> {
    value.as_u64().or_else(|| {
        value.as_f64().filter(|n| n.fract() == 0.0 && *n >= 0.0 && *n <= u64::MAX as f64).map(|n| n as u64)
    })
}
