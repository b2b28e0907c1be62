//! Uniform response envelope and the normalizer that builds it.
//!
//! # Design
//! Normalization is best-effort. A body that fails to decode as `T` (empty,
//! malformed, or the wrong shape) yields an envelope whose `payload` is
//! `None` while `success` and `status_code` still describe the wire
//! response. Callers therefore cannot tell "no body" from "unreadable body";
//! existing callers rely on that, so decode errors are only logged.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::http::HttpResponse;

/// Status, success flag and decoded payload of one call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseEnvelope<T> {
    /// Status was in `200..=299`.
    pub success: bool,
    pub status_code: u16,
    pub payload: Option<T>,
}

impl<T> ResponseEnvelope<T> {
    pub fn new(success: bool, status_code: u16, payload: Option<T>) -> Self {
        Self {
            success,
            status_code,
            payload,
        }
    }
}

/// Decode `response` as JSON into `T` and wrap it.
///
/// A JSON `null` body decodes to an absent payload.
pub fn normalize<T: DeserializeOwned>(response: &HttpResponse) -> ResponseEnvelope<T> {
    let success = response.is_success();
    let payload = match serde_json::from_slice::<Option<T>>(&response.body) {
        Ok(payload) => payload,
        Err(err) => {
            tracing::debug!(
                status = response.status,
                body_len = response.body.len(),
                error = %err,
                "response body did not decode, returning empty payload"
            );
            None
        }
    };
    ResponseEnvelope::new(success, response.status, payload)
}
