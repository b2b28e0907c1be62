//! Copies caller headers onto an outgoing request.

use std::collections::BTreeMap;

use crate::http::HttpRequest;

/// Caller-supplied header mapping. Keys are unique and iterate in name order.
pub type Headers = BTreeMap<String, String>;

/// Append every entry of `headers` to the request, in iteration order.
///
/// Names and values are copied as opaque strings. Nothing is validated
/// here, so a malformed entry never aborts the call.
pub fn apply_headers(request: &mut HttpRequest, headers: Option<&Headers>) {
    let Some(headers) = headers else {
        return;
    };
    request
        .headers
        .extend(headers.iter().map(|(k, v)| (k.clone(), v.clone())));
}
