//! Caller-side description of one outbound call.

use crate::body::{FieldBag, RequestBody};
use crate::headers::Headers;
use crate::http::HttpMethod;

/// Everything needed to issue one request, consumed by the dispatch call.
///
/// `relative_url` is resolved against the dispatcher's base URL and must not
/// be empty.
#[derive(Debug)]
pub struct RequestDescription {
    pub relative_url: String,
    pub method: HttpMethod,
    pub headers: Option<Headers>,
    pub body: Option<RequestBody>,
    /// Overrides the media type of a structured body.
    pub media_type: Option<String>,
    /// Encode the body as `multipart/form-data`.
    pub is_form_data: bool,
}

impl RequestDescription {
    pub fn new(method: HttpMethod, relative_url: impl Into<String>) -> Self {
        Self {
            relative_url: relative_url.into(),
            method,
            headers: None,
            body: None,
            media_type: None,
            is_form_data: false,
        }
    }

    pub fn get(relative_url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, relative_url)
    }

    pub fn post(relative_url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, relative_url)
    }

    pub fn put(relative_url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Put, relative_url)
    }

    pub fn patch(relative_url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Patch, relative_url)
    }

    pub fn delete(relative_url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Delete, relative_url)
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .get_or_insert_with(Headers::new)
            .insert(name.into(), value.into());
        self
    }

    pub fn headers(mut self, headers: Headers) -> Self {
        self.headers = Some(headers);
        self
    }

    pub fn body(mut self, body: impl Into<RequestBody>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Multipart body; also sets `is_form_data`.
    pub fn form(mut self, bag: FieldBag) -> Self {
        self.body = Some(RequestBody::Form(bag));
        self.is_form_data = true;
        self
    }

    pub fn media_type(mut self, media_type: impl Into<String>) -> Self {
        self.media_type = Some(media_type.into());
        self
    }

    pub fn form_data(mut self, is_form_data: bool) -> Self {
        self.is_form_data = is_form_data;
        self
    }
}
