//! Wire-ready request content and the builder that produces it.
//!
//! # Design
//! `build_content` turns a `RequestBody` into exactly one `Content` value.
//! The encoding is chosen by a fixed precedence, first match wins:
//!
//! 1. form data (the flag is set, or the body is a `FieldBag`) → multipart
//! 2. byte stream → streamed content without a declared length
//! 3. byte buffer → byte-array content
//! 4. anything else → JSON text tagged with the media type
//!
//! Content is still plain data. Only the transport turns it into bytes on a
//! socket, so tests can inspect every part without a server.

use crate::body::{ByteStream, FieldBag, FieldValue, RequestBody};
use crate::error::DispatchError;

/// Media type for structured bodies when the caller does not override it.
pub const DEFAULT_MEDIA_TYPE: &str = "application/json";

/// Media type of a field-bag body. The transport appends the boundary.
pub const MULTIPART_MEDIA_TYPE: &str = "multipart/form-data";

/// Request content ready to be handed to a transport.
#[derive(Debug)]
pub enum Content {
    /// UTF-8 text sent with `Content-Type: <media_type>; charset=utf-8`.
    Text { text: String, media_type: String },
    /// Raw bytes with a known length and no declared media type.
    Bytes(Vec<u8>),
    /// Streamed bytes with no declared length.
    Stream(ByteStream),
    Multipart(MultipartContent),
}

impl Content {
    /// Media type the content will be sent with, if it declares one.
    pub fn media_type(&self) -> Option<&str> {
        match self {
            Content::Text { media_type, .. } => Some(media_type.as_str()),
            Content::Multipart(_) => Some(MULTIPART_MEDIA_TYPE),
            Content::Bytes(_) | Content::Stream(_) => None,
        }
    }
}

/// A `multipart/form-data` body.
#[derive(Debug, Default)]
pub struct MultipartContent {
    pub parts: Vec<ContentPart>,
}

impl MultipartContent {
    /// First part named `name`.
    pub fn part(&self, name: &str) -> Option<&ContentPart> {
        self.parts.iter().find(|p| p.name == name)
    }
}

/// One named part of a multipart body.
#[derive(Debug)]
pub struct ContentPart {
    pub name: String,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub body: PartBody,
}

impl ContentPart {
    fn new(name: String, body: PartBody) -> Self {
        Self {
            name,
            file_name: None,
            content_type: None,
            body,
        }
    }
}

#[derive(Debug)]
pub enum PartBody {
    Stream(ByteStream),
    Bytes(Vec<u8>),
    Text(String),
}

/// Encode `body` as request content.
///
/// `media_type` only applies to structured bodies and defaults to
/// [`DEFAULT_MEDIA_TYPE`].
pub fn build_content(
    body: RequestBody,
    is_form_data: bool,
    media_type: Option<&str>,
) -> Result<Content, DispatchError> {
    let content = match body {
        RequestBody::Form(bag) => Content::Multipart(build_multipart(bag)?),
        body if is_form_data => Content::Multipart(build_multipart(fields_of(body)?)?),
        RequestBody::Stream(stream) => Content::Stream(stream),
        RequestBody::Bytes(bytes) => Content::Bytes(bytes),
        RequestBody::Structured(text) => Content::Text {
            text,
            media_type: media_type.unwrap_or(DEFAULT_MEDIA_TYPE).to_string(),
        },
    };
    Ok(content)
}

/// Fields of a body that was flagged as form data without being a bag.
fn fields_of(body: RequestBody) -> Result<FieldBag, DispatchError> {
    let bag = match body {
        RequestBody::Form(bag) => bag,
        RequestBody::Structured(text) => FieldBag::from_json_object(&serde_json::from_str(&text)?),
        RequestBody::Bytes(_) | RequestBody::Stream(_) => FieldBag::new(),
    };
    Ok(bag)
}

fn build_multipart(bag: FieldBag) -> Result<MultipartContent, DispatchError> {
    let mut multipart = MultipartContent::default();
    for (name, value) in bag.into_fields() {
        let part = match value {
            FieldValue::Absent => continue,
            FieldValue::File(file) => {
                let file_name = file.file_name().to_string();
                let content_type = file
                    .content_type()
                    .filter(|ct| !ct.is_empty())
                    .map(str::to_string);
                let stream = file.open_read_stream()?;
                ContentPart {
                    name,
                    file_name: Some(file_name),
                    content_type,
                    body: PartBody::Stream(stream),
                }
            }
            FieldValue::Stream(stream) => ContentPart::new(name, PartBody::Stream(stream)),
            FieldValue::Bytes(bytes) => ContentPart::new(name, PartBody::Bytes(bytes)),
            FieldValue::Text(text) => ContentPart::new(name, PartBody::Text(text)),
        };
        multipart.parts.push(part);
    }
    Ok(multipart)
}
