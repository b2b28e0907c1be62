//! Request bodies as supplied by the caller.
//!
//! # Design
//! A body is one of four shapes: a structured JSON value, a raw byte buffer,
//! a byte stream, or a field bag for multipart uploads. The field bag is an
//! explicit ordered list of named fields, each tagged with how it should be
//! encoded, so the content builder never has to inspect a caller's type.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::stream::{self, Stream, TryStreamExt};
use serde::Serialize;
use tokio::io::AsyncRead;
use tokio_util::io::ReaderStream;

use crate::error::DispatchError;

type BoxedStream = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send + Sync>>;

/// A readable stream of body bytes with no declared length.
pub struct ByteStream(BoxedStream);

impl ByteStream {
    pub fn new<S>(stream: S) -> Self
    where
        S: Stream<Item = io::Result<Bytes>> + Send + Sync + 'static,
    {
        Self(Box::pin(stream))
    }

    pub fn from_reader<R>(reader: R) -> Self
    where
        R: AsyncRead + Send + Sync + 'static,
    {
        Self::new(ReaderStream::new(reader))
    }

    /// Single-chunk stream over an in-memory buffer.
    pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
        let chunk: io::Result<Bytes> = Ok(bytes.into());
        Self::new(stream::iter(vec![chunk]))
    }

    /// Drain the stream into one buffer.
    pub async fn read_to_end(self) -> io::Result<Vec<u8>> {
        self.try_fold(Vec::new(), |mut acc, chunk| async move {
            acc.extend_from_slice(&chunk);
            Ok::<_, io::Error>(acc)
        })
        .await
    }
}

impl Stream for ByteStream {
    type Item = io::Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.0.as_mut().poll_next(cx)
    }
}

impl fmt::Debug for ByteStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ByteStream(..)")
    }
}

/// An uploaded file as seen by the multipart encoder.
pub trait FormFile: fmt::Debug + Send + Sync {
    /// Declared filename, sent in the part's `Content-Disposition`.
    fn file_name(&self) -> &str;

    /// Declared media type of the file, if any.
    fn content_type(&self) -> Option<&str>;

    /// Open the file's bytes for reading. Called once, while building content.
    ///
    /// Building content is synchronous, so an implementation may make one
    /// short blocking call here (opening a file). Reads must go through the
    /// returned stream.
    fn open_read_stream(self: Box<Self>) -> io::Result<ByteStream>;
}

#[derive(Debug)]
enum FileSource {
    Memory(Bytes),
    Disk(PathBuf),
}

/// `FormFile` backed by an in-memory buffer or a path on disk.
///
/// Disk files are opened lazily, when the request content is built.
#[derive(Debug)]
pub struct FileUpload {
    source: FileSource,
    file_name: String,
    content_type: Option<String>,
}

impl FileUpload {
    pub fn from_bytes(file_name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            source: FileSource::Memory(bytes.into()),
            file_name: file_name.into(),
            content_type: None,
        }
    }

    /// File on disk; the filename defaults to the last path component.
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            source: FileSource::Disk(path),
            file_name,
            content_type: None,
        }
    }

    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = file_name.into();
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

impl FormFile for FileUpload {
    fn file_name(&self) -> &str {
        &self.file_name
    }

    fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    fn open_read_stream(self: Box<Self>) -> io::Result<ByteStream> {
        match self.source {
            FileSource::Memory(bytes) => Ok(ByteStream::from_bytes(bytes)),
            FileSource::Disk(path) => {
                // Blocking open so a missing file fails the build before any
                // network access; the reads below are async.
                let file = std::fs::File::open(path)?;
                Ok(ByteStream::from_reader(tokio::fs::File::from_std(file)))
            }
        }
    }
}

/// The value of one field in a `FieldBag`, tagged with its encoding.
#[derive(Debug)]
pub enum FieldValue {
    File(Box<dyn FormFile>),
    Stream(ByteStream),
    Bytes(Vec<u8>),
    Text(String),
    /// Skipped when encoding.
    Absent,
}

impl FieldValue {
    /// Text field holding the value's `Display` rendering.
    pub fn display(value: impl fmt::Display) -> Self {
        FieldValue::Text(value.to_string())
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, FieldValue::Absent)
    }
}

impl From<FileUpload> for FieldValue {
    fn from(file: FileUpload) -> Self {
        FieldValue::File(Box::new(file))
    }
}

impl From<Box<dyn FormFile>> for FieldValue {
    fn from(file: Box<dyn FormFile>) -> Self {
        FieldValue::File(file)
    }
}

impl From<ByteStream> for FieldValue {
    fn from(stream: ByteStream) -> Self {
        FieldValue::Stream(stream)
    }
}

impl From<Vec<u8>> for FieldValue {
    fn from(bytes: Vec<u8>) -> Self {
        FieldValue::Bytes(bytes)
    }
}

impl From<String> for FieldValue {
    fn from(text: String) -> Self {
        FieldValue::Text(text)
    }
}

impl From<&str> for FieldValue {
    fn from(text: &str) -> Self {
        FieldValue::Text(text.to_string())
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(FieldValue::Absent, Into::into)
    }
}

/// Ordered list of named fields encoded as `multipart/form-data`.
///
/// Names are not deduplicated: each entry becomes its own part.
#[derive(Debug, Default)]
pub struct FieldBag {
    fields: Vec<(String, FieldValue)>,
}

impl FieldBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    pub fn text(self, name: impl Into<String>, value: impl fmt::Display) -> Self {
        self.field(name, FieldValue::display(value))
    }

    pub fn file(self, name: impl Into<String>, file: impl FormFile + 'static) -> Self {
        self.field(name, FieldValue::File(Box::new(file)))
    }

    pub fn stream(self, name: impl Into<String>, stream: ByteStream) -> Self {
        self.field(name, FieldValue::Stream(stream))
    }

    pub fn bytes(self, name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        self.field(name, FieldValue::Bytes(bytes.into()))
    }

    pub fn push(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) {
        self.fields.push((name.into(), value.into()));
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn into_fields(self) -> Vec<(String, FieldValue)> {
        self.fields
    }

    /// View a JSON object as a bag of text fields, one per top-level key.
    ///
    /// `null` members become absent fields, strings are used verbatim and
    /// anything else uses its JSON rendering. Non-objects have no fields.
    pub fn from_json_object(value: &serde_json::Value) -> Self {
        let mut bag = FieldBag::new();
        if let serde_json::Value::Object(map) = value {
            for (name, member) in map {
                let field = match member {
                    serde_json::Value::Null => FieldValue::Absent,
                    serde_json::Value::String(s) => FieldValue::Text(s.clone()),
                    other => FieldValue::Text(other.to_string()),
                };
                bag.push(name.clone(), field);
            }
        }
        bag
    }
}

/// Body of a `RequestDescription`.
#[derive(Debug)]
pub enum RequestBody {
    /// JSON text of a serialized value, sent byte for byte.
    Structured(String),
    Bytes(Vec<u8>),
    Stream(ByteStream),
    Form(FieldBag),
}

impl RequestBody {
    /// Serialize `value` once, with `serde_json`'s default settings.
    ///
    /// The text is kept as produced, so numbers keep their own precision
    /// (`f32`, `u128`) and fields keep their declaration order.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self, DispatchError> {
        Ok(RequestBody::Structured(serde_json::to_string(value)?))
    }
}

impl From<serde_json::Value> for RequestBody {
    fn from(value: serde_json::Value) -> Self {
        RequestBody::Structured(value.to_string())
    }
}

impl From<Vec<u8>> for RequestBody {
    fn from(bytes: Vec<u8>) -> Self {
        RequestBody::Bytes(bytes)
    }
}

impl From<ByteStream> for RequestBody {
    fn from(stream: ByteStream) -> Self {
        RequestBody::Stream(stream)
    }
}

impl From<FieldBag> for RequestBody {
    fn from(bag: FieldBag) -> Self {
        RequestBody::Form(bag)
    }
}
