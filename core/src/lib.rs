//! Generic outbound HTTP request dispatcher.
//!
//! # Overview
//! A caller describes a request declaratively (`RequestDescription`: method,
//! relative URL, headers, body) and gets back a `ResponseEnvelope<T>` with
//! the success flag, raw status and a best-effort decoded payload.
//!
//! # Design
//! - `RequestDispatcher` holds a base URL and a `ClientFactory`, nothing else.
//! - Building (`build_request`) and parsing (`parse_response`) are pure and
//!   work on the plain-data `HttpRequest` / `HttpResponse` types; only an
//!   `HttpClient` touches the network.
//! - Bodies are JSON values, byte buffers, byte streams or field bags for
//!   multipart uploads. The content builder picks exactly one encoding.
//! - Decode failures never become errors; they yield `payload: None`.
//! - No retries, no timeouts of its own, no concurrency limits.

pub mod body;
pub mod client;
pub mod config;
pub mod content;
pub mod error;
pub mod headers;
pub mod http;
pub mod request;
pub mod response;
pub mod transport;

pub use body::{ByteStream, FieldBag, FieldValue, FileUpload, FormFile, RequestBody};
pub use client::RequestDispatcher;
pub use config::{ClientConfig, DispatcherConfig};
pub use content::{Content, ContentPart, MultipartContent, PartBody, DEFAULT_MEDIA_TYPE};
pub use error::DispatchError;
pub use headers::Headers;
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use request::RequestDescription;
pub use response::ResponseEnvelope;
pub use transport::{ClientFactory, HttpClient, ReqwestClient, ReqwestClientFactory};
