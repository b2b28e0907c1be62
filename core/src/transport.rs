//! Transport seam: a factory hands out one client per call, the client
//! turns an `HttpRequest` into an `HttpResponse`.
//!
//! # Design
//! `RequestDispatcher` never owns a connection. For every call it asks its
//! `ClientFactory` for a client, sends through it and drops it when the call
//! ends, on success and error paths alike. Pooling, proxies and TLS belong to
//! the factory. The reqwest implementation shares one connection pool
//! across all clients it creates; each client is a cheap handle into it.

use std::future::Future;

use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, ALLOW, CONTENT_DISPOSITION, CONTENT_ENCODING,
    CONTENT_LANGUAGE, CONTENT_LENGTH, CONTENT_LOCATION, CONTENT_RANGE, CONTENT_TYPE, EXPIRES, HOST,
    LAST_MODIFIED, TRANSFER_ENCODING,
};
use reqwest::multipart::{Form, Part};
use url::Url;

use crate::config::ClientConfig;
use crate::content::{Content, MultipartContent, PartBody};
use crate::error::DispatchError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};

/// Sends one request and reads the whole response.
pub trait HttpClient: Send + Sync {
    fn send(
        &self,
        request: HttpRequest,
    ) -> impl Future<Output = Result<HttpResponse, DispatchError>> + Send;
}

/// Provisions a client for a single call.
pub trait ClientFactory: Send + Sync {
    type Client: HttpClient;

    fn create_client(&self) -> Self::Client;
}

/// `ClientFactory` backed by a pooled `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestClientFactory {
    pool: reqwest::Client,
}

impl Default for ReqwestClientFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl ReqwestClientFactory {
    /// Factory with reqwest's default settings.
    pub fn new() -> Self {
        Self {
            pool: reqwest::Client::new(),
        }
    }

    pub fn builder() -> ReqwestClientFactoryBuilder {
        ReqwestClientFactoryBuilder::default()
    }

    /// Share an already configured reqwest client.
    pub fn from_reqwest(client: reqwest::Client) -> Self {
        Self { pool: client }
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self, DispatchError> {
        ReqwestClientFactoryBuilder {
            config: config.clone(),
        }
        .build()
    }
}

impl ClientFactory for ReqwestClientFactory {
    type Client = ReqwestClient;

    fn create_client(&self) -> ReqwestClient {
        ReqwestClient {
            inner: self.pool.clone(),
        }
    }
}

/// Builder for proxy, TLS and user-agent settings of a `ReqwestClientFactory`.
#[derive(Debug, Default)]
pub struct ReqwestClientFactoryBuilder {
    config: ClientConfig,
}

impl ReqwestClientFactoryBuilder {
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = Some(user_agent.into());
        self
    }

    /// Route every request through `url`.
    pub fn proxy(mut self, url: Url) -> Self {
        self.config.proxy = Some(url);
        self
    }

    /// Accept invalid TLS certificates. Test setups only.
    pub fn danger_accept_invalid_certs(mut self, accept: bool) -> Self {
        self.config.accept_invalid_certs = accept;
        self
    }

    pub fn build(self) -> Result<ReqwestClientFactory, DispatchError> {
        let mut builder =
            reqwest::Client::builder().danger_accept_invalid_certs(self.config.accept_invalid_certs);

        if let Some(user_agent) = &self.config.user_agent {
            builder = builder.user_agent(user_agent.as_str());
        }

        if let Some(proxy_url) = &self.config.proxy {
            let proxy = reqwest::Proxy::all(proxy_url.as_str())
                .map_err(|e| DispatchError::Config(format!("invalid proxy `{proxy_url}`: {e}")))?;
            builder = builder.proxy(proxy);
        }

        let pool = builder
            .build()
            .map_err(|e| DispatchError::Config(e.to_string()))?;
        Ok(ReqwestClientFactory { pool })
    }
}

/// Per-call handle into a `ReqwestClientFactory` pool.
#[derive(Debug)]
pub struct ReqwestClient {
    inner: reqwest::Client,
}

impl HttpClient for ReqwestClient {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, DispatchError> {
        let request = to_reqwest(&self.inner, request)?;
        tracing::debug!(method = %request.method(), url = %request.url(), "sending request");

        let response = self.inner.execute(request).await?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(k, v)| {
                (
                    k.as_str().to_string(),
                    String::from_utf8_lossy(v.as_bytes()).into_owned(),
                )
            })
            .collect();
        let body = response.bytes().await?.to_vec();

        tracing::debug!(status, body_len = body.len(), "received response");
        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

fn to_reqwest(
    client: &reqwest::Client,
    request: HttpRequest,
) -> Result<reqwest::Request, DispatchError> {
    let mut builder = client
        .request(to_reqwest_method(request.method), request.url)
        .headers(to_header_map(&request.headers));

    match request.content {
        None => {}
        Some(Content::Text { text, media_type }) => {
            let value = HeaderValue::from_str(&format!("{media_type}; charset=utf-8"))
                .map_err(|_| DispatchError::InvalidContent(format!("media type `{media_type}`")))?;
            builder = builder.header(CONTENT_TYPE, value).body(text);
        }
        Some(Content::Bytes(bytes)) => builder = builder.body(bytes),
        Some(Content::Stream(stream)) => builder = builder.body(reqwest::Body::wrap_stream(stream)),
        Some(Content::Multipart(multipart)) => builder = builder.multipart(to_form(multipart)?),
    }

    builder
        .build()
        .map_err(|e| DispatchError::Transport(e.to_string()))
}

fn to_reqwest_method(method: HttpMethod) -> reqwest::Method {
    match method {
        HttpMethod::Get => reqwest::Method::GET,
        HttpMethod::Post => reqwest::Method::POST,
        HttpMethod::Put => reqwest::Method::PUT,
        HttpMethod::Delete => reqwest::Method::DELETE,
        HttpMethod::Patch => reqwest::Method::PATCH,
        HttpMethod::Head => reqwest::Method::HEAD,
        HttpMethod::Options => reqwest::Method::OPTIONS,
    }
}

/// Content and framing headers. These describe the body or the connection,
/// so only the content and the transport may set them.
const TRANSPORT_OWNED: [HeaderName; 12] = [
    CONTENT_TYPE,
    CONTENT_LENGTH,
    TRANSFER_ENCODING,
    CONTENT_ENCODING,
    CONTENT_DISPOSITION,
    CONTENT_LANGUAGE,
    CONTENT_LOCATION,
    CONTENT_RANGE,
    EXPIRES,
    LAST_MODIFIED,
    ALLOW,
    HOST,
];

/// Headers that can be put on the wire. Anything else is dropped, not fatal.
///
/// Values are taken as raw bytes, so obs-text passes through. Names in
/// `TRANSPORT_OWNED` are dropped even when well formed.
fn to_header_map(headers: &[(String, String)]) -> HeaderMap {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_bytes(value.as_bytes()),
        ) {
            (Ok(name), _) if TRANSPORT_OWNED.contains(&name) => {
                tracing::debug!(header = %name, "header owned by the transport, dropping");
            }
            (Ok(name), Ok(value)) => {
                map.append(name, value);
            }
            _ => tracing::debug!(header = %name, "header cannot be sent, dropping"),
        }
    }
    map
}

fn to_form(multipart: MultipartContent) -> Result<Form, DispatchError> {
    let mut form = Form::new();
    for part in multipart.parts {
        let mut wire = match part.body {
            PartBody::Stream(stream) => Part::stream(reqwest::Body::wrap_stream(stream)),
            PartBody::Bytes(bytes) => Part::bytes(bytes),
            PartBody::Text(text) => Part::text(text),
        };
        if let Some(content_type) = &part.content_type {
            wire = wire.mime_str(content_type).map_err(|e| {
                DispatchError::InvalidContent(format!("part `{}`: {e}", part.name))
            })?;
        }
        if let Some(file_name) = part.file_name {
            wire = wire.file_name(file_name);
        }
        form = form.part(part.name, wire);
    }
    Ok(form)
}
