//! The request dispatcher.
//!
//! # Design
//! `RequestDispatcher` holds only a base URL and a client factory and keeps
//! no mutable state between calls, so one instance can serve any number of
//! concurrent tasks. A call is a straight pipeline split around a single
//! I/O boundary:
//!
//! - `build_request` validates the description, resolves the URL, builds the
//!   content and applies the headers. Pure, no network.
//! - the factory's client sends the `HttpRequest`.
//! - `parse_response` normalizes the `HttpResponse` into an envelope. Pure.
//!
//! `send_request` chains the three. The client is created inside the call
//! and dropped when it returns, whatever the outcome.

use serde::de::DeserializeOwned;
use url::Url;

use crate::config::DispatcherConfig;
use crate::content::build_content;
use crate::error::DispatchError;
use crate::headers::apply_headers;
use crate::http::{HttpRequest, HttpResponse};
use crate::request::RequestDescription;
use crate::response::{normalize, ResponseEnvelope};
use crate::transport::{ClientFactory, HttpClient, ReqwestClientFactory};

/// Sends `RequestDescription`s relative to a base URL.
#[derive(Debug, Clone)]
pub struct RequestDispatcher<F = ReqwestClientFactory> {
    base_url: Url,
    factory: F,
}

impl RequestDispatcher<ReqwestClientFactory> {
    /// Dispatcher with a reqwest factory built from `config`.
    pub fn from_config(config: &DispatcherConfig) -> Result<Self, DispatchError> {
        let factory = ReqwestClientFactory::from_config(&config.client)?;
        Self::new(&config.base_url, factory)
    }
}

impl<F: ClientFactory> RequestDispatcher<F> {
    /// `base_url` must be an absolute URL that relative references can be
    /// resolved against.
    pub fn new(base_url: &str, factory: F) -> Result<Self, DispatchError> {
        let parsed = Url::parse(base_url).map_err(|e| DispatchError::InvalidBaseUrl {
            url: base_url.to_string(),
            reason: e.to_string(),
        })?;
        if parsed.cannot_be_a_base() {
            return Err(DispatchError::InvalidBaseUrl {
                url: base_url.to_string(),
                reason: "URL cannot be used as a base".to_string(),
            });
        }
        Ok(Self {
            base_url: parsed,
            factory,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }

    /// Build the outgoing request without sending it.
    ///
    /// Fails with `InvalidArgument` on an empty `relative_url` before any
    /// other work is done.
    pub fn build_request(&self, request: RequestDescription) -> Result<HttpRequest, DispatchError> {
        let RequestDescription {
            relative_url,
            method,
            headers,
            body,
            media_type,
            is_form_data,
        } = request;

        if relative_url.is_empty() {
            return Err(DispatchError::InvalidArgument {
                name: "relative_url",
                reason: "relative URL cannot be empty".to_string(),
            });
        }

        let url = self.resolve(&relative_url)?;
        let mut http_request = HttpRequest::new(method, url);

        if let Some(body) = body {
            http_request.content = Some(build_content(body, is_form_data, media_type.as_deref())?);
        }

        apply_headers(&mut http_request, headers.as_ref());
        Ok(http_request)
    }

    /// Normalize a response into an envelope. Never fails.
    pub fn parse_response<T: DeserializeOwned>(&self, response: &HttpResponse) -> ResponseEnvelope<T> {
        normalize(response)
    }

    /// Build, send and normalize one request.
    ///
    /// Validation, content and transport failures are returned as errors.
    /// A response body that does not decode as `T` is not an error: the
    /// envelope comes back with `payload: None`.
    #[tracing::instrument(
        skip_all,
        fields(method = %request.method, relative_url = %request.relative_url)
    )]
    pub async fn send_request<T: DeserializeOwned>(
        &self,
        request: RequestDescription,
    ) -> Result<ResponseEnvelope<T>, DispatchError> {
        let http_request = self.build_request(request)?;
        tracing::debug!(url = %http_request.url, "dispatching");

        let client = self.factory.create_client();
        let response = client.send(http_request).await?;
        Ok(self.parse_response(&response))
    }

    /// RFC 3986 reference resolution against the base URL. An absolute
    /// `relative_url` replaces the base entirely.
    fn resolve(&self, relative_url: &str) -> Result<Url, DispatchError> {
        self.base_url
            .join(relative_url)
            .map_err(|e| DispatchError::InvalidUrl {
                url: relative_url.to_string(),
                reason: e.to_string(),
            })
    }
}
