use crate::{
    error::LookupError,
    request::{HttpVerb, LookupRequest},
};
use reqwest::{Client, StatusCode};
use std::{fmt, time::Duration};
use tracing::debug;

/// A completed HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new<B: Into<String>>(status: u16, body: B) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Canonical reason phrase for the status code.
    #[must_use]
    pub fn reason(&self) -> Option<&'static str> {
        reason_phrase(self.status)
    }
}

impl fmt::Display for HttpResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.reason() {
            Some(reason) => write!(f, "<Response [{} {reason}]>", self.status),
            None => write!(f, "<Response [{}]>", self.status),
        }
    }
}

/// Canonical reason phrase for an HTTP status code.
#[must_use]
pub fn reason_phrase(status: u16) -> Option<&'static str> {
    StatusCode::from_u16(status)
        .ok()
        .and_then(|status| status.canonical_reason())
}

/// Sends lookup requests.
#[cfg_attr(target_arch = "wasm32", async_trait::async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait::async_trait)]
pub trait HttpTransport: Send + Sync {
    /// Issue a `GET` for `request`, giving up after `timeout`.
    async fn get(
        &self,
        request: &LookupRequest,
        timeout: Duration,
    ) -> Result<HttpResponse, LookupError>;
}

/// [`HttpTransport`] backed by a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: Client::builder().build()?,
        })
    }

    #[must_use]
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[cfg_attr(target_arch = "wasm32", async_trait::async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait::async_trait)]
impl HttpTransport for ReqwestTransport {
    async fn get(
        &self,
        request: &LookupRequest,
        timeout: Duration,
    ) -> Result<HttpResponse, LookupError> {
        if request.verb != HttpVerb::Get {
            return Err(LookupError::UnsupportedVerb(request.verb.to_string()));
        }

        let mut builder = self.client.get(request.url.clone()).timeout(timeout);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if !request.body.is_empty() {
            builder = builder.form(&request.body);
        }
        if let Some(auth) = &request.basic_auth {
            builder = builder.basic_auth(&auth.username, auth.password.as_ref());
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        debug!(url = %request.url, status, "provider responded");
        let body = response.text().await?;
        Ok(HttpResponse { status, body })
    }
}
