//! Pluggable HTTP execution.
//!
//! # Design
//! Endpoints describe calls as [`HttpRequest`] values; a [`Transport`]
//! performs them. Non-2xx statuses are data, not errors: only connectivity
//! and protocol failures surface as [`TransportError`]. The default
//! [`UreqTransport`] is blocking, matching the synchronous request lifecycle.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};

use crate::error::TransportError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::log::{Context, LogLevel, Logger, EXCEPTION_KEY};

pub trait Transport: Send + Sync {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// Blocking transport backed by a `ureq` agent.
#[derive(Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    pub fn new() -> Self {
        Self::with_timeout(None)
    }

    /// `timeout` bounds each whole call, connect to last body byte.
    pub fn with_timeout(timeout: Option<Duration>) -> Self {
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(timeout)
            .build()
            .new_agent();
        Self { agent }
    }

    pub fn from_agent(agent: ureq::Agent) -> Self {
        Self { agent }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new()
    }
}

fn with_headers<B>(
    mut builder: ureq::RequestBuilder<B>,
    headers: &[(String, String)],
) -> ureq::RequestBuilder<B> {
    for (name, value) in headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder
}

impl Transport for UreqTransport {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let url = request.url.as_str();
        let headers = request.headers.as_slice();
        let body = request.body.as_deref().map(str::as_bytes);

        let sent = match request.method {
            HttpMethod::Get => with_headers(self.agent.get(url), headers).call(),
            HttpMethod::Delete => with_headers(self.agent.delete(url), headers).call(),
            HttpMethod::Head => with_headers(self.agent.head(url), headers).call(),
            HttpMethod::Options => with_headers(self.agent.options(url), headers).call(),
            HttpMethod::Connect => with_headers(self.agent.connect(url), headers).call(),
            HttpMethod::Trace => with_headers(self.agent.trace(url), headers).call(),
            HttpMethod::Post | HttpMethod::Put | HttpMethod::Patch => {
                let builder = match request.method {
                    HttpMethod::Put => self.agent.put(url),
                    HttpMethod::Patch => self.agent.patch(url),
                    _ => self.agent.post(url),
                };
                let builder = with_headers(builder, headers);
                match body {
                    Some(bytes) => builder.send(bytes),
                    None => builder.send_empty(),
                }
            }
        };
        let mut response = sent.map_err(|e| TransportError::Http(Box::new(e)))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = if request.method == HttpMethod::Head {
            String::new()
        } else {
            response
                .body_mut()
                .read_to_string()
                .map_err(|e| TransportError::Body(Box::new(e)))?
        };
        tracing::debug!(method = %request.method, url, status, "http call completed");

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

/// Transport decorator reporting every call to a [`Logger`].
///
/// Installed by gateways whose configuration enables `debug`.
pub struct LoggingTransport {
    inner: Arc<dyn Transport>,
    logger: Arc<dyn Logger>,
}

impl LoggingTransport {
    pub fn new(inner: Arc<dyn Transport>, logger: Arc<dyn Logger>) -> Self {
        Self { inner, logger }
    }
}

impl Transport for LoggingTransport {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut context = Context::new();
        context.insert("method".to_string(), json!(request.method.as_str()));
        context.insert("url".to_string(), json!(request.url));
        self.logger.log(LogLevel::Debug, "{method} {url}", &context);

        match self.inner.send(request) {
            Ok(response) => {
                context.insert("status".to_string(), json!(response.status));
                context.insert("body".to_string(), Value::String(response.body.clone()));
                self.logger
                    .log(LogLevel::Debug, "{method} {url} -> {status} {body}", &context);
                Ok(response)
            }
            Err(e) => {
                context.insert(EXCEPTION_KEY.to_string(), json!(e.to_string()));
                self.logger.log(LogLevel::Error, "{method} {url} failed", &context);
                Err(e)
            }
        }
    }
}
