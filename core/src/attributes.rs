//! Shape of one HTTP call: method, path and transport options.
//!
//! # Design
//! `RequestAttributes` is a value type. `add_options` consumes and returns
//! it, so a shared default can be cloned and extended per call without
//! touching the original. Option merging is a shallow key overwrite.
//!
//! A handful of option keys are understood when the attributes are turned
//! into an [`HttpRequest`]: `base_uri`, `headers`, `query`, `json` and
//! `body`. Anything else is carried along for custom transports.

use serde_json::{Map, Value};

use crate::error::{Error, Result, TransportError};
use crate::http::{HttpMethod, HttpRequest};

pub const OPTION_BASE_URI: &str = "base_uri";
pub const OPTION_HEADERS: &str = "headers";
pub const OPTION_QUERY: &str = "query";
pub const OPTION_JSON: &str = "json";
pub const OPTION_BODY: &str = "body";

/// Transport options keyed by name.
pub type Options = Map<String, Value>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestAttributes {
    pub method: HttpMethod,
    pub path: String,
    pub options: Options,
}

impl RequestAttributes {
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            options: Options::new(),
        }
    }

    pub fn with_options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    /// Merge `extra` into the options; keys in `extra` win.
    pub fn add_options(mut self, extra: Options) -> Self {
        for (key, value) in extra {
            self.options.insert(key, value);
        }
        self
    }

    pub fn option(&self, key: &str) -> Option<&Value> {
        self.options.get(key)
    }

    /// Build the concrete request for this call.
    ///
    /// `payload` is the flattened request data. It becomes the JSON body for
    /// methods that carry one and query parameters otherwise. An explicit
    /// `body` option takes precedence over `json`, which takes precedence
    /// over the payload.
    pub fn build_http_request(&self, payload: Option<&Map<String, Value>>) -> Result<HttpRequest> {
        let mut query: Vec<(String, String)> = Vec::new();
        if let Some(Value::Object(params)) = self.option(OPTION_QUERY) {
            query.extend(params.iter().map(|(k, v)| (k.clone(), plain_string(v))));
        }

        let mut headers: Vec<(String, String)> = Vec::new();
        if let Some(Value::Object(map)) = self.option(OPTION_HEADERS) {
            headers.extend(map.iter().map(|(k, v)| (k.clone(), plain_string(v))));
        }

        let mut body = None;
        if self.method.carries_body() {
            if let Some(raw) = self.option(OPTION_BODY) {
                body = Some(plain_string(raw));
            } else {
                let json = match (self.option(OPTION_JSON), payload) {
                    (Some(json), _) => Some(serde_json::to_string(json)),
                    (None, Some(data)) => Some(serde_json::to_string(data)),
                    (None, None) => None,
                };
                if let Some(json) = json {
                    let json = json.map_err(|e| Error::MalformedInput(e.to_string()))?;
                    if !headers.iter().any(|(k, _)| k.eq_ignore_ascii_case("content-type")) {
                        headers.push(("content-type".to_string(), "application/json".to_string()));
                    }
                    body = Some(json);
                }
            }
        } else if let Some(data) = payload {
            query.extend(
                data.iter()
                    .filter(|(_, v)| !v.is_null())
                    .map(|(k, v)| (k.clone(), plain_string(v))),
            );
        }

        let mut url = self.url()?;
        if !query.is_empty() {
            let encoded = serde_urlencoded::to_string(&query)
                .map_err(|e| Error::MalformedInput(e.to_string()))?;
            url.push(if url.contains('?') { '&' } else { '?' });
            url.push_str(&encoded);
        }

        Ok(HttpRequest {
            method: self.method,
            url,
            headers,
            body,
        })
    }

    /// Resolve `path` against the `base_uri` option.
    pub fn url(&self) -> Result<String> {
        if is_absolute(&self.path) {
            return Ok(self.path.clone());
        }
        match self.option(OPTION_BASE_URI).and_then(Value::as_str) {
            Some(base) if is_absolute(base) => {
                let base = base.trim_end_matches('/');
                let path = self.path.trim_start_matches('/');
                if path.is_empty() {
                    Ok(base.to_string())
                } else {
                    Ok(format!("{base}/{path}"))
                }
            }
            Some(base) => Err(TransportError::InvalidUrl(base.to_string()).into()),
            None => Err(TransportError::InvalidUrl(self.path.clone()).into()),
        }
    }
}

fn is_absolute(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

/// String form used for headers and query values: strings stay unquoted.
fn plain_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
