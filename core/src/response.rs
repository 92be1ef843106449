//! Decoded result of one HTTP exchange.
//!
//! # Design
//! [`Response::from_http`] parses the body once. The status picks which
//! model the body decodes into; the raw value and headers stay available
//! alongside the typed view. Bodies that are not JSON are rejected with
//! [`Error::InvalidResponse`](crate::Error::InvalidResponse).

use serde_json::Value;

use crate::error::{Error, Result};
use crate::http::HttpResponse;
use crate::model::Model;

/// Typed result of a sent request.
///
/// A 2xx status yields the data model, anything else the error model. The
/// decoded body and headers are kept as received for endpoints that need
/// more than the typed view.
#[derive(Debug, Clone, PartialEq)]
pub struct Response<D, E> {
    status: u16,
    data: Option<D>,
    errors: Option<E>,
    raw: Value,
    headers: Vec<(String, String)>,
}

impl<D: Model, E: Model> Response<D, E> {
    pub fn new(status: u16, data: Option<D>, errors: Option<E>) -> Self {
        Self {
            status,
            data,
            errors,
            raw: Value::Null,
            headers: Vec::new(),
        }
    }

    /// Decode a transport response. An empty body decodes to no model.
    pub fn from_http(response: HttpResponse) -> Result<Self> {
        let raw = if response.body.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&response.body).map_err(|e| {
                Error::InvalidResponse(format!("status {}: body is not JSON: {e}", response.status))
            })?
        };

        let mut data = None;
        let mut errors = None;
        if let Value::Object(fields) = &raw {
            if response.is_success() {
                data = Some(D::from_flat(fields)?);
            } else {
                errors = Some(E::from_flat(fields)?);
            }
        }

        Ok(Self {
            status: response.status,
            data,
            errors,
            raw,
            headers: response.headers,
        })
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn is_successful(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn data(&self) -> Option<&D> {
        self.data.as_ref()
    }

    pub fn errors(&self) -> Option<&E> {
        self.errors.as_ref()
    }

    /// Decoded body as received; `Null` for an empty body.
    pub fn response_data(&self) -> &Value {
        &self.raw
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    crate::model! {
        struct Token {
            token: String,
            last4: String,
        }
    }

    crate::model! {
        struct Problem {
            message: String,
            errors: Vec<String>,
        }
    }

    type TokenResponse = Response<Token, Problem>;

    fn http(status: u16, body: &str) -> HttpResponse {
        HttpResponse {
            status,
            headers: vec![("X-Request-Id".to_string(), "r-1".to_string())],
            body: body.to_string(),
        }
    }

    #[test]
    fn success_body_maps_to_data_model() {
        let response = TokenResponse::from_http(http(201, r#"{"token":"t1","last4":"1111"}"#)).unwrap();
        assert_eq!(response.status(), 201);
        assert!(response.is_successful());
        assert_eq!(response.data().and_then(|t| t.token.as_deref()), Some("t1"));
        assert!(response.errors().is_none());
        assert_eq!(response.header("x-request-id"), Some("r-1"));
    }

    #[test]
    fn failure_body_maps_to_error_model() {
        let response = TokenResponse::from_http(http(
            422,
            r#"{"message":"invalid card","errors":["card_number"]}"#,
        ))
        .unwrap();
        assert!(!response.is_successful());
        assert!(response.data().is_none());
        let problem = response.errors().unwrap();
        assert_eq!(problem.message.as_deref(), Some("invalid card"));
        assert_eq!(response.response_data()["errors"], json!(["card_number"]));
    }

    #[test]
    fn empty_body_has_no_models() {
        let response = TokenResponse::from_http(http(204, "")).unwrap();
        assert_eq!(response.status(), 204);
        assert!(response.data().is_none());
        assert_eq!(response.response_data(), &Value::Null);
    }

    #[test]
    fn non_object_body_is_kept_raw() {
        let response = TokenResponse::from_http(http(200, "[1,2]")).unwrap();
        assert!(response.data().is_none());
        assert_eq!(response.response_data(), &json!([1, 2]));
    }

    #[test]
    fn malformed_body_is_an_invalid_response() {
        let err = TokenResponse::from_http(http(200, "<html>")).unwrap_err();
        assert!(matches!(err, Error::InvalidResponse(_)));
    }
}
