//! Validate, send and capture one API call.
//!
//! # Design
//! An [`Endpoint`] describes one API operation: its data, success and error
//! models, default attributes and validation. A [`Request`] owns one call to
//! that endpoint and moves from unsent to sent exactly once. Once a response
//! is captured the request data is frozen.
//!
//! Validation runs before the transport is touched. Transport failures
//! propagate unchanged and leave the request unsent, so it can be retried.

use std::fmt;
use std::sync::Arc;

use crate::attributes::RequestAttributes;
use crate::error::{Error, Result};
use crate::model::Model;
use crate::response::Response;
use crate::transport::Transport;

/// Shorthand for the response type of an endpoint.
pub type EndpointResponse<E> = Response<<E as Endpoint>::Ok, <E as Endpoint>::Err>;

/// One API operation.
pub trait Endpoint: Sized {
    /// Request data sent with the call.
    type Data: Model;
    /// Model decoded from a 2xx body.
    type Ok: Model;
    /// Model decoded from any other body.
    type Err: Model;

    /// Name used in error messages.
    const NAME: &'static str;

    /// Attributes used when the caller does not supply any.
    fn default_attributes(&self) -> RequestAttributes {
        RequestAttributes::default()
    }

    /// Reject data that is clearly invalid, with a reason.
    fn validate(&self, _data: &Self::Data) -> std::result::Result<(), String> {
        Ok(())
    }

    /// Perform the call.
    ///
    /// The default flattens `data` into the request built from
    /// `attributes`, runs it through `transport` and checks the result with
    /// [`Endpoint::validate_response`].
    fn send_request(
        &self,
        transport: &dyn Transport,
        attributes: &RequestAttributes,
        data: &Self::Data,
    ) -> Result<EndpointResponse<Self>> {
        let payload = data.to_flat()?;
        let http_request = attributes.build_http_request(Some(&payload))?;
        tracing::debug!(
            endpoint = Self::NAME,
            method = %http_request.method,
            url = %http_request.url,
            "sending request"
        );
        let http_response = transport.send(&http_request)?;
        let response = Response::from_http(http_response)?;
        tracing::debug!(endpoint = Self::NAME, status = response.status(), "response received");
        self.validate_response(&response)?;
        Ok(response)
    }

    /// Reject a decoded response, typically with [`Error::InvalidResponse`].
    fn validate_response(&self, _response: &EndpointResponse<Self>) -> Result<()> {
        Ok(())
    }
}

/// One call to an [`Endpoint`].
pub struct Request<E: Endpoint> {
    endpoint: E,
    transport: Arc<dyn Transport>,
    data: Option<E::Data>,
    attributes: RequestAttributes,
    response: Option<EndpointResponse<E>>,
}

impl<E: Endpoint> Request<E> {
    /// `attributes` default to the endpoint's own.
    pub fn new(
        endpoint: E,
        transport: Arc<dyn Transport>,
        data: Option<E::Data>,
        attributes: Option<RequestAttributes>,
    ) -> Self {
        let attributes = attributes.unwrap_or_else(|| endpoint.default_attributes());
        Self {
            endpoint,
            transport,
            data,
            attributes,
            response: None,
        }
    }

    /// Replace the request data. Fails once a response has been captured.
    pub fn initialize_request_data(&mut self, data: E::Data) -> Result<&mut Self> {
        if self.response.is_some() {
            return Err(Error::RequestAlreadySent);
        }
        self.data = Some(data);
        Ok(self)
    }

    /// Validate the data, perform the call and capture the response.
    ///
    /// A request is sent at most once; a second call fails with
    /// [`Error::RequestAlreadySent`].
    pub fn send(&mut self) -> Result<&EndpointResponse<E>> {
        if self.response.is_some() {
            return Err(Error::RequestAlreadySent);
        }
        let data = self.data.as_ref().ok_or_else(|| Error::InvalidRequest {
            request: E::NAME,
            reason: "request data is not set".to_string(),
        })?;
        self.endpoint
            .validate(data)
            .map_err(|reason| Error::InvalidRequest {
                request: E::NAME,
                reason,
            })?;

        let response = self
            .endpoint
            .send_request(self.transport.as_ref(), &self.attributes, data)?;
        Ok(&*self.response.insert(response))
    }

    pub fn get_response(&self) -> Result<&EndpointResponse<E>> {
        self.response.as_ref().ok_or(Error::ResponseNotAvailable)
    }

    pub fn is_sent(&self) -> bool {
        self.response.is_some()
    }

    /// Declared field names of the request data model.
    pub fn parameters(&self) -> &'static [&'static str] {
        E::Data::parameters()
    }

    pub fn data(&self) -> Option<&E::Data> {
        self.data.as_ref()
    }

    pub fn attributes(&self) -> &RequestAttributes {
        &self.attributes
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub fn endpoint(&self) -> &E {
        &self.endpoint
    }
}

impl<E: Endpoint> fmt::Debug for Request<E>
where
    E::Data: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("endpoint", &E::NAME)
            .field("data", &self.data)
            .field("attributes", &self.attributes)
            .field("sent", &self.is_sent())
            .finish()
    }
}
