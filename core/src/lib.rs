//! Shared foundation for third-party API gateway integrations.
//!
//! # Overview
//! An integration defines its models with [`model!`], one [`Endpoint`] per
//! API operation and a [`Gateway`] that builds [`Request`]s. The toolkit
//! provides the request lifecycle (validate, send, capture), typed
//! [`Response`]s, flat model mapping, a [`GatewayRegistry`] to construct
//! gateways by name, and [`Storage`] caches shared between gateways.
//!
//! # Design
//! - Requests and responses cross the I/O boundary as plain
//!   [`HttpRequest`] / [`HttpResponse`] values; a [`Transport`] executes
//!   them. The default [`UreqTransport`] is blocking.
//! - Collaborators (transport, logger, storage) are trait objects behind
//!   `Arc` so one instance can serve several gateways.
//! - Models are plain structs of `Option` fields. The flat mapping is
//!   generated, not reflected.
//! - Configuration is a loosely typed map applied to typed settings; unknown
//!   keys are ignored.

pub mod attributes;
pub mod error;
pub mod gateway;
pub mod helpers;
pub mod http;
pub mod log;
pub mod model;
pub mod naming;
pub mod registry;
pub mod request;
pub mod response;
pub mod storage;
pub mod transport;

pub use attributes::{Options, RequestAttributes};
pub use error::{Error, Result, TransportError};
pub use gateway::{apply_params, read_params, Gateway, GatewayConfig, GatewayCore, Params, TestMode};
pub use helpers::{json_decode, to_float, validate_luhn};
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use log::{GatewayLogger, LogLevel, Logger};
pub use model::{FieldCodec, Model, Nested};
pub use registry::{GatewayRegistry, GatewayType, ManifestFile, MetadataSource, StaticMetadata};
pub use request::{Endpoint, EndpointResponse, Request};
pub use response::Response;
pub use storage::{FileStorage, MemoryStorage, Storage, StorageValue};
pub use transport::{LoggingTransport, Transport, UreqTransport};
