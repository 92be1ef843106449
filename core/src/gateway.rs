//! The per-integration façade.
//!
//! # Design
//! A gateway bundles configuration with three shared collaborators: the
//! transport its requests go through, a logger and a storage cache. The
//! shared part lives in [`GatewayCore`]; an integration embeds one and
//! implements [`Gateway`] on top, adding its own settings struct and
//! operations that build [`Request`]s.
//!
//! Configuration arrives as a loosely typed map. Known keys are applied to
//! typed structs with [`apply_params`]; unknown keys are dropped because
//! integrations vary their settings.

use std::any::Any;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::attributes::{RequestAttributes, OPTION_BASE_URI};
use crate::error::{Error, Result};
use crate::helpers;
use crate::log::{GatewayLogger, Logger};
use crate::naming;
use crate::request::{Endpoint, Request};
use crate::storage::{MemoryStorage, Storage};
use crate::transport::{LoggingTransport, Transport, UreqTransport};

/// Loosely typed configuration and initialization parameters.
pub type Params = Map<String, Value>;

/// Advisory mode consulted by integrations to pick endpoints or skip side
/// effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "Option<TestModeRepr>", into = "u8")]
pub enum TestMode {
    #[default]
    Production = 0,
    Test = 1,
    Simulate = 2,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TestModeRepr {
    Flag(bool),
    Code(u64),
    Name(String),
}

impl TryFrom<Option<TestModeRepr>> for TestMode {
    type Error = String;

    fn try_from(repr: Option<TestModeRepr>) -> std::result::Result<Self, Self::Error> {
        match repr {
            None | Some(TestModeRepr::Flag(false)) | Some(TestModeRepr::Code(0)) => Ok(TestMode::Production),
            Some(TestModeRepr::Flag(true)) | Some(TestModeRepr::Code(1)) => Ok(TestMode::Test),
            Some(TestModeRepr::Code(2)) => Ok(TestMode::Simulate),
            Some(TestModeRepr::Code(code)) => Err(format!("unknown test mode {code}")),
            Some(TestModeRepr::Name(name)) => match name.to_ascii_lowercase().as_str() {
                "production" => Ok(TestMode::Production),
                "test" => Ok(TestMode::Test),
                "simulate" => Ok(TestMode::Simulate),
                _ => Err(format!("unknown test mode '{name}'")),
            },
        }
    }
}

impl From<TestMode> for u8 {
    fn from(mode: TestMode) -> u8 {
        mode as u8
    }
}

/// Settings every gateway understands.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub test_mode: TestMode,
    /// Log every HTTP call through the gateway logger.
    pub debug: bool,
    /// Prefix for relative request paths.
    pub base_uri: Option<String>,
    /// Whole-call timeout of the default transport.
    pub timeout_secs: Option<u64>,
}

impl GatewayConfig {
    /// Typed view of `params`; unknown keys are ignored.
    pub fn from_params(params: &Params) -> Result<Self> {
        serde_json::from_value(Value::Object(params.clone()))
            .map_err(|e| Error::Configuration(e.to_string()))
    }
}

/// Read a JSON object of parameters from a file.
pub fn read_params(path: impl AsRef<Path>) -> Result<Params> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)?;
    match helpers::json_decode(&text)? {
        Value::Object(params) => Ok(params),
        _ => Err(Error::Configuration(format!(
            "{} does not hold a JSON object",
            path.display()
        ))),
    }
}

/// Assign every key of `params` that names a field of `target`.
///
/// Unknown keys are ignored. A known key whose value does not fit the field
/// fails with [`Error::Configuration`] and leaves `target` unchanged. Fields
/// skipped during serialization are not settable.
pub fn apply_params<T>(target: &mut T, params: &Params) -> Result<()>
where
    T: Serialize + DeserializeOwned,
{
    let mut fields = match serde_json::to_value(&*target) {
        Ok(Value::Object(fields)) => fields,
        Ok(_) => return Err(Error::Configuration("settings must serialize to an object".to_string())),
        Err(e) => return Err(Error::Configuration(e.to_string())),
    };
    let mut changed = false;
    for (key, value) in params {
        if let Some(slot) = fields.get_mut(key) {
            *slot = value.clone();
            changed = true;
        }
    }
    if changed {
        *target = serde_json::from_value(Value::Object(fields))
            .map_err(|e| Error::Configuration(e.to_string()))?;
    }
    Ok(())
}

/// State shared by all gateways.
pub struct GatewayCore {
    params: Params,
    config: GatewayConfig,
    test_mode: TestMode,
    transport: Arc<dyn Transport>,
    /// Whether `transport` was built here and follows `debug` and `timeout_secs`.
    owns_transport: bool,
    logger: Arc<dyn Logger>,
    storage: Arc<dyn Storage>,
}

impl GatewayCore {
    /// Build the shared state, defaulting any collaborator not supplied.
    ///
    /// The default transport is a [`UreqTransport`] honoring
    /// `timeout_secs`, wrapped in a [`LoggingTransport`] when `debug` is
    /// set. The default logger is a disabled [`GatewayLogger`] and the
    /// default storage an empty [`MemoryStorage`].
    pub fn new(
        params: Params,
        transport: Option<Arc<dyn Transport>>,
        logger: Option<Arc<dyn Logger>>,
        storage: Option<Arc<dyn Storage>>,
    ) -> Result<Self> {
        let config = GatewayConfig::from_params(&params)?;
        let logger = logger.unwrap_or_else(|| Arc::new(GatewayLogger::new()));
        let owns_transport = transport.is_none();
        let transport = transport.unwrap_or_else(|| default_transport(&config, &logger));
        let storage = storage.unwrap_or_else(|| Arc::new(MemoryStorage::new()));
        Ok(Self {
            test_mode: config.test_mode,
            params,
            config,
            transport,
            owns_transport,
            logger,
            storage,
        })
    }

    /// Re-apply the common settings named in `params`.
    ///
    /// A default transport is rebuilt when `debug` or `timeout_secs` is
    /// given; an injected one is left alone.
    pub fn initialize(&mut self, params: &Params) -> Result<()> {
        apply_params(&mut self.config, params)?;
        if params.contains_key("test_mode") {
            self.test_mode = self.config.test_mode;
        }
        if self.owns_transport && (params.contains_key("debug") || params.contains_key("timeout_secs")) {
            self.transport = default_transport(&self.config, &self.logger);
        }
        for (key, value) in params {
            self.params.insert(key.clone(), value.clone());
        }
        Ok(())
    }

    /// Parameters as supplied at construction and by later `initialize` calls.
    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn test_mode(&self) -> TestMode {
        self.test_mode
    }

    pub fn set_test_mode(&mut self, mode: TestMode) {
        self.test_mode = mode;
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub fn logger(&self) -> &Arc<dyn Logger> {
        &self.logger
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }
}

impl fmt::Debug for GatewayCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayCore")
            .field("config", &self.config)
            .field("test_mode", &self.test_mode)
            .finish_non_exhaustive()
    }
}

fn default_transport(config: &GatewayConfig, logger: &Arc<dyn Logger>) -> Arc<dyn Transport> {
    let transport: Arc<dyn Transport> = Arc::new(UreqTransport::with_timeout(
        config.timeout_secs.map(Duration::from_secs),
    ));
    if config.debug {
        Arc::new(LoggingTransport::new(transport, logger.clone()))
    } else {
        transport
    }
}

/// Downcasting support for boxed gateways.
pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// A third-party API integration.
pub trait Gateway: AsAny + Send + Sync {
    /// Human-readable name.
    fn name(&self) -> &str;

    fn core(&self) -> &GatewayCore;

    fn core_mut(&mut self) -> &mut GatewayCore;

    /// Registry key derived from the implementing type's path.
    fn alias(&self) -> String {
        naming::gateway_alias(std::any::type_name::<Self>())
    }

    /// Apply parameters by name; unknown keys are ignored.
    ///
    /// Integrations with their own settings override this, applying `params`
    /// to their settings with [`apply_params`] and delegating to
    /// [`GatewayCore::initialize`].
    fn initialize(&mut self, params: &Params) -> Result<()> {
        self.core_mut().initialize(params)
    }

    fn test_mode(&self) -> TestMode {
        self.core().test_mode()
    }

    fn set_test_mode(&mut self, mode: TestMode) {
        self.core_mut().set_test_mode(mode);
    }

    fn logger(&self) -> &Arc<dyn Logger> {
        self.core().logger()
    }

    fn storage(&self) -> &Arc<dyn Storage> {
        self.core().storage()
    }

    /// Build a request to `endpoint` that goes through this gateway's
    /// transport.
    ///
    /// Attributes default to the endpoint's own; the configured `base_uri`
    /// is added when they carry none.
    fn create_request<E: Endpoint>(
        &self,
        endpoint: E,
        data: Option<E::Data>,
        attributes: Option<RequestAttributes>,
    ) -> Request<E>
    where
        Self: Sized,
    {
        let core = self.core();
        let mut attributes = attributes.unwrap_or_else(|| endpoint.default_attributes());
        if attributes.option(OPTION_BASE_URI).is_none() {
            if let Some(base_uri) = &core.config().base_uri {
                let mut extra = Map::new();
                extra.insert(OPTION_BASE_URI.to_string(), Value::String(base_uri.clone()));
                attributes = attributes.add_options(extra);
            }
        }
        Request::new(endpoint, core.transport().clone(), data, Some(attributes))
    }
}

impl dyn Gateway {
    pub fn downcast_ref<G: Gateway>(&self) -> Option<&G> {
        AsAny::as_any(self).downcast_ref::<G>()
    }

    pub fn downcast_mut<G: Gateway>(&mut self) -> Option<&mut G> {
        AsAny::as_any_mut(self).downcast_mut::<G>()
    }
}

impl fmt::Debug for dyn Gateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Gateway")
            .field("name", &self.name())
            .field("alias", &self.alias())
            .field("test_mode", &self.test_mode())
            .finish()
    }
}
