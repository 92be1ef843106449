//! Gateway factory: name resolution and construction.
//!
//! # Design
//! Gateways are registered explicitly with [`GatewayRegistry::register`],
//! which records a constructor under the type's qualified path and its
//! short alias. [`GatewayRegistry::create`] accepts either form: a path with
//! `::` or `\` separators, or a case-insensitive alias such as
//! `Tokenizer_Test`.
//!
//! The list of gateways a deployment supports comes from a
//! [`MetadataSource`]; [`GatewayRegistry::find`] keeps the supported names
//! that resolve to a registered constructor.

use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

use serde_json::Value;

use crate::error::{Error, Result};
use crate::gateway::{Gateway, Params};
use crate::helpers;
use crate::log::Logger;
use crate::naming;
use crate::storage::Storage;
use crate::transport::Transport;

/// A gateway the registry can construct.
pub trait GatewayType: Gateway + Sized {
    fn create(
        params: Params,
        transport: Option<Arc<dyn Transport>>,
        logger: Option<Arc<dyn Logger>>,
        storage: Option<Arc<dyn Storage>>,
    ) -> Result<Self>;
}

type Constructor = fn(
    Params,
    Option<Arc<dyn Transport>>,
    Option<Arc<dyn Logger>>,
    Option<Arc<dyn Storage>>,
) -> Result<Box<dyn Gateway>>;

fn construct<G: GatewayType>(
    params: Params,
    transport: Option<Arc<dyn Transport>>,
    logger: Option<Arc<dyn Logger>>,
    storage: Option<Arc<dyn Storage>>,
) -> Result<Box<dyn Gateway>> {
    let gateway = G::create(params, transport, logger, storage)?;
    Ok(Box::new(gateway))
}

/// Source of the supported gateway identifiers.
pub trait MetadataSource: Send + Sync {
    fn supported_gateways(&self) -> Result<Vec<String>>;
}

/// JSON manifest listing gateways under `extra.gateways`:
/// `{"extra": {"gateways": ["Tokenizer_Test"]}}`.
#[derive(Debug, Clone)]
pub struct ManifestFile {
    path: PathBuf,
}

impl ManifestFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl MetadataSource for ManifestFile {
    fn supported_gateways(&self) -> Result<Vec<String>> {
        let text = std::fs::read_to_string(&self.path)?;
        let manifest = helpers::json_decode(&text)?;
        let missing = || {
            Error::Configuration(format!(
                "cannot find supported gateways in {}",
                self.path.display()
            ))
        };
        let extra = manifest
            .get("extra")
            .filter(|extra| !is_empty(extra))
            .ok_or_else(missing)?;
        let Some(Value::Array(gateways)) = extra.get("gateways") else {
            return Err(missing());
        };
        gateways
            .iter()
            .map(|g| {
                g.as_str().map(str::to_string).ok_or_else(|| {
                    Error::Configuration(format!("gateway identifier {g} is not a string"))
                })
            })
            .collect()
    }
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

/// A fixed list of supported gateways.
#[derive(Debug, Clone, Default)]
pub struct StaticMetadata(pub Vec<String>);

impl MetadataSource for StaticMetadata {
    fn supported_gateways(&self) -> Result<Vec<String>> {
        Ok(self.0.clone())
    }
}

struct Registration {
    path: String,
    alias: String,
    constructor: Constructor,
}

#[derive(Default)]
pub struct GatewayRegistry {
    gateways: Vec<String>,
    registrations: Vec<Registration>,
    metadata: Option<Box<dyn MetadataSource>>,
}

impl GatewayRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_metadata(mut self, metadata: impl MetadataSource + 'static) -> Self {
        self.metadata = Some(Box::new(metadata));
        self
    }

    /// Make `G` constructible by its path and alias.
    pub fn register<G: GatewayType>(&mut self) -> &mut Self {
        let path = naming::qualified_name(std::any::type_name::<G>());
        let alias = naming::gateway_alias(&path);
        tracing::debug!(%path, %alias, "gateway registered");
        self.registrations.retain(|r| r.path != path);
        self.registrations.push(Registration {
            path,
            alias,
            constructor: construct::<G>,
        });
        self
    }

    /// Registered gateway names, in insertion or sorted order.
    pub fn gateways(&self) -> &[String] {
        &self.gateways
    }

    pub fn set_gateways(&mut self, gateways: Vec<String>) {
        self.gateways = gateways;
    }

    /// Append `name` unless already present.
    pub fn add_gateway(&mut self, name: impl Into<String>) {
        let name = name.into();
        if !self.gateways.contains(&name) {
            self.gateways.push(name);
        }
    }

    /// Whether `name` resolves to a registered constructor.
    pub fn contains(&self, name: &str) -> bool {
        self.resolve(name).is_some()
    }

    fn resolve(&self, name: &str) -> Option<&Registration> {
        if naming::is_qualified(name) {
            let path = naming::qualified_name(name);
            self.registrations.iter().find(|r| r.path == path)
        } else {
            self.registrations
                .iter()
                .find(|r| r.alias.eq_ignore_ascii_case(name))
        }
    }

    /// Add every supported gateway that has a constructor, then sort.
    ///
    /// Names are ordered byte-wise, so uppercase names come before
    /// lowercase ones.
    pub fn find(&mut self) -> Result<&[String]> {
        for name in self.supported_gateways()? {
            if self.contains(&name) {
                self.add_gateway(name);
            } else {
                tracing::debug!(gateway = %name, "supported gateway has no constructor");
            }
        }
        self.gateways.sort();
        Ok(&self.gateways)
    }

    /// Construct the gateway named by alias or qualified path.
    pub fn create(
        &self,
        name: &str,
        params: Params,
        transport: Option<Arc<dyn Transport>>,
        logger: Option<Arc<dyn Logger>>,
        storage: Option<Arc<dyn Storage>>,
    ) -> Result<Box<dyn Gateway>> {
        let registration = self.resolve(name).ok_or_else(|| {
            tracing::warn!(gateway = %name, "gateway not found");
            Error::GatewayNotFound(name.to_string())
        })?;
        (registration.constructor)(params, transport, logger, storage)
    }

    pub fn supported_gateways(&self) -> Result<Vec<String>> {
        match &self.metadata {
            Some(metadata) => metadata.supported_gateways(),
            None => Err(Error::Configuration(
                "no gateway metadata source configured".to_string(),
            )),
        }
    }

    /// Install this registry as the process-wide default.
    ///
    /// Succeeds once per process; later calls fail with
    /// [`Error::Configuration`].
    pub fn install(self) -> Result<Arc<GatewayRegistry>> {
        let registry = Arc::new(self);
        GLOBAL
            .set(registry.clone())
            .map_err(|_| Error::Configuration("a default gateway registry is already installed".to_string()))?;
        Ok(registry)
    }

    /// The registry installed with [`GatewayRegistry::install`].
    pub fn global() -> Option<Arc<GatewayRegistry>> {
        GLOBAL.get().cloned()
    }
}

static GLOBAL: OnceLock<Arc<GatewayRegistry>> = OnceLock::new();

impl fmt::Debug for GatewayRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registered: Vec<&str> = self.registrations.iter().map(|r| r.path.as_str()).collect();
        f.debug_struct("GatewayRegistry")
            .field("gateways", &self.gateways)
            .field("registered", &registered)
            .finish_non_exhaustive()
    }
}
