//! Configuration for an embedded Nimbus resource layer.
//!
//! Provides the [`NimbusConfig`] struct that loads from TOML files,
//! environment variables, and defaults using the `confyg` crate.
//!
//! # Loading Priority
//!
//! 1. Explicit path passed to [`NimbusConfig::load`]
//! 2. `NIMBUS_CONFIG` environment variable
//! 3. XDG default: `~/.config/nimbus/config.toml`
//! 4. Built-in defaults
//!
//! `NIMBUS_<SECTION>_<KEY>` environment variables override file values.

use crate::manager::{ResourceManager, ResourceManagerConfig};
use confyg::{Confygery, env};
use nimbus_core::{Error, Result, StateStore};
use nimbus_graph::{RelationshipSchema, aws_relationship_schema};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

// ============================================================================
// Configuration structs
// ============================================================================

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NimbusConfig {
    /// Resource manager behavior.
    pub manager: ResourceManagerConfig,

    /// Which relationship schema to install.
    pub schema: SchemaConfig,
}

/// Relationship schema selection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaConfig {
    /// Built-in schema to load at startup.
    pub preset: SchemaPreset,
}

/// Built-in relationship schemas.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaPreset {
    /// The AWS relationship table.
    #[default]
    Aws,
    /// No schema; only existence and cycle checks apply.
    None,
}

impl SchemaPreset {
    /// Builds the schema for this preset.
    pub fn build(self) -> Option<RelationshipSchema> {
        match self {
            Self::Aws => Some(aws_relationship_schema()),
            Self::None => None,
        }
    }
}

// ============================================================================
// Field helpers
// ============================================================================

/// Accepts a TOML boolean or its string form.
///
/// confyg hands `NIMBUS_<SECTION>_<KEY>` overrides through as strings.
pub(crate) fn bool_or_string<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum BoolOrString {
        Bool(bool),
        String(String),
    }

    match BoolOrString::deserialize(deserializer)? {
        BoolOrString::Bool(value) => Ok(value),
        BoolOrString::String(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "true" => Ok(true),
            "false" => Ok(false),
            _ => Err(serde::de::Error::custom(format!(
                "expected a boolean, got {raw:?}"
            ))),
        },
    }
}

// ============================================================================
// Config loading
// ============================================================================

impl NimbusConfig {
    /// Load configuration from file, environment, and defaults.
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut builder =
            Confygery::new().map_err(|e| Error::config(format!("config init: {e}")))?;

        if let Some(path) = Self::resolve_config_path(config_path) {
            if path.exists() {
                log::debug!("loading config from {}", path.display());
                builder
                    .add_file(&path.to_string_lossy())
                    .map_err(|e| Error::config(format!("config file: {e}")))?;
            }
        }

        let mut env_opts = env::Options::with_top_level("NIMBUS");
        env_opts.add_section("manager");
        env_opts.add_section("schema");
        builder
            .add_env(env_opts)
            .map_err(|e| Error::config(format!("config env: {e}")))?;

        let config: Self = builder
            .build()
            .map_err(|e| Error::config(format!("config build: {e}")))?;

        log::info!(
            "config loaded: strict={} delete={} schema={:?}",
            config.manager.strict_validation,
            config.manager.delete_behavior,
            config.schema.preset
        );
        Ok(config)
    }

    /// Resolve the config file path from explicit path, env var, or XDG default.
    pub fn resolve_config_path(explicit: Option<&str>) -> Option<PathBuf> {
        if let Some(path) = explicit {
            return Some(PathBuf::from(path));
        }

        if let Ok(path) = std::env::var("NIMBUS_CONFIG") {
            return Some(PathBuf::from(path));
        }

        Self::default_config_path()
    }

    /// Return the XDG default config path.
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("nimbus").join("config.toml"))
    }

    /// Serialize this config to a pretty-printed TOML string.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::config(e.to_string()))
    }

    /// Builds a resource manager over `store` with the configured schema.
    pub fn build_manager(&self, store: Arc<dyn StateStore>) -> ResourceManager {
        let manager = ResourceManager::new(store, self.manager.clone());
        if let Some(schema) = self.schema.preset.build() {
            manager.set_schema(schema);
        }
        manager
    }
}

// ============================================================================
// Tests
// ============================================================================
