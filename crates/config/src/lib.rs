//! Configuration loading, validation and env substitution.
//!
//! Config files: `maxrelay.toml`, `maxrelay.yaml`, or `maxrelay.json`
//! Searched in `./` then `~/.config/maxrelay/`.
//!
//! Supports `${ENV_VAR}` substitution in all string values.

pub mod env_subst;
pub mod error;
pub mod loader;
pub mod schema;
pub mod validate;

pub use {
    error::{Error, Result},
    loader::{
        apply_env_overrides, config_dir, data_dir, discover_and_load, load_config,
        set_config_dir, set_data_dir,
    },
    schema::{
        AuthConfig, ForwarderConfig, RelayConfig, SourceConfig, StoreConfig, TelegramConfig,
    },
    validate::{Diagnostic, Severity, validate},
};
