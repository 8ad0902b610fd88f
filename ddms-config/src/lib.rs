//! Shared configuration library for DDMS.
//!
//! Centralizes config defaults, file/env loading and validation so the
//! server binary and the core engine agree on a single source of truth.

pub mod loader;
pub mod models;
pub mod validation;

pub use loader::{ConfigLoadError, ConfigSource, load_from_env, load_from_file};
pub use models::{Config, IndexConfig, ServerConfig, WatchConfig};
pub use validation::validate;
