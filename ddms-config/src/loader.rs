//! Config loading.
//!
//! Evaluation order, mirroring how operators actually deploy DDMS:
//! 1. `$DDMS_CONFIG_PATH` (TOML or JSON file),
//! 2. `$DDMS_CONFIG_JSON` (inline JSON),
//! 3. `ddms.toml` in the working directory,
//! 4. built-in defaults.
//!
//! `$DDMS_ROOT` overrides the watched root on top of whichever source won.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::models::Config;

/// Source that produced the effective configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConfigSource {
    #[default]
    Default,
    EnvPath(PathBuf),
    EnvInline,
    File(PathBuf),
}

#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid TOML config {path}: {message}")]
    Toml { path: PathBuf, message: String },
    #[error("invalid JSON config: {0}")]
    Json(#[from] serde_json::Error),
}

/// Load configuration using environment variables and well-known files.
pub fn load_from_env() -> Result<(Config, ConfigSource), ConfigLoadError> {
    // Pick up a local .env before reading any DDMS_* variables.
    let _ = dotenvy::dotenv();

    let (mut config, source) = resolve_source()?;

    if let Ok(root) = env::var("DDMS_ROOT")
        && !root.trim().is_empty()
    {
        config.index.root_directory = PathBuf::from(root);
    }

    Ok((config, source))
}

fn resolve_source() -> Result<(Config, ConfigSource), ConfigLoadError> {
    if let Ok(path_str) = env::var("DDMS_CONFIG_PATH")
        && !path_str.trim().is_empty()
    {
        let path = PathBuf::from(path_str);
        let config = load_from_file(&path)?;
        return Ok((config, ConfigSource::EnvPath(path)));
    }

    if let Ok(raw) = env::var("DDMS_CONFIG_JSON")
        && !raw.trim().is_empty()
    {
        let config = serde_json::from_str(&raw)?;
        return Ok((config, ConfigSource::EnvInline));
    }

    let default_file = PathBuf::from("ddms.toml");
    if default_file.is_file() {
        let config = load_from_file(&default_file)?;
        return Ok((config, ConfigSource::File(default_file)));
    }

    Ok((Config::default(), ConfigSource::Default))
}

/// Parse a config file, dispatching on extension. Unknown extensions are
/// tried as TOML first, then JSON.
pub fn load_from_file(path: &Path) -> Result<Config, ConfigLoadError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigLoadError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => Ok(serde_json::from_str(&contents)?),
        Some("toml") | Some("tml") => parse_toml(path, &contents),
        _ => parse_toml(path, &contents).or_else(|_| Ok(serde_json::from_str(&contents)?)),
    }
}

fn parse_toml(path: &Path, contents: &str) -> Result<Config, ConfigLoadError> {
    toml::from_str(contents).map_err(|err| ConfigLoadError::Toml {
        path: path.to_path_buf(),
        message: err.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn toml_file_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ddms.toml");
        let mut f = fs::File::create(&path).unwrap();
        writeln!(
            f,
            "[index]\nroot_directory = \"/srv/docs\"\n\n[server]\nport = 9090"
        )
        .unwrap();

        let config = load_from_file(&path).unwrap();
        assert_eq!(config.index.root_directory, PathBuf::from("/srv/docs"));
        assert_eq!(config.server.port, 9090);
        // Untouched sections keep defaults.
        assert_eq!(config.watch.settle_delay_ms, 15_000);
    }

    #[test]
    fn unreadable_file_reports_path() {
        let err = load_from_file(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(err.to_string().contains("/definitely/not/here.toml"));
    }
}
