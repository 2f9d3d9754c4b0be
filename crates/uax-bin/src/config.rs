// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Client configuration loading.
//!
//! ```text
//! defaults ──► config file (YAML / TOML) ──► CLI overrides ──► validate()
//! ```
//!
//! Every field of the file is optional. Durations are humantime strings:
//!
//! ```yaml
//! application_name: Plant Explorer
//! request_timeout: 2s
//! endpoint_policy:
//!   kind: highest_security
//! monitored_item:
//!   queue_size: 20
//! ```

use std::path::Path;

use tracing::debug;
use uax_client::{ClientConfig, EndpointPolicy};

use crate::cli::Cli;
use crate::error::{BinError, BinResult};

// =============================================================================
// ConfigFormat
// =============================================================================

/// Supported configuration file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// YAML (`.yaml`, `.yml`).
    Yaml,
    /// TOML (`.toml`).
    Toml,
}

impl ConfigFormat {
    /// Detects the format from the file extension.
    pub fn from_path(path: &Path) -> BinResult<Self> {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .as_deref()
        {
            Some("yaml") | Some("yml") => Ok(Self::Yaml),
            Some("toml") => Ok(Self::Toml),
            _ => Err(BinError::config(format!(
                "unsupported configuration format: {}",
                path.display()
            ))),
        }
    }

    fn file_format(self) -> config::FileFormat {
        match self {
            Self::Yaml => config::FileFormat::Yaml,
            Self::Toml => config::FileFormat::Toml,
        }
    }
}

// =============================================================================
// Loading
// =============================================================================

/// Loads a client configuration file.
pub fn load_file(path: &Path) -> BinResult<ClientConfig> {
    if !path.exists() {
        return Err(BinError::config(format!(
            "configuration file not found: {}",
            path.display()
        )));
    }
    let format = ConfigFormat::from_path(path)?;

    let settings = config::Config::builder()
        .add_source(config::File::from(path).format(format.file_format()))
        .build()
        .map_err(|e| BinError::config(format!("{}: {}", path.display(), e)))?;

    let client: ClientConfig = settings
        .try_deserialize()
        .map_err(|e| BinError::config(format!("{}: {}", path.display(), e)))?;
    debug!(path = %path.display(), "Loaded client configuration");
    Ok(client)
}

/// Applies CLI overrides to `config`.
pub fn apply_overrides(config: &mut ClientConfig, cli: &Cli) {
    if let Some(timeout) = cli.request_timeout {
        config.request_timeout = timeout;
    }
    if cli.highest_security {
        config.endpoint_policy = EndpointPolicy::HighestSecurity;
    }
}

/// Builds the effective configuration: defaults, then the file named by
/// `--config` when given, then CLI overrides.
pub fn load_client_config(cli: &Cli) -> BinResult<ClientConfig> {
    let mut config = match &cli.config {
        Some(path) => load_file(path)?,
        None => ClientConfig::default(),
    };
    apply_overrides(&mut config, cli);
    config
        .validate()
        .map_err(|e| BinError::config(e.to_string()))?;
    Ok(config)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::io::Write;
    use std::time::Duration;
    use tempfile::NamedTempFile;

    fn write_file(suffix: &str, content: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_yaml() {
        let file = write_file(
            ".yaml",
            r#"
application_name: Plant Explorer
request_timeout: 2s
endpoint_policy:
  kind: highest_security
monitored_item:
  queue_size: 20
"#,
        );

        let config = load_file(file.path()).unwrap();
        assert_eq!(config.application_name, "Plant Explorer");
        assert_eq!(config.request_timeout, Duration::from_secs(2));
        assert_eq!(config.endpoint_policy, EndpointPolicy::HighestSecurity);
        assert_eq!(config.monitored_item.queue_size, 20);
        assert!(config.monitored_item.discard_oldest);
        assert_eq!(config.application_uri, "urn:uax:client");
    }

    #[test]
    fn test_load_toml() {
        let file = write_file(
            ".toml",
            r#"
default_sampling_interval = "250ms"

[subscription]
priority = 5
"#,
        );

        let config = load_file(file.path()).unwrap();
        assert_eq!(config.default_sampling_interval, Duration::from_millis(250));
        assert_eq!(config.subscription.priority, 5);
        assert_eq!(config.subscription.lifetime_count, 10_000);
    }

    #[test]
    fn test_unsupported_extension() {
        let file = write_file(".ini", "application_name = x");
        assert!(load_file(file.path()).is_err());
    }

    #[test]
    fn test_missing_file() {
        let err = load_file(Path::new("/nonexistent/uax.yaml")).unwrap_err();
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_cli_overrides_file() {
        let file = write_file(".yaml", "request_timeout: 9s\n");
        let path = file.path().to_string_lossy().to_string();
        let cli = Cli::parse_from([
            "uax",
            "endpoints",
            "-c",
            path.as_str(),
            "--request-timeout",
            "3s",
            "--highest-security",
        ]);

        let config = load_client_config(&cli).unwrap();
        assert_eq!(config.request_timeout, Duration::from_secs(3));
        assert_eq!(config.endpoint_policy, EndpointPolicy::HighestSecurity);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let file = write_file(".yaml", "monitored_item:\n  queue_size: 0\n");
        let path = file.path().to_string_lossy().to_string();
        let cli = Cli::parse_from(["uax", "endpoints", "-c", path.as_str()]);
        assert!(load_client_config(&cli).is_err());
    }

    #[test]
    fn test_defaults_without_file() {
        let cli = Cli::parse_from(["uax", "endpoints"]);
        let config = load_client_config(&cli).unwrap();
        assert_eq!(config.request_timeout, Duration::from_secs(5));
    }
}
