//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! The admin token is loaded from the KEYD_ADMIN_TOKEN env var or
//! admin_token_file, never stored in the TOML directly to avoid leaking
//! secrets.

use common::Secret;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub keys: KeyPoolConfig,
}

/// HTTP listener settings
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    #[serde(skip)]
    pub admin_token: Option<Secret<String>>,
    /// Path to a file containing the admin token (alternative to the
    /// KEYD_ADMIN_TOKEN env var)
    #[serde(default)]
    pub admin_token_file: Option<PathBuf>,
}

/// Key pool tunables
#[derive(Debug, Deserialize)]
pub struct KeyPoolConfig {
    pub store_path: PathBuf,
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,
    #[serde(default = "default_max_failures")]
    pub max_failures: u32,
}

fn default_cooldown_secs() -> u64 {
    60
}

fn default_max_failures() -> u32 {
    5
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment
    /// variables.
    ///
    /// Admin token resolution order:
    /// 1. KEYD_ADMIN_TOKEN env var
    /// 2. admin_token_file path from config
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;

        if config.keys.cooldown_secs == 0 {
            return Err(common::Error::Config(
                "cooldown_secs must be greater than 0".into(),
            ));
        }

        if config.keys.max_failures == 0 {
            return Err(common::Error::Config(
                "max_failures must be greater than 0".into(),
            ));
        }

        // Resolve admin token: env var takes precedence over file
        if let Ok(token) = std::env::var("KEYD_ADMIN_TOKEN") {
            config.server.admin_token = Some(Secret::new(token));
        } else if let Some(ref token_file) = config.server.admin_token_file {
            let token = std::fs::read_to_string(token_file).map_err(|e| {
                common::Error::Config(format!(
                    "failed to read admin_token_file {}: {e}",
                    token_file.display()
                ))
            })?;
            let token = token.trim().to_owned();
            if !token.is_empty() {
                config.server.admin_token = Some(Secret::new(token));
            }
        }

        Ok(config)
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("/etc/keyd/config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn minimal_config_applies_defaults() {
        let file = write_config(
            r#"
            [server]
            listen_addr = "127.0.0.1:8080"

            [keys]
            store_path = "/var/lib/keyd/keys.json"
            "#,
        );

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.keys.cooldown_secs, 60);
        assert_eq!(config.keys.max_failures, 5);
        assert_eq!(config.server.listen_addr.port(), 8080);
    }

    #[test]
    fn zero_cooldown_is_rejected() {
        let file = write_config(
            r#"
            [server]
            listen_addr = "127.0.0.1:8080"

            [keys]
            store_path = "/var/lib/keyd/keys.json"
            cooldown_secs = 0
            "#,
        );

        let err = Config::load(file.path()).unwrap_err();
        assert!(err.to_string().contains("cooldown_secs"), "got: {err}");
    }

    #[test]
    fn zero_max_failures_is_rejected() {
        let file = write_config(
            r#"
            [server]
            listen_addr = "127.0.0.1:8080"

            [keys]
            store_path = "/var/lib/keyd/keys.json"
            max_failures = 0
            "#,
        );

        let err = Config::load(file.path()).unwrap_err();
        assert!(err.to_string().contains("max_failures"), "got: {err}");
    }

    #[test]
    fn admin_token_file_is_read_and_trimmed() {
        let mut token_file = tempfile::NamedTempFile::new().unwrap();
        token_file.write_all(b"admin-secret\n").unwrap();

        let file = write_config(&format!(
            r#"
            [server]
            listen_addr = "127.0.0.1:8080"
            admin_token_file = "{}"

            [keys]
            store_path = "/var/lib/keyd/keys.json"
            "#,
            token_file.path().display()
        ));

        let config = Config::load(file.path()).unwrap();
        let token = config.server.admin_token.expect("token should be loaded");
        assert_eq!(token.expose(), "admin-secret");
    }

    #[test]
    fn resolve_path_prefers_cli_arg() {
        let path = Config::resolve_path(Some("/tmp/keyd.toml"));
        assert_eq!(path, PathBuf::from("/tmp/keyd.toml"));
    }
}
