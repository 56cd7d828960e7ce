//! Server-level configuration: transport, logging, and backend request timeout.
//!
//! Loaded once at process start from CLI flags merged with an optional
//! `lsp-core.toml`. Absence of the file is not an error; defaults apply.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use serde::Deserialize;
use tracing::warn;

const CONFIG_FILES: &[&str] = &["lsp-core.toml", ".lsp-core.toml"];

/// Command-line surface (§6: "thin, out of scope" beyond these flags).
#[derive(Debug, Parser)]
#[command(name = "lsp-core", about = "Multi-backend LSP dispatch core")]
pub struct Cli {
    /// Serve over stdio (the only transport implemented; reserved for future
    /// transports per spec §6).
    #[arg(long, default_value_t = true)]
    pub stdio: bool,

    /// Path to an `lsp-core.toml` config file. Defaults to searching the
    /// current directory.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Log filter directive (passed to `tracing_subscriber::EnvFilter`).
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

/// The server's resolved configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Timeout passed to backends on forwarded requests. The core itself never
    /// times out a request; see spec §9 Open Question 1.
    pub backend_request_timeout: Duration,
    /// Log filter directive.
    pub log_level: String,
    /// Config file path, if one was found.
    pub config_path: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            backend_request_timeout: Duration::from_secs(30),
            log_level: "info".to_string(),
            config_path: None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    server: ServerSection,
}

#[derive(Debug, Default, Deserialize)]
struct ServerSection {
    backend_request_timeout_ms: Option<u64>,
}

impl ServerConfig {
    /// Builds configuration from parsed CLI flags, loading `lsp-core.toml` if present.
    pub fn from_cli(cli: &Cli) -> Self {
        let mut config = Self {
            log_level: cli.log_level.clone(),
            ..Self::default()
        };

        let path = cli
            .config
            .clone()
            .or_else(|| find_config_file(&std::env::current_dir().unwrap_or_default()));
        let Some(path) = path else {
            return config;
        };
        config.config_path = Some(path.clone());

        let Ok(contents) = std::fs::read_to_string(&path) else {
            warn!("failed to read {}", path.display());
            return config;
        };
        let parsed: ConfigFile = match toml::from_str(&contents) {
            Ok(parsed) => parsed,
            Err(err) => {
                warn!("failed to parse {}: {err}", path.display());
                return config;
            }
        };
        if let Some(ms) = parsed.server.backend_request_timeout_ms {
            config.backend_request_timeout = Duration::from_millis(ms);
        }
        config
    }
}

fn find_config_file(dir: &Path) -> Option<PathBuf> {
    CONFIG_FILES
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_no_config_file_present() {
        let cli = Cli {
            stdio: true,
            config: Some(PathBuf::from("/nonexistent/lsp-core.toml")),
            log_level: "debug".to_string(),
        };
        let config = ServerConfig::from_cli(&cli);
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.backend_request_timeout, Duration::from_secs(30));
    }

    #[test]
    fn reads_backend_timeout_from_toml() {
        let dir = std::env::temp_dir().join(format!("lsp-core-cfg-{}", std::process::id()));
        std::fs::create_dir_all(&dir).expect("create temp dir");
        let path = dir.join("lsp-core.toml");
        std::fs::write(&path, "[server]\nbackend_request_timeout_ms = 5000\n")
            .expect("write config");

        let cli = Cli {
            stdio: true,
            config: Some(path),
            log_level: "info".to_string(),
        };
        let config = ServerConfig::from_cli(&cli);
        assert_eq!(config.backend_request_timeout, Duration::from_millis(5000));

        std::fs::remove_dir_all(&dir).ok();
    }
}
