use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{ParleyError, Result};

/// Top-level configuration for the Parley client.
///
/// Loaded from `~/.parley/config.toml` by default. Every section falls back
/// to its defaults when absent, so an empty file is a valid configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParleyConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub stream: StreamConfig,
    #[serde(default)]
    pub chat: ChatConfig,
}

impl ParleyConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: ParleyConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| ParleyError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Query backend connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Streaming query endpoint (receives `POST {"query": ...}`).
    pub endpoint: String,
    /// TCP connect timeout in seconds.
    pub connect_timeout_secs: u64,
    /// `User-Agent` header sent with every request.
    pub user_agent: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:8000/api/query/stream".to_string(),
            connect_timeout_secs: 10,
            user_agent: format!("parley/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl BackendConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// Response stream decoding settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Marker that prefixes every event record payload.
    pub record_marker: String,
    /// Seconds without a new chunk before the session is abandoned.
    pub idle_timeout_secs: u64,
    /// Largest unterminated record held in memory, in bytes.
    pub max_buffered_bytes: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            record_marker: "data: ".to_string(),
            idle_timeout_secs: 120,
            max_buffered_bytes: 8 * 1024 * 1024,
        }
    }
}

impl StreamConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}

/// Query submission settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Maximum query length in characters.
    pub max_query_length: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            max_query_length: 2000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_default_config() {
        let config = ParleyConfig::default();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(
            config.backend.endpoint,
            "http://127.0.0.1:8000/api/query/stream"
        );
        assert_eq!(config.backend.connect_timeout_secs, 10);
        assert!(config.backend.user_agent.starts_with("parley/"));
        assert_eq!(config.stream.record_marker, "data: ");
        assert_eq!(config.stream.idle_timeout_secs, 120);
        assert_eq!(config.stream.max_buffered_bytes, 8 * 1024 * 1024);
        assert_eq!(config.chat.max_query_length, 2000);
    }

    #[test]
    fn test_load_valid_config() {
        let content = r#"
[general]
log_level = "debug"

[backend]
endpoint = "https://analytics.example.com/ask"
connect_timeout_secs = 3
user_agent = "parley-test"

[stream]
record_marker = "event: "
idle_timeout_secs = 30
max_buffered_bytes = 65536

[chat]
max_query_length = 500
"#;
        let file = create_temp_config(content);
        let config = ParleyConfig::load(file.path()).unwrap();
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.backend.endpoint, "https://analytics.example.com/ask");
        assert_eq!(config.backend.connect_timeout(), Duration::from_secs(3));
        assert_eq!(config.backend.user_agent, "parley-test");
        assert_eq!(config.stream.record_marker, "event: ");
        assert_eq!(config.stream.idle_timeout(), Duration::from_secs(30));
        assert_eq!(config.stream.max_buffered_bytes, 65536);
        assert_eq!(config.chat.max_query_length, 500);
    }

    #[test]
    fn test_load_partial_config_uses_defaults() {
        let content = r#"
[stream]
idle_timeout_secs = 5
"#;
        let file = create_temp_config(content);
        let config = ParleyConfig::load(file.path()).unwrap();
        assert_eq!(config.stream.idle_timeout_secs, 5);
        // Remaining fields use defaults
        assert_eq!(config.stream.record_marker, "data: ");
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.chat.max_query_length, 2000);
    }

    #[test]
    fn test_empty_toml_uses_all_defaults() {
        let file = create_temp_config("");
        let config = ParleyConfig::load(file.path()).unwrap();
        assert_eq!(config.stream.idle_timeout_secs, 120);
        assert_eq!(config.backend.connect_timeout_secs, 10);
    }

    #[test]
    fn test_load_invalid_toml() {
        let file = create_temp_config("this is {{ not valid TOML");
        let result = ParleyConfig::load(file.path());
        assert!(matches!(result, Err(ParleyError::Config(_))));
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config = ParleyConfig::load_or_default(Path::new("/nonexistent/parley.toml"));
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.stream.idle_timeout_secs, 120);
    }

    #[test]
    fn test_save_creates_parent_dirs_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = ParleyConfig::default();
        config.backend.endpoint = "http://localhost:9999/stream".to_string();
        config.stream.idle_timeout_secs = 42;
        config.save(&path).unwrap();

        assert!(path.exists());
        let reloaded = ParleyConfig::load(&path).unwrap();
        assert_eq!(reloaded.backend.endpoint, "http://localhost:9999/stream");
        assert_eq!(reloaded.stream.idle_timeout_secs, 42);
        assert_eq!(reloaded.stream.record_marker, config.stream.record_marker);
    }
}
