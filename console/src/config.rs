// Runtime configuration.
//
// Layered: `console.toml` in the working directory (optional), then
// environment variables with the `CONSOLE` prefix (e.g.
// `CONSOLE__DATABASE_URL`, `CONSOLE__BACKEND__API_KEY`).

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::utils::validation::MAX_UPLOAD_BYTES;

/// Hosted backend endpoints (object storage + callable functions) behind a
/// single base URL and API key.
#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    pub base_url: String,
    pub api_key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConsoleConfig {
    /// Postgres URL for the record store.
    pub database_url: String,
    pub backend: BackendConfig,
    #[serde(default = "default_document_bucket")]
    pub document_bucket: String,
    #[serde(default = "default_autosave_debounce_ms")]
    pub autosave_debounce_ms: u64,
    #[serde(default = "default_save_timeout_secs")]
    pub save_timeout_secs: u64,
    #[serde(default = "default_close_save_timeout_secs")]
    pub close_save_timeout_secs: u64,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,
    /// Override for the on-device cache location; defaults to the per-user
    /// data dir.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

fn default_document_bucket() -> String {
    "merchant-documents".to_string()
}

fn default_autosave_debounce_ms() -> u64 {
    1500
}

fn default_save_timeout_secs() -> u64 {
    3
}

fn default_close_save_timeout_secs() -> u64 {
    2
}

fn default_max_upload_bytes() -> u64 {
    MAX_UPLOAD_BYTES
}

impl ConsoleConfig {
    pub fn load() -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name("console").required(false))
            .add_source(config::Environment::with_prefix("CONSOLE").separator("__"))
            .build()
            .context("Failed to assemble configuration sources")?;

        settings
            .try_deserialize::<ConsoleConfig>()
            .context("Invalid console configuration")
    }

    pub fn autosave_debounce(&self) -> Duration {
        Duration::from_millis(self.autosave_debounce_ms)
    }

    pub fn save_timeout(&self) -> Duration {
        Duration::from_secs(self.save_timeout_secs)
    }

    pub fn close_save_timeout(&self) -> Duration {
        Duration::from_secs(self.close_save_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toml_config_parses_with_defaults() {
        let cfg: ConsoleConfig = toml::from_str(
            r#"
            database_url = "postgresql://console:pw@db.internal:5432/onboarding"

            [backend]
            base_url = "https://backend.example.com"
            api_key = "service-key"
            "#,
        )
        .expect("config should parse");

        assert_eq!(cfg.document_bucket, "merchant-documents");
        assert_eq!(cfg.autosave_debounce_ms, 1500);
        assert_eq!(cfg.save_timeout_secs, 3);
        assert_eq!(cfg.close_save_timeout_secs, 2);
        assert_eq!(cfg.max_upload_bytes, MAX_UPLOAD_BYTES);
        assert_eq!(cfg.autosave_debounce(), Duration::from_millis(1500));
    }

    #[test]
    fn explicit_values_override_defaults() {
        let cfg: ConsoleConfig = toml::from_str(
            r#"
            database_url = "postgresql://console:pw@db.internal:5432/onboarding"
            autosave_debounce_ms = 250
            document_bucket = "merchant-documents-staging"

            [backend]
            base_url = "https://backend.example.com"
            api_key = "service-key"
            "#,
        )
        .expect("config should parse");

        assert_eq!(cfg.autosave_debounce_ms, 250);
        assert_eq!(cfg.document_bucket, "merchant-documents-staging");
    }
}
