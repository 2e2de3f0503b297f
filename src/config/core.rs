use anyhow::{Context, Result, bail};
use figment::{
    Figment,
    providers::{Env, Format, Json, Serialized, Toml, Yaml},
};
use serde::Serialize;
use std::path::Path;

use super::DispatchConfig;

// Embed the default config at compile time
const DEFAULT_CONFIG: &str = include_str!("../../default-config.toml");

/// Layered configuration: defaults, user file, repo file, custom file, environment, overrides
pub struct ConfigLoader {
    figment: Figment,
}

impl ConfigLoader {
    pub fn load() -> Result<Self> {
        Self::load_with_custom_config(None)
    }

    pub fn load_with_custom_config(custom_config: Option<&str>) -> Result<Self> {
        tracing::trace!("CONFIG LOAD: Starting");

        let user_base = Self::user_config_base_path();
        let mut figment = Figment::new()
            .merge(Toml::string(DEFAULT_CONFIG)) // Embedded defaults
            // User config - support multiple formats
            .merge(Toml::file(format!("{user_base}.toml")))
            .merge(Json::file(format!("{user_base}.json")))
            .merge(Yaml::file(format!("{user_base}.yaml")))
            .merge(Yaml::file(format!("{user_base}.yml")))
            // Repository config - support multiple formats
            .merge(Toml::file("mpjob.toml"))
            .merge(Json::file("mpjob.json"))
            .merge(Yaml::file("mpjob.yaml"))
            .merge(Yaml::file("mpjob.yml"));

        if let Some(custom_path) = custom_config {
            tracing::trace!("CONFIG LOAD: Custom config {}", custom_path);
            figment = figment.merge(Self::file_provider(custom_path)?);
        }

        // Environment variables always beat files
        figment = figment.merge(Env::prefixed("MPJOB_"));

        Ok(ConfigLoader { figment })
    }

    /// Merge CLI overrides with the highest priority
    pub fn with_overrides<T: Serialize>(self, overrides: T) -> Self {
        tracing::trace!("CONFIG LOAD: Applying CLI overrides");
        Self {
            figment: self.figment.merge(Serialized::defaults(overrides)),
        }
    }

    /// Extract and validate the merged configuration
    pub fn extract(&self) -> Result<DispatchConfig> {
        let config: DispatchConfig = self
            .figment
            .extract()
            .context("Failed to parse mpjob configuration")?;
        config.validate().context("Invalid mpjob configuration")?;
        tracing::debug!("Loaded configuration: {:?}", config);
        Ok(config)
    }

    /// Get the full merged configuration as a structured value
    pub fn get_full_config(&self) -> Result<serde_json::Value> {
        Ok(self.figment.extract()?)
    }

    fn file_provider(path: &str) -> Result<Figment> {
        if !Path::new(path).is_file() {
            bail!("Config file not found: {}", path);
        }
        let extension = Path::new(path)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);
        let figment = match extension.as_deref() {
            Some("json") => Figment::from(Json::file(path)),
            Some("yaml") | Some("yml") => Figment::from(Yaml::file(path)),
            _ => Figment::from(Toml::file(path)),
        };
        Ok(figment)
    }

    fn user_config_base_path() -> String {
        match std::env::var("HOME") {
            Ok(home) => format!("{}/.config/mpjob/config", home),
            Err(_) => "~/.config/mpjob/config".to_string(),
        }
    }
}
