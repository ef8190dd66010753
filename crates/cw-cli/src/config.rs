use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use cw_core::{WidgetConfig, CAMPAIGN_CONTEXT};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the site serving `/api/chat`
    pub endpoint: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Conversation domain sent with every message
    pub context: String,

    /// Delay before the signup follow-up prompt, in milliseconds
    pub follow_up_delay_ms: u64,

    /// Public site URL, used for share links
    pub site_url: String,

    /// Page path reported with analytics events
    pub page: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:3000".to_string(),
            timeout_secs: 30,
            context: CAMPAIGN_CONTEXT.to_string(),
            follow_up_delay_ms: 1000,
            site_url: "https://amyphanwest.com".to_string(),
            page: "/".to_string(),
        }
    }
}

impl Config {
    /// Defaults, then `config.toml` if present, then `CW_*` environment
    /// variables.
    pub fn load() -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Ok(path) = Self::config_path() {
            figment = figment.merge(Toml::file(path));
        }
        let config: Config = figment.merge(Env::prefixed("CW_")).extract()?;
        Ok(config)
    }

    #[cfg(test)]
    pub fn from_toml_str(toml: &str) -> Result<Self> {
        let config: Config = Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::string(toml))
            .extract()?;
        Ok(config)
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    pub fn config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        Ok(config_dir.join("cw"))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn widget_config(&self) -> WidgetConfig {
        WidgetConfig {
            context: self.context.clone(),
            follow_up_delay: Duration::from_millis(self.follow_up_delay_ms),
            ..WidgetConfig::default()
        }
    }

    /// Full URL of the tracked page.
    pub fn page_url(&self) -> String {
        format!(
            "{}/{}",
            self.site_url.trim_end_matches('/'),
            self.page.trim_start_matches('/')
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config.endpoint, "http://localhost:3000");
        assert_eq!(config.context, "amy_campaign");
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert_eq!(config.widget_config().follow_up_delay, Duration::from_secs(1));
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
            endpoint = "https://amyphanwest.com"
            timeout_secs = 5
            follow_up_delay_ms = 250
            page = "/issues"
        "#;

        let config = Config::from_toml_str(toml).unwrap();
        assert_eq!(config.endpoint, "https://amyphanwest.com");
        assert_eq!(config.timeout(), Duration::from_secs(5));
        assert_eq!(
            config.widget_config().follow_up_delay,
            Duration::from_millis(250)
        );
        // Unset keys keep their defaults
        assert_eq!(config.context, "amy_campaign");
        assert_eq!(config.page_url(), "https://amyphanwest.com/issues");
    }

    #[test]
    fn test_rejects_wrong_type() {
        assert!(Config::from_toml_str("timeout_secs = \"soon\"").is_err());
    }
}
