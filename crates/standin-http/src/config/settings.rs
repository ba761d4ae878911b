//! Process settings.

use serde::{Deserialize, Serialize};

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_webhook_timeout() -> u64 {
    10
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Base URL substituted for the `{$webhook_url}` generator marker.
    #[serde(default)]
    pub webhook_base_url: String,
    /// Outbound webhook timeout in seconds. Expiry is a transport failure.
    #[serde(default = "default_webhook_timeout")]
    pub webhook_timeout_secs: u64,
    /// When true, a webhook spawned for an aborted inbound request runs to
    /// completion on its own task; when false it is dropped with the
    /// connection.
    #[serde(default = "default_true")]
    pub webhook_detach: bool,
    #[serde(default)]
    pub rate_limit: Option<RateLimitSettings>,
}

/// Fixed-window admission limits, keyed by client+route.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitSettings {
    pub limit: u32,
    pub period_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            webhook_base_url: String::new(),
            webhook_timeout_secs: default_webhook_timeout(),
            webhook_detach: default_true(),
            rate_limit: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.port, 8000);
        assert_eq!(settings.webhook_timeout_secs, 10);
        assert!(settings.webhook_detach);
        assert!(settings.rate_limit.is_none());
    }

    #[test]
    fn test_parse_settings() {
        let yaml = r#"
port: 9000
webhook_base_url: "http://hooks.local"
webhook_detach: false
rate_limit:
  limit: 100
  period_secs: 60
"#;
        let settings: Settings = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(settings.port, 9000);
        assert_eq!(settings.webhook_base_url, "http://hooks.local");
        assert!(!settings.webhook_detach);
        assert_eq!(settings.rate_limit.unwrap().limit, 100);
    }
}
