//! Runtime configuration.
//!
//! Mail settings come from the `MAIL_*` environment variables; everything
//! else is supplied by the embedding binary.

use std::path::PathBuf;
use thiserror::Error;

pub const DEFAULT_MAIL_SERVER: &str = "smtp.gmail.com";
pub const DEFAULT_MAIL_PORT: u16 = 587;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key} must be a port number, got `{value}`")]
    InvalidPort { key: &'static str, value: String },
    #[error("{key} must be a boolean, got `{value}`")]
    InvalidBool { key: &'static str, value: String },
}

/// Outbound mail settings.
#[derive(Clone, PartialEq, Eq)]
pub struct MailSettings {
    pub server: String,
    pub port: u16,
    pub use_tls: bool,
    pub use_ssl: bool,
    pub username: Option<String>,
    pub password: Option<String>,
    pub default_sender: Option<String>,
}

impl Default for MailSettings {
    fn default() -> Self {
        Self {
            server: DEFAULT_MAIL_SERVER.to_string(),
            port: DEFAULT_MAIL_PORT,
            use_tls: true,
            use_ssl: false,
            username: None,
            password: None,
            default_sender: None,
        }
    }
}

// Keeps the password out of debug output and logs.
impl std::fmt::Debug for MailSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailSettings")
            .field("server", &self.server)
            .field("port", &self.port)
            .field("use_tls", &self.use_tls)
            .field("use_ssl", &self.use_ssl)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("default_sender", &self.default_sender)
            .finish()
    }
}

impl MailSettings {
    /// Reads settings from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads settings through `lookup`; blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let defaults = Self::default();

        let port = match get("MAIL_PORT") {
            Some(value) => value.parse::<u16>().map_err(|_| ConfigError::InvalidPort {
                key: "MAIL_PORT",
                value,
            })?,
            None => defaults.port,
        };
        let use_tls = match get("MAIL_USE_TLS") {
            Some(value) => parse_bool("MAIL_USE_TLS", value)?,
            None => defaults.use_tls,
        };
        let use_ssl = match get("MAIL_USE_SSL") {
            Some(value) => parse_bool("MAIL_USE_SSL", value)?,
            None => defaults.use_ssl,
        };
        let username = get("MAIL_USERNAME");
        let default_sender = get("MAIL_DEFAULT_SENDER").or_else(|| username.clone());

        Ok(Self {
            server: get("MAIL_SERVER").unwrap_or(defaults.server),
            port,
            use_tls,
            use_ssl,
            username,
            password: get("MAIL_PASSWORD"),
            default_sender,
        })
    }

    /// Mail counts as configured once a username is set.
    pub fn is_configured(&self) -> bool {
        self.username.is_some()
    }
}

fn parse_bool(key: &'static str, value: String) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidBool { key, value }),
    }
}

/// Settings an embedding binary assembles before opening the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub db_path: PathBuf,
    pub log_level: Option<String>,
    pub log_dir: PathBuf,
    pub mail: MailSettings,
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, MailSettings, DEFAULT_MAIL_PORT};
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn empty_environment_is_unconfigured() {
        let settings = MailSettings::from_lookup(lookup(&[])).unwrap();
        assert!(!settings.is_configured());
        assert_eq!(settings.port, DEFAULT_MAIL_PORT);
        assert!(settings.use_tls);
    }

    #[test]
    fn username_enables_mail_and_defaults_sender() {
        let settings = MailSettings::from_lookup(lookup(&[
            ("MAIL_SERVER", "smtp.lab.test"),
            ("MAIL_PORT", "465"),
            ("MAIL_USE_TLS", "false"),
            ("MAIL_USE_SSL", "True"),
            ("MAIL_USERNAME", "bot@lab.test"),
            ("MAIL_PASSWORD", "hunter2"),
        ]))
        .unwrap();
        assert!(settings.is_configured());
        assert_eq!(settings.server, "smtp.lab.test");
        assert_eq!(settings.port, 465);
        assert!(!settings.use_tls);
        assert!(settings.use_ssl);
        assert_eq!(settings.default_sender.as_deref(), Some("bot@lab.test"));
    }

    #[test]
    fn blank_username_is_unset() {
        let settings = MailSettings::from_lookup(lookup(&[("MAIL_USERNAME", "  ")])).unwrap();
        assert!(!settings.is_configured());
    }

    #[test]
    fn bad_port_is_rejected() {
        let err = MailSettings::from_lookup(lookup(&[("MAIL_PORT", "smtp")])).unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidPort {
                key: "MAIL_PORT",
                value: "smtp".to_string()
            }
        );
    }

    #[test]
    fn debug_output_masks_password() {
        let settings =
            MailSettings::from_lookup(lookup(&[("MAIL_PASSWORD", "hunter2")])).unwrap();
        assert!(!format!("{settings:?}").contains("hunter2"));
    }
}
