use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::constants::MAX_IMAGE_BYTES;
use crate::feedback::Locale;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: {message}")]
    InvalidValue { name: String, message: String },
    #[error("failed to parse {name} as integer: {source}")]
    ParseInt {
        name: String,
        #[source]
        source: std::num::ParseIntError,
    },
    #[error("failed to parse {name} as boolean: {value}")]
    ParseBool { name: String, value: String },
}

/// Process configuration loaded from environment variables.
///
/// Site credentials are not part of this struct; they live in the persisted
/// settings file pointed to by `settings_path`.
#[derive(Debug, Clone)]
pub struct Config {
    // Persisted settings
    pub settings_path: PathBuf,

    // HTTP
    pub http_timeout: Duration,

    // Image pipeline
    pub max_image_bytes: u64,
    pub image_size_probe: bool,
    pub process_images: bool,
    pub allow_private_image_hosts: bool,

    // Messages
    pub locale: Locale,

    // Worker
    pub worker_queue_capacity: usize,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if an environment variable is present but invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            settings_path: PathBuf::from(env_or_default("SETTINGS_PATH", "./data/settings.json")),

            http_timeout: Duration::from_secs(parse_env_u64("HTTP_TIMEOUT_SECS", 30)?),

            max_image_bytes: parse_env_u64("MAX_IMAGE_BYTES", MAX_IMAGE_BYTES)?,
            image_size_probe: parse_env_bool("IMAGE_SIZE_PROBE", true)?,
            process_images: parse_env_bool("PROCESS_IMAGES", true)?,
            allow_private_image_hosts: parse_env_bool("ALLOW_PRIVATE_IMAGE_HOSTS", false)?,

            locale: parse_locale(&env_or_default("LOCALE", "en"))?,

            worker_queue_capacity: parse_env_usize("WORKER_QUEUE_CAPACITY", 16)?,
        })
    }

    /// Defaults suitable for tests: no env lookups, private image hosts allowed
    /// so mock servers on loopback can serve images.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            settings_path: PathBuf::from("./data/test-settings.json"),
            http_timeout: Duration::from_secs(5),
            max_image_bytes: MAX_IMAGE_BYTES,
            image_size_probe: true,
            process_images: true,
            allow_private_image_hosts: true,
            locale: Locale::En,
            worker_queue_capacity: 4,
        }
    }

    /// Validate that the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.http_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                name: "HTTP_TIMEOUT_SECS".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.max_image_bytes == 0 {
            return Err(ConfigError::InvalidValue {
                name: "MAX_IMAGE_BYTES".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.worker_queue_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                name: "WORKER_QUEUE_CAPACITY".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.settings_path.as_os_str().is_empty() {
            return Err(ConfigError::InvalidValue {
                name: "SETTINGS_PATH".to_string(),
                message: "cannot be empty".to_string(),
            });
        }
        Ok(())
    }
}

fn env_or_default(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_env_u64(name: &str, default: u64) -> Result<u64, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn parse_env_usize(name: &str, default: usize) -> Result<usize, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn parse_env_bool(name: &str, default: bool) -> Result<bool, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => match val.to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(true),
            "false" | "0" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::ParseBool {
                name: name.to_string(),
                value: val,
            }),
        },
        _ => Ok(default),
    }
}

fn parse_locale(value: &str) -> Result<Locale, ConfigError> {
    Locale::parse(value).ok_or_else(|| ConfigError::InvalidValue {
        name: "LOCALE".to_string(),
        message: format!("must be 'en' or 'ja', got '{value}'"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_parse_locale() {
        assert_eq!(parse_locale("en").unwrap(), Locale::En);
        assert_eq!(parse_locale("JA").unwrap(), Locale::Ja);
        assert!(parse_locale("fr").is_err());
    }

    #[test]
    fn test_parse_bool() {
        assert!(parse_env_bool("WPBP_NONEXISTENT_VAR", true).unwrap());
        assert!(!parse_env_bool("WPBP_NONEXISTENT_VAR", false).unwrap());
    }

    #[test]
    #[serial]
    fn test_from_env_defaults() {
        for name in [
            "SETTINGS_PATH",
            "HTTP_TIMEOUT_SECS",
            "MAX_IMAGE_BYTES",
            "IMAGE_SIZE_PROBE",
            "PROCESS_IMAGES",
            "ALLOW_PRIVATE_IMAGE_HOSTS",
            "LOCALE",
            "WORKER_QUEUE_CAPACITY",
        ] {
            std::env::remove_var(name);
        }

        let config = Config::from_env().unwrap();
        assert_eq!(config.http_timeout, Duration::from_secs(30));
        assert_eq!(config.max_image_bytes, MAX_IMAGE_BYTES);
        assert!(config.image_size_probe);
        assert!(!config.allow_private_image_hosts);
        assert_eq!(config.locale, Locale::En);
        assert!(config.validate().is_ok());
    }

    #[test]
    #[serial]
    fn test_from_env_rejects_bad_bool() {
        std::env::set_var("IMAGE_SIZE_PROBE", "maybe");
        let result = Config::from_env();
        std::env::remove_var("IMAGE_SIZE_PROBE");
        assert!(matches!(result, Err(ConfigError::ParseBool { .. })));
    }

    #[test]
    fn test_validate_rejects_zero_image_cap() {
        let config = Config {
            max_image_bytes: 0,
            ..Config::for_testing()
        };
        assert!(config.validate().is_err());
    }
}
