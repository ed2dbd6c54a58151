use std::env;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "compact" => Ok(LogFormat::Compact),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("expected compact or json, got {other}")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PhotoSettings {
    pub bucket: String,
    pub public_base_url: String,
    pub storage_enabled: bool,
}

impl Default for PhotoSettings {
    fn default() -> Self {
        Self {
            bucket: "order-photos".to_string(),
            public_base_url: "http://localhost:3000/storage".to_string(),
            storage_enabled: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub event_buffer_size: usize,
    pub photos: PhotoSettings,
    /// Shared secret for order intake. Intake is open when unset.
    pub intake_key: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();
        let defaults = PhotoSettings::default();

        Ok(Self {
            http_port: parse_or_default("HTTP_PORT", 3000)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            log_format: parse_or_default("LOG_FORMAT", LogFormat::Compact)?,
            event_buffer_size: parse_or_default("EVENT_BUFFER_SIZE", 1024)?,
            photos: PhotoSettings {
                bucket: env::var("PHOTO_BUCKET").unwrap_or(defaults.bucket),
                public_base_url: env::var("PHOTO_PUBLIC_BASE_URL")
                    .unwrap_or(defaults.public_base_url),
                storage_enabled: parse_or_default("PHOTO_STORAGE_ENABLED", defaults.storage_enabled)?,
            },
            intake_key: env::var("INTAKE_KEY")
                .ok()
                .map(|key| key.trim().to_string())
                .filter(|key| !key.is_empty()),
        })
    }
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|err| AppError::Internal(format!("invalid {key}: {err}"))),
        Err(_) => Ok(default),
    }
}
