use std::env;

use crate::core::error::ConfigError;
use crate::shared::constants::DEFAULT_PRESIGNED_URL_EXPIRY_SECS;
use crate::shared::validation::is_valid_bucket_name;

#[derive(Debug, Clone)]
pub struct Config {
    pub minio: MinIOConfig,
}

/// MinIO/S3 storage configuration
#[derive(Debug, Clone)]
pub struct MinIOConfig {
    /// Whether the storage template is wired at all
    pub enabled: bool,
    /// MinIO/S3 endpoint URL
    pub endpoint: String,
    /// Access key for authentication
    pub access_key: String,
    /// Secret key for authentication
    pub secret_key: String,
    /// Default bucket, used whenever an operation omits the bucket
    pub bucket: String,
    /// AWS region (for S3 compatibility)
    pub region: String,
    /// Presigned URL expiry time in seconds when the caller gives none
    pub presigned_url_expiry_secs: u32,
    /// Create the default bucket at startup if it is missing
    pub auto_create_bucket: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if exists, ignore if not found (optional for production)
        if let Err(e) = dotenvy::dotenv() {
            if !e.not_found() {
                eprintln!("Warning: Error loading .env file: {}", e);
            }
        }

        Ok(Config {
            minio: MinIOConfig::from_env()?,
        })
    }
}

impl Default for MinIOConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: MinIOConfig::DEFAULT_ENDPOINT.to_string(),
            access_key: MinIOConfig::DEFAULT_CREDENTIAL.to_string(),
            secret_key: MinIOConfig::DEFAULT_CREDENTIAL.to_string(),
            bucket: MinIOConfig::DEFAULT_BUCKET.to_string(),
            region: MinIOConfig::DEFAULT_REGION.to_string(),
            presigned_url_expiry_secs: DEFAULT_PRESIGNED_URL_EXPIRY_SECS,
            auto_create_bucket: true,
        }
    }
}

impl MinIOConfig {
    const DEFAULT_ENDPOINT: &'static str = "http://localhost:9000";
    const DEFAULT_CREDENTIAL: &'static str = "minioadmin";
    const DEFAULT_BUCKET: &'static str = "default";
    const DEFAULT_REGION: &'static str = "us-east-1";

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from any key lookup, falling back to defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let enabled = match lookup("MINIO_ENABLED") {
            Some(value) => parse_bool("MINIO_ENABLED", &value)?,
            None => defaults.enabled,
        };

        let endpoint = lookup("MINIO_ENDPOINT").unwrap_or(defaults.endpoint);
        if endpoint.trim().is_empty() {
            return Err(ConfigError::Empty {
                var: "MINIO_ENDPOINT",
            });
        }

        let access_key = lookup("MINIO_ACCESS_KEY").unwrap_or(defaults.access_key);
        let secret_key = lookup("MINIO_SECRET_KEY").unwrap_or(defaults.secret_key);

        let bucket = lookup("MINIO_BUCKET").unwrap_or(defaults.bucket);
        if !is_valid_bucket_name(&bucket) {
            return Err(ConfigError::InvalidBucketName {
                var: "MINIO_BUCKET",
                value: bucket,
            });
        }

        let region = lookup("MINIO_REGION").unwrap_or(defaults.region);

        let presigned_url_expiry_secs = match lookup("MINIO_PRESIGNED_URL_EXPIRY_SECS") {
            Some(value) => value
                .trim()
                .parse::<u32>()
                .map_err(|_| ConfigError::InvalidNumber {
                    var: "MINIO_PRESIGNED_URL_EXPIRY_SECS",
                    value,
                })?,
            None => defaults.presigned_url_expiry_secs,
        };

        let auto_create_bucket = match lookup("MINIO_AUTO_CREATE_BUCKET") {
            Some(value) => parse_bool("MINIO_AUTO_CREATE_BUCKET", &value)?,
            None => defaults.auto_create_bucket,
        };

        Ok(Self {
            enabled,
            endpoint,
            access_key,
            secret_key,
            bucket,
            region,
            presigned_url_expiry_secs,
            auto_create_bucket,
        })
    }
}

fn parse_bool(var: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidBool {
            var,
            value: value.to_string(),
        }),
    }
}
