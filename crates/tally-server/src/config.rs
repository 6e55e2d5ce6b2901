//! Service configuration
//!
//! Defaults match a local development setup: API on port 8080, browser
//! client on port 3000, artifacts under `./processed_files`.

use std::fmt::{self, Display, Formatter};
use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use tally_pipeline::{HeaderPolicy, PipelineOptions};
use tally_store::{validate_prefix, NameError};

/// Default upload limit (10MB)
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Pretty,
    /// One JSON object per event
    Json,
}

impl Display for LogFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pretty => "pretty",
            Self::Json => "json",
        })
    }
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            _ => Err(ConfigError::UnknownLogFormat(s.to_string())),
        }
    }
}

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// `--log-format` value not recognised
    #[error("unknown log format '{0}' (expected pretty or json)")]
    UnknownLogFormat(String),

    /// Upload limit of zero
    #[error("max upload size must be greater than zero")]
    ZeroUploadLimit,

    /// Empty artifact prefix
    #[error("artifact prefix must not be empty")]
    EmptyPrefix,

    /// Prefix yields unusable artifact names
    #[error("artifact prefix '{prefix}' does not form a valid file name: {source}")]
    InvalidPrefix {
        /// Rejected prefix
        prefix: String,
        /// Why the widest generated name fails
        #[source]
        source: NameError,
    },

    /// Public URL without an http(s) scheme
    #[error("public url must start with http:// or https://, got '{0}'")]
    InvalidPublicUrl(String),

    /// CORS origin that is not a bare scheme://host[:port]
    #[error("allowed origin must be scheme://host[:port], got '{0}'")]
    InvalidOrigin(String),
}

fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

fn is_origin(value: &str) -> bool {
    value
        .split_once("://")
        .is_some_and(|(scheme, authority)| {
            matches!(scheme, "http" | "https")
                && !authority.is_empty()
                && !authority.contains(['/', '?', '#'])
                && !authority.chars().any(char::is_whitespace)
        })
}

/// HTTP service configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Listen address
    pub bind: SocketAddr,
    /// Externally visible base URL, used in download links
    pub public_url: String,
    /// Single origin allowed by CORS
    pub allowed_origin: String,
    /// Artifact directory
    pub storage_dir: PathBuf,
    /// Prefix of generated artifact names
    pub artifact_prefix: String,
    /// Largest accepted request body
    pub max_upload_bytes: u64,
    /// First-row handling for uploads
    pub header: HeaderPolicy,
}

impl ServerConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With listen address
    #[inline]
    #[must_use]
    pub fn with_bind(mut self, bind: SocketAddr) -> Self {
        self.bind = bind;
        self
    }

    /// With public base URL
    #[inline]
    #[must_use]
    pub fn with_public_url(mut self, url: impl Into<String>) -> Self {
        self.public_url = url.into();
        self
    }

    /// With CORS origin
    #[inline]
    #[must_use]
    pub fn with_allowed_origin(mut self, origin: impl Into<String>) -> Self {
        self.allowed_origin = origin.into();
        self
    }

    /// With artifact directory
    #[inline]
    #[must_use]
    pub fn with_storage_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.storage_dir = dir.into();
        self
    }

    /// With artifact name prefix
    #[inline]
    #[must_use]
    pub fn with_artifact_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.artifact_prefix = prefix.into();
        self
    }

    /// With upload size limit
    #[inline]
    #[must_use]
    pub fn with_max_upload_bytes(mut self, max: u64) -> Self {
        self.max_upload_bytes = max;
        self
    }

    /// With header policy
    #[inline]
    #[must_use]
    pub fn with_header(mut self, header: HeaderPolicy) -> Self {
        self.header = header;
        self
    }

    /// Pipeline options for uploads
    #[inline]
    #[must_use]
    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions::new().with_header(self.header)
    }

    /// Check and normalise the configuration
    ///
    /// # Errors
    /// Returns the first invalid setting
    pub fn validate(mut self) -> Result<Self, ConfigError> {
        if self.max_upload_bytes == 0 {
            return Err(ConfigError::ZeroUploadLimit);
        }
        if self.artifact_prefix.is_empty() {
            return Err(ConfigError::EmptyPrefix);
        }
        if let Err(source) = validate_prefix(&self.artifact_prefix) {
            return Err(ConfigError::InvalidPrefix {
                prefix: self.artifact_prefix,
                source,
            });
        }
        if !is_http_url(&self.public_url) {
            return Err(ConfigError::InvalidPublicUrl(self.public_url));
        }
        if !is_origin(&self.allowed_origin) {
            return Err(ConfigError::InvalidOrigin(self.allowed_origin));
        }
        let trimmed = self.public_url.trim_end_matches('/').len();
        self.public_url.truncate(trimmed);
        Ok(self)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from((Ipv4Addr::UNSPECIFIED, 8080)),
            public_url: "http://localhost:8080".to_string(),
            allowed_origin: "http://localhost:3000".to_string(),
            storage_dir: PathBuf::from("processed_files"),
            artifact_prefix: "city_sales".to_string(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            header: HeaderPolicy::Detect,
        }
    }
}
