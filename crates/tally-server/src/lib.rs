//! Tally Server
//!
//! HTTP front end and command line for the Tally aggregation pipeline.
//!
//! # Endpoints
//!
//! - `POST /upload`: multipart upload (field `csv_file`, `text/csv`); the
//!   pipeline runs on a blocking worker and the result is published to the
//!   artifact store. Answers `{"download_url": "..."}`.
//! - `GET /download/{filename}`: serves a committed artifact as an attachment
//! - `GET /health`: liveness probe
//!
//! # Example
//!
//! ```rust,ignore
//! use tally_server::{serve, ServerConfig};
//!
//! let config = ServerConfig::new()
//!     .with_storage_dir("/var/lib/tally")
//!     .with_public_url("https://tally.example.com");
//! serve(config).await?;
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod cli;
pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod server;
pub mod state;
pub mod telemetry;

pub use config::{ConfigError, LogFormat, ServerConfig, DEFAULT_MAX_UPLOAD_BYTES};
pub use error::ApiError;
pub use handlers::UploadResponse;
pub use routes::routes;
pub use server::{serve, serve_with_shutdown};
pub use state::AppState;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
