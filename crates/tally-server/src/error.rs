//! API error types
//!
//! Every failure a handler or filter can produce is funnelled into
//! [`ApiError`], which owns the mapping to a status code and body.

use serde::Serialize;
use std::convert::Infallible;
use tally_pipeline::PipelineError;
use tally_store::{NameError, StoreError};
use tracing::{error, warn};
use warp::http::StatusCode;
use warp::reply::{self, Reply, Response};
use warp::Rejection;

/// Errors returned to HTTP clients
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// No usable `csv_file` part in the request
    #[error("Could not get uploaded file.")]
    MissingFile,

    /// Upload part is not declared as `text/csv`
    #[error("Invalid file type. Please upload a CSV file.")]
    InvalidFileType,

    /// Request body larger than the configured limit
    #[error("Uploaded file is too large.")]
    PayloadTooLarge,

    /// Upload sent without a `Content-Length`
    #[error("Content-Length header is required.")]
    LengthRequired,

    /// Uploaded content could not be aggregated
    #[error("Error processing CSV file: {0}")]
    InvalidInput(#[source] PipelineError),

    /// Aggregate could not be serialized
    #[error("Error generating result CSV.")]
    Output(#[source] PipelineError),

    /// Artifact could not be persisted or read
    #[error("Error generating result CSV.")]
    Storage(#[source] StoreError),

    /// Download name failed validation
    #[error("Invalid filename")]
    InvalidFilename(#[source] NameError),

    /// No artifact under that name
    #[error("File not found")]
    NotFound,

    /// No route matched
    #[error("Not found")]
    RouteNotFound,

    /// Route exists under another method
    #[error("Method not allowed")]
    MethodNotAllowed,

    /// Cross-origin request from a foreign origin
    #[error("Origin not allowed")]
    CorsForbidden,

    /// Unexpected failure (task panic, unknown rejection)
    #[error("Internal server error")]
    Internal(String),
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
}

impl ApiError {
    /// Create internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// HTTP status for this error
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MissingFile | Self::InvalidFileType | Self::InvalidFilename(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::LengthRequired => StatusCode::LENGTH_REQUIRED,
            Self::InvalidInput(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::NotFound | Self::RouteNotFound => StatusCode::NOT_FOUND,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::CorsForbidden => StatusCode::FORBIDDEN,
            Self::Output(_) | Self::Storage(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Convert into a response, logging server-side failures
    pub fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            match &self {
                Self::Output(source) => error!(error = %source, "failed to write aggregate"),
                Self::Storage(source) => error!(error = %source, "artifact store failure"),
                Self::Internal(detail) => error!(%detail, "internal error"),
                _ => error!(error = %self, "request failed"),
            }
        } else {
            warn!(status = status.as_u16(), error = %self, "request rejected");
        }

        // Invalid download names answer in plain text
        if let Self::InvalidFilename(_) = self {
            return reply::with_status(self.to_string(), status).into_response();
        }

        let message = self.to_string();
        reply::with_status(reply::json(&ErrorBody { error: &message }), status).into_response()
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        if err.is_input_error() {
            Self::InvalidInput(err)
        } else {
            Self::Output(err)
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::InvalidName(name) => Self::InvalidFilename(name),
            StoreError::NotFound(_) => Self::NotFound,
            err @ StoreError::Io { .. } => Self::Storage(err),
        }
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::internal(format!("pipeline task failed: {err}"))
    }
}

/// Turn warp rejections into [`ApiError`] responses
///
/// Rejections that only the upload route can raise (missing or malformed
/// multipart headers) are reported as a missing file.
pub async fn handle_rejection(err: Rejection) -> Result<Response, Infallible> {
    let api_error = if err.is_not_found() {
        ApiError::RouteNotFound
    } else if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        ApiError::PayloadTooLarge
    } else if err.find::<warp::reject::LengthRequired>().is_some() {
        ApiError::LengthRequired
    } else if err.find::<warp::cors::CorsForbidden>().is_some() {
        ApiError::CorsForbidden
    } else if err.find::<warp::reject::InvalidHeader>().is_some()
        || err.find::<warp::reject::MissingHeader>().is_some()
        || err.find::<warp::reject::UnsupportedMediaType>().is_some()
    {
        ApiError::MissingFile
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        ApiError::MethodNotAllowed
    } else {
        ApiError::internal(format!("unhandled rejection: {err:?}"))
    };
    Ok(api_error.into_response())
}
