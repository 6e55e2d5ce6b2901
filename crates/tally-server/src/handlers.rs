//! Request handlers
//!
//! Handlers never reject; every failure becomes an [`ApiError`] response.

use crate::error::ApiError;
use crate::state::AppState;
use bytes::{Buf, Bytes, BytesMut};
use futures::TryStreamExt;
use serde::Serialize;
use std::convert::Infallible;
use std::sync::Arc;
use tally_pipeline::PipelineOptions;
use tally_store::{ArtifactName, ArtifactStore};
use tracing::{debug, info, warn};
use warp::http::{header, StatusCode};
use warp::multipart::{FormData, Part};
use warp::reply::{self, Reply, Response};

/// Multipart field carrying the upload
pub const UPLOAD_FIELD: &str = "csv_file";

/// Accepted upload media type
pub const CSV_MEDIA_TYPE: &str = "text/csv";

/// Successful upload body
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    /// Absolute link to the generated artifact
    pub download_url: String,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// `POST /upload`
pub async fn upload(form: FormData, state: Arc<AppState>) -> Result<Response, Infallible> {
    Ok(match upload_inner(form, &state).await {
        Ok(response) => response,
        Err(err) => err.into_response(),
    })
}

async fn upload_inner(form: FormData, state: &AppState) -> Result<Response, ApiError> {
    let content = read_csv_part(form).await?;
    debug!(bytes = content.len(), "received upload");

    let store = Arc::clone(&state.store);
    let options = state.config.pipeline_options();
    let name = tokio::task::spawn_blocking(move || aggregate_upload(&store, &content, &options))
        .await??;

    let body = UploadResponse {
        download_url: format!("{}/download/{}", state.config.public_url, name),
    };
    Ok(reply::with_status(reply::json(&body), StatusCode::OK).into_response())
}

/// Run the pipeline over an in-memory upload into a fresh artifact
fn aggregate_upload(
    store: &ArtifactStore,
    content: &[u8],
    options: &PipelineOptions,
) -> Result<ArtifactName, ApiError> {
    let mut writer = store.create()?;
    let mut input = content;
    let summary = tally_pipeline::process(&mut input, &mut writer, options)?;
    let name = writer.commit()?;
    info!(
        artifact = %name,
        rows = summary.rows_read,
        groups = summary.groups,
        header_skipped = summary.header_skipped,
        "upload aggregated"
    );
    Ok(name)
}

/// Pull the `csv_file` part out of the form
async fn read_csv_part(form: FormData) -> Result<Bytes, ApiError> {
    let mut form = std::pin::pin!(form);
    while let Some(part) = form.try_next().await.map_err(|err| {
        warn!(error = %err, "unreadable multipart body");
        ApiError::MissingFile
    })? {
        if part.name() != UPLOAD_FIELD {
            continue;
        }
        if part.filename().is_none() {
            return Err(ApiError::MissingFile);
        }
        if !is_csv(part.content_type()) {
            return Err(ApiError::InvalidFileType);
        }
        return collect_part(part).await;
    }
    Err(ApiError::MissingFile)
}

fn is_csv(content_type: Option<&str>) -> bool {
    content_type
        .and_then(|value| value.split(';').next())
        .is_some_and(|essence| essence.trim().eq_ignore_ascii_case(CSV_MEDIA_TYPE))
}

async fn collect_part(part: Part) -> Result<Bytes, ApiError> {
    let mut stream = std::pin::pin!(part.stream());
    let mut content = BytesMut::new();
    while let Some(mut chunk) = stream.try_next().await.map_err(|err| {
        warn!(error = %err, "upload stream failed");
        ApiError::MissingFile
    })? {
        while chunk.has_remaining() {
            let bytes = chunk.chunk();
            let len = bytes.len();
            content.extend_from_slice(bytes);
            chunk.advance(len);
        }
    }
    Ok(content.freeze())
}

/// `GET /download/{filename}`
pub async fn download(filename: String, state: Arc<AppState>) -> Result<Response, Infallible> {
    Ok(match state.store.read(&filename).await {
        Ok((name, content)) => attachment(&name, content),
        Err(err) => ApiError::from(err).into_response(),
    })
}

fn attachment(name: &ArtifactName, content: Vec<u8>) -> Response {
    let reply = reply::with_header(content, header::CONTENT_TYPE, CSV_MEDIA_TYPE);
    let reply = reply::with_header(
        reply,
        header::CONTENT_DISPOSITION,
        format!("attachment; filename=\"{name}\""),
    );
    reply.into_response()
}

/// `GET /health`
pub async fn health() -> Result<Response, Infallible> {
    Ok(reply::json(&HealthResponse {
        status: "ok",
        version: crate::VERSION,
    })
    .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_media_type_matching() {
        assert!(is_csv(Some("text/csv")));
        assert!(is_csv(Some("text/csv; charset=utf-8")));
        assert!(is_csv(Some("Text/CSV")));
        assert!(!is_csv(Some("application/json")));
        assert!(!is_csv(Some("text/csvx")));
        assert!(!is_csv(None));
    }

    #[tokio::test]
    async fn failed_upload_leaves_no_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(dir.path(), "city_sales").await.unwrap();

        let err = aggregate_upload(&store, b"a,b,1\nc,d,x", &PipelineOptions::new()).unwrap_err();
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert!(store.list().await.unwrap().is_empty());
    }
}
