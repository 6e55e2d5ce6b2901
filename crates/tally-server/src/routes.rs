//! Route table
//!
//! | Method | Path                   | Handler                         |
//! |--------|------------------------|---------------------------------|
//! | POST   | `/upload`              | [`handlers::upload`]            |
//! | GET    | `/download/{filename}` | [`handlers::download`]          |
//! | GET    | `/health`              | [`handlers::health`]            |

use crate::error::handle_rejection;
use crate::handlers;
use crate::state::AppState;
use std::convert::Infallible;
use std::sync::Arc;
use warp::{Filter, Reply};

/// Build the full filter: routes, CORS, rejection handling, access log
///
/// Paths are matched before methods so an unknown path answers 404, not 405.
pub fn routes(
    state: Arc<AppState>,
) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    let upload = warp::path!("upload")
        .and(warp::post())
        .and(warp::multipart::form().max_length(state.config.max_upload_bytes))
        .and(with_state(Arc::clone(&state)))
        .and_then(handlers::upload);

    let download = warp::path!("download" / String)
        .and(warp::get())
        .and(with_state(Arc::clone(&state)))
        .and_then(handlers::download);

    let health = warp::path!("health")
        .and(warp::get())
        .and_then(handlers::health);

    upload
        .or(download)
        .or(health)
        .recover(handle_rejection)
        .with(cors(&state.config.allowed_origin))
        .recover(handle_rejection)
        .with(warp::log::custom(log_request))
}

fn with_state(
    state: Arc<AppState>,
) -> impl Filter<Extract = (Arc<AppState>,), Error = Infallible> + Clone {
    warp::any().map(move || Arc::clone(&state))
}

/// Single-origin CORS policy for the browser client
fn cors(origin: &str) -> warp::cors::Builder {
    warp::cors()
        .allow_origin(origin)
        .allow_methods(["POST", "GET", "OPTIONS"])
        .allow_headers(["Origin", "Content-Type"])
        .expose_headers(["Content-Disposition"])
        .allow_credentials(true)
}

fn log_request(info: warp::log::Info<'_>) {
    tracing::info!(
        target: "tally_server::access",
        method = %info.method(),
        path = info.path(),
        status = info.status().as_u16(),
        elapsed_ms = u64::try_from(info.elapsed().as_millis()).unwrap_or(u64::MAX),
        "request"
    );
}
