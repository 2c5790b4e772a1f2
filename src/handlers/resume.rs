// GET / POST /api/resume/download handlers

use bytes::Bytes;
use chrono::Utc;
use std::convert::Infallible;
use std::io::ErrorKind;
use tracing::{error, info, warn};
use warp::http::StatusCode;
use warp::reply::{Reply, Response};

use super::error_reply;
use crate::models::{DownloadAction, DownloadStatsResponse};
use crate::state::AppState;

pub const CACHE_CONTROL: &str = "public, max-age=3600, stale-while-revalidate=86400";

/// Serve the resume as an attachment and count the download
pub async fn resume_download_handler(state: AppState) -> Result<Response, Infallible> {
    let asset = &state.resume;

    let contents = match tokio::fs::read(&asset.path).await {
        Ok(contents) => contents,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            warn!(path = %asset.path.display(), "Resume file is missing");
            return Ok(error_reply(StatusCode::NOT_FOUND, "Resume not found"));
        }
        Err(e) => {
            error!(path = %asset.path.display(), error = %e, "Failed to read resume");
            return Ok(error_reply(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to download resume",
            ));
        }
    };

    let stats = state.downloads.record(Utc::now());
    info!(total = stats.total, bytes = contents.len(), "Resume downloaded");

    let disposition = format!("attachment; filename=\"{}\"", asset.download_name);
    let reply = warp::reply::with_header(contents, "content-type", asset.content_type.as_str());
    let reply = warp::reply::with_header(reply, "content-disposition", disposition);
    let reply = warp::reply::with_header(reply, "cache-control", CACHE_CONTROL);
    let reply = warp::reply::with_header(reply, "x-content-type-options", "nosniff");

    Ok(reply.into_response())
}

/// `{"action":"stats"}` returns download statistics
pub async fn resume_stats_handler(body: Bytes, state: AppState) -> Result<Response, Infallible> {
    let action = serde_json::from_slice::<DownloadAction>(&body)
        .ok()
        .and_then(|a| a.action);

    if action.as_deref() != Some("stats") {
        return Ok(error_reply(StatusCode::BAD_REQUEST, "Invalid action"));
    }

    let stats = state.downloads.stats();
    Ok(warp::reply::json(&DownloadStatsResponse {
        total_downloads: stats.total,
        last_download: stats.last_download,
    })
    .into_response())
}
