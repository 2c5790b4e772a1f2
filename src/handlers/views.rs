// GET / POST /api/views handlers

use std::collections::HashMap;
use std::convert::Infallible;
use tracing::debug;
use warp::http::StatusCode;
use warp::reply::{Reply, Response};

use super::error_reply;
use crate::models::{AllViews, SlugViews};
use crate::state::AppState;

fn slug(query: &HashMap<String, String>) -> Option<&str> {
    query
        .get("slug")
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
}

/// One slug's count, or every count when no slug is given
pub async fn get_views_handler(
    query: HashMap<String, String>,
    state: AppState,
) -> Result<Response, Infallible> {
    let reply = match slug(&query) {
        Some(slug) => warp::reply::json(&SlugViews {
            slug: slug.to_string(),
            views: state.views.get(slug),
        }),
        None => warp::reply::json(&AllViews {
            views: state.views.snapshot(),
        }),
    };
    Ok(reply.into_response())
}

pub async fn post_views_handler(
    query: HashMap<String, String>,
    state: AppState,
) -> Result<Response, Infallible> {
    let Some(slug) = slug(&query) else {
        return Ok(error_reply(StatusCode::BAD_REQUEST, "Slug is required"));
    };

    let views = state.views.increment(slug);
    debug!(slug, views, "Recorded page view");

    Ok(warp::reply::json(&SlugViews {
        slug: slug.to_string(),
        views,
    })
    .into_response())
}
