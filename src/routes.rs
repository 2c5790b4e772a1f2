// Route definitions and handlers

use std::collections::HashMap;
use std::convert::Infallible;
use warp::Filter;

use crate::handlers;
use crate::state::AppState;

/// Largest accepted request body
pub const MAX_BODY_BYTES: u64 = 16 * 1024;

fn with_state(
    state: AppState,
) -> impl Filter<Extract = (AppState,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}

pub fn configure_routes(
    state: AppState,
) -> impl Filter<Extract = impl warp::Reply, Error = Infallible> + Clone {
    let api = warp::path("api");

    // POST /api/chat
    let chat = api
        .and(warp::path("chat"))
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::header::headers_cloned())
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::bytes())
        .and(with_state(state.clone()))
        .and_then(handlers::chat_handler);

    // GET /api/views[?slug=]
    let get_views = api
        .and(warp::path("views"))
        .and(warp::path::end())
        .and(warp::get())
        .and(warp::query::<HashMap<String, String>>())
        .and(with_state(state.clone()))
        .and_then(handlers::get_views_handler);

    // POST /api/views?slug=
    let post_views = api
        .and(warp::path("views"))
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::query::<HashMap<String, String>>())
        .and(with_state(state.clone()))
        .and_then(handlers::post_views_handler);

    // GET /api/resume/download
    let resume_download = api
        .and(warp::path("resume"))
        .and(warp::path("download"))
        .and(warp::path::end())
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(handlers::resume_download_handler);

    // POST /api/resume/download
    let resume_stats = api
        .and(warp::path("resume"))
        .and(warp::path("download"))
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::bytes())
        .and(with_state(state))
        .and_then(handlers::resume_stats_handler);

    // GET /api/health
    let health = api
        .and(warp::path("health"))
        .and(warp::path::end())
        .and(warp::get())
        .and_then(handlers::health_handler);

    let cors = warp::cors()
        .allow_any_origin()
        .allow_methods(vec!["GET", "POST", "OPTIONS"])
        .allow_headers(vec!["content-type"]);

    chat.or(get_views)
        .or(post_views)
        .or(resume_download)
        .or(resume_stats)
        .or(health)
        .with(cors)
        .recover(handlers::handle_rejection)
}
