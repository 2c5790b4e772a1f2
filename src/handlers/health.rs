// GET /api/health handler

use serde_json::json;
use std::convert::Infallible;
use warp::reply::{Reply, Response};

pub async fn health_handler() -> Result<Response, Infallible> {
    Ok(warp::reply::json(&json!({ "status": "ok" })).into_response())
}
