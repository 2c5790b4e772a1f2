// Handlers module

pub mod chat;
pub mod health;
pub mod rejection;
pub mod resume;
pub mod views;

pub use chat::chat_handler;
pub use health::health_handler;
pub use rejection::handle_rejection;
pub use resume::{resume_download_handler, resume_stats_handler};
pub use views::{get_views_handler, post_views_handler};

use warp::http::StatusCode;
use warp::reply::{Reply, Response};

use crate::models::ErrorBody;

/// JSON `{ "error": message }` with the given status
pub(crate) fn error_reply(status: StatusCode, message: impl Into<String>) -> Response {
    warp::reply::with_status(warp::reply::json(&ErrorBody::new(message)), status).into_response()
}
