//! Chat relay between the site's visitors and the upstream model

pub mod error;
pub mod prompt;
pub mod rate_limit;
pub mod relay;
pub mod sanitize;

pub use error::RelayError;
pub use rate_limit::{RateLimitDecision, RateLimiter};
pub use relay::{ChatRelay, FrameStream, RelaySettings};
