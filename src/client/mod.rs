//! Consumer side of the chat relay
//!
//! [`ChatClient`] posts a message, decodes the event stream with
//! [`FrameDecoder`] and grows the assistant turn inside a [`ChatSession`].

pub mod decoder;
pub mod http;
pub mod session;

pub use decoder::FrameDecoder;
pub use http::{ChatClient, ClientError};
pub use session::{ChatSession, SessionError};
