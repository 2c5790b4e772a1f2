// HTTP server modules
pub mod handlers;
pub mod models;
pub mod routes;
pub mod sse;
pub mod state;

// Chat relay, counters and the profile behind the system prompt
pub mod chat;
pub mod profile;
pub mod store;

// Consumer of the relay's event stream
pub mod client;

// LLM abstraction layer
pub mod llm;

pub mod config;
pub mod logging;
