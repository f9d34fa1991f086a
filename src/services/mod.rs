//! Clients for the remote coco services.
//!
//! Each service expects an `X-API-Key` header and wraps its payload in a
//! `{"status": "success", ...}` envelope.

mod chunking;
mod db_api;
mod health;
mod http;
mod transcription;

pub use chunking::ChunkingClient;
pub use db_api::DbApiClient;
pub use health::{health_check, ServiceHealth};
pub use http::{ErrorKind, ServiceClient};
pub use transcription::{Transcript, TranscriptionClient};
