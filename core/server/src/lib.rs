//! HTTP boundary for dadpass.
//!
//! Exposes the message store over a small JSON API:
//!
//! | Method | Path | Result |
//! |---|---|---|
//! | `GET` | `/` | health check |
//! | `POST` | `/messages` | `{"messageKey"}`, 400 without `message`, 500 on failure |
//! | `GET` | `/messages/{key}` | `{"message", "ttlOption"}` or the not-available sentinel, always 200 |
//!
//! Unknown, expired and consumed keys all produce the same response so the
//! status code never leaks whether a key ever existed.

pub mod config;
pub mod error;
pub mod routes;
pub mod service;
pub mod sweeper;

pub use config::{KeySource, ServerConfig, StoreSettings};
pub use error::ApiError;
pub use routes::{router, AppState, NOT_AVAILABLE};
pub use service::{open_message_store, MessageService};
pub use sweeper::spawn_sweeper;
