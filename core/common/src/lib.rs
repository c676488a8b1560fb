//! Common utilities and types shared across the dadpass crates.
//!
//! This module provides the error taxonomy and the small value types that
//! cross crate boundaries: retrieval keys, TTL options and redacted byte
//! buffers.

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::{MessageKey, SensitiveBytes, TtlOption, KEY_ALPHABET};
