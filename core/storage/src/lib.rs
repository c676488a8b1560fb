//! Keyed record storage for dadpass.
//!
//! This module provides a trait-based interface over the backing store that
//! holds encrypted messages, a handful of backends, and a registry for
//! resolving a backend from configuration.
//!
//! # Design Principles
//! - Atomic primitives: uniqueness comes from conditional insert, one-time
//!   reads from an atomic take. Never read-then-write.
//! - Ciphertext only: backends never see plaintext.
//! - Native expiry is best effort; readers re-check `expires_at` themselves.

pub mod local;
pub mod memory;
pub mod registry;
pub mod sqlite;
pub mod store;

pub use local::LocalStore;
pub use memory::MemoryStore;
pub use registry::{create_default_registry, StoreFactory, StoreRegistry};
pub use sqlite::SqliteStore;
pub use store::{RecordStore, StoredMessage};
