//! One-time-read message store for dadpass.
//!
//! This module provides:
//! - Random retrieval key generation
//! - The create / read protocol over a [`RecordStore`](dadpass_storage::RecordStore)
//! - TTL bookkeeping against an injectable clock
//! - Internal outcome counters
//!
//! # Architecture
//! The message store sits between the HTTP boundary and the record store,
//! encrypting on the way in and decrypting on the way out. A successful read
//! deletes the record before decrypting it: deletion is the commit point of
//! consumption.

pub mod clock;
pub mod config;
pub mod keygen;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::MessageStoreConfig;
pub use keygen::generate_key;
pub use store::{MessageStore, RetrievedMessage, StatsSnapshot};
