//! Realtime change feed
//!
//! Phoenix-style websocket client for the platform's change feed. Stores
//! subscribe to a table and receive row-level change notifications; every
//! notification triggers a full refetch of the store's own query, so only
//! the event kind and table are surfaced, never row data.

mod client;
mod message;

pub use client::*;
pub use message::*;
