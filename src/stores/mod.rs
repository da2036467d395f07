//! Data-sync stores
//!
//! Each store owns one in-memory cache of a logical entity list, exclusively;
//! the same backing table may be fetched redundantly by several stores with
//! no coordination. Reads are gated on the authenticated user: with no user
//! the cache is the empty list and no query is issued. Read failures are
//! logged and swallowed, write failures propagate.
//!
//! Overlapping refetches are neither coalesced nor cancelled; each one
//! overwrites the cache with its own result, so the last response to resolve
//! wins.

mod contacts;
mod devis;
mod projects;
mod received;

use tokio::task::JoinHandle;

pub use contacts::ContactStore;
pub use devis::DevisStore;
pub use projects::ProjectsMetadataStore;
pub use received::ReceivedDevisStore;

/// Handle to a store's realtime watch task
///
/// Dropping the handle aborts the task and releases its subscriptions. An
/// in-flight refetch is not cancelled.
pub struct WatchHandle {
    task: JoinHandle<()>,
}

impl WatchHandle {
    pub(crate) fn new(task: JoinHandle<()>) -> Self {
        Self { task }
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
