//! MarchéHub client core
//!
//! Rust client for the MarchéHub tender management platform: typed domain
//! records, a PostgREST-style query layer, a realtime change feed, the
//! ownership-scoped data stores and the notification-creation endpoint.
//!
//! The stores mirror the application's data views (contacts, authored
//! quotes, received quotes, per-project metadata), each gated on the
//! authenticated user and refreshed wholesale when the backend reports a
//! change.

pub mod auth;
pub mod config;
pub mod error;
pub mod fetch;
pub mod models;
pub mod notify;
pub mod postgrest;
pub mod realtime;
pub mod stores;
pub mod view;

use std::sync::Arc;

use reqwest::Client;

use crate::auth::AuthContext;
use crate::config::ClientOptions;
use crate::postgrest::Table;
use crate::realtime::ChangeFeed;
use crate::stores::{ContactStore, DevisStore, ProjectsMetadataStore, ReceivedDevisStore};

/// The main entry point for the MarchéHub client
#[derive(Clone)]
pub struct MarcheHub {
    /// The base URL for the backend project
    pub url: String,
    /// The anonymous API key
    pub key: String,
    /// HTTP client used for requests
    pub http_client: Client,
    /// Auth context shared by the stores
    auth: Arc<AuthContext>,
    /// Client options
    pub options: ClientOptions,
}

impl MarcheHub {
    /// Create a new client
    ///
    /// # Example
    ///
    /// ```
    /// use marchehub::MarcheHub;
    ///
    /// let hub = MarcheHub::new("https://project.example.com", "anon-key");
    /// ```
    pub fn new(url: &str, key: &str) -> Self {
        Self::new_with_options(url, key, ClientOptions::default())
    }

    /// Create a new client with custom options
    pub fn new_with_options(url: &str, key: &str, options: ClientOptions) -> Self {
        let http_client = match options.request_timeout {
            Some(timeout) => Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
            None => Client::new(),
        };

        Self {
            url: url.trim_end_matches('/').to_string(),
            key: key.to_string(),
            http_client,
            auth: Arc::new(AuthContext::new()),
            options,
        }
    }

    /// The auth context shared by every store created from this client
    pub fn auth(&self) -> &AuthContext {
        &self.auth
    }

    /// A table client for database operations
    pub fn from(&self, table: &str) -> Table {
        Table::new(
            &self.url,
            &self.key,
            table,
            self.http_client.clone(),
            Some(self.auth.clone()),
        )
    }

    /// A new, disconnected change feed
    pub fn realtime(&self) -> ChangeFeed {
        ChangeFeed::new(&self.url, &self.key, self.options.heartbeat_interval)
    }

    /// Store of the current user's contacts
    pub fn contacts(&self) -> ContactStore {
        ContactStore::new(self.clone())
    }

    /// Store of quotes authored by the current user
    pub fn devis(&self) -> DevisStore {
        DevisStore::new(self.clone())
    }

    /// Store of quotes sent to the current user
    pub fn received_devis(&self) -> ReceivedDevisStore {
        ReceivedDevisStore::new(self.clone())
    }

    /// Store of the derived per-project metadata
    pub fn projects_metadata(&self) -> ProjectsMetadataStore {
        ProjectsMetadataStore::new(self.clone())
    }
}

/// A convenience module for common imports
pub mod prelude {
    pub use crate::config::ClientOptions;
    pub use crate::error::Error;
    pub use crate::MarcheHub;
}
