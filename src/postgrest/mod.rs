//! Database operations through the PostgREST API
//!
//! The application consumes a narrow slice of the query surface: table reads
//! with equality / not-null filters, descending order by creation time and
//! nested relation projection, plus scoped inserts and deletes. Requests
//! carry the anon key and, when a session is present, the user's bearer
//! token so row-level security applies server-side.

mod query;

use std::sync::Arc;

use reqwest::Client;
use serde::Serialize;

use crate::auth::AuthContext;

pub use query::*;

/// Client for operations on one table or view
pub struct Table {
    url: String,
    key: String,
    table: String,
    client: Client,
    auth: Option<Arc<AuthContext>>,
}

impl Table {
    /// Create a new table client
    pub(crate) fn new(
        url: &str,
        key: &str,
        table: &str,
        client: Client,
        auth: Option<Arc<AuthContext>>,
    ) -> Self {
        Self {
            url: url.to_string(),
            key: key.to_string(),
            table: table.to_string(),
            client,
            auth,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/rest/v1/{}", self.url, self.table)
    }

    /// Select columns from the table; nested relation projections use the
    /// PostgREST syntax, e.g. `"*, marches(sector,end_date)"`
    pub fn select(&self, columns: &str) -> SelectBuilder {
        SelectBuilder::new(
            self.endpoint(),
            self.key.clone(),
            columns,
            self.client.clone(),
            self.auth.clone(),
        )
    }

    /// Insert rows into the table
    pub fn insert<T: Serialize>(&self, values: T) -> InsertBuilder<T> {
        InsertBuilder::new(
            self.endpoint(),
            self.key.clone(),
            values,
            self.client.clone(),
            self.auth.clone(),
        )
    }

    /// Delete rows from the table; callers must scope with `eq`
    pub fn delete(&self) -> DeleteBuilder {
        DeleteBuilder::new(
            self.endpoint(),
            self.key.clone(),
            self.client.clone(),
            self.auth.clone(),
        )
    }
}
