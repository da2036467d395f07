//! Query builders for the table client

use std::collections::HashMap;
use std::sync::Arc;

use reqwest::Client;
use serde::{de::DeserializeOwned, Serialize};

use crate::auth::AuthContext;
use crate::error::Error;
use crate::fetch::Fetch;

const CLIENT_INFO: &str = "marchehub-rust/0.3.0";

/// Resolve the bearer token: the user's access token when a session is
/// present, the anon key otherwise
async fn bearer_token(auth: &Option<Arc<AuthContext>>, key: &str) -> String {
    match auth {
        Some(auth) => auth.access_token().await.unwrap_or_else(|| key.to_string()),
        None => key.to_string(),
    }
}

/// Builder for SELECT queries
pub struct SelectBuilder {
    url: String,
    key: String,
    client: Client,
    auth: Option<Arc<AuthContext>>,
    params: HashMap<String, String>,
}

impl SelectBuilder {
    pub(crate) fn new(
        url: String,
        key: String,
        columns: &str,
        client: Client,
        auth: Option<Arc<AuthContext>>,
    ) -> Self {
        let mut params = HashMap::new();
        params.insert("select".to_string(), columns.to_string());

        Self {
            url,
            key,
            client,
            auth,
            params,
        }
    }

    /// Filter rows where column equals a value
    pub fn eq<T: ToString>(mut self, column: &str, value: T) -> Self {
        self.params
            .insert(column.to_string(), format!("eq.{}", value.to_string()));
        self
    }

    /// Filter rows where column is not null
    pub fn not_null(mut self, column: &str) -> Self {
        self.params
            .insert(column.to_string(), "not.is.null".to_string());
        self
    }

    /// Order the results by a column
    pub fn order(mut self, column: &str, ascending: bool) -> Self {
        let direction = if ascending { "asc" } else { "desc" };
        self.params
            .insert("order".to_string(), format!("{}.{}", column, direction));
        self
    }

    /// Limit the number of rows returned
    pub fn limit(mut self, count: i32) -> Self {
        self.params.insert("limit".to_string(), count.to_string());
        self
    }

    /// Execute the query and return the results
    pub async fn execute<T: DeserializeOwned>(self) -> Result<Vec<T>, Error> {
        let token = bearer_token(&self.auth, &self.key).await;
        Fetch::get(&self.client, &self.url)
            .header("apikey", &self.key)
            .header("X-Client-Info", CLIENT_INFO)
            .bearer_auth(&token)
            .query(self.params)
            .execute::<Vec<T>>()
            .await
    }
}

/// Builder for INSERT queries
pub struct InsertBuilder<T: Serialize> {
    url: String,
    key: String,
    values: T,
    client: Client,
    auth: Option<Arc<AuthContext>>,
}

impl<T: Serialize> InsertBuilder<T> {
    pub(crate) fn new(
        url: String,
        key: String,
        values: T,
        client: Client,
        auth: Option<Arc<AuthContext>>,
    ) -> Self {
        Self {
            url,
            key,
            values,
            client,
            auth,
        }
    }

    /// Execute the insert and return the inserted rows
    pub async fn execute<R: DeserializeOwned>(self) -> Result<Vec<R>, Error> {
        let token = bearer_token(&self.auth, &self.key).await;
        Fetch::post(&self.client, &self.url)
            .header("apikey", &self.key)
            .header("X-Client-Info", CLIENT_INFO)
            .header("Prefer", "return=representation")
            .bearer_auth(&token)
            .json(&self.values)?
            .execute::<Vec<R>>()
            .await
    }
}

/// Builder for DELETE queries
pub struct DeleteBuilder {
    url: String,
    key: String,
    client: Client,
    auth: Option<Arc<AuthContext>>,
    params: HashMap<String, String>,
}

impl DeleteBuilder {
    pub(crate) fn new(
        url: String,
        key: String,
        client: Client,
        auth: Option<Arc<AuthContext>>,
    ) -> Self {
        Self {
            url,
            key,
            client,
            auth,
            params: HashMap::new(),
        }
    }

    /// Filter rows where column equals a value
    pub fn eq<T: ToString>(mut self, column: &str, value: T) -> Self {
        self.params
            .insert(column.to_string(), format!("eq.{}", value.to_string()));
        self
    }

    /// Execute the delete without returning the removed rows
    pub async fn execute(self) -> Result<(), Error> {
        let token = bearer_token(&self.auth, &self.key).await;
        Fetch::delete(&self.client, &self.url)
            .header("apikey", &self.key)
            .header("X-Client-Info", CLIENT_INFO)
            .header("Prefer", "return=minimal")
            .bearer_auth(&token)
            .query(self.params)
            .execute_empty()
            .await
    }
}
