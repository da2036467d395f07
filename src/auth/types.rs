//! Types for the consumed auth surface

use serde::{Deserialize, Serialize};

/// The authenticated user identity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// An authenticated session, as handed over by the auth provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub user: User,
}

/// Identity-change event observed by the stores
#[derive(Debug, Clone)]
pub enum AuthChange {
    SignedIn(User),
    SignedOut,
}

/// Claims read from the access token
#[derive(Debug, Deserialize)]
pub(crate) struct Claims {
    pub sub: String,
    #[serde(default)]
    pub email: Option<String>,
}
