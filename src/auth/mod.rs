//! Consumed auth surface: the current user identity and its lifecycle
//!
//! The stores gate every read on the presence of a user. "No user" is an
//! empty, unauthenticated state, never an error. Identity changes are
//! broadcast so watching stores can tear down and re-establish their
//! realtime subscriptions.

mod types;

use std::sync::atomic::{AtomicBool, Ordering};

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use log::debug;
use tokio::sync::{broadcast, RwLock};

use crate::error::Error;

pub use types::*;

/// Holds the current session and notifies observers of identity changes
pub struct AuthContext {
    session: RwLock<Option<Session>>,
    /// True until the initial session restore has settled
    loading: AtomicBool,
    changes: broadcast::Sender<AuthChange>,
}

impl AuthContext {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(16);
        Self {
            session: RwLock::new(None),
            loading: AtomicBool::new(true),
            changes,
        }
    }

    /// Adopt a session from its access token
    ///
    /// The token is trusted transport from the auth provider; the claims are
    /// read for identity only, without signature or expiry verification.
    pub async fn set_session(&self, access_token: &str) -> Result<User, Error> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;
        validation.validate_aud = false;

        let token = decode::<Claims>(access_token, &DecodingKey::from_secret(&[]), &validation)?;
        let user = User {
            id: token.claims.sub,
            email: token.claims.email,
        };

        debug!("session established for user {}", user.id);
        *self.session.write().await = Some(Session {
            access_token: access_token.to_string(),
            user: user.clone(),
        });
        self.loading.store(false, Ordering::SeqCst);
        let _ = self.changes.send(AuthChange::SignedIn(user.clone()));

        Ok(user)
    }

    /// Adopt an identity the host application has already resolved
    pub async fn set_user(&self, user: User) {
        *self.session.write().await = Some(Session {
            access_token: String::new(),
            user: user.clone(),
        });
        self.loading.store(false, Ordering::SeqCst);
        let _ = self.changes.send(AuthChange::SignedIn(user));
    }

    /// Drop the current session
    pub async fn clear(&self) {
        *self.session.write().await = None;
        self.loading.store(false, Ordering::SeqCst);
        let _ = self.changes.send(AuthChange::SignedOut);
    }

    /// Mark the initial session restore as settled with no user
    pub fn mark_ready(&self) {
        self.loading.store(false, Ordering::SeqCst);
    }

    /// The current user identity, if any
    pub async fn current_user(&self) -> Option<User> {
        self.session.read().await.as_ref().map(|s| s.user.clone())
    }

    /// The current access token, when a session carries one
    pub async fn access_token(&self) -> Option<String> {
        self.session
            .read()
            .await
            .as_ref()
            .map(|s| s.access_token.clone())
            .filter(|token| !token.is_empty())
    }

    /// Whether the initial session restore is still pending
    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::SeqCst)
    }

    /// Subscribe to identity-change events
    pub fn subscribe(&self) -> broadcast::Receiver<AuthChange> {
        self.changes.subscribe()
    }
}

impl Default for AuthContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde::Serialize;

    #[derive(Serialize)]
    struct TestClaims {
        sub: String,
        email: Option<String>,
        exp: u64,
    }

    fn token_for(sub: &str, email: Option<&str>) -> String {
        let claims = TestClaims {
            sub: sub.to_string(),
            email: email.map(String::from),
            exp: 4_102_444_800, // far future
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"test-secret"),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn starts_loading_without_user() {
        let auth = AuthContext::new();
        assert!(auth.is_loading());
        assert!(auth.current_user().await.is_none());

        auth.mark_ready();
        assert!(!auth.is_loading());
    }

    #[tokio::test]
    async fn set_session_reads_identity_claims() {
        let auth = AuthContext::new();
        let user = auth
            .set_session(&token_for("u1", Some("jeanne@example.com")))
            .await
            .unwrap();

        assert_eq!(user.id, "u1");
        assert_eq!(user.email.as_deref(), Some("jeanne@example.com"));
        assert!(!auth.is_loading());
        assert_eq!(auth.current_user().await, Some(user));
    }

    #[tokio::test]
    async fn clear_broadcasts_sign_out() {
        let auth = AuthContext::new();
        let mut changes = auth.subscribe();

        auth.set_session(&token_for("u1", None)).await.unwrap();
        auth.clear().await;

        assert!(matches!(changes.recv().await, Ok(AuthChange::SignedIn(_))));
        assert!(matches!(changes.recv().await, Ok(AuthChange::SignedOut)));
        assert!(auth.current_user().await.is_none());
    }

    #[tokio::test]
    async fn rejects_garbage_token() {
        let auth = AuthContext::new();
        assert!(auth.set_session("not-a-jwt").await.is_err());
    }
}
