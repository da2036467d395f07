//! Cache of the current user's business contacts

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::error;
use tokio::sync::RwLock;

use crate::error::Error;
use crate::models::Contact;
use crate::MarcheHub;

/// Ownership-scoped contact cache with an explicit delete operation
#[derive(Clone)]
pub struct ContactStore {
    hub: MarcheHub,
    contacts: Arc<RwLock<Vec<Contact>>>,
    loading: Arc<AtomicBool>,
}

impl ContactStore {
    pub(crate) fn new(hub: MarcheHub) -> Self {
        Self {
            hub,
            contacts: Arc::new(RwLock::new(Vec::new())),
            loading: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Reload the cache from the backend
    ///
    /// With no authenticated user the cache empties without a network call.
    /// Read failures are logged and swallowed, leaving an empty cache.
    pub async fn refresh(&self) {
        let Some(user) = self.hub.auth().current_user().await else {
            self.contacts.write().await.clear();
            self.loading.store(false, Ordering::SeqCst);
            return;
        };

        self.loading.store(true, Ordering::SeqCst);
        let result = self
            .hub
            .from("contacts")
            .select("*")
            .eq("created_by", &user.id)
            .order("created_at", false)
            .execute::<Contact>()
            .await;

        match result {
            Ok(rows) => *self.contacts.write().await = rows,
            Err(err) => {
                error!("failed to load contacts: {}", err);
                self.contacts.write().await.clear();
            }
        }
        self.loading.store(false, Ordering::SeqCst);
    }

    /// Snapshot of the cached contacts
    pub async fn contacts(&self) -> Vec<Contact> {
        self.contacts.read().await.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::SeqCst)
    }

    /// Delete a contact, scoped by id and owner
    ///
    /// Unlike the read path, failures propagate to the caller. On success
    /// the row disappears from the cache before any refetch.
    pub async fn delete(&self, id: &str) -> Result<(), Error> {
        let Some(user) = self.hub.auth().current_user().await else {
            return Err(Error::auth("no authenticated user"));
        };

        self.hub
            .from("contacts")
            .delete()
            .eq("id", id)
            .eq("created_by", &user.id)
            .execute()
            .await?;

        self.contacts
            .write()
            .await
            .retain(|contact| contact.id != id);
        Ok(())
    }
}
