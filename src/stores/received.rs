//! Cache of quotes sent to the current user

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, error};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::RwLock;

use crate::models::{Devis, DevisRecord};
use crate::realtime::ChangeFeed;
use crate::stores::WatchHandle;
use crate::MarcheHub;

/// Recipient-scoped cache of received quotes
///
/// Same backing table as [`DevisStore`](crate::stores::DevisStore), selected
/// by the other ownership pointer and without the marché join.
#[derive(Clone)]
pub struct ReceivedDevisStore {
    hub: MarcheHub,
    devis: Arc<RwLock<Vec<Devis>>>,
    loading: Arc<AtomicBool>,
}

impl ReceivedDevisStore {
    pub(crate) fn new(hub: MarcheHub) -> Self {
        Self {
            hub,
            devis: Arc::new(RwLock::new(Vec::new())),
            loading: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Reload the cache from the backend, scoped to `sent_to = user`
    pub async fn refresh(&self) {
        let Some(user) = self.hub.auth().current_user().await else {
            self.devis.write().await.clear();
            self.loading.store(false, Ordering::SeqCst);
            return;
        };

        self.loading.store(true, Ordering::SeqCst);
        let result = self
            .hub
            .from("devis")
            .select("*")
            .eq("sent_to", &user.id)
            .order("created_at", false)
            .execute::<DevisRecord>()
            .await;

        match result {
            Ok(rows) => {
                *self.devis.write().await = rows.into_iter().map(Devis::from).collect();
            }
            Err(err) => {
                error!("failed to load received devis: {}", err);
                self.devis.write().await.clear();
            }
        }
        self.loading.store(false, Ordering::SeqCst);
    }

    /// Snapshot of the cached quotes
    pub async fn devis(&self) -> Vec<Devis> {
        self.devis.read().await.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::SeqCst)
    }

    /// Keep the cache fresh from the change feed
    ///
    /// Watches both `devis` and `marches`; any event on either table re-runs
    /// the full read, even though the read itself never touches `marches`.
    pub fn watch(&self, feed: &ChangeFeed) -> WatchHandle {
        let store = self.clone();
        let feed = feed.clone();
        let mut auth_changes = self.hub.auth().subscribe();

        let task = tokio::spawn(async move {
            let subscribed = match (feed.subscribe("devis").await, feed.subscribe("marches").await)
            {
                (Ok(devis), Ok(marches)) => (devis, marches),
                (Err(err), _) | (_, Err(err)) => {
                    error!("received-devis watch not started: {}", err);
                    return;
                }
            };
            let (mut devis_events, mut marche_events) = subscribed;

            loop {
                tokio::select! {
                    event = devis_events.recv() => match event {
                        Ok(change) => {
                            debug!("devis change ({:?}), refetching", change.kind);
                            store.refresh().await;
                        }
                        Err(RecvError::Lagged(_)) => store.refresh().await,
                        Err(RecvError::Closed) => break,
                    },
                    event = marche_events.recv() => match event {
                        Ok(change) => {
                            debug!("marche change ({:?}), refetching", change.kind);
                            store.refresh().await;
                        }
                        Err(RecvError::Lagged(_)) => store.refresh().await,
                        Err(RecvError::Closed) => break,
                    },
                    change = auth_changes.recv() => match change {
                        Ok(_) => {
                            match (feed.subscribe("devis").await, feed.subscribe("marches").await) {
                                (Ok(devis), Ok(marches)) => {
                                    devis_events = devis;
                                    marche_events = marches;
                                }
                                (Err(err), _) | (_, Err(err)) => {
                                    error!("received-devis watch lost its subscription: {}", err);
                                    break;
                                }
                            }
                            store.refresh().await;
                        }
                        Err(RecvError::Closed) => break,
                        Err(RecvError::Lagged(_)) => continue,
                    },
                }
            }
        });

        WatchHandle::new(task)
    }
}
