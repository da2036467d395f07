//! Cache of quotes authored by the current user

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, error};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::RwLock;

use crate::models::{Devis, DevisRecord};
use crate::realtime::ChangeFeed;
use crate::stores::WatchHandle;
use crate::MarcheHub;

/// Columns fetched for the authored view, including the joined marché fields
const DEVIS_COLUMNS: &str = "*, marches(sector,end_date)";

/// Ownership-scoped cache of authored quotes, refreshed on any change event
#[derive(Clone)]
pub struct DevisStore {
    hub: MarcheHub,
    devis: Arc<RwLock<Vec<Devis>>>,
    loading: Arc<AtomicBool>,
}

impl DevisStore {
    pub(crate) fn new(hub: MarcheHub) -> Self {
        Self {
            hub,
            devis: Arc::new(RwLock::new(Vec::new())),
            loading: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Reload the cache from the backend
    ///
    /// Scoped to quotes authored by the current user; the marché sector and
    /// end date are denormalized from the joined relation.
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
            .select(DEVIS_COLUMNS)
            .eq("created_by", &user.id)
            .order("created_at", false)
            .execute::<DevisRecord>()
            .await;

        match result {
            Ok(rows) => {
                *self.devis.write().await = rows.into_iter().map(Devis::from).collect();
            }
            Err(err) => {
                error!("failed to load devis: {}", err);
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
    /// Every change event on `devis`, of any kind and for any row, re-runs
    /// the full read; there is no diffing and no coalescing. An identity
    /// change re-establishes the subscription and refetches.
    pub fn watch(&self, feed: &ChangeFeed) -> WatchHandle {
        let store = self.clone();
        let feed = feed.clone();
        let mut auth_changes = self.hub.auth().subscribe();

        let task = tokio::spawn(async move {
            let mut events = match feed.subscribe("devis").await {
                Ok(events) => events,
                Err(err) => {
                    error!("devis watch not started: {}", err);
                    return;
                }
            };

            loop {
                tokio::select! {
                    event = events.recv() => match event {
                        Ok(change) => {
                            debug!("devis change ({:?}), refetching", change.kind);
                            store.refresh().await;
                        }
                        Err(RecvError::Lagged(skipped)) => {
                            debug!("devis watch lagged by {}, refetching", skipped);
                            store.refresh().await;
                        }
                        Err(RecvError::Closed) => break,
                    },
                    change = auth_changes.recv() => match change {
                        Ok(_) => {
                            match feed.subscribe("devis").await {
                                Ok(fresh) => events = fresh,
                                Err(err) => {
                                    error!("devis watch lost its subscription: {}", err);
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
