//! Derived per-project aggregate over the user's marché rows

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::error;
use tokio::sync::RwLock;

use crate::models::{MarcheRow, ProjectMetadata};
use crate::MarcheHub;

/// Client-computed metadata for each distinct `project_id`
///
/// Not a stored entity: the rows are grouped after the read. Rows with a
/// null `project_id` are excluded by the query itself.
#[derive(Clone)]
pub struct ProjectsMetadataStore {
    hub: MarcheHub,
    projects: Arc<RwLock<Vec<ProjectMetadata>>>,
    loading: Arc<AtomicBool>,
}

impl ProjectsMetadataStore {
    pub(crate) fn new(hub: MarcheHub) -> Self {
        Self {
            hub,
            projects: Arc::new(RwLock::new(Vec::new())),
            loading: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Reload and regroup from the backend
    pub async fn refresh(&self) {
        let Some(user) = self.hub.auth().current_user().await else {
            self.projects.write().await.clear();
            self.loading.store(false, Ordering::SeqCst);
            return;
        };

        self.loading.store(true, Ordering::SeqCst);
        let result = self
            .hub
            .from("marches")
            .select("project_id, sector, location")
            .eq("created_by", &user.id)
            .not_null("project_id")
            .execute::<MarcheRow>()
            .await;

        match result {
            Ok(rows) => *self.projects.write().await = group_by_project(rows),
            Err(err) => {
                error!("failed to load project metadata: {}", err);
                self.projects.write().await.clear();
            }
        }
        self.loading.store(false, Ordering::SeqCst);
    }

    /// Snapshot of the aggregated metadata
    pub async fn projects(&self) -> Vec<ProjectMetadata> {
        self.projects.read().await.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::SeqCst)
    }
}

/// Group rows by `project_id`, deduplicating sectors and locations
///
/// Output order follows the first appearance of each project; set order
/// follows first insertion.
fn group_by_project(rows: Vec<MarcheRow>) -> Vec<ProjectMetadata> {
    let mut grouped: Vec<ProjectMetadata> = Vec::new();

    for row in rows {
        let Some(project_id) = row.project_id else {
            continue;
        };

        let entry = match grouped.iter().position(|g| g.project_id == project_id) {
            Some(index) => &mut grouped[index],
            None => {
                grouped.push(ProjectMetadata {
                    project_id,
                    sectors: Vec::new(),
                    locations: Vec::new(),
                    ao_count: 0,
                });
                let last = grouped.len() - 1;
                &mut grouped[last]
            }
        };

        if let Some(sector) = row.sector {
            if !entry.sectors.contains(&sector) {
                entry.sectors.push(sector);
            }
        }
        if let Some(location) = row.location {
            if !entry.locations.contains(&location) {
                entry.locations.push(location);
            }
        }
        entry.ao_count += 1;
    }

    grouped
}
