use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::error::StoreError;
use crate::types::{ArtifactGroup, ArtifactVersion, Selection};

type Tables = HashMap<String, Vec<ArtifactGroup>>;

/// On-disk/host shape: `{ "artifacts": { "<store-id>": [group, ...] } }`.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct StoreFile {
    #[serde(default)]
    pub artifacts: Tables,
}

/// Keyed table of artifact groups, one list per store id.
///
/// `ArtifactStore` is the single writer and is deliberately not `Clone`.
/// Observers get a [`StoreReader`], which shares the same table but only
/// exposes reads. Every successful write bumps a revision counter that
/// readers can watch.
#[derive(Debug)]
pub struct ArtifactStore {
    tables: Arc<RwLock<Tables>>,
    revision: Arc<watch::Sender<u64>>,
}

/// Read-only handle onto an [`ArtifactStore`].
#[derive(Debug, Clone)]
pub struct StoreReader {
    tables: Arc<RwLock<Tables>>,
    revision: Arc<watch::Sender<u64>>,
}

impl Default for ArtifactStore {
    fn default() -> Self {
        Self::with_tables(Tables::default())
    }
}

fn read(tables: &RwLock<Tables>) -> RwLockReadGuard<'_, Tables> {
    tables.read().unwrap_or_else(|e| e.into_inner())
}

fn write(tables: &RwLock<Tables>) -> RwLockWriteGuard<'_, Tables> {
    tables.write().unwrap_or_else(|e| e.into_inner())
}

impl ArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_tables(tables: Tables) -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            tables: Arc::new(RwLock::new(tables)),
            revision: Arc::new(revision),
        }
    }

    fn bump(&self) {
        self.revision.send_modify(|rev| *rev += 1);
    }

    /// Parse a host-shaped JSON document. Every group is validated.
    pub fn from_json(json: &str) -> Result<Self, StoreError> {
        let file: StoreFile = serde_json::from_str(json)?;
        for groups in file.artifacts.values() {
            for group in groups {
                group.validate()?;
            }
        }
        Ok(Self::with_tables(file.artifacts))
    }

    pub fn from_file(path: &Path) -> Result<Self, StoreError> {
        let content = std::fs::read_to_string(path)?;
        let store = Self::from_json(&content)?;
        tracing::info!(path = %path.display(), "Artifact store loaded");
        Ok(store)
    }

    pub fn reader(&self) -> StoreReader {
        StoreReader {
            tables: Arc::clone(&self.tables),
            revision: Arc::clone(&self.revision),
        }
    }

    /// Insert a group, replacing any group with the same id in that store.
    ///
    /// Versions are immutable: a replacement may add or drop versions, but
    /// one that reuses an existing version id with different content is
    /// rejected.
    pub fn insert_group(&self, store_id: &str, group: ArtifactGroup) -> Result<(), StoreError> {
        group.validate()?;
        {
            let mut tables = write(&self.tables);
            let groups = tables.entry(store_id.to_string()).or_default();
            match groups.iter_mut().find(|g| g.id == group.id) {
                Some(existing) => {
                    if let Some(conflict) = group.versions.iter().find(|v| {
                        existing.find(&v.id).is_some_and(|old| !old.same_content(v))
                    }) {
                        return Err(StoreError::VersionConflict {
                            group_id: group.id.clone(),
                            version_id: conflict.id.clone(),
                        });
                    }
                    tracing::debug!(store_id, group_id = %group.id, versions = group.versions.len(), "Group replaced");
                    *existing = group;
                }
                None => {
                    tracing::debug!(store_id, group_id = %group.id, versions = group.versions.len(), "Group inserted");
                    groups.push(group);
                }
            }
        }
        self.bump();
        Ok(())
    }

    /// Append a new revision to an existing group.
    ///
    /// The new version number must be greater than every existing one.
    pub fn push_version(&self, store_id: &str, version: ArtifactVersion) -> Result<(), StoreError> {
        self.append(store_id, version)?;
        self.bump();
        Ok(())
    }

    fn append(&self, store_id: &str, version: ArtifactVersion) -> Result<(), StoreError> {
        let mut tables = write(&self.tables);
        let group = tables
            .get_mut(store_id)
            .and_then(|groups| groups.iter_mut().find(|g| g.id == version.group_id))
            .ok_or_else(|| StoreError::GroupNotFound {
                store_id: store_id.to_string(),
                group_id: version.group_id.clone(),
            })?;

        if let Some(latest) = group.latest()
            && version.version <= latest.version
        {
            return Err(StoreError::NonMonotonicVersion {
                group_id: group.id.clone(),
                version: version.version,
                latest: latest.version,
            });
        }
        if group.find(&version.id).is_some() {
            return Err(StoreError::DuplicateVersionId {
                group_id: group.id.clone(),
                version_id: version.id,
            });
        }

        tracing::debug!(store_id, group_id = %group.id, version_id = %version.id, version = version.version, "Version appended");
        group.filename = version.filename.clone();
        group.filetype = version.filetype.clone();
        group.updated_at = version.updated_at;
        group.versions.push(version);
        Ok(())
    }

    pub fn remove_group(&self, store_id: &str, group_id: &str) -> bool {
        let removed = {
            let mut tables = write(&self.tables);
            let Some(groups) = tables.get_mut(store_id) else {
                return false;
            };
            let before = groups.len();
            groups.retain(|g| g.id != group_id);
            before != groups.len()
        };
        if removed {
            self.bump();
        }
        removed
    }

    pub fn clear(&self, store_id: &str) {
        if write(&self.tables).remove(store_id).is_some() {
            self.bump();
        }
    }
}

impl StoreReader {
    /// Number of writes the store has seen so far.
    pub fn revision(&self) -> u64 {
        *self.revision.borrow()
    }

    /// A receiver that wakes on the next store write. The current revision
    /// counts as already seen.
    pub fn changed(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    pub fn store_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = read(&self.tables).keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Snapshot of every group in a store, in insertion order.
    pub fn groups(&self, store_id: &str) -> Vec<ArtifactGroup> {
        read(&self.tables)
            .get(store_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn group(&self, store_id: &str, group_id: &str) -> Option<ArtifactGroup> {
        read(&self.tables)
            .get(store_id)?
            .iter()
            .find(|g| g.id == group_id)
            .cloned()
    }

    /// Resolve a cursor. A stale or unknown cursor yields `None`.
    pub fn resolve(&self, store_id: &str, selection: &Selection) -> Option<ArtifactVersion> {
        read(&self.tables)
            .get(store_id)?
            .iter()
            .find(|g| g.id == selection.group_id)?
            .find(&selection.version_id)
            .cloned()
    }

    pub fn latest_version(&self, store_id: &str, group_id: &str) -> Option<ArtifactVersion> {
        read(&self.tables)
            .get(store_id)?
            .iter()
            .find(|g| g.id == group_id)?
            .latest()
            .cloned()
    }

    pub fn version_by_number(
        &self,
        store_id: &str,
        group_id: &str,
        version: u32,
    ) -> Option<ArtifactVersion> {
        read(&self.tables)
            .get(store_id)?
            .iter()
            .find(|g| g.id == group_id)?
            .find_number(version)
            .cloned()
    }

    pub fn is_empty(&self, store_id: &str) -> bool {
        read(&self.tables)
            .get(store_id)
            .is_none_or(|groups| groups.is_empty())
    }
}
