use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// One immutable revision of an artifact's content.
///
/// Identity is `(group_id, id)`. `version` orders revisions within a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactVersion {
    pub group_id: String,
    pub id: String,
    pub version: u32,
    pub filename: String,
    pub filetype: String,
    pub code: String,
    #[serde(default)]
    pub is_done: bool,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl ArtifactVersion {
    pub fn new(
        group_id: impl Into<String>,
        id: impl Into<String>,
        version: u32,
        filename: impl Into<String>,
        filetype: impl Into<String>,
        code: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            group_id: group_id.into(),
            id: id.into(),
            version,
            filename: filename.into(),
            filetype: filetype.into(),
            code: code.into(),
            is_done: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// The `(group, version)` cursor that points at this version.
    pub fn selection(&self) -> Selection {
        Selection::new(self.group_id.clone(), self.id.clone())
    }

    /// Equal in everything but timestamps.
    pub fn same_content(&self, other: &ArtifactVersion) -> bool {
        self.group_id == other.group_id
            && self.id == other.id
            && self.version == other.version
            && self.filename == other.filename
            && self.filetype == other.filetype
            && self.code == other.code
            && self.is_done == other.is_done
    }
}

/// One logical file and all of its revisions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactGroup {
    pub id: String,
    pub filename: String,
    pub filetype: String,
    #[serde(default)]
    pub versions: Vec<ArtifactVersion>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl ArtifactGroup {
    /// Build a group from its versions. Group metadata follows the newest
    /// version.
    pub fn from_versions(versions: Vec<ArtifactVersion>) -> Result<Self, StoreError> {
        let latest = versions
            .iter()
            .max_by_key(|v| v.version)
            .ok_or(StoreError::EmptyGroup)?;
        let created_at = versions
            .iter()
            .map(|v| v.created_at)
            .min()
            .unwrap_or(latest.created_at);

        let group = Self {
            id: latest.group_id.clone(),
            filename: latest.filename.clone(),
            filetype: latest.filetype.clone(),
            created_at,
            updated_at: latest.updated_at,
            versions,
        };
        group.validate()?;
        Ok(group)
    }

    /// Check that every version belongs to this group and that version
    /// numbers are positive and unique, as are ids.
    pub fn validate(&self) -> Result<(), StoreError> {
        let mut numbers = HashSet::new();
        let mut ids = HashSet::new();
        for v in &self.versions {
            if v.group_id != self.id {
                return Err(StoreError::GroupMismatch {
                    version_id: v.id.clone(),
                    expected: self.id.clone(),
                    found: v.group_id.clone(),
                });
            }
            if v.version == 0 {
                return Err(StoreError::InvalidVersionNumber {
                    group_id: self.id.clone(),
                    version_id: v.id.clone(),
                });
            }
            if !numbers.insert(v.version) {
                return Err(StoreError::DuplicateVersion {
                    group_id: self.id.clone(),
                    version: v.version,
                });
            }
            if !ids.insert(v.id.as_str()) {
                return Err(StoreError::DuplicateVersionId {
                    group_id: self.id.clone(),
                    version_id: v.id.clone(),
                });
            }
        }
        Ok(())
    }

    /// Newest version by `version` number, not by position.
    pub fn latest(&self) -> Option<&ArtifactVersion> {
        self.versions.iter().max_by_key(|v| v.version)
    }

    pub fn find(&self, version_id: &str) -> Option<&ArtifactVersion> {
        self.versions.iter().find(|v| v.id == version_id)
    }

    pub fn find_number(&self, version: u32) -> Option<&ArtifactVersion> {
        self.versions.iter().find(|v| v.version == version)
    }
}

/// Cursor identifying the displayed version.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Selection {
    pub group_id: String,
    pub version_id: String,
}

impl Selection {
    pub fn new(group_id: impl Into<String>, version_id: impl Into<String>) -> Self {
        Self {
            group_id: group_id.into(),
            version_id: version_id.into(),
        }
    }
}

impl std::fmt::Display for Selection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.group_id, self.version_id)
    }
}
