use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("group not found: {store_id}/{group_id}")]
    GroupNotFound { store_id: String, group_id: String },

    #[error("version {version_id} belongs to group {found}, expected {expected}")]
    GroupMismatch {
        version_id: String,
        expected: String,
        found: String,
    },

    #[error("version {version_id} of group {group_id} has version number 0; numbers start at 1")]
    InvalidVersionNumber { group_id: String, version_id: String },

    #[error("group {group_id} already has version number {version}")]
    DuplicateVersion { group_id: String, version: u32 },

    #[error("group {group_id} already has a version with id {version_id}")]
    DuplicateVersionId { group_id: String, version_id: String },

    #[error("version {version_id} of group {group_id} already exists with different content")]
    VersionConflict { group_id: String, version_id: String },

    #[error("version {version} of group {group_id} is not newer than {latest}")]
    NonMonotonicVersion {
        group_id: String,
        version: u32,
        latest: u32,
    },

    #[error("group has no versions")]
    EmptyGroup,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}
