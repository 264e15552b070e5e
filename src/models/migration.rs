//! Request and result types for bulk storage-class changes.

use crate::models::object::StorageClass;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Raw request body of `POST /changeStorageClass`.
///
/// Both fields are optional here so that a missing field is reported as an
/// invalid argument by the service instead of a deserialization rejection.
#[derive(Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct ChangeStorageClassBody {
    pub folder_prefix: Option<String>,
    pub storage_class: Option<String>,
}

/// A validated migration request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MigrationRequest {
    pub folder_prefix: String,
    pub target_class: StorageClass,
}

/// Per-key accounting of one migration.
///
/// Every key listed under the prefix lands in exactly one of `succeeded` or
/// `failed`. `copied` counts the keys that actually needed a copy; keys already
/// in the target class are succeeded without one.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MigrationSummary {
    pub migration_id: Uuid,
    pub folder_prefix: String,
    pub storage_class: StorageClass,
    pub total_objects: usize,
    pub copied: usize,
    pub succeeded: Vec<String>,
    pub failed: BTreeMap<String, String>,
}

impl MigrationSummary {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    /// Human readable outcome shown by the UI.
    pub fn message(&self) -> String {
        if self.is_complete() {
            "Storage class updated successfully".to_string()
        } else {
            format!(
                "Storage class updated for {} of {} objects",
                self.succeeded.len(),
                self.total_objects
            )
        }
    }
}

/// Response body of `POST /changeStorageClass`.
#[derive(Serialize, Clone, Debug)]
pub struct ChangeStorageClassResponse {
    pub message: String,
    pub summary: MigrationSummary,
}

impl From<MigrationSummary> for ChangeStorageClassResponse {
    fn from(summary: MigrationSummary) -> Self {
        Self {
            message: summary.message(),
            summary,
        }
    }
}
