//! Bulk storage-class migration over a folder prefix.
//!
//! A migration lists every key under the prefix (all pages, before any copy is
//! issued), then rewrites each object onto itself with the target class and
//! the source metadata. Copies run on a bounded number of spawned tasks; each
//! key is retried on transient errors and its final outcome is recorded in the
//! [`MigrationSummary`]. A per-key failure never fails the whole request.
//!
//! Cancellation stops new copies from being issued. Copies that already hold
//! a permit run to completion even if the caller goes away, since their tasks
//! are detached from the request future.

use crate::{
    models::{
        migration::{ChangeStorageClassBody, MigrationRequest, MigrationSummary},
        object::StorageClass,
    },
    store::{ListRequest, ObjectStore, StoreError, list_all},
};
use rand::Rng;
use std::{collections::BTreeMap, sync::Arc, time::Duration};
use thiserror::Error;
use tokio::{sync::Semaphore, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, info, info_span, warn};
use uuid::Uuid;

pub const CANCELLED_REASON: &str = "cancelled before copy was issued";

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("{0}")]
    InvalidArgument(String),
    #[error("object store unavailable: {0}")]
    StoreUnavailable(#[source] StoreError),
}

impl TryFrom<ChangeStorageClassBody> for MigrationRequest {
    type Error = MigrationError;

    fn try_from(body: ChangeStorageClassBody) -> Result<Self, Self::Error> {
        let required =
            || MigrationError::InvalidArgument("folderPrefix and storageClass are required".into());

        let folder_prefix = body
            .folder_prefix
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(required)?;
        let storage_class = body
            .storage_class
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(required)?;
        let target_class = storage_class
            .parse::<StorageClass>()
            .map_err(|err| MigrationError::InvalidArgument(err.to_string()))?;

        Ok(MigrationRequest {
            folder_prefix,
            target_class,
        })
    }
}

/// Exponential backoff for per-key retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per key, the first one included.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Delay before the attempt following failed attempt number `attempt`.
    ///
    /// `base * 2^(attempt-1)`, capped at `max_delay`, plus up to 50% jitter.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(16);
        let capped = self
            .base_delay
            .saturating_mul(1u32 << shift)
            .min(self.max_delay);
        let spread = (capped.as_millis() / 2) as u64;
        let jitter = if spread == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..=spread)
        };
        capped + Duration::from_millis(jitter)
    }
}

#[derive(Debug, Clone)]
pub struct MigrationSettings {
    pub page_size: i32,
    /// Copies allowed in flight at once.
    pub concurrency: usize,
    pub retry: RetryPolicy,
}

impl Default for MigrationSettings {
    fn default() -> Self {
        Self {
            page_size: 1000,
            concurrency: 8,
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Debug)]
struct CopyFailure {
    error: StoreError,
    attempts: u32,
}

impl CopyFailure {
    fn reason(&self) -> String {
        if self.attempts > 1 {
            format!("{} (gave up after {} attempts)", self.error, self.attempts)
        } else {
            self.error.to_string()
        }
    }
}

enum Outcome {
    /// Already in the target class; nothing to copy.
    Unchanged,
    Copied,
    Failed(String),
}

#[derive(Clone)]
pub struct Migrator {
    store: Arc<dyn ObjectStore>,
    settings: MigrationSettings,
}

impl Migrator {
    pub fn new(store: Arc<dyn ObjectStore>, settings: MigrationSettings) -> Self {
        Self { store, settings }
    }

    /// Move every object under `request.folder_prefix` to `request.target_class`.
    ///
    /// Fails only when the listing cannot be completed; copy failures are
    /// reported per key in the summary.
    pub async fn migrate(
        &self,
        request: MigrationRequest,
        cancel: CancellationToken,
    ) -> Result<MigrationSummary, MigrationError> {
        let migration_id = Uuid::new_v4();
        let span = info_span!(
            "migration",
            %migration_id,
            prefix = %request.folder_prefix,
            class = %request.target_class
        );
        self.run(migration_id, request, cancel).instrument(span).await
    }

    async fn run(
        &self,
        migration_id: Uuid,
        request: MigrationRequest,
        cancel: CancellationToken,
    ) -> Result<MigrationSummary, MigrationError> {
        let target = request.target_class;
        let listing = list_all(
            self.store.as_ref(),
            ListRequest::recursive(request.folder_prefix.clone(), self.settings.page_size),
        )
        .await
        .map_err(MigrationError::StoreUnavailable)?;

        let objects: Vec<_> = listing
            .objects
            .into_iter()
            .filter(|object| !object.key.is_empty())
            .collect();
        let total_objects = objects.len();
        info!(total_objects, "listed objects under prefix");

        let semaphore = Arc::new(Semaphore::new(self.settings.concurrency.max(1)));
        let mut outcomes: Vec<(String, Outcome)> = Vec::with_capacity(total_objects);
        let mut in_flight: Vec<(String, JoinHandle<Result<(), CopyFailure>>)> = Vec::new();
        let mut cancelled = false;

        for object in objects {
            if object.is_in(target) {
                outcomes.push((object.key, Outcome::Unchanged));
                continue;
            }
            if cancelled {
                outcomes.push((object.key, Outcome::Failed(CANCELLED_REASON.into())));
                continue;
            }

            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                permit = semaphore.clone().acquire_owned() => permit.ok(),
            };
            let Some(permit) = permit else {
                warn!("migration cancelled, no further copies will be issued");
                cancelled = true;
                outcomes.push((object.key, Outcome::Failed(CANCELLED_REASON.into())));
                continue;
            };

            let store = self.store.clone();
            let retry = self.settings.retry;
            let key = object.key.clone();
            let task = async move {
                let _permit = permit;
                copy_with_retry(store.as_ref(), &key, target, retry).await
            };
            in_flight.push((object.key, tokio::spawn(task.in_current_span())));
        }

        for (key, handle) in in_flight {
            let outcome = match handle.await {
                Ok(Ok(())) => Outcome::Copied,
                Ok(Err(failure)) => {
                    warn!(%key, error = %failure.error, attempts = failure.attempts, "copy failed");
                    Outcome::Failed(failure.reason())
                }
                Err(err) => Outcome::Failed(format!("copy task did not complete: {err}")),
            };
            outcomes.push((key, outcome));
        }

        let summary = summarize(migration_id, request, total_objects, outcomes);
        info!(
            copied = summary.copied,
            succeeded = summary.succeeded.len(),
            failed = summary.failed.len(),
            "migration finished"
        );
        Ok(summary)
    }
}

async fn copy_with_retry(
    store: &dyn ObjectStore,
    key: &str,
    class: StorageClass,
    retry: RetryPolicy,
) -> Result<(), CopyFailure> {
    let mut attempt = 1;
    loop {
        match store.copy_in_place(key, class).await {
            Ok(()) => return Ok(()),
            Err(error) if error.is_retryable() && attempt < retry.max_attempts => {
                let delay = retry.backoff(attempt);
                warn!(%key, attempt, ?delay, %error, "copy attempt failed, retrying");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(error) => {
                return Err(CopyFailure {
                    error,
                    attempts: attempt,
                });
            }
        }
    }
}

fn summarize(
    migration_id: Uuid,
    request: MigrationRequest,
    total_objects: usize,
    outcomes: Vec<(String, Outcome)>,
) -> MigrationSummary {
    let mut succeeded = Vec::new();
    let mut failed = BTreeMap::new();
    let mut copied = 0;
    for (key, outcome) in outcomes {
        match outcome {
            Outcome::Unchanged => succeeded.push(key),
            Outcome::Copied => {
                copied += 1;
                succeeded.push(key);
            }
            Outcome::Failed(reason) => {
                failed.insert(key, reason);
            }
        }
    }
    succeeded.sort();

    MigrationSummary {
        migration_id,
        folder_prefix: request.folder_prefix,
        storage_class: request.target_class,
        total_objects,
        copied,
        succeeded,
        failed,
    }
}
