//! Artifact lifecycle management.
//!
//! When an event reaches a terminal state its rendered card files are dead
//! weight; this component purges them. The credential and its redemption
//! record are deliberately left intact — the identifier and the admission
//! history stay auditable after the files are gone.
//!
//! Cleanup is best-effort: a missing file or a failed delete is logged and
//! accumulated into the report, never allowed to abort the rest of the
//! batch.

use crate::storage::{ArtifactStore, StorageError};
use crate::store::{CredentialStore, CurrentCardPointer, RenderedCardStore};
use crate::types::{BatchCleanupReport, CleanupReport, CleanupStats, OwnerRef, RenderedCard};
use std::sync::Arc;

/// Purges rendered card artifacts for completed events
pub struct ArtifactLifecycleManager {
    credentials: Arc<dyn CredentialStore>,
    cards: Arc<dyn RenderedCardStore>,
    artifacts: Arc<dyn ArtifactStore>,
    pointer: Arc<dyn CurrentCardPointer>,
}

impl ArtifactLifecycleManager {
    /// Creates a new lifecycle manager
    #[must_use]
    pub fn new(
        credentials: Arc<dyn CredentialStore>,
        cards: Arc<dyn RenderedCardStore>,
        artifacts: Arc<dyn ArtifactStore>,
        pointer: Arc<dyn CurrentCardPointer>,
    ) -> Self {
        Self {
            credentials,
            cards,
            artifacts,
            pointer,
        }
    }

    /// Delete every rendered card artifact belonging to `owner`.
    ///
    /// The owner's current-card pointer is cleared after the delete attempts
    /// complete, whether or not any of them failed. Credentials and
    /// redemption records are never touched.
    pub async fn purge_for_owner(&self, owner: &OwnerRef) -> CleanupReport {
        let mut report = CleanupReport::default();

        tracing::info!(owner = %owner, "starting card artifact cleanup");

        let credentials = match self.credentials.list_for_owner(owner).await {
            Ok(credentials) => credentials,
            Err(e) => {
                tracing::error!(owner = %owner, error = %e, "could not enumerate credentials");
                report.errors.push(format!("listing credentials for {owner}: {e}"));
                return report;
            }
        };

        for credential in &credentials {
            let cards = match self.cards.list_for_credential(&credential.code).await {
                Ok(cards) => cards,
                Err(e) => {
                    report
                        .errors
                        .push(format!("listing cards for {}: {e}", credential.code));
                    continue;
                }
            };

            for card in cards {
                report.examined += 1;
                self.purge_one(&card, &mut report).await;
            }
        }

        if let Err(e) = self.pointer.clear(owner).await {
            report.errors.push(format!("clearing card pointer for {owner}: {e}"));
        }

        tracing::info!(
            owner = %owner,
            examined = report.examined,
            deleted = report.deleted,
            errors = report.errors.len(),
            "card artifact cleanup finished"
        );
        report
    }

    /// Purge several owners in one batch; one owner's failures never stop
    /// the others.
    pub async fn purge_for_owners(&self, owners: &[OwnerRef]) -> BatchCleanupReport {
        let mut batch = BatchCleanupReport::default();
        for owner in owners {
            batch.absorb(self.purge_for_owner(owner).await);
        }
        batch
    }

    /// Inspect an owner's rendered artifacts without deleting anything.
    pub async fn stats_for_owner(&self, owner: &OwnerRef) -> CleanupStats {
        let mut stats = CleanupStats {
            owner_ref: *owner,
            artifacts: 0,
            total_bytes: 0,
        };

        let Ok(credentials) = self.credentials.list_for_owner(owner).await else {
            return stats;
        };
        for credential in &credentials {
            let Ok(cards) = self.cards.list_for_credential(&credential.code).await else {
                continue;
            };
            for card in cards {
                if let Ok(size) = self.artifacts.size_of(&card.artifact_path).await {
                    stats.artifacts += 1;
                    stats.total_bytes += size;
                }
            }
        }
        stats
    }

    /// Delete one artifact file and drop its row.
    async fn purge_one(&self, card: &RenderedCard, report: &mut CleanupReport) {
        match self.artifacts.delete(&card.artifact_path).await {
            Ok(()) => {
                report.deleted += 1;
                tracing::info!(
                    code = %card.credential_code,
                    path = %card.artifact_path.display(),
                    "card artifact deleted"
                );
            }
            Err(StorageError::NotFound(path)) => {
                tracing::warn!(
                    code = %card.credential_code,
                    path = %path.display(),
                    "card artifact already missing on disk"
                );
                report
                    .errors
                    .push(format!("missing artifact: {}", path.display()));
            }
            Err(e) => {
                tracing::error!(
                    code = %card.credential_code,
                    path = %card.artifact_path.display(),
                    error = %e,
                    "failed to delete card artifact"
                );
                report.errors.push(format!(
                    "deleting {}: {e}",
                    card.artifact_path.display()
                ));
            }
        }

        // Row removal runs regardless: a dangling row for a gone file helps no one.
        if let Err(e) = self
            .cards
            .remove(&card.credential_code, &card.artifact_path)
            .await
        {
            report.errors.push(format!(
                "removing card row {}: {e}",
                card.artifact_path.display()
            ));
        }
    }
}
