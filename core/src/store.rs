//! Repository traits consumed from the surrounding data layer.
//!
//! Entity persistence lives outside this core; these traits are the exact
//! read/write surface the components need. Production implementations wrap
//! whatever database the host application uses; `gatecard-testing` ships
//! in-memory implementations for fast, deterministic tests.
//!
//! # Dyn Compatibility
//!
//! Methods return explicit `Pin<Box<dyn Future>>` instead of `async fn` so
//! the traits stay object-safe and components can hold `Arc<dyn Store>`.

use crate::types::{Credential, CredentialCode, OwnerRef, RedemptionRecord, RenderedCard};
use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use thiserror::Error;

/// Boxed future returned by store trait methods
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Errors that can occur during store operations
#[derive(Error, Debug)]
pub enum StoreError {
    /// Backing database rejected or failed the operation
    #[error("store backend error: {0}")]
    Backend(String),

    /// Connection or I/O failure reaching the backend
    #[error("store I/O error: {0}")]
    Io(String),
}

/// Outcome of a uniqueness-enforcing insert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The credential was persisted
    Inserted,
    /// Another credential already owns this code; caller should retry with a
    /// fresh candidate
    CodeTaken,
}

/// Persistence for issued credentials.
///
/// `insert_unique` is the uniqueness seam: it must atomically persist the
/// credential only if no credential with the same code exists (unique index
/// semantics), so two concurrent issuers can never both claim one code.
pub trait CredentialStore: Send + Sync {
    /// Insert the credential if its code is unclaimed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backend fails; a taken code is reported
    /// through [`InsertOutcome::CodeTaken`], not an error.
    fn insert_unique(
        &self,
        credential: Credential,
    ) -> BoxFuture<'_, Result<InsertOutcome, StoreError>>;

    /// Fetch a credential by code.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backend fails.
    fn get(&self, code: &CredentialCode) -> BoxFuture<'_, Result<Option<Credential>, StoreError>>;

    /// All credentials belonging to one owner.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backend fails.
    fn list_for_owner(
        &self,
        owner: &OwnerRef,
    ) -> BoxFuture<'_, Result<Vec<Credential>, StoreError>>;
}

/// Persistence for rendered-card rows
pub trait RenderedCardStore: Send + Sync {
    /// Record a newly rendered artifact.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backend fails.
    fn record(&self, card: RenderedCard) -> BoxFuture<'_, Result<(), StoreError>>;

    /// All rendered-card rows for one credential, current and superseded.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backend fails.
    fn list_for_credential(
        &self,
        code: &CredentialCode,
    ) -> BoxFuture<'_, Result<Vec<RenderedCard>, StoreError>>;

    /// Remove the row matching this credential and artifact path.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backend fails.
    fn remove(
        &self,
        code: &CredentialCode,
        artifact_path: &Path,
    ) -> BoxFuture<'_, Result<(), StoreError>>;
}

/// Persistence for redemption records
pub trait RedemptionStore: Send + Sync {
    /// Fetch the redemption record for a credential, if one exists yet.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backend fails.
    fn get(
        &self,
        code: &CredentialCode,
    ) -> BoxFuture<'_, Result<Option<RedemptionRecord>, StoreError>>;

    /// Create or replace the record for its credential code.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backend fails.
    fn upsert(&self, record: RedemptionRecord) -> BoxFuture<'_, Result<(), StoreError>>;
}

/// The owner record's "current card" pointer, maintained by the guest
/// management collaborator. This core only ever clears it during cleanup.
pub trait CurrentCardPointer: Send + Sync {
    /// Clear the owner's current-card reference.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backend fails.
    fn clear(&self, owner: &OwnerRef) -> BoxFuture<'_, Result<(), StoreError>>;
}
