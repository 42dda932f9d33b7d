//! Mock implementations of the gatecard environment and store traits.
//!
//! All stores here are in-memory `HashMap`s behind plain mutexes; critical
//! sections are short and never hold a lock across an await point.

use chrono::{DateTime, Duration, Utc};
use gatecard_core::storage::{ArtifactStore, StorageError};
use gatecard_core::store::{
    BoxFuture, CredentialStore, CurrentCardPointer, InsertOutcome, RedemptionStore,
    RenderedCardStore, StoreError,
};
use gatecard_core::types::{Credential, CredentialCode, OwnerRef, RedemptionRecord, RenderedCard};
use gatecard_core::Clock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

// ============================================================================
// Clocks
// ============================================================================

/// Fixed clock for deterministic tests.
///
/// Always returns the same time, making tests reproducible.
#[derive(Debug, Clone)]
pub struct FixedClock {
    time: DateTime<Utc>,
}

impl FixedClock {
    /// Create a new fixed clock with the given time
    #[must_use]
    pub const fn new(time: DateTime<Utc>) -> Self {
        Self { time }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.time
    }
}

/// Clock that advances one millisecond per observation, so consecutive
/// renders land on distinct artifact paths while staying deterministic.
#[derive(Debug)]
pub struct SteppingClock {
    next: Mutex<DateTime<Utc>>,
}

impl SteppingClock {
    /// Create a stepping clock starting at `start`
    #[must_use]
    pub const fn new(start: DateTime<Utc>) -> Self {
        Self {
            next: Mutex::new(start),
        }
    }
}

impl Clock for SteppingClock {
    fn now(&self) -> DateTime<Utc> {
        let mut next = lock(&self.next);
        let current = *next;
        *next = current + Duration::milliseconds(1);
        current
    }
}

/// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
///
/// # Panics
///
/// This function will panic if the hardcoded timestamp fails to parse,
/// which should never happen in practice.
#[must_use]
#[allow(clippy::expect_used)]
pub fn test_clock() -> FixedClock {
    FixedClock::new(
        DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
            .expect("hardcoded timestamp should always parse")
            .with_timezone(&Utc),
    )
}

// ============================================================================
// Credential Store
// ============================================================================

/// In-memory credential store with unique-index insert semantics
#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    credentials: Mutex<HashMap<CredentialCode, Credential>>,
}

impl InMemoryCredentialStore {
    /// Creates an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of credentials held
    #[must_use]
    pub fn count(&self) -> usize {
        lock(&self.credentials).len()
    }
}

impl CredentialStore for InMemoryCredentialStore {
    fn insert_unique(
        &self,
        credential: Credential,
    ) -> BoxFuture<'_, Result<InsertOutcome, StoreError>> {
        Box::pin(async move {
            let mut credentials = lock(&self.credentials);
            if credentials.contains_key(&credential.code) {
                return Ok(InsertOutcome::CodeTaken);
            }
            credentials.insert(credential.code.clone(), credential);
            Ok(InsertOutcome::Inserted)
        })
    }

    fn get(&self, code: &CredentialCode) -> BoxFuture<'_, Result<Option<Credential>, StoreError>> {
        let code = code.clone();
        Box::pin(async move { Ok(lock(&self.credentials).get(&code).cloned()) })
    }

    fn list_for_owner(
        &self,
        owner: &OwnerRef,
    ) -> BoxFuture<'_, Result<Vec<Credential>, StoreError>> {
        let owner = *owner;
        Box::pin(async move {
            Ok(lock(&self.credentials)
                .values()
                .filter(|c| c.owner_ref == owner)
                .cloned()
                .collect())
        })
    }
}

// ============================================================================
// Rendered Card Store
// ============================================================================

/// In-memory rendered-card rows
#[derive(Debug, Default)]
pub struct InMemoryRenderedCardStore {
    cards: Mutex<Vec<RenderedCard>>,
}

impl InMemoryRenderedCardStore {
    /// Creates an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All rows currently held
    #[must_use]
    pub fn all(&self) -> Vec<RenderedCard> {
        lock(&self.cards).clone()
    }
}

impl RenderedCardStore for InMemoryRenderedCardStore {
    fn record(&self, card: RenderedCard) -> BoxFuture<'_, Result<(), StoreError>> {
        Box::pin(async move {
            lock(&self.cards).push(card);
            Ok(())
        })
    }

    fn list_for_credential(
        &self,
        code: &CredentialCode,
    ) -> BoxFuture<'_, Result<Vec<RenderedCard>, StoreError>> {
        let code = code.clone();
        Box::pin(async move {
            Ok(lock(&self.cards)
                .iter()
                .filter(|card| card.credential_code == code)
                .cloned()
                .collect())
        })
    }

    fn remove(
        &self,
        code: &CredentialCode,
        artifact_path: &Path,
    ) -> BoxFuture<'_, Result<(), StoreError>> {
        let code = code.clone();
        let artifact_path = artifact_path.to_path_buf();
        Box::pin(async move {
            lock(&self.cards)
                .retain(|card| !(card.credential_code == code && card.artifact_path == artifact_path));
            Ok(())
        })
    }
}

// ============================================================================
// Redemption Store
// ============================================================================

/// In-memory redemption records
#[derive(Debug, Default)]
pub struct InMemoryRedemptionStore {
    records: Mutex<HashMap<CredentialCode, RedemptionRecord>>,
}

impl InMemoryRedemptionStore {
    /// Creates an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records held
    #[must_use]
    pub fn count(&self) -> usize {
        lock(&self.records).len()
    }
}

impl RedemptionStore for InMemoryRedemptionStore {
    fn get(
        &self,
        code: &CredentialCode,
    ) -> BoxFuture<'_, Result<Option<RedemptionRecord>, StoreError>> {
        let code = code.clone();
        Box::pin(async move { Ok(lock(&self.records).get(&code).cloned()) })
    }

    fn upsert(&self, record: RedemptionRecord) -> BoxFuture<'_, Result<(), StoreError>> {
        Box::pin(async move {
            lock(&self.records).insert(record.credential_code.clone(), record);
            Ok(())
        })
    }
}

// ============================================================================
// Current Card Pointer
// ============================================================================

/// Records which owners had their current-card pointer cleared
#[derive(Debug, Default)]
pub struct RecordingCardPointer {
    cleared: Mutex<Vec<OwnerRef>>,
}

impl RecordingCardPointer {
    /// Creates an empty recorder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Owners cleared so far, in order
    #[must_use]
    pub fn cleared(&self) -> Vec<OwnerRef> {
        lock(&self.cleared).clone()
    }
}

impl CurrentCardPointer for RecordingCardPointer {
    fn clear(&self, owner: &OwnerRef) -> BoxFuture<'_, Result<(), StoreError>> {
        let owner = *owner;
        Box::pin(async move {
            lock(&self.cleared).push(owner);
            Ok(())
        })
    }
}

// ============================================================================
// Artifact Stores
// ============================================================================

/// In-memory artifact store; published paths live under a synthetic `/mem`
/// root so they are distinguishable from real filesystem paths in asserts.
#[derive(Debug, Default)]
pub struct InMemoryArtifactStore {
    files: Mutex<HashMap<PathBuf, Vec<u8>>>,
}

impl InMemoryArtifactStore {
    /// Creates an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes previously written at `path`
    #[must_use]
    pub fn bytes(&self, path: &Path) -> Option<Vec<u8>> {
        lock(&self.files).get(path).cloned()
    }

    /// Number of artifacts held
    #[must_use]
    pub fn file_count(&self) -> usize {
        lock(&self.files).len()
    }

    /// Pre-seed an artifact, bypassing `write`
    pub fn seed(&self, path: PathBuf, bytes: Vec<u8>) {
        lock(&self.files).insert(path, bytes);
    }
}

impl ArtifactStore for InMemoryArtifactStore {
    fn write(&self, relative: &Path, bytes: &[u8]) -> BoxFuture<'_, Result<PathBuf, StorageError>> {
        let path = Path::new("/mem").join(relative);
        let bytes = bytes.to_vec();
        Box::pin(async move {
            lock(&self.files).insert(path.clone(), bytes);
            Ok(path)
        })
    }

    fn delete(&self, path: &Path) -> BoxFuture<'_, Result<(), StorageError>> {
        let path = path.to_path_buf();
        Box::pin(async move {
            match lock(&self.files).remove(&path) {
                Some(_) => Ok(()),
                None => Err(StorageError::NotFound(path)),
            }
        })
    }

    fn size_of(&self, path: &Path) -> BoxFuture<'_, Result<u64, StorageError>> {
        let path = path.to_path_buf();
        Box::pin(async move {
            lock(&self.files)
                .get(&path)
                .map(|bytes| bytes.len() as u64)
                .ok_or(StorageError::NotFound(path))
        })
    }
}

/// Artifact store whose writes always fail; for asserting that a failed
/// render publishes nothing and records nothing.
#[derive(Debug, Default)]
pub struct FailingArtifactStore;

impl ArtifactStore for FailingArtifactStore {
    fn write(&self, _relative: &Path, _bytes: &[u8]) -> BoxFuture<'_, Result<PathBuf, StorageError>> {
        Box::pin(async { Err(StorageError::Io("injected write failure".to_string())) })
    }

    fn delete(&self, path: &Path) -> BoxFuture<'_, Result<(), StorageError>> {
        let path = path.to_path_buf();
        Box::pin(async move { Err(StorageError::NotFound(path)) })
    }

    fn size_of(&self, path: &Path) -> BoxFuture<'_, Result<u64, StorageError>> {
        let path = path.to_path_buf();
        Box::pin(async move { Err(StorageError::NotFound(path)) })
    }
}
