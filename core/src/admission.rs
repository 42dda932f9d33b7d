//! Admission control.
//!
//! Tracks redemption progress of credentials against their capacity and
//! enforces at-most-capacity admission under concurrent scanning.
//!
//! **Concurrency strategy**: the critical section (load record, check,
//! increment, persist) is serialized *per credential code* through a lock
//! registry, so two scanner devices presenting the same code at two gates
//! can never both observe a free slot and over-admit. Scans of different
//! codes never contend, and credential lookups stay outside the lock.

use crate::environment::Clock;
use crate::store::{CredentialStore, RedemptionStore, StoreError};
use crate::types::{Capacity, Credential, CredentialCode, RedemptionRecord, ScannerId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::Mutex as AsyncMutex;

/// Errors that can occur while recording an admission
#[derive(Error, Debug)]
pub enum ScanError {
    /// The presented code was never issued. Surfaced as a 404-equivalent;
    /// no redemption record is created for unknown codes.
    #[error("no credential issued with code {0}")]
    CredentialNotFound(CredentialCode),

    /// The credential's capacity is already consumed. An expected business
    /// outcome for the scanning client to display, not a system fault.
    #[error("credential {code} has exhausted its capacity of {capacity}")]
    CapacityExceeded {
        /// The redeemed credential
        code: CredentialCode,
        /// Its admission capacity
        capacity: Capacity,
    },

    /// Store failure
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Enforces capacity-bounded redemption of credentials
pub struct AdmissionController {
    credentials: Arc<dyn CredentialStore>,
    redemptions: Arc<dyn RedemptionStore>,
    clock: Arc<dyn Clock>,
    // TODO: evict entries for redeemed codes once that can be done without
    // racing an in-flight scan holding the same Arc.
    locks: Mutex<HashMap<CredentialCode, Arc<AsyncMutex<()>>>>,
}

impl AdmissionController {
    /// Creates a new controller
    #[must_use]
    pub fn new(
        credentials: Arc<dyn CredentialStore>,
        redemptions: Arc<dyn RedemptionStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            credentials,
            redemptions,
            clock,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Record one admission against `code`.
    ///
    /// The redemption record is created lazily on the first scan, seeded
    /// with the credential's capacity. Once `scan_count` reaches capacity
    /// the record flips to `Redeemed` and every further scan fails with
    /// [`ScanError::CapacityExceeded`] without touching state.
    ///
    /// # Errors
    ///
    /// - [`ScanError::CredentialNotFound`] for codes that were never issued
    /// - [`ScanError::CapacityExceeded`] once capacity is consumed
    /// - [`ScanError::Store`] on store failure
    pub async fn scan(
        &self,
        code: &CredentialCode,
        scanned_by: &ScannerId,
    ) -> Result<RedemptionRecord, ScanError> {
        let credential = self
            .credentials
            .get(code)
            .await?
            .ok_or_else(|| ScanError::CredentialNotFound(code.clone()))?;

        let gate = self.code_lock(code);
        let _held = gate.lock().await;

        let mut record = match self.redemptions.get(code).await? {
            Some(record) => record,
            None => RedemptionRecord::new(code.clone(), credential.capacity),
        };

        if record.is_redeemed() {
            tracing::info!(code = %code, scanner = %scanned_by, "scan rejected, capacity consumed");
            return Err(ScanError::CapacityExceeded {
                code: code.clone(),
                capacity: record.capacity,
            });
        }

        record.record_scan(scanned_by.clone(), self.clock.now());
        self.redemptions.upsert(record.clone()).await?;

        tracing::info!(
            code = %code,
            scanner = %scanned_by,
            scan_count = record.scan_count,
            capacity = %record.capacity,
            redeemed = record.is_redeemed(),
            "admission recorded"
        );
        Ok(record)
    }

    /// Resolve a scanned QR payload back to its credential.
    ///
    /// Accepts either the bare code or the full display URI the compositor
    /// embeds (`<base>/<code>`); the trailing path segment is the code.
    ///
    /// # Errors
    ///
    /// - [`ScanError::CredentialNotFound`] if no credential matches
    /// - [`ScanError::Store`] on store failure
    pub async fn resolve_display_lookup(&self, payload: &str) -> Result<Credential, ScanError> {
        let code = CredentialCode::new(extract_code(payload).to_string());
        self.credentials
            .get(&code)
            .await?
            .ok_or(ScanError::CredentialNotFound(code))
    }

    /// The serialization gate for one credential code.
    fn code_lock(&self, code: &CredentialCode) -> Arc<AsyncMutex<()>> {
        let mut locks = match self.locks.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        Arc::clone(
            locks
                .entry(code.clone())
                .or_insert_with(|| Arc::new(AsyncMutex::new(()))),
        )
    }
}

/// Trailing non-empty path segment of a scanned payload.
fn extract_code(payload: &str) -> &str {
    payload
        .trim()
        .rsplit('/')
        .find(|segment| !segment.is_empty())
        .unwrap_or("")
}
