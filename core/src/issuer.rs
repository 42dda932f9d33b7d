//! Credential issuance.
//!
//! Generates the unique, scannable admission code for a guest. Codes are a
//! fixed prefix plus a run of random digits; uniqueness is enforced by the
//! credential store's atomic insert, and collisions are retried with fresh
//! candidates.
//!
//! **Keyspace saturation**: a fixed-width random code space degrades as it
//! fills, so retries at one width are capped. When the cap is hit the digit
//! width grows by one (multiplying the keyspace by ten) and generation
//! continues; issuance fails with [`IssueError::GenerationExhausted`] only
//! after every permitted widening is also exhausted.

use crate::config::IssuerConfig;
use crate::environment::Clock;
use crate::store::{CredentialStore, InsertOutcome, StoreError};
use crate::types::{Capacity, Credential, CredentialCode, OwnerRef};
use rand::Rng;
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur during credential issuance
#[derive(Error, Debug)]
pub enum IssueError {
    /// Capacity below the minimum of one admission
    #[error("capacity must be at least 1, got {0}")]
    CapacityInvalid(u32),

    /// Every retry at every permitted width collided
    #[error("code generation exhausted after {attempts} attempts (final width {width})")]
    GenerationExhausted {
        /// Total candidates tried
        attempts: u32,
        /// Digit width in use when generation gave up
        width: u32,
    },

    /// Credential store failure
    #[error("credential store error: {0}")]
    Store(#[from] StoreError),
}

/// Issues admission credentials
pub struct CredentialIssuer {
    store: Arc<dyn CredentialStore>,
    clock: Arc<dyn Clock>,
    config: IssuerConfig,
}

impl CredentialIssuer {
    /// Creates a new issuer
    #[must_use]
    pub fn new(store: Arc<dyn CredentialStore>, clock: Arc<dyn Clock>, config: IssuerConfig) -> Self {
        Self {
            store,
            clock,
            config,
        }
    }

    /// Issue a credential for `owner_ref` authorizing `capacity` admissions.
    ///
    /// Runs once per guest; the resulting code is unique across every
    /// credential ever issued and immutable afterwards.
    ///
    /// # Errors
    ///
    /// - [`IssueError::CapacityInvalid`] if `capacity < 1`
    /// - [`IssueError::GenerationExhausted`] if the keyspace is saturated at
    ///   every permitted width
    /// - [`IssueError::Store`] if the credential store fails
    pub async fn issue(
        &self,
        owner_ref: OwnerRef,
        capacity: Capacity,
    ) -> Result<Credential, IssueError> {
        if capacity.value() < 1 {
            return Err(IssueError::CapacityInvalid(capacity.value()));
        }

        let mut attempts = 0u32;
        for widening in 0..=self.config.max_widenings {
            let width = self.config.code_digits + widening;
            if widening > 0 {
                tracing::warn!(width, "code space congested, widening keyspace");
            }
            for _ in 0..self.config.max_attempts_per_width {
                attempts += 1;
                let code = self.candidate(width);
                let credential =
                    Credential::new(code, owner_ref, capacity, self.clock.now());
                match self.store.insert_unique(credential.clone()).await? {
                    InsertOutcome::Inserted => {
                        tracing::info!(
                            code = %credential.code,
                            owner = %owner_ref,
                            capacity = %capacity,
                            attempts,
                            "credential issued"
                        );
                        return Ok(credential);
                    }
                    InsertOutcome::CodeTaken => {}
                }
            }
        }

        let final_width = self.config.code_digits + self.config.max_widenings;
        tracing::error!(attempts, width = final_width, "credential code generation exhausted");
        Err(IssueError::GenerationExhausted {
            attempts,
            width: final_width,
        })
    }

    /// One random candidate code at the given digit width.
    fn candidate(&self, width: u32) -> CredentialCode {
        let span = 10u64.pow(width);
        let n = rand::thread_rng().gen_range(0..span);
        let digits = width as usize;
        CredentialCode::new(format!("{}{:0width$}", self.config.code_prefix, n, width = digits))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)] // Test code

    use super::*;
    use crate::environment::SystemClock;
    use crate::store::BoxFuture;

    struct NullStore;

    impl CredentialStore for NullStore {
        fn insert_unique(
            &self,
            _credential: Credential,
        ) -> BoxFuture<'_, Result<InsertOutcome, StoreError>> {
            Box::pin(async { Ok(InsertOutcome::Inserted) })
        }

        fn get(
            &self,
            _code: &CredentialCode,
        ) -> BoxFuture<'_, Result<Option<Credential>, StoreError>> {
            Box::pin(async { Ok(None) })
        }

        fn list_for_owner(
            &self,
            _owner: &OwnerRef,
        ) -> BoxFuture<'_, Result<Vec<Credential>, StoreError>> {
            Box::pin(async { Ok(Vec::new()) })
        }
    }

    fn issuer() -> CredentialIssuer {
        CredentialIssuer::new(
            Arc::new(NullStore),
            Arc::new(SystemClock),
            IssuerConfig::default(),
        )
    }

    #[test]
    fn candidate_has_prefix_and_fixed_width() {
        let issuer = issuer();
        let code = issuer.candidate(6);
        let digits = code.as_str().strip_prefix("KRGC").unwrap();
        assert_eq!(digits.len(), 6);
        assert!(digits.chars().all(|c| c.is_ascii_digit()));
    }

    #[tokio::test]
    async fn zero_capacity_is_rejected() {
        let issuer = issuer();
        let result = issuer.issue(OwnerRef::new(), Capacity::new(0)).await;
        assert!(matches!(result, Err(IssueError::CapacityInvalid(0))));
    }
}
