//! Credential issuer tests: corpus-wide uniqueness, code shape, keyspace
//! widening under congestion, and exhaustion.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code

use gatecard_core::store::{BoxFuture, CredentialStore, InsertOutcome, StoreError};
use gatecard_core::types::{Capacity, Credential, CredentialCode, OwnerRef};
use gatecard_core::{CredentialIssuer, IssueError, IssuerConfig};
use gatecard_testing::mocks::{test_clock, InMemoryCredentialStore};
use proptest::prelude::*;
use std::collections::HashSet;
use std::sync::Arc;

fn issuer_with(store: Arc<dyn CredentialStore>, config: IssuerConfig) -> CredentialIssuer {
    CredentialIssuer::new(store, Arc::new(test_clock()), config)
}

#[tokio::test]
async fn issued_codes_are_unique_across_the_corpus() {
    let store = Arc::new(InMemoryCredentialStore::new());
    let issuer = issuer_with(store.clone(), IssuerConfig::default());

    let mut seen = HashSet::new();
    for _ in 0..500 {
        let credential = issuer
            .issue(OwnerRef::new(), Capacity::new(2))
            .await
            .unwrap();
        assert!(
            seen.insert(credential.code.clone()),
            "duplicate code issued: {}",
            credential.code
        );
    }
    assert_eq!(store.count(), 500);
}

#[tokio::test]
async fn codes_carry_the_prefix_and_digit_width() {
    let store = Arc::new(InMemoryCredentialStore::new());
    let issuer = issuer_with(store, IssuerConfig::default());

    let credential = issuer
        .issue(OwnerRef::new(), Capacity::new(1))
        .await
        .unwrap();
    let digits = credential.code.as_str().strip_prefix("KRGC").unwrap();
    assert_eq!(digits.len(), 6);
    assert!(digits.chars().all(|c| c.is_ascii_digit()));
}

#[tokio::test]
async fn capacity_below_one_is_rejected() {
    let store = Arc::new(InMemoryCredentialStore::new());
    let issuer = issuer_with(store.clone(), IssuerConfig::default());

    let result = issuer.issue(OwnerRef::new(), Capacity::new(0)).await;
    assert!(matches!(result, Err(IssueError::CapacityInvalid(0))));
    assert_eq!(store.count(), 0);
}

/// Store that reports every code at the base width as taken, so issuance
/// must widen the keyspace to succeed.
struct CongestedStore {
    congested_len: usize,
    inner: InMemoryCredentialStore,
}

impl CredentialStore for CongestedStore {
    fn insert_unique(
        &self,
        credential: Credential,
    ) -> BoxFuture<'_, Result<InsertOutcome, StoreError>> {
        if credential.code.as_str().len() == self.congested_len {
            return Box::pin(async { Ok(InsertOutcome::CodeTaken) });
        }
        self.inner.insert_unique(credential)
    }

    fn get(&self, code: &CredentialCode) -> BoxFuture<'_, Result<Option<Credential>, StoreError>> {
        self.inner.get(code)
    }

    fn list_for_owner(
        &self,
        owner: &OwnerRef,
    ) -> BoxFuture<'_, Result<Vec<Credential>, StoreError>> {
        self.inner.list_for_owner(owner)
    }
}

#[tokio::test]
async fn saturated_width_widens_the_keyspace() {
    let store = Arc::new(CongestedStore {
        congested_len: "KRGC".len() + 6,
        inner: InMemoryCredentialStore::new(),
    });
    let issuer = issuer_with(store, IssuerConfig::default());

    let credential = issuer
        .issue(OwnerRef::new(), Capacity::new(1))
        .await
        .unwrap();
    // First width past the congested one: seven digits.
    let digits = credential.code.as_str().strip_prefix("KRGC").unwrap();
    assert_eq!(digits.len(), 7);
}

/// Store where every insert collides, at any width.
struct SaturatedStore;

impl CredentialStore for SaturatedStore {
    fn insert_unique(
        &self,
        _credential: Credential,
    ) -> BoxFuture<'_, Result<InsertOutcome, StoreError>> {
        Box::pin(async { Ok(InsertOutcome::CodeTaken) })
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

#[tokio::test]
async fn full_saturation_fails_loudly_after_every_widening() {
    let config = IssuerConfig {
        max_attempts_per_width: 4,
        max_widenings: 2,
        ..IssuerConfig::default()
    };
    let issuer = issuer_with(Arc::new(SaturatedStore), config);

    let result = issuer.issue(OwnerRef::new(), Capacity::new(1)).await;
    match result {
        Err(IssueError::GenerationExhausted { attempts, width }) => {
            // 4 attempts at each of widths 6, 7 and 8.
            assert_eq!(attempts, 12);
            assert_eq!(width, 8);
        }
        other => panic!("expected GenerationExhausted, got {other:?}"),
    }
}

proptest! {
    /// Issued credentials carry the requested capacity and owner untouched.
    #[test]
    fn issuance_preserves_capacity_and_owner(capacity in 1u32..500) {
        tokio_test::block_on(async {
            let store = Arc::new(InMemoryCredentialStore::new());
            let issuer = issuer_with(store, IssuerConfig::default());

            let owner = OwnerRef::new();
            let credential = issuer.issue(owner, Capacity::new(capacity)).await.unwrap();
            prop_assert_eq!(credential.capacity, Capacity::new(capacity));
            prop_assert_eq!(credential.owner_ref, owner);
            Ok(())
        })?;
    }
}
