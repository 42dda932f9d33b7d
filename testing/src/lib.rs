//! # Gatecard Testing
//!
//! Testing utilities for the gatecard workspace:
//!
//! - In-memory implementations of the store and storage traits
//! - Deterministic clocks
//! - Template and layout builders for compositor tests
//!
//! ## Example
//!
//! ```ignore
//! use gatecard_testing::mocks::{test_clock, InMemoryCredentialStore};
//! use gatecard_core::{Capacity, CredentialIssuer, IssuerConfig, OwnerRef};
//! use std::sync::Arc;
//!
//! #[tokio::test]
//! async fn issues_a_credential() {
//!     let store = Arc::new(InMemoryCredentialStore::new());
//!     let issuer = CredentialIssuer::new(store, Arc::new(test_clock()), IssuerConfig::default());
//!     let credential = issuer.issue(OwnerRef::new(), Capacity::new(2)).await.unwrap();
//!     assert!(credential.code.as_str().starts_with("KRGC"));
//! }
//! ```

pub mod helpers;
pub mod mocks;

pub use mocks::{test_clock, FixedClock, SteppingClock};
