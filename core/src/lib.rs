//! # Gatecard Core
//!
//! Credential issuance, card compositing and admission control for guest
//! events. Each guest receives a unique scannable credential, gets a
//! personalized card image rendered for delivery over a size-constrained
//! messaging channel, and is admitted at the door against the credential's
//! capacity — never beyond it, no matter how many scanners race.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────┐     ┌────────────────────┐
//! │  Credential Issuer │────▶│  Card Compositor   │
//! │  (once per guest)  │     │ (render on demand) │
//! └────────────────────┘     └────────────────────┘
//!           │                          │
//!           │ code                     │ artifact
//!           ▼                          ▼
//! ┌────────────────────┐     ┌────────────────────┐
//! │     Admission      │     │ Artifact Lifecycle │
//! │     Controller     │     │      Manager       │
//! │  (scan at gates)   │     │(purge on completion)
//! └────────────────────┘     └────────────────────┘
//! ```
//!
//! Admission works whether or not a card was ever rendered, and purging
//! rendered files never invalidates the credential or its admission history.
//!
//! # Key Properties
//!
//! - **Unique codes**: the store's atomic insert is the uniqueness seam;
//!   collision retries are capped per digit width, then the keyspace widens.
//! - **Scale-correct compositing**: layout anchors are normalized
//!   percentages resolved against the resized canvas; font and QR sizes are
//!   multiplied by the uniform resize scale.
//! - **No over-admission**: the redemption critical section is serialized
//!   per credential code; `scan_count` never exceeds capacity.
//! - **Deterministic rendering**: identical inputs produce byte-identical
//!   artifacts, so golden-image tests are possible.
//!
//! Persistence is injected through the traits in [`store`] and [`storage`];
//! `gatecard-testing` provides in-memory implementations.

pub mod admission;
pub mod compositor;
pub mod config;
pub mod environment;
pub mod issuer;
pub mod lifecycle;
pub mod storage;
pub mod store;
pub mod types;

pub use admission::{AdmissionController, ScanError};
pub use compositor::{CardCompositor, FontResource, RenderError};
pub use config::{ArtifactConfig, Config, IssuerConfig, OutputFormat, RenderConfig};
pub use environment::{Clock, SystemClock};
pub use issuer::{CredentialIssuer, IssueError};
pub use lifecycle::ArtifactLifecycleManager;
pub use storage::{ArtifactStore, FsArtifactStore, StorageError};
pub use store::{
    BoxFuture, CredentialStore, CurrentCardPointer, InsertOutcome, RedemptionStore,
    RenderedCardStore, StoreError,
};
pub use types::{
    AnchorPoint, BatchCleanupReport, Capacity, CardStyle, CardTemplate, CleanupReport,
    CleanupStats, ColorParseError, Credential, CredentialCode, GuestProfile, Layout, LayoutError,
    OwnerRef, RedemptionRecord, RedemptionStatus, RenderedCard, ScannerId, TextColor,
};
