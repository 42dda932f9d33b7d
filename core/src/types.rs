//! Domain types for the guest admission system.
//!
//! This module contains the value objects and entities shared by the
//! credential issuer, the card compositor, the admission controller and the
//! artifact lifecycle manager: credential codes, capacities, card layout and
//! style, rendered-card rows and redemption records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

/// Admission credential code: a fixed prefix followed by a run of digits
/// (e.g. `KRGC483920`). Unique across every credential ever issued.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CredentialCode(String);

impl CredentialCode {
    /// Creates a `CredentialCode` from its string form
    #[must_use]
    pub const fn new(code: String) -> Self {
        Self(code)
    }

    /// Returns the code as a string reference
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The guest-facing resolvable URI embedding this code.
    ///
    /// Any generic QR reader lands on the guest page; the admission scanner
    /// parses the trailing segment back out.
    #[must_use]
    pub fn display_uri(&self, base: &str) -> String {
        format!("{}/{}", base.trim_end_matches('/'), self.0)
    }
}

impl fmt::Display for CredentialCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque reference to the guest (or other entity) a credential belongs to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OwnerRef(Uuid);

impl OwnerRef {
    /// Creates a new random `OwnerRef`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create an `OwnerRef` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for OwnerRef {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OwnerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of the scanning device or operator that recorded an admission
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScannerId(String);

impl ScannerId {
    /// Creates a new `ScannerId`
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the scanner id as a string reference
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScannerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Capacity
// ============================================================================

/// Maximum number of physical admissions a credential authorizes.
///
/// Derived from the guest's tier when the credential is issued and immutable
/// afterwards.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Capacity(u32);

impl Capacity {
    /// Creates a new `Capacity`
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Returns the capacity value
    #[must_use]
    pub const fn value(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for Capacity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Credential
// ============================================================================

/// An issued admission credential
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// Unique scannable code
    pub code: CredentialCode,
    /// Guest this credential belongs to
    pub owner_ref: OwnerRef,
    /// Admissions this credential authorizes
    pub capacity: Capacity,
    /// When the credential was issued
    pub issued_at: DateTime<Utc>,
}

impl Credential {
    /// Creates a new `Credential`
    #[must_use]
    pub const fn new(
        code: CredentialCode,
        owner_ref: OwnerRef,
        capacity: Capacity,
        issued_at: DateTime<Utc>,
    ) -> Self {
        Self {
            code,
            owner_ref,
            capacity,
            issued_at,
        }
    }
}

/// Guest-facing strings drawn onto the card; supplied by the guest
/// management collaborator, never derived here.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuestProfile {
    /// Display name drawn at the name anchor
    pub display_name: String,
    /// Tier label (e.g. "VIP", "Double") drawn at the tier anchor
    pub tier_label: String,
}

impl GuestProfile {
    /// Creates a new `GuestProfile`
    #[must_use]
    pub fn new(display_name: impl Into<String>, tier_label: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            tier_label: tier_label.into(),
        }
    }
}

// ============================================================================
// Card Layout & Style
// ============================================================================

/// Errors raised while constructing layout values
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LayoutError {
    /// A normalized coordinate fell outside the `[0, 100]` range
    #[error("coordinate {value} is outside 0..=100")]
    OutOfRange {
        /// The offending value
        value: f32,
    },
}

/// A normalized anchor on the card, expressed as percentages of the card's
/// width and height. Resolution to pixels happens only inside the compositor,
/// against the resized canvas, so the same layout produces visually
/// consistent placement on any template resolution.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnchorPoint {
    x_pct: f32,
    y_pct: f32,
}

impl AnchorPoint {
    /// Creates an anchor from `(x%, y%)`, both in `[0, 100]`.
    ///
    /// # Errors
    ///
    /// Returns [`LayoutError::OutOfRange`] if either component is outside
    /// `0..=100`.
    pub fn new(x_pct: f32, y_pct: f32) -> Result<Self, LayoutError> {
        for value in [x_pct, y_pct] {
            if !(0.0..=100.0).contains(&value) {
                return Err(LayoutError::OutOfRange { value });
            }
        }
        Ok(Self { x_pct, y_pct })
    }

    /// X component in percent
    #[must_use]
    pub const fn x_pct(&self) -> f32 {
        self.x_pct
    }

    /// Y component in percent
    #[must_use]
    pub const fn y_pct(&self) -> f32 {
        self.y_pct
    }

    /// Resolves the anchor to absolute pixels against a canvas of the given
    /// dimensions.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn resolve(&self, width: u32, height: u32) -> (i64, i64) {
        let x = f64::from(self.x_pct) / 100.0 * f64::from(width);
        let y = f64::from(self.y_pct) / 100.0 * f64::from(height);
        (x.round() as i64, y.round() as i64)
    }
}

/// Overlay anchors for one card design: where the guest name, the QR code and
/// the tier label sit, as normalized percentages. Owned by the event's
/// template and read-only to the compositor.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Layout {
    /// Guest name anchor
    pub name: AnchorPoint,
    /// QR code anchor (the QR is centered on it)
    pub qr: AnchorPoint,
    /// Tier label anchor
    pub tier_label: AnchorPoint,
}

impl Layout {
    /// Creates a new `Layout`
    #[must_use]
    pub const fn new(name: AnchorPoint, qr: AnchorPoint, tier_label: AnchorPoint) -> Self {
        Self {
            name,
            qr,
            tier_label,
        }
    }
}

/// Errors raised while parsing style colors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ColorParseError {
    /// The string is not a `#RRGGBB` hex color
    #[error("invalid hex color: {0}")]
    InvalidHex(String),
}

/// An opaque RGB text color parsed from a `#RRGGBB` hex string
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextColor {
    r: u8,
    g: u8,
    b: u8,
}

impl TextColor {
    /// Creates a color from raw channels
    #[must_use]
    pub const fn from_rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parses a `#RRGGBB` hex string (leading `#` optional).
    ///
    /// # Errors
    ///
    /// Returns [`ColorParseError::InvalidHex`] for anything that is not six
    /// hex digits.
    pub fn from_hex(hex: &str) -> Result<Self, ColorParseError> {
        let digits = hex.strip_prefix('#').unwrap_or(hex);
        if digits.len() != 6 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ColorParseError::InvalidHex(hex.to_string()));
        }
        let channel = |range| {
            u8::from_str_radix(&digits[range], 16)
                .map_err(|_| ColorParseError::InvalidHex(hex.to_string()))
        };
        Ok(Self {
            r: channel(0..2)?,
            g: channel(2..4)?,
            b: channel(4..6)?,
        })
    }

    /// Returns the `[r, g, b]` channels
    #[must_use]
    pub const fn channels(&self) -> [u8; 3] {
        [self.r, self.g, self.b]
    }
}

impl fmt::Display for TextColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

/// Per-event styling overrides applied by the compositor.
///
/// Sizes are in pixels at the template's reference scale; the compositor
/// multiplies them by the uniform resize scale so text never looks stretched.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CardStyle {
    /// Guest name fill color
    pub name_color: TextColor,
    /// Tier label fill color
    pub tier_color: TextColor,
    /// Guest name font size before scaling
    pub name_size: f32,
    /// Tier label font size before scaling
    pub tier_size: f32,
    /// Draw the guest name overlay
    pub show_guest_name: bool,
    /// Draw the QR code overlay
    pub show_qr: bool,
    /// Draw the tier label overlay
    pub show_tier_label: bool,
}

impl Default for CardStyle {
    fn default() -> Self {
        Self {
            name_color: TextColor::from_rgb(0x00, 0x00, 0x00),
            tier_color: TextColor::from_rgb(0x33, 0x33, 0x33),
            name_size: 98.0,
            tier_size: 60.0,
            show_guest_name: true,
            show_qr: true,
            show_tier_label: true,
        }
    }
}

/// A card template: the event's validated design image plus the layout and
/// style used to personalize it. Upload validation (format and dimension
/// allow-listing) happens before a template reaches this core.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CardTemplate {
    /// Path to the validated design image
    pub image_path: PathBuf,
    /// Normalized overlay anchors
    pub layout: Layout,
    /// Per-event style overrides
    pub style: CardStyle,
}

impl CardTemplate {
    /// Creates a new `CardTemplate`
    #[must_use]
    pub const fn new(image_path: PathBuf, layout: Layout, style: CardStyle) -> Self {
        Self {
            image_path,
            layout,
            style,
        }
    }
}

// ============================================================================
// Rendered Cards
// ============================================================================

/// A rendered card artifact on disk.
///
/// At most one artifact per credential is the guest's *current* card at any
/// time; earlier renders are superseded and become cleanup candidates.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedCard {
    /// Credential the card was rendered for
    pub credential_code: CredentialCode,
    /// Published artifact path
    pub artifact_path: PathBuf,
    /// When the render completed
    pub rendered_at: DateTime<Utc>,
}

impl RenderedCard {
    /// Creates a new `RenderedCard`
    #[must_use]
    pub const fn new(
        credential_code: CredentialCode,
        artifact_path: PathBuf,
        rendered_at: DateTime<Utc>,
    ) -> Self {
        Self {
            credential_code,
            artifact_path,
            rendered_at,
        }
    }
}

// ============================================================================
// Redemption
// ============================================================================

/// Redemption progress of a credential
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RedemptionStatus {
    /// Admissions remain
    NotRedeemed,
    /// Capacity consumed; terminal
    Redeemed,
}

/// Admission bookkeeping for one credential.
///
/// `scan_count` only ever grows and never exceeds `capacity`;
/// `status == Redeemed` exactly when `scan_count >= capacity`. Mutated only
/// by the admission controller inside its per-code critical section.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedemptionRecord {
    /// Credential being redeemed
    pub credential_code: CredentialCode,
    /// Capacity copied from the credential at first scan
    pub capacity: Capacity,
    /// Admissions recorded so far
    pub scan_count: u32,
    /// Two-state redemption status
    pub status: RedemptionStatus,
    /// Scanner that recorded the most recent admission
    pub last_scanned_by: Option<ScannerId>,
    /// When the most recent admission was recorded
    pub last_scanned_at: Option<DateTime<Utc>>,
}

impl RedemptionRecord {
    /// Creates the initial record for a credential
    #[must_use]
    pub const fn new(credential_code: CredentialCode, capacity: Capacity) -> Self {
        Self {
            credential_code,
            capacity,
            scan_count: 0,
            status: RedemptionStatus::NotRedeemed,
            last_scanned_by: None,
            last_scanned_at: None,
        }
    }

    /// Whether the credential's capacity is consumed
    #[must_use]
    pub fn is_redeemed(&self) -> bool {
        self.status == RedemptionStatus::Redeemed
    }

    /// Admissions still available
    #[must_use]
    pub const fn remaining(&self) -> u32 {
        self.capacity.value().saturating_sub(self.scan_count)
    }

    /// Records one admission, stamping the scanner and time and flipping to
    /// `Redeemed` once the capacity is reached. Callers must have rejected
    /// already-redeemed records first.
    pub fn record_scan(&mut self, scanned_by: ScannerId, scanned_at: DateTime<Utc>) {
        self.scan_count += 1;
        self.last_scanned_by = Some(scanned_by);
        self.last_scanned_at = Some(scanned_at);
        if self.scan_count >= self.capacity.value() {
            self.status = RedemptionStatus::Redeemed;
        }
    }
}

// ============================================================================
// Cleanup Reports
// ============================================================================

/// Outcome of an artifact purge for one owner.
///
/// Cleanup is best-effort: individual failures land in `errors` instead of
/// aborting the remaining artifacts.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupReport {
    /// Rendered-card rows examined
    pub examined: u32,
    /// Artifact files actually deleted
    pub deleted: u32,
    /// Accumulated per-artifact failures
    pub errors: Vec<String>,
}

/// Aggregated outcome of purging several owners in one batch
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchCleanupReport {
    /// Owners processed (including those that contributed errors)
    pub owners_processed: u32,
    /// Rows examined across the batch
    pub examined: u32,
    /// Files deleted across the batch
    pub deleted: u32,
    /// Accumulated failures across the batch
    pub errors: Vec<String>,
}

impl BatchCleanupReport {
    /// Folds one owner's report into the batch totals
    pub fn absorb(&mut self, report: CleanupReport) {
        self.owners_processed += 1;
        self.examined += report.examined;
        self.deleted += report.deleted;
        self.errors.extend(report.errors);
    }
}

/// Pre-cleanup inspection of an owner's rendered artifacts
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupStats {
    /// Owner inspected
    pub owner_ref: OwnerRef,
    /// Artifact files present on storage
    pub artifacts: u32,
    /// Total bytes those files occupy
    pub total_bytes: u64,
}
