//! Configuration for issuance, rendering and artifact storage.
//!
//! Loads configuration from environment variables with sensible defaults.

use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Credential issuer configuration
    pub issuer: IssuerConfig,
    /// Card rendering configuration
    pub render: RenderConfig,
    /// Artifact storage configuration
    pub artifacts: ArtifactConfig,
}

/// Credential code generation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuerConfig {
    /// Fixed prefix on every code
    pub code_prefix: String,
    /// Initial digit width after the prefix
    pub code_digits: u32,
    /// Collision retries at one width before the keyspace widens
    pub max_attempts_per_width: u32,
    /// Extra digits the keyspace may grow by before issuance fails
    pub max_widenings: u32,
}

impl Default for IssuerConfig {
    fn default() -> Self {
        Self {
            code_prefix: "KRGC".to_string(),
            code_digits: 6,
            max_attempts_per_width: 16,
            max_widenings: 3,
        }
    }
}

/// Output encoding for rendered cards
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputFormat {
    /// JPEG at the given quality (1-100); tuned for message-attachment limits
    Jpeg {
        /// Encoder quality
        quality: u8,
    },
    /// Lossless PNG
    Png,
}

impl OutputFormat {
    /// File extension for artifact paths
    #[must_use]
    pub const fn file_extension(&self) -> &'static str {
        match self {
            Self::Jpeg { .. } => "jpg",
            Self::Png => "png",
        }
    }
}

/// Card rendering settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    /// Target canvas width the template is fitted into
    pub canvas_width: u32,
    /// Target canvas height the template is fitted into
    pub canvas_height: u32,
    /// QR side length in pixels before scaling
    pub qr_size: u32,
    /// Text shadow offset in pixels before scaling
    pub shadow_offset: f32,
    /// Base URL the QR payload resolves to (`<base>/<code>`)
    pub display_base_url: String,
    /// Output encoding
    pub output: OutputFormat,
    /// Directory (relative to the artifact root) rendered cards land in
    pub card_dir: String,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            canvas_width: 1200,
            canvas_height: 1200,
            qr_size: 300,
            shadow_offset: 2.0,
            display_base_url: "https://gatecard.example.com/rsvp".to_string(),
            output: OutputFormat::Jpeg { quality: 80 },
            card_dir: "cards".to_string(),
        }
    }
}

/// Artifact storage settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactConfig {
    /// Root directory all artifacts live under
    pub root: PathBuf,
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("storage"),
        }
    }
}

impl Config {
    /// Load configuration from environment variables, falling back to the
    /// defaults above for anything unset or unparsable.
    #[must_use]
    pub fn from_env() -> Self {
        let issuer_defaults = IssuerConfig::default();
        let render_defaults = RenderConfig::default();
        Self {
            issuer: IssuerConfig {
                code_prefix: env::var("GATECARD_CODE_PREFIX")
                    .unwrap_or(issuer_defaults.code_prefix),
                code_digits: env::var("GATECARD_CODE_DIGITS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(issuer_defaults.code_digits),
                max_attempts_per_width: env::var("GATECARD_MAX_ATTEMPTS_PER_WIDTH")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(issuer_defaults.max_attempts_per_width),
                max_widenings: env::var("GATECARD_MAX_WIDENINGS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(issuer_defaults.max_widenings),
            },
            render: RenderConfig {
                canvas_width: env::var("GATECARD_CANVAS_WIDTH")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(render_defaults.canvas_width),
                canvas_height: env::var("GATECARD_CANVAS_HEIGHT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(render_defaults.canvas_height),
                qr_size: env::var("GATECARD_QR_SIZE")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(render_defaults.qr_size),
                shadow_offset: env::var("GATECARD_SHADOW_OFFSET")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(render_defaults.shadow_offset),
                display_base_url: env::var("GATECARD_DISPLAY_BASE_URL")
                    .unwrap_or(render_defaults.display_base_url),
                output: output_from_env().unwrap_or(render_defaults.output),
                card_dir: env::var("GATECARD_CARD_DIR").unwrap_or(render_defaults.card_dir),
            },
            artifacts: ArtifactConfig {
                root: env::var("GATECARD_ARTIFACT_ROOT")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| ArtifactConfig::default().root),
            },
        }
    }
}

fn output_from_env() -> Option<OutputFormat> {
    let format = env::var("GATECARD_OUTPUT_FORMAT").ok()?;
    match format.to_ascii_lowercase().as_str() {
        "png" => Some(OutputFormat::Png),
        "jpeg" | "jpg" => {
            let quality = env::var("GATECARD_JPEG_QUALITY")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(80);
            Some(OutputFormat::Jpeg { quality })
        }
        _ => None,
    }
}
