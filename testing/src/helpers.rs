//! Builders for compositor and lifecycle tests.

use gatecard_core::types::{AnchorPoint, CardStyle, CardTemplate, Layout};
use image::{Rgba, RgbaImage};
use std::path::{Path, PathBuf};

/// Write a solid-color PNG template into `dir` and return its path.
///
/// # Panics
///
/// Panics if the image cannot be written; test fixtures treat that as a
/// broken environment.
#[allow(clippy::expect_used)]
pub fn write_template(dir: &Path, name: &str, width: u32, height: u32, rgb: [u8; 3]) -> PathBuf {
    let path = dir.join(name);
    let [r, g, b] = rgb;
    let template = RgbaImage::from_pixel(width, height, Rgba([r, g, b, 255]));
    template
        .save(&path)
        .expect("test template should be writable");
    path
}

/// A layout with the name high, the QR centered and the tier label low.
///
/// # Panics
///
/// Never panics in practice; the coordinates are in range.
#[allow(clippy::expect_used)]
#[must_use]
pub fn centered_layout() -> Layout {
    let anchor = |x, y| AnchorPoint::new(x, y).expect("coordinates are in range");
    Layout::new(anchor(50.0, 20.0), anchor(50.0, 50.0), anchor(50.0, 80.0))
}

/// A style with only the QR overlay enabled, so rendering needs no font.
#[must_use]
pub fn qr_only_style() -> CardStyle {
    CardStyle {
        show_guest_name: false,
        show_tier_label: false,
        show_qr: true,
        ..CardStyle::default()
    }
}

/// A template with the given image path, centered layout and QR-only style.
#[must_use]
pub fn qr_only_template(image_path: PathBuf) -> CardTemplate {
    CardTemplate::new(image_path, centered_layout(), qr_only_style())
}

/// Install a compact tracing subscriber for a test binary; repeated calls
/// are harmless.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_test_writer()
        .try_init();
}
