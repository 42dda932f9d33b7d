//! Card compositing.
//!
//! Renders a guest's personalized card: the event's template image fitted
//! into the transport canvas, with the guest name, tier label and QR code
//! drawn at the template's normalized anchors. All overlay sizes are
//! multiplied by the uniform resize scale so a 4000px template and a 800px
//! template produce visually identical cards.
//!
//! Rendering is deterministic: identical inputs produce byte-identical
//! artifacts. The injected [`Clock`] only stamps the artifact path and the
//! `rendered_at` field, never the pixels.

use crate::config::{OutputFormat, RenderConfig};
use crate::environment::Clock;
use crate::storage::{ArtifactStore, StorageError};
use crate::store::{RenderedCardStore, StoreError};
use crate::types::{CardTemplate, Credential, GuestProfile, RenderedCard, TextColor};
use ab_glyph::{FontArc, PxScale};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{DynamicImage, GenericImageView, ImageFormat, Rgba, RgbaImage};
use imageproc::drawing::{draw_text_mut, text_size};
use qrcode::{EcLevel, QrCode};
use std::io::{self, Cursor};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Quiet-zone width around the QR symbol, in modules
const QR_QUIET_MODULES: u32 = 4;

/// Errors that can occur while rendering a card
#[derive(Error, Debug)]
pub enum RenderError {
    /// The template image file does not exist
    #[error("card template not found: {}", .0.display())]
    TemplateMissing(std::path::PathBuf),

    /// The template file exists but is not a decodable raster
    #[error("card template could not be decoded: {0}")]
    TemplateUndecodable(String),

    /// The QR payload does not fit any supported symbol even at the lowest
    /// error-correction level
    #[error("QR encoding failed: {0}")]
    QrEncodingFailed(String),

    /// The finished canvas could not be encoded to the output format
    #[error("canvas encoding failed: {0}")]
    EncodeFailed(String),

    /// The artifact store rejected or failed the write
    #[error("artifact write failed: {0}")]
    StorageWriteFailed(#[from] StorageError),

    /// The supplied bytes are not a usable font face
    #[error("font data is not a usable font face: {0}")]
    FontInvalid(String),

    /// A text overlay is enabled but no font resource was injected
    #[error("text overlays enabled but no font resource was injected")]
    FontUnavailable,

    /// Rendered-card store failure
    #[error("rendered card store error: {0}")]
    Store(#[from] StoreError),
}

/// An injected font face used for the name and tier overlays.
///
/// Passed in at construction so the compositor carries no process-wide font
/// path assumptions; hosts load whatever face the deployment ships.
#[derive(Clone)]
pub struct FontResource {
    face: FontArc,
}

impl FontResource {
    /// Parse a font face from raw TTF/OTF bytes.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::FontInvalid`] if the bytes are not a parseable
    /// font.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, RenderError> {
        let face = FontArc::try_from_vec(bytes).map_err(|e| RenderError::FontInvalid(e.to_string()))?;
        Ok(Self { face })
    }

    /// The parsed face
    #[must_use]
    pub const fn face(&self) -> &FontArc {
        &self.face
    }
}

impl std::fmt::Debug for FontResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontResource").finish_non_exhaustive()
    }
}

/// Renders personalized guest cards
pub struct CardCompositor {
    font: Option<FontResource>,
    artifacts: Arc<dyn ArtifactStore>,
    cards: Arc<dyn RenderedCardStore>,
    clock: Arc<dyn Clock>,
    config: RenderConfig,
}

impl CardCompositor {
    /// Creates a new compositor.
    ///
    /// `font` may be `None` for deployments that never enable text overlays;
    /// rendering a template with the name or tier flag set then fails with
    /// [`RenderError::FontUnavailable`].
    #[must_use]
    pub fn new(
        font: Option<FontResource>,
        artifacts: Arc<dyn ArtifactStore>,
        cards: Arc<dyn RenderedCardStore>,
        clock: Arc<dyn Clock>,
        config: RenderConfig,
    ) -> Self {
        Self {
            font,
            artifacts,
            cards,
            clock,
            config,
        }
    }

    /// Render a personalized card for `credential` onto `template`.
    ///
    /// The artifact lands at a fresh path keyed by the code and the render
    /// time — prior artifacts are never overwritten, so concurrent or
    /// duplicate render requests are safe and superseded files stay visible
    /// to cleanup. The owning guest's current-card pointer is updated by the
    /// caller, not here.
    ///
    /// # Errors
    ///
    /// See [`RenderError`]; template problems are configuration errors and
    /// are never retried here.
    pub async fn render(
        &self,
        credential: &Credential,
        template: &CardTemplate,
        guest: &GuestProfile,
    ) -> Result<RenderedCard, RenderError> {
        let template_bytes = match tokio::fs::read(&template.image_path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(RenderError::TemplateMissing(template.image_path.clone()));
            }
            Err(e) => return Err(RenderError::TemplateUndecodable(e.to_string())),
        };

        let encoded = self.compose(&template_bytes, template, guest, credential)?;

        let rendered_at = self.clock.now();
        let file_name = format!(
            "{}_{}.{}",
            credential.code,
            rendered_at.timestamp_millis(),
            self.config.output.file_extension()
        );
        let relative = Path::new(&self.config.card_dir).join(file_name);
        let published = self.artifacts.write(&relative, &encoded).await?;

        let card = RenderedCard::new(credential.code.clone(), published, rendered_at);
        self.cards.record(card.clone()).await?;

        tracing::info!(
            code = %credential.code,
            path = %card.artifact_path.display(),
            bytes = encoded.len(),
            "card rendered"
        );
        Ok(card)
    }

    /// The standalone QR raster for a credential at the configured size,
    /// unscaled. Useful to hosts that distribute the bare QR without a card.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::QrEncodingFailed`] if the payload cannot be
    /// encoded.
    pub fn qr_image(&self, credential: &Credential) -> Result<RgbaImage, RenderError> {
        let payload = credential.code.display_uri(&self.config.display_base_url);
        build_qr(&payload, self.config.qr_size)
    }

    /// Pure compositing stage: template bytes in, encoded card bytes out.
    fn compose(
        &self,
        template_bytes: &[u8],
        template: &CardTemplate,
        guest: &GuestProfile,
        credential: &Credential,
    ) -> Result<Vec<u8>, RenderError> {
        let source = image::load_from_memory(template_bytes)
            .map_err(|e| RenderError::TemplateUndecodable(e.to_string()))?;
        let (w0, h0) = source.dimensions();

        // Fit into the transport canvas without distortion; the uniform
        // scale drives every overlay size.
        let resized = source.resize(
            self.config.canvas_width,
            self.config.canvas_height,
            FilterType::Lanczos3,
        );
        let (wr, hr) = resized.dimensions();
        let scale = uniform_scale((w0, h0), (wr, hr));
        let mut canvas = resized.into_rgba8();

        let style = &template.style;
        let shadow = shadow_px(self.config.shadow_offset, scale);

        if style.show_guest_name {
            self.draw_label(
                &mut canvas,
                &guest.display_name,
                template.layout.name.resolve(wr, hr),
                style.name_size * scale,
                style.name_color,
                shadow,
            )?;
        }

        if style.show_tier_label && !guest.tier_label.is_empty() {
            self.draw_label(
                &mut canvas,
                &guest.tier_label,
                template.layout.tier_label.resolve(wr, hr),
                style.tier_size * scale,
                style.tier_color,
                shadow,
            )?;
        }

        // QR goes down last so overlapping anchors never occlude it.
        if style.show_qr {
            let side = scaled_side(self.config.qr_size, scale);
            let payload = credential.code.display_uri(&self.config.display_base_url);
            let qr = build_qr(&payload, side)?;
            let (ax, ay) = template.layout.qr.resolve(wr, hr);
            imageops::overlay(
                &mut canvas,
                &qr,
                ax - i64::from(side) / 2,
                ay - i64::from(side) / 2,
            );
        }

        self.encode(canvas)
    }

    /// Draw one text overlay centered on its anchor: shadow pass first for
    /// legibility against arbitrary backgrounds, then the colored fill.
    #[allow(clippy::cast_possible_truncation)]
    fn draw_label(
        &self,
        canvas: &mut RgbaImage,
        text: &str,
        (ax, ay): (i64, i64),
        size_px: f32,
        color: TextColor,
        shadow: i64,
    ) -> Result<(), RenderError> {
        let font = self.font.as_ref().ok_or(RenderError::FontUnavailable)?;
        let px = PxScale::from(size_px.max(1.0));
        let (tw, th) = text_size(px, font.face(), text);
        let x = ax - i64::from(tw) / 2;
        let y = ay - i64::from(th) / 2;

        draw_text_mut(
            canvas,
            Rgba([0, 0, 0, 255]),
            (x + shadow) as i32,
            (y + shadow) as i32,
            px,
            font.face(),
            text,
        );
        let [r, g, b] = color.channels();
        draw_text_mut(canvas, Rgba([r, g, b, 255]), x as i32, y as i32, px, font.face(), text);
        Ok(())
    }

    /// Encode the finished canvas to the configured output format.
    fn encode(&self, canvas: RgbaImage) -> Result<Vec<u8>, RenderError> {
        let mut out = Vec::new();
        match self.config.output {
            OutputFormat::Jpeg { quality } => {
                let rgb = DynamicImage::ImageRgba8(canvas).to_rgb8();
                JpegEncoder::new_with_quality(&mut out, quality)
                    .encode_image(&rgb)
                    .map_err(|e| RenderError::EncodeFailed(e.to_string()))?;
            }
            OutputFormat::Png => {
                DynamicImage::ImageRgba8(canvas)
                    .write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
                    .map_err(|e| RenderError::EncodeFailed(e.to_string()))?;
            }
        }
        Ok(out)
    }
}

/// Uniform scale between the native and resized dimensions: the smaller of
/// the two axis ratios, so nothing sized by it ever looks stretched.
#[allow(clippy::cast_precision_loss)]
fn uniform_scale((w0, h0): (u32, u32), (wr, hr): (u32, u32)) -> f32 {
    let (sx, sy) = (wr as f32 / w0 as f32, hr as f32 / h0 as f32);
    sx.min(sy)
}

/// A pre-scale pixel length after applying the uniform scale, never below 1.
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn scaled_side(base: u32, scale: f32) -> u32 {
    ((base as f32 * scale).round() as u32).max(1)
}

/// Shadow offset in pixels after scaling, at least 1.
#[allow(clippy::cast_possible_truncation)]
fn shadow_px(base: f32, scale: f32) -> i64 {
    ((base * scale).round() as i64).max(1)
}

/// Build the QR raster for `payload` at exactly `side`×`side` pixels.
///
/// Error correction starts at level M and falls back to L when the payload
/// does not fit; only then does encoding fail. Modules are drawn crisp and
/// resized nearest-neighbor so the symbol stays machine-readable.
fn build_qr(payload: &str, side: u32) -> Result<RgbaImage, RenderError> {
    let code = QrCode::with_error_correction_level(payload, EcLevel::M)
        .or_else(|_| QrCode::with_error_correction_level(payload, EcLevel::L))
        .map_err(|e| RenderError::QrEncodingFailed(e.to_string()))?;

    #[allow(clippy::cast_possible_truncation)]
    let modules = code.width() as u32;
    let total = modules + QR_QUIET_MODULES * 2;
    let mut symbol = RgbaImage::from_pixel(total, total, Rgba([255, 255, 255, 255]));
    for (i, color) in code.to_colors().iter().enumerate() {
        if *color == qrcode::Color::Dark {
            #[allow(clippy::cast_possible_truncation)]
            let i = i as u32;
            let x = i % modules + QR_QUIET_MODULES;
            let y = i / modules + QR_QUIET_MODULES;
            symbol.put_pixel(x, y, Rgba([0, 0, 0, 255]));
        }
    }
    Ok(imageops::resize(&symbol, side, side, FilterType::Nearest))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)] // Test code

    use super::*;

    #[test]
    fn uniform_scale_is_the_smaller_axis_ratio() {
        // 2400x1600 fitted into 1200x1200 resizes to 1200x800.
        let scale = uniform_scale((2400, 1600), (1200, 800));
        assert!((scale - 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn scaled_side_never_collapses_to_zero() {
        assert_eq!(scaled_side(300, 0.001), 1);
        assert_eq!(scaled_side(300, 0.5), 150);
        assert_eq!(shadow_px(2.0, 0.1), 1);
        assert_eq!(shadow_px(2.0, 1.5), 3);
    }

    #[test]
    fn qr_raster_is_exactly_the_requested_size() {
        let qr = build_qr("https://gatecard.example.com/rsvp/KRGC123456", 150).unwrap();
        assert_eq!(qr.dimensions(), (150, 150));
        // Quiet zone corner stays white; symbol contains dark modules.
        assert_eq!(qr.get_pixel(0, 0), &Rgba([255, 255, 255, 255]));
        assert!(qr.pixels().any(|p| *p == Rgba([0, 0, 0, 255])));
    }

    #[test]
    fn qr_rasters_are_deterministic() {
        let a = build_qr("https://gatecard.example.com/rsvp/KRGC000001", 300).unwrap();
        let b = build_qr("https://gatecard.example.com/rsvp/KRGC000001", 300).unwrap();
        assert_eq!(a.as_raw(), b.as_raw());
    }

    #[test]
    fn font_from_garbage_bytes_is_rejected() {
        let result = FontResource::from_bytes(vec![0u8; 64]);
        assert!(matches!(result, Err(RenderError::FontInvalid(_))));
    }
}
