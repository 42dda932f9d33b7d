//! Card compositor tests: deterministic output, QR payload round-trips,
//! template failure modes, and artifact hygiene.

#![allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect

use gatecard_core::store::CredentialStore;
use gatecard_core::types::{CardTemplate, Credential, GuestProfile};
use gatecard_core::{
    AdmissionController, Capacity, CardCompositor, Clock, CredentialCode, OutputFormat, OwnerRef,
    RenderConfig, RenderError,
};
use gatecard_testing::helpers::{qr_only_style, qr_only_template, write_template};
use gatecard_testing::mocks::{
    test_clock, FailingArtifactStore, InMemoryArtifactStore, InMemoryCredentialStore,
    InMemoryRedemptionStore, InMemoryRenderedCardStore, SteppingClock,
};
use std::path::PathBuf;
use std::sync::Arc;

fn credential() -> Credential {
    Credential::new(
        CredentialCode::new("KRGC123456".to_string()),
        OwnerRef::new(),
        Capacity::new(2),
        test_clock().now(),
    )
}

fn render_config() -> RenderConfig {
    RenderConfig::default()
}

struct Stack {
    compositor: CardCompositor,
    artifacts: Arc<InMemoryArtifactStore>,
    cards: Arc<InMemoryRenderedCardStore>,
}

fn stack_with_clock(clock: Arc<dyn Clock>) -> Stack {
    let artifacts = Arc::new(InMemoryArtifactStore::new());
    let cards = Arc::new(InMemoryRenderedCardStore::new());
    let compositor = CardCompositor::new(
        None,
        artifacts.clone(),
        cards.clone(),
        clock,
        render_config(),
    );
    Stack {
        compositor,
        artifacts,
        cards,
    }
}

fn stack() -> Stack {
    stack_with_clock(Arc::new(test_clock()))
}

#[tokio::test]
async fn render_is_deterministic_for_identical_inputs() {
    let dir = tempfile::tempdir().unwrap();
    let template_path = write_template(dir.path(), "design.png", 900, 600, [10, 200, 120]);
    let template = qr_only_template(template_path);
    let guest = GuestProfile::new("Asha Mwinyi", "VIP");
    let credential = credential();

    // Two independent stacks, same fixed clock: identical inputs end to end.
    let first = stack();
    let second = stack();
    let card_a = first
        .compositor
        .render(&credential, &template, &guest)
        .await
        .unwrap();
    let card_b = second
        .compositor
        .render(&credential, &template, &guest)
        .await
        .unwrap();

    let bytes_a = first.artifacts.bytes(&card_a.artifact_path).unwrap();
    let bytes_b = second.artifacts.bytes(&card_b.artifact_path).unwrap();
    assert_eq!(bytes_a, bytes_b);
    assert!(!bytes_a.is_empty());
}

#[tokio::test]
async fn repeated_renders_never_reuse_an_artifact_path() {
    let dir = tempfile::tempdir().unwrap();
    let template_path = write_template(dir.path(), "design.png", 900, 600, [10, 200, 120]);
    let template = qr_only_template(template_path);
    let guest = GuestProfile::new("Asha Mwinyi", "VIP");
    let credential = credential();

    let stack = stack_with_clock(Arc::new(SteppingClock::new(test_clock().now())));
    let card_a = stack
        .compositor
        .render(&credential, &template, &guest)
        .await
        .unwrap();
    let card_b = stack
        .compositor
        .render(&credential, &template, &guest)
        .await
        .unwrap();

    assert_ne!(card_a.artifact_path, card_b.artifact_path);
    // Both artifacts and both rows survive; superseding is the caller's move.
    assert_eq!(stack.artifacts.file_count(), 2);
    assert_eq!(stack.cards.all().len(), 2);
}

#[tokio::test]
async fn qr_payload_resolves_back_to_the_credential() {
    let credentials = Arc::new(InMemoryCredentialStore::new());
    let controller = AdmissionController::new(
        credentials.clone(),
        Arc::new(InMemoryRedemptionStore::new()),
        Arc::new(test_clock()),
    );

    let credential = credential();
    credentials.insert_unique(credential.clone()).await.unwrap();

    let payload = credential
        .code
        .display_uri(&render_config().display_base_url);
    let resolved = controller.resolve_display_lookup(&payload).await.unwrap();
    assert_eq!(resolved.code, credential.code);
}

#[tokio::test]
async fn rendered_card_contains_qr_modules_at_the_anchor() {
    let dir = tempfile::tempdir().unwrap();
    let template_path = write_template(dir.path(), "design.png", 800, 800, [10, 200, 120]);
    let template = qr_only_template(template_path);
    let guest = GuestProfile::new("Asha Mwinyi", "VIP");
    let credential = credential();

    let stack = stack();
    let card = stack
        .compositor
        .render(&credential, &template, &guest)
        .await
        .unwrap();

    let bytes = stack.artifacts.bytes(&card.artifact_path).unwrap();
    let rendered = image::load_from_memory(&bytes).unwrap().to_rgb8();
    let (w, h) = rendered.dimensions();
    // QR anchor sits at the canvas center; the module there is black or
    // white, never the template's solid fill.
    let center = rendered.get_pixel(w / 2, h / 2);
    let near = |a: u8, b: u8| a.abs_diff(b) < 40;
    let is_template_fill = near(center[0], 10) && near(center[1], 200) && near(center[2], 120);
    assert!(!is_template_fill, "QR overlay missing at anchor: {center:?}");
}

#[tokio::test]
async fn missing_template_is_a_distinct_failure() {
    let stack = stack();
    let template = qr_only_template(PathBuf::from("/nonexistent/design.png"));
    let result = stack
        .compositor
        .render(&credential(), &template, &GuestProfile::new("A", ""))
        .await;
    assert!(matches!(result, Err(RenderError::TemplateMissing(_))));
}

#[tokio::test]
async fn undecodable_template_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.png");
    std::fs::write(&path, b"not an image at all").unwrap();

    let stack = stack();
    let template = qr_only_template(path);
    let result = stack
        .compositor
        .render(&credential(), &template, &GuestProfile::new("A", ""))
        .await;
    assert!(matches!(result, Err(RenderError::TemplateUndecodable(_))));
}

#[tokio::test]
async fn failed_artifact_write_records_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let template_path = write_template(dir.path(), "design.png", 400, 400, [10, 200, 120]);
    let template = qr_only_template(template_path);

    let cards = Arc::new(InMemoryRenderedCardStore::new());
    let compositor = CardCompositor::new(
        None,
        Arc::new(FailingArtifactStore),
        cards.clone(),
        Arc::new(test_clock()),
        render_config(),
    );

    let result = compositor
        .render(&credential(), &template, &GuestProfile::new("A", ""))
        .await;
    assert!(matches!(result, Err(RenderError::StorageWriteFailed(_))));
    assert!(cards.all().is_empty());
}

#[tokio::test]
async fn text_overlay_without_a_font_fails_cleanly() {
    let dir = tempfile::tempdir().unwrap();
    let template_path = write_template(dir.path(), "design.png", 400, 400, [10, 200, 120]);
    let mut style = qr_only_style();
    style.show_guest_name = true;
    let template = CardTemplate::new(
        template_path,
        gatecard_testing::helpers::centered_layout(),
        style,
    );

    let stack = stack();
    let result = stack
        .compositor
        .render(&credential(), &template, &GuestProfile::new("Asha", ""))
        .await;
    assert!(matches!(result, Err(RenderError::FontUnavailable)));
    assert_eq!(stack.artifacts.file_count(), 0);
}

#[tokio::test]
async fn png_output_is_selectable() {
    let dir = tempfile::tempdir().unwrap();
    let template_path = write_template(dir.path(), "design.png", 400, 400, [10, 200, 120]);
    let template = qr_only_template(template_path);

    let artifacts = Arc::new(InMemoryArtifactStore::new());
    let compositor = CardCompositor::new(
        None,
        artifacts.clone(),
        Arc::new(InMemoryRenderedCardStore::new()),
        Arc::new(test_clock()),
        RenderConfig {
            output: OutputFormat::Png,
            ..RenderConfig::default()
        },
    );

    let card = compositor
        .render(&credential(), &template, &GuestProfile::new("A", ""))
        .await
        .unwrap();
    assert_eq!(card.artifact_path.extension().unwrap(), "png");
    let bytes = artifacts.bytes(&card.artifact_path).unwrap();
    assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");
}

#[tokio::test]
async fn standalone_qr_raster_matches_configured_size() {
    let stack = stack();
    let qr = stack.compositor.qr_image(&credential()).unwrap();
    assert_eq!(qr.dimensions(), (render_config().qr_size, render_config().qr_size));
}
