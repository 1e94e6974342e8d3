//! Integration tests for pairing, session and service flows over the
//! in-memory harness.

use std::sync::Arc;

use rsc_core::bridge::StaticBridge;
use rsc_core::channel::{ChannelOptions, Method, RequestChannel};
use rsc_core::context::AppContext;
use rsc_core::files::LibraryView;
use rsc_core::harness::{MockBridge, MockMediaServer, TEST_TOKEN, TEST_URL};
use rsc_core::pairing::{PairingMode, PairingResolver};
use rsc_core::types::{MediaCategory, SettingsPatch};
use rsc_core::{CoreError, SessionError, SessionStore};

fn payload() -> String {
    format!("{TEST_URL}?token={TEST_TOKEN}")
}

fn context(server: MockMediaServer, bridge: MockBridge) -> (AppContext, Arc<MockMediaServer>) {
    let server = Arc::new(server);
    let ctx = AppContext::new(
        Arc::new(SessionStore::new()),
        server.clone(),
        Arc::new(bridge),
        PairingMode::Bridge,
        ChannelOptions::default(),
    );
    (ctx, server)
}

#[tokio::test]
async fn test_pair_update_and_confirm() {
    let (ctx, server) = context(
        MockMediaServer::new(TEST_TOKEN),
        MockBridge::new().with_address(payload()),
    );
    ctx.resolver.resolve_into(&ctx.store).await.unwrap();
    let lease = ctx.store.capture().unwrap();

    let before = ctx.settings.get(&lease).await.unwrap();
    let patch = SettingsPatch::allow_list(vec!["audio".into()]);
    ctx.settings.update(&lease, &patch, true).await.unwrap();
    let after = ctx.settings.get(&lease).await.unwrap();

    assert_eq!(after.allow_list, vec!["audio"]);
    assert_eq!(after.image_paths, before.image_paths);
    assert_eq!(after.audio_ext, before.audio_ext);
    assert_eq!(after.server, before.server);
    assert_eq!(server.settings(), after);
}

#[tokio::test]
async fn test_sealed_responses_are_opened() {
    let (ctx, _) = context(
        MockMediaServer::new(TEST_TOKEN).with_sealed_responses(),
        MockBridge::new().with_address(payload()),
    );
    ctx.resolver.resolve_into(&ctx.store).await.unwrap();
    let lease = ctx.store.capture().unwrap();

    let settings = ctx.settings.get(&lease).await.unwrap();
    assert_eq!(settings, MockMediaServer::default_settings());

    let fetch = ctx.files.list(MediaCategory::Audio, &lease).await;
    assert_eq!(fetch.result.unwrap(), MockMediaServer::sample_listing(MediaCategory::Audio));
}

#[tokio::test]
async fn test_partial_failure_is_isolated() {
    let (ctx, _) = context(
        MockMediaServer::new(TEST_TOKEN).fail_category(MediaCategory::Audio, 500),
        MockBridge::new().with_address(payload()),
    );
    ctx.resolver.resolve_into(&ctx.store).await.unwrap();
    let lease = ctx.store.capture().unwrap();

    let cats = [MediaCategory::Audio, MediaCategory::Image];
    let mut view = LibraryView::new();
    view.begin(&cats);
    for fetch in ctx.files.fetch_all(&cats, &lease).await {
        view.apply(fetch, &ctx.store);
    }

    assert!(view.is_audio_error().is_some());
    assert!(view.is_image_error().is_none());
    assert_eq!(view.images().map(<[_]>::len), Some(1));
}

#[tokio::test]
async fn test_reset_blocks_every_call() {
    let (ctx, server) = context(
        MockMediaServer::new(TEST_TOKEN),
        MockBridge::new().with_address(payload()),
    );
    ctx.resolver.resolve_into(&ctx.store).await.unwrap();
    let _: serde_json::Value = ctx
        .channel
        .call::<(), _>("api/settings", Method::Get, None)
        .await
        .unwrap();

    ctx.store.set(None);

    let err = ctx
        .channel
        .call::<(), serde_json::Value>("api/settings", Method::Get, None)
        .await
        .unwrap_err();
    assert_eq!(err, CoreError::Session(SessionError::NoActiveSession));
    assert_eq!(server.requests().len(), 1);
}

#[tokio::test]
async fn test_override_unlocks_gate_without_touching_session() {
    let (ctx, _) = context(
        MockMediaServer::new(TEST_TOKEN),
        MockBridge::new().with_address(payload()),
    );
    ctx.resolver.resolve_into(&ctx.store).await.unwrap();
    let session = ctx.store.get();

    assert!(!ctx.liveness.gate_open(&ctx.store).await);
    ctx.store.toggle_override();
    assert!(ctx.liveness.gate_open(&ctx.store).await);
    assert_eq!(ctx.store.get(), session);

    assert_eq!(ctx.liveness.toggle().await, Some(true));
    assert_eq!(ctx.liveness.status().await, Some(true));
}

#[tokio::test]
async fn test_inflight_result_discarded_after_repair() {
    let (ctx, _) = context(
        MockMediaServer::new(TEST_TOKEN),
        MockBridge::new().with_address(payload()),
    );
    ctx.resolver.resolve_into(&ctx.store).await.unwrap();
    let old = ctx.store.capture().unwrap();

    // Re-pair against a different token while the old lease is still out.
    let fixed = PairingResolver::new(
        Arc::new(StaticBridge::default()),
        PairingMode::Fixed {
            url: TEST_URL.to_string(),
            token: "rotated-token".to_string(),
        },
    );
    fixed.resolve_into(&ctx.store).await.unwrap();

    // The old lease still carries the old credentials.
    let fetch = ctx.files.list(MediaCategory::Video, &old).await;
    assert!(fetch.result.is_ok());

    let mut view = LibraryView::new();
    assert!(!view.apply(fetch, &ctx.store));
    assert!(view.videos().is_none());

    // Requests under the new session use the new token and are rejected.
    let err = ctx.settings.get(&ctx.store.capture().unwrap()).await.unwrap_err();
    assert!(err.is_auth_failure());
}

#[tokio::test]
async fn test_plaintext_channel_option() {
    let server = Arc::new(MockMediaServer::new(TEST_TOKEN));
    let store = Arc::new(SessionStore::new());
    PairingResolver::new(
        Arc::new(StaticBridge::with_payload(payload())),
        PairingMode::Bridge,
    )
    .resolve_into(&store)
    .await
    .unwrap();

    let channel = RequestChannel::with_options(
        store,
        server.clone(),
        ChannelOptions {
            encrypt_requests: false,
        },
    );
    let body = serde_json::json!({ "settings": { "videoExt": ["webm"] } });
    let _: serde_json::Value = channel
        .call("api/settings", Method::Post, Some(&body))
        .await
        .unwrap();
    assert_eq!(server.settings().video_ext, vec!["webm"]);
}
