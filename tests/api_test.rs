use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use serde_json::Value;
use tower::ServiceExt;

use plugin_gateway::api::{self, AppState};
use plugin_gateway::config::Config;
use plugin_gateway::links::LinkStore;
use plugin_gateway::providers::curseforge::CurseForgeProvider;
use plugin_gateway::providers::hangar::HangarProvider;
use plugin_gateway::providers::modrinth::{LoaderTagCache, ModrinthProvider};
use plugin_gateway::providers::spigotmc::SpigotMcProvider;
use plugin_gateway::providers::{http, ProviderRegistry};

/// Nothing listens here; every upstream call fails with a refused
/// connection, the kind of failure the fail-soft search contract has to
/// absorb.
const DEAD_UPSTREAM: &str = "http://127.0.0.1:1";

fn test_state() -> Arc<AppState> {
    let config = Config {
        public_url: "https://panel.example.com".to_string(),
        panel_url: "https://panel.example.com".to_string(),
        curseforge_api_key: Some("test-key".to_string()),
        daemon_url: None,
        daemon_token: None,
        server_uuid: None,
    };

    let client = http::build_client(&config.user_agent());
    let probe = http::build_probe_client(&config.user_agent());
    let registry = ProviderRegistry::from_parts(
        CurseForgeProvider::new(client.clone(), config.curseforge_api_key.clone())
            .with_base_url(DEAD_UPSTREAM),
        HangarProvider::new(client.clone()).with_base_url(DEAD_UPSTREAM),
        ModrinthProvider::new(client.clone(), LoaderTagCache::new()).with_base_url(DEAD_UPSTREAM),
        SpigotMcProvider::new(client.clone(), probe).with_base_url(DEAD_UPSTREAM),
        client,
        Some(DEAD_UPSTREAM.to_string()),
    );

    Arc::new(AppState {
        config,
        registry,
        links: LinkStore::open_in_memory().expect("in-memory store"),
        daemon: None,
    })
}

async fn send(state: &Arc<AppState>, request: Request<Body>) -> (StatusCode, Value) {
    let response = api::router(state.clone())
        .oneshot(request)
        .await
        .expect("router never fails");

    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("readable body");
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

async fn get(state: &Arc<AppState>, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .uri(uri)
        .header("x-user-id", "7")
        .body(Body::empty())
        .unwrap();
    send(state, request).await
}

async fn post(state: &Arc<AppState>, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("x-user-id", "7")
        .body(Body::empty())
        .unwrap();
    send(state, request).await
}

#[tokio::test]
async fn search_fails_soft_when_upstream_is_down() {
    let state = test_state();

    for provider in ["curseforge", "hangar", "modrinth", "polymart", "spigotmc"] {
        let (status, body) = get(
            &state,
            &format!("/plugins?provider={provider}&page=1&page_size=10&search_query=worldedit"),
        )
        .await;

        assert_eq!(status, StatusCode::OK, "provider {provider}");
        assert_eq!(body["object"], "list");
        assert_eq!(body["data"], serde_json::json!([]));

        let pagination = &body["meta"]["pagination"];
        assert_eq!(pagination["total"], 0, "provider {provider}");
        assert_eq!(pagination["count"], 0);
        assert_eq!(pagination["per_page"], 10);
        assert_eq!(pagination["current_page"], 1);
        assert_eq!(pagination["total_pages"], 0);
    }
}

#[tokio::test]
async fn search_rejects_invalid_paging() {
    let state = test_state();

    let (status, _) = get(&state, "/plugins?provider=modrinth&page=0&page_size=10").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = get(&state, "/plugins?provider=modrinth&page=1&page_size=0").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = get(&state, "/plugins?provider=modrinth&page=1&page_size=51").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn search_rejects_unknown_providers() {
    let state = test_state();
    let (status, _) = get(&state, "/plugins?provider=bukkit&page=1&page_size=10").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn hangar_page_size_is_clamped_to_upstream_cap() {
    let state = test_state();
    let (status, body) = get(&state, "/plugins?provider=hangar&page=1&page_size=50").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["meta"]["pagination"]["per_page"], 25);
}

#[tokio::test]
async fn curseforge_version_listing_fails_soft_to_an_empty_array() {
    let state = test_state();
    let (status, body) = get(
        &state,
        "/plugins/versions?provider=curseforge&plugin_id=31043",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, serde_json::json!([]));
}

#[tokio::test]
async fn spigotmc_version_listing_fails_hard() {
    let state = test_state();
    let (status, _) = get(&state, "/plugins/versions?provider=spigotmc&plugin_id=9089").await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn install_surfaces_download_resolution_failures() {
    let state = test_state();
    let request = Request::builder()
        .method("POST")
        .uri("/plugins/install")
        .header("x-user-id", "7")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            r#"{"provider": "spigotmc", "plugin_id": "9089", "version_id": "1"}"#,
        ))
        .unwrap();

    let (status, _) = send(&state, request).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn polymart_link_lifecycle() {
    let state = test_state();

    // Nothing linked yet.
    let (status, body) = get(&state, "/plugins/polymart/is-linked").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::Bool(false));

    // A pending handshake alone is not a link.
    state.links.insert_pending(7, "state-abc").unwrap();
    let (_, body) = get(&state, "/plugins/polymart/is-linked").await;
    assert_eq!(body, Value::Bool(false));

    // The provider calls back with a matching state: linked.
    let request = Request::builder()
        .uri("/plugins/polymart/callback?success=1&token=tok-1&state=state-abc")
        .body(Body::empty())
        .unwrap();
    let response = api::router(state.clone()).oneshot(request).await.unwrap();
    assert!(response.status().is_redirection());
    assert_eq!(
        response.headers()[header::LOCATION],
        "https://panel.example.com/plugins?provider=polymart"
    );

    let (_, body) = get(&state, "/plugins/polymart/is-linked").await;
    assert_eq!(body, Value::Bool(true));

    // Disconnect succeeds even though upstream invalidation cannot be
    // reached, and the link is gone afterwards.
    let (status, _) = post(&state, "/plugins/polymart/disconnect").await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, body) = get(&state, "/plugins/polymart/is-linked").await;
    assert_eq!(body, Value::Bool(false));
}

#[tokio::test]
async fn callback_with_unknown_state_is_not_found() {
    let state = test_state();
    let request = Request::builder()
        .uri("/plugins/polymart/callback?success=1&token=tok&state=forged")
        .body(Body::empty())
        .unwrap();

    let (status, _) = send(&state, request).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn refused_callback_drops_the_pending_row() {
    let state = test_state();
    state.links.insert_pending(7, "state-refused").unwrap();

    let request = Request::builder()
        .uri("/plugins/polymart/callback?success=0&token=ignored&state=state-refused")
        .body(Body::empty())
        .unwrap();
    let response = api::router(state.clone()).oneshot(request).await.unwrap();
    assert!(response.status().is_redirection());

    assert!(state.links.find_by_state("state-refused").unwrap().is_none());
    let (_, body) = get(&state, "/plugins/polymart/is-linked").await;
    assert_eq!(body, Value::Bool(false));
}

#[tokio::test]
async fn link_initiation_records_a_pending_row_before_upstream_fails() {
    let state = test_state();

    let (status, _) = post(&state, "/plugins/polymart/link").await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);

    let links = state.links.links_for_user(7).unwrap();
    assert_eq!(links.len(), 1);
    assert!(links[0].token.is_none());
    assert_eq!(links[0].random_state.len(), 100);
}

#[tokio::test]
async fn polymart_endpoints_require_the_user_header() {
    let state = test_state();

    let request = Request::builder()
        .uri("/plugins/polymart/is-linked")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&state, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let request = Request::builder()
        .method("POST")
        .uri("/plugins/polymart/disconnect")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&state, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
