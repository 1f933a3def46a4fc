//! Router tests over in-memory collaborators.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum_test::TestServer;
use flash_sale_core::{CommitError, LocalAdmissionCache, ProductId};
use flash_sale_runtime::SpikeOrchestrator;
use flash_sale_testing::{InMemoryCoordinationCluster, InMemoryStockCounter, ScriptedSaleCommitter};
use flash_sale_web::{AppState, REQUEST_ID_HEADER, build_router};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::sync::Arc;

const PRODUCT: ProductId = ProductId::new(42);

fn state(stock: i64, committer: &ScriptedSaleCommitter) -> AppState {
    let cluster = InMemoryCoordinationCluster::new();
    AppState::new(SpikeOrchestrator::new(
        Arc::new(LocalAdmissionCache::new()),
        Arc::new(InMemoryStockCounter::with_stock([(PRODUCT, stock)])),
        Arc::new(cluster.session()),
        Arc::new(committer.clone()),
    ))
}

fn server(state: AppState) -> TestServer {
    TestServer::new(build_router(state)).expect("Failed to build test server")
}

#[tokio::test]
async fn spike_reports_success_then_fail_once_sold_out() {
    let committer = ScriptedSaleCommitter::new();
    let server = server(state(1, &committer));

    let first = server.post("/spike/42").await;
    first.assert_status_ok();
    first.assert_text("success");

    let second = server.post("/spike/42").await;
    second.assert_status_ok();
    second.assert_text("fail");

    assert_eq!(committer.committed(PRODUCT), 1);
}

#[tokio::test]
async fn failed_commit_is_a_200_fail() {
    let committer = ScriptedSaleCommitter::always_fail(CommitError::Database("down".to_string()));
    let server = server(state(3, &committer));

    let response = server.post("/spike/42").await;
    response.assert_status_ok();
    response.assert_text("fail");
}

#[tokio::test]
async fn unparsable_product_id_is_a_bad_request() {
    let committer = ScriptedSaleCommitter::new();
    let server = server(state(1, &committer));

    let response = server.post("/spike/not-a-number").await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(committer.attempts(), 0);
}

#[tokio::test]
async fn health_is_ok() {
    let server = server(state(0, &ScriptedSaleCommitter::new()));

    let response = server.get("/health").await;
    response.assert_status_ok();
    response.assert_text("ok");
}

#[tokio::test]
async fn metrics_unavailable_without_recorder() {
    let server = server(state(0, &ScriptedSaleCommitter::new()));

    server
        .get("/metrics")
        .await
        .assert_status(StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn metrics_rendered_with_recorder() {
    let handle = PrometheusBuilder::new().build_recorder().handle();
    let server = server(state(0, &ScriptedSaleCommitter::new()).with_metrics(handle));

    server.get("/metrics").await.assert_status_ok();
}

#[tokio::test]
async fn request_id_is_generated_or_echoed() {
    let server = server(state(0, &ScriptedSaleCommitter::new()));

    let generated = server.get("/health").await.header(REQUEST_ID_HEADER);
    assert!(!generated.is_empty());

    let sent = "6f1c1b0e-8a52-4d3f-9a4e-0c9a1f6b2d7e";
    let echoed = server
        .get("/health")
        .add_header(
            HeaderName::from_static(REQUEST_ID_HEADER),
            HeaderValue::from_static(sent),
        )
        .await
        .header(REQUEST_ID_HEADER);
    assert_eq!(echoed, sent);

    let replaced = server
        .get("/health")
        .add_header(
            HeaderName::from_static(REQUEST_ID_HEADER),
            HeaderValue::from_static("not-a-uuid"),
        )
        .await
        .header(REQUEST_ID_HEADER);
    assert_ne!(replaced, "not-a-uuid");
}
