//! HTTP API integration tests
//!
//! Full route table (auth, links, analyses, tracking redirect, health) against a
//! temporary SQLite database and an in-memory geolocation table.

#![cfg(feature = "server")]

use std::collections::HashMap;
use std::sync::{Arc, Once};

use actix_web::http::StatusCode;
use actix_web::http::header::{AUTHORIZATION, CONTENT_TYPE, LOCATION};
use actix_web::test::{self, TestRequest};
use actix_web::{App, web};
use async_trait::async_trait;
use serde_json::{Value, json};
use tempfile::TempDir;

use geotrace::api::middleware::RequestIdMiddleware;
use geotrace::api::services::{AppStartTime, configure_routes};
use geotrace::config::{DatabaseConfig, StaticConfig, init_config};
use geotrace::errors::Result;
use geotrace::runtime::StartupContext;
use geotrace::services::geoip::GeoStatus;
use geotrace::services::{GeoIpLookup, GeoIpProvider, GeoRecord, MemoryAlertSink};
use geotrace::storage::SeaOrmStorage;

// =============================================================================
// Test Setup
// =============================================================================

static INIT: Once = Once::new();

fn init_test_config() {
    INIT.call_once(|| {
        init_config();
    });
}

const ALICE: &str = "Bearer alice-token";
const BOB: &str = "Bearer bob-token";

struct CityLookup;

#[async_trait]
impl GeoIpLookup for CityLookup {
    async fn lookup_batch(&self, ips: &[String]) -> Result<Vec<GeoRecord>> {
        Ok(ips
            .iter()
            .map(|ip| match ip.as_str() {
                "81.2.69.160" => GeoRecord {
                    query: ip.clone(),
                    status: GeoStatus::Success,
                    country_code: Some("GB".into()),
                    city: Some("London".into()),
                    lat: Some(51.5),
                    lon: Some(-0.12),
                    ..Default::default()
                },
                "24.48.0.1" => GeoRecord {
                    query: ip.clone(),
                    status: GeoStatus::Success,
                    country_code: Some("US".into()),
                    city: Some("New York".into()),
                    lat: Some(40.71),
                    lon: Some(-74.0),
                    ..Default::default()
                },
                _ => GeoRecord::failed(ip.clone(), "reserved range"),
            })
            .collect())
    }

    fn name(&self) -> &'static str {
        "city-table"
    }
}

async fn setup_context() -> (TempDir, StartupContext) {
    init_test_config();

    let dir = TempDir::new().expect("Failed to create temp dir");
    let db_path = dir.path().join("api_test.db");
    let db_config = DatabaseConfig {
        database_url: format!("sqlite://{}?mode=rwc", db_path.display()),
        ..Default::default()
    };
    let storage = Arc::new(
        SeaOrmStorage::new(&db_config)
            .await
            .expect("Failed to create storage"),
    );

    let ctx = StartupContext::assemble(
        &StaticConfig::default(),
        storage,
        GeoIpProvider::from_lookup(Arc::new(CityLookup)),
        Arc::new(MemoryAlertSink::new()),
    );
    (dir, ctx)
}

fn tokens() -> HashMap<String, String> {
    HashMap::from([
        ("alice-token".to_string(), "alice".to_string()),
        ("bob-token".to_string(), "bob".to_string()),
    ])
}

macro_rules! build_app {
    ($ctx:expr, $tokens:expr) => {{
        let ctx = &$ctx;
        let tokens = $tokens;
        test::init_service(
            App::new()
                .wrap(RequestIdMiddleware)
                .app_data(web::Data::new(ctx.storage.clone()))
                .app_data(web::Data::new(ctx.geoip.clone()))
                .app_data(web::Data::new(ctx.tracking_service.clone()))
                .app_data(web::Data::new(ctx.analysis_service.clone()))
                .app_data(web::Data::new(AppStartTime {
                    start_datetime: chrono::Utc::now(),
                }))
                .configure(move |cfg| configure_routes(cfg, tokens)),
        )
        .await
    }};
}

// =============================================================================
// Auth
// =============================================================================

#[actix_rt::test]
async fn test_missing_or_unknown_token_is_unauthorized() {
    let (_dir, ctx) = setup_context().await;
    let app = build_app!(ctx, tokens());

    let req = TestRequest::get().uri("/api/v1/links").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["code"], 1001);

    let req = TestRequest::get()
        .uri("/api/v1/links")
        .insert_header((AUTHORIZATION, "Bearer nope"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_rt::test]
async fn test_api_disabled_without_tokens() {
    let (_dir, ctx) = setup_context().await;
    let app = build_app!(ctx, HashMap::new());

    let req = TestRequest::get()
        .uri("/api/v1/links")
        .insert_header((AUTHORIZATION, ALICE))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    // 健康检查不受影响
    let req = TestRequest::get().uri("/health/live").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
}

// =============================================================================
// Links & tracking redirect
// =============================================================================

#[actix_rt::test]
async fn test_link_lifecycle_with_tracking_redirect() {
    let (_dir, ctx) = setup_context().await;
    let app = build_app!(ctx, tokens());

    let req = TestRequest::post()
        .uri("/api/v1/links")
        .insert_header((AUTHORIZATION, ALICE))
        .set_json(json!({ "target_url": "https://example.com/promo", "code": "spring" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["code"], 0);
    assert_eq!(body["data"]["code"], "spring");
    assert!(body["data"].get("owner").is_none());

    // 第一次访问：新会话
    let req = TestRequest::get()
        .uri("/t/spring")
        .insert_header(("X-Forwarded-For", "81.2.69.160"))
        .insert_header(("User-Agent", "integration-test"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(
        resp.headers().get(LOCATION).unwrap(),
        "https://example.com/promo"
    );
    let cookie = resp
        .response()
        .cookies()
        .find(|c| c.name() == "gt_sid")
        .expect("session cookie")
        .into_owned();
    assert!(cookie.http_only().unwrap_or(false));

    // 带 cookie 的第二次访问：同一会话，10 分钟内跨大西洋
    let req = TestRequest::get()
        .uri("/t/spring")
        .insert_header(("X-Forwarded-For", "24.48.0.1"))
        .cookie(cookie.clone())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::TEMPORARY_REDIRECT);
    let second = resp
        .response()
        .cookies()
        .find(|c| c.name() == "gt_sid")
        .expect("session cookie")
        .into_owned();
    assert_eq!(second.value(), cookie.value());

    let req = TestRequest::get()
        .uri("/api/v1/links/spring/visits")
        .insert_header((AUTHORIZATION, ALICE))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let visits = body["data"].as_array().unwrap();
    assert_eq!(visits.len(), 2);
    assert_eq!(visits[0]["city"], "New York");
    assert_eq!(visits[1]["user_agent"], "integration-test");
    assert_eq!(visits[0]["session_id"], cookie.value());

    let req = TestRequest::get()
        .uri("/api/v1/links/spring/anomalies")
        .insert_header((AUTHORIZATION, ALICE))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let anomalies = body["data"].as_array().unwrap();
    assert_eq!(anomalies.len(), 1);
    assert_eq!(anomalies[0]["anomaly_type"], "rapid_geo_change");

    let req = TestRequest::get()
        .uri("/api/v1/links/spring")
        .insert_header((AUTHORIZATION, ALICE))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["visit_count"], 2);

    // bob 看不到 alice 的链接
    let req = TestRequest::get()
        .uri("/api/v1/links/spring")
        .insert_header((AUTHORIZATION, BOB))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let req = TestRequest::delete()
        .uri("/api/v1/links/spring")
        .insert_header((AUTHORIZATION, ALICE))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["deleted"], "spring");

    let req = TestRequest::get().uri("/t/spring").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_rt::test]
async fn test_create_link_errors() {
    let (_dir, ctx) = setup_context().await;
    let app = build_app!(ctx, tokens());

    let req = TestRequest::post()
        .uri("/api/v1/links")
        .insert_header((AUTHORIZATION, ALICE))
        .set_json(json!({ "target_url": "ftp://example.com" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["code"], 1000);

    let req = TestRequest::post()
        .uri("/api/v1/links")
        .insert_header((AUTHORIZATION, ALICE))
        .insert_header((CONTENT_TYPE, "application/json"))
        .set_payload("{not json")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["code"], 1000);

    let create_dup = || {
        TestRequest::post()
            .uri("/api/v1/links")
            .insert_header((AUTHORIZATION, ALICE))
            .set_json(json!({ "targetUrl": "https://example.com", "code": "dup" }))
            .to_request()
    };
    let resp = test::call_service(&app, create_dup()).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = test::call_service(&app, create_dup()).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["code"], 3001);
}

#[actix_rt::test]
async fn test_unknown_tracking_code_is_not_found() {
    let (_dir, ctx) = setup_context().await;
    let app = build_app!(ctx, tokens());

    let req = TestRequest::get().uri("/t/missing").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert!(resp.response().cookies().next().is_none());
}

// =============================================================================
// Analyses
// =============================================================================

#[actix_rt::test]
async fn test_analysis_endpoints() {
    let (_dir, ctx) = setup_context().await;
    let app = build_app!(ctx, tokens());

    let req = TestRequest::post()
        .uri("/api/v1/analyses")
        .insert_header((AUTHORIZATION, ALICE))
        .set_json(json!({ "ips": ["81.2.69.160", "10.1.2.3", "81.2.69.160"], "label": "office" }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["code"], 0);
    let id = body["data"]["id"].as_str().unwrap().to_string();
    assert_eq!(body["data"]["total_ips"], 2);
    assert_eq!(body["data"]["label"], "office");
    assert_eq!(body["data"]["results"][0]["city"], "London");
    assert_eq!(body["data"]["results"][1]["status"], "private");

    let req = TestRequest::get()
        .uri("/api/v1/analyses")
        .insert_header((AUTHORIZATION, ALICE))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let req = TestRequest::get()
        .uri(&format!("/api/v1/analyses/{}", id))
        .insert_header((AUTHORIZATION, ALICE))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["results"].as_array().unwrap().len(), 2);

    let req = TestRequest::get()
        .uri(&format!("/api/v1/analyses/{}", id))
        .insert_header((AUTHORIZATION, BOB))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let req = TestRequest::post()
        .uri("/api/v1/analyses")
        .insert_header((AUTHORIZATION, ALICE))
        .set_json(json!({ "ips": ["not-an-ip"] }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

// =============================================================================
// Health & request id
// =============================================================================

#[actix_rt::test]
async fn test_health_endpoints() {
    let (_dir, ctx) = setup_context().await;
    let app = build_app!(ctx, tokens());

    let req = TestRequest::get().uri("/health").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["data"]["status"], "healthy");
    assert_eq!(body["data"]["checks"]["storage"]["backend"], "sqlite");
    assert_eq!(body["data"]["checks"]["geoip_provider"], "city-table");

    let req = TestRequest::get().uri("/health/ready").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let req = TestRequest::get().uri("/health/live").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
}

#[actix_rt::test]
async fn test_request_id_header() {
    let (_dir, ctx) = setup_context().await;
    let app = build_app!(ctx, tokens());

    let req = TestRequest::get().uri("/health/live").to_request();
    let resp = test::call_service(&app, req).await;
    let generated = resp
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .unwrap()
        .to_string();
    assert_eq!(generated.len(), 36);

    let req = TestRequest::get()
        .uri("/health/live")
        .insert_header(("X-Request-ID", "edge-abc-123"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.headers().get("x-request-id").unwrap(), "edge-abc-123");
}
