mod common;

use actix_web::{http::StatusCode, test};
use base64::{Engine, engine::general_purpose::STANDARD};
use cerberus_relay::create_app;
use common::{RecordingSink, harness};
use serde_json::json;

fn response_time_metric(ip: &str) -> serde_json::Value {
    json!({
        "service": "core_api.response_time",
        "description": "POST /api/access/login",
        "metric": 87,
        "state": "ok",
        "host": "api-1",
        "attributes": {
            "ip": ip,
            "url": "/api/access/login",
            "status_code": "401"
        }
    })
}

fn plain_metric() -> serde_json::Value {
    json!({
        "service": "worker.queue_depth",
        "description": "jobs waiting",
        "metric": 3,
        "state": "warning",
        "host": "worker-2",
        "tags": ["prod"],
        "ttl": 120
    })
}

fn basic(user: &str, password: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{}:{}", user, password)))
}

/// The health route reports the engine as running once wired
#[actix_web::test]
async fn test_health_endpoint_integration() {
    let h = harness(RecordingSink::default(), None);
    let app = test::init_service(create_app(h.state)).await;

    let req = test::TestRequest::get().uri("/api/health").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body, json!({"status": "healthy", "cerberus": "running"}));
}

#[actix_web::test]
async fn test_version_endpoint_integration() {
    let h = harness(RecordingSink::default(), None);
    let app = test::init_service(create_app(h.state)).await;

    let req = test::TestRequest::get().uri("/api/version").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    assert!(body["commit"].is_string());
    assert!(body["build_time"].is_string());
}

/// A plain metric is forwarded untouched and echoed with 201
#[actix_web::test]
async fn test_metric_forwarded() {
    let h = harness(RecordingSink::default(), None);
    let app = test::init_service(create_app(h.state)).await;

    let req = test::TestRequest::post()
        .uri("/metric")
        .set_json(plain_metric())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["service"], "worker.queue_depth");
    assert_eq!(body["state"], "warning");

    let events = h.sink.events.lock();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].host, "worker-2");
    assert_eq!(events[0].ttl, Some(std::time::Duration::from_secs(120)));
    // Only response-time metrics hit DNS
    assert_eq!(h.dns.calls(), 0);
}

/// Response-time metrics come back and go out enriched with the ASN
#[actix_web::test]
async fn test_response_time_metric_enriched() {
    let h = harness(RecordingSink::default(), None);
    let app = test::init_service(create_app(h.state.clone())).await;

    let req = test::TestRequest::post()
        .uri("/metric")
        .set_json(response_time_metric("8.8.8.8"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["attributes"]["asn"], "15169");

    let events = h.sink.events.lock();
    assert_eq!(events[0].attributes["asn"], "15169");
    assert_eq!(h.dns.queries.lock()[0], "8.8.8.8.origin.asn.cymru.com");
}

/// A response-time metric without caller details is still forwarded
#[actix_web::test]
async fn test_response_time_metric_without_ip_forwarded() {
    let h = harness(RecordingSink::default(), None);
    let app = test::init_service(create_app(h.state)).await;

    let mut metric = response_time_metric("8.8.8.8");
    metric["attributes"] = json!({"url": "/api/v2/payments"});

    let req = test::TestRequest::post()
        .uri("/metric")
        .set_json(metric)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    assert_eq!(h.sink.events.lock().len(), 1);
}

#[actix_web::test]
async fn test_metric_missing_host_rejected() {
    let h = harness(RecordingSink::default(), None);
    let app = test::init_service(create_app(h.state)).await;

    let mut metric = plain_metric();
    metric["host"] = json!("");

    let req = test::TestRequest::post()
        .uri("/metric")
        .set_json(metric)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert!(h.sink.events.lock().is_empty());
}

#[actix_web::test]
async fn test_metric_unknown_state_rejected() {
    let h = harness(RecordingSink::default(), None);
    let app = test::init_service(create_app(h.state)).await;

    let mut metric = plain_metric();
    metric["state"] = json!("on-fire");

    let req = test::TestRequest::post()
        .uri("/metric")
        .set_json(metric)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

/// An unreachable event store surfaces as a server error
#[actix_web::test]
async fn test_sink_failure_returns_500() {
    let h = harness(RecordingSink::failing(), None);
    let app = test::init_service(create_app(h.state)).await;

    let req = test::TestRequest::post()
        .uri("/metric")
        .set_json(plain_metric())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[actix_web::test]
async fn test_relayed_metrics_counted_by_service_and_outcome() {
    let h = harness(RecordingSink::default(), None);
    let metrics = h.state.metrics.clone();
    let app = test::init_service(create_app(h.state)).await;

    let req = test::TestRequest::post()
        .uri("/metric")
        .set_json(plain_metric())
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CREATED);

    let mut no_host = plain_metric();
    no_host["host"] = json!("");
    let req = test::TestRequest::post()
        .uri("/metric")
        .set_json(no_host)
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

    let counter = |outcome: &str| {
        metrics
            .relayed_metrics_total
            .with_label_values(&["worker.queue_depth", outcome])
            .get()
    };
    assert_eq!(counter("forwarded"), 1.0);
    assert_eq!(counter("rejected"), 1.0);
    assert_eq!(counter("failed"), 0.0);
}

#[actix_web::test]
async fn test_failed_forward_counted() {
    let h = harness(RecordingSink::failing(), None);
    let metrics = h.state.metrics.clone();
    let app = test::init_service(create_app(h.state)).await;

    let req = test::TestRequest::post()
        .uri("/metric")
        .set_json(plain_metric())
        .to_request();
    test::call_service(&app, req).await;

    let failed = metrics
        .relayed_metrics_total
        .with_label_values(&["worker.queue_depth", "failed"])
        .get();
    assert_eq!(failed, 1.0);
}

#[actix_web::test]
async fn test_asn_lookup() {
    let h = harness(RecordingSink::default(), None);
    let app = test::init_service(create_app(h.state)).await;

    let req = test::TestRequest::get().uri("/asn?ip=8.8.8.8").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body, json!({"asn": "15169", "ip": "8.8.8.8"}));

    // Second lookup is served from the cache
    let req = test::TestRequest::get().uri("/asn?ip=8.8.8.8").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(h.dns.calls(), 1);
}

#[actix_web::test]
async fn test_asn_lookup_requires_valid_ip() {
    let h = harness(RecordingSink::default(), None);
    let app = test::init_service(create_app(h.state)).await;

    for uri in ["/asn", "/asn?ip=", "/asn?ip=not-an-ip"] {
        let req = test::TestRequest::get().uri(uri).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{}", uri);
    }
    assert_eq!(h.dns.calls(), 0);
}

/// With credentials configured the ingestion routes need basic auth
#[actix_web::test]
async fn test_basic_auth_guards_ingestion() {
    let credentials = Some(("relay".to_string(), "s3cret".to_string()));
    let h = harness(RecordingSink::default(), credentials);
    let app = test::init_service(create_app(h.state)).await;

    let req = test::TestRequest::post()
        .uri("/metric")
        .set_json(plain_metric())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert!(resp.headers().contains_key("www-authenticate"));

    let req = test::TestRequest::post()
        .uri("/metric")
        .insert_header(("Authorization", basic("relay", "wrong")))
        .set_json(plain_metric())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let req = test::TestRequest::post()
        .uri("/metric")
        .insert_header(("Authorization", basic("relay", "s3cret")))
        .set_json(plain_metric())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    assert_eq!(h.sink.events.lock().len(), 1);
}

#[actix_web::test]
async fn test_public_routes_skip_basic_auth() {
    let credentials = Some(("relay".to_string(), "s3cret".to_string()));
    let h = harness(RecordingSink::default(), credentials);
    let app = test::init_service(create_app(h.state)).await;

    for uri in ["/api/health", "/api/version", "/api/metrics"] {
        let req = test::TestRequest::get().uri(uri).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK, "{}", uri);
    }
}

#[actix_web::test]
async fn test_request_id_header_added() {
    let h = harness(RecordingSink::default(), None);
    let app = test::init_service(create_app(h.state)).await;

    let req = test::TestRequest::get().uri("/api/health").to_request();
    let resp = test::call_service(&app, req).await;

    let request_id = resp
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .unwrap();
    assert!(uuid::Uuid::parse_str(request_id).is_ok());
}

#[actix_web::test]
async fn test_request_id_header_preserved() {
    let h = harness(RecordingSink::default(), None);
    let app = test::init_service(create_app(h.state)).await;

    let req = test::TestRequest::get()
        .uri("/api/health")
        .insert_header(("X-Request-ID", "relay-trace-42"))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(
        resp.headers().get("x-request-id").unwrap(),
        "relay-trace-42"
    );
}

/// Request counters and the detection gauges are rendered
#[actix_web::test]
async fn test_metrics_endpoint_integration() {
    let h = harness(RecordingSink::default(), None);
    let app = test::init_service(create_app(h.state)).await;

    let req = test::TestRequest::get().uri("/asn?ip=8.8.8.8").to_request();
    test::call_service(&app, req).await;

    let req = test::TestRequest::get().uri("/api/metrics").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body = test::read_body(resp).await;
    let text = std::str::from_utf8(&body).unwrap();
    assert!(text.contains("http_requests_total"));
    assert!(text.contains("route=\"/asn\""));
    assert!(text.contains("asn_lookups_total{result=\"miss\"} 1"));
    assert!(text.contains("app_uptime_seconds"));
}

#[actix_web::test]
async fn test_metrics_endpoint_disabled() {
    let mut h = harness(RecordingSink::default(), None);
    h.state.metrics_config.enabled = false;
    let app = test::init_service(create_app(h.state)).await;

    let req = test::TestRequest::get().uri("/api/metrics").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[actix_web::test]
async fn test_openapi_spec_lists_routes() {
    let h = harness(RecordingSink::default(), None);
    let app = test::init_service(create_app(h.state)).await;

    let req = test::TestRequest::get().uri("/api/spec/v2").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["info"]["title"], "Cerberus Relay");
    assert!(body["paths"].get("/metric").is_some());
    assert!(body["paths"].get("/asn").is_some());
}
