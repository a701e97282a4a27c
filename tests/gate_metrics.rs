//! Admission control and metrics wired together the way the server does it:
//! the rate-limit middleware in front of handlers that record into a shared
//! collector, with the Prometheus endpoint reading it back out.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use http_body_util::BodyExt;
use tower::util::ServiceExt;

use kestrel_gate::{rate_limit, Gate, LimiterSettings};
use kestrel_metrics::Collector;

fn app(gate: Arc<Gate>, collector: Arc<Collector>) -> Router {
    Router::new()
        .route(
            "/review",
            get(|State(c): State<Arc<Collector>>| async move {
                c.inc_counter("requests_total");
                "ok"
            }),
        )
        .route(
            "/metrics",
            get(|State(c): State<Arc<Collector>>| async move { c.export_prometheus() }),
        )
        .route("/healthz", get(|| async { "ok" }))
        .layer(axum::middleware::from_fn_with_state(gate, rate_limit))
        .with_state(collector)
}

fn request(path: &str, ip: &str) -> axum::http::Request<Body> {
    axum::http::Request::builder()
        .uri(path)
        .header("x-forwarded-for", ip)
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn rejected_requests_never_reach_the_handler() {
    let settings = LimiterSettings {
        max_tokens: 2.0,
        refill_rate: 0.001,
        tokens_per_request: 1.0,
    };
    let gate = Arc::new(
        Gate::new(settings, Duration::from_secs(300))
            .with_skip(|req| req.uri().path() == "/healthz"),
    );
    let collector = Arc::new(Collector::new());
    let app = app(gate, collector.clone());

    let mut statuses = Vec::new();
    for _ in 0..4 {
        let response = app
            .clone()
            .oneshot(request("/review", "192.168.1.9"))
            .await
            .unwrap();
        statuses.push(response.status());
    }

    assert_eq!(
        statuses,
        vec![
            StatusCode::OK,
            StatusCode::OK,
            StatusCode::TOO_MANY_REQUESTS,
            StatusCode::TOO_MANY_REQUESTS,
        ]
    );
    // only the admitted requests were counted
    assert_eq!(collector.counter("requests_total").value(), 2);
}

#[tokio::test]
async fn prometheus_endpoint_reflects_recorded_traffic() {
    let settings = LimiterSettings::default();
    let gate = Arc::new(Gate::new(settings, Duration::from_secs(300)));
    let collector = Arc::new(Collector::new());
    collector.set_gauge("pool_workers", 4.0);
    let app = app(gate, collector.clone());

    for _ in 0..3 {
        let response = app
            .clone()
            .oneshot(request("/review", "192.168.1.10"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app
        .oneshot(request("/metrics", "192.168.1.10"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("# TYPE requests_total counter"));
    assert!(text.contains("requests_total 3"));
    assert!(text.contains("pool_workers 4"));
    assert!(text.contains("kestrel_uptime_seconds"));
}

#[tokio::test]
async fn health_probe_stays_open_under_saturation() {
    let settings = LimiterSettings {
        max_tokens: 1.0,
        refill_rate: 0.001,
        tokens_per_request: 1.0,
    };
    let gate = Arc::new(
        Gate::new(settings, Duration::from_secs(300))
            .with_skip(|req| req.uri().path() == "/healthz"),
    );
    let app = app(gate, Arc::new(Collector::new()));

    // exhaust the caller's bucket
    app.clone()
        .oneshot(request("/review", "192.168.1.11"))
        .await
        .unwrap();
    let saturated = app
        .clone()
        .oneshot(request("/review", "192.168.1.11"))
        .await
        .unwrap();
    assert_eq!(saturated.status(), StatusCode::TOO_MANY_REQUESTS);

    for _ in 0..10 {
        let probe = app
            .clone()
            .oneshot(request("/healthz", "192.168.1.11"))
            .await
            .unwrap();
        assert_eq!(probe.status(), StatusCode::OK);
    }
}
