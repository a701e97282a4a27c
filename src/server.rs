//! Webhook service wiring: admission control in front of the diff parser and
//! worker pool, with a shared metrics collector observing everything.
//!
//! The AI-backed reviewer is an external collaborator; the built-in
//! [`ChangeSummaryReviewer`] only summarizes change counts so the service
//! runs standalone.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::header;
use axum::routing::{get, post};
use axum::{Json, Router};
use miette::{IntoDiagnostic, Result};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use kestrel_core::{
    FileDiff, FileReviewResult, FileReviewer, FileStatus, KestrelConfig, KestrelError, LineKind,
};
use kestrel_gate::{rate_limit, Gate, LimiterSettings};
use kestrel_metrics::Collector;
use kestrel_pool::{FileReviewTask, Task, WorkerPool};

struct AppState {
    pool: Arc<WorkerPool>,
    collector: Arc<Collector>,
    reviewer: Arc<dyn FileReviewer>,
}

/// Placeholder reviewer summarizing change counts per file.
struct ChangeSummaryReviewer;

#[async_trait::async_trait]
impl FileReviewer for ChangeSummaryReviewer {
    async fn review_file(
        &self,
        cancel: &CancellationToken,
        path: &Path,
        content: &str,
    ) -> kestrel_core::Result<FileReviewResult> {
        if cancel.is_cancelled() {
            return Err(KestrelError::Review("review cancelled".into()));
        }
        Ok(FileReviewResult {
            path: path.to_path_buf(),
            summary: format!("{} lines after change", content.lines().count()),
            comments: Vec::new(),
        })
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ReviewResponse {
    files: usize,
    reviewed: usize,
    additions: usize,
    deletions: usize,
    errors: usize,
    duration_ms: u64,
    results: Vec<FileReviewResult>,
}

/// Run the webhook service until interrupted.
pub async fn serve(config: KestrelConfig, bind_override: Option<String>) -> Result<()> {
    let collector = Arc::new(Collector::with_capacity(config.metrics.histogram_capacity));
    let pool = Arc::new(WorkerPool::new(config.pool.workers, config.pool.queue_size));
    pool.start();

    let gate = Arc::new(
        Gate::new(
            LimiterSettings {
                max_tokens: config.limiter.max_tokens,
                refill_rate: config.limiter.refill_rate,
                tokens_per_request: config.limiter.tokens_per_request,
            },
            Duration::from_millis(config.limiter.block_duration_ms),
        )
        .with_skip(|req| req.uri().path() == "/healthz"),
    );

    let state = Arc::new(AppState {
        pool: pool.clone(),
        collector,
        reviewer: Arc::new(ChangeSummaryReviewer),
    });

    let app = Router::new()
        .route("/review", post(review))
        .route("/stats", get(stats))
        .route("/metrics", get(metrics))
        .route("/healthz", get(|| async { "ok" }))
        .layer(axum::middleware::from_fn_with_state(gate, rate_limit))
        .with_state(state);

    let bind = bind_override.unwrap_or_else(|| config.server.bind.clone());
    let listener = tokio::net::TcpListener::bind(&bind).await.into_diagnostic()?;
    tracing::info!(%bind, workers = config.pool.workers, "kestrel serving");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown signal received");
        })
        .await
        .into_diagnostic()?;

    pool.stop().await;
    Ok(())
}

async fn review(State(state): State<Arc<AppState>>, body: String) -> Json<ReviewResponse> {
    let timer = state.collector.start_timer("review_seconds");
    state.collector.inc_counter("review_requests_total");

    let diff = kestrel_diff::parse(&body);
    state.collector.observe("diff_files", diff.files.len() as f64);

    let sink = Arc::new(Mutex::new(Vec::new()));
    let mut waits = Vec::new();
    for file in &diff.files {
        if !reviewable(file) {
            continue;
        }
        let task: Box<dyn Task> = Box::new(FileReviewTask::new(
            file.path.clone(),
            new_side_text(file),
            state.reviewer.clone(),
            sink.clone(),
        ));
        let pool = state.pool.clone();
        waits.push(tokio::spawn(async move { pool.submit_wait(task).await }));
    }

    let submitted = waits.len();
    let mut errors = 0usize;
    for wait in waits {
        match wait.await {
            Ok(Ok(result)) if result.is_ok() => {}
            _ => errors += 1,
        }
    }
    if errors > 0 {
        state
            .collector
            .add_counter("review_errors_total", errors as u64);
    }

    let elapsed = timer.stop();
    let results = {
        let mut sink = sink.lock().expect("review sink lock poisoned");
        std::mem::take(&mut *sink)
    };

    tracing::info!(
        files = diff.files.len(),
        reviewed = submitted - errors,
        errors,
        "review request completed"
    );

    Json(ReviewResponse {
        files: diff.files.len(),
        reviewed: submitted - errors,
        additions: diff.additions,
        deletions: diff.deletions,
        errors,
        duration_ms: elapsed.as_millis() as u64,
        results,
    })
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatsResponse {
    pool: kestrel_pool::PoolStats,
    metrics: kestrel_metrics::MetricsSnapshot,
}

async fn stats(State(state): State<Arc<AppState>>) -> Json<StatsResponse> {
    Json(StatsResponse {
        pool: state.pool.stats(),
        metrics: state.collector.export(),
    })
}

async fn metrics(State(state): State<Arc<AppState>>) -> ([(header::HeaderName, &'static str); 1], String) {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.collector.export_prometheus(),
    )
}

fn reviewable(file: &FileDiff) -> bool {
    !file.is_binary && file.status != FileStatus::Deleted && !file.hunks.is_empty()
}

/// Approximate the post-change text: everything except deleted lines.
fn new_side_text(file: &FileDiff) -> String {
    let mut text = String::new();
    for hunk in &file.hunks {
        for line in &hunk.lines {
            if line.kind != LineKind::Deletion {
                text.push_str(&line.content);
                text.push('\n');
            }
        }
    }
    text
}
