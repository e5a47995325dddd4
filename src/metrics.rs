//! Prometheus metrics for the stats jobs.
//!
//! Exposes:
//! - `daily_bot_stats_job_duration_seconds` (histogram)
//! - `daily_bot_stats_job_total` (counter with status)
//! - `daily_bot_stats_job_inflight` (gauge)
//! - `daily_bot_stats_external_calls_total` (counter by target and status)
//! - process metrics via `process` collector

use std::convert::Infallible;
use std::net::SocketAddr;
use std::time::Duration;

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use once_cell::sync::Lazy;
use prometheus::process_collector::ProcessCollector;
use prometheus::{
    default_registry, register_histogram_vec, register_int_counter_vec, register_int_gauge_vec,
    Encoder, HistogramVec, IntCounterVec, IntGaugeVec, TextEncoder,
};
use tokio::net::TcpListener;
use tracing::{error, info, warn};

static PROCESS_COLLECTOR: Lazy<()> = Lazy::new(|| {
    if let Err(err) = default_registry().register(Box::new(ProcessCollector::for_self())) {
        warn!("Failed to register process collector: {}", err);
    }
});

static JOB_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    // Exponential buckets from 100ms up to ~7 minutes.
    let buckets =
        prometheus::exponential_buckets(0.1, 2.0, 13).expect("failed to create histogram buckets");
    register_histogram_vec!(
        "daily_bot_stats_job_duration_seconds",
        "Job run duration in seconds",
        &["job"],
        buckets
    )
    .expect("failed to register job duration histogram")
});

static JOB_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "daily_bot_stats_job_total",
        "Total job runs by status",
        &["job", "status"]
    )
    .expect("failed to register job counter")
});

static JOB_INFLIGHT: Lazy<IntGaugeVec> = Lazy::new(|| {
    register_int_gauge_vec!(
        "daily_bot_stats_job_inflight",
        "Number of in-flight jobs",
        &["job"]
    )
    .expect("failed to register inflight gauge")
});

static EXTERNAL_CALLS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "daily_bot_stats_external_calls_total",
        "Calls to external services by target and outcome",
        &["target", "status"]
    )
    .expect("failed to register external call counter")
});

/// Ensure collectors are registered.
fn init_collectors() {
    Lazy::force(&PROCESS_COLLECTOR);
    Lazy::force(&JOB_DURATION);
    Lazy::force(&JOB_TOTAL);
    Lazy::force(&JOB_INFLIGHT);
    Lazy::force(&EXTERNAL_CALLS);
}

/// Increment inflight gauge for a job.
pub fn record_job_start(job: &'static str) {
    init_collectors();
    JOB_INFLIGHT.with_label_values(&[job]).inc();
}

/// Record job completion with duration and status.
pub fn record_job_result(job: &'static str, duration: Duration, success: bool) {
    init_collectors();
    JOB_INFLIGHT.with_label_values(&[job]).dec();
    JOB_DURATION
        .with_label_values(&[job])
        .observe(duration.as_secs_f64());
    JOB_TOTAL
        .with_label_values(&[job, if success { "ok" } else { "error" }])
        .inc();
}

/// Count one call to an external service (`analytics`, `chat`, `handoff`, `alerts`).
pub fn record_external_call(target: &'static str, success: bool) {
    init_collectors();
    EXTERNAL_CALLS
        .with_label_values(&[target, if success { "ok" } else { "error" }])
        .inc();
}

async fn metrics_response() -> Result<Response<Full<Bytes>>, Infallible> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
        error!("Failed to encode metrics: {}", err);
        return Ok(Response::builder()
            .status(StatusCode::INTERNAL_SERVER_ERROR)
            .body(Full::from("encode error"))
            .unwrap());
    }

    Ok(Response::builder()
        .status(StatusCode::OK)
        .header(hyper::header::CONTENT_TYPE, encoder.format_type())
        .body(Full::from(buffer))
        .unwrap())
}

async fn handle_request(req: Request<Incoming>) -> Result<Response<Full<Bytes>>, Infallible> {
    route(req.uri().path()).await
}

async fn route(path: &str) -> Result<Response<Full<Bytes>>, Infallible> {
    match path {
        "/metrics" => metrics_response().await,
        _ => Ok(Response::builder()
            .status(StatusCode::NOT_FOUND)
            .body(Full::new(Bytes::new()))
            .unwrap()),
    }
}

async fn serve(addr: SocketAddr) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "Prometheus metrics endpoint started");

    loop {
        let (stream, peer) = listener.accept().await?;
        let service = service_fn(handle_request);
        let io = TokioIo::new(stream);

        tokio::spawn(async move {
            if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                warn!(?peer, "Metrics connection error: {}", err);
            }
        });
    }
}

/// Spawn the metrics HTTP endpoint on the given address.
pub fn spawn_metrics_server(addr: SocketAddr) {
    init_collectors();
    tokio::spawn(async move {
        if let Err(err) = serve(addr).await {
            error!(%addr, "Metrics server failed: {}", err);
        }
    });
}
