use lazy_static::lazy_static;
use prometheus::exponential_buckets;
use prometheus::HistogramOpts;
use prometheus::HistogramVec;
use prometheus::IntCounterVec;
use prometheus::IntGauge;
use prometheus::Opts;
use prometheus::Registry;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing::warn;
use warp::Filter;
use warp::Rejection;
use warp::Reply;


lazy_static! {
    pub static ref PROBES_SUBMITTED: IntCounterVec = IntCounterVec::new(
        Opts::new("probes_submitted", "Requests written to a vantage point daemon"),
        &["vp"]
    )
    .expect("metric can not be created");

    pub static ref PROBES_COMPLETED: IntCounterVec = IntCounterVec::new(
        Opts::new("probes_completed", "Completions matched to an outstanding request"),
        &["vp"]
    )
    .expect("metric can not be created");

    pub static ref UNMATCHED_COMPLETIONS: IntCounterVec = IntCounterVec::new(
        Opts::new("unmatched_completions", "Daemon lines whose request id was not outstanding"),
        &["vp"]
    )
    .expect("metric can not be created");

    pub static ref DAEMON_WRITE_FAILURES: IntCounterVec = IntCounterVec::new(
        Opts::new("daemon_write_failures", "Request lines that could not be written"),
        &["vp"]
    )
    .expect("metric can not be created");

    pub static ref PROBE_RTT_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new("probe_rtt_seconds", "Time from submission to completion in seconds")
            .buckets(exponential_buckets(1.0, 2.0, 12).expect("valid buckets")),
        &["vp"]
    )
    .expect("metric can not be created");

    pub static ref UNRESPONSIVE_VPS: IntGauge =
        IntGauge::new("unresponsive_vps", "Vantage points currently judged unresponsive")
            .expect("metric can not be created");

    pub static ref REGISTRY: Registry = Registry::new();
}

pub fn register_custom_metrics(registry: &Registry) {
    let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(PROBES_SUBMITTED.clone()),
        Box::new(PROBES_COMPLETED.clone()),
        Box::new(UNMATCHED_COMPLETIONS.clone()),
        Box::new(DAEMON_WRITE_FAILURES.clone()),
        Box::new(PROBE_RTT_SECONDS.clone()),
        Box::new(UNRESPONSIVE_VPS.clone()),
    ];
    for collector in collectors {
        if let Err(e) = registry.register(collector) {
            warn!("collector registration skipped: {}", e);
        }
    }
}

/// Serves `/metrics` until `shutdown` is cancelled.
pub async fn start_server(
    port: u16,
    shutdown: CancellationToken,
) {
    register_custom_metrics(&REGISTRY);

    let metrics_route = warp::path!("metrics").and_then(metrics_handler);

    let (addr, server) =
        warp::serve(metrics_route).bind_with_graceful_shutdown(([0, 0, 0, 0], port), async move {
            shutdown.cancelled().await;
        });
    info!("metrics server listening on {}", addr);
    server.await;
}

pub(crate) fn encode_registry(registry: &Registry) -> String {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&registry.gather(), &mut buffer) {
        warn!("could not encode custom metrics: {}", e);
    };
    match String::from_utf8(buffer) {
        Ok(v) => v,
        Err(e) => {
            warn!("custom metrics could not be from_utf8'd: {}", e);
            String::default()
        }
    }
}

async fn metrics_handler() -> Result<impl Reply, Rejection> {
    Ok(encode_registry(&REGISTRY))
}
