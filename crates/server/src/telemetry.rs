//! Request latency histogram exported in the Prometheus text format.
//!
//! The recorder is owned by [`HttpMetrics`] rather than installed globally,
//! so several application states can live in one process.

use axum::extract::{MatchedPath, Request, State};
use axum::middleware::Next;
use axum::response::Response;
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle, PrometheusRecorder};
use std::sync::Arc;
use std::time::{Duration, Instant};

pub const REQUEST_DURATION: &str = "http_request_duration_seconds";

const DURATION_BUCKETS: [f64; 11] = [
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

#[derive(Clone)]
pub struct HttpMetrics {
    recorder: Arc<PrometheusRecorder>,
    handle: PrometheusHandle,
}

impl std::fmt::Debug for HttpMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpMetrics").finish_non_exhaustive()
    }
}

impl HttpMetrics {
    /// Build a recorder tagging every series with `service="<service>"`.
    pub fn new(service: &str) -> color_eyre::Result<Self> {
        let recorder = PrometheusBuilder::new()
            .add_global_label("service", service)
            .set_buckets_for_metric(Matcher::Full(REQUEST_DURATION.to_string()), &DURATION_BUCKETS)?
            .build_recorder();
        let handle = recorder.handle();
        Ok(Self {
            recorder: Arc::new(recorder),
            handle,
        })
    }

    pub fn observe(&self, method: &str, path: &str, status: u16, elapsed: Duration) {
        metrics::with_local_recorder(self.recorder.as_ref(), || {
            metrics::histogram!(
                REQUEST_DURATION,
                "code" => status.to_string(),
                "method" => method.to_owned(),
                "path" => path.to_owned()
            )
            .record(elapsed.as_secs_f64());
        });
    }

    pub fn render(&self) -> String {
        self.handle.render()
    }

    /// Drain histogram buffers. Call periodically when nothing scrapes.
    pub fn run_upkeep(&self) {
        self.handle.run_upkeep();
    }
}

/// Record the latency of every request, labelled with its route template.
pub async fn track_latency(
    State(metrics): State<HttpMetrics>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().to_string();
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|matched| matched.as_str().to_owned())
        .unwrap_or_else(|| "unmatched".to_owned());

    let started = Instant::now();
    let response = next.run(request).await;
    metrics.observe(&method, &path, response.status().as_u16(), started.elapsed());
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn observations_render_as_histogram() {
        let metrics = HttpMetrics::new("whisper").unwrap();
        metrics.observe("GET", "/healthz", 200, Duration::from_millis(3));

        let rendered = metrics.render();
        assert!(rendered.contains("http_request_duration_seconds_bucket"));
        assert!(rendered.contains("service=\"whisper\""));
        assert!(rendered.contains("path=\"/healthz\""));
        assert!(rendered.contains("code=\"200\""));
    }

    #[test]
    fn recorders_are_independent() {
        let first = HttpMetrics::new("whisper").unwrap();
        let second = HttpMetrics::new("whisper").unwrap();
        first.observe("POST", "/login", 401, Duration::from_millis(1));
        assert!(!second.render().contains("path=\"/login\""));
    }
}
