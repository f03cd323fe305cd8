use axum::extract::State;
use axum::response::IntoResponse;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

/// GET /metrics: Prometheus text exposition format.
pub async fn prometheus_metrics(State(handle): State<Arc<PrometheusHandle>>) -> impl IntoResponse {
    handle.render()
}

/// Register descriptions for every metric the service records.
pub fn describe_metrics() {
    metrics::describe_counter!(
        "render_jobs_submitted_total",
        "Total render jobs submitted to the in-process queue"
    );
    metrics::describe_counter!(
        "render_jobs_completed_total",
        "Total render jobs that reached done"
    );
    metrics::describe_counter!(
        "render_jobs_failed_total",
        "Total render jobs that reached failed"
    );
    metrics::describe_histogram!(
        "render_processing_seconds",
        "Time from processing start to terminal status of a render job"
    );
    metrics::describe_counter!(
        "agent_streams_opened_total",
        "Total procurement event streams opened"
    );
    metrics::describe_counter!(
        "agent_stream_errors_total",
        "Total procurement streams whose producer failed"
    );
}
