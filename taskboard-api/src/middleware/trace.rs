/// Request spans for access logging
///
/// Every request gets an `http_request` span carrying the method, path, and
/// `x-request-id`. On Google Cloud, requests also carry
/// `x-cloud-trace-context: TRACE_ID/SPAN_ID;o=OPTIONS`; when a project id is
/// configured the span records the Cloud Logging trace path
/// `projects/<project>/traces/<TRACE_ID>` so log lines group per request.

use axum::http::{HeaderMap, Request};
use std::sync::Arc;
use tower_http::trace::MakeSpan;
use tracing::Span;

pub const REQUEST_ID_HEADER: &str = "x-request-id";
pub const CLOUD_TRACE_HEADER: &str = "x-cloud-trace-context";

/// Builds the Cloud Logging trace path from the request headers
pub fn cloud_trace_path(project: &str, headers: &HeaderMap) -> Option<String> {
    let value = headers.get(CLOUD_TRACE_HEADER)?.to_str().ok()?;
    let trace_id = value.split(['/', ';']).next()?.trim();

    if trace_id.is_empty() || project.is_empty() {
        return None;
    }

    Some(format!("projects/{}/traces/{}", project, trace_id))
}

/// [`MakeSpan`] that tags request spans with request and trace ids
#[derive(Debug, Clone, Default)]
pub struct RequestSpan {
    cloud_project: Option<Arc<str>>,
}

impl RequestSpan {
    pub fn new(cloud_project: Option<&str>) -> Self {
        Self {
            cloud_project: cloud_project.map(Arc::from),
        }
    }
}

impl<B> MakeSpan<B> for RequestSpan {
    fn make_span(&mut self, request: &Request<B>) -> Span {
        let request_id = request
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("-");

        let span = tracing::info_span!(
            "http_request",
            method = %request.method(),
            path = %request.uri().path(),
            request_id = %request_id,
            trace = tracing::field::Empty,
        );

        if let Some(project) = self.cloud_project.as_deref() {
            if let Some(trace) = cloud_trace_path(project, request.headers()) {
                span.record("trace", trace.as_str());
            }
        }

        span
    }
}
