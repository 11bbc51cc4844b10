//! Per-request audit logging
//!
//! Every request runs inside an `http_request` span carrying a correlation
//! id, the client IP, method and path. Completion is logged with status and
//! latency; denied requests and server errors additionally emit a
//! [`SecurityEvent`].
//!
//! ```ignore
//! let app = Router::new()
//!     .route("/profile/", get(profile))
//!     .layer(middleware::from_fn(audit_middleware));
//! ```

use std::time::{Duration, Instant};

use axum::{
    extract::Request,
    http::{HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::Response,
};
use tracing::{info, Instrument};

use crate::observability::SecurityEvent;
use crate::security_event;

/// Response header echoing the correlation id
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Audit middleware, for `axum::middleware::from_fn`
pub async fn audit_middleware(request: Request, next: Next) -> Response {
    let correlation_id = correlation_id(request.headers());
    let client_ip = client_ip(request.headers());
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let span = tracing::info_span!(
        "http_request",
        correlation_id = %correlation_id,
        method = %method,
        path = %path,
        client_ip = %client_ip,
    );

    async move {
        let start = Instant::now();
        let mut response = next.run(request).await;
        let status = response.status();
        let latency = start.elapsed();

        log_security_event(status, &path, &client_ip, latency);

        info!(
            status = status.as_u16(),
            latency_ms = latency.as_millis() as u64,
            "Request completed"
        );

        if let Ok(value) = HeaderValue::from_str(&correlation_id) {
            response.headers_mut().insert(REQUEST_ID_HEADER, value);
        }
        response
    }
    .instrument(span)
    .await
}

fn log_security_event(status: StatusCode, path: &str, client_ip: &str, latency: Duration) {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            security_event!(
                SecurityEvent::AccessDenied,
                ip_address = %client_ip,
                path = %path,
                status = status.as_u16(),
                "Access denied"
            );
        }
        status if status.is_server_error() => {
            security_event!(
                SecurityEvent::ServerError,
                ip_address = %client_ip,
                path = %path,
                status = status.as_u16(),
                latency_ms = latency.as_millis() as u64,
                "Server error"
            );
        }
        _ => {}
    }
}

/// `X-Correlation-ID`, then `X-Request-ID`, else a fresh UUID
pub fn correlation_id(headers: &HeaderMap) -> String {
    headers
        .get("x-correlation-id")
        .or_else(|| headers.get(REQUEST_ID_HEADER))
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty() && v.len() <= 128)
        .map(String::from)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}

/// Client IP from proxy headers, "unknown" when absent
///
/// Checks `X-Forwarded-For` (first hop), `X-Real-IP`, `CF-Connecting-IP`.
pub fn client_ip(headers: &HeaderMap) -> String {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());

    header("x-forwarded-for")
        .and_then(|xff| xff.split(',').next())
        .or_else(|| header("x-real-ip"))
        .or_else(|| header("cf-connecting-ip"))
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .unwrap_or("unknown")
        .to_string()
}
