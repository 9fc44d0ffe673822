//! Request logging middleware: logs method, path, status, and duration
//! for every request, matching the source's `RequestLoggingMiddleware`.

use std::time::Instant;

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;

pub async fn log_requests(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    let response = next.run(request).await;

    let duration = start.elapsed();
    log::info!(
        "{method} {path} {} {:.3}s",
        response.status().as_u16(),
        duration.as_secs_f64()
    );
    response
}
