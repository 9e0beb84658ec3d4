//! Mounts the HTTP transport on an axum [`Router`].

use axum::Router;
use axum::body::Body;
use axum::extract::Request;
use axum::extract::State;
use axum::response::Response;
use axum::routing::any;
use bytes::Bytes;
use http::StatusCode;
use tower::ServiceExt;

use crate::services::HttpService;

/// Build a router serving GraphQL on `/` for any method; the service itself
/// rejects methods other than GET and POST.
pub fn router(service: HttpService) -> Router {
    Router::new().route("/", any(handle)).with_state(service)
}

async fn handle(State(service): State<HttpService>, request: Request) -> Response {
    let (parts, body) = request.into_parts();
    let bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(err) => {
            tracing::debug!(%err, "failed to buffer the request body");
            return status_response(StatusCode::BAD_REQUEST);
        }
    };

    match service.oneshot(http::Request::from_parts(parts, bytes)).await {
        Ok(response) => response.map(Body::from),
        Err(err) => {
            tracing::error!(%err, "transport failed to produce a response");
            status_response(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

fn status_response(status: StatusCode) -> Response {
    Response::builder()
        .status(status)
        .body(Body::from(Bytes::new()))
        .expect("status-only responses are valid")
}
