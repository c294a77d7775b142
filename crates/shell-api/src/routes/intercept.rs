//! Interception fallback for application requests

use axum::{
    body::{Body, to_bytes},
    extract::{Request, State},
    http::{HeaderValue, Uri, header},
    response::Response,
};
use shell_core::{Bypass, InterceptedRequest, Interception, ResponseSource, ShellResponse};
use tracing::{debug, warn};
use url::Url;

use super::MAX_BODY_BYTES;
use crate::error::ApiError;
use crate::state::AppState;

/// Header naming where a response came from
pub const SOURCE_HEADER: &str = "x-shell-cache";

/// Fallback handler: route through the interceptor, forwarding in-scope
/// pass-throughs to the origin
pub async fn intercept(
    State(state): State<AppState>,
    request: Request,
) -> Result<Response, ApiError> {
    let (parts, body) = request.into_parts();

    let body = to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(|e| ApiError::BadRequest(format!("Unreadable request body: {}", e)))?;

    let url = request_url(state.interceptor.scope(), &parts.uri)?;
    let navigate = parts
        .headers
        .get("sec-fetch-mode")
        .is_some_and(|mode| mode == "navigate");

    let mut headers = parts.headers;
    headers.remove(header::HOST);

    let request = InterceptedRequest {
        method: parts.method,
        url,
        navigate,
        headers,
        body,
    };

    match state.interceptor.intercept(&request).await {
        Interception::Respond(response) => Ok(into_response(response)),
        // Only the origin is forwarded to; other authorities are refused
        Interception::PassThrough(Bypass::CrossOrigin) => {
            warn!("Refusing request for foreign origin {}", request.url);
            Err(ApiError::MisdirectedRequest(format!(
                "{} is not served here",
                request.url.origin().ascii_serialization()
            )))
        }
        Interception::PassThrough(reason) => {
            debug!("Forwarding {} {} ({:?})", request.method, request.url, reason);

            let response = state
                .network
                .fetch(&request.to_network())
                .await
                .map_err(|e| {
                    warn!("Forwarding {} failed: {}", request.url, e);
                    ApiError::BadGateway(e.to_string())
                })?;

            Ok(into_response(ShellResponse::from_network(
                response,
                ResponseSource::Bypass,
            )))
        }
    }
}

/// Absolute URL of a request, resolving origin-form targets against the scope
fn request_url(scope: &Url, uri: &Uri) -> Result<Url, ApiError> {
    if uri.scheme().is_some() {
        return Url::parse(&uri.to_string())
            .map_err(|e| ApiError::BadRequest(format!("Invalid request target {}: {}", uri, e)));
    }

    let target = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
    scope
        .join(target)
        .map_err(|e| ApiError::BadRequest(format!("Invalid request target {}: {}", target, e)))
}

fn into_response(response: ShellResponse) -> Response {
    let mut out = Response::new(Body::from(response.body));
    *out.status_mut() = response.status;
    *out.headers_mut() = response.headers;
    out.headers_mut().insert(
        SOURCE_HEADER,
        HeaderValue::from_static(response.source.as_str()),
    );
    out
}
