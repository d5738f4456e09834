use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, Request, header::AUTHORIZATION};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use super::error::ApiError;
use super::state::AdminState;

const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

pub async fn admin_auth(
    State(state): State<AdminState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let token = extract_token(request.headers());

    let principal = match state.auth.authenticate(token.as_deref()) {
        Ok(principal) => principal,
        Err(_) => return ApiError::unauthorized().into_response(),
    };

    request.extensions_mut().insert(principal.clone());
    let mut response = next.run(request).await;
    response.extensions_mut().insert(principal);
    response
}

fn extract_token(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|raw| raw.strip_prefix("Bearer "))
        .map(str::to_string);

    bearer.or_else(|| {
        headers
            .get(ADMIN_TOKEN_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
    })
}
