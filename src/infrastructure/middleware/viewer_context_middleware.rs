// ViewerContext middleware - builds the request-scoped viewer from headers
// and injects it into request extensions

use axum::{
    extract::Request,
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

use crate::core::UserId;
use crate::error::AppError;
use crate::infrastructure::viewer::ViewerContext;

pub const USER_ID_HEADER: &str = "x-user-id";

pub async fn viewer_context_middleware(mut request: Request, next: Next) -> Response {
    let user_id = match extract_user_id(request.headers()) {
        Ok(user_id) => user_id,
        Err(err) => return err.into_response(),
    };

    let request_id = ViewerContext::new_request_id();
    let viewer_context = match user_id {
        Some(user_id) => {
            debug!(%user_id, %request_id, "Authenticated viewer");
            ViewerContext::authenticated(user_id, request_id)
        }
        None => ViewerContext::anonymous(request_id),
    };

    request.extensions_mut().insert(Arc::new(viewer_context));
    next.run(request).await
}

/// The auth provider's user id, from `Authorization: Bearer <uuid>` or
/// `x-user-id`. Absent headers mean an anonymous viewer; a present but
/// malformed one is rejected.
fn extract_user_id(headers: &HeaderMap) -> Result<Option<UserId>, AppError> {
    if let Some(auth_header) = headers.get("authorization") {
        let auth_str = auth_header
            .to_str()
            .map_err(|_| AppError::Unauthorized("malformed authorization header".into()))?;
        let token = auth_str
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::Unauthorized("expected a bearer token".into()))?;
        return parse_user_id(token).map(Some);
    }

    if let Some(header) = headers.get(USER_ID_HEADER) {
        let raw = header
            .to_str()
            .map_err(|_| AppError::Unauthorized("malformed user id header".into()))?;
        return parse_user_id(raw).map(Some);
    }

    Ok(None)
}

fn parse_user_id(raw: &str) -> Result<UserId, AppError> {
    UserId::from_str(raw.trim()).map_err(|_| AppError::Unauthorized("invalid user id".into()))
}
