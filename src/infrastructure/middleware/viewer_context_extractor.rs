// ViewerContext extractor - hands the request-scoped viewer to handlers

use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
};
use std::sync::Arc;

use crate::infrastructure::viewer::ViewerContext;

/// Cheap-to-clone handle on the request's `ViewerContext`.
///
/// ```ignore
/// async fn handler(vc: Vc) -> AppResult<Json<Value>> {
///     let user_id = vc.require_user()?;
///     ...
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Vc(Arc<ViewerContext>);

impl Vc {
    pub fn new(vc: Arc<ViewerContext>) -> Self {
        Self(vc)
    }

    pub fn arc(self) -> Arc<ViewerContext> {
        self.0
    }
}

impl std::ops::Deref for Vc {
    type Target = ViewerContext;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<S> FromRequestParts<S> for Vc
where
    S: Send + Sync,
{
    type Rejection = StatusCode;

    fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        // Missing only when a route was mounted outside the middleware
        let vc = parts
            .extensions
            .get::<Arc<ViewerContext>>()
            .map(|vc| Vc(vc.clone()))
            .ok_or(StatusCode::INTERNAL_SERVER_ERROR);

        async move { vc }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::UserId;
    use axum::http::Request;

    #[test]
    fn test_vc_deref() {
        let user = UserId::new();
        let vc = Vc::new(Arc::new(ViewerContext::authenticated(
            user,
            "test-request".to_string(),
        )));

        assert_eq!(vc.request_id, "test-request");
        assert_eq!(vc.user_id, Some(user));
        assert_eq!(vc.arc().request_id, "test-request");
    }

    #[tokio::test]
    async fn test_extract_from_extensions() {
        let mut request = Request::builder().body(()).unwrap();
        request
            .extensions_mut()
            .insert(Arc::new(ViewerContext::anonymous("req-x".into())));
        let (mut parts, _) = request.into_parts();

        let vc = Vc::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(vc.request_id, "req-x");
    }

    #[tokio::test]
    async fn test_missing_extension_is_rejected() {
        let (mut parts, _) = Request::builder().body(()).unwrap().into_parts();
        let rejection = Vc::from_request_parts(&mut parts, &()).await.unwrap_err();
        assert_eq!(rejection, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
