// Viewer context - who is making the request
// Identity comes from the external auth provider; this layer only carries it.

use uuid::Uuid;

use crate::core::UserId;
use crate::error::{AppError, AppResult};

#[derive(Debug, Clone)]
pub struct ViewerContext {
    pub user_id: Option<UserId>,
    pub request_id: String,
}

impl ViewerContext {
    pub fn anonymous(request_id: String) -> Self {
        Self {
            user_id: None,
            request_id,
        }
    }

    pub fn authenticated(user_id: UserId, request_id: String) -> Self {
        Self {
            user_id: Some(user_id),
            request_id,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.user_id.is_some()
    }

    /// The signed-in user, or `Unauthorized` for anonymous requests
    pub fn require_user(&self) -> AppResult<UserId> {
        self.user_id
            .ok_or_else(|| AppError::Unauthorized("sign in to continue".to_string()))
    }

    pub fn new_request_id() -> String {
        format!("req-{}", Uuid::new_v4())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anonymous_viewer_requires_sign_in() {
        let vc = ViewerContext::anonymous("req-1".into());
        assert!(!vc.is_authenticated());
        assert!(matches!(vc.require_user(), Err(AppError::Unauthorized(_))));

        let user = UserId::new();
        let vc = ViewerContext::authenticated(user, "req-2".into());
        assert_eq!(vc.require_user().unwrap(), user);
    }
}
