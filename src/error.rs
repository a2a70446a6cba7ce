use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Errors raised at the storage boundary, classified so callers can tell a
/// connectivity problem apart from a rejected statement.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error("foreign key constraint violated: {0}")]
    ForeignKeyViolation(String),

    #[error("query failed: {0}")]
    Query(String),

    #[error("storage misconfigured: {0}")]
    Configuration(String),
}

impl StoreError {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                StoreError::UniqueViolation(db_err.message().to_string())
            }
            sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation() => {
                StoreError::ForeignKeyViolation(db_err.message().to_string())
            }
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::Protocol(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => StoreError::Unavailable(err.to_string()),
            sqlx::Error::Configuration(_) => StoreError::Configuration(err.to_string()),
            _ => StoreError::Query(err.to_string()),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{field}: {message}")]
    ValidationFailed { field: &'static str, message: String },

    #[error("This email is already registered for the shift")]
    AlreadyRegistered,

    #[error("This shift is full")]
    ShiftFull,

    #[error("Cannot reduce capacity to {requested}: {filled} volunteers are registered")]
    BelowFilled { filled: i32, requested: i32 },

    #[error("This event is not accepting registrations")]
    EventClosed,

    #[error("{registrations} volunteers are registered; confirm to continue")]
    ConfirmationRequired { registrations: u64 },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Organization context unavailable: {0}")]
    ContextUnavailable(String),

    #[error("Persistence unavailable: {0}")]
    PersistenceUnavailable(String),
}

impl AppError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        AppError::ValidationFailed {
            field,
            message: message.into(),
        }
    }

    /// Infrastructure failures are logged and hidden behind a retry prompt;
    /// everything else is an expected outcome shown to the user as is.
    pub fn is_infrastructure(&self) -> bool {
        matches!(
            self,
            AppError::ContextUnavailable(_) | AppError::PersistenceUnavailable(_)
        )
    }

    fn code(&self) -> &'static str {
        match self {
            AppError::ValidationFailed { .. } => "validation_failed",
            AppError::AlreadyRegistered => "already_registered",
            AppError::ShiftFull => "shift_full",
            AppError::BelowFilled { .. } => "below_filled",
            AppError::EventClosed => "event_closed",
            AppError::ConfirmationRequired { .. } => "confirmation_required",
            AppError::NotFound(_) => "not_found",
            AppError::Conflict(_) => "conflict",
            AppError::Unauthorized(_) => "unauthorized",
            AppError::Forbidden(_) => "forbidden",
            AppError::ContextUnavailable(_) => "context_unavailable",
            AppError::PersistenceUnavailable(_) => "persistence_unavailable",
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        AppError::PersistenceUnavailable(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::ValidationFailed { .. } => StatusCode::BAD_REQUEST,
            AppError::AlreadyRegistered
            | AppError::ShiftFull
            | AppError::BelowFilled { .. }
            | AppError::EventClosed
            | AppError::ConfirmationRequired { .. }
            | AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::ContextUnavailable(_) | AppError::PersistenceUnavailable(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
        };

        let message = if self.is_infrastructure() {
            tracing::error!(error = %self, "Request failed on infrastructure error");
            "Something went wrong on our side. Please try again.".to_string()
        } else {
            self.to_string()
        };

        let mut body = json!({
            "error": message,
            "code": self.code(),
            "status": status.as_u16(),
        });
        if let AppError::ValidationFailed { field, .. } = &self {
            body["field"] = json!(field);
        }

        (status, Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
