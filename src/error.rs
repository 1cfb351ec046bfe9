use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::{DbErr, SqlErr};
use serde::Serialize;
use thiserror::Error;

/// A field rejected before anything is written.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("الحقل {field} مطلوب")]
    MissingRequiredField { field: &'static str },

    #[error("الحقل {field} لا يمكن أن يحتوي على الرمز '{character}'")]
    InvalidCharacter { field: &'static str, character: char },

    #[error("طول الحقل {field} يجب أن يكون بين {min} و {max} حرف (الطول الحالي {actual})")]
    InvalidLength {
        field: &'static str,
        min: usize,
        max: usize,
        actual: usize,
    },

    #[error("صيغة الحقل {field} غير صحيحة")]
    InvalidFormat { field: &'static str },
}

impl ValidationError {
    pub fn field(&self) -> &'static str {
        match self {
            Self::MissingRequiredField { field }
            | Self::InvalidCharacter { field, .. }
            | Self::InvalidLength { field, .. }
            | Self::InvalidFormat { field } => field,
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("القيمة المدخلة في الحقل {field} مستخدمة بالفعل")]
    UniquenessConflict { field: &'static str },

    #[error("{0} غير موجود")]
    NotFound(&'static str),

    #[error("{0}")]
    Unauthorized(&'static str),

    #[error("ليس لديك صلاحية لهذا الإجراء")]
    Forbidden,

    #[error("طلبات كثيرة، حاول بعد {retry_after_secs} ثانية")]
    RateLimited { retry_after_secs: u64 },

    #[error("database error: {0}")]
    Database(DbErr),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<DbErr> for AppError {
    fn from(err: DbErr) -> Self {
        if let Some(SqlErr::UniqueConstraintViolation(msg)) = err.sql_err() {
            return Self::UniquenessConflict {
                field: unique_field(&msg),
            };
        }
        Self::Database(err)
    }
}

/// SQLite reports `UNIQUE constraint failed: users.phone`.
fn unique_field(msg: &str) -> &'static str {
    if msg.contains("users.phone") {
        "phone"
    } else if msg.contains("users.username") {
        "username"
    } else if msg.contains("logos.is_active") {
        "is_active"
    } else {
        "unknown"
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    field: Option<&'static str>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, field) = match &self {
            Self::Validation(v) => (StatusCode::BAD_REQUEST, Some(v.field())),
            Self::UniquenessConflict { field } => (StatusCode::CONFLICT, Some(*field)),
            Self::NotFound(_) => (StatusCode::NOT_FOUND, None),
            Self::Unauthorized(_) => (StatusCode::UNAUTHORIZED, None),
            Self::Forbidden => (StatusCode::FORBIDDEN, None),
            Self::RateLimited { .. } => (StatusCode::TOO_MANY_REQUESTS, None),
            Self::Database(_) | Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, None),
        };

        let error = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("Request failed: {self}");
            "خطأ داخلي في الخادم".to_string()
        } else {
            self.to_string()
        };

        let mut response = (status, Json(ErrorBody { error, field })).into_response();
        if let Self::RateLimited { retry_after_secs } = self {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs));
        }
        response
    }
}
