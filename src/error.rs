use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use chrono::{DateTime, Utc};
use derive_more::Display;
use serde_json::json;

use crate::store::StoreError;

#[derive(Debug, Display)]
pub enum AppError {
    #[display(fmt = "Missing required field: {}", _0)]
    MissingField(&'static str),

    #[display(fmt = "Invalid value for {}: {}", field, reason)]
    InvalidField { field: &'static str, reason: String },

    #[display(fmt = "Record store authentication failed")]
    AuthenticationFailure(String),

    #[display(fmt = "No student or teacher matches the scanned card")]
    NotFound { scanned: String },

    #[display(fmt = "{} is not active (status: {})", name, status)]
    PersonInactive { name: String, status: String },

    #[display(fmt = "Duplicate scan: session opened at {} is still open", opened_at)]
    DuplicateScan { opened_at: DateTime<Utc> },

    #[display(fmt = "Failed to write attendance record: {}", _0)]
    StoreWriteFailure(String),

    #[display(fmt = "Failed to read attendance records: {}", _0)]
    StoreReadFailure(String),
}

impl AppError {
    pub fn store_read(err: StoreError) -> Self {
        match err {
            StoreError::Authentication(msg) => AppError::AuthenticationFailure(msg),
            StoreError::Backend(msg) => AppError::StoreReadFailure(msg),
        }
    }

    pub fn store_write(err: StoreError) -> Self {
        match err {
            StoreError::Authentication(msg) => AppError::AuthenticationFailure(msg),
            StoreError::Backend(msg) => AppError::StoreWriteFailure(msg),
        }
    }

    fn details(&self) -> Option<String> {
        match self {
            AppError::AuthenticationFailure(msg) => Some(msg.clone()),
            AppError::NotFound { scanned } => Some(scanned.clone()),
            _ => None,
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::MissingField(_) | AppError::InvalidField { .. } => StatusCode::BAD_REQUEST,
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::PersonInactive { .. } => StatusCode::FORBIDDEN,
            AppError::DuplicateScan { .. } => StatusCode::CONFLICT,
            AppError::AuthenticationFailure(_)
            | AppError::StoreWriteFailure(_)
            | AppError::StoreReadFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let mut body = json!({
            "success": false,
            "error": self.to_string(),
        });
        if let Some(details) = self.details() {
            body["details"] = json!(details);
        }
        HttpResponse::build(self.status_code()).json(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;

    #[actix_web::test]
    async fn error_body_always_carries_success_flag() {
        let err = AppError::MissingField("teacherId");
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);

        let body = to_bytes(err.error_response().into_body()).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["success"], json!(false));
        assert_eq!(body["error"], json!("Missing required field: teacherId"));
        assert!(body.get("details").is_none());
    }

    #[actix_web::test]
    async fn auth_failure_is_generic_with_details() {
        let err = AppError::store_write(StoreError::Authentication("Access denied".into()));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = to_bytes(err.error_response().into_body()).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["error"], json!("Record store authentication failed"));
        assert_eq!(body["details"], json!("Access denied"));
    }

    #[test]
    fn store_errors_keep_their_message() {
        let err = AppError::store_write(StoreError::Backend("deadlock".into()));
        assert_eq!(err.to_string(), "Failed to write attendance record: deadlock");
        let err = AppError::store_read(StoreError::Backend("timeout".into()));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn inactive_person_names_the_status() {
        let err = AppError::PersonInactive {
            name: "Bob".into(),
            status: "suspended".into(),
        };
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
        assert!(err.to_string().contains("suspended"));
    }
}
