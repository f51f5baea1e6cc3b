//! Error handler for paedia.

use axum::extract::rejection::JsonRejection;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use sqlx::{Error as SQLxError, postgres::PgDatabaseError};
use thiserror::Error;
use validator::{ValidationError, ValidationErrors};

pub type Result<T> = std::result::Result<T, ServerError>;

/// Enum representing server-side errors.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("validation error occurred")]
    Validation(#[from] ValidationErrors),

    #[error(transparent)]
    Axum(#[from] JsonRejection),

    #[error("SQL request failed: {0}")]
    Sql(#[from] SQLxError),

    #[error("missing or invalid session")]
    Unauthorized,

    #[error("caller is not allowed to perform this action")]
    Forbidden,

    #[error("user not found")]
    UserNotFound,

    #[error("doctor profile not found")]
    ProfileNotFound,

    #[error("notification not found")]
    NotificationNotFound,

    #[error("user is not a member of any team")]
    TeamNotFound,

    #[error("outbound channel failed: {0}")]
    Transport(String),

    #[error("internal server error, {details}")]
    Internal { details: String },
}

impl ServerError {
    /// Build a single-field [`ServerError::Validation`].
    pub fn field(field: &'static str, code: &'static str, message: &str) -> Self {
        let mut errors = ValidationErrors::new();
        errors.add(
            field,
            ValidationError::new(code).with_message(message.to_owned().into()),
        );
        Self::Validation(errors)
    }
}

/// Outbound URLs may embed credentials (Telegram puts the bot token in the
/// path), so the URL is never part of the message.
impl From<reqwest::Error> for ServerError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.without_url().to_string())
    }
}

/// Structure for detailed error responses.
#[derive(Debug, Serialize)]
pub struct ResponseError {
    r#type: Option<String>,
    title: String,
    status: u16,
    detail: String,
    instance: Option<String>,
    errors: Option<Vec<FieldError>>,
}

impl ResponseError {
    /// Update error status code.
    pub fn status(mut self, code: StatusCode) -> Self {
        self.status = code.as_u16();
        self
    }

    /// Update `title` field.
    pub fn title(mut self, title: &str) -> Self {
        self.title = title.into();
        self
    }

    /// Add detailed error.
    pub fn details(mut self, description: &str) -> Self {
        self.detail = description.into();
        self
    }

    /// Automatically add errors field.
    pub fn errors(mut self, errors: &ValidationErrors) -> Self {
        self.errors = Some(parse_validation_errors(errors));
        self
    }

    /// Transform [`ResponseError`] into axum [`Response`].
    pub fn into_response(self) -> std::result::Result<Response, axum::http::Error> {
        if let Ok(body) = serde_json::to_string(&self) {
            Response::builder()
                .status(self.status)
                .header(header::CONTENT_TYPE, "application/json")
                .body(body.into())
        } else {
            Ok(internal_server_error())
        }
    }
}

impl Default for ResponseError {
    fn default() -> Self {
        Self {
            r#type: None,
            title: "Internal server error.".to_owned(),
            status: StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
            detail: String::default(),
            instance: None,
            errors: None,
        }
    }
}

#[derive(Debug, Serialize)]
struct FieldError {
    field: String,
    message: String,
}

fn parse_validation_errors(errors: &ValidationErrors) -> Vec<FieldError> {
    errors
        .field_errors()
        .iter()
        .flat_map(|(field, issues)| {
            issues.iter().map(move |issue| FieldError {
                field: field.to_string(),
                message: issue.to_string(),
            })
        })
        .collect()
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let response = ResponseError::default()
            .title("There were validation errors with your request.")
            .details(&self.to_string())
            .status(StatusCode::BAD_REQUEST);

        let response = match &self {
            ServerError::Validation(validation_errors) => response.errors(validation_errors),

            ServerError::Sql(SQLxError::RowNotFound) => response
                .title("Resource not found.")
                .status(StatusCode::NOT_FOUND),

            ServerError::Sql(err) => {
                tracing::error!(error = %err, "database request failed");
                response
                    .title("Database request failed.")
                    .details(
                        err.as_database_error()
                            .and_then(|e| e.try_downcast_ref::<PgDatabaseError>())
                            .and_then(|e| e.detail())
                            .unwrap_or("database error"),
                    )
                    .status(StatusCode::INTERNAL_SERVER_ERROR)
            },

            ServerError::Unauthorized => response
                .title("Missing or invalid 'Authorization' header.")
                .status(StatusCode::UNAUTHORIZED),

            ServerError::Forbidden => response
                .title("Insufficient role.")
                .status(StatusCode::FORBIDDEN),

            ServerError::UserNotFound
            | ServerError::ProfileNotFound
            | ServerError::NotificationNotFound
            | ServerError::TeamNotFound => response
                .title("Resource not found.")
                .status(StatusCode::NOT_FOUND),

            ServerError::Transport(details) => {
                tracing::warn!(%details, "outbound channel failure reached handler");
                response
                    .title("Upstream channel failed.")
                    .status(StatusCode::BAD_GATEWAY)
            },

            ServerError::Internal { details } => {
                tracing::error!(%details, "server returned 500 status");

                ResponseError::default()
            },

            _ => response,
        };

        response
            .into_response()
            .unwrap_or_else(|_| internal_server_error())
    }
}

fn internal_server_error() -> Response {
    Response::builder()
        .status(StatusCode::INTERNAL_SERVER_ERROR)
        .header(header::CONTENT_TYPE, "application/json")
        .body(
            serde_json::json!({
                "type": null,
                "title": "Internal server error.",
                "status": StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
                "detail": null,
                "instance": null,
                "errors": null,
            })
            .to_string()
            .into(),
        )
        .unwrap_or_else(|_| Response::new("Internal server error".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        let cases = [
            (ServerError::Unauthorized, StatusCode::UNAUTHORIZED),
            (ServerError::Forbidden, StatusCode::FORBIDDEN),
            (ServerError::ProfileNotFound, StatusCode::NOT_FOUND),
            (ServerError::NotificationNotFound, StatusCode::NOT_FOUND),
            (
                ServerError::field("role", "role", "Unknown role."),
                StatusCode::BAD_REQUEST,
            ),
            (
                ServerError::Internal {
                    details: "boom".into(),
                },
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (error, status) in cases {
            assert_eq!(error.into_response().status(), status);
        }
    }
}
