pub mod auth;
pub mod chat;
pub mod chatbot;
pub mod classrooms;
pub mod config;
pub mod db;
pub mod mail;
pub mod signaling;
pub mod socket;
pub mod uploads;

use std::path::Path;

use axum::{extract::FromRef, http::StatusCode, response::{IntoResponse, Response}, Json, Router};
use serde_json::json;
use sqlx::SqlitePool;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

#[derive(Clone, FromRef)]
pub struct AppState {
    pub db_pool: SqlitePool,
    pub keys: auth::Keys,
    pub uploads: uploads::UploadStore,
    pub outboxes: socket::Outboxes,
    pub chat: chat::ChatRelay,
    pub signaling: signaling::SignalingRelay,
    pub mail: mail::Mail,
    pub chatbot: chatbot::Chatbot,
}

impl AppState {
    /// Wires both relays to a fresh outbox registry.
    pub fn new(
        db_pool: SqlitePool,
        keys: auth::Keys,
        uploads: uploads::UploadStore,
        mail: mail::Mail,
        chatbot: chatbot::Chatbot,
    ) -> Self {
        let outboxes = socket::Outboxes::default();
        Self {
            db_pool,
            keys,
            uploads,
            chat: chat::ChatRelay::new(outboxes.clone()),
            signaling: signaling::SignalingRelay::new(outboxes.clone()),
            outboxes,
            mail,
            chatbot,
        }
    }
}

pub fn app(app_state: AppState, public_dir: impl AsRef<Path>) -> Router {
    let upload_dir = app_state.uploads.dir().to_owned();

    let api = Router::new()
        .merge(auth::router())
        .merge(classrooms::router())
        .merge(chat::router())
        .merge(uploads::router())
        .merge(mail::router())
        .merge(chatbot::router());

    Router::new()
        .nest("/api", api)
        .merge(socket::router())
        .nest_service("/uploads", ServeDir::new(upload_dir))
        .fallback_service(ServeDir::new(public_dir.as_ref()))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    PayloadTooLarge(String),
    /// `context` is what the client sees, `cause` only goes to the log.
    #[error("{context}: {cause:#}")]
    Internal {
        context: &'static str,
        cause: anyhow::Error,
    },
}

impl AppError {
    pub fn internal(context: &'static str, cause: impl Into<anyhow::Error>) -> Self {
        Self::Internal { context, cause: cause.into() }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to hand to a client. Internal causes are logged here.
    pub fn public_message(&self) -> String {
        match self {
            AppError::BadRequest(msg)
            | AppError::Unauthorized(msg)
            | AppError::Forbidden(msg)
            | AppError::NotFound(msg)
            | AppError::PayloadTooLarge(msg) => msg.clone(),
            AppError::Internal { context, cause } => {
                tracing::error!("{context}: {cause:?}");
                (*context).to_owned()
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (
            self.status(),
            Json(json!({ "error": self.public_message() })),
        )
            .into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::internal("Internal server error", err)
    }
}

macro_rules! apperr_impl {
    ($E:ty) => {
        impl From<$E> for AppError {
            fn from(err: $E) -> Self {
                Self::internal("Internal server error", err)
            }
        }
    };
}

apperr_impl!(serde_json::Error);
apperr_impl!(sqlx::Error);
apperr_impl!(std::io::Error);
apperr_impl!(axum::Error);
apperr_impl!(reqwest::Error);
apperr_impl!(jsonwebtoken::errors::Error);
apperr_impl!(lettre::transport::smtp::Error);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn internal_errors_hide_their_cause() {
        let err = AppError::internal("Transcoding failed", anyhow::anyhow!("ffmpeg exited with 1"));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.public_message(), "Transcoding failed");
        assert!(err.to_string().contains("ffmpeg exited with 1"));
    }

    #[test]
    fn client_errors_keep_their_message() {
        let err = AppError::NotFound("Classroom not found".into());
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(err.public_message(), "Classroom not found");
    }

    #[test]
    fn oversized_bodies_are_413() {
        let err = AppError::PayloadTooLarge("Request payload is too large".into());
        assert_eq!(err.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(err.public_message(), "Request payload is too large");
    }
}
