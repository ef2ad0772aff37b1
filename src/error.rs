//! Handler-boundary error: anything a handler cannot recover from locally.

use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;

use crate::{auth::AuthError, service::ServiceError, views};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("service error: {0}")]
    Service(#[from] ServiceError),

    #[error("authentication error: {0}")]
    Auth(#[from] AuthError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // The cause stays in the logs; the client only sees a generic page.
        tracing::error!("request failed: {}", self);
        (StatusCode::INTERNAL_SERVER_ERROR, Html(views::server_error())).into_response()
    }
}
