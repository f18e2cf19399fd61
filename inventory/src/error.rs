//! Request-level errors
//!
//! Everything a handler can fail with ends up here and is turned into a
//! response: the dedicated 403/404/500 pages, or a redirect to the login
//! page for anonymous visitors. Nothing here is fatal to the server.

use askama::Template;
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};

use crate::database::DatabaseError;
use crate::stock::StockError;

const HOME_URL: &str = "/dashboard";

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Authentication required")]
    Unauthorized,
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<DatabaseError> for AppError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::NotFound(what) => AppError::NotFound(what),
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl From<StockError> for AppError {
    fn from(err: StockError) -> Self {
        match err {
            StockError::ProductNotFound(id) => AppError::NotFound(format!("Product {} not found", id)),
            StockError::Database(err) => err.into(),
            other => AppError::Internal(other.to_string()),
        }
    }
}

#[derive(Template)]
#[template(path = "errors/403.html")]
struct ForbiddenTemplate {
    home_url: &'static str,
}

#[derive(Template)]
#[template(path = "errors/404.html")]
struct NotFoundTemplate {
    home_url: &'static str,
}

#[derive(Template)]
#[template(path = "errors/500.html")]
struct InternalErrorTemplate {
    home_url: &'static str,
}

fn error_page(status: StatusCode, rendered: askama::Result<String>) -> Response {
    match rendered {
        Ok(html) => (status, Html(html)).into_response(),
        Err(err) => {
            tracing::error!("Template error: {}", err);
            (status, status.canonical_reason().unwrap_or("Error")).into_response()
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::NotFound(what) => {
                tracing::debug!(%what, "Resource not found");
                error_page(StatusCode::NOT_FOUND, NotFoundTemplate { home_url: HOME_URL }.render())
            }
            AppError::Forbidden(reason) => {
                tracing::warn!(%reason, "Request forbidden");
                error_page(StatusCode::FORBIDDEN, ForbiddenTemplate { home_url: HOME_URL }.render())
            }
            AppError::Unauthorized => Redirect::to("/login").into_response(),
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "Request failed");
                error_page(StatusCode::INTERNAL_SERVER_ERROR, InternalErrorTemplate { home_url: HOME_URL }.render())
            }
        }
    }
}
