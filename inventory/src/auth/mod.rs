//! Authentication and Authorization
//!
//! - `password`: Argon2id hashing and verification
//! - `session`: cookie-bound server-side sessions, CSRF tokens, flashes
//!
//! Authorization is declared per route group: each group of routes carries a
//! single [`Guard`] with the access level it requires, evaluated once per
//! request before the handler runs. Handlers that act on behalf of someone
//! take the [`CurrentUser`] extractor and pass the principal along explicitly.

pub mod password;
pub mod session;

use axum::{
    Json,
    extract::{FromRequestParts, Request, State},
    http::{StatusCode, request::Parts},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};

pub use session::{Flash, FlashKind, Session, SessionStore};

use crate::error::AppError;
use crate::models::Principal;

pub const LOGIN_REQUIRED_MESSAGE: &str = "Por favor, faça login para acessar esta página.";
pub const ADMIN_REQUIRED_MESSAGE: &str =
    "Acesso negado. Apenas administradores podem acessar esta funcionalidade.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Authenticated,
    Admin,
}

#[derive(Clone)]
pub struct Guard {
    sessions: SessionStore,
    access: Access,
}

impl Guard {
    pub fn new(sessions: SessionStore, access: Access) -> Self {
        Self { sessions, access }
    }
}

/// The principal of the current request. Rejects with a redirect to the
/// login page when nobody is signed in.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Principal);

impl<S: Send + Sync> FromRequestParts<S> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Session>()
            .and_then(|session| session.principal.clone())
            .map(CurrentUser)
            .ok_or(AppError::Unauthorized)
    }
}

/// Only local absolute paths are followed after login
pub fn safe_next(next: &str) -> Option<&str> {
    let local = next.starts_with('/') && !next.starts_with("//") && !next.starts_with("/\\");
    local.then_some(next)
}

fn login_redirect(path_and_query: &str) -> Response {
    match serde_urlencoded::to_string(&[("next", path_and_query)]) {
        Ok(query) => Redirect::to(&format!("/login?{}", query)).into_response(),
        Err(_) => Redirect::to("/login").into_response(),
    }
}

/// Route-group middleware enforcing the group's declared access level
pub async fn enforce(State(guard): State<Guard>, request: Request, next: Next) -> Response {
    let Some(session) = request.extensions().get::<Session>().cloned() else {
        return AppError::Internal("session layer is not installed".to_string()).into_response();
    };

    let path_and_query = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| "/".to_string());

    match (&session.principal, guard.access) {
        (None, _) if path_and_query.starts_with("/api/") => (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({ "error": "authentication required" })),
        )
            .into_response(),
        (None, _) => {
            if let Err(e) = guard
                .sessions
                .flash(&session, FlashKind::Info, LOGIN_REQUIRED_MESSAGE)
                .await
            {
                return AppError::from(e).into_response();
            }
            login_redirect(&path_and_query)
        }
        (Some(principal), Access::Admin) if !principal.is_admin() => {
            tracing::warn!(user_id = principal.id, path = %path_and_query, "Admin route denied");
            if let Err(e) = guard
                .sessions
                .flash(&session, FlashKind::Error, ADMIN_REQUIRED_MESSAGE)
                .await
            {
                return AppError::from(e).into_response();
            }
            Redirect::to("/dashboard").into_response()
        }
        _ => next.run(request).await,
    }
}
