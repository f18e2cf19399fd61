//! Server-side sessions
//!
//! Each browser holds one opaque random token in a cookie; everything else
//! (bound user, CSRF token, pending flash messages) stays in SQLite.
//! Tokens are rotated on login and logout.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{
        HeaderMap, HeaderValue,
        header::{COOKIE, SET_COOKIE},
        request::Parts,
    },
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::database::{Database, DatabaseError, FlashRow, Result, SessionRow};
use crate::error::AppError;
use crate::models::{Principal, User};

pub const SESSION_COOKIE: &str = "estoque_session";

/// Lifetime of sessions that were not "remembered"
const SHORT_SESSION_DAYS: i64 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FlashKind {
    Success,
    Error,
    Info,
}

impl FlashKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlashKind::Success => "success",
            FlashKind::Error => "error",
            FlashKind::Info => "info",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flash {
    pub kind: String,
    pub message: String,
}

impl From<FlashRow> for Flash {
    fn from(row: FlashRow) -> Self {
        Self {
            kind: row.kind,
            message: row.message,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub csrf_token: String,
    pub principal: Option<Principal>,
}

impl Session {
    pub fn verify_csrf(&self, submitted: &str) -> std::result::Result<(), AppError> {
        if !submitted.is_empty() && submitted == self.csrf_token {
            Ok(())
        } else {
            Err(AppError::Forbidden("CSRF token missing or invalid".to_string()))
        }
    }
}

impl TryFrom<SessionRow> for Session {
    type Error = DatabaseError;

    fn try_from(row: SessionRow) -> std::result::Result<Self, Self::Error> {
        let principal = match (row.user_id, row.user_name, row.user_email, row.user_role) {
            (Some(id), Some(name), Some(email), Some(role)) => Some(Principal {
                id,
                name,
                email,
                role: role.parse().map_err(DatabaseError::InvalidData)?,
            }),
            _ => None,
        };

        Ok(Self {
            token: row.token,
            csrf_token: row.csrf_token,
            principal,
        })
    }
}

impl<S: Send + Sync> FromRequestParts<S> for Session {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> std::result::Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Session>()
            .cloned()
            .ok_or_else(|| AppError::Internal("session layer is not installed".to_string()))
    }
}

fn new_token() -> String {
    Uuid::new_v4().simple().to_string()
}

#[derive(Clone)]
pub struct SessionStore {
    db: Database,
    remember_days: i64,
}

impl SessionStore {
    pub fn new(db: Database, remember_days: i64) -> Self {
        Self { db, remember_days }
    }

    pub fn remember_days(&self) -> i64 {
        self.remember_days
    }

    /// Valid, unexpired session; the principal is dropped if the user was deactivated
    pub async fn load(&self, token: &str) -> Result<Option<Session>> {
        let row = sqlx::query_as::<_, SessionRow>(
            r#"
            SELECT s.token, s.csrf_token,
                   u.id AS user_id, u.name AS user_name,
                   u.email AS user_email, u.role AS user_role
            FROM sessions s
            LEFT JOIN users u ON u.id = s.user_id AND u.active = 1
            WHERE s.token = ? AND s.expires_at > CURRENT_TIMESTAMP
            "#,
        )
        .bind(token)
        .fetch_optional(self.db.pool())
        .await?;

        row.map(Session::try_from).transpose()
    }

    /// Anonymous session for a new visitor. Expired sessions are swept
    /// first, so cookieless traffic does not grow the table.
    pub async fn create(&self) -> Result<Session> {
        self.prune_expired().await?;

        let session = Session {
            token: new_token(),
            csrf_token: new_token(),
            principal: None,
        };

        sqlx::query(
            "INSERT INTO sessions (token, csrf_token, expires_at) VALUES (?, ?, datetime('now', ?))",
        )
        .bind(&session.token)
        .bind(&session.csrf_token)
        .bind(format!("+{} days", SHORT_SESSION_DAYS))
        .execute(self.db.pool())
        .await?;

        debug!("Created anonymous session");
        Ok(session)
    }

    /// Binds `user` to the session under a fresh token
    pub async fn login(&self, session: &Session, user: &User, remember: bool) -> Result<Session> {
        let days = if remember { self.remember_days } else { SHORT_SESSION_DAYS };
        let rotated = Session {
            token: new_token(),
            csrf_token: new_token(),
            principal: Some(Principal::from(user)),
        };

        let result = sqlx::query(
            r#"
            UPDATE sessions
            SET token = ?, csrf_token = ?, user_id = ?, expires_at = datetime('now', ?)
            WHERE token = ?
            "#,
        )
        .bind(&rotated.token)
        .bind(&rotated.csrf_token)
        .bind(user.id)
        .bind(format!("+{} days", days))
        .bind(&session.token)
        .execute(self.db.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound("Session expired".to_string()));
        }

        self.prune_expired().await?;

        info!(user_id = user.id, remember, "User logged in");
        Ok(rotated)
    }

    /// Unbinds the user, keeping pending flashes on the rotated token
    pub async fn logout(&self, session: &Session) -> Result<Session> {
        let rotated = Session {
            token: new_token(),
            csrf_token: new_token(),
            principal: None,
        };

        sqlx::query(
            r#"
            UPDATE sessions
            SET token = ?, csrf_token = ?, user_id = NULL, expires_at = datetime('now', ?)
            WHERE token = ?
            "#,
        )
        .bind(&rotated.token)
        .bind(&rotated.csrf_token)
        .bind(format!("+{} days", SHORT_SESSION_DAYS))
        .bind(&session.token)
        .execute(self.db.pool())
        .await?;

        if let Some(principal) = &session.principal {
            info!(user_id = principal.id, "User logged out");
        }
        Ok(rotated)
    }

    pub async fn flash(&self, session: &Session, kind: FlashKind, message: impl Into<String>) -> Result<()> {
        sqlx::query("INSERT INTO flashes (session_token, kind, message) VALUES (?, ?, ?)")
            .bind(&session.token)
            .bind(kind.as_str())
            .bind(message.into())
            .execute(self.db.pool())
            .await?;

        Ok(())
    }

    /// Pending flashes in the order they were queued; they are gone afterwards
    pub async fn take_flashes(&self, session: &Session) -> Result<Vec<Flash>> {
        let mut tx = self.db.begin().await?;

        let rows = sqlx::query_as::<_, FlashRow>(
            "SELECT kind, message FROM flashes WHERE session_token = ? ORDER BY id",
        )
        .bind(&session.token)
        .fetch_all(&mut *tx)
        .await?;

        if !rows.is_empty() {
            sqlx::query("DELETE FROM flashes WHERE session_token = ?")
                .bind(&session.token)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(rows.into_iter().map(Flash::from).collect())
    }

    async fn prune_expired(&self) -> Result<()> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= CURRENT_TIMESTAMP")
            .execute(self.db.pool())
            .await?;

        if result.rows_affected() > 0 {
            debug!(pruned = result.rows_affected(), "Pruned expired sessions");
        }
        Ok(())
    }
}

// ============================================================================
// Cookies
// ============================================================================

/// `Set-Cookie` value; without `max_age_days` the cookie dies with the browser
pub fn session_cookie(token: &str, max_age_days: Option<i64>) -> String {
    let mut cookie = format!("{}={}; Path=/; HttpOnly; SameSite=Lax", SESSION_COOKIE, token);
    if let Some(days) = max_age_days {
        cookie.push_str(&format!("; Max-Age={}", days * 24 * 60 * 60));
    }
    cookie
}

pub fn token_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, token)| token.to_string())
}

/// Loads or creates the visitor's session and exposes it to handlers as a
/// request extension.
pub async fn session_layer(State(sessions): State<SessionStore>, mut request: Request, next: Next) -> Response {
    let loaded = match token_from_headers(request.headers()) {
        Some(token) => sessions.load(&token).await,
        None => Ok(None),
    };

    let (session, is_new) = match loaded {
        Ok(Some(session)) => (session, false),
        Ok(None) => match sessions.create().await {
            Ok(session) => (session, true),
            Err(e) => return AppError::from(e).into_response(),
        },
        Err(e) => return AppError::from(e).into_response(),
    };

    let token = session.token.clone();
    request.extensions_mut().insert(session);

    let mut response = next.run(request).await;

    // Handlers that rotate the token set their own cookie
    if is_new && !response.headers().contains_key(SET_COOKIE) {
        if let Ok(value) = HeaderValue::from_str(&session_cookie(&token, None)) {
            response.headers_mut().append(SET_COOKIE, value);
        }
    }

    response
}
