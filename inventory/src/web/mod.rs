//! HTTP surface
//!
//! Server-rendered pages plus two read-only JSON endpoints. Routes are
//! grouped by the access level they require; each group carries exactly one
//! guard, so no handler checks roles itself.

mod api;
mod auth;
mod categories;
mod movements;
mod products;
mod reports;
mod users;
mod views;

use askama::Template;
use axum::{
    Router,
    http::{StatusCode, header::SET_COOKIE},
    middleware,
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::auth::session::{session_cookie, session_layer};
use crate::auth::{Access, Flash, Guard, Session, SessionStore, enforce};
use crate::categories::CategoryStore;
use crate::config::Config;
use crate::database::Database;
use crate::error::AppError;
use crate::products::ProductStore;
use crate::stock::StockLedger;
use crate::users::UserStore;

pub const PRODUCTS_PER_PAGE: i64 = 10;
pub const MOVEMENTS_PER_PAGE: i64 = 15;
const DASHBOARD_ITEMS: i64 = 5;

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub products: ProductStore,
    pub categories: CategoryStore,
    pub users: UserStore,
    pub ledger: StockLedger,
    pub sessions: SessionStore,
}

impl AppState {
    pub fn new(db: Database, config: &Config) -> Self {
        Self {
            products: ProductStore::new(db.clone()),
            categories: CategoryStore::new(db.clone()),
            users: UserStore::new(db.clone()),
            ledger: StockLedger::new(db.clone()),
            sessions: SessionStore::new(db.clone(), config.session_ttl_days),
            db,
        }
    }
}

// Template rendering helper
struct HtmlTemplate<T>(T);

impl<T: Template> IntoResponse for HtmlTemplate<T> {
    fn into_response(self) -> Response {
        match self.0.render() {
            Ok(html) => Html(html).into_response(),
            Err(err) => {
                tracing::error!("Template error: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("Template error: {}", err),
                )
                    .into_response()
            }
        }
    }
}

/// What every page's chrome needs: who is signed in, the CSRF token for
/// forms, pending flashes and, for administrators, the low-stock count.
pub struct Layout {
    pub user_name: String,
    pub is_authenticated: bool,
    pub is_admin: bool,
    pub alerts_count: i64,
    pub csrf_token: String,
    pub flashes: Vec<Flash>,
}

impl Layout {
    /// Consumes the session's pending flashes
    pub async fn load(state: &AppState, session: &Session) -> Result<Self, AppError> {
        let flashes = state.sessions.take_flashes(session).await?;
        let is_admin = session.principal.as_ref().is_some_and(|p| p.is_admin());
        let alerts_count = if is_admin { state.products.count_low_stock().await? } else { 0 };

        Ok(Self {
            user_name: session
                .principal
                .as_ref()
                .map(|p| p.name.clone())
                .unwrap_or_default(),
            is_authenticated: session.principal.is_some(),
            is_admin,
            alerts_count,
            csrf_token: session.csrf_token.clone(),
            flashes,
        })
    }
}

/// Redirect that also replaces the session cookie
fn redirect_with_cookie(location: &str, token: &str, max_age_days: Option<i64>) -> Response {
    (
        [(SET_COOKIE, session_cookie(token, max_age_days))],
        Redirect::to(location),
    )
        .into_response()
}

async fn not_found() -> AppError {
    AppError::NotFound("No route".to_string())
}

pub fn routes(state: &AppState) -> Router<AppState> {
    let public = Router::new()
        .route("/", get(reports::index))
        .route("/login", get(auth::login_page).post(auth::login))
        .route("/favicon.ico", get(reports::favicon));

    let authenticated = Router::new()
        .route("/logout", get(auth::logout))
        .route("/dashboard", get(reports::dashboard))
        .route("/produtos", get(products::list))
        .route("/movimentacoes", get(movements::list))
        .route("/movimentacao/nova", get(movements::new_page).post(movements::create))
        .route("/api/alertas", get(api::alerts))
        .route("/api/produto/{id}", get(api::product))
        .route_layer(middleware::from_fn_with_state(
            Guard::new(state.sessions.clone(), Access::Authenticated),
            enforce,
        ));

    let admin = Router::new()
        .route("/register", get(users::register_page).post(users::register))
        .route("/usuarios", get(users::list))
        .route("/usuario/{id}/editar", get(users::edit_page).post(users::edit))
        .route("/usuario/{id}/desativar", post(users::deactivate))
        .route("/produto/novo", get(products::new_page).post(products::create))
        .route("/produto/{id}/editar", get(products::edit_page).post(products::edit))
        .route("/produto/{id}/excluir", post(products::delete))
        .route("/alertas", get(reports::alerts))
        .route("/categorias", get(categories::list).post(categories::create))
        .route_layer(middleware::from_fn_with_state(
            Guard::new(state.sessions.clone(), Access::Admin),
            enforce,
        ));

    Router::new()
        .merge(public)
        .merge(authenticated)
        .merge(admin)
        .fallback(not_found)
}

/// The complete application: routes, sessions and request tracing
pub fn app(state: AppState) -> Router {
    routes(&state)
        .layer(middleware::from_fn_with_state(state.sessions.clone(), session_layer))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
