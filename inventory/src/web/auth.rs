use askama::Template;
use axum::{
    Form,
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;

use super::{AppState, HtmlTemplate, Layout, redirect_with_cookie};
use crate::auth::{FlashKind, Session, safe_next};
use crate::error::AppError;
use crate::forms::LoginForm;

#[derive(Debug, Default, Deserialize)]
pub struct NextQuery {
    next: Option<String>,
}

impl NextQuery {
    fn target(&self) -> &str {
        self.next.as_deref().and_then(safe_next).unwrap_or("/dashboard")
    }

    /// Form action that carries the redirect target through the POST
    fn action(&self) -> String {
        match self.next.as_deref().and_then(safe_next) {
            Some(next) => match serde_urlencoded::to_string(&[("next", next)]) {
                Ok(query) => format!("/login?{}", query),
                Err(_) => "/login".to_string(),
            },
            None => "/login".to_string(),
        }
    }
}

#[derive(Template)]
#[template(path = "login.html")]
struct LoginTemplate {
    layout: Layout,
    action: String,
    email: String,
    remember: bool,
    errors: Vec<String>,
}

async fn render(
    state: &AppState,
    session: &Session,
    query: &NextQuery,
    form: &LoginForm,
    errors: Vec<String>,
) -> Result<Response, AppError> {
    Ok(HtmlTemplate(LoginTemplate {
        layout: Layout::load(state, session).await?,
        action: query.action(),
        email: form.email.clone(),
        remember: form.remember.is_some(),
        errors,
    })
    .into_response())
}

pub async fn login_page(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<NextQuery>,
) -> Result<Response, AppError> {
    if session.principal.is_some() {
        return Ok(Redirect::to("/dashboard").into_response());
    }
    render(&state, &session, &query, &LoginForm::default(), Vec::new()).await
}

pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<NextQuery>,
    Form(form): Form<LoginForm>,
) -> Result<Response, AppError> {
    session.verify_csrf(&form.csrf_token)?;

    if session.principal.is_some() {
        return Ok(Redirect::to("/dashboard").into_response());
    }

    let credentials = match form.validate() {
        Ok(credentials) => credentials,
        Err(errors) => return render(&state, &session, &query, &form, errors).await,
    };

    let Some(user) = state.users.authenticate(&credentials.email, &credentials.password).await? else {
        state
            .sessions
            .flash(&session, FlashKind::Error, "Email ou senha inválidos.")
            .await?;
        return render(&state, &session, &query, &form, Vec::new()).await;
    };

    let session = state.sessions.login(&session, &user, credentials.remember).await?;
    state
        .sessions
        .flash(&session, FlashKind::Success, format!("Bem-vindo, {}!", user.name))
        .await?;

    let max_age = credentials.remember.then(|| state.sessions.remember_days());
    Ok(redirect_with_cookie(query.target(), &session.token, max_age))
}

pub async fn logout(State(state): State<AppState>, session: Session) -> Result<Response, AppError> {
    let session = state.sessions.logout(&session).await?;
    state
        .sessions
        .flash(&session, FlashKind::Info, "Você foi desconectado do sistema.")
        .await?;

    Ok(redirect_with_cookie("/login", &session.token, None))
}
