use askama::Template;
use axum::{
    Form,
    extract::{Path, State},
    response::{IntoResponse, Redirect, Response},
};

use super::views::{SelectOption, UserView, role_options};
use super::{AppState, HtmlTemplate, Layout};
use crate::auth::{CurrentUser, FlashKind, Session};
use crate::database::DatabaseError;
use crate::error::AppError;
use crate::forms::{CsrfForm, RegisterForm, UserEditForm};

const DUPLICATE_EMAIL: &str = "Este email já está cadastrado no sistema.";
const OWN_ROLE: &str = "Você não pode alterar o seu próprio perfil de acesso.";

#[derive(Template)]
#[template(path = "users.html")]
struct UserListTemplate {
    layout: Layout,
    users: Vec<UserView>,
}

pub async fn list(
    State(state): State<AppState>,
    session: Session,
    CurrentUser(viewer): CurrentUser,
) -> Result<Response, AppError> {
    let users = state.users.list_active().await?;

    Ok(HtmlTemplate(UserListTemplate {
        layout: Layout::load(&state, &session).await?,
        users: users.into_iter().map(|u| UserView::new(u, viewer.id)).collect(),
    })
    .into_response())
}

#[derive(Template)]
#[template(path = "register.html")]
struct RegisterTemplate {
    layout: Layout,
    form: RegisterForm,
    roles: Vec<SelectOption>,
    errors: Vec<String>,
}

async fn render_register(
    state: &AppState,
    session: &Session,
    form: RegisterForm,
    errors: Vec<String>,
) -> Result<Response, AppError> {
    Ok(HtmlTemplate(RegisterTemplate {
        layout: Layout::load(state, session).await?,
        roles: role_options(&form.role),
        form,
        errors,
    })
    .into_response())
}

pub async fn register_page(State(state): State<AppState>, session: Session) -> Result<Response, AppError> {
    render_register(&state, &session, RegisterForm::default(), Vec::new()).await
}

pub async fn register(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<RegisterForm>,
) -> Result<Response, AppError> {
    session.verify_csrf(&form.csrf_token)?;

    let new_user = match form.validate() {
        Ok(new_user) => new_user,
        Err(errors) => return render_register(&state, &session, form, errors).await,
    };

    match state.users.create(&new_user).await {
        Ok(_) => {
            state
                .sessions
                .flash(&session, FlashKind::Success, format!("Usuário {} cadastrado com sucesso!", new_user.name))
                .await?;
            Ok(Redirect::to("/usuarios").into_response())
        }
        Err(DatabaseError::Duplicate(_)) => {
            render_register(&state, &session, form, vec![DUPLICATE_EMAIL.to_string()]).await
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to create user");
            state
                .sessions
                .flash(&session, FlashKind::Error, "Erro ao cadastrar usuário. Tente novamente.")
                .await?;
            render_register(&state, &session, form, Vec::new()).await
        }
    }
}

#[derive(Template)]
#[template(path = "user_form.html")]
struct UserEditTemplate {
    layout: Layout,
    user_id: i64,
    form: UserEditForm,
    roles: Vec<SelectOption>,
    errors: Vec<String>,
}

async fn render_edit(
    state: &AppState,
    session: &Session,
    user_id: i64,
    form: UserEditForm,
    errors: Vec<String>,
) -> Result<Response, AppError> {
    Ok(HtmlTemplate(UserEditTemplate {
        layout: Layout::load(state, session).await?,
        user_id,
        roles: role_options(&form.role),
        form,
        errors,
    })
    .into_response())
}

pub async fn edit_page(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    let user = state.users.get(id).await?;
    let form = UserEditForm {
        name: user.name,
        email: user.email,
        role: user.role.as_str().to_string(),
        ..Default::default()
    };
    render_edit(&state, &session, id, form, Vec::new()).await
}

pub async fn edit(
    State(state): State<AppState>,
    session: Session,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<i64>,
    Form(form): Form<UserEditForm>,
) -> Result<Response, AppError> {
    session.verify_csrf(&form.csrf_token)?;
    state.users.get(id).await?;

    let changes = match form.validate() {
        Ok(changes) => changes,
        Err(errors) => return render_edit(&state, &session, id, form, errors).await,
    };

    if id == actor.id && changes.role != actor.role {
        let errors = vec![OWN_ROLE.to_string()];
        return render_edit(&state, &session, id, form, errors).await;
    }

    match state.users.update(id, &changes).await {
        Ok(user) => {
            state
                .sessions
                .flash(&session, FlashKind::Success, format!("Usuário {} atualizado com sucesso!", user.name))
                .await?;
            Ok(Redirect::to("/usuarios").into_response())
        }
        Err(DatabaseError::Duplicate(_)) => {
            render_edit(&state, &session, id, form, vec![DUPLICATE_EMAIL.to_string()]).await
        }
        Err(DatabaseError::NotFound(what)) => Err(AppError::NotFound(what)),
        Err(e) => {
            tracing::error!(user_id = id, error = %e, "Failed to update user");
            state
                .sessions
                .flash(&session, FlashKind::Error, "Erro ao atualizar usuário. Tente novamente.")
                .await?;
            render_edit(&state, &session, id, form, Vec::new()).await
        }
    }
}

pub async fn deactivate(
    State(state): State<AppState>,
    session: Session,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<i64>,
    Form(form): Form<CsrfForm>,
) -> Result<Response, AppError> {
    session.verify_csrf(&form.csrf_token)?;

    if id == actor.id {
        state
            .sessions
            .flash(&session, FlashKind::Error, "Você não pode desativar sua própria conta.")
            .await?;
        return Ok(Redirect::to("/usuarios").into_response());
    }

    match state.users.deactivate(id).await {
        Ok(user) => {
            state
                .sessions
                .flash(&session, FlashKind::Success, format!("Usuário {} desativado com sucesso!", user.name))
                .await?;
        }
        Err(DatabaseError::NotFound(what)) => return Err(AppError::NotFound(what)),
        Err(e) => {
            tracing::error!(user_id = id, error = %e, "Failed to deactivate user");
            state
                .sessions
                .flash(&session, FlashKind::Error, "Erro ao desativar usuário. Tente novamente.")
                .await?;
        }
    }

    Ok(Redirect::to("/usuarios").into_response())
}
