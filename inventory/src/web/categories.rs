use askama::Template;
use axum::{
    Form,
    extract::State,
    response::{IntoResponse, Redirect, Response},
};

use super::views::CategoryView;
use super::{AppState, HtmlTemplate, Layout};
use crate::auth::{FlashKind, Session};
use crate::database::DatabaseError;
use crate::error::AppError;
use crate::forms::CategoryForm;

#[derive(Template)]
#[template(path = "categories.html")]
struct CategoriesTemplate {
    layout: Layout,
    categories: Vec<CategoryView>,
    form: CategoryForm,
    errors: Vec<String>,
}

async fn render(
    state: &AppState,
    session: &Session,
    form: CategoryForm,
    errors: Vec<String>,
) -> Result<Response, AppError> {
    let categories = state.categories.list_active().await?;

    Ok(HtmlTemplate(CategoriesTemplate {
        layout: Layout::load(state, session).await?,
        categories: categories.into_iter().map(CategoryView::from).collect(),
        form,
        errors,
    })
    .into_response())
}

pub async fn list(State(state): State<AppState>, session: Session) -> Result<Response, AppError> {
    render(&state, &session, CategoryForm::default(), Vec::new()).await
}

pub async fn create(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<CategoryForm>,
) -> Result<Response, AppError> {
    session.verify_csrf(&form.csrf_token)?;

    let (name, description) = match form.validate() {
        Ok(fields) => fields,
        Err(errors) => return render(&state, &session, form, errors).await,
    };

    match state.categories.create(&name, &description).await {
        Ok(_) => {
            state
                .sessions
                .flash(&session, FlashKind::Success, format!("Categoria {} cadastrada com sucesso!", name))
                .await?;
            Ok(Redirect::to("/categorias").into_response())
        }
        Err(DatabaseError::Duplicate(_)) => {
            render(&state, &session, form, vec!["Esta categoria já existe.".to_string()]).await
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to create category");
            state
                .sessions
                .flash(&session, FlashKind::Error, "Erro ao cadastrar categoria. Tente novamente.")
                .await?;
            render(&state, &session, form, Vec::new()).await
        }
    }
}
