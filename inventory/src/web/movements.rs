use askama::Template;
use axum::{
    Form,
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;

use super::views::{MovementView, Pager, SelectOption, direction_options, parse_page, product_options};
use super::{AppState, HtmlTemplate, Layout, MOVEMENTS_PER_PAGE};
use crate::auth::{CurrentUser, FlashKind, Session};
use crate::error::AppError;
use crate::forms::MovementForm;
use crate::models::{Direction, MovementFilter};
use crate::stock::StockError;

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    page: Option<String>,
    #[serde(rename = "tipo")]
    direction: Option<String>,
    #[serde(rename = "produto")]
    product: Option<String>,
}

#[derive(Template)]
#[template(path = "movements/list.html")]
struct MovementListTemplate {
    layout: Layout,
    movements: Vec<MovementView>,
    pager: Pager,
    directions: Vec<SelectOption>,
    products: Vec<SelectOption>,
}

pub async fn list(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<ListQuery>,
) -> Result<Response, AppError> {
    let direction = query.direction.unwrap_or_default();
    let product = query.product.unwrap_or_default();
    let filter = MovementFilter {
        direction: direction.parse::<Direction>().ok(),
        product_id: product.parse::<i64>().ok(),
    };

    let page = state
        .ledger
        .list(&filter, parse_page(query.page.as_deref()), MOVEMENTS_PER_PAGE)
        .await?;
    let pager = Pager::new(
        &page,
        "/movimentacoes",
        &[("tipo", direction.as_str()), ("produto", product.as_str())],
    );
    let products = state.products.list_active().await?;

    Ok(HtmlTemplate(MovementListTemplate {
        layout: Layout::load(&state, &session).await?,
        movements: page.items.into_iter().map(MovementView::from).collect(),
        pager,
        directions: direction_options(&direction),
        products: product_options(&products, &product),
    })
    .into_response())
}

#[derive(Debug, Default, Deserialize)]
pub struct NewQuery {
    #[serde(rename = "produto")]
    product: Option<String>,
}

#[derive(Template)]
#[template(path = "movements/form.html")]
struct MovementFormTemplate {
    layout: Layout,
    form: MovementForm,
    products: Vec<SelectOption>,
    directions: Vec<SelectOption>,
    errors: Vec<String>,
}

async fn render_form(
    state: &AppState,
    session: &Session,
    form: MovementForm,
    errors: Vec<String>,
) -> Result<Response, AppError> {
    let products = state.products.list_active().await?;
    Ok(HtmlTemplate(MovementFormTemplate {
        layout: Layout::load(state, session).await?,
        products: product_options(&products, &form.product_id),
        directions: direction_options(&form.direction),
        form,
        errors,
    })
    .into_response())
}

pub async fn new_page(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<NewQuery>,
) -> Result<Response, AppError> {
    let form = MovementForm {
        product_id: query.product.unwrap_or_default(),
        direction: Direction::Entry.as_str().to_string(),
        quantity: "1".to_string(),
        ..Default::default()
    };
    render_form(&state, &session, form, Vec::new()).await
}

pub async fn create(
    State(state): State<AppState>,
    session: Session,
    CurrentUser(actor): CurrentUser,
    Form(form): Form<MovementForm>,
) -> Result<Response, AppError> {
    session.verify_csrf(&form.csrf_token)?;

    let request = match form.validate() {
        Ok(request) => request,
        Err(errors) => return render_form(&state, &session, form, errors).await,
    };

    match state.ledger.record(&actor, &request).await {
        Ok(movement) => {
            state
                .sessions
                .flash(
                    &session,
                    FlashKind::Success,
                    format!(
                        "Movimentação de {} registrada com sucesso!",
                        movement.direction.label().to_lowercase()
                    ),
                )
                .await?;
            Ok(Redirect::to("/movimentacoes").into_response())
        }
        Err(StockError::InsufficientStock { available, .. }) => {
            state
                .sessions
                .flash(
                    &session,
                    FlashKind::Error,
                    format!("Quantidade insuficiente em estoque. Disponível: {}", available),
                )
                .await?;
            render_form(&state, &session, form, Vec::new()).await
        }
        Err(StockError::ProductNotFound(_)) | Err(StockError::ProductInactive(_)) => {
            render_form(&state, &session, form, vec!["Produto inválido".to_string()]).await
        }
        Err(StockError::InvalidQuantity(_)) => {
            render_form(&state, &session, form, vec!["Quantidade deve ser maior que zero".to_string()]).await
        }
        Err(StockError::Database(e)) => {
            tracing::error!(error = %e, user_id = actor.id, "Failed to record movement");
            state
                .sessions
                .flash(&session, FlashKind::Error, "Erro ao registrar movimentação. Tente novamente.")
                .await?;
            render_form(&state, &session, form, Vec::new()).await
        }
    }
}
