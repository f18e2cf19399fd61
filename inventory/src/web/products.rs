use askama::Template;
use axum::{
    Form,
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;

use super::views::{Pager, ProductView, SelectOption, category_name_options, category_options, parse_page};
use super::{AppState, HtmlTemplate, Layout, PRODUCTS_PER_PAGE};
use crate::auth::{FlashKind, Session};
use crate::database::DatabaseError;
use crate::error::AppError;
use crate::forms::{CsrfForm, ProductForm};
use crate::models::{Product, ProductFilter, ProductInput};

const DUPLICATE_CODE: &str = "Este código já está em uso por outro produto.";

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    page: Option<String>,
    #[serde(rename = "busca")]
    search: Option<String>,
    #[serde(rename = "categoria")]
    category: Option<String>,
}

#[derive(Template)]
#[template(path = "products/list.html")]
struct ProductListTemplate {
    layout: Layout,
    products: Vec<ProductView>,
    pager: Pager,
    search: String,
    categories: Vec<SelectOption>,
}

pub async fn list(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<ListQuery>,
) -> Result<Response, AppError> {
    let search = query.search.unwrap_or_default().trim().to_string();
    let category = query.category.unwrap_or_default();
    let filter = ProductFilter {
        search: Some(search.clone()),
        category: Some(category.clone()),
    };

    let page = state
        .products
        .list(&filter, parse_page(query.page.as_deref()), PRODUCTS_PER_PAGE)
        .await?;
    let pager = Pager::new(&page, "/produtos", &[("busca", search.as_str()), ("categoria", category.as_str())]);
    let categories = state.categories.list_active().await?;

    Ok(HtmlTemplate(ProductListTemplate {
        layout: Layout::load(&state, &session).await?,
        products: page.items.into_iter().map(ProductView::from).collect(),
        pager,
        categories: category_name_options(&categories, &category),
        search,
    })
    .into_response())
}

#[derive(Template)]
#[template(path = "products/form.html")]
struct ProductFormTemplate {
    layout: Layout,
    title: &'static str,
    action: String,
    form: ProductForm,
    categories: Vec<SelectOption>,
    errors: Vec<String>,
}

async fn render_form(
    state: &AppState,
    session: &Session,
    title: &'static str,
    action: String,
    form: ProductForm,
    errors: Vec<String>,
) -> Result<Response, AppError> {
    let categories = state.categories.list_active().await?;
    Ok(HtmlTemplate(ProductFormTemplate {
        layout: Layout::load(state, session).await?,
        title,
        action,
        categories: category_options(&categories, &form.category_id),
        form,
        errors,
    })
    .into_response())
}

fn form_from_product(product: &Product) -> ProductForm {
    ProductForm {
        code: product.code.clone(),
        name: product.name.clone(),
        description: product.description.clone(),
        min_stock: product.min_stock.to_string(),
        price: product.price.to_string(),
        category_id: product.category_id.map(|id| id.to_string()).unwrap_or_default(),
        csrf_token: String::new(),
    }
}

/// Form validation plus the checks that need the database
async fn validate(state: &AppState, form: &ProductForm) -> Result<Result<ProductInput, Vec<String>>, AppError> {
    let input = match form.validate() {
        Ok(input) => input,
        Err(errors) => return Ok(Err(errors)),
    };

    if let Some(category_id) = input.category_id {
        if !state.categories.is_active(category_id).await? {
            return Ok(Err(vec!["Categoria inválida".to_string()]));
        }
    }

    Ok(Ok(input))
}

pub async fn new_page(State(state): State<AppState>, session: Session) -> Result<Response, AppError> {
    render_form(
        &state,
        &session,
        "Novo Produto",
        "/produto/novo".to_string(),
        ProductForm::default(),
        Vec::new(),
    )
    .await
}

pub async fn create(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<ProductForm>,
) -> Result<Response, AppError> {
    session.verify_csrf(&form.csrf_token)?;
    let title = "Novo Produto";
    let action = "/produto/novo".to_string();

    let input = match validate(&state, &form).await? {
        Ok(input) => input,
        Err(errors) => return render_form(&state, &session, title, action, form, errors).await,
    };

    match state.products.create(&input).await {
        Ok(_) => {
            state
                .sessions
                .flash(&session, FlashKind::Success, format!("Produto {} cadastrado com sucesso!", input.name))
                .await?;
            Ok(Redirect::to("/produtos").into_response())
        }
        Err(DatabaseError::Duplicate(_)) => {
            render_form(&state, &session, title, action, form, vec![DUPLICATE_CODE.to_string()]).await
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to create product");
            state
                .sessions
                .flash(&session, FlashKind::Error, "Erro ao cadastrar produto. Tente novamente.")
                .await?;
            render_form(&state, &session, title, action, form, Vec::new()).await
        }
    }
}

pub async fn edit_page(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    let product = state.products.get(id).await?;
    render_form(
        &state,
        &session,
        "Editar Produto",
        format!("/produto/{}/editar", id),
        form_from_product(&product),
        Vec::new(),
    )
    .await
}

pub async fn edit(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<i64>,
    Form(form): Form<ProductForm>,
) -> Result<Response, AppError> {
    session.verify_csrf(&form.csrf_token)?;
    state.products.get(id).await?;
    let title = "Editar Produto";
    let action = format!("/produto/{}/editar", id);

    let input = match validate(&state, &form).await? {
        Ok(input) => input,
        Err(errors) => return render_form(&state, &session, title, action, form, errors).await,
    };

    match state.products.update(id, &input).await {
        Ok(()) => {
            state
                .sessions
                .flash(&session, FlashKind::Success, format!("Produto {} atualizado com sucesso!", input.name))
                .await?;
            Ok(Redirect::to("/produtos").into_response())
        }
        Err(DatabaseError::Duplicate(_)) => {
            render_form(&state, &session, title, action, form, vec![DUPLICATE_CODE.to_string()]).await
        }
        Err(DatabaseError::NotFound(what)) => Err(AppError::NotFound(what)),
        Err(e) => {
            tracing::error!(product_id = id, error = %e, "Failed to update product");
            state
                .sessions
                .flash(&session, FlashKind::Error, "Erro ao atualizar produto. Tente novamente.")
                .await?;
            render_form(&state, &session, title, action, form, Vec::new()).await
        }
    }
}

pub async fn delete(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<i64>,
    Form(form): Form<CsrfForm>,
) -> Result<Response, AppError> {
    session.verify_csrf(&form.csrf_token)?;

    match state.products.deactivate(id).await {
        Ok(product) => {
            state
                .sessions
                .flash(&session, FlashKind::Success, format!("Produto {} excluído com sucesso!", product.name))
                .await?;
        }
        Err(DatabaseError::NotFound(what)) => return Err(AppError::NotFound(what)),
        Err(e) => {
            tracing::error!(product_id = id, error = %e, "Failed to deactivate product");
            state
                .sessions
                .flash(&session, FlashKind::Error, "Erro ao excluir produto. Tente novamente.")
                .await?;
        }
    }

    Ok(Redirect::to("/produtos").into_response())
}
