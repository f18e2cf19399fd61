use askama::Template;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};

use super::views::{MovementView, ProductView};
use super::{AppState, DASHBOARD_ITEMS, HtmlTemplate, Layout};
use crate::auth::Session;
use crate::error::AppError;

pub async fn index(session: Session) -> Redirect {
    if session.principal.is_some() {
        Redirect::to("/dashboard")
    } else {
        Redirect::to("/login")
    }
}

pub async fn favicon() -> StatusCode {
    StatusCode::NO_CONTENT
}

#[derive(Template)]
#[template(path = "dashboard.html")]
struct DashboardTemplate {
    layout: Layout,
    total_products: i64,
    low_stock_count: i64,
    recent_movements: Vec<MovementView>,
    low_stock: Vec<ProductView>,
}

pub async fn dashboard(State(state): State<AppState>, session: Session) -> Result<Response, AppError> {
    let total_products = state.products.count_active().await?;
    let low_stock_count = state.products.count_low_stock().await?;
    let recent_movements = state.ledger.recent(DASHBOARD_ITEMS).await?;
    let low_stock = state.products.low_stock(Some(DASHBOARD_ITEMS)).await?;

    Ok(HtmlTemplate(DashboardTemplate {
        layout: Layout::load(&state, &session).await?,
        total_products,
        low_stock_count,
        recent_movements: recent_movements.into_iter().map(MovementView::from).collect(),
        low_stock: low_stock.into_iter().map(ProductView::from).collect(),
    })
    .into_response())
}

#[derive(Template)]
#[template(path = "alerts.html")]
struct AlertsTemplate {
    layout: Layout,
    products: Vec<ProductView>,
}

pub async fn alerts(State(state): State<AppState>, session: Session) -> Result<Response, AppError> {
    let products = state.products.low_stock(None).await?;

    Ok(HtmlTemplate(AlertsTemplate {
        layout: Layout::load(&state, &session).await?,
        products: products.into_iter().map(ProductView::from).collect(),
    })
    .into_response())
}
