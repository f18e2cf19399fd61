use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use super::AppState;
use crate::database::DatabaseError;
use crate::error::AppError;
use crate::models::Product;

#[derive(Debug, Serialize)]
pub struct AlertItem {
    id: i64,
    codigo: String,
    nome: String,
    quantidade: i64,
    estoque_minimo: i64,
}

#[derive(Debug, Serialize)]
pub struct AlertsResponse {
    total: usize,
    produtos: Vec<AlertItem>,
}

pub async fn alerts(State(state): State<AppState>) -> Result<Json<AlertsResponse>, AppError> {
    let produtos: Vec<AlertItem> = state
        .products
        .low_stock(None)
        .await?
        .into_iter()
        .map(|p| AlertItem {
            id: p.id,
            codigo: p.code,
            nome: p.name,
            quantidade: p.quantity,
            estoque_minimo: p.min_stock,
        })
        .collect();

    Ok(Json(AlertsResponse { total: produtos.len(), produtos }))
}

#[derive(Debug, Serialize)]
pub struct ProductResponse {
    id: i64,
    codigo: String,
    nome: String,
    descricao: String,
    categoria: Option<String>,
    quantidade: i64,
    estoque_minimo: i64,
    #[serde(with = "rust_decimal::serde::float")]
    preco: rust_decimal::Decimal,
    status: &'static str,
    ativo: bool,
}

impl From<Product> for ProductResponse {
    fn from(p: Product) -> Self {
        Self {
            status: if p.is_low_stock() { "baixo" } else { "normal" },
            id: p.id,
            codigo: p.code,
            nome: p.name,
            descricao: p.description,
            categoria: p.category_name,
            quantidade: p.quantity,
            estoque_minimo: p.min_stock,
            preco: p.price,
            ativo: p.active,
        }
    }
}

pub async fn product(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Response, AppError> {
    match state.products.get(id).await {
        Ok(product) => Ok(Json(ProductResponse::from(product)).into_response()),
        Err(DatabaseError::NotFound(_)) => Ok((
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": "Produto não encontrado" })),
        )
            .into_response()),
        Err(e) => Err(e.into()),
    }
}
