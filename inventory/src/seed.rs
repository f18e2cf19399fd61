//! Startup data: the bootstrap administrator and the optional sample catalogue

use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::config::Config;
use crate::database::DatabaseError;
use crate::models::{Direction, MovementRequest, NewUser, Principal, ProductInput, Role};
use crate::stock::StockError;
use crate::web::AppState;

#[derive(Debug, thiserror::Error)]
pub enum SeedError {
    #[error(transparent)]
    Database(#[from] DatabaseError),
    #[error(transparent)]
    Stock(#[from] StockError),
    #[error("No active administrator to author the initial stock")]
    NoAdministrator,
}

const SAMPLE_CATEGORIES: [&str; 5] = ["Eletrônicos", "Escritório", "Limpeza", "Informática", "Móveis"];

/// (code, name, description, minimum stock, price in cents, category)
const SAMPLE_PRODUCTS: [(&str, &str, &str, i64, i64, &str); 8] = [
    ("PROD001", "Notebook Dell", "Notebook Dell Inspiron 15", 5, 250_000, "Informática"),
    ("PROD002", "Mouse Logitech", "Mouse óptico Logitech MX Master", 50, 12_000, "Informática"),
    ("PROD003", "Papel A4", "Papel A4 75g pacote 500 folhas", 100, 2_500, "Escritório"),
    ("PROD004", "Detergente", "Detergente líquido 500ml", 30, 350, "Limpeza"),
    ("PROD005", "Cadeira Executiva", "Cadeira executiva com rodízios", 8, 45_000, "Móveis"),
    ("PROD006", "Smartphone Samsung", "Samsung Galaxy A54", 15, 120_000, "Eletrônicos"),
    ("PROD007", "Impressora HP", "Impressora HP LaserJet Pro", 3, 80_000, "Informática"),
    ("PROD008", "Caneta BIC", "Caneta esferográfica BIC azul", 200, 150, "Escritório"),
];

/// Creates the configured administrator when no active one exists
pub async fn ensure_admin(state: &AppState, config: &Config) -> Result<(), SeedError> {
    if state.users.has_active_admin().await? {
        return Ok(());
    }

    let id = state
        .users
        .create(&NewUser {
            name: config.admin_name.clone(),
            email: config.admin_email.clone(),
            password: config.admin_password.clone(),
            role: Role::Admin,
        })
        .await?;

    warn!(
        user_id = id,
        email = config.admin_email.as_str(),
        "No active administrator found, created the default one; change its password"
    );
    Ok(())
}

/// Loads the sample users, categories and products. Safe to run repeatedly:
/// anything already present is left alone.
pub async fn load_sample_data(state: &AppState) -> Result<(), SeedError> {
    let admin = state
        .users
        .first_active_admin()
        .await?
        .ok_or(SeedError::NoAdministrator)?;
    let actor = Principal::from(&admin);

    let regular = NewUser {
        name: "Usuário Comum".to_string(),
        email: "usuario@estoque.com".to_string(),
        password: "user123".to_string(),
        role: Role::Regular,
    };
    match state.users.create(&regular).await {
        Ok(_) | Err(DatabaseError::Duplicate(_)) => {}
        Err(e) => return Err(e.into()),
    }

    for name in SAMPLE_CATEGORIES {
        if state.categories.find_by_name(name).await?.is_none() {
            state.categories.create(name, "").await?;
        }
    }

    let mut created = 0;
    for (code, name, description, min_stock, price_cents, category) in SAMPLE_PRODUCTS {
        if state.products.find_by_code(code).await?.is_some() {
            continue;
        }

        let category_id = state.categories.find_by_name(category).await?.map(|c| c.id);
        let product_id = state
            .products
            .create(&ProductInput {
                code: code.to_string(),
                name: name.to_string(),
                description: description.to_string(),
                min_stock,
                price: Decimal::new(price_cents, 2),
                category_id,
            })
            .await?;

        state
            .ledger
            .record(
                &actor,
                &MovementRequest {
                    product_id,
                    direction: Direction::Entry,
                    quantity: min_stock * 2,
                    note: "Estoque inicial".to_string(),
                },
            )
            .await?;
        created += 1;
    }

    info!(products = created, "Sample data loaded");
    Ok(())
}
