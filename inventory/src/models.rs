//! Domain Models
//!
//! Business entities that represent the core domain.
//! These are independent of the database layer; rows are converted on the
//! way out of the stores.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

use crate::database::{CategoryRow, DatabaseError, MovementRow, ProductRow, UserRow};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    #[serde(rename = "comum")]
    Regular,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Regular => "comum",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Role::Admin => "Administrador",
            Role::Regular => "Usuário Comum",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "comum" => Ok(Role::Regular),
            _ => Err(format!("Invalid role: {}", s)),
        }
    }
}

/// Direction of a stock movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    #[serde(rename = "entrada")]
    Entry,
    #[serde(rename = "saida")]
    Exit,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Entry => "entrada",
            Direction::Exit => "saida",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Direction::Entry => "Entrada",
            Direction::Exit => "Saída",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "entrada" => Ok(Direction::Entry),
            "saida" => Ok(Direction::Exit),
            _ => Err(format!("Invalid movement direction: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub active: bool,
    pub created_at: String,
}

impl TryFrom<UserRow> for User {
    type Error = DatabaseError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            name: row.name,
            email: row.email,
            role: row.role.parse().map_err(DatabaseError::InvalidData)?,
            active: row.active,
            created_at: row.created_at,
        })
    }
}

/// The authenticated user behind a session. Passed explicitly to every
/// operation that needs to know who is acting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub role: Role,
}

impl Principal {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

impl From<&User> for Principal {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub active: bool,
    pub created_at: String,
}

impl From<CategoryRow> for Category {
    fn from(row: CategoryRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            description: row.description,
            active: row.active,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Product {
    pub id: i64,
    pub code: String,
    pub name: String,
    pub description: String,
    pub quantity: i64,
    pub min_stock: i64,
    pub price: Decimal,
    pub category_id: Option<i64>,
    pub category_name: Option<String>,
    pub active: bool,
    pub created_at: String,
}

impl Product {
    /// Quantity at or below the configured minimum
    pub fn is_low_stock(&self) -> bool {
        self.quantity <= self.min_stock
    }
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Self {
            id: row.id,
            code: row.code,
            name: row.name,
            description: row.description,
            quantity: row.quantity,
            min_stock: row.min_stock,
            price: price_from_cents(row.price_cents),
            category_id: row.category_id,
            category_name: row.category_name,
            active: row.active,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Movement {
    pub id: i64,
    pub product_id: i64,
    pub product_code: String,
    pub product_name: String,
    pub user_id: i64,
    pub user_name: String,
    pub direction: Direction,
    pub quantity: i64,
    pub note: String,
    pub created_at: String,
}

impl TryFrom<MovementRow> for Movement {
    type Error = DatabaseError;

    fn try_from(row: MovementRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            product_id: row.product_id,
            product_code: row.product_code,
            product_name: row.product_name,
            user_id: row.user_id,
            user_name: row.user_name,
            direction: row.direction.parse().map_err(DatabaseError::InvalidData)?,
            quantity: row.quantity,
            note: row.note,
            created_at: row.created_at,
        })
    }
}

// ============================================================================
// Inputs
// ============================================================================

/// Validated product fields, used for both create and update
#[derive(Debug, Clone)]
pub struct ProductInput {
    pub code: String,
    pub name: String,
    pub description: String,
    pub min_stock: i64,
    pub price: Decimal,
    pub category_id: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
}

#[derive(Debug, Clone)]
pub struct UserChanges {
    pub name: String,
    pub email: String,
    pub role: Role,
    pub password: Option<String>,
}

#[derive(Debug, Clone)]
pub struct MovementRequest {
    pub product_id: i64,
    pub direction: Direction,
    pub quantity: i64,
    pub note: String,
}

#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    pub search: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct MovementFilter {
    pub direction: Option<Direction>,
    pub product_id: Option<i64>,
}

// ============================================================================
// Pagination
// ============================================================================

#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: i64,
    pub per_page: i64,
    pub total: i64,
}

impl<T> Page<T> {
    pub fn pages(&self) -> i64 {
        if self.total == 0 {
            0
        } else {
            (self.total + self.per_page - 1) / self.per_page
        }
    }

    pub fn has_prev(&self) -> bool {
        self.page > 1
    }

    pub fn has_next(&self) -> bool {
        self.page < self.pages()
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            page: self.page,
            per_page: self.per_page,
            total: self.total,
        }
    }
}

/// Row offset of a 1-based page
pub fn page_offset(page: i64, per_page: i64) -> i64 {
    (page.max(1) - 1).saturating_mul(per_page)
}

pub fn price_from_cents(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}

/// Cents for a non-negative price with at most two decimals
pub fn price_to_cents(price: Decimal) -> Option<i64> {
    if price.is_sign_negative() || price.normalize().scale() > 2 {
        return None;
    }
    price.checked_mul(Decimal::ONE_HUNDRED).and_then(|cents| cents.to_i64())
}
