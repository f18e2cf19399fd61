//! Stock Ledger
//!
//! The only code path that changes `products.quantity`. Every change is a
//! conditional update plus one appended movement, committed in a single
//! transaction: either both persist or neither does.
//!
//! Exits use `quantity = quantity - n WHERE quantity >= n`, so two
//! concurrent exits can never both pass the sufficiency check against the
//! same stale quantity. SQLite serializes the writers; the loser finds no
//! matching row and is rejected.

use sqlx::{QueryBuilder, Sqlite, SqliteConnection};
use tracing::{info, warn};

use crate::database::{Database, DatabaseError, MovementRow};
use crate::models::{Direction, Movement, MovementFilter, MovementRequest, Page, Principal, page_offset};

/// Largest quantity accepted in a single movement
pub const MAX_MOVEMENT_QUANTITY: i64 = 1_000_000_000;

const MOVEMENT_SELECT: &str = r#"
    SELECT m.id, m.product_id, p.code AS product_code, p.name AS product_name,
           m.user_id, u.name AS user_name, m.direction, m.quantity, m.note, m.created_at
    FROM movements m
    JOIN products p ON p.id = m.product_id
    JOIN users u ON u.id = m.user_id
"#;

#[derive(Debug, thiserror::Error)]
pub enum StockError {
    #[error("Product {0} not found")]
    ProductNotFound(i64),
    #[error("Product {0} is inactive")]
    ProductInactive(i64),
    #[error("Invalid movement quantity: {0}")]
    InvalidQuantity(i64),
    #[error("Insufficient stock: {available} available, {requested} requested")]
    InsufficientStock { available: i64, requested: i64 },
    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl From<sqlx::Error> for StockError {
    fn from(err: sqlx::Error) -> Self {
        StockError::Database(err.into())
    }
}

/// Why a conditional update matched no row
async fn classify_rejection(
    conn: &mut SqliteConnection,
    request: &MovementRequest,
) -> Result<StockError, sqlx::Error> {
    let row: Option<(i64, bool)> = sqlx::query_as("SELECT quantity, active FROM products WHERE id = ?")
        .bind(request.product_id)
        .fetch_optional(conn)
        .await?;

    Ok(match row {
        None => StockError::ProductNotFound(request.product_id),
        Some((_, false)) => StockError::ProductInactive(request.product_id),
        Some((available, true)) => StockError::InsufficientStock {
            available,
            requested: request.quantity,
        },
    })
}

#[derive(Clone)]
pub struct StockLedger {
    db: Database,
}

impl StockLedger {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Applies a movement on behalf of `actor` and returns the ledger entry
    pub async fn record(&self, actor: &Principal, request: &MovementRequest) -> Result<Movement, StockError> {
        if request.quantity <= 0 || request.quantity > MAX_MOVEMENT_QUANTITY {
            return Err(StockError::InvalidQuantity(request.quantity));
        }

        let mut tx = self.db.begin().await?;

        let updated: Option<i64> = match request.direction {
            Direction::Entry => {
                sqlx::query_scalar(
                    r#"
                    UPDATE products SET quantity = quantity + ?
                    WHERE id = ? AND active = 1
                    RETURNING quantity
                    "#,
                )
                .bind(request.quantity)
                .bind(request.product_id)
                .fetch_optional(&mut *tx)
                .await?
            }
            Direction::Exit => {
                sqlx::query_scalar(
                    r#"
                    UPDATE products SET quantity = quantity - ?
                    WHERE id = ? AND active = 1 AND quantity >= ?
                    RETURNING quantity
                    "#,
                )
                .bind(request.quantity)
                .bind(request.product_id)
                .bind(request.quantity)
                .fetch_optional(&mut *tx)
                .await?
            }
        };

        let Some(new_quantity) = updated else {
            let rejection = classify_rejection(&mut *tx, request).await?;
            tx.rollback().await?;
            warn!(
                product_id = request.product_id,
                user_id = actor.id,
                direction = %request.direction,
                quantity = request.quantity,
                reason = %rejection,
                "Stock movement rejected"
            );
            return Err(rejection);
        };

        let movement_id = sqlx::query(
            "INSERT INTO movements (product_id, user_id, direction, quantity, note) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(request.product_id)
        .bind(actor.id)
        .bind(request.direction.as_str())
        .bind(request.quantity)
        .bind(&request.note)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        let row = sqlx::query_as::<_, MovementRow>(&format!("{} WHERE m.id = ?", MOVEMENT_SELECT))
            .bind(movement_id)
            .fetch_one(&mut *tx)
            .await?;
        let movement = Movement::try_from(row)?;

        tx.commit().await?;

        info!(
            movement_id,
            product_id = request.product_id,
            user_id = actor.id,
            direction = %request.direction,
            quantity = request.quantity,
            new_quantity,
            "Stock movement recorded"
        );
        Ok(movement)
    }

    /// Newest first, optionally narrowed by direction and product
    pub async fn list(&self, filter: &MovementFilter, page: i64, per_page: i64) -> Result<Page<Movement>, DatabaseError> {
        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM movements m WHERE 1 = 1");
        push_filters(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(self.db.pool()).await?;

        let mut query = QueryBuilder::<Sqlite>::new(MOVEMENT_SELECT);
        query.push(" WHERE 1 = 1");
        push_filters(&mut query, filter);
        query
            .push(" ORDER BY m.created_at DESC, m.id DESC LIMIT ")
            .push_bind(per_page)
            .push(" OFFSET ")
            .push_bind(page_offset(page, per_page));

        let rows: Vec<MovementRow> = query.build_query_as().fetch_all(self.db.pool()).await?;
        let items = rows
            .into_iter()
            .map(Movement::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Page { items, page, per_page, total })
    }

    pub async fn recent(&self, limit: i64) -> Result<Vec<Movement>, DatabaseError> {
        let rows = sqlx::query_as::<_, MovementRow>(&format!(
            "{} ORDER BY m.created_at DESC, m.id DESC LIMIT ?",
            MOVEMENT_SELECT
        ))
        .bind(limit)
        .fetch_all(self.db.pool())
        .await?;

        rows.into_iter().map(Movement::try_from).collect()
    }
}

fn push_filters(query: &mut QueryBuilder<'_, Sqlite>, filter: &MovementFilter) {
    if let Some(direction) = filter.direction {
        query.push(" AND m.direction = ").push_bind(direction.as_str());
    }
    if let Some(product_id) = filter.product_id {
        query.push(" AND m.product_id = ").push_bind(product_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewUser, ProductInput, Role};
    use crate::products::ProductStore;
    use crate::users::UserStore;
    use rust_decimal::Decimal;

    struct Fixture {
        ledger: StockLedger,
        products: ProductStore,
        actor: Principal,
    }

    async fn fixture() -> Fixture {
        let db = Database::in_memory().await.unwrap();
        let users = UserStore::new(db.clone());
        let id = users
            .create(&NewUser {
                name: "Administrador".into(),
                email: "admin@estoque.com".into(),
                password: "admin123".into(),
                role: Role::Admin,
            })
            .await
            .unwrap();
        let actor = Principal::from(&users.get(id).await.unwrap());

        Fixture {
            ledger: StockLedger::new(db.clone()),
            products: ProductStore::new(db),
            actor,
        }
    }

    async fn product(fx: &Fixture, code: &str, min_stock: i64) -> i64 {
        fx.products
            .create(&ProductInput {
                code: code.into(),
                name: format!("Produto {}", code),
                description: String::new(),
                min_stock,
                price: Decimal::ZERO,
                category_id: None,
            })
            .await
            .unwrap()
    }

    fn request(product_id: i64, direction: Direction, quantity: i64) -> MovementRequest {
        MovementRequest { product_id, direction, quantity, note: String::new() }
    }

    async fn movement_count(fx: &Fixture) -> i64 {
        fx.ledger.list(&MovementFilter::default(), 1, 100).await.unwrap().total
    }

    #[tokio::test]
    async fn test_entry_increases_quantity_and_appends_one_movement() {
        let fx = fixture().await;
        let id = product(&fx, "PROD001", 5).await;

        let movement = fx.ledger.record(&fx.actor, &request(id, Direction::Entry, 7)).await.unwrap();
        assert_eq!(movement.direction, Direction::Entry);
        assert_eq!(movement.quantity, 7);
        assert_eq!(movement.user_id, fx.actor.id);
        assert_eq!(movement.product_code, "PROD001");

        assert_eq!(fx.products.get(id).await.unwrap().quantity, 7);
        assert_eq!(movement_count(&fx).await, 1);
    }

    #[tokio::test]
    async fn test_exit_to_zero_then_rejected() {
        let fx = fixture().await;
        let id = product(&fx, "PROD001", 5).await;
        fx.ledger.record(&fx.actor, &request(id, Direction::Entry, 10)).await.unwrap();

        fx.ledger.record(&fx.actor, &request(id, Direction::Exit, 10)).await.unwrap();
        let after = fx.products.get(id).await.unwrap();
        assert_eq!(after.quantity, 0);
        assert!(after.is_low_stock());

        let err = fx.ledger.record(&fx.actor, &request(id, Direction::Exit, 1)).await.unwrap_err();
        assert!(matches!(err, StockError::InsufficientStock { available: 0, requested: 1 }));
        assert_eq!(fx.products.get(id).await.unwrap().quantity, 0);
        assert_eq!(movement_count(&fx).await, 2);
    }

    #[tokio::test]
    async fn test_overdraw_reports_prior_quantity() {
        let fx = fixture().await;
        let id = product(&fx, "PROD002", 5).await;
        fx.ledger.record(&fx.actor, &request(id, Direction::Entry, 3)).await.unwrap();

        let err = fx.ledger.record(&fx.actor, &request(id, Direction::Exit, 4)).await.unwrap_err();
        assert!(matches!(err, StockError::InsufficientStock { available: 3, requested: 4 }));
        assert_eq!(fx.products.get(id).await.unwrap().quantity, 3);
        assert_eq!(movement_count(&fx).await, 1);
    }

    #[tokio::test]
    async fn test_invalid_targets_and_quantities() {
        let fx = fixture().await;
        let id = product(&fx, "PROD003", 5).await;

        let err = fx.ledger.record(&fx.actor, &request(id, Direction::Entry, 0)).await.unwrap_err();
        assert!(matches!(err, StockError::InvalidQuantity(0)));

        let err = fx.ledger.record(&fx.actor, &request(999, Direction::Entry, 1)).await.unwrap_err();
        assert!(matches!(err, StockError::ProductNotFound(999)));

        fx.products.deactivate(id).await.unwrap();
        let err = fx.ledger.record(&fx.actor, &request(id, Direction::Entry, 1)).await.unwrap_err();
        assert!(matches!(err, StockError::ProductInactive(_)));

        assert_eq!(movement_count(&fx).await, 0);
    }

    #[tokio::test]
    async fn test_failed_insert_rolls_back_quantity() {
        let fx = fixture().await;
        let id = product(&fx, "PROD004", 5).await;
        let ghost = Principal { id: 4242, ..fx.actor.clone() };

        // the movement insert violates the user foreign key
        let result = fx.ledger.record(&ghost, &request(id, Direction::Entry, 5)).await;
        assert!(matches!(result, Err(StockError::Database(_))));
        assert_eq!(fx.products.get(id).await.unwrap().quantity, 0);
        assert_eq!(movement_count(&fx).await, 0);
    }

    #[tokio::test]
    async fn test_concurrent_exits_never_overdraw() {
        let fx = fixture().await;
        let id = product(&fx, "PROD005", 0).await;
        fx.ledger.record(&fx.actor, &request(id, Direction::Entry, 5)).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let ledger = fx.ledger.clone();
            let actor = fx.actor.clone();
            handles.push(tokio::spawn(async move {
                ledger.record(&actor, &request(id, Direction::Exit, 2)).await
            }));
        }

        let mut succeeded = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => succeeded += 1,
                Err(StockError::InsufficientStock { .. }) => {}
                Err(other) => panic!("unexpected error: {other}"),
            }
        }

        assert_eq!(succeeded, 2);
        assert_eq!(fx.products.get(id).await.unwrap().quantity, 1);
        assert_eq!(movement_count(&fx).await, 3);
    }

    #[tokio::test]
    async fn test_ledger_rows_cannot_be_rewritten() {
        let fx = fixture().await;
        let id = product(&fx, "PROD006", 0).await;
        fx.ledger.record(&fx.actor, &request(id, Direction::Entry, 1)).await.unwrap();

        let update = sqlx::query("UPDATE movements SET quantity = 100").execute(fx.ledger.db.pool()).await;
        assert!(update.is_err());
        let delete = sqlx::query("DELETE FROM movements").execute(fx.ledger.db.pool()).await;
        assert!(delete.is_err());
    }

    #[tokio::test]
    async fn test_list_filters_newest_first() {
        let fx = fixture().await;
        let a = product(&fx, "A", 0).await;
        let b = product(&fx, "B", 0).await;
        fx.ledger.record(&fx.actor, &request(a, Direction::Entry, 5)).await.unwrap();
        fx.ledger.record(&fx.actor, &request(b, Direction::Entry, 5)).await.unwrap();
        fx.ledger.record(&fx.actor, &request(a, Direction::Exit, 1)).await.unwrap();

        let all = fx.ledger.list(&MovementFilter::default(), 1, 15).await.unwrap();
        assert_eq!(all.total, 3);
        assert_eq!(all.items[0].direction, Direction::Exit);

        let exits = MovementFilter { direction: Some(Direction::Exit), product_id: None };
        assert_eq!(fx.ledger.list(&exits, 1, 15).await.unwrap().total, 1);

        let for_b = MovementFilter { direction: None, product_id: Some(b) };
        let page = fx.ledger.list(&for_b, 1, 15).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].product_code, "B");

        assert_eq!(fx.ledger.recent(2).await.unwrap().len(), 2);
    }
}
