//! Product Registry
//!
//! CRUD over the `products` table. Quantities are read here but never
//! written: the only writer of `products.quantity` is [`crate::stock::StockLedger`].
//! Products are never deleted, only deactivated, so the movements that
//! reference them stay intact.

use sqlx::{QueryBuilder, Sqlite};
use tracing::info;

use crate::database::{Database, DatabaseError, ProductRow, Result};
use crate::models::{Page, Product, ProductFilter, ProductInput, page_offset, price_to_cents};

const PRODUCT_SELECT: &str = r#"
    SELECT p.id, p.code, p.name, p.description, p.quantity, p.min_stock,
           p.price_cents, p.category_id, c.name AS category_name,
           p.active, p.created_at
    FROM products p
    LEFT JOIN categories c ON c.id = p.category_id
"#;

/// `LIKE` pattern matching `term` anywhere, with wildcards escaped
fn contains_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

fn push_filters(query: &mut QueryBuilder<'_, Sqlite>, filter: &ProductFilter) {
    if let Some(search) = filter.search.as_deref().filter(|s| !s.is_empty()) {
        let pattern = contains_pattern(search);
        query
            .push(" AND (p.name LIKE ")
            .push_bind(pattern.clone())
            .push(" ESCAPE '\\' OR p.code LIKE ")
            .push_bind(pattern.clone())
            .push(" ESCAPE '\\' OR p.description LIKE ")
            .push_bind(pattern)
            .push(" ESCAPE '\\')");
    }

    if let Some(category) = filter.category.as_deref().filter(|c| !c.is_empty()) {
        query.push(" AND c.name = ").push_bind(category.to_string());
    }
}

fn price_cents(input: &ProductInput) -> Result<i64> {
    price_to_cents(input.price)
        .ok_or_else(|| DatabaseError::InvalidData(format!("Invalid price: {}", input.price)))
}

#[derive(Clone)]
pub struct ProductStore {
    db: Database,
}

impl ProductStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Registers a product with zero stock. Codes are unique across active
    /// and inactive products.
    pub async fn create(&self, input: &ProductInput) -> Result<i64> {
        if let Some(existing) = self.find_by_code(&input.code).await? {
            return Err(DatabaseError::Duplicate(format!(
                "Product code '{}' already used by product {}",
                input.code, existing.id
            )));
        }

        let result = sqlx::query(
            r#"
            INSERT INTO products (code, name, description, min_stock, price_cents, category_id)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&input.code)
        .bind(&input.name)
        .bind(&input.description)
        .bind(input.min_stock)
        .bind(price_cents(input)?)
        .bind(input.category_id)
        .execute(self.db.pool())
        .await?;

        let id = result.last_insert_rowid();
        info!(product_id = id, code = input.code.as_str(), "Product created");
        Ok(id)
    }

    pub async fn get(&self, id: i64) -> Result<Product> {
        sqlx::query_as::<_, ProductRow>(&format!("{} WHERE p.id = ?", PRODUCT_SELECT))
            .bind(id)
            .fetch_one(self.db.pool())
            .await
            .map(Product::from)
            .map_err(|e| match e {
                sqlx::Error::RowNotFound => {
                    DatabaseError::NotFound(format!("Product with id {} not found", id))
                }
                e => DatabaseError::Query(e),
            })
    }

    pub async fn find_by_code(&self, code: &str) -> Result<Option<Product>> {
        let row = sqlx::query_as::<_, ProductRow>(&format!("{} WHERE p.code = ?", PRODUCT_SELECT))
            .bind(code)
            .fetch_optional(self.db.pool())
            .await?;

        Ok(row.map(Product::from))
    }

    /// Rewrites the editable fields. Keeping the same code is fine; taking
    /// another product's code is not.
    pub async fn update(&self, id: i64, input: &ProductInput) -> Result<()> {
        if let Some(existing) = self.find_by_code(&input.code).await? {
            if existing.id != id {
                return Err(DatabaseError::Duplicate(format!(
                    "Product code '{}' already used by product {}",
                    input.code, existing.id
                )));
            }
        }

        let result = sqlx::query(
            r#"
            UPDATE products
            SET code = ?, name = ?, description = ?, min_stock = ?, price_cents = ?, category_id = ?
            WHERE id = ?
            "#,
        )
        .bind(&input.code)
        .bind(&input.name)
        .bind(&input.description)
        .bind(input.min_stock)
        .bind(price_cents(input)?)
        .bind(input.category_id)
        .bind(id)
        .execute(self.db.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!("Product with id {} not found", id)));
        }

        info!(product_id = id, code = input.code.as_str(), "Product updated");
        Ok(())
    }

    /// Soft-delete. Deactivating an inactive product is a no-op.
    pub async fn deactivate(&self, id: i64) -> Result<Product> {
        let product = self.get(id).await?;

        if product.active {
            sqlx::query("UPDATE products SET active = 0 WHERE id = ?")
                .bind(id)
                .execute(self.db.pool())
                .await?;
            info!(product_id = id, "Product deactivated");
        }

        Ok(Product { active: false, ..product })
    }

    /// Active products ordered by name, filtered by free text and category
    pub async fn list(&self, filter: &ProductFilter, page: i64, per_page: i64) -> Result<Page<Product>> {
        let mut count = QueryBuilder::<Sqlite>::new(
            "SELECT COUNT(*) FROM products p LEFT JOIN categories c ON c.id = p.category_id WHERE p.active = 1",
        );
        push_filters(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(self.db.pool()).await?;

        let mut query = QueryBuilder::<Sqlite>::new(PRODUCT_SELECT);
        query.push(" WHERE p.active = 1");
        push_filters(&mut query, filter);
        query
            .push(" ORDER BY p.name, p.id LIMIT ")
            .push_bind(per_page)
            .push(" OFFSET ")
            .push_bind(page_offset(page, per_page));

        let rows: Vec<ProductRow> = query.build_query_as().fetch_all(self.db.pool()).await?;

        Ok(Page {
            items: rows.into_iter().map(Product::from).collect(),
            page,
            per_page,
            total,
        })
    }

    pub async fn list_active(&self) -> Result<Vec<Product>> {
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            "{} WHERE p.active = 1 ORDER BY p.name, p.id",
            PRODUCT_SELECT
        ))
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows.into_iter().map(Product::from).collect())
    }

    /// Active products at or below their minimum, by name
    pub async fn low_stock(&self, limit: Option<i64>) -> Result<Vec<Product>> {
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            "{} WHERE p.active = 1 AND p.quantity <= p.min_stock ORDER BY p.name, p.id LIMIT ?",
            PRODUCT_SELECT
        ))
        .bind(limit.unwrap_or(-1))
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows.into_iter().map(Product::from).collect())
    }

    pub async fn count_active(&self) -> Result<i64> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM products WHERE active = 1")
            .fetch_one(self.db.pool())
            .await
            .map_err(DatabaseError::Query)
    }

    pub async fn count_low_stock(&self) -> Result<i64> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM products WHERE active = 1 AND quantity <= min_stock",
        )
        .fetch_one(self.db.pool())
        .await
        .map_err(DatabaseError::Query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn input(code: &str, name: &str) -> ProductInput {
        ProductInput {
            code: code.to_string(),
            name: name.to_string(),
            description: String::new(),
            min_stock: 5,
            price: Decimal::new(1999, 2),
            category_id: None,
        }
    }

    async fn store() -> ProductStore {
        ProductStore::new(Database::in_memory().await.unwrap())
    }

    #[tokio::test]
    async fn test_create_starts_with_zero_stock() {
        let store = store().await;
        let id = store.create(&input("PROD001", "Notebook Dell")).await.unwrap();

        let product = store.get(id).await.unwrap();
        assert_eq!(product.quantity, 0);
        assert_eq!(product.price, Decimal::new(1999, 2));
        assert!(product.active);
        assert!(product.is_low_stock());
    }

    #[tokio::test]
    async fn test_duplicate_code_rejected_even_when_inactive() {
        let store = store().await;
        let id = store.create(&input("PROD001", "Notebook Dell")).await.unwrap();
        store.deactivate(id).await.unwrap();

        let err = store.create(&input("PROD001", "Outro")).await.unwrap_err();
        assert!(matches!(err, DatabaseError::Duplicate(_)));
    }

    #[tokio::test]
    async fn test_update_code_rules() {
        let store = store().await;
        let first = store.create(&input("PROD001", "Notebook Dell")).await.unwrap();
        store.create(&input("PROD002", "Mouse Logitech")).await.unwrap();

        // unchanged code is fine
        store.update(first, &input("PROD001", "Notebook Dell 15")).await.unwrap();
        assert_eq!(store.get(first).await.unwrap().name, "Notebook Dell 15");

        let err = store.update(first, &input("PROD002", "Notebook Dell")).await.unwrap_err();
        assert!(matches!(err, DatabaseError::Duplicate(_)));

        let err = store.update(999, &input("PROD999", "Nada")).await.unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_deactivate_is_idempotent() {
        let store = store().await;
        let id = store.create(&input("PROD001", "Notebook Dell")).await.unwrap();

        assert!(!store.deactivate(id).await.unwrap().active);
        assert!(!store.deactivate(id).await.unwrap().active);
        assert!(!store.get(id).await.unwrap().active);
        assert_eq!(store.count_active().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_list_filters_and_paginates() {
        let store = store().await;
        for i in 0..12 {
            store.create(&input(&format!("PAP{:03}", i), &format!("Papel {:02}", i))).await.unwrap();
        }
        store.create(&input("CAN001", "Caneta BIC")).await.unwrap();
        let hidden = store.create(&input("PAP999", "Papel oculto")).await.unwrap();
        store.deactivate(hidden).await.unwrap();

        let filter = ProductFilter { search: Some("papel".into()), category: None };
        let first = store.list(&filter, 1, 10).await.unwrap();
        assert_eq!(first.total, 12);
        assert_eq!(first.items.len(), 10);
        assert_eq!(first.items[0].name, "Papel 00");

        let second = store.list(&filter, 2, 10).await.unwrap();
        assert_eq!(second.items.len(), 2);

        let beyond = store.list(&filter, 5, 10).await.unwrap();
        assert!(beyond.items.is_empty());

        let by_code = ProductFilter { search: Some("CAN".into()), category: None };
        assert_eq!(store.list(&by_code, 1, 10).await.unwrap().total, 1);
    }

    #[tokio::test]
    async fn test_search_wildcards_are_literal() {
        let store = store().await;
        store.create(&input("A_1", "Item A")).await.unwrap();
        store.create(&input("AB1", "Item B")).await.unwrap();

        let filter = ProductFilter { search: Some("A_".into()), category: None };
        let page = store.list(&filter, 1, 10).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].code, "A_1");
    }
}
