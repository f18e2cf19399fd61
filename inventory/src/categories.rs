//! Category catalogue
//!
//! Products reference categories by id; names are unique.

use tracing::info;

use crate::database::{CategoryRow, Database, DatabaseError, Result};
use crate::models::Category;

#[derive(Clone)]
pub struct CategoryStore {
    db: Database,
}

impl CategoryStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn create(&self, name: &str, description: &str) -> Result<i64> {
        let result = sqlx::query("INSERT INTO categories (name, description) VALUES (?, ?)")
            .bind(name)
            .bind(description)
            .execute(self.db.pool())
            .await
            .map_err(|e| match DatabaseError::from(e) {
                DatabaseError::Duplicate(_) => {
                    DatabaseError::Duplicate(format!("Category '{}' already exists", name))
                }
                other => other,
            })?;

        let id = result.last_insert_rowid();
        info!(category_id = id, name, "Category created");
        Ok(id)
    }

    pub async fn get(&self, id: i64) -> Result<Category> {
        sqlx::query_as::<_, CategoryRow>(
            "SELECT id, name, description, active, created_at FROM categories WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(self.db.pool())
        .await?
        .map(Category::from)
        .ok_or_else(|| DatabaseError::NotFound(format!("Category with id {} not found", id)))
    }

    pub async fn find_by_name(&self, name: &str) -> Result<Option<Category>> {
        let row = sqlx::query_as::<_, CategoryRow>(
            "SELECT id, name, description, active, created_at FROM categories WHERE name = ?",
        )
        .bind(name)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.map(Category::from))
    }

    pub async fn list_active(&self) -> Result<Vec<Category>> {
        let rows = sqlx::query_as::<_, CategoryRow>(
            "SELECT id, name, description, active, created_at FROM categories WHERE active = 1 ORDER BY name",
        )
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows.into_iter().map(Category::from).collect())
    }

    pub async fn is_active(&self, id: i64) -> Result<bool> {
        let active: Option<bool> = sqlx::query_scalar("SELECT active FROM categories WHERE id = ?")
            .bind(id)
            .fetch_optional(self.db.pool())
            .await?;

        Ok(active.unwrap_or(false))
    }
}
