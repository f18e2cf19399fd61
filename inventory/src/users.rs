//! User Accounts
//!
//! Accounts are created by administrators, never by self-registration, and
//! are deactivated rather than deleted. A deactivated account cannot sign in
//! and loses any session it still holds.

use tracing::{info, warn};

use crate::auth::password::{spawn_hash, spawn_verify};
use crate::database::{Database, DatabaseError, Result, UserRow};
use crate::models::{NewUser, Role, User, UserChanges};

const USER_SELECT: &str =
    "SELECT id, name, email, password_hash, role, active, created_at FROM users";

fn duplicate_email(email: &str) -> DatabaseError {
    DatabaseError::Duplicate(format!("Email '{}' already registered", email))
}

#[derive(Clone)]
pub struct UserStore {
    db: Database,
}

impl UserStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn create(&self, new_user: &NewUser) -> Result<i64> {
        let password_hash = spawn_hash(&new_user.password).await?;

        let result = sqlx::query(
            "INSERT INTO users (name, email, password_hash, role) VALUES (?, ?, ?, ?)",
        )
        .bind(&new_user.name)
        .bind(&new_user.email)
        .bind(&password_hash)
        .bind(new_user.role.as_str())
        .execute(self.db.pool())
        .await
        .map_err(|e| match DatabaseError::from(e) {
            DatabaseError::Duplicate(_) => duplicate_email(&new_user.email),
            other => other,
        })?;

        let id = result.last_insert_rowid();
        info!(user_id = id, role = %new_user.role, "User created");
        Ok(id)
    }

    pub async fn get(&self, id: i64) -> Result<User> {
        let row = sqlx::query_as::<_, UserRow>(&format!("{} WHERE id = ?", USER_SELECT))
            .bind(id)
            .fetch_optional(self.db.pool())
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("User with id {} not found", id)))?;

        User::try_from(row)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        Ok(sqlx::query_as::<_, UserRow>(&format!("{} WHERE email = ?", USER_SELECT))
            .bind(email)
            .fetch_optional(self.db.pool())
            .await?)
    }

    /// Active user matching the credentials. Unknown emails and wrong
    /// passwords are indistinguishable to the caller.
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<Option<User>> {
        let Some(row) = self.find_by_email(email).await? else {
            spawn_verify(password, None).await;
            return Ok(None);
        };

        if !spawn_verify(password, Some(row.password_hash.clone())).await {
            warn!(user_id = row.id, "Failed login attempt");
            return Ok(None);
        }

        if !row.active {
            warn!(user_id = row.id, "Login attempt on deactivated account");
            return Ok(None);
        }

        User::try_from(row).map(Some)
    }

    /// Applies an edit. The password is only replaced when a new one is given.
    pub async fn update(&self, id: i64, changes: &UserChanges) -> Result<User> {
        if let Some(existing) = self.find_by_email(&changes.email).await? {
            if existing.id != id {
                return Err(duplicate_email(&changes.email));
            }
        }

        let result = match &changes.password {
            Some(password) => {
                let password_hash = spawn_hash(password).await?;
                sqlx::query(
                    "UPDATE users SET name = ?, email = ?, role = ?, password_hash = ? WHERE id = ?",
                )
                .bind(&changes.name)
                .bind(&changes.email)
                .bind(changes.role.as_str())
                .bind(password_hash)
                .bind(id)
                .execute(self.db.pool())
                .await?
            }
            None => {
                sqlx::query("UPDATE users SET name = ?, email = ?, role = ? WHERE id = ?")
                    .bind(&changes.name)
                    .bind(&changes.email)
                    .bind(changes.role.as_str())
                    .bind(id)
                    .execute(self.db.pool())
                    .await?
            }
        };

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!("User with id {} not found", id)));
        }

        info!(user_id = id, role = %changes.role, "User updated");
        self.get(id).await
    }

    /// Idempotent; returns the user as it is afterwards
    pub async fn deactivate(&self, id: i64) -> Result<User> {
        let user = self.get(id).await?;

        if user.active {
            sqlx::query("UPDATE users SET active = 0 WHERE id = ?")
                .bind(id)
                .execute(self.db.pool())
                .await?;
            info!(user_id = id, "User deactivated");
        }

        Ok(User { active: false, ..user })
    }

    pub async fn list_active(&self) -> Result<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "{} WHERE active = 1 ORDER BY name, id",
            USER_SELECT
        ))
        .fetch_all(self.db.pool())
        .await?;

        rows.into_iter().map(User::try_from).collect()
    }

    pub async fn has_active_admin(&self) -> Result<bool> {
        Ok(self.first_active_admin().await?.is_some())
    }

    /// Oldest active administrator, if any
    pub async fn first_active_admin(&self) -> Result<Option<User>> {
        sqlx::query_as::<_, UserRow>(&format!(
            "{} WHERE active = 1 AND role = ? ORDER BY id LIMIT 1",
            USER_SELECT
        ))
        .bind(Role::Admin.as_str())
        .fetch_optional(self.db.pool())
        .await?
        .map(User::try_from)
        .transpose()
    }
}
