use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use common_auth::Role;
use serde::Serialize;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::error;
use uuid::Uuid;

/// Directory record. `name` and `email` are unique across users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
}

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("{0} already exists")]
    Conflict(&'static str),
    #[error("directory call timed out after {0:?}")]
    Timeout(Duration),
    #[error("directory error: {0}")]
    Backend(String),
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, DirectoryError>;
    async fn find_by_name(&self, name: &str) -> Result<Option<User>, DirectoryError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, DirectoryError>;
    async fn insert(&self, user: User) -> Result<User, DirectoryError>;
    async fn update(&self, user: User) -> Result<User, DirectoryError>;
    /// Returns whether a record was removed.
    async fn delete(&self, id: Uuid) -> Result<bool, DirectoryError>;
}

// ---------------- Postgres Implementation ----------------

const USER_COLUMNS: &str = "id, name, email, password_hash, role";

#[derive(Clone)]
pub struct PgUserDirectory {
    pool: PgPool,
    op_timeout: Duration,
}

impl PgUserDirectory {
    pub fn new(pool: PgPool, op_timeout: Duration) -> Self {
        Self { pool, op_timeout }
    }

    pub async fn migrate(&self) -> Result<(), DirectoryError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS users (
                id UUID PRIMARY KEY,
                name TEXT NOT NULL UNIQUE,
                email TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                role TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn bounded<T, F>(&self, fut: F) -> Result<T, DirectoryError>
    where
        F: Future<Output = Result<T, sqlx::Error>>,
    {
        match tokio::time::timeout(self.op_timeout, fut).await {
            Ok(result) => result.map_err(map_sqlx_error),
            Err(_) => Err(DirectoryError::Timeout(self.op_timeout)),
        }
    }

    async fn find_one(&self, column: &str, value: &str) -> Result<Option<User>, DirectoryError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE {column} = $1");
        let row = self
            .bounded(sqlx::query(&sql).bind(value).fetch_optional(&self.pool))
            .await?;
        row.map(|row| user_from_row(&row)).transpose()
    }
}

fn user_from_row(row: &PgRow) -> Result<User, DirectoryError> {
    let role: String = row.try_get("role").map_err(map_sqlx_error)?;
    Ok(User {
        id: row.try_get("id").map_err(map_sqlx_error)?,
        name: row.try_get("name").map_err(map_sqlx_error)?,
        email: row.try_get("email").map_err(map_sqlx_error)?,
        password_hash: row.try_get("password_hash").map_err(map_sqlx_error)?,
        role: role
            .parse()
            .map_err(|err| DirectoryError::Backend(format!("stored {err}")))?,
    })
}

fn map_sqlx_error(err: sqlx::Error) -> DirectoryError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            let field = match db_err.constraint() {
                Some(constraint) if constraint.contains("email") => "email",
                Some(constraint) if constraint.contains("name") => "username",
                _ => "user",
            };
            return DirectoryError::Conflict(field);
        }
    }
    error!(error = ?err, "user directory query failed");
    DirectoryError::Backend(err.to_string())
}

#[async_trait]
impl UserDirectory for PgUserDirectory {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, DirectoryError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let row = self
            .bounded(sqlx::query(&sql).bind(id).fetch_optional(&self.pool))
            .await?;
        row.map(|row| user_from_row(&row)).transpose()
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<User>, DirectoryError> {
        self.find_one("name", name).await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, DirectoryError> {
        self.find_one("email", email).await
    }

    async fn insert(&self, user: User) -> Result<User, DirectoryError> {
        self.bounded(
            sqlx::query(
                "INSERT INTO users (id, name, email, password_hash, role) VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(user.id)
            .bind(&user.name)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(user.role.as_str())
            .execute(&self.pool),
        )
        .await?;
        Ok(user)
    }

    async fn update(&self, user: User) -> Result<User, DirectoryError> {
        let result = self
            .bounded(
                sqlx::query(
                    "UPDATE users SET name = $2, email = $3, password_hash = $4, role = $5, updated_at = NOW() WHERE id = $1",
                )
                .bind(user.id)
                .bind(&user.name)
                .bind(&user.email)
                .bind(&user.password_hash)
                .bind(user.role.as_str())
                .execute(&self.pool),
            )
            .await?;
        if result.rows_affected() == 0 {
            return Err(DirectoryError::Backend(format!("user {} does not exist", user.id)));
        }
        Ok(user)
    }

    async fn delete(&self, id: Uuid) -> Result<bool, DirectoryError> {
        let result = self
            .bounded(
                sqlx::query("DELETE FROM users WHERE id = $1")
                    .bind(id)
                    .execute(&self.pool),
            )
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

// ---------------- In-Memory Implementation (Tests) ----------------

#[derive(Default)]
pub struct InMemoryUserDirectory {
    users: RwLock<HashMap<Uuid, User>>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.users.read().await.is_empty()
    }
}

fn conflict_with(existing: &HashMap<Uuid, User>, user: &User) -> Option<DirectoryError> {
    existing
        .values()
        .filter(|other| other.id != user.id)
        .find_map(|other| {
            if other.name == user.name {
                Some(DirectoryError::Conflict("username"))
            } else if other.email == user.email {
                Some(DirectoryError::Conflict("email"))
            } else {
                None
            }
        })
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, DirectoryError> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<User>, DirectoryError> {
        let users = self.users.read().await;
        Ok(users.values().find(|user| user.name == name).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, DirectoryError> {
        let users = self.users.read().await;
        Ok(users.values().find(|user| user.email == email).cloned())
    }

    async fn insert(&self, user: User) -> Result<User, DirectoryError> {
        let mut users = self.users.write().await;
        if users.contains_key(&user.id) {
            return Err(DirectoryError::Conflict("id"));
        }
        if let Some(err) = conflict_with(&users, &user) {
            return Err(err);
        }
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn update(&self, user: User) -> Result<User, DirectoryError> {
        let mut users = self.users.write().await;
        if !users.contains_key(&user.id) {
            return Err(DirectoryError::Backend(format!("user {} does not exist", user.id)));
        }
        if let Some(err) = conflict_with(&users, &user) {
            return Err(err);
        }
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn delete(&self, id: Uuid) -> Result<bool, DirectoryError> {
        Ok(self.users.write().await.remove(&id).is_some())
    }
}
