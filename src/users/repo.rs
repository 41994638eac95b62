use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;

use crate::error::AppError;
use crate::users::repo_types::{NewUser, User, UserChanges};

const USER_COLUMNS: &str = "id, name, email, password, role_id, created_at, deleted_at";

/// Persistence for user records.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// All rows with `deleted_at IS NULL`.
    async fn list_active(&self) -> Result<Vec<User>, AppError>;
    async fn insert(&self, user: NewUser) -> Result<User, AppError>;
    /// Lookup by id, soft-deleted rows included.
    async fn find_by_id(&self, id: i64) -> Result<Option<User>, AppError>;
    async fn update(&self, id: i64, changes: UserChanges) -> Result<User, AppError>;
    async fn soft_delete(&self, id: i64, at: OffsetDateTime) -> Result<User, AppError>;
}

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn list_active(&self) -> Result<Vec<User>, AppError> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE deleted_at IS NULL");
        let users = sqlx::query_as::<_, User>(&query)
            .fetch_all(&self.db)
            .await?;
        Ok(users)
    }

    async fn insert(&self, user: NewUser) -> Result<User, AppError> {
        let query = format!(
            "INSERT INTO users (name, email, password, role_id, created_at) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {USER_COLUMNS}"
        );
        let created = sqlx::query_as::<_, User>(&query)
            .bind(&user.name)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(user.role_id)
            .bind(user.created_at)
            .fetch_one(&self.db)
            .await?;
        Ok(created)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, AppError> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let user = sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        Ok(user)
    }

    /// Only provided columns change (`COALESCE`). Row is locked between the
    /// existence check and the write.
    async fn update(&self, id: i64, changes: UserChanges) -> Result<User, AppError> {
        let mut tx = self.db.begin().await?;
        lock_row(&mut tx, id).await?;

        let query = format!(
            "UPDATE users SET \
                 name     = COALESCE($2, name), \
                 email    = COALESCE($3, email), \
                 password = COALESCE($4, password), \
                 role_id  = COALESCE($5, role_id) \
             WHERE id = $1 \
             RETURNING {USER_COLUMNS}"
        );
        let user = sqlx::query_as::<_, User>(&query)
            .bind(id)
            .bind(&changes.name)
            .bind(&changes.email)
            .bind(&changes.password_hash)
            .bind(changes.role_id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(user)
    }

    async fn soft_delete(&self, id: i64, at: OffsetDateTime) -> Result<User, AppError> {
        let mut tx = self.db.begin().await?;
        lock_row(&mut tx, id).await?;

        let query = format!(
            "UPDATE users SET deleted_at = $2 WHERE id = $1 RETURNING {USER_COLUMNS}"
        );
        let user = sqlx::query_as::<_, User>(&query)
            .bind(id)
            .bind(at)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(user)
    }
}

/// `SELECT ... FOR UPDATE`; NotFound rolls the transaction back on drop.
async fn lock_row(tx: &mut sqlx::Transaction<'_, sqlx::Postgres>, id: i64) -> Result<(), AppError> {
    let found = sqlx::query_scalar::<_, i64>("SELECT id FROM users WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?;
    match found {
        Some(_) => Ok(()),
        None => Err(AppError::NotFound(id)),
    }
}
