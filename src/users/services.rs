use time::OffsetDateTime;
use tracing::{debug, info};

use crate::error::AppError;
use crate::users::{
    dto::{CreateUserRequest, UpdateUserRequest},
    password::hash_password,
    repo::UserStore,
    repo_types::{NewUser, User, UserChanges},
};

pub async fn list_active_users(store: &dyn UserStore) -> Result<Vec<User>, AppError> {
    let users = store.list_active().await?;
    debug!(count = users.len(), "listed active users");
    Ok(users)
}

/// Hashes the password and inserts the row. The plaintext is dropped with `req`.
pub async fn create_user(store: &dyn UserStore, req: CreateUserRequest) -> Result<User, AppError> {
    let new_user = NewUser {
        password_hash: hash_password(&req.password)?,
        name: req.name,
        email: req.email,
        role_id: req.role_id,
        created_at: OffsetDateTime::now_utc(),
    };
    let user = store.insert(new_user).await?;
    info!(user_id = user.id, email = %user.email, "user created");
    Ok(user)
}

pub async fn get_user(store: &dyn UserStore, id: i64) -> Result<User, AppError> {
    store.find_by_id(id).await?.ok_or(AppError::NotFound(id))
}

/// Applies only the provided fields. Soft-deleted users may still be updated;
/// `deleted_at` is never touched here.
pub async fn update_user(
    store: &dyn UserStore,
    id: i64,
    req: UpdateUserRequest,
) -> Result<User, AppError> {
    let password_hash = req.password.as_deref().map(hash_password).transpose()?;
    let changes = UserChanges {
        name: req.name,
        email: req.email,
        password_hash,
        role_id: req.role_id,
    };
    let user = store.update(id, changes).await?;
    info!(user_id = user.id, "user updated");
    Ok(user)
}

/// Stamps `deleted_at` with the current time, also when already deleted.
pub async fn soft_delete_user(store: &dyn UserStore, id: i64) -> Result<User, AppError> {
    let user = store.soft_delete(id, OffsetDateTime::now_utc()).await?;
    info!(user_id = user.id, "user soft-deleted");
    Ok(user)
}
