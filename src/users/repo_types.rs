use sqlx::FromRow;
use time::OffsetDateTime;

/// User record in the database.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub password: String, // Argon2 hash
    pub role_id: i32,
    pub created_at: OffsetDateTime,
    pub deleted_at: Option<OffsetDateTime>, // None while active
}

/// Row to insert; the id comes from the store.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role_id: i32,
    pub created_at: OffsetDateTime,
}

/// Columns to overwrite on update. `None` keeps the stored value.
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub role_id: Option<i32>,
}
