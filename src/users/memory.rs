use std::sync::{
    atomic::{AtomicBool, Ordering},
    Mutex,
};

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::error::AppError;
use crate::users::{
    repo::UserStore,
    repo_types::{NewUser, User, UserChanges},
};

/// In-process `UserStore` with the same constraints as the `users` table.
#[derive(Default)]
pub struct MemoryUserStore {
    rows: Mutex<Vec<User>>,
    unavailable: AtomicBool,
}

impl MemoryUserStore {
    /// Makes every following call fail as if the database were unreachable.
    pub fn set_unavailable(&self, down: bool) {
        self.unavailable.store(down, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), AppError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(AppError::StoreUnavailable("connection refused".into()));
        }
        Ok(())
    }
}

fn email_taken(rows: &[User], email: &str, except: Option<i64>) -> bool {
    rows.iter()
        .any(|u| u.email == email && Some(u.id) != except)
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn list_active(&self) -> Result<Vec<User>, AppError> {
        self.check()?;
        let rows = self.rows.lock().unwrap();
        Ok(rows.iter().filter(|u| u.deleted_at.is_none()).cloned().collect())
    }

    async fn insert(&self, user: NewUser) -> Result<User, AppError> {
        self.check()?;
        let mut rows = self.rows.lock().unwrap();
        if email_taken(&rows, &user.email, None) {
            return Err(AppError::Conflict);
        }
        let id = rows.iter().map(|u| u.id).max().unwrap_or(0) + 1;
        let created = User {
            id,
            name: user.name,
            email: user.email,
            password: user.password_hash,
            role_id: user.role_id,
            created_at: user.created_at,
            deleted_at: None,
        };
        rows.push(created.clone());
        Ok(created)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, AppError> {
        self.check()?;
        let rows = self.rows.lock().unwrap();
        Ok(rows.iter().find(|u| u.id == id).cloned())
    }

    async fn update(&self, id: i64, changes: UserChanges) -> Result<User, AppError> {
        self.check()?;
        let mut rows = self.rows.lock().unwrap();
        let pos = rows
            .iter()
            .position(|u| u.id == id)
            .ok_or(AppError::NotFound(id))?;
        if let Some(email) = changes.email.as_deref() {
            if email_taken(&rows, email, Some(id)) {
                return Err(AppError::Conflict);
            }
        }
        let user = &mut rows[pos];
        if let Some(name) = changes.name {
            user.name = name;
        }
        if let Some(email) = changes.email {
            user.email = email;
        }
        if let Some(hash) = changes.password_hash {
            user.password = hash;
        }
        if let Some(role_id) = changes.role_id {
            user.role_id = role_id;
        }
        Ok(user.clone())
    }

    async fn soft_delete(&self, id: i64, at: OffsetDateTime) -> Result<User, AppError> {
        self.check()?;
        let mut rows = self.rows.lock().unwrap();
        let user = rows
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or(AppError::NotFound(id))?;
        user.deleted_at = Some(at);
        Ok(user.clone())
    }
}
