use db::models::user::{CreateUser, UpdateUser, User, UserRole};
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use super::is_unique_violation;

#[derive(Debug, Error)]
pub enum UserError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("user not found")]
    NotFound,
    #[error("{0}")]
    Validation(String),
    #[error("a user with email '{0}' already exists")]
    EmailTaken(String),
}

pub struct UserService;

impl UserService {
    pub async fn list(
        pool: &SqlitePool,
        include_inactive: bool,
        role: Option<UserRole>,
    ) -> Result<Vec<User>, UserError> {
        Ok(User::find_all(pool, include_inactive, role).await?)
    }

    pub async fn get(pool: &SqlitePool, id: Uuid) -> Result<User, UserError> {
        User::find_by_id(pool, id).await?.ok_or(UserError::NotFound)
    }

    pub async fn create(pool: &SqlitePool, data: &CreateUser) -> Result<User, UserError> {
        if data.name.trim().is_empty() {
            return Err(UserError::Validation("name is required".to_string()));
        }
        let email = data.email.trim();
        if !is_plausible_email(email) {
            return Err(UserError::Validation(format!("invalid email: {}", email)));
        }

        let user = User::create(pool, data, Uuid::new_v4()).await.map_err(|e| {
            if is_unique_violation(&e) {
                UserError::EmailTaken(email.to_string())
            } else {
                UserError::Database(e)
            }
        })?;
        info!(user_id = %user.id, role = %user.role, "User created");
        Ok(user)
    }

    pub async fn update(pool: &SqlitePool, id: Uuid, data: &UpdateUser) -> Result<User, UserError> {
        if matches!(data.name.as_deref(), Some(name) if name.trim().is_empty()) {
            return Err(UserError::Validation("name cannot be blank".to_string()));
        }
        let user = User::update(pool, id, data).await?.ok_or(UserError::NotFound)?;
        info!(user_id = %user.id, role = %user.role, is_active = user.is_active, "User updated");
        Ok(user)
    }
}

fn is_plausible_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !email.contains(' '),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::test_db;

    fn new_user(email: &str) -> CreateUser {
        CreateUser {
            name: "Kofi".to_string(),
            email: email.to_string(),
            role: Some(UserRole::Manager),
        }
    }

    #[test]
    fn email_check() {
        assert!(is_plausible_email("a@b.org"));
        assert!(!is_plausible_email("a@b"));
        assert!(!is_plausible_email("@b.org"));
        assert!(!is_plausible_email("no-at.org"));
    }

    #[tokio::test]
    async fn create_validates_and_rejects_duplicates() {
        let (db, _dir) = test_db().await;
        let err = UserService::create(&db.pool, &new_user("bad")).await.unwrap_err();
        assert!(matches!(err, UserError::Validation(_)));

        let user = UserService::create(&db.pool, &new_user("kofi@example.org")).await.unwrap();
        assert_eq!(user.role, UserRole::Manager);

        let err = UserService::create(&db.pool, &new_user("kofi@example.org")).await.unwrap_err();
        assert!(matches!(err, UserError::EmailTaken(_)));
    }

    #[tokio::test]
    async fn update_unknown_user_is_not_found() {
        let (db, _dir) = test_db().await;
        let err = UserService::update(
            &db.pool,
            Uuid::new_v4(),
            &UpdateUser {
                role: Some(UserRole::Admin),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, UserError::NotFound));
    }
}
