pub mod case;
pub mod comment;
pub mod config;
pub mod database_validator;
pub mod escalation;
pub mod lookup;
pub mod user;

use sqlx::{Sqlite, SqlitePool, Transaction};

/// Transaction holding SQLite's write lock from `BEGIN`. Concurrent writers
/// queue on `busy_timeout` rather than failing on a stale read snapshot.
pub(crate) async fn begin_write(
    pool: &SqlitePool,
) -> Result<Transaction<'static, Sqlite>, sqlx::Error> {
    pool.begin_with("BEGIN IMMEDIATE").await
}

/// True when `err` is a UNIQUE constraint violation.
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(e) if e.is_unique_violation())
}

#[cfg(test)]
pub(crate) mod test_support {
    use db::{
        DBService,
        models::user::{CreateUser, User, UserRole},
    };
    use tempfile::TempDir;
    use uuid::Uuid;

    pub async fn test_db() -> (DBService, TempDir) {
        let dir = tempfile::tempdir().expect("create temp dir");
        let db = DBService::new_with_path(&dir.path().join("test.sqlite"))
            .await
            .expect("open test database");
        (db, dir)
    }

    pub async fn user(db: &DBService, name: &str, role: UserRole) -> User {
        User::create(
            &db.pool,
            &CreateUser {
                name: name.to_string(),
                email: format!("{}@example.org", name.to_lowercase()),
                role: Some(role),
            },
            Uuid::new_v4(),
        )
        .await
        .expect("create user")
    }
}
