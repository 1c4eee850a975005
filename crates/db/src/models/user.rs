use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, Sqlite, SqlitePool, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

#[derive(
    Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display, Default,
)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum UserRole {
    Admin,
    Manager,
    #[default]
    Officer,
    Viewer,
}

impl UserRole {
    /// Viewers are read-only; everyone else can file, edit and comment on cases.
    pub fn can_edit_cases(&self) -> bool {
        !matches!(self, UserRole::Viewer)
    }

    pub fn can_assign(&self) -> bool {
        matches!(self, UserRole::Admin | UserRole::Manager)
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, UserRole::Admin)
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: UserRole,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateUser {
    pub name: String,
    pub email: String,
    pub role: Option<UserRole>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct UpdateUser {
    pub name: Option<String>,
    pub role: Option<UserRole>,
    pub is_active: Option<bool>,
}

impl User {
    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, User>(
            r#"SELECT id, name, email, role, is_active, created_at, updated_at
               FROM users
               WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    pub async fn find_all(
        pool: &SqlitePool,
        include_inactive: bool,
        role: Option<UserRole>,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"SELECT id, name, email, role, is_active, created_at, updated_at
               FROM users
               WHERE ($1 OR is_active = 1)
                 AND ($2 IS NULL OR role = $2)
               ORDER BY name COLLATE NOCASE ASC"#,
        )
        .bind(include_inactive)
        .bind(role)
        .fetch_all(pool)
        .await
    }

    pub async fn create(pool: &SqlitePool, data: &CreateUser, id: Uuid) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"INSERT INTO users (id, name, email, role)
               VALUES ($1, $2, $3, $4)
               RETURNING id, name, email, role, is_active, created_at, updated_at"#,
        )
        .bind(id)
        .bind(data.name.trim())
        .bind(data.email.trim())
        .bind(data.role.unwrap_or_default())
        .fetch_one(pool)
        .await
    }

    /// Applies the provided fields; `None` leaves a column untouched.
    pub async fn update(
        pool: &SqlitePool,
        id: Uuid,
        data: &UpdateUser,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"UPDATE users
               SET name = COALESCE($2, name),
                   role = COALESCE($3, role),
                   is_active = COALESCE($4, is_active),
                   updated_at = datetime('now', 'subsec')
               WHERE id = $1
               RETURNING id, name, email, role, is_active, created_at, updated_at"#,
        )
        .bind(id)
        .bind(data.name.as_deref().map(str::trim))
        .bind(data.role)
        .bind(data.is_active)
        .fetch_optional(pool)
        .await
    }
}
