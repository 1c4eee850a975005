use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, Sqlite, SqlitePool};
use ts_rs::TS;
use uuid::Uuid;

/// A note on a case. Comments without an author were written by the system
/// (for example the escalation sweep).
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Comment {
    pub id: Uuid,
    pub case_id: Uuid,
    pub author_id: Option<Uuid>,
    pub author_name: Option<String>,
    pub body: String,
    pub is_internal: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateComment {
    pub body: String,
    pub is_internal: Option<bool>,
}

impl Comment {
    pub async fn find_by_case_id(pool: &SqlitePool, case_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Comment>(
            r#"SELECT c.id, c.case_id, c.author_id, u.name AS author_name, c.body, c.is_internal, c.created_at
               FROM comments c
               LEFT JOIN users u ON u.id = c.author_id
               WHERE c.case_id = $1
               ORDER BY c.created_at ASC, c.rowid ASC"#,
        )
        .bind(case_id)
        .fetch_all(pool)
        .await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Comment>(
            r#"SELECT c.id, c.case_id, c.author_id, u.name AS author_name, c.body, c.is_internal, c.created_at
               FROM comments c
               LEFT JOIN users u ON u.id = c.author_id
               WHERE c.id = $1"#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn create<'e, E>(
        executor: E,
        id: Uuid,
        case_id: Uuid,
        author_id: Option<Uuid>,
        body: String,
        is_internal: bool,
    ) -> Result<Self, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Comment>(
            r#"INSERT INTO comments (id, case_id, author_id, body, is_internal)
               VALUES ($1, $2, $3, $4, $5)
               RETURNING id, case_id, author_id,
                         (SELECT name FROM users WHERE users.id = comments.author_id) AS author_name,
                         body, is_internal, created_at"#,
        )
        .bind(id)
        .bind(case_id)
        .bind(author_id)
        .bind(body)
        .bind(is_internal)
        .fetch_one(executor)
        .await
    }

    pub async fn delete(pool: &SqlitePool, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM comments WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}
