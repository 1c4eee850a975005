use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, Sqlite, SqlitePool};
use ts_rs::TS;
use uuid::Uuid;

/// Append-only record of a case being handed to a user. Rows are never updated
/// and only disappear with their case.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct AssignmentHistory {
    pub id: Uuid,
    pub case_id: Uuid,
    pub assigned_to: Uuid,
    pub assigned_by: Option<Uuid>,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// History row joined with user names, as rendered by the assignment timeline.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct AssignmentTimelineEntry {
    pub id: Uuid,
    pub case_id: Uuid,
    pub assigned_to: Uuid,
    pub assigned_to_name: Option<String>,
    pub assigned_by: Option<Uuid>,
    pub assigned_by_name: Option<String>,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl AssignmentHistory {
    pub async fn create<'e, E>(
        executor: E,
        case_id: Uuid,
        assigned_to: Uuid,
        assigned_by: Option<Uuid>,
        note: Option<String>,
    ) -> Result<Self, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let id = Uuid::new_v4();
        sqlx::query_as::<_, AssignmentHistory>(
            r#"INSERT INTO assignment_history (id, case_id, assigned_to, assigned_by, note)
               VALUES ($1, $2, $3, $4, $5)
               RETURNING id, case_id, assigned_to, assigned_by, note, created_at"#,
        )
        .bind(id)
        .bind(case_id)
        .bind(assigned_to)
        .bind(assigned_by)
        .bind(note)
        .fetch_one(executor)
        .await
    }

    /// Oldest first, so the timeline reads top to bottom.
    pub async fn find_timeline(
        pool: &SqlitePool,
        case_id: Uuid,
    ) -> Result<Vec<AssignmentTimelineEntry>, sqlx::Error> {
        sqlx::query_as::<_, AssignmentTimelineEntry>(
            r#"SELECT h.id, h.case_id,
                      h.assigned_to, assignee.name AS assigned_to_name,
                      h.assigned_by, assigner.name AS assigned_by_name,
                      h.note, h.created_at
               FROM assignment_history h
               LEFT JOIN users assignee ON assignee.id = h.assigned_to
               LEFT JOIN users assigner ON assigner.id = h.assigned_by
               WHERE h.case_id = $1
               ORDER BY h.created_at ASC, h.rowid ASC"#,
        )
        .bind(case_id)
        .fetch_all(pool)
        .await
    }

    pub async fn count_for_case(pool: &SqlitePool, case_id: Uuid) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM assignment_history WHERE case_id = $1")
            .bind(case_id)
            .fetch_one(pool)
            .await
    }
}
