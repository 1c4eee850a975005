use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, QueryBuilder, Sqlite, SqlitePool, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

use super::{assignment_history::AssignmentTimelineEntry, comment::Comment};

macro_rules! case_columns {
    () => {
        "id, reference_number, title, description, status, priority, category_id, channel_id, \
         provider_id, programme_id, project_id, activity_id, community_id, complainant_name, \
         complainant_contact, is_anonymous, reported_by, assigned_to, escalated_at, resolved_at, \
         closed_at, created_at, updated_at"
    };
}

pub const REFERENCE_PREFIX: &str = "CS";
pub const DEFAULT_PAGE_SIZE: i64 = 50;
pub const MAX_PAGE_SIZE: i64 = 200;

#[derive(
    Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, Hash, TS, EnumString, Display, Default,
)]
#[sqlx(type_name = "case_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum CaseStatus {
    #[default]
    Open,
    InProgress,
    Escalated,
    Resolved,
    Closed,
}

impl CaseStatus {
    pub const ALL: [CaseStatus; 5] = [
        CaseStatus::Open,
        CaseStatus::InProgress,
        CaseStatus::Escalated,
        CaseStatus::Resolved,
        CaseStatus::Closed,
    ];

    /// Workflow edges. Closed is terminal; resolved cases can only be reopened
    /// into progress or closed.
    pub fn can_transition_to(&self, next: CaseStatus) -> bool {
        use CaseStatus::*;

        if *self == next {
            return true;
        }
        match self {
            Open => matches!(next, InProgress | Escalated | Resolved | Closed),
            InProgress => matches!(next, Open | Escalated | Resolved | Closed),
            Escalated => matches!(next, InProgress | Resolved | Closed),
            Resolved => matches!(next, InProgress | Closed),
            Closed => false,
        }
    }

    pub fn can_escalate(&self) -> bool {
        matches!(self, CaseStatus::Open | CaseStatus::InProgress)
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    Type,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    TS,
    EnumString,
    Display,
    Default,
)]
#[sqlx(type_name = "case_priority", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum CasePriority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl CasePriority {
    pub const ALL: [CasePriority; 4] = [
        CasePriority::Low,
        CasePriority::Medium,
        CasePriority::High,
        CasePriority::Critical,
    ];

    /// One step up, saturating at critical.
    pub fn raised(self) -> CasePriority {
        match self {
            CasePriority::Low => CasePriority::Medium,
            CasePriority::Medium => CasePriority::High,
            CasePriority::High | CasePriority::Critical => CasePriority::Critical,
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Case {
    pub id: Uuid,
    pub reference_number: String,
    pub title: String,
    pub description: Option<String>,
    pub status: CaseStatus,
    pub priority: CasePriority,
    pub category_id: Option<Uuid>,
    pub channel_id: Option<Uuid>,
    pub provider_id: Option<Uuid>,
    pub programme_id: Option<Uuid>,
    pub project_id: Option<Uuid>,
    pub activity_id: Option<Uuid>,
    pub community_id: Option<Uuid>,
    pub complainant_name: Option<String>,
    pub complainant_contact: Option<String>,
    pub is_anonymous: bool,
    pub reported_by: Option<Uuid>,
    pub assigned_to: Option<Uuid>,
    pub escalated_at: Option<DateTime<Utc>>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Case with its comments and assignment timeline, for the detail view.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CaseDetail {
    #[serde(flatten)]
    #[ts(flatten)]
    pub case: Case,
    pub comments: Vec<Comment>,
    pub assignment_history: Vec<AssignmentTimelineEntry>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct CreateCase {
    pub title: String,
    pub description: Option<String>,
    pub priority: Option<CasePriority>,
    pub category_id: Option<Uuid>,
    pub channel_id: Option<Uuid>,
    pub provider_id: Option<Uuid>,
    pub programme_id: Option<Uuid>,
    pub project_id: Option<Uuid>,
    pub activity_id: Option<Uuid>,
    pub community_id: Option<Uuid>,
    pub complainant_name: Option<String>,
    pub complainant_contact: Option<String>,
    pub is_anonymous: Option<bool>,
}

/// Partial update of a case's descriptive and classification fields.
///
/// Nullable columns take a doubled option: absent leaves the value, `null` clears it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct UpdateCase {
    pub title: Option<String>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    #[ts(optional, as = "Option<Option<String>>")]
    pub description: Option<Option<String>>,
    pub priority: Option<CasePriority>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    #[ts(optional, as = "Option<Option<Uuid>>")]
    pub category_id: Option<Option<Uuid>>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    #[ts(optional, as = "Option<Option<Uuid>>")]
    pub channel_id: Option<Option<Uuid>>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    #[ts(optional, as = "Option<Option<Uuid>>")]
    pub provider_id: Option<Option<Uuid>>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    #[ts(optional, as = "Option<Option<Uuid>>")]
    pub programme_id: Option<Option<Uuid>>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    #[ts(optional, as = "Option<Option<Uuid>>")]
    pub project_id: Option<Option<Uuid>>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    #[ts(optional, as = "Option<Option<Uuid>>")]
    pub activity_id: Option<Option<Uuid>>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    #[ts(optional, as = "Option<Option<Uuid>>")]
    pub community_id: Option<Option<Uuid>>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    #[ts(optional, as = "Option<Option<String>>")]
    pub complainant_name: Option<Option<String>>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    #[ts(optional, as = "Option<Option<String>>")]
    pub complainant_contact: Option<Option<String>>,
    pub is_anonymous: Option<bool>,
}

impl UpdateCase {
    pub fn apply_to(&self, case: &mut Case) {
        fn set<T: Clone>(target: &mut T, value: &Option<T>) {
            if let Some(value) = value {
                *target = value.clone();
            }
        }

        if let Some(title) = &self.title {
            case.title = title.trim().to_string();
        }
        set(&mut case.description, &self.description);
        set(&mut case.priority, &self.priority);
        set(&mut case.category_id, &self.category_id);
        set(&mut case.channel_id, &self.channel_id);
        set(&mut case.provider_id, &self.provider_id);
        set(&mut case.programme_id, &self.programme_id);
        set(&mut case.project_id, &self.project_id);
        set(&mut case.activity_id, &self.activity_id);
        set(&mut case.community_id, &self.community_id);
        set(&mut case.complainant_name, &self.complainant_name);
        set(&mut case.complainant_contact, &self.complainant_contact);
        set(&mut case.is_anonymous, &self.is_anonymous);
    }
}

/// Query-string filters for the case list.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct CaseFilter {
    pub status: Option<CaseStatus>,
    pub priority: Option<CasePriority>,
    pub category_id: Option<Uuid>,
    pub assigned_to: Option<Uuid>,
    pub reported_by: Option<Uuid>,
    pub search: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl CaseFilter {
    pub fn page_size(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
    }

    pub fn page_offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }
}

/// Escapes LIKE wildcards so user input matches literally under `ESCAPE '\'`.
fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

pub fn format_reference_number(year: i32, sequence: i64) -> String {
    format!("{}-{}-{:05}", REFERENCE_PREFIX, year, sequence)
}

impl Case {
    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Case>(concat!(
            "SELECT ",
            case_columns!(),
            " FROM cases WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    pub async fn find_filtered(pool: &SqlitePool, filter: &CaseFilter) -> Result<Vec<Self>, sqlx::Error> {
        let mut query = QueryBuilder::<Sqlite>::new(concat!(
            "SELECT ",
            case_columns!(),
            " FROM cases WHERE 1 = 1"
        ));

        if let Some(status) = filter.status {
            query.push(" AND status = ").push_bind(status);
        }
        if let Some(priority) = filter.priority {
            query.push(" AND priority = ").push_bind(priority);
        }
        if let Some(category_id) = filter.category_id {
            query.push(" AND category_id = ").push_bind(category_id);
        }
        if let Some(assigned_to) = filter.assigned_to {
            query.push(" AND assigned_to = ").push_bind(assigned_to);
        }
        if let Some(reported_by) = filter.reported_by {
            query.push(" AND reported_by = ").push_bind(reported_by);
        }
        if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let pattern = format!("%{}%", escape_like(&search.to_lowercase()));
            query
                .push(" AND (lower(title) LIKE ")
                .push_bind(pattern.clone())
                .push(" ESCAPE '\\' OR lower(reference_number) LIKE ")
                .push_bind(pattern.clone())
                .push(" ESCAPE '\\' OR lower(IFNULL(complainant_name, '')) LIKE ")
                .push_bind(pattern)
                .push(" ESCAPE '\\')");
        }

        query
            .push(" ORDER BY created_at DESC, rowid DESC LIMIT ")
            .push_bind(filter.page_size())
            .push(" OFFSET ")
            .push_bind(filter.page_offset());

        query.build_query_as::<Case>().fetch_all(pool).await
    }

    pub async fn find_by_assignee(pool: &SqlitePool, user_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Case>(concat!(
            "SELECT ",
            case_columns!(),
            " FROM cases WHERE assigned_to = $1 ORDER BY updated_at DESC, rowid DESC"
        ))
        .bind(user_id)
        .fetch_all(pool)
        .await
    }

    /// Open or in-progress cases of `priority` untouched by escalation for more than
    /// `older_than_hours`. Age runs from the last escalation, else from creation.
    pub async fn find_overdue(
        pool: &SqlitePool,
        priority: CasePriority,
        older_than_hours: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let age = format!("-{} hours", older_than_hours);
        sqlx::query_as::<_, Case>(concat!(
            "SELECT ",
            case_columns!(),
            " FROM cases
              WHERE status IN ('open', 'inprogress')
                AND priority = $1
                AND datetime(COALESCE(escalated_at, created_at)) < datetime('now', $2)
              ORDER BY created_at ASC"
        ))
        .bind(priority)
        .bind(age)
        .fetch_all(pool)
        .await
    }

    /// Next free sequence number for `year`'s reference numbers.
    pub async fn next_reference_sequence<'e, E>(executor: E, year: i32) -> Result<i64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let prefix = format!("{}-{}-", REFERENCE_PREFIX, year);
        let start = prefix.len() as i64 + 1;
        sqlx::query_scalar::<_, i64>(
            r#"SELECT COALESCE(MAX(CAST(substr(reference_number, $1) AS INTEGER)), 0) + 1
               FROM cases
               WHERE reference_number LIKE $2"#,
        )
        .bind(start)
        .bind(format!("{}%", prefix))
        .fetch_one(executor)
        .await
    }

    pub async fn create<'e, E>(
        executor: E,
        data: &CreateCase,
        id: Uuid,
        reference_number: &str,
        reported_by: Option<Uuid>,
    ) -> Result<Self, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Case>(concat!(
            "INSERT INTO cases (id, reference_number, title, description, priority, category_id,
                channel_id, provider_id, programme_id, project_id, activity_id, community_id,
                complainant_name, complainant_contact, is_anonymous, reported_by)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
             RETURNING ",
            case_columns!()
        ))
        .bind(id)
        .bind(reference_number.to_string())
        .bind(data.title.trim().to_string())
        .bind(data.description.clone())
        .bind(data.priority.unwrap_or_default())
        .bind(data.category_id)
        .bind(data.channel_id)
        .bind(data.provider_id)
        .bind(data.programme_id)
        .bind(data.project_id)
        .bind(data.activity_id)
        .bind(data.community_id)
        .bind(data.complainant_name.clone())
        .bind(data.complainant_contact.clone())
        .bind(data.is_anonymous.unwrap_or(false))
        .bind(reported_by)
        .fetch_one(executor)
        .await
    }

    /// Writes the editable columns of `case` back to its row.
    pub async fn save<'e, E>(executor: E, case: &Case) -> Result<Self, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Case>(concat!(
            "UPDATE cases
             SET title = $2, description = $3, priority = $4, category_id = $5, channel_id = $6,
                 provider_id = $7, programme_id = $8, project_id = $9, activity_id = $10,
                 community_id = $11, complainant_name = $12, complainant_contact = $13,
                 is_anonymous = $14, updated_at = datetime('now', 'subsec')
             WHERE id = $1
             RETURNING ",
            case_columns!()
        ))
        .bind(case.id)
        .bind(case.title.clone())
        .bind(case.description.clone())
        .bind(case.priority)
        .bind(case.category_id)
        .bind(case.channel_id)
        .bind(case.provider_id)
        .bind(case.programme_id)
        .bind(case.project_id)
        .bind(case.activity_id)
        .bind(case.community_id)
        .bind(case.complainant_name.clone())
        .bind(case.complainant_contact.clone())
        .bind(case.is_anonymous)
        .fetch_one(executor)
        .await
    }

    /// Sets the status and stamps the matching milestone. Moving back to open or
    /// in progress clears `resolved_at`.
    pub async fn update_status<'e, E>(executor: E, id: Uuid, status: CaseStatus) -> Result<Self, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Case>(concat!(
            "UPDATE cases
             SET status = $2,
                 escalated_at = CASE WHEN $2 = 'escalated' THEN datetime('now', 'subsec') ELSE escalated_at END,
                 resolved_at = CASE
                     WHEN $2 = 'resolved' THEN datetime('now', 'subsec')
                     WHEN $2 IN ('open', 'inprogress') THEN NULL
                     ELSE resolved_at END,
                 closed_at = CASE WHEN $2 = 'closed' THEN datetime('now', 'subsec') ELSE closed_at END,
                 updated_at = datetime('now', 'subsec')
             WHERE id = $1
             RETURNING ",
            case_columns!()
        ))
        .bind(id)
        .bind(status)
        .fetch_one(executor)
        .await
    }

    pub async fn mark_escalated<'e, E>(
        executor: E,
        id: Uuid,
        priority: CasePriority,
    ) -> Result<Self, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Case>(concat!(
            "UPDATE cases
             SET status = 'escalated', priority = $2,
                 escalated_at = datetime('now', 'subsec'),
                 updated_at = datetime('now', 'subsec')
             WHERE id = $1
             RETURNING ",
            case_columns!()
        ))
        .bind(id)
        .bind(priority)
        .fetch_one(executor)
        .await
    }

    pub async fn set_assignee<'e, E>(
        executor: E,
        id: Uuid,
        assigned_to: Option<Uuid>,
    ) -> Result<Self, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Case>(concat!(
            "UPDATE cases
             SET assigned_to = $2, updated_at = datetime('now', 'subsec')
             WHERE id = $1
             RETURNING ",
            case_columns!()
        ))
        .bind(id)
        .bind(assigned_to)
        .fetch_one(executor)
        .await
    }

    pub async fn delete<'e, E>(executor: E, id: Uuid) -> Result<u64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query("DELETE FROM cases WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }
}
