use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, Sqlite, SqlitePool, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

/// Kinds of reference data behind the case form selectors.
///
/// Serialized as the plural URL segment (`/feedback-related-data/categories`).
#[derive(
    Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, Hash, TS, EnumString, Display,
)]
#[sqlx(type_name = "lookup_kind", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LookupKind {
    Categories,
    Channels,
    Providers,
    Programmes,
    Projects,
    Activities,
    Communities,
}

impl LookupKind {
    pub const ALL: [LookupKind; 7] = [
        LookupKind::Categories,
        LookupKind::Channels,
        LookupKind::Providers,
        LookupKind::Programmes,
        LookupKind::Projects,
        LookupKind::Activities,
        LookupKind::Communities,
    ];

    /// Kind an item's `parent_id` must point at, if this kind is nested at all.
    pub fn parent_kind(&self) -> Option<LookupKind> {
        match self {
            LookupKind::Projects => Some(LookupKind::Programmes),
            LookupKind::Activities => Some(LookupKind::Projects),
            _ => None,
        }
    }

    /// Singular label used in error messages.
    pub fn singular(&self) -> &'static str {
        match self {
            LookupKind::Categories => "category",
            LookupKind::Channels => "channel",
            LookupKind::Providers => "provider",
            LookupKind::Programmes => "programme",
            LookupKind::Projects => "project",
            LookupKind::Activities => "activity",
            LookupKind::Communities => "community",
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct LookupItem {
    pub id: Uuid,
    pub kind: LookupKind,
    pub name: String,
    pub description: Option<String>,
    pub parent_id: Option<Uuid>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateLookupItem {
    pub name: String,
    pub description: Option<String>,
    pub parent_id: Option<Uuid>,
}

/// Partial update. The doubled options distinguish "leave as is" (field absent)
/// from "clear" (field present and `null`).
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct UpdateLookupItem {
    pub name: Option<String>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    #[ts(optional, as = "Option<Option<String>>")]
    pub description: Option<Option<String>>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    #[ts(optional, as = "Option<Option<Uuid>>")]
    pub parent_id: Option<Option<Uuid>>,
    pub is_active: Option<bool>,
}

impl UpdateLookupItem {
    pub fn apply_to(&self, item: &mut LookupItem) {
        if let Some(name) = &self.name {
            item.name = name.trim().to_string();
        }
        if let Some(description) = &self.description {
            item.description = description.clone();
        }
        if let Some(parent_id) = self.parent_id {
            item.parent_id = parent_id;
        }
        if let Some(is_active) = self.is_active {
            item.is_active = is_active;
        }
    }
}

/// Every kind's active items, for populating the case form in one request.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct FeedbackRelatedData {
    pub categories: Vec<LookupItem>,
    pub channels: Vec<LookupItem>,
    pub providers: Vec<LookupItem>,
    pub programmes: Vec<LookupItem>,
    pub projects: Vec<LookupItem>,
    pub activities: Vec<LookupItem>,
    pub communities: Vec<LookupItem>,
}

impl FeedbackRelatedData {
    fn slot(&mut self, kind: LookupKind) -> &mut Vec<LookupItem> {
        match kind {
            LookupKind::Categories => &mut self.categories,
            LookupKind::Channels => &mut self.channels,
            LookupKind::Providers => &mut self.providers,
            LookupKind::Programmes => &mut self.programmes,
            LookupKind::Projects => &mut self.projects,
            LookupKind::Activities => &mut self.activities,
            LookupKind::Communities => &mut self.communities,
        }
    }
}

impl LookupItem {
    pub async fn find_by_kind(
        pool: &SqlitePool,
        kind: LookupKind,
        parent_id: Option<Uuid>,
        include_inactive: bool,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, LookupItem>(
            r#"SELECT id, kind, name, description, parent_id, is_active, created_at, updated_at
               FROM lookup_items
               WHERE kind = $1
                 AND ($2 IS NULL OR parent_id = $2)
                 AND ($3 OR is_active = 1)
               ORDER BY name COLLATE NOCASE ASC"#,
        )
        .bind(kind)
        .bind(parent_id)
        .bind(include_inactive)
        .fetch_all(pool)
        .await
    }

    pub async fn find_all_active(pool: &SqlitePool) -> Result<FeedbackRelatedData, sqlx::Error> {
        let items = sqlx::query_as::<_, LookupItem>(
            r#"SELECT id, kind, name, description, parent_id, is_active, created_at, updated_at
               FROM lookup_items
               WHERE is_active = 1
               ORDER BY name COLLATE NOCASE ASC"#,
        )
        .fetch_all(pool)
        .await?;

        let mut data = FeedbackRelatedData::default();
        for item in items {
            data.slot(item.kind).push(item);
        }
        Ok(data)
    }

    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, LookupItem>(
            r#"SELECT id, kind, name, description, parent_id, is_active, created_at, updated_at
               FROM lookup_items
               WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    pub async fn create(
        pool: &SqlitePool,
        kind: LookupKind,
        data: &CreateLookupItem,
        id: Uuid,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, LookupItem>(
            r#"INSERT INTO lookup_items (id, kind, name, description, parent_id)
               VALUES ($1, $2, $3, $4, $5)
               RETURNING id, kind, name, description, parent_id, is_active, created_at, updated_at"#,
        )
        .bind(id)
        .bind(kind)
        .bind(data.name.trim())
        .bind(&data.description)
        .bind(data.parent_id)
        .fetch_one(pool)
        .await
    }

    /// Writes the editable columns of `item` back to its row.
    pub async fn save(pool: &SqlitePool, item: &LookupItem) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, LookupItem>(
            r#"UPDATE lookup_items
               SET name = $2, description = $3, parent_id = $4, is_active = $5,
                   updated_at = datetime('now', 'subsec')
               WHERE id = $1
               RETURNING id, kind, name, description, parent_id, is_active, created_at, updated_at"#,
        )
        .bind(item.id)
        .bind(&item.name)
        .bind(&item.description)
        .bind(item.parent_id)
        .bind(item.is_active)
        .fetch_one(pool)
        .await
    }

    pub async fn delete(pool: &SqlitePool, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM lookup_items WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;
    use crate::test_support::test_db;

    fn named(name: &str, parent_id: Option<Uuid>) -> CreateLookupItem {
        CreateLookupItem {
            name: name.to_string(),
            description: None,
            parent_id,
        }
    }

    #[test]
    fn kind_parses_from_url_segment() {
        assert_eq!(LookupKind::from_str("communities").unwrap(), LookupKind::Communities);
        assert_eq!(LookupKind::Programmes.to_string(), "programmes");
        assert!(LookupKind::from_str("widgets").is_err());
        assert_eq!(LookupKind::Activities.parent_kind(), Some(LookupKind::Projects));
        assert_eq!(LookupKind::Channels.parent_kind(), None);
    }

    #[tokio::test]
    async fn find_by_kind_filters_by_parent_and_activity() {
        let (db, _dir) = test_db().await;
        let health = LookupItem::create(&db.pool, LookupKind::Programmes, &named("Health", None), Uuid::new_v4())
            .await
            .unwrap();
        let water = LookupItem::create(&db.pool, LookupKind::Programmes, &named("Water", None), Uuid::new_v4())
            .await
            .unwrap();
        LookupItem::create(&db.pool, LookupKind::Projects, &named("Clinics", Some(health.id)), Uuid::new_v4())
            .await
            .unwrap();
        let mut wells = LookupItem::create(&db.pool, LookupKind::Projects, &named("Wells", Some(water.id)), Uuid::new_v4())
            .await
            .unwrap();

        let health_projects = LookupItem::find_by_kind(&db.pool, LookupKind::Projects, Some(health.id), false)
            .await
            .unwrap();
        assert_eq!(health_projects.len(), 1);
        assert_eq!(health_projects[0].name, "Clinics");

        wells.is_active = false;
        LookupItem::save(&db.pool, &wells).await.unwrap();
        let active = LookupItem::find_by_kind(&db.pool, LookupKind::Projects, None, false)
            .await
            .unwrap();
        assert_eq!(active.len(), 1);
        let all = LookupItem::find_by_kind(&db.pool, LookupKind::Projects, None, true)
            .await
            .unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn same_name_allowed_under_different_parents_only() {
        let (db, _dir) = test_db().await;
        let a = LookupItem::create(&db.pool, LookupKind::Programmes, &named("A", None), Uuid::new_v4())
            .await
            .unwrap();
        let b = LookupItem::create(&db.pool, LookupKind::Programmes, &named("B", None), Uuid::new_v4())
            .await
            .unwrap();
        LookupItem::create(&db.pool, LookupKind::Projects, &named("Outreach", Some(a.id)), Uuid::new_v4())
            .await
            .unwrap();
        LookupItem::create(&db.pool, LookupKind::Projects, &named("Outreach", Some(b.id)), Uuid::new_v4())
            .await
            .unwrap();

        let err = LookupItem::create(&db.pool, LookupKind::Programmes, &named("a", None), Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, sqlx::Error::Database(ref e) if e.is_unique_violation()));
    }

    #[tokio::test]
    async fn find_all_active_groups_by_kind() {
        let (db, _dir) = test_db().await;
        LookupItem::create(&db.pool, LookupKind::Categories, &named("Complaint", None), Uuid::new_v4())
            .await
            .unwrap();
        LookupItem::create(&db.pool, LookupKind::Channels, &named("Hotline", None), Uuid::new_v4())
            .await
            .unwrap();

        let data = LookupItem::find_all_active(&db.pool).await.unwrap();
        assert_eq!(data.categories.len(), 1);
        assert_eq!(data.channels[0].name, "Hotline");
        assert!(data.communities.is_empty());
    }

    #[test]
    fn update_distinguishes_absent_from_null() {
        let update: UpdateLookupItem = serde_json::from_str(r#"{"description": null}"#).unwrap();
        assert_eq!(update.description, Some(None));
        assert_eq!(update.parent_id, None);

        let update: UpdateLookupItem = serde_json::from_str(r#"{"name": "Renamed"}"#).unwrap();
        assert_eq!(update.description, None);
    }
}
