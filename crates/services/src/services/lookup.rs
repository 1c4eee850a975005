//! Reference data behind the case form selectors.

use db::models::lookup::{
    CreateLookupItem, FeedbackRelatedData, LookupItem, LookupKind, UpdateLookupItem,
};
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use super::is_unique_violation;

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("{} not found", .0.singular())]
    NotFound(LookupKind),
    #[error("no {0} found")]
    Empty(LookupKind),
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Conflict(String),
}

pub struct LookupService;

impl LookupService {
    /// Items of one kind. An empty result is an error so the API can answer 404.
    pub async fn list(
        pool: &SqlitePool,
        kind: LookupKind,
        parent_id: Option<Uuid>,
        include_inactive: bool,
    ) -> Result<Vec<LookupItem>, LookupError> {
        let items = LookupItem::find_by_kind(pool, kind, parent_id, include_inactive).await?;
        if items.is_empty() {
            return Err(LookupError::Empty(kind));
        }
        Ok(items)
    }

    pub async fn all(pool: &SqlitePool) -> Result<FeedbackRelatedData, LookupError> {
        Ok(LookupItem::find_all_active(pool).await?)
    }

    pub async fn get(pool: &SqlitePool, kind: LookupKind, id: Uuid) -> Result<LookupItem, LookupError> {
        LookupItem::find_by_id(pool, id)
            .await?
            .filter(|item| item.kind == kind)
            .ok_or(LookupError::NotFound(kind))
    }

    pub async fn create(
        pool: &SqlitePool,
        kind: LookupKind,
        data: &CreateLookupItem,
    ) -> Result<LookupItem, LookupError> {
        validate_name(&data.name)?;
        validate_parent(pool, kind, data.parent_id).await?;

        let item = LookupItem::create(pool, kind, data, Uuid::new_v4())
            .await
            .map_err(|e| map_unique(e, kind, &data.name))?;
        info!(kind = %kind, item_id = %item.id, name = %item.name, "Lookup item created");
        Ok(item)
    }

    pub async fn update(
        pool: &SqlitePool,
        kind: LookupKind,
        id: Uuid,
        data: &UpdateLookupItem,
    ) -> Result<LookupItem, LookupError> {
        let mut item = Self::get(pool, kind, id).await?;
        data.apply_to(&mut item);
        validate_name(&item.name)?;
        if data.parent_id.is_some() {
            if item.parent_id == Some(item.id) {
                return Err(LookupError::Validation(format!(
                    "a {} cannot be its own parent",
                    kind.singular()
                )));
            }
            validate_parent(pool, kind, item.parent_id).await?;
        }

        let name = item.name.clone();
        let item = LookupItem::save(pool, &item)
            .await
            .map_err(|e| map_unique(e, kind, &name))?;
        info!(kind = %kind, item_id = %item.id, "Lookup item updated");
        Ok(item)
    }

    /// Deletes the item. Cases pointing at it keep existing with the reference cleared,
    /// and child items are orphaned.
    pub async fn delete(pool: &SqlitePool, kind: LookupKind, id: Uuid) -> Result<(), LookupError> {
        let item = Self::get(pool, kind, id).await?;
        LookupItem::delete(pool, id)
            .await
            .map_err(|e| map_unique(e, kind, &item.name))?;
        info!(kind = %kind, item_id = %id, "Lookup item deleted");
        Ok(())
    }
}

fn validate_name(name: &str) -> Result<(), LookupError> {
    if name.trim().is_empty() {
        return Err(LookupError::Validation("name is required".to_string()));
    }
    Ok(())
}

async fn validate_parent(
    pool: &SqlitePool,
    kind: LookupKind,
    parent_id: Option<Uuid>,
) -> Result<(), LookupError> {
    let Some(parent_id) = parent_id else {
        return Ok(());
    };
    let Some(parent_kind) = kind.parent_kind() else {
        return Err(LookupError::Validation(format!(
            "{} cannot have a parent",
            kind
        )));
    };

    let parent = LookupItem::find_by_id(pool, parent_id).await?;
    match parent {
        Some(parent) if parent.kind == parent_kind => Ok(()),
        _ => Err(LookupError::Validation(format!(
            "unknown {}: {}",
            parent_kind.singular(),
            parent_id
        ))),
    }
}

fn map_unique(err: sqlx::Error, kind: LookupKind, name: &str) -> LookupError {
    if is_unique_violation(&err) {
        LookupError::Conflict(format!("a {} named '{}' already exists", kind.singular(), name.trim()))
    } else {
        LookupError::Database(err)
    }
}
