//! Case workflow: filing, classification, status transitions, assignment and escalation.

use std::collections::HashMap;

use chrono::{Datelike, Utc};
use db::models::{
    assignment_history::{AssignmentHistory, AssignmentTimelineEntry},
    case::{
        Case, CaseDetail, CaseFilter, CaseStatus, CreateCase, UpdateCase, format_reference_number,
    },
    comment::Comment,
    lookup::{LookupItem, LookupKind},
    user::{User, UserRole},
};
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};
use thiserror::Error;
use tracing::{debug, info, warn};
use ts_rs::TS;
use uuid::Uuid;

use super::{begin_write, is_unique_violation};

/// Attempts at allocating a reference number before giving up on a collision.
const REFERENCE_ATTEMPTS: usize = 3;

#[derive(Debug, Error)]
pub enum CaseError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("case not found")]
    NotFound,
    #[error("comment not found")]
    CommentNotFound,
    #[error("{0}")]
    Validation(String),
    #[error("cannot move a case from {from} to {to}")]
    InvalidTransition { from: CaseStatus, to: CaseStatus },
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Forbidden(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct ChangeCaseStatus {
    pub status: CaseStatus,
}

/// Body of the assignment form. `assignee_id` is optional at the wire level so a
/// missing selection yields a validation message instead of a parse error.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct AssignCase {
    pub assignee_id: Option<Uuid>,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct EscalateCase {
    pub reason: Option<String>,
    pub escalate_to: Option<Uuid>,
}

/// Lookup references carried by a case, checked together on create and update.
struct Classification {
    category_id: Option<Uuid>,
    channel_id: Option<Uuid>,
    provider_id: Option<Uuid>,
    programme_id: Option<Uuid>,
    project_id: Option<Uuid>,
    activity_id: Option<Uuid>,
    community_id: Option<Uuid>,
}

impl From<&CreateCase> for Classification {
    fn from(data: &CreateCase) -> Self {
        Self {
            category_id: data.category_id,
            channel_id: data.channel_id,
            provider_id: data.provider_id,
            programme_id: data.programme_id,
            project_id: data.project_id,
            activity_id: data.activity_id,
            community_id: data.community_id,
        }
    }
}

impl From<&Case> for Classification {
    fn from(case: &Case) -> Self {
        Self {
            category_id: case.category_id,
            channel_id: case.channel_id,
            provider_id: case.provider_id,
            programme_id: case.programme_id,
            project_id: case.project_id,
            activity_id: case.activity_id,
            community_id: case.community_id,
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

fn validate_title(title: &str) -> Result<(), CaseError> {
    if title.trim().is_empty() {
        return Err(CaseError::Validation("title is required".to_string()));
    }
    Ok(())
}

async fn validate_classification(
    conn: &mut SqliteConnection,
    classification: &Classification,
) -> Result<(), CaseError> {
    let references = [
        (LookupKind::Categories, classification.category_id),
        (LookupKind::Channels, classification.channel_id),
        (LookupKind::Providers, classification.provider_id),
        (LookupKind::Programmes, classification.programme_id),
        (LookupKind::Projects, classification.project_id),
        (LookupKind::Activities, classification.activity_id),
        (LookupKind::Communities, classification.community_id),
    ];

    let mut found = HashMap::new();
    for (kind, id) in references {
        let Some(id) = id else { continue };
        let item = LookupItem::find_by_id(&mut *conn, id)
            .await?
            .filter(|item| item.kind == kind)
            .ok_or_else(|| CaseError::Validation(format!("unknown {}: {}", kind.singular(), id)))?;
        found.insert(kind, item);
    }

    if let (Some(project), Some(programme_id)) = (found.get(&LookupKind::Projects), classification.programme_id) {
        if project.parent_id != Some(programme_id) {
            return Err(CaseError::Validation(
                "project does not belong to the selected programme".to_string(),
            ));
        }
    }
    if let (Some(activity), Some(project_id)) = (found.get(&LookupKind::Activities), classification.project_id) {
        if activity.parent_id != Some(project_id) {
            return Err(CaseError::Validation(
                "activity does not belong to the selected project".to_string(),
            ));
        }
    }

    Ok(())
}

pub struct CaseService;

impl CaseService {
    pub async fn list(pool: &SqlitePool, filter: &CaseFilter) -> Result<Vec<Case>, CaseError> {
        Ok(Case::find_filtered(pool, filter).await?)
    }

    pub async fn get(pool: &SqlitePool, id: Uuid) -> Result<Case, CaseError> {
        Case::find_by_id(pool, id).await?.ok_or(CaseError::NotFound)
    }

    pub async fn detail(pool: &SqlitePool, id: Uuid) -> Result<CaseDetail, CaseError> {
        let case = Self::get(pool, id).await?;
        let comments = Comment::find_by_case_id(pool, id).await?;
        let assignment_history = AssignmentHistory::find_timeline(pool, id).await?;

        Ok(CaseDetail {
            case,
            comments,
            assignment_history,
        })
    }

    pub async fn assignment_timeline(
        pool: &SqlitePool,
        id: Uuid,
    ) -> Result<Vec<AssignmentTimelineEntry>, CaseError> {
        Self::get(pool, id).await?;
        Ok(AssignmentHistory::find_timeline(pool, id).await?)
    }

    pub async fn create(
        pool: &SqlitePool,
        data: &CreateCase,
        reported_by: Option<Uuid>,
    ) -> Result<Case, CaseError> {
        validate_title(&data.title)?;

        let mut attempt = 0;
        loop {
            attempt += 1;
            match Self::try_create(pool, data, reported_by).await {
                Err(CaseError::Database(e)) if is_unique_violation(&e) && attempt < REFERENCE_ATTEMPTS => {
                    warn!(attempt, "Reference number collision, retrying");
                }
                result => return result,
            }
        }
    }

    async fn try_create(
        pool: &SqlitePool,
        data: &CreateCase,
        reported_by: Option<Uuid>,
    ) -> Result<Case, CaseError> {
        let mut tx = begin_write(pool).await?;
        validate_classification(&mut tx, &Classification::from(data)).await?;

        let year = Utc::now().year();
        let sequence = Case::next_reference_sequence(&mut *tx, year).await?;
        let reference_number = format_reference_number(year, sequence);
        let case = Case::create(&mut *tx, data, Uuid::new_v4(), &reference_number, reported_by).await?;
        tx.commit().await?;

        info!(
            case_id = %case.id,
            reference_number = %case.reference_number,
            priority = %case.priority,
            "Case created"
        );
        Ok(case)
    }

    pub async fn update(pool: &SqlitePool, id: Uuid, data: &UpdateCase) -> Result<Case, CaseError> {
        let mut tx = begin_write(pool).await?;
        let mut case = Case::find_by_id(&mut *tx, id).await?.ok_or(CaseError::NotFound)?;
        if case.status == CaseStatus::Closed {
            return Err(CaseError::Conflict("closed cases cannot be edited".to_string()));
        }

        data.apply_to(&mut case);
        validate_title(&case.title)?;
        validate_classification(&mut tx, &Classification::from(&case)).await?;

        let case = Case::save(&mut *tx, &case).await?;
        tx.commit().await?;

        debug!(case_id = %case.id, "Case updated");
        Ok(case)
    }

    /// Moves a case along the workflow. Escalation goes through [`Self::escalate`] so
    /// the priority bump is applied regardless of which endpoint was used.
    pub async fn change_status(
        pool: &SqlitePool,
        id: Uuid,
        status: CaseStatus,
        actor: Option<Uuid>,
    ) -> Result<Case, CaseError> {
        let case = Self::get(pool, id).await?;
        if case.status == status {
            return Ok(case);
        }
        if !case.status.can_transition_to(status) {
            return Err(CaseError::InvalidTransition {
                from: case.status,
                to: status,
            });
        }
        if status == CaseStatus::Escalated {
            return Self::escalate(pool, id, actor, &EscalateCase::default()).await;
        }

        let updated = Case::update_status(pool, id, status).await?;
        info!(case_id = %id, from = %case.status, to = %status, "Case status changed");
        Ok(updated)
    }

    pub async fn assign(
        pool: &SqlitePool,
        id: Uuid,
        request: &AssignCase,
        assigned_by: Uuid,
    ) -> Result<Case, CaseError> {
        let assignee_id = request
            .assignee_id
            .ok_or_else(|| CaseError::Validation("assignee is required".to_string()))?;

        let mut tx = begin_write(pool).await?;
        let case = Case::find_by_id(&mut *tx, id).await?.ok_or(CaseError::NotFound)?;
        let case = assign_within(
            &mut tx,
            &case,
            assignee_id,
            Some(assigned_by),
            non_empty(request.note.as_deref()),
        )
        .await?;
        tx.commit().await?;

        Ok(case)
    }

    /// Escalates a case: status becomes escalated, priority goes up one step, the
    /// reason is kept as an internal comment and the case is optionally reassigned.
    pub async fn escalate(
        pool: &SqlitePool,
        id: Uuid,
        escalated_by: Option<Uuid>,
        request: &EscalateCase,
    ) -> Result<Case, CaseError> {
        let reason = non_empty(request.reason.as_deref());

        let mut tx = begin_write(pool).await?;
        let case = Case::find_by_id(&mut *tx, id).await?.ok_or(CaseError::NotFound)?;
        if !case.status.can_escalate() {
            return Err(CaseError::InvalidTransition {
                from: case.status,
                to: CaseStatus::Escalated,
            });
        }

        let mut escalated = Case::mark_escalated(&mut *tx, id, case.priority.raised()).await?;
        if let Some(reason) = &reason {
            Comment::create(
                &mut *tx,
                Uuid::new_v4(),
                id,
                escalated_by,
                format!("Escalated: {}", reason),
                true,
            )
            .await?;
        }
        if let Some(target) = request.escalate_to {
            if escalated.assigned_to != Some(target) {
                escalated = assign_within(&mut tx, &escalated, target, escalated_by, reason).await?;
            }
        }
        tx.commit().await?;

        info!(
            case_id = %id,
            from_priority = %case.priority,
            priority = %escalated.priority,
            "Case escalated"
        );
        Ok(escalated)
    }

    /// Escalation performed by the SLA sweep. Returns `None` when the case moved on
    /// (resolved, closed, already escalated) since it was selected.
    pub async fn auto_escalate(
        pool: &SqlitePool,
        id: Uuid,
        sla_hours: i64,
    ) -> Result<Option<Case>, CaseError> {
        let mut tx = begin_write(pool).await?;
        let Some(case) = Case::find_by_id(&mut *tx, id).await? else {
            return Ok(None);
        };
        if !case.status.can_escalate() {
            return Ok(None);
        }

        let escalated = Case::mark_escalated(&mut *tx, id, case.priority.raised()).await?;
        Comment::create(
            &mut *tx,
            Uuid::new_v4(),
            id,
            None,
            format!(
                "Automatically escalated: unresolved for more than {} hours at {} priority",
                sla_hours, case.priority
            ),
            true,
        )
        .await?;
        tx.commit().await?;

        Ok(Some(escalated))
    }

    pub async fn delete(pool: &SqlitePool, id: Uuid) -> Result<(), CaseError> {
        let rows = Case::delete(pool, id).await?;
        if rows == 0 {
            return Err(CaseError::NotFound);
        }
        info!(case_id = %id, "Case deleted");
        Ok(())
    }

    pub async fn assigned_to_user(pool: &SqlitePool, user_id: Uuid) -> Result<Vec<Case>, CaseError> {
        Ok(Case::find_by_assignee(pool, user_id).await?)
    }
}

/// Points the case at `assignee_id` and appends the history row, on the caller's transaction.
async fn assign_within(
    conn: &mut SqliteConnection,
    case: &Case,
    assignee_id: Uuid,
    assigned_by: Option<Uuid>,
    note: Option<String>,
) -> Result<Case, CaseError> {
    if case.status == CaseStatus::Closed {
        return Err(CaseError::Conflict("closed cases cannot be reassigned".to_string()));
    }
    if case.assigned_to == Some(assignee_id) {
        return Err(CaseError::Conflict("case is already assigned to this user".to_string()));
    }

    let assignee = User::find_by_id(&mut *conn, assignee_id)
        .await?
        .ok_or_else(|| CaseError::Validation(format!("unknown assignee: {}", assignee_id)))?;
    if !assignee.is_active {
        return Err(CaseError::Validation("assignee is inactive".to_string()));
    }
    if assignee.role == UserRole::Viewer {
        return Err(CaseError::Validation("viewers cannot be assigned cases".to_string()));
    }

    let updated = Case::set_assignee(&mut *conn, case.id, Some(assignee_id)).await?;
    AssignmentHistory::create(&mut *conn, case.id, assignee_id, assigned_by, note).await?;

    info!(
        case_id = %case.id,
        assignee_id = %assignee_id,
        previous = ?case.assigned_to,
        "Case assigned"
    );
    Ok(updated)
}

#[cfg(test)]
mod tests {
    use db::models::{
        case::CasePriority,
        lookup::{CreateLookupItem, LookupItem},
    };

    use super::*;
    use crate::services::test_support::{test_db, user};

    fn titled(title: &str) -> CreateCase {
        CreateCase {
            title: title.to_string(),
            ..Default::default()
        }
    }

    async fn lookup(pool: &SqlitePool, kind: LookupKind, name: &str, parent_id: Option<Uuid>) -> LookupItem {
        LookupItem::create(
            pool,
            kind,
            &CreateLookupItem {
                name: name.to_string(),
                description: None,
                parent_id,
            },
            Uuid::new_v4(),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn create_allocates_sequential_reference_numbers() {
        let (db, _dir) = test_db().await;
        let first = CaseService::create(&db.pool, &titled("First"), None).await.unwrap();
        let second = CaseService::create(&db.pool, &titled("Second"), None).await.unwrap();

        let year = Utc::now().year();
        assert_eq!(first.reference_number, format_reference_number(year, 1));
        assert_eq!(second.reference_number, format_reference_number(year, 2));
        assert_eq!(first.status, CaseStatus::Open);
        assert_eq!(first.priority, CasePriority::Medium);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_creates_get_distinct_sequential_references() {
        let (db, _dir) = test_db().await;

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let pool = db.pool.clone();
                tokio::spawn(async move {
                    CaseService::create(&pool, &titled(&format!("Case {i}")), None).await
                })
            })
            .collect();

        let mut references = Vec::new();
        for handle in handles {
            let case = handle.await.unwrap().unwrap();
            references.push(case.reference_number);
        }
        references.sort();

        let year = Utc::now().year();
        let expected: Vec<String> = (1..=16).map(|seq| format_reference_number(year, seq)).collect();
        assert_eq!(references, expected);
    }

    #[tokio::test]
    async fn create_rejects_blank_title_and_unknown_lookups() {
        let (db, _dir) = test_db().await;

        let err = CaseService::create(&db.pool, &titled("   "), None).await.unwrap_err();
        assert!(matches!(err, CaseError::Validation(ref m) if m == "title is required"));

        let channel = lookup(&db.pool, LookupKind::Channels, "SMS", None).await;
        let data = CreateCase {
            category_id: Some(channel.id),
            ..titled("Wrong kind")
        };
        let err = CaseService::create(&db.pool, &data, None).await.unwrap_err();
        assert!(matches!(err, CaseError::Validation(ref m) if m.starts_with("unknown category")));
    }

    #[tokio::test]
    async fn create_checks_programme_project_activity_chain() {
        let (db, _dir) = test_db().await;
        let health = lookup(&db.pool, LookupKind::Programmes, "Health", None).await;
        let water = lookup(&db.pool, LookupKind::Programmes, "Water", None).await;
        let clinics = lookup(&db.pool, LookupKind::Projects, "Clinics", Some(health.id)).await;
        let vaccination = lookup(&db.pool, LookupKind::Activities, "Vaccination", Some(clinics.id)).await;

        let mismatched = CreateCase {
            programme_id: Some(water.id),
            project_id: Some(clinics.id),
            ..titled("Mismatch")
        };
        let err = CaseService::create(&db.pool, &mismatched, None).await.unwrap_err();
        assert!(matches!(err, CaseError::Validation(ref m) if m.contains("programme")));

        let consistent = CreateCase {
            programme_id: Some(health.id),
            project_id: Some(clinics.id),
            activity_id: Some(vaccination.id),
            ..titled("Consistent")
        };
        let case = CaseService::create(&db.pool, &consistent, None).await.unwrap();
        assert_eq!(case.activity_id, Some(vaccination.id));
    }

    #[tokio::test]
    async fn assign_requires_an_assignee_and_writes_no_history() {
        let (db, _dir) = test_db().await;
        let manager = user(&db, "Manager", UserRole::Manager).await;
        let case = CaseService::create(&db.pool, &titled("Unassigned"), None).await.unwrap();

        let err = CaseService::assign(&db.pool, case.id, &AssignCase::default(), manager.id)
            .await
            .unwrap_err();
        assert!(matches!(err, CaseError::Validation(ref m) if m == "assignee is required"));
        assert_eq!(AssignmentHistory::count_for_case(&db.pool, case.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn assign_appends_history_in_order() {
        let (db, _dir) = test_db().await;
        let manager = user(&db, "Manager", UserRole::Manager).await;
        let first = user(&db, "First", UserRole::Officer).await;
        let second = user(&db, "Second", UserRole::Officer).await;
        let case = CaseService::create(&db.pool, &titled("Handover"), None).await.unwrap();

        let request = |assignee: Uuid| AssignCase {
            assignee_id: Some(assignee),
            note: Some("  ".to_string()),
        };
        CaseService::assign(&db.pool, case.id, &request(first.id), manager.id).await.unwrap();
        let case = CaseService::assign(&db.pool, case.id, &request(second.id), manager.id)
            .await
            .unwrap();
        assert_eq!(case.assigned_to, Some(second.id));

        let err = CaseService::assign(&db.pool, case.id, &request(second.id), manager.id)
            .await
            .unwrap_err();
        assert!(matches!(err, CaseError::Conflict(_)));

        let timeline = CaseService::assignment_timeline(&db.pool, case.id).await.unwrap();
        assert_eq!(timeline.len(), 2);
        assert_eq!(timeline[0].assigned_to, first.id);
        assert_eq!(timeline[1].assigned_to, second.id);
        assert_eq!(timeline[1].assigned_by, Some(manager.id));
        assert!(timeline[0].note.is_none());
    }

    #[tokio::test]
    async fn assign_rejects_viewers_inactive_users_and_closed_cases() {
        let (db, _dir) = test_db().await;
        let manager = user(&db, "Manager", UserRole::Manager).await;
        let viewer = user(&db, "Viewer", UserRole::Viewer).await;
        let officer = user(&db, "Officer", UserRole::Officer).await;
        let case = CaseService::create(&db.pool, &titled("Gated"), None).await.unwrap();

        let to = |id: Uuid| AssignCase {
            assignee_id: Some(id),
            note: None,
        };
        let err = CaseService::assign(&db.pool, case.id, &to(viewer.id), manager.id)
            .await
            .unwrap_err();
        assert!(matches!(err, CaseError::Validation(_)));

        CaseService::change_status(&db.pool, case.id, CaseStatus::Closed, None)
            .await
            .unwrap();
        let err = CaseService::assign(&db.pool, case.id, &to(officer.id), manager.id)
            .await
            .unwrap_err();
        assert!(matches!(err, CaseError::Conflict(_)));
    }

    #[tokio::test]
    async fn escalate_raises_priority_comments_and_reassigns() {
        let (db, _dir) = test_db().await;
        let officer = user(&db, "Officer", UserRole::Officer).await;
        let supervisor = user(&db, "Supervisor", UserRole::Manager).await;
        let data = CreateCase {
            priority: Some(CasePriority::High),
            ..titled("Threats to staff")
        };
        let case = CaseService::create(&db.pool, &data, None).await.unwrap();

        let escalated = CaseService::escalate(
            &db.pool,
            case.id,
            Some(officer.id),
            &EscalateCase {
                reason: Some("Needs a supervisor".to_string()),
                escalate_to: Some(supervisor.id),
            },
        )
        .await
        .unwrap();

        assert_eq!(escalated.status, CaseStatus::Escalated);
        assert_eq!(escalated.priority, CasePriority::Critical);
        assert!(escalated.escalated_at.is_some());
        assert_eq!(escalated.assigned_to, Some(supervisor.id));

        let detail = CaseService::detail(&db.pool, case.id).await.unwrap();
        assert_eq!(detail.comments.len(), 1);
        assert!(detail.comments[0].is_internal);
        assert_eq!(detail.comments[0].author_id, Some(officer.id));
        assert_eq!(detail.assignment_history.len(), 1);

        let err = CaseService::escalate(&db.pool, case.id, None, &EscalateCase::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CaseError::InvalidTransition {
                from: CaseStatus::Escalated,
                to: CaseStatus::Escalated
            }
        ));
    }

    #[tokio::test]
    async fn change_status_follows_the_workflow() {
        let (db, _dir) = test_db().await;
        let case = CaseService::create(&db.pool, &titled("Workflow"), None).await.unwrap();

        let same = CaseService::change_status(&db.pool, case.id, CaseStatus::Open, None)
            .await
            .unwrap();
        assert_eq!(same.updated_at, case.updated_at);

        let escalated = CaseService::change_status(&db.pool, case.id, CaseStatus::Escalated, None)
            .await
            .unwrap();
        assert_eq!(escalated.priority, CasePriority::High);

        let err = CaseService::change_status(&db.pool, case.id, CaseStatus::Open, None)
            .await
            .unwrap_err();
        assert!(matches!(err, CaseError::InvalidTransition { .. }));

        CaseService::change_status(&db.pool, case.id, CaseStatus::Resolved, None)
            .await
            .unwrap();
        let closed = CaseService::change_status(&db.pool, case.id, CaseStatus::Closed, None)
            .await
            .unwrap();
        assert!(closed.closed_at.is_some());

        let err = CaseService::change_status(&db.pool, case.id, CaseStatus::InProgress, None)
            .await
            .unwrap_err();
        assert!(matches!(err, CaseError::InvalidTransition { from: CaseStatus::Closed, .. }));

        let err = CaseService::update(&db.pool, case.id, &UpdateCase::default())
            .await
            .unwrap_err();
        assert!(matches!(err, CaseError::Conflict(_)));
    }

    #[tokio::test]
    async fn auto_escalate_skips_cases_that_moved_on() {
        let (db, _dir) = test_db().await;
        let open = CaseService::create(&db.pool, &titled("Open"), None).await.unwrap();
        let resolved = CaseService::create(&db.pool, &titled("Resolved"), None).await.unwrap();
        CaseService::change_status(&db.pool, resolved.id, CaseStatus::Resolved, None)
            .await
            .unwrap();

        let escalated = CaseService::auto_escalate(&db.pool, open.id, 72).await.unwrap().unwrap();
        assert_eq!(escalated.status, CaseStatus::Escalated);
        let comments = Comment::find_by_case_id(&db.pool, open.id).await.unwrap();
        assert_eq!(comments.len(), 1);
        assert!(comments[0].author_id.is_none());
        assert!(comments[0].body.contains("72 hours"));

        assert!(CaseService::auto_escalate(&db.pool, resolved.id, 72).await.unwrap().is_none());
        assert!(CaseService::auto_escalate(&db.pool, Uuid::new_v4(), 72).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_and_delete_unknown_case_are_not_found() {
        let (db, _dir) = test_db().await;
        let missing = Uuid::new_v4();
        assert!(matches!(
            CaseService::update(&db.pool, missing, &UpdateCase::default()).await,
            Err(CaseError::NotFound)
        ));
        assert!(matches!(CaseService::delete(&db.pool, missing).await, Err(CaseError::NotFound)));
    }
}
