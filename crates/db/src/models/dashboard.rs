use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use ts_rs::TS;
use uuid::Uuid;

use super::case::{CasePriority, CaseStatus};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, TS)]
pub struct StatusCount {
    pub status: CaseStatus,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, TS)]
pub struct PriorityCount {
    pub priority: CasePriority,
    pub count: i64,
}

/// Cases per category; `category_id` is `None` for uncategorised cases.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, TS)]
pub struct CategoryCount {
    pub category_id: Option<Uuid>,
    pub category_name: Option<String>,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct DashboardSummary {
    pub total: i64,
    /// Every status, including those with zero cases, in workflow order.
    pub by_status: Vec<StatusCount>,
    /// Every priority, lowest first.
    pub by_priority: Vec<PriorityCount>,
    pub by_category: Vec<CategoryCount>,
    /// Open, in-progress or escalated cases nobody is assigned to.
    pub unassigned_active: i64,
    pub escalated: i64,
}

impl DashboardSummary {
    pub fn count_for_status(&self, status: CaseStatus) -> i64 {
        self.by_status
            .iter()
            .find(|c| c.status == status)
            .map(|c| c.count)
            .unwrap_or(0)
    }

    pub async fn load(pool: &SqlitePool) -> Result<Self, sqlx::Error> {
        let status_rows: Vec<(CaseStatus, i64)> =
            sqlx::query_as("SELECT status, COUNT(*) FROM cases GROUP BY status")
                .fetch_all(pool)
                .await?;
        let priority_rows: Vec<(CasePriority, i64)> =
            sqlx::query_as("SELECT priority, COUNT(*) FROM cases GROUP BY priority")
                .fetch_all(pool)
                .await?;
        let category_rows: Vec<(Option<Uuid>, Option<String>, i64)> = sqlx::query_as(
            r#"SELECT c.category_id, l.name, COUNT(*) AS count
               FROM cases c
               LEFT JOIN lookup_items l ON l.id = c.category_id
               GROUP BY c.category_id, l.name
               ORDER BY count DESC, l.name ASC"#,
        )
        .fetch_all(pool)
        .await?;
        let unassigned_active: i64 = sqlx::query_scalar(
            r#"SELECT COUNT(*) FROM cases
               WHERE assigned_to IS NULL
                 AND status IN ('open', 'inprogress', 'escalated')"#,
        )
        .fetch_one(pool)
        .await?;

        let by_status: Vec<StatusCount> = CaseStatus::ALL
            .into_iter()
            .map(|status| StatusCount {
                status,
                count: status_rows
                    .iter()
                    .find(|(s, _)| *s == status)
                    .map(|(_, n)| *n)
                    .unwrap_or(0),
            })
            .collect();
        let by_priority = CasePriority::ALL
            .into_iter()
            .map(|priority| PriorityCount {
                priority,
                count: priority_rows
                    .iter()
                    .find(|(p, _)| *p == priority)
                    .map(|(_, n)| *n)
                    .unwrap_or(0),
            })
            .collect();
        let by_category = category_rows
            .into_iter()
            .map(|(category_id, category_name, count)| CategoryCount {
                category_id,
                category_name,
                count,
            })
            .collect();

        let total = by_status.iter().map(|c| c.count).sum();
        let escalated = by_status
            .iter()
            .find(|c| c.status == CaseStatus::Escalated)
            .map(|c| c.count)
            .unwrap_or(0);

        Ok(DashboardSummary {
            total,
            by_status,
            by_priority,
            by_category,
            unassigned_active,
            escalated,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::{
            case::{Case, CreateCase},
            lookup::{CreateLookupItem, LookupItem, LookupKind},
        },
        test_support::test_db,
    };

    #[tokio::test]
    async fn empty_database_reports_zeroes_for_every_bucket() {
        let (db, _dir) = test_db().await;
        let summary = DashboardSummary::load(&db.pool).await.unwrap();

        assert_eq!(summary.total, 0);
        assert_eq!(summary.by_status.len(), CaseStatus::ALL.len());
        assert_eq!(summary.by_priority.len(), CasePriority::ALL.len());
        assert!(summary.by_category.is_empty());
    }

    #[tokio::test]
    async fn counts_match_inserted_cases() {
        let (db, _dir) = test_db().await;
        let category = LookupItem::create(
            &db.pool,
            LookupKind::Categories,
            &CreateLookupItem {
                name: "Complaint".to_string(),
                description: None,
                parent_id: None,
            },
            Uuid::new_v4(),
        )
        .await
        .unwrap();

        for (n, (priority, category_id)) in [
            (CasePriority::High, Some(category.id)),
            (CasePriority::High, Some(category.id)),
            (CasePriority::Low, None),
        ]
        .into_iter()
        .enumerate()
        {
            Case::create(
                &db.pool,
                &CreateCase {
                    title: format!("Case {n}"),
                    priority: Some(priority),
                    category_id,
                    ..Default::default()
                },
                Uuid::new_v4(),
                &format!("CS-2026-{:05}", n + 1),
                None,
            )
            .await
            .unwrap();
        }
        let escalated = Case::find_filtered(&db.pool, &Default::default()).await.unwrap()[0].id;
        Case::update_status(&db.pool, escalated, CaseStatus::Escalated).await.unwrap();

        let summary = DashboardSummary::load(&db.pool).await.unwrap();
        assert_eq!(summary.total, 3);
        assert_eq!(summary.count_for_status(CaseStatus::Open), 2);
        assert_eq!(summary.escalated, 1);
        assert_eq!(summary.unassigned_active, 3);
        assert_eq!(
            summary.by_priority,
            vec![
                PriorityCount { priority: CasePriority::Low, count: 1 },
                PriorityCount { priority: CasePriority::Medium, count: 0 },
                PriorityCount { priority: CasePriority::High, count: 2 },
                PriorityCount { priority: CasePriority::Critical, count: 0 },
            ]
        );
        assert_eq!(summary.by_category[0].category_name.as_deref(), Some("Complaint"));
        assert_eq!(summary.by_category[0].count, 2);
        assert_eq!(summary.by_category[1].category_id, None);
    }
}
