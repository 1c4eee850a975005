//! Background sweep that escalates open cases which have outlived their SLA.

use std::time::Duration;

use db::{
    DBService,
    models::case::{Case, CasePriority},
};
use tokio::time::interval;
use tracing::{debug, info, warn};

use super::{
    case::CaseService,
    config::{EscalationConfig, SlaHours},
};

pub struct CaseEscalationService {
    db: DBService,
    poll_interval: Duration,
    sla_hours: SlaHours,
}

impl CaseEscalationService {
    pub fn new(db: DBService, config: &EscalationConfig) -> Self {
        Self {
            db,
            poll_interval: Duration::from_secs(config.interval_secs.max(1)),
            sla_hours: config.sla_hours.clone(),
        }
    }

    /// Spawn the sweep loop on the runtime.
    pub fn spawn(db: DBService, config: &EscalationConfig) -> tokio::task::JoinHandle<()> {
        let service = Self::new(db, config);
        tokio::spawn(async move {
            service.start().await;
        })
    }

    async fn start(&self) {
        info!(
            "Starting case escalation service with interval {:?}, SLA hours: critical {}, high {}, medium {}, low {}",
            self.poll_interval,
            self.sla_hours.critical,
            self.sla_hours.high,
            self.sla_hours.medium,
            self.sla_hours.low
        );

        let mut interval = interval(self.poll_interval);

        loop {
            interval.tick().await;
            match self.sweep().await {
                0 => debug!("Case escalation: nothing overdue"),
                count => info!(count, "Case escalation: escalated overdue cases"),
            }
        }
    }

    /// Escalates every overdue case once and returns how many were escalated.
    ///
    /// A failure on one priority or case is logged and does not stop the sweep.
    pub async fn sweep(&self) -> usize {
        let mut escalated = 0;

        for priority in CasePriority::ALL {
            let hours = self.sla_hours.for_priority(priority);
            let overdue = match Case::find_overdue(&self.db.pool, priority, hours).await {
                Ok(overdue) => overdue,
                Err(e) => {
                    warn!(
                        priority = %priority,
                        error = %e,
                        "Case escalation: failed to load overdue cases"
                    );
                    continue;
                }
            };

            for case in overdue {
                match CaseService::auto_escalate(&self.db.pool, case.id, hours).await {
                    Ok(Some(updated)) => {
                        info!(
                            case_id = %case.id,
                            reference_number = %case.reference_number,
                            from_priority = %priority,
                            to_priority = %updated.priority,
                            "Case escalation: SLA exceeded, case escalated"
                        );
                        escalated += 1;
                    }
                    Ok(None) => {}
                    Err(e) => warn!(
                        case_id = %case.id,
                        error = %e,
                        "Case escalation: failed to escalate overdue case"
                    ),
                }
            }
        }

        escalated
    }
}

#[cfg(test)]
mod tests {
    use db::models::{
        case::{CaseStatus, CreateCase},
        comment::Comment,
    };

    use super::*;
    use crate::services::test_support::test_db;

    async fn case_aged(db: &DBService, priority: CasePriority, hours: i64) -> Case {
        let case = CaseService::create(
            &db.pool,
            &CreateCase {
                title: format!("{} case", priority),
                priority: Some(priority),
                ..Default::default()
            },
            None,
        )
        .await
        .unwrap();
        sqlx::query("UPDATE cases SET created_at = datetime('now', $1) WHERE id = $2")
            .bind(format!("-{} hours", hours))
            .bind(case.id)
            .execute(&db.pool)
            .await
            .unwrap();
        case
    }

    fn config() -> EscalationConfig {
        EscalationConfig {
            enabled: true,
            interval_secs: 60,
            sla_hours: SlaHours::default(),
        }
    }

    #[tokio::test]
    async fn sweep_escalates_only_overdue_cases() {
        let (db, _dir) = test_db().await;
        let overdue = case_aged(&db, CasePriority::High, 30).await;
        let fresh = case_aged(&db, CasePriority::High, 2).await;
        let low = case_aged(&db, CasePriority::Low, 30).await;

        let service = CaseEscalationService::new(db.clone(), &config());
        assert_eq!(service.sweep().await, 1);

        let overdue = CaseService::get(&db.pool, overdue.id).await.unwrap();
        assert_eq!(overdue.status, CaseStatus::Escalated);
        assert_eq!(overdue.priority, CasePriority::Critical);
        assert!(overdue.escalated_at.is_some());

        let comments = Comment::find_by_case_id(&db.pool, overdue.id).await.unwrap();
        assert_eq!(comments.len(), 1);
        assert!(comments[0].is_internal);
        assert!(comments[0].author_id.is_none());
        assert!(comments[0].body.contains("24 hours"));

        for id in [fresh.id, low.id] {
            let case = CaseService::get(&db.pool, id).await.unwrap();
            assert_eq!(case.status, CaseStatus::Open);
        }
    }

    #[tokio::test]
    async fn sweep_is_idempotent_and_skips_resolved_cases() {
        let (db, _dir) = test_db().await;
        let escalated = case_aged(&db, CasePriority::Critical, 5).await;
        let resolved = case_aged(&db, CasePriority::Medium, 100).await;
        CaseService::change_status(&db.pool, resolved.id, CaseStatus::Resolved, None)
            .await
            .unwrap();

        let service = CaseEscalationService::new(db.clone(), &config());
        assert_eq!(service.sweep().await, 1);
        assert_eq!(service.sweep().await, 0);

        let escalated = CaseService::get(&db.pool, escalated.id).await.unwrap();
        assert_eq!(escalated.priority, CasePriority::Critical);
        let resolved = CaseService::get(&db.pool, resolved.id).await.unwrap();
        assert_eq!(resolved.status, CaseStatus::Resolved);
    }

    #[tokio::test]
    async fn manually_de_escalated_cases_are_not_swept_again() {
        let (db, _dir) = test_db().await;
        let case = case_aged(&db, CasePriority::Medium, 100).await;

        let service = CaseEscalationService::new(db.clone(), &config());
        assert_eq!(service.sweep().await, 1);
        let swept = CaseService::get(&db.pool, case.id).await.unwrap();
        assert_eq!(swept.priority, CasePriority::High);

        CaseService::change_status(&db.pool, case.id, CaseStatus::InProgress, None)
            .await
            .unwrap();
        assert_eq!(service.sweep().await, 0);

        let case = CaseService::get(&db.pool, case.id).await.unwrap();
        assert_eq!(case.status, CaseStatus::InProgress);
        assert_eq!(case.priority, CasePriority::High);
    }

    #[tokio::test]
    async fn sweep_logs_and_continues_when_queries_fail() {
        let (db, _dir) = test_db().await;
        case_aged(&db, CasePriority::Low, 500).await;
        sqlx::query("ALTER TABLE cases RENAME TO cases_archive")
            .execute(&db.pool)
            .await
            .unwrap();

        let service = CaseEscalationService::new(db.clone(), &config());
        assert_eq!(service.sweep().await, 0);
    }
}
