use std::sync::Arc;

use async_trait::async_trait;
use db::DBService;
use deployment::{Deployment, DeploymentError};
use services::services::{
    config::Config, database_validator::DatabaseValidator, escalation::CaseEscalationService,
};
use tokio::task::JoinHandle;
use tracing::info;

#[derive(Clone)]
pub struct LocalDeployment {
    db: DBService,
    config: Arc<Config>,
}

#[async_trait]
impl Deployment for LocalDeployment {
    async fn new(config: Config) -> Result<Self, DeploymentError> {
        if let Some(parent) = config.database_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let db = DBService::new_with_path(&config.database_path).await?;
        let validation = DatabaseValidator::new(db.pool.clone())
            .ensure_ready()
            .await?;
        info!("{}", validation.summary());

        Ok(Self {
            db,
            config: Arc::new(config),
        })
    }

    fn config(&self) -> &Config {
        &self.config
    }

    fn db(&self) -> &DBService {
        &self.db
    }

    fn spawn_background_services(&self) -> Option<JoinHandle<()>> {
        let escalation = &self.config.escalation;
        if !escalation.enabled {
            info!("Case escalation sweep disabled");
            return None;
        }
        Some(CaseEscalationService::spawn(self.db.clone(), escalation))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_in(dir: &tempfile::TempDir) -> Config {
        let mut config = Config::default();
        config.database_path = dir.path().join("nested").join("casedesk.sqlite");
        config.escalation.enabled = false;
        config
    }

    #[tokio::test]
    async fn new_creates_database_directory_and_schema() {
        let dir = tempfile::tempdir().unwrap();
        let deployment = LocalDeployment::new(config_in(&dir)).await.unwrap();

        assert!(dir.path().join("nested").join("casedesk.sqlite").exists());
        let users: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&deployment.db().pool)
            .await
            .unwrap();
        assert_eq!(users, 0);
        assert!(deployment.spawn_background_services().is_none());
    }

    #[tokio::test]
    async fn escalation_sweep_spawns_when_enabled() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_in(&dir);
        config.escalation.enabled = true;
        let deployment = LocalDeployment::new(config).await.unwrap();

        let handle = deployment.spawn_background_services().unwrap();
        assert!(!handle.is_finished());
        handle.abort();
    }
}
