use std::{path::Path, time::Duration};

use sqlx::{
    Error, SqlitePool,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
};
use tracing::info;
use utils::assets::asset_dir;

pub mod models;

pub const DATABASE_FILE_NAME: &str = "casedesk.sqlite";

#[derive(Clone)]
pub struct DBService {
    pub pool: SqlitePool,
}

impl DBService {
    pub async fn new() -> Result<DBService, Error> {
        Self::new_with_path(&asset_dir().join(DATABASE_FILE_NAME)).await
    }

    /// Opens (creating if missing) the database at `path` and applies pending migrations.
    pub async fn new_with_path(path: &Path) -> Result<DBService, Error> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect_with(options)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;
        info!(path = %path.display(), "Database ready");

        Ok(DBService { pool })
    }
}
