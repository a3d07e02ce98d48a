//! SQLite-backed daily step record repository.
//!
//! Implements the `StepRecordCache` port. Writes are single-statement
//! upserts, so a record is always replaced atomically and readers never see
//! a partially written row. All queries run on the shared pool via
//! `spawn_blocking`.

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{Connection, OptionalExtension, Row, ToSql};
use stridearc_core::StepRecordCache;
use stridearc_domain::{Confidence, DailyStepRecord, Result, StepSource, StrideArcError};
use tokio::task;

use super::manager::{map_sql_error, DbManager};

const UPSERT_RECORD_SQL: &str = "INSERT OR REPLACE INTO daily_step_records (
        date, total_steps, target, last_updated, source, confidence
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)";

const SELECT_RECORD_SQL: &str = "SELECT date, total_steps, target, last_updated, source, confidence
    FROM daily_step_records
    WHERE date = ?1";

const DELETE_BEFORE_SQL: &str = "DELETE FROM daily_step_records WHERE date < ?1";

/// Async step record repository backed by SQLite.
pub struct SqliteStepRecordRepository {
    db: Arc<DbManager>,
}

impl SqliteStepRecordRepository {
    /// Construct a repository backed by the shared database manager.
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl StepRecordCache for SqliteStepRecordRepository {
    async fn load(&self, date: NaiveDate) -> Result<Option<DailyStepRecord>> {
        let db = Arc::clone(&self.db);
        task::spawn_blocking(move || -> Result<Option<DailyStepRecord>> {
            let conn = db.get_connection()?;
            query_record(&conn, date)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn store(&self, record: &DailyStepRecord) -> Result<()> {
        let db = Arc::clone(&self.db);
        let record = record.clone();
        task::spawn_blocking(move || -> Result<()> {
            let conn = db.get_connection()?;
            upsert_record(&conn, &record)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn clear_before(&self, date: NaiveDate) -> Result<usize> {
        let db = Arc::clone(&self.db);
        task::spawn_blocking(move || -> Result<usize> {
            let conn = db.get_connection()?;
            let params: [&dyn ToSql; 1] = [&date.to_string()];
            conn.execute(DELETE_BEFORE_SQL, params.as_slice()).map_err(map_sql_error)
        })
        .await
        .map_err(map_join_error)?
    }
}

fn upsert_record(conn: &Connection, record: &DailyStepRecord) -> Result<()> {
    let params: [&dyn ToSql; 6] = [
        &record.date.to_string(),
        &record.total_steps,
        &record.target,
        &record.last_updated.timestamp(),
        &record.source.to_string(),
        &record.confidence.to_string(),
    ];
    conn.execute(UPSERT_RECORD_SQL, params.as_slice()).map_err(map_sql_error)?;
    Ok(())
}

fn query_record(conn: &Connection, date: NaiveDate) -> Result<Option<DailyStepRecord>> {
    let params: [&dyn ToSql; 1] = [&date.to_string()];
    conn.query_row(SELECT_RECORD_SQL, params.as_slice(), map_record_row)
        .optional()
        .map_err(map_sql_error)?
        .transpose()
}

/// Row mapping defers domain validation so rusqlite sees only SQL errors;
/// invalid stored enum strings surface as database errors on read.
fn map_record_row(row: &Row<'_>) -> rusqlite::Result<Result<DailyStepRecord>> {
    let date: String = row.get(0)?;
    let total_steps: u32 = row.get(1)?;
    let target: u32 = row.get(2)?;
    let last_updated: i64 = row.get(3)?;
    let source: String = row.get(4)?;
    let confidence: String = row.get(5)?;

    Ok(build_record(&date, total_steps, target, last_updated, &source, &confidence))
}

fn build_record(
    date: &str,
    total_steps: u32,
    target: u32,
    last_updated: i64,
    source: &str,
    confidence: &str,
) -> Result<DailyStepRecord> {
    let date = NaiveDate::from_str(date)
        .map_err(|e| StrideArcError::Database(format!("invalid date key {date}: {e}")))?;
    let last_updated = DateTime::<Utc>::from_timestamp(last_updated, 0)
        .ok_or_else(|| StrideArcError::Database(format!("invalid timestamp {last_updated}")))?;
    let source = StepSource::from_str(source).map_err(StrideArcError::Database)?;
    let confidence = Confidence::from_str(confidence).map_err(StrideArcError::Database)?;

    Ok(DailyStepRecord { date, total_steps, target, last_updated, source, confidence })
}

fn map_join_error(err: task::JoinError) -> StrideArcError {
    if err.is_cancelled() {
        StrideArcError::Internal("blocking record repository task cancelled".into())
    } else {
        StrideArcError::Internal(format!("blocking record repository task failed: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use tempfile::TempDir;

    use super::*;

    async fn setup() -> (SqliteStepRecordRepository, Arc<DbManager>, TempDir) {
        let temp_dir = TempDir::new().expect("tempdir created");
        let db_path = temp_dir.path().join("steps.db");

        let manager = Arc::new(DbManager::new(&db_path, 4).expect("db manager created"));
        manager.run_migrations().expect("migrations run");

        let repo = SqliteStepRecordRepository::new(Arc::clone(&manager));
        (repo, manager, temp_dir)
    }

    fn sample_record(date: NaiveDate, total: u32) -> DailyStepRecord {
        DailyStepRecord {
            date,
            total_steps: total,
            target: 10_000,
            last_updated: Utc.with_ymd_and_hms(2025, 6, 1, 9, 30, 0).unwrap(),
            source: StepSource::Primary,
            confidence: Confidence::High,
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn stores_and_loads_a_record() {
        let (repo, _manager, _temp_dir) = setup().await;
        let record = sample_record(date(2025, 6, 1), 4_321);

        repo.store(&record).await.expect("store succeeds");
        let loaded = repo.load(record.date).await.expect("load succeeds");

        assert_eq!(loaded, Some(record));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn missing_date_loads_as_none() {
        let (repo, _manager, _temp_dir) = setup().await;
        let loaded = repo.load(date(2025, 1, 1)).await.expect("load succeeds");
        assert_eq!(loaded, None);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn store_replaces_the_same_day_atomically() {
        let (repo, _manager, _temp_dir) = setup().await;
        let day = date(2025, 6, 1);

        repo.store(&sample_record(day, 100)).await.expect("first store");
        let mut updated = sample_record(day, 250);
        updated.confidence = Confidence::Medium;
        repo.store(&updated).await.expect("second store");

        let loaded = repo.load(day).await.expect("load succeeds").expect("record present");
        assert_eq!(loaded.total_steps, 250);
        assert_eq!(loaded.confidence, Confidence::Medium);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn clear_before_prunes_only_older_days() {
        let (repo, _manager, _temp_dir) = setup().await;

        repo.store(&sample_record(date(2025, 5, 30), 1)).await.expect("store old");
        repo.store(&sample_record(date(2025, 5, 31), 2)).await.expect("store older");
        repo.store(&sample_record(date(2025, 6, 1), 3)).await.expect("store current");

        let pruned = repo.clear_before(date(2025, 6, 1)).await.expect("prune succeeds");
        assert_eq!(pruned, 2);

        assert_eq!(repo.load(date(2025, 5, 31)).await.unwrap(), None);
        assert!(repo.load(date(2025, 6, 1)).await.unwrap().is_some());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn corrupt_source_value_surfaces_as_database_error() {
        let (repo, manager, _temp_dir) = setup().await;
        let day = date(2025, 6, 1);
        repo.store(&sample_record(day, 10)).await.expect("store succeeds");

        {
            let conn = manager.get_connection().expect("connection");
            conn.execute(
                "UPDATE daily_step_records SET source = 'teleport' WHERE date = ?1",
                [day.to_string()],
            )
            .expect("update succeeds");
        }

        let err = repo.load(day).await.expect_err("load must fail");
        assert!(matches!(err, StrideArcError::Database(_)));
    }
}
