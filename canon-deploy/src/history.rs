//! Deployment history: an append-only audit log in SQLite.
//!
//! One database per project at `<project_root>/.canon/history.db`.
//! Rows are only ever inserted; triggers reject UPDATE and DELETE so a
//! correction always means recording a new deployment.
//!
//! Timestamps are stored as RFC 3339 UTC text with microsecond precision,
//! which makes text order equal to chronological order.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use canon_core::{ContentHash, DeployedFileRecord, Deployment, DeploymentId};

use crate::error::{DeployError, StorageError};

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

/// Highest schema version this build understands.
pub const SCHEMA_VERSION: i64 = 2;

struct Migration {
    version: i64,
    description: &'static str,
    sql: &'static str,
}

/// Ordered; each step runs once, gated on `PRAGMA user_version`.
const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "deployments and deployed_files tables",
        sql: "
            CREATE TABLE IF NOT EXISTS deployments (
                id               INTEGER PRIMARY KEY AUTOINCREMENT,
                template_version TEXT    NOT NULL,
                deployed_at      TEXT    NOT NULL,
                deployed_by      TEXT,
                file_count       INTEGER NOT NULL CHECK (file_count >= 0),
                backup_path      TEXT
            );

            CREATE TABLE IF NOT EXISTS deployed_files (
                id            INTEGER PRIMARY KEY AUTOINCREMENT,
                deployment_id INTEGER NOT NULL REFERENCES deployments(id),
                filename      TEXT    NOT NULL,
                content_hash  TEXT    NOT NULL,
                recorded_at   TEXT    NOT NULL,
                UNIQUE (deployment_id, filename)
            );

            CREATE INDEX IF NOT EXISTS deployments_order_idx
                ON deployments(deployed_at, id);
            CREATE INDEX IF NOT EXISTS deployed_files_deployment_idx
                ON deployed_files(deployment_id);
        ",
    },
    Migration {
        version: 2,
        description: "reject updates and deletes on history tables",
        sql: "
            CREATE TRIGGER IF NOT EXISTS deployments_no_update
                BEFORE UPDATE ON deployments
                BEGIN SELECT RAISE(ABORT, 'deployments are append-only'); END;
            CREATE TRIGGER IF NOT EXISTS deployments_no_delete
                BEFORE DELETE ON deployments
                BEGIN SELECT RAISE(ABORT, 'deployments are append-only'); END;
            CREATE TRIGGER IF NOT EXISTS deployed_files_no_update
                BEFORE UPDATE ON deployed_files
                BEGIN SELECT RAISE(ABORT, 'deployed_files are append-only'); END;
            CREATE TRIGGER IF NOT EXISTS deployed_files_no_delete
                BEFORE DELETE ON deployed_files
                BEGIN SELECT RAISE(ABORT, 'deployed_files are append-only'); END;
        ",
    },
];

// ---------------------------------------------------------------------------
// HistoryStore
// ---------------------------------------------------------------------------

/// Deployment metadata supplied by the engine; id and file count are
/// assigned by the store.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NewDeployment {
    pub template_version: String,
    /// Time the content was rendered for. `None` stamps the store's clock.
    pub deployed_at: Option<DateTime<Utc>>,
    pub deployed_by: Option<String>,
    pub backup_path: Option<PathBuf>,
}

/// Append-only deployment log.
pub trait HistoryStore {
    /// Append a deployment row and return its id.
    fn record_deployment(
        &mut self,
        template_version: &str,
        file_count: usize,
        deployed_by: Option<&str>,
        backup_path: Option<&Path>,
    ) -> Result<DeploymentId, DeployError>;

    /// Append one file record. Fails with `InvalidReference` for unknown ids.
    fn record_deployed_file(
        &mut self,
        deployment_id: DeploymentId,
        filename: &str,
        content_hash: &ContentHash,
    ) -> Result<(), DeployError>;

    /// Record a deployment and all of its files as one unit; `file_count`
    /// is `files.len()`.
    fn record(
        &mut self,
        deployment: &NewDeployment,
        files: &[(String, ContentHash)],
    ) -> Result<DeploymentId, DeployError>;

    /// Most recent deployment (max `deployed_at`, then max id).
    fn latest_deployment(&self) -> Result<Option<Deployment>, DeployError>;

    /// File records of one deployment, ordered by filename.
    fn files_of_deployment(&self, id: DeploymentId) -> Result<Vec<DeployedFileRecord>, DeployError>;

    /// Newest first, at most `limit` rows.
    fn history(&self, limit: usize) -> Result<Vec<Deployment>, DeployError>;

    /// Empty when nothing has been deployed yet.
    fn files_of_latest_deployment(&self) -> Result<Vec<DeployedFileRecord>, DeployError> {
        match self.latest_deployment()? {
            Some(latest) => self.files_of_deployment(latest.id),
            None => Ok(Vec::new()),
        }
    }
}

// ---------------------------------------------------------------------------
// SqliteHistory
// ---------------------------------------------------------------------------

/// [`HistoryStore`] backed by a single SQLite connection.
///
/// The connection closes when the handle is dropped.
pub struct SqliteHistory {
    conn: Connection,
}

impl SqliteHistory {
    /// Open (creating if needed) the database at `path` and migrate it.
    pub fn open(path: &Path) -> Result<Self, DeployError> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).map_err(|source| StorageError::Io {
                path: dir.to_path_buf(),
                source,
            })?;
        }
        let conn = Connection::open(path).map_err(StorageError::from)?;
        conn.busy_timeout(Duration::from_secs(5))
            .map_err(StorageError::from)?;
        conn.query_row("PRAGMA journal_mode=WAL;", [], |_| Ok(()))
            .map_err(StorageError::from)?;
        Self::init(conn)
    }

    /// Private in-memory database; used for read-only views of projects that
    /// have never been deployed, and in tests.
    pub fn open_in_memory() -> Result<Self, DeployError> {
        let conn = Connection::open_in_memory().map_err(StorageError::from)?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self, DeployError> {
        conn.execute("PRAGMA foreign_keys=ON;", [])
            .map_err(StorageError::from)?;
        let store = Self { conn };
        store.migrate()?;
        Ok(store)
    }

    /// Current `PRAGMA user_version`.
    pub fn schema_version(&self) -> Result<i64, DeployError> {
        Ok(self
            .conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))?)
    }

    fn migrate(&self) -> Result<(), DeployError> {
        let current = self.schema_version()?;
        if current > SCHEMA_VERSION {
            return Err(StorageError::UnsupportedSchemaVersion {
                found: current,
                supported: SCHEMA_VERSION,
            }
            .into());
        }

        for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
            let tx = self.conn.unchecked_transaction()?;
            tx.execute_batch(migration.sql)?;
            tx.execute_batch(&format!("PRAGMA user_version = {}", migration.version))?;
            tx.commit()?;
            tracing::debug!(
                "history schema migrated to v{}: {}",
                migration.version,
                migration.description
            );
        }
        Ok(())
    }
}

impl HistoryStore for SqliteHistory {
    fn record_deployment(
        &mut self,
        template_version: &str,
        file_count: usize,
        deployed_by: Option<&str>,
        backup_path: Option<&Path>,
    ) -> Result<DeploymentId, DeployError> {
        insert_deployment(
            &self.conn,
            template_version,
            Utc::now(),
            file_count,
            deployed_by,
            backup_path,
        )
    }

    fn record_deployed_file(
        &mut self,
        deployment_id: DeploymentId,
        filename: &str,
        content_hash: &ContentHash,
    ) -> Result<(), DeployError> {
        insert_file(&self.conn, deployment_id, filename, content_hash)
    }

    fn record(
        &mut self,
        deployment: &NewDeployment,
        files: &[(String, ContentHash)],
    ) -> Result<DeploymentId, DeployError> {
        let tx = self.conn.transaction()?;
        let id = insert_deployment(
            &tx,
            &deployment.template_version,
            deployment.deployed_at.unwrap_or_else(Utc::now),
            files.len(),
            deployment.deployed_by.as_deref(),
            deployment.backup_path.as_deref(),
        )?;
        for (filename, hash) in files {
            insert_file(&tx, id, filename, hash)?;
        }
        tx.commit()?;
        Ok(id)
    }

    fn latest_deployment(&self) -> Result<Option<Deployment>, DeployError> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, template_version, deployed_at, deployed_by, file_count, backup_path
                 FROM deployments
                 ORDER BY deployed_at DESC, id DESC
                 LIMIT 1",
                [],
                deployment_from_row,
            )
            .optional()?)
    }

    fn files_of_deployment(&self, id: DeploymentId) -> Result<Vec<DeployedFileRecord>, DeployError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, deployment_id, filename, content_hash, recorded_at
             FROM deployed_files
             WHERE deployment_id = ?1
             ORDER BY filename",
        )?;
        let rows = stmt.query_map(params![id.0], file_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn history(&self, limit: usize) -> Result<Vec<Deployment>, DeployError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut stmt = self.conn.prepare(
            "SELECT id, template_version, deployed_at, deployed_by, file_count, backup_path
             FROM deployments
             ORDER BY deployed_at DESC, id DESC
             LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit], deployment_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

// ---------------------------------------------------------------------------
// Row helpers
// ---------------------------------------------------------------------------

fn insert_deployment(
    conn: &Connection,
    template_version: &str,
    deployed_at: DateTime<Utc>,
    file_count: usize,
    deployed_by: Option<&str>,
    backup_path: Option<&Path>,
) -> Result<DeploymentId, DeployError> {
    let file_count = i64::try_from(file_count)
        .map_err(|_| StorageError::Corrupt(format!("file count {file_count} out of range")))?;
    conn.execute(
        "INSERT INTO deployments (template_version, deployed_at, deployed_by, file_count, backup_path)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            template_version,
            format_timestamp(deployed_at),
            deployed_by,
            file_count,
            backup_path.map(|p| p.to_string_lossy().into_owned()),
        ],
    )?;
    Ok(DeploymentId(conn.last_insert_rowid()))
}

fn insert_file(
    conn: &Connection,
    deployment_id: DeploymentId,
    filename: &str,
    content_hash: &ContentHash,
) -> Result<(), DeployError> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM deployments WHERE id = ?1)",
        params![deployment_id.0],
        |row| row.get(0),
    )?;
    if !exists {
        return Err(DeployError::InvalidReference(deployment_id));
    }
    conn.execute(
        "INSERT INTO deployed_files (deployment_id, filename, content_hash, recorded_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            deployment_id.0,
            filename,
            content_hash.as_str(),
            format_timestamp(Utc::now())
        ],
    )?;
    Ok(())
}

fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

fn deployment_from_row(row: &Row<'_>) -> rusqlite::Result<Deployment> {
    let deployed_at: String = row.get(2)?;
    let file_count: i64 = row.get(4)?;
    let backup_path: Option<String> = row.get(5)?;
    Ok(Deployment {
        id: DeploymentId(row.get(0)?),
        template_version: row.get(1)?,
        deployed_at: parse_timestamp(2, &deployed_at)?,
        deployed_by: row.get(3)?,
        file_count: usize::try_from(file_count).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Integer, Box::new(e))
        })?,
        backup_path: backup_path.map(PathBuf::from),
    })
}

fn file_from_row(row: &Row<'_>) -> rusqlite::Result<DeployedFileRecord> {
    let content_hash: String = row.get(3)?;
    let recorded_at: String = row.get(4)?;
    Ok(DeployedFileRecord {
        id: row.get(0)?,
        deployment_id: DeploymentId(row.get(1)?),
        filename: row.get(2)?,
        content_hash: ContentHash(content_hash),
        recorded_at: parse_timestamp(4, &recorded_at)?,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use canon_core::content_hash;
    use tempfile::TempDir;

    fn store() -> SqliteHistory {
        SqliteHistory::open_in_memory().expect("in-memory store")
    }

    fn files(names: &[&str]) -> Vec<(String, ContentHash)> {
        names
            .iter()
            .map(|n| (n.to_string(), content_hash(format!("content of {n}"))))
            .collect()
    }

    #[test]
    fn empty_store_has_no_latest() {
        let store = store();
        assert!(store.latest_deployment().unwrap().is_none());
        assert!(store.files_of_latest_deployment().unwrap().is_empty());
        assert!(store.history(10).unwrap().is_empty());
    }

    #[test]
    fn migrations_reach_current_version() {
        assert_eq!(store().schema_version().unwrap(), SCHEMA_VERSION);
    }

    #[test]
    fn reopening_does_not_rerun_migrations() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".canon").join("history.db");
        {
            let mut store = SqliteHistory::open(&path).unwrap();
            store
                .record(&NewDeployment::default(), &files(&["a.mdc"]))
                .unwrap();
        }
        let store = SqliteHistory::open(&path).unwrap();
        assert_eq!(store.schema_version().unwrap(), SCHEMA_VERSION);
        assert_eq!(store.history(10).unwrap().len(), 1);
    }

    #[test]
    fn newer_schema_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("history.db");
        {
            let conn = Connection::open(&path).unwrap();
            conn.execute_batch("PRAGMA user_version = 99").unwrap();
        }
        let err = SqliteHistory::open(&path).err().expect("must fail");
        assert!(matches!(
            err,
            DeployError::StorageUnavailable(StorageError::UnsupportedSchemaVersion { found: 99, .. })
        ));
    }

    #[test]
    fn record_sets_file_count_from_files() {
        let mut store = store();
        let id = store
            .record(
                &NewDeployment {
                    template_version: "1.0.0".into(),
                    deployed_by: Some("ana".into()),
                    backup_path: Some(PathBuf::from("/p/.cursor/rules/backups/x")),
                    ..NewDeployment::default()
                },
                &files(&["a.mdc", "b.mdc", "c.mdc"]),
            )
            .unwrap();

        let latest = store.latest_deployment().unwrap().unwrap();
        assert_eq!(latest.id, id);
        assert_eq!(latest.file_count, 3);
        assert_eq!(latest.deployed_by.as_deref(), Some("ana"));
        assert_eq!(latest.backup_path, Some(PathBuf::from("/p/.cursor/rules/backups/x")));
        assert_eq!(store.files_of_latest_deployment().unwrap().len(), 3);
    }

    #[test]
    fn latest_is_most_recent_deployment() {
        let mut store = store();
        store.record(&NewDeployment::default(), &files(&["a.mdc"])).unwrap();
        let second = store
            .record(&NewDeployment::default(), &files(&["a.mdc", "b.mdc"]))
            .unwrap();
        assert!(second.0 > 1);
        assert_eq!(store.latest_deployment().unwrap().unwrap().id, second);

        let latest_files: Vec<_> = store
            .files_of_latest_deployment()
            .unwrap()
            .into_iter()
            .map(|r| r.filename)
            .collect();
        assert_eq!(latest_files, vec!["a.mdc", "b.mdc"]);
    }

    #[test]
    fn record_keeps_supplied_deployed_at() {
        use chrono::TimeZone;

        let mut store = store();
        let rendered_at = Utc.with_ymd_and_hms(2026, 3, 1, 12, 30, 0).unwrap();
        store
            .record(
                &NewDeployment {
                    deployed_at: Some(rendered_at),
                    ..NewDeployment::default()
                },
                &files(&["a.mdc"]),
            )
            .unwrap();
        assert_eq!(store.latest_deployment().unwrap().unwrap().deployed_at, rendered_at);
    }

    #[test]
    fn equal_timestamps_break_ties_by_id() {
        let mut store = store();
        let first = store.record_deployment("1", 0, None, None).unwrap();
        let second = store.record_deployment("1", 0, None, None).unwrap();
        store
            .conn
            .execute_batch("DROP TRIGGER deployments_no_update")
            .unwrap();
        store
            .conn
            .execute(
                "UPDATE deployments SET deployed_at = '2026-01-01T00:00:00.000000Z'",
                [],
            )
            .unwrap();
        assert!(second > first);
        assert_eq!(store.latest_deployment().unwrap().unwrap().id, second);
    }

    #[test]
    fn file_record_for_unknown_deployment_is_invalid_reference() {
        let mut store = store();
        let err = store
            .record_deployed_file(DeploymentId(42), "a.mdc", &content_hash("x"))
            .unwrap_err();
        assert!(matches!(err, DeployError::InvalidReference(DeploymentId(42))));
    }

    #[test]
    fn separate_record_calls_build_one_deployment() {
        let mut store = store();
        let id = store.record_deployment("1.0.0", 2, Some("ci"), None).unwrap();
        store.record_deployed_file(id, "a.mdc", &content_hash("a")).unwrap();
        store.record_deployed_file(id, "b.mdc", &content_hash("b")).unwrap();

        let records = store.files_of_deployment(id).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].content_hash, content_hash("a"));
        assert!(records.iter().all(|r| r.deployment_id == id));
    }

    #[test]
    fn duplicate_filename_in_one_deployment_is_rejected() {
        let mut store = store();
        let id = store.record_deployment("1.0.0", 1, None, None).unwrap();
        store.record_deployed_file(id, "a.mdc", &content_hash("a")).unwrap();
        let err = store
            .record_deployed_file(id, "a.mdc", &content_hash("b"))
            .unwrap_err();
        assert!(matches!(err, DeployError::StorageUnavailable(_)));
    }

    #[test]
    fn failed_transaction_leaves_no_deployment() {
        let mut store = store();
        let dupes = vec![
            ("a.mdc".to_string(), content_hash("1")),
            ("a.mdc".to_string(), content_hash("2")),
        ];
        assert!(store.record(&NewDeployment::default(), &dupes).is_err());
        assert!(store.latest_deployment().unwrap().is_none());
    }

    #[test]
    fn history_is_newest_first_and_bounded() {
        let mut store = store();
        for _ in 0..5 {
            store.record(&NewDeployment::default(), &files(&["a.mdc"])).unwrap();
        }
        let rows = store.history(3).unwrap();
        assert_eq!(rows.len(), 3);
        assert!(rows.windows(2).all(|w| w[0].id > w[1].id));
        assert_eq!(rows[0].id, store.latest_deployment().unwrap().unwrap().id);
    }

    #[test]
    fn updates_and_deletes_are_rejected() {
        let mut store = store();
        store.record(&NewDeployment::default(), &files(&["a.mdc"])).unwrap();
        assert!(store
            .conn
            .execute("UPDATE deployments SET template_version = 'x'", [])
            .is_err());
        assert!(store.conn.execute("DELETE FROM deployed_files", []).is_err());
        assert!(store.conn.execute("DELETE FROM deployments", []).is_err());
    }

    #[test]
    fn unopenable_path_is_storage_unavailable() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join(".canon");
        std::fs::write(&blocker, "not a directory").unwrap();
        let err = SqliteHistory::open(&blocker.join("history.db")).err().expect("must fail");
        assert!(matches!(err, DeployError::StorageUnavailable(_)));
    }
}
