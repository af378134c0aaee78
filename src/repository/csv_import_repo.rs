// ==========================================
// 试验台遥测系统 - CSV 导入记录仓储
// ==========================================
// 职责: csv_import 表的创建 / 终结 / 查询
// 约束: 记录只增不删（审计用途）；终结只允许 pending → success | failed
// ==========================================

use crate::db::{from_db_timestamp, to_db_timestamp};
use crate::domain::telemetry::CsvImport;
use crate::domain::types::ImportStatus;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::Utc;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex, MutexGuard};

const CSV_IMPORT_COLUMNS: &str = "id, session_id, status, rows_processed, rows_failed, \
     error_message, file_name, created_at, finished_at";

fn map_csv_import(row: &Row<'_>) -> rusqlite::Result<CsvImport> {
    let status_raw: String = row.get(2)?;
    let status = ImportStatus::from_db_str(&status_raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            2,
            Type::Text,
            format!("未知导入状态: {status_raw}").into(),
        )
    })?;
    let finished_at = match row.get::<_, Option<String>>(8)? {
        Some(raw) => Some(from_db_timestamp(8, &raw)?),
        None => None,
    };

    Ok(CsvImport {
        id: row.get(0)?,
        session_id: row.get(1)?,
        status,
        rows_processed: row.get(3)?,
        rows_failed: row.get(4)?,
        error_message: row.get(5)?,
        file_name: row.get(6)?,
        created_at: from_db_timestamp(7, &row.get::<_, String>(7)?)?,
        finished_at,
    })
}

// ==========================================
// CsvImportRepository - 导入记录仓储
// ==========================================
pub struct CsvImportRepository {
    conn: Arc<Mutex<Connection>>,
}

impl CsvImportRepository {
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 创建 pending 状态的导入记录
    pub fn create_pending(&self, session_id: i64, file_name: &str) -> RepositoryResult<CsvImport> {
        let conn = self.get_conn()?;
        let now = Utc::now();
        conn.execute(
            r#"
            INSERT INTO csv_import (session_id, status, file_name, created_at)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![
                session_id,
                ImportStatus::Pending.to_db_str(),
                file_name,
                to_db_timestamp(&now)
            ],
        )?;

        Ok(CsvImport {
            id: conn.last_insert_rowid(),
            session_id,
            status: ImportStatus::Pending,
            rows_processed: 0,
            rows_failed: 0,
            error_message: String::new(),
            file_name: file_name.to_string(),
            created_at: now,
            finished_at: None,
        })
    }

    /// 写入导入记录的终态
    ///
    /// 条件更新（WHERE status = 'pending'）保证一条记录只被终结一次
    ///
    /// # 错误
    /// - InvalidStateTransition: 目标状态为 pending，或记录已终结
    /// - NotFound: 记录不存在
    pub fn finalize(&self, record: &CsvImport) -> RepositoryResult<()> {
        if !record.status.is_terminal() {
            return Err(RepositoryError::InvalidStateTransition {
                from: ImportStatus::Pending.to_string(),
                to: record.status.to_string(),
            });
        }

        let conn = self.get_conn()?;
        let affected = conn.execute(
            r#"
            UPDATE csv_import
            SET status = ?2,
                rows_processed = ?3,
                rows_failed = ?4,
                error_message = ?5,
                finished_at = ?6
            WHERE id = ?1 AND status = 'pending'
            "#,
            params![
                record.id,
                record.status.to_db_str(),
                record.rows_processed,
                record.rows_failed,
                record.error_message,
                record.finished_at.as_ref().map(to_db_timestamp),
            ],
        )?;

        if affected == 1 {
            return Ok(());
        }

        let current: Option<String> = conn
            .query_row(
                "SELECT status FROM csv_import WHERE id = ?1",
                params![record.id],
                |row| row.get(0),
            )
            .optional()?;
        match current {
            Some(status) => Err(RepositoryError::InvalidStateTransition {
                from: status,
                to: record.status.to_string(),
            }),
            None => Err(RepositoryError::not_found("csv_import", record.id)),
        }
    }

    pub fn find_by_id(&self, id: i64) -> RepositoryResult<Option<CsvImport>> {
        let conn = self.get_conn()?;
        let record = conn
            .query_row(
                &format!("SELECT {CSV_IMPORT_COLUMNS} FROM csv_import WHERE id = ?1"),
                params![id],
                map_csv_import,
            )
            .optional()?;
        Ok(record)
    }

    /// 查询会话的导入记录（最新在前）
    pub fn list_by_session(&self, session_id: i64) -> RepositoryResult<Vec<CsvImport>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {CSV_IMPORT_COLUMNS} FROM csv_import WHERE session_id = ?1 ORDER BY created_at DESC, id DESC"
        ))?;
        let records = stmt
            .query_map(params![session_id], map_csv_import)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{configure_sqlite_connection, init_schema};
    use crate::repository::session_repo::{MotorGroupRepository, SessionRepository};

    fn setup() -> (CsvImportRepository, i64) {
        let conn = Connection::open_in_memory().unwrap();
        configure_sqlite_connection(&conn).unwrap();
        init_schema(&conn).unwrap();
        let conn = Arc::new(Mutex::new(conn));

        let group = MotorGroupRepository::from_connection(conn.clone())
            .create("Group 1", "")
            .unwrap();
        let session = SessionRepository::from_connection(conn.clone())
            .create(group.id, "Session 1", Utc::now(), None, "")
            .unwrap();

        (CsvImportRepository::from_connection(conn), session.id)
    }

    #[test]
    fn test_create_pending_then_finalize() {
        let (repo, session_id) = setup();
        let mut record = repo.create_pending(session_id, "run1.csv").unwrap();
        assert_eq!(record.status, ImportStatus::Pending);

        record.status = ImportStatus::Success;
        record.rows_processed = 10;
        record.rows_failed = 2;
        record.finished_at = Some(Utc::now());
        repo.finalize(&record).unwrap();

        let stored = repo.find_by_id(record.id).unwrap().unwrap();
        assert_eq!(stored.status, ImportStatus::Success);
        assert_eq!(stored.rows_processed, 10);
        assert_eq!(stored.rows_failed, 2);
        assert_eq!(stored.file_name, "run1.csv");
        assert!(stored.finished_at.is_some());
    }

    #[test]
    fn test_finalize_only_once() {
        let (repo, session_id) = setup();
        let mut record = repo.create_pending(session_id, "a.csv").unwrap();
        record.status = ImportStatus::Failed;
        record.error_message = "boom".to_string();
        record.finished_at = Some(Utc::now());
        repo.finalize(&record).unwrap();

        record.status = ImportStatus::Success;
        let result = repo.finalize(&record);
        assert!(matches!(
            result,
            Err(RepositoryError::InvalidStateTransition { .. })
        ));

        let stored = repo.find_by_id(record.id).unwrap().unwrap();
        assert_eq!(stored.status, ImportStatus::Failed);
        assert_eq!(stored.error_message, "boom");
    }

    #[test]
    fn test_finalize_rejects_pending_target() {
        let (repo, session_id) = setup();
        let record = repo.create_pending(session_id, "a.csv").unwrap();
        assert!(matches!(
            repo.finalize(&record),
            Err(RepositoryError::InvalidStateTransition { .. })
        ));
    }

    #[test]
    fn test_list_by_session_newest_first() {
        let (repo, session_id) = setup();
        let first = repo.create_pending(session_id, "first.csv").unwrap();
        let second = repo.create_pending(session_id, "second.csv").unwrap();

        let listed = repo.list_by_session(session_id).unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, second.id);
        assert_eq!(listed[1].id, first.id);
        assert!(repo.list_by_session(session_id + 100).unwrap().is_empty());
    }
}
