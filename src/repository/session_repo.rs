// ==========================================
// 试验台遥测系统 - 电机组 / 会话仓储
// ==========================================
// 红线: Repository 不含业务逻辑（仅在写入前执行实体自身的校验）
// ==========================================

use crate::db::{from_db_timestamp, to_db_timestamp};
use crate::domain::telemetry::{validate_session_window, MotorGroup, Session};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex, MutexGuard};

fn map_motor_group(row: &Row<'_>) -> rusqlite::Result<MotorGroup> {
    Ok(MotorGroup {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        created_at: from_db_timestamp(3, &row.get::<_, String>(3)?)?,
    })
}

fn map_session(row: &Row<'_>) -> rusqlite::Result<Session> {
    let ended_at = match row.get::<_, Option<String>>(4)? {
        Some(raw) => Some(from_db_timestamp(4, &raw)?),
        None => None,
    };
    Ok(Session {
        id: row.get(0)?,
        motor_group_id: row.get(1)?,
        name: row.get(2)?,
        started_at: from_db_timestamp(3, &row.get::<_, String>(3)?)?,
        ended_at,
        notes: row.get(5)?,
        created_at: from_db_timestamp(6, &row.get::<_, String>(6)?)?,
    })
}

const SESSION_COLUMNS: &str =
    "id, motor_group_id, name, started_at, ended_at, notes, created_at";

// ==========================================
// MotorGroupRepository - 电机组仓储
// ==========================================
pub struct MotorGroupRepository {
    conn: Arc<Mutex<Connection>>,
}

impl MotorGroupRepository {
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 创建电机组（名称唯一）
    pub fn create(&self, name: &str, description: &str) -> RepositoryResult<MotorGroup> {
        let conn = self.get_conn()?;
        let now = Utc::now();
        conn.execute(
            "INSERT INTO motor_group (name, description, created_at) VALUES (?1, ?2, ?3)",
            params![name, description, to_db_timestamp(&now)],
        )?;
        Ok(MotorGroup {
            id: conn.last_insert_rowid(),
            name: name.to_string(),
            description: description.to_string(),
            created_at: now,
        })
    }

    pub fn find_by_id(&self, id: i64) -> RepositoryResult<Option<MotorGroup>> {
        let conn = self.get_conn()?;
        let group = conn
            .query_row(
                "SELECT id, name, description, created_at FROM motor_group WHERE id = ?1",
                params![id],
                map_motor_group,
            )
            .optional()?;
        Ok(group)
    }
}

// ==========================================
// SessionRepository - 会话仓储
// ==========================================
pub struct SessionRepository {
    conn: Arc<Mutex<Connection>>,
}

impl SessionRepository {
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 创建会话
    ///
    /// # 错误
    /// - ValidationError: ended_at 早于 started_at
    /// - ForeignKeyViolation: 电机组不存在
    pub fn create(
        &self,
        motor_group_id: i64,
        name: &str,
        started_at: DateTime<Utc>,
        ended_at: Option<DateTime<Utc>>,
        notes: &str,
    ) -> RepositoryResult<Session> {
        validate_session_window(started_at, ended_at).map_err(RepositoryError::ValidationError)?;

        let conn = self.get_conn()?;
        let now = Utc::now();
        conn.execute(
            r#"
            INSERT INTO session (motor_group_id, name, started_at, ended_at, notes, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                motor_group_id,
                name,
                to_db_timestamp(&started_at),
                ended_at.as_ref().map(to_db_timestamp),
                notes,
                to_db_timestamp(&now),
            ],
        )?;

        Ok(Session {
            id: conn.last_insert_rowid(),
            motor_group_id,
            name: name.to_string(),
            started_at,
            ended_at,
            notes: notes.to_string(),
            created_at: now,
        })
    }

    pub fn find_by_id(&self, id: i64) -> RepositoryResult<Option<Session>> {
        let conn = self.get_conn()?;
        let session = conn
            .query_row(
                &format!("SELECT {SESSION_COLUMNS} FROM session WHERE id = ?1"),
                params![id],
                map_session,
            )
            .optional()?;
        Ok(session)
    }

    /// 查询电机组下的会话（按开始时间倒序）
    pub fn list_by_motor_group(&self, motor_group_id: i64) -> RepositoryResult<Vec<Session>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {SESSION_COLUMNS} FROM session WHERE motor_group_id = ?1 ORDER BY started_at DESC, id DESC"
        ))?;
        let sessions = stmt
            .query_map(params![motor_group_id], map_session)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(sessions)
    }
}
