// ==========================================
// 试验台遥测系统 - 测量量仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================

use crate::domain::telemetry::MeasuredQuantity;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex, MutexGuard};

fn map_quantity(row: &Row<'_>) -> rusqlite::Result<MeasuredQuantity> {
    Ok(MeasuredQuantity {
        id: row.get(0)?,
        key: row.get(1)?,
        name: row.get(2)?,
        unit: row.get(3)?,
    })
}

/// 测量量仓储
/// 职责: 管理 measured_quantity 表
pub struct MeasuredQuantityRepository {
    conn: Arc<Mutex<Connection>>,
}

impl MeasuredQuantityRepository {
    /// 从已有连接创建仓储实例
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 按唯一键查询
    pub fn find_by_key(&self, key: &str) -> RepositoryResult<Option<MeasuredQuantity>> {
        let conn = self.get_conn()?;
        let quantity = conn
            .query_row(
                "SELECT id, key, name, unit FROM measured_quantity WHERE key = ?1",
                params![key],
                map_quantity,
            )
            .optional()?;
        Ok(quantity)
    }

    /// 按名称排序列出全部测量量
    pub fn list_all(&self) -> RepositoryResult<Vec<MeasuredQuantity>> {
        let conn = self.get_conn()?;
        let mut stmt =
            conn.prepare("SELECT id, key, name, unit FROM measured_quantity ORDER BY name, id")?;
        let quantities = stmt
            .query_map([], map_quantity)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(quantities)
    }

    /// 新增或更新（按 key）
    pub fn upsert(&self, key: &str, name: &str, unit: &str) -> RepositoryResult<MeasuredQuantity> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO measured_quantity (key, name, unit) VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET name = excluded.name, unit = excluded.unit
            "#,
            params![key, name, unit],
        )?;
        let quantity = conn.query_row(
            "SELECT id, key, name, unit FROM measured_quantity WHERE key = ?1",
            params![key],
            map_quantity,
        )?;
        Ok(quantity)
    }

    /// 删除（仅用于维护工具与测试）
    pub fn delete_by_key(&self, key: &str) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let affected = conn.execute("DELETE FROM measured_quantity WHERE key = ?1", params![key])?;
        Ok(affected)
    }
}
