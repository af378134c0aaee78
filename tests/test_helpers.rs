// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 临时数据库、测试会话、时序库写入器替身
// ==========================================
#![allow(dead_code)]

use chrono::{TimeZone, Utc};
use rusqlite::Connection;
use stand_telemetry::db::{init_schema, open_sqlite_connection, seed_quantity_catalog};
use stand_telemetry::repository::{MotorGroupRepository, SessionRepository};
use stand_telemetry::timeseries::{TimeseriesError, TimeseriesResult, TimeseriesWriter};
use stand_telemetry::{SensorReading, Session};
use std::error::Error;
use std::sync::{Arc, Mutex};
use tempfile::NamedTempFile;

/// 创建临时测试数据库（schema + 测量量目录）
///
/// # 返回
/// - NamedTempFile: 临时数据库文件（需要保持存活）
/// - String: 数据库文件路径
pub fn create_test_db() -> Result<(NamedTempFile, String), Box<dyn Error>> {
    let temp_file = NamedTempFile::new()?;
    let db_path = temp_file.path().to_str().unwrap().to_string();

    let conn = open_sqlite_connection(&db_path)?;
    init_schema(&conn)?;
    seed_quantity_catalog(&conn)?;

    Ok((temp_file, db_path))
}

/// 打开共享连接（与仓储 from_connection 配合使用）
pub fn open_shared(db_path: &str) -> Arc<Mutex<Connection>> {
    Arc::new(Mutex::new(open_sqlite_connection(db_path).unwrap()))
}

/// 创建电机组与会话
pub fn create_test_session(conn: &Arc<Mutex<Connection>>) -> Session {
    let group = MotorGroupRepository::from_connection(conn.clone())
        .create("Group A", "test motors")
        .unwrap();
    SessionRepository::from_connection(conn.clone())
        .create(
            group.id,
            "Run 1",
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            None,
            "",
        )
        .unwrap()
}

/// 完整表头
pub const HEADER: &str = "ts,throttle,temperature,humidity,rpm,noise,thrust";

/// 拼接表头与数据行
pub fn csv_with_rows(rows: &[&str]) -> String {
    let mut text = String::from(HEADER);
    text.push('\n');
    for row in rows {
        text.push_str(row);
        text.push('\n');
    }
    text
}

// ==========================================
// 写入器替身
// ==========================================

/// 记录每次写入的批次
#[derive(Default)]
pub struct RecordingWriter {
    pub batches: Mutex<Vec<(i64, Vec<SensorReading>)>>,
}

impl RecordingWriter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn batch_count(&self) -> usize {
        self.batches.lock().unwrap().len()
    }

    pub fn all_readings(&self) -> Vec<SensorReading> {
        self.batches
            .lock()
            .unwrap()
            .iter()
            .flat_map(|(_, readings)| readings.clone())
            .collect()
    }
}

impl TimeseriesWriter for RecordingWriter {
    fn write_points(
        &self,
        session: &Session,
        readings: &[SensorReading],
    ) -> TimeseriesResult<usize> {
        self.batches
            .lock()
            .unwrap()
            .push((session.id, readings.to_vec()));
        Ok(readings.len())
    }
}

/// 始终拒绝写入
pub struct FailingWriter;

impl TimeseriesWriter for FailingWriter {
    fn write_points(&self, _: &Session, _: &[SensorReading]) -> TimeseriesResult<usize> {
        Err(TimeseriesError::Backend {
            status: 503,
            body: "bucket unavailable".to_string(),
        })
    }
}

/// 写入时 panic（用于验证导入记录的兜底终结）
pub struct PanickingWriter;

impl TimeseriesWriter for PanickingWriter {
    fn write_points(&self, _: &Session, _: &[SensorReading]) -> TimeseriesResult<usize> {
        panic!("writer exploded");
    }
}
