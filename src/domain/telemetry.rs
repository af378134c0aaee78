// ==========================================
// 试验台遥测系统 - 遥测领域实体
// ==========================================
// 职责: 定义元数据实体（试验台/电机组/会话/传感器/通道/导入记录）
//       以及导入过程中的瞬态时序点
// 红线: 不含数据访问逻辑
// ==========================================

use crate::domain::types::ImportStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// Stand - 试验台
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stand {
    pub id: i64,
    pub name: String,        // 全局唯一
    pub location: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

// ==========================================
// MotorGroup - 电机组
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotorGroup {
    pub id: i64,
    pub name: String, // 全局唯一
    pub description: String,
    pub created_at: DateTime<Utc>,
}

// ==========================================
// Session - 采集会话
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: i64,
    pub motor_group_id: i64,
    pub name: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub notes: String,
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// 校验会话时间区间: ended_at 不得早于 started_at
    pub fn validate(&self) -> Result<(), String> {
        validate_session_window(self.started_at, self.ended_at)
    }
}

/// 会话时间区间校验（创建前使用）
pub fn validate_session_window(
    started_at: DateTime<Utc>,
    ended_at: Option<DateTime<Utc>>,
) -> Result<(), String> {
    match ended_at {
        Some(end) if end < started_at => Err(format!(
            "ended_at 不能早于 started_at: started_at={}, ended_at={}",
            started_at.to_rfc3339(),
            end.to_rfc3339()
        )),
        _ => Ok(()),
    }
}

// ==========================================
// MeasuredQuantity - 测量量
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasuredQuantity {
    pub id: i64,
    pub key: String, // 唯一键，如 "temperature"
    pub name: String,
    pub unit: String,
}

// ==========================================
// Sensor - 传感器
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sensor {
    pub id: i64,
    pub stand_id: i64,
    pub name: String, // 同一试验台内唯一
    pub description: String,
    pub created_at: DateTime<Utc>,
}

// ==========================================
// SensorChannel - 传感器通道（传感器 × 测量量）
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorChannel {
    pub id: i64,
    pub sensor_id: i64,
    pub quantity_id: i64,
    pub label: String,
}

// ==========================================
// CsvImport - CSV 导入记录
// ==========================================
// 用途: 每次导入尝试一条，作为审计记录保留
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CsvImport {
    pub id: i64,
    pub session_id: i64,
    pub status: ImportStatus,
    pub rows_processed: u32,
    pub rows_failed: u32,
    pub error_message: String, // 成功时为空
    pub file_name: String,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl CsvImport {
    pub fn is_success(&self) -> bool {
        self.status == ImportStatus::Success
    }

    /// 已计数的数据行总数
    pub fn rows_total(&self) -> u32 {
        self.rows_processed + self.rows_failed
    }
}

// ==========================================
// SensorReading - 已解析并完成传感器归属的读数
// ==========================================
// 导入过程中累积，写入后即丢弃
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    pub ts: DateTime<Utc>,
    pub sensor_id: i64,
    pub quantity: String,
    pub value: f64,
}

// ==========================================
// TimeseriesPoint - 时序点
// ==========================================
// 带会话/电机组/传感器/测量量标签的单个数值
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeseriesPoint {
    pub session_id: i64,
    pub motor_group_id: i64,
    pub sensor_id: i64,
    pub quantity: String,
    pub ts: DateTime<Utc>,
    pub value: f64,
}

impl TimeseriesPoint {
    /// 为读数补齐会话标签
    pub fn from_reading(session: &Session, reading: &SensorReading) -> Self {
        Self {
            session_id: session.id,
            motor_group_id: session.motor_group_id,
            sensor_id: reading.sensor_id,
            quantity: reading.quantity.clone(),
            ts: reading.ts,
            value: reading.value,
        }
    }
}
