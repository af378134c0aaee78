// ==========================================
// 试验台遥测系统 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、写入
// 存储: config_kv 表 (scope_id='global')
// 优先级: 环境变量 > config_kv > 内置默认值
// ==========================================

use chrono::{FixedOffset, Offset, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;

/// 配置键
pub mod config_keys {
    pub const INFLUX_URL: &str = "influx.url";
    pub const INFLUX_ORG: &str = "influx.org";
    pub const INFLUX_BUCKET: &str = "influx.bucket";
    pub const INFLUX_TOKEN: &str = "influx.token";
    pub const INFLUX_MEASUREMENT: &str = "influx.measurement";
    pub const INFLUX_TIMEOUT_SECS: &str = "influx.timeout_secs";
    pub const NAIVE_UTC_OFFSET_MINUTES: &str = "import.naive_utc_offset_minutes";
}

/// 配置键 → 环境变量（仅列出允许环境覆写的键）
const ENV_OVERRIDES: [(&str, &str); 4] = [
    (config_keys::INFLUX_URL, "INFLUXDB_URL"),
    (config_keys::INFLUX_ORG, "INFLUXDB_ORG"),
    (config_keys::INFLUX_BUCKET, "INFLUXDB_BUCKET"),
    (config_keys::INFLUX_TOKEN, "INFLUXDB_TOKEN"),
];

/// 配置错误
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("配置读取失败 (key: {key}): {message}")]
    ReadError { key: String, message: String },

    #[error("配置值格式错误 (key: {key}, value: {value}): {message}")]
    InvalidValue {
        key: String,
        value: String,
        message: String,
    },

    #[error("配置存储失败: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("配置锁获取失败: {0}")]
    LockError(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

// ==========================================
// InfluxSettings - 时序库连接配置
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub struct InfluxSettings {
    pub url: String,
    pub org: String,
    pub bucket: String,
    pub token: String,
    pub measurement: String,
    pub timeout: Duration,
}

impl Default for InfluxSettings {
    fn default() -> Self {
        Self {
            url: "http://localhost:8086".to_string(),
            org: "telemetry-org".to_string(),
            bucket: "telemetry-bucket".to_string(),
            token: "telemetry-token".to_string(),
            measurement: "readings".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

// ==========================================
// ImporterSettings - 导入配置
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImporterSettings {
    /// 不带时区的时间戳按此偏移解释
    pub naive_offset: FixedOffset,
}

impl Default for ImporterSettings {
    fn default() -> Self {
        Self {
            naive_offset: Utc.fix(),
        }
    }
}

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
    env_overrides: bool,
}

impl ConfigManager {
    /// 从已有连接创建 ConfigManager
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self {
            conn,
            env_overrides: true,
        }
    }

    /// 忽略环境变量，仅读取 config_kv 与默认值
    pub fn without_env_overrides(mut self) -> Self {
        self.env_overrides = false;
        self
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    fn get_config_value(&self, key: &str) -> ConfigResult<Option<String>> {
        if self.env_overrides {
            if let Some((_, env_name)) = ENV_OVERRIDES.iter().find(|(k, _)| *k == key) {
                if let Ok(value) = std::env::var(env_name) {
                    if !value.trim().is_empty() {
                        return Ok(Some(value.trim().to_string()));
                    }
                }
            }
        }

        let conn = self
            .conn
            .lock()
            .map_err(|e| ConfigError::LockError(e.to_string()))?;
        conn.query_row(
            "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        )
        .optional()
        .map_err(|e| ConfigError::ReadError {
            key: key.to_string(),
            message: e.to_string(),
        })
    }

    /// 读取 global scope 的配置值（公开方法，供其他模块复用）
    pub fn get_global_config_value(&self, key: &str) -> ConfigResult<Option<String>> {
        self.get_config_value(key)
    }

    /// 写入 global scope 配置
    pub fn set_global(&self, key: &str, value: &str) -> ConfigResult<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| ConfigError::LockError(e.to_string()))?;
        conn.execute(
            r#"
            INSERT INTO config_kv (scope_id, key, value, updated_at)
            VALUES ('global', ?1, ?2, datetime('now'))
            ON CONFLICT(scope_id, key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
            params![key, value],
        )?;
        Ok(())
    }

    fn get_config_or_default(&self, key: &str, default: &str) -> ConfigResult<String> {
        Ok(self
            .get_config_value(key)?
            .unwrap_or_else(|| default.to_string()))
    }

    fn get_parsed<T>(&self, key: &str, default: T) -> ConfigResult<T>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get_config_value(key)? {
            None => Ok(default),
            Some(raw) => raw.trim().parse::<T>().map_err(|e| ConfigError::InvalidValue {
                key: key.to_string(),
                value: raw.clone(),
                message: e.to_string(),
            }),
        }
    }

    /// 时序库连接配置
    pub fn influx_settings(&self) -> ConfigResult<InfluxSettings> {
        let defaults = InfluxSettings::default();
        let timeout_secs = self.get_parsed(
            config_keys::INFLUX_TIMEOUT_SECS,
            defaults.timeout.as_secs(),
        )?;

        Ok(InfluxSettings {
            url: self.get_config_or_default(config_keys::INFLUX_URL, &defaults.url)?,
            org: self.get_config_or_default(config_keys::INFLUX_ORG, &defaults.org)?,
            bucket: self.get_config_or_default(config_keys::INFLUX_BUCKET, &defaults.bucket)?,
            token: self.get_config_or_default(config_keys::INFLUX_TOKEN, &defaults.token)?,
            measurement: self
                .get_config_or_default(config_keys::INFLUX_MEASUREMENT, &defaults.measurement)?,
            timeout: Duration::from_secs(timeout_secs),
        })
    }

    /// 导入配置
    pub fn importer_settings(&self) -> ConfigResult<ImporterSettings> {
        let minutes: i32 = self.get_parsed(config_keys::NAIVE_UTC_OFFSET_MINUTES, 0)?;
        let naive_offset = minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| ConfigError::InvalidValue {
                key: config_keys::NAIVE_UTC_OFFSET_MINUTES.to_string(),
                value: minutes.to_string(),
                message: "偏移量必须在 ±1439 分钟以内".to_string(),
            })?;

        Ok(ImporterSettings { naive_offset })
    }
}
