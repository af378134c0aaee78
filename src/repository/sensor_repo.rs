// ==========================================
// 试验台遥测系统 - 传感器 / 通道 Repository
// ==========================================
// 职责: 试验台、传感器、传感器通道的数据访问
// 红线: Repository 不含业务规则，只做数据 CRUD
//       （通道解析策略与自动补建顺序由 importer::SensorResolver 决定）
// ==========================================

use crate::db::{from_db_timestamp, to_db_timestamp};
use crate::domain::telemetry::{Sensor, SensorChannel, Stand};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex, MutexGuard};

// ==========================================
// SensorChannelRepository Trait
// ==========================================
// 用途: 传感器解析所需的元数据访问
// 实现者: SensorChannelRepositoryImpl（使用 rusqlite）
//
// get_or_create_* 依赖表上的唯一约束实现查找或创建，
// 并发导入同时补建时由数据库保证只产生一条记录。
pub trait SensorChannelRepository: Send + Sync {
    /// 查询测量该测量量的传感器（按 sensor_id 升序取第一条通道）
    fn find_first_sensor_for_quantity(&self, quantity_id: i64) -> RepositoryResult<Option<Sensor>>;

    /// 按名称排序的第一个试验台
    fn find_first_stand(&self) -> RepositoryResult<Option<Stand>>;

    /// 按名称查找或创建试验台
    ///
    /// # 返回
    /// - (Stand, created): created=true 表示本次新建
    fn get_or_create_stand(&self, name: &str) -> RepositoryResult<(Stand, bool)>;

    /// 在试验台下按名称查找或创建传感器
    fn get_or_create_sensor(&self, stand_id: i64, name: &str) -> RepositoryResult<(Sensor, bool)>;

    /// 查找或创建 (传感器, 测量量) 通道
    fn get_or_create_channel(
        &self,
        sensor_id: i64,
        quantity_id: i64,
    ) -> RepositoryResult<(SensorChannel, bool)>;
}

fn map_stand(row: &Row<'_>) -> rusqlite::Result<Stand> {
    Ok(Stand {
        id: row.get(0)?,
        name: row.get(1)?,
        location: row.get(2)?,
        description: row.get(3)?,
        created_at: from_db_timestamp(4, &row.get::<_, String>(4)?)?,
    })
}

fn map_sensor(row: &Row<'_>) -> rusqlite::Result<Sensor> {
    Ok(Sensor {
        id: row.get(0)?,
        stand_id: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        created_at: from_db_timestamp(4, &row.get::<_, String>(4)?)?,
    })
}

fn map_channel(row: &Row<'_>) -> rusqlite::Result<SensorChannel> {
    Ok(SensorChannel {
        id: row.get(0)?,
        sensor_id: row.get(1)?,
        quantity_id: row.get(2)?,
        label: row.get(3)?,
    })
}

// ==========================================
// SensorChannelRepositoryImpl
// ==========================================
pub struct SensorChannelRepositoryImpl {
    conn: Arc<Mutex<Connection>>,
}

impl SensorChannelRepositoryImpl {
    /// 从已有连接创建仓储实例
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 创建试验台（名称重复返回 UniqueConstraintViolation）
    pub fn create_stand(
        &self,
        name: &str,
        location: &str,
        description: &str,
    ) -> RepositoryResult<Stand> {
        let conn = self.get_conn()?;
        let now = Utc::now();
        conn.execute(
            "INSERT INTO stand (name, location, description, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![name, location, description, to_db_timestamp(&now)],
        )?;
        Ok(Stand {
            id: conn.last_insert_rowid(),
            name: name.to_string(),
            location: location.to_string(),
            description: description.to_string(),
            created_at: now,
        })
    }

    /// 创建传感器
    pub fn create_sensor(
        &self,
        stand_id: i64,
        name: &str,
        description: &str,
    ) -> RepositoryResult<Sensor> {
        let conn = self.get_conn()?;
        let now = Utc::now();
        conn.execute(
            "INSERT INTO sensor (stand_id, name, description, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![stand_id, name, description, to_db_timestamp(&now)],
        )?;
        Ok(Sensor {
            id: conn.last_insert_rowid(),
            stand_id,
            name: name.to_string(),
            description: description.to_string(),
            created_at: now,
        })
    }

    /// 创建通道
    pub fn create_channel(
        &self,
        sensor_id: i64,
        quantity_id: i64,
        label: &str,
    ) -> RepositoryResult<SensorChannel> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO sensor_channel (sensor_id, quantity_id, label) VALUES (?1, ?2, ?3)",
            params![sensor_id, quantity_id, label],
        )?;
        Ok(SensorChannel {
            id: conn.last_insert_rowid(),
            sensor_id,
            quantity_id,
            label: label.to_string(),
        })
    }

    /// 查询测量量的全部通道（按 sensor_id 升序）
    pub fn list_channels_by_quantity(&self, quantity_id: i64) -> RepositoryResult<Vec<SensorChannel>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, sensor_id, quantity_id, label
            FROM sensor_channel
            WHERE quantity_id = ?1
            ORDER BY sensor_id, id
            "#,
        )?;
        let channels = stmt
            .query_map(params![quantity_id], map_channel)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(channels)
    }

    /// 查询试验台下的传感器（按名称排序）
    pub fn list_sensors_by_stand(&self, stand_id: i64) -> RepositoryResult<Vec<Sensor>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, stand_id, name, description, created_at
            FROM sensor
            WHERE stand_id = ?1
            ORDER BY name, id
            "#,
        )?;
        let sensors = stmt
            .query_map(params![stand_id], map_sensor)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(sensors)
    }
}

impl SensorChannelRepository for SensorChannelRepositoryImpl {
    fn find_first_sensor_for_quantity(&self, quantity_id: i64) -> RepositoryResult<Option<Sensor>> {
        let conn = self.get_conn()?;
        let sensor = conn
            .query_row(
                r#"
                SELECT s.id, s.stand_id, s.name, s.description, s.created_at
                FROM sensor_channel c
                JOIN sensor s ON s.id = c.sensor_id
                WHERE c.quantity_id = ?1
                ORDER BY c.sensor_id ASC, c.id ASC
                LIMIT 1
                "#,
                params![quantity_id],
                map_sensor,
            )
            .optional()?;
        Ok(sensor)
    }

    fn find_first_stand(&self) -> RepositoryResult<Option<Stand>> {
        let conn = self.get_conn()?;
        let stand = conn
            .query_row(
                r#"
                SELECT id, name, location, description, created_at
                FROM stand
                ORDER BY name ASC, id ASC
                LIMIT 1
                "#,
                [],
                map_stand,
            )
            .optional()?;
        Ok(stand)
    }

    fn get_or_create_stand(&self, name: &str) -> RepositoryResult<(Stand, bool)> {
        let conn = self.get_conn()?;
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO stand (name, created_at) VALUES (?1, ?2)",
            params![name, to_db_timestamp(&Utc::now())],
        )?;
        let stand = conn.query_row(
            "SELECT id, name, location, description, created_at FROM stand WHERE name = ?1",
            params![name],
            map_stand,
        )?;
        Ok((stand, inserted == 1))
    }

    fn get_or_create_sensor(&self, stand_id: i64, name: &str) -> RepositoryResult<(Sensor, bool)> {
        let conn = self.get_conn()?;
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO sensor (stand_id, name, created_at) VALUES (?1, ?2, ?3)",
            params![stand_id, name, to_db_timestamp(&Utc::now())],
        )?;
        let sensor = conn.query_row(
            r#"
            SELECT id, stand_id, name, description, created_at
            FROM sensor
            WHERE stand_id = ?1 AND name = ?2
            "#,
            params![stand_id, name],
            map_sensor,
        )?;
        Ok((sensor, inserted == 1))
    }

    fn get_or_create_channel(
        &self,
        sensor_id: i64,
        quantity_id: i64,
    ) -> RepositoryResult<(SensorChannel, bool)> {
        let conn = self.get_conn()?;
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO sensor_channel (sensor_id, quantity_id) VALUES (?1, ?2)",
            params![sensor_id, quantity_id],
        )?;
        let channel = conn.query_row(
            r#"
            SELECT id, sensor_id, quantity_id, label
            FROM sensor_channel
            WHERE sensor_id = ?1 AND quantity_id = ?2
            "#,
            params![sensor_id, quantity_id],
            map_channel,
        )?;
        Ok((channel, inserted == 1))
    }
}
