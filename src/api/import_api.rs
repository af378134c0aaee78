// ==========================================
// 试验台遥测系统 - CSV 导入API
// ==========================================
// 职责: 交互式上传与批处理工具共用的导入入口
// 说明: 导入结果（含失败）以 CsvImport 记录返回；
//       ApiError 仅表示会话不存在、文件不可读或元数据库故障
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::config::ConfigManager;
use crate::db::{init_schema, open_sqlite_connection, seed_quantity_catalog};
use crate::domain::telemetry::{CsvImport, Session};
use crate::importer::{CsvImporter, ImportResult};
use crate::repository::{CsvImportRepository, SessionRepository};
use crate::timeseries::{InfluxWriter, TimeseriesWriter};
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// 导入API
pub struct ImportApi {
    db_path: String,
    // 未指定时按配置创建 InfluxWriter
    writer: Option<Arc<dyn TimeseriesWriter>>,
}

impl ImportApi {
    /// 创建新的ImportApi实例
    pub fn new(db_path: String) -> Self {
        Self {
            db_path,
            writer: None,
        }
    }

    /// 指定时序库写入器（替代按配置创建的 InfluxWriter）
    pub fn with_writer(mut self, writer: Arc<dyn TimeseriesWriter>) -> Self {
        self.writer = Some(writer);
        self
    }

    pub fn db_path(&self) -> &str {
        &self.db_path
    }

    fn open(&self) -> ApiResult<Arc<Mutex<Connection>>> {
        let conn = open_sqlite_connection(&self.db_path)
            .map_err(|e| ApiError::DatabaseConnectionError(format!("{}: {}", self.db_path, e)))?;
        Ok(Arc::new(Mutex::new(conn)))
    }

    fn load_session(&self, conn: &Arc<Mutex<Connection>>, session_id: i64) -> ApiResult<Session> {
        SessionRepository::from_connection(conn.clone())
            .find_by_id(session_id)?
            .ok_or_else(|| ApiError::NotFound(format!("session(id={})不存在", session_id)))
    }

    fn resolve_writer(&self, config: &ConfigManager) -> ImportResult<Arc<dyn TimeseriesWriter>> {
        if let Some(writer) = &self.writer {
            return Ok(writer.clone());
        }
        let settings = config.influx_settings()?;
        debug!(url = %settings.url, bucket = %settings.bucket, "按配置创建时序库写入器");
        Ok(Arc::new(InfluxWriter::new(settings)?))
    }

    /// 初始化元数据库（建表 + 测量量目录）
    ///
    /// # 返回
    /// - 新写入的测量量条数
    pub fn init_database(&self) -> ApiResult<usize> {
        let conn = self.open()?;
        let guard = conn
            .lock()
            .map_err(|e| ApiError::DatabaseConnectionError(format!("数据库锁获取失败: {}", e)))?;
        init_schema(&guard)?;
        let seeded = seed_quantity_catalog(&guard)?;
        info!(db_path = %self.db_path, seeded, "元数据库初始化完成");
        Ok(seeded)
    }

    /// 导入上传的 CSV 内容
    ///
    /// # 参数
    /// - session_id: 目标会话
    /// - content: 文件原始字节
    /// - file_name: 原始文件名（写入导入记录）
    ///
    /// # 返回
    /// - Ok(CsvImport): 已终结的导入记录（success 或 failed）
    /// - Err(ApiError::NotFound): 会话不存在
    ///
    /// 配置读取与写入器创建在导入记录创建之后进行，其失败记为 failed 记录
    pub fn import_csv(
        &self,
        session_id: i64,
        content: &[u8],
        file_name: &str,
    ) -> ApiResult<CsvImport> {
        let conn = self.open()?;
        let session = self.load_session(&conn, session_id)?;

        let config = ConfigManager::from_connection(conn.clone());
        let record = CsvImporter::import_csv_deferred(conn, &session, content, file_name, || {
            let settings = config.importer_settings()?;
            let writer = self.resolve_writer(&config)?;
            Ok((writer, settings))
        })?;
        Ok(record)
    }

    /// 导入磁盘上的 CSV 文件
    pub fn import_file(&self, session_id: i64, path: &Path) -> ApiResult<CsvImport> {
        if !path.is_file() {
            return Err(ApiError::InvalidInput(format!(
                "文件不存在: {}",
                path.display()
            )));
        }

        let content = std::fs::read(path)
            .map_err(|e| ApiError::ImportError(format!("文件读取失败: {}", e)))?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        self.import_csv(session_id, &content, &file_name)
    }

    /// 查询导入记录
    pub fn get_import(&self, import_id: i64) -> ApiResult<CsvImport> {
        let conn = self.open()?;
        CsvImportRepository::from_connection(conn)
            .find_by_id(import_id)?
            .ok_or_else(|| ApiError::NotFound(format!("csv_import(id={})不存在", import_id)))
    }

    /// 查询会话的导入记录（最新在前）
    pub fn list_session_imports(&self, session_id: i64) -> ApiResult<Vec<CsvImport>> {
        let conn = self.open()?;
        self.load_session(&conn, session_id)?;
        Ok(CsvImportRepository::from_connection(conn).list_by_session(session_id)?)
    }
}
