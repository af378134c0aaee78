// ==========================================
// 试验台遥测系统 - CSV 导入编排
// ==========================================
// 流程: 创建 pending 记录 → 解码 → 表头校验 → 加载测量量目录
//       → 逐行解析 + 传感器解析 → 整批写入时序库 → 终结记录
// 状态机: pending → success | failed（离开 pending 后不再变化）
// 红线: 任何退出路径都必须终结导入记录，且只终结一次
// ==========================================

use crate::config::ImporterSettings;
use crate::domain::catalog::CANONICAL_QUANTITIES;
use crate::domain::telemetry::{CsvImport, MeasuredQuantity, SensorReading, Session};
use crate::domain::types::ImportStatus;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::row_parser::{csv_reader, decode_input, RowError, RowParser};
use crate::importer::sensor_resolver::SensorResolver;
use crate::repository::{
    CsvImportRepository, MeasuredQuantityRepository, RepositoryResult, SensorChannelRepository,
    SensorChannelRepositoryImpl,
};
use crate::timeseries::TimeseriesWriter;
use chrono::Utc;
use rusqlite::Connection;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info, instrument, warn};

const INTERRUPTED_MESSAGE: &str = "导入意外中断";

// ==========================================
// PendingImport - 待终结的导入记录
// ==========================================
// 正常返回与捕获到的错误均通过 finish 终结；
// 未调用 finish 就离开作用域（panic 展开）时由 Drop 标记为 failed。
struct PendingImport<'a> {
    repo: &'a CsvImportRepository,
    record: CsvImport,
    finished: bool,
}

impl<'a> PendingImport<'a> {
    fn new(repo: &'a CsvImportRepository, record: CsvImport) -> Self {
        Self {
            repo,
            record,
            finished: false,
        }
    }

    fn count_processed(&mut self) {
        self.record.rows_processed += 1;
    }

    fn count_failed(&mut self) {
        self.record.rows_failed += 1;
    }

    fn finish(mut self, outcome: ImportResult<()>) -> RepositoryResult<CsvImport> {
        match outcome {
            Ok(()) => {
                self.record.status = ImportStatus::Success;
                self.record.error_message.clear();
            }
            Err(e) => {
                self.record.status = ImportStatus::Failed;
                self.record.error_message = e.to_string();
            }
        }
        self.record.finished_at = Some(Utc::now());

        // finalize 失败时不再由 Drop 重试
        self.finished = true;
        self.repo.finalize(&self.record)?;
        Ok(self.record.clone())
    }
}

impl Drop for PendingImport<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }

        self.record.status = ImportStatus::Failed;
        self.record.error_message = INTERRUPTED_MESSAGE.to_string();
        self.record.finished_at = Some(Utc::now());

        match self.repo.finalize(&self.record) {
            Ok(()) => warn!(import_id = self.record.id, "导入中断，记录已标记为失败"),
            Err(e) => error!(import_id = self.record.id, error = %e, "导入中断且无法终结记录"),
        }
    }
}

/// 创建 pending 记录，在终结作用域内执行 body，并记录最终结果
fn guarded_import<F>(
    import_repo: &CsvImportRepository,
    session: &Session,
    file_name: &str,
    body: F,
) -> ImportResult<CsvImport>
where
    F: FnOnce(&mut PendingImport<'_>) -> ImportResult<()>,
{
    let record = import_repo.create_pending(session.id, file_name)?;
    info!(import_id = record.id, file_name = %file_name, "开始导入 CSV");

    let mut pending = PendingImport::new(import_repo, record);
    let outcome = body(&mut pending);
    let record = pending.finish(outcome)?;

    match record.status {
        ImportStatus::Success => info!(
            import_id = record.id,
            rows_processed = record.rows_processed,
            rows_failed = record.rows_failed,
            "CSV 导入完成"
        ),
        _ => warn!(
            import_id = record.id,
            rows_processed = record.rows_processed,
            rows_failed = record.rows_failed,
            error = %record.error_message,
            "CSV 导入失败"
        ),
    }
    Ok(record)
}

// ==========================================
// CsvImporter - 导入编排器
// ==========================================
pub struct CsvImporter<S, W>
where
    S: SensorChannelRepository,
    W: TimeseriesWriter,
{
    import_repo: CsvImportRepository,
    quantity_repo: MeasuredQuantityRepository,
    sensor_repo: S,
    writer: W,
    settings: ImporterSettings,
}

impl<W> CsvImporter<SensorChannelRepositoryImpl, W>
where
    W: TimeseriesWriter,
{
    /// 基于同一个 SQLite 连接装配全部仓储
    pub fn with_sqlite(conn: Arc<Mutex<Connection>>, writer: W, settings: ImporterSettings) -> Self {
        Self::new(
            CsvImportRepository::from_connection(conn.clone()),
            MeasuredQuantityRepository::from_connection(conn.clone()),
            SensorChannelRepositoryImpl::from_connection(conn),
            writer,
            settings,
        )
    }

    /// 先创建导入记录，再装配写入器与导入参数
    ///
    /// setup 的失败（配置值非法、写入器无法创建）同样记为 failed 导入记录
    ///
    /// # 返回
    /// - Ok(CsvImport): 已终结的导入记录（success 或 failed）
    /// - Err: 元数据库无法创建或终结导入记录
    #[instrument(skip(conn, session, content, setup), fields(session_id = session.id, bytes = content.len()))]
    pub fn import_csv_deferred<F>(
        conn: Arc<Mutex<Connection>>,
        session: &Session,
        content: &[u8],
        file_name: &str,
        setup: F,
    ) -> ImportResult<CsvImport>
    where
        F: FnOnce() -> ImportResult<(W, ImporterSettings)>,
    {
        let import_repo = CsvImportRepository::from_connection(conn.clone());
        guarded_import(&import_repo, session, file_name, |pending| {
            let (writer, settings) = setup()?;
            let importer = Self::with_sqlite(conn, writer, settings);
            importer.run(session, content, pending)
        })
    }
}

impl<S, W> CsvImporter<S, W>
where
    S: SensorChannelRepository,
    W: TimeseriesWriter,
{
    pub fn new(
        import_repo: CsvImportRepository,
        quantity_repo: MeasuredQuantityRepository,
        sensor_repo: S,
        writer: W,
        settings: ImporterSettings,
    ) -> Self {
        Self {
            import_repo,
            quantity_repo,
            sensor_repo,
            writer,
            settings,
        }
    }

    pub fn settings(&self) -> &ImporterSettings {
        &self.settings
    }

    /// 导入一份 CSV 到会话
    ///
    /// 表头、测量量目录、时序库写入等错误都会转成 failed 状态的导入记录返回
    ///
    /// # 返回
    /// - Ok(CsvImport): 已终结的导入记录（success 或 failed）
    /// - Err: 元数据库无法创建或终结导入记录
    #[instrument(skip(self, session, content), fields(session_id = session.id, bytes = content.len()))]
    pub fn import_csv(
        &self,
        session: &Session,
        content: &[u8],
        file_name: &str,
    ) -> ImportResult<CsvImport> {
        guarded_import(&self.import_repo, session, file_name, |pending| {
            self.run(session, content, pending)
        })
    }

    fn run(
        &self,
        session: &Session,
        content: &[u8],
        pending: &mut PendingImport<'_>,
    ) -> ImportResult<()> {
        let text = decode_input(content)?;
        let mut reader = csv_reader(text);
        let headers = reader.headers()?.clone();
        let parser = RowParser::from_headers(&headers, self.settings.naive_offset).map_err(|e| {
            error!(error = %e, "表头校验失败");
            e
        })?;

        let catalog = self.load_catalog()?;
        let mut resolver = SensorResolver::new(&self.sensor_repo);
        let mut readings = Vec::new();

        for (idx, record) in reader.records().enumerate() {
            let row_number = idx + 1;
            let record = record?;

            let ts = match parser.parse_ts(&record) {
                Ok(ts) => ts,
                Err(reason) => {
                    debug!(row = row_number, reason = %reason, "行解析失败");
                    pending.count_failed();
                    continue;
                }
            };

            // 每个解析成功的值立即解析传感器；后续单元格失败时
            // 已创建的元数据保留，本行读数丢弃
            let mut row_readings = Vec::new();
            let mut row_error = None;
            for cell in parser.values(&record) {
                let (key, value) = match cell {
                    Ok(cell) => cell,
                    Err(reason) => {
                        row_error = Some(reason);
                        break;
                    }
                };
                let quantity = catalog
                    .get(key)
                    .ok_or_else(|| ImportError::QuantityNotConfigured(key.to_string()))?;
                let sensor = resolver.resolve(quantity)?;
                row_readings.push(SensorReading {
                    ts,
                    sensor_id: sensor.id,
                    quantity: quantity.key.clone(),
                    value,
                });
            }

            if row_error.is_none() && row_readings.is_empty() {
                row_error = Some(RowError::NoValues);
            }
            if let Some(reason) = row_error {
                debug!(row = row_number, reason = %reason, "行解析失败");
                pending.count_failed();
                continue;
            }

            readings.append(&mut row_readings);
            pending.count_processed();
        }

        debug!(
            readings = readings.len(),
            quantities = resolver.resolved_count(),
            provisioned = resolver.provisioned_count(),
            "行解析完成"
        );

        if readings.is_empty() {
            info!("没有可写入的读数，跳过时序库写入");
            return Ok(());
        }

        let written = self.writer.write_points(session, &readings)?;
        info!(points = written, "时序库写入完成");
        Ok(())
    }

    /// 一次性加载六个规范测量量；任一缺失则整次导入失败
    fn load_catalog(&self) -> ImportResult<HashMap<&'static str, MeasuredQuantity>> {
        let mut catalog = HashMap::with_capacity(CANONICAL_QUANTITIES.len());
        for def in &CANONICAL_QUANTITIES {
            let quantity = self
                .quantity_repo
                .find_by_key(def.key)?
                .ok_or_else(|| ImportError::QuantityNotConfigured(def.key.to_string()))?;
            catalog.insert(def.key, quantity);
        }
        Ok(catalog)
    }
}
