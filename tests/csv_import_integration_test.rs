// ==========================================
// CSV 导入集成测试
// ==========================================
// 测试目标: 导入编排的计数、终结、自动补建与时序写入行为
// ==========================================

mod test_helpers;

use chrono::{FixedOffset, TimeZone, Utc};
use rusqlite::Connection;
use stand_telemetry::config::ImporterSettings;
use stand_telemetry::importer::{AUTO_SENSOR_NAME, DEFAULT_STAND_NAME};
use stand_telemetry::logging;
use stand_telemetry::repository::{
    CsvImportRepository, MeasuredQuantityRepository, SensorChannelRepository,
    SensorChannelRepositoryImpl,
};
use stand_telemetry::timeseries::TimeseriesWriter;
use stand_telemetry::{CsvImporter, ImportStatus, Session};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex};
use tempfile::NamedTempFile;
use test_helpers::{
    create_test_db, create_test_session, csv_with_rows, open_shared, FailingWriter,
    PanickingWriter, RecordingWriter,
};

struct Env {
    _file: NamedTempFile,
    conn: Arc<Mutex<Connection>>,
    session: Session,
}

fn setup() -> Env {
    logging::init_test();
    let (file, db_path) = create_test_db().unwrap();
    let conn = open_shared(&db_path);
    let session = create_test_session(&conn);
    Env {
        _file: file,
        conn,
        session,
    }
}

fn importer<W: TimeseriesWriter>(
    env: &Env,
    writer: W,
) -> CsvImporter<SensorChannelRepositoryImpl, W> {
    CsvImporter::with_sqlite(env.conn.clone(), writer, ImporterSettings::default())
}

fn sensors(env: &Env) -> SensorChannelRepositoryImpl {
    SensorChannelRepositoryImpl::from_connection(env.conn.clone())
}

fn quantity_id(env: &Env, key: &str) -> i64 {
    MeasuredQuantityRepository::from_connection(env.conn.clone())
        .find_by_key(key)
        .unwrap()
        .unwrap()
        .id
}

#[test]
fn test_single_value_row() {
    let env = setup();
    let writer = RecordingWriter::new();

    let csv = csv_with_rows(&["2024-01-01T00:00:00,5,,,,,"]);
    let record = importer(&env, writer.clone())
        .import_csv(&env.session, csv.as_bytes(), "run1.csv")
        .unwrap();

    assert_eq!(record.status, ImportStatus::Success);
    assert_eq!(record.rows_processed, 1);
    assert_eq!(record.rows_failed, 0);
    assert!(record.error_message.is_empty());
    assert_eq!(record.file_name, "run1.csv");

    assert_eq!(writer.batch_count(), 1);
    let readings = writer.all_readings();
    assert_eq!(readings.len(), 1);
    assert_eq!(readings[0].quantity, "throttle");
    assert_eq!(readings[0].value, 5.0);
    assert_eq!(readings[0].ts, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
}

#[test]
fn test_unparseable_timestamp_counts_failed_without_write() {
    let env = setup();
    let writer = RecordingWriter::new();

    let csv = csv_with_rows(&["not-a-date,1,2,3,4,5,6"]);
    let record = importer(&env, writer.clone())
        .import_csv(&env.session, csv.as_bytes(), "bad_ts.csv")
        .unwrap();

    assert_eq!(record.status, ImportStatus::Success);
    assert_eq!(record.rows_processed, 0);
    assert_eq!(record.rows_failed, 1);
    assert_eq!(writer.batch_count(), 0);
}

#[test]
fn test_missing_columns_fail_before_rows() {
    let env = setup();
    let writer = RecordingWriter::new();

    let csv = "ts,throttle,rpm,noise\n2024-01-01T00:00:00,1,2,3\n";
    let record = importer(&env, writer.clone())
        .import_csv(&env.session, csv.as_bytes(), "partial.csv")
        .unwrap();

    assert_eq!(record.status, ImportStatus::Failed);
    assert_eq!(record.rows_processed, 0);
    assert_eq!(record.rows_failed, 0);
    assert_eq!(
        record.error_message,
        "缺少必需列: humidity, temperature, thrust"
    );
    assert_eq!(writer.batch_count(), 0);
    assert!(sensors(&env).find_first_stand().unwrap().is_none());
}

#[test]
fn test_row_counts_cover_every_data_row() {
    let env = setup();
    let writer = RecordingWriter::new();

    let csv = csv_with_rows(&[
        "2024-01-01T00:00:00,10,20,30,1000,60,5",
        "yesterday,1,2,3,4,5,6",
        "2024-01-01T00:00:01,11,oops,31,1001,61,6",
        "2024-01-01T00:00:02,,,,,,",
        ",1,2,3,4,5,6",
        "2024-01-01T00:00:03,,21.5,,,,",
    ]);
    let record = importer(&env, writer.clone())
        .import_csv(&env.session, csv.as_bytes(), "mixed.csv")
        .unwrap();

    assert_eq!(record.status, ImportStatus::Success);
    assert_eq!(record.rows_processed, 2);
    assert_eq!(record.rows_failed, 4);
    assert_eq!(record.rows_total(), 6);

    // 第一行六个值 + 最后一行一个值；含非法数值的行不产生任何读数
    let readings = writer.all_readings();
    assert_eq!(readings.len(), 7);
    assert!(readings
        .iter()
        .all(|r| r.ts != Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 1).unwrap()));
    assert_eq!(readings[6].quantity, "temperature");
    assert_eq!(readings[6].value, 21.5);
}

#[test]
fn test_cells_before_bad_value_are_provisioned() {
    let env = setup();
    let writer = RecordingWriter::new();

    let csv = csv_with_rows(&["2024-01-01T00:00:00,5,abc,,,,"]);
    let record = importer(&env, writer.clone())
        .import_csv(&env.session, csv.as_bytes(), "half_bad.csv")
        .unwrap();

    assert_eq!(record.status, ImportStatus::Success);
    assert_eq!(record.rows_processed, 0);
    assert_eq!(record.rows_failed, 1);
    assert_eq!(writer.batch_count(), 0);

    // throttle 已在 temperature 失败之前解析，补建结果保留
    let repo = sensors(&env);
    let channels = repo
        .list_channels_by_quantity(quantity_id(&env, "throttle"))
        .unwrap();
    assert_eq!(channels.len(), 1);
    let stand = repo.find_first_stand().unwrap().unwrap();
    let auto_sensors = repo.list_sensors_by_stand(stand.id).unwrap();
    assert_eq!(auto_sensors.len(), 1);
    assert_eq!(auto_sensors[0].name, AUTO_SENSOR_NAME);
    assert_eq!(channels[0].sensor_id, auto_sensors[0].id);

    assert!(repo
        .list_channels_by_quantity(quantity_id(&env, "temperature"))
        .unwrap()
        .is_empty());
}

#[test]
fn test_header_only_file_succeeds_without_write() {
    let env = setup();
    let writer = RecordingWriter::new();

    let csv = csv_with_rows(&[]);
    let record = importer(&env, writer.clone())
        .import_csv(&env.session, csv.as_bytes(), "empty_rows.csv")
        .unwrap();

    assert_eq!(record.status, ImportStatus::Success);
    assert_eq!(record.rows_total(), 0);
    assert_eq!(writer.batch_count(), 0);
}

#[test]
fn test_empty_file_fails() {
    let env = setup();
    let record = importer(&env, RecordingWriter::new())
        .import_csv(&env.session, b"", "nothing.csv")
        .unwrap();

    assert_eq!(record.status, ImportStatus::Failed);
    assert_eq!(record.error_message, "CSV 文件为空");
}

#[test]
fn test_bom_and_header_case_accepted() {
    let env = setup();
    let writer = RecordingWriter::new();

    let csv = "\u{feff}TS, Throttle ,Temperature,Humidity,RPM,Noise,Thrust,Operator\n\
               2024-01-01 08:00:00,50,,,,,,alice\n";
    let record = importer(&env, writer.clone())
        .import_csv(&env.session, csv.as_bytes(), "excel_export.csv")
        .unwrap();

    assert_eq!(record.status, ImportStatus::Success);
    assert_eq!(record.rows_processed, 1);
    assert_eq!(writer.all_readings()[0].value, 50.0);
}

#[test]
fn test_invalid_utf8_fails() {
    let env = setup();
    let mut bytes = csv_with_rows(&["2024-01-01T00:00:00,5,,,,,"]).into_bytes();
    bytes.extend_from_slice(b"\xff\xfe\n");

    let record = importer(&env, RecordingWriter::new())
        .import_csv(&env.session, &bytes, "latin1.csv")
        .unwrap();

    assert_eq!(record.status, ImportStatus::Failed);
    assert!(record.error_message.contains("UTF-8"));
}

#[test]
fn test_backend_failure_keeps_counts_and_provisioning() {
    let env = setup();

    let csv = csv_with_rows(&[
        "2024-01-01T00:00:00,5,,,,,",
        "bad,5,,,,,",
    ]);
    let record = importer(&env, FailingWriter)
        .import_csv(&env.session, csv.as_bytes(), "run.csv")
        .unwrap();

    assert_eq!(record.status, ImportStatus::Failed);
    assert!(record.error_message.contains("bucket unavailable"));
    assert_eq!(record.rows_processed, 1);
    assert_eq!(record.rows_failed, 1);

    // 自动补建的元数据不回滚
    let stand = sensors(&env).find_first_stand().unwrap().unwrap();
    assert_eq!(stand.name, DEFAULT_STAND_NAME);
    let channels = sensors(&env)
        .list_channels_by_quantity(quantity_id(&env, "throttle"))
        .unwrap();
    assert_eq!(channels.len(), 1);
}

#[test]
fn test_missing_catalog_entry_fails_import() {
    let env = setup();
    MeasuredQuantityRepository::from_connection(env.conn.clone())
        .delete_by_key("noise")
        .unwrap();

    let writer = RecordingWriter::new();
    let csv = csv_with_rows(&["2024-01-01T00:00:00,5,,,,,"]);
    let record = importer(&env, writer.clone())
        .import_csv(&env.session, csv.as_bytes(), "run.csv")
        .unwrap();

    assert_eq!(record.status, ImportStatus::Failed);
    assert_eq!(record.error_message, "测量量未配置: noise");
    assert_eq!(writer.batch_count(), 0);
}

#[test]
fn test_auto_provisioning_happens_once() {
    let env = setup();
    let writer = RecordingWriter::new();

    let csv = csv_with_rows(&[
        "2024-01-01T00:00:00,1,,,100,,",
        "2024-01-01T00:00:01,2,,,200,,",
        "2024-01-01T00:00:02,3,,,300,,",
    ]);
    let importer = importer(&env, writer.clone());
    importer
        .import_csv(&env.session, csv.as_bytes(), "first.csv")
        .unwrap();
    importer
        .import_csv(&env.session, csv.as_bytes(), "second.csv")
        .unwrap();

    let repo = sensors(&env);
    let stand = repo.find_first_stand().unwrap().unwrap();
    let auto_sensors = repo.list_sensors_by_stand(stand.id).unwrap();
    assert_eq!(auto_sensors.len(), 1);
    assert_eq!(auto_sensors[0].name, AUTO_SENSOR_NAME);

    for key in ["throttle", "rpm"] {
        let channels = repo.list_channels_by_quantity(quantity_id(&env, key)).unwrap();
        assert_eq!(channels.len(), 1, "quantity {key}");
        assert_eq!(channels[0].sensor_id, auto_sensors[0].id);
    }
    // 未出现的测量量不补建
    assert!(repo
        .list_channels_by_quantity(quantity_id(&env, "thrust"))
        .unwrap()
        .is_empty());

    let readings = writer.all_readings();
    assert_eq!(readings.len(), 12);
    assert!(readings.iter().all(|r| r.sensor_id == auto_sensors[0].id));
}

#[test]
fn test_existing_channels_are_used() {
    let env = setup();
    let repo = sensors(&env);
    let stand = repo.create_stand("Bench 7", "Hall B", "").unwrap();
    let thermo = repo.create_sensor(stand.id, "Thermocouple", "").unwrap();
    let tacho = repo.create_sensor(stand.id, "Tachometer", "").unwrap();
    repo.create_channel(thermo.id, quantity_id(&env, "temperature"), "T")
        .unwrap();
    repo.create_channel(tacho.id, quantity_id(&env, "rpm"), "RPM")
        .unwrap();

    let writer = RecordingWriter::new();
    let csv = csv_with_rows(&["2024-01-01T00:00:00,,41.5,,1800,,"]);
    let record = importer(&env, writer.clone())
        .import_csv(&env.session, csv.as_bytes(), "bench7.csv")
        .unwrap();

    assert_eq!(record.status, ImportStatus::Success);
    let readings = writer.all_readings();
    assert_eq!(readings.len(), 2);
    assert_eq!(readings[0].sensor_id, thermo.id);
    assert_eq!(readings[1].sensor_id, tacho.id);

    // 没有触发补建
    assert_eq!(repo.list_sensors_by_stand(stand.id).unwrap().len(), 2);
    assert_eq!(repo.find_first_stand().unwrap().unwrap().id, stand.id);
}

#[test]
fn test_record_is_finalized_in_store() {
    let env = setup();
    let csv = csv_with_rows(&["2024-01-01T00:00:00,5,,,,,"]);
    let returned = importer(&env, RecordingWriter::new())
        .import_csv(&env.session, csv.as_bytes(), "run.csv")
        .unwrap();

    let stored = CsvImportRepository::from_connection(env.conn.clone())
        .find_by_id(returned.id)
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, ImportStatus::Success);
    assert_eq!(stored.rows_processed, 1);
    assert_eq!(stored.session_id, env.session.id);
    assert!(stored.finished_at.is_some());
}

#[test]
fn test_panic_during_write_still_finalizes() {
    let env = setup();
    let importer = importer(&env, PanickingWriter);
    let csv = csv_with_rows(&["2024-01-01T00:00:00,5,,,,,"]);

    let result = catch_unwind(AssertUnwindSafe(|| {
        importer.import_csv(&env.session, csv.as_bytes(), "boom.csv")
    }));
    assert!(result.is_err());

    let records = CsvImportRepository::from_connection(env.conn.clone())
        .list_by_session(env.session.id)
        .unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status, ImportStatus::Failed);
    assert_eq!(records[0].rows_processed, 1);
    assert!(records[0].finished_at.is_some());
}

#[test]
fn test_naive_timestamps_use_configured_offset() {
    let env = setup();
    let writer = RecordingWriter::new();
    let settings = ImporterSettings {
        naive_offset: FixedOffset::east_opt(2 * 3600).unwrap(),
    };
    let importer = CsvImporter::with_sqlite(env.conn.clone(), writer.clone(), settings);

    let csv = csv_with_rows(&[
        "2024-06-01T12:00:00,1,,,,,",
        "2024-06-01T12:00:00Z,2,,,,,",
    ]);
    importer
        .import_csv(&env.session, csv.as_bytes(), "offset.csv")
        .unwrap();

    let readings = writer.all_readings();
    assert_eq!(readings[0].ts, Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).unwrap());
    assert_eq!(readings[1].ts, Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap());
}
