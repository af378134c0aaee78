// ==========================================
// 试验台遥测系统 - 命令行入口
// ==========================================
// 子命令: init / import / imports
// 数据库: --db 或环境变量 STAND_TELEMETRY_DB_PATH，缺省为用户数据目录
// ==========================================

use anyhow::Context;
use clap::{Parser, Subcommand};
use stand_telemetry::db::{get_default_db_path, DB_PATH_ENV};
use stand_telemetry::{logging, CsvImport, ImportApi};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(name = "stand-telemetry", version, about = "Import stand CSV exports into telemetry sessions")]
struct Cli {
    /// SQLite metadata database
    #[arg(long, global = true, env = DB_PATH_ENV)]
    db: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long, global = true, default_value_t = false)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create the schema and seed the measured-quantity catalog
    Init,

    /// Import a CSV file into a session
    Import {
        csv_path: PathBuf,

        #[arg(long)]
        session: i64,

        /// Print the import record as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// List import records of a session, newest first
    Imports {
        #[arg(long)]
        session: i64,
    },
}

fn print_summary(record: &CsvImport) {
    if record.is_success() {
        println!(
            "imported {} rows, {} failed",
            record.rows_processed, record.rows_failed
        );
    } else if record.error_message.is_empty() {
        println!("import failed: unknown error");
    } else {
        println!("import failed: {}", record.error_message);
    }
}

fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let db_path = cli.db.unwrap_or_else(get_default_db_path);
    tracing::debug!(db_path = %db_path, "使用数据库");
    let api = ImportApi::new(db_path);

    match cli.command {
        Command::Init => {
            let seeded = api.init_database().context("failed to initialise database")?;
            println!("database ready at {} ({} quantities added)", api.db_path(), seeded);
            Ok(ExitCode::SUCCESS)
        }
        Command::Import {
            csv_path,
            session,
            json,
        } => {
            let record = api
                .import_file(session, &csv_path)
                .with_context(|| format!("cannot import {}", csv_path.display()))?;

            if json {
                println!("{}", serde_json::to_string_pretty(&record)?);
            } else {
                print_summary(&record);
            }

            Ok(if record.is_success() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Command::Imports { session } => {
            let records = api.list_session_imports(session)?;
            if records.is_empty() {
                println!("no imports for session {}", session);
            }
            for r in records {
                println!(
                    "#{:<6} {:<8} processed={:<6} failed={:<6} {} {}",
                    r.id,
                    r.status.to_db_str(),
                    r.rows_processed,
                    r.rows_failed,
                    r.created_at.format("%Y-%m-%d %H:%M:%S"),
                    r.file_name
                );
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    if cli.log_json {
        logging::init_json();
    } else {
        logging::init();
    }

    tracing::debug!(version = stand_telemetry::VERSION, "{}", stand_telemetry::APP_NAME);
    run(cli)
}
