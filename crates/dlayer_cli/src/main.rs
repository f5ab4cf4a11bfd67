//! `dlayer` command-line entry point.
//!
//! # Responsibility
//! - Layer CLI flags over `StoreConfig::from_env`.
//! - Drive the log service and print every streamed result as one JSON line.

mod args;

use args::{Cli, Command};
use clap::Parser;
use dlayer_core::driver::Session;
use dlayer_core::{
    init_logging, LogEntry, LogRepository, LogService, ResultStream, ServiceInfo, StoreConfig,
};
use log::info;
use serde_json::json;
use std::collections::HashMap;
use std::error::Error;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

type CliResult<T> = Result<T, Box<dyn Error>>;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

/// Returns `false` when any streamed result carried an error.
async fn run(cli: Cli) -> CliResult<bool> {
    let config = load_config(&cli)?;
    if let Some(log_dir) = &config.log_dir {
        init_logging(&config.log_level, &absolute(log_dir)?.to_string_lossy())?;
    }

    let session = config.open_session()?;
    let repo = LogRepository::new(session.database(&config.db_name))
        .with_capacity(config.stream_capacity);
    info!(
        "event=cli_start module=cli status=ok db_name={} persistent={}",
        config.db_name,
        config.db_path.is_some()
    );

    let ok = match cli.command {
        Command::Ping => {
            session.ping()?;
            println!("{}", json!({ "ping": "ok" }));
            true
        }
        Command::Info => {
            println!("{}", ServiceInfo::current());
            true
        }
        Command::Init => {
            repo.ensure_indexes()?;
            println!("{}", json!({ "index": "ts_1", "status": "ok" }));
            true
        }
        Command::Save { entry, id } => {
            let mut entry = LogEntry::new(serde_json::from_str::<serde_json::Value>(&entry)?);
            entry.id = id;
            print_stream(LogService::new(repo).save(entry)).await
        }
        Command::List { limit, ts } => {
            let mut values = HashMap::new();
            if let Some(ts) = ts {
                values.insert("ts".to_string(), ts);
            }
            print_stream(LogService::new(repo).search(&values, limit)?).await
        }
        Command::Get { id } => print_stream(LogService::new(repo).get(id)).await,
    };

    session.close();
    Ok(ok)
}

fn load_config(cli: &Cli) -> CliResult<StoreConfig> {
    let mut config = StoreConfig::from_env()?;
    if let Some(db) = &cli.db {
        config.db_path = Some(db.clone());
    }
    if let Some(log_dir) = &cli.log_dir {
        config.log_dir = Some(log_dir.clone());
    }
    if let Some(level) = &cli.log_level {
        config.log_level = level.clone();
    }
    Ok(config)
}

fn absolute(path: &Path) -> CliResult<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

async fn print_stream(mut stream: ResultStream<LogEntry>) -> bool {
    let mut ok = true;
    while let Some(result) = stream.next().await {
        ok &= result.is_ok();
        println!("{result}");
    }
    ok
}
