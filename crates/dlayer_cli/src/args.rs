//! CLI argument definitions.
//!
//! Commands:
//! - dlayer ping
//! - dlayer info
//! - dlayer init
//! - dlayer save --entry <json> [--id <uuid>]
//! - dlayer list [--limit <n>] [--ts <YYYY-MM-DD>]
//! - dlayer get <id>

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use uuid::Uuid;

/// Log store over the dlayer document repositories.
#[derive(Parser, Debug)]
#[command(name = "dlayer")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// SQLite store file; in-memory when omitted
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Directory for rolling log files
    #[arg(long, global = true)]
    pub log_dir: Option<PathBuf>,

    /// trace|debug|info|warn|error
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Check that the store answers
    Ping,

    /// Print the service descriptor
    Info,

    /// Create the timestamp index on the log collection
    Init,

    /// Save a log entry
    Save {
        /// Entry payload as JSON
        #[arg(long)]
        entry: String,

        /// Replace the entry stored under this id
        #[arg(long)]
        id: Option<Uuid>,
    },

    /// List log entries, newest first
    List {
        /// Maximum number of entries; 0 lists all
        #[arg(long, default_value_t = 20)]
        limit: usize,

        /// Only entries stamped at local midnight of this date
        #[arg(long)]
        ts: Option<String>,
    },

    /// Fetch one log entry
    Get {
        id: Uuid,
    },
}
