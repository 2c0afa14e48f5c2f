use std::path::PathBuf;

use clap::Parser;

use crate::event_log::DEFAULT_LOG_PATH;
use crate::port_trap::DEFAULT_BANNER;

/// IPTrap, bans every address that connects to a trapped TCP port
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// TCP ports to trap; invalid entries are skipped
    #[arg(value_name = "PORT", allow_negative_numbers = true)]
    pub ports: Vec<String>,

    /// File capture events are appended to
    #[arg(long = "log-file", default_value = DEFAULT_LOG_PATH)]
    pub log_file: PathBuf,

    /// Line sent to every peer before hanging up
    #[arg(long = "banner", default_value = DEFAULT_BANNER)]
    pub banner: String,

    /// Report firewall commands instead of running them
    #[arg(long = "dry-run")]
    pub dry_run: bool,

    /// Log level
    #[arg(long = "log-level", default_value = "info")]
    pub log_level: String,
}

pub fn parse() -> Args {
    Args::parse()
}
