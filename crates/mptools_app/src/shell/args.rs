use std::path::PathBuf;

use clap::{Parser, ValueEnum};

#[derive(Parser, Debug, Clone)]
#[command(name = "mptools")]
#[command(about = "Quiz page tools: auto-advance, overlay cleanup, selection unlock, calculator")]
#[command(version)]
pub struct Cli {
    /// Local HTML file to open
    #[arg(long, conflicts_with = "url")]
    pub page: Option<PathBuf>,

    /// Page URL to open; takes precedence over the saved start page
    #[arg(long)]
    pub url: Option<String>,

    /// Save this URL as the start page and exit
    #[arg(long)]
    pub save_url: Option<String>,

    /// Directory holding class.json and the saved feature state
    #[arg(long, default_value = ".")]
    pub state_dir: PathBuf,

    /// Where log output goes
    #[arg(long, value_enum, default_value_t = LogTarget::Terminal)]
    pub log: LogTarget,

    /// Stop auto-advance after this many failed attempts in a row
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub max_failures: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogTarget {
    Terminal,
    File,
    Both,
}
