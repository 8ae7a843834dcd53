//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::debug;

use crate::config::Config;

/// ProposalForge - turn a project idea into a software proposal
#[derive(Parser)]
#[command(
    name = "pf",
    about = "Turn a free-text project idea into a structured software proposal",
    version = env!("CARGO_PKG_VERSION"),
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Extract the information record from a project idea
    Extract {
        /// Project idea (reads stdin when neither this nor --file is given)
        text: Option<String>,

        /// Read the project idea from a file
        #[arg(short, long, conflicts_with = "text")]
        file: Option<PathBuf>,
    },

    /// Generate clarification questions for a record
    Questions {
        /// Record JSON file
        #[arg(short, long)]
        record: PathBuf,
    },

    /// Merge answers into a record (no model call)
    Merge {
        /// Record JSON file
        #[arg(short, long)]
        record: PathBuf,

        /// Answers JSON file (object of record key to answer)
        #[arg(short, long)]
        answers: PathBuf,
    },

    /// Generate a proposal from a record
    Propose {
        /// Record JSON file
        #[arg(short, long)]
        record: PathBuf,

        /// Ask for a JSON proposal instead of a text document
        #[arg(short, long)]
        structured: bool,
    },

    /// Run the whole pipeline interactively (default)
    Run {
        /// Project idea (prompted for when omitted)
        text: Option<String>,

        /// Read the project idea from a file
        #[arg(short, long, conflicts_with = "text")]
        file: Option<PathBuf>,
    },

    /// Serve the HTTP JSON API
    Serve {
        /// Address to bind, overrides server.bind from config
        #[arg(short, long)]
        bind: Option<String>,
    },
}

/// Get the log file path
pub fn get_log_path() -> PathBuf {
    debug!("get_log_path: called");
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("proposalforge")
        .join("logs")
        .join("proposalforge.log")
}

/// Generate the after_help text with environment checks
pub fn generate_after_help() -> String {
    debug!("generate_after_help: called");
    let config = Config::load(None).unwrap_or_default();
    let mut help = String::new();

    help.push_str("Environment:\n");
    let key_set = config.llm.get_api_key().is_ok();
    help.push_str(&format!("  {} {}\n", icon(key_set), config.llm.api_key_env));
    let tags_found = config.reference.tags_file.exists();
    help.push_str(&format!("  {} {}\n", icon(tags_found), config.reference.tags_file.display()));
    if let Some(timeline) = &config.reference.timeline_file {
        help.push_str(&format!("  {} {} (optional)\n", icon(timeline.exists()), timeline.display()));
    }

    help.push('\n');
    help.push_str(&format!("Logs are written to: {}\n", get_log_path().display()));
    help
}

fn icon(ok: bool) -> &'static str {
    if ok { "\u{2705}" } else { "\u{274C}" }
}
