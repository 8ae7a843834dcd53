//! ProposalForge - project idea to software proposal
//!
//! CLI entry point for the pipeline stages, the interactive session, and the
//! HTTP API.

use std::collections::HashMap;
use std::fs;
use std::io::Read;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{CommandFactory, FromArgMatches};
use eyre::{Context, Result};
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use proposalforge::cli::{Cli, Command, generate_after_help, get_log_path};
use proposalforge::config::Config;
use proposalforge::domain::InformationRecord;
use proposalforge::llm::create_client;
use proposalforge::pipeline::{PipelineController, Services, merge};
use proposalforge::prompts::PromptLoader;
use proposalforge::reference::ReferenceData;
use proposalforge::{repl, server};

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    let log_path = get_log_path();
    if let Some(log_dir) = log_path.parent() {
        fs::create_dir_all(log_dir).context("Failed to create log directory")?;
    }

    // Priority: CLI --log-level > config file > default (INFO)
    let level = match cli_log_level.or(config_log_level) {
        Some(s) => match s.to_uppercase().as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    let log_file = fs::File::create(&log_path).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is normal
    let _ = dotenvy::dotenv();

    let cmd = Cli::command().after_help(generate_after_help());
    let cli = Cli::from_arg_matches(&cmd.get_matches())?;

    // Load log level from config file early (before full config load)
    let config_log_level = Config::load_log_level(cli.config.as_ref());
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    info!(provider = %config.llm.provider, model = %config.llm.model, "ProposalForge loaded config");

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Some(Command::Extract { text, file }) => cmd_extract(&config, text, file).await,
        Some(Command::Questions { record }) => cmd_questions(&config, &record).await,
        Some(Command::Merge { record, answers }) => cmd_merge(&record, &answers),
        Some(Command::Propose { record, structured }) => cmd_propose(&config, &record, structured).await,
        Some(Command::Run { text, file }) => {
            let initial = match (text, file) {
                (None, None) => None,
                (text, file) => Some(read_idea(text, file)?),
            };
            cmd_run(&config, initial).await
        }
        Some(Command::Serve { bind }) => cmd_serve(&config, bind).await,
        None => cmd_run(&config, None).await,
    }
}

/// Build the controller, loading reference data only when proposals are needed
fn build_pipeline(config: &Config, needs_reference: bool) -> Result<PipelineController> {
    debug!(needs_reference, "build_pipeline: called");
    config.validate()?;

    let llm = create_client(&config.llm).context("Failed to create LLM client")?;
    let base = std::env::current_dir().context("Failed to read current directory")?;
    let prompts = Arc::new(PromptLoader::new(base));
    let services = Services::from_config(llm, prompts, &config.llm);

    let reference = if needs_reference {
        ReferenceData::load(&config.reference).context("Failed to load reference data")?
    } else {
        ReferenceData::default()
    };

    Ok(PipelineController::from_config(
        services,
        Arc::new(reference),
        &config.pipeline,
    ))
}

async fn cmd_extract(config: &Config, text: Option<String>, file: Option<PathBuf>) -> Result<()> {
    debug!("cmd_extract: called");
    let idea = read_idea(text, file)?;
    let pipeline = build_pipeline(config, false)?;
    let record = pipeline.extraction().extract(&idea).await?;
    print_json(&record)
}

async fn cmd_questions(config: &Config, record_path: &Path) -> Result<()> {
    debug!(?record_path, "cmd_questions: called");
    let record: InformationRecord = read_json(record_path)?;
    let pipeline = build_pipeline(config, false)?;
    let questions = pipeline.questions().ask(&record).await;
    print_json(&questions)
}

fn cmd_merge(record_path: &Path, answers_path: &Path) -> Result<()> {
    debug!(?record_path, ?answers_path, "cmd_merge: called");
    let record: InformationRecord = read_json(record_path)?;
    let answers: HashMap<String, String> = read_json(answers_path)?;
    let (audit, merged) = merge(&record, &answers);
    print_json(&serde_json::json!({
        "audit": audit.lines(),
        "record": merged,
    }))
}

async fn cmd_propose(config: &Config, record_path: &Path, structured: bool) -> Result<()> {
    debug!(?record_path, structured, "cmd_propose: called");
    let record: InformationRecord = read_json(record_path)?;
    let pipeline = build_pipeline(config, true)?;
    let stage = pipeline
        .proposal()
        .clone()
        .with_structured_output(structured || config.pipeline.structured_output);
    let proposal = stage.propose(&record).await?;
    println!("{}", proposal);
    Ok(())
}

async fn cmd_run(config: &Config, initial: Option<String>) -> Result<()> {
    debug!(has_initial = initial.is_some(), "cmd_run: called");
    let pipeline = Arc::new(build_pipeline(config, true)?);
    repl::run_interactive(pipeline, initial).await
}

async fn cmd_serve(config: &Config, bind: Option<String>) -> Result<()> {
    debug!(?bind, "cmd_serve: called");
    let bind = bind.unwrap_or_else(|| config.server.bind.clone());
    let addr: SocketAddr = bind.parse().context(format!("Invalid bind address '{}'", bind))?;
    let pipeline = Arc::new(build_pipeline(config, true)?);
    println!("Serving ProposalForge API on http://{}", addr);
    server::serve(addr, server::AppState::new(pipeline)).await
}

/// Project idea from the argument, a file, or stdin
fn read_idea(text: Option<String>, file: Option<PathBuf>) -> Result<String> {
    match (text, file) {
        (Some(text), _) => Ok(text),
        (None, Some(path)) => {
            fs::read_to_string(&path).context(format!("Failed to read {}", path.display()))
        }
        (None, None) => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read project idea from stdin")?;
            Ok(buf)
        }
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = fs::read_to_string(path).context(format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).context(format!("Failed to parse {}", path.display()))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
