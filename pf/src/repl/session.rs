//! Interactive session management

use std::collections::HashMap;
use std::sync::Arc;

use colored::Colorize;
use eyre::Result;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing::debug;

use crate::domain::{AuditLog, ClarificationSet};
use crate::pipeline::{Outcome, PipelineController, SessionToken};

/// What the user typed at a prompt
enum Input {
    Line(String),
    Quit,
}

/// Interactive proposal session
///
/// Asks for a project idea, walks the user through any clarification
/// questions, and prints the final proposal.
pub struct InteractiveSession {
    pipeline: Arc<PipelineController>,
}

impl InteractiveSession {
    pub fn new(pipeline: Arc<PipelineController>) -> Self {
        Self { pipeline }
    }

    /// Run until a proposal is printed or the user quits
    pub async fn run(&mut self, initial_text: Option<String>) -> Result<()> {
        self.print_welcome();
        let mut rl = DefaultEditor::new().map_err(|e| eyre::eyre!("Failed to initialize readline: {}", e))?;
        let mut pending = initial_text;

        loop {
            let idea = match pending.take() {
                Some(text) => {
                    println!("{} {}", ">".bright_green(), text);
                    text
                }
                None => match self.read_input(&mut rl, "Describe the project you want to build")? {
                    Input::Line(text) => text,
                    Input::Quit => break,
                },
            };

            let outcome = match self.pipeline.start(&idea).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    debug!(error = %e, "InteractiveSession::run: start failed");
                    println!("{} {}", "!".red(), e.user_message().red());
                    continue;
                }
            };

            match self.clarify(&mut rl, outcome).await? {
                Some(false) => continue,
                Some(true) | None => break,
            }
        }

        println!("Goodbye!");
        Ok(())
    }

    /// Answer questions until the pipeline finishes
    ///
    /// `Some(true)` when a proposal was printed, `Some(false)` when the run
    /// failed and should restart, `None` when the user quit.
    async fn clarify(&self, rl: &mut DefaultEditor, mut outcome: Outcome) -> Result<Option<bool>> {
        loop {
            match outcome {
                Outcome::Proposal { audit, proposal, .. } => {
                    print_audit(&audit);
                    println!();
                    println!("{}", "Proposal".bright_cyan().bold());
                    println!("{}", proposal);
                    return Ok(Some(true));
                }
                Outcome::NeedsClarification { session, questions } => {
                    let answers = match self.ask_questions(rl, &questions)? {
                        Some(answers) => answers,
                        None => return Ok(None),
                    };
                    outcome = match self.resume(session, answers).await {
                        Some(next) => next,
                        None => return Ok(Some(false)),
                    };
                }
            }
        }
    }

    async fn resume(&self, session: SessionToken, answers: HashMap<String, String>) -> Option<Outcome> {
        match self.pipeline.resume(session, &answers).await {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                debug!(error = %e, "InteractiveSession::resume: failed");
                println!("{} {}", "!".red(), e.user_message().red());
                None
            }
        }
    }

    fn ask_questions(
        &self,
        rl: &mut DefaultEditor,
        questions: &ClarificationSet,
    ) -> Result<Option<HashMap<String, String>>> {
        let mut answers = HashMap::new();
        let Some(questions) = questions.questions() else {
            return Ok(Some(answers));
        };

        println!();
        println!(
            "{} {}",
            "A few details are missing.".bright_cyan(),
            "(leave blank to skip)".dimmed()
        );
        for (key, question) in questions {
            println!();
            println!("{}", key.bold());
            match self.read_input(rl, question)? {
                Input::Line(answer) => {
                    answers.insert(key.clone(), answer);
                }
                Input::Quit => return Ok(None),
            }
        }
        Ok(Some(answers))
    }

    /// Read one line, handling slash commands. Blank lines are returned as-is.
    fn read_input(&self, rl: &mut DefaultEditor, label: &str) -> Result<Input> {
        println!("{}", label.bright_blue());
        loop {
            match rl.readline(&format!("{} ", ">".bright_green())) {
                Ok(line) => {
                    let input = line.trim();
                    if !input.is_empty() {
                        let _ = rl.add_history_entry(input);
                    }
                    match input {
                        "/quit" | "/q" | "/exit" => return Ok(Input::Quit),
                        "/help" | "/h" => {
                            self.print_help();
                            continue;
                        }
                        _ => return Ok(Input::Line(input.to_string())),
                    }
                }
                Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                    println!();
                    return Ok(Input::Quit);
                }
                Err(err) => return Err(eyre::eyre!("Readline error: {}", err)),
            }
        }
    }

    fn print_welcome(&self) {
        println!();
        println!("{}", "ProposalForge Interactive Session".bright_cyan().bold());
        println!("Type {} for help, {} to quit", "/help".yellow(), "/quit".yellow());
        println!();
    }

    fn print_help(&self) {
        println!();
        println!("{}", "Available Commands:".bright_cyan());
        println!("  {:14} Show this help", "/help".yellow());
        println!("  {:14} Exit the session", "/quit".yellow());
        println!();
    }
}

fn print_audit(audit: &AuditLog) {
    if audit.is_empty() {
        return;
    }
    println!();
    println!("{}", "Your answers:".bright_cyan());
    for entry in audit.entries() {
        let answer = if entry.is_answered() {
            entry.answer.normal()
        } else {
            "(skipped)".dimmed()
        };
        println!("  {} {}", format!("{}:", entry.question).bold(), answer);
    }
}
