/*!
 * nlshell - natural-language shell
 *
 * Interactive shell that accepts literal commands or plain-English requests,
 * plus one-shot subcommands for interpreting and running text from scripts.
 */

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use nlshell_core::config::ShellConfig;
use nlshell_core::executor::{Executor, ExecutorOptions};
use nlshell_core::interpreter::{is_passthrough, Interpreter};
use nlshell_core::logging;
use nlshell_core::rules::RuleCatalog;
use nlshell_core::session::{InputMode, Notice, Session, SessionState, Turn};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use serde::Serialize;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use sysinfo::{System, SystemExt};

#[derive(Parser)]
#[command(name = "nlshell")]
#[command(about = "Shell that understands plain-English file and system requests", long_about = None)]
struct Cli {
    /// Config file (default: $NLSHELL_CONFIG, then <config dir>/nlshell/config.yaml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Extra rule file, tried before the built-in rules
    #[arg(long, global = true)]
    rules: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the interactive shell (the default)
    Repl {
        /// Start in natural-language mode
        #[arg(long)]
        ai: bool,
    },

    /// Show the commands a request translates to, without running them
    Interpret {
        #[arg(required = true)]
        text: Vec<String>,

        /// Emit JSON instead of human-readable output
        #[arg(short, long)]
        json: bool,
    },

    /// Run one request and exit
    Run {
        #[arg(required = true)]
        text: Vec<String>,

        /// Treat the text as a literal command
        #[arg(short, long)]
        literal: bool,

        /// Emit the turn as JSON
        #[arg(short, long)]
        json: bool,

        /// Working directory to start in
        #[arg(long)]
        cwd: Option<PathBuf>,
    },

    /// List the rules in evaluation order
    Rules,

    /// Show example natural-language phrases
    Phrases,

    /// Show version information
    Version,
}

#[derive(Serialize)]
struct InterpretReport<'a> {
    input: &'a str,
    commands: Vec<String>,
    matched: bool,
    suggestions: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let config = ShellConfig::discover(cli.config.as_deref()).context("Failed to load config")?;
    logging::init(&config.log);

    let rules_file = cli.rules.as_deref().or(config.rules_file.as_deref());
    let interpreter = build_interpreter(rules_file)?;

    match cli.command.unwrap_or(Commands::Repl { ai: false }) {
        Commands::Repl { ai } => run_repl(&config, interpreter, ai).await,
        Commands::Interpret { text, json } => {
            interpret_once(&interpreter, &text.join(" "), json)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Run {
            text,
            literal,
            json,
            cwd,
        } => {
            let mode = if literal {
                InputMode::Literal
            } else {
                InputMode::NaturalLanguage
            };
            let mut session = build_session(&config, interpreter, cwd, mode);
            let turn = session.submit(&text.join(" ")).await;

            if json {
                println!("{}", serde_json::to_string_pretty(&turn)?);
            } else {
                print_turn(&turn);
            }
            Ok(if turn.succeeded() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Commands::Rules => {
            for line in interpreter.catalog().describe() {
                println!("{}", line);
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Phrases => {
            println!("{}", interpreter.help());
            Ok(ExitCode::SUCCESS)
        }
        Commands::Version => {
            println!("nlshell v{}", env!("CARGO_PKG_VERSION"));
            println!("Natural-language shell");
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn build_interpreter(rules_file: Option<&Path>) -> Result<Interpreter> {
    let mut catalog = RuleCatalog::builtin();
    if let Some(path) = rules_file {
        let user = RuleCatalog::from_yaml_file(path)
            .with_context(|| format!("Failed to load rules from {:?}", path))?;
        catalog = catalog.with_overrides(user);
    }
    Ok(Interpreter::new(Arc::new(catalog)))
}

fn build_session(
    config: &ShellConfig,
    interpreter: Interpreter,
    cwd: Option<PathBuf>,
    mode: InputMode,
) -> Session {
    let executor = Executor::new(ExecutorOptions {
        start_dir: cwd.or_else(|| config.start_dir.clone()),
        command_timeout: config.command_timeout(),
    });
    Session::new(interpreter, executor, mode)
}

fn interpret_once(interpreter: &Interpreter, input: &str, json: bool) -> Result<()> {
    let commands = interpreter.interpret(input);
    let matched = !is_passthrough(input, &commands);
    let suggestions: Vec<String> = if matched {
        Vec::new()
    } else {
        interpreter.suggest(input).into_iter().collect()
    };

    if json {
        let report = InterpretReport {
            input,
            commands,
            matched,
            suggestions,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if matched {
        for command in &commands {
            println!("{}", command);
        }
    } else if suggestions.is_empty() {
        println!("Could not interpret: {}", input);
    } else {
        println!("Could not interpret: {}", input);
        println!("Did you mean:");
        for suggestion in &suggestions {
            println!("  • {}", suggestion);
        }
    }
    Ok(())
}

async fn run_repl(config: &ShellConfig, interpreter: Interpreter, ai: bool) -> Result<ExitCode> {
    let initial_mode = if ai || config.natural_language {
        InputMode::NaturalLanguage
    } else {
        InputMode::Literal
    };
    let mut session = build_session(config, interpreter, None, initial_mode);

    if let Some(path) = config.state_file.as_deref().filter(|p| p.is_file()) {
        match SessionState::load(path) {
            Ok(state) => {
                session.restore(state).await;
                if ai {
                    session.set_mode(InputMode::NaturalLanguage);
                }
            }
            Err(e) => tracing::warn!(error = %e, "ignoring unreadable session state"),
        }
    }

    let mut rl = DefaultEditor::new().context("Failed to initialise line editor")?;
    let host = System::new()
        .host_name()
        .unwrap_or_else(|| "localhost".to_string());
    let user = std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "user".to_string());

    println!("nlshell v{} - type 'help' for commands, 'ai' for natural language", env!("CARGO_PKG_VERSION"));

    loop {
        let prompt = prompt_for(&session, &user, &host);
        match rl.readline(&prompt) {
            Ok(line) => {
                if line.trim().is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(line.as_str());

                let turn = session.submit(&line).await;
                print_turn(&turn);
                if turn.exit_requested {
                    break;
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("Use 'exit' or 'quit' to exit the terminal");
            }
            Err(ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("nlshell: readline error: {}", e);
                break;
            }
        }
    }

    if let Some(path) = config.state_file.as_deref() {
        if let Err(e) = session.snapshot().save(path) {
            tracing::warn!(error = %e, "failed to save session state");
        }
    }
    println!("Goodbye!");
    Ok(ExitCode::SUCCESS)
}

fn prompt_for(session: &Session, user: &str, host: &str) -> String {
    let cwd = session.executor().cwd().get_cwd();
    let dir = cwd
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| cwd.display().to_string());
    let base = format!("{}@{}:{}$ ", user, host, dir);
    match session.mode() {
        InputMode::NaturalLanguage => format!("[AI] {}", base),
        InputMode::Literal => base,
    }
}

fn print_turn(turn: &Turn) {
    let mut stdout = io::stdout();
    let mut stderr = io::stderr();

    for notice in &turn.notices {
        match notice {
            Notice::NaturalLanguageHelp { text } => println!("{}", text),
            Notice::Suggestions { commands } => {
                println!("Could not interpret command. Did you mean:");
                for command in commands {
                    println!("  • {}", command);
                }
            }
            Notice::Uninterpreted => {
                println!("Could not interpret natural language command.");
                println!("Trying to execute as regular command...");
            }
            Notice::ModeChanged { .. } | Notice::Aborted { .. } => {}
        }
    }

    for step in &turn.steps {
        if step.command != turn.input {
            println!("Executing: {}", step.command);
        }
        if step.outcome.is_exit() {
            continue;
        }
        write_block(&mut stdout, &step.outcome.output);
        write_block(&mut stderr, &step.outcome.error);
    }

    if turn
        .notices
        .iter()
        .any(|n| matches!(n, Notice::Aborted { .. }))
    {
        println!("Stopping execution due to error");
    }
}

fn write_block(out: &mut impl Write, text: &str) {
    if text.is_empty() {
        return;
    }
    let _ = if text.ends_with('\n') {
        write!(out, "{}", text)
    } else {
        writeln!(out, "{}", text)
    };
    let _ = out.flush();
}
