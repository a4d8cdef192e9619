//! Session - drives one interactive conversation
//! - Literal mode: input goes straight to the executor
//! - Natural-language mode: input is interpreted first, each resulting
//!   command runs in order and the sequence stops at the first failure
//! - State (mode, cwd, history, aliases) persists as JSON between runs

use crate::error::{Result, ShellError};
use crate::executor::{ExecOutcome, Executor};
use crate::interpreter::{is_passthrough, Interpreter};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// How many keyword suggestions a turn offers
const MAX_SUGGESTIONS: usize = 3;

/// Inputs handled by the session itself in every mode
const CONTROL_WORDS: [&str; 5] = ["exit", "quit", "help", "ai", "normal"];

const PHRASE_HELP_TRIGGERS: [&str; 2] = ["help ai", "ai help"];

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputMode {
    #[default]
    Literal,
    NaturalLanguage,
}

/// One executed command and what it produced
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StepReport {
    pub command: String,
    pub outcome: ExecOutcome,
}

/// Session-level messages attached to a turn
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notice {
    ModeChanged { mode: InputMode },
    NaturalLanguageHelp { text: String },
    /// The input matched no rule; these commands might be what was meant
    Suggestions { commands: Vec<String> },
    /// The input matched no rule and had no suggestions; it ran literally
    Uninterpreted,
    /// A step failed and `remaining` later steps were skipped
    Aborted { remaining: usize },
}

/// Everything that happened for one line of input
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Turn {
    pub input: String,
    pub mode: InputMode,
    pub steps: Vec<StepReport>,
    pub notices: Vec<Notice>,
    pub exit_requested: bool,
}

impl Turn {
    fn new(input: &str, mode: InputMode) -> Self {
        Self {
            input: input.to_string(),
            mode,
            steps: Vec::new(),
            notices: Vec::new(),
            exit_requested: false,
        }
    }

    /// True when no executed step failed
    pub fn succeeded(&self) -> bool {
        self.steps
            .iter()
            .all(|step| step.outcome.is_success() || step.outcome.is_exit())
    }
}

pub struct Session {
    interpreter: Interpreter,
    executor: Executor,
    mode: InputMode,
}

impl Session {
    pub fn new(interpreter: Interpreter, executor: Executor, mode: InputMode) -> Self {
        Self {
            interpreter,
            executor,
            mode,
        }
    }

    pub fn mode(&self) -> InputMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: InputMode) {
        self.mode = mode;
    }

    pub fn executor(&self) -> &Executor {
        &self.executor
    }

    pub fn interpreter(&self) -> &Interpreter {
        &self.interpreter
    }

    /// Process one line of user input
    pub async fn submit(&mut self, input: &str) -> Turn {
        let input = input.trim();
        let mut turn = Turn::new(input, self.mode);
        if input.is_empty() {
            return turn;
        }

        let lowered = input.to_lowercase();
        if self.mode == InputMode::Literal || CONTROL_WORDS.contains(&lowered.as_str()) {
            self.run_step(input, &mut turn).await;
            return turn;
        }

        if PHRASE_HELP_TRIGGERS.contains(&lowered.as_str()) {
            turn.notices.push(Notice::NaturalLanguageHelp {
                text: self.interpreter.help().to_string(),
            });
            return turn;
        }

        let commands = self.interpreter.interpret(input);
        if is_passthrough(input, &commands) {
            let commands: Vec<String> = self
                .interpreter
                .suggest(input)
                .into_iter()
                .take(MAX_SUGGESTIONS)
                .collect();
            if commands.is_empty() {
                turn.notices.push(Notice::Uninterpreted);
                self.run_step(input, &mut turn).await;
            } else {
                turn.notices.push(Notice::Suggestions { commands });
            }
            return turn;
        }

        tracing::debug!(input, steps = commands.len(), "interpreted");
        for (i, command) in commands.iter().enumerate() {
            let ok = self.run_step(command, &mut turn).await;
            if turn.exit_requested {
                break;
            }
            if !ok {
                let remaining = commands.len() - i - 1;
                if remaining > 0 {
                    tracing::warn!(command = %command, remaining, "stopping execution due to error");
                    turn.notices.push(Notice::Aborted { remaining });
                }
                break;
            }
        }
        turn
    }

    async fn run_step(&mut self, command: &str, turn: &mut Turn) -> bool {
        let outcome = self.executor.execute(command).await;

        if let Some(mode) = outcome.mode_switch {
            self.mode = mode;
            turn.notices.push(Notice::ModeChanged { mode });
        }
        if outcome.is_exit() {
            turn.exit_requested = true;
        }

        let ok = outcome.is_success();
        turn.steps.push(StepReport {
            command: command.to_string(),
            outcome,
        });
        ok
    }

    /// Capture the state worth keeping between runs
    pub fn snapshot(&self) -> SessionState {
        SessionState {
            mode: self.mode,
            cwd: self.executor.cwd().get_cwd().to_path_buf(),
            history: self.executor.history().to_vec(),
            aliases: self.executor.aliases().clone(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            saved_at: Utc::now(),
        }
    }

    /// Apply a saved state. A saved directory that no longer exists is
    /// skipped.
    pub async fn restore(&mut self, state: SessionState) {
        self.mode = state.mode;
        self.executor.restore(state.history, state.aliases);

        let cwd = state.cwd.display().to_string();
        let result = self.executor.cwd_mut().cd(Some(cwd.as_str())).await;
        if !result.ok {
            tracing::warn!(cwd = %cwd, "saved working directory unavailable");
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SessionState {
    pub mode: InputMode,
    pub cwd: PathBuf,
    #[serde(default)]
    pub history: Vec<String>,
    #[serde(default)]
    pub aliases: BTreeMap<String, String>,
    pub version: String,
    pub saved_at: DateTime<Utc>,
}

impl SessionState {
    /// Save state to a JSON file, creating the parent directory
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let io_err = |source| ShellError::Io {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).map_err(io_err)?;
        Ok(())
    }

    /// Load state from a JSON file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ShellError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let state: SessionState = serde_json::from_str(&content)?;
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::ExecutorOptions;
    use tempfile::{tempdir, TempDir};

    fn session_in(dir: &TempDir, mode: InputMode) -> Session {
        let executor = Executor::new(ExecutorOptions {
            start_dir: Some(dir.path().to_path_buf()),
            ..ExecutorOptions::default()
        });
        Session::new(Interpreter::default(), executor, mode)
    }

    fn commands(turn: &Turn) -> Vec<&str> {
        turn.steps.iter().map(|s| s.command.as_str()).collect()
    }

    #[tokio::test]
    async fn test_literal_mode_runs_input() {
        let dir = tempdir().unwrap();
        let mut session = session_in(&dir, InputMode::Literal);

        let turn = session.submit("create a file called x").await;
        assert_eq!(commands(&turn), vec!["create a file called x"]);
        assert!(!dir.path().join("x").exists());
    }

    #[tokio::test]
    async fn test_natural_language_multi_step() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("file.txt"), "f").unwrap();
        let mut session = session_in(&dir, InputMode::NaturalLanguage);

        let turn = session
            .submit("create a new folder called test and move file.txt into it")
            .await;
        assert_eq!(commands(&turn), vec!["mkdir test", "mv file.txt test/"]);
        assert!(turn.succeeded());
        assert!(turn.notices.is_empty());
        assert!(dir.path().join("test/file.txt").exists());
    }

    #[tokio::test]
    async fn test_failing_step_stops_sequence() {
        let dir = tempdir().unwrap();
        std::fs::create_dir(dir.path().join("test")).unwrap();
        std::fs::write(dir.path().join("file.txt"), "f").unwrap();
        let mut session = session_in(&dir, InputMode::NaturalLanguage);

        let turn = session
            .submit("create a new folder called test and move file.txt into it")
            .await;
        assert_eq!(commands(&turn), vec!["mkdir test"]);
        assert!(!turn.succeeded());
        assert_eq!(turn.notices, vec![Notice::Aborted { remaining: 1 }]);
        assert!(dir.path().join("file.txt").exists());
    }

    #[tokio::test]
    async fn test_unmatched_input_offers_suggestions() {
        let dir = tempdir().unwrap();
        let mut session = session_in(&dir, InputMode::NaturalLanguage);

        let turn = session.submit("all files please").await;
        assert!(turn.steps.is_empty());
        assert_eq!(
            turn.notices,
            vec![Notice::Suggestions {
                commands: vec!["cat".to_string(), "ls".to_string(), "ls -la".to_string()],
            }]
        );
    }

    #[tokio::test]
    async fn test_unmatched_input_without_suggestions_runs_literally() {
        let dir = tempdir().unwrap();
        let mut session = session_in(&dir, InputMode::NaturalLanguage);

        let turn = session.submit("pwd").await;
        assert_eq!(turn.notices, vec![Notice::Uninterpreted]);
        assert_eq!(commands(&turn), vec!["pwd"]);
        assert!(turn.succeeded());
    }

    #[tokio::test]
    async fn test_phrase_help() {
        let dir = tempdir().unwrap();
        let mut session = session_in(&dir, InputMode::NaturalLanguage);

        let turn = session.submit("AI help").await;
        assert!(turn.steps.is_empty());
        assert!(matches!(
            turn.notices.as_slice(),
            [Notice::NaturalLanguageHelp { .. }]
        ));
    }

    #[tokio::test]
    async fn test_mode_toggle_and_exit() {
        let dir = tempdir().unwrap();
        let mut session = session_in(&dir, InputMode::Literal);

        session.submit("ai").await;
        assert_eq!(session.mode(), InputMode::NaturalLanguage);

        let turn = session.submit("normal").await;
        assert_eq!(
            turn.notices,
            vec![Notice::ModeChanged {
                mode: InputMode::Literal
            }]
        );
        assert_eq!(session.mode(), InputMode::Literal);

        session.submit("ai").await;
        assert!(session.submit("exit").await.exit_requested);
    }

    #[tokio::test]
    async fn test_snapshot_restore_roundtrip() {
        let dir = tempdir().unwrap();
        std::fs::create_dir(dir.path().join("work")).unwrap();
        let state_file = dir.path().join("state/session.json");

        let mut session = session_in(&dir, InputMode::Literal);
        session.submit("cd work").await;
        session.submit("alias ll='ls -la'").await;
        session.submit("ai").await;
        session.snapshot().save(&state_file).unwrap();

        let loaded = SessionState::load(&state_file).unwrap();
        assert_eq!(loaded.mode, InputMode::NaturalLanguage);
        assert_eq!(loaded.history.len(), 3);

        let mut fresh = session_in(&dir, InputMode::Literal);
        fresh.restore(loaded).await;
        assert_eq!(fresh.mode(), InputMode::NaturalLanguage);
        assert!(fresh.executor().cwd().get_cwd().ends_with("work"));
        assert_eq!(fresh.executor().aliases().get("ll").map(String::as_str), Some("ls -la"));
    }

    #[test]
    fn test_load_missing_state() {
        let dir = tempdir().unwrap();
        let err = SessionState::load(dir.path().join("none.json")).unwrap_err();
        assert!(matches!(err, ShellError::Io { .. }));
    }
}
