//! nlshell_core - natural-language shell
//!
//! Turns requests like "create a folder called notes" into literal shell
//! commands and runs them against a per-session executor.
//!
//! Modules:
//! - rules: Rule catalog (built-in table, YAML rule files, overrides)
//! - interpreter: Free text to ordered command list, keyword suggestions
//! - executor: Builtin commands plus external commands with a timeout
//! - fs_ops: File and subprocess primitives
//! - cwd_tracker: Per-session working directory
//! - process_table: ps / top / kill backed by sysinfo
//! - session: Mode handling, multi-step execution, state persistence
//! - config: YAML configuration
//! - logging: tracing subscriber setup
//! - error: Library error type

pub mod config;
pub mod cwd_tracker;
pub mod error;
pub mod executor;
pub mod fs_ops;
pub mod interpreter;
pub mod logging;
pub mod process_table;
pub mod rules;
pub mod session;

// Re-export key types for convenience
pub use config::{LogConfig, ShellConfig};

pub use cwd_tracker::{CdResult, CwdTracker};

pub use error::{Result, ShellError};

pub use executor::{ExecOutcome, Executor, ExecutorOptions, EXIT_STATUS};

pub use interpreter::{is_passthrough, normalize, Interpreter};

pub use rules::{MultiStepRule, Rule, RuleCatalog};

pub use session::{InputMode, Notice, Session, SessionState, StepReport, Turn};
