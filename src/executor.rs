//! Literal command executor
//!
//! Runs one command line at a time. Builtins (file operations, `cd`,
//! `alias`, `ps`, ...) are handled in-process against per-executor state;
//! anything else goes to the platform shell. Failures are values, not
//! errors: every call yields an [`ExecOutcome`].

use crate::cwd_tracker::CwdTracker;
use crate::fs_ops::{self, ReadFileOpts, RunShellOpts, WriteFileOpts};
use crate::process_table;
use crate::session::InputMode;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

/// Status reported by `exit`/`quit`: the session should end
pub const EXIT_STATUS: i32 = -1;

/// Default limit for external commands
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";

/// Result of executing one command
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecOutcome {
    pub output: String,
    pub status: i32,
    pub error: String,
    /// Set by `ai` / `normal`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode_switch: Option<InputMode>,
}

impl ExecOutcome {
    pub fn ok(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            ..Self::default()
        }
    }

    pub fn fail(error: impl Into<String>) -> Self {
        Self {
            status: 1,
            error: error.into(),
            ..Self::default()
        }
    }

    fn exit() -> Self {
        Self {
            output: "exit".to_string(),
            status: EXIT_STATUS,
            ..Self::default()
        }
    }

    fn switch_mode(mode: InputMode) -> Self {
        let output = match mode {
            InputMode::NaturalLanguage => {
                "Natural-language mode enabled. Type 'normal' to return to literal commands."
            }
            InputMode::Literal => "Literal command mode enabled.",
        };
        Self {
            output: output.to_string(),
            mode_switch: Some(mode),
            ..Self::default()
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == 0
    }

    pub fn is_exit(&self) -> bool {
        self.status == EXIT_STATUS
    }
}

#[derive(Clone, Debug)]
pub struct ExecutorOptions {
    pub start_dir: Option<PathBuf>,
    pub command_timeout: Duration,
}

impl Default for ExecutorOptions {
    fn default() -> Self {
        Self {
            start_dir: None,
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }
}

/// Per-session command executor
pub struct Executor {
    cwd: CwdTracker,
    env: BTreeMap<String, String>,
    aliases: BTreeMap<String, String>,
    history: Vec<String>,
    command_timeout: Duration,
}

impl Default for Executor {
    fn default() -> Self {
        Self::new(ExecutorOptions::default())
    }
}

impl Executor {
    pub fn new(opts: ExecutorOptions) -> Self {
        Self {
            cwd: CwdTracker::new(opts.start_dir),
            env: std::env::vars().collect(),
            aliases: BTreeMap::new(),
            history: Vec::new(),
            command_timeout: opts.command_timeout,
        }
    }

    pub fn cwd(&self) -> &CwdTracker {
        &self.cwd
    }

    pub fn cwd_mut(&mut self) -> &mut CwdTracker {
        &mut self.cwd
    }

    pub fn history(&self) -> &[String] {
        &self.history
    }

    pub fn aliases(&self) -> &BTreeMap<String, String> {
        &self.aliases
    }

    /// Replace history and aliases, e.g. from a saved session
    pub fn restore(&mut self, history: Vec<String>, aliases: BTreeMap<String, String>) {
        self.history = history;
        self.aliases = aliases;
    }

    /// Execute one literal command line
    pub async fn execute(&mut self, command: &str) -> ExecOutcome {
        let command = command.trim();
        if command.is_empty() {
            return ExecOutcome::ok("");
        }
        self.history.push(command.to_string());

        let command = self.expand_alias(command);
        let parts = match shlex::split(&command) {
            Some(parts) => parts,
            None => return ExecOutcome::fail("Command parsing error: unbalanced quotes"),
        };
        let Some((name, args)) = parts.split_first() else {
            return ExecOutcome::ok("");
        };
        let name = name.to_lowercase();

        tracing::info!(command = %command, cwd = %self.cwd.get_cwd_string(), "executing");

        let outcome = match name.as_str() {
            "cd" => self.cmd_cd(args).await,
            "pwd" => ExecOutcome::ok(self.cwd.get_cwd_string()),
            "ls" | "dir" => self.cmd_ls(args).await,
            "mkdir" => self.cmd_mkdir(args).await,
            "rm" | "del" => self.cmd_rm(args).await,
            "rmdir" => self.cmd_rmdir(args).await,
            "cp" | "copy" => self.cmd_copy(args).await,
            "mv" | "move" => self.cmd_move(args).await,
            "cat" | "type" => self.cmd_cat(args).await,
            "echo" => self.cmd_echo(args).await,
            "touch" => self.cmd_touch(args).await,
            "set" | "export" => self.cmd_set_env(args),
            "alias" => self.cmd_alias(args),
            "history" => self.cmd_history(),
            "clear" | "cls" => ExecOutcome::ok(CLEAR_SCREEN),
            "help" => ExecOutcome::ok(BUILTIN_HELP),
            "exit" | "quit" => ExecOutcome::exit(),
            "ai" => ExecOutcome::switch_mode(InputMode::NaturalLanguage),
            "normal" => ExecOutcome::switch_mode(InputMode::Literal),
            "ps" | "tasklist" => blocking("ps", process_table::render_ps).await,
            "top" | "htop" => blocking("top", process_table::render_top).await,
            "kill" | "taskkill" => self.cmd_kill(args).await,
            _ => self.run_external(&command).await,
        };

        if !outcome.is_success() && !outcome.is_exit() {
            tracing::warn!(command = %command, status = outcome.status, error = %outcome.error, "command failed");
        }
        outcome
    }

    fn expand_alias(&self, command: &str) -> String {
        let (head, rest) = command
            .split_once(char::is_whitespace)
            .unwrap_or((command, ""));
        match self.aliases.get(head) {
            Some(expansion) if rest.is_empty() => expansion.clone(),
            Some(expansion) => format!("{} {}", expansion, rest),
            None => command.to_string(),
        }
    }

    async fn cmd_cd(&mut self, args: &[String]) -> ExecOutcome {
        let result = self.cwd.cd(args.first().map(String::as_str)).await;
        match (result.ok, result.cwd, result.error) {
            (true, Some(cwd), _) => ExecOutcome::ok(cwd),
            (_, _, error) => ExecOutcome::fail(error.unwrap_or_else(|| "cd: failed".to_string())),
        }
    }

    async fn cmd_ls(&self, args: &[String]) -> ExecOutcome {
        let flags = Flags::parse(args);
        let show_hidden = flags.has('a', "--all");
        let long_format = flags.has('l', "--long");

        let (shown, target) = match flags.operands.first() {
            Some(path) => (path.clone(), self.cwd.resolve(path)),
            None => (
                self.cwd.get_cwd_string(),
                self.cwd.get_cwd().to_path_buf(),
            ),
        };

        let meta = match tokio::fs::metadata(&target).await {
            Ok(meta) => meta,
            Err(_) => {
                return ExecOutcome::fail(format!(
                    "ls: cannot access '{}': No such file or directory",
                    shown
                ))
            }
        };
        if meta.is_file() {
            return ExecOutcome::ok(shown);
        }

        let mut entries = match tokio::fs::read_dir(&target).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
                return ExecOutcome::fail(format!(
                    "ls: cannot open directory '{}': Permission denied",
                    shown
                ))
            }
            Err(e) => return ExecOutcome::fail(format!("ls: {}: {}", shown, e)),
        };

        let mut items = Vec::new();
        loop {
            match entries.next_entry().await {
                Ok(Some(entry)) => {
                    let name = entry.file_name().to_string_lossy().to_string();
                    if show_hidden || !name.starts_with('.') {
                        items.push((name, entry.metadata().await.ok()));
                    }
                }
                Ok(None) => break,
                Err(e) => return ExecOutcome::fail(format!("ls: {}: {}", shown, e)),
            }
        }
        items.sort_by(|a, b| a.0.cmp(&b.0));

        if long_format {
            let lines: Vec<String> = items
                .iter()
                .map(|(name, meta)| match meta {
                    Some(meta) => format!("{} {:>8} {}", permission_string(meta), meta.len(), name),
                    None => format!("?????????? {:>8} {}", "?", name),
                })
                .collect();
            ExecOutcome::ok(lines.join("\n"))
        } else {
            let names: Vec<&str> = items.iter().map(|(name, _)| name.as_str()).collect();
            ExecOutcome::ok(names.join("  "))
        }
    }

    async fn cmd_mkdir(&self, args: &[String]) -> ExecOutcome {
        let flags = Flags::parse(args);
        if flags.operands.is_empty() {
            return ExecOutcome::fail("mkdir: missing operand");
        }
        let parents = flags.has('p', "--parents");

        for name in &flags.operands {
            let path = self.cwd.resolve(name);
            let result = if parents {
                tokio::fs::create_dir_all(&path).await
            } else {
                tokio::fs::create_dir(&path).await
            };
            match result {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    return ExecOutcome::fail(format!(
                        "mkdir: cannot create directory '{}': File exists",
                        name
                    ))
                }
                Err(e) => {
                    return ExecOutcome::fail(format!(
                        "mkdir: cannot create directory '{}': {}",
                        name, e
                    ))
                }
            }
        }

        ExecOutcome::ok(format!("Created directory: {}", flags.operands.join(", ")))
    }

    async fn cmd_rm(&self, args: &[String]) -> ExecOutcome {
        let flags = Flags::parse(args);
        if flags.operands.is_empty() {
            return ExecOutcome::fail("rm: missing operand");
        }
        let recursive = flags.has('r', "--recursive") || flags.has('R', "--recursive");
        let force = flags.has('f', "--force");

        let mut removed = Vec::new();
        for item in &flags.operands {
            let path = self.cwd.resolve(item);
            let result = match tokio::fs::symlink_metadata(&path).await {
                Ok(meta) if meta.is_dir() => {
                    if !recursive {
                        return ExecOutcome::fail(format!(
                            "rm: cannot remove '{}': Is a directory",
                            item
                        ));
                    }
                    tokio::fs::remove_dir_all(&path).await
                }
                Ok(_) => tokio::fs::remove_file(&path).await,
                Err(_) if force => continue,
                Err(_) => {
                    return ExecOutcome::fail(format!(
                        "rm: cannot remove '{}': No such file or directory",
                        item
                    ))
                }
            };
            match result {
                Ok(()) => removed.push(item.as_str()),
                Err(_) if force => {}
                Err(e) => return ExecOutcome::fail(format!("rm: cannot remove '{}': {}", item, e)),
            }
        }

        if removed.is_empty() {
            ExecOutcome::ok("")
        } else {
            ExecOutcome::ok(format!("Removed: {}", removed.join(", ")))
        }
    }

    async fn cmd_rmdir(&self, args: &[String]) -> ExecOutcome {
        let flags = Flags::parse(args);
        if flags.has('r', "--recursive") {
            return self.cmd_rm(args).await;
        }
        if flags.operands.is_empty() {
            return ExecOutcome::fail("rmdir: missing operand");
        }

        for name in &flags.operands {
            if let Err(e) = tokio::fs::remove_dir(self.cwd.resolve(name)).await {
                let reason = match e.kind() {
                    io::ErrorKind::NotFound => "No such file or directory".to_string(),
                    _ => e.to_string(),
                };
                return ExecOutcome::fail(format!("rmdir: failed to remove '{}': {}", name, reason));
            }
        }

        ExecOutcome::ok(format!("Removed: {}", flags.operands.join(", ")))
    }

    async fn cmd_copy(&self, args: &[String]) -> ExecOutcome {
        let flags = Flags::parse(args);
        let [source, dest, ..] = flags.operands.as_slice() else {
            return ExecOutcome::fail("cp: missing destination file operand");
        };

        let from = self.cwd.resolve(source);
        if tokio::fs::metadata(&from).await.is_err() {
            return ExecOutcome::fail(format!(
                "cp: cannot stat '{}': No such file or directory",
                source
            ));
        }

        match fs_ops::copy_path(&from, self.cwd.resolve(dest)).await {
            Ok(_) => ExecOutcome::ok(format!("Copied {} to {}", source, dest)),
            Err(e) => ExecOutcome::fail(format!("cp: {}", root_message(&e))),
        }
    }

    async fn cmd_move(&self, args: &[String]) -> ExecOutcome {
        let flags = Flags::parse(args);
        let [source, dest, ..] = flags.operands.as_slice() else {
            return ExecOutcome::fail("mv: missing destination file operand");
        };

        let from = self.cwd.resolve(source);
        if tokio::fs::symlink_metadata(&from).await.is_err() {
            return ExecOutcome::fail(format!(
                "mv: cannot stat '{}': No such file or directory",
                source
            ));
        }

        match fs_ops::move_path(&from, self.cwd.resolve(dest)).await {
            Ok(_) => ExecOutcome::ok(format!("Moved {} to {}", source, dest)),
            Err(e) => ExecOutcome::fail(format!("mv: {}", root_message(&e))),
        }
    }

    async fn cmd_cat(&self, args: &[String]) -> ExecOutcome {
        if args.is_empty() {
            return ExecOutcome::fail("cat: missing file operand");
        }

        let mut output = Vec::with_capacity(args.len());
        for name in args {
            match fs_ops::read_text_file(self.cwd.resolve(name), ReadFileOpts::default()).await {
                Ok(content) => output.push(content),
                Err(e) => return ExecOutcome::fail(format!("cat: {}: {}", name, describe_io(&e))),
            }
        }

        ExecOutcome::ok(output.join("\n"))
    }

    async fn cmd_echo(&self, args: &[String]) -> ExecOutcome {
        // only an unquoted `>` token (or one starting with `>`) redirects
        let Some(pos) = args.iter().position(|arg| arg.starts_with('>')) else {
            return ExecOutcome::ok(args.join(" "));
        };

        let (filename, rest) = if args[pos] == ">" {
            match args.get(pos + 1) {
                Some(name) => (name.as_str(), &args[pos + 2..]),
                None => return ExecOutcome::fail("echo: missing redirect target"),
            }
        } else {
            (&args[pos][1..], &args[pos + 1..])
        };
        let content = args[..pos]
            .iter()
            .chain(rest)
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(" ");

        let opts = WriteFileOpts { ensure_dir: false };
        match fs_ops::write_text_file(self.cwd.resolve(filename), &content, opts).await {
            Ok(_) => ExecOutcome::ok(format!("Content written to {}", filename)),
            Err(e) => ExecOutcome::fail(format!(
                "echo: cannot write to '{}': {}",
                filename,
                describe_io(&e)
            )),
        }
    }

    async fn cmd_touch(&self, args: &[String]) -> ExecOutcome {
        if args.is_empty() {
            return ExecOutcome::fail("touch: missing file operand");
        }

        for name in args {
            if let Err(e) = fs_ops::touch_file(self.cwd.resolve(name)).await {
                return ExecOutcome::fail(format!(
                    "touch: cannot create '{}': {}",
                    name,
                    describe_io(&e)
                ));
            }
        }

        ExecOutcome::ok(format!("Created/updated: {}", args.join(", ")))
    }

    fn cmd_set_env(&mut self, args: &[String]) -> ExecOutcome {
        if args.is_empty() {
            let vars: Vec<String> = self
                .env
                .iter()
                .map(|(key, value)| format!("{}={}", key, value))
                .collect();
            return ExecOutcome::ok(vars.join("\n"));
        }

        for arg in args {
            match arg.split_once('=') {
                Some((key, value)) => {
                    self.env.insert(key.to_string(), value.to_string());
                }
                None => {
                    return match self.env.get(arg) {
                        Some(value) => ExecOutcome::ok(format!("{}={}", arg, value)),
                        None => ExecOutcome::fail(format!("Variable '{}' not found", arg)),
                    }
                }
            }
        }

        ExecOutcome::ok("Environment variable(s) set")
    }

    fn cmd_alias(&mut self, args: &[String]) -> ExecOutcome {
        if args.is_empty() {
            if self.aliases.is_empty() {
                return ExecOutcome::ok("No aliases defined");
            }
            let lines: Vec<String> = self
                .aliases
                .iter()
                .map(|(name, command)| format!("alias {}='{}'", name, command))
                .collect();
            return ExecOutcome::ok(lines.join("\n"));
        }

        for arg in args {
            match arg.split_once('=') {
                Some((name, command)) => {
                    self.aliases.insert(
                        name.to_string(),
                        command.trim_matches(['"', '\'']).to_string(),
                    );
                }
                None => {
                    return match self.aliases.get(arg) {
                        Some(command) => ExecOutcome::ok(format!("alias {}='{}'", arg, command)),
                        None => ExecOutcome::fail(format!("Alias '{}' not found", arg)),
                    }
                }
            }
        }

        ExecOutcome::ok("Alias(es) created")
    }

    fn cmd_history(&self) -> ExecOutcome {
        if self.history.is_empty() {
            return ExecOutcome::ok("No commands in history");
        }
        let lines: Vec<String> = self
            .history
            .iter()
            .enumerate()
            .map(|(i, command)| format!("{:>4}  {}", i + 1, command))
            .collect();
        ExecOutcome::ok(lines.join("\n"))
    }

    async fn cmd_kill(&self, args: &[String]) -> ExecOutcome {
        let Some(raw) = args.first() else {
            return ExecOutcome::fail("kill: missing process ID");
        };
        let Ok(pid) = raw.parse::<u32>() else {
            return ExecOutcome::fail(format!("kill: invalid process ID '{}'", raw));
        };

        match tokio::task::spawn_blocking(move || process_table::terminate(pid)).await {
            Ok(Ok(())) => ExecOutcome::ok(format!("Process {} terminated", pid)),
            Ok(Err(e)) => ExecOutcome::fail(format!("kill: {}", e)),
            Err(e) => ExecOutcome::fail(format!("kill: {}", e)),
        }
    }

    async fn run_external(&self, command: &str) -> ExecOutcome {
        let opts = RunShellOpts {
            cwd: self.cwd.get_cwd().to_path_buf(),
            env: self.env.clone(),
            timeout_ms: self.command_timeout.as_millis() as u64,
        };
        let result = fs_ops::run_shell(command, opts).await;

        if result.timed_out {
            return ExecOutcome::fail(format!(
                "Command timed out after {} seconds",
                self.command_timeout.as_secs()
            ));
        }
        if let Some(error) = result.error {
            return ExecOutcome::fail(error);
        }

        let status = match result.code {
            Some(EXIT_STATUS) | None => 1,
            Some(code) => code,
        };
        ExecOutcome {
            output: result.stdout,
            status,
            error: result.stderr,
            mode_switch: None,
        }
    }
}

/// Split arguments into flags and operands. Short flags may be combined
/// (`-la`).
struct Flags {
    short: Vec<char>,
    long: Vec<String>,
    operands: Vec<String>,
}

impl Flags {
    fn parse(args: &[String]) -> Self {
        let mut flags = Self {
            short: Vec::new(),
            long: Vec::new(),
            operands: Vec::new(),
        };
        for arg in args {
            if arg.starts_with("--") {
                flags.long.push(arg.clone());
            } else if arg.len() > 1 && arg.starts_with('-') {
                flags.short.extend(arg.chars().skip(1));
            } else {
                flags.operands.push(arg.clone());
            }
        }
        flags
    }

    fn has(&self, short: char, long: &str) -> bool {
        self.short.contains(&short) || self.long.iter().any(|l| l == long)
    }
}

async fn blocking(name: &str, render: fn() -> String) -> ExecOutcome {
    match tokio::task::spawn_blocking(render).await {
        Ok(output) => ExecOutcome::ok(output),
        Err(e) => ExecOutcome::fail(format!("{}: {}", name, e)),
    }
}

fn describe_io(err: &anyhow::Error) -> String {
    match fs_ops::io_error_kind(err) {
        Some(io::ErrorKind::NotFound) => "No such file or directory".to_string(),
        Some(io::ErrorKind::PermissionDenied) => "Permission denied".to_string(),
        _ => root_message(err),
    }
}

fn root_message(err: &anyhow::Error) -> String {
    err.root_cause().to_string()
}

#[cfg(unix)]
fn permission_string(meta: &std::fs::Metadata) -> String {
    use std::os::unix::fs::PermissionsExt;

    let mode = meta.permissions().mode();
    let mut out = String::with_capacity(10);
    out.push(if meta.is_dir() { 'd' } else { '-' });
    for shift in [6, 3, 0] {
        let bits = (mode >> shift) & 0o7;
        out.push(if bits & 0o4 != 0 { 'r' } else { '-' });
        out.push(if bits & 0o2 != 0 { 'w' } else { '-' });
        out.push(if bits & 0o1 != 0 { 'x' } else { '-' });
    }
    out
}

#[cfg(not(unix))]
fn permission_string(meta: &std::fs::Metadata) -> String {
    let kind = if meta.is_dir() { 'd' } else { '-' };
    let write = if meta.permissions().readonly() { '-' } else { 'w' };
    format!("{kind}r{write}-r{write}-r{write}-")
}

const BUILTIN_HELP: &str = "Available Commands:

File Operations:
  ls, dir        - List directory contents (-a hidden, -l details)
  cd <path>      - Change directory
  pwd            - Print working directory
  mkdir <name>   - Create directory (-p for parents)
  rmdir <name>   - Remove empty directory
  rm <file>      - Remove file/directory (-r for recursive)
  cp <src> <dst> - Copy file/directory
  mv <src> <dst> - Move/rename file/directory
  cat <file>     - Display file contents
  touch <file>   - Create empty file or update timestamp
  echo <text>    - Display text (use > filename to redirect to file)

System Monitoring:
  ps             - List running processes
  top            - Show system information and top processes
  kill <pid>     - Terminate process by PID

Terminal Features:
  history        - Show command history
  clear, cls     - Clear screen
  alias          - Create command aliases (alias ll='ls -la')
  set, export    - Set environment variables
  help           - Show this help message
  exit, quit     - Exit the terminal

Natural Language:
  ai             - Enter natural-language mode
  normal         - Return to literal commands
  help ai        - Example phrases (in natural-language mode)";
