//! fsOps - file and subprocess primitives used by the executor
//! - read_text_file, write_text_file, touch_file
//! - copy_path, move_path (cp/mv semantics: into an existing directory)
//! - run_shell: external command with captured output and a timeout

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::fs;
use tokio::process::Command;
use tokio::time::{timeout, Duration};
use walkdir::WalkDir;

#[derive(Debug, Serialize, Deserialize)]
pub struct ReadFileOpts {
    pub max_bytes: usize,
}

impl Default for ReadFileOpts {
    fn default() -> Self {
        Self {
            max_bytes: 1024 * 1024,
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct WriteFileOpts {
    pub ensure_dir: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WriteFileResult {
    pub ok: bool,
    pub path: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RunShellOpts {
    pub cwd: PathBuf,
    pub env: BTreeMap<String, String>,
    pub timeout_ms: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RunShellResult {
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub error: Option<String>,
    pub timed_out: bool,
}

/// Read a text file, truncating the middle of very large files
pub async fn read_text_file(file_path: impl AsRef<Path>, opts: ReadFileOpts) -> Result<String> {
    let path = file_path.as_ref();
    let content = fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read file: {:?}", path))?;

    if content.len() > opts.max_bytes {
        let half = floor_char_boundary(&content, opts.max_bytes / 2);
        let tail = ceil_char_boundary(&content, content.len() - half);
        Ok(format!("{}\n...TRUNCATED...\n{}", &content[..half], &content[tail..]))
    } else {
        Ok(content)
    }
}

/// Write a text file, replacing any existing content
pub async fn write_text_file(
    file_path: impl AsRef<Path>,
    content: &str,
    opts: WriteFileOpts,
) -> Result<WriteFileResult> {
    let path = file_path.as_ref();

    if opts.ensure_dir {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .context("Failed to create parent directory")?;
        }
    }

    fs::write(path, content)
        .await
        .with_context(|| format!("Failed to write file: {:?}", path))?;

    Ok(WriteFileResult {
        ok: true,
        path: path.display().to_string(),
    })
}

/// Create an empty file, leaving existing content untouched
pub async fn touch_file(file_path: impl AsRef<Path>) -> Result<()> {
    let path = file_path.as_ref();
    fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .with_context(|| format!("Failed to create file: {:?}", path))?;
    Ok(())
}

/// Copy a file or a directory tree. When `dest` is an existing directory the
/// source is copied into it.
pub async fn copy_path(source: impl AsRef<Path>, dest: impl AsRef<Path>) -> Result<PathBuf> {
    let source = source.as_ref().to_path_buf();
    let target = into_directory(&source, dest.as_ref()).await;

    let meta = fs::metadata(&source)
        .await
        .with_context(|| format!("Failed to stat: {:?}", source))?;

    if meta.is_dir() {
        let real_source = fs::canonicalize(&source)
            .await
            .with_context(|| format!("Failed to resolve: {:?}", source))?;
        if canonical_target(&target).await.starts_with(&real_source) {
            bail!("cannot copy a directory into itself");
        }
        let (from, to) = (source.clone(), target.clone());
        tokio::task::spawn_blocking(move || copy_tree(&from, &to))
            .await
            .context("copy task panicked")??;
    } else {
        fs::copy(&source, &target)
            .await
            .with_context(|| format!("Failed to copy {:?} to {:?}", source, target))?;
    }

    Ok(target)
}

/// Move or rename a path. When `dest` is an existing directory the source
/// is moved into it.
pub async fn move_path(source: impl AsRef<Path>, dest: impl AsRef<Path>) -> Result<PathBuf> {
    let source = source.as_ref();
    let target = into_directory(source, dest.as_ref()).await;

    match fs::rename(source, &target).await {
        Ok(()) => Ok(target),
        // rename cannot cross filesystems; fall back to copy + delete
        Err(e) if crosses_devices(&e) => {
            copy_path(source, &target).await?;
            if fs::metadata(source).await?.is_dir() {
                fs::remove_dir_all(source).await?;
            } else {
                fs::remove_file(source).await?;
            }
            Ok(target)
        }
        Err(e) => Err(e).with_context(|| format!("Failed to move {:?} to {:?}", source, target)),
    }
}

fn crosses_devices(err: &io::Error) -> bool {
    const EXDEV: i32 = 18;
    cfg!(unix) && err.raw_os_error() == Some(EXDEV)
}

async fn into_directory(source: &Path, dest: &Path) -> PathBuf {
    let is_dir = fs::metadata(dest).await.map(|m| m.is_dir()).unwrap_or(false);
    match source.file_name() {
        Some(name) if is_dir => dest.join(name),
        _ => dest.to_path_buf(),
    }
}

/// Resolve `target`, which may not exist yet, through its existing parent so
/// `..` and symlinks cannot hide that it lies inside another path
async fn canonical_target(target: &Path) -> PathBuf {
    if let Ok(path) = fs::canonicalize(target).await {
        return path;
    }
    match (target.parent(), target.file_name()) {
        (Some(parent), Some(name)) => match fs::canonicalize(parent).await {
            Ok(parent) => parent.join(name),
            Err(_) => target.to_path_buf(),
        },
        _ => target.to_path_buf(),
    }
}

fn copy_tree(source: &Path, dest: &Path) -> Result<()> {
    for entry in WalkDir::new(source) {
        let entry = entry?;
        let relative = entry.path().strip_prefix(source)?;
        let target = dest.join(relative);

        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target)
                .with_context(|| format!("Failed to create directory: {:?}", target))?;
        } else {
            std::fs::copy(entry.path(), &target)
                .with_context(|| format!("Failed to copy {:?}", entry.path()))?;
        }
    }
    Ok(())
}

/// Run a command line through the platform shell with a timeout
pub async fn run_shell(command: &str, opts: RunShellOpts) -> RunShellResult {
    let timeout_duration = Duration::from_millis(opts.timeout_ms);

    let mut cmd = if cfg!(windows) {
        let mut cmd = Command::new("cmd");
        cmd.arg("/C").arg(command);
        cmd
    } else {
        let mut cmd = Command::new("/bin/sh");
        cmd.arg("-c").arg(command);
        cmd
    };
    cmd.current_dir(&opts.cwd)
        .env_clear()
        .envs(&opts.env)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => return RunShellResult::failed(e.to_string(), false),
    };

    match timeout(timeout_duration, child.wait_with_output()).await {
        Ok(Ok(output)) => RunShellResult {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            error: None,
            timed_out: false,
        },
        Ok(Err(e)) => RunShellResult::failed(e.to_string(), false),
        Err(_) => RunShellResult::failed("Timeout exceeded".to_string(), true),
    }
}

impl RunShellResult {
    fn failed(error: String, timed_out: bool) -> Self {
        Self {
            code: None,
            stdout: String::new(),
            stderr: String::new(),
            error: Some(error),
            timed_out,
        }
    }
}

/// The io::ErrorKind behind an error produced by this module, if any
pub fn io_error_kind(err: &anyhow::Error) -> Option<io::ErrorKind> {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<io::Error>())
        .map(io::Error::kind)
}

fn floor_char_boundary(s: &str, mut index: usize) -> usize {
    while !s.is_char_boundary(index) {
        index -= 1;
    }
    index
}

fn ceil_char_boundary(s: &str, mut index: usize) -> usize {
    while !s.is_char_boundary(index) {
        index += 1;
    }
    index
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_write_and_read() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("notes.txt");

        let result = write_text_file(&file, "Hello nlshell!", WriteFileOpts::default())
            .await
            .unwrap();
        assert!(result.ok);

        let content = read_text_file(&file, ReadFileOpts::default()).await.unwrap();
        assert_eq!(content, "Hello nlshell!");
    }

    #[tokio::test]
    async fn test_read_truncates_large_files() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("big.txt");
        std::fs::write(&file, "x".repeat(100)).unwrap();

        let content = read_text_file(&file, ReadFileOpts { max_bytes: 10 }).await.unwrap();
        assert_eq!(content, "xxxxx\n...TRUNCATED...\nxxxxx");
    }

    #[tokio::test]
    async fn test_missing_file_kind() {
        let dir = tempdir().unwrap();
        let err = read_text_file(dir.path().join("nope"), ReadFileOpts::default())
            .await
            .unwrap_err();
        assert_eq!(io_error_kind(&err), Some(io::ErrorKind::NotFound));
    }

    #[tokio::test]
    async fn test_touch_keeps_content() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("keep.txt");
        std::fs::write(&file, "data").unwrap();

        touch_file(&file).await.unwrap();
        assert_eq!(std::fs::read_to_string(&file).unwrap(), "data");
    }

    #[tokio::test]
    async fn test_copy_into_directory() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "a").unwrap();
        std::fs::create_dir(dir.path().join("backup")).unwrap();

        let target = copy_path(dir.path().join("a.txt"), dir.path().join("backup"))
            .await
            .unwrap();
        assert_eq!(target, dir.path().join("backup").join("a.txt"));
        assert_eq!(std::fs::read_to_string(target).unwrap(), "a");
    }

    #[tokio::test]
    async fn test_copy_tree() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("src");
        std::fs::create_dir_all(src.join("nested")).unwrap();
        std::fs::write(src.join("nested").join("b.txt"), "b").unwrap();

        copy_path(&src, dir.path().join("dst")).await.unwrap();
        assert_eq!(
            std::fs::read_to_string(dir.path().join("dst/nested/b.txt")).unwrap(),
            "b"
        );
    }

    #[tokio::test]
    async fn test_copy_directory_into_itself_is_refused() {
        let dir = tempdir().unwrap();
        std::fs::create_dir(dir.path().join("d")).unwrap();
        std::fs::write(dir.path().join("d/f"), "f").unwrap();
        std::fs::create_dir(dir.path().join("e")).unwrap();

        for dest in ["d/x", "e/../d/x", "e/../d"] {
            let err = copy_path(dir.path().join("d"), dir.path().join(dest))
                .await
                .unwrap_err();
            assert_eq!(err.to_string(), "cannot copy a directory into itself");
        }

        let entries: Vec<_> = std::fs::read_dir(dir.path().join("d")).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[tokio::test]
    async fn test_move_into_directory() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("file.txt"), "f").unwrap();
        std::fs::create_dir(dir.path().join("test")).unwrap();

        move_path(dir.path().join("file.txt"), dir.path().join("test/"))
            .await
            .unwrap();
        assert!(dir.path().join("test/file.txt").exists());
        assert!(!dir.path().join("file.txt").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_shell_captures_output() {
        let dir = tempdir().unwrap();
        let mut env = BTreeMap::new();
        env.insert("GREETING".to_string(), "hi".to_string());

        let result = run_shell(
            "echo $GREETING; pwd >&2; exit 3",
            RunShellOpts {
                cwd: dir.path().to_path_buf(),
                env,
                timeout_ms: 5_000,
            },
        )
        .await;

        assert_eq!(result.code, Some(3));
        assert_eq!(result.stdout, "hi\n");
        assert!(!result.stderr.is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_shell_timeout() {
        let dir = tempdir().unwrap();
        let result = run_shell(
            "sleep 5",
            RunShellOpts {
                cwd: dir.path().to_path_buf(),
                env: std::env::vars().collect(),
                timeout_ms: 100,
            },
        )
        .await;

        assert!(result.timed_out);
        assert!(result.code.is_none());
    }
}
