//! The evaluation environment seen by code checks.
//!
//! Primitives never touch the filesystem or spawn processes directly; they go
//! through [`Environment`], which makes them testable with an in-memory fake.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant, SystemTime};

use async_trait::async_trait;
use tokio::process::Command;

use crate::domain::CommandError;

/// How to start a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    /// A command line interpreted by `sh -c`.
    Shell(String),
    /// A program with explicit arguments, no shell involved.
    Program { program: String, args: Vec<String> },
}

impl Invocation {
    pub fn shell(command: impl Into<String>) -> Self {
        Invocation::Shell(command.into())
    }

    pub fn program(program: impl Into<String>, args: Vec<String>) -> Self {
        Invocation::Program {
            program: program.into(),
            args,
        }
    }

    /// Name used in "not found" reports.
    pub fn program_name(&self) -> &str {
        match self {
            Invocation::Shell(_) => "sh",
            Invocation::Program { program, .. } => program,
        }
    }
}

/// Captured result of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// `-1` when the process was killed by a signal.
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Stdout and stderr joined by a newline, trimmed.
    pub fn combined(&self) -> String {
        format!("{}\n{}", self.stdout, self.stderr).trim().to_string()
    }
}

/// A source file included in the judge's context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: String,
    pub content: String,
}

/// Capabilities a grader needs from the post-run workspace.
#[async_trait]
pub trait Environment: Send + Sync {
    /// Read a file relative to the environment root.
    async fn read_to_string(&self, path: &str) -> std::io::Result<String>;

    async fn exists(&self, path: &str) -> bool;

    /// Run a command in the environment root, bounded by `timeout`.
    async fn run(
        &self,
        invocation: &Invocation,
        timeout: Duration,
    ) -> Result<CommandOutput, CommandError>;

    /// Most recently modified source files, newest first.
    async fn source_snapshot(&self, extensions: &[String], max_files: usize) -> Vec<SourceFile>;
}

/// An [`Environment`] backed by a local directory.
#[derive(Debug, Clone)]
pub struct LocalEnvironment {
    root: PathBuf,
}

impl LocalEnvironment {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl Environment for LocalEnvironment {
    async fn read_to_string(&self, path: &str) -> std::io::Result<String> {
        tokio::fs::read_to_string(self.root.join(path)).await
    }

    async fn exists(&self, path: &str) -> bool {
        tokio::fs::try_exists(self.root.join(path))
            .await
            .unwrap_or(false)
    }

    async fn run(
        &self,
        invocation: &Invocation,
        timeout: Duration,
    ) -> Result<CommandOutput, CommandError> {
        let start = Instant::now();

        let mut cmd = match invocation {
            Invocation::Shell(line) => {
                if line.trim().is_empty() {
                    return Err(CommandError::EmptyCommand);
                }
                let mut cmd = Command::new("sh");
                cmd.arg("-c").arg(line);
                cmd
            }
            Invocation::Program { program, args } => {
                if program.trim().is_empty() {
                    return Err(CommandError::EmptyCommand);
                }
                let mut cmd = Command::new(program);
                cmd.args(args);
                cmd
            }
        };

        let child = cmd
            .current_dir(&self.root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => CommandError::NotFound {
                    program: invocation.program_name().to_string(),
                },
                _ => CommandError::Io(e),
            })?;

        // Dropping the wait future on timeout drops the child, which kills it.
        let output = tokio::time::timeout(timeout, child.wait_with_output())
            .await
            .map_err(|_| CommandError::Timeout(timeout))??;

        Ok(CommandOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }

    async fn source_snapshot(&self, extensions: &[String], max_files: usize) -> Vec<SourceFile> {
        let root = self.root.clone();
        let extensions = extensions.to_vec();
        tokio::task::spawn_blocking(move || snapshot_dir(&root, &extensions, max_files))
            .await
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "source snapshot task failed");
                Vec::new()
            })
    }
}

fn snapshot_dir(root: &Path, extensions: &[String], max_files: usize) -> Vec<SourceFile> {
    let mut found: Vec<(SystemTime, PathBuf)> = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let Ok(entries) = std::fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            let Ok(meta) = entry.metadata() else {
                continue;
            };
            if meta.is_dir() {
                let hidden = entry.file_name().to_string_lossy().starts_with('.');
                if !hidden {
                    pending.push(path);
                }
                continue;
            }
            let matches = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|ext| extensions.iter().any(|want| want == ext));
            if matches {
                let modified = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
                found.push((modified, path));
            }
        }
    }

    // Newest first; path order breaks ties so the snapshot is deterministic.
    found.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));

    found
        .into_iter()
        .filter_map(|(_, path)| {
            let content = std::fs::read_to_string(&path).ok()?;
            let rel = path.strip_prefix(root).unwrap_or(&path);
            Some(SourceFile {
                path: rel.to_string_lossy().to_string(),
                content,
            })
        })
        .take(max_files)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn shell_command_captures_output_and_exit_code() {
        let dir = tempfile::tempdir().expect("tempdir");
        let env = LocalEnvironment::new(dir.path());

        let out = env
            .run(&Invocation::shell("echo hello; exit 3"), Duration::from_secs(10))
            .await
            .expect("run");
        assert_eq!(out.exit_code, 3);
        assert!(out.stdout.contains("hello"));
        assert!(!out.success());
    }

    #[tokio::test]
    async fn missing_program_is_not_found() {
        let dir = tempfile::tempdir().expect("tempdir");
        let env = LocalEnvironment::new(dir.path());

        let err = env
            .run(
                &Invocation::program("definitely-not-a-real-binary-xyz", vec![]),
                Duration::from_secs(5),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CommandError::NotFound { ref program } if program == "definitely-not-a-real-binary-xyz"));
    }

    #[tokio::test]
    async fn slow_command_times_out() {
        let dir = tempfile::tempdir().expect("tempdir");
        let env = LocalEnvironment::new(dir.path());

        let err = env
            .run(&Invocation::shell("sleep 5"), Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(matches!(err, CommandError::Timeout(_)));
    }

    #[tokio::test]
    async fn blank_shell_command_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let env = LocalEnvironment::new(dir.path());
        let err = env
            .run(&Invocation::shell("   "), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, CommandError::EmptyCommand));
    }

    #[tokio::test]
    async fn snapshot_filters_by_extension_and_limits_count() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::create_dir_all(dir.path().join("src")).expect("mkdir");
        std::fs::create_dir_all(dir.path().join(".git")).expect("mkdir");
        std::fs::write(dir.path().join("src/a.py"), "print('a')").expect("write");
        std::fs::write(dir.path().join("src/b.py"), "print('b')").expect("write");
        std::fs::write(dir.path().join("notes.txt"), "skip").expect("write");
        std::fs::write(dir.path().join(".git/hook.py"), "skip").expect("write");

        let env = LocalEnvironment::new(dir.path());
        let exts = vec!["py".to_string()];

        let all = env.source_snapshot(&exts, 10).await;
        assert_eq!(all.len(), 2);
        assert!(all.iter().all(|f| f.path.ends_with(".py")));
        assert!(all.iter().all(|f| !f.path.contains(".git")));

        let one = env.source_snapshot(&exts, 1).await;
        assert_eq!(one.len(), 1);
    }

    #[tokio::test]
    async fn read_and_exists_are_relative_to_root() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("a.txt"), "content").expect("write");
        let env = LocalEnvironment::new(dir.path());

        assert!(env.exists("a.txt").await);
        assert!(!env.exists("b.txt").await);
        assert_eq!(env.read_to_string("a.txt").await.expect("read"), "content");
    }
}
