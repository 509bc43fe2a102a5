use crate::engine::cancel::CancellationToken;
use crate::engine::error::ToolError;
use std::ffi::OsString;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(50);
/// Lines of stderr quoted in a failed-exit error.
const STDERR_TAIL_LINES: usize = 20;

/// A blocking external command whose output streams go to files.
#[derive(Debug, Clone)]
pub struct ToolInvocation {
    pub program: PathBuf,
    pub args: Vec<OsString>,
    pub current_dir: PathBuf,
    pub stdout_path: PathBuf,
    pub stderr_path: PathBuf,
    pub timeout: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
}

impl ToolInvocation {
    pub fn new(program: impl Into<PathBuf>, current_dir: impl Into<PathBuf>) -> Self {
        let current_dir = current_dir.into();
        Self {
            program: program.into(),
            args: Vec::new(),
            stdout_path: current_dir.join("stdout.txt"),
            stderr_path: current_dir.join("stderr.txt"),
            current_dir,
            timeout: Duration::from_secs(60),
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn stdout_to(mut self, path: impl Into<PathBuf>) -> Self {
        self.stdout_path = path.into();
        self
    }

    pub fn stderr_to(mut self, path: impl Into<PathBuf>) -> Self {
        self.stderr_path = path.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn program_name(&self) -> String {
        self.program.display().to_string()
    }

    /// Runs the command to completion, killing it on timeout or cancellation.
    ///
    /// Output goes to files rather than pipes so a chatty tool can never
    /// block on a full pipe buffer while we poll.
    pub fn run(&self, cancel: &CancellationToken) -> Result<ToolOutput, ToolError> {
        let program = self.program_name();
        let io_error = |source: std::io::Error| ToolError::Io {
            program: program.clone(),
            source,
        };

        let stdout = File::create(&self.stdout_path).map_err(io_error)?;
        let stderr = File::create(&self.stderr_path).map_err(io_error)?;

        debug!(program = %program, args = ?self.args, "Launching external tool.");
        let started = Instant::now();
        let mut child = Command::new(resolve_program(&self.program))
            .args(&self.args)
            .current_dir(&self.current_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr))
            .spawn()
            .map_err(|source| ToolError::Spawn {
                program: program.clone(),
                source,
            })?;

        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => {}
                Err(source) => {
                    terminate(&mut child);
                    return Err(io_error(source));
                }
            }
            if cancel.is_cancelled() {
                terminate(&mut child);
                return Err(ToolError::Interrupted {
                    program: program.clone(),
                });
            }
            let elapsed = started.elapsed();
            if elapsed >= self.timeout {
                terminate(&mut child);
                warn!(program = %program, "External tool timed out and was killed.");
                return Err(ToolError::Timeout {
                    program: program.clone(),
                    seconds: self.timeout.as_secs_f64(),
                });
            }
            thread::sleep(POLL_INTERVAL.min(self.timeout - elapsed));
        };

        let stdout = read_lossy(&self.stdout_path).map_err(io_error)?;
        let stderr = read_lossy(&self.stderr_path).map_err(io_error)?;
        debug!(
            program = %program,
            elapsed_ms = started.elapsed().as_millis() as u64,
            %status,
            "External tool finished."
        );

        if !status.success() {
            return Err(ToolError::ExitStatus {
                program,
                status: status.to_string(),
                stderr: tail(&stderr, STDERR_TAIL_LINES),
            });
        }
        Ok(ToolOutput { stdout, stderr })
    }
}

/// Anchors a relative program path such as `bin/xtb` to the current
/// directory; bare names are left for the `PATH` lookup.
fn resolve_program(program: &Path) -> PathBuf {
    if program.is_relative() && program.components().count() > 1 {
        std::path::absolute(program).unwrap_or_else(|_| program.to_path_buf())
    } else {
        program.to_path_buf()
    }
}

/// `path` relative to `dir` when it lies inside it.
pub fn local_path<'a>(path: &'a Path, dir: &Path) -> &'a Path {
    path.strip_prefix(dir).unwrap_or(path)
}

fn terminate(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

fn read_lossy(path: &Path) -> std::io::Result<String> {
    Ok(String::from_utf8_lossy(&fs::read(path)?).into_owned())
}

fn tail(text: &str, lines: usize) -> String {
    let all: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    all[all.len().saturating_sub(lines)..].join("\n")
}

/// Runs `program args...` in a scratch directory and returns the first line
/// that mentions a version, or the first non-empty line.
pub fn probe_version(program: &Path, args: &[&str], timeout: Duration) -> Result<String, ToolError> {
    let program_name = program.display().to_string();
    let scratch = tempfile::tempdir().map_err(|source| ToolError::Io {
        program: program_name.clone(),
        source,
    })?;
    let output = ToolInvocation::new(program, scratch.path())
        .args(args.iter().copied())
        .timeout(timeout)
        .run(&CancellationToken::new())?;

    let text = format!("{}\n{}", output.stdout, output.stderr);
    let lines: Vec<&str> = text.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
    lines
        .iter()
        .find(|l| l.to_ascii_lowercase().contains("version"))
        .or_else(|| lines.first())
        .map(|l| l.to_string())
        .ok_or(ToolError::MissingOutput {
            program: program_name,
            reason: "no version banner".to_string(),
        })
}
