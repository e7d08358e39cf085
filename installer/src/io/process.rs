//! Helpers for running child processes.
//!
//! Two modes: inherited stdio for long-running installs the user should watch
//! (package manager, pip, the setup wizard), and captured output with a
//! timeout for short probe checks.

use std::env;
use std::io::Read;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, error, instrument, warn};
use wait_timeout::ChildExt;

use crate::core::cmdline::CommandSpec;

/// Captured child process output.
#[derive(Debug)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub timed_out: bool,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        !self.timed_out && self.status.success()
    }

    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).trim().to_string()
    }

    pub fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr).trim().to_string()
    }
}

fn build_command(spec: &CommandSpec) -> Command {
    let mut cmd = Command::new(&spec.program);
    cmd.args(&spec.args);
    if let Some(cwd) = &spec.cwd {
        cmd.current_dir(cwd);
    }
    cmd
}

/// Run a command attached to the terminal and block until it exits.
///
/// Success is decided solely by the exit status.
#[instrument(skip_all, fields(command = %spec))]
pub fn run_inherited(spec: &CommandSpec) -> Result<()> {
    debug!("spawning attached child process");
    let status = build_command(spec)
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status()
        .with_context(|| format!("spawn `{spec}`"))?;
    if !status.success() {
        warn!(exit_code = ?status.code(), "command failed");
        return Err(anyhow!("`{spec}` exited with {}", describe_status(status)));
    }
    debug!("command finished");
    Ok(())
}

/// Run a command with a timeout and capture stdout/stderr without risking pipe deadlocks.
///
/// Output is read concurrently while the child runs. `output_limit_bytes` bounds the amount of
/// stdout/stderr stored in memory (bytes beyond this are discarded while still draining the pipe).
#[instrument(skip_all, fields(command = %spec, timeout_secs = timeout.as_secs()))]
pub fn run_captured(
    spec: &CommandSpec,
    timeout: Duration,
    output_limit_bytes: usize,
) -> Result<CommandOutput> {
    let mut cmd = build_command(spec);
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    debug!("spawning child process");
    let mut child = match cmd.spawn() {
        Ok(c) => c,
        Err(e) => {
            error!(err = %e, "failed to spawn command");
            return Err(e).with_context(|| format!("spawn `{spec}`"));
        }
    };

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("stdout was not piped"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("stderr was not piped"))?;

    let stdout_handle = thread::spawn(move || read_stream_limited(stdout, output_limit_bytes));
    let stderr_handle = thread::spawn(move || read_stream_limited(stderr, output_limit_bytes));

    let mut timed_out = false;
    let status = match child.wait_timeout(timeout).context("wait for command")? {
        Some(status) => status,
        None => {
            warn!(
                timeout_secs = timeout.as_secs(),
                "command timed out, killing"
            );
            timed_out = true;
            child.kill().context("kill command")?;
            child.wait().context("wait command after kill")?
        }
    };

    let stdout = join_output(stdout_handle).context("join stdout")?;
    let stderr = join_output(stderr_handle).context("join stderr")?;

    debug!(exit_code = ?status.code(), timed_out, "command finished");
    Ok(CommandOutput {
        status,
        stdout,
        stderr,
        timed_out,
    })
}

fn join_output(handle: thread::JoinHandle<Result<Vec<u8>>>) -> Result<Vec<u8>> {
    match handle.join() {
        Ok(result) => result,
        Err(_) => Err(anyhow!("output reader thread panicked")),
    }
}

fn read_stream_limited<R: Read>(mut reader: R, limit: usize) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 8192];

    loop {
        let n = reader.read(&mut chunk).context("read output")?;
        if n == 0 {
            break;
        }
        let remaining = limit.saturating_sub(buf.len());
        if remaining > 0 {
            buf.extend_from_slice(&chunk[..n.min(remaining)]);
        }
    }

    Ok(buf)
}

fn describe_status(status: ExitStatus) -> String {
    match status.code() {
        Some(code) => format!("status {code}"),
        None => "no exit status (terminated by signal)".to_string(),
    }
}

/// Locate an executable on `PATH`, or accept an explicit path as-is when it is executable.
pub fn find_on_path(name: &str) -> Option<PathBuf> {
    if name.contains('/') {
        let path = PathBuf::from(name);
        return is_executable(&path).then_some(path);
    }
    let paths = env::var_os("PATH")?;
    env::split_paths(&paths)
        .map(|dir| dir.join(name))
        .find(|candidate| is_executable(candidate))
}

fn is_executable(path: &Path) -> bool {
    match path.metadata() {
        Ok(metadata) => metadata.is_file() && metadata.permissions().mode() & 0o111 != 0,
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn captured_output_reports_success_and_stdout() {
        let spec = CommandSpec::new("sh").args(["-c", "echo hello; echo oops >&2"]);
        let output = run_captured(&spec, Duration::from_secs(10), 1024).expect("run");
        assert!(output.success());
        assert_eq!(output.stdout_text(), "hello");
        assert_eq!(output.stderr_text(), "oops");
    }

    #[test]
    fn captured_output_is_bounded() {
        let spec = CommandSpec::new("sh").args(["-c", "printf 'abcdefghij'"]);
        let output = run_captured(&spec, Duration::from_secs(10), 4).expect("run");
        assert_eq!(output.stdout, b"abcd");
    }

    #[test]
    fn captured_timeout_kills_child() {
        let spec = CommandSpec::new("sleep").arg("5");
        let output = run_captured(&spec, Duration::from_millis(100), 1024).expect("run");
        assert!(output.timed_out);
        assert!(!output.success());
    }

    #[test]
    fn inherited_failure_names_command_and_status() {
        let spec = CommandSpec::new("sh").args(["-c", "exit 3"]);
        let err = run_inherited(&spec).expect_err("should fail");
        assert!(err.to_string().contains("status 3"), "{err}");
    }

    #[test]
    fn find_on_path_locates_sh() {
        assert!(find_on_path("sh").is_some());
        assert!(find_on_path("definitely-not-a-real-tool-xyz").is_none());
    }
}
