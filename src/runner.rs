use anyhow::{Context, Result};
use std::process::{Command, Output, Stdio};

/// Run a command and capture trimmed stdout, failing with stderr on error
pub fn run_capture(cmd: &str, args: &[&str]) -> Result<String> {
    let output = run_output(cmd, args)?;

    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr);
        anyhow::bail!("Command failed: {}", stderr.trim())
    }
}

/// Run a command and return the raw output regardless of exit status
pub fn run_output(cmd: &str, args: &[&str]) -> Result<Output> {
    Command::new(cmd)
        .args(args)
        .output()
        .with_context(|| format!("Failed to execute: {} {}", cmd, args.join(" ")))
}

/// Run a command silently, returning success/failure
pub fn run_quiet(cmd: &str, args: &[&str]) -> bool {
    Command::new(cmd)
        .args(args)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Check if a command exists
pub fn command_exists(cmd: &str) -> bool {
    Command::new("which")
        .arg(cmd)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Check if the current process runs as root
pub fn is_root() -> bool {
    run_capture("id", &["-u"])
        .map(|uid| uid == "0")
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_capture_trims_stdout() {
        let out = run_capture("echo", &["  hello  "]).unwrap();
        assert_eq!(out, "hello");
    }

    #[test]
    fn run_capture_fails_on_nonzero_exit() {
        assert!(run_capture("false", &[]).is_err());
    }

    #[test]
    fn run_quiet_reports_status() {
        assert!(run_quiet("true", &[]));
        assert!(!run_quiet("false", &[]));
    }

    #[test]
    fn command_exists_finds_shell() {
        assert!(command_exists("sh"));
        assert!(!command_exists("definitely-not-a-command-xyz"));
    }
}
