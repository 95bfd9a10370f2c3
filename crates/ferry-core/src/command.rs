//! Local command execution for pre-deploy hooks.

use std::path::{Path, PathBuf};
use std::process::Command;

/// Captured result of a finished command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` when the process was killed by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Capability for running shell commands.
///
/// Returns `Err` only when the command could not be started; a non-zero exit
/// is reported through [`CommandOutput::code`] and judged by the caller.
pub trait CommandRunner {
    fn run(&self, command: &str) -> std::io::Result<CommandOutput>;
}

/// Runs commands through the platform shell inside a working directory.
#[derive(Debug, Clone)]
pub struct ShellRunner {
    working_dir: PathBuf,
}

impl ShellRunner {
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: working_dir.into(),
        }
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    fn shell(command: &str) -> Command {
        #[cfg(windows)]
        {
            let mut cmd = Command::new("cmd");
            cmd.arg("/C").arg(command);
            cmd
        }
        #[cfg(not(windows))]
        {
            let mut cmd = Command::new("sh");
            cmd.arg("-c").arg(command);
            cmd
        }
    }
}

impl CommandRunner for ShellRunner {
    fn run(&self, command: &str) -> std::io::Result<CommandOutput> {
        let output = Self::shell(command)
            .current_dir(&self.working_dir)
            .output()?;
        Ok(CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn captures_stdout_and_exit_code() {
        let temp = TempDir::new().expect("tempdir should succeed");
        let runner = ShellRunner::new(temp.path());

        let output = runner.run("echo hello").expect("sh should start");
        assert!(output.success());
        assert_eq!(output.stdout.trim(), "hello");
    }

    #[test]
    fn non_zero_exit_is_not_an_error() {
        let temp = TempDir::new().expect("tempdir should succeed");
        let runner = ShellRunner::new(temp.path());

        let output = runner.run("echo oops >&2; exit 3").expect("sh should start");
        assert_eq!(output.code, Some(3));
        assert!(!output.success());
        assert_eq!(output.stderr.trim(), "oops");
    }

    #[test]
    fn runs_inside_working_dir() {
        let temp = TempDir::new().expect("tempdir should succeed");
        std::fs::write(temp.path().join("marker.txt"), "x").expect("write should succeed");
        let runner = ShellRunner::new(temp.path());

        let output = runner.run("ls").expect("sh should start");
        assert!(output.stdout.contains("marker.txt"));
    }

    #[test]
    fn missing_working_dir_fails_to_start() {
        let temp = TempDir::new().expect("tempdir should succeed");
        let runner = ShellRunner::new(temp.path().join("missing"));

        assert!(runner.run("true").is_err());
    }
}
