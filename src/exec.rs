//! External tool invocation seam.
//!
//! The sampler delegates the actual numerical work to an external compiled
//! binary. The invocation is a single blocking call behind the
//! [`ProcessRunner`] trait so tests can substitute a stub that fabricates the
//! output artifact. No timeout, cancellation or retry policy lives here; that
//! is a caller concern.

use std::path::PathBuf;
use std::process::Command;

/// One external tool invocation: program, positional arguments, environment
/// overrides and the working directory the tool expects its input files in.
#[derive(Debug, Clone)]
pub struct ToolCommand {
    /// Absolute path of the executable.
    pub program: PathBuf,
    /// Positional arguments, passed verbatim.
    pub args: Vec<String>,
    /// Extra environment variables for the child process.
    pub env: Vec<(String, String)>,
    /// Working directory for the invocation.
    pub working_dir: PathBuf,
}

/// External tool invocation failure.
#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    #[error("failed to spawn \"{program}\": {source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("\"{program}\" exited with {status}")]
    Failed {
        program: PathBuf,
        status: std::process::ExitStatus,
    },
}

/// Runs external tool commands. Implementations block until the process
/// completes or fails.
pub trait ProcessRunner {
    /// Runs the command to completion.
    ///
    /// # Errors
    ///
    /// Fails if the process cannot be spawned or exits with a non-zero
    /// status.
    fn run(&self, command: &ToolCommand) -> Result<(), ExecError>;
}

/// Production runner backed by `std::process::Command`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalRunner;

impl ProcessRunner for LocalRunner {
    fn run(&self, command: &ToolCommand) -> Result<(), ExecError> {
        let status = Command::new(&command.program)
            .args(&command.args)
            .envs(command.env.iter().map(|(k, v)| (k, v)))
            .current_dir(&command.working_dir)
            .status()
            .map_err(|source| ExecError::Spawn {
                program: command.program.clone(),
                source,
            })?;
        if !status.success() {
            return Err(ExecError::Failed {
                program: command.program.clone(),
                status,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    fn shell_command(script: &str, working_dir: &std::path::Path) -> ToolCommand {
        ToolCommand {
            program: PathBuf::from("/bin/sh"),
            args: vec!["-c".to_string(), script.to_string()],
            env: Vec::new(),
            working_dir: working_dir.to_path_buf(),
        }
    }

    #[cfg(unix)]
    #[test]
    fn local_runner_runs_in_working_directory() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let cmd = shell_command("echo ok > marker.txt", dir.path());
        LocalRunner.run(&cmd).expect("command should succeed");
        assert!(dir.path().join("marker.txt").is_file());
    }

    #[cfg(unix)]
    #[test]
    fn local_runner_surfaces_nonzero_exit() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let cmd = shell_command("exit 3", dir.path());
        let err = LocalRunner.run(&cmd);
        assert!(matches!(err, Err(ExecError::Failed { .. })));
    }

    #[test]
    fn local_runner_surfaces_spawn_failure() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let cmd = ToolCommand {
            program: PathBuf::from("/nonexistent/mcla"),
            args: Vec::new(),
            env: Vec::new(),
            working_dir: dir.path().to_path_buf(),
        };
        let err = LocalRunner.run(&cmd);
        assert!(matches!(err, Err(ExecError::Spawn { .. })));
    }
}
