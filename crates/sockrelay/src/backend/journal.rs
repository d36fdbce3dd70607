use std::process::{Command, Stdio};

use sockrelay_peer::CommandBackend;
use tracing::debug;

/// Runs `journalctl` with the request as its arguments.
///
/// Arguments are split on whitespace and passed directly; no shell is
/// involved. The reply is the error output if there is any, otherwise the
/// standard output.
#[derive(Debug, Clone)]
pub struct JournalBackend {
    program: String,
}

impl JournalBackend {
    /// Use another program in place of `journalctl`.
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

impl Default for JournalBackend {
    fn default() -> Self {
        Self::with_program("journalctl")
    }
}

impl CommandBackend for JournalBackend {
    fn execute(&self, command: &str) -> String {
        debug!(program = %self.program, args = %command, "running log query");

        let output = Command::new(&self.program)
            .args(command.split_whitespace())
            .stdin(Stdio::null())
            .output();

        match output {
            Ok(output) if !output.stderr.is_empty() => {
                String::from_utf8_lossy(&output.stderr).into_owned()
            }
            Ok(output) => String::from_utf8_lossy(&output.stdout).into_owned(),
            Err(err) => format!("Failed to run command: {err}"),
        }
    }
}
