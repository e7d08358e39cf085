//! Plain-data description of an external command.
//!
//! Stages build `CommandSpec` values and hand them to adapters in `io`, which
//! decide how to spawn them. Keeping the description separate from spawning
//! lets tests assert on exact command lines.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn cwd(mut self, path: impl Into<PathBuf>) -> Self {
        self.cwd = Some(path.into());
        self
    }

    /// Prepend `prefix` as the program, shifting the current program into the args.
    ///
    /// Used to wrap a command with an elevation tool (`sudo apt-get ...`).
    pub fn prefixed(self, prefix: &str) -> Self {
        let mut args = Vec::with_capacity(self.args.len() + 1);
        args.push(self.program);
        args.extend(self.args);
        Self {
            program: prefix.to_string(),
            args,
            cwd: self.cwd,
        }
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                write!(f, " '{arg}'")?;
            } else {
                write!(f, " {arg}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefixed_moves_program_into_args() {
        let spec = CommandSpec::new("apt-get")
            .args(["install", "-y", "git"])
            .prefixed("sudo");
        assert_eq!(spec.program, "sudo");
        assert_eq!(spec.args, vec!["apt-get", "install", "-y", "git"]);
    }

    #[test]
    fn display_quotes_args_with_whitespace() {
        let spec = CommandSpec::new("ln").args(["-sfn", "/opt/my app/run", "/usr/local/bin/x"]);
        assert_eq!(spec.to_string(), "ln -sfn '/opt/my app/run' /usr/local/bin/x");
    }
}
