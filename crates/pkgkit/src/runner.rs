//! Command execution for package manager CLIs.
//!
//! The [`CommandRunner`] trait abstracts process execution so managers can be
//! exercised against scripted output in tests.

use crate::error::{Error, Result};
use reconcile::Context;
use std::io::Read;
use std::process::{Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// How often a running child is checked against the context
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Captured output of a finished command
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
    pub success: bool,
}

impl CommandOutput {
    /// Both streams, for error classification
    pub fn combined(&self) -> String {
        format!("{}\n{}", self.stderr, self.stdout)
    }
}

/// Executes external commands
pub trait CommandRunner: Send + Sync {
    /// Run `program` with `args`, honoring cancellation and the deadline
    fn run(&self, ctx: &Context, program: &str, args: &[&str]) -> Result<CommandOutput>;

    /// Whether `program` can be found in PATH
    fn exists(&self, program: &str) -> bool;
}

/// Runner backed by real processes
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, ctx: &Context, program: &str, args: &[&str]) -> Result<CommandOutput> {
        ctx.check()?;
        log::debug!("Running: {} {}", program, args.join(" "));

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => Error::ManagerNotFound {
                    manager: program.to_string(),
                },
                _ => Error::CommandFailed {
                    manager: program.to_string(),
                    message: format!("failed to execute {program}: {e}"),
                    stderr: String::new(),
                },
            })?;

        // Drain both pipes on their own threads so a chatty child can't block
        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);

        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if let Err(e) = ctx.check() {
                log::debug!("Killing {program}: {e}");
                let _ = child.kill();
                let _ = child.wait();
                return Err(e.into());
            }
            thread::sleep(POLL_INTERVAL);
        };

        Ok(CommandOutput {
            stdout: join(stdout),
            stderr: join(stderr),
            exit_code: status.code(),
            success: status.success(),
        })
    }

    fn exists(&self, program: &str) -> bool {
        which::which(program).is_ok()
    }
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    })
}

fn join(handle: Option<JoinHandle<String>>) -> String {
    handle.and_then(|h| h.join().ok()).unwrap_or_default()
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted runner for manager tests

    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Replays canned output keyed by the full command line
    #[derive(Default)]
    pub struct ScriptedRunner {
        responses: HashMap<String, CommandOutput>,
        pub missing: Vec<String>,
        pub calls: Mutex<Vec<String>>,
    }

    impl ScriptedRunner {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn ok(mut self, command: &str, stdout: &str) -> Self {
            self.responses.insert(
                command.to_string(),
                CommandOutput {
                    stdout: stdout.to_string(),
                    stderr: String::new(),
                    exit_code: Some(0),
                    success: true,
                },
            );
            self
        }

        pub fn fail(mut self, command: &str, code: i32, stderr: &str) -> Self {
            self.responses.insert(
                command.to_string(),
                CommandOutput {
                    stdout: String::new(),
                    stderr: stderr.to_string(),
                    exit_code: Some(code),
                    success: false,
                },
            );
            self
        }

        pub fn respond(mut self, command: &str, output: CommandOutput) -> Self {
            self.responses.insert(command.to_string(), output);
            self
        }

        pub fn without(mut self, program: &str) -> Self {
            self.missing.push(program.to_string());
            self
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl CommandRunner for ScriptedRunner {
        fn run(&self, ctx: &Context, program: &str, args: &[&str]) -> Result<CommandOutput> {
            ctx.check()?;
            let line = std::iter::once(program)
                .chain(args.iter().copied())
                .collect::<Vec<_>>()
                .join(" ");
            self.calls.lock().unwrap().push(line.clone());

            if self.missing.iter().any(|m| m == program) {
                return Err(Error::ManagerNotFound {
                    manager: program.to_string(),
                });
            }
            self.responses.get(&line).cloned().ok_or_else(|| Error::CommandFailed {
                manager: program.to_string(),
                message: format!("unscripted command: {line}"),
                stderr: String::new(),
            })
        }

        fn exists(&self, program: &str) -> bool {
            !self.missing.iter().any(|m| m == program)
        }
    }
}
