use std::io::{BufRead as _, BufReader, Read as _, Write as _};
use std::process::{Child, Command, Stdio};
use std::sync::mpsc;

use crate::foundation::error::{LabError, LabResult};
use crate::protocol::{ExecRequest, SandboxEvent, SandboxFault, SandboxMessage};
use crate::sandbox::{Sandbox, SandboxProcess};

/// Runs each session in a fresh OS process.
///
/// The request is written to the child's stdin as a single JSON line from a
/// helper thread, then stdin is closed. Every stdout line must be a [`SandboxMessage`]. A child that
/// closes stdout without sending `done` has failed; its stderr is read as a
/// JSON `{"message", "lineno"}` fault, or used verbatim when it is not JSON.
#[derive(Clone, Debug)]
pub struct ProcessSandbox {
    program: String,
    args: Vec<String>,
}

impl ProcessSandbox {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
}

impl Sandbox for ProcessSandbox {
    type Process = SandboxChild;

    fn spawn(&mut self, request: &ExecRequest) -> LabResult<SandboxChild> {
        let payload = serde_json::to_string(request)
            .map_err(|e| LabError::serde(format!("exec request: {e}")))?;

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(|e| {
            LabError::sandbox(format!("failed to spawn '{}': {e}", self.program))
        })?;

        // A request larger than the pipe buffer blocks until the child reads
        // it. Dropping stdin closes it.
        if let Some(mut stdin) = child.stdin.take() {
            std::thread::spawn(move || {
                if let Err(e) = writeln!(stdin, "{payload}") {
                    tracing::debug!(error = %e, "sandbox stopped reading its request");
                }
            });
        }

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let (tx, rx) = mpsc::channel();

        std::thread::spawn(move || {
            std::thread::scope(|s| {
                let stderr_handle = stderr.map(|mut stderr| {
                    s.spawn(move || {
                        let mut text = String::new();
                        let _ = stderr.read_to_string(&mut text);
                        text
                    })
                });

                let mut finished = false;
                if let Some(stdout) = stdout {
                    for line in BufReader::new(stdout).lines() {
                        let Ok(line) = line else { break };
                        if line.trim().is_empty() {
                            continue;
                        }
                        let event = match SandboxMessage::parse_line(&line) {
                            Ok(msg) => SandboxEvent::from(msg),
                            Err(e) => SandboxEvent::Fault(SandboxFault::new(format!(
                                "malformed sandbox message: {e}"
                            ))),
                        };
                        let terminal = !matches!(event, SandboxEvent::Command(_));
                        if tx.send(event).is_err() {
                            return;
                        }
                        if terminal {
                            finished = true;
                            break;
                        }
                    }
                }

                let stderr_text = stderr_handle
                    .and_then(|h| h.join().ok())
                    .unwrap_or_default();
                if !finished {
                    let _ = tx.send(SandboxEvent::Fault(fault_from_stderr(&stderr_text)));
                }
            });
        });

        tracing::debug!(program = %self.program, pid = child.id(), "sandbox process spawned");
        Ok(SandboxChild {
            child: Some(child),
            events: Some(rx),
        })
    }
}

/// Handle to a running [`ProcessSandbox`] child.
#[derive(Debug)]
pub struct SandboxChild {
    child: Option<Child>,
    events: Option<mpsc::Receiver<SandboxEvent>>,
}

impl SandboxProcess for SandboxChild {
    fn try_next(&mut self) -> Option<SandboxEvent> {
        self.events.as_ref()?.try_recv().ok()
    }

    fn terminate(&mut self) {
        // Detach first: nothing read after this point may reach the host.
        self.events = None;
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
            tracing::debug!(pid = child.id(), "sandbox process terminated");
        }
    }
}

impl Drop for SandboxChild {
    fn drop(&mut self) {
        self.terminate();
    }
}

fn fault_from_stderr(stderr: &str) -> SandboxFault {
    let text = stderr.trim();
    if text.is_empty() {
        return SandboxFault::new("sandbox exited without completing");
    }
    match serde_json::from_str::<SandboxFault>(text) {
        Ok(fault) => fault,
        Err(_) => SandboxFault::new(text),
    }
}
