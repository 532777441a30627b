//! One spawn-to-termination lifetime of a sandbox.

use std::time::{Duration, Instant};

use crate::foundation::core::CanvasSize;
use crate::foundation::error::LabResult;
use crate::protocol::{ExecRequest, SandboxEvent, SandboxFault};
use crate::replay::CommandBuffer;
use crate::sandbox::{Sandbox, SandboxProcess};

/// Upper bound on events read by a single [`Session::pump`].
pub const MAX_EVENTS_PER_PUMP: usize = 4096;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Active,
    Finished,
}

/// How a session ended.
#[derive(Clone, Debug, PartialEq)]
pub enum SessionOutcome {
    Completed,
    Failed(SandboxFault),
}

impl SessionOutcome {
    pub fn into_fault(self) -> Option<SandboxFault> {
        match self {
            Self::Completed => None,
            Self::Failed(fault) => Some(fault),
        }
    }
}

/// A live (or finished) sandbox execution and the commands it produced.
///
/// Exactly one of completion, reported failure or timeout ends a session.
/// [`terminate`](Self::terminate) kills the process and clears the timeout
/// the first time it is called and does nothing afterwards.
#[derive(Debug)]
pub struct Session<P: SandboxProcess> {
    id: u64,
    process: P,
    deadline: Option<Instant>,
    commands: CommandBuffer,
    state: SessionState,
}

impl<P: SandboxProcess> Session<P> {
    pub fn start<S>(
        sandbox: &mut S,
        id: u64,
        source: &str,
        size: CanvasSize,
        timeout: Duration,
        now: Instant,
    ) -> LabResult<Self>
    where
        S: Sandbox<Process = P> + ?Sized,
    {
        let process = sandbox.spawn(&ExecRequest {
            source: source.to_owned(),
            width: size.width,
            height: size.height,
        })?;
        Ok(Self {
            id,
            process,
            deadline: Some(now + timeout),
            commands: CommandBuffer::new(),
            state: SessionState::Active,
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == SessionState::Active
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn commands(&self) -> &CommandBuffer {
        &self.commands
    }

    /// Drain pending sandbox events. Commands are buffered; the first terminal
    /// event is returned and nothing after it is read.
    ///
    /// At most [`MAX_EVENTS_PER_PUMP`] events are read per call. A sandbox
    /// that keeps streaming commands past its deadline is timed out here
    /// rather than starving the caller.
    pub fn pump(&mut self, now: Instant) -> Option<SessionOutcome> {
        let mut read = 0;
        while self.is_active() && read < MAX_EVENTS_PER_PUMP {
            let Some(event) = self.process.try_next() else {
                break;
            };
            read += 1;
            match event {
                SandboxEvent::Command(cmd) => self.commands.push(cmd),
                SandboxEvent::Done => return Some(SessionOutcome::Completed),
                SandboxEvent::Fault(fault) => return Some(SessionOutcome::Failed(fault)),
            }
        }
        self.poll_timeout(now)
    }

    /// The timeout outcome, once the deadline has passed on an active session.
    pub fn poll_timeout(&self, now: Instant) -> Option<SessionOutcome> {
        match self.deadline {
            Some(deadline) if self.is_active() && now >= deadline => {
                Some(SessionOutcome::Failed(SandboxFault::timeout()))
            }
            _ => None,
        }
    }

    pub fn terminate(&mut self) {
        if self.state == SessionState::Finished {
            return;
        }
        self.deadline = None;
        self.process.terminate();
        self.state = SessionState::Finished;
    }

    /// Terminate and hand back the buffered commands.
    pub fn into_commands(mut self) -> CommandBuffer {
        self.terminate();
        std::mem::take(&mut self.commands)
    }
}

impl<P: SandboxProcess> Drop for Session<P> {
    fn drop(&mut self) {
        self.terminate();
    }
}
