//! The isolation boundary between the lab and user code.
//!
//! A [`Sandbox`] turns an [`ExecRequest`] into a running [`SandboxProcess`].
//! The host never blocks on a process: it polls [`SandboxProcess::try_next`]
//! from its own event loop and receives events in the order the sandbox
//! emitted them. After [`SandboxProcess::terminate`] returns, the process must
//! not deliver anything else, even if the underlying teardown is still in
//! progress.

mod process;

pub use process::{ProcessSandbox, SandboxChild};

use crate::foundation::error::LabResult;
use crate::protocol::{ExecRequest, SandboxEvent};

/// Factory for isolated execution contexts.
pub trait Sandbox {
    type Process: SandboxProcess;

    /// Start executing `request`. The returned process is live until it is
    /// terminated or dropped.
    fn spawn(&mut self, request: &ExecRequest) -> LabResult<Self::Process>;
}

/// One live execution context.
pub trait SandboxProcess {
    /// Next pending event, if any. Never blocks.
    fn try_next(&mut self) -> Option<SandboxEvent>;

    /// Kill the context and detach its event stream. Idempotent.
    fn terminate(&mut self);
}
