//! Message types exchanged between the host and a sandbox.
//!
//! The host sends one [`ExecRequest`] per session. The sandbox answers with a
//! stream of [`SandboxMessage`] values, `{"msg": "turtle-propset", ...}` and
//! `{"msg": "turtle-methodcall", ...}`, terminated by `{"msg": "done"}`, or
//! fails out of band with a [`SandboxFault`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::foundation::core::WORKER_TIMEOUT_MSG;

/// Host -> sandbox: the code to run and the canvas it draws on.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecRequest {
    pub source: String,
    pub width: u32,
    pub height: u32,
}

/// One drawing instruction emitted by the sandbox.
///
/// Order is draw order; commands are applied exactly once during replay.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "msg")]
pub enum Command {
    #[serde(rename = "turtle-propset")]
    PropertySet { property: String, value: Value },
    #[serde(rename = "turtle-methodcall")]
    MethodCall {
        method: String,
        #[serde(default)]
        args: Vec<Value>,
    },
}

impl Command {
    pub fn property(property: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::PropertySet {
            property: property.into(),
            value: value.into(),
        }
    }

    pub fn method(method: impl Into<String>, args: impl IntoIterator<Item = Value>) -> Self {
        Self::MethodCall {
            method: method.into(),
            args: args.into_iter().collect(),
        }
    }
}

/// Sandbox -> host, in-band. Mirrors [`Command`] plus the terminal marker.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "msg")]
pub enum SandboxMessage {
    #[serde(rename = "turtle-propset")]
    PropertySet { property: String, value: Value },
    #[serde(rename = "turtle-methodcall")]
    MethodCall {
        method: String,
        #[serde(default)]
        args: Vec<Value>,
    },
    #[serde(rename = "done")]
    Done,
}

impl SandboxMessage {
    pub fn parse_line(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }
}

impl From<Command> for SandboxMessage {
    fn from(cmd: Command) -> Self {
        match cmd {
            Command::PropertySet { property, value } => Self::PropertySet { property, value },
            Command::MethodCall { method, args } => Self::MethodCall { method, args },
        }
    }
}

/// An abnormal session termination: a runtime error reported by the sandbox,
/// or a timeout synthesized by the host.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SandboxFault {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lineno: Option<u32>,
}

impl SandboxFault {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            lineno: None,
        }
    }

    pub fn at_line(message: impl Into<String>, lineno: u32) -> Self {
        Self {
            message: message.into(),
            lineno: Some(lineno),
        }
    }

    pub fn timeout() -> Self {
        Self::new(WORKER_TIMEOUT_MSG)
    }

    /// Text for the error display, prefixed with `Line N: ` when known.
    pub fn display_text(&self) -> String {
        match self.lineno {
            Some(n) if n > 0 => format!("Line {n}: {}", self.message),
            _ => self.message.clone(),
        }
    }
}

impl std::fmt::Display for SandboxFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.display_text())
    }
}

/// What a live sandbox process hands to the host, in emission order.
#[derive(Clone, Debug, PartialEq)]
pub enum SandboxEvent {
    Command(Command),
    Done,
    Fault(SandboxFault),
}

impl From<SandboxMessage> for SandboxEvent {
    fn from(msg: SandboxMessage) -> Self {
        match msg {
            SandboxMessage::PropertySet { property, value } => {
                Self::Command(Command::PropertySet { property, value })
            }
            SandboxMessage::MethodCall { method, args } => {
                Self::Command(Command::MethodCall { method, args })
            }
            SandboxMessage::Done => Self::Done,
        }
    }
}
