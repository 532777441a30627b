use crate::cursor::DrawingCursor;
use crate::foundation::error::LabError;
use crate::protocol::Command;

/// Commands collected during one session, in arrival order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CommandBuffer {
    commands: Vec<Command>,
}

impl CommandBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, cmd: Command) {
        self.commands.push(cmd);
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn as_slice(&self) -> &[Command] {
        &self.commands
    }

    pub fn into_commands(self) -> Vec<Command> {
        self.commands
    }
}

/// A command the drawing cursor refused during replay.
#[derive(thiserror::Error, Debug)]
#[error("command {index}: {source}")]
pub struct ReplayError {
    pub index: usize,
    #[source]
    pub source: LabError,
}

/// Apply `commands` to `cursor` in order.
///
/// Replay stops at the first command the cursor rejects; everything before it
/// has already been applied.
pub fn replay<C: DrawingCursor + ?Sized>(
    cursor: &mut C,
    commands: &[Command],
) -> Result<(), ReplayError> {
    for (index, cmd) in commands.iter().enumerate() {
        let applied = match cmd {
            Command::PropertySet { property, value } => cursor.set_property(property, value),
            Command::MethodCall { method, args } => cursor.call_method(method, args),
        };
        applied.map_err(|source| ReplayError { index, source })?;
    }
    Ok(())
}
