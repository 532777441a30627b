//! turtle-lab is the engine behind a live-coding turtle graphics widget.
//!
//! User code runs in an isolated sandbox that streams drawing commands back to
//! the host. When the sandbox finishes (or fails, or runs out of time) the
//! host replays the commands onto a canvas and exports it as a PNG with the
//! source embedded, so dropping the PNG back onto the widget restores the code.
//!
//! # Pipeline overview
//!
//! 1. **Debounce**: edits re-arm a short timer; only the last edit renders.
//! 2. **Execute**: a [`Session`] spawns the sandbox with the source and canvas
//!    size, buffers its [`Command`]s and enforces a hard timeout.
//! 3. **Finalize**: errors are shown, buffered commands are replayed onto a
//!    cleared [`Surface`] through the turtle [`Pen`].
//! 4. **Bake**: the surface is encoded as PNG with the source in a text chunk
//!    and presented through an [`ImageDisplay`], one live handle at a time.
//! 5. **Import**: a dropped PNG with embedded source feeds back into step 2.
//!
//! The widget itself is [`Lab`]. It is single-threaded and takes the current
//! time as an argument, so hosts with their own event loop call [`Lab::tick`]
//! and tests can step time deterministically.
#![forbid(unsafe_code)]

pub mod bake;
pub mod config;
pub mod cursor;
pub mod debounce;
pub mod display;
mod foundation;
pub mod import;
pub mod lab;
pub mod protocol;
pub mod replay;
pub mod sandbox;
pub mod session;
pub mod surface;

pub use bake::{
    BakedImage, PNG_MIME, SOURCE_FIELD_KEY, bake, decode_source, encode_png, encode_source,
    extract_source, read_text_fields,
};
pub use config::LabConfig;
pub use cursor::{DrawingCursor, Pen, Turtle, parse_color};
pub use debounce::Debouncer;
pub use display::{BlobRegistry, DisplayHandle, ImageDisplay};
pub use foundation::core::{
    CanvasSize, DEFAULT_CANVAS_SIZE, RENDER_DELAY, Rgba8, TURTLE_HEIGHT, TURTLE_WIDTH,
    WORKER_TIMEOUT, WORKER_TIMEOUT_MSG,
};
pub use foundation::error::{LabError, LabResult};
pub use import::{DragEvent, DragPhase, DragResponse, DroppedFile, ImportOutcome, inspect_drag};
pub use lab::{ErrorDisplay, Lab};
pub use protocol::{Command, ExecRequest, SandboxEvent, SandboxFault, SandboxMessage};
pub use replay::{CommandBuffer, ReplayError, replay};
pub use sandbox::{ProcessSandbox, Sandbox, SandboxChild, SandboxProcess};
pub use session::{MAX_EVENTS_PER_PUMP, Session, SessionOutcome, SessionState};
pub use surface::Surface;
