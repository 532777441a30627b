//! The live-coding widget.
//!
//! A [`Lab`] holds everything one widget instance owns: the code being edited,
//! the debounce timer, at most one live [`Session`], the drawing surface, the
//! error display and the currently presented baked image. The host drives it
//! from a single-threaded event loop by forwarding edits, drag events and the
//! passage of time ([`Lab::tick`]); nothing here blocks except
//! [`Lab::run_until_idle`], which is a convenience driver for native hosts.
//!
//! ```text
//! edit -> input_changed -> (100 ms quiet) -> render -> Session
//!      -> commands buffered -> done / fault / timeout -> finish
//!      -> replay onto a cleared surface -> bake PNG (+ source) -> present
//! ```

use std::time::Instant;

use crate::bake::{BakedImage, bake};
use crate::config::LabConfig;
use crate::cursor::{Pen, Turtle};
use crate::debounce::Debouncer;
use crate::display::{BlobRegistry, DisplayHandle, ImageDisplay};
use crate::foundation::error::LabResult;
use crate::import::{DragEvent, DragResponse, inspect_drag};
use crate::protocol::{Command, SandboxFault};
use crate::replay::{ReplayError, replay};
use crate::sandbox::Sandbox;
use crate::session::{Session, SessionOutcome};
use crate::surface::Surface;

/// The user-visible error region.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ErrorDisplay {
    shown: bool,
    text: String,
}

impl ErrorDisplay {
    pub fn is_shown(&self) -> bool {
        self.shown
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    fn show(&mut self, text: String) {
        self.shown = true;
        self.text = text;
    }

    /// Hides the region. The last text is kept, as a hidden element keeps its
    /// content.
    fn hide(&mut self) {
        self.shown = false;
    }
}

/// One live-coding widget instance.
pub struct Lab<S: Sandbox, D: ImageDisplay = BlobRegistry> {
    config: LabConfig,
    sandbox: S,
    display: D,

    code: String,
    last_source: Option<String>,
    debouncer: Debouncer,

    session: Option<Session<S::Process>>,
    sessions_started: u64,

    turtle: Turtle,
    surface: Surface,
    error: ErrorDisplay,
    baked: Option<BakedImage>,
    handle: Option<DisplayHandle>,
}

impl<S: Sandbox, D: ImageDisplay> Lab<S, D> {
    /// Build a widget and render `initial_code` right away. The code is used
    /// exactly as given.
    pub fn create(
        config: LabConfig,
        sandbox: S,
        display: D,
        initial_code: impl Into<String>,
        now: Instant,
    ) -> LabResult<Self> {
        config.validate()?;
        let size = config.canvas_size();
        let mut lab = Self {
            debouncer: Debouncer::new(config.render_delay()),
            config,
            sandbox,
            display,
            code: initial_code.into(),
            last_source: None,
            session: None,
            sessions_started: 0,
            turtle: Turtle::new(size),
            surface: Surface::new(size),
            error: ErrorDisplay::default(),
            baked: None,
            handle: None,
        };
        lab.render(now)?;
        Ok(lab)
    }

    pub fn config(&self) -> &LabConfig {
        &self.config
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    /// Replace the code without scheduling anything.
    pub fn set_code(&mut self, code: impl Into<String>) {
        self.code = code.into();
    }

    /// The input changed: (re)arm the debounce timer.
    pub fn input_changed(&mut self, now: Instant) {
        self.debouncer.schedule(now);
    }

    /// `set_code` followed by `input_changed`, as a keystroke would.
    pub fn edit(&mut self, code: impl Into<String>, now: Instant) {
        self.set_code(code);
        self.input_changed(now);
    }

    pub fn error(&self) -> &ErrorDisplay {
        &self.error
    }

    pub fn baked(&self) -> Option<&BakedImage> {
        self.baked.as_ref()
    }

    pub fn display_handle(&self) -> Option<DisplayHandle> {
        self.handle
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    pub fn sandbox(&self) -> &S {
        &self.sandbox
    }

    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    pub fn turtle(&self) -> &Turtle {
        &self.turtle
    }

    /// Source of the most recent render request.
    pub fn last_source(&self) -> Option<&str> {
        self.last_source.as_deref()
    }

    pub fn has_live_session(&self) -> bool {
        self.session.is_some()
    }

    pub fn sessions_started(&self) -> u64 {
        self.sessions_started
    }

    /// Nothing scheduled and nothing running.
    pub fn is_idle(&self) -> bool {
        !self.debouncer.is_pending() && self.session.is_none()
    }

    /// Earliest instant at which [`tick`](Self::tick) has timer work to do.
    pub fn next_deadline(&self) -> Option<Instant> {
        let session = self.session.as_ref().and_then(Session::deadline);
        match (self.debouncer.deadline(), session) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Start executing the current code, superseding any live session.
    /// Does nothing when the code is unchanged since the last render.
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn render(&mut self, now: Instant) -> LabResult<()> {
        if self.last_source.as_deref() == Some(self.code.as_str()) {
            return Ok(());
        }
        let source = self.code.clone();
        self.last_source = Some(source.clone());

        self.kill_session();
        self.turtle = Turtle::new(self.surface.size());

        self.sessions_started += 1;
        let started = Session::start(
            &mut self.sandbox,
            self.sessions_started,
            &source,
            self.surface.size(),
            self.config.worker_timeout(),
            now,
        );
        match started {
            Ok(session) => {
                tracing::debug!(session = session.id(), "session started");
                self.session = Some(session);
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to start sandbox");
                self.finish(Vec::new(), Some(SandboxFault::new(e.to_string())))
            }
        }
    }

    /// Advance the event loop to `now`: fire the debounce timer, deliver a
    /// bounded batch of sandbox messages, then enforce the session deadline.
    pub fn tick(&mut self, now: Instant) -> LabResult<()> {
        if self.debouncer.fire(now) {
            self.render(now)?;
        }

        let outcome = self.session.as_mut().and_then(|session| session.pump(now));
        match outcome {
            Some(outcome) => self.finish_session(outcome),
            None => Ok(()),
        }
    }

    /// Handle a drag event on the drop zone. A dropped PNG carrying source
    /// replaces the code and renders it immediately.
    pub fn handle_drag(&mut self, event: &DragEvent, now: Instant) -> LabResult<DragResponse> {
        let outcome = inspect_drag(event);
        if let Some(source) = outcome.source {
            tracing::info!(bytes = source.len(), "imported source from dropped image");
            self.code = source;
            self.render(now)?;
        }
        Ok(outcome.response)
    }

    /// Finalize a render: show or hide the error, then replay `commands` and
    /// bake the result.
    ///
    /// A failure with nothing drawn leaves the surface and image untouched so
    /// a half-typed program does not blank the canvas. A failure after some
    /// commands still draws them.
    pub fn finish(&mut self, commands: Vec<Command>, fault: Option<SandboxFault>) -> LabResult<()> {
        self.kill_session();

        match &fault {
            Some(fault) => {
                self.error.show(fault.display_text());
                if commands.is_empty() {
                    return Ok(());
                }
            }
            None => self.error.hide(),
        }

        if let Err(e) = self.replay(&commands) {
            tracing::warn!(error = %e, "replay stopped early");
            if fault.is_none() {
                self.error.show(e.source.to_string());
            }
        }
        self.bake()
    }

    /// Drive the lab with the wall clock until nothing is scheduled or running.
    pub fn run_until_idle(&mut self) -> LabResult<()> {
        let poll = self.config.poll_interval();
        loop {
            let now = Instant::now();
            self.tick(now)?;
            if self.is_idle() {
                return Ok(());
            }
            let wait = self
                .next_deadline()
                .map_or(poll, |d| d.saturating_duration_since(now))
                .min(poll);
            std::thread::sleep(wait);
        }
    }

    fn finish_session(&mut self, outcome: SessionOutcome) -> LabResult<()> {
        let Some(session) = self.session.take() else {
            return Ok(());
        };
        let id = session.id();
        let commands = session.into_commands();
        match &outcome {
            SessionOutcome::Completed => {
                tracing::debug!(session = id, commands = commands.len(), "session completed");
            }
            SessionOutcome::Failed(fault) => {
                tracing::debug!(
                    session = id,
                    commands = commands.len(),
                    error = %fault,
                    "session failed"
                );
            }
        }
        self.finish(commands.into_commands(), outcome.into_fault())
    }

    fn kill_session(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.terminate();
            tracing::debug!(session = session.id(), "session terminated");
        }
    }

    fn replay(&mut self, commands: &[Command]) -> Result<(), ReplayError> {
        self.surface.clear();
        self.turtle = Turtle::new(self.surface.size());
        let mut pen = Pen::new(&mut self.turtle, &mut self.surface);
        replay(&mut pen, commands)
    }

    fn bake(&mut self) -> LabResult<()> {
        let image = bake(&self.surface, self.last_source.as_deref().unwrap_or_default())?;
        if let Some(previous) = self.handle.take() {
            self.display.release(previous);
        }
        self.handle = Some(self.display.present(&image)?);
        tracing::debug!(bytes = image.bytes.len(), "canvas baked");
        self.baked = Some(image);
        Ok(())
    }
}
