use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::{Duration, Instant};

use serde_json::json;
use turtle_lab::{
    BlobRegistry, Command, DragEvent, DragPhase, DroppedFile, ExecRequest, Lab, LabConfig,
    LabError, LabResult, Sandbox, SandboxEvent, SandboxFault, SandboxProcess, WORKER_TIMEOUT_MSG,
    encode_png,
};

struct Run {
    request: ExecRequest,
    queue: VecDeque<SandboxEvent>,
    terminated: u32,
}

#[derive(Default)]
struct Script {
    runs: Vec<Run>,
    fail_spawn: bool,
    /// Every run streams `fd(1)` forever once its queue is empty.
    endless: bool,
}

type Shared = Rc<RefCell<Script>>;

struct ScriptedSandbox(Shared);

struct ScriptedProcess {
    script: Shared,
    index: usize,
}

impl Sandbox for ScriptedSandbox {
    type Process = ScriptedProcess;

    fn spawn(&mut self, request: &ExecRequest) -> LabResult<ScriptedProcess> {
        let mut script = self.0.borrow_mut();
        if script.fail_spawn {
            return Err(LabError::sandbox("no workers available"));
        }
        script.runs.push(Run {
            request: request.clone(),
            queue: VecDeque::new(),
            terminated: 0,
        });
        Ok(ScriptedProcess {
            script: Rc::clone(&self.0),
            index: script.runs.len() - 1,
        })
    }
}

impl SandboxProcess for ScriptedProcess {
    fn try_next(&mut self) -> Option<SandboxEvent> {
        let mut script = self.script.borrow_mut();
        let endless = script.endless;
        script.runs[self.index]
            .queue
            .pop_front()
            .or_else(|| endless.then(|| fd(1)))
    }

    fn terminate(&mut self) {
        self.script.borrow_mut().runs[self.index].terminated += 1;
    }
}

type TestLab = Lab<ScriptedSandbox, BlobRegistry>;

struct Harness {
    lab: TestLab,
    script: Shared,
    t0: Instant,
}

impl Harness {
    fn new(code: &str) -> Self {
        Self::with_script(code, Script::default())
    }

    fn with_script(code: &str, script: Script) -> Self {
        let script = Rc::new(RefCell::new(script));
        let t0 = Instant::now();
        let config = LabConfig {
            canvas_width: 32,
            canvas_height: 32,
            ..LabConfig::default()
        };
        let lab = Lab::create(
            config,
            ScriptedSandbox(Rc::clone(&script)),
            BlobRegistry::new(),
            code,
            t0,
        )
        .unwrap();
        Self { lab, script, t0 }
    }

    fn at(&self, ms: u64) -> Instant {
        self.t0 + Duration::from_millis(ms)
    }

    fn emit(&self, run: usize, events: impl IntoIterator<Item = SandboxEvent>) {
        self.script.borrow_mut().runs[run].queue.extend(events);
    }

    fn runs(&self) -> usize {
        self.script.borrow().runs.len()
    }

    fn source_of(&self, run: usize) -> String {
        self.script.borrow().runs[run].request.source.clone()
    }

    fn terminated(&self, run: usize) -> u32 {
        self.script.borrow().runs[run].terminated
    }

    fn tick(&mut self, ms: u64) {
        let now = self.at(ms);
        self.lab.tick(now).unwrap();
    }
}

fn fd(n: u32) -> SandboxEvent {
    SandboxEvent::Command(Command::method("fd", [json!(n)]))
}

fn fd_cmd(n: u32) -> Command {
    Command::method("fd", [json!(n)])
}

#[test]
fn create_renders_initial_code_verbatim_with_canvas_size() {
    let h = Harness::new("  fd(10)\n");
    assert_eq!(h.runs(), 1);
    let script = h.script.borrow();
    assert_eq!(
        script.runs[0].request,
        ExecRequest {
            source: "  fd(10)\n".to_string(),
            width: 32,
            height: 32,
        }
    );
    assert!(h.lab.has_live_session());
}

#[test]
fn rapid_edits_collapse_into_one_render_of_the_last_text() {
    let mut h = Harness::new("");
    h.emit(0, [SandboxEvent::Done]);
    h.tick(0);

    h.lab.edit("f", h.at(10));
    h.tick(60);
    h.lab.edit("fd", h.at(60));
    h.tick(120);
    h.lab.edit("fd(", h.at(120));
    h.tick(219);
    assert_eq!(h.runs(), 1);

    h.tick(220);
    assert_eq!(h.runs(), 2);
    assert_eq!(h.source_of(1), "fd(");

    h.tick(1000);
    assert_eq!(h.runs(), 2);
}

#[test]
fn unchanged_text_does_not_render_again() {
    let mut h = Harness::new("fd(1)");
    h.emit(0, [fd(1), SandboxEvent::Done]);
    h.tick(0);

    h.lab.render(h.at(5)).unwrap();
    h.lab.edit("fd(1)", h.at(10));
    h.tick(200);
    assert_eq!(h.runs(), 1);
    assert!(!h.lab.has_live_session());
}

#[test]
fn new_render_terminates_prior_session_and_ignores_its_messages() {
    let mut h = Harness::new("fd(1); fd(1)");
    h.emit(0, [fd(1)]);
    h.tick(10);

    h.lab.edit("fd(5)", h.at(20));
    h.tick(120);
    assert_eq!(h.runs(), 2);
    assert_eq!(h.terminated(0), 1);

    // Late output of the superseded run never reaches the buffer.
    h.emit(0, [fd(1), SandboxEvent::Done]);
    h.tick(130);
    assert!(h.lab.has_live_session());
    assert!(h.lab.baked().is_none());

    h.emit(1, [fd(5), SandboxEvent::Done]);
    h.tick(140);
    assert!(!h.lab.has_live_session());
    assert_eq!(h.lab.surface().shape_count(), 3);
    assert_eq!(h.terminated(0), 1);
    assert_eq!(h.terminated(1), 1);
}

#[test]
fn silent_session_times_out_exactly_once() {
    let mut h = Harness::new("while (true) {}");
    h.tick(1999);
    assert!(h.lab.has_live_session());
    assert!(!h.lab.error().is_shown());
    assert_eq!(h.lab.next_deadline(), Some(h.at(2000)));

    h.tick(2000);
    assert!(!h.lab.has_live_session());
    assert!(h.lab.error().is_shown());
    assert_eq!(h.lab.error().text(), WORKER_TIMEOUT_MSG);
    assert_eq!(h.terminated(0), 1);

    h.tick(5000);
    assert_eq!(h.terminated(0), 1);
    assert!(h.lab.baked().is_none());
    assert!(h.lab.is_idle());
}

#[test]
fn queued_completion_beats_an_expired_deadline() {
    let mut h = Harness::new("fd(3)");
    h.emit(0, [fd(3), SandboxEvent::Done]);
    h.tick(2500);
    assert!(!h.lab.error().is_shown());
    assert!(h.lab.baked().is_some());
}

#[test]
fn streaming_sandbox_is_cut_off_at_the_deadline() {
    let mut h = Harness::with_script(
        "while (true) fd(1)",
        Script {
            endless: true,
            ..Script::default()
        },
    );
    h.tick(100);
    assert!(h.lab.has_live_session());

    h.tick(2000);
    assert!(!h.lab.has_live_session());
    assert_eq!(h.lab.error().text(), WORKER_TIMEOUT_MSG);
    assert_eq!(h.terminated(0), 1);
    assert_eq!(
        h.lab.surface().shape_count(),
        3 * 2 * turtle_lab::MAX_EVENTS_PER_PUMP
    );
    assert!(h.lab.baked().is_some());
}

#[test]
fn timeout_after_partial_output_still_draws_it() {
    let mut h = Harness::new("fd(10); while (true) {}");
    h.emit(0, [fd(10)]);
    h.tick(100);
    h.tick(2100);
    assert_eq!(h.lab.error().text(), WORKER_TIMEOUT_MSG);
    assert_eq!(h.lab.surface().shape_count(), 3);
    assert!(h.lab.baked().is_some());
}

#[test]
fn sandbox_fault_shows_line_number() {
    let mut h = Harness::new("fd(1)\nbogus()");
    h.emit(
        0,
        [
            fd(1),
            SandboxEvent::Fault(SandboxFault::at_line("bogus is not defined", 2)),
        ],
    );
    h.tick(10);
    assert!(h.lab.error().is_shown());
    assert_eq!(h.lab.error().text(), "Line 2: bogus is not defined");
    assert_eq!(h.lab.surface().shape_count(), 3);
}

#[test]
fn finish_precedence_rules() {
    let mut h = Harness::new("");
    h.lab.finish(vec![fd_cmd(4)], None).unwrap();
    let first = h.lab.display_handle();
    assert!(first.is_some());
    assert_eq!(h.lab.surface().shape_count(), 3);

    // Error with nothing drawn: show it, keep the canvas and image as they were.
    h.lab
        .finish(Vec::new(), Some(SandboxFault::new("early")))
        .unwrap();
    assert!(h.lab.error().is_shown());
    assert_eq!(h.lab.error().text(), "early");
    assert_eq!(h.lab.surface().shape_count(), 3);
    assert_eq!(h.lab.display_handle(), first);

    // Error after some output: show it and redraw that output.
    h.lab
        .finish(vec![fd_cmd(1)], Some(SandboxFault::new("later")))
        .unwrap();
    assert_eq!(h.lab.error().text(), "later");
    assert_eq!(h.lab.surface().shape_count(), 3);
    assert_ne!(h.lab.display_handle(), first);

    // Success: hide the error and redraw everything.
    h.lab.finish(vec![fd_cmd(1), fd_cmd(2)], None).unwrap();
    assert!(!h.lab.error().is_shown());
    assert_eq!(h.lab.surface().shape_count(), 6);
}

#[test]
fn replay_applies_commands_in_order_on_a_fresh_turtle() {
    let mut h = Harness::new("square");
    h.emit(
        0,
        [
            SandboxEvent::Command(Command::method("penUp", [])),
            SandboxEvent::Command(Command::method("rt", [json!(90)])),
            fd(10),
            SandboxEvent::Command(Command::method("lt", [json!(90)])),
            SandboxEvent::Command(Command::method("penDown", [])),
            fd(5),
            SandboxEvent::Done,
        ],
    );
    h.tick(10);
    let t = h.lab.turtle();
    assert!((t.position.x - 26.0).abs() < 1e-9);
    assert!((t.position.y - 11.0).abs() < 1e-9);
    assert_eq!(h.lab.surface().shape_count(), 3);
}

#[test]
fn rejected_command_is_reported_and_prior_drawing_kept() {
    let mut h = Harness::new("fd(2); explode()");
    h.emit(
        0,
        [
            fd(2),
            SandboxEvent::Command(Command::method("explode", [])),
            fd(2),
            SandboxEvent::Done,
        ],
    );
    h.tick(10);
    assert!(h.lab.error().is_shown());
    assert!(h.lab.error().text().contains("unknown turtle method 'explode'"));
    assert_eq!(h.lab.surface().shape_count(), 3);
    assert!(h.lab.baked().is_some());
}

#[test]
fn huge_pen_width_is_rejected_before_drawing() {
    let mut h = Harness::new("");
    h.lab
        .finish(
            vec![
                Command::property("penWidth", json!(1e300)),
                fd_cmd(1),
            ],
            None,
        )
        .unwrap();
    assert!(h.lab.error().is_shown());
    assert!(h.lab.error().text().contains("penWidth"));
    assert!(h.lab.surface().is_blank());
    assert!(h.lab.baked().is_some());
}

#[test]
fn baked_image_round_trips_through_drop() {
    let source = "lt(45) // 100% & ☃ = snow\nfd(10)";
    let mut h = Harness::new(source);
    h.emit(0, [fd(10), SandboxEvent::Done]);
    h.tick(10);
    let baked = h.lab.baked().cloned().unwrap();
    assert_eq!(baked.source().as_deref(), Some(source));

    let mut other = Harness::new("");
    other.emit(0, [SandboxEvent::Done]);
    other.tick(0);
    let before = other.runs();
    let response = other
        .lab
        .handle_drag(
            &DragEvent::drop_files(vec![DroppedFile::from_bytes("image/png", baked.bytes)]),
            other.at(50),
        )
        .unwrap();
    assert!(response.suppress_default);
    assert_eq!(other.lab.code(), source);
    assert_eq!(other.runs(), before + 1);
    assert_eq!(other.source_of(before), source);
}

#[test]
fn dropping_an_image_baked_from_empty_code_keeps_the_code() {
    let mut h = Harness::new("fd(1)");
    h.emit(0, [fd(1), SandboxEvent::Done]);
    h.tick(0);

    let empty = turtle_lab::bake(&turtle_lab::Surface::new(turtle_lab::CanvasSize::square(4)), "")
        .unwrap();
    let response = h
        .lab
        .handle_drag(
            &DragEvent::drop_files(vec![DroppedFile::from_bytes("image/png", empty.bytes)]),
            h.at(50),
        )
        .unwrap();
    assert!(response.suppress_default);
    assert_eq!(h.lab.code(), "fd(1)");
    assert_eq!(h.runs(), 1);
}

#[test]
fn only_one_display_handle_is_live_across_renders() {
    let mut h = Harness::new("fd(0)");
    h.emit(0, [fd(0), SandboxEvent::Done]);
    h.tick(0);

    let mut now = 0;
    for i in 1..=5u32 {
        now += 500;
        h.lab.edit(format!("fd({i})"), h.at(now));
        h.tick(now + 100);
        h.emit(i as usize, [fd(i), SandboxEvent::Done]);
        h.tick(now + 110);
        assert_eq!(h.lab.display().live_handles(), 1);
    }
    assert_eq!(h.lab.display().created(), 6);
    let handle = h.lab.display_handle().unwrap();
    assert_eq!(
        h.lab.display().get(handle).and_then(|img| img.source()),
        Some("fd(5)".to_string())
    );
}

#[test]
fn unsupported_drops_change_nothing() {
    let mut h = Harness::new("fd(1)");
    h.emit(0, [fd(1), SandboxEvent::Done]);
    h.tick(0);
    let runs = h.runs();

    for phase in [DragPhase::Enter, DragPhase::Over, DragPhase::Leave] {
        let resp = h
            .lab
            .handle_drag(&DragEvent::phase(phase), h.at(10))
            .unwrap();
        assert!(resp.suppress_default);
    }

    let jpeg = DragEvent::drop_files(vec![DroppedFile::from_bytes("image/jpeg", vec![1, 2, 3])]);
    assert!(!h.lab.handle_drag(&jpeg, h.at(20)).unwrap().suppress_default);

    let bare_png = encode_png(&[0; 4], turtle_lab::CanvasSize::square(1), &[]).unwrap();
    let png = DragEvent::drop_files(vec![DroppedFile::from_bytes("image/png", bare_png)]);
    assert!(h.lab.handle_drag(&png, h.at(30)).unwrap().suppress_default);

    let garbage = DragEvent::drop_files(vec![DroppedFile::from_bytes("image/png", vec![0; 16])]);
    h.lab.handle_drag(&garbage, h.at(40)).unwrap();

    assert_eq!(h.lab.code(), "fd(1)");
    assert_eq!(h.runs(), runs);
    assert!(!h.lab.error().is_shown());
}

#[test]
fn spawn_failure_is_shown_like_a_sandbox_fault() {
    let h = Harness::with_script(
        "fd(1)",
        Script {
            fail_spawn: true,
            ..Script::default()
        },
    );
    assert!(!h.lab.has_live_session());
    assert!(h.lab.error().is_shown());
    assert!(h.lab.error().text().contains("no workers available"));
    assert!(h.lab.baked().is_none());
}

#[test]
fn next_deadline_tracks_the_earliest_timer() {
    let mut h = Harness::new("");
    assert_eq!(h.lab.next_deadline(), Some(h.at(2000)));
    h.lab.edit("fd(1)", h.at(10));
    assert_eq!(h.lab.next_deadline(), Some(h.at(110)));
    h.emit(0, [SandboxEvent::Done]);
    h.tick(50);
    assert_eq!(h.lab.next_deadline(), Some(h.at(110)));
    assert!(!h.lab.is_idle());
}
