//! The drawing cursor: a turtle that turns replayed commands into filled
//! shapes on a [`Surface`].

use kurbo::{BezPath, Point, Shape as _, Vec2};
use serde_json::Value;

use crate::foundation::core::{CanvasSize, Rgba8, TURTLE_HEIGHT, TURTLE_WIDTH};
use crate::foundation::error::{LabError, LabResult};
use crate::surface::Surface;

const MAX_EXTENT_DIAGONALS: f64 = 4.0;

/// Capability the replayer drives. Both operations validate their input and
/// may fail.
pub trait DrawingCursor {
    fn set_property(&mut self, name: &str, value: &Value) -> LabResult<()>;
    fn call_method(&mut self, name: &str, args: &[Value]) -> LabResult<()>;
}

/// Turtle state. Heading is in degrees, counter-clockwise, 90 = up.
#[derive(Clone, Debug, PartialEq)]
pub struct Turtle {
    pub position: Point,
    pub heading: f64,
    pub pen_down: bool,
    pub pen_style: Rgba8,
    pub pen_width: f64,
}

impl Turtle {
    /// A turtle centred on a canvas of `size`, facing up.
    pub fn new(size: CanvasSize) -> Self {
        Self {
            position: Point::new(f64::from(size.width) / 2.0, f64::from(size.height) / 2.0),
            heading: 90.0,
            pen_down: true,
            pen_style: Rgba8::BLACK,
            pen_width: 1.0,
        }
    }

    fn direction(&self) -> Vec2 {
        let rad = self.heading.to_radians();
        // Canvas y grows downwards.
        Vec2::new(rad.cos(), -rad.sin())
    }
}

/// A [`Turtle`] bound to the surface it draws on.
pub struct Pen<'a> {
    turtle: &'a mut Turtle,
    surface: &'a mut Surface,
}

impl<'a> Pen<'a> {
    pub fn new(turtle: &'a mut Turtle, surface: &'a mut Surface) -> Self {
        Self { turtle, surface }
    }

    /// Largest pen width or stamp size accepted, a few canvas diagonals.
    fn max_extent(&self) -> f64 {
        let size = self.surface.size();
        MAX_EXTENT_DIAGONALS * f64::from(size.width).hypot(f64::from(size.height))
    }

    fn checked_extent(&self, value: f64, what: &str) -> LabResult<f64> {
        let max = self.max_extent();
        if value.abs() > max {
            return Err(LabError::validation(format!(
                "{what} {value} exceeds the limit of {max}"
            )));
        }
        Ok(value)
    }

    fn forward(&mut self, distance: f64) -> LabResult<()> {
        let from = self.turtle.position;
        let to = from + self.turtle.direction() * distance;
        if !to.is_finite() {
            return Err(LabError::validation("turtle moved out of range"));
        }
        if self.turtle.pen_down {
            let color = self.turtle.pen_style;
            for path in stroke_segment(from, to, self.turtle.pen_width) {
                self.surface.fill(path, color);
            }
        }
        self.turtle.position = to;
        Ok(())
    }

    fn stamp(&mut self, size: f64) {
        let scale = size / TURTLE_WIDTH;
        let dir = self.turtle.direction();
        let side = Vec2::new(-dir.y, dir.x);
        let p = self.turtle.position;
        let half_w = TURTLE_WIDTH * scale / 2.0;
        let len = TURTLE_HEIGHT * scale;

        let mut path = BezPath::new();
        path.move_to(p + dir * len);
        path.line_to(p + side * half_w);
        path.line_to(p - side * half_w);
        path.close_path();
        self.surface.fill(path, self.turtle.pen_style);
    }
}

impl DrawingCursor for Pen<'_> {
    fn set_property(&mut self, name: &str, value: &Value) -> LabResult<()> {
        match name {
            "penStyle" => {
                let s = value
                    .as_str()
                    .ok_or_else(|| LabError::validation("penStyle must be a string"))?;
                self.turtle.pen_style = parse_color(s)?;
            }
            "penWidth" => {
                let w = finite_number(value, "penWidth")?;
                if w <= 0.0 {
                    return Err(LabError::validation("penWidth must be positive"));
                }
                self.turtle.pen_width = self.checked_extent(w, "penWidth")?;
            }
            other => {
                return Err(LabError::validation(format!(
                    "unknown turtle property '{other}'"
                )));
            }
        }
        Ok(())
    }

    fn call_method(&mut self, name: &str, args: &[Value]) -> LabResult<()> {
        match name {
            "forward" | "fd" => {
                let d = single_number(name, args)?;
                self.forward(d)?;
            }
            "backward" | "bk" => {
                let d = single_number(name, args)?;
                self.forward(-d)?;
            }
            "left" | "lt" => {
                let deg = single_number(name, args)?;
                self.turtle.heading = (self.turtle.heading + deg).rem_euclid(360.0);
            }
            "right" | "rt" => {
                let deg = single_number(name, args)?;
                self.turtle.heading = (self.turtle.heading - deg).rem_euclid(360.0);
            }
            "penUp" => {
                no_args(name, args)?;
                self.turtle.pen_down = false;
            }
            "penDown" => {
                no_args(name, args)?;
                self.turtle.pen_down = true;
            }
            "stamp" => {
                let size = match args {
                    [] | [Value::Null] => TURTLE_WIDTH,
                    [v] => {
                        let size = finite_number(v, "stamp size")?;
                        self.checked_extent(size, "stamp size")?
                    }
                    _ => {
                        return Err(LabError::validation("stamp takes at most one argument"));
                    }
                };
                self.stamp(size);
            }
            other => {
                return Err(LabError::validation(format!(
                    "unknown turtle method '{other}'"
                )));
            }
        }
        Ok(())
    }
}

fn finite_number(value: &Value, what: &str) -> LabResult<f64> {
    value
        .as_f64()
        .filter(|v| v.is_finite())
        .ok_or_else(|| LabError::validation(format!("{what} must be a finite number")))
}

fn single_number(method: &str, args: &[Value]) -> LabResult<f64> {
    match args {
        [v] => finite_number(v, &format!("{method} argument")),
        _ => Err(LabError::validation(format!(
            "{method} takes exactly one argument, got {}",
            args.len()
        ))),
    }
}

fn no_args(method: &str, args: &[Value]) -> LabResult<()> {
    if args.is_empty() {
        Ok(())
    } else {
        Err(LabError::validation(format!("{method} takes no arguments")))
    }
}

/// Quad for the segment body plus round caps at both ends.
fn stroke_segment(from: Point, to: Point, width: f64) -> Vec<BezPath> {
    let half = width / 2.0;
    let mut paths = Vec::with_capacity(3);
    let delta = to - from;
    let len = delta.hypot();
    if len > 0.0 {
        let n = Vec2::new(-delta.y, delta.x) * (half / len);
        let mut body = BezPath::new();
        body.move_to(from + n);
        body.line_to(to + n);
        body.line_to(to - n);
        body.line_to(from - n);
        body.close_path();
        paths.push(body);
    }
    paths.push(kurbo::Circle::new(from, half).to_path(0.05));
    if len > 0.0 {
        paths.push(kurbo::Circle::new(to, half).to_path(0.05));
    }
    paths
}

const NAMED_COLORS: &[(&str, Rgba8)] = &[
    ("black", Rgba8::opaque(0, 0, 0)),
    ("white", Rgba8::opaque(255, 255, 255)),
    ("red", Rgba8::opaque(255, 0, 0)),
    ("green", Rgba8::opaque(0, 128, 0)),
    ("lime", Rgba8::opaque(0, 255, 0)),
    ("blue", Rgba8::opaque(0, 0, 255)),
    ("yellow", Rgba8::opaque(255, 255, 0)),
    ("orange", Rgba8::opaque(255, 165, 0)),
    ("purple", Rgba8::opaque(128, 0, 128)),
    ("pink", Rgba8::opaque(255, 192, 203)),
    ("brown", Rgba8::opaque(165, 42, 42)),
    ("gray", Rgba8::opaque(128, 128, 128)),
    ("grey", Rgba8::opaque(128, 128, 128)),
    ("cyan", Rgba8::opaque(0, 255, 255)),
    ("magenta", Rgba8::opaque(255, 0, 255)),
    ("navy", Rgba8::opaque(0, 0, 128)),
    (
        "transparent",
        Rgba8 {
            r: 0,
            g: 0,
            b: 0,
            a: 0,
        },
    ),
];

/// Parse a CSS colour: a named colour, `#rgb` or `#rrggbb`.
pub fn parse_color(s: &str) -> LabResult<Rgba8> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix('#') {
        let digits: Vec<u8> = hex
            .chars()
            .map(|c| c.to_digit(16).map(|d| d as u8))
            .collect::<Option<_>>()
            .ok_or_else(|| LabError::validation(format!("invalid colour '{s}'")))?;
        return match digits.as_slice() {
            [r, g, b] => Ok(Rgba8::opaque(r * 17, g * 17, b * 17)),
            [r1, r0, g1, g0, b1, b0] => Ok(Rgba8::opaque(
                r1 * 16 + r0,
                g1 * 16 + g0,
                b1 * 16 + b0,
            )),
            _ => Err(LabError::validation(format!("invalid colour '{s}'"))),
        };
    }
    let lower = s.to_ascii_lowercase();
    NAMED_COLORS
        .iter()
        .find(|(name, _)| *name == lower)
        .map(|&(_, c)| c)
        .ok_or_else(|| LabError::validation(format!("unknown colour '{s}'")))
}
