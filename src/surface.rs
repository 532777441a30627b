use crate::foundation::core::{CanvasSize, Rgba8};

struct FilledShape {
    path: kurbo::BezPath,
    color: Rgba8,
}

/// The raster the lab draws onto.
///
/// Drawing records filled paths; pixels are produced on demand by
/// [`to_rgba8`](Self::to_rgba8). The background is transparent.
pub struct Surface {
    size: CanvasSize,
    shapes: Vec<FilledShape>,
}

impl Surface {
    pub fn new(size: CanvasSize) -> Self {
        Self {
            size,
            shapes: Vec::new(),
        }
    }

    pub fn size(&self) -> CanvasSize {
        self.size
    }

    pub fn clear(&mut self) {
        self.shapes.clear();
    }

    pub fn is_blank(&self) -> bool {
        self.shapes.is_empty()
    }

    pub fn shape_count(&self) -> usize {
        self.shapes.len()
    }

    pub fn fill(&mut self, path: kurbo::BezPath, color: Rgba8) {
        if color.a == 0 {
            return;
        }
        self.shapes.push(FilledShape { path, color });
    }

    /// Premultiplied RGBA8, row-major, `width * height * 4` bytes.
    pub fn to_rgba8_premul(&self) -> Vec<u8> {
        let w = self.size.width as u16;
        let h = self.size.height as u16;
        let mut pixmap = vello_cpu::Pixmap::new(w, h);
        if !self.shapes.is_empty() {
            let mut ctx = vello_cpu::RenderContext::new(w, h);
            for shape in &self.shapes {
                ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(
                    shape.color.r,
                    shape.color.g,
                    shape.color.b,
                    shape.color.a,
                ));
                ctx.fill_path(&bezpath_to_cpu(&shape.path));
            }
            ctx.flush();
            ctx.render_to_pixmap(&mut pixmap);
        }
        pixmap.data_as_u8_slice().to_vec()
    }

    /// Straight-alpha RGBA8, ready for PNG export.
    pub fn to_rgba8(&self) -> Vec<u8> {
        let mut data = self.to_rgba8_premul();
        unpremultiply_in_place(&mut data);
        data
    }
}

fn unpremultiply_in_place(data: &mut [u8]) {
    for px in data.chunks_exact_mut(4) {
        let a = px[3] as u32;
        if a == 0 || a == 255 {
            continue;
        }
        for c in &mut px[..3] {
            *c = (((*c as u32) * 255 + a / 2) / a).min(255) as u8;
        }
    }
}

fn point_to_cpu(p: kurbo::Point) -> vello_cpu::kurbo::Point {
    vello_cpu::kurbo::Point::new(p.x, p.y)
}

fn bezpath_to_cpu(path: &kurbo::BezPath) -> vello_cpu::kurbo::BezPath {
    use kurbo::PathEl;

    let mut out = vello_cpu::kurbo::BezPath::new();
    for &el in path.elements() {
        match el {
            PathEl::MoveTo(p) => out.move_to(point_to_cpu(p)),
            PathEl::LineTo(p) => out.line_to(point_to_cpu(p)),
            PathEl::QuadTo(p1, p2) => out.quad_to(point_to_cpu(p1), point_to_cpu(p2)),
            PathEl::CurveTo(p1, p2, p3) => {
                out.curve_to(point_to_cpu(p1), point_to_cpu(p2), point_to_cpu(p3));
            }
            PathEl::ClosePath => out.close_path(),
        }
    }
    out
}
