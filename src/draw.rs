use kurbo::{CubicBez, Vec2};
use tracing::error;

use crate::arena::{ObjectSpan, PointArena};
use crate::context::RenderContext;
use crate::foundation::core::{Color, Point, Primitive, chebyshev};
use crate::params::RenderParams;

/// Subdivision depth cap. Exceeding it indicates degenerate or numerically
/// unstable control points; the offending subdivision is truncated and the
/// frame renders with a slightly inaccurate curve.
const MAX_BEZIER_DEPTH: u32 = 100;

/// Assembly state for the currently open object.
pub(crate) struct DrawState {
    pub prim: Primitive,
    pub span_start: usize,
    /// Logical vertices accepted so far (not emitted samples).
    vertices: usize,
    /// Bezier control-point accumulation: 0 = expect c1, 1 = expect c2,
    /// 2 = expect the segment endpoint.
    ctrl_state: u8,
    c1: Point,
    c2: Point,
    last_point: Point,
    last_slope: Point,
}

impl DrawState {
    pub fn new(prim: Primitive, span_start: usize) -> Self {
        let zero = Point::new(0.0, 0.0, Color::BLACK);
        Self {
            prim,
            span_start,
            vertices: 0,
            ctrl_state: 0,
            c1: zero,
            c2: zero,
            last_point: zero,
            last_slope: zero,
        }
    }
}

fn near(a: Point, b: Point, snap: f64) -> bool {
    (a.x - b.x).hypot(a.y - b.y) <= snap
}

/// Borrowed view the per-vertex emitters work through.
struct Assembler<'a> {
    st: &'a mut DrawState,
    arena: &'a mut PointArena,
    params: &'a RenderParams,
}

impl Assembler<'_> {
    fn add_point(&mut self, p: Point) {
        self.arena.push(p);
    }

    /// Settle samples owed at the transition toward `target`.
    ///
    /// The first transition of an object gets `start_dwell`. After that the
    /// corner angle decides: a direction change sharper than `curve_angle`
    /// (or a degenerate zero-length direction) needs `corner_dwell`, a gentle
    /// continuation only `curve_dwell`.
    fn dwell_count(&self, target: Point) -> usize {
        let params = self.params;
        if self.st.vertices == 1 {
            return params.start_dwell;
        }
        let last = self.st.last_point;
        let slope = self.st.last_slope;
        let incoming = Vec2::new(slope.x - last.x, slope.y - last.y);
        let outgoing = Vec2::new(last.x - target.x, last.y - target.y);
        let lens = incoming.hypot() * outgoing.hypot();
        if lens == 0.0 {
            params.corner_dwell
        } else if incoming.dot(outgoing) / lens > params.curve_angle {
            params.curve_dwell
        } else {
            params.corner_dwell
        }
    }

    fn line_to(&mut self, p: Point) {
        if self.st.vertices == 0 {
            self.add_point(p);
            self.st.vertices = 1;
            self.st.last_point = p;
            return;
        }
        let dwell = self.dwell_count(p);
        let last = self.st.last_point;
        for _ in 0..dwell {
            self.add_point(last);
        }
        let dx = p.x - last.x;
        let dy = p.y - last.y;
        let steps = (chebyshev(dx, dy) / self.params.on_speed).ceil() as usize;
        for i in 1..=steps {
            self.add_point(Point::new(
                last.x + dx / steps as f64 * i as f64,
                last.y + dy / steps as f64 * i as f64,
                p.color,
            ));
        }
        self.st.last_slope = last;
        self.st.last_point = p;
        self.st.vertices += 1;
    }

    fn bezier_to(&mut self, p: Point) {
        if self.st.vertices == 0 {
            self.add_point(p);
            self.st.vertices = 1;
            self.st.last_point = p;
            return;
        }
        match self.st.ctrl_state {
            0 => {
                self.st.c1 = p;
                self.st.ctrl_state = 1;
                return;
            }
            1 => {
                self.st.c2 = p;
                self.st.ctrl_state = 2;
                return;
            }
            _ => {}
        }

        // Dwell direction comes from the first control point that is not
        // coincident with the anchor.
        let snap = self.params.snap;
        let dwell = if near(self.st.last_point, self.st.c1, snap) {
            self.dwell_count(self.st.c2)
        } else {
            self.dwell_count(self.st.c1)
        };
        let last = self.st.last_point;
        for _ in 0..dwell {
            self.add_point(last);
        }

        let bez = CubicBez::new(
            kurbo::Point::new(last.x, last.y),
            kurbo::Point::new(self.st.c1.x, self.st.c1.y),
            kurbo::Point::new(self.st.c2.x, self.st.c2.y),
            kurbo::Point::new(p.x, p.y),
        );
        self.recurse_bezier(bez, p.color, 0);

        self.st.last_point = p;
        self.st.last_slope = if near(self.st.c2, p, snap) {
            self.st.c1
        } else {
            self.st.c2
        };
        self.st.vertices += 1;
        self.st.ctrl_state = 0;
    }

    fn needs_subdivision(&self, bez: &CubicBez) -> bool {
        let chord = bez.p3 - bez.p0;
        if chebyshev(chord.x, chord.y) > self.params.on_speed {
            return true;
        }
        // Squared deviation of each control point's implied tangent from the
        // chord, worst axis per control point, summed over axes.
        let ux = (3.0 * bez.p1.x - 2.0 * bez.p0.x - bez.p3.x).powi(2);
        let uy = (3.0 * bez.p1.y - 2.0 * bez.p0.y - bez.p3.y).powi(2);
        let vx = (3.0 * bez.p2.x - 2.0 * bez.p3.x - bez.p0.x).powi(2);
        let vy = (3.0 * bez.p2.y - 2.0 * bez.p3.y - bez.p0.y).powi(2);
        ux.max(vx) + uy.max(vy) > self.params.flatness
    }

    fn recurse_bezier(&mut self, bez: CubicBez, color: Color, depth: u32) {
        if depth > MAX_BEZIER_DEPTH {
            error!(
                p0 = ?bez.p0,
                p1 = ?bez.p1,
                p2 = ?bez.p2,
                p3 = ?bez.p3,
                "bezier subdivision depth exceeded; truncating curve"
            );
            return;
        }
        if self.needs_subdivision(&bez) {
            // de Casteljau split at t = 0.5.
            let p01 = bez.p0.midpoint(bez.p1);
            let p12 = bez.p1.midpoint(bez.p2);
            let p23 = bez.p2.midpoint(bez.p3);
            let p012 = p01.midpoint(p12);
            let p123 = p12.midpoint(p23);
            let mid = p012.midpoint(p123);
            self.recurse_bezier(CubicBez::new(bez.p0, p01, p012, mid), color, depth + 1);
            self.recurse_bezier(CubicBez::new(mid, p123, p23, bez.p3), color, depth + 1);
        } else {
            let end = Point::new(bez.p3.x, bez.p3.y, color);
            self.add_point(end);
            self.st.last_point = end;
        }
    }

    fn point_to(&mut self, p: Point) {
        self.add_point(p);
        // A standalone first point gets enough dwell to register before the
        // implicit blanking moves on.
        if self.st.vertices == 0 {
            for _ in 0..self.params.start_dwell {
                self.add_point(p);
            }
        }
        self.st.vertices += 1;
    }
}

impl RenderContext {
    /// Open a new object of the given primitive kind.
    ///
    /// At most one object is open at a time; a re-entrant `begin` is ignored.
    pub fn begin(&mut self, prim: Primitive) {
        if self.draw.is_some() {
            return;
        }
        self.draw = Some(DrawState::new(prim, self.frame.arena.len()));
    }

    /// Feed one vertex to the open object. No-op when no object is open.
    pub fn vertex(&mut self, x: f64, y: f64, color: Color) {
        if self.draw.is_none() {
            return;
        }
        let (x, y, color) = match &self.shaders.vertex_pre {
            Some(s) => s.shade(x, y, color),
            None => (x, y, color),
        };
        let color = color.mul(self.color.current());
        let p = self.mtx2d.current() * kurbo::Point::new(x, y);
        let (nx, ny, color) = match &self.shaders.vertex {
            Some(s) => s.shade(p.x, p.y, color),
            None => (p.x, p.y, color),
        };
        let point = Point::new(nx, ny, color);

        let Some(st) = self.draw.as_mut() else { return };
        let prim = st.prim;
        let mut asm = Assembler {
            st,
            arena: &mut self.frame.arena,
            params: &self.params,
        };
        match prim {
            Primitive::LineStrip => asm.line_to(point),
            Primitive::BezierStrip => asm.bezier_to(point),
            Primitive::Points => asm.point_to(point),
        }
    }

    /// Feed one 3D vertex: 3D shader hook, then the current 3D transform with
    /// perspective divide, then the regular 2D vertex path.
    pub fn vertex3(&mut self, x: f64, y: f64, z: f64, color: Color) {
        let (x, y, z, color) = match &self.shaders.vertex3 {
            Some(s) => s.shade(x, y, z, color),
            None => (x, y, z, color),
        };
        let (x, y, _) = self.transform_vertex3(x, y, z);
        self.vertex(x, y, color);
    }

    /// Seal the open object.
    ///
    /// Degenerate objects (fewer than two vertices) are discarded, as are
    /// objects that fail the scissor visibility test.
    pub fn end(&mut self) {
        let Some(st) = self.draw.take() else { return };
        let arena = &mut self.frame.arena;
        if st.vertices < 2 {
            arena.truncate(st.span_start);
            return;
        }

        let last = arena.get(arena.len() - 1);
        for _ in 0..self.params.end_dwell {
            arena.push(last);
        }

        if let Some(shader) = &self.shaders.pixel {
            for p in arena.tail_mut(st.span_start) {
                let (x, y, color) = shader.shade(p.x, p.y, p.color);
                *p = Point::new(x, y, color);
            }
        }

        // Visibility: at least one lit point strictly inside each scissor
        // half-plane, each tested independently.
        let b = self.scissor;
        let (mut past_left, mut past_right, mut past_bottom, mut past_top) =
            (false, false, false, false);
        for p in arena.tail(st.span_start) {
            if p.color.is_black() {
                continue;
            }
            if p.x > b.x0 {
                past_left = true;
            }
            if p.x < b.x1 {
                past_right = true;
            }
            if p.y > b.y0 {
                past_bottom = true;
            }
            if p.y < b.y1 {
                past_top = true;
            }
            if past_left && past_right && past_bottom && past_top {
                break;
            }
        }
        if past_left && past_right && past_bottom && past_top {
            self.frame.objects.push(ObjectSpan {
                start: st.span_start,
                len: arena.len() - st.span_start,
                generation: arena.generation(),
            });
        } else {
            arena.truncate(st.span_start);
        }
    }

    /// Axis-aligned rectangle outline.
    pub fn rect(&mut self, x1: f64, y1: f64, x2: f64, y2: f64, color: Color) {
        self.begin(Primitive::LineStrip);
        self.vertex(x1, y1, color);
        self.vertex(x1, y2, color);
        self.vertex(x2, y2, color);
        self.vertex(x2, y1, color);
        self.vertex(x1, y1, color);
        self.end();
    }

    /// Single line segment.
    pub fn line(&mut self, x1: f64, y1: f64, x2: f64, y2: f64, color: Color) {
        self.begin(Primitive::LineStrip);
        self.vertex(x1, y1, color);
        self.vertex(x2, y2, color);
        self.end();
    }

    /// A dot held for `samples` samples.
    pub fn dot(&mut self, x: f64, y: f64, samples: usize, color: Color) {
        self.begin(Primitive::Points);
        for _ in 0..samples {
            self.vertex(x, y, color);
        }
        self.end();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::ContextConfig;

    fn test_params() -> RenderParams {
        RenderParams {
            on_speed: 1.0,
            start_dwell: 0,
            curve_dwell: 0,
            corner_dwell: 0,
            end_dwell: 0,
            snap: 1e-9,
            ..RenderParams::default()
        }
    }

    fn ctx(params: RenderParams) -> RenderContext {
        let (mut ctx, _consumer) = RenderContext::new(ContextConfig {
            buffer_count: 2,
            max_points: 4096,
        })
        .unwrap();
        ctx.set_render_params(params);
        ctx
    }

    #[test]
    fn identity_transform_is_passthrough() {
        let mut ctx = ctx(RenderParams {
            on_speed: 100.0,
            ..test_params()
        });
        let verts = [(0.25, 0.5), (-0.5, 0.25), (0.1, -0.3)];
        ctx.begin(Primitive::LineStrip);
        for (x, y) in verts {
            ctx.vertex(x, y, Color::WHITE);
        }
        ctx.end();

        assert_eq!(ctx.frame.objects.len(), 1);
        let span = ctx.frame.objects[0];
        let pts = ctx.frame.arena.slice(span);
        assert_eq!(pts.len(), verts.len());
        for (p, (x, y)) in pts.iter().zip(verts) {
            assert!((p.x - x).abs() < 1e-12);
            assert!((p.y - y).abs() < 1e-12);
        }
    }

    #[test]
    fn collinear_transition_gets_curve_dwell() {
        let params = RenderParams {
            start_dwell: 3,
            curve_dwell: 1,
            corner_dwell: 8,
            curve_angle: (30.0f64).to_radians().cos(),
            ..test_params()
        };
        let mut ctx = ctx(params);
        ctx.begin(Primitive::LineStrip);
        ctx.vertex(0.0, 0.0, Color::WHITE);
        ctx.vertex(1.0, 0.0, Color::WHITE);
        ctx.vertex(2.0, 0.0, Color::WHITE);
        ctx.end();

        // seed + (start_dwell + 1 step) + (curve_dwell + 1 step)
        assert_eq!(ctx.frame.objects[0].len, 1 + (3 + 1) + (1 + 1));
    }

    #[test]
    fn right_angle_transition_gets_corner_dwell() {
        let params = RenderParams {
            start_dwell: 3,
            curve_dwell: 1,
            corner_dwell: 8,
            curve_angle: (30.0f64).to_radians().cos(),
            ..test_params()
        };
        let mut ctx = ctx(params);
        ctx.begin(Primitive::LineStrip);
        ctx.vertex(0.0, 0.0, Color::WHITE);
        ctx.vertex(1.0, 0.0, Color::WHITE);
        ctx.vertex(1.0, 1.0, Color::WHITE);
        ctx.end();

        // seed + (start_dwell + 1 step) + (corner_dwell + 1 step)
        assert_eq!(ctx.frame.objects[0].len, 1 + (3 + 1) + (8 + 1));
    }

    #[test]
    fn single_vertex_object_is_discarded() {
        let mut ctx = ctx(test_params());
        ctx.begin(Primitive::LineStrip);
        ctx.vertex(0.5, 0.5, Color::WHITE);
        ctx.end();

        assert!(ctx.frame.objects.is_empty());
        assert_eq!(ctx.frame.arena.len(), 0);
    }

    #[test]
    fn offscreen_object_is_discarded() {
        let mut ctx = ctx(test_params());
        // Entirely right of the default scissor: never inside the x < 1
        // half-plane, so the object fails visibility.
        ctx.line(2.0, -2.0, 2.0, 2.0, Color::WHITE);

        assert!(ctx.frame.objects.is_empty());
        assert_eq!(ctx.frame.arena.len(), 0);
    }

    #[test]
    fn black_points_do_not_count_toward_visibility() {
        let mut ctx = ctx(test_params());
        ctx.line(-0.5, -0.5, 0.5, 0.5, Color::BLACK);
        assert!(ctx.frame.objects.is_empty());
    }

    #[test]
    fn flat_bezier_subdivides_by_chord_length() {
        let params = RenderParams {
            on_speed: 0.05,
            ..test_params()
        };
        let mut ctx = ctx(params);
        ctx.begin(Primitive::BezierStrip);
        ctx.vertex(0.0, 0.0, Color::WHITE);
        ctx.vertex(0.25, 0.0, Color::WHITE);
        ctx.vertex(0.5, 0.0, Color::WHITE);
        ctx.vertex(0.75, 0.0, Color::WHITE);
        ctx.end();

        // A collinear cubic has zero flatness error, so subdivision halves the
        // chord until it fits on_speed: 0.75 -> 16 leaves, plus the seed.
        let span = ctx.frame.objects[0];
        let pts = ctx.frame.arena.slice(span);
        assert_eq!(pts.len(), 17);
        assert!((pts.last().unwrap().x - 0.75).abs() < 1e-12);
        assert!(pts.iter().all(|p| p.y.abs() < 1e-12));
        for w in pts.windows(2) {
            assert!(w[1].x > w[0].x);
        }
    }

    #[test]
    fn points_primitive_dwells_on_first_point_only() {
        let params = RenderParams {
            start_dwell: 3,
            ..test_params()
        };
        let mut ctx = ctx(params);
        ctx.begin(Primitive::Points);
        ctx.vertex(0.1, 0.1, Color::WHITE);
        ctx.vertex(0.2, 0.2, Color::WHITE);
        ctx.end();

        // first point + 3 dwell copies + second point
        assert_eq!(ctx.frame.objects[0].len, 5);
    }

    #[test]
    fn reentrant_begin_is_ignored() {
        let mut ctx = ctx(RenderParams {
            on_speed: 100.0,
            ..test_params()
        });
        ctx.begin(Primitive::LineStrip);
        ctx.vertex(0.0, 0.0, Color::WHITE);
        ctx.begin(Primitive::Points);
        ctx.vertex(0.5, 0.5, Color::WHITE);
        ctx.end();

        assert_eq!(ctx.frame.objects.len(), 1);
        assert_eq!(ctx.frame.objects[0].len, 2);
    }

    #[test]
    fn color_stack_tints_vertices() {
        let mut ctx = ctx(RenderParams {
            on_speed: 100.0,
            ..test_params()
        });
        ctx.mult_color(Color::rgb(255, 0, 0));
        ctx.line(-0.5, 0.0, 0.5, 0.0, Color::WHITE);

        let span = ctx.frame.objects[0];
        for p in ctx.frame.arena.slice(span) {
            assert_eq!(p.color, Color::RED);
        }
    }

    #[test]
    fn pixel_shader_runs_over_sealed_object() {
        let mut ctx = ctx(RenderParams {
            on_speed: 100.0,
            ..test_params()
        });
        ctx.set_pixel_shader(Some(Box::new(|x: f64, y: f64, _c: Color| {
            (x, y, Color::GREEN)
        })));
        ctx.line(-0.5, 0.0, 0.5, 0.0, Color::WHITE);

        let span = ctx.frame.objects[0];
        for p in ctx.frame.arena.slice(span) {
            assert_eq!(p.color, Color::GREEN);
        }
    }
}
