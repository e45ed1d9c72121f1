use kurbo::{Affine, Rect};
use tracing::debug;

use crate::arena::WorkingFrame;
use crate::compose::compose;
use crate::draw::DrawState;
use crate::foundation::core::{Color, FrameInfo, Point};
use crate::foundation::error::BeamlineResult;
use crate::normalize::normalize;
use crate::params::{ContextConfig, RenderParams};
use crate::ring::{AudioSource, FrameConsumer, FrameRing};
use crate::shader::{Shader, Shader3, ShaderSet};
use crate::transform::{Mat4, StateStack};

/// The rendering engine: immediate-mode drawing state, the working frame, and
/// the producer side of the output ring.
///
/// A context is owned by the caller and driven from a single thread: issue
/// drawing calls, then commit with [`render_frame`](Self::render_frame),
/// which blocks while the consumer is behind. Multiple contexts can coexist
/// for multi-output setups; they share nothing.
pub struct RenderContext {
    pub(crate) params: RenderParams,
    pub(crate) mtx2d: StateStack<Affine>,
    pub(crate) mtx3d: StateStack<Mat4>,
    pub(crate) color: StateStack<Color>,
    pub(crate) scissor: Rect,
    pub(crate) frame: WorkingFrame,
    pub(crate) draw: Option<DrawState>,
    pub(crate) shaders: ShaderSet,
    audio: Option<Box<dyn AudioSource + Send>>,
    ring: FrameRing,
    /// Physical beam position; persists across frames like the galvo does.
    pen: Point,
    info: FrameInfo,
    resample_scratch: Vec<Point>,
}

impl RenderContext {
    /// Create a context and the consumer handle for its output ring.
    pub fn new(config: ContextConfig) -> BeamlineResult<(RenderContext, FrameConsumer)> {
        config.validate()?;
        let (ring, consumer) = FrameRing::new(&config);
        let ctx = RenderContext {
            params: RenderParams::default(),
            mtx2d: StateStack::new(Affine::IDENTITY),
            mtx3d: StateStack::new(Mat4::IDENTITY),
            color: StateStack::new(Color::WHITE),
            scissor: Rect::new(-1.0, -1.0, 1.0, 1.0),
            frame: WorkingFrame::new(config.max_points),
            draw: None,
            shaders: ShaderSet::default(),
            audio: None,
            ring,
            pen: Point::new(0.0, 0.0, Color::BLACK),
            info: FrameInfo::default(),
            resample_scratch: Vec::new(),
        };
        Ok((ctx, consumer))
    }

    /// Snapshot new render parameters; they apply from the next object on.
    pub fn set_render_params(&mut self, params: RenderParams) {
        self.params = params;
    }

    pub fn render_params(&self) -> RenderParams {
        self.params
    }

    /// Restrict the visible region. Points outside are bridged with blanking
    /// rather than drawn.
    pub fn set_scissor(&mut self, x0: f64, y0: f64, x1: f64, y1: f64) {
        self.scissor = Rect::new(x0, y0, x1, y1);
    }

    /// Diagnostics from the most recent [`render_frame`](Self::render_frame).
    pub fn frame_info(&self) -> FrameInfo {
        self.info
    }

    // --- 2D transform stack ---

    pub fn load_identity(&mut self) {
        self.mtx2d.set(Affine::IDENTITY);
    }

    /// Right-multiply the current 2D transform (the new matrix applies first).
    pub fn mult_matrix(&mut self, m: Affine) {
        self.mtx2d.set(self.mtx2d.current() * m);
    }

    /// Counterclockwise rotation in the projector's y-up frame.
    pub fn rotate(&mut self, theta: f64) {
        self.mult_matrix(Affine::rotate(theta));
    }

    pub fn translate(&mut self, x: f64, y: f64) {
        self.mult_matrix(Affine::translate((x, y)));
    }

    pub fn scale(&mut self, sx: f64, sy: f64) {
        self.mult_matrix(Affine::scale_non_uniform(sx, sy));
    }

    pub fn push_matrix(&mut self) {
        self.mtx2d.push();
    }

    pub fn pop_matrix(&mut self) {
        self.mtx2d.pop();
    }

    // --- 3D transform stack ---

    pub fn load_identity_3(&mut self) {
        self.mtx3d.set(Mat4::IDENTITY);
    }

    pub fn mult_matrix_3(&mut self, m: Mat4) {
        self.mtx3d.set(self.mtx3d.current() * m);
    }

    pub fn rotate_3x(&mut self, theta: f64) {
        self.mult_matrix_3(Mat4::rotate_x(theta));
    }

    pub fn rotate_3y(&mut self, theta: f64) {
        self.mult_matrix_3(Mat4::rotate_y(theta));
    }

    pub fn rotate_3z(&mut self, theta: f64) {
        self.mult_matrix_3(Mat4::rotate_z(theta));
    }

    pub fn translate_3(&mut self, x: f64, y: f64, z: f64) {
        self.mult_matrix_3(Mat4::translate(x, y, z));
    }

    pub fn scale_3(&mut self, sx: f64, sy: f64, sz: f64) {
        self.mult_matrix_3(Mat4::scale(sx, sy, sz));
    }

    pub fn frustum(&mut self, l: f64, r: f64, b: f64, t: f64, near: f64, far: f64) {
        self.mult_matrix_3(Mat4::frustum(l, r, b, t, near, far));
    }

    pub fn perspective(&mut self, fovy_deg: f64, aspect: f64, z_near: f64, z_far: f64) {
        self.mult_matrix_3(Mat4::perspective(fovy_deg, aspect, z_near, z_far));
    }

    pub fn push_matrix_3(&mut self) {
        self.mtx3d.push();
    }

    pub fn pop_matrix_3(&mut self) {
        self.mtx3d.pop();
    }

    /// Apply the current 3D transform to a point, with perspective divide.
    pub fn transform_vertex3(&self, x: f64, y: f64, z: f64) -> (f64, f64, f64) {
        self.mtx3d.current().transform_point(x, y, z)
    }

    // --- color stack ---

    pub fn reset_color(&mut self) {
        self.color.set(Color::WHITE);
    }

    pub fn mult_color(&mut self, c: Color) {
        self.color.set(self.color.current().mul(c));
    }

    pub fn push_color(&mut self) {
        self.color.push();
    }

    pub fn pop_color(&mut self) {
        self.color.pop();
    }

    // --- hooks ---

    /// Vertex hook in raw coordinate space, before the 2D transform.
    pub fn set_vertex_pre_shader(&mut self, shader: Option<Box<dyn Shader + Send>>) {
        self.shaders.vertex_pre = shader;
    }

    /// Vertex hook in projector space, after the 2D transform.
    pub fn set_vertex_shader(&mut self, shader: Option<Box<dyn Shader + Send>>) {
        self.shaders.vertex = shader;
    }

    /// 3D vertex hook, before the 3D transform.
    pub fn set_vertex3_shader(&mut self, shader: Option<Box<dyn Shader3 + Send>>) {
        self.shaders.vertex3 = shader;
    }

    /// Per-point hook run over each object when it is sealed.
    pub fn set_pixel_shader(&mut self, shader: Option<Box<dyn Shader + Send>>) {
        self.shaders.pixel = shader;
    }

    /// Audio side-channel source, invoked once per committed frame.
    pub fn set_audio_source(&mut self, source: Option<Box<dyn AudioSource + Send>>) {
        self.audio = source;
    }

    /// Commit the working frame.
    ///
    /// Composites the frame's objects into the next output slot, normalizes
    /// its length, fills the audio side channels, and publishes the slot.
    /// Blocks while the ring is full (the consumer provides backpressure).
    /// `max_fps` sets the frame-duration floor at `rate / max_fps` samples.
    ///
    /// Returns the committed frame's duration in seconds, for animation-time
    /// accumulators.
    #[tracing::instrument(skip(self))]
    pub fn render_frame(&mut self, max_fps: u32) -> f64 {
        let min_points = (self.params.rate / max_fps.max(1)) as usize;
        self.info = FrameInfo::default();

        let slot = self.ring.wait_for_slot();
        let count = {
            let mut out = self.ring.lock_slot(slot);
            out.clear();
            compose(
                &mut self.frame,
                &self.params,
                self.scissor,
                &mut self.pen,
                &mut out,
                &mut self.info,
            );
            self.frame.reset();
            normalize(
                &mut out,
                &mut self.resample_scratch,
                &self.params,
                min_points,
                &mut self.info,
            );
            out.fill_audio(self.audio.as_deref_mut());
            out.len()
        };
        self.ring.publish();

        debug!(
            objects = self.info.objects,
            points = self.info.points,
            samples = count,
            "frame committed"
        );
        count as f64 / f64::from(self.params.rate)
    }
}
