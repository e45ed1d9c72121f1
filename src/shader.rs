use crate::foundation::core::Color;

/// A per-vertex or per-point hook: a pure transform of position and color.
///
/// Hooks run synchronously inline on the producer thread. The same trait
/// serves three registration points: the pre-transform vertex hook (raw
/// coordinate space), the post-transform vertex hook (projector space), and
/// the post-assembly pixel hook run over every point of a sealed object.
pub trait Shader {
    fn shade(&self, x: f64, y: f64, color: Color) -> (f64, f64, Color);
}

impl<F> Shader for F
where
    F: Fn(f64, f64, Color) -> (f64, f64, Color),
{
    fn shade(&self, x: f64, y: f64, color: Color) -> (f64, f64, Color) {
        self(x, y, color)
    }
}

/// The 3D variant, invoked on [`vertex3`](crate::RenderContext::vertex3)
/// before the 3D transform is applied.
pub trait Shader3 {
    fn shade(&self, x: f64, y: f64, z: f64, color: Color) -> (f64, f64, f64, Color);
}

impl<F> Shader3 for F
where
    F: Fn(f64, f64, f64, Color) -> (f64, f64, f64, Color),
{
    fn shade(&self, x: f64, y: f64, z: f64, color: Color) -> (f64, f64, f64, Color) {
        self(x, y, z, color)
    }
}

/// The context's installed hooks; `None` means identity.
#[derive(Default)]
pub(crate) struct ShaderSet {
    pub vertex_pre: Option<Box<dyn Shader + Send>>,
    pub vertex: Option<Box<dyn Shader + Send>>,
    pub vertex3: Option<Box<dyn Shader3 + Send>>,
    pub pixel: Option<Box<dyn Shader + Send>>,
}
