//! Real-time rendering engine for galvanometer laser projectors.
//!
//! Drawing calls ([`RenderContext::begin`] / [`RenderContext::vertex`] /
//! [`RenderContext::end`]) are planned into a sample-accurate output signal:
//! strokes are resampled against the galvo's speed limits, corners get settle
//! dwell, travel between strokes is synthesized as blanked interpolation, and
//! each committed frame lands in a fixed-rate ring buffer consumed by an
//! audio-style output sink.

#![forbid(unsafe_code)]

mod arena;
mod compose;
mod draw;
mod foundation;
mod normalize;

pub mod context;
pub mod params;
pub mod ring;
pub mod shader;
pub mod transform;

pub use crate::context::RenderContext;
pub use crate::foundation::core::{Affine, Color, FrameInfo, Point, Primitive, Rect};
pub use crate::foundation::error::{BeamlineError, BeamlineResult};
pub use crate::params::{ContextConfig, RenderFlags, RenderParams};
pub use crate::ring::{AudioSource, FrameConsumer, RenderedFrame};
pub use crate::shader::{Shader, Shader3};
pub use crate::transform::{Mat4, STACK_DEPTH};
