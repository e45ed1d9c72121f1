use crate::foundation::error::{BeamlineError, BeamlineResult};

/// Behavior flags for frame composition.
///
/// `grayscale` is carried through for output adapters whose hardware drives a
/// single intensity channel; the core renderer itself does not consume it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RenderFlags {
    pub grayscale: bool,
    /// Emit objects in creation order instead of nearest-neighbor order.
    pub no_reorder: bool,
    /// Never reverse an object's point order during reordering.
    pub no_reverse: bool,
}

/// Value-copied configuration snapshot for the renderer.
///
/// Speeds are samples per unit distance (higher is slower and smoother).
/// Dwell and wait counts are sample counts. A snapshot takes effect on the
/// next object processed; it is never read concurrently with mutation.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RenderParams {
    /// Output sample rate in Hz.
    pub rate: u32,
    /// Samples per unit distance while the beam is on.
    pub on_speed: f64,
    /// Samples per unit distance while blanked (traveling between strokes).
    pub off_speed: f64,
    /// Blanked samples held at an object start before power-on.
    pub start_wait: usize,
    /// Dwell samples at the first drawn transition of an object.
    pub start_dwell: usize,
    /// Dwell samples at a smooth curve continuation.
    pub curve_dwell: usize,
    /// Dwell samples at a sharp corner.
    pub corner_dwell: usize,
    /// Dwell samples repeated at the final point of an object.
    pub end_dwell: usize,
    /// Blanked samples held after an object before travel resumes.
    pub end_wait: usize,
    /// Cosine threshold separating curve continuations from corners.
    pub curve_angle: f64,
    /// Bezier subdivision stopping tolerance.
    pub flatness: f64,
    /// Distance below which two points are treated as coincident.
    pub snap: f64,
    /// Objects with fewer points than this are skipped at composition.
    pub min_length: usize,
    /// Frame-length ceiling in samples; 0 disables decimation.
    pub max_framelen: usize,
    pub flags: RenderFlags,
}

impl Default for RenderParams {
    fn default() -> Self {
        Self {
            rate: 48_000,
            on_speed: 2.0 / 100.0,
            off_speed: 2.0 / 20.0,
            start_wait: 8,
            start_dwell: 3,
            curve_dwell: 0,
            corner_dwell: 8,
            end_dwell: 3,
            end_wait: 7,
            curve_angle: (30.0f64).to_radians().cos(),
            flatness: 0.000_01,
            snap: 1.0 / 100_000.0,
            min_length: 0,
            max_framelen: 0,
            flags: RenderFlags::default(),
        }
    }
}

impl RenderParams {
    pub fn validate(&self) -> BeamlineResult<()> {
        if self.rate == 0 {
            return Err(BeamlineError::validation("rate must be > 0"));
        }
        if !(self.on_speed > 0.0) || !(self.off_speed > 0.0) {
            return Err(BeamlineError::validation(
                "on_speed and off_speed must be > 0",
            ));
        }
        if !self.curve_angle.is_finite() || !self.flatness.is_finite() || !self.snap.is_finite() {
            return Err(BeamlineError::validation(
                "curve_angle, flatness and snap must be finite",
            ));
        }
        Ok(())
    }
}

/// Sizing for a [`RenderContext`](crate::RenderContext) and its output ring.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ContextConfig {
    /// Frames the producer may run ahead of the consumer (minimum 2).
    pub buffer_count: usize,
    /// Fixed point capacity of the scratch arena and of each output slot.
    pub max_points: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            buffer_count: 3,
            max_points: 30_000,
        }
    }
}

impl ContextConfig {
    pub fn validate(&self) -> BeamlineResult<()> {
        if self.buffer_count < 2 {
            return Err(BeamlineError::config("buffer_count must be >= 2"));
        }
        if self.max_points == 0 {
            return Err(BeamlineError::config("max_points must be > 0"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_params_validate() {
        RenderParams::default().validate().unwrap();
        ContextConfig::default().validate().unwrap();
    }

    #[test]
    fn validate_rejects_zero_rate() {
        let params = RenderParams {
            rate: 0,
            ..RenderParams::default()
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn validate_rejects_nonpositive_speed() {
        let params = RenderParams {
            off_speed: 0.0,
            ..RenderParams::default()
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn validate_rejects_shallow_ring() {
        let cfg = ContextConfig {
            buffer_count: 1,
            ..ContextConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn json_roundtrip() {
        let params = RenderParams {
            max_framelen: 1200,
            flags: RenderFlags {
                grayscale: true,
                ..RenderFlags::default()
            },
            ..RenderParams::default()
        };
        let s = serde_json::to_string(&params).unwrap();
        let de: RenderParams = serde_json::from_str(&s).unwrap();
        assert_eq!(de, params);
    }
}
