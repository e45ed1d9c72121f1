use crate::foundation::core::{Color, FrameInfo, Point};
use crate::params::RenderParams;
use crate::ring::RenderedFrame;

/// Enforce the frame-length ceiling and floor on a composited frame.
///
/// Decimation walks the source with a fractional step, but snaps to unit
/// steps through any sample pair touching black: blanking transitions must
/// survive the resample exactly, or an invisible travel segment would smear
/// into a visible streak. Short frames are padded with blanked copies of the
/// final position up to `min_points` so playback keeps a consistent rate.
pub(crate) fn normalize(
    frame: &mut RenderedFrame,
    scratch: &mut Vec<Point>,
    params: &RenderParams,
    min_points: usize,
    info: &mut FrameInfo,
) {
    let count = frame.points.len();
    info.points = count;

    if params.max_framelen != 0 && count > params.max_framelen {
        let delta = count as f64 / params.max_framelen as f64;
        scratch.clear();
        let mut pos = 0.0f64;
        while pos < (count - 1) as f64 {
            let ipos = pos as usize;
            let rest = pos - ipos as f64;
            let a = frame.points[ipos];
            let b = frame.points[ipos + 1];
            let x = a.x * (1.0 - rest) + b.x * rest;
            let y = a.y * (1.0 - rest) + b.y * rest;
            if a.color.is_black() || b.color.is_black() {
                scratch.push(Point::new(x, y, Color::BLACK));
                pos += 1.0;
                info.resampled_blacks += 1;
            } else {
                scratch.push(Point::new(x, y, a.color));
                pos += delta;
            }
        }
        frame.points.clear();
        frame.points.extend_from_slice(scratch);
        info.resampled_points = frame.points.len();
    }

    let (last_x, last_y) = frame
        .points
        .last()
        .map(|p| (p.x, p.y))
        .unwrap_or((0.0, 0.0));
    while frame.points.len() < min_points {
        frame.push_point(Point::new(last_x, last_y, Color::BLACK));
        info.padding_points += 1;
    }
}
