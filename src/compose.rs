use kurbo::Rect;

use crate::arena::WorkingFrame;
use crate::foundation::core::{Color, FrameInfo, Point, chebyshev};
use crate::params::RenderParams;
use crate::ring::RenderedFrame;

pub(crate) fn point_in(b: &Rect, x: f64, y: f64) -> bool {
    x >= b.x0 && x <= b.x1 && y >= b.y0 && y <= b.y1
}

/// Chebyshev distance with a small weighted-Manhattan term.
///
/// The 0.01 coefficient only breaks ties between equally-distant candidates;
/// it is a tuned heuristic constant, not derived from any galvo property.
fn travel_cost(p: Point, from: Point) -> f64 {
    let dx = p.x - from.x;
    let dy = p.y - from.y;
    chebyshev(dx, dy) + 0.01 * (dx.abs() + dy.abs())
}

/// Flatten the working frame's objects into one travel-connected sample
/// sequence in `out`.
///
/// `pen` is the physical beam position and persists across frames.
pub(crate) fn compose(
    frame: &mut WorkingFrame,
    params: &RenderParams,
    scissor: Rect,
    pen: &mut Point,
    out: &mut RenderedFrame,
    info: &mut FrameInfo,
) {
    if !params.flags.no_reorder {
        // Greedy nearest-neighbor over object endpoints: an O(n^2) answer to
        // the open-path travel-minimization problem, good enough at
        // interactive frame rates. Selection starts from the top-left corner.
        let mut closest_to = Point::new(-1.0, -1.0, Color::BLACK);
        loop {
            let mut best: Option<(usize, bool, f64)> = None;
            for (i, span) in frame.objects.iter().enumerate() {
                if span.len == 0 || span.len < params.min_length {
                    continue;
                }
                let pts = frame.arena.slice(*span);
                let d = travel_cost(pts[0], closest_to);
                if best.is_none_or(|(_, _, bd)| d < bd) {
                    best = Some((i, false, d));
                }
                if !params.flags.no_reverse {
                    let d = travel_cost(pts[pts.len() - 1], closest_to);
                    if best.is_none_or(|(_, _, bd)| d < bd) {
                        best = Some((i, true, d));
                    }
                }
            }
            let Some((i, reversed, _)) = best else { break };
            let span = frame.objects[i];
            if reversed {
                frame.arena.slice_mut(span).reverse();
            }
            render_object(frame.arena.slice(span), params, scissor, pen, out);
            frame.objects[i].len = 0;
            closest_to = *pen;
            info.objects += 1;
        }
    } else {
        for span in &frame.objects {
            if span.len < params.min_length {
                continue;
            }
            render_object(frame.arena.slice(*span), params, scissor, pen, out);
            info.objects += 1;
        }
    }
}

/// Emit one object: blanked travel from the pen position, settle waits, the
/// object's own samples, and blanked bridging across any scissored-out runs.
fn render_object(
    pts: &[Point],
    params: &RenderParams,
    scissor: Rect,
    pen: &mut Point,
    out: &mut RenderedFrame,
) {
    let start = pts[0];
    let end = pts[pts.len() - 1];
    let dx = start.x - pen.x;
    let dy = start.y - pen.y;
    let distance = chebyshev(dx, dy);
    let travel_steps = (distance / params.off_speed).ceil() as usize;

    // Null object: nothing lit inside the scissor box.
    if !pts
        .iter()
        .any(|p| point_in(&scissor, p.x, p.y) && !p.color.is_black())
    {
        return;
    }

    let mut out_start: Option<Point> = None;
    let mut skip_out_start_wait = false;
    if !point_in(&scissor, start.x, start.y) {
        // The object begins off-screen: no travel synthesis, and the first
        // re-entry bridge skips its leading end-wait.
        out_start = Some(*pen);
        skip_out_start_wait = true;
    } else if distance > params.snap {
        for i in 0..travel_steps {
            out.push_point(Point::new(
                pen.x + dx / travel_steps as f64 * i as f64,
                pen.y + dy / travel_steps as f64 * i as f64,
                Color::BLACK,
            ));
        }
        for _ in 0..params.start_wait {
            out.push_point(Point::new(start.x, start.y, Color::BLACK));
        }
    }

    for ip in pts {
        let inside = point_in(&scissor, ip.x, ip.y);
        match out_start {
            None => {
                if inside {
                    out.push_point(*ip);
                } else {
                    out_start = Some(*ip);
                    *pen = *ip;
                }
            }
            Some(os) => {
                if !inside {
                    continue;
                }
                if !skip_out_start_wait {
                    for _ in 0..params.end_wait {
                        out.push_point(Point::new(os.x, os.y, Color::BLACK));
                    }
                }
                skip_out_start_wait = false;
                let dx = ip.x - os.x;
                let dy = ip.y - os.y;
                let d = chebyshev(dx, dy);
                if d > params.snap {
                    let steps = (d / params.off_speed).ceil() as usize;
                    for j in 0..steps {
                        out.push_point(Point::new(
                            os.x + dx / steps as f64 * j as f64,
                            os.y + dy / steps as f64 * j as f64,
                            Color::BLACK,
                        ));
                    }
                    for _ in 0..params.start_wait {
                        out.push_point(Point::new(ip.x, ip.y, Color::BLACK));
                    }
                }
                out.push_point(*ip);
                out_start = None;
            }
        }
    }

    let anchor = out_start.unwrap_or(end);
    for _ in 0..params.end_wait {
        out.push_point(Point::new(anchor.x, anchor.y, Color::BLACK));
    }
    *pen = anchor;
}
