use tracing::error;

use crate::foundation::core::Point;

/// Index range into the working frame's point arena.
///
/// Spans carry the arena generation they were carved from; resolving a span
/// against a later generation is a bug (the arena has been reused for a new
/// frame) and trips a debug assertion instead of silently aliasing points.
#[derive(Clone, Copy, Debug)]
pub(crate) struct ObjectSpan {
    pub start: usize,
    pub len: usize,
    pub generation: u64,
}

/// Fixed-capacity scratch storage that object point arrays are carved from.
///
/// Capacity is fixed at construction. Overflow means the caller undersized
/// [`ContextConfig::max_points`](crate::ContextConfig) for the geometry being
/// submitted, and is fatal: dropping points silently would corrupt the visible
/// output in a worse way than a loud crash.
pub(crate) struct PointArena {
    points: Vec<Point>,
    capacity: usize,
    generation: u64,
}

impl PointArena {
    pub fn new(capacity: usize) -> Self {
        Self {
            points: Vec::with_capacity(capacity),
            capacity,
            generation: 0,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn push(&mut self, p: Point) {
        if self.points.len() == self.capacity {
            error!(
                needed = self.points.len() + 1,
                capacity = self.capacity,
                "scratch point arena overflow; increase ContextConfig::max_points"
            );
            panic!("beamline: scratch point arena overflow");
        }
        self.points.push(p);
    }

    /// Drop every point at or past `start` (discarded object storage).
    pub fn truncate(&mut self, start: usize) {
        self.points.truncate(start);
    }

    /// Reset for a new frame; outstanding spans become stale.
    pub fn reset(&mut self) {
        self.points.clear();
        self.generation += 1;
    }

    pub fn slice(&self, span: ObjectSpan) -> &[Point] {
        debug_assert_eq!(
            span.generation, self.generation,
            "object span read from a stale arena generation"
        );
        &self.points[span.start..span.start + span.len]
    }

    pub fn slice_mut(&mut self, span: ObjectSpan) -> &mut [Point] {
        debug_assert_eq!(
            span.generation, self.generation,
            "object span read from a stale arena generation"
        );
        &mut self.points[span.start..span.start + span.len]
    }

    /// All points from `start` to the arena tail (the currently open object).
    pub fn tail(&self, start: usize) -> &[Point] {
        &self.points[start..]
    }

    pub fn tail_mut(&mut self, start: usize) -> &mut [Point] {
        &mut self.points[start..]
    }

    pub fn get(&self, index: usize) -> Point {
        self.points[index]
    }
}

/// The current frame under assembly: sealed object spans plus their arena.
pub(crate) struct WorkingFrame {
    pub arena: PointArena,
    pub objects: Vec<ObjectSpan>,
}

impl WorkingFrame {
    pub fn new(capacity: usize) -> Self {
        Self {
            arena: PointArena::new(capacity),
            objects: Vec::new(),
        }
    }

    pub fn reset(&mut self) {
        self.objects.clear();
        self.arena.reset();
    }
}
