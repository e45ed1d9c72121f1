use std::sync::{Arc, Condvar, Mutex, MutexGuard};

use tracing::error;

use crate::foundation::core::Point;
use crate::params::ContextConfig;

/// Fills the audio side channels for a completed frame.
///
/// Invoked synchronously on the producer thread, once per frame, with exactly
/// as many slots as the frame has samples — before the frame is published. It
/// must not block indefinitely or the whole pipeline stalls.
pub trait AudioSource {
    fn fill(&mut self, left: &mut [f32], right: &mut [f32]);
}

impl<F> AudioSource for F
where
    F: FnMut(&mut [f32], &mut [f32]),
{
    fn fill(&mut self, left: &mut [f32], right: &mut [f32]) {
        self(left, right)
    }
}

/// One finished output frame: beam samples plus stereo audio side channels.
pub struct RenderedFrame {
    pub(crate) points: Vec<Point>,
    audio_l: Vec<f32>,
    audio_r: Vec<f32>,
    capacity: usize,
}

impl RenderedFrame {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            points: Vec::with_capacity(capacity),
            audio_l: Vec::with_capacity(capacity),
            audio_r: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn audio_left(&self) -> &[f32] {
        &self.audio_l
    }

    pub fn audio_right(&self) -> &[f32] {
        &self.audio_r
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub(crate) fn clear(&mut self) {
        self.points.clear();
        self.audio_l.clear();
        self.audio_r.clear();
    }

    pub(crate) fn push_point(&mut self, p: Point) {
        if self.points.len() == self.capacity {
            error!(
                needed = self.points.len() + 1,
                capacity = self.capacity,
                "output buffer overflow; increase ContextConfig::max_points"
            );
            panic!("beamline: output point buffer overflow");
        }
        self.points.push(p);
    }

    pub(crate) fn fill_audio(&mut self, source: Option<&mut (dyn AudioSource + Send + '_)>) {
        let count = self.points.len();
        self.audio_l.clear();
        self.audio_l.resize(count, 0.0);
        self.audio_r.clear();
        self.audio_r.resize(count, 0.0);
        if let Some(source) = source {
            source.fill(&mut self.audio_l, &mut self.audio_r);
        }
    }
}

struct Indices {
    write: usize,
    read: usize,
    /// Set once the producer has filled the ring; the consumer sees no frames
    /// before that (pre-buffering against the real-time clock).
    primed: bool,
    /// The first delivered frame does not advance the read index.
    started: bool,
}

struct RingShared {
    nslots: usize,
    slots: Vec<Mutex<RenderedFrame>>,
    indices: Mutex<Indices>,
    slot_freed: Condvar,
}

/// Producer side of the single-producer/single-consumer frame ring.
///
/// The producer blocks in [`wait_for_slot`](FrameRing::wait_for_slot) while
/// the ring is full, which is the renderer's only backpressure point: it can
/// never run more than `buffer_count` frames ahead of the consumer.
pub(crate) struct FrameRing {
    shared: Arc<RingShared>,
}

impl FrameRing {
    pub fn new(config: &ContextConfig) -> (FrameRing, FrameConsumer) {
        let nslots = config.buffer_count + 1;
        let shared = Arc::new(RingShared {
            nslots,
            slots: (0..nslots)
                .map(|_| Mutex::new(RenderedFrame::with_capacity(config.max_points)))
                .collect(),
            indices: Mutex::new(Indices {
                write: 0,
                read: 0,
                primed: false,
                started: false,
            }),
            slot_freed: Condvar::new(),
        });
        (
            FrameRing {
                shared: shared.clone(),
            },
            FrameConsumer { shared },
        )
    }

    /// Block until a write slot is free, then return its index.
    pub fn wait_for_slot(&self) -> usize {
        let shared = &self.shared;
        let mut idx = shared.indices.lock().expect("frame ring mutex poisoned");
        while (idx.write + 1) % shared.nslots == idx.read {
            idx.primed = true;
            idx = shared
                .slot_freed
                .wait(idx)
                .expect("frame ring mutex poisoned");
        }
        idx.write
    }

    pub fn lock_slot(&self, slot: usize) -> MutexGuard<'_, RenderedFrame> {
        self.shared.slots[slot]
            .lock()
            .expect("frame ring mutex poisoned")
    }

    /// Mark the current write slot finished and step to the next.
    pub fn publish(&self) {
        let mut idx = self
            .shared
            .indices
            .lock()
            .expect("frame ring mutex poisoned");
        idx.write = (idx.write + 1) % self.shared.nslots;
    }
}

/// Consumer side of the frame ring, detached from the render context so it
/// can live on the output (DAC/audio) thread.
///
/// The consumer never blocks: if the producer has not published a new frame
/// since the last read, the current frame is delivered again (frame
/// duplication keeps the output signal continuous).
pub struct FrameConsumer {
    shared: Arc<RingShared>,
}

impl FrameConsumer {
    /// Borrow the next frame, or `None` while the ring has never been full.
    pub fn read<R>(&mut self, f: impl FnOnce(&RenderedFrame) -> R) -> Option<R> {
        let shared = &self.shared;
        let mut idx = shared.indices.lock().expect("frame ring mutex poisoned");
        if !idx.primed {
            return None;
        }
        if !idx.started {
            idx.started = true;
        } else if (idx.read + 1) % shared.nslots != idx.write {
            idx.read = (idx.read + 1) % shared.nslots;
            shared.slot_freed.notify_one();
        }
        let slot = idx.read;
        drop(idx);
        let frame = shared.slots[slot]
            .lock()
            .expect("frame ring mutex poisoned");
        Some(f(&frame))
    }
}
