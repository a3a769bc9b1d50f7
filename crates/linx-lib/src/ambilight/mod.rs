//! Ambilight — drive the LED ring from the perimeter of decoded video
//! frames, without ever blocking the producer.
//!
//! Frames flow through a single-slot latest-frame cell: new frames
//! overwrite unread ones and old frames are dropped, never queued. The
//! worker thread ticks at ~10 Hz, samples the newest frame it has not
//! seen yet, and fires three HID packets at the ring. LED failures are
//! counted and tolerated; they never reach the streaming path.

pub mod decoder;
pub mod sampler;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use image::RgbImage;

use crate::led::{LedLink, LedRing, RING_LEDS};

/// A decoded frame shared between producer and worker.
pub type Frame = Arc<RgbImage>;

/// Worker tick interval: ~10 LED updates per second keeps the HID bus
/// comfortable.
pub const TICK_INTERVAL: Duration = Duration::from_millis(100);

/// How many consecutive LED failures are logged before going quiet.
const LOGGED_ERRORS: u32 = 3;

// ── Latest-frame slot ──

/// Single-slot frame cell with last-writer-wins semantics.
///
/// The critical section is a pointer swap; producers never wait on the
/// consumer. Clones share the same slot.
#[derive(Clone, Default)]
pub struct FrameSlot {
    inner: Arc<Mutex<Option<Frame>>>,
}

impl FrameSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a frame, discarding any unread predecessor.
    pub fn publish(&self, frame: Frame) {
        *self.lock() = Some(frame);
    }

    /// The most recently published frame, if any.
    pub fn latest(&self) -> Option<Frame> {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, Option<Frame>> {
        // A poisoned slot only ever holds a frame pointer; keep going.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

// ── Worker ──

/// Ambilight behaviour knobs.
#[derive(Debug, Clone, Copy, Default)]
pub struct AmbilightOptions {
    /// 0 = full colour; otherwise samples are converted to grey levels
    /// capped at this intensity.
    pub grayscale_max: u8,
}

/// Consumer thread owning the LED ring.
pub struct AmbilightWorker<L: LedLink + Send + 'static> {
    thread: thread::JoinHandle<LedRing<L>>,
    running: Arc<AtomicBool>,
}

impl<L: LedLink + Send + 'static> AmbilightWorker<L> {
    /// Start the worker. It takes ownership of the ring and watches the
    /// slot for new frames.
    pub fn spawn(ring: LedRing<L>, slot: FrameSlot, options: AmbilightOptions) -> Self {
        let running = Arc::new(AtomicBool::new(true));
        let flag = running.clone();
        let thread = thread::spawn(move || run_loop(ring, slot, options, flag));
        AmbilightWorker { thread, running }
    }

    /// Stop the worker and get the ring back so the shutdown path that
    /// owns it can turn the LEDs off.
    pub fn stop(self) -> Option<LedRing<L>> {
        self.running.store(false, Ordering::SeqCst);
        self.thread.join().ok()
    }
}

fn run_loop<L: LedLink>(
    mut ring: LedRing<L>,
    slot: FrameSlot,
    options: AmbilightOptions,
    running: Arc<AtomicBool>,
) -> LedRing<L> {
    let mut last: Option<Frame> = None;
    let mut errors = 0u32;
    while running.load(Ordering::SeqCst) {
        if let Some(frame) = slot.latest()
            && !last.as_ref().is_some_and(|seen| Arc::ptr_eq(seen, &frame))
        {
            // Mark the frame seen before sending so a failed update is
            // skipped, not retried.
            last = Some(frame.clone());
            let mut colors = sampler::sample_edges(&frame, RING_LEDS);
            sampler::grayscale(&mut colors, options.grayscale_max);
            match ring.set(&colors) {
                Ok(()) => errors = 0,
                Err(e) => {
                    errors += 1;
                    if errors <= LOGGED_ERRORS {
                        log::warn!("ambilight: LED update failed: {e}");
                    }
                }
            }
        }
        thread::sleep(TICK_INTERVAL);
    }
    ring
}
