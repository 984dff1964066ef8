//! Scroll-trigger detection: the near-bottom predicate and its rate limiter.

use std::time::Duration;
use tokio::time::Instant;

/// Scroll geometry reported by the host scroll view, in content units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollMetrics {
    pub viewport_height: f32,
    pub scroll_offset: f32,
    pub content_height: f32,
}

/// Has the viewport scrolled to within `threshold` content units of the
/// content's end?
///
/// Pure and side-effect-free. Suppressing re-entrant pagination while a
/// fetch is in flight is the caller's job, not this function's.
pub fn is_near_bottom(
    viewport_height: f32,
    scroll_offset: f32,
    content_height: f32,
    threshold: f32,
) -> bool {
    viewport_height + scroll_offset >= content_height - threshold
}

/// Bounded-rate gate for scroll samples.
///
/// The first sample always passes; after that a sample is dropped unless
/// at least `min_gap` has elapsed since the last accepted one. Uses
/// `tokio::time::Instant` so paused-clock tests can drive it.
#[derive(Debug)]
pub struct ScrollThrottle {
    min_gap: Duration,
    last: Option<Instant>,
}

impl ScrollThrottle {
    pub fn new(min_gap: Duration) -> Self {
        Self { min_gap, last: None }
    }

    /// Accept or drop a sample at the current instant.
    pub fn should_sample(&mut self) -> bool {
        let now = Instant::now();
        match self.last {
            Some(prev) if now.duration_since(prev) < self.min_gap => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }
}
