//! Frame scheduling primitives shared by the shader surface and its hosts.
//!
//! A [`FrameScheduler`] hands out one [`FrameHandle`] per requested frame and
//! can cancel it again. Hosts drive the scheduler from their event loop: once a
//! frame is due they drain it as a [`FrameTick`] carrying the handle plus a
//! timestamp measured from a single monotonic origin, then deliver the tick to
//! whoever scheduled it.

use std::collections::BTreeSet;
use std::time::{Duration, Instant};

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum SchedulerError {
    #[error("frame rate cap must be a positive finite number, got {0}")]
    InvalidFrameRate(f32),
}

/// Opaque identifier of a scheduled frame callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameHandle(u64);

impl FrameHandle {
    pub fn new(raw: u64) -> Self {
        FrameHandle(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

/// A due frame: the handle it was scheduled under and the time it fires at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameTick {
    pub handle: FrameHandle,
    /// Time since the scheduler's origin; every tick shares that time base.
    pub timestamp: Duration,
}

impl FrameTick {
    pub fn new(handle: FrameHandle, timestamp: Duration) -> Self {
        Self { handle, timestamp }
    }
}

/// Requests and cancels single-shot frame callbacks.
///
/// A scheduled frame fires at most once. Callers that want continuous
/// animation schedule the next frame from inside the tick they received.
pub trait FrameScheduler {
    fn schedule_next_frame(&mut self) -> FrameHandle;
    /// Cancels a pending frame. Unknown or already delivered handles are ignored.
    fn cancel(&mut self, handle: FrameHandle);
}

fn normalize_fps(value: Option<f32>) -> Result<Option<Duration>, SchedulerError> {
    match value {
        None => Ok(None),
        Some(fps) if fps == 0.0 => Ok(None),
        Some(fps) if fps.is_finite() && fps > 0.0 => Duration::try_from_secs_f32(1.0 / fps)
            .map(Some)
            .map_err(|_| SchedulerError::InvalidFrameRate(fps)),
        Some(fps) => Err(SchedulerError::InvalidFrameRate(fps)),
    }
}

/// Host-side frame queue, the equivalent of a per-paint callback list.
///
/// Every frame due at the same poll receives the same timestamp. With a frame
/// rate cap the queue holds pending frames back until the minimum interval
/// since the previous delivery has elapsed.
#[derive(Debug)]
pub struct FrameQueue {
    origin: Instant,
    next_id: u64,
    pending: BTreeSet<FrameHandle>,
    min_interval: Option<Duration>,
    last_delivery: Option<Instant>,
}

impl FrameQueue {
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    /// Builds a queue whose timestamps are measured from `origin`.
    pub fn starting_at(origin: Instant) -> Self {
        Self {
            origin,
            next_id: 1,
            pending: BTreeSet::new(),
            min_interval: None,
            last_delivery: None,
        }
    }

    /// Caps delivery to `fps` frames per second; `None` or `0` means uncapped.
    pub fn with_fps_cap(mut self, fps: Option<f32>) -> Result<Self, SchedulerError> {
        self.min_interval = normalize_fps(fps)?;
        Ok(self)
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_pending(&self, handle: FrameHandle) -> bool {
        self.pending.contains(&handle)
    }

    pub fn ready_for_frame(&self, now: Instant) -> bool {
        if self.pending.is_empty() {
            return false;
        }
        match (self.min_interval, self.last_delivery) {
            (Some(interval), Some(last)) => now.saturating_duration_since(last) >= interval,
            _ => true,
        }
    }

    /// Earliest instant a pending frame may fire, if any frame is pending.
    pub fn next_deadline(&self) -> Option<Instant> {
        if self.pending.is_empty() {
            return None;
        }
        match (self.min_interval, self.last_delivery) {
            (Some(interval), Some(last)) => Some(last + interval),
            _ => Some(self.origin),
        }
    }

    /// Drains every frame that is due at `now`.
    pub fn poll(&mut self, now: Instant) -> Vec<FrameTick> {
        if !self.ready_for_frame(now) {
            return Vec::new();
        }
        let timestamp = now.saturating_duration_since(self.origin);
        self.last_delivery = Some(now);
        let due = std::mem::take(&mut self.pending);
        tracing::trace!(
            frames = due.len(),
            timestamp_ms = timestamp.as_millis(),
            "delivering due frames"
        );
        due.into_iter()
            .map(|handle| FrameTick::new(handle, timestamp))
            .collect()
    }
}

impl Default for FrameQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameScheduler for FrameQueue {
    fn schedule_next_frame(&mut self) -> FrameHandle {
        let handle = FrameHandle(self.next_id);
        self.next_id = self.next_id.saturating_add(1);
        self.pending.insert(handle);
        handle
    }

    fn cancel(&mut self, handle: FrameHandle) {
        if self.pending.remove(&handle) {
            tracing::trace!(handle = handle.raw(), "cancelled pending frame");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_are_unique_and_increasing() {
        let mut queue = FrameQueue::new();
        let first = queue.schedule_next_frame();
        let second = queue.schedule_next_frame();
        assert!(second > first);
        assert_eq!(queue.pending_len(), 2);
    }

    #[test]
    fn poll_delivers_shared_timestamp_once() {
        let origin = Instant::now();
        let mut queue = FrameQueue::starting_at(origin);
        let a = queue.schedule_next_frame();
        let b = queue.schedule_next_frame();

        let ticks = queue.poll(origin + Duration::from_millis(40));
        assert_eq!(ticks.len(), 2);
        assert_eq!(ticks[0], FrameTick::new(a, Duration::from_millis(40)));
        assert_eq!(ticks[1], FrameTick::new(b, Duration::from_millis(40)));
        assert!(queue.poll(origin + Duration::from_millis(80)).is_empty());
    }

    #[test]
    fn cancelled_frames_never_fire() {
        let origin = Instant::now();
        let mut queue = FrameQueue::starting_at(origin);
        let handle = queue.schedule_next_frame();
        queue.cancel(handle);
        queue.cancel(handle);
        assert!(!queue.is_pending(handle));
        assert!(!queue.ready_for_frame(origin));
        assert!(queue.poll(origin + Duration::from_secs(1)).is_empty());
        assert_eq!(queue.next_deadline(), None);
    }

    #[test]
    fn fps_cap_defers_delivery() {
        let origin = Instant::now();
        let mut queue = FrameQueue::starting_at(origin)
            .with_fps_cap(Some(10.0))
            .unwrap();
        queue.schedule_next_frame();
        assert_eq!(queue.poll(origin).len(), 1);

        queue.schedule_next_frame();
        let early = origin + Duration::from_millis(50);
        assert!(!queue.ready_for_frame(early));
        assert!(queue.poll(early).is_empty());
        let deadline = queue.next_deadline().expect("deadline");
        assert!(deadline > early);
        assert_eq!(queue.poll(deadline).len(), 1);
    }

    #[test]
    fn rejects_invalid_fps_cap() {
        let err = FrameQueue::new().with_fps_cap(Some(-5.0)).unwrap_err();
        assert_eq!(err, SchedulerError::InvalidFrameRate(-5.0));
        assert!(FrameQueue::new().with_fps_cap(Some(f32::NAN)).is_err());
        assert!(FrameQueue::new().with_fps_cap(Some(0.0)).is_ok());
        let err = FrameQueue::new().with_fps_cap(Some(1e-20)).unwrap_err();
        assert_eq!(err, SchedulerError::InvalidFrameRate(1e-20));
        assert!(FrameQueue::new().with_fps_cap(Some(1e-40)).is_err());
        assert!(FrameQueue::new().with_fps_cap(Some(0.001)).is_ok());
    }
}
