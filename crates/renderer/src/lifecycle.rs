//! Mount/tick/resize/unmount state machine of the shader surface.
//!
//! ```text
//!   Unmounted ──mount──▶ Initializing ──first frame scheduled──▶ Running
//!       ▲                     │ (context creation failed)            │
//!       └─────────────────────┘                                      │
//!       ▲                                                            │
//!       └──────────── TearingDown ◀──────────unmount─────────────────┘
//! ```
//!
//! The surface owns its render context exclusively. Frame ticks and resize
//! notifications arrive from the host on one thread and never overlap.

use std::time::{Duration, Instant};

use scheduler::{FrameHandle, FrameScheduler, FrameTick};
use tracing::{debug, trace, warn};

use crate::types::{PixelSize, Viewport};
use crate::uniforms::BeamUniforms;
use crate::viewport::{Subscription, ViewportBus};

#[derive(Debug, thiserror::Error)]
pub enum SurfaceError {
    #[error("shader surface is already mounted")]
    AlreadyMounted,
    #[error("viewport has no drawable area ({width}x{height})")]
    EmptyViewport { width: u32, height: u32 },
    #[error("failed to initialise render context: {0:#}")]
    Context(anyhow::Error),
}

/// Per-frame presentation failures reported by a [`RenderContext`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    #[error("surface lost")]
    Lost,
    #[error("surface outdated")]
    Outdated,
    #[error("timed out acquiring the next surface texture")]
    Timeout,
    #[error("out of GPU memory")]
    OutOfMemory,
    #[error("render context resources were already released")]
    Released,
    #[error("{0}")]
    Other(String),
}

/// Graphics resources bound to one mounted surface.
///
/// The release methods run in declaration order during teardown. Each one is
/// idempotent and must tolerate the resource never having been created.
pub trait RenderContext {
    /// Resizes the drawable pixel buffer. Never recreates the pipeline.
    fn resize(&mut self, size: PixelSize);
    fn write_uniforms(&mut self, uniforms: &BeamUniforms);
    /// Draws the full-screen quad once and presents it.
    fn render(&mut self) -> Result<(), FrameError>;
    /// Removes the quad mesh from the scene.
    fn detach_mesh(&mut self);
    fn release_geometry(&mut self);
    /// Releases the shader program, its material state and uniform storage.
    fn release_program(&mut self);
    /// Releases the device, queue and presentation surface.
    fn release_device(&mut self);
}

/// Factory for render contexts; one context is created per mount cycle.
pub trait RenderBackend {
    type Context: RenderContext;

    fn create_context(
        &mut self,
        size: PixelSize,
        uniforms: &BeamUniforms,
    ) -> Result<Self::Context, SurfaceError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceState {
    Unmounted,
    Initializing,
    Running,
    TearingDown,
}

/// What a delivered frame tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Rendered,
    /// The frame was skipped after a recoverable surface error; the next one is scheduled.
    Dropped,
    /// The tick did not belong to the live mount cycle and was ignored.
    Stale,
}

#[derive(Default)]
struct FrameStats {
    window_start: Option<Duration>,
    frames: u32,
}

impl FrameStats {
    fn record(&mut self, timestamp: Duration, time: f32, cycle: u64) {
        let start = *self.window_start.get_or_insert(timestamp);
        self.frames += 1;
        let elapsed = timestamp.saturating_sub(start);
        if elapsed >= Duration::from_secs(1) {
            let fps = self.frames as f32 / elapsed.as_secs_f32();
            debug!(fps = fps.round(), time, cycle, "render stats");
            self.window_start = Some(timestamp);
            self.frames = 0;
        }
    }
}

struct Mounted<C> {
    cycle: u64,
    context: C,
    uniforms: BeamUniforms,
    buffer: PixelSize,
    frame: Option<FrameHandle>,
    resize: Option<Subscription>,
    stats: FrameStats,
}

impl<C: RenderContext> Mounted<C> {
    fn apply_resize(&mut self, size: PixelSize) {
        self.buffer = size;
        self.context.resize(size);
        self.uniforms.set_resolution(size);
        self.context.write_uniforms(&self.uniforms);
    }

    fn release(&mut self) {
        drop(self.resize.take());
        self.context.detach_mesh();
        self.context.release_geometry();
        self.context.release_program();
        self.context.release_device();
    }
}

/// Full-viewport procedural background bound to a host page.
pub struct ShaderSurface<B: RenderBackend> {
    backend: B,
    state: SurfaceState,
    mounted: Option<Mounted<B::Context>>,
    pixel_ratio_cap: Option<f64>,
    slow_frame: Option<Duration>,
    cycles: u64,
}

impl<B: RenderBackend> ShaderSurface<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            state: SurfaceState::Unmounted,
            mounted: None,
            pixel_ratio_cap: None,
            slow_frame: None,
            cycles: 0,
        }
    }

    /// Lowers the device pixel ratio used for the pixel buffer to at most `cap`.
    pub fn with_pixel_ratio_cap(mut self, cap: Option<f64>) -> Self {
        self.pixel_ratio_cap = cap;
        self
    }

    /// Logs a warning whenever rendering one frame takes longer than `threshold`.
    pub fn with_slow_frame_warning(mut self, threshold: Option<Duration>) -> Self {
        self.slow_frame = threshold;
        self
    }

    pub fn state(&self) -> SurfaceState {
        self.state
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Uniform values of the live mount cycle.
    pub fn uniforms(&self) -> Option<BeamUniforms> {
        self.mounted.as_ref().map(|mounted| mounted.uniforms)
    }

    pub fn buffer_size(&self) -> Option<PixelSize> {
        self.mounted.as_ref().map(|mounted| mounted.buffer)
    }

    pub fn outstanding_frame(&self) -> Option<FrameHandle> {
        self.mounted.as_ref().and_then(|mounted| mounted.frame)
    }

    /// Number of the live mount cycle, counting from 1.
    pub fn cycle(&self) -> Option<u64> {
        self.mounted.as_ref().map(|mounted| mounted.cycle)
    }

    /// Builds a fresh render context for `viewport` and schedules the first frame.
    ///
    /// On error the surface is back in [`SurfaceState::Unmounted`] holding no
    /// resources, no subscription and no scheduled frame.
    pub fn mount<S>(
        &mut self,
        viewport: Viewport,
        bus: &ViewportBus,
        scheduler: &mut S,
    ) -> Result<(), SurfaceError>
    where
        S: FrameScheduler + ?Sized,
    {
        if self.state != SurfaceState::Unmounted {
            return Err(SurfaceError::AlreadyMounted);
        }
        let buffer = viewport.buffer_size(self.pixel_ratio_cap);
        if buffer.is_empty() {
            return Err(SurfaceError::EmptyViewport {
                width: buffer.width,
                height: buffer.height,
            });
        }

        self.state = SurfaceState::Initializing;
        let uniforms = BeamUniforms::new(buffer);
        let context = match self.backend.create_context(buffer, &uniforms) {
            Ok(context) => context,
            Err(err) => {
                self.state = SurfaceState::Unmounted;
                debug!(error = %err, "render context creation failed");
                return Err(err);
            }
        };

        self.cycles += 1;
        let mut mounted = Mounted {
            cycle: self.cycles,
            context,
            uniforms,
            buffer,
            frame: None,
            resize: Some(bus.subscribe()),
            stats: FrameStats::default(),
        };
        mounted.apply_resize(buffer);
        mounted.frame = Some(scheduler.schedule_next_frame());
        debug!(
            cycle = mounted.cycle,
            width = buffer.width,
            height = buffer.height,
            pixel_ratio = viewport.pixel_ratio,
            "shader surface mounted"
        );
        self.mounted = Some(mounted);
        self.state = SurfaceState::Running;
        Ok(())
    }

    /// Applies the viewport change pending on the surface's bus subscription.
    pub fn handle_resize(&mut self) {
        let pending = self
            .mounted
            .as_ref()
            .and_then(|mounted| mounted.resize.as_ref())
            .and_then(Subscription::take);
        if let Some(viewport) = pending {
            self.resize(viewport);
        }
    }

    /// Resizes the pixel buffer and `resolution` uniform; a no-op unless running.
    pub fn resize(&mut self, viewport: Viewport) {
        if self.state != SurfaceState::Running {
            trace!(state = ?self.state, "ignoring resize; surface not running");
            return;
        }
        let buffer = viewport.buffer_size(self.pixel_ratio_cap);
        if buffer.is_empty() {
            trace!(
                width = buffer.width,
                height = buffer.height,
                "ignoring resize to empty viewport"
            );
            return;
        }
        if let Some(mounted) = self.mounted.as_mut() {
            mounted.apply_resize(buffer);
            trace!(width = buffer.width, height = buffer.height, "surface resized");
        }
    }

    /// Runs one animation frame and schedules the next.
    ///
    /// Ticks whose handle is not the outstanding one (cancelled, from an earlier
    /// mount cycle, or delivered after teardown began) are ignored. An
    /// out-of-memory error is returned without scheduling another frame.
    pub fn tick<S>(&mut self, tick: FrameTick, scheduler: &mut S) -> Result<TickOutcome, FrameError>
    where
        S: FrameScheduler + ?Sized,
    {
        if self.state != SurfaceState::Running {
            trace!(handle = tick.handle.raw(), state = ?self.state, "dropping tick");
            return Ok(TickOutcome::Stale);
        }
        let Some(mounted) = self.mounted.as_mut() else {
            return Ok(TickOutcome::Stale);
        };
        if mounted.frame != Some(tick.handle) {
            trace!(handle = tick.handle.raw(), "dropping stale tick");
            return Ok(TickOutcome::Stale);
        }
        mounted.frame = None;

        mounted.uniforms.set_timestamp(tick.timestamp);
        mounted.context.write_uniforms(&mounted.uniforms);

        let started = Instant::now();
        let result = mounted.context.render();
        let elapsed = started.elapsed();
        if let Some(threshold) = self.slow_frame {
            if elapsed > threshold {
                warn!(
                    elapsed_ms = elapsed.as_millis(),
                    threshold_ms = threshold.as_millis(),
                    "frame took longer than the slow-frame threshold"
                );
            }
        }

        let outcome = match result {
            Ok(()) => {
                mounted
                    .stats
                    .record(tick.timestamp, mounted.uniforms.time, mounted.cycle);
                TickOutcome::Rendered
            }
            Err(FrameError::Lost | FrameError::Outdated) => {
                debug!("surface lost or outdated; reconfiguring");
                mounted.context.resize(mounted.buffer);
                TickOutcome::Dropped
            }
            Err(FrameError::Timeout) => {
                debug!("surface timeout; retrying next frame");
                TickOutcome::Dropped
            }
            Err(FrameError::OutOfMemory) => return Err(FrameError::OutOfMemory),
            Err(err) => {
                warn!(error = %err, "frame failed; retrying next frame");
                TickOutcome::Dropped
            }
        };

        mounted.frame = Some(scheduler.schedule_next_frame());
        Ok(outcome)
    }

    /// Cancels the outstanding frame and releases every resource of the mount cycle.
    pub fn unmount<S>(&mut self, scheduler: &mut S)
    where
        S: FrameScheduler + ?Sized,
    {
        let Some(mut mounted) = self.mounted.take() else {
            self.state = SurfaceState::Unmounted;
            return;
        };
        self.state = SurfaceState::TearingDown;
        if let Some(handle) = mounted.frame.take() {
            scheduler.cancel(handle);
        }
        mounted.release();
        self.state = SurfaceState::Unmounted;
        debug!(cycle = mounted.cycle, "shader surface unmounted");
    }
}

impl<B: RenderBackend> Drop for ShaderSurface<B> {
    fn drop(&mut self) {
        if let Some(mut mounted) = self.mounted.take() {
            mounted.release();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_stats_report_after_one_second() {
        let mut stats = FrameStats::default();
        for frame in 0..60 {
            stats.record(Duration::from_millis(frame * 16), 0.0, 1);
        }
        assert_eq!(stats.frames, 60);
        stats.record(Duration::from_millis(1_000), 0.0, 1);
        assert_eq!(stats.frames, 0);
        assert_eq!(stats.window_start, Some(Duration::from_millis(1_000)));
    }
}
