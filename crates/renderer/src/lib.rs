//! Renderer crate for beamshade.
//!
//! The crate draws one full-screen procedural shader (a wavering light beam
//! with smoke texture, a floor reflection and film grain) behind a host page.
//! The flow per mount cycle is:
//!
//! ```text
//!   host (window / page)
//!      │ Viewport, FrameTick
//!      ▼
//!   ShaderSurface::mount ──▶ RenderBackend::create_context ──▶ RenderContext
//!      │                                                         ▲
//!      ├─ ViewportBus subscription ─▶ resize() ─▶ resolution ────┤
//!      └─ FrameScheduler ─▶ tick() ─▶ time = t × 1.44 ─▶ render ─┘
//! ```
//!
//! [`ShaderSurface`] owns the lifecycle (mount, frame loop, resize, teardown)
//! and is generic over a [`RenderBackend`] so it can run against the wgpu
//! implementation in [`GpuBackend`] or a recording stand-in in tests. The
//! [`program`] module evaluates the same fragment program on the CPU.

mod compile;
mod gpu;
mod lifecycle;
pub mod program;
mod types;
mod uniforms;
mod viewport;

pub use compile::{FRAGMENT_SHADER_GLSL, VERTEX_SHADER_GLSL};
pub use gpu::{GpuBackend, GpuRenderContext};
pub use lifecycle::{
    FrameError, RenderBackend, RenderContext, ShaderSurface, SurfaceError, SurfaceState,
    TickOutcome,
};
pub use scheduler::{FrameHandle, FrameQueue, FrameScheduler, FrameTick};
pub use types::{GpuOptions, GpuPowerPreference, PixelSize, Viewport};
pub use uniforms::{scaled_time, BeamUniforms, TIME_SCALE};
pub use viewport::{Subscription, ViewportBus};
