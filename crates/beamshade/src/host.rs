use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use beamconfig::BeamConfig;
use renderer::{GpuBackend, ShaderSurface, SurfaceState, Viewport, ViewportBus};
use scheduler::FrameQueue;
use tracing::{debug, error, info, warn};
use winit::dpi::LogicalSize;
use winit::event::{ElementState, Event, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::keyboard::{Key, NamedKey};
use winit::window::{Window, WindowBuilder};

use crate::run::gpu_options;

/// The window plus everything that lives on its page: the background surface,
/// the frame queue driving it and the viewport change source.
struct HostPage {
    window: Arc<Window>,
    surface: ShaderSurface<GpuBackend<Window>>,
    frames: FrameQueue,
    viewport_bus: ViewportBus,
}

impl HostPage {
    fn viewport(&self) -> Viewport {
        let size = self.window.inner_size();
        Viewport::from_physical(size.width, size.height, self.window.scale_factor())
    }

    fn mount(&mut self) {
        let viewport = self.viewport();
        match self
            .surface
            .mount(viewport, &self.viewport_bus, &mut self.frames)
        {
            Ok(()) => {
                info!(
                    width = viewport.width,
                    height = viewport.height,
                    pixel_ratio = viewport.pixel_ratio,
                    "background mounted"
                );
                self.window.request_redraw();
            }
            Err(err) => {
                warn!(error = %err, "background unavailable; the page stays blank");
            }
        }
    }

    fn unmount(&mut self) {
        if self.surface.state() != SurfaceState::Unmounted {
            self.surface.unmount(&mut self.frames);
            debug!("background unmounted");
        }
    }

    fn remount(&mut self) {
        info!("remounting background");
        self.unmount();
        self.mount();
    }

    fn resized(&mut self) {
        self.viewport_bus.publish(self.viewport());
        self.surface.handle_resize();
    }

    fn draw(&mut self, now: Instant) {
        for tick in self.frames.poll(now) {
            if let Err(err) = self.surface.tick(tick, &mut self.frames) {
                error!(error = %err, "unrecoverable frame error; removing background");
                self.surface.unmount(&mut self.frames);
            }
        }
    }
}

pub fn run_window(config: &BeamConfig) -> Result<()> {
    let event_loop = EventLoop::new().map_err(|err| anyhow!("failed to create event loop: {err}"))?;
    let window = WindowBuilder::new()
        .with_title(config.window.title.as_str())
        .with_inner_size(LogicalSize::new(
            f64::from(config.window.width),
            f64::from(config.window.height),
        ))
        .build(&event_loop)
        .map_err(|err| anyhow!("failed to create window: {err}"))?;
    let window = Arc::new(window);

    let surface = ShaderSurface::new(GpuBackend::new(window.clone(), gpu_options(config)))
        .with_pixel_ratio_cap(config.render.pixel_ratio_cap)
        .with_slow_frame_warning(config.slow_frame_warning());
    let frames = FrameQueue::new()
        .with_fps_cap(config.fps_cap())
        .context("invalid frame rate cap")?;

    let mut page = HostPage {
        window,
        surface,
        frames,
        viewport_bus: ViewportBus::new(),
    };
    page.mount();

    let run_result = event_loop.run(move |event, elwt| match event {
        Event::WindowEvent { window_id, event } if window_id == page.window.id() => match event {
            WindowEvent::CloseRequested | WindowEvent::Destroyed => {
                page.unmount();
                elwt.exit();
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if event.state != ElementState::Pressed || event.repeat {
                    return;
                }
                match event.logical_key {
                    Key::Named(NamedKey::Escape) => {
                        page.unmount();
                        elwt.exit();
                    }
                    Key::Character(ref value) if value.as_str().eq_ignore_ascii_case("r") => {
                        page.remount();
                    }
                    _ => {}
                }
            }
            WindowEvent::Resized(_) | WindowEvent::ScaleFactorChanged { .. } => {
                page.resized();
            }
            WindowEvent::RedrawRequested => {
                page.draw(Instant::now());
            }
            _ => {}
        },
        Event::AboutToWait => {
            let now = Instant::now();
            if page.frames.ready_for_frame(now) {
                tracing::trace!("scheduler: issuing redraw now");
                page.window.request_redraw();
                elwt.set_control_flow(ControlFlow::Wait);
            } else if let Some(deadline) = page.frames.next_deadline() {
                let ms = deadline.saturating_duration_since(now).as_millis();
                tracing::trace!(deadline_ms = ms, "scheduler: waiting until next frame");
                elwt.set_control_flow(ControlFlow::WaitUntil(deadline));
            } else {
                tracing::trace!("scheduler: idle (no frame scheduled)");
                elwt.set_control_flow(ControlFlow::Wait);
            }
        }
        Event::LoopExiting => {
            page.unmount();
        }
        _ => {}
    });

    run_result.map_err(|err| anyhow!("window event loop error: {err}"))
}
