//! wgpu implementation of the render backend.
//!
//! - `context` owns the instance, device and presentation surface and
//!   reconfigures the swapchain when the pixel buffer changes size.
//! - `pipeline` holds the quad geometry and the compiled beam program with
//!   its uniform buffer.
//!
//! Each mount cycle builds all of these from scratch; nothing is shared
//! between cycles.

mod context;
mod pipeline;

use std::sync::Arc;

use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use tracing::debug;

use crate::lifecycle::{FrameError, RenderBackend, RenderContext, SurfaceError};
use crate::types::{GpuOptions, PixelSize};
use crate::uniforms::BeamUniforms;

use context::GpuContext;
use pipeline::{BeamProgram, QuadGeometry};

/// Renders into the window `W` through wgpu.
pub struct GpuBackend<W> {
    window: Arc<W>,
    options: GpuOptions,
}

impl<W> GpuBackend<W> {
    pub fn new(window: Arc<W>, options: GpuOptions) -> Self {
        Self { window, options }
    }
}

impl<W> RenderBackend for GpuBackend<W>
where
    W: HasWindowHandle + HasDisplayHandle + Send + Sync + 'static,
{
    type Context = GpuRenderContext;

    fn create_context(
        &mut self,
        size: PixelSize,
        uniforms: &BeamUniforms,
    ) -> Result<Self::Context, SurfaceError> {
        let context = GpuContext::new(Arc::clone(&self.window), size, &self.options)
            .map_err(SurfaceError::Context)?;
        let program = BeamProgram::new(&context.device, context.surface_format, uniforms)
            .map_err(SurfaceError::Context)?;
        let geometry = QuadGeometry::new(&context.device);
        debug!(
            format = ?context.surface_format,
            width = size.width,
            height = size.height,
            "render context ready"
        );
        Ok(GpuRenderContext {
            context: Some(context),
            geometry: Some(geometry),
            program: Some(program),
            mesh_attached: true,
        })
    }
}

/// GPU resources of one mount cycle. Each piece is released independently.
pub struct GpuRenderContext {
    context: Option<GpuContext>,
    geometry: Option<QuadGeometry>,
    program: Option<BeamProgram>,
    mesh_attached: bool,
}

fn map_surface_error(err: wgpu::SurfaceError) -> FrameError {
    match err {
        wgpu::SurfaceError::Lost => FrameError::Lost,
        wgpu::SurfaceError::Outdated => FrameError::Outdated,
        wgpu::SurfaceError::Timeout => FrameError::Timeout,
        wgpu::SurfaceError::OutOfMemory => FrameError::OutOfMemory,
        other => FrameError::Other(other.to_string()),
    }
}

impl RenderContext for GpuRenderContext {
    fn resize(&mut self, size: PixelSize) {
        if let Some(context) = self.context.as_mut() {
            context.resize(size);
        }
    }

    fn write_uniforms(&mut self, uniforms: &BeamUniforms) {
        if let (Some(context), Some(program)) = (self.context.as_ref(), self.program.as_ref()) {
            program.write_uniforms(&context.queue, uniforms);
        }
    }

    fn render(&mut self) -> Result<(), FrameError> {
        let context = self.context.as_ref().ok_or(FrameError::Released)?;
        let frame = context
            .surface
            .get_current_texture()
            .map_err(map_surface_error)?;
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = context
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("beam frame"),
            });
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("beam pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            if let (true, Some(program), Some(geometry)) =
                (self.mesh_attached, self.program.as_ref(), self.geometry.as_ref())
            {
                render_pass.set_pipeline(&program.pipeline);
                render_pass.set_bind_group(0, &program.uniform_bind_group, &[]);
                render_pass.set_vertex_buffer(0, geometry.vertex_buffer.slice(..));
                render_pass.draw(0..geometry.vertex_count, 0..1);
            }
        }
        context.queue.submit(Some(encoder.finish()));
        frame.present();
        Ok(())
    }

    fn detach_mesh(&mut self) {
        self.mesh_attached = false;
    }

    fn release_geometry(&mut self) {
        if let Some(geometry) = self.geometry.take() {
            geometry.release();
            debug!("quad geometry released");
        }
    }

    fn release_program(&mut self) {
        if let Some(program) = self.program.take() {
            program.release();
            debug!("beam program released");
        }
    }

    fn release_device(&mut self) {
        if self.context.take().is_some() {
            debug!("GPU device released");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn surface_errors_map_to_frame_errors() {
        assert_eq!(map_surface_error(wgpu::SurfaceError::Lost), FrameError::Lost);
        assert_eq!(
            map_surface_error(wgpu::SurfaceError::Outdated),
            FrameError::Outdated
        );
        assert_eq!(
            map_surface_error(wgpu::SurfaceError::Timeout),
            FrameError::Timeout
        );
        assert_eq!(
            map_surface_error(wgpu::SurfaceError::OutOfMemory),
            FrameError::OutOfMemory
        );
    }
}
