/// Host viewport in logical units plus the device pixel ratio it is shown at.
///
/// Logical sizes are kept as floats so a physical size converted to logical
/// and back lands on the same pixel count.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
    pub pixel_ratio: f64,
}

impl Viewport {
    pub fn new(width: f64, height: f64, pixel_ratio: f64) -> Self {
        Self {
            width,
            height,
            pixel_ratio,
        }
    }

    /// Builds a viewport from a physical pixel size reported by the windowing system.
    pub fn from_physical(width: u32, height: u32, pixel_ratio: f64) -> Self {
        let ratio = if pixel_ratio.is_finite() && pixel_ratio > 0.0 {
            pixel_ratio
        } else {
            1.0
        };
        Self {
            width: f64::from(width) / ratio,
            height: f64::from(height) / ratio,
            pixel_ratio: ratio,
        }
    }

    /// Size of the drawable pixel buffer for this viewport.
    ///
    /// The buffer tracks the device pixel ratio and is never upscaled beyond
    /// it; `ratio_cap` can only lower the effective ratio.
    pub fn buffer_size(&self, ratio_cap: Option<f64>) -> PixelSize {
        let mut ratio = self.pixel_ratio.max(0.0);
        if let Some(cap) = ratio_cap {
            ratio = ratio.min(cap);
        }
        PixelSize::new(
            (self.width * ratio).round().max(0.0) as u32,
            (self.height * ratio).round().max(0.0) as u32,
        )
    }

    pub fn is_empty(&self) -> bool {
        !(self.width > 0.0 && self.height > 0.0 && self.pixel_ratio > 0.0)
    }
}

/// Physical pixel dimensions of a drawable buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PixelSize {
    pub width: u32,
    pub height: u32,
}

impl PixelSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Adapter power preference handed to the GPU backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GpuPowerPreference {
    #[default]
    Low,
    High,
}

/// Device and swapchain preferences for the wgpu backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpuOptions {
    pub power: GpuPowerPreference,
    /// Present with vertical sync (FIFO) when true.
    pub vsync: bool,
    /// Desired maximum frame latency, clamped to 1-3.
    pub latency: u32,
}

impl Default for GpuOptions {
    fn default() -> Self {
        Self {
            power: GpuPowerPreference::default(),
            vsync: true,
            latency: 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn physical_round_trip_preserves_pixels() {
        let viewport = Viewport::from_physical(1001, 757, 2.0);
        assert_eq!(viewport.buffer_size(None), PixelSize::new(1001, 757));
        let fractional = Viewport::from_physical(1919, 1079, 1.25);
        assert_eq!(fractional.buffer_size(None), PixelSize::new(1919, 1079));
    }

    #[test]
    fn ratio_cap_only_lowers_resolution() {
        let viewport = Viewport::new(800.0, 600.0, 3.0);
        assert_eq!(viewport.buffer_size(Some(2.0)), PixelSize::new(1600, 1200));
        assert_eq!(viewport.buffer_size(Some(4.0)), PixelSize::new(2400, 1800));
    }

    #[test]
    fn degenerate_viewports_are_empty() {
        assert!(Viewport::new(0.0, 600.0, 1.0).is_empty());
        assert!(Viewport::new(800.0, 600.0, 0.0).is_empty());
        assert!(!Viewport::from_physical(800, 600, f64::NAN).is_empty());
    }
}
