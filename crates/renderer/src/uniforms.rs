use std::time::Duration;

use bytemuck::{Pod, Zeroable};

use crate::types::PixelSize;

/// Shader time units advanced per second of wall-clock time.
///
/// The animation was tuned at 0.024 units per frame on a 60 Hz display.
pub const TIME_SCALE: f64 = 1.44;

/// Converts a frame timestamp into the value written to the `time` uniform.
///
/// Time is always derived from the absolute timestamp, so dropped or late
/// frames never change the animation speed.
pub fn scaled_time(timestamp: Duration) -> f32 {
    (timestamp.as_secs_f64() * TIME_SCALE) as f32
}

/// Uniform block shared with the fragment program (`std140`, 16 bytes).
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct BeamUniforms {
    pub resolution: [f32; 2],
    pub time: f32,
    _padding: f32,
}

impl BeamUniforms {
    pub fn new(size: PixelSize) -> Self {
        Self {
            resolution: [size.width as f32, size.height as f32],
            time: 0.0,
            _padding: 0.0,
        }
    }

    pub fn set_resolution(&mut self, size: PixelSize) {
        self.resolution = [size.width as f32, size.height as f32];
    }

    pub fn set_timestamp(&mut self, timestamp: Duration) {
        self.time = scaled_time(timestamp);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_matches_std140_block() {
        assert_eq!(std::mem::size_of::<BeamUniforms>(), 16);
        let uniforms = BeamUniforms::new(PixelSize::new(800, 600));
        let bytes = bytemuck::bytes_of(&uniforms);
        assert_eq!(&bytes[0..4], &800.0_f32.to_ne_bytes());
        assert_eq!(&bytes[4..8], &600.0_f32.to_ne_bytes());
        assert_eq!(&bytes[8..12], &0.0_f32.to_ne_bytes());
    }

    #[test]
    fn time_is_scaled_timestamp() {
        let mut uniforms = BeamUniforms::new(PixelSize::new(1, 1));
        uniforms.set_timestamp(Duration::from_millis(2500));
        assert_eq!(uniforms.time, (2.5_f64 * 1.44) as f32);
        uniforms.set_timestamp(Duration::ZERO);
        assert_eq!(uniforms.time, 0.0);
    }
}
