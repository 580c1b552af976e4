//! CPU evaluation of the beam fragment program.
//!
//! These functions mirror `FRAGMENT_SHADER_GLSL` in `compile.rs` term for
//! term, in `f32` like the GPU's `highp float`. They are pure functions of
//! their inputs: the same coordinates and time always produce the same shade.
//! The still exporter renders through them and the tests pin their behaviour.

use crate::uniforms::BeamUniforms;

/// Height of the mirror line the primary beam reflects across.
pub const FLOOR_Y: f32 = -0.3;
/// Below this height the reflection mask is fully open.
pub const REFLECTION_FADE_BOTTOM: f32 = FLOOR_Y - 0.2;
/// At or above this height the reflection mask is fully closed.
pub const REFLECTION_FADE_TOP: f32 = FLOOR_Y + 0.1;
/// Number of value-noise octaves summed by [`fbm`].
pub const FBM_OCTAVES: usize = 3;

const TONE_EXPONENT: f32 = 0.9;

fn fract(value: f32) -> f32 {
    value - value.floor()
}

fn mix(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// GLSL `smoothstep`.
pub fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// Hash of a 2D coordinate into `[0, 1)`.
pub fn random(x: f32, y: f32) -> f32 {
    fract((x * 12.9898 + y * 78.233).sin() * 43758.547)
}

/// Value noise: the four hashed lattice corners blended with a smoothstep curve.
pub fn value_noise(x: f32, y: f32) -> f32 {
    let (ix, iy) = (x.floor(), y.floor());
    let (fx, fy) = (x - ix, y - iy);
    let ux = fx * fx * (3.0 - 2.0 * fx);
    let uy = fy * fy * (3.0 - 2.0 * fy);

    let bottom = mix(random(ix, iy), random(ix + 1.0, iy), ux);
    let top = mix(random(ix, iy + 1.0), random(ix + 1.0, iy + 1.0), ux);
    mix(bottom, top, uy)
}

/// Fractal noise: [`FBM_OCTAVES`] octaves, doubling frequency, halving amplitude.
pub fn fbm(x: f32, y: f32) -> f32 {
    let (mut x, mut y) = (x, y);
    let mut value = 0.0;
    let mut amplitude = 0.5;
    for _ in 0..FBM_OCTAVES {
        value += amplitude * value_noise(x, y);
        x *= 2.0;
        y *= 2.0;
        amplitude *= 0.5;
    }
    value
}

/// Maps a fragment coordinate (bottom-left origin) to centred, aspect-corrected
/// coordinates where the shorter axis spans `[-1, 1]`.
pub fn normalized_coords(frag_coord: [f32; 2], resolution: [f32; 2]) -> [f32; 2] {
    let scale = resolution[0].min(resolution[1]);
    [
        (frag_coord[0] * 2.0 - resolution[0]) / scale,
        (frag_coord[1] * 2.0 - resolution[1]) / scale,
    ]
}

/// Vertical centre of the primary beam at horizontal position `x`.
pub fn primary_wave(x: f32, t: f32) -> f32 {
    (x * 0.7 + t).sin() * 0.2 + (x * 1.5 + t * 0.5).sin() * 0.1 + value_noise(x + t, t) * 0.05 + 0.1
}

/// Vertical centre of the fainter secondary beam.
pub fn secondary_wave(x: f32, t: f32) -> f32 {
    (x * 1.2 - t * 0.8).sin() * 0.15 + (x * 2.2 + t).cos() * 0.05 + 0.1
}

/// Reflection visibility: 1 well below the floor, 0 from [`REFLECTION_FADE_TOP`] up.
pub fn floor_mask(y: f32) -> f32 {
    1.0 - smoothstep(REFLECTION_FADE_BOTTOM, REFLECTION_FADE_TOP, y)
}

/// Per-term contributions of the fragment program at one coordinate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BeamSample {
    /// Bright core plus smoke-textured glow of the primary beam.
    pub beam: f32,
    pub secondary: f32,
    pub reflection: f32,
    pub grain: f32,
}

impl BeamSample {
    pub fn value(&self) -> f32 {
        self.beam + self.secondary + self.reflection + self.grain
    }

    /// Tone-mapped grey level written to every colour channel.
    ///
    /// Negative sums (possible through grain alone) shade as black.
    pub fn luminance(&self) -> f32 {
        self.value().max(0.0).powf(TONE_EXPONENT)
    }
}

/// Evaluates every term of the program at normalized coordinates `uv`.
///
/// `time` is the raw uniform value; the beams run at a fifth of it while the
/// grain is seeded with it unscaled.
pub fn beam_field(uv: [f32; 2], time: f32) -> BeamSample {
    let [x, y] = uv;
    let t = time * 0.2;

    let wave_y = primary_wave(x, t);
    let dist = (y - wave_y).abs();
    let smoke = fbm(x * 3.0 + t * 2.0, y * 4.0);
    let beam = 0.006 / (dist + 0.001) + (0.05 / (dist + 0.08)) * (0.6 + 0.4 * smoke);

    let dist2 = (y - secondary_wave(x, t)).abs();
    let secondary = 0.015 / (dist2 + 0.04);

    let reflected_y = 2.0 * FLOOR_Y - wave_y;
    let ripple = value_noise(x * 10.0, y * 10.0 + t * 5.0) * 0.03;
    let reflect_dist = (y - reflected_y).abs() + ripple;
    let reflection = 0.025 / (reflect_dist + 0.1) * floor_mask(y) * 0.5;

    let grain = (random(x * time, y * time) - 0.5) * 0.03;

    BeamSample {
        beam,
        secondary,
        reflection,
        grain,
    }
}

/// Grey level of the pixel at `frag_coord` for the given uniform values.
pub fn shade(frag_coord: [f32; 2], uniforms: &BeamUniforms) -> f32 {
    let uv = normalized_coords(frag_coord, uniforms.resolution);
    beam_field(uv, uniforms.time).luminance()
}

/// Renders a full frame on the CPU as 8-bit grey levels, top row first.
pub fn render_luminance(uniforms: &BeamUniforms) -> Vec<u8> {
    let width = uniforms.resolution[0].max(0.0) as u32;
    let height = uniforms.resolution[1].max(0.0) as u32;
    let mut pixels = Vec::with_capacity(width as usize * height as usize);
    for row in 0..height {
        let y = height as f32 - row as f32 - 0.5;
        for column in 0..width {
            let level = shade([column as f32 + 0.5, y], uniforms);
            pixels.push((level.clamp(0.0, 1.0) * 255.0).round() as u8);
        }
    }
    pixels
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PixelSize;

    #[test]
    fn centre_pixel_is_reproducible() {
        let uniforms = BeamUniforms::new(PixelSize::new(800, 600));
        let first = shade([400.0, 300.0], &uniforms);
        let second = shade([400.0, 300.0], &uniforms);
        assert_eq!(first.to_bits(), second.to_bits());
        // uv = (0, 0) and time = 0 zero every noise term, leaving the closed form.
        assert!((first - 0.328_235).abs() < 1e-4, "got {first}");
    }

    #[test]
    fn noise_primitives_stay_in_unit_range() {
        for step in 0..200 {
            let x = step as f32 * 0.37 - 31.0;
            let y = step as f32 * -0.53 + 17.0;
            for value in [random(x, y), value_noise(x, y)] {
                assert!((0.0..=1.0).contains(&value), "{value} out of range");
            }
            let fractal = fbm(x, y);
            assert!((0.0..=0.875).contains(&fractal), "{fractal} out of range");
        }
    }

    #[test]
    fn value_noise_interpolates_lattice_corners() {
        assert_eq!(value_noise(3.0, -2.0), random(3.0, -2.0));
        assert_eq!(value_noise(0.0, 0.0), 0.0);
    }

    #[test]
    fn reflection_closed_above_fade_top() {
        for step in 0..=40 {
            let y = REFLECTION_FADE_TOP + step as f32 * 0.05;
            for time in [0.0, 1.44, 37.5, 1_000.0] {
                let sample = beam_field([step as f32 * 0.1 - 2.0, y], time);
                assert_eq!(sample.reflection, 0.0, "y = {y}, time = {time}");
            }
        }
    }

    #[test]
    fn reflection_visible_below_floor() {
        let sample = beam_field([0.0, REFLECTION_FADE_BOTTOM - 0.1], 0.0);
        assert!(sample.reflection > 0.0);
        assert_eq!(floor_mask(REFLECTION_FADE_BOTTOM - 0.1), 1.0);
    }

    #[test]
    fn full_frame_has_one_byte_per_pixel() {
        let uniforms = BeamUniforms::new(PixelSize::new(16, 9));
        let frame = render_luminance(&uniforms);
        assert_eq!(frame.len(), 16 * 9);
        assert!(frame.iter().any(|&level| level > 0));
    }
}
