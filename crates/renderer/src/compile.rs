use std::borrow::Cow;

use anyhow::{bail, Result};
use wgpu::naga::ShaderStage;

/// Vertex and fragment modules of the beam program.
pub(crate) struct ProgramModules {
    pub vertex: wgpu::ShaderModule,
    pub fragment: wgpu::ShaderModule,
}

/// Compiles the fixed vertex and fragment sources through naga's GLSL frontend.
///
/// Validation errors are captured in an error scope and returned instead of
/// reaching the device's uncaptured-error handler, which would abort the host.
pub(crate) fn compile_program(device: &wgpu::Device) -> Result<ProgramModules> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let vertex = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("beam quad vertex"),
        source: wgpu::ShaderSource::Glsl {
            shader: Cow::Borrowed(VERTEX_SHADER_GLSL),
            stage: ShaderStage::Vertex,
            defines: &[],
        },
    });
    let fragment = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("beam fragment"),
        source: wgpu::ShaderSource::Glsl {
            shader: Cow::Borrowed(FRAGMENT_SHADER_GLSL),
            stage: ShaderStage::Fragment,
            defines: &[],
        },
    });
    if let Some(err) = pollster::block_on(device.pop_error_scope()) {
        bail!("beam shader program failed validation: {err}");
    }
    Ok(ProgramModules { vertex, fragment })
}

/// Passes the quad's clip-space positions straight through; the camera is an
/// identity orthographic projection over `[-1, 1]` with no depth.
pub const VERTEX_SHADER_GLSL: &str = r"#version 450
layout(location = 0) in vec3 position;

void main() {
    gl_Position = vec4(position, 1.0);
}
";

/// Beam, secondary beam, floor reflection and grain over a black background.
///
/// The uniform block layout must match [`crate::uniforms::BeamUniforms`].
/// `gl_FragCoord` is flipped to a bottom-left origin before any shading so the
/// floor sits at the bottom of the screen on every backend.
pub const FRAGMENT_SHADER_GLSL: &str = r"#version 450
layout(location = 0) out vec4 outColor;

layout(std140, set = 0, binding = 0) uniform BeamParams {
    vec2 resolution;
    float time;
    float _padding;
} params;

float random(vec2 st) {
    return fract(sin(dot(st.xy, vec2(12.9898, 78.233))) * 43758.5453123);
}

float noise(vec2 st) {
    vec2 i = floor(st);
    vec2 f = fract(st);
    vec2 u = f * f * (3.0 - 2.0 * f);
    return mix(mix(random(i), random(i + vec2(1.0, 0.0)), u.x),
               mix(random(i + vec2(0.0, 1.0)), random(i + vec2(1.0, 1.0)), u.x), u.y);
}

float fbm(vec2 st) {
    float v = 0.0;
    float a = 0.5;
    for (int i = 0; i < 3; i++) {
        v += a * noise(st);
        st *= 2.0;
        a *= 0.5;
    }
    return v;
}

void main() {
    vec2 resolution = params.resolution;
    float time = params.time;
    vec2 fragCoord = vec2(gl_FragCoord.x, resolution.y - gl_FragCoord.y);
    vec2 uv = (fragCoord * 2.0 - resolution) / min(resolution.x, resolution.y);

    float t = time * 0.2;

    float waveY = sin(uv.x * 0.7 + t) * 0.2
                + sin(uv.x * 1.5 + t * 0.5) * 0.1
                + noise(vec2(uv.x + t, t)) * 0.05;
    waveY += 0.1;

    float dist = abs(uv.y - waveY);
    float smoke = fbm(vec2(uv.x * 3.0 + t * 2.0, uv.y * 4.0));
    float intensity = 0.006 / (dist + 0.001);
    intensity += (0.05 / (dist + 0.08)) * (0.6 + 0.4 * smoke);

    float waveY2 = sin(uv.x * 1.2 - t * 0.8) * 0.15
                 + cos(uv.x * 2.2 + t) * 0.05 + 0.1;
    float dist2 = abs(uv.y - waveY2);
    intensity += 0.015 / (dist2 + 0.04);

    float floorY = -0.3;
    float reflectedWaveY = 2.0 * floorY - waveY;
    float reflectDist = abs(uv.y - reflectedWaveY);
    float ripple = noise(vec2(uv.x * 10.0, uv.y * 10.0 + t * 5.0)) * 0.03;
    reflectDist += ripple;
    float reflection = 0.025 / (reflectDist + 0.1);
    float floorMask = 1.0 - smoothstep(floorY - 0.2, floorY + 0.1, uv.y);
    reflection *= floorMask;
    reflection *= 0.5;

    float grain = (random(uv * time) - 0.5) * 0.03;

    float finalVal = intensity + reflection + grain;
    vec3 color = pow(vec3(max(finalVal, 0.0)), vec3(0.9));
    outColor = vec4(color, 1.0);
}
";

#[cfg(test)]
mod tests {
    use super::*;

    fn validate(source: &str, stage: ShaderStage) {
        use wgpu::naga::front::glsl::{Frontend, Options};
        use wgpu::naga::valid::{Capabilities, ValidationFlags, Validator};

        let module = Frontend::default()
            .parse(&Options::from(stage), source)
            .unwrap_or_else(|err| panic!("{stage:?} shader failed to parse: {err:?}"));
        Validator::new(ValidationFlags::all(), Capabilities::all())
            .validate(&module)
            .unwrap_or_else(|err| panic!("{stage:?} shader failed validation: {err:?}"));
    }

    #[test]
    fn program_sources_parse_and_validate_with_naga() {
        validate(VERTEX_SHADER_GLSL, ShaderStage::Vertex);
        validate(FRAGMENT_SHADER_GLSL, ShaderStage::Fragment);
    }

    #[test]
    fn fragment_declares_uniform_block_matching_rust_layout() {
        let block = FRAGMENT_SHADER_GLSL
            .split("uniform BeamParams {")
            .nth(1)
            .and_then(|rest| rest.split('}').next())
            .expect("uniform block");
        let fields: Vec<&str> = block
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect();
        assert_eq!(
            fields,
            ["vec2 resolution;", "float time;", "float _padding;"]
        );
    }

    #[test]
    fn fragment_keeps_three_fbm_octaves_and_floor_line() {
        assert!(FRAGMENT_SHADER_GLSL.contains("for (int i = 0; i < 3; i++)"));
        assert!(FRAGMENT_SHADER_GLSL.contains("float floorY = -0.3;"));
        assert!(FRAGMENT_SHADER_GLSL.contains("outColor = vec4(color, 1.0);"));
    }
}
