use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use anyhow::{Context, Result};
use beamconfig::{BeamConfig, PowerSetting};
use renderer::{GpuOptions, GpuPowerPreference};
use tracing_subscriber::EnvFilter;

use crate::cli::{PowerArg, RunArgs};
use crate::host;
use crate::paths::AppPaths;

/// Configuration after file discovery and command-line overrides.
#[derive(Debug)]
pub struct LoadedConfig {
    pub config: BeamConfig,
    /// File the configuration was read from, if any.
    pub source: Option<PathBuf>,
}

pub fn run(paths: &AppPaths, args: RunArgs) -> Result<()> {
    let loaded = load_config(paths, &args)?;
    tracing::debug!(
        config_dir = %paths.config_dir().display(),
        source = ?loaded.source,
        "resolved beamshade configuration"
    );
    host::run_window(&loaded.config)
}

pub fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Reads the config file (explicit `--config` first, then the config
/// directory) and applies command-line overrides on top.
///
/// A missing file in the config directory means defaults; a missing explicit
/// file is an error.
pub fn load_config(paths: &AppPaths, args: &RunArgs) -> Result<LoadedConfig> {
    let (path, explicit) = match &args.config {
        Some(path) => (path.clone(), true),
        None => (paths.config_file(), false),
    };

    let (mut config, source) = match fs::read_to_string(&path) {
        Ok(text) => {
            let config = BeamConfig::from_toml_str(&text)
                .with_context(|| format!("failed to load config at {}", path.display()))?;
            (config, Some(path))
        }
        Err(err) if err.kind() == ErrorKind::NotFound && !explicit => {
            tracing::debug!(path = %path.display(), "no config file; using defaults");
            (BeamConfig::default(), None)
        }
        Err(err) => {
            return Err(err)
                .with_context(|| format!("failed to read config at {}", path.display()));
        }
    };

    apply_overrides(&mut config, args);
    config
        .validate()
        .context("invalid configuration after applying command-line overrides")?;
    Ok(LoadedConfig { config, source })
}

fn apply_overrides(config: &mut BeamConfig, args: &RunArgs) {
    if let Some((width, height)) = args.size {
        config.window.width = width;
        config.window.height = height;
    }
    if let Some(fps) = args.fps {
        config.render.fps = Some(fps);
    }
    if let Some(cap) = args.pixel_ratio_cap {
        config.render.pixel_ratio_cap = Some(cap);
    }
    if let Some(power) = args.gpu_power {
        config.gpu.power = match power {
            PowerArg::Low => PowerSetting::Low,
            PowerArg::High => PowerSetting::High,
        };
    }
    if args.no_vsync {
        config.gpu.vsync = false;
    }
}

pub fn gpu_options(config: &BeamConfig) -> GpuOptions {
    GpuOptions {
        power: match config.gpu.power {
            PowerSetting::Low => GpuPowerPreference::Low,
            PowerSetting::High => GpuPowerPreference::High,
        },
        vsync: config.gpu.vsync,
        latency: config.gpu.latency,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn temp_paths() -> (AppPaths, TempDir) {
        let dir = TempDir::new().unwrap();
        (AppPaths::from_raw(dir.path().to_path_buf()), dir)
    }

    #[test]
    fn missing_default_file_yields_defaults() {
        let (paths, _dir) = temp_paths();
        let loaded = load_config(&paths, &RunArgs::default()).unwrap();
        assert_eq!(loaded.config, BeamConfig::default());
        assert!(loaded.source.is_none());
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let (paths, dir) = temp_paths();
        let args = RunArgs {
            config: Some(dir.path().join("absent.toml")),
            ..RunArgs::default()
        };
        assert!(load_config(&paths, &args).is_err());
    }

    #[test]
    fn flags_override_file_values() {
        let (paths, _dir) = temp_paths();
        fs::write(
            paths.config_file(),
            "version = 1\n[render]\nfps = 30\n[gpu]\npower = \"low\"\n",
        )
        .unwrap();
        let args = RunArgs {
            fps: Some(60.0),
            size: Some((640, 480)),
            gpu_power: Some(PowerArg::High),
            no_vsync: true,
            ..RunArgs::default()
        };

        let loaded = load_config(&paths, &args).unwrap();

        assert_eq!(loaded.source, Some(paths.config_file()));
        assert_eq!(loaded.config.fps_cap(), Some(60.0));
        assert_eq!(loaded.config.window.width, 640);
        let options = gpu_options(&loaded.config);
        assert_eq!(options.power, GpuPowerPreference::High);
        assert!(!options.vsync);
    }

    #[test]
    fn invalid_override_is_rejected() {
        let (paths, _dir) = temp_paths();
        let args = RunArgs {
            pixel_ratio_cap: Some(0.0),
            ..RunArgs::default()
        };
        assert!(load_config(&paths, &args).is_err());
    }
}
