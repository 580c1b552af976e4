use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(
    name = "beamshade",
    author,
    version,
    about = "Full-window procedural light beam background",
    arg_required_else_help = false
)]
pub struct Cli {
    #[command(flatten)]
    pub run: RunArgs,
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Configuration file to load instead of the one in the config directory.
    #[arg(long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Initial window size in logical pixels (e.g. `1280x720`).
    #[arg(long, value_name = "WIDTHxHEIGHT", value_parser = parse_size)]
    pub size: Option<(u32, u32)>,

    /// Cap the frame rate (0 = follow the display).
    #[arg(long, value_name = "FPS")]
    pub fps: Option<f32>,

    /// Upper bound on the device pixel ratio used for the pixel buffer.
    #[arg(long, value_name = "RATIO")]
    pub pixel_ratio_cap: Option<f64>,

    /// Adapter power preference: `low` or `high`.
    #[arg(long, value_name = "POWER")]
    pub gpu_power: Option<PowerArg>,

    /// Present without waiting for vertical sync.
    #[arg(long)]
    pub no_vsync: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerArg {
    Low,
    High,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Render one frame on the CPU and write it as a grayscale PNG.
    Still(StillArgs),
    /// Print the resolved configuration as JSON.
    Config,
    /// Print resolved directories and the config file location.
    Where,
}

#[derive(Args, Debug)]
pub struct StillArgs {
    /// Seconds since the animation started.
    #[arg(long, value_name = "SECONDS", default_value_t = 0.0, value_parser = parse_seconds)]
    pub time: f64,

    /// Output size in pixels (e.g. `640x360`).
    #[arg(long, value_name = "WIDTHxHEIGHT", value_parser = parse_size, default_value = "640x360")]
    pub size: (u32, u32),

    /// Destination PNG path.
    #[arg(long, value_name = "PATH", value_parser = parse_png_path)]
    pub out: PathBuf,
}

pub fn parse() -> Cli {
    Cli::parse()
}

pub fn parse_size(value: &str) -> Result<(u32, u32), String> {
    let (w, h) = value
        .trim()
        .split_once(['x', 'X'])
        .ok_or_else(|| "expected WIDTHxHEIGHT".to_string())?;
    let width = w
        .trim()
        .parse::<u32>()
        .map_err(|_| format!("invalid width '{}'", w.trim()))?;
    let height = h
        .trim()
        .parse::<u32>()
        .map_err(|_| format!("invalid height '{}'", h.trim()))?;
    if width == 0 || height == 0 {
        return Err("size must be greater than zero".into());
    }
    Ok((width, height))
}

pub fn parse_seconds(value: &str) -> Result<f64, String> {
    let seconds = value
        .trim()
        .parse::<f64>()
        .map_err(|_| format!("invalid time '{value}'; expected seconds"))?;
    if !seconds.is_finite() || seconds < 0.0 {
        return Err("time must be a non-negative number of seconds".into());
    }
    Duration::try_from_secs_f64(seconds)
        .map_err(|_| format!("time '{value}' is out of range"))?;
    Ok(seconds)
}

pub fn parse_png_path(value: &str) -> Result<PathBuf, String> {
    let path = PathBuf::from(value);
    match extension(&path).as_deref() {
        Some("png") => Ok(path),
        None => Err("output path has no extension; expected .png".to_string()),
        Some(other) => Err(format!(
            "unsupported output format '.{other}'; expected .png"
        )),
    }
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sizes() {
        assert_eq!(parse_size("1280x720").unwrap(), (1280, 720));
        assert_eq!(parse_size(" 64 X 48 ").unwrap(), (64, 48));
        assert!(parse_size("0x720").is_err());
        assert!(parse_size("1280").is_err());
        assert!(parse_size("wide x tall").is_err());
    }

    #[test]
    fn validates_still_arguments() {
        assert_eq!(parse_seconds("2.5").unwrap(), 2.5);
        assert!(parse_seconds("-1").is_err());
        assert!(parse_seconds("1e20").is_err());
        assert!(parse_seconds("inf").is_err());
        assert!(parse_png_path("frame.PNG").is_ok());
        assert!(parse_png_path("frame.exr").is_err());
        assert!(parse_png_path("frame").is_err());
    }

    #[test]
    fn still_subcommand_accepts_global_config() {
        let cli = Cli::try_parse_from([
            "beamshade",
            "still",
            "--time",
            "3",
            "--size",
            "32x18",
            "--out",
            "frame.png",
            "--config",
            "custom.toml",
        ])
        .unwrap();
        assert_eq!(cli.run.config, Some(PathBuf::from("custom.toml")));
        match cli.command {
            Some(Command::Still(args)) => {
                assert_eq!(args.time, 3.0);
                assert_eq!(args.size, (32, 18));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
