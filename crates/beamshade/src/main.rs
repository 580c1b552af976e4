mod cli;
mod host;
mod paths;
mod run;
mod still;

use anyhow::{Context, Result};
use cli::{Command, RunArgs};
use paths::AppPaths;

fn main() -> Result<()> {
    let cli = cli::parse();
    run::initialise_tracing();
    let paths = AppPaths::discover()?;

    match cli.command {
        Some(Command::Still(args)) => still::export(&args),
        Some(Command::Config) => print_config(&paths, &cli.run),
        Some(Command::Where) => print_paths(&paths, &cli.run),
        None => run::run(&paths, cli.run),
    }
}

fn print_config(paths: &AppPaths, args: &RunArgs) -> Result<()> {
    let loaded = run::load_config(paths, args)?;
    let json = serde_json::to_string_pretty(&loaded.config)
        .context("failed to serialise configuration")?;
    println!("{json}");
    Ok(())
}

fn print_paths(paths: &AppPaths, args: &RunArgs) -> Result<()> {
    let config_file = args.config.clone().unwrap_or_else(|| paths.config_file());
    let status = if config_file.exists() {
        "present"
    } else {
        "missing"
    };
    println!("Configuration:");
    println!("  config dir:  {}", paths.config_dir().display());
    println!("  config file: {} ({status})", config_file.display());
    Ok(())
}
