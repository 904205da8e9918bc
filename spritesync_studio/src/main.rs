use clap::Parser;
use env_logger::Env;
use spritesync_studio::cli::{Cli, Command};
use spritesync_studio::commands;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Default level is overridden by RUST_LOG
    let env = Env::default().default_filter_or("warn");
    env_logger::Builder::from_env(env).init();

    let config = cli.load_config();
    match &cli.command {
        Command::Inspect { dir, json } => commands::inspect(&config, dir, *json),
        Command::SetRect { dir, target, rect, origin, dry_run } => {
            commands::set_rect(&config, dir, target, *rect, *origin, *dry_run)
        }
        Command::Export { dir, output, .. } => commands::export(&config, dir, output.as_deref()),
        Command::Crop { dir, target, output } => commands::crop(&config, dir, target, output),
        Command::Watch { dir } => commands::watch(&config, dir),
    }
}
