use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use spritesync::config::{AppConfig, ConfigOverrides};
use spritesync::geometry::{Origin, Rect};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "spritesync")]
#[command(about = "Inspect and edit sprite geometry in item-definition mods", long_about = None)]
#[command(version)]
pub struct Cli {
    /// JSON config file; missing or invalid files fall back to defaults
    #[arg(long, global = true, value_hint = clap::ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    #[arg(long, global = true)]
    pub viewport_width: Option<u32>,

    #[arg(long, global = true)]
    pub viewport_height: Option<u32>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List imported sprites with their bindings and geometry
    Inspect {
        #[arg(value_hint = clap::ValueHint::DirPath)]
        dir: PathBuf,

        /// Print the import report and sprites as JSON
        #[arg(long)]
        json: bool,
    },

    /// Commit new geometry for one sprite and write the patched document back
    SetRect {
        #[arg(value_hint = clap::ValueHint::DirPath)]
        dir: PathBuf,

        #[command(flatten)]
        target: SpriteTarget,

        /// New source rectangle as x,y,w,h
        #[arg(long, value_parser = parse_rect)]
        rect: Rect,

        /// New origin as x,y in [0,1]
        #[arg(long, value_parser = parse_origin)]
        origin: Option<Origin>,

        /// Print the patched document instead of writing it
        #[arg(long)]
        dry_run: bool,
    },

    /// Regenerate a flat items document from every imported sprite
    Export {
        #[arg(value_hint = clap::ValueHint::DirPath)]
        dir: PathBuf,

        #[arg(long)]
        mod_id: Option<String>,

        /// Destination file; stdout when omitted
        #[arg(short, long, value_hint = clap::ValueHint::FilePath)]
        output: Option<PathBuf>,
    },

    /// Write a sprite's source region as a PNG
    Crop {
        #[arg(value_hint = clap::ValueHint::DirPath)]
        dir: PathBuf,

        #[command(flatten)]
        target: SpriteTarget,

        #[arg(short, long, value_hint = clap::ValueHint::FilePath)]
        output: PathBuf,
    },

    /// Re-decode images as they change on disk
    Watch {
        #[arg(value_hint = clap::ValueHint::DirPath)]
        dir: PathBuf,
    },
}

#[derive(Debug, Clone, Args)]
pub struct SpriteTarget {
    /// Item identifier
    #[arg(long)]
    pub identifier: String,

    /// Sprite state; defaults to Normal
    #[arg(long)]
    pub state: Option<String>,
}

impl Cli {
    pub fn overrides(&self) -> ConfigOverrides {
        let mod_id = match &self.command {
            Command::Export { mod_id, .. } => mod_id.clone(),
            _ => None,
        };
        ConfigOverrides { viewport_width: self.viewport_width, viewport_height: self.viewport_height, mod_id }
    }

    pub fn load_config(&self) -> AppConfig {
        let mut config = match self.config.as_ref() {
            Some(path) => AppConfig::load_or_default(path),
            None => AppConfig::default(),
        };
        let overrides = self.overrides();
        if !overrides.is_empty() {
            log::debug!("[cli] overriding {}", overrides.applied_fields().join(", "));
            config.apply_overrides(&overrides);
        }
        config
    }
}

fn parse_rect(raw: &str) -> Result<Rect> {
    let rect = Rect::parse_attribute(raw).with_context(|| format!("Invalid rect '{raw}'"))?;
    if rect.width <= 0 || rect.height <= 0 {
        bail!("Rect '{raw}' must have a positive width and height");
    }
    Ok(rect)
}

fn parse_origin(raw: &str) -> Result<Origin> {
    Origin::parse_attribute(raw).with_context(|| format!("Invalid origin '{raw}'"))
}
