use crate::cli::SpriteTarget;
use crate::project::ModDirectory;
use crate::project_watch::{reload_changed, ImageWatcher};
use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use spritesync::config::AppConfig;
use spritesync::geometry::{Origin, Rect};
use spritesync::item_xml::ImportReport;
use spritesync::registry::{Sprite, SpriteId};
use spritesync::EditorApp;
use std::fs;
use std::path::Path;
use std::time::Duration;

#[derive(Serialize)]
struct SpriteSummary<'a> {
    #[serde(flatten)]
    sprite: &'a Sprite,
    components: usize,
}

#[derive(Serialize)]
struct InspectOutput<'a> {
    report: &'a ImportReport,
    sprites: Vec<SpriteSummary<'a>>,
}

fn open_project(config: &AppConfig, dir: &Path) -> Result<(EditorApp, ModDirectory)> {
    let project = ModDirectory::open(dir)?;
    let mut app = EditorApp::new(config.clone());
    project.load_into(&mut app)?;
    Ok((app, project))
}

fn find_sprite(app: &EditorApp, target: &SpriteTarget) -> Result<SpriteId> {
    app.registry()
        .find_by_key(&target.identifier, target.state.as_deref())
        .map(|sprite| sprite.id)
        .ok_or_else(|| {
            anyhow!(
                "no sprite for item '{}' in state '{}'",
                target.identifier,
                target.state.as_deref().unwrap_or("Normal")
            )
        })
}

pub fn inspect(config: &AppConfig, dir: &Path, json: bool) -> Result<()> {
    let (app, _) = open_project(config, dir)?;
    let report = app.import_report().context("import produced no report")?;
    let sprites: Vec<_> = app
        .registry()
        .iter()
        .map(|sprite| SpriteSummary { sprite, components: app.registry().list_components(sprite.id).len() })
        .collect();

    if json {
        let output = InspectOutput { report, sprites };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    if let Some(info) = report.mod_info.as_ref() {
        println!("{} ({}) v{}", info.name, info.id, info.mod_version);
    }
    println!(
        "{} sprites, {} components, {} bound, {} unbound, {} documents ({} failed)",
        report.sprite_count,
        report.component_count,
        report.bound(),
        report.unbound(),
        report.documents,
        report.failed_documents.len()
    );
    for failure in &report.failed_documents {
        println!("  ! {}: {}", failure.file, failure.reason);
    }
    for skipped in &report.skipped_sprites {
        println!("  ! {} '{}': {}", skipped.file, skipped.identifier, skipped.reason);
    }
    for summary in &sprites {
        let sprite = summary.sprite;
        let image = sprite.image_ref.as_ref().map(|key| key.as_str()).unwrap_or("-");
        println!(
            "{:<28} {}/{} sourcerect={} origin={} image={image} components={}",
            sprite.name,
            sprite.identifier.as_deref().unwrap_or("-"),
            sprite.state,
            sprite.source_rect.to_attribute(),
            sprite.origin.to_attribute(),
            summary.components
        );
    }
    Ok(())
}

pub fn set_rect(
    config: &AppConfig,
    dir: &Path,
    target: &SpriteTarget,
    rect: Rect,
    origin: Option<Origin>,
    dry_run: bool,
) -> Result<()> {
    let (mut app, project) = open_project(config, dir)?;
    let id = find_sprite(&app, target)?;
    let origin = match origin {
        Some(origin) => origin,
        None => app.registry().get(id).map(|sprite| sprite.origin).unwrap_or_default(),
    };
    let changed = app
        .commit_geometry(id, rect, origin)
        .with_context(|| format!("Failed to update '{}'", target.identifier))?;
    if !changed {
        let (rect, origin) = (rect.to_attribute(), origin.to_attribute());
        println!("'{}' already has sourcerect={rect} origin={origin}", target.identifier);
        return Ok(());
    }
    if dry_run {
        for (file, text) in app.modified_documents() {
            println!("--- {file}");
            println!("{text}");
        }
        return Ok(());
    }
    for path in project.save_modified(&mut app)? {
        println!("wrote {}", path.display());
    }
    Ok(())
}

pub fn export(config: &AppConfig, dir: &Path, output: Option<&Path>) -> Result<()> {
    let (app, _) = open_project(config, dir)?;
    let xml = app.export_items_xml();
    match output {
        Some(path) => {
            fs::write(path, &xml).with_context(|| format!("Failed to write {}", path.display()))?;
            let count = app.registry().len();
            println!("exported {count} sprites as '{}' to {}", app.export_mod_id(), path.display());
        }
        None => println!("{xml}"),
    }
    Ok(())
}

pub fn crop(config: &AppConfig, dir: &Path, target: &SpriteTarget, output: &Path) -> Result<()> {
    let (app, _) = open_project(config, dir)?;
    let id = find_sprite(&app, target)?;
    let pixels = app
        .sprite_pixels(id)
        .ok_or_else(|| anyhow!("'{}' has no decoded image or lies outside it", target.identifier))?;
    pixels
        .save_with_format(output, image::ImageFormat::Png)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    println!("wrote {}x{} crop to {}", pixels.width(), pixels.height(), output.display());
    Ok(())
}

pub fn watch(config: &AppConfig, dir: &Path) -> Result<()> {
    let (mut app, project) = open_project(config, dir)?;
    let watcher = ImageWatcher::new(project.clone())?;
    println!("watching {} ({} images)", project.root().display(), app.image_keys().count());
    loop {
        let changed = watcher.wait_changes(&config.import, Duration::from_millis(500));
        if reload_changed(&mut app, &project, &changed) > 0 {
            app.wait_for_images(Duration::from_secs(10));
        } else {
            app.poll_images();
        }
        for event in app.drain_events() {
            println!("{event}");
        }
    }
}
