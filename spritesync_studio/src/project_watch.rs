use crate::project::ModDirectory;
use anyhow::{Context, Result};
use notify::event::ModifyKind;
use notify::{Config as NotifyConfig, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use spritesync::config::ImportConfig;
use spritesync::EditorApp;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver};
use std::time::Duration;

/// Watches a mod directory and reports which project images changed on disk.
pub struct ImageWatcher {
    _watcher: RecommendedWatcher,
    rx: Receiver<notify::Result<Event>>,
    project: ModDirectory,
}

impl ImageWatcher {
    pub fn new(project: ModDirectory) -> Result<Self> {
        let (tx, rx) = channel();
        let mut watcher = notify::recommended_watcher(move |res| {
            let _ = tx.send(res);
        })?;
        watcher
            .configure(
                NotifyConfig::default()
                    .with_compare_contents(false)
                    .with_poll_interval(Duration::from_millis(300)),
            )
            .context("configure image watcher")?;
        watcher
            .watch(project.root(), RecursiveMode::Recursive)
            .with_context(|| format!("watch {}", project.root().display()))?;
        Ok(Self { _watcher: watcher, rx, project })
    }

    /// Archive filenames of changed images, deduplicated, without blocking.
    pub fn drain_changes(&self, import: &ImportConfig) -> BTreeSet<String> {
        let mut changed = BTreeSet::new();
        while let Ok(event) = self.rx.try_recv() {
            self.collect(event, import, &mut changed);
        }
        changed
    }

    /// Blocks for the first event up to `timeout`, then drains whatever else arrived.
    pub fn wait_changes(&self, import: &ImportConfig, timeout: Duration) -> BTreeSet<String> {
        let mut changed = BTreeSet::new();
        if let Ok(event) = self.rx.recv_timeout(timeout) {
            self.collect(event, import, &mut changed);
        }
        changed.extend(self.drain_changes(import));
        changed
    }

    fn collect(&self, event: notify::Result<Event>, import: &ImportConfig, changed: &mut BTreeSet<String>) {
        match event {
            Ok(event) if is_relevant(&event.kind) => {
                for path in event.paths {
                    if let Some(filename) = self.image_filename(&path, import) {
                        changed.insert(filename);
                    }
                }
            }
            Ok(_) => {}
            Err(err) => log::warn!("[watch] watcher error: {err}"),
        }
    }

    fn image_filename(&self, path: &Path, import: &ImportConfig) -> Option<String> {
        let path = canonical_or_self(path);
        let filename = self.project.filename_of(&path)?;
        import.is_image_file(&filename).then_some(filename)
    }
}

/// Re-reads each changed image and hands the bytes to the editor. Returns how many were reloaded.
pub fn reload_changed(app: &mut EditorApp, project: &ModDirectory, changed: &BTreeSet<String>) -> usize {
    let mut reloaded = 0;
    for filename in changed {
        let path = project.path_of(filename);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) => {
                log::warn!("[watch] cannot read {}: {err}", path.display());
                continue;
            }
        };
        if app.reload_image(filename, bytes) {
            log::info!("[watch] re-decoding '{filename}'");
            reloaded += 1;
        } else {
            log::debug!("[watch] '{filename}' is not part of the project");
        }
    }
    reloaded
}

fn is_relevant(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Modify(ModifyKind::Data(_))
            | EventKind::Modify(ModifyKind::Name(_))
            | EventKind::Modify(ModifyKind::Any)
            | EventKind::Create(_)
    )
}

fn canonical_or_self(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, RemoveKind};

    #[test]
    fn removals_are_ignored() {
        assert!(is_relevant(&EventKind::Create(CreateKind::File)));
        assert!(is_relevant(&EventKind::Modify(ModifyKind::Any)));
        assert!(!is_relevant(&EventKind::Remove(RemoveKind::File)));
        assert!(!is_relevant(&EventKind::Access(notify::event::AccessKind::Any)));
    }
}
