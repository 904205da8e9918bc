use anyhow::{bail, Context, Result};
use spritesync::archive::ArchiveEntry;
use spritesync::item_xml::ImportReport;
use spritesync::EditorApp;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use walkdir::WalkDir;

const DECODE_TIMEOUT: Duration = Duration::from_secs(30);

/// An extracted mod on disk. Archive filenames are paths relative to the root with `/` separators.
#[derive(Debug, Clone)]
pub struct ModDirectory {
    root: PathBuf,
}

impl ModDirectory {
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        if !root.is_dir() {
            bail!("mod directory '{}' does not exist", root.display());
        }
        let root = fs::canonicalize(root).with_context(|| format!("Failed to resolve {}", root.display()))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_of(&self, filename: &str) -> PathBuf {
        filename.split('/').fold(self.root.clone(), |path, part| path.join(part))
    }

    /// Archive filename for a path under the root.
    pub fn filename_of(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let parts: Vec<_> = relative.components().map(|part| part.as_os_str().to_string_lossy()).collect();
        (!parts.is_empty()).then(|| parts.join("/"))
    }

    /// Every regular file under the root, in filename order. `.xml` files that are valid UTF-8 are
    /// read as text.
    pub fn read_entries(&self) -> Result<Vec<ArchiveEntry>> {
        let mut entries = Vec::new();
        for entry in WalkDir::new(&self.root).sort_by_file_name() {
            let entry = entry.with_context(|| format!("Failed to walk {}", self.root.display()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(filename) = self.filename_of(entry.path()) else {
                continue;
            };
            let bytes =
                fs::read(entry.path()).with_context(|| format!("Failed to read {}", entry.path().display()))?;
            let is_xml = filename.to_ascii_lowercase().ends_with(".xml");
            let entry = match (is_xml, String::from_utf8(bytes)) {
                (true, Ok(text)) => ArchiveEntry::text(filename, text),
                (_, Ok(text)) => ArchiveEntry::binary(filename, text.into_bytes()),
                (_, Err(err)) => ArchiveEntry::binary(filename, err.into_bytes()),
            };
            entries.push(entry);
        }
        log::debug!("[project] read {} files from {}", entries.len(), self.root.display());
        Ok(entries)
    }

    /// Imports the directory into `app` and waits for image decodes to settle.
    pub fn load_into<'a>(&self, app: &'a mut EditorApp) -> Result<&'a ImportReport> {
        let entries = self.read_entries()?;
        app.import_archive(entries);
        if !app.wait_for_images(DECODE_TIMEOUT) {
            log::warn!("[project] image decodes still pending after {}s", DECODE_TIMEOUT.as_secs());
        }
        app.import_report().context("import produced no report")
    }

    /// Writes every modified item document back and marks it saved. Returns the written paths.
    pub fn save_modified(&self, app: &mut EditorApp) -> Result<Vec<PathBuf>> {
        let mut written = Vec::new();
        for (file, text) in app.modified_documents() {
            let path = self.path_of(&file);
            fs::write(&path, text.as_bytes()).with_context(|| format!("Failed to write {}", path.display()))?;
            app.mark_file_saved(&file);
            log::info!("[project] saved {}", path.display());
            written.push(path);
        }
        Ok(written)
    }
}
