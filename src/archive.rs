use std::sync::Arc;

use serde::Serialize;

use crate::config::ImportConfig;

pub const MANIFEST_FILENAME: &str = "filelist.xml";
const UNKNOWN_MOD_NAME: &str = "Unknown mod";
const DEFAULT_MOD_VERSION: &str = "1.0";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryPayload {
    Text(Arc<str>),
    Binary(Arc<[u8]>),
}

impl EntryPayload {
    fn into_text(self) -> Option<Arc<str>> {
        match self {
            EntryPayload::Text(text) => Some(text),
            EntryPayload::Binary(bytes) => std::str::from_utf8(&bytes).ok().map(Arc::from),
        }
    }

    fn into_bytes(self) -> Arc<[u8]> {
        match self {
            EntryPayload::Text(text) => Arc::from(text.as_bytes()),
            EntryPayload::Binary(bytes) => bytes,
        }
    }
}

/// One extracted file of a mod archive. Filenames use `/` separators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub filename: String,
    pub payload: EntryPayload,
}

impl ArchiveEntry {
    pub fn text(filename: impl Into<String>, content: impl Into<Arc<str>>) -> Self {
        Self { filename: normalize_filename(filename.into()), payload: EntryPayload::Text(content.into()) }
    }

    pub fn binary(filename: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self { filename: normalize_filename(filename.into()), payload: EntryPayload::Binary(bytes.into()) }
    }
}

fn normalize_filename(filename: String) -> String {
    if filename.contains('\\') {
        filename.replace('\\', "/")
    } else {
        filename
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Manifest,
    ItemDocument,
    Image,
    Other,
}

pub fn classify_filename(filename: &str, import: &ImportConfig) -> EntryKind {
    let lower = filename.to_ascii_lowercase();
    let basename = lower.rsplit('/').next().unwrap_or_default();
    if basename == MANIFEST_FILENAME {
        EntryKind::Manifest
    } else if lower.ends_with(".xml") {
        EntryKind::ItemDocument
    } else if import.is_image_file(&lower) {
        EntryKind::Image
    } else {
        EntryKind::Other
    }
}

#[derive(Debug, Clone)]
pub struct ArchiveImage {
    pub filename: String,
    pub bytes: Arc<[u8]>,
}

#[derive(Debug, Clone)]
pub struct ArchiveDocument {
    pub filename: String,
    pub content: Arc<str>,
}

/// Extracted archive entries grouped by role, each group in enumeration order.
#[derive(Debug, Clone, Default)]
pub struct ModArchive {
    pub manifest: Option<ArchiveDocument>,
    pub documents: Vec<ArchiveDocument>,
    pub images: Vec<ArchiveImage>,
    pub ignored: Vec<String>,
}

impl ModArchive {
    pub fn classify(entries: impl IntoIterator<Item = ArchiveEntry>, import: &ImportConfig) -> Self {
        let mut archive = ModArchive::default();
        for ArchiveEntry { filename, payload } in entries {
            match classify_filename(&filename, import) {
                EntryKind::Manifest if archive.manifest.is_none() => match payload.into_text() {
                    Some(content) => archive.manifest = Some(ArchiveDocument { filename, content }),
                    None => {
                        log::warn!("[import] manifest '{filename}' is not valid UTF-8");
                        archive.ignored.push(filename);
                    }
                },
                EntryKind::ItemDocument => match payload.into_text() {
                    Some(content) => archive.documents.push(ArchiveDocument { filename, content }),
                    None => {
                        log::warn!("[import] document '{filename}' is not valid UTF-8");
                        archive.ignored.push(filename);
                    }
                },
                EntryKind::Image => archive.images.push(ArchiveImage { filename, bytes: payload.into_bytes() }),
                EntryKind::Manifest | EntryKind::Other => archive.ignored.push(filename),
            }
        }
        archive
    }

    pub fn image_filenames(&self) -> impl Iterator<Item = &str> {
        self.images.iter().map(|image| image.filename.as_str())
    }

    pub fn mod_info(&self) -> Option<ModInfo> {
        let manifest = self.manifest.as_ref()?;
        match ModInfo::parse(&manifest.content) {
            Ok(info) => info,
            Err(err) => {
                log::warn!("[import] failed to parse '{}': {err}", manifest.filename);
                None
            }
        }
    }
}

/// Content-package descriptor from `filelist.xml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModInfo {
    pub name: String,
    pub id: String,
    pub mod_version: String,
    pub game_version: Option<String>,
    pub steam_workshop_id: Option<String>,
    pub core_package: bool,
}

impl ModInfo {
    /// `Ok(None)` when the document has no `contentpackage` element.
    pub fn parse(text: &str) -> Result<Option<Self>, roxmltree::Error> {
        let doc = roxmltree::Document::parse(text.trim_start_matches('\u{feff}'))?;
        let Some(package) = doc
            .descendants()
            .find(|node| node.is_element() && node.tag_name().name().eq_ignore_ascii_case("contentpackage"))
        else {
            return Ok(None);
        };
        let attr = |name: &str| {
            package
                .attributes()
                .find(|attribute| attribute.name().eq_ignore_ascii_case(name))
                .map(|attribute| attribute.value().to_string())
                .filter(|value| !value.is_empty())
        };
        let name = attr("name").unwrap_or_else(|| UNKNOWN_MOD_NAME.to_string());
        Ok(Some(Self {
            id: mod_id_from_name(&name),
            name,
            mod_version: attr("modversion").unwrap_or_else(|| DEFAULT_MOD_VERSION.to_string()),
            game_version: attr("gameversion"),
            steam_workshop_id: attr("steamworkshopid"),
            core_package: attr("corepackage").is_some_and(|value| value.eq_ignore_ascii_case("true")),
        }))
    }
}

pub fn mod_id_from_name(name: &str) -> String {
    name.to_lowercase().split_whitespace().collect::<Vec<_>>().join("_")
}
