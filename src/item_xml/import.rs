use serde::Serialize;

use super::{
    attr, outermost_items, parse_document, split_bom, sprite_children, sprite_state, XmlSyncError, ATTR_IDENTIFIER,
    ATTR_ORIGIN, ATTR_SOURCERECT, ITEM_TAG,
};
use crate::archive::{ArchiveDocument, ModArchive, ModInfo};
use crate::config::ImportConfig;
use crate::geometry::{Origin, Rect};
use crate::images::ImageKey;
use crate::registry::{PropertyBag, SpriteId};
use crate::texture_match::{find_texture, MatchStrategy};

#[derive(Debug, Clone, PartialEq)]
pub struct TextureBinding {
    pub image: ImageKey,
    pub strategy: MatchStrategy,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedSprite {
    pub name: String,
    pub state: String,
    pub source_rect: Rect,
    pub origin: Origin,
    pub texture: Option<String>,
    pub binding: Option<TextureBinding>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedComponent {
    pub kind: String,
    pub properties: PropertyBag,
}

/// One outermost `Item` and everything the editor extracts from it.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedItem {
    pub file: String,
    pub identifier: String,
    pub sprites: Vec<ParsedSprite>,
    pub components: Vec<ParsedComponent>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentFailure {
    pub file: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedSprite {
    pub file: String,
    pub identifier: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum BindingStatus {
    Pending,
    Bound,
    NoTexture,
    NoTextureMatch,
    DecodeFailed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BindingOutcome {
    pub sprite: SpriteId,
    pub name: String,
    pub image: Option<ImageKey>,
    pub status: BindingStatus,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportReport {
    pub mod_info: Option<ModInfo>,
    pub documents: usize,
    pub sprite_count: usize,
    pub component_count: usize,
    pub failed_documents: Vec<DocumentFailure>,
    pub skipped_sprites: Vec<SkippedSprite>,
    pub bindings: Vec<BindingOutcome>,
}

impl ImportReport {
    pub fn record_binding(&mut self, sprite: SpriteId, name: &str, image: Option<ImageKey>, status: BindingStatus) {
        self.bindings.push(BindingOutcome { sprite, name: name.to_string(), image, status });
    }

    /// Settles a pending binding once its decode resolved.
    pub fn resolve_binding(&mut self, sprite: SpriteId, status: BindingStatus) {
        if let Some(outcome) = self.bindings.iter_mut().find(|outcome| outcome.sprite == sprite) {
            outcome.status = status;
        }
    }

    pub fn count(&self, predicate: impl Fn(&BindingStatus) -> bool) -> usize {
        self.bindings.iter().filter(|outcome| predicate(&outcome.status)).count()
    }

    pub fn bound(&self) -> usize {
        self.count(|status| *status == BindingStatus::Bound)
    }

    pub fn pending(&self) -> usize {
        self.count(|status| *status == BindingStatus::Pending)
    }

    pub fn unbound(&self) -> usize {
        self.bindings.len() - self.bound() - self.pending()
    }
}

/// Extracts sprites and components from item documents.
pub struct ImportParser<'a> {
    config: &'a ImportConfig,
}

impl<'a> ImportParser<'a> {
    pub fn new(config: &'a ImportConfig) -> Self {
        Self { config }
    }

    /// Parses every item document of the archive. Malformed documents are reported and skipped.
    pub fn parse_archive(&self, archive: &ModArchive, report: &mut ImportReport) -> Vec<ParsedItem> {
        report.mod_info = archive.mod_info();
        let images: Vec<&str> = archive.image_filenames().collect();
        let mut items = Vec::new();
        for document in &archive.documents {
            report.documents += 1;
            match self.parse_document(document, &images, &mut report.skipped_sprites) {
                Ok(parsed) => items.extend(parsed),
                Err(err) => {
                    log::warn!("[import] skipping '{}': {err}", document.filename);
                    report.failed_documents.push(DocumentFailure {
                        file: document.filename.clone(),
                        reason: err.to_string(),
                    });
                }
            }
        }
        items
    }

    pub fn parse_document(
        &self,
        document: &ArchiveDocument,
        images: &[&str],
        skipped: &mut Vec<SkippedSprite>,
    ) -> Result<Vec<ParsedItem>, XmlSyncError> {
        let (_, body) = split_bom(&document.content);
        let doc = parse_document(body)?;
        let mut items = Vec::new();
        for item in outermost_items(&doc) {
            let Some(identifier) = attr(item, ATTR_IDENTIFIER).filter(|id| !id.is_empty()) else {
                continue;
            };
            let display_name = attr(item, "name").filter(|name| !name.is_empty()).unwrap_or(identifier);
            let sprite_nodes: Vec<_> = sprite_children(item).collect();
            let multiple = sprite_nodes.len() > 1;
            let mut sprites = Vec::with_capacity(sprite_nodes.len());
            for node in sprite_nodes {
                let state = sprite_state(node).to_string();
                let skip = |reason: String| SkippedSprite {
                    file: document.filename.clone(),
                    identifier: identifier.to_string(),
                    reason,
                };
                let Some(raw_rect) = attr(node, ATTR_SOURCERECT) else {
                    skipped.push(skip(format!("state '{state}' has no sourcerect")));
                    continue;
                };
                let source_rect = match Rect::parse_attribute(raw_rect) {
                    Ok(rect) => rect,
                    Err(err) => {
                        log::warn!("[import] {}: '{identifier}' {err}", document.filename);
                        skipped.push(skip(err.to_string()));
                        continue;
                    }
                };
                let origin = attr(node, ATTR_ORIGIN)
                    .and_then(|raw| Origin::parse_attribute(raw).ok())
                    .unwrap_or_default();
                let texture = attr(node, "texture").filter(|texture| !texture.is_empty()).map(str::to_string);
                let binding = texture.as_deref().and_then(|texture| {
                    find_texture(texture, images.iter().copied()).map(|hit| TextureBinding {
                        image: ImageKey::new(hit.filename),
                        strategy: hit.strategy,
                    })
                });
                let name = if multiple { format!("{display_name}_{state}") } else { display_name.to_string() };
                sprites.push(ParsedSprite { name, state, source_rect, origin, texture, binding });
            }
            let components = self.components_of(item);
            items.push(ParsedItem {
                file: document.filename.clone(),
                identifier: identifier.to_string(),
                sprites,
                components,
            });
        }
        Ok(items)
    }

    fn components_of(&self, item: roxmltree::Node<'_, '_>) -> Vec<ParsedComponent> {
        item.descendants()
            .skip(1)
            .filter(|node| node.is_element() && self.config.is_component_type(node.tag_name().name()))
            .filter(|node| {
                !node
                    .ancestors()
                    .skip(1)
                    .take_while(|ancestor| *ancestor != item)
                    .any(|ancestor| ancestor.is_element() && ancestor.tag_name().name() == ITEM_TAG)
            })
            .map(|node| ParsedComponent {
                kind: node.tag_name().name().to_string(),
                properties: node.attributes().map(|attribute| (attribute.name(), attribute.value())).collect(),
            })
            .collect()
    }
}
