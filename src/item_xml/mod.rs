//! Item-definition XML: locating sprite elements, patching their geometry, importing and exporting.

pub mod export;
pub mod import;
pub mod patch;

use roxmltree::{Document, Node};
use thiserror::Error;

use crate::geometry::{is_default_state, Origin, Rect, DEFAULT_STATE};

pub use export::generate_items_xml;
pub use import::{ImportParser, ImportReport, ParsedItem, ParsedSprite};
pub use patch::{patch_sprite_geometry, PatchRequest};

pub const ITEM_TAG: &str = "Item";
pub const SPRITE_TAG: &str = "Sprite";
pub const ATTR_IDENTIFIER: &str = "identifier";
pub const ATTR_STATE: &str = "state";
pub const ATTR_SOURCERECT: &str = "sourcerect";
pub const ATTR_ORIGIN: &str = "origin";

const BOM: char = '\u{feff}';

#[derive(Debug, Error)]
pub enum XmlSyncError {
    #[error("document is not well-formed XML: {0}")]
    Malformed(#[from] roxmltree::Error),
    #[error("no Item with identifier '{identifier}'")]
    ItemNotFound { identifier: String },
    #[error("Item '{identifier}' has no Sprite for state '{state}'")]
    SpriteNotFound { identifier: String, state: String },
    #[error("sprite is not backed by an item document")]
    NotXmlBacked,
    #[error("failed to serialize patched element: {0}")]
    Serialize(String),
}

/// Splits off a leading byte-order mark. Returns the BOM length and the remaining text.
pub(crate) fn split_bom(text: &str) -> (usize, &str) {
    match text.strip_prefix(BOM) {
        Some(rest) => (BOM.len_utf8(), rest),
        None => (0, text),
    }
}

pub(crate) fn parse_document(text: &str) -> Result<Document<'_>, XmlSyncError> {
    Ok(Document::parse(text)?)
}

/// Attribute lookup with an ASCII case-insensitive name.
pub(crate) fn attr<'a>(node: Node<'a, '_>, name: &str) -> Option<&'a str> {
    node.attributes().find(|attribute| attribute.name().eq_ignore_ascii_case(name)).map(|attribute| attribute.value())
}

fn is_element_named(node: Node<'_, '_>, tag: &str) -> bool {
    node.is_element() && node.tag_name().name() == tag
}

/// `Item` elements that are not nested inside another `Item`, in document order.
pub(crate) fn outermost_items<'a, 'input>(
    doc: &'a Document<'input>,
) -> impl Iterator<Item = Node<'a, 'input>> + 'a {
    doc.descendants().filter(|node| {
        is_element_named(*node, ITEM_TAG)
            && !node.ancestors().skip(1).any(|ancestor| is_element_named(ancestor, ITEM_TAG))
    })
}

pub(crate) fn sprite_children<'a, 'input>(item: Node<'a, 'input>) -> impl Iterator<Item = Node<'a, 'input>> {
    item.children().filter(|child| is_element_named(*child, SPRITE_TAG))
}

/// The `state` attribute of a `Sprite`, with an absent or empty value read as the default state.
pub(crate) fn sprite_state<'a>(sprite: Node<'a, '_>) -> &'a str {
    attr(sprite, ATTR_STATE).filter(|state| !state.is_empty()).unwrap_or(DEFAULT_STATE)
}

/// Finds the `Sprite` element keyed by `(identifier, state)`.
pub(crate) fn locate_sprite<'a, 'input>(
    doc: &'a Document<'input>,
    identifier: &str,
    state: &str,
) -> Result<Node<'a, 'input>, XmlSyncError> {
    let item = outermost_items(doc)
        .find(|item| attr(*item, ATTR_IDENTIFIER) == Some(identifier))
        .ok_or_else(|| XmlSyncError::ItemNotFound { identifier: identifier.to_string() })?;
    let explicit = sprite_children(item).find(|sprite| {
        attr(*sprite, ATTR_STATE).filter(|value| !value.is_empty()) == Some(state)
    });
    let fallback = || {
        is_default_state(state)
            .then(|| sprite_children(item).find(|sprite| sprite_state(*sprite) == DEFAULT_STATE))
            .flatten()
    };
    explicit.or_else(fallback).ok_or_else(|| XmlSyncError::SpriteNotFound {
        identifier: identifier.to_string(),
        state: if state.is_empty() { DEFAULT_STATE.to_string() } else { state.to_string() },
    })
}

/// Geometry as currently written on a sprite element. Unparsable attributes read as `None`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WrittenGeometry {
    pub source_rect: Option<Rect>,
    pub origin: Option<Origin>,
}

pub fn read_sprite_geometry(text: &str, identifier: &str, state: &str) -> Result<WrittenGeometry, XmlSyncError> {
    let (_, body) = split_bom(text);
    let doc = parse_document(body)?;
    let sprite = locate_sprite(&doc, identifier, state)?;
    Ok(WrittenGeometry {
        source_rect: attr(sprite, ATTR_SOURCERECT).and_then(|raw| Rect::parse_attribute(raw).ok()),
        origin: attr(sprite, ATTR_ORIGIN).and_then(|raw| Origin::parse_attribute(raw).ok()),
    })
}
