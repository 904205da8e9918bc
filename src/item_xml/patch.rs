use std::borrow::Cow;
use std::io::Cursor;

use quick_xml::events::attributes::Attribute;
use quick_xml::events::{BytesStart, Event};
use quick_xml::{Reader, Writer};

use super::{locate_sprite, parse_document, split_bom, XmlSyncError, ATTR_ORIGIN, ATTR_SOURCERECT};
use crate::geometry::{Origin, Rect};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PatchRequest<'a> {
    pub identifier: &'a str,
    pub state: &'a str,
    pub source_rect: Rect,
    pub origin: Origin,
}

/// Rewrites the `sourcerect` and `origin` attributes of the sprite element keyed by
/// `(identifier, state)` and returns the new document text.
///
/// Only the start tag of the matched element is re-serialized; every byte outside it is copied
/// through. When both attributes already hold the requested geometry the input is returned as is.
pub fn patch_sprite_geometry(text: &str, request: &PatchRequest<'_>) -> Result<String, XmlSyncError> {
    let (bom_len, body) = split_bom(text);
    let doc = parse_document(body)?;
    let sprite = locate_sprite(&doc, request.identifier, request.state)?;
    let tag_start = sprite.range().start;

    let (original, tag_len) = read_start_tag(&body[tag_start..])?;
    let Some(rewritten) = rewrite_tag(&original, request)? else {
        return Ok(text.to_string());
    };

    let splice_at = bom_len + tag_start;
    let mut patched = String::with_capacity(text.len() + rewritten.len());
    patched.push_str(&text[..splice_at]);
    patched.push_str(&rewritten);
    patched.push_str(&text[splice_at + tag_len..]);
    log::debug!(
        "[patch] '{}' ({}) -> sourcerect={} origin={}",
        request.identifier,
        request.state,
        request.source_rect.to_attribute(),
        request.origin.to_attribute()
    );
    Ok(patched)
}

enum StartTag<'a> {
    Open(BytesStart<'a>),
    SelfClosing(BytesStart<'a>),
}

impl<'a> StartTag<'a> {
    fn element(&self) -> &BytesStart<'a> {
        match self {
            StartTag::Open(element) | StartTag::SelfClosing(element) => element,
        }
    }
}

fn serialize_error(err: impl std::fmt::Display) -> XmlSyncError {
    XmlSyncError::Serialize(err.to_string())
}

/// Reads the tag at the start of `fragment` and returns it with its byte length.
fn read_start_tag(fragment: &str) -> Result<(StartTag<'_>, usize), XmlSyncError> {
    let mut reader = Reader::from_str(fragment);
    let tag = match reader.read_event().map_err(serialize_error)? {
        Event::Start(element) => StartTag::Open(element),
        Event::Empty(element) => StartTag::SelfClosing(element),
        other => return Err(XmlSyncError::Serialize(format!("expected a start tag, found {other:?}"))),
    };
    Ok((tag, reader.buffer_position() as usize))
}

/// `None` when neither attribute needs to change.
fn rewrite_tag(original: &StartTag<'_>, request: &PatchRequest<'_>) -> Result<Option<String>, XmlSyncError> {
    let source = original.element();
    let name = std::str::from_utf8(source.name().as_ref()).map_err(serialize_error)?.to_string();
    let rect_value = request.source_rect.to_attribute();
    let origin_value = request.origin.to_attribute();

    let mut element = BytesStart::new(name);
    let mut saw_rect = false;
    let mut saw_origin = false;
    let mut changed = false;
    for attribute in source.attributes() {
        let attribute = attribute.map_err(serialize_error)?;
        let key = std::str::from_utf8(attribute.key.as_ref()).map_err(serialize_error)?.to_string();
        let current = attribute.unescape_value().map_err(serialize_error)?;
        if key.eq_ignore_ascii_case(ATTR_SOURCERECT) && !saw_rect {
            saw_rect = true;
            if Rect::parse_attribute(&current).ok() != Some(request.source_rect) {
                element.push_attribute((key.as_str(), rect_value.as_str()));
                changed = true;
                continue;
            }
        } else if key.eq_ignore_ascii_case(ATTR_ORIGIN) && !saw_origin {
            saw_origin = true;
            let unchanged =
                Origin::parse_attribute(&current).is_ok_and(|origin| origin.same_as_written(&request.origin));
            if !unchanged {
                element.push_attribute((key.as_str(), origin_value.as_str()));
                changed = true;
                continue;
            }
        }
        push_verbatim(&mut element, attribute, &key, &current);
    }
    if !saw_rect {
        element.push_attribute((ATTR_SOURCERECT, rect_value.as_str()));
        changed = true;
    }
    if !saw_origin {
        element.push_attribute((ATTR_ORIGIN, origin_value.as_str()));
        changed = true;
    }
    if !changed {
        return Ok(None);
    }

    let mut writer = Writer::new(Cursor::new(Vec::new()));
    let event = match original {
        StartTag::Open(_) => Event::Start(element),
        StartTag::SelfClosing(_) => Event::Empty(element),
    };
    writer.write_event(event).map_err(serialize_error)?;
    let bytes = writer.into_inner().into_inner();
    String::from_utf8(bytes).map(Some).map_err(serialize_error)
}

/// Keeps the raw escaped value unless it would break the double quotes the writer emits.
fn push_verbatim(element: &mut BytesStart<'_>, attribute: Attribute<'_>, key: &str, current: &Cow<'_, str>) {
    if attribute.value.contains(&b'"') {
        element.push_attribute((key, current.as_ref()));
    } else {
        element.push_attribute(attribute);
    }
}
