use crate::geometry::{Origin, Rect};
use crate::images::ImageKey;
use crate::registry::SpriteId;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum EditorEvent {
    SpriteCreated { id: SpriteId, name: String },
    SpriteDeleted { id: SpriteId },
    SelectionChanged { id: Option<SpriteId> },
    GeometryCommitted { id: SpriteId, rect: Rect, origin: Origin },
    GestureRejected { reason: &'static str },
    DocumentPatched { id: SpriteId, file: String },
    PatchFailed { id: SpriteId, file: String, reason: String },
    ImageBound { id: SpriteId, image: ImageKey },
    ImageUnbound { id: SpriteId, image: ImageKey, reason: String },
    CanvasReady { image: ImageKey },
}

impl fmt::Display for EditorEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EditorEvent::SpriteCreated { id, name } => write!(f, "SpriteCreated id={id} name={name}"),
            EditorEvent::SpriteDeleted { id } => write!(f, "SpriteDeleted id={id}"),
            EditorEvent::SelectionChanged { id: Some(id) } => write!(f, "SelectionChanged id={id}"),
            EditorEvent::SelectionChanged { id: None } => write!(f, "SelectionChanged id=none"),
            EditorEvent::GeometryCommitted { id, rect, origin } => {
                write!(
                    f,
                    "GeometryCommitted id={id} sourcerect={} origin={}",
                    rect.to_attribute(),
                    origin.to_attribute()
                )
            }
            EditorEvent::GestureRejected { reason } => write!(f, "GestureRejected {reason}"),
            EditorEvent::DocumentPatched { id, file } => write!(f, "DocumentPatched id={id} file={file}"),
            EditorEvent::PatchFailed { id, file, reason } => {
                write!(f, "PatchFailed id={id} file={file} reason={reason}")
            }
            EditorEvent::ImageBound { id, image } => write!(f, "ImageBound id={id} image={image}"),
            EditorEvent::ImageUnbound { id, image, reason } => {
                write!(f, "ImageUnbound id={id} image={image} reason={reason}")
            }
            EditorEvent::CanvasReady { image } => write!(f, "CanvasReady image={image}"),
        }
    }
}

#[derive(Debug, Default)]
pub struct EventBus {
    events: Vec<EditorEvent>,
}

impl EventBus {
    pub fn push(&mut self, event: EditorEvent) {
        log::debug!("[events] {event}");
        self.events.push(event);
    }

    pub fn drain(&mut self) -> Vec<EditorEvent> {
        self.events.drain(..).collect()
    }
}
