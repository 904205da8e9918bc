use super::EditorApp;
use crate::events::EditorEvent;
use crate::images::{ImageKey, ImageWaiter};
use crate::interaction::{CanvasSprite, GestureOutcome, PressOutcome};
use crate::registry::Sprite;
use glam::Vec2;
use std::sync::Arc;

impl EditorApp {
    pub fn canvas_image(&self) -> Option<&ImageKey> {
        self.canvas_image.as_ref()
    }

    /// Opens a standalone image as a fresh project, dropping everything loaded before.
    pub fn open_image(&mut self, filename: impl Into<String>, bytes: impl Into<Arc<[u8]>>) {
        self.new_project();
        let key = ImageKey::new(filename);
        self.image_sources.insert(key.clone(), bytes.into());
        self.show_image(&key);
    }

    /// Points the canvas at a project image. The stage is fitted once the image is decoded.
    ///
    /// Returns false when the project holds no such image.
    pub fn show_image(&mut self, key: &ImageKey) -> bool {
        let Some(bytes) = self.image_sources.get(key).cloned() else {
            log::warn!("[canvas] unknown image '{key}'");
            return false;
        };
        self.controller.cancel();
        self.camera.clear_stage();
        self.canvas_image = Some(key.clone());
        let selected_elsewhere = self
            .registry
            .selected_sprite()
            .is_some_and(|sprite| sprite.image_ref.as_ref() != Some(key));
        if selected_elsewhere {
            self.clear_selection();
        }
        match self.images.size_of(key) {
            Some(size) => {
                self.camera.fit_stage(size, &self.config.viewport);
                self.events.push(EditorEvent::CanvasReady { image: key.clone() });
            }
            None => self.images.request(key.clone(), bytes, ImageWaiter::Canvas),
        }
        true
    }

    /// Sprites rendered on the active canvas, in draw order.
    pub fn canvas_sprites(&self) -> Vec<CanvasSprite> {
        let Some(key) = self.canvas_image.as_ref() else {
            return Vec::new();
        };
        self.registry
            .sprites_with_image(key)
            .map(|sprite| CanvasSprite { id: sprite.id, rect: sprite.source_rect, origin: sprite.origin })
            .collect()
    }

    pub fn pointer_down(&mut self, view: Vec2) -> PressOutcome {
        let sprites = self.canvas_sprites();
        let outcome = self.controller.pointer_down(&self.camera, view, &sprites, self.registry.selected());
        match outcome {
            PressOutcome::Selected(id) => {
                if self.registry.select(id) {
                    self.events.push(EditorEvent::SelectionChanged { id: Some(id) });
                }
            }
            PressOutcome::SelectionCleared => {
                if self.registry.clear_selection() {
                    self.events.push(EditorEvent::SelectionChanged { id: None });
                }
            }
            PressOutcome::Ignored | PressOutcome::DrawStarted | PressOutcome::HandleGrabbed => {}
        }
        outcome
    }

    pub fn pointer_move(&mut self, view: Vec2) {
        self.controller.pointer_move(&self.camera, view);
    }

    /// Finishes the gesture. Geometry commits are patched into the item document before this returns.
    pub fn pointer_up(&mut self, view: Vec2) -> GestureOutcome {
        let outcome = self.controller.pointer_up(&self.camera, view);
        match outcome {
            GestureOutcome::Created { rect } => {
                let mut sprite = Sprite::new(self.registry.next_drawn_name(), rect);
                sprite.image_ref = self.canvas_image.clone();
                let name = sprite.name.clone();
                let id = self.registry.add(sprite);
                self.events.push(EditorEvent::SpriteCreated { id, name });
                if self.registry.select(id) {
                    self.events.push(EditorEvent::SelectionChanged { id: Some(id) });
                }
                outcome
            }
            GestureOutcome::Committed { sprite, rect, origin } => match self.commit_geometry(sprite, rect, origin) {
                Ok(_) => outcome,
                Err(_) => GestureOutcome::Rejected { reason: "item document could not be patched" },
            },
            GestureOutcome::Cancelled { reason } | GestureOutcome::Rejected { reason } => {
                self.events.push(EditorEvent::GestureRejected { reason });
                outcome
            }
            GestureOutcome::Idle | GestureOutcome::NoChange => outcome,
        }
    }
}
