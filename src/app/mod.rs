use crate::archive::ModInfo;
use crate::camera::CanvasCamera;
use crate::config::AppConfig;
use crate::documents::DocumentStore;
use crate::events::{EditorEvent, EventBus};
use crate::geometry::{Origin, Rect};
use crate::images::{ImageKey, ImageLoader};
use crate::interaction::{InteractionController, Tool};
use crate::item_xml::import::ImportReport;
use crate::item_xml::{generate_items_xml, patch_sprite_geometry, PatchRequest, XmlSyncError};
use crate::registry::{Sprite, SpriteId, SpriteRegistry, SpriteUpdate};

mod canvas_tooling;
mod import_tooling;

use image::RgbaImage;
use std::collections::HashMap;
use std::sync::Arc;

const FALLBACK_MOD_ID: &str = "mod";

/// Editor state: one project, one canvas. Constructed once and reset with [`EditorApp::new_project`].
pub struct EditorApp {
    config: AppConfig,
    camera: CanvasCamera,
    controller: InteractionController,
    registry: SpriteRegistry,
    documents: DocumentStore,
    images: ImageLoader,
    image_sources: HashMap<ImageKey, Arc<[u8]>>,
    canvas_image: Option<ImageKey>,
    events: EventBus,
    import_report: Option<ImportReport>,
}

impl EditorApp {
    pub fn new(config: AppConfig) -> Self {
        let images = ImageLoader::new(config.import.decode_workers);
        Self::with_loader(config, images)
    }

    /// Decodes on the calling thread during `poll_images`.
    pub fn new_inline(config: AppConfig) -> Self {
        Self::with_loader(config, ImageLoader::inline())
    }

    fn with_loader(config: AppConfig, images: ImageLoader) -> Self {
        Self {
            camera: CanvasCamera::new(&config.editor),
            controller: InteractionController::new(&config.editor),
            registry: SpriteRegistry::new(),
            documents: DocumentStore::new(),
            images,
            image_sources: HashMap::new(),
            canvas_image: None,
            events: EventBus::default(),
            import_report: None,
            config,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn camera(&self) -> &CanvasCamera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut CanvasCamera {
        &mut self.camera
    }

    pub fn registry(&self) -> &SpriteRegistry {
        &self.registry
    }

    pub fn documents(&self) -> &DocumentStore {
        &self.documents
    }

    pub fn images(&self) -> &ImageLoader {
        &self.images
    }

    pub fn import_report(&self) -> Option<&ImportReport> {
        self.import_report.as_ref()
    }

    pub fn mod_info(&self) -> Option<&ModInfo> {
        self.import_report.as_ref().and_then(|report| report.mod_info.as_ref())
    }

    pub fn drain_events(&mut self) -> Vec<EditorEvent> {
        self.events.drain()
    }

    pub fn tool(&self) -> Tool {
        self.controller.tool()
    }

    pub fn set_tool(&mut self, tool: Tool) {
        self.controller.set_tool(tool);
    }

    /// Drops every sprite, document and image. Decodes still in flight resolve into nothing.
    pub fn new_project(&mut self) {
        self.registry.reset();
        self.documents.clear();
        self.images.reset();
        self.image_sources.clear();
        self.canvas_image = None;
        self.camera.reset();
        self.controller.cancel();
        self.import_report = None;
        log::info!("[app] new project");
    }

    pub fn select_sprite(&mut self, id: SpriteId) -> bool {
        if !self.registry.select(id) {
            return false;
        }
        self.controller.cancel();
        self.events.push(EditorEvent::SelectionChanged { id: Some(id) });
        true
    }

    pub fn clear_selection(&mut self) -> bool {
        if !self.registry.clear_selection() {
            return false;
        }
        self.controller.cancel();
        self.events.push(EditorEvent::SelectionChanged { id: None });
        true
    }

    /// Removes the sprite and its components. The backing document is not edited.
    pub fn delete_sprite(&mut self, id: SpriteId) -> Option<Sprite> {
        let was_selected = self.registry.selected() == Some(id);
        let removed = self.registry.delete(id)?;
        if was_selected {
            self.controller.cancel();
            self.events.push(EditorEvent::SelectionChanged { id: None });
        }
        self.events.push(EditorEvent::SpriteDeleted { id });
        Some(removed)
    }

    /// Applies new geometry to a sprite, patching its item document first when it has one.
    ///
    /// Returns `Ok(false)` for unknown sprites, degenerate rectangles and unchanged geometry. On a
    /// patch failure neither the registry nor the document store changes.
    pub fn commit_geometry(&mut self, id: SpriteId, rect: Rect, origin: Origin) -> Result<bool, XmlSyncError> {
        let Some(sprite) = self.registry.get(id) else {
            return Ok(false);
        };
        if rect.width <= 0 || rect.height <= 0 {
            self.events.push(EditorEvent::GestureRejected { reason: "rectangle must have a positive size" });
            return Ok(false);
        }
        if sprite.source_rect == rect && sprite.origin.same_as_written(&origin) {
            return Ok(false);
        }

        if let (Some(binding), Some(identifier)) = (sprite.xml.as_ref(), sprite.identifier.as_deref()) {
            let file = binding.file.clone();
            let current = self.documents.get(&file).cloned().unwrap_or_else(|| Arc::clone(&binding.snapshot));
            let request = PatchRequest { identifier, state: &sprite.state, source_rect: rect, origin };
            let patched = match patch_sprite_geometry(&current, &request) {
                Ok(patched) => patched,
                Err(err) => {
                    log::warn!("[patch] {file}: {err}");
                    self.events.push(EditorEvent::PatchFailed { id, file, reason: err.to_string() });
                    return Err(err);
                }
            };
            let text: Arc<str> = if *patched == *current { current } else { Arc::from(patched) };
            if !self.documents.replace(&file, Arc::clone(&text)) {
                self.documents.insert(file.clone(), Arc::clone(&text));
            }
            self.registry.refresh_snapshots(&file, &text);
            self.events.push(EditorEvent::DocumentPatched { id, file });
        }

        self.registry.update(id, SpriteUpdate::geometry(rect, origin));
        self.events.push(EditorEvent::GeometryCommitted { id, rect, origin });
        Ok(true)
    }

    /// Property-panel edit. Geometry goes through [`EditorApp::commit_geometry`]; the remaining
    /// fields only touch the registry.
    pub fn update_sprite(&mut self, id: SpriteId, mut update: SpriteUpdate) -> Result<bool, XmlSyncError> {
        let Some(sprite) = self.registry.get(id) else {
            return Ok(false);
        };
        let mut changed = false;
        if update.touches_geometry() {
            let rect = update.source_rect.take().unwrap_or(sprite.source_rect);
            let origin = update.origin.take().unwrap_or(sprite.origin);
            changed = self.commit_geometry(id, rect, origin)?;
        }
        Ok(self.registry.update(id, update) || changed)
    }

    pub fn mark_file_saved(&mut self, file: &str) -> bool {
        self.registry.mark_saved(file)
    }

    /// Modified documents with their current text, in filename order.
    pub fn modified_documents(&self) -> Vec<(String, Arc<str>)> {
        self.registry
            .modified_files()
            .iter()
            .filter_map(|file| self.documents.get(file).map(|text| (file.clone(), Arc::clone(text))))
            .collect()
    }

    pub fn export_mod_id(&self) -> String {
        self.config
            .export
            .mod_id
            .clone()
            .or_else(|| self.mod_info().map(|info| info.id.clone()))
            .unwrap_or_else(|| FALLBACK_MOD_ID.to_string())
    }

    pub fn export_items_xml(&self) -> String {
        generate_items_xml(&self.export_mod_id(), self.registry.iter(), self.registry.components())
    }

    /// Source-region pixels of a bound sprite, clipped to the image.
    pub fn sprite_pixels(&self, id: SpriteId) -> Option<RgbaImage> {
        let sprite = self.registry.get(id)?;
        let image = self.images.get(sprite.image_ref.as_ref()?)?;
        let rect = sprite.source_rect;
        let x = rect.x.max(0) as u32;
        let y = rect.y.max(0) as u32;
        if x >= image.size.width || y >= image.size.height {
            return None;
        }
        let right = (rect.x.saturating_add(rect.width)).clamp(0, image.size.width as i32) as u32;
        let bottom = (rect.y.saturating_add(rect.height)).clamp(0, image.size.height as i32) as u32;
        if right <= x || bottom <= y {
            return None;
        }
        Some(image::imageops::crop_imm(image.pixels.as_ref(), x, y, right - x, bottom - y).to_image())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::XmlBinding;

    const DOC: &str = r#"<Items>
  <Item identifier="wrench"><Sprite texture="wrench.png" sourcerect="0,0,32,32" origin="0.5,0.5"/></Item>
</Items>"#;

    fn app_with_backed_sprite(identifier: &str) -> (EditorApp, SpriteId) {
        let mut app = EditorApp::new_inline(AppConfig::default());
        app.documents.insert("items.xml", Arc::from(DOC));
        let mut sprite = Sprite::new("wrench", Rect::new(0, 0, 32, 32));
        sprite.identifier = Some(identifier.to_string());
        sprite.xml = Some(XmlBinding::new("items.xml", Arc::from(DOC)));
        let id = app.registry.add(sprite);
        (app, id)
    }

    #[test]
    fn commit_patches_document_before_registry() {
        let (mut app, id) = app_with_backed_sprite("wrench");
        assert!(app.commit_geometry(id, Rect::new(0, 0, 40, 40), Origin::default()).expect("commit"));
        let text = app.documents().get("items.xml").expect("document");
        assert!(text.contains("sourcerect=\"0,0,40,40\" origin=\"0.5,0.5\""));
        assert!(app.registry().is_modified("items.xml"));
        let binding = app.registry().get(id).and_then(|sprite| sprite.xml.as_ref()).expect("binding");
        assert_eq!(&*binding.snapshot, &**text);
        assert_eq!(app.modified_documents().len(), 1);
    }

    #[test]
    fn failed_patch_leaves_registry_untouched() {
        let (mut app, id) = app_with_backed_sprite("hammer");
        let err = app.commit_geometry(id, Rect::new(0, 0, 40, 40), Origin::default()).unwrap_err();
        assert!(matches!(err, XmlSyncError::ItemNotFound { .. }));
        assert_eq!(app.registry().get(id).expect("sprite").source_rect, Rect::new(0, 0, 32, 32));
        assert!(app.registry().modified_files().is_empty());
        assert_eq!(&**app.documents().get("items.xml").expect("document"), DOC);
        let events = app.drain_events();
        assert!(events.iter().any(|event| matches!(event, EditorEvent::PatchFailed { .. })));
    }

    #[test]
    fn property_edits_route_geometry_through_patch() {
        let (mut app, id) = app_with_backed_sprite("wrench");
        let update = SpriteUpdate {
            name: Some("Big Wrench".to_string()),
            origin: Some(Origin::new(0.25, 0.75)),
            ..Default::default()
        };
        assert!(app.update_sprite(id, update).expect("update"));
        let sprite = app.registry().get(id).expect("sprite");
        assert_eq!(sprite.name, "Big Wrench");
        assert!(app.documents().get("items.xml").expect("document").contains("origin=\"0.25,0.75\""));
    }

    #[test]
    fn degenerate_and_unchanged_commits_are_no_ops() {
        let (mut app, id) = app_with_backed_sprite("wrench");
        assert!(!app.commit_geometry(id, Rect::new(0, 0, 0, 32), Origin::default()).expect("no error"));
        assert!(!app.commit_geometry(id, Rect::new(0, 0, 32, 32), Origin::new(0.5, 0.5)).expect("no error"));
        assert!(app.registry().modified_files().is_empty());
    }

    #[test]
    fn export_prefers_configured_mod_id() {
        let mut config = AppConfig::default();
        config.export.mod_id = Some("tools".to_string());
        let mut app = EditorApp::new_inline(config);
        app.registry.add(Sprite::new("Sprite_1", Rect::new(0, 0, 16, 16)));
        let xml = app.export_items_xml();
        assert!(xml.contains("texture=\"tools.png\""));
        assert!(xml.contains("identifier=\"Sprite_1\""));
    }
}
