use super::EditorApp;
use crate::archive::{ArchiveEntry, ModArchive};
use crate::events::EditorEvent;
use crate::images::{ImageCompletion, ImageKey, ImageWaiter};
use crate::item_xml::import::{BindingStatus, ImportParser, ImportReport};
use crate::registry::{Sprite, SpriteId, SpriteUpdate, XmlBinding};
use std::sync::Arc;
use std::time::Duration;

impl EditorApp {
    /// Replaces the project with the contents of one extracted mod archive.
    ///
    /// Sprites are registered immediately; image bindings resolve later through
    /// [`EditorApp::poll_images`] or [`EditorApp::wait_for_images`].
    pub fn import_archive(&mut self, entries: impl IntoIterator<Item = ArchiveEntry>) -> &ImportReport {
        self.new_project();
        let archive = ModArchive::classify(entries, &self.config.import);
        let mut report = ImportReport::default();
        let items = ImportParser::new(&self.config.import).parse_archive(&archive, &mut report);

        for document in &archive.documents {
            self.documents.insert(document.filename.clone(), Arc::clone(&document.content));
        }
        for image in &archive.images {
            self.image_sources.insert(ImageKey::new(image.filename.clone()), Arc::clone(&image.bytes));
        }

        for item in items {
            let Some(snapshot) = self.documents.get(&item.file).cloned() else {
                continue;
            };
            let mut sprite_ids = Vec::with_capacity(item.sprites.len());
            for parsed in item.sprites {
                let mut sprite = Sprite::new(parsed.name, parsed.source_rect);
                sprite.identifier = Some(item.identifier.clone());
                sprite.state = parsed.state;
                sprite.origin = parsed.origin;
                sprite.texture = parsed.texture.clone();
                sprite.xml = Some(XmlBinding::new(item.file.clone(), Arc::clone(&snapshot)));
                let name = sprite.name.clone();
                let id = self.registry.add(sprite);
                sprite_ids.push(id);
                self.events.push(EditorEvent::SpriteCreated { id, name: name.clone() });

                let status = match (&parsed.binding, parsed.texture.as_deref()) {
                    (Some(binding), _) => {
                        match self.image_sources.get(&binding.image).cloned() {
                            Some(bytes) => self.images.request(binding.image.clone(), bytes, ImageWaiter::Sprite(id)),
                            None => log::warn!("[import] image '{}' vanished before decode", binding.image),
                        }
                        log::debug!("[import] '{name}' -> '{}' ({})", binding.image, binding.strategy.label());
                        BindingStatus::Pending
                    }
                    (None, Some(texture)) => {
                        log::info!("[import] no image matches texture '{texture}' of '{name}'");
                        BindingStatus::NoTextureMatch
                    }
                    (None, None) => BindingStatus::NoTexture,
                };
                let image = parsed.binding.map(|binding| binding.image);
                report.record_binding(id, &name, image, status);
            }
            for component in &item.components {
                for &sprite_id in &sprite_ids {
                    let added =
                        self.registry.add_component(sprite_id, component.kind.clone(), component.properties.clone());
                    if added.is_some() {
                        report.component_count += 1;
                    }
                }
            }
        }

        report.sprite_count = self.registry.len();
        log::info!(
            "[import] {} sprites from {} documents ({} failed), {} pending decodes",
            report.sprite_count,
            report.documents,
            report.failed_documents.len(),
            report.pending()
        );
        self.import_report.insert(report)
    }

    /// Applies finished decodes without blocking. Returns how many completions were applied.
    pub fn poll_images(&mut self) -> usize {
        let completions = self.images.poll();
        let count = completions.len();
        for completion in completions {
            self.apply_image_completion(completion);
        }
        count
    }

    /// Blocks until every pending decode resolved or `timeout` elapsed. Returns true when idle.
    pub fn wait_for_images(&mut self, timeout: Duration) -> bool {
        for completion in self.images.wait(timeout) {
            self.apply_image_completion(completion);
        }
        self.images.is_idle()
    }

    /// Replaces an image's bytes and decodes it again. Every sprite bound to it, or matched to it
    /// at import, is bound again once the decode resolves.
    pub fn reload_image(&mut self, filename: &str, bytes: impl Into<Arc<[u8]>>) -> bool {
        let key = ImageKey::from(filename);
        if !self.image_sources.contains_key(&key) {
            return false;
        }
        let bytes = bytes.into();
        self.image_sources.insert(key.clone(), Arc::clone(&bytes));
        let mut waiters: Vec<ImageWaiter> =
            self.registry.sprites_with_image(&key).map(|sprite| ImageWaiter::Sprite(sprite.id)).collect();
        if let Some(report) = self.import_report.as_ref() {
            let matched = report.bindings.iter().filter(|outcome| outcome.image.as_ref() == Some(&key));
            waiters.extend(matched.map(|outcome| ImageWaiter::Sprite(outcome.sprite)));
        }
        self.images.redecode(key, bytes, waiters);
        true
    }

    pub fn image_keys(&self) -> impl Iterator<Item = &ImageKey> {
        self.image_sources.keys()
    }

    fn apply_image_completion(&mut self, completion: ImageCompletion) {
        let ImageCompletion { key, waiters, outcome } = completion;
        for waiter in waiters {
            match (waiter, &outcome) {
                (ImageWaiter::Sprite(id), _) if !self.registry.contains(id) => {
                    log::debug!("[images] '{key}' resolved for deleted sprite {id}");
                }
                (ImageWaiter::Sprite(id), Ok(_)) => {
                    let update = SpriteUpdate { image_ref: Some(Some(key.clone())), ..SpriteUpdate::default() };
                    self.registry.update(id, update);
                    self.resolve_report_binding(id, BindingStatus::Bound);
                    self.events.push(EditorEvent::ImageBound { id, image: key.clone() });
                }
                (ImageWaiter::Sprite(id), Err(reason)) => {
                    self.resolve_report_binding(id, BindingStatus::DecodeFailed(reason.clone()));
                    self.events.push(EditorEvent::ImageUnbound { id, image: key.clone(), reason: reason.clone() });
                }
                (ImageWaiter::Canvas, _) => {}
            }
        }
        // The canvas follows the latest decode of its image, including re-decodes nobody waited on.
        if self.canvas_image.as_ref() == Some(&key) {
            match outcome {
                Ok(size) => {
                    self.camera.fit_stage(size, &self.config.viewport);
                    self.events.push(EditorEvent::CanvasReady { image: key });
                }
                Err(reason) => log::warn!("[canvas] cannot show '{key}': {reason}"),
            }
        }
    }

    fn resolve_report_binding(&mut self, id: SpriteId, status: BindingStatus) {
        if let Some(report) = self.import_report.as_mut() {
            report.resolve_binding(id, status);
        }
    }
}
