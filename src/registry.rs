use crate::geometry::{Origin, Rect, DEFAULT_STATE};
use crate::images::ImageKey;
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SpriteId(Uuid);

impl SpriteId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SpriteId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SpriteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ComponentId(Uuid);

impl ComponentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ComponentId {
    fn default() -> Self {
        Self::new()
    }
}

/// Link between a sprite and the item document it was imported from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct XmlBinding {
    pub file: String,
    /// Document text as of the last successful synchronization.
    #[serde(skip)]
    pub snapshot: Arc<str>,
}

impl XmlBinding {
    pub fn new(file: impl Into<String>, snapshot: Arc<str>) -> Self {
        Self { file: file.into(), snapshot }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sprite {
    pub id: SpriteId,
    pub name: String,
    pub identifier: Option<String>,
    pub state: String,
    pub source_rect: Rect,
    pub origin: Origin,
    pub texture: Option<String>,
    pub image_ref: Option<ImageKey>,
    pub xml: Option<XmlBinding>,
}

impl Sprite {
    pub fn new(name: impl Into<String>, source_rect: Rect) -> Self {
        Self {
            id: SpriteId::new(),
            name: name.into(),
            identifier: None,
            state: DEFAULT_STATE.to_string(),
            source_rect,
            origin: Origin::default(),
            texture: None,
            image_ref: None,
            xml: None,
        }
    }

    pub fn xml_file(&self) -> Option<&str> {
        self.xml.as_ref().map(|binding| binding.file.as_str())
    }

    pub fn is_xml_backed(&self) -> bool {
        self.xml.is_some() && self.identifier.is_some()
    }
}

/// Partial sprite update; `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct SpriteUpdate {
    pub name: Option<String>,
    pub state: Option<String>,
    pub identifier: Option<Option<String>>,
    pub source_rect: Option<Rect>,
    pub origin: Option<Origin>,
    pub image_ref: Option<Option<ImageKey>>,
    pub xml: Option<Option<XmlBinding>>,
}

impl SpriteUpdate {
    pub fn geometry(source_rect: Rect, origin: Origin) -> Self {
        Self { source_rect: Some(source_rect), origin: Some(origin), ..Self::default() }
    }

    pub fn touches_geometry(&self) -> bool {
        self.source_rect.is_some() || self.origin.is_some()
    }
}

/// Attribute bag that keeps document order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertyBag(Vec<(String, String)>);

impl PropertyBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.0.push((key, value)),
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        let index = self.0.iter().position(|(k, _)| k == key)?;
        Some(self.0.remove(index).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for PropertyBag {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut bag = PropertyBag::new();
        for (key, value) in iter {
            bag.set(key, value);
        }
        bag
    }
}

impl Serialize for PropertyBag {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, value) in &self.0 {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Component {
    pub id: ComponentId,
    pub sprite_id: SpriteId,
    #[serde(rename = "type")]
    pub kind: String,
    pub properties: PropertyBag,
}

#[derive(Debug, Default)]
pub struct SpriteRegistry {
    sprites: Vec<Sprite>,
    components: Vec<Component>,
    selected: Option<SpriteId>,
    modified_files: BTreeSet<String>,
}

impl SpriteRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, sprite: Sprite) -> SpriteId {
        let id = sprite.id;
        self.sprites.push(sprite);
        id
    }

    pub fn get(&self, id: SpriteId) -> Option<&Sprite> {
        self.sprites.iter().find(|sprite| sprite.id == id)
    }

    fn get_mut(&mut self, id: SpriteId) -> Option<&mut Sprite> {
        self.sprites.iter_mut().find(|sprite| sprite.id == id)
    }

    pub fn contains(&self, id: SpriteId) -> bool {
        self.get(id).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Sprite> {
        self.sprites.iter()
    }

    pub fn len(&self) -> usize {
        self.sprites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sprites.is_empty()
    }

    pub fn find_by_key(&self, identifier: &str, state: Option<&str>) -> Option<&Sprite> {
        let state = state.unwrap_or(DEFAULT_STATE);
        self.sprites
            .iter()
            .find(|sprite| sprite.identifier.as_deref() == Some(identifier) && sprite.state == state)
    }

    pub fn next_drawn_name(&self) -> String {
        format!("Sprite_{}", self.sprites.len() + 1)
    }

    /// Returns false when the sprite does not exist.
    pub fn update(&mut self, id: SpriteId, update: SpriteUpdate) -> bool {
        let touches_geometry = update.touches_geometry();
        let Some(sprite) = self.get_mut(id) else {
            return false;
        };
        let SpriteUpdate { name, state, identifier, source_rect, origin, image_ref, xml } = update;
        if let Some(name) = name {
            sprite.name = name;
        }
        if let Some(state) = state {
            sprite.state = if state.is_empty() { DEFAULT_STATE.to_string() } else { state };
        }
        if let Some(identifier) = identifier {
            sprite.identifier = identifier;
        }
        if let Some(rect) = source_rect {
            sprite.source_rect = rect;
        }
        if let Some(origin) = origin {
            sprite.origin = origin;
        }
        if let Some(image_ref) = image_ref {
            sprite.image_ref = image_ref;
        }
        if let Some(xml) = xml {
            sprite.xml = xml;
        }
        let dirty_file = if touches_geometry { sprite.xml_file().map(str::to_string) } else { None };
        if let Some(file) = dirty_file {
            self.modified_files.insert(file);
        }
        true
    }

    /// Removes the sprite and every component attached to it. The backing XML element is left alone.
    pub fn delete(&mut self, id: SpriteId) -> Option<Sprite> {
        let index = self.sprites.iter().position(|sprite| sprite.id == id)?;
        let removed = self.sprites.remove(index);
        self.components.retain(|component| component.sprite_id != id);
        if self.selected == Some(id) {
            self.selected = None;
        }
        Some(removed)
    }

    pub fn add_component(
        &mut self,
        sprite_id: SpriteId,
        kind: impl Into<String>,
        properties: PropertyBag,
    ) -> Option<ComponentId> {
        if !self.contains(sprite_id) {
            return None;
        }
        let id = ComponentId::new();
        self.components.push(Component { id, sprite_id, kind: kind.into(), properties });
        Some(id)
    }

    /// Merges `properties` into the component's bag.
    pub fn update_component<I, K, V>(&mut self, id: ComponentId, properties: I) -> bool
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let Some(component) = self.components.iter_mut().find(|component| component.id == id) else {
            return false;
        };
        for (key, value) in properties {
            component.properties.set(key, value);
        }
        true
    }

    pub fn delete_component(&mut self, id: ComponentId) -> bool {
        let before = self.components.len();
        self.components.retain(|component| component.id != id);
        self.components.len() != before
    }

    pub fn list_components(&self, sprite_id: SpriteId) -> Vec<&Component> {
        self.components.iter().filter(|component| component.sprite_id == sprite_id).collect()
    }

    pub fn components_of_type(&self, kind: &str) -> Vec<&Component> {
        self.components.iter().filter(|component| component.kind == kind).collect()
    }

    pub fn components(&self) -> &[Component] {
        &self.components
    }

    /// Returns true when the selection changed. Unknown ids are ignored.
    pub fn select(&mut self, id: SpriteId) -> bool {
        if !self.contains(id) || self.selected == Some(id) {
            return false;
        }
        self.selected = Some(id);
        true
    }

    pub fn clear_selection(&mut self) -> bool {
        self.selected.take().is_some()
    }

    pub fn selected(&self) -> Option<SpriteId> {
        self.selected
    }

    pub fn selected_sprite(&self) -> Option<&Sprite> {
        self.selected.and_then(|id| self.get(id))
    }

    pub fn modified_files(&self) -> &BTreeSet<String> {
        &self.modified_files
    }

    pub fn is_modified(&self, file: &str) -> bool {
        self.modified_files.contains(file)
    }

    pub fn mark_modified(&mut self, file: impl Into<String>) {
        self.modified_files.insert(file.into());
    }

    pub fn mark_saved(&mut self, file: &str) -> bool {
        self.modified_files.remove(file)
    }

    /// Points every sprite backed by `file` at the latest synchronized text.
    pub fn refresh_snapshots(&mut self, file: &str, text: &Arc<str>) {
        for sprite in &mut self.sprites {
            if let Some(binding) = sprite.xml.as_mut().filter(|binding| binding.file == file) {
                binding.snapshot = Arc::clone(text);
            }
        }
    }

    pub fn sprites_with_image<'a>(&'a self, image: &'a ImageKey) -> impl Iterator<Item = &'a Sprite> + 'a {
        self.sprites.iter().filter(move |sprite| sprite.image_ref.as_ref() == Some(image))
    }

    pub fn reset(&mut self) {
        self.sprites.clear();
        self.components.clear();
        self.selected = None;
        self.modified_files.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn xml_sprite(file: &str) -> Sprite {
        let mut sprite = Sprite::new("wrench", Rect::new(0, 0, 32, 32));
        sprite.identifier = Some("wrench".to_string());
        sprite.xml = Some(XmlBinding::new(file, Arc::from("<Items/>")));
        sprite
    }

    #[test]
    fn geometry_update_marks_backing_file_modified() {
        let mut registry = SpriteRegistry::new();
        let id = registry.add(xml_sprite("items.xml"));
        assert!(registry.update(id, SpriteUpdate { name: Some("Wrench".into()), ..Default::default() }));
        assert!(registry.modified_files().is_empty(), "name edits do not dirty the document");
        assert!(registry.update(id, SpriteUpdate::geometry(Rect::new(0, 0, 40, 40), Origin::default())));
        assert!(registry.is_modified("items.xml"));
        assert!(registry.mark_saved("items.xml"));
        assert!(!registry.is_modified("items.xml"));
    }

    #[test]
    fn drawn_sprites_never_dirty_files() {
        let mut registry = SpriteRegistry::new();
        let id = registry.add(Sprite::new(registry.next_drawn_name(), Rect::new(1, 1, 20, 20)));
        assert!(registry.update(id, SpriteUpdate::geometry(Rect::new(2, 2, 20, 20), Origin::new(0.1, 0.1))));
        assert!(registry.modified_files().is_empty());
        assert_eq!(registry.get(id).expect("sprite").name, "Sprite_1");
    }

    #[test]
    fn delete_cascades_components_and_clears_selection() {
        let mut registry = SpriteRegistry::new();
        let keep = registry.add(xml_sprite("a.xml"));
        let gone = registry.add(xml_sprite("a.xml"));
        registry.add_component(keep, "Holdable", PropertyBag::new()).expect("component on keep");
        registry
            .add_component(gone, "Holdable", [("slots", "Any")].into_iter().collect())
            .expect("component on gone");
        assert!(registry.select(gone));
        registry.delete(gone).expect("sprite removed");
        assert_eq!(registry.selected(), None);
        assert!(registry.list_components(gone).is_empty());
        assert_eq!(registry.components_of_type("Holdable").len(), 1);
        assert!(registry.delete(gone).is_none());
    }

    #[test]
    fn components_require_a_live_sprite_and_merge_updates() {
        let mut registry = SpriteRegistry::new();
        assert!(registry.add_component(SpriteId::new(), "Gun", PropertyBag::new()).is_none());
        let sprite = registry.add(xml_sprite("a.xml"));
        let component = registry
            .add_component(sprite, "Gun", [("damage", "10"), ("range", "500")].into_iter().collect())
            .expect("component");
        assert!(registry.update_component(component, [("damage", "12"), ("firerate", "0.1")]));
        let stored = registry.list_components(sprite)[0];
        let keys: Vec<_> = stored.properties.iter().collect();
        assert_eq!(keys, vec![("damage", "12"), ("range", "500"), ("firerate", "0.1")]);
        assert!(registry.delete_component(component));
        assert!(!registry.delete_component(component));
    }

    #[test]
    fn selection_is_single_and_ignores_unknown_ids() {
        let mut registry = SpriteRegistry::new();
        let a = registry.add(Sprite::new("a", Rect::new(0, 0, 10, 10)));
        let b = registry.add(Sprite::new("b", Rect::new(0, 0, 10, 10)));
        assert!(registry.select(a));
        assert!(!registry.select(a));
        assert!(registry.select(b));
        assert_eq!(registry.selected(), Some(b));
        assert!(!registry.select(SpriteId::new()));
        assert_eq!(registry.selected(), Some(b));
        assert!(registry.clear_selection());
        assert!(!registry.clear_selection());
    }

    #[test]
    fn refresh_snapshots_touches_only_matching_file() {
        let mut registry = SpriteRegistry::new();
        let a = registry.add(xml_sprite("a.xml"));
        let b = registry.add(xml_sprite("b.xml"));
        let text: Arc<str> = Arc::from("<Items><Item/></Items>");
        registry.refresh_snapshots("a.xml", &text);
        assert_eq!(&*registry.get(a).and_then(|s| s.xml.as_ref()).expect("binding").snapshot, &*text);
        assert_eq!(&*registry.get(b).and_then(|s| s.xml.as_ref()).expect("binding").snapshot, "<Items/>");
    }

    #[test]
    fn empty_state_update_falls_back_to_default() {
        let mut registry = SpriteRegistry::new();
        let id = registry.add(Sprite::new("a", Rect::new(0, 0, 10, 10)));
        registry.update(id, SpriteUpdate { state: Some(String::new()), ..Default::default() });
        assert_eq!(registry.get(id).expect("sprite").state, DEFAULT_STATE);
        assert!(registry.find_by_key("missing", None).is_none());
    }
}
