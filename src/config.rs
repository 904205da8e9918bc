use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct ViewportConfig {
    #[serde(default = "ViewportConfig::default_width")]
    pub width: u32,
    #[serde(default = "ViewportConfig::default_height")]
    pub height: u32,
    #[serde(default = "ViewportConfig::default_margin")]
    pub margin: u32,
    #[serde(default = "ViewportConfig::default_stage_floor_width")]
    pub stage_floor_width: u32,
    #[serde(default = "ViewportConfig::default_stage_floor_height")]
    pub stage_floor_height: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EditorConfig {
    #[serde(default = "EditorConfig::default_zoom_min")]
    pub zoom_min: f32,
    #[serde(default = "EditorConfig::default_zoom_max")]
    pub zoom_max: f32,
    #[serde(default = "EditorConfig::default_zoom_step")]
    pub zoom_step: f32,
    #[serde(default = "EditorConfig::default_wheel_step")]
    pub wheel_step: f32,
    #[serde(default = "EditorConfig::default_min_sprite_size")]
    pub min_sprite_size: i32,
    #[serde(default = "EditorConfig::default_handle_radius_px")]
    pub handle_radius_px: f32,
    #[serde(default = "EditorConfig::default_origin_handle_radius_px")]
    pub origin_handle_radius_px: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImportConfig {
    #[serde(default = "ImportConfig::default_component_types")]
    pub component_types: Vec<String>,
    #[serde(default = "ImportConfig::default_image_extensions")]
    pub image_extensions: Vec<String>,
    #[serde(default)]
    pub decode_workers: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ExportConfig {
    #[serde(default)]
    pub mod_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub viewport: ViewportConfig,
    #[serde(default)]
    pub editor: EditorConfig,
    #[serde(default)]
    pub import: ImportConfig,
    #[serde(default)]
    pub export: ExportConfig,
}

#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub viewport_width: Option<u32>,
    pub viewport_height: Option<u32>,
    pub mod_id: Option<String>,
}

impl ViewportConfig {
    const fn default_width() -> u32 {
        800
    }

    const fn default_height() -> u32 {
        600
    }

    const fn default_margin() -> u32 {
        40
    }

    const fn default_stage_floor_width() -> u32 {
        800
    }

    const fn default_stage_floor_height() -> u32 {
        600
    }
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            width: Self::default_width(),
            height: Self::default_height(),
            margin: Self::default_margin(),
            stage_floor_width: Self::default_stage_floor_width(),
            stage_floor_height: Self::default_stage_floor_height(),
        }
    }
}

impl EditorConfig {
    const fn default_zoom_min() -> f32 {
        0.25
    }

    const fn default_zoom_max() -> f32 {
        4.0
    }

    const fn default_zoom_step() -> f32 {
        0.25
    }

    const fn default_wheel_step() -> f32 {
        0.10
    }

    const fn default_min_sprite_size() -> i32 {
        10
    }

    const fn default_handle_radius_px() -> f32 {
        8.0
    }

    const fn default_origin_handle_radius_px() -> f32 {
        6.0
    }
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            zoom_min: Self::default_zoom_min(),
            zoom_max: Self::default_zoom_max(),
            zoom_step: Self::default_zoom_step(),
            wheel_step: Self::default_wheel_step(),
            min_sprite_size: Self::default_min_sprite_size(),
            handle_radius_px: Self::default_handle_radius_px(),
            origin_handle_radius_px: Self::default_origin_handle_radius_px(),
        }
    }
}

impl ImportConfig {
    fn default_component_types() -> Vec<String> {
        [
            "Holdable",
            "Engine",
            "Hull",
            "Gun",
            "Container",
            "Wearable",
            "MeleeWeapon",
            "RangedWeapon",
            "ItemContainer",
            "Medical",
        ]
        .into_iter()
        .map(str::to_string)
        .collect()
    }

    fn default_image_extensions() -> Vec<String> {
        vec!["png".to_string(), "xcf".to_string()]
    }

    pub fn is_component_type(&self, tag: &str) -> bool {
        self.component_types.iter().any(|known| known == tag)
    }

    pub fn is_image_file(&self, filename: &str) -> bool {
        let lower = filename.to_ascii_lowercase();
        self.image_extensions.iter().any(|ext| lower.ends_with(&format!(".{}", ext.to_ascii_lowercase())))
    }
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            component_types: Self::default_component_types(),
            image_extensions: Self::default_image_extensions(),
            decode_workers: None,
        }
    }
}

impl AppConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes =
            fs::read(path).with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut cfg: AppConfig = serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        cfg.sanitize();
        Ok(cfg)
    }

    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        match Self::load(path) {
            Ok(cfg) => cfg,
            Err(err) => {
                log::warn!("[config] load error: {err:?}. Falling back to defaults.");
                Self::default()
            }
        }
    }

    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(width) = overrides.viewport_width {
            self.viewport.width = width;
        }
        if let Some(height) = overrides.viewport_height {
            self.viewport.height = height;
        }
        if let Some(mod_id) = overrides.mod_id.as_ref() {
            self.export.mod_id = Some(mod_id.clone());
        }
        self.sanitize();
    }

    fn sanitize(&mut self) {
        let editor = &mut self.editor;
        if !(editor.zoom_min > 0.0 && editor.zoom_max >= editor.zoom_min) {
            log::warn!(
                "[config] invalid zoom range {}..{}, using defaults",
                editor.zoom_min,
                editor.zoom_max
            );
            editor.zoom_min = EditorConfig::default_zoom_min();
            editor.zoom_max = EditorConfig::default_zoom_max();
        }
        if editor.min_sprite_size < 1 {
            editor.min_sprite_size = 1;
        }
    }
}

impl ConfigOverrides {
    pub fn is_empty(&self) -> bool {
        self.viewport_width.is_none() && self.viewport_height.is_none() && self.mod_id.is_none()
    }

    pub fn applied_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.viewport_width.is_some() {
            fields.push("viewport_width");
        }
        if self.viewport_height.is_some() {
            fields.push("viewport_height");
        }
        if self.mod_id.is_some() {
            fields.push("mod_id");
        }
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn partial_config_falls_back_to_field_defaults() {
        let cfg: AppConfig =
            serde_json::from_str(r#"{ "viewport": { "width": 1280 }, "editor": { "zoom_max": 2.0 } }"#)
                .expect("config parses");
        assert_eq!(cfg.viewport.width, 1280);
        assert_eq!(cfg.viewport.height, 600);
        assert_eq!(cfg.viewport.margin, 40);
        assert!((cfg.editor.zoom_max - 2.0).abs() < f32::EPSILON);
        assert!((cfg.editor.zoom_min - 0.25).abs() < f32::EPSILON);
        assert_eq!(cfg.editor.min_sprite_size, 10);
        assert!(cfg.import.is_component_type("Holdable"));
        assert!(cfg.import.is_component_type("ItemContainer"));
    }

    #[test]
    fn load_sanitizes_inverted_zoom_range() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(file, r#"{{ "editor": {{ "zoom_min": 3.0, "zoom_max": 1.0 }} }}"#).expect("write config");
        let cfg = AppConfig::load(file.path()).expect("config loads");
        assert!((cfg.editor.zoom_min - 0.25).abs() < f32::EPSILON);
        assert!((cfg.editor.zoom_max - 4.0).abs() < f32::EPSILON);
    }

    #[test]
    fn missing_file_uses_defaults() {
        let cfg = AppConfig::load_or_default("definitely/not/here.json");
        assert_eq!(cfg.viewport.width, 800);
    }

    #[test]
    fn overrides_apply_on_top() {
        let mut cfg = AppConfig::default();
        let overrides =
            ConfigOverrides { viewport_width: Some(1024), viewport_height: None, mod_id: Some("tools".into()) };
        cfg.apply_overrides(&overrides);
        assert_eq!(cfg.viewport.width, 1024);
        assert_eq!(cfg.export.mod_id.as_deref(), Some("tools"));
        assert_eq!(overrides.applied_fields(), vec!["viewport_width", "mod_id"]);
    }

    #[test]
    fn image_extension_check_is_case_insensitive() {
        let import = ImportConfig::default();
        assert!(import.is_image_file("Content/Items/Wrench.PNG"));
        assert!(import.is_image_file("art/source.xcf"));
        assert!(!import.is_image_file("Content/Items/wrench.xml"));
    }
}
