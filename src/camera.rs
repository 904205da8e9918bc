use crate::config::{EditorConfig, ViewportConfig};
use crate::geometry::{ImageSize, Rect, RectF};
use glam::Vec2;

/// Source -> stage mapping for one decoded image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StageFit {
    pub image: ImageSize,
    pub stage_size: Vec2,
    /// Stage pixels per source pixel, per axis.
    pub scale: Vec2,
}

impl StageFit {
    pub fn compute(image: ImageSize, viewport: &ViewportConfig) -> Option<Self> {
        if image.is_empty() {
            return None;
        }
        let native = image.as_vec2();
        let budget = Vec2::new(
            viewport.width.saturating_sub(viewport.margin).max(1) as f32,
            viewport.height.saturating_sub(viewport.margin).max(1) as f32,
        );
        let fit = (budget.x / native.x).min(budget.y / native.y).min(1.0);
        let floor = Vec2::new(viewport.stage_floor_width as f32, viewport.stage_floor_height as f32);
        let stage_size = (native * fit).max(floor);
        Some(Self { image, stage_size, scale: stage_size / native })
    }
}

/// Maps between source, stage and view space. Holds no sprite data.
#[derive(Debug, Clone)]
pub struct CanvasCamera {
    pub pan: Vec2,
    zoom: f32,
    zoom_limits: (f32, f32),
    zoom_step: f32,
    wheel_step: f32,
    stage: Option<StageFit>,
}

impl CanvasCamera {
    pub fn new(editor: &EditorConfig) -> Self {
        let mut camera = Self {
            pan: Vec2::ZERO,
            zoom: 1.0,
            zoom_limits: (0.25, 4.0),
            zoom_step: editor.zoom_step,
            wheel_step: editor.wheel_step,
            stage: None,
        };
        camera.set_zoom_limits(editor.zoom_min, editor.zoom_max);
        camera
    }

    pub fn set_zoom_limits(&mut self, min: f32, max: f32) {
        debug_assert!(min > 0.0 && max >= min);
        self.zoom_limits = (min, max);
        self.zoom = self.zoom.clamp(min, max);
    }

    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    pub fn zoom_percent(&self) -> u32 {
        (self.zoom * 100.0).round() as u32
    }

    pub fn set_zoom(&mut self, zoom: f32) {
        if !zoom.is_finite() {
            return;
        }
        let snapped = (zoom * 100.0).round() / 100.0;
        self.zoom = snapped.clamp(self.zoom_limits.0, self.zoom_limits.1);
    }

    pub fn zoom_in(&mut self) {
        self.set_zoom(self.zoom + self.zoom_step);
    }

    pub fn zoom_out(&mut self) {
        self.set_zoom(self.zoom - self.zoom_step);
    }

    /// Positive `delta_y` (scrolling down) zooms out.
    pub fn apply_wheel(&mut self, delta_y: f32) {
        if delta_y.abs() <= f32::EPSILON {
            return;
        }
        let step = if delta_y > 0.0 { -self.wheel_step } else { self.wheel_step };
        self.set_zoom(self.zoom + step);
    }

    pub fn can_zoom_in(&self) -> bool {
        self.zoom < self.zoom_limits.1
    }

    pub fn can_zoom_out(&self) -> bool {
        self.zoom > self.zoom_limits.0
    }

    pub fn fit_to_screen(&mut self) {
        self.set_zoom(1.0);
        self.pan = Vec2::ZERO;
    }

    pub fn pan_by(&mut self, delta_view: Vec2) {
        if delta_view.is_finite() {
            self.pan += delta_view;
        }
    }

    pub fn fit_stage(&mut self, image: ImageSize, viewport: &ViewportConfig) -> Option<StageFit> {
        self.stage = StageFit::compute(image, viewport);
        self.stage
    }

    pub fn clear_stage(&mut self) {
        self.stage = None;
    }

    pub fn stage(&self) -> Option<&StageFit> {
        self.stage.as_ref()
    }

    pub fn is_ready(&self) -> bool {
        self.stage.is_some()
    }

    pub fn image_size(&self) -> Option<ImageSize> {
        self.stage.map(|stage| stage.image)
    }

    /// Total view pixels per source pixel, per axis.
    pub fn view_to_source_scale(&self) -> Option<Vec2> {
        self.stage.map(|stage| stage.scale * self.zoom)
    }

    pub fn to_source(&self, view: Vec2) -> Option<Vec2> {
        let scale = self.view_to_source_scale()?;
        Some((view - self.pan) / scale)
    }

    pub fn to_view(&self, source: Vec2) -> Option<Vec2> {
        let scale = self.view_to_source_scale()?;
        Some(source * scale + self.pan)
    }

    pub fn rect_to_view(&self, rect: Rect) -> Option<RectF> {
        self.rect_f_to_view(rect.to_rect_f())
    }

    pub fn rect_f_to_view(&self, rect: RectF) -> Option<RectF> {
        let scale = self.view_to_source_scale()?;
        Some(RectF::new(rect.min * scale + self.pan, rect.size * scale))
    }

    pub fn rect_to_source(&self, view_rect: RectF) -> Option<RectF> {
        let scale = self.view_to_source_scale()?;
        Some(RectF::new((view_rect.min - self.pan) / scale, view_rect.size / scale))
    }

    pub fn commit_rect(rect: RectF) -> Rect {
        rect.round()
    }

    /// Pointer position in source space, clamped to the image bounds.
    pub fn pointer_to_source(&self, view: Vec2) -> Option<Vec2> {
        let stage = self.stage?;
        let source = self.to_source(view)?;
        Some(stage.image.clamp_point(source))
    }

    pub fn reset(&mut self) {
        self.stage = None;
        self.pan = Vec2::ZERO;
        self.zoom = 1.0_f32.clamp(self.zoom_limits.0, self.zoom_limits.1);
    }
}
