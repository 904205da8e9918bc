use bitflags::bitflags;
use glam::Vec2;

use crate::camera::CanvasCamera;
use crate::config::EditorConfig;
use crate::geometry::{ImageSize, Origin, Rect, RectF};
use crate::registry::SpriteId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tool {
    #[default]
    Select,
    Draw,
    Origin,
}

bitflags! {
    /// Rectangle edges grabbed by a resize handle. Corners set two bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ResizeEdges: u8 {
        const LEFT = 0b0001;
        const RIGHT = 0b0010;
        const TOP = 0b0100;
        const BOTTOM = 0b1000;
    }
}

/// A sprite drawn on the active canvas, as the controller sees it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CanvasSprite {
    pub id: SpriteId,
    pub rect: Rect,
    pub origin: Origin,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum DragState {
    #[default]
    Idle,
    Drawing {
        start: Vec2,
        current: RectF,
    },
    Moving {
        sprite: SpriteId,
        start: Rect,
        origin: Origin,
        grab: Vec2,
        current: RectF,
    },
    Resizing {
        sprite: SpriteId,
        edges: ResizeEdges,
        start: Rect,
        origin: Origin,
        current: RectF,
    },
    MovingOrigin {
        sprite: SpriteId,
        rect: Rect,
        start: Origin,
        current: Origin,
    },
}

impl DragState {
    pub fn is_idle(&self) -> bool {
        matches!(self, DragState::Idle)
    }

    /// In-flight geometry for rendering, in source space.
    pub fn preview(&self) -> Option<(RectF, Option<Origin>)> {
        match *self {
            DragState::Idle => None,
            DragState::Drawing { current, .. } => Some((current, None)),
            DragState::Moving { current, .. } | DragState::Resizing { current, .. } => Some((current, None)),
            DragState::MovingOrigin { rect, current, .. } => Some((rect.to_rect_f(), Some(current))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PressOutcome {
    /// No stage fit yet; the press did nothing.
    Ignored,
    Selected(SpriteId),
    SelectionCleared,
    DrawStarted,
    HandleGrabbed,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GestureOutcome {
    Idle,
    Created { rect: Rect },
    Committed { sprite: SpriteId, rect: Rect, origin: Origin },
    NoChange,
    Cancelled { reason: &'static str },
    Rejected { reason: &'static str },
}

#[derive(Debug, Clone)]
pub struct InteractionController {
    tool: Tool,
    drag: DragState,
    min_size: i32,
    handle_radius_px: f32,
    origin_handle_radius_px: f32,
}

impl InteractionController {
    pub fn new(editor: &EditorConfig) -> Self {
        Self {
            tool: Tool::default(),
            drag: DragState::Idle,
            min_size: editor.min_sprite_size.max(1),
            handle_radius_px: editor.handle_radius_px.max(0.0),
            origin_handle_radius_px: editor.origin_handle_radius_px.max(0.0),
        }
    }

    pub fn tool(&self) -> Tool {
        self.tool
    }

    /// Switching tools abandons any gesture in flight.
    pub fn set_tool(&mut self, tool: Tool) {
        if self.tool != tool {
            self.cancel();
            self.tool = tool;
        }
    }

    pub fn drag(&self) -> &DragState {
        &self.drag
    }

    pub fn cancel(&mut self) {
        self.drag = DragState::Idle;
    }

    /// Sprites are hit back to front; `sprites` is in draw order.
    pub fn pointer_down(
        &mut self,
        camera: &CanvasCamera,
        view: Vec2,
        sprites: &[CanvasSprite],
        selected: Option<SpriteId>,
    ) -> PressOutcome {
        self.drag = DragState::Idle;
        let Some(pointer) = camera.pointer_to_source(view) else {
            return PressOutcome::Ignored;
        };
        let selected = selected.and_then(|id| sprites.iter().find(|sprite| sprite.id == id));

        if let Some(sprite) = selected {
            if self.over_origin_handle(camera, sprite, view) {
                self.drag = DragState::MovingOrigin {
                    sprite: sprite.id,
                    rect: sprite.rect,
                    start: sprite.origin,
                    current: sprite.origin,
                };
                return PressOutcome::HandleGrabbed;
            }
            if self.tool == Tool::Select {
                if let Some(edges) = self.resize_edges(camera, sprite.rect, view) {
                    self.drag = DragState::Resizing {
                        sprite: sprite.id,
                        edges,
                        start: sprite.rect,
                        origin: sprite.origin,
                        current: sprite.rect.to_rect_f(),
                    };
                    return PressOutcome::HandleGrabbed;
                }
            }
            if self.tool == Tool::Origin && sprite.rect.to_rect_f().contains(pointer) {
                self.drag = DragState::MovingOrigin {
                    sprite: sprite.id,
                    rect: sprite.rect,
                    start: sprite.origin,
                    current: Origin::from_pointer(sprite.rect.to_rect_f(), pointer),
                };
                return PressOutcome::HandleGrabbed;
            }
        }

        if let Some(hit) = sprites.iter().rev().find(|sprite| sprite.rect.to_rect_f().contains(pointer)) {
            if self.tool == Tool::Select {
                let start = hit.rect.to_rect_f();
                self.drag = DragState::Moving {
                    sprite: hit.id,
                    start: hit.rect,
                    origin: hit.origin,
                    grab: pointer - start.min,
                    current: start,
                };
            }
            return PressOutcome::Selected(hit.id);
        }

        if self.tool == Tool::Draw {
            self.drag = DragState::Drawing { start: pointer, current: RectF::from_corners(pointer, pointer) };
            return PressOutcome::DrawStarted;
        }
        PressOutcome::SelectionCleared
    }

    /// Returns the in-flight source rectangle, if any.
    pub fn pointer_move(&mut self, camera: &CanvasCamera, view: Vec2) -> Option<RectF> {
        let pointer = camera.pointer_to_source(view)?;
        let image = camera.image_size()?;
        match &mut self.drag {
            DragState::Idle => return None,
            DragState::Drawing { start, current } => *current = RectF::from_corners(*start, pointer),
            DragState::Moving { grab, current, .. } => *current = moved_rect(*current, pointer - *grab, image),
            DragState::Resizing { edges, start, current, .. } => *current = resized_rect(*start, *edges, pointer),
            DragState::MovingOrigin { rect, current, .. } => {
                *current = Origin::from_pointer(rect.to_rect_f(), pointer);
            }
        }
        self.drag.preview().map(|(rect, _)| rect)
    }

    pub fn pointer_up(&mut self, camera: &CanvasCamera, view: Vec2) -> GestureOutcome {
        self.pointer_move(camera, view);
        let drag = std::mem::take(&mut self.drag);
        match drag {
            DragState::Idle => GestureOutcome::Idle,
            DragState::Drawing { current, .. } => {
                if !self.meets_min_size(current) {
                    return GestureOutcome::Cancelled { reason: "drawn rectangle is below the minimum size" };
                }
                GestureOutcome::Created { rect: CanvasCamera::commit_rect(current) }
            }
            DragState::Moving { sprite, start, origin, current, .. } => {
                let rect = CanvasCamera::commit_rect(current);
                if rect == start {
                    GestureOutcome::NoChange
                } else {
                    GestureOutcome::Committed { sprite, rect, origin }
                }
            }
            DragState::Resizing { sprite, start, origin, current, .. } => {
                if !self.meets_min_size(current) {
                    return GestureOutcome::Rejected { reason: "resized rectangle is below the minimum size" };
                }
                let rect = CanvasCamera::commit_rect(current);
                if rect == start {
                    GestureOutcome::NoChange
                } else {
                    GestureOutcome::Committed { sprite, rect, origin }
                }
            }
            DragState::MovingOrigin { sprite, rect, start, current } => {
                if current.same_as_written(&start) {
                    GestureOutcome::NoChange
                } else {
                    GestureOutcome::Committed { sprite, rect, origin: current }
                }
            }
        }
    }

    /// Checked on the unrounded source-space size, before the commit rounds it.
    fn meets_min_size(&self, rect: RectF) -> bool {
        let min = self.min_size as f32;
        rect.size.x >= min && rect.size.y >= min
    }

    fn over_origin_handle(&self, camera: &CanvasCamera, sprite: &CanvasSprite, view: Vec2) -> bool {
        camera
            .to_view(sprite.origin.point_in(sprite.rect.to_rect_f()))
            .is_some_and(|handle| handle.distance(view) <= self.origin_handle_radius_px)
    }

    fn resize_edges(&self, camera: &CanvasCamera, rect: Rect, view: Vec2) -> Option<ResizeEdges> {
        let bounds = camera.rect_to_view(rect)?;
        let r = self.handle_radius_px;
        let max = bounds.max();
        let within_y = view.y >= bounds.min.y - r && view.y <= max.y + r;
        let within_x = view.x >= bounds.min.x - r && view.x <= max.x + r;
        let mut edges = ResizeEdges::empty();
        if within_y && (view.x - bounds.min.x).abs() <= r {
            edges |= ResizeEdges::LEFT;
        } else if within_y && (view.x - max.x).abs() <= r {
            edges |= ResizeEdges::RIGHT;
        }
        if within_x && (view.y - bounds.min.y).abs() <= r {
            edges |= ResizeEdges::TOP;
        } else if within_x && (view.y - max.y).abs() <= r {
            edges |= ResizeEdges::BOTTOM;
        }
        (!edges.is_empty()).then_some(edges)
    }
}

/// Translates `rect` to `min` while keeping it inside the image.
fn moved_rect(rect: RectF, min: Vec2, image: ImageSize) -> RectF {
    let limit = (image.as_vec2() - rect.size).max(Vec2::ZERO);
    RectF::new(min.clamp(Vec2::ZERO, limit), rect.size)
}

fn resized_rect(start: Rect, edges: ResizeEdges, pointer: Vec2) -> RectF {
    let start = start.to_rect_f();
    let mut min = start.min;
    let mut max = start.max();
    if edges.contains(ResizeEdges::LEFT) {
        min.x = pointer.x;
    }
    if edges.contains(ResizeEdges::RIGHT) {
        max.x = pointer.x;
    }
    if edges.contains(ResizeEdges::TOP) {
        min.y = pointer.y;
    }
    if edges.contains(ResizeEdges::BOTTOM) {
        max.y = pointer.y;
    }
    RectF::from_corners(min, max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ViewportConfig;

    /// 400x300 image on the default viewport: stage 800x600, two view pixels per source pixel.
    fn camera() -> CanvasCamera {
        let mut camera = CanvasCamera::new(&EditorConfig::default());
        camera.fit_stage(ImageSize::new(400, 300), &ViewportConfig::default()).expect("stage fit");
        camera
    }

    fn sprite(rect: Rect) -> CanvasSprite {
        CanvasSprite { id: SpriteId::new(), rect, origin: Origin::default() }
    }

    #[test]
    fn draw_commits_rounded_rect_above_minimum() {
        let camera = camera();
        let mut controller = InteractionController::new(&EditorConfig::default());
        controller.set_tool(Tool::Draw);
        assert_eq!(controller.pointer_down(&camera, Vec2::new(20.0, 20.0), &[], None), PressOutcome::DrawStarted);
        controller.pointer_move(&camera, Vec2::new(50.0, 90.0));
        let outcome = controller.pointer_up(&camera, Vec2::new(61.0, 101.0));
        assert_eq!(outcome, GestureOutcome::Created { rect: Rect::new(10, 10, 21, 41) });
        assert!(controller.drag().is_idle());
    }

    #[test]
    fn reversed_draw_is_normalized() {
        let camera = camera();
        let mut controller = InteractionController::new(&EditorConfig::default());
        controller.set_tool(Tool::Draw);
        controller.pointer_down(&camera, Vec2::new(100.0, 100.0), &[], None);
        let outcome = controller.pointer_up(&camera, Vec2::new(40.0, 60.0));
        assert_eq!(outcome, GestureOutcome::Created { rect: Rect::new(20, 30, 30, 20) });
    }

    #[test]
    fn small_draws_are_cancelled() {
        let camera = camera();
        let mut controller = InteractionController::new(&EditorConfig::default());
        controller.set_tool(Tool::Draw);
        controller.pointer_down(&camera, Vec2::new(20.0, 20.0), &[], None);
        let outcome = controller.pointer_up(&camera, Vec2::new(200.0, 30.0));
        assert!(matches!(outcome, GestureOutcome::Cancelled { .. }));
    }

    #[test]
    fn draw_tool_press_on_sprite_selects_it() {
        let camera = camera();
        let target = sprite(Rect::new(10, 10, 50, 50));
        let mut controller = InteractionController::new(&EditorConfig::default());
        controller.set_tool(Tool::Draw);
        let outcome = controller.pointer_down(&camera, Vec2::new(60.0, 60.0), &[target], None);
        assert_eq!(outcome, PressOutcome::Selected(target.id));
        assert_eq!(controller.pointer_up(&camera, Vec2::new(90.0, 90.0)), GestureOutcome::Idle);
    }

    #[test]
    fn move_is_clamped_inside_image() {
        let camera = camera();
        let target = sprite(Rect::new(10, 10, 50, 50));
        let mut controller = InteractionController::new(&EditorConfig::default());
        assert_eq!(
            controller.pointer_down(&camera, Vec2::new(60.0, 60.0), &[target], None),
            PressOutcome::Selected(target.id)
        );
        let outcome = controller.pointer_up(&camera, Vec2::new(5000.0, -300.0));
        assert_eq!(
            outcome,
            GestureOutcome::Committed { sprite: target.id, rect: Rect::new(350, 0, 50, 50), origin: Origin::default() }
        );
    }

    #[test]
    fn resize_from_corner_and_reject_when_too_small() {
        let camera = camera();
        let target = sprite(Rect::new(10, 10, 50, 50));
        let mut controller = InteractionController::new(&EditorConfig::default());
        // Bottom-right corner sits at view (120, 120).
        assert_eq!(
            controller.pointer_down(&camera, Vec2::new(118.0, 121.0), &[target], Some(target.id)),
            PressOutcome::HandleGrabbed
        );
        let outcome = controller.pointer_up(&camera, Vec2::new(140.0, 160.0));
        assert_eq!(
            outcome,
            GestureOutcome::Committed { sprite: target.id, rect: Rect::new(10, 10, 60, 70), origin: Origin::default() }
        );

        controller.pointer_down(&camera, Vec2::new(120.0, 120.0), &[target], Some(target.id));
        let outcome = controller.pointer_up(&camera, Vec2::new(30.0, 30.0));
        assert!(matches!(outcome, GestureOutcome::Rejected { .. }));
    }

    #[test]
    fn near_minimum_draw_is_cancelled_before_rounding() {
        let camera = camera();
        let mut controller = InteractionController::new(&EditorConfig::default());
        controller.set_tool(Tool::Draw);
        controller.pointer_down(&camera, Vec2::new(20.0, 20.0), &[], None);
        // 9.6 x 9.6 source units would round up to 10 x 10.
        let outcome = controller.pointer_up(&camera, Vec2::new(39.2, 39.2));
        assert!(matches!(outcome, GestureOutcome::Cancelled { .. }), "got {outcome:?}");

        controller.pointer_down(&camera, Vec2::new(20.0, 20.0), &[], None);
        let outcome = controller.pointer_up(&camera, Vec2::new(40.0, 40.0));
        assert_eq!(outcome, GestureOutcome::Created { rect: Rect::new(10, 10, 10, 10) });
    }

    #[test]
    fn near_minimum_resize_is_rejected_before_rounding() {
        let camera = camera();
        let target = sprite(Rect::new(10, 10, 50, 50));
        let mut controller = InteractionController::new(&EditorConfig::default());
        controller.pointer_down(&camera, Vec2::new(120.0, 120.0), &[target], Some(target.id));
        // 9.5 x 9.5 source units would round up to 10 x 10.
        let outcome = controller.pointer_up(&camera, Vec2::new(39.0, 39.0));
        assert!(matches!(outcome, GestureOutcome::Rejected { .. }), "got {outcome:?}");
    }

    #[test]
    fn origin_handle_drag_clamps_to_rect() {
        let camera = camera();
        let target = sprite(Rect::new(10, 10, 50, 50));
        let mut controller = InteractionController::new(&EditorConfig::default());
        // Origin (0.5, 0.5) of the rect sits at source (35, 35), view (70, 70).
        assert_eq!(
            controller.pointer_down(&camera, Vec2::new(72.0, 69.0), &[target], Some(target.id)),
            PressOutcome::HandleGrabbed
        );
        let outcome = controller.pointer_up(&camera, Vec2::new(0.0, 70.0));
        assert_eq!(
            outcome,
            GestureOutcome::Committed { sprite: target.id, rect: target.rect, origin: Origin::new(0.0, 0.5) }
        );
    }

    #[test]
    fn origin_tool_press_inside_selected_rect_starts_origin_drag() {
        let camera = camera();
        let target = sprite(Rect::new(10, 10, 50, 50));
        let mut controller = InteractionController::new(&EditorConfig::default());
        controller.set_tool(Tool::Origin);
        controller.pointer_down(&camera, Vec2::new(30.0, 30.0), &[target], Some(target.id));
        let outcome = controller.pointer_up(&camera, Vec2::new(30.0, 30.0));
        assert_eq!(
            outcome,
            GestureOutcome::Committed { sprite: target.id, rect: target.rect, origin: Origin::new(0.1, 0.1) }
        );
    }

    #[test]
    fn press_without_stage_is_ignored() {
        let camera = CanvasCamera::new(&EditorConfig::default());
        let mut controller = InteractionController::new(&EditorConfig::default());
        assert_eq!(controller.pointer_down(&camera, Vec2::ZERO, &[], None), PressOutcome::Ignored);
        assert_eq!(controller.pointer_up(&camera, Vec2::ZERO), GestureOutcome::Idle);
    }

    #[test]
    fn empty_canvas_press_clears_selection_outside_draw() {
        let camera = camera();
        let mut controller = InteractionController::new(&EditorConfig::default());
        let outcome = controller.pointer_down(&camera, Vec2::new(500.0, 500.0), &[], None);
        assert_eq!(outcome, PressOutcome::SelectionCleared);
    }
}
