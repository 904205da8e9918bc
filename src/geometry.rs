use glam::Vec2;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub const DEFAULT_ORIGIN: Origin = Origin { x: 0.5, y: 0.5 };
pub const DEFAULT_STATE: &str = "Normal";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GeometryParseError {
    #[error("'{attr}' expects {expected} comma-separated values, found {found}")]
    WrongArity { attr: &'static str, expected: usize, found: usize },
    #[error("'{attr}' has a non-numeric component '{value}'")]
    InvalidNumber { attr: &'static str, value: String },
}

/// Integer crop rectangle in source (native image pixel) space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self { x, y, width, height }
    }

    pub fn meets_min_size(&self, min_size: i32) -> bool {
        self.width >= min_size && self.height >= min_size
    }

    pub fn to_rect_f(self) -> RectF {
        RectF {
            min: Vec2::new(self.x as f32, self.y as f32),
            size: Vec2::new(self.width as f32, self.height as f32),
        }
    }

    pub fn to_attribute(&self) -> String {
        format!("{},{},{},{}", self.x, self.y, self.width, self.height)
    }

    pub fn parse_attribute(raw: &str) -> Result<Self, GeometryParseError> {
        let parts = split_components(raw);
        if parts.len() != 4 {
            return Err(GeometryParseError::WrongArity { attr: "sourcerect", expected: 4, found: parts.len() });
        }
        let mut values = [0_i32; 4];
        for (slot, part) in values.iter_mut().zip(parts) {
            *slot = parse_integral(part)
                .ok_or_else(|| GeometryParseError::InvalidNumber { attr: "sourcerect", value: part.to_string() })?;
        }
        Ok(Rect::new(values[0], values[1], values[2], values[3]))
    }
}

impl fmt::Display for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{},{},{}x{}}}", self.x, self.y, self.width, self.height)
    }
}

/// Floating rectangle used while a gesture is in flight. `size` is never negative.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RectF {
    pub min: Vec2,
    pub size: Vec2,
}

impl RectF {
    pub fn new(min: Vec2, size: Vec2) -> Self {
        Self { min, size: size.abs() }
    }

    pub fn from_corners(a: Vec2, b: Vec2) -> Self {
        Self { min: a.min(b), size: (b - a).abs() }
    }

    pub fn max(&self) -> Vec2 {
        self.min + self.size
    }

    pub fn contains(&self, point: Vec2) -> bool {
        let max = self.max();
        point.x >= self.min.x && point.x <= max.x && point.y >= self.min.y && point.y <= max.y
    }

    /// Per-component rounding; the only place fractional geometry becomes integral.
    pub fn round(&self) -> Rect {
        Rect::new(
            self.min.x.round() as i32,
            self.min.y.round() as i32,
            self.size.x.round() as i32,
            self.size.y.round() as i32,
        )
    }
}

/// Pivot normalized to the owning rectangle; both components live in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Origin {
    pub x: f32,
    pub y: f32,
}

impl Default for Origin {
    fn default() -> Self {
        DEFAULT_ORIGIN
    }
}

impl Origin {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x: clamp_unit(x), y: clamp_unit(y) }
    }

    pub fn from_pointer(rect: RectF, pointer: Vec2) -> Self {
        let fraction = |offset: f32, extent: f32| if extent > f32::EPSILON { offset / extent } else { 0.5 };
        Self::new(fraction(pointer.x - rect.min.x, rect.size.x), fraction(pointer.y - rect.min.y, rect.size.y))
    }

    pub fn point_in(&self, rect: RectF) -> Vec2 {
        rect.min + rect.size * Vec2::new(self.x, self.y)
    }

    pub fn to_attribute(&self) -> String {
        format!("{:.2},{:.2}", self.x, self.y)
    }

    /// Equality at the precision the attribute is written with.
    pub fn same_as_written(&self, other: &Origin) -> bool {
        self.to_attribute() == other.to_attribute()
    }

    pub fn parse_attribute(raw: &str) -> Result<Self, GeometryParseError> {
        let parts = split_components(raw);
        if parts.len() != 2 {
            return Err(GeometryParseError::WrongArity { attr: "origin", expected: 2, found: parts.len() });
        }
        let parse = |part: &str| {
            part.parse::<f32>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| GeometryParseError::InvalidNumber { attr: "origin", value: part.to_string() })
        };
        Ok(Origin::new(parse(parts[0])?, parse(parts[1])?))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

impl ImageSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn as_vec2(&self) -> Vec2 {
        Vec2::new(self.width as f32, self.height as f32)
    }

    pub fn bounds(&self) -> RectF {
        RectF::new(Vec2::ZERO, self.as_vec2())
    }

    pub fn clamp_point(&self, point: Vec2) -> Vec2 {
        point.clamp(Vec2::ZERO, self.as_vec2())
    }
}

pub fn is_default_state(state: &str) -> bool {
    state.is_empty() || state == DEFAULT_STATE
}

fn clamp_unit(value: f32) -> f32 {
    if !value.is_finite() {
        0.5
    } else if value <= 0.0 {
        // -0.0 lands here too.
        0.0
    } else {
        value.min(1.0)
    }
}

fn split_components(raw: &str) -> Vec<&str> {
    raw.split(',').map(str::trim).collect()
}

fn parse_integral(part: &str) -> Option<i32> {
    if let Ok(value) = part.parse::<i32>() {
        return Some(value);
    }
    // Hand-edited files occasionally carry "32.0".
    let value = part.parse::<f64>().ok()?;
    if value.is_finite() && value.fract() == 0.0 && value.abs() <= i32::MAX as f64 {
        Some(value as i32)
    } else {
        None
    }
}
