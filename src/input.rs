//! Pointer Input
//!
//! Converts device pixel positions into the two spaces the scene uses:
//!
//! - **screen space**: the canvas centre is the origin, the shorter canvas
//!   axis spans `[-1, 1]` and y points up; taps are hit-tested here
//! - **view space**: screen space seen through the [`ViewMatrix`] (zoom and
//!   pan); drag positions are reported here

use glam::{Mat4, Vec2, Vec3};

use crate::config::ViewportConfig;

/// Zoom and pan of the stage, limited by the viewport configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewMatrix {
    scale: f32,
    translate: Vec2,
    screen_min: Vec2,
    screen_max: Vec2,
    min_scale: f32,
    max_scale: f32,
}

impl Default for ViewMatrix {
    fn default() -> Self {
        Self {
            scale: 1.0,
            translate: Vec2::ZERO,
            screen_min: Vec2::splat(-1.0),
            screen_max: Vec2::splat(1.0),
            min_scale: 0.8,
            max_scale: 2.0,
        }
    }
}

impl ViewMatrix {
    pub fn set_screen_rect(&mut self, left: f32, right: f32, bottom: f32, top: f32) {
        self.screen_min = Vec2::new(left, bottom);
        self.screen_max = Vec2::new(right, top);
    }

    pub fn set_scale_limits(&mut self, min: f32, max: f32) {
        self.min_scale = min;
        self.max_scale = max;
    }

    /// Sets the zoom, clamped to the scale limits.
    pub fn set_scale(&mut self, scale: f32) {
        self.scale = scale.clamp(self.min_scale, self.max_scale);
    }

    /// Visible screen rect as `(min, max)` corners.
    #[must_use]
    pub fn screen_rect(&self) -> (Vec2, Vec2) {
        (self.screen_min, self.screen_max)
    }

    #[inline]
    #[must_use]
    pub fn scale(&self) -> f32 {
        self.scale
    }

    #[inline]
    #[must_use]
    pub fn translation(&self) -> Vec2 {
        self.translate
    }

    #[inline]
    #[must_use]
    pub fn transform_x(&self, x: f32) -> f32 {
        self.scale * x + self.translate.x
    }

    #[inline]
    #[must_use]
    pub fn transform_y(&self, y: f32) -> f32 {
        self.scale * y + self.translate.y
    }

    #[inline]
    #[must_use]
    pub fn invert_transform_x(&self, x: f32) -> f32 {
        (x - self.translate.x) / self.scale
    }

    #[inline]
    #[must_use]
    pub fn invert_transform_y(&self, y: f32) -> f32 {
        (y - self.translate.y) / self.scale
    }

    #[must_use]
    pub fn to_mat4(&self) -> Mat4 {
        Mat4::from_translation(self.translate.extend(0.0)) * Mat4::from_scale(Vec3::new(self.scale, self.scale, 1.0))
    }
}

/// Pointer state of the stage canvas.
#[derive(Debug, Clone, Default)]
pub struct PointerInput {
    /// Device → screen: `screen = (device - offset) * scale`.
    device_scale: Vec2,
    device_offset: Vec2,
    view: ViewMatrix,
    pressed: bool,
    position: Vec2,
}

impl PointerInput {
    #[must_use]
    pub fn new(width: u32, height: u32, viewport: &ViewportConfig) -> Self {
        let mut input = Self::default();
        input.initialize(width, height, viewport);
        input
    }

    /// Recomputes both transforms for a canvas of `width` × `height` pixels.
    pub fn initialize(&mut self, width: u32, height: u32, viewport: &ViewportConfig) {
        let w = width.max(1) as f32;
        let h = height.max(1) as f32;

        let ratio = w / h;
        let (left, right) = (-ratio, ratio);
        let (bottom, top) = (viewport.logical_bottom, viewport.logical_top);

        let mut view = ViewMatrix::default();
        view.set_screen_rect(left, right, bottom, top);
        view.set_scale_limits(viewport.min_scale, viewport.max_scale);
        view.set_scale(viewport.initial_scale);
        self.view = view;

        let unit = if w > h {
            (right - left).abs() / w
        } else {
            (top - bottom).abs() / h
        };
        self.device_scale = Vec2::new(unit, -unit);
        self.device_offset = Vec2::new(w * 0.5, h * 0.5);
    }

    #[must_use]
    pub fn view(&self) -> &ViewMatrix {
        &self.view
    }

    pub fn view_mut(&mut self) -> &mut ViewMatrix {
        &mut self.view
    }

    #[must_use]
    pub fn is_pressed(&self) -> bool {
        self.pressed
    }

    /// Last pointer position in device pixels.
    #[must_use]
    pub fn position(&self) -> Vec2 {
        self.position
    }

    pub fn press(&mut self, x: f32, y: f32) {
        self.pressed = true;
        self.position = Vec2::new(x, y);
    }

    pub fn move_to(&mut self, x: f32, y: f32) {
        self.position = Vec2::new(x, y);
    }

    pub fn release(&mut self, x: f32, y: f32) {
        self.pressed = false;
        self.position = Vec2::new(x, y);
    }

    #[must_use]
    pub fn device_to_screen(&self, device: Vec2) -> Vec2 {
        (device - self.device_offset) * self.device_scale
    }

    #[must_use]
    pub fn device_to_view(&self, device: Vec2) -> Vec2 {
        let screen = self.device_to_screen(device);
        Vec2::new(
            self.view.invert_transform_x(screen.x),
            self.view.invert_transform_y(screen.y),
        )
    }
}
