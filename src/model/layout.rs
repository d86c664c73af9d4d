use glam::{Mat4, Vec2, Vec3};

use crate::model::settings::Layout;

/// Places a model's canvas in view space.
///
/// A uniform scale plus a translation. The canvas starts scaled to a height
/// of 2 units, the full vertical extent of the view.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelMatrix {
    width: f32,
    height: f32,
    scale: Vec2,
    translate: Vec2,
}

impl ModelMatrix {
    #[must_use]
    pub fn new(canvas_width: f32, canvas_height: f32) -> Self {
        let mut matrix = Self {
            width: canvas_width,
            height: canvas_height,
            scale: Vec2::ONE,
            translate: Vec2::ZERO,
        };
        matrix.set_height(2.0);
        matrix
    }

    #[inline]
    #[must_use]
    pub fn scale(&self) -> Vec2 {
        self.scale
    }

    #[inline]
    #[must_use]
    pub fn translation(&self) -> Vec2 {
        self.translate
    }

    /// Scales uniformly so the canvas spans `w` units horizontally.
    pub fn set_width(&mut self, w: f32) {
        let s = w / self.width;
        self.scale = Vec2::splat(s);
    }

    /// Scales uniformly so the canvas spans `h` units vertically.
    pub fn set_height(&mut self, h: f32) {
        let s = h / self.height;
        self.scale = Vec2::splat(s);
    }

    pub fn set_position(&mut self, x: f32, y: f32) {
        self.translate = Vec2::new(x, y);
    }

    pub fn set_center_position(&mut self, x: f32, y: f32) {
        self.center_x(x);
        self.center_y(y);
    }

    pub fn set_x(&mut self, x: f32) {
        self.translate.x = x;
    }

    pub fn set_y(&mut self, y: f32) {
        self.translate.y = y;
    }

    pub fn center_x(&mut self, x: f32) {
        let w = self.width * self.scale.x;
        self.translate.x = x - w / 2.0;
    }

    pub fn center_y(&mut self, y: f32) {
        let h = self.height * self.scale.y;
        self.translate.y = y - h / 2.0;
    }

    pub fn top(&mut self, y: f32) {
        self.set_y(y);
    }

    pub fn bottom(&mut self, y: f32) {
        let h = self.height * self.scale.y;
        self.translate.y = y - h;
    }

    pub fn left(&mut self, x: f32) {
        self.set_x(x);
    }

    pub fn right(&mut self, x: f32) {
        let w = self.width * self.scale.x;
        self.translate.x = x - w;
    }

    /// Applies a settings `Layout` object. Keys are matched ignoring case and
    /// underscores, so `CenterX` and `center_x` are equivalent. Size keys are
    /// applied before position keys; within each pass keys apply in document
    /// order, so a later key wins.
    pub fn setup_from_layout(&mut self, layout: &Layout) {
        let normalized: Vec<(String, f32)> = layout
            .entries()
            .iter()
            .map(|(k, v)| (k.replace('_', "").to_ascii_lowercase(), *v))
            .collect();

        for (key, value) in &normalized {
            match key.as_str() {
                "width" => self.set_width(*value),
                "height" => self.set_height(*value),
                _ => {}
            }
        }

        for (key, value) in &normalized {
            match key.as_str() {
                "x" => self.set_x(*value),
                "y" => self.set_y(*value),
                "centerx" => self.center_x(*value),
                "centery" => self.center_y(*value),
                "top" => self.top(*value),
                "bottom" => self.bottom(*value),
                "left" => self.left(*value),
                "right" => self.right(*value),
                "width" | "height" => {}
                other => log::debug!("Ignoring unknown layout key '{other}'"),
            }
        }
    }

    #[inline]
    #[must_use]
    pub fn transform(&self, point: Vec2) -> Vec2 {
        point * self.scale + self.translate
    }

    #[inline]
    #[must_use]
    pub fn invert_transform_x(&self, x: f32) -> f32 {
        (x - self.translate.x) / self.scale.x
    }

    #[inline]
    #[must_use]
    pub fn invert_transform_y(&self, y: f32) -> f32 {
        (y - self.translate.y) / self.scale.y
    }

    #[must_use]
    pub fn to_mat4(&self) -> Mat4 {
        Mat4::from_translation(self.translate.extend(0.0)) * Mat4::from_scale(Vec3::new(self.scale.x, self.scale.y, 1.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-5
    }

    #[test]
    fn starts_two_units_tall() {
        let m = ModelMatrix::new(4.0, 5.0);
        assert!(approx(m.scale().y, 0.4));
        assert!(approx(m.scale().x, 0.4));
    }

    #[test]
    fn layout_applies_size_before_position() {
        let mut m = ModelMatrix::new(2.0, 2.0);
        let layout = Layout(vec![
            ("CenterX".to_string(), 0.0),
            ("center_y".to_string(), 0.5),
            ("Width".to_string(), 1.0),
        ]);
        m.setup_from_layout(&layout);

        assert!(approx(m.scale().x, 0.5));
        // Canvas is 1 unit wide after scaling, so centering at 0 shifts by -0.5.
        assert!(approx(m.translation().x, -0.5));
        assert!(approx(m.translation().y, 0.0));
    }

    #[test]
    fn later_size_key_wins() {
        let width_then_height = Layout(vec![("Width".to_string(), 2.0), ("Height".to_string(), 4.0)]);
        let height_then_width = Layout(vec![("Height".to_string(), 4.0), ("Width".to_string(), 2.0)]);

        for _ in 0..20 {
            let mut m = ModelMatrix::new(1.0, 1.0);
            m.setup_from_layout(&width_then_height);
            assert!(approx(m.scale().x, 4.0));

            let mut m = ModelMatrix::new(1.0, 1.0);
            m.setup_from_layout(&height_then_width);
            assert!(approx(m.scale().x, 2.0));
        }
    }

    #[test]
    fn later_position_key_wins() {
        let mut m = ModelMatrix::new(2.0, 2.0);
        m.setup_from_layout(&Layout(vec![("Y".to_string(), 0.5), ("CenterY".to_string(), 0.0)]));
        // Canvas is 2 units tall, so centring on 0 puts its origin at -1.
        assert!(approx(m.translation().y, -1.0));

        let mut m = ModelMatrix::new(2.0, 2.0);
        m.setup_from_layout(&Layout(vec![("CenterY".to_string(), 0.0), ("Y".to_string(), 0.5)]));
        assert!(approx(m.translation().y, 0.5));
    }

    #[test]
    fn inverse_undoes_transform() {
        let mut m = ModelMatrix::new(3.0, 4.0);
        m.set_position(0.25, -0.75);
        let p = Vec2::new(0.3, 0.6);
        let q = m.transform(p);
        assert!(approx(m.invert_transform_x(q.x), p.x));
        assert!(approx(m.invert_transform_y(q.y), p.y));

        let via_mat = m.to_mat4().transform_point3(p.extend(0.0));
        assert!(approx(via_mat.x, q.x) && approx(via_mat.y, q.y));
    }

    #[test]
    fn edges_anchor_the_canvas() {
        let mut m = ModelMatrix::new(2.0, 2.0);
        m.bottom(-1.0);
        m.right(1.0);
        assert!(approx(m.translation().y, -3.0));
        assert!(approx(m.translation().x, -1.0));
    }
}
