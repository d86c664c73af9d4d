use glam::Vec2;

use crate::animation::parameters::{ids, ParameterBuffer, ParameterId};

/// Pointer drag position in view space, roughly `[-1, 1]` on both axes.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DragState {
    position: Vec2,
}

impl DragState {
    pub fn set(&mut self, x: f32, y: f32) {
        self.position = Vec2::new(x, y);
    }

    #[inline]
    #[must_use]
    pub fn get(&self) -> Vec2 {
        self.position
    }
}

/// Parameter ids that follow the pointer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DragTargets {
    pub angle_x: ParameterId,
    pub angle_y: ParameterId,
    pub angle_z: ParameterId,
    pub body_angle_x: ParameterId,
    pub eye_ball_x: ParameterId,
    pub eye_ball_y: ParameterId,
}

impl Default for DragTargets {
    fn default() -> Self {
        Self {
            angle_x: ParameterId::new(ids::ANGLE_X),
            angle_y: ParameterId::new(ids::ANGLE_Y),
            angle_z: ParameterId::new(ids::ANGLE_Z),
            body_angle_x: ParameterId::new(ids::BODY_ANGLE_X),
            eye_ball_x: ParameterId::new(ids::EYE_BALL_X),
            eye_ball_y: ParameterId::new(ids::EYE_BALL_Y),
        }
    }
}

impl DragTargets {
    /// Adds the head/body/eye offsets for a drag position.
    pub fn apply(&self, params: &mut ParameterBuffer, drag: Vec2) {
        params.add(self.angle_x, drag.x * 30.0, 1.0);
        params.add(self.angle_y, drag.y * 30.0, 1.0);
        params.add(self.angle_z, drag.x * drag.y * -30.0, 1.0);
        params.add(self.body_angle_x, drag.x * 10.0, 1.0);
        params.add(self.eye_ball_x, drag.x, 1.0);
        params.add(self.eye_ball_y, drag.y, 1.0);
    }
}
