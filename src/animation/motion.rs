use std::fmt;

use crate::animation::parameters::{ParameterBuffer, ParameterId};

/// A decoded animation clip that writes into a [`ParameterBuffer`].
///
/// Motions are decoded by the backend; expressions have a native
/// implementation in [`crate::animation::expression`]. The motion queue owns
/// timing and fading; the clip only evaluates itself at a local time with the
/// blend weight the queue computed.
pub trait MotionClip {
    /// Length of one playback in seconds. `None` plays until faded out.
    fn duration(&self) -> Option<f32>;

    fn fade_in_time(&self) -> f32;
    fn fade_out_time(&self) -> f32;
    fn set_fade_in_time(&mut self, seconds: f32);
    fn set_fade_out_time(&mut self, seconds: f32);

    /// Binds the model's eye-blink and lip-sync parameter ids so the clip can
    /// drive its `EyeBlink`/`LipSync` effect curves.
    fn set_effect_ids(&mut self, _eye_blink: &[ParameterId], _lip_sync: &[ParameterId]) {}

    /// Applies the clip at `time` seconds since it started, blended by `weight`.
    fn apply(&self, params: &mut ParameterBuffer, time: f32, weight: f32);

    /// User events whose timestamps fall in `(from, to]`.
    fn events_between(&self, _from: f32, _to: f32) -> Vec<String> {
        Vec::new()
    }
}

/// Identifies one started motion within a queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MotionHandle(pub(crate) u64);

impl MotionHandle {
    #[inline]
    #[must_use]
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for MotionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Called once when a started motion finishes or is faded out.
pub type FinishedCallback = Box<dyn FnOnce(MotionHandle)>;

/// Sine ease used for fade ramps: 0 below 0, 1 above 1.
#[inline]
#[must_use]
pub fn easing_sine(value: f32) -> f32 {
    if value < 0.0 {
        0.0
    } else if value > 1.0 {
        1.0
    } else {
        0.5 - 0.5 * (value * std::f32::consts::PI).cos()
    }
}
