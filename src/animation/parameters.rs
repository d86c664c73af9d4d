//! Parameter Buffer
//!
//! The flat array of named control values that every animation source writes
//! into and the backend mesh reads from once per frame.
//!
//! The buffer keeps a saved baseline next to the live values. The compositor
//! restores the baseline at the start of a frame (`load`) and re-saves it after
//! motions are applied (`save`), so procedural offsets added later in the frame
//! never accumulate across frames.

use std::fmt;

use rustc_hash::FxHashMap;

use crate::utils::interner::{self, Symbol};

/// Interned id of a model parameter.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ParameterId(Symbol);

impl ParameterId {
    #[inline]
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self(interner::intern(name))
    }

    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        interner::resolve(self.0)
    }
}

impl From<&str> for ParameterId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl fmt::Debug for ParameterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ParameterId({})", self.as_str())
    }
}

impl fmt::Display for ParameterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Names of the standard parameters driven by the compositor.
pub mod ids {
    pub const ANGLE_X: &str = "ParamAngleX";
    pub const ANGLE_Y: &str = "ParamAngleY";
    pub const ANGLE_Z: &str = "ParamAngleZ";
    pub const EYE_BALL_X: &str = "ParamEyeBallX";
    pub const EYE_BALL_Y: &str = "ParamEyeBallY";
    pub const BODY_ANGLE_X: &str = "ParamBodyAngleX";
    pub const BREATH: &str = "ParamBreath";
}

/// Static description of one parameter as declared by the mesh.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParameterInfo {
    pub id: ParameterId,
    pub min: f32,
    pub max: f32,
    pub default: f32,
}

impl ParameterInfo {
    #[must_use]
    pub fn new(id: impl Into<ParameterId>, min: f32, max: f32, default: f32) -> Self {
        Self {
            id: id.into(),
            min,
            max,
            default,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ParameterBuffer {
    index: FxHashMap<ParameterId, usize>,
    ids: Vec<ParameterId>,
    values: Vec<f32>,
    saved: Vec<f32>,
    defaults: Vec<f32>,
    /// `None` for parameters the mesh never declared.
    ranges: Vec<Option<(f32, f32)>>,
}

impl ParameterBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a buffer from the parameter table of a mesh. Values start at
    /// their defaults and the baseline equals the defaults.
    #[must_use]
    pub fn from_table(table: impl IntoIterator<Item = ParameterInfo>) -> Self {
        let mut buffer = Self::new();
        for info in table {
            let slot = buffer.ensure(info.id);
            buffer.ranges[slot] = Some((info.min.min(info.max), info.max.max(info.min)));
            buffer.defaults[slot] = info.default;
            buffer.values[slot] = info.default;
            buffer.saved[slot] = info.default;
        }
        buffer
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn index_of(&self, id: ParameterId) -> Option<usize> {
        self.index.get(&id).copied()
    }

    /// Returns the slot of `id`, allocating an unbounded slot at 0.0 for ids
    /// the mesh never declared.
    pub fn ensure(&mut self, id: ParameterId) -> usize {
        if let Some(&slot) = self.index.get(&id) {
            return slot;
        }
        let slot = self.values.len();
        self.index.insert(id, slot);
        self.ids.push(id);
        self.values.push(0.0);
        self.saved.push(0.0);
        self.defaults.push(0.0);
        self.ranges.push(None);
        slot
    }

    /// Current value; 0.0 for unknown ids.
    #[must_use]
    pub fn value(&self, id: ParameterId) -> f32 {
        self.index_of(id).map_or(0.0, |slot| self.values[slot])
    }

    /// Value stored in the saved baseline; 0.0 for unknown ids.
    #[must_use]
    pub fn saved_value(&self, id: ParameterId) -> f32 {
        self.index_of(id).map_or(0.0, |slot| self.saved[slot])
    }

    /// Overwrites a value, blended by `weight` against the current value.
    pub fn set(&mut self, id: ParameterId, value: f32, weight: f32) {
        let slot = self.ensure(id);
        let blended = if (weight - 1.0).abs() <= f32::EPSILON {
            value
        } else {
            self.values[slot] * (1.0 - weight) + value * weight
        };
        self.values[slot] = self.clamp(slot, blended);
    }

    /// Adds `value * weight` to the current value.
    pub fn add(&mut self, id: ParameterId, value: f32, weight: f32) {
        let slot = self.ensure(id);
        let next = self.values[slot] + value * weight;
        self.values[slot] = self.clamp(slot, next);
    }

    /// Multiplies the current value by `value`, blended by `weight`.
    pub fn multiply(&mut self, id: ParameterId, value: f32, weight: f32) {
        let slot = self.ensure(id);
        let next = self.values[slot] * (1.0 + (value - 1.0) * weight);
        self.values[slot] = self.clamp(slot, next);
    }

    /// Stores the current values as the baseline.
    pub fn save(&mut self) {
        self.saved.copy_from_slice(&self.values);
    }

    /// Restores the saved baseline, discarding everything added since `save`.
    pub fn load(&mut self) {
        self.values.copy_from_slice(&self.saved);
    }

    /// Resets live values and baseline to the declared defaults.
    pub fn reset(&mut self) {
        self.values.copy_from_slice(&self.defaults);
        self.saved.copy_from_slice(&self.defaults);
    }

    /// Iterates `(id, value)` pairs in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (ParameterId, f32)> + '_ {
        self.ids.iter().copied().zip(self.values.iter().copied())
    }

    #[inline]
    fn clamp(&self, slot: usize, value: f32) -> f32 {
        match self.ranges[slot] {
            Some((min, max)) => value.clamp(min, max),
            None => value,
        }
    }
}
