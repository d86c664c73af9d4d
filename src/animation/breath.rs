use std::f32::consts::TAU;

use crate::animation::parameters::{ids, ParameterBuffer, ParameterId};

/// One sinusoidal breath channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BreathParameter {
    pub id: ParameterId,
    pub offset: f32,
    pub peak: f32,
    /// Period in seconds.
    pub cycle: f32,
    pub weight: f32,
}

impl BreathParameter {
    #[must_use]
    pub fn new(id: impl Into<ParameterId>, offset: f32, peak: f32, cycle: f32, weight: f32) -> Self {
        Self {
            id: id.into(),
            offset,
            peak,
            cycle,
            weight,
        }
    }
}

/// Always-on idle oscillation added on top of motions and drag.
#[derive(Debug, Clone, Default)]
pub struct Breath {
    parameters: Vec<BreathParameter>,
    current_time: f32,
}

impl Breath {
    #[must_use]
    pub fn new(parameters: Vec<BreathParameter>) -> Self {
        Self {
            parameters,
            current_time: 0.0,
        }
    }

    /// The head, body and breath channels every model gets.
    #[must_use]
    pub fn standard() -> Self {
        Self::new(vec![
            BreathParameter::new(ids::ANGLE_X, 0.0, 15.0, 6.5345, 0.5),
            BreathParameter::new(ids::ANGLE_Y, 0.0, 8.0, 3.5345, 0.5),
            BreathParameter::new(ids::ANGLE_Z, 0.0, 10.0, 5.5345, 0.5),
            BreathParameter::new(ids::BODY_ANGLE_X, 0.0, 4.0, 15.5345, 0.5),
            BreathParameter::new(ids::BREATH, 0.5, 0.5, 3.2345, 1.0),
        ])
    }

    #[must_use]
    pub fn parameters(&self) -> &[BreathParameter] {
        &self.parameters
    }

    pub fn update(&mut self, params: &mut ParameterBuffer, dt: f32) {
        self.current_time += dt;
        let phase = self.current_time * TAU;

        for p in &self.parameters {
            let value = p.offset + p.peak * (phase / p.cycle).sin();
            params.add(p.id, value, p.weight);
        }
    }
}
