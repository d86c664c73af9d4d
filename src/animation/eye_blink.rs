use rand::rngs::StdRng;
use rand::{RngExt, SeedableRng};

use crate::animation::parameters::{ParameterBuffer, ParameterId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlinkState {
    First,
    Interval,
    Closing,
    Closed,
    Opening,
}

/// Procedural eye blink.
///
/// Holds the eyes open for a random interval, then runs a short
/// closing → closed → opening cycle. Only applied on frames where no motion
/// drives the parameters.
#[derive(Debug)]
pub struct EyeBlink {
    ids: Vec<ParameterId>,
    state: BlinkState,
    user_time: f32,
    state_start: f32,
    next_blink_time: f32,
    pub blinking_interval: f32,
    pub closing_seconds: f32,
    pub closed_seconds: f32,
    pub opening_seconds: f32,
    rng: StdRng,
}

impl EyeBlink {
    #[must_use]
    pub fn new(ids: Vec<ParameterId>, seed: u64) -> Self {
        Self {
            ids,
            state: BlinkState::First,
            user_time: 0.0,
            state_start: 0.0,
            next_blink_time: 0.0,
            blinking_interval: 4.0,
            closing_seconds: 0.1,
            closed_seconds: 0.05,
            opening_seconds: 0.15,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    #[must_use]
    pub fn ids(&self) -> &[ParameterId] {
        &self.ids
    }

    #[must_use]
    pub fn state(&self) -> BlinkState {
        self.state
    }

    fn determine_next_blink(&mut self) -> f32 {
        let r: f32 = self.rng.random_range(0.0..1.0);
        self.user_time + r * (2.0 * self.blinking_interval - 1.0)
    }

    pub fn update(&mut self, params: &mut ParameterBuffer, dt: f32) {
        self.user_time += dt;
        let now = self.user_time;

        let value = match self.state {
            BlinkState::Closing => {
                let t = ((now - self.state_start) / self.closing_seconds).min(1.0);
                if t >= 1.0 {
                    self.state = BlinkState::Closed;
                    self.state_start = now;
                }
                1.0 - t
            }
            BlinkState::Closed => {
                let t = (now - self.state_start) / self.closed_seconds;
                if t >= 1.0 {
                    self.state = BlinkState::Opening;
                    self.state_start = now;
                }
                0.0
            }
            BlinkState::Opening => {
                let t = ((now - self.state_start) / self.opening_seconds).min(1.0);
                if t >= 1.0 {
                    self.state = BlinkState::Interval;
                    self.next_blink_time = self.determine_next_blink();
                }
                t
            }
            BlinkState::Interval => {
                if self.next_blink_time < now {
                    self.state = BlinkState::Closing;
                    self.state_start = now;
                }
                1.0
            }
            BlinkState::First => {
                self.state = BlinkState::Interval;
                self.next_blink_time = self.determine_next_blink();
                1.0
            }
        };

        for &id in &self.ids {
            params.set(id, value, 1.0);
        }
    }
}
