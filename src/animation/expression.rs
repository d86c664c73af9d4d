//! Expression Clips
//!
//! An expression is a static parameter overlay: a list of `(id, value, blend)`
//! entries applied every frame with the expression queue's fade weight. The
//! document format is plain JSON so expressions are decoded natively.

use serde::Deserialize;

use crate::animation::motion::MotionClip;
use crate::animation::parameters::{ParameterBuffer, ParameterId};
use crate::errors::Result;

const DEFAULT_FADE_SECONDS: f32 = 1.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub enum ExpressionBlend {
    #[default]
    Add,
    Multiply,
    Overwrite,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ExpressionDocument {
    fade_in_time: Option<f32>,
    fade_out_time: Option<f32>,
    #[serde(default)]
    parameters: Vec<ExpressionParameterDocument>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ExpressionParameterDocument {
    id: String,
    value: f32,
    #[serde(default)]
    blend: ExpressionBlend,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExpressionParameter {
    pub id: ParameterId,
    pub value: f32,
    pub blend: ExpressionBlend,
}

#[derive(Debug, Clone)]
pub struct ExpressionClip {
    name: String,
    fade_in: f32,
    fade_out: f32,
    parameters: Vec<ExpressionParameter>,
}

impl ExpressionClip {
    /// Parses an expression document.
    pub fn from_slice(bytes: &[u8], name: &str) -> Result<Self> {
        let doc: ExpressionDocument = serde_json::from_slice(bytes)?;
        let fade_in = doc.fade_in_time.filter(|t| *t >= 0.0).unwrap_or(DEFAULT_FADE_SECONDS);
        let fade_out = doc.fade_out_time.filter(|t| *t >= 0.0).unwrap_or(DEFAULT_FADE_SECONDS);
        let parameters = doc
            .parameters
            .into_iter()
            .map(|p| ExpressionParameter {
                id: ParameterId::new(&p.id),
                value: p.value,
                blend: p.blend,
            })
            .collect();

        Ok(Self {
            name: name.to_string(),
            fade_in,
            fade_out,
            parameters,
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn parameters(&self) -> &[ExpressionParameter] {
        &self.parameters
    }
}

impl MotionClip for ExpressionClip {
    fn duration(&self) -> Option<f32> {
        None
    }

    fn fade_in_time(&self) -> f32 {
        self.fade_in
    }

    fn fade_out_time(&self) -> f32 {
        self.fade_out
    }

    fn set_fade_in_time(&mut self, seconds: f32) {
        self.fade_in = seconds;
    }

    fn set_fade_out_time(&mut self, seconds: f32) {
        self.fade_out = seconds;
    }

    fn apply(&self, params: &mut ParameterBuffer, _time: f32, weight: f32) {
        for p in &self.parameters {
            match p.blend {
                ExpressionBlend::Add => params.add(p.id, p.value, weight),
                ExpressionBlend::Multiply => params.multiply(p.id, p.value, weight),
                ExpressionBlend::Overwrite => params.set(p.id, p.value, weight),
            }
        }
    }
}
