//! Stage Configuration
//!
//! The caller-supplied description of what to show: an ordered list of scenes
//! (one model each, plus the motion groups its idle loop and taps use), the
//! priority taps start motions at, pointer viewport limits and loader
//! hardening knobs.
//!
//! # Example
//!
//! ```rust,ignore
//! use myth_puppet::config::StageConfig;
//!
//! let config = StageConfig::from_json_str(r#"{
//!     "scenes": [{
//!         "dir_path": "models/haru",
//!         "file_name": "haru.model3.json",
//!         "idle": "Idle",
//!         "expression": "Head",
//!         "interaction": { "Body": "TapBody" }
//!     }]
//! }"#)?;
//! assert_eq!(config.priority, Priority::Normal);
//! ```

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::animation::priority::Priority;
use crate::errors::{PuppetError, Result};

/// One selectable scene.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    /// Model home directory, relative to the asset reader root.
    pub dir_path: String,
    /// Settings document inside `dir_path`.
    pub file_name: String,
    /// Motion group looped while nothing else plays.
    pub idle: String,
    /// Hit area whose taps switch to a random expression.
    pub expression: String,
    /// Hit area name → motion group started on tap.
    pub interaction: HashMap<String, String>,
}

impl SceneConfig {
    #[must_use]
    pub fn new(dir_path: impl Into<String>, file_name: impl Into<String>) -> Self {
        Self {
            dir_path: dir_path.into(),
            file_name: file_name.into(),
            idle: "Idle".to_string(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_idle(mut self, group: impl Into<String>) -> Self {
        self.idle = group.into();
        self
    }

    #[must_use]
    pub fn with_expression_area(mut self, area: impl Into<String>) -> Self {
        self.expression = area.into();
        self
    }

    #[must_use]
    pub fn with_interaction(mut self, area: impl Into<String>, group: impl Into<String>) -> Self {
        self.interaction.insert(area.into(), group.into());
        self
    }
}

/// Pointer viewport limits. Screen space spans `[-1, 1]` vertically and the
/// aspect-corrected range horizontally.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewportConfig {
    pub initial_scale: f32,
    pub max_scale: f32,
    pub min_scale: f32,
    pub logical_bottom: f32,
    pub logical_top: f32,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            initial_scale: 1.0,
            max_scale: 2.0,
            min_scale: 0.8,
            logical_bottom: -1.0,
            logical_top: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Seconds a model may wait on one fetch before it is failed.
    /// `None` waits forever.
    pub stall_timeout_secs: Option<f32>,
    /// Upload textures with premultiplied alpha and tell the renderer so.
    pub premultiplied_alpha: bool,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            stall_timeout_secs: Some(30.0),
            premultiplied_alpha: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StageConfig {
    pub scenes: Vec<SceneConfig>,
    /// Priority of motions started by taps.
    pub priority: Priority,
    pub viewport: ViewportConfig,
    pub loader: LoaderConfig,
    pub lip_sync: bool,
    /// Seed for random motion/expression picks and blink timing. Random when
    /// unset.
    pub rng_seed: Option<u64>,
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            scenes: Vec::new(),
            priority: Priority::Normal,
            viewport: ViewportConfig::default(),
            loader: LoaderConfig::default(),
            lip_sync: true,
            rng_seed: None,
        }
    }
}

impl StageConfig {
    #[must_use]
    pub fn with_scene(mut self, scene: SceneConfig) -> Self {
        self.scenes.push(scene);
        self
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if self.scenes.is_empty() {
            return Err(PuppetError::InvalidConfig("no scenes configured".to_string()));
        }
        for (i, scene) in self.scenes.iter().enumerate() {
            if scene.dir_path.is_empty() || scene.file_name.is_empty() {
                return Err(PuppetError::InvalidConfig(format!(
                    "scene {i}: dir_path and file_name must be set"
                )));
            }
        }

        let v = &self.viewport;
        if !(v.min_scale > 0.0 && v.min_scale <= v.initial_scale && v.initial_scale <= v.max_scale) {
            return Err(PuppetError::InvalidConfig(format!(
                "viewport scales must satisfy 0 < min ({}) <= initial ({}) <= max ({})",
                v.min_scale, v.initial_scale, v.max_scale
            )));
        }
        if v.logical_bottom >= v.logical_top {
            return Err(PuppetError::InvalidConfig("viewport logical rect is empty".to_string()));
        }

        if let Some(timeout) = self.loader.stall_timeout_secs
            && timeout <= 0.0
        {
            return Err(PuppetError::InvalidConfig(format!(
                "loader.stall_timeout_secs must be positive, got {timeout}"
            )));
        }
        Ok(())
    }
}
