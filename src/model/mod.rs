//! Models
//!
//! - [`settings`]: the `model3.json` settings document
//! - [`stage`]: load stages and the plan that decides which of them run
//! - [`loader`]: the stage driver and fetch routing types
//! - [`layout`]: the model matrix
//! - [`puppet`]: the [`Model`] instance and its per-frame compositor
//! - [`events`]: notifications a model emits

pub mod events;
pub mod layout;
pub mod loader;
pub mod puppet;
pub mod settings;
pub mod stage;

use slotmap::new_key_type;

new_key_type! {
    /// Key of a live model. Stale once the model is released.
    pub struct ModelHandle;
}

pub use events::ModelEvent;
pub use layout::ModelMatrix;
pub use loader::{AssetRequest, Fetched, LoadToken, Resource, TextureWaiter};
pub use puppet::{Model, ModelOptions};
pub use settings::{ModelSettings, UserDataEntry};
pub use stage::{LoadPlan, LoadStage};
