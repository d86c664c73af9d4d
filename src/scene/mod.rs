//! Scene Management
//!
//! A scene is one configured model directory. [`SceneManager`] keeps the
//! models of the current scene alive, pumps their asset completions and
//! routes pointer input to them.

pub mod events;
pub mod manager;

pub use events::{EventSink, StageEvent, log_sink};
pub use manager::SceneManager;
