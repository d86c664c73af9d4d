use std::fmt;

use crate::model::{ModelEvent, ModelHandle};

/// Notification delivered to the stage's event sink.
#[derive(Debug, Clone, PartialEq)]
pub enum StageEvent {
    SceneChanged { index: usize },
    /// A tap reached the stage, in screen space.
    Interacted { x: f32, y: f32 },
    Model { model: ModelHandle, event: ModelEvent },
}

impl StageEvent {
    /// Event type string.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SceneChanged { .. } => "scene_changed",
            Self::Interacted { .. } => "interacted",
            Self::Model { event, .. } => event.kind(),
        }
    }
}

impl fmt::Display for StageEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SceneChanged { index } => write!(f, "scene {index}"),
            Self::Interacted { x, y } => write!(f, "tap at ({x:.3}, {y:.3})"),
            Self::Model { model, event } => write!(f, "{model:?}: {event}"),
        }
    }
}

pub type EventSink = Box<dyn FnMut(&StageEvent)>;

/// Sink used until [`set_event_sink`](super::SceneManager::set_event_sink)
/// replaces it.
#[must_use]
pub fn log_sink() -> EventSink {
    Box::new(|event| log::debug!("[{}] {event}", event.kind()))
}
