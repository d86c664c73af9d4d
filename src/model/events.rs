use std::fmt;

use crate::animation::motion::MotionHandle;
use crate::animation::priority::Priority;
use crate::model::stage::LoadStage;

/// Something a model reports to whoever drives it.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelEvent {
    StageChanged { from: LoadStage, to: LoadStage },
    /// Reached `CompleteSetup`.
    Ready,
    LoadFailed { stage: LoadStage, reason: String },
    MotionStarted {
        group: String,
        index: usize,
        priority: Priority,
        handle: MotionHandle,
    },
    MotionFinished { label: String, handle: MotionHandle },
    /// A user event embedded in a motion fired.
    MotionEvent { value: String },
    ExpressionSet { name: String },
}

impl ModelEvent {
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::StageChanged { .. } => "stage_changed",
            Self::Ready => "ready",
            Self::LoadFailed { .. } => "load_failed",
            Self::MotionStarted { .. } => "motion_started",
            Self::MotionFinished { .. } => "motion_finished",
            Self::MotionEvent { .. } => "motion_event",
            Self::ExpressionSet { .. } => "expression_set",
        }
    }
}

impl fmt::Display for ModelEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StageChanged { from, to } => write!(f, "{from} -> {to}"),
            Self::Ready => f.write_str("setup complete"),
            Self::LoadFailed { stage, reason } => write!(f, "failed in {stage}: {reason}"),
            Self::MotionStarted {
                group,
                index,
                priority,
                handle,
            } => write!(f, "{group}_{index} at {priority:?} ({handle})"),
            Self::MotionFinished { label, handle } => write!(f, "{label} ({handle})"),
            Self::MotionEvent { value } => f.write_str(value),
            Self::ExpressionSet { name } => f.write_str(name),
        }
    }
}
