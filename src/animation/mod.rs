//! Animation Compositing
//!
//! The independent signal sources that are merged into a model's
//! [`ParameterBuffer`] every frame: motion and expression queues with priority
//! admission, procedural eye blink and breath, pointer drag offsets and the
//! voice envelope used for lip sync.

pub mod breath;
pub mod drag;
pub mod expression;
pub mod eye_blink;
pub mod lip_sync;
pub mod motion;
pub mod parameters;
pub mod priority;
pub mod queue;

pub use breath::{Breath, BreathParameter};
pub use drag::{DragState, DragTargets};
pub use expression::{ExpressionBlend, ExpressionClip};
pub use eye_blink::EyeBlink;
pub use lip_sync::{VoiceClip, VoiceEnvelope};
pub use motion::{FinishedCallback, MotionClip, MotionHandle};
pub use parameters::{ParameterBuffer, ParameterId, ParameterInfo};
pub use priority::Priority;
pub use queue::{FinishedMotion, MotionQueue, MotionTick};
