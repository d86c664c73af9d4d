//! Model Instance & Animation Compositor
//!
//! A [`Model`] is one loaded character. It owns everything the loader fetched
//! for it plus the animation sources merged into its parameter buffer each
//! frame.
//!
//! # Frame composition
//!
//! [`Model::update`] runs only once the loader reached
//! [`LoadStage::CompleteSetup`] and always composes in the same order:
//!
//! 1. advance model time, snapshot the drag position
//! 2. restore the saved baseline
//! 3. start a random idle motion if nothing plays, otherwise advance the
//!    motion queue
//! 4. save the new baseline
//! 5. eye blink (only when no motion was applied)
//! 6. expressions
//! 7. drag offsets
//! 8. breath
//! 9. physics
//! 10. lip sync
//! 11. pose
//! 12. commit into the mesh
//!
//! Everything added after step 4 is discarded by the next frame's step 2, so
//! procedural offsets never accumulate.

use std::rc::Rc;

use glam::{Mat4, Vec2};
use rand::rngs::StdRng;
use rand::{RngExt, SeedableRng};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::animation::breath::Breath;
use crate::animation::drag::{DragState, DragTargets};
use crate::animation::eye_blink::EyeBlink;
use crate::animation::lip_sync::VoiceEnvelope;
use crate::animation::motion::{FinishedCallback, MotionClip, MotionHandle};
use crate::animation::parameters::{ParameterBuffer, ParameterId};
use crate::animation::priority::Priority;
use crate::animation::queue::MotionQueue;
use crate::backend::{MeshRenderer, PhysicsRig, PoseRig, PuppetMesh};
use crate::model::events::ModelEvent;
use crate::model::layout::ModelMatrix;
use crate::model::loader::{AssetRequest, Resource};
use crate::model::settings::{ModelSettings, UserDataEntry};
use crate::model::stage::{LoadPlan, LoadStage};

/// Per-model knobs taken from the stage configuration.
#[derive(Debug, Clone)]
pub struct ModelOptions {
    /// Motion group played whenever the queue runs dry.
    pub idle_group: String,
    pub premultiplied_alpha: bool,
    pub lip_sync: bool,
    pub seed: u64,
}

impl Default for ModelOptions {
    fn default() -> Self {
        Self {
            idle_group: "Idle".to_string(),
            premultiplied_alpha: true,
            lip_sync: true,
            seed: 0,
        }
    }
}

/// A motion start waiting on its file. Holds the queue reservation.
pub(super) struct DeferredMotion {
    pub(super) group: String,
    pub(super) index: usize,
    pub(super) priority: Priority,
    pub(super) on_finished: Option<FinishedCallback>,
}

pub struct Model {
    // Identity
    pub(super) home_dir: String,
    pub(super) generation: u64,
    pub(super) stage: LoadStage,
    pub(super) plan: LoadPlan,
    pub(super) settings: Option<ModelSettings>,

    // Loaded resources
    pub(super) mesh: Option<Box<dyn PuppetMesh>>,
    pub(super) renderer: Option<Box<dyn MeshRenderer>>,
    pub(super) physics: Option<Box<dyn PhysicsRig>>,
    pub(super) pose: Option<Box<dyn PoseRig>>,
    pub(super) model_matrix: Option<ModelMatrix>,
    pub(super) params: ParameterBuffer,
    pub(super) expressions: Vec<(String, Rc<dyn MotionClip>)>,
    pub(super) motions: FxHashMap<String, Rc<dyn MotionClip>>,
    /// Motions whose file could not be fetched or decoded; never re-fetched.
    pub(super) unavailable_motions: FxHashSet<String>,
    /// Motion fetched on demand, started once it arrives.
    pub(super) deferred_motion: Option<DeferredMotion>,
    pub(super) user_data: Vec<UserDataEntry>,
    pub(super) eye_blink_ids: Vec<ParameterId>,
    pub(super) lip_sync_ids: Vec<ParameterId>,

    // Compositor
    pub(super) eye_blink: Option<EyeBlink>,
    pub(super) breath: Option<Breath>,
    pub(super) motion_queue: MotionQueue,
    expression_queue: MotionQueue,
    drag: DragState,
    drag_targets: DragTargets,
    pub(super) voice: VoiceEnvelope,
    pub(super) voice_seq: u64,
    lip_sync: bool,
    user_time: f32,
    opacity: f32,
    idle_group: String,
    pub(super) premultiplied_alpha: bool,
    pub(super) rng: StdRng,

    // Loader bookkeeping
    /// Fetches the current `Wait*` stage still expects.
    pub(super) pending: usize,
    /// Seconds since the loader last made progress.
    pub(super) stall_elapsed: f32,

    pub(super) outbox: Vec<AssetRequest>,
    pub(super) events: Vec<ModelEvent>,
}

impl Model {
    #[must_use]
    pub fn new(generation: u64, options: ModelOptions) -> Self {
        Self {
            home_dir: String::new(),
            generation,
            stage: LoadStage::LoadAssets,
            plan: LoadPlan::default(),
            settings: None,

            mesh: None,
            renderer: None,
            physics: None,
            pose: None,
            model_matrix: None,
            params: ParameterBuffer::new(),
            expressions: Vec::new(),
            motions: FxHashMap::default(),
            unavailable_motions: FxHashSet::default(),
            deferred_motion: None,
            user_data: Vec::new(),
            eye_blink_ids: Vec::new(),
            lip_sync_ids: Vec::new(),

            eye_blink: None,
            breath: None,
            motion_queue: MotionQueue::new(),
            expression_queue: MotionQueue::new(),
            drag: DragState::default(),
            drag_targets: DragTargets::default(),
            voice: VoiceEnvelope::new(),
            voice_seq: 0,
            lip_sync: options.lip_sync,
            user_time: 0.0,
            opacity: 1.0,
            idle_group: options.idle_group,
            premultiplied_alpha: options.premultiplied_alpha,
            rng: StdRng::seed_from_u64(options.seed),

            pending: 0,
            stall_elapsed: 0.0,

            outbox: Vec::new(),
            events: Vec::new(),
        }
    }

    // ========================================================================
    // Per-frame composition
    // ========================================================================

    pub fn update(&mut self, dt: f32) {
        if self.stage != LoadStage::CompleteSetup {
            return;
        }

        self.user_time += dt;
        let drag = self.drag.get();

        self.params.load();

        let mut motion_updated = false;
        if self.motion_queue.is_finished() {
            let idle = self.idle_group.clone();
            self.start_random_motion(&idle, Priority::Idle, None);
        } else {
            let tick = self.motion_queue.update(&mut self.params, dt);
            motion_updated = tick.updated;
            for finished in tick.finished {
                self.events.push(ModelEvent::MotionFinished {
                    label: finished.label,
                    handle: finished.handle,
                });
            }
            for value in tick.events {
                log::info!("Motion event fired: {value}");
                self.events.push(ModelEvent::MotionEvent { value });
            }
        }

        self.params.save();

        if !motion_updated && let Some(eye_blink) = self.eye_blink.as_mut() {
            eye_blink.update(&mut self.params, dt);
        }

        self.expression_queue.update(&mut self.params, dt);

        self.drag_targets.apply(&mut self.params, drag);

        if let Some(breath) = self.breath.as_mut() {
            breath.update(&mut self.params, dt);
        }

        if let Some(physics) = self.physics.as_mut() {
            physics.evaluate(&mut self.params, dt);
        }

        if self.lip_sync {
            self.voice.update(dt);
            let value = self.voice.rms();
            for &id in &self.lip_sync_ids {
                self.params.add(id, value, 0.8);
            }
        }

        if let Some(pose) = self.pose.as_mut() {
            pose.update(&mut self.params, dt);
        }

        if let Some(mesh) = self.mesh.as_mut() {
            mesh.commit(&self.params);
        }
    }

    /// Draws with `projection`, composed with the model matrix.
    pub fn draw(&mut self, projection: &Mat4) {
        if self.stage != LoadStage::CompleteSetup {
            return;
        }
        if let (Some(renderer), Some(mesh), Some(matrix)) = (
            self.renderer.as_mut(),
            self.mesh.as_deref(),
            self.model_matrix.as_ref(),
        ) {
            let mvp = *projection * matrix.to_mat4();
            renderer.draw(mesh, &mvp);
        }
    }

    // ========================================================================
    // Motions & expressions
    // ========================================================================

    /// Starts motion `index` of `group`.
    ///
    /// Returns `None` before setup completes or when the priority is not
    /// admitted; whatever plays keeps playing. A motion that was not preloaded is fetched on demand: the
    /// reservation is held, `None` is returned and the motion starts (with a
    /// `MotionStarted` event) once its file arrives.
    pub fn start_motion(
        &mut self,
        group: &str,
        index: usize,
        priority: Priority,
        on_finished: Option<FinishedCallback>,
    ) -> Option<MotionHandle> {
        if self.stage != LoadStage::CompleteSetup {
            log::debug!("Can't start motion {group}_{index} in {}", self.stage);
            return None;
        }
        if !self.motion_queue.try_reserve(priority) {
            log::debug!(
                "Can't start motion {group}_{index} at {priority:?}: {:?} is playing, {:?} reserved",
                self.motion_queue.current_priority(),
                self.motion_queue.reserve_priority()
            );
            return None;
        }

        let key = format!("{group}_{index}");
        if let Some(clip) = self.motions.get(&key).cloned() {
            self.deferred_motion = None;
            return Some(self.begin_motion(group, index, priority, clip, on_finished));
        }

        let file = self
            .settings
            .as_ref()
            .and_then(|s| s.motion(group, index))
            .map(|m| m.file.clone())
            .filter(|f| !f.is_empty());
        match file {
            Some(file) if !self.unavailable_motions.contains(&key) => {
                log::debug!("Motion {key} is not loaded, fetching on demand");
                self.deferred_motion = Some(DeferredMotion {
                    group: group.to_string(),
                    index,
                    priority,
                    on_finished,
                });
                self.request(
                    Resource::Motion {
                        group: group.to_string(),
                        index,
                    },
                    &file,
                );
            }
            _ => {
                self.motion_queue.cancel_reservation(priority);
                log::debug!("Motion {key} is not available");
            }
        }
        None
    }

    /// Puts an admitted, loaded motion on the queue and starts its voice.
    pub(super) fn begin_motion(
        &mut self,
        group: &str,
        index: usize,
        priority: Priority,
        clip: Rc<dyn MotionClip>,
        on_finished: Option<FinishedCallback>,
    ) -> MotionHandle {
        let sound = self
            .settings
            .as_ref()
            .and_then(|s| s.motion(group, index))
            .map(|m| m.sound.clone())
            .filter(|s| !s.is_empty());
        if let Some(sound) = sound
            && self.lip_sync
        {
            self.voice_seq += 1;
            let seq = self.voice_seq;
            self.voice.stop();
            self.request(Resource::Voice { seq }, &sound);
        }

        let key = format!("{group}_{index}");
        let handle = self.motion_queue.start(clip, key, priority, on_finished);
        log::debug!("Start motion {group}_{index} at {priority:?} ({handle})");
        self.events.push(ModelEvent::MotionStarted {
            group: group.to_string(),
            index,
            priority,
            handle,
        });
        handle
    }

    /// Starts a uniformly chosen motion of `group`. `None` for an empty or
    /// unknown group.
    pub fn start_random_motion(
        &mut self,
        group: &str,
        priority: Priority,
        on_finished: Option<FinishedCallback>,
    ) -> Option<MotionHandle> {
        let count = self.settings.as_ref().map_or(0, |s| s.motion_count(group));
        if count == 0 {
            return None;
        }
        let index = self.rng.random_range(0..count);
        self.start_motion(group, index, priority, on_finished)
    }

    pub fn set_expression(&mut self, name: &str) {
        let Some(clip) = self
            .expressions
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, clip)| Rc::clone(clip))
        else {
            log::debug!("Expression '{name}' is not loaded");
            return;
        };

        self.expression_queue.start(clip, name, Priority::Force, None);
        log::debug!("Expression: {name}");
        self.events.push(ModelEvent::ExpressionSet {
            name: name.to_string(),
        });
    }

    pub fn set_random_expression(&mut self) {
        if self.expressions.is_empty() {
            return;
        }
        let index = self.rng.random_range(0..self.expressions.len());
        let name = self.expressions[index].0.clone();
        self.set_expression(&name);
    }

    pub(super) fn stop_all_motions(&mut self) {
        self.motion_queue.stop_all();
    }

    pub fn release_motions(&mut self) {
        self.motions.clear();
        self.unavailable_motions.clear();
        if let Some(deferred) = self.deferred_motion.take() {
            self.motion_queue.cancel_reservation(deferred.priority);
        }
    }

    pub fn release_expressions(&mut self) {
        self.expressions.clear();
    }

    // ========================================================================
    // Input
    // ========================================================================

    /// Whether `(x, y)` in view space falls inside hit area `area`.
    ///
    /// Only a fully set up, opaque model can be hit.
    #[must_use]
    pub fn hit_test(&self, area: &str, x: f32, y: f32) -> bool {
        if self.stage != LoadStage::CompleteSetup || self.opacity < 1.0 {
            return false;
        }
        let Some(drawable) = self.settings.as_ref().and_then(|s| s.hit_area_drawable(area)) else {
            return false;
        };
        let (Some(mesh), Some(matrix)) = (self.mesh.as_deref(), self.model_matrix.as_ref()) else {
            return false;
        };
        let Some(bounds) = mesh.drawable_bounds(drawable) else {
            return false;
        };

        let local = Vec2::new(matrix.invert_transform_x(x), matrix.invert_transform_y(y));
        bounds.contains(local)
    }

    /// First declared hit area containing `(x, y)`.
    #[must_use]
    pub fn hit_area_at(&self, x: f32, y: f32) -> Option<String> {
        let settings = self.settings.as_ref()?;
        settings
            .hit_areas
            .iter()
            .find(|area| self.hit_test(&area.name, x, y))
            .map(|area| area.name.clone())
    }

    pub fn set_dragging(&mut self, x: f32, y: f32) {
        self.drag.set(x, y);
    }

    #[must_use]
    pub fn drag(&self) -> Vec2 {
        self.drag.get()
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    #[inline]
    #[must_use]
    pub fn stage(&self) -> LoadStage {
        self.stage
    }

    #[inline]
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[must_use]
    pub fn home_dir(&self) -> &str {
        &self.home_dir
    }

    #[must_use]
    pub fn settings(&self) -> Option<&ModelSettings> {
        self.settings.as_ref()
    }

    #[must_use]
    pub fn parameters(&self) -> &ParameterBuffer {
        &self.params
    }

    #[must_use]
    pub fn model_matrix(&self) -> Option<&ModelMatrix> {
        self.model_matrix.as_ref()
    }

    pub fn model_matrix_mut(&mut self) -> Option<&mut ModelMatrix> {
        self.model_matrix.as_mut()
    }

    /// Canonical canvas width of the loaded mesh.
    #[must_use]
    pub fn canvas_width(&self) -> Option<f32> {
        self.mesh.as_ref().map(|m| m.canvas_width())
    }

    #[must_use]
    pub fn motion_queue(&self) -> &MotionQueue {
        &self.motion_queue
    }

    #[must_use]
    pub fn expression_queue(&self) -> &MotionQueue {
        &self.expression_queue
    }

    #[must_use]
    pub fn has_motion(&self, key: &str) -> bool {
        self.motions.contains_key(key)
    }

    #[must_use]
    pub fn motion_count(&self) -> usize {
        self.motions.len()
    }

    pub fn expression_names(&self) -> impl Iterator<Item = &str> {
        self.expressions.iter().map(|(name, _)| name.as_str())
    }

    #[must_use]
    pub fn user_data(&self) -> &[UserDataEntry] {
        &self.user_data
    }

    #[must_use]
    pub fn eye_blink_ids(&self) -> &[ParameterId] {
        &self.eye_blink_ids
    }

    #[must_use]
    pub fn lip_sync_ids(&self) -> &[ParameterId] {
        &self.lip_sync_ids
    }

    #[must_use]
    pub fn has_physics(&self) -> bool {
        self.physics.is_some()
    }

    #[must_use]
    pub fn has_pose(&self) -> bool {
        self.pose.is_some()
    }

    #[must_use]
    pub fn has_eye_blink(&self) -> bool {
        self.eye_blink.is_some()
    }

    #[must_use]
    pub fn opacity(&self) -> f32 {
        self.opacity
    }

    pub fn set_opacity(&mut self, opacity: f32) {
        self.opacity = opacity.clamp(0.0, 1.0);
    }

    #[must_use]
    pub fn lip_sync_enabled(&self) -> bool {
        self.lip_sync
    }

    pub fn set_lip_sync(&mut self, enabled: bool) {
        self.lip_sync = enabled;
    }

    /// Current voice loudness fed to the lip-sync ids.
    #[must_use]
    pub fn voice_level(&self) -> f32 {
        self.voice.rms()
    }

    /// Accumulated model time in seconds.
    #[must_use]
    pub fn user_time(&self) -> f32 {
        self.user_time
    }

    /// Takes the fetches queued since the last call.
    pub fn take_requests(&mut self) -> Vec<AssetRequest> {
        std::mem::take(&mut self.outbox)
    }

    /// Takes the events queued since the last call.
    pub fn take_events(&mut self) -> Vec<ModelEvent> {
        std::mem::take(&mut self.events)
    }
}
