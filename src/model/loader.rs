//! Model Loader
//!
//! Drives a [`Model`] from a settings file name to `CompleteSetup`.
//!
//! The loader never performs I/O itself. Each `Load*` stage queues one or more
//! [`AssetRequest`]s in the model's outbox and moves to the matching `Wait*`
//! stage; the owner dispatches the requests, tags them with a [`LoadToken`]
//! and hands the results back through [`Model::on_fetched`] and
//! [`Model::on_texture`]. Setup stages run synchronously as soon as the stage
//! before them resolves.
//!
//! Completions that arrive for a resource the current stage does not expect
//! are dropped. Completions for a model that no longer exists, or for an
//! earlier load of it, are dropped by the owner through the token.
//!
//! Required resources (settings, model binary) failing is fatal and moves the
//! model to [`LoadStage::Failed`]. Any optional resource failing is logged and
//! treated as absent.

use std::fmt;
use std::rc::Rc;

use rand::RngExt;

use crate::animation::breath::Breath;
use crate::animation::eye_blink::EyeBlink;
use crate::animation::lip_sync::VoiceClip;
use crate::animation::motion::MotionClip;
use crate::animation::parameters::ParameterBuffer;
use crate::assets::io::join_asset_path;
use crate::assets::texture_cache::TextureRecord;
use crate::backend::PuppetBackend;
use crate::errors::{PuppetError, Result};
use crate::model::ModelHandle;
use crate::model::events::ModelEvent;
use crate::model::layout::ModelMatrix;
use crate::model::puppet::Model;
use crate::model::settings::{ModelSettings, parse_user_data};
use crate::model::stage::{LoadPlan, LoadStage};

/// What a fetch is for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Resource {
    Settings,
    Moc,
    /// Index into the declared expressions with a non-empty file.
    Expression { index: usize },
    Physics,
    Pose,
    UserData,
    Motion { group: String, index: usize },
    Texture { slot: usize, premultiply: bool },
    /// Only the latest sequence number is honoured.
    Voice { seq: u64 },
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Settings => f.write_str("settings"),
            Self::Moc => f.write_str("model binary"),
            Self::Expression { index } => write!(f, "expression #{index}"),
            Self::Physics => f.write_str("physics"),
            Self::Pose => f.write_str("pose"),
            Self::UserData => f.write_str("user data"),
            Self::Motion { group, index } => write!(f, "motion {group}_{index}"),
            Self::Texture { slot, .. } => write!(f, "texture slot {slot}"),
            Self::Voice { seq } => write!(f, "voice #{seq}"),
        }
    }
}

/// A fetch queued by a model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetRequest {
    pub resource: Resource,
    /// Home directory joined with the declared file name.
    pub path: String,
}

/// Identifies the model load a fetch was issued for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LoadToken {
    pub model: ModelHandle,
    pub generation: u64,
}

/// Raw bytes of a finished fetch, routed back by token.
#[derive(Debug)]
pub struct Fetched {
    pub token: LoadToken,
    pub resource: Resource,
    pub path: String,
    pub result: Result<Vec<u8>>,
}

/// Waiter attached to a texture cache request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureWaiter {
    pub token: LoadToken,
    pub slot: usize,
}

impl Model {
    /// Begins loading `settings_file` from `home_dir`.
    pub fn load_assets(&mut self, home_dir: &str, settings_file: &str) {
        self.home_dir = home_dir.to_string();
        self.stall_elapsed = 0.0;
        log::info!("Loading model {}", join_asset_path(home_dir, settings_file));
        self.request(Resource::Settings, settings_file);
    }

    pub(super) fn request(&mut self, resource: Resource, file: &str) {
        let path = join_asset_path(&self.home_dir, file);
        log::debug!("Request {resource}: {path}");
        self.outbox.push(AssetRequest { resource, path });
    }

    fn enter(&mut self, next: LoadStage) {
        debug_assert!(next >= self.stage, "load stage moved backwards");
        if next == self.stage {
            return;
        }
        log::debug!("Load stage {} -> {next}", self.stage);
        self.events.push(ModelEvent::StageChanged {
            from: self.stage,
            to: next,
        });
        self.stage = next;
        self.stall_elapsed = 0.0;
        if next == LoadStage::CompleteSetup {
            log::info!("Model {} ready", self.home_dir);
            self.events.push(ModelEvent::Ready);
        }
    }

    fn next_stage(&mut self) {
        let next = self.stage.advance(&self.plan);
        self.enter(next);
    }

    fn fail(&mut self, reason: impl Into<String>) {
        let reason = reason.into();
        let stage = self.stage;
        log::error!("Model {} failed in {stage}: {reason}", self.home_dir);
        self.enter(LoadStage::Failed);
        self.events.push(ModelEvent::LoadFailed { stage, reason });
    }

    /// One fetch of a fan-out resolved. Moves on once all of them have.
    fn resolve_one(&mut self) -> bool {
        self.pending = self.pending.saturating_sub(1);
        self.stall_elapsed = 0.0;
        if self.pending == 0 {
            self.next_stage();
            true
        } else {
            false
        }
    }

    /// Runs stages until the loader waits on a fetch or reaches a terminal
    /// stage.
    fn drive(&mut self, backend: &mut dyn PuppetBackend) {
        loop {
            let Some(settings) = self.settings.as_ref() else {
                return;
            };

            match self.stage {
                LoadStage::LoadModel => {
                    let Some(moc) = settings.moc_file().map(str::to_string) else {
                        self.fail(PuppetError::MissingReference("FileReferences.Moc").to_string());
                        return;
                    };
                    self.pending = 1;
                    self.request(Resource::Moc, &moc);
                    self.next_stage();
                }
                LoadStage::LoadExpression => {
                    let files: Vec<String> = settings.expressions().map(|e| e.file.clone()).collect();
                    self.pending = files.len();
                    for (index, file) in files.iter().enumerate() {
                        self.request(Resource::Expression { index }, file);
                    }
                    self.next_stage();
                }
                LoadStage::LoadPhysics => {
                    let file = settings.physics_file().unwrap_or_default().to_string();
                    self.pending = 1;
                    self.request(Resource::Physics, &file);
                    self.next_stage();
                }
                LoadStage::LoadPose => {
                    let file = settings.pose_file().unwrap_or_default().to_string();
                    self.pending = 1;
                    self.request(Resource::Pose, &file);
                    self.next_stage();
                }
                LoadStage::SetupEyeBlink => {
                    let ids = settings.eye_blink_ids();
                    if !ids.is_empty() {
                        let seed = self.rng.random::<u64>();
                        self.eye_blink = Some(EyeBlink::new(ids, seed));
                    }
                    self.next_stage();
                }
                LoadStage::SetupBreath => {
                    self.breath = Some(Breath::standard());
                    self.next_stage();
                }
                LoadStage::LoadUserData => {
                    let file = settings.user_data_file().unwrap_or_default().to_string();
                    self.pending = 1;
                    self.request(Resource::UserData, &file);
                    self.next_stage();
                }
                LoadStage::SetupEyeBlinkIds => {
                    self.eye_blink_ids = settings.eye_blink_ids();
                    self.next_stage();
                }
                LoadStage::SetupLipSyncIds => {
                    self.lip_sync_ids = settings.lip_sync_ids();
                    self.next_stage();
                }
                LoadStage::SetupLayout => {
                    let Some(matrix) = self.model_matrix.as_mut() else {
                        self.fail("layout requires the settings and a model matrix");
                        return;
                    };
                    matrix.setup_from_layout(&settings.layout);
                    self.next_stage();
                }
                LoadStage::LoadMotion => {
                    let requests: Vec<(String, usize, String)> = settings
                        .motion_groups()
                        .flat_map(|(group, motions)| {
                            motions
                                .iter()
                                .enumerate()
                                .map(move |(index, m)| (group.to_string(), index, m.file.clone()))
                        })
                        .collect();

                    self.params.save();
                    self.pending = requests.len();
                    for (group, index, file) in requests {
                        self.request(Resource::Motion { group, index }, &file);
                    }
                    if self.pending == 0 {
                        self.stop_all_motions();
                    }
                    self.next_stage();
                }
                LoadStage::LoadTexture => {
                    if let Err(e) = self.setup_textures(backend) {
                        self.fail(e.to_string());
                        return;
                    }
                    self.next_stage();
                }
                LoadStage::LoadAssets
                | LoadStage::WaitLoadModel
                | LoadStage::WaitLoadExpression
                | LoadStage::WaitLoadPhysics
                | LoadStage::WaitLoadPose
                | LoadStage::WaitLoadUserData
                | LoadStage::WaitLoadMotion
                | LoadStage::WaitLoadTexture
                | LoadStage::CompleteSetup
                | LoadStage::Failed => return,
            }
        }
    }

    fn setup_textures(&mut self, backend: &mut dyn PuppetBackend) -> Result<()> {
        let mesh = self
            .mesh
            .as_deref()
            .ok_or(PuppetError::MissingReference("model mesh"))?;
        let mut renderer = backend.create_renderer(mesh)?;
        renderer.set_premultiplied_alpha(self.premultiplied_alpha);
        self.renderer = Some(renderer);

        let slots: Vec<(usize, String)> = self
            .settings
            .as_ref()
            .map(|s| {
                s.texture_slots()
                    .iter()
                    .enumerate()
                    .filter(|(_, file)| !file.is_empty())
                    .map(|(slot, file)| (slot, file.clone()))
                    .collect()
            })
            .unwrap_or_default();

        self.pending = slots.len();
        let premultiply = self.premultiplied_alpha;
        for (slot, file) in slots {
            self.request(Resource::Texture { slot, premultiply }, &file);
        }
        Ok(())
    }

    /// Applies a finished fetch, then runs every stage it unblocks.
    pub fn on_fetched(
        &mut self,
        resource: Resource,
        path: &str,
        result: Result<Vec<u8>>,
        backend: &mut dyn PuppetBackend,
    ) {
        match (self.stage, resource) {
            (LoadStage::LoadAssets, Resource::Settings) => {
                match result.and_then(|bytes| ModelSettings::from_slice(&bytes)) {
                    Ok(settings) => {
                        self.plan = LoadPlan::from_settings(&settings);
                        self.settings = Some(settings);
                        self.next_stage();
                    }
                    Err(e) => {
                        self.fail(format!("settings {path}: {e}"));
                        return;
                    }
                }
            }
            (LoadStage::WaitLoadModel, Resource::Moc) => {
                match result.and_then(|bytes| backend.load_moc(&bytes)) {
                    Ok(mesh) => {
                        self.params = ParameterBuffer::from_table(mesh.parameter_table());
                        self.model_matrix = Some(ModelMatrix::new(mesh.canvas_width(), mesh.canvas_height()));
                        self.mesh = Some(mesh);
                        self.pending = 0;
                        self.next_stage();
                    }
                    Err(e) => {
                        self.fail(format!("model binary {path}: {e}"));
                        return;
                    }
                }
            }
            (LoadStage::WaitLoadExpression, Resource::Expression { index }) => {
                let name = self
                    .settings
                    .as_ref()
                    .and_then(|s| s.expressions().nth(index))
                    .map(|e| e.name.clone())
                    .unwrap_or_default();
                match result.and_then(|bytes| backend.load_expression(&bytes, &name)) {
                    Ok(clip) => self.insert_expression(name, Rc::from(clip)),
                    Err(e) => log::warn!("Expression '{name}' ({path}) skipped: {e}"),
                }
                self.resolve_one();
            }
            (LoadStage::WaitLoadPhysics, Resource::Physics) => {
                match result.and_then(|bytes| backend.load_physics(&bytes)) {
                    Ok(physics) => self.physics = Some(physics),
                    Err(e) => log::warn!("Physics ({path}) skipped: {e}"),
                }
                self.resolve_one();
            }
            (LoadStage::WaitLoadPose, Resource::Pose) => {
                match result.and_then(|bytes| backend.load_pose(&bytes)) {
                    Ok(pose) => self.pose = Some(pose),
                    Err(e) => log::warn!("Pose ({path}) skipped: {e}"),
                }
                self.resolve_one();
            }
            (LoadStage::WaitLoadUserData, Resource::UserData) => {
                match result.and_then(|bytes| parse_user_data(&bytes)) {
                    Ok(entries) => self.user_data = entries,
                    Err(e) => log::warn!("User data ({path}) skipped: {e}"),
                }
                self.resolve_one();
            }
            (LoadStage::WaitLoadMotion, Resource::Motion { group, index }) => {
                let name = format!("{group}_{index}");
                match result.and_then(|bytes| backend.load_motion(&bytes, &name)) {
                    Ok(clip) => self.insert_motion(&group, index, clip),
                    Err(e) => {
                        log::warn!("Motion {name} ({path}) skipped: {e}");
                        self.unavailable_motions.insert(name);
                    }
                }
                if self.pending == 1 {
                    self.stop_all_motions();
                }
                self.resolve_one();
            }
            (LoadStage::CompleteSetup, Resource::Motion { group, index }) => {
                self.on_deferred_motion(&group, index, path, result, backend);
                return;
            }
            (_, Resource::Voice { seq }) => {
                if seq != self.voice_seq {
                    log::debug!("Dropping superseded voice #{seq} ({path})");
                    return;
                }
                match result.and_then(|bytes| VoiceClip::from_wav(&bytes)) {
                    Ok(clip) => self.voice.start(clip),
                    Err(e) => log::warn!("Voice ({path}) skipped: {e}"),
                }
                return;
            }
            (stage, resource) => {
                log::debug!("Dropping unexpected {resource} completion in {stage} ({path})");
                return;
            }
        }

        self.drive(backend);
    }

    /// Binds a finished texture into its renderer slot.
    pub fn on_texture(&mut self, slot: usize, result: Result<TextureRecord>) {
        if self.stage != LoadStage::WaitLoadTexture {
            log::debug!("Dropping texture slot {slot} completion in {}", self.stage);
            return;
        }
        match result {
            Ok(record) => {
                if let Some(renderer) = self.renderer.as_mut() {
                    renderer.bind_texture(slot, record.gpu);
                }
            }
            Err(e) => log::warn!("Texture slot {slot} left unbound: {e}"),
        }
        self.resolve_one();
    }

    /// Advances the stall watchdog. A model that waits on the same stage for
    /// longer than `timeout` seconds without progress fails.
    pub fn tick_loader(&mut self, dt: f32, timeout: Option<f32>) {
        if !self.stage.is_waiting() {
            return;
        }
        self.stall_elapsed += dt;
        if let Some(limit) = timeout
            && self.stall_elapsed > limit
        {
            let err = PuppetError::LoadStalled {
                stage: self.stage.to_string(),
                seconds: self.stall_elapsed,
            };
            self.fail(err.to_string());
        }
    }

    /// A motion fetched on demand arrived. Starts it unless a later start
    /// superseded the request.
    fn on_deferred_motion(
        &mut self,
        group: &str,
        index: usize,
        path: &str,
        result: Result<Vec<u8>>,
        backend: &mut dyn PuppetBackend,
    ) {
        let name = format!("{group}_{index}");
        let loaded = match result.and_then(|bytes| backend.load_motion(&bytes, &name)) {
            Ok(clip) => {
                self.insert_motion(group, index, clip);
                true
            }
            Err(e) => {
                log::warn!("Motion {name} ({path}) unavailable: {e}");
                self.unavailable_motions.insert(name.clone());
                false
            }
        };

        let Some(deferred) = self
            .deferred_motion
            .take_if(|d| d.group == group && d.index == index)
        else {
            log::debug!("Motion {name} arrived after its start was superseded");
            return;
        };
        match self.motions.get(&name).cloned() {
            Some(clip) if loaded => {
                self.begin_motion(group, index, deferred.priority, clip, deferred.on_finished);
            }
            _ => self.motion_queue.cancel_reservation(deferred.priority),
        }
    }

    fn insert_expression(&mut self, name: String, clip: Rc<dyn MotionClip>) {
        if let Some(entry) = self.expressions.iter_mut().find(|(n, _)| *n == name) {
            entry.1 = clip;
        } else {
            self.expressions.push((name, clip));
        }
    }

    fn insert_motion(&mut self, group: &str, index: usize, mut clip: Box<dyn MotionClip>) {
        if let Some(entry) = self.settings.as_ref().and_then(|s| s.motion(group, index)) {
            if entry.fade_in_time >= 0.0 {
                clip.set_fade_in_time(entry.fade_in_time);
            }
            if entry.fade_out_time >= 0.0 {
                clip.set_fade_out_time(entry.fade_out_time);
            }
        }
        clip.set_effect_ids(&self.eye_blink_ids, &self.lip_sync_ids);

        let key = format!("{group}_{index}");
        if self.motions.insert(key.clone(), Rc::from(clip)).is_some() {
            log::debug!("Replaced motion {key}");
        }
    }
}
