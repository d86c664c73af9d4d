//! Shared fixtures for the integration tests.
//!
//! - a deformation backend whose mesh, renderer and rigs record what the
//!   runtime asked of them into one shared [`Recorder`]
//! - a recording GPU
//! - an in-memory model directory with every optional resource present

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::HashMap;
use std::io::Cursor;
use std::rc::Rc;

use glam::Mat4;
use serde_json::json;

use myth_puppet::animation::motion::MotionClip;
use myth_puppet::animation::parameters::{ParameterBuffer, ParameterId, ParameterInfo};
use myth_puppet::assets::image::DecodedImage;
use myth_puppet::assets::io::join_asset_path;
use myth_puppet::assets::{AssetReaderVariant, MemoryAssetReader};
use myth_puppet::backend::{
    DrawableBounds, GpuContext, GpuTextureId, MeshRenderer, PhysicsRig, PoseRig, PuppetBackend,
    PuppetMesh,
};
use myth_puppet::config::{SceneConfig, StageConfig};
use myth_puppet::errors::{PuppetError, Result};
use myth_puppet::scene::{SceneManager, StageEvent};

pub const HARU_DIR: &str = "models/haru";
pub const HARU_SETTINGS: &str = "haru.model3.json";
pub const MARK_DIR: &str = "models/mark";
pub const MARK_SETTINGS: &str = "mark.model3.json";

/// Written by every motion the fake backend decodes.
pub const MOTION_PARAM: &str = "ParamMotion";

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

// ============================================================================
// Recorder
// ============================================================================

#[derive(Debug, Default)]
pub struct Recorder {
    pub commits: usize,
    pub draws: usize,
    pub last_mvp: Option<Mat4>,
    pub physics_steps: usize,
    pub pose_steps: usize,
    /// Parameters as each rig saw them on entry.
    pub physics_seen: Vec<Observed>,
    pub pose_seen: Vec<Observed>,
    /// Parameters as committed into the mesh, one per frame.
    pub committed: Vec<Observed>,
    pub renderers: usize,
    pub bound: Vec<(usize, GpuTextureId)>,
    pub premultiplied: Option<bool>,
    /// `(label, premultiplied, id)` per created texture.
    pub created: Vec<(String, bool, GpuTextureId)>,
    pub updated: Vec<GpuTextureId>,
    pub deleted: Vec<GpuTextureId>,
    next_texture: u64,
}

pub type Shared = Rc<RefCell<Recorder>>;

/// The parameters the ordering tests look at.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Observed {
    pub angle_x: f32,
    pub eye_ball_x: f32,
    pub eye_l_open: f32,
    pub mouth_open_y: f32,
    pub motion: f32,
}

impl Observed {
    fn of(params: &ParameterBuffer) -> Self {
        Self {
            angle_x: params.value(ParameterId::new("ParamAngleX")),
            eye_ball_x: params.value(ParameterId::new("ParamEyeBallX")),
            eye_l_open: params.value(ParameterId::new("ParamEyeLOpen")),
            mouth_open_y: params.value(ParameterId::new("ParamMouthOpenY")),
            motion: params.value(ParameterId::new(MOTION_PARAM)),
        }
    }
}

// ============================================================================
// Backend
// ============================================================================

pub struct FakeMesh {
    shared: Shared,
}

impl PuppetMesh for FakeMesh {
    fn canvas_width(&self) -> f32 {
        2.0
    }

    fn canvas_height(&self) -> f32 {
        2.0
    }

    fn parameter_table(&self) -> Vec<ParameterInfo> {
        vec![
            ParameterInfo::new("ParamAngleX", -30.0, 30.0, 0.0),
            ParameterInfo::new("ParamAngleY", -30.0, 30.0, 0.0),
            ParameterInfo::new("ParamAngleZ", -30.0, 30.0, 0.0),
            ParameterInfo::new("ParamBodyAngleX", -10.0, 10.0, 0.0),
            ParameterInfo::new("ParamEyeBallX", -1.0, 1.0, 0.0),
            ParameterInfo::new("ParamEyeBallY", -1.0, 1.0, 0.0),
            ParameterInfo::new("ParamBreath", 0.0, 1.0, 0.0),
            ParameterInfo::new("ParamEyeLOpen", 0.0, 1.0, 1.0),
            ParameterInfo::new("ParamEyeROpen", 0.0, 1.0, 1.0),
            ParameterInfo::new("ParamMouthOpenY", 0.0, 1.0, 0.0),
            ParameterInfo::new(MOTION_PARAM, 0.0, 10.0, 0.0),
        ]
    }

    fn drawable_bounds(&self, drawable_id: &str) -> Option<DrawableBounds> {
        match drawable_id {
            "HitAreaHead" => Some(DrawableBounds::new(-0.5, 1.0, 0.5, 0.5)),
            "HitAreaBody" => Some(DrawableBounds::new(-0.5, 0.4, 0.5, -1.0)),
            _ => None,
        }
    }

    fn commit(&mut self, params: &ParameterBuffer) {
        let mut shared = self.shared.borrow_mut();
        shared.commits += 1;
        shared.committed.push(Observed::of(params));
    }
}

pub struct FakeMotion {
    duration: f32,
    fade_in: f32,
    fade_out: f32,
}

impl MotionClip for FakeMotion {
    fn duration(&self) -> Option<f32> {
        Some(self.duration)
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
        params.set(ParameterId::new(MOTION_PARAM), 1.0, weight);
    }
}

struct FakePhysics(Shared);

impl PhysicsRig for FakePhysics {
    fn evaluate(&mut self, params: &mut ParameterBuffer, _dt: f32) {
        let mut shared = self.0.borrow_mut();
        shared.physics_steps += 1;
        shared.physics_seen.push(Observed::of(params));
    }
}

struct FakePose(Shared);

impl PoseRig for FakePose {
    fn update(&mut self, params: &mut ParameterBuffer, _dt: f32) {
        let mut shared = self.0.borrow_mut();
        shared.pose_steps += 1;
        shared.pose_seen.push(Observed::of(params));
    }
}

struct FakeRenderer(Shared);

impl MeshRenderer for FakeRenderer {
    fn bind_texture(&mut self, slot: usize, texture: GpuTextureId) {
        self.0.borrow_mut().bound.push((slot, texture));
    }

    fn set_premultiplied_alpha(&mut self, enabled: bool) {
        self.0.borrow_mut().premultiplied = Some(enabled);
    }

    fn draw(&mut self, _mesh: &dyn PuppetMesh, mvp: &Mat4) {
        let mut shared = self.0.borrow_mut();
        shared.draws += 1;
        shared.last_mvp = Some(*mvp);
    }
}

/// Accepts model binaries starting with `MOC`, motions whose bytes are a
/// duration in seconds and any physics or pose document except `bad`.
pub struct FakeBackend {
    pub shared: Shared,
}

impl PuppetBackend for FakeBackend {
    fn load_moc(&mut self, bytes: &[u8]) -> Result<Box<dyn PuppetMesh>> {
        if !bytes.starts_with(b"MOC") {
            return Err(PuppetError::BackendError("not a model binary".to_string()));
        }
        Ok(Box::new(FakeMesh {
            shared: Rc::clone(&self.shared),
        }))
    }

    fn load_motion(&mut self, bytes: &[u8], name: &str) -> Result<Box<dyn MotionClip>> {
        let duration = std::str::from_utf8(bytes)
            .ok()
            .and_then(|s| s.trim().parse::<f32>().ok())
            .ok_or_else(|| PuppetError::BackendError(format!("motion {name} is not a duration")))?;
        Ok(Box::new(FakeMotion {
            duration,
            fade_in: 0.0,
            fade_out: 0.0,
        }))
    }

    fn load_physics(&mut self, bytes: &[u8]) -> Result<Box<dyn PhysicsRig>> {
        if bytes == b"bad" {
            return Err(PuppetError::BackendError("bad physics".to_string()));
        }
        Ok(Box::new(FakePhysics(Rc::clone(&self.shared))))
    }

    fn load_pose(&mut self, bytes: &[u8]) -> Result<Box<dyn PoseRig>> {
        if bytes == b"bad" {
            return Err(PuppetError::BackendError("bad pose".to_string()));
        }
        Ok(Box::new(FakePose(Rc::clone(&self.shared))))
    }

    fn create_renderer(&mut self, _mesh: &dyn PuppetMesh) -> Result<Box<dyn MeshRenderer>> {
        self.shared.borrow_mut().renderers += 1;
        Ok(Box::new(FakeRenderer(Rc::clone(&self.shared))))
    }
}

// ============================================================================
// GPU
// ============================================================================

pub struct FakeGpu {
    pub shared: Shared,
}

impl GpuContext for FakeGpu {
    fn create_texture(&mut self, image: &DecodedImage, _mipmaps: bool) -> Result<GpuTextureId> {
        let mut shared = self.shared.borrow_mut();
        shared.next_texture += 1;
        let id = GpuTextureId(shared.next_texture);
        shared
            .created
            .push((image.label.clone(), image.premultiplied, id));
        Ok(id)
    }

    fn update_texture(&mut self, texture: GpuTextureId, _image: &DecodedImage) -> Result<()> {
        self.shared.borrow_mut().updated.push(texture);
        Ok(())
    }

    fn delete_texture(&mut self, texture: GpuTextureId) {
        self.shared.borrow_mut().deleted.push(texture);
    }
}

// ============================================================================
// Asset builders
// ============================================================================

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(width, height, image::Rgba([200, 100, 50, 128]));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png)
        .expect("encode png");
    out.into_inner()
}

/// Mono 16 kHz WAV holding a constant signal.
pub fn wav_bytes(amplitude: f32, seconds: f32) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 16_000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut out = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut out, spec).expect("wav writer");
        let value = (amplitude * f32::from(i16::MAX)) as i16;
        for _ in 0..(16_000.0 * seconds) as usize {
            writer.write_sample(value).expect("write sample");
        }
        writer.finalize().expect("finalize wav");
    }
    out.into_inner()
}

pub fn full_settings() -> serde_json::Value {
    json!({
        "Version": 3,
        "FileReferences": {
            "Moc": "haru.moc3",
            "Textures": ["textures/texture_00.png", "textures/texture_01.png"],
            "Physics": "haru.physics3.json",
            "Pose": "haru.pose3.json",
            "UserData": "haru.userdata3.json",
            "Expressions": [
                { "Name": "f01", "File": "expressions/f01.exp3.json" },
                { "Name": "f02", "File": "expressions/f02.exp3.json" }
            ],
            "Motions": {
                "Idle": [
                    { "File": "motions/idle_00.motion3.json" },
                    { "File": "motions/idle_01.motion3.json" }
                ],
                "TapBody": [
                    { "File": "motions/tap_00.motion3.json", "Sound": "sounds/tap_00.wav" },
                    { "File": "motions/tap_01.motion3.json", "FadeInTime": 0.5 }
                ]
            }
        },
        "Groups": [
            { "Target": "Parameter", "Name": "EyeBlink", "Ids": ["ParamEyeLOpen", "ParamEyeROpen"] },
            { "Target": "Parameter", "Name": "LipSync", "Ids": ["ParamMouthOpenY"] }
        ],
        "HitAreas": [
            { "Id": "HitAreaHead", "Name": "Head" },
            { "Id": "HitAreaBody", "Name": "Body" }
        ],
        "Layout": {}
    })
}

/// Only the model binary; every optional resource absent.
pub fn minimal_settings() -> serde_json::Value {
    json!({
        "Version": 3,
        "FileReferences": { "Moc": "mark.moc3" }
    })
}

/// Every file referenced by [`full_settings`], keyed by file name relative
/// to the model directory.
pub fn full_files() -> HashMap<String, Vec<u8>> {
    let expression = |value: f32| {
        json!({
            "Type": "Live2D Expression",
            "FadeInTime": 0.5,
            "FadeOutTime": 0.5,
            "Parameters": [{ "Id": "ParamEyeBallX", "Value": value, "Blend": "Add" }]
        })
        .to_string()
        .into_bytes()
    };

    let mut files = HashMap::new();
    files.insert(HARU_SETTINGS.to_string(), full_settings().to_string().into_bytes());
    files.insert("haru.moc3".to_string(), b"MOC3 haru".to_vec());
    files.insert("textures/texture_00.png".to_string(), png_bytes(4, 4));
    files.insert("textures/texture_01.png".to_string(), png_bytes(8, 8));
    files.insert("haru.physics3.json".to_string(), b"{}".to_vec());
    files.insert("haru.pose3.json".to_string(), b"{}".to_vec());
    files.insert(
        "haru.userdata3.json".to_string(),
        json!({ "UserData": [{ "Target": "ArtMesh", "Id": "ArtMesh1", "Value": "ribbon" }] })
            .to_string()
            .into_bytes(),
    );
    files.insert("expressions/f01.exp3.json".to_string(), expression(0.1));
    files.insert("expressions/f02.exp3.json".to_string(), expression(-0.1));
    files.insert("motions/idle_00.motion3.json".to_string(), b"2.0".to_vec());
    files.insert("motions/idle_01.motion3.json".to_string(), b"3.0".to_vec());
    files.insert("motions/tap_00.motion3.json".to_string(), b"1.0".to_vec());
    files.insert("motions/tap_01.motion3.json".to_string(), b"1.0".to_vec());
    files.insert("sounds/tap_00.wav".to_string(), wav_bytes(0.5, 1.0));
    files
}

pub fn minimal_files() -> HashMap<String, Vec<u8>> {
    let mut files = HashMap::new();
    files.insert(MARK_SETTINGS.to_string(), minimal_settings().to_string().into_bytes());
    files.insert("mark.moc3".to_string(), b"MOC3 mark".to_vec());
    files
}

/// Adds `files` under `dir` to `reader`.
pub fn mount(reader: &mut MemoryAssetReader, dir: &str, files: &HashMap<String, Vec<u8>>) {
    for (name, bytes) in files {
        reader.insert(join_asset_path(dir, name), bytes.clone());
    }
}

/// Reader with both the full and the minimal model mounted.
pub fn both_models() -> MemoryAssetReader {
    let mut reader = MemoryAssetReader::new();
    mount(&mut reader, HARU_DIR, &full_files());
    mount(&mut reader, MARK_DIR, &minimal_files());
    reader
}

// ============================================================================
// Stage
// ============================================================================

pub fn stage_config() -> StageConfig {
    let mut config = StageConfig::default()
        .with_scene(
            SceneConfig::new(HARU_DIR, HARU_SETTINGS)
                .with_expression_area("Head")
                .with_interaction("Body", "TapBody"),
        )
        .with_scene(SceneConfig::new(MARK_DIR, MARK_SETTINGS));
    config.rng_seed = Some(7);
    config
}

pub struct Harness {
    pub manager: SceneManager,
    pub shared: Shared,
    pub events: Rc<RefCell<Vec<StageEvent>>>,
}

impl Harness {
    pub fn new(config: StageConfig, reader: MemoryAssetReader) -> Self {
        init_logger();
        let shared = Shared::default();
        let backend = FakeBackend {
            shared: Rc::clone(&shared),
        };
        let gpu = FakeGpu {
            shared: Rc::clone(&shared),
        };
        let mut manager = SceneManager::new(
            config,
            AssetReaderVariant::memory(reader),
            Box::new(backend),
            Box::new(gpu),
        )
        .expect("valid config");
        manager.resize(600, 600);

        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&events);
        manager.set_event_sink(move |event| sink.borrow_mut().push(event.clone()));

        Self {
            manager,
            shared,
            events,
        }
    }

    /// Event kinds seen so far, in order.
    pub fn kinds(&self) -> Vec<&'static str> {
        self.events.borrow().iter().map(StageEvent::kind).collect()
    }
}
