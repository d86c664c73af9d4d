//! Scene Manager Tests
//!
//! Tests for:
//! - Scene switching and scene index bounds
//! - Idle motion looping
//! - Tap routing (hit areas, expression area, interaction groups, priority)
//! - Drag and pointer routing
//! - Stale completions after a scene change
//! - Projection for portrait and landscape canvases
//! - Lip sync from a motion's voice
//! - Texture reuse across scenes and release
//! - Frame composition order (drag before physics, lip sync before pose,
//!   eye blink only on frames without motion)
//! - Motions fetched on demand

mod common;

use common::{
    HARU_DIR, HARU_SETTINGS, Harness, MOTION_PARAM, both_models, full_files, full_settings, mount,
    stage_config,
};
use myth_puppet::animation::parameters::ParameterId;
use myth_puppet::animation::priority::Priority;
use myth_puppet::assets::MemoryAssetReader;
use myth_puppet::assets::io::join_asset_path;
use myth_puppet::errors::PuppetError;
use myth_puppet::model::{LoadStage, ModelEvent};
use myth_puppet::scene::StageEvent;

const DT: f32 = 1.0 / 60.0;

fn loaded(config: myth_puppet::config::StageConfig) -> Harness {
    loaded_from(config, both_models())
}

fn loaded_from(config: myth_puppet::config::StageConfig, reader: MemoryAssetReader) -> Harness {
    let mut h = Harness::new(config, reader);
    h.manager.change_scene(0).unwrap();
    h.manager.on_update(DT);
    assert_eq!(h.manager.active_model().unwrap().stage(), LoadStage::CompleteSetup);
    h
}

fn started(h: &Harness, wanted: &str) -> Vec<(usize, Priority)> {
    h.events
        .borrow()
        .iter()
        .filter_map(|e| match e {
            StageEvent::Model {
                event:
                    ModelEvent::MotionStarted {
                        group,
                        index,
                        priority,
                        ..
                    },
                ..
            } if group == wanted => Some((*index, *priority)),
            _ => None,
        })
        .collect()
}

fn param(h: &Harness, name: &str) -> f32 {
    h.manager
        .active_model()
        .unwrap()
        .parameters()
        .value(ParameterId::new(name))
}

// ============================================================================
// Scene Switching
// ============================================================================

#[test]
fn change_scene_rejects_out_of_range_index() {
    let mut h = Harness::new(stage_config(), both_models());
    let err = h.manager.change_scene(2).unwrap_err();
    assert!(matches!(
        err,
        PuppetError::SceneIndexOutOfBounds { index: 2, count: 2 }
    ));
    assert!(h.manager.scene_index().is_none());
    assert_eq!(h.manager.models().count(), 0);
}

#[test]
fn next_scene_cycles_through_scenes() {
    let mut h = Harness::new(stage_config(), both_models());
    h.manager.next_scene().unwrap();
    assert_eq!(h.manager.scene_index(), Some(0));
    h.manager.next_scene().unwrap();
    assert_eq!(h.manager.scene_index(), Some(1));
    h.manager.next_scene().unwrap();
    assert_eq!(h.manager.scene_index(), Some(0));
    assert_eq!(h.manager.models().count(), 1);

    let changes: Vec<usize> = h
        .events
        .borrow()
        .iter()
        .filter_map(|e| match e {
            StageEvent::SceneChanged { index } => Some(*index),
            _ => None,
        })
        .collect();
    assert_eq!(changes, vec![0, 1, 0]);
}

#[test]
fn each_scene_change_uses_a_fresh_generation() {
    let mut h = Harness::new(stage_config(), both_models());
    h.manager.change_scene(0).unwrap();
    let first = h.manager.active_model().unwrap().generation();
    h.manager.change_scene(0).unwrap();
    let second = h.manager.active_model().unwrap().generation();
    assert!(second > first);
}

// ============================================================================
// Idle Loop
// ============================================================================

#[test]
fn idle_motion_keeps_playing() {
    let mut h = loaded(stage_config());

    let mut idle_frames = 0;
    for _ in 0..600 {
        h.manager.on_update(DT);
        let queue = h.manager.active_model().unwrap().motion_queue();
        if queue.is_finished() {
            idle_frames += 1;
            assert!(idle_frames < 2, "queue stayed empty for two frames in a row");
        } else {
            idle_frames = 0;
        }
    }

    let idle = started(&h, "Idle");
    assert!(idle.len() >= 3, "only {} idle motions in ten seconds", idle.len());
    assert!(idle.iter().all(|(_, priority)| *priority == Priority::Idle));
    assert!(param(&h, MOTION_PARAM) > 0.0);
}

// ============================================================================
// Taps
// ============================================================================

#[test]
fn tap_on_body_starts_uniform_random_tap_motion() {
    let mut config = stage_config();
    config.priority = Priority::Force;
    let mut h = loaded(config);

    for _ in 0..200 {
        h.manager.on_tap(0.0, -0.5);
    }

    let taps = started(&h, "TapBody");
    assert_eq!(taps.len(), 200);
    assert!(taps.iter().all(|(_, priority)| *priority == Priority::Force));
    let zeros = taps.iter().filter(|(index, _)| *index == 0).count();
    let ones = taps.iter().filter(|(index, _)| *index == 1).count();
    assert_eq!(zeros + ones, 200);
    assert!((60..=140).contains(&zeros), "index 0 chosen {zeros}/200 times");
}

#[test]
fn normal_tap_does_not_interrupt_normal_motion() {
    let mut h = loaded(stage_config());

    h.manager.on_tap(0.0, -0.5);
    h.manager.on_tap(0.0, -0.5);

    assert_eq!(started(&h, "TapBody").len(), 1);
    let interactions = h
        .events
        .borrow()
        .iter()
        .filter(|e| matches!(e, StageEvent::Interacted { .. }))
        .count();
    assert_eq!(interactions, 2);
}

#[test]
fn tap_on_head_sets_random_expression() {
    let mut h = loaded(stage_config());
    h.manager.on_tap(0.0, 0.75);

    let names: Vec<String> = h
        .events
        .borrow()
        .iter()
        .filter_map(|e| match e {
            StageEvent::Model {
                event: ModelEvent::ExpressionSet { name },
                ..
            } => Some(name.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(names.len(), 1);
    assert!(names[0] == "f01" || names[0] == "f02");
    assert!(started(&h, "TapBody").is_empty());
    assert!(!h.manager.active_model().unwrap().expression_queue().is_empty());
}

#[test]
fn tap_outside_hit_areas_only_reports_interaction() {
    let mut h = loaded(stage_config());
    let before = h.events.borrow().len();
    h.manager.on_tap(0.9, 0.9);

    let events = h.events.borrow();
    assert_eq!(events.len(), before + 1);
    assert!(matches!(events[before], StageEvent::Interacted { .. }));
}

#[test]
fn transparent_model_ignores_taps() {
    let mut config = stage_config();
    config.priority = Priority::Force;
    let mut h = loaded(config);
    h.manager.active_model_mut().unwrap().set_opacity(0.5);

    h.manager.on_tap(0.0, -0.5);
    assert!(started(&h, "TapBody").is_empty());
}

// ============================================================================
// Drag
// ============================================================================

#[test]
fn drag_offsets_do_not_accumulate() {
    let mut h = loaded(stage_config());
    let eye_ball_x = "ParamEyeBallX";

    h.manager.on_drag(0.5, 0.0);
    for _ in 0..10 {
        h.manager.on_update(DT);
        assert!((param(&h, eye_ball_x) - 0.5).abs() < 1e-5);
        let saved = h
            .manager
            .active_model()
            .unwrap()
            .parameters()
            .saved_value(ParameterId::new("ParamAngleX"));
        assert!(saved.abs() < 1e-5, "drag leaked into the baseline: {saved}");
    }

    h.manager.on_drag(0.0, 0.0);
    h.manager.on_update(DT);
    assert!(param(&h, eye_ball_x).abs() < 1e-6);
}

#[test]
fn pointer_release_resets_drag_and_taps() {
    let mut h = loaded(stage_config());

    h.manager.pointer_down(300.0, 300.0);
    h.manager.pointer_move(450.0, 300.0);
    let drag = h.manager.active_model().unwrap().drag();
    assert!((drag.x - 0.5).abs() < 1e-5);
    assert!(drag.y.abs() < 1e-5);

    h.manager.pointer_up(450.0, 300.0);
    assert_eq!(h.manager.active_model().unwrap().drag(), glam::Vec2::ZERO);

    let events = h.events.borrow();
    let Some(StageEvent::Interacted { x, y }) = events
        .iter()
        .rev()
        .find(|e| matches!(e, StageEvent::Interacted { .. }))
    else {
        panic!("no tap after release");
    };
    assert!((x - 0.5).abs() < 1e-5);
    assert!(y.abs() < 1e-5);
}

#[test]
fn pointer_move_without_press_is_ignored() {
    let mut h = loaded(stage_config());
    h.manager.pointer_move(450.0, 300.0);
    assert_eq!(h.manager.active_model().unwrap().drag(), glam::Vec2::ZERO);
}

// ============================================================================
// Stale Completions
// ============================================================================

#[test]
fn stale_completions_never_reach_the_new_model() {
    let mut reader = both_models();
    let gate = reader.gate(join_asset_path(HARU_DIR, "haru.moc3"));
    let mut h = Harness::new(stage_config(), reader);

    h.manager.change_scene(0).unwrap();
    h.manager.on_update(DT);
    h.manager.on_update(DT);
    assert_eq!(h.manager.active_model().unwrap().stage(), LoadStage::WaitLoadModel);
    assert_eq!(h.shared.borrow().commits, 0);
    assert_eq!(h.shared.borrow().draws, 0);

    h.manager.change_scene(1).unwrap();
    gate.open();
    h.manager.on_update(DT);

    assert_eq!(h.manager.models().count(), 1);
    let model = h.manager.active_model().unwrap();
    assert_eq!(model.home_dir(), "models/mark");
    assert_eq!(model.stage(), LoadStage::CompleteSetup);
    assert_eq!(h.shared.borrow().renderers, 1);
    assert!(!model.has_physics());
}

// ============================================================================
// Projection
// ============================================================================

#[test]
fn portrait_canvas_fits_model_width() {
    let mut h = loaded(stage_config());
    h.manager.resize(300, 600);
    h.manager.on_update(DT);

    let mvp = h.shared.borrow().last_mvp.unwrap();
    assert!((mvp.x_axis.x - 1.0).abs() < 1e-6);
    assert!((mvp.y_axis.y - 0.5).abs() < 1e-6);
}

#[test]
fn landscape_canvas_scales_x_by_aspect() {
    let mut h = loaded(stage_config());
    h.manager.resize(800, 400);
    h.manager.on_update(DT);

    let mvp = h.shared.borrow().last_mvp.unwrap();
    assert!((mvp.x_axis.x - 0.5).abs() < 1e-6);
    assert!((mvp.y_axis.y - 1.0).abs() < 1e-6);
}

// ============================================================================
// Lip Sync
// ============================================================================

#[test]
fn motion_voice_drives_lip_sync() {
    let mut h = loaded(stage_config());
    let handle = h
        .manager
        .active_model_mut()
        .unwrap()
        .start_motion("TapBody", 0, Priority::Force, None);
    assert!(handle.is_some());

    h.manager.on_update(DT);
    let model = h.manager.active_model().unwrap();
    assert!((model.voice_level() - 0.5).abs() < 0.01);
    assert!((param(&h, "ParamMouthOpenY") - 0.4).abs() < 0.01);
}

#[test]
fn lip_sync_disabled_skips_voice() {
    let mut config = stage_config();
    config.lip_sync = false;
    let mut h = loaded(config);
    h.manager
        .active_model_mut()
        .unwrap()
        .start_motion("TapBody", 0, Priority::Force, None);

    h.manager.on_update(DT);
    assert!(h.manager.active_model().unwrap().voice_level().abs() < f32::EPSILON);
    assert!(param(&h, "ParamMouthOpenY").abs() < f32::EPSILON);
}

// ============================================================================
// Textures & Release
// ============================================================================

#[test]
fn reloading_a_scene_reuses_texture_identity() {
    let mut h = loaded(stage_config());
    let first: Vec<_> = h.shared.borrow().bound.clone();

    h.manager.change_scene(1).unwrap();
    h.manager.on_update(DT);
    h.manager.change_scene(0).unwrap();
    h.manager.on_update(DT);

    let shared = h.shared.borrow();
    assert_eq!(shared.created.len(), 2);
    assert_eq!(shared.updated.len(), 2);
    let mut again: Vec<_> = shared.bound[first.len()..].to_vec();
    let mut first = first;
    again.sort();
    first.sort();
    assert_eq!(again, first);
    assert_eq!(h.manager.textures().len(), 2);
}

#[test]
fn release_drops_models_and_textures() {
    let mut h = loaded(stage_config());
    h.manager.release();

    assert_eq!(h.manager.models().count(), 0);
    assert!(h.manager.active_model().is_none());
    assert!(h.manager.textures().is_empty());
    assert_eq!(h.shared.borrow().deleted.len(), 2);

    let draws = h.shared.borrow().draws;
    h.manager.on_update(DT);
    assert_eq!(h.shared.borrow().draws, draws);
}

// ============================================================================
// Frame Composition Order
// ============================================================================

/// Haru without an idle group and with a 30 second first tap motion.
fn haru_without_idle() -> MemoryAssetReader {
    let mut settings = full_settings();
    if let Some(motions) = settings["FileReferences"]["Motions"].as_object_mut() {
        motions.remove("Idle");
    }
    let mut files = full_files();
    files.insert(HARU_SETTINGS.to_string(), settings.to_string().into_bytes());
    files.insert("motions/tap_00.motion3.json".to_string(), b"30.0".to_vec());
    let mut reader = MemoryAssetReader::new();
    mount(&mut reader, HARU_DIR, &files);
    reader
}

#[test]
fn physics_sees_drag_offsets() {
    let mut still = loaded(stage_config());
    let mut dragged = loaded(stage_config());
    dragged.manager.on_drag(0.5, 0.0);

    for _ in 0..5 {
        still.manager.on_update(DT);
        dragged.manager.on_update(DT);
    }

    let base = *still.shared.borrow().physics_seen.last().unwrap();
    let seen = *dragged.shared.borrow().physics_seen.last().unwrap();
    assert!(
        (seen.angle_x - base.angle_x - 15.0).abs() < 1e-4,
        "physics saw angle x {} against {}",
        seen.angle_x,
        base.angle_x
    );
    assert!((seen.eye_ball_x - 0.5).abs() < 1e-5);
    assert!(base.eye_ball_x.abs() < 1e-5);
}

#[test]
fn lip_sync_lands_between_physics_and_pose() {
    let mut h = loaded(stage_config());
    h.manager
        .active_model_mut()
        .unwrap()
        .start_motion("TapBody", 0, Priority::Force, None);
    h.manager.on_update(DT);

    let shared = h.shared.borrow();
    let physics = shared.physics_seen.last().unwrap();
    let pose = shared.pose_seen.last().unwrap();
    let committed = shared.committed.last().unwrap();
    assert!(physics.mouth_open_y.abs() < 1e-6, "physics saw mouth {}", physics.mouth_open_y);
    assert!((pose.mouth_open_y - 0.4).abs() < 0.01, "pose saw mouth {}", pose.mouth_open_y);
    assert!((committed.mouth_open_y - 0.4).abs() < 0.01);
}

#[test]
fn eye_blink_runs_while_nothing_plays() {
    let mut h = loaded_from(stage_config(), haru_without_idle());
    for _ in 0..600 {
        h.manager.on_update(DT);
    }

    assert!(h.manager.active_model().unwrap().motion_queue().is_empty());
    let shared = h.shared.borrow();
    let lowest = shared
        .committed
        .iter()
        .map(|o| o.eye_l_open)
        .fold(f32::MAX, f32::min);
    assert!(lowest < 0.5, "eyes never closed in ten seconds (lowest {lowest})");
}

#[test]
fn eye_blink_is_skipped_while_a_motion_plays() {
    let mut h = loaded_from(stage_config(), haru_without_idle());
    let handle = h
        .manager
        .active_model_mut()
        .unwrap()
        .start_motion("TapBody", 0, Priority::Force, None);
    assert!(handle.is_some());

    let before = h.shared.borrow().committed.len();
    for _ in 0..600 {
        h.manager.on_update(DT);
    }

    let shared = h.shared.borrow();
    let frames = &shared.committed[before..];
    assert_eq!(frames.len(), 600);
    assert!(
        frames.iter().all(|o| (o.eye_l_open - 1.0).abs() < 1e-6),
        "eye blink overwrote the motion's eyes"
    );
    assert!(frames.iter().skip(1).all(|o| (o.motion - 1.0).abs() < 1e-6));
}

// ============================================================================
// On-demand Motions
// ============================================================================

#[test]
fn released_motion_is_fetched_on_demand() {
    let mut h = loaded(stage_config());
    let model = h.manager.active_model_mut().unwrap();
    model.release_motions();
    assert!(!model.has_motion("TapBody_1"));

    assert!(model.start_motion("TapBody", 1, Priority::Force, None).is_none());
    assert_eq!(model.motion_queue().reserve_priority(), Priority::Force);
    assert!(started(&h, "TapBody").is_empty());

    h.manager.on_update(DT);

    assert_eq!(started(&h, "TapBody"), vec![(1, Priority::Force)]);
    let model = h.manager.active_model().unwrap();
    assert!(model.has_motion("TapBody_1"));
    assert_eq!(model.motion_queue().current_priority(), Priority::Force);
    assert_eq!(model.motion_queue().reserve_priority(), Priority::None);
}

#[test]
fn motion_that_failed_to_load_is_not_fetched_again() {
    let mut reader = both_models();
    reader.insert(
        join_asset_path(HARU_DIR, "motions/tap_01.motion3.json"),
        b"not a motion".to_vec(),
    );
    let mut h = loaded_from(stage_config(), reader);
    let model = h.manager.active_model_mut().unwrap();
    assert!(!model.has_motion("TapBody_1"));
    let _ = model.take_requests();

    assert!(model.start_motion("TapBody", 1, Priority::Force, None).is_none());
    assert!(model.take_requests().is_empty());
    assert_eq!(model.motion_queue().reserve_priority(), Priority::None);
}

#[test]
fn motions_wait_for_complete_setup() {
    let mut config = stage_config();
    config.loader.stall_timeout_secs = None;
    let reader = both_models().with_stalled(join_asset_path(HARU_DIR, "textures/texture_01.png"));
    let mut h = Harness::new(config, reader);
    h.manager.change_scene(0).unwrap();
    h.manager.on_update(DT);

    let model = h.manager.active_model_mut().unwrap();
    assert_eq!(model.stage(), LoadStage::WaitLoadTexture);
    assert!(model.start_motion("TapBody", 0, Priority::Force, None).is_none());
    assert!(model.take_requests().is_empty());
    assert_eq!(model.motion_queue().reserve_priority(), Priority::None);
}

#[test]
fn new_stage_preloads_standard_parameter_ids() {
    let _h = Harness::new(stage_config(), both_models());
    for name in ["ParamAngleX", "ParamBodyAngleX", "ParamEyeROpen", "ParamMouthOpenY"] {
        assert!(myth_puppet::utils::interner::get(name).is_some(), "{name} not interned");
    }
}
