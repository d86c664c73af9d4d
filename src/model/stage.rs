//! Load Stages
//!
//! The progress marker of a model's loader. Stages are totally ordered in the
//! sequence they run and a model only ever moves forward through them.
//!
//! Which stages actually run depends on what the settings declare. A
//! [`LoadPlan`] captures that, and [`LoadStage::advance`] skips every stage the
//! plan does not require.

use std::fmt;

use crate::model::settings::ModelSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LoadStage {
    LoadAssets,
    LoadModel,
    WaitLoadModel,
    LoadExpression,
    WaitLoadExpression,
    LoadPhysics,
    WaitLoadPhysics,
    LoadPose,
    WaitLoadPose,
    SetupEyeBlink,
    SetupBreath,
    LoadUserData,
    WaitLoadUserData,
    SetupEyeBlinkIds,
    SetupLipSyncIds,
    SetupLayout,
    LoadMotion,
    WaitLoadMotion,
    LoadTexture,
    WaitLoadTexture,
    CompleteSetup,
    /// Terminal. The model never becomes renderable.
    Failed,
}

/// Which optional resources a settings document declares.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadPlan {
    pub has_expressions: bool,
    pub has_physics: bool,
    pub has_pose: bool,
    pub has_user_data: bool,
    pub has_motions: bool,
    pub has_textures: bool,
}

impl LoadPlan {
    #[must_use]
    pub fn from_settings(settings: &ModelSettings) -> Self {
        Self {
            has_expressions: settings.expressions().next().is_some(),
            has_physics: settings.physics_file().is_some(),
            has_pose: settings.pose_file().is_some(),
            has_user_data: settings.user_data_file().is_some(),
            has_motions: settings.total_motion_count() > 0,
            has_textures: settings.texture_slots().iter().any(|t| !t.is_empty()),
        }
    }

    /// Every optional resource present.
    #[must_use]
    pub fn full() -> Self {
        Self {
            has_expressions: true,
            has_physics: true,
            has_pose: true,
            has_user_data: true,
            has_motions: true,
            has_textures: true,
        }
    }
}

impl LoadStage {
    /// The stage that follows in the full sequence. Terminal stages map to
    /// themselves.
    #[must_use]
    pub fn successor(self) -> Self {
        use LoadStage::*;
        match self {
            LoadAssets => LoadModel,
            LoadModel => WaitLoadModel,
            WaitLoadModel => LoadExpression,
            LoadExpression => WaitLoadExpression,
            WaitLoadExpression => LoadPhysics,
            LoadPhysics => WaitLoadPhysics,
            WaitLoadPhysics => LoadPose,
            LoadPose => WaitLoadPose,
            WaitLoadPose => SetupEyeBlink,
            SetupEyeBlink => SetupBreath,
            SetupBreath => LoadUserData,
            LoadUserData => WaitLoadUserData,
            WaitLoadUserData => SetupEyeBlinkIds,
            SetupEyeBlinkIds => SetupLipSyncIds,
            SetupLipSyncIds => SetupLayout,
            SetupLayout => LoadMotion,
            LoadMotion => WaitLoadMotion,
            WaitLoadMotion => LoadTexture,
            LoadTexture => WaitLoadTexture,
            WaitLoadTexture => CompleteSetup,
            CompleteSetup => CompleteSetup,
            Failed => Failed,
        }
    }

    /// Whether this stage runs for a model described by `plan`.
    #[must_use]
    pub fn is_required(self, plan: &LoadPlan) -> bool {
        use LoadStage::*;
        match self {
            LoadExpression | WaitLoadExpression => plan.has_expressions,
            LoadPhysics | WaitLoadPhysics => plan.has_physics,
            LoadPose | WaitLoadPose => plan.has_pose,
            LoadUserData | WaitLoadUserData => plan.has_user_data,
            WaitLoadMotion => plan.has_motions,
            WaitLoadTexture => plan.has_textures,
            _ => true,
        }
    }

    /// Next required stage.
    #[must_use]
    pub fn advance(self, plan: &LoadPlan) -> Self {
        let mut next = self.successor();
        while !next.is_required(plan) {
            next = next.successor();
        }
        next
    }

    /// Stages in which the loader sits waiting on a fetch.
    #[must_use]
    pub fn is_waiting(self) -> bool {
        use LoadStage::*;
        matches!(
            self,
            LoadAssets
                | WaitLoadModel
                | WaitLoadExpression
                | WaitLoadPhysics
                | WaitLoadPose
                | WaitLoadUserData
                | WaitLoadMotion
                | WaitLoadTexture
        )
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, LoadStage::CompleteSetup | LoadStage::Failed)
    }
}

impl fmt::Display for LoadStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
