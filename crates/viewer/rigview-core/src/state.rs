use serde::{Deserialize, Serialize};

use crate::error::LoadError;

/// Stage of a model load, in dependency order. The derived ordering is the load order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LoadState {
    AwaitManifest,
    ParseManifest,
    LoadRig,
    Expressions,
    Physics,
    Pose,
    EyeBlinkSetup,
    BreathSetup,
    UserData,
    ParameterIds,
    Layout,
    Motions,
    Textures,
    Ready,
}

impl LoadState {
    /// The only stage a load may move to from `self`.
    #[inline]
    pub fn successor(self) -> Option<LoadState> {
        use LoadState::*;
        match self {
            AwaitManifest => Some(ParseManifest),
            ParseManifest => Some(LoadRig),
            LoadRig => Some(Expressions),
            Expressions => Some(Physics),
            Physics => Some(Pose),
            Pose => Some(EyeBlinkSetup),
            EyeBlinkSetup => Some(BreathSetup),
            BreathSetup => Some(UserData),
            UserData => Some(ParameterIds),
            ParameterIds => Some(Layout),
            Layout => Some(Motions),
            Motions => Some(Textures),
            Textures => Some(Ready),
            Ready => None,
        }
    }

    /// Move `current` from `from` to `to`. Fails unless `current == from` and `to` is
    /// the successor of `from`.
    pub fn transition(
        current: &mut LoadState,
        from: LoadState,
        to: LoadState,
    ) -> Result<(), LoadError> {
        if *current != from || from.successor() != Some(to) {
            return Err(LoadError::IllegalTransition {
                current: *current,
                from,
                to,
            });
        }
        log::debug!("load state {:?} -> {:?}", from, to);
        *current = to;
        Ok(())
    }

    /// Stages that fan out several requests and wait on a counter.
    #[inline]
    pub fn is_fan_out(self) -> bool {
        matches!(
            self,
            LoadState::Expressions | LoadState::Motions | LoadState::Textures
        )
    }

    #[inline]
    pub fn is_ready(self) -> bool {
        matches!(self, LoadState::Ready)
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        use LoadState::*;
        match self {
            AwaitManifest => "await_manifest",
            ParseManifest => "parse_manifest",
            LoadRig => "load_rig",
            Expressions => "expressions",
            Physics => "physics",
            Pose => "pose",
            EyeBlinkSetup => "eye_blink_setup",
            BreathSetup => "breath_setup",
            UserData => "user_data",
            ParameterIds => "parameter_ids",
            Layout => "layout",
            Motions => "motions",
            Textures => "textures",
            Ready => "ready",
        }
    }
}
