//! Viewer configuration.

use serde::{Deserialize, Serialize};

use crate::error::ViewerError;

/// One breathing oscillator handed to the engine at the breath setup stage.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BreathParameter {
    pub parameter_id: String,
    pub offset: f32,
    pub peak: f32,
    pub cycle: f32,
    pub weight: f32,
}

impl BreathParameter {
    fn new(id: &str, offset: f32, peak: f32, cycle: f32, weight: f32) -> Self {
        Self {
            parameter_id: id.to_string(),
            offset,
            peak,
            cycle,
            weight,
        }
    }
}

/// Configuration for scene selection, view limits and interaction.
/// Every field has a default, so hosts may pass a partial object.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// Root prepended to every model directory (e.g. "Resources/").
    pub resources_path: String,
    /// Ordered model identifiers; each is a directory holding `<id>.model3.json`.
    pub models: Vec<String>,

    /// View zoom limits.
    pub min_scale: f32,
    pub max_scale: f32,
    /// Logical screen half-height; the half-width follows the canvas aspect ratio.
    pub logical_half_height: f32,
    /// Maximum pannable logical rectangle [left, right, bottom, top].
    pub max_logical_rect: [f32; 4],

    /// Upload textures with premultiplied alpha.
    pub premultiplied_alpha: bool,

    /// Hit area that triggers a random expression.
    pub head_hit_area: String,
    /// Hit area that triggers a random motion from `tap_motion_group`.
    pub body_hit_area: String,
    pub idle_motion_group: String,
    pub tap_motion_group: String,

    /// Weight applied when writing the lip-sync envelope to mouth parameters.
    pub lip_sync_weight: f32,
    pub breath: Vec<BreathParameter>,

    /// Seed for random expression/motion picks.
    pub random_seed: u64,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            resources_path: "Resources/".to_string(),
            models: Vec::new(),
            min_scale: 0.8,
            max_scale: 2.0,
            logical_half_height: 1.0,
            max_logical_rect: [-2.0, 2.0, -2.0, 2.0],
            premultiplied_alpha: true,
            head_hit_area: "Head".to_string(),
            body_hit_area: "Body".to_string(),
            idle_motion_group: "Idle".to_string(),
            tap_motion_group: "TapBody".to_string(),
            lip_sync_weight: 0.8,
            breath: vec![
                BreathParameter::new("ParamAngleX", 0.0, 15.0, 6.5345, 0.5),
                BreathParameter::new("ParamAngleY", 0.0, 8.0, 3.5345, 0.5),
                BreathParameter::new("ParamAngleZ", 0.0, 10.0, 5.5345, 0.5),
                BreathParameter::new("ParamBodyAngleX", 0.0, 4.0, 15.5345, 0.5),
                BreathParameter::new("ParamBreath", 0.5, 0.5, 3.2345, 1.0),
            ],
            random_seed: 0x5eed,
        }
    }
}

impl ViewerConfig {
    /// Parse a (possibly partial) JSON config and validate it.
    pub fn from_json_str(s: &str) -> Result<Self, ViewerError> {
        let cfg: ViewerConfig = serde_json::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ViewerError> {
        if !(self.min_scale > 0.0 && self.min_scale <= self.max_scale) {
            return Err(ViewerError::InvalidConfig {
                reason: format!(
                    "scale limits [{}, {}] are not a positive range",
                    self.min_scale, self.max_scale
                ),
            });
        }
        let [left, right, bottom, top] = self.max_logical_rect;
        if left >= right || bottom >= top {
            return Err(ViewerError::InvalidConfig {
                reason: "max_logical_rect is empty".to_string(),
            });
        }
        if self.logical_half_height <= 0.0 {
            return Err(ViewerError::InvalidConfig {
                reason: "logical_half_height must be positive".to_string(),
            });
        }
        Ok(())
    }

    /// Directory of model `index`, with a trailing slash.
    pub fn model_dir(&self, index: usize) -> Option<String> {
        self.models
            .get(index)
            .map(|id| format!("{}{}/", self.resources_path, id))
    }

    /// Manifest file name of model `index` (relative to its directory).
    pub fn manifest_file(&self, index: usize) -> Option<String> {
        self.models.get(index).map(|id| format!("{id}.model3.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_fills_defaults() {
        let cfg = ViewerConfig::from_json_str(r#"{ "models": ["Haru"], "max_scale": 3.0 }"#)
            .expect("config");
        assert_eq!(cfg.models, vec!["Haru".to_string()]);
        assert_eq!(cfg.max_scale, 3.0);
        assert_eq!(cfg.min_scale, 0.8);
        assert_eq!(cfg.model_dir(0).as_deref(), Some("Resources/Haru/"));
        assert_eq!(cfg.manifest_file(0).as_deref(), Some("Haru.model3.json"));
        assert!(cfg.model_dir(1).is_none());
    }

    #[test]
    fn inverted_scale_range_is_rejected() {
        let err = ViewerConfig::from_json_str(r#"{ "min_scale": 2.0, "max_scale": 1.0 }"#)
            .unwrap_err();
        assert!(matches!(err, ViewerError::InvalidConfig { .. }));
    }
}
