//! model3 manifest parsing.
//!
//! The wire format uses PascalCase keys and paths relative to the manifest's directory.
//! [`ModelManifest`] is the parsed form with every path already joined onto that
//! directory, so the pipeline only ever deals in logical paths.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::ManifestError;
use crate::resolver::join_model_path;

/// Parameter group name carrying eye blink ids.
pub const GROUP_EYE_BLINK: &str = "EyeBlink";
/// Parameter group name carrying lip-sync ids.
pub const GROUP_LIP_SYNC: &str = "LipSync";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExpressionEntry {
    pub name: String,
    pub file: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MotionEntry {
    pub file: String,
    pub sound: Option<String>,
    pub fade_in: Option<f32>,
    pub fade_out: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HitArea {
    pub id: String,
    pub name: String,
}

/// Model placement hints (`CenterX`, `Width`, `Top`, ...). Interpreted by the engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Layout(pub IndexMap<String, f32>);

impl Layout {
    pub fn get(&self, key: &str) -> Option<f32> {
        self.0.get(key).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Parsed, immutable model descriptor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelManifest {
    pub dir: String,
    pub moc: String,
    pub textures: Vec<String>,
    pub physics: Option<String>,
    pub pose: Option<String>,
    pub display_info: Option<String>,
    pub user_data: Option<String>,
    pub expressions: Vec<ExpressionEntry>,
    pub motions: IndexMap<String, Vec<MotionEntry>>,
    pub eye_blink_ids: Vec<String>,
    pub lip_sync_ids: Vec<String>,
    pub hit_areas: Vec<HitArea>,
    pub layout: Layout,
}

/// Key a motion is registered under: `"<group>_<index>"`.
pub fn motion_key(group: &str, index: usize) -> String {
    format!("{group}_{index}")
}

impl ModelManifest {
    /// Parse manifest bytes. `dir` is the logical directory of the manifest file.
    pub fn parse(bytes: &[u8], dir: &str) -> Result<Self, ManifestError> {
        let text = std::str::from_utf8(bytes).map_err(|_| ManifestError::NotUtf8)?;
        let raw: RawModel = serde_json::from_str(text)?;
        let refs = raw.file_references;
        let moc = refs
            .moc
            .filter(|m| !m.is_empty())
            .ok_or(ManifestError::MissingMoc)?;
        let join = |p: &str| join_model_path(dir, p);
        let join_opt = |p: Option<String>| p.filter(|s| !s.is_empty()).map(|s| join(&s));

        let mut eye_blink_ids = Vec::new();
        let mut lip_sync_ids = Vec::new();
        for g in raw.groups {
            if g.target != "Parameter" {
                continue;
            }
            match g.name.as_str() {
                GROUP_EYE_BLINK => eye_blink_ids.extend(g.ids),
                GROUP_LIP_SYNC => lip_sync_ids.extend(g.ids),
                _ => {}
            }
        }

        Ok(ModelManifest {
            dir: dir.to_string(),
            moc: join(&moc),
            textures: refs.textures.iter().map(|t| join(t)).collect(),
            physics: join_opt(refs.physics),
            pose: join_opt(refs.pose),
            display_info: join_opt(refs.display_info),
            user_data: join_opt(refs.user_data),
            expressions: refs
                .expressions
                .into_iter()
                .map(|e| ExpressionEntry {
                    name: e.name,
                    file: join(&e.file),
                })
                .collect(),
            motions: refs
                .motions
                .into_iter()
                .map(|(group, entries)| {
                    let entries = entries
                        .into_iter()
                        .map(|m| MotionEntry {
                            file: join(&m.file),
                            sound: join_opt(m.sound),
                            fade_in: m.fade_in_time,
                            fade_out: m.fade_out_time,
                        })
                        .collect();
                    (group, entries)
                })
                .collect(),
            eye_blink_ids,
            lip_sync_ids,
            hit_areas: raw
                .hit_areas
                .into_iter()
                .map(|h| HitArea {
                    id: h.id,
                    name: h.name,
                })
                .collect(),
            layout: Layout(raw.layout),
        })
    }

    pub fn motion_count(&self) -> usize {
        self.motions.values().map(Vec::len).sum()
    }

    pub fn motion(&self, group: &str, index: usize) -> Option<&MotionEntry> {
        self.motions.get(group).and_then(|g| g.get(index))
    }

    pub fn motion_group_len(&self, group: &str) -> usize {
        self.motions.get(group).map_or(0, Vec::len)
    }

    pub fn expression(&self, name: &str) -> Option<&ExpressionEntry> {
        self.expressions.iter().find(|e| e.name == name)
    }

    /// Hit area id for a configured hit area name (case-insensitive, as authored files vary).
    pub fn hit_area_id(&self, name: &str) -> Option<&str> {
        self.hit_areas
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.id.as_str())
    }
}

// ----- JSON schema (serde) -----

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawModel {
    file_references: RawFileReferences,
    #[serde(default)]
    groups: Vec<RawGroup>,
    #[serde(default)]
    hit_areas: Vec<RawHitArea>,
    #[serde(default)]
    layout: IndexMap<String, f32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawFileReferences {
    #[serde(default)]
    moc: Option<String>,
    #[serde(default)]
    textures: Vec<String>,
    #[serde(default)]
    physics: Option<String>,
    #[serde(default)]
    pose: Option<String>,
    #[serde(default)]
    display_info: Option<String>,
    #[serde(default)]
    user_data: Option<String>,
    #[serde(default)]
    expressions: Vec<RawExpression>,
    #[serde(default)]
    motions: IndexMap<String, Vec<RawMotion>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawExpression {
    name: String,
    file: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawMotion {
    file: String,
    #[serde(default)]
    sound: Option<String>,
    #[serde(default)]
    fade_in_time: Option<f32>,
    #[serde(default)]
    fade_out_time: Option<f32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawGroup {
    target: String,
    name: String,
    #[serde(default)]
    ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawHitArea {
    id: String,
    name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"{
        "Version": 3,
        "FileReferences": {
            "Moc": "M.moc3",
            "Textures": ["M.1024/texture_00.png"],
            "Motions": { "Idle": [ { "File": "motions/idle.motion3.json", "FadeInTime": 0.5 } ] }
        },
        "Groups": [
            { "Target": "Parameter", "Name": "LipSync", "Ids": ["ParamMouthOpenY"] },
            { "Target": "Part", "Name": "EyeBlink", "Ids": ["PartIgnored"] }
        ]
    }"#;

    #[test]
    fn paths_are_joined_onto_dir() {
        let m = ModelManifest::parse(MINIMAL.as_bytes(), "Resources/M/").expect("parse");
        assert_eq!(m.moc, "Resources/M/M.moc3");
        assert_eq!(m.textures, vec!["Resources/M/M.1024/texture_00.png"]);
        let idle = m.motion("Idle", 0).expect("idle motion");
        assert_eq!(idle.file, "Resources/M/motions/idle.motion3.json");
        assert_eq!(idle.fade_in, Some(0.5));
        assert_eq!(idle.fade_out, None);
        assert_eq!(m.lip_sync_ids, vec!["ParamMouthOpenY"]);
        assert!(m.eye_blink_ids.is_empty());
        assert!(m.physics.is_none());
    }

    #[test]
    fn missing_moc_is_an_error() {
        let err = ModelManifest::parse(br#"{ "FileReferences": {} }"#, "x/").unwrap_err();
        assert_eq!(err, ManifestError::MissingMoc);
    }

    #[test]
    fn garbage_is_a_json_error() {
        assert!(matches!(
            ModelManifest::parse(b"{ not json", "x/"),
            Err(ManifestError::Json { .. })
        ));
    }

    #[test]
    fn motion_keys() {
        assert_eq!(motion_key("TapBody", 3), "TapBody_3");
    }
}
