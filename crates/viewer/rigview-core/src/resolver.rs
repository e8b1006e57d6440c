//! Logical asset path resolution.
//!
//! Logical paths are model-relative strings such as `Resources/Haru/Haru.moc3`. A build
//! step may re-encode the served names arbitrarily, so resolution goes through a table
//! instead of string rewriting. Manifest-class files may also be embedded in the table.

use std::sync::Arc;

use hashbrown::HashMap;
use serde::Deserialize;

use crate::error::ResolverError;

/// Already-materialized content for a logical path.
#[derive(Debug, Clone, PartialEq)]
pub enum InlineAsset {
    Text(Arc<str>),
    Bytes(Arc<[u8]>),
}

impl InlineAsset {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            InlineAsset::Text(s) => s.as_bytes(),
            InlineAsset::Bytes(b) => b,
        }
    }
}

/// Where a logical path can be obtained from.
#[derive(Debug, Clone, PartialEq)]
pub enum Location {
    Url(String),
    Inline(InlineAsset),
}

/// Maps logical paths to locations. `None` means the path is unknown.
pub trait AssetResolver {
    fn resolve(&self, logical: &str) -> Option<Location>;
}

/// Resolve `logical`, falling back to treating it as a directly fetchable URL.
/// A miss is logged and never surfaced as an error.
pub fn resolve_or_passthrough(resolver: &dyn AssetResolver, logical: &str) -> Location {
    match resolver.resolve(logical) {
        Some(loc) => loc,
        None => {
            log::warn!("asset '{logical}' not found in resolver; fetching it verbatim");
            Location::Url(logical.to_string())
        }
    }
}

/// Suffixes that may be embedded in an asset table.
const INLINE_SUFFIXES: &[&str] = &[
    ".model3.json",
    ".exp3.json",
    ".motion3.json",
    ".physics3.json",
    ".pose3.json",
    ".userdata3.json",
    ".cdi3.json",
    ".moc3",
];

fn inline_allowed(path: &str) -> bool {
    INLINE_SUFFIXES.iter().any(|s| path.ends_with(s))
}

fn is_absolute_url(s: &str) -> bool {
    s.starts_with('/') || s.contains("://") || s.starts_with("data:") || s.starts_with("blob:")
}

/// Build-time asset table.
#[derive(Debug, Default, Clone)]
pub struct AssetTable {
    base_url: String,
    entries: HashMap<String, Location>,
}

#[derive(Debug, Deserialize)]
struct RawTable {
    #[serde(default)]
    base_url: String,
    #[serde(default)]
    entries: HashMap<String, RawEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawEntry {
    Url { url: String },
    Text { text: String },
    Bytes { bytes: Vec<u8> },
}

impl AssetTable {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            entries: HashMap::new(),
        }
    }

    /// Parse a table of the form
    /// `{ "base_url": "...", "entries": { "<logical>": { "url" | "text" | "bytes": ... } } }`.
    pub fn from_json_str(s: &str) -> Result<Self, ResolverError> {
        let raw: RawTable = serde_json::from_str(s)?;
        let mut table = AssetTable::new(raw.base_url);
        for (logical, entry) in raw.entries {
            match entry {
                RawEntry::Url { url } => table.insert_url(logical, url),
                RawEntry::Text { text } => table.insert_text(logical, text)?,
                RawEntry::Bytes { bytes } => table.insert_bytes(logical, bytes)?,
            }
        }
        Ok(table)
    }

    pub fn insert_url(&mut self, logical: impl Into<String>, served: impl Into<String>) {
        let served = served.into();
        let url = if is_absolute_url(&served) {
            served
        } else {
            format!("{}{}", self.base_url, served)
        };
        self.entries.insert(logical.into(), Location::Url(url));
    }

    pub fn insert_text(
        &mut self,
        logical: impl Into<String>,
        text: impl Into<String>,
    ) -> Result<(), ResolverError> {
        let logical = logical.into();
        if !inline_allowed(&logical) {
            return Err(ResolverError::InlineNotAllowed { path: logical });
        }
        let text: String = text.into();
        self.entries
            .insert(logical, Location::Inline(InlineAsset::Text(text.into())));
        Ok(())
    }

    pub fn insert_bytes(
        &mut self,
        logical: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Result<(), ResolverError> {
        let logical = logical.into();
        if !inline_allowed(&logical) {
            return Err(ResolverError::InlineNotAllowed { path: logical });
        }
        self.entries
            .insert(logical, Location::Inline(InlineAsset::Bytes(bytes.into())));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl AssetResolver for AssetTable {
    fn resolve(&self, logical: &str) -> Option<Location> {
        self.entries.get(logical).cloned()
    }
}

/// Resolves every path to `base_url + path`. Used when assets are served as laid out.
#[derive(Debug, Default, Clone)]
pub struct PassthroughResolver {
    pub base_url: String,
}

impl AssetResolver for PassthroughResolver {
    fn resolve(&self, logical: &str) -> Option<Location> {
        Some(Location::Url(format!("{}{}", self.base_url, logical)))
    }
}

/// Join a manifest-relative path onto the manifest's directory, folding `.` and `..`.
pub fn join_model_path(dir: &str, relative: &str) -> String {
    if is_absolute_url(relative) {
        return relative.to_string();
    }
    let mut parts: Vec<&str> = dir.split('/').filter(|p| !p.is_empty()).collect();
    for seg in relative.split('/') {
        match seg {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            s => parts.push(s),
        }
    }
    parts.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_folds_relative_segments() {
        assert_eq!(
            join_model_path("Resources/Haru/", "Haru.2048/texture_00.png"),
            "Resources/Haru/Haru.2048/texture_00.png"
        );
        assert_eq!(
            join_model_path("Resources/Haru/", "./motions/../sounds/a.wav"),
            "Resources/Haru/sounds/a.wav"
        );
        assert_eq!(
            join_model_path("Resources/Haru/", "https://cdn/x.png"),
            "https://cdn/x.png"
        );
    }

    #[test]
    fn inline_only_for_manifest_formats() {
        let mut t = AssetTable::new("");
        assert!(t.insert_text("a/model.model3.json", "{}").is_ok());
        assert!(matches!(
            t.insert_bytes("a/texture.png", vec![1, 2, 3]),
            Err(ResolverError::InlineNotAllowed { .. })
        ));
    }

    #[test]
    fn urls_get_base_prefix_unless_absolute() {
        let mut t = AssetTable::new("assets/");
        t.insert_url("a/b.moc3", "3f9a.bin");
        t.insert_url("a/c.png", "https://cdn.example/9c.png");
        assert_eq!(
            t.resolve("a/b.moc3"),
            Some(Location::Url("assets/3f9a.bin".into()))
        );
        assert_eq!(
            t.resolve("a/c.png"),
            Some(Location::Url("https://cdn.example/9c.png".into()))
        );
    }

    #[test]
    fn miss_falls_back_to_verbatim_path() {
        let t = AssetTable::new("assets/");
        assert_eq!(
            resolve_or_passthrough(&t, "Resources/Missing.moc3"),
            Location::Url("Resources/Missing.moc3".into())
        );
    }
}
