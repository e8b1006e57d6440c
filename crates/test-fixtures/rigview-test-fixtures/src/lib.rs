use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use once_cell::sync::Lazy;
use serde::de::DeserializeOwned;
use serde::Deserialize;

static INDEX: Lazy<FixtureIndex> = Lazy::new(|| {
    let raw = include_str!("../../../../fixtures/manifest.json");
    serde_json::from_str(raw).expect("fixtures/manifest.json should parse")
});

/// `fixtures/manifest.json`: short names for the model directories, viewer configs
/// and asset tables kept under `fixtures/`.
#[derive(Debug, Deserialize)]
struct FixtureIndex {
    models: HashMap<String, ModelDir>,
    configs: HashMap<String, String>,
    #[serde(rename = "asset-tables")]
    asset_tables: HashMap<String, String>,
}

/// A model directory and the `.model3.json` inside it.
#[derive(Debug, Deserialize)]
struct ModelDir {
    dir: String,
    manifest: String,
}

impl ModelDir {
    fn file(&self, rel: &str) -> PathBuf {
        fixture_path(&self.dir).join(rel)
    }
}

fn fixture_path(rel: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../../../fixtures")
        .join(rel)
}

fn named<'a, T>(table: &'a HashMap<String, T>, what: &str, name: &str) -> Result<&'a T> {
    table.get(name).ok_or_else(|| {
        let mut known: Vec<&str> = table.keys().map(String::as_str).collect();
        known.sort_unstable();
        anyhow!("no {what} named '{name}' in fixtures/manifest.json (have {known:?})")
    })
}

fn model(name: &str) -> Result<&'static ModelDir> {
    named(&INDEX.models, "model", name)
}

fn read_text(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("fixture {} is unreadable", path.display()))
}

/// Model directories laid out the way a viewer serves them.
pub mod models {
    use super::*;

    pub fn keys() -> Vec<String> {
        INDEX.models.keys().cloned().collect()
    }

    pub fn dir(name: &str) -> Result<PathBuf> {
        Ok(fixture_path(&model(name)?.dir))
    }

    /// Text of the model's `.model3.json`.
    pub fn manifest_json(name: &str) -> Result<String> {
        let model = model(name)?;
        read_text(&model.file(&model.manifest))
    }

    /// Read a file of model `name` by its path relative to the model directory.
    pub fn read(name: &str, rel: &str) -> Result<Vec<u8>> {
        let path = model(name)?.file(rel);
        fs::read(&path)
            .with_context(|| format!("model '{name}' has no file {rel} ({})", path.display()))
    }
}

/// Viewer configs.
pub mod configs {
    use super::*;

    pub fn keys() -> Vec<String> {
        INDEX.configs.keys().cloned().collect()
    }

    pub fn json(name: &str) -> Result<String> {
        read_text(&fixture_path(named(&INDEX.configs, "viewer config", name)?))
    }

    pub fn load<T: DeserializeOwned>(name: &str) -> Result<T> {
        let text = json(name)?;
        serde_json::from_str(&text)
            .with_context(|| format!("viewer config '{name}' does not deserialize"))
    }
}

/// Logical-path to served-location tables.
pub mod asset_tables {
    use super::*;

    pub fn json(name: &str) -> Result<String> {
        read_text(&fixture_path(named(&INDEX.asset_tables, "asset table", name)?))
    }
}

/// Synthesized RIFF/WAVE buffers.
pub mod wav {
    /// Canonical PCM WAVE with an optional chunk placed between `fmt ` and `data`.
    pub fn pcm(
        channels: u16,
        sample_rate: u32,
        bits_per_sample: u16,
        data: &[u8],
        extra_chunk: Option<(&[u8; 4], &[u8])>,
    ) -> Vec<u8> {
        let block_align = channels * bits_per_sample.div_ceil(8);
        let mut out = Vec::new();
        out.extend_from_slice(b"RIFF");
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(b"WAVE");
        out.extend_from_slice(b"fmt ");
        out.extend_from_slice(&16u32.to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes());
        out.extend_from_slice(&channels.to_le_bytes());
        out.extend_from_slice(&sample_rate.to_le_bytes());
        out.extend_from_slice(&(sample_rate * u32::from(block_align)).to_le_bytes());
        out.extend_from_slice(&block_align.to_le_bytes());
        out.extend_from_slice(&bits_per_sample.to_le_bytes());
        if let Some((id, body)) = extra_chunk {
            out.extend_from_slice(id);
            out.extend_from_slice(&(body.len() as u32).to_le_bytes());
            out.extend_from_slice(body);
            if body.len() % 2 == 1 {
                out.push(0);
            }
        }
        out.extend_from_slice(b"data");
        out.extend_from_slice(&(data.len() as u32).to_le_bytes());
        out.extend_from_slice(data);
        let riff_len = (out.len() - 8) as u32;
        out[4..8].copy_from_slice(&riff_len.to_le_bytes());
        out
    }

    pub fn mono16(sample_rate: u32, samples: &[i16]) -> Vec<u8> {
        let data: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        pcm(1, sample_rate, 16, &data, None)
    }

    pub fn silence16(sample_rate: u32, len: usize) -> Vec<u8> {
        mono16(sample_rate, &vec![0; len])
    }

    /// Full-scale square wave with the given period in samples.
    pub fn square16(sample_rate: u32, len: usize, period: usize) -> Vec<u8> {
        let half = (period / 2).max(1);
        let samples: Vec<i16> = (0..len)
            .map(|i| if (i / half) % 2 == 0 { i16::MAX } else { i16::MIN + 1 })
            .collect();
        mono16(sample_rate, &samples)
    }
}
