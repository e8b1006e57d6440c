//! Error types for the viewer core.
//!
//! Every failure is absorbed by the component that observes it and logged; these types
//! exist so the absorption points can tell failures apart (and tests can assert on them).

use crate::ids::{DecodeId, Generation};
use crate::state::LoadState;

/// Failure reported by the host for a fetch it performed.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum FetchError {
    /// Network or storage failure before any response
    #[error("network error: {reason}")]
    Network { reason: String },

    /// Non-OK response
    #[error("HTTP status {status}")]
    Status { status: u16 },

    /// The response arrived but could not be decoded (image decode, body read)
    #[error("decode error: {reason}")]
    Decode { reason: String },
}

/// Malformed model3 manifest.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum ManifestError {
    #[error("manifest JSON error: {reason}")]
    Json { reason: String },

    #[error("manifest is not UTF-8")]
    NotUtf8,

    #[error("manifest has no rig binary reference")]
    MissingMoc,
}

impl From<serde_json::Error> for ManifestError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json {
            reason: err.to_string(),
        }
    }
}

/// Failure of the external rig engine's own consistency checks.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum EngineError {
    #[error("engine rejected {what}: {reason}")]
    Rejected { what: String, reason: String },

    #[error("engine unavailable")]
    Unavailable,
}

/// Asset table construction errors.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum ResolverError {
    #[error("asset table JSON error: {reason}")]
    Json { reason: String },

    #[error("inline content is not allowed for {path}")]
    InlineNotAllowed { path: String },
}

impl From<serde_json::Error> for ResolverError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json {
            reason: err.to_string(),
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum TextureError {
    #[error("image decode failed for {path}: {reason}")]
    Decode { path: String, reason: String },

    #[error("texture upload failed: {reason}")]
    Upload { reason: String },

    #[error("no pending decode {0:?}")]
    UnknownDecode(DecodeId),
}

/// RIFF/WAVE parse failures.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum WavError {
    #[error("missing '{expected}' signature")]
    BadSignature { expected: &'static str },

    #[error("unsupported format code {code} (only linear PCM)")]
    UnsupportedFormat { code: u16 },

    #[error("buffer ends inside a header")]
    Truncated,

    #[error("no 'data' chunk before end of buffer")]
    MissingDataChunk,

    #[error("invalid layout: {channels} channels, {bits_per_sample} bits per sample")]
    InvalidLayout { channels: u16, bits_per_sample: u16 },
}

/// Load pipeline errors.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum LoadError {
    #[error("fetch of {path} failed: {source}")]
    Fetch {
        path: String,
        #[source]
        source: FetchError,
    },

    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Texture(#[from] TextureError),

    #[error("illegal transition {from:?} -> {to:?} while in {current:?}")]
    IllegalTransition {
        current: LoadState,
        from: LoadState,
        to: LoadState,
    },

    #[error("completion from generation {got:?} delivered to generation {expected:?}")]
    StaleTicket {
        expected: Generation,
        got: Generation,
    },

    #[error("pipeline already disposed")]
    Disposed,

    #[error("pipeline not ready (in {state:?})")]
    NotReady { state: LoadState },

    #[error("pipeline halted: {reason}")]
    Halted { reason: String },

    #[error("no request in flight for {key}")]
    UnexpectedCompletion { key: String },

    #[error("unknown motion {group}[{index}]")]
    UnknownMotion { group: String, index: usize },

    #[error("unknown expression {name}")]
    UnknownExpression { name: String },

    #[error("motion refused at priority {priority}")]
    MotionRefused { priority: u8 },

    #[error("no playable motion left in group {group}")]
    NoPlayableMotion { group: String },
}

impl LoadError {
    /// Errors that never leave the pipeline un-Ready on their own.
    #[inline]
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            Self::Manifest(_) | Self::Halted { .. } | Self::IllegalTransition { .. }
        )
    }

    /// Get error category for logging
    #[inline]
    pub fn category(&self) -> &'static str {
        match self {
            Self::Fetch { .. } => "fetch",
            Self::Manifest(_) => "parse",
            Self::Engine(_) | Self::Texture(_) => "capability",
            Self::IllegalTransition { .. } => "state",
            Self::StaleTicket { .. } | Self::Disposed | Self::UnexpectedCompletion { .. } => {
                "stale"
            }
            Self::NotReady { .. } | Self::Halted { .. } => "state",
            Self::UnknownMotion { .. }
            | Self::UnknownExpression { .. }
            | Self::MotionRefused { .. }
            | Self::NoPlayableMotion { .. } => "request",
        }
    }
}

/// Top-level viewer errors (host initialization and configuration).
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum ViewerError {
    #[error("no graphics context: {reason}")]
    NoGraphicsContext { reason: String },

    #[error("invalid config: {reason}")]
    InvalidConfig { reason: String },

    #[error("scene index {index} out of range (have {len})")]
    SceneOutOfRange { index: usize, len: usize },

    #[error(transparent)]
    Resolver(#[from] ResolverError),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("viewer already released")]
    Released,
}

impl From<serde_json::Error> for ViewerError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidConfig {
            reason: err.to_string(),
        }
    }
}
