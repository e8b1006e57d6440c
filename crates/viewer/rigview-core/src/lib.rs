//! rigview core (engine-agnostic)
//!
//! Sans-IO coordination layer for a rigged 2D character viewer. The core never performs
//! I/O itself: it emits [`HostRequest`]s (fetches and image decodes) and is fed
//! completions back by the host adapter (wasm, or a test harness). The rigging engine is
//! an injected [`RigEngine`] capability.

pub mod clock;
pub mod config;
pub mod counter;
pub mod engine;
pub mod error;
pub mod ids;
pub mod input;
pub mod manifest;
pub mod pipeline;
pub mod request;
pub mod resolver;
pub mod scene;
pub mod state;
pub mod texture;
pub mod view;
pub mod wav;

// Re-exports for adapters
pub use clock::{Clock, FrameTimer, ManualClock};
pub use config::{BreathParameter, ViewerConfig};
pub use counter::{PendingWorkCounter, Progress};
pub use engine::RigEngine;
pub use error::{
    EngineError, FetchError, LoadError, ManifestError, ResolverError, TextureError,
    ViewerError, WavError,
};
pub use ids::{DecodeId, Generation, TextureHandle};
pub use input::{DragSmoother, PointerAction, PointerTracker};
pub use manifest::{Layout, ModelManifest, MotionEntry};
pub use pipeline::{ModelLoadPipeline, MotionPriority};
pub use request::{FetchRequest, HostRequest, ResourceKind, Ticket};
pub use resolver::{
    join_model_path, resolve_or_passthrough, AssetResolver, AssetTable, InlineAsset, Location,
    PassthroughResolver,
};
pub use scene::{EngineFactory, SceneDirector};
pub use state::LoadState;
pub use texture::{
    DecodeRequest, DecodeStatus, TextureBackend, TextureCache, TextureFilter, TextureKey,
    TextureRecord, UploadOptions, UploadedTexture,
};
pub use view::{CoordinateFrame, Rect, ViewMatrix};
pub use wav::{AudioEnvelopeDecoder, WavClip};
