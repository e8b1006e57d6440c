//! Requests the core hands to its host, and the tickets that route completions back.

use serde::Serialize;

use crate::ids::Generation;
use crate::manifest::motion_key;
use crate::resolver::Location;
use crate::texture::DecodeRequest;

/// What a fetch is for. Together with the generation this identifies one in-flight request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum ResourceKind {
    Manifest,
    Rig,
    Expression { name: String },
    Physics,
    Pose,
    UserData,
    /// Preloaded during the motion fan-out.
    Motion { group: String, index: usize },
    /// Requested by `start_motion` after Ready; started on arrival.
    MotionOnDemand { group: String, index: usize },
    Texture { index: usize },
    /// Sound paired with a motion entry, feeds lip-sync.
    Audio { group: String, index: usize },
}

impl ResourceKind {
    /// Dedup key within one pipeline.
    pub fn key(&self) -> String {
        match self {
            ResourceKind::Manifest => "manifest".to_string(),
            ResourceKind::Rig => "rig".to_string(),
            ResourceKind::Expression { name } => format!("expression:{name}"),
            ResourceKind::Physics => "physics".to_string(),
            ResourceKind::Pose => "pose".to_string(),
            ResourceKind::UserData => "user_data".to_string(),
            ResourceKind::Motion { group, index }
            | ResourceKind::MotionOnDemand { group, index } => {
                format!("motion:{}", motion_key(group, *index))
            }
            ResourceKind::Texture { index } => format!("texture:{index}"),
            ResourceKind::Audio { group, index } => {
                format!("audio:{}", motion_key(group, *index))
            }
        }
    }
}

/// Routes a completion back to the pipeline that issued it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Ticket {
    pub generation: Generation,
    pub kind: ResourceKind,
}

/// A byte fetch the host must perform (or, for inline locations, complete immediately).
#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    pub ticket: Ticket,
    /// Logical path, for logging.
    pub path: String,
    pub location: Location,
}

impl FetchRequest {
    /// Inline content needs no I/O.
    pub fn inline_bytes(&self) -> Option<&[u8]> {
        match &self.location {
            Location::Inline(asset) => Some(asset.as_bytes()),
            Location::Url(_) => None,
        }
    }
}

/// Work the host performs on behalf of the core.
#[derive(Debug, Clone, PartialEq)]
pub enum HostRequest {
    Fetch(FetchRequest),
    DecodeImage(DecodeRequest),
}

impl HostRequest {
    pub fn as_fetch(&self) -> Option<&FetchRequest> {
        match self {
            HostRequest::Fetch(f) => Some(f),
            HostRequest::DecodeImage(_) => None,
        }
    }

    pub fn as_decode(&self) -> Option<&DecodeRequest> {
        match self {
            HostRequest::DecodeImage(d) => Some(d),
            HostRequest::Fetch(_) => None,
        }
    }
}
