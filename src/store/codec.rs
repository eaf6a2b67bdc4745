//! String/JSON encodings for domain enums and composite fields, so every
//! table column stays a plain `TEXT`/`BLOB` rather than relying on SQLite
//! type affinity tricks.

use crate::domain::*;
use crate::error::{Error, Result};
use crate::memory::chunk::{ChunkStatus, ChunkType, Confidence, DecayFunction, Source};
use crate::memory::relationship::{Origin, RelationshipType};

macro_rules! str_enum_codec {
    ($ty:ty, $( $variant:ident => $s:literal ),+ $(,)?) => {
        impl $ty {
            pub fn db_str(&self) -> &'static str {
                match self {
                    $(<$ty>::$variant => $s,)+
                }
            }
            pub fn from_db_str(s: &str) -> Result<Self> {
                match s {
                    $($s => Ok(<$ty>::$variant),)+
                    other => Err(Error::Corruption(format!(
                        concat!("unknown ", stringify!($ty), " value: {}"),
                        other
                    ))),
                }
            }
        }
    };
}

str_enum_codec!(Phase,
    Intake => "intake", Research => "research", Planning => "planning",
    Execution => "execution", Refinement => "refinement", Complete => "complete",
);

str_enum_codec!(SkillStatus,
    NotStarted => "not_started", InProgress => "in_progress", Achieved => "achieved",
);

str_enum_codec!(GoalStatus,
    Active => "active", Superseded => "superseded", Completed => "completed",
);

str_enum_codec!(TaskStatus,
    Ready => "ready", InProgress => "in_progress", Blocked => "blocked", Done => "done",
    Cancelled => "cancelled",
);

str_enum_codec!(QuestionStatus,
    Open => "open", Answered => "answered",
);

str_enum_codec!(WarningResolution,
    Executed => "executed", Dismissed => "dismissed", Modified => "modified",
);

str_enum_codec!(ChunkType,
    Research => "research", Insight => "insight", Decision => "decision",
    Resource => "resource", Attempt => "attempt", UserInput => "user_input",
    Procedure => "procedure", Question => "question",
);

str_enum_codec!(Confidence,
    Verified => "verified", Inferred => "inferred", Speculative => "speculative",
);

str_enum_codec!(Source,
    Research => "research", User => "user", Deduction => "deduction", Experiment => "experiment",
);

str_enum_codec!(DecayFunction,
    Exponential => "exponential", Linear => "linear", PowerLaw => "power_law", None => "none",
);

str_enum_codec!(ChunkStatus,
    Active => "active", Warm => "warm", Cool => "cool", Cold => "cold",
    Archived => "archived", Tombstone => "tombstone",
);

str_enum_codec!(RelationshipType,
    Supports => "supports", Contradicts => "contradicts", BuildsOn => "builds_on",
    Replaces => "replaces", Requires => "requires", RelatedTo => "related_to",
);

str_enum_codec!(Origin,
    Explicit => "explicit", Implicit => "implicit",
);

/// Encode an `f32` embedding vector as a little-endian byte blob.
pub fn encode_vector(v: &[f32]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(v.len() * 4);
    for x in v {
        buf.extend_from_slice(&x.to_le_bytes());
    }
    buf
}

pub fn decode_vector(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

pub fn to_json<T: serde::Serialize>(v: &T) -> Result<String> {
    serde_json::to_string(v).map_err(Error::from)
}

pub fn from_json<T: for<'de> serde::Deserialize<'de>>(s: &str) -> Result<T> {
    serde_json::from_str(s).map_err(Error::from)
}
