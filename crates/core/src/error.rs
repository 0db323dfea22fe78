use derive_more::Display;
use std::error::Error;

/// The typed failure surface of the generation strategies.
///
/// The first three kinds are *expected* outcomes that the caller (or the
/// top-level driver) reacts to by picking a different strategy or retrying.
/// `Internal` wraps invariant breaches: those indicate a bug, abort the
/// pipeline for this invocation, and must not be retried with the same
/// inputs.
#[derive(Debug, Display)]
pub enum GenError {
    /// The fair-islands strategy cannot produce an acceptable map; rerun the
    /// plain island strategy instead.
    #[display(fmt = "fair islands gave up: {}", _0)]
    FallbackToIsland(String),

    /// An island sub-generator's precondition failed; rerun with the random
    /// height generator instead.
    #[display(fmt = "island generation not possible: {}", _0)]
    FallbackToRandom(String),

    /// A strategy attempt exceeded its time budget and was abandoned.
    #[display(fmt = "generation attempt exceeded its {} ms budget", budget_ms)]
    GenerationTimeout { budget_ms: u64 },

    /// The configuration is rejected before any generation work starts.
    #[display(fmt = "invalid config: {}", _0)]
    InvalidConfig(String),

    /// An internal invariant was breached mid-pipeline.
    #[display(fmt = "internal generation error: {}", _0)]
    Internal(anyhow::Error),
}

impl GenError {
    /// Stable machine-readable tag for each failure kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::FallbackToIsland(_) => "FALLBACK_TO_ISLAND",
            Self::FallbackToRandom(_) => "FALLBACK_TO_RANDOM",
            Self::GenerationTimeout { .. } => "GENERATION_TIMEOUT",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::Internal(_) => "INTERNAL",
        }
    }
}

impl Error for GenError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Internal(err) => err.source(),
            _ => None,
        }
    }
}

impl From<anyhow::Error> for GenError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err)
    }
}
