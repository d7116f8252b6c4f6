//! Shared types used across RASTREAM.
//! Includes the closed set of `StreamingPolicy` variants a caller picks
//! before preparing a split plan.
use serde::{Deserialize, Serialize};

/// How the requested region is cut into splits.
///
/// RAM-driven variants consult the pipeline memory print once during
/// preparation; fixed-size variants partition the region directly and never
/// touch the estimator. A `ram_budget_bytes` of 0 means "use the configured
/// default budget" (see [`crate::StreamingDefaults`]).
#[derive(Copy, Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum StreamingPolicy {
    /// Horizontal strips, strip count derived from the memory estimate.
    StrippedByRam { ram_budget_bytes: u64 },
    /// Horizontal strips of a fixed number of lines each.
    StrippedByLineCount { lines_per_strip: u64 },
    /// Roughly square tiles, tile count derived from the memory estimate.
    TiledByRam { ram_budget_bytes: u64 },
    /// Fixed-size tiles.
    TiledByDimension { tile_width: u64, tile_height: u64 },
    /// One split equal to the full region (streaming disabled).
    None,
}

impl StreamingPolicy {
    /// True for the variants that require a memory print estimate.
    pub fn is_ram_driven(&self) -> bool {
        matches!(
            self,
            StreamingPolicy::StrippedByRam { .. } | StreamingPolicy::TiledByRam { .. }
        )
    }
}

impl std::fmt::Display for StreamingPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StreamingPolicy::StrippedByRam { ram_budget_bytes } => {
                write!(f, "StrippedByRam({} bytes)", ram_budget_bytes)
            }
            StreamingPolicy::StrippedByLineCount { lines_per_strip } => {
                write!(f, "StrippedByLineCount({} lines)", lines_per_strip)
            }
            StreamingPolicy::TiledByRam { ram_budget_bytes } => {
                write!(f, "TiledByRam({} bytes)", ram_budget_bytes)
            }
            StreamingPolicy::TiledByDimension {
                tile_width,
                tile_height,
            } => {
                write!(f, "TiledByDimension({}x{})", tile_width, tile_height)
            }
            StreamingPolicy::None => write!(f, "None"),
        }
    }
}
