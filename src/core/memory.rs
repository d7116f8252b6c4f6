//! Pipeline memory print estimation.
//!
//! A [`PipelineDescriptor`] is a flat description of the processing graph
//! upstream of the streaming engine: the output geometry (bands, sample
//! format) plus one [`StageDescriptor`] per operator stating how much memory
//! that operator needs relative to the raw output buffer. The default
//! [`PipelineMemoryPrint`] calculator turns a descriptor and a region into a
//! byte estimate; the streaming manager divides RAM budgets by it.
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::core::region::Region;

/// Errors encountered while estimating a pipeline memory print
#[derive(Debug, Error)]
pub enum MemoryPrintError {
    #[error("pipeline descriptor has no bands")]
    NoBands,
    #[error("stage '{stage}' has invalid memory multiplier {multiplier}")]
    InvalidMultiplier { stage: String, multiplier: f64 },
    #[error("invalid bias correction factor: {0}")]
    InvalidBias(f64),
}

/// Sample format of one band, with its in-memory width.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum PixelFormat {
    U8,
    U16,
    I16,
    U32,
    I32,
    F32,
    F64,
    /// Complex float, two f32 components per sample
    CF32,
    /// Complex double, two f64 components per sample
    CF64,
}

impl PixelFormat {
    pub fn bytes_per_sample(&self) -> u64 {
        match self {
            PixelFormat::U8 => 1,
            PixelFormat::U16 | PixelFormat::I16 => 2,
            PixelFormat::U32 | PixelFormat::I32 | PixelFormat::F32 => 4,
            PixelFormat::F64 | PixelFormat::CF32 => 8,
            PixelFormat::CF64 => 16,
        }
    }
}

/// One upstream operator and its memory behavior relative to the raw output
/// buffer for the same region.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDescriptor {
    pub name: String,
    /// Peak working-set of this stage as a multiple of the raw output bytes.
    /// 1.0 for an in-place filter, 2.0 for one needing a full-size temporary.
    #[serde(default = "default_multiplier")]
    pub memory_multiplier: f64,
    /// Region-independent allocation (lookup tables, kernels).
    #[serde(default)]
    pub fixed_overhead_bytes: u64,
}

fn default_multiplier() -> f64 {
    1.0
}

impl StageDescriptor {
    pub fn new(name: impl Into<String>, memory_multiplier: f64) -> Self {
        Self {
            name: name.into(),
            memory_multiplier,
            fixed_overhead_bytes: 0,
        }
    }

    pub fn with_fixed_overhead(mut self, bytes: u64) -> Self {
        self.fixed_overhead_bytes = bytes;
        self
    }
}

/// Description of the processing graph upstream of the streaming engine.
///
/// Opaque to the streaming manager; only the memory print calculator reads
/// it. An empty stage list describes a pipeline that materializes exactly one
/// output buffer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineDescriptor {
    pub bands: usize,
    pub pixel_format: PixelFormat,
    #[serde(default)]
    pub stages: Vec<StageDescriptor>,
}

impl PipelineDescriptor {
    pub fn new(bands: usize, pixel_format: PixelFormat) -> Self {
        Self {
            bands,
            pixel_format,
            stages: Vec::new(),
        }
    }

    pub fn with_stage(mut self, stage: StageDescriptor) -> Self {
        self.stages.push(stage);
        self
    }

    /// Parse a descriptor from its JSON sidecar form.
    pub fn from_json_str(s: &str) -> crate::Result<Self> {
        let descriptor: Self = serde_json::from_str(s)?;
        if descriptor.bands == 0 {
            return Err(crate::Error::InvalidArgument {
                arg: "bands",
                value: descriptor.bands.to_string(),
            });
        }
        Ok(descriptor)
    }

    /// Load a descriptor from a JSON file.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }
}

/// Estimates the peak bytes needed to materialize `region` through the whole
/// pipeline in one pass.
///
/// Contract relied upon by the streaming manager: for a fixed pipeline the
/// estimate is monotonic in region size, and the per-pixel cost does not
/// change under splitting.
pub trait MemoryPrintCalculator {
    fn estimate_bytes(
        &self,
        pipeline: &PipelineDescriptor,
        region: &Region,
    ) -> Result<u64, MemoryPrintError>;
}

/// Default calculator: sums per-stage prints, each linear in the raw output
/// bytes of the region, then applies a global bias correction factor.
#[derive(Debug, Clone)]
pub struct PipelineMemoryPrint {
    bias: f64,
}

impl Default for PipelineMemoryPrint {
    fn default() -> Self {
        Self { bias: 1.0 }
    }
}

impl PipelineMemoryPrint {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scale every estimate by `bias`. Lets a caller compensate for known
    /// under- or over-estimation of a pipeline without editing its stages.
    pub fn with_bias(mut self, bias: f64) -> Self {
        self.bias = bias;
        self
    }
}

// Scales a byte count by a non-negative finite factor, saturating at
// u64::MAX. Estimates near the top of the range are already meaningless as
// exact values, only as "bigger than any budget".
fn scale_bytes(bytes: u128, factor: f64) -> u128 {
    let scaled = (bytes as f64 * factor).ceil();
    if scaled >= u64::MAX as f64 {
        u64::MAX as u128
    } else {
        scaled as u128
    }
}

impl MemoryPrintCalculator for PipelineMemoryPrint {
    fn estimate_bytes(
        &self,
        pipeline: &PipelineDescriptor,
        region: &Region,
    ) -> Result<u64, MemoryPrintError> {
        if !self.bias.is_finite() || self.bias <= 0.0 {
            return Err(MemoryPrintError::InvalidBias(self.bias));
        }
        if pipeline.bands == 0 {
            return Err(MemoryPrintError::NoBands);
        }

        let base = region
            .pixel_count()
            .saturating_mul(pipeline.bands as u128)
            .saturating_mul(pipeline.pixel_format.bytes_per_sample() as u128);

        let mut print: u128 = if pipeline.stages.is_empty() {
            base
        } else {
            let mut sum = 0u128;
            for stage in &pipeline.stages {
                let m = stage.memory_multiplier;
                if !m.is_finite() || m < 0.0 {
                    return Err(MemoryPrintError::InvalidMultiplier {
                        stage: stage.name.clone(),
                        multiplier: m,
                    });
                }
                sum = sum
                    .saturating_add(scale_bytes(base, m))
                    .saturating_add(stage.fixed_overhead_bytes as u128);
            }
            sum
        };

        print = scale_bytes(print, self.bias);
        let print = u64::try_from(print).unwrap_or(u64::MAX);

        debug!(
            "Estimated memory print for region {}: {} bytes ({} stages)",
            region,
            print,
            pipeline.stages.len()
        );
        Ok(print)
    }
}
