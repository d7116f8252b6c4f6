#![doc = r#"
RASTREAM — an adaptive streaming-decomposition engine for large rasters.

This crate decides how to cut a raster region that is too large to process in
memory into a finite, ordered sequence of smaller, non-overlapping sub-regions
("splits"), so that a processing pipeline can run once per split within a
caller-supplied RAM budget. It powers streaming writers and can be embedded in
any raster toolchain: the engine itself performs no I/O and no pixel
computation, it only plans.

Stability
---------
The public library API is experimental in initial releases. The planning
semantics are stable; surface names may evolve as the crate stabilizes.
Breaking changes can occur.

Add dependency
--------------
```toml
[dependencies]
rastream = "0.1"
```

Quick start: plan a RAM-bounded tiled write
-------------------------------------------
```rust
use rastream::{
    PipelineDescriptor, PixelFormat, Region, StageDescriptor, StreamingManager,
    StreamingPolicy,
};

fn main() -> rastream::Result<()> {
    // Three-band u16 output, with one upstream operator that needs a
    // full-size temporary (memory multiplier 2.0).
    let pipeline = PipelineDescriptor::new(3, PixelFormat::U16)
        .with_stage(StageDescriptor::new("pan_sharpen", 2.0));

    let region = Region::new(0, 0, 10_980, 10_980);
    let mut manager = StreamingManager::new(StreamingPolicy::TiledByRam {
        ram_budget_bytes: 256 * 1024 * 1024,
    });
    manager.prepare_streaming(&pipeline, region)?;

    for i in 0..manager.number_of_splits() {
        let split = manager.split(i);
        // run the pipeline for `split` and write it out, in index order
        let _ = split;
    }
    Ok(())
}
```

One-call planning
-----------------
```rust
use rastream::{plan_streaming, PipelineDescriptor, PixelFormat, Region, StreamingPolicy};

fn main() -> rastream::Result<()> {
    let pipeline = PipelineDescriptor::new(1, PixelFormat::F32);
    let plan = plan_streaming(
        StreamingPolicy::StrippedByLineCount { lines_per_strip: 512 },
        &pipeline,
        Region::new(0, 0, 25_000, 25_000),
    )?;

    for split in &plan {
        // splits arrive in row-major order and exactly tile the region
        let _ = split;
    }
    Ok(())
}
```

Policies
--------
- `StrippedByRam` — horizontal strips, count derived from the memory estimate.
- `StrippedByLineCount` — horizontal strips of a fixed number of lines.
- `TiledByRam` — roughly square tiles, count derived from the memory estimate.
- `TiledByDimension` — fixed-size tiles.
- `None` — one split equal to the full region.

A RAM budget of 0 resolves to the configured default (256 MB, overridable via
the `RASTREAM_MAX_RAM_HINT` environment variable, in megabytes).

Custom memory estimation
------------------------
RAM-driven policies consult a `MemoryPrintCalculator` exactly once per
preparation, with the full region. The default `PipelineMemoryPrint` sums
per-stage prints from the `PipelineDescriptor`; implement the trait to plug in
your own cost model.

```rust
use rastream::{
    plan_streaming_with, MemoryPrintCalculator, MemoryPrintError, PipelineDescriptor,
    PixelFormat, Region, StreamingPolicy,
};

struct FlatCost;

impl MemoryPrintCalculator for FlatCost {
    fn estimate_bytes(
        &self,
        _pipeline: &PipelineDescriptor,
        region: &Region,
    ) -> Result<u64, MemoryPrintError> {
        Ok(region.pixel_count().min(u64::MAX as u128) as u64 * 12)
    }
}

fn main() -> rastream::Result<()> {
    let pipeline = PipelineDescriptor::new(1, PixelFormat::U8);
    let plan = plan_streaming_with(
        StreamingPolicy::StrippedByRam { ram_budget_bytes: 64 * 1024 * 1024 },
        &pipeline,
        Region::new(0, 0, 8192, 8192),
        FlatCost,
    )?;
    assert!(plan.len() >= 1);
    Ok(())
}
```

Error handling
--------------
All fallible functions return `rastream::Result<T>`. Estimator failures
propagate as `Error::MemoryPrint` — the engine never silently substitutes a
guessed divisor. Querying a manager before preparation, or with an
out-of-range split index, is a contract violation and panics.

Concurrency
-----------
Preparation takes `&mut self`; every query takes `&self` and the plan never
mutates afterwards, so a prepared manager (or a cloned `SplitPlan`) can be
shared across reader threads freely. Scheduling splits across workers is the
caller's business — splits are disjoint, so concurrent writes to different
splits never race.

Useful modules
--------------
- [`api`] — high-level, ergonomic entry points.
- [`types`] — `StreamingPolicy` and friends.
- [`core`] — regions, splitters, memory print, and the streaming manager.
- [`error`] — crate-level `Error` and `Result`.
"#]

// Core modules (public)
pub mod api;
pub mod core;
pub mod error;
pub mod types;

// Curated public API surface
// Types
pub use crate::core::memory::{
    MemoryPrintCalculator, MemoryPrintError, PipelineDescriptor, PipelineMemoryPrint, PixelFormat,
    StageDescriptor,
};
pub use crate::core::params::{MAX_RAM_HINT_ENV, StreamingDefaults};
pub use crate::core::region::Region;
pub use crate::core::streaming::{SplitPlan, StreamingManager};
pub use error::{Error, Result};
pub use types::StreamingPolicy;

// Splitter primitives (useful to callers building their own planners)
pub use crate::core::splitter::{split_strips, split_tiles};

// High-level API re-exports
pub use api::{estimate_memory_print, plan_streaming, plan_streaming_with};
