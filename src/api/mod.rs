//! High-level, ergonomic library API: one-call split planning for the common
//! cases, and direct access to the memory print estimate. Prefer these
//! entrypoints over the low-level core modules when integrating RASTREAM.
use crate::core::memory::{MemoryPrintCalculator, PipelineDescriptor, PipelineMemoryPrint};
use crate::core::region::Region;
use crate::core::streaming::{SplitPlan, StreamingManager};
use crate::error::Result;
use crate::types::StreamingPolicy;

/// Compute a split plan for `region` under `policy` using the default memory
/// print calculator.
///
/// Equivalent to constructing a [`StreamingManager`], preparing it, and
/// taking its plan.
pub fn plan_streaming(
    policy: StreamingPolicy,
    pipeline: &PipelineDescriptor,
    region: Region,
) -> Result<SplitPlan> {
    plan_streaming_with(policy, pipeline, region, PipelineMemoryPrint::new())
}

/// Compute a split plan with a caller-supplied memory print calculator.
pub fn plan_streaming_with<E: MemoryPrintCalculator>(
    policy: StreamingPolicy,
    pipeline: &PipelineDescriptor,
    region: Region,
    estimator: E,
) -> Result<SplitPlan> {
    let mut manager = StreamingManager::with_estimator(policy, estimator);
    manager.prepare_streaming(pipeline, region)?;
    match manager.plan() {
        Some(plan) => Ok(plan.clone()),
        // prepare_streaming stores a plan whenever it returns Ok
        None => unreachable!(),
    }
}

/// Estimate the bytes needed to materialize `region` through `pipeline` in
/// one pass, using the default calculator.
pub fn estimate_memory_print(pipeline: &PipelineDescriptor, region: Region) -> Result<u64> {
    Ok(PipelineMemoryPrint::new().estimate_bytes(pipeline, &region)?)
}
