//! The streaming manager: turns a requested region, a streaming policy, and
//! (for RAM-driven policies) a pipeline memory estimate into an ordered plan
//! of disjoint splits that exactly cover the region.
//!
//! The plan is immutable once prepared; a writer walks it in index order and
//! runs the pipeline once per split. Preparing again fully replaces the plan.
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::core::memory::{MemoryPrintCalculator, PipelineDescriptor, PipelineMemoryPrint};
use crate::core::params::StreamingDefaults;
use crate::core::region::Region;
use crate::core::splitter::{isqrt_ceil, split_strips, split_tiles};
use crate::error::Result;
use crate::types::StreamingPolicy;

/// Ordered sequence of disjoint regions exactly covering a requested region,
/// in row-major raster order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitPlan {
    region: Region,
    splits: Vec<Region>,
}

impl SplitPlan {
    fn new(region: Region, splits: Vec<Region>) -> Self {
        Self { region, splits }
    }

    /// The region this plan covers.
    pub fn region(&self) -> Region {
        self.region
    }

    pub fn len(&self) -> usize {
        self.splits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.splits.is_empty()
    }

    pub fn get(&self, i: usize) -> Option<&Region> {
        self.splits.get(i)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Region> {
        self.splits.iter()
    }
}

impl<'a> IntoIterator for &'a SplitPlan {
    type Item = &'a Region;
    type IntoIter = std::slice::Iter<'a, Region>;

    fn into_iter(self) -> Self::IntoIter {
        self.splits.iter()
    }
}

/// Decides how a region is cut into splits under a [`StreamingPolicy`].
///
/// Construct one per output target, call [`prepare_streaming`], then query
/// [`number_of_splits`] and [`split`] while running the pipeline once per
/// split. The estimator is injected at construction and consulted exactly
/// once per preparation, and only for RAM-driven policies.
///
/// After preparation the manager never mutates, so sharing `&StreamingManager`
/// across reader threads is safe; re-preparation requires `&mut self`.
///
/// [`prepare_streaming`]: StreamingManager::prepare_streaming
/// [`number_of_splits`]: StreamingManager::number_of_splits
/// [`split`]: StreamingManager::split
pub struct StreamingManager<E = PipelineMemoryPrint> {
    policy: StreamingPolicy,
    defaults: StreamingDefaults,
    estimator: E,
    plan: Option<SplitPlan>,
}

impl StreamingManager<PipelineMemoryPrint> {
    /// Manager with the default memory print calculator and defaults
    /// resolved from the environment.
    pub fn new(policy: StreamingPolicy) -> Self {
        Self::with_estimator(policy, PipelineMemoryPrint::new())
    }
}

impl<E: MemoryPrintCalculator> StreamingManager<E> {
    /// Manager with a caller-supplied memory print calculator.
    pub fn with_estimator(policy: StreamingPolicy, estimator: E) -> Self {
        Self {
            policy,
            defaults: StreamingDefaults::from_env(),
            estimator,
            plan: None,
        }
    }

    /// Replace the fallback knobs (default RAM budget).
    pub fn with_defaults(mut self, defaults: StreamingDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn policy(&self) -> StreamingPolicy {
        self.policy
    }

    pub fn estimator(&self) -> &E {
        &self.estimator
    }

    /// The prepared plan, or `None` before [`prepare_streaming`] has run.
    ///
    /// [`prepare_streaming`]: StreamingManager::prepare_streaming
    pub fn plan(&self) -> Option<&SplitPlan> {
        self.plan.as_ref()
    }

    /// Compute the split plan for `region` under the active policy.
    ///
    /// `pipeline` is consulted (through the estimator, exactly once) only for
    /// RAM-driven policies on a non-empty region. Degenerate regions are
    /// legal: a zero-size dimension yields a plan of zero splits. Preparing
    /// again fully replaces any previous plan.
    ///
    /// The only failure mode is an estimator error, which propagates; the
    /// manager never falls back to a guessed divisor.
    pub fn prepare_streaming(
        &mut self,
        pipeline: &PipelineDescriptor,
        region: Region,
    ) -> Result<()> {
        // drop any previous plan so a failed preparation cannot leave a
        // stale one behind
        self.plan = None;

        if region.is_empty() {
            debug!("Empty region {} requested, plan has no splits", region);
            self.plan = Some(SplitPlan::new(region, Vec::new()));
            return Ok(());
        }

        let splits = match self.policy {
            StreamingPolicy::None => vec![region],
            StreamingPolicy::StrippedByLineCount { lines_per_strip } => {
                split_strips(&region, lines_per_strip)
            }
            StreamingPolicy::TiledByDimension {
                tile_width,
                tile_height,
            } => split_tiles(&region, tile_width, tile_height),
            StreamingPolicy::StrippedByRam { ram_budget_bytes } => {
                let divisions = self.optimal_number_of_divisions(pipeline, &region, ram_budget_bytes)?;
                // never a strip thinner than one line
                let divisions = divisions.min(region.height);
                let lines = region.height.div_ceil(divisions);
                info!(
                    "Streaming region {} as {} strips of up to {} lines",
                    region, divisions, lines
                );
                split_strips(&region, lines)
            }
            StreamingPolicy::TiledByRam { ram_budget_bytes } => {
                let divisions = self.optimal_number_of_divisions(pipeline, &region, ram_budget_bytes)?;
                let max_divisions = region.pixel_count().min(u64::MAX as u128) as u64;
                let divisions = divisions.min(max_divisions);
                // grid shape approximating square tiles for the divisor
                let cols = isqrt_ceil(divisions).min(region.width);
                let rows = divisions.div_ceil(cols).min(region.height);
                let tile_width = region.width.div_ceil(cols);
                let tile_height = region.height.div_ceil(rows);
                info!(
                    "Streaming region {} as a {}x{} grid of {}x{} tiles",
                    region, cols, rows, tile_width, tile_height
                );
                split_tiles(&region, tile_width, tile_height)
            }
        };

        debug!(
            "Prepared {} splits for region {} under {}",
            splits.len(),
            region,
            self.policy
        );
        self.plan = Some(SplitPlan::new(region, splits));
        Ok(())
    }

    /// Number of splits in the prepared plan.
    ///
    /// # Panics
    ///
    /// Panics if called before [`prepare_streaming`], which is a contract
    /// violation rather than a recoverable condition.
    ///
    /// [`prepare_streaming`]: StreamingManager::prepare_streaming
    pub fn number_of_splits(&self) -> usize {
        self.plan
            .as_ref()
            .expect("number_of_splits() called before prepare_streaming()")
            .len()
    }

    /// The `i`-th split of the prepared plan.
    ///
    /// # Panics
    ///
    /// Panics if called before [`prepare_streaming`] or with `i` out of
    /// range. An out-of-range index is never clamped: handing back a wrong
    /// region would silently corrupt a streamed write.
    ///
    /// [`prepare_streaming`]: StreamingManager::prepare_streaming
    pub fn split(&self, i: usize) -> Region {
        let plan = self
            .plan
            .as_ref()
            .expect("split() called before prepare_streaming()");
        match plan.get(i) {
            Some(region) => *region,
            None => panic!(
                "split index {} out of range, plan has {} splits",
                i,
                plan.len()
            ),
        }
    }

    // One estimator query with the full region, then the divisor. The
    // estimate is taken as invariant under splitting, so a single query
    // suffices for any divisor.
    fn optimal_number_of_divisions(
        &self,
        pipeline: &PipelineDescriptor,
        region: &Region,
        ram_budget_bytes: u64,
    ) -> Result<u64> {
        let budget = if ram_budget_bytes == 0 {
            let fallback = self.defaults.ram_budget_bytes();
            debug!(
                "No RAM budget supplied, using configured hint of {} bytes",
                fallback
            );
            fallback
        } else {
            ram_budget_bytes
        };
        let budget = budget.max(1);
        let print = self.estimator.estimate_bytes(pipeline, region)?;
        let divisions = print.div_ceil(budget).max(1);
        debug!(
            "Memory print {} bytes against budget {} bytes: {} divisions",
            print, budget, divisions
        );
        Ok(divisions)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;
    use crate::core::memory::{MemoryPrintError, PixelFormat};

    /// Estimator stub reporting a fixed print and counting invocations.
    struct FixedPrint {
        print: u64,
        calls: Rc<Cell<usize>>,
    }

    impl FixedPrint {
        fn new(print: u64) -> (Self, Rc<Cell<usize>>) {
            let calls = Rc::new(Cell::new(0));
            (
                Self {
                    print,
                    calls: calls.clone(),
                },
                calls,
            )
        }
    }

    impl MemoryPrintCalculator for FixedPrint {
        fn estimate_bytes(
            &self,
            _pipeline: &PipelineDescriptor,
            _region: &Region,
        ) -> std::result::Result<u64, MemoryPrintError> {
            self.calls.set(self.calls.get() + 1);
            Ok(self.print)
        }
    }

    struct FailingEstimator;

    impl MemoryPrintCalculator for FailingEstimator {
        fn estimate_bytes(
            &self,
            _pipeline: &PipelineDescriptor,
            _region: &Region,
        ) -> std::result::Result<u64, MemoryPrintError> {
            Err(MemoryPrintError::NoBands)
        }
    }

    fn pipeline() -> PipelineDescriptor {
        PipelineDescriptor::new(1, PixelFormat::U8)
    }

    #[test]
    fn test_stripped_by_ram_divisor() {
        // 400 MB print against a 100 MB budget: 4 strips
        let (estimator, calls) = FixedPrint::new(400_000_000);
        let mut manager = StreamingManager::with_estimator(
            StreamingPolicy::StrippedByRam {
                ram_budget_bytes: 100_000_000,
            },
            estimator,
        );
        manager
            .prepare_streaming(&pipeline(), Region::new(0, 0, 100, 100))
            .unwrap();
        assert_eq!(manager.number_of_splits(), 4);
        assert_eq!(calls.get(), 1);
        assert_eq!(manager.split(0), Region::new(0, 0, 100, 25));
        assert_eq!(manager.split(3), Region::new(0, 75, 100, 25));
    }

    #[test]
    fn test_divisor_clamped_to_line_count() {
        // print demands 1000 divisions but the region only has 10 lines
        let (estimator, _) = FixedPrint::new(1000);
        let mut manager = StreamingManager::with_estimator(
            StreamingPolicy::StrippedByRam { ram_budget_bytes: 1 },
            estimator,
        );
        manager
            .prepare_streaming(&pipeline(), Region::new(0, 0, 100, 10))
            .unwrap();
        assert_eq!(manager.number_of_splits(), 10);
        for i in 0..10 {
            assert_eq!(manager.split(i).height, 1);
        }
    }

    #[test]
    fn test_tiled_by_ram_grid_shape() {
        // 16 divisions over a square region: 4x4 grid of 25x25 tiles
        let (estimator, calls) = FixedPrint::new(160);
        let mut manager = StreamingManager::with_estimator(
            StreamingPolicy::TiledByRam {
                ram_budget_bytes: 10,
            },
            estimator,
        );
        manager
            .prepare_streaming(&pipeline(), Region::new(0, 0, 100, 100))
            .unwrap();
        assert_eq!(manager.number_of_splits(), 16);
        assert_eq!(calls.get(), 1);
        assert_eq!(manager.split(0), Region::new(0, 0, 25, 25));
        assert_eq!(manager.split(15), Region::new(75, 75, 25, 25));
    }

    #[test]
    fn test_tiled_by_ram_narrow_region() {
        // a 1-pixel-wide region cannot host a square grid; columns clamp to 1
        let (estimator, _) = FixedPrint::new(100);
        let mut manager = StreamingManager::with_estimator(
            StreamingPolicy::TiledByRam { ram_budget_bytes: 10 },
            estimator,
        );
        manager
            .prepare_streaming(&pipeline(), Region::new(0, 0, 1, 100))
            .unwrap();
        assert_eq!(manager.number_of_splits(), 10);
        for i in 0..10 {
            assert_eq!(manager.split(i).width, 1);
        }
    }

    #[test]
    fn test_zero_budget_uses_default_hint() {
        // 4 MB print against a 1 MB default hint: 4 strips
        let (estimator, _) = FixedPrint::new(4 * 1024 * 1024);
        let mut manager = StreamingManager::with_estimator(
            StreamingPolicy::StrippedByRam { ram_budget_bytes: 0 },
            estimator,
        )
        .with_defaults(StreamingDefaults { max_ram_hint_mb: 1 });
        manager
            .prepare_streaming(&pipeline(), Region::new(0, 0, 1024, 1024))
            .unwrap();
        assert_eq!(manager.number_of_splits(), 4);
    }

    #[test]
    fn test_no_streaming_single_split() {
        let mut manager = StreamingManager::new(StreamingPolicy::None);
        let region = Region::new(5, -3, 777, 333);
        manager.prepare_streaming(&pipeline(), region).unwrap();
        assert_eq!(manager.number_of_splits(), 1);
        assert_eq!(manager.split(0), region);
    }

    #[test]
    fn test_empty_region_skips_estimator() {
        let (estimator, calls) = FixedPrint::new(u64::MAX);
        let mut manager = StreamingManager::with_estimator(
            StreamingPolicy::TiledByRam { ram_budget_bytes: 1 },
            estimator,
        );
        manager
            .prepare_streaming(&pipeline(), Region::new(0, 0, 0, 500))
            .unwrap();
        assert_eq!(manager.number_of_splits(), 0);
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn test_fixed_policies_skip_estimator() {
        let (estimator, calls) = FixedPrint::new(u64::MAX);
        let mut manager = StreamingManager::with_estimator(
            StreamingPolicy::StrippedByLineCount {
                lines_per_strip: 250,
            },
            estimator,
        );
        manager
            .prepare_streaming(&pipeline(), Region::new(0, 0, 1000, 1000))
            .unwrap();
        assert_eq!(manager.number_of_splits(), 4);
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn test_estimator_failure_propagates() {
        let mut manager = StreamingManager::with_estimator(
            StreamingPolicy::StrippedByRam { ram_budget_bytes: 1 },
            FailingEstimator,
        );
        let result = manager.prepare_streaming(&pipeline(), Region::new(0, 0, 10, 10));
        assert!(result.is_err());
        // no stale plan appears on failure
        assert!(manager.plan().is_none());
    }

    #[test]
    fn test_reprepare_replaces_plan() {
        let mut manager = StreamingManager::new(StreamingPolicy::StrippedByLineCount {
            lines_per_strip: 10,
        });
        manager
            .prepare_streaming(&pipeline(), Region::new(0, 0, 100, 100))
            .unwrap();
        assert_eq!(manager.number_of_splits(), 10);
        manager
            .prepare_streaming(&pipeline(), Region::new(0, 0, 100, 30))
            .unwrap();
        assert_eq!(manager.number_of_splits(), 3);
        assert_eq!(manager.plan().unwrap().region(), Region::new(0, 0, 100, 30));
    }

    #[test]
    #[should_panic(expected = "before prepare_streaming")]
    fn test_query_before_prepare_panics() {
        let manager = StreamingManager::new(StreamingPolicy::None);
        manager.number_of_splits();
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_split_out_of_range_panics() {
        let mut manager = StreamingManager::new(StreamingPolicy::None);
        manager
            .prepare_streaming(&pipeline(), Region::new(0, 0, 0, 500))
            .unwrap();
        manager.split(0);
    }

    #[test]
    fn test_plan_iteration() {
        let mut manager = StreamingManager::new(StreamingPolicy::TiledByDimension {
            tile_width: 512,
            tile_height: 512,
        });
        manager
            .prepare_streaming(&pipeline(), Region::new(0, 0, 1024, 768))
            .unwrap();
        let plan = manager.plan().unwrap();
        assert_eq!(plan.len(), 4);
        let covered: u128 = plan.iter().map(|s| s.pixel_count()).sum();
        assert_eq!(covered, plan.region().pixel_count());
    }
}
