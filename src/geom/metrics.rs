//! Opt-in per-stage timing for the extraction pipeline.
//!
//! Timing is collected only with the `mesh_engine_metrics` feature on
//! non-wasm targets; otherwise every call is a no-op and
//! [`GeomMetrics::end`] returns `None`.
//!
//! ```ignore
//! use quadfield_engine::geom::{GeomMetrics, TimingBucket};
//!
//! let mut metrics = GeomMetrics::default();
//! metrics.begin();
//! let singularities = metrics.time(TimingBucket::SingularityLocation, || locate_singularities(&field));
//! if let Some(report) = metrics.end() {
//!     println!("singularities: {} ns", report.singularity_location_ns);
//! }
//! ```

/// Pipeline stage a timing sample belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimingBucket {
    SingularityLocation,
    EdgeEncoding,
    IntegerConstraints,
    FlowRefinement,
    FlipRepair,
    PositionSolve,
    Compaction,
    QuadExtraction,
    HolePatching,
}

/// Cumulative nanoseconds per stage.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GeomTimingReport {
    pub singularity_location_ns: u64,
    pub edge_encoding_ns: u64,
    pub integer_constraints_ns: u64,
    pub flow_refinement_ns: u64,
    pub flip_repair_ns: u64,
    pub position_solve_ns: u64,
    pub compaction_ns: u64,
    pub quad_extraction_ns: u64,
    pub hole_patching_ns: u64,
}

impl GeomTimingReport {
    #[must_use]
    pub fn total_ns(&self) -> u64 {
        self.singularity_location_ns
            .saturating_add(self.edge_encoding_ns)
            .saturating_add(self.integer_constraints_ns)
            .saturating_add(self.flow_refinement_ns)
            .saturating_add(self.flip_repair_ns)
            .saturating_add(self.position_solve_ns)
            .saturating_add(self.compaction_ns)
            .saturating_add(self.quad_extraction_ns)
            .saturating_add(self.hole_patching_ns)
    }

    #[must_use]
    pub fn total_ms(&self) -> f64 {
        self.total_ns() as f64 / 1_000_000.0
    }
}

/// Accumulator for stage timings.
///
/// Call [`begin`](Self::begin) to reset, wrap stages with
/// [`time`](Self::time) and collect the report with [`end`](Self::end).
#[derive(Debug, Default)]
pub struct GeomMetrics {
    #[cfg(all(feature = "mesh_engine_metrics", not(target_arch = "wasm32")))]
    report: GeomTimingReport,
}

impl GeomMetrics {
    pub fn begin(&mut self) {
        #[cfg(all(feature = "mesh_engine_metrics", not(target_arch = "wasm32")))]
        {
            self.report = GeomTimingReport::default();
        }
    }

    /// The accumulated report, or `None` when metrics are compiled out.
    #[must_use]
    pub fn end(&self) -> Option<GeomTimingReport> {
        #[cfg(all(feature = "mesh_engine_metrics", not(target_arch = "wasm32")))]
        {
            Some(self.report.clone())
        }
        #[cfg(not(all(feature = "mesh_engine_metrics", not(target_arch = "wasm32"))))]
        {
            None
        }
    }

    /// Runs `f`, adding its wall time to `bucket`.
    pub fn time<R>(&mut self, bucket: TimingBucket, f: impl FnOnce() -> R) -> R {
        #[cfg(all(feature = "mesh_engine_metrics", not(target_arch = "wasm32")))]
        {
            let start = std::time::Instant::now();
            let result = f();
            let nanos = start.elapsed().as_nanos().min(u128::from(u64::MAX)) as u64;
            self.add_to_bucket(bucket, nanos);
            result
        }

        #[cfg(not(all(feature = "mesh_engine_metrics", not(target_arch = "wasm32"))))]
        {
            let _ = bucket;
            f()
        }
    }

    #[cfg(all(feature = "mesh_engine_metrics", not(target_arch = "wasm32")))]
    fn add_to_bucket(&mut self, bucket: TimingBucket, nanos: u64) {
        let slot = match bucket {
            TimingBucket::SingularityLocation => &mut self.report.singularity_location_ns,
            TimingBucket::EdgeEncoding => &mut self.report.edge_encoding_ns,
            TimingBucket::IntegerConstraints => &mut self.report.integer_constraints_ns,
            TimingBucket::FlowRefinement => &mut self.report.flow_refinement_ns,
            TimingBucket::FlipRepair => &mut self.report.flip_repair_ns,
            TimingBucket::PositionSolve => &mut self.report.position_solve_ns,
            TimingBucket::Compaction => &mut self.report.compaction_ns,
            TimingBucket::QuadExtraction => &mut self.report.quad_extraction_ns,
            TimingBucket::HolePatching => &mut self.report.hole_patching_ns,
        };
        *slot = slot.saturating_add(nanos);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timing_report_total() {
        let report = GeomTimingReport {
            flip_repair_ns: 1000,
            position_solve_ns: 2000,
            edge_encoding_ns: 3000,
            ..GeomTimingReport::default()
        };
        assert_eq!(report.total_ns(), 6000);
        assert!((report.total_ms() - 0.006).abs() < 1e-9);
    }

    #[test]
    fn test_total_saturates() {
        let report = GeomTimingReport {
            compaction_ns: u64::MAX,
            hole_patching_ns: 5,
            ..GeomTimingReport::default()
        };
        assert_eq!(report.total_ns(), u64::MAX);
    }

    #[test]
    fn test_time_returns_closure_result() {
        let mut metrics = GeomMetrics::default();
        metrics.begin();
        let result = metrics.time(TimingBucket::FlowRefinement, || 42);
        assert_eq!(result, 42);
        let _ = metrics.end();
    }
}
