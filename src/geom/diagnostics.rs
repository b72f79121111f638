//! Diagnostics reported by [`extract_quad_mesh`](super::extract_quad_mesh).
//!
//! None of the counters below signal failure: residual flips, cuts and bad
//! vertices are expected on hard inputs and the quad mesh is still emitted.
//! Fatal conditions are returned as errors instead.
//!
//! ```ignore
//! let extraction = extract_quad_mesh(&field, ExtractOptions::default())?;
//! eprintln!("{}", extraction.diagnostics.summary());
//! if !extraction.diagnostics.is_clean() {
//!     eprintln!("{}", extraction.diagnostics);
//! }
//! ```

use std::fmt;

/// Per-stage counters of one extraction run.
#[derive(Debug, Default, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ExtractDiagnostics {
    pub orientation_singularity_count: usize,
    pub position_singularity_count: usize,
    /// Undirected edges of the input mesh.
    pub edge_count: usize,
    /// Offsets clamped into the unit range by the encoder.
    pub clamped_edge_count: usize,

    /// Interior edges left as seams by the constraint solver.
    pub cut_count: usize,
    pub initial_flow: i32,
    pub target_flow: i32,
    /// Seam edits applied to neutralise the target flow.
    pub random_edit_count: usize,
    pub unresolved_flow: i32,

    pub flow_levels: usize,
    /// Faces the flow optimizer left unbalanced.
    pub unbalanced_face_count: usize,
    /// Edges zeroed afterwards so that every face sums to zero.
    pub zeroed_edge_count: usize,

    pub collapsed_edge_count: usize,
    pub merged_edge_count: usize,
    pub accepted_move_count: usize,
    /// Faces with negative lattice area after flip repair.
    pub flipped_face_count: usize,
    pub healed_vertex_count: usize,

    pub compact_vertex_count: usize,
    pub bad_vertex_count: usize,
    pub paired_quad_count: usize,
    pub patched_quad_count: usize,

    pub solver_iterations: usize,
    pub solver_residual: f64,

    pub timing: Option<super::metrics::GeomTimingReport>,

    /// Human-readable notes about degraded stages, e.g.
    /// "position solve did not converge".
    pub warnings: Vec<String>,
}

impl ExtractDiagnostics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every face balanced by the optimizer, nothing flipped or dropped, no
    /// warnings.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.unbalanced_face_count == 0
            && self.flipped_face_count == 0
            && self.bad_vertex_count == 0
            && self.unresolved_flow == 0
            && self.warnings.is_empty()
    }

    #[must_use]
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    #[must_use]
    pub fn quad_count(&self) -> usize {
        self.paired_quad_count + self.patched_quad_count
    }

    pub fn add_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    /// One-line summary: `"Q:{quads} V:{vertices} [issues...]"`.
    #[must_use]
    pub fn summary(&self) -> String {
        let mut parts = vec![format!("Q:{} V:{}", self.quad_count(), self.compact_vertex_count)];

        let singularities = self.orientation_singularity_count + self.position_singularity_count;
        if singularities > 0 {
            parts.push(format!("singular:{singularities}"));
        }
        if self.cut_count > 0 {
            parts.push(format!("cuts:{}", self.cut_count));
        }
        if self.unbalanced_face_count > 0 {
            parts.push(format!("unbalanced:{}", self.unbalanced_face_count));
        }
        if self.flipped_face_count > 0 {
            parts.push(format!("flipped:{}", self.flipped_face_count));
        }
        if self.bad_vertex_count > 0 {
            parts.push(format!("bad:{}", self.bad_vertex_count));
        }
        if self.patched_quad_count > 0 {
            parts.push(format!("patched:{}", self.patched_quad_count));
        }

        parts.join(" ")
    }
}

impl fmt::Display for ExtractDiagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Extraction Diagnostics:")?;
        writeln!(
            f,
            "  Singularities: {} orientation, {} position",
            self.orientation_singularity_count, self.position_singularity_count
        )?;
        writeln!(f, "  Edges: {} ({} clamped)", self.edge_count, self.clamped_edge_count)?;
        writeln!(
            f,
            "  Flow: initial {}, target {}, {} seam edits, {} cuts",
            self.initial_flow, self.target_flow, self.random_edit_count, self.cut_count
        )?;
        if self.unresolved_flow != 0 {
            writeln!(f, "  Unresolved flow: {}", self.unresolved_flow)?;
        }
        writeln!(
            f,
            "  Refinement: {} levels, {} unbalanced faces, {} edges zeroed",
            self.flow_levels, self.unbalanced_face_count, self.zeroed_edge_count
        )?;
        writeln!(
            f,
            "  Repair: {} collapses, {} merged edges, {} moves, {} healed",
            self.collapsed_edge_count, self.merged_edge_count, self.accepted_move_count, self.healed_vertex_count
        )?;
        if self.flipped_face_count > 0 {
            writeln!(f, "  Flipped faces: {}", self.flipped_face_count)?;
        }
        writeln!(f, "  Vertices: {} ({} bad)", self.compact_vertex_count, self.bad_vertex_count)?;
        writeln!(f, "  Quads: {} paired, {} patched", self.paired_quad_count, self.patched_quad_count)?;
        writeln!(
            f,
            "  Solver: {} iterations, residual {:.3e}",
            self.solver_iterations, self.solver_residual
        )?;

        if !self.warnings.is_empty() {
            writeln!(f, "  Warnings:")?;
            for warning in &self.warnings {
                writeln!(f, "    - {}", warning)?;
            }
        }

        if let Some(ref timing) = self.timing {
            writeln!(f, "  Timing: {} ms total", timing.total_ms())?;
        }

        let status = if self.is_clean() { "CLEAN" } else { "DEGRADED" };
        writeln!(f, "  Status: {}", status)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_clean() {
        let diag = ExtractDiagnostics::default();
        assert!(diag.is_clean());
        assert!(!diag.has_warnings());
        assert_eq!(diag.quad_count(), 0);
    }

    #[test]
    fn test_flipped_faces_are_not_clean() {
        let diag = ExtractDiagnostics {
            flipped_face_count: 2,
            ..Default::default()
        };
        assert!(!diag.is_clean());
    }

    #[test]
    fn test_summary() {
        let diag = ExtractDiagnostics {
            paired_quad_count: 10,
            patched_quad_count: 2,
            compact_vertex_count: 16,
            cut_count: 3,
            ..Default::default()
        };
        let summary = diag.summary();
        assert!(summary.contains("Q:12"));
        assert!(summary.contains("V:16"));
        assert!(summary.contains("cuts:3"));
        assert!(summary.contains("patched:2"));
        assert!(!summary.contains("flipped"));
    }

    #[test]
    fn test_display() {
        let mut diag = ExtractDiagnostics {
            compact_vertex_count: 4,
            paired_quad_count: 1,
            ..Default::default()
        };
        diag.add_warning("position solve did not converge");

        let output = format!("{}", diag);
        assert!(output.contains("Vertices: 4 (0 bad)"));
        assert!(output.contains("Quads: 1 paired, 0 patched"));
        assert!(output.contains("position solve did not converge"));
        assert!(output.contains("DEGRADED"));
    }
}
