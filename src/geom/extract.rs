//! Quad extraction pipeline.
//!
//! Stages run once each, in order: singularity location, edge encoding,
//! integer constraints, multi-resolution flow refinement, flip repair,
//! position solve, compaction, quad pairing and hole patching.

use std::collections::BTreeSet;

use super::compact::compact_vertices;
use super::constraints::{ConstraintError, solve_integer_constraints};
use super::diagnostics::ExtractDiagnostics;
use super::edge_encoder::{EncodedEdges, encode_edges};
use super::field::FieldMesh;
use super::flip_repair::{RepairError, RepairSession, edges_around_singularities};
use super::flow::{EdgeGraph, FlowError, GreedyFlowOptimizer, IntegerOptimizer, refine_flow};
use super::hole_patch::patch_holes;
use super::mesh::EdgeKey;
use super::metrics::{GeomMetrics, TimingBucket};
use super::position_solve::{PositionSolver, solve_positions};
use super::quad_cells::{find_bad_edges, pair_quad_cells};
use super::quad_mesh::QuadMesh;
use super::singularity::{Singularities, locate_singularities};
use super::Rot4;

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error(transparent)]
    Constraint(#[from] ConstraintError),
    #[error(transparent)]
    Flow(#[from] FlowError),
    #[error(transparent)]
    Repair(#[from] RepairError),
}

/// Knobs of [`extract_quad_mesh`].
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ExtractOptions {
    /// Seed for the choice of seam edges that absorb leftover flow.
    pub seed: u64,
    /// Largest per-component change a repair move may leave on an edge.
    pub max_edit_radius: usize,
    /// Cap on the number of flow hierarchy levels, the finest included.
    pub flow_levels: usize,
    pub position_solver: PositionSolver,
    /// Close interior holes between the paired quads.
    pub patch_holes: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            seed: 0,
            max_edit_radius: 1,
            flow_levels: 8,
            position_solver: PositionSolver::ConjugateGradient { max_iterations: 1000, tolerance: 1e-8 },
            patch_holes: true,
        }
    }
}

impl ExtractOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    #[must_use]
    pub const fn with_max_edit_radius(mut self, radius: usize) -> Self {
        self.max_edit_radius = radius;
        self
    }

    #[must_use]
    pub const fn with_flow_levels(mut self, levels: usize) -> Self {
        self.flow_levels = levels;
        self
    }

    #[must_use]
    pub const fn with_position_solver(mut self, solver: PositionSolver) -> Self {
        self.position_solver = solver;
        self
    }

    #[must_use]
    pub const fn with_patch_holes(mut self, patch_holes: bool) -> Self {
        self.patch_holes = patch_holes;
        self
    }
}

/// Everything an extraction run produces.
#[derive(Debug, Clone)]
pub struct QuadExtraction {
    pub mesh: QuadMesh,
    pub diagnostics: ExtractDiagnostics,
    pub singularities: Singularities,
    pub cuts: BTreeSet<EdgeKey>,
    /// Final edge table; offsets are the repaired ones.
    pub edges: EncodedEdges,
    pub face_edge_orients: Vec<[Rot4; 3]>,
}

/// Runs the pipeline with the built-in [`GreedyFlowOptimizer`].
pub fn extract_quad_mesh(field: &FieldMesh, options: ExtractOptions) -> Result<QuadExtraction, ExtractError> {
    extract_quad_mesh_with_optimizer(field, options, &GreedyFlowOptimizer::default())
}

/// Runs the pipeline with a caller-provided coarse-level optimizer.
pub fn extract_quad_mesh_with_optimizer(
    field: &FieldMesh,
    options: ExtractOptions,
    optimizer: &dyn IntegerOptimizer,
) -> Result<QuadExtraction, ExtractError> {
    let mut metrics = GeomMetrics::default();
    metrics.begin();
    let mut diagnostics = ExtractDiagnostics::new();

    let singularities = metrics.time(TimingBucket::SingularityLocation, || locate_singularities(field));
    let mut encoded = metrics.time(TimingBucket::EdgeEncoding, || encode_edges(field, &singularities));

    let solution = metrics.time(TimingBucket::IntegerConstraints, || {
        solve_integer_constraints(field, &singularities, &mut encoded, options.seed)
    })?;

    let graph = EdgeGraph {
        face_edge_ids: encoded.face_edge_ids.clone(),
        face_edge_orients: solution.face_edge_orients.clone(),
        edge_faces: encoded.edge_faces(),
        offsets: std::mem::take(&mut encoded.offsets),
    };
    let (refined, flow) = metrics.time(TimingBucket::FlowRefinement, || {
        refine_flow(graph, options.flow_levels, optimizer)
    })?;
    encoded.offsets = refined.offsets;

    let around = edges_around_singularities(&singularities, &encoded);
    let (offsets, repair) = metrics.time(TimingBucket::FlipRepair, || {
        RepairSession::new(field, &encoded, &solution.face_edge_orients, around).run(options.max_edit_radius)
    })?;
    encoded.offsets = offsets;

    let (solved, solve) = metrics.time(TimingBucket::PositionSolve, || {
        solve_positions(field, &encoded.edges, &encoded.offsets, options.position_solver)
    });
    let compact = metrics.time(TimingBucket::Compaction, || {
        compact_vertices(field, &encoded.edges, &encoded.offsets, &solved)
    });

    let faces = &field.mesh.faces;
    let mut quads = metrics.time(TimingBucket::QuadExtraction, || {
        let bad_edges = find_bad_edges(faces, &encoded.face_edge_ids, &solution.face_edge_orients, &encoded.offsets, &compact);
        pair_quad_cells(
            faces,
            &encoded.face_edge_ids,
            &solution.face_edge_orients,
            &encoded.offsets,
            &compact,
            &bad_edges,
        )
    });
    diagnostics.paired_quad_count = quads.len();

    if options.patch_holes {
        let input_boundary = input_boundary_edges(field, &compact.index);
        let patch = metrics.time(TimingBucket::HolePatching, || {
            patch_holes(&quads, &compact.positions, &input_boundary)
        });
        diagnostics.patched_quad_count = patch.faces.len();
        diagnostics.warnings.extend(patch.warnings);
        quads.extend(patch.faces);
    }

    diagnostics.orientation_singularity_count = singularities.orientation.len();
    diagnostics.position_singularity_count = singularities.position.len();
    diagnostics.edge_count = encoded.edge_count();
    diagnostics.clamped_edge_count = encoded.clamped;
    diagnostics.cut_count = solution.cuts.len();
    diagnostics.initial_flow = solution.initial_flow;
    diagnostics.target_flow = solution.target_flow;
    diagnostics.random_edit_count = solution.random_edits;
    diagnostics.unresolved_flow = solution.unresolved_flow;
    diagnostics.flow_levels = flow.levels;
    diagnostics.unbalanced_face_count = flow.unbalanced_after;
    diagnostics.zeroed_edge_count = flow.zeroed_edges;
    diagnostics.collapsed_edge_count = repair.collapsed_edges;
    diagnostics.merged_edge_count = repair.merged_edges;
    diagnostics.accepted_move_count = repair.accepted_moves;
    diagnostics.flipped_face_count = repair.flipped_faces;
    diagnostics.healed_vertex_count = repair.healed_vertices;
    diagnostics.compact_vertex_count = compact.vertex_count();
    diagnostics.bad_vertex_count = compact.bad_count();
    diagnostics.solver_iterations = solve.iterations;
    diagnostics.solver_residual = solve.residual;

    if solution.unresolved_flow != 0 {
        let parity = if solution.target_flow % 2 == 0 { "" } else { ", target flow is odd" };
        diagnostics.add_warning(format!(
            "flow {} of target {} left unresolved after seam edits{parity}",
            solution.unresolved_flow, solution.target_flow
        ));
    }
    if flow.zeroed_edges > 0 {
        diagnostics.add_warning(format!(
            "{} edges zeroed to balance {} faces the flow optimizer left unbalanced",
            flow.zeroed_edges, flow.unbalanced_after
        ));
    }
    if !solve.converged {
        diagnostics.add_warning("position solve did not converge");
    }
    diagnostics.timing = metrics.end();

    log::info!(
        "extracted {} quads ({} patched) over {} vertices",
        quads.len(),
        diagnostics.patched_quad_count,
        compact.vertex_count()
    );

    let mesh = QuadMesh {
        positions: compact.positions,
        normals: compact.normals,
        orientations: compact.orientations,
        faces: quads,
        bad_vertices: compact.bad,
    };

    Ok(QuadExtraction {
        mesh,
        diagnostics,
        singularities,
        cuts: solution.cuts,
        edges: encoded,
        face_edge_orients: solution.face_edge_orients,
    })
}

/// Input boundary edges, in compact vertex indices.
fn input_boundary_edges(field: &FieldMesh, index: &[usize]) -> BTreeSet<EdgeKey> {
    let mut edges = BTreeSet::new();
    for (f, face) in field.mesh.faces.iter().enumerate() {
        for k in 0..3 {
            if field.adjacency.opposite[3 * f + k].is_none() {
                let (a, b) = (index[face[k]], index[face[(k + 1) % 3]]);
                if a != b {
                    edges.insert(EdgeKey::new(a, b));
                }
            }
        }
    }
    edges
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builders_set_fields() {
        let options = ExtractOptions::new()
            .with_seed(7)
            .with_max_edit_radius(2)
            .with_flow_levels(3)
            .with_position_solver(PositionSolver::jacobi())
            .with_patch_holes(false);
        assert_eq!(options.seed, 7);
        assert_eq!(options.max_edit_radius, 2);
        assert_eq!(options.flow_levels, 3);
        assert!(matches!(options.position_solver, PositionSolver::Jacobi { .. }));
        assert!(!options.patch_holes);
    }

    #[test]
    fn defaults() {
        let options = ExtractOptions::default();
        assert_eq!(options.seed, 0);
        assert_eq!(options.max_edit_radius, 1);
        assert_eq!(options.flow_levels, 8);
        assert_eq!(options.position_solver, PositionSolver::default());
        assert!(options.patch_holes);
    }
}
