//! Quad mesh extraction from a 4-RoSy orientation field and a 4-PoSy
//! position field sampled on a triangle mesh.
//!
//! [`extract_quad_mesh`] is the entry point; the stage functions are public
//! so callers can inspect or replace individual steps.

mod compact;
mod constraints;
mod core;
mod diagnostics;
mod disjoint;
mod edge_encoder;
mod extract;
mod field;
mod field_math;
mod flip_repair;
mod flow;
mod hole_patch;
mod mesh;
mod metrics;
mod position_solve;
mod quad_cells;
mod quad_mesh;
mod singularity;

pub use compact::{CompactMesh, compact_vertices, mark_bad_vertices};
pub use constraints::{
    ConstraintError, ConstraintSolution, FlowBalance, aligned_face_sum, balance_singular_flow,
    solve_integer_constraints,
};
pub use core::{GridOffset, Rot4, Tolerance, Vec3};
pub use diagnostics::ExtractDiagnostics;
pub use disjoint::{OrientTree, OrientTreeError, VertexTree};
pub use edge_encoder::{EncodedEdges, clamp_unit_steps, encode_edges};
pub use extract::{
    ExtractError, ExtractOptions, QuadExtraction, extract_quad_mesh, extract_quad_mesh_with_optimizer,
};
pub use field::{FieldError, FieldMesh};
pub use field_math::{
    LatticeFrame, middle_point, orientation_compat_pair, orientation_index_delta, orientation_index_pair,
    position_floor_index, position_index_pair, rotate90_by,
};
pub use flip_repair::{RepairError, RepairReport, RepairSession, edges_around_singularities};
pub use flow::{
    EdgeGraph, FlowError, FlowHierarchy, FlowReport, GreedyFlowOptimizer, IntegerOptimizer, refine_flow,
};
pub use hole_patch::{HolePatch, boundary_loops, patch_holes};
pub use mesh::{DirectedEdges, EdgeKey, TriMesh};
pub use metrics::{GeomMetrics, GeomTimingReport, TimingBucket};
pub use position_solve::{PositionSolver, SolveReport, solve_positions};
pub use quad_cells::{find_bad_edges, pair_quad_cells};
pub use quad_mesh::QuadMesh;
pub use singularity::{Singularities, locate_orientation_singularities, locate_singularities};

#[cfg(test)]
mod tests {
    mod fixtures;
    mod test_constraints_basic;
    mod test_encoder_basic;
    mod test_extract_basic;
    mod test_flip_repair_basic;
    mod test_flow_basic;
    mod test_hole_patch_basic;
    mod test_quad_cells_basic;
    mod test_singularity_basic;
}
