//! Multi-resolution refinement of the integer edge offsets.
//!
//! The fine edge graph is coarsened by contracting zero-offset edges: the two
//! faces of a contracted edge disappear, and the chains of edges running
//! through them become single coarse edges. An [`IntegerOptimizer`] then
//! works from the coarsest level down, and every level's result is written
//! back onto the chains of the level below before that level is optimized in
//! turn. Chains keep their faces balanced whatever value the coarse edge
//! takes, so improvements found on a coarse level survive prolongation.

use std::collections::VecDeque;

use super::constraints::aligned_face_sum;
use super::{GridOffset, Rot4};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FlowError {
    /// A chain through contracted faces ended in a face with no free edge
    /// while still carrying a non-zero offset.
    #[error("edge chain through face {face} ends at edge {edge} with non-zero offset")]
    UnresolvedChain { edge: usize, face: usize },

    /// A chain revisited more edges than the graph has.
    #[error("edge chain starting at edge {0} does not terminate")]
    RunawayChain(usize),
}

/// Face/edge incidence with per-face edge rotations and per-edge offsets.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EdgeGraph {
    pub face_edge_ids: Vec<[usize; 3]>,
    pub face_edge_orients: Vec<[Rot4; 3]>,
    pub edge_faces: Vec<[Option<usize>; 2]>,
    pub offsets: Vec<GridOffset>,
}

impl EdgeGraph {
    #[must_use]
    pub fn face_count(&self) -> usize {
        self.face_edge_ids.len()
    }

    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.offsets.len()
    }

    #[must_use]
    pub fn face_sum(&self, face: usize) -> GridOffset {
        aligned_face_sum(&self.face_edge_ids[face], &self.face_edge_orients[face], &self.offsets)
    }

    #[must_use]
    pub fn unbalanced_faces(&self) -> Vec<usize> {
        (0..self.face_count()).filter(|&f| !self.face_sum(f).is_zero()).collect()
    }

    /// Summed L1 imbalance of the faces incident to `edge`.
    #[must_use]
    pub fn edge_imbalance(&self, edge: usize) -> i32 {
        let [a, b] = self.edge_faces[edge];
        let mut total = a.map_or(0, |f| self.face_sum(f).l1());
        if b.is_some() && b != a {
            total += b.map_or(0, |f| self.face_sum(f).l1());
        }
        total
    }

    /// Moves one unit of `face`'s residual along a path of edges, either onto
    /// a face whose residual it cancels or out through a boundary edge.
    ///
    /// Faces strictly inside the path keep their sums, so every successful
    /// call lowers the summed L1 imbalance. Offsets never leave `-1..=1`.
    /// Returns `false` if no such path exists.
    pub fn route_unit(&mut self, face: usize) -> bool {
        let residual = self.face_sum(face);
        let unit = if residual.x != 0 {
            GridOffset::new(residual.x.signum(), 0)
        } else if residual.y != 0 {
            GridOffset::new(0, residual.y.signum())
        } else {
            return false;
        };

        // parents[g] = (face the path came from, edge crossed, change on that edge)
        let mut parents: Vec<Option<(usize, usize, GridOffset)>> = vec![None; self.face_count()];
        let mut visited = vec![false; self.face_count()];
        visited[face] = true;
        let mut queue = VecDeque::from([(face, unit)]);

        while let Some((h, shed)) = queue.pop_front() {
            for k in 0..3 {
                let e = self.face_edge_ids[h][k];
                let change = -shed.rotate(-self.face_edge_orients[h][k]);
                if (self.offsets[e] + change).max_abs() > 1 {
                    continue;
                }
                let across = match self.edge_faces[e] {
                    [Some(a), Some(b)] if a == h && b != h => Some(b),
                    [Some(a), Some(b)] if b == h && a != h => Some(a),
                    [Some(a), None] | [None, Some(a)] if a == h => None,
                    _ => continue,
                };
                let Some(g) = across else {
                    self.offsets[e] += change;
                    self.apply_route(&parents, h);
                    return true;
                };
                if visited[g] {
                    continue;
                }
                let Some(slot) = self.face_edge_ids[g].iter().position(|&x| x == e) else {
                    continue;
                };
                let arrive = change.rotate(self.face_edge_orients[g][slot]);
                let sum = self.face_sum(g);
                visited[g] = true;
                parents[g] = Some((h, e, change));
                if (sum + arrive).l1() < sum.l1() {
                    self.apply_route(&parents, g);
                    return true;
                }
                queue.push_back((g, arrive));
            }
        }
        false
    }

    fn apply_route(&mut self, parents: &[Option<(usize, usize, GridOffset)>], mut face: usize) {
        while let Some((prev, edge, change)) = parents[face] {
            self.offsets[edge] += change;
            face = prev;
        }
    }

    /// Zeroes the edges of unbalanced faces until every face sums to zero.
    /// Returns the number of edges changed.
    pub fn zero_unbalanced(&mut self) -> usize {
        let mut zeroed = 0;
        loop {
            let unbalanced = self.unbalanced_faces();
            if unbalanced.is_empty() {
                return zeroed;
            }
            for f in unbalanced {
                for e in self.face_edge_ids[f] {
                    if !self.offsets[e].is_zero() {
                        self.offsets[e] = GridOffset::ZERO;
                        zeroed += 1;
                    }
                }
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Optimizer seam
// ─────────────────────────────────────────────────────────────────────────────

/// Improves the offsets of one level of the hierarchy in place.
///
/// Implementations should keep every balanced face balanced; `unbalanced`
/// lists the faces of the level that did not sum to zero when the hierarchy
/// was built.
pub trait IntegerOptimizer {
    fn optimize(&self, graph: &mut EdgeGraph, unbalanced: &[usize]);
}

/// Local descent on the total face imbalance, followed by path routing.
///
/// For each unbalanced face, tries to push its residual (or a unit step of
/// it) into one of its edges, and applies the edit that lowers the summed
/// imbalance of the touched faces the most. Residuals no single edit can
/// absorb are then routed unit by unit with [`EdgeGraph::route_unit`].
/// Offsets never leave `-1..=1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GreedyFlowOptimizer {
    pub max_passes: usize,
}

impl Default for GreedyFlowOptimizer {
    fn default() -> Self {
        Self { max_passes: 16 }
    }
}

impl IntegerOptimizer for GreedyFlowOptimizer {
    fn optimize(&self, graph: &mut EdgeGraph, _unbalanced: &[usize]) {
        for _ in 0..self.max_passes {
            let mut improved = false;
            for f in 0..graph.face_count() {
                let residual = graph.face_sum(f);
                if residual.is_zero() {
                    continue;
                }
                let mut best: Option<(usize, GridOffset, i32)> = None;
                for k in 0..3 {
                    let e = graph.face_edge_ids[f][k];
                    let inverse = -graph.face_edge_orients[f][k];
                    let current = graph.offsets[e];
                    for step in [residual, residual.clamp_unit()] {
                        let candidate = current - step.rotate(inverse);
                        if candidate.max_abs() > 1 || candidate == current {
                            continue;
                        }
                        let before = graph.edge_imbalance(e);
                        graph.offsets[e] = candidate;
                        let gain = before - graph.edge_imbalance(e);
                        graph.offsets[e] = current;
                        if gain > 0 && best.is_none_or(|(_, _, g)| gain > g) {
                            best = Some((e, candidate, gain));
                        }
                    }
                }
                if let Some((e, candidate, _)) = best {
                    graph.offsets[e] = candidate;
                    improved = true;
                }
            }
            if !improved {
                break;
            }
        }

        for f in 0..graph.face_count() {
            while !graph.face_sum(f).is_zero() && graph.route_unit(f) {}
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Hierarchy
// ─────────────────────────────────────────────────────────────────────────────

/// What happened to a fine edge when its level was coarsened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EdgeFate {
    Pending,
    /// Zero-offset edge whose two faces were dropped.
    Contracted,
    /// Edge between dropped faces that no chain passed through.
    Enclosed,
    /// Part of a chain; `orient` maps the coarse edge frame onto this edge.
    Coarse { edge: usize, orient: Rot4 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum FaceMark {
    #[default]
    Free,
    Fixed,
    Contracted,
}

/// Summary of a [`refine_flow`] run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FlowReport {
    pub levels: usize,
    pub unbalanced_before: usize,
    /// Faces the optimizer left unbalanced.
    pub unbalanced_after: usize,
    /// Edges zeroed afterwards to balance those faces.
    pub zeroed_edges: usize,
}

/// Stack of successively coarser edge graphs.
#[derive(Debug, Clone, Default)]
pub struct FlowHierarchy {
    levels: Vec<EdgeGraph>,
    unbalanced: Vec<Vec<usize>>,
    fates: Vec<Vec<EdgeFate>>,
}

impl FlowHierarchy {
    /// Coarsens until a level removes no edge or `max_levels` levels exist.
    pub fn build(finest: EdgeGraph, max_levels: usize) -> Result<Self, FlowError> {
        let unbalanced = finest.unbalanced_faces();
        let mut hierarchy = Self { levels: vec![finest], unbalanced: vec![unbalanced], fates: Vec::new() };

        while hierarchy.levels.len() < max_levels.max(1) {
            let (fine, fine_unbalanced) = match (hierarchy.levels.last(), hierarchy.unbalanced.last()) {
                (Some(g), Some(u)) => (g, u),
                _ => break,
            };
            let (coarse, coarse_unbalanced, fates) = coarsen(fine, fine_unbalanced)?;
            if coarse.edge_count() == fine.edge_count() {
                break;
            }
            log::debug!(
                "flow level {}: {} edges, {} faces",
                hierarchy.levels.len(),
                coarse.edge_count(),
                coarse.face_count()
            );
            hierarchy.levels.push(coarse);
            hierarchy.unbalanced.push(coarse_unbalanced);
            hierarchy.fates.push(fates);
        }
        Ok(hierarchy)
    }

    #[must_use]
    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    #[must_use]
    pub fn levels(&self) -> &[EdgeGraph] {
        &self.levels
    }

    /// Optimizes every level from the coarsest down, prolonging in between.
    pub fn optimize(&mut self, optimizer: &dyn IntegerOptimizer) {
        for level in (0..self.levels.len()).rev() {
            optimizer.optimize(&mut self.levels[level], &self.unbalanced[level]);
            if level > 0 {
                self.prolong(level);
            }
        }
    }

    /// Writes the offsets of `level` onto the chains of `level - 1`.
    fn prolong(&mut self, level: usize) {
        let (lower, upper) = self.levels.split_at_mut(level);
        let (fine, coarse) = (&mut lower[level - 1], &upper[0]);
        for (e, fate) in self.fates[level - 1].iter().enumerate() {
            match *fate {
                EdgeFate::Coarse { edge, orient } => fine.offsets[e] = coarse.offsets[edge].rotate(-orient),
                EdgeFate::Contracted => fine.offsets[e] = GridOffset::ZERO,
                EdgeFate::Enclosed | EdgeFate::Pending => {}
            }
        }
    }

    #[must_use]
    pub fn into_finest(self) -> EdgeGraph {
        self.levels.into_iter().next().unwrap_or_default()
    }
}

fn coarsen(graph: &EdgeGraph, unbalanced: &[usize]) -> Result<(EdgeGraph, Vec<usize>, Vec<EdgeFate>), FlowError> {
    let face_count = graph.face_count();
    let edge_count = graph.edge_count();

    let mut marks = vec![FaceMark::Free; face_count];
    for &f in unbalanced {
        marks[f] = FaceMark::Fixed;
    }

    let mut fates = vec![EdgeFate::Pending; edge_count];
    for e in 0..edge_count {
        if !graph.offsets[e].is_zero() {
            continue;
        }
        let [Some(fa), Some(fb)] = graph.edge_faces[e] else {
            continue;
        };
        if marks[fa] != FaceMark::Free || marks[fb] != FaceMark::Free {
            continue;
        }
        for f in [fa, fb] {
            for &ne in &graph.face_edge_ids[f] {
                for nf in graph.edge_faces[ne].iter().flatten() {
                    if marks[*nf] == FaceMark::Free {
                        marks[*nf] = FaceMark::Fixed;
                    }
                }
            }
        }
        marks[fa] = FaceMark::Contracted;
        marks[fb] = FaceMark::Contracted;
        fates[e] = EdgeFate::Contracted;
    }

    let contracted = |f: Option<usize>| f.is_some_and(|f| marks[f] == FaceMark::Contracted);
    for e in 0..edge_count {
        if fates[e] == EdgeFate::Pending && graph.edge_faces[e].iter().all(|&f| f.is_none() || contracted(f)) {
            fates[e] = EdgeFate::Enclosed;
        }
    }

    let mut coarse_offsets = Vec::new();
    let mut coarse_edge_faces: Vec<[Option<usize>; 2]> = Vec::new();
    for start in 0..edge_count {
        if fates[start] != EdgeFate::Pending {
            continue;
        }
        let id = coarse_offsets.len();
        let [fa, fb] = graph.edge_faces[start];
        coarse_offsets.push(graph.offsets[start]);

        if !contracted(fa) && !contracted(fb) {
            fates[start] = EdgeFate::Coarse { edge: id, orient: Rot4::IDENTITY };
            coarse_edge_faces.push([fa, fb]);
            continue;
        }

        let origin = if fb.is_none() || !contracted(fa) { fa } else { fb };
        let mut chain = vec![(start, Rot4::IDENTITY)];
        let mut edge = start;
        let mut face = origin;
        let end = loop {
            if chain.len() > edge_count {
                return Err(FlowError::RunawayChain(start));
            }
            let [a, b] = graph.edge_faces[edge];
            face = if a == face { b } else { a };
            let Some(f) = face.filter(|&f| marks[f] == FaceMark::Contracted) else {
                break face;
            };

            let ids = graph.face_edge_ids[f];
            let Some(entry) = ids.iter().position(|&x| x == edge) else {
                break face;
            };
            let exit = (0..3).find(|&j| {
                j != entry
                    && ids[j] != edge
                    && matches!(fates[ids[j]], EdgeFate::Pending | EdgeFate::Enclosed)
                    && !chain.iter().any(|&(c, _)| c == ids[j])
            });
            match exit {
                Some(j) => {
                    let orients = graph.face_edge_orients[f];
                    let step = orients[j] - orients[entry] + Rot4::HALF;
                    let accumulated = chain.last().map_or(Rot4::IDENTITY, |&(_, o)| o) + step;
                    edge = ids[j];
                    chain.push((edge, accumulated));
                }
                None => {
                    if !graph.offsets[edge].is_zero() {
                        return Err(FlowError::UnresolvedChain { edge, face: f });
                    }
                    break None;
                }
            }
        };

        for &(e, orient) in &chain {
            fates[e] = EdgeFate::Coarse { edge: id, orient };
        }
        coarse_edge_faces.push([origin, end]);
    }

    let mut upper = vec![None; face_count];
    let mut coarse_face_ids = Vec::new();
    let mut coarse_face_orients = Vec::new();
    for f in 0..face_count {
        let ids = graph.face_edge_ids[f];
        let mut coarse_ids = [0; 3];
        let mut coarse_orients = [Rot4::IDENTITY; 3];
        let mut kept = true;
        for k in 0..3 {
            match fates[ids[k]] {
                EdgeFate::Coarse { edge, orient } => {
                    coarse_ids[k] = edge;
                    coarse_orients[k] = graph.face_edge_orients[f][k] - orient;
                }
                _ => kept = false,
            }
        }
        if kept {
            upper[f] = Some(coarse_face_ids.len());
            coarse_face_ids.push(coarse_ids);
            coarse_face_orients.push(coarse_orients);
        }
    }

    let lift = |f: Option<usize>| f.and_then(|f| upper[f]);
    let coarse = EdgeGraph {
        face_edge_ids: coarse_face_ids,
        face_edge_orients: coarse_face_orients,
        edge_faces: coarse_edge_faces.into_iter().map(|[a, b]| [lift(a), lift(b)]).collect(),
        offsets: coarse_offsets,
    };
    let coarse_unbalanced = unbalanced.iter().filter_map(|&f| upper[f]).collect();
    Ok((coarse, coarse_unbalanced, fates))
}

/// Builds the hierarchy over `graph`, optimizes it, and returns the refined
/// finest level. Every face of the result sums to zero: faces the optimizer
/// could not balance have their edges zeroed.
pub fn refine_flow(
    graph: EdgeGraph,
    max_levels: usize,
    optimizer: &dyn IntegerOptimizer,
) -> Result<(EdgeGraph, FlowReport), FlowError> {
    let unbalanced_before = graph.unbalanced_faces().len();
    let mut hierarchy = FlowHierarchy::build(graph, max_levels)?;
    let levels = hierarchy.level_count();
    hierarchy.optimize(optimizer);
    let mut refined = hierarchy.into_finest();
    let unbalanced_after = refined.unbalanced_faces().len();
    let zeroed_edges = refined.zero_unbalanced();
    log::debug!(
        "flow refinement over {} levels: {} -> {} unbalanced faces, {} edges zeroed",
        levels,
        unbalanced_before,
        unbalanced_after,
        zeroed_edges
    );
    Ok((refined, FlowReport { levels, unbalanced_before, unbalanced_after, zeroed_edges }))
}
