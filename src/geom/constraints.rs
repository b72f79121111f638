//! Integer constraint solver.
//!
//! Every face contributes two linear constraints (one per lattice axis): the
//! rotation-aligned offsets of its three edges must sum to zero. Faces are
//! brought into one global frame with an [`OrientTree`]; orientation-singular
//! faces are balanced by rotating one of their edges by the singularity index,
//! with a dynamic program choosing the edge per face so that the global flow
//! lands as close to zero as possible. Whatever flow remains is removed by
//! unit edits on randomly chosen seam edges.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Neg;

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use super::disjoint::{OrientTree, OrientTreeError};
use super::edge_encoder::EncodedEdges;
use super::field::FieldMesh;
use super::field_math::orientation_index_pair;
use super::mesh::EdgeKey;
use super::singularity::Singularities;
use super::{GridOffset, Rot4};

#[derive(Debug, thiserror::Error)]
pub enum ConstraintError {
    #[error("face frame unification failed: {0}")]
    Tree(#[from] OrientTreeError),
}

/// Output of [`solve_integer_constraints`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConstraintSolution {
    /// Per face, the rotation from each edge's frame into the global frame.
    pub face_edge_orients: Vec<[Rot4; 3]>,
    /// Interior edges whose two faces disagree on the edge's flow.
    pub cuts: BTreeSet<EdgeKey>,
    /// Total flow of the regular faces before singular absorption.
    pub initial_flow: i32,
    /// Flow value selected by the dynamic program.
    pub target_flow: i32,
    /// Summed magnitude of the singular-face absorptions.
    pub absorption_cost: i32,
    /// Unit edits applied to seam and boundary edge components.
    pub random_edits: usize,
    /// Flow left over when the available edits could not reach zero.
    pub unresolved_flow: i32,
}

/// Rotation-aligned sum of a face's three edge offsets.
#[must_use]
pub fn aligned_face_sum(edge_ids: &[usize; 3], orients: &[Rot4; 3], offsets: &[GridOffset]) -> GridOffset {
    (0..3).fold(GridOffset::ZERO, |acc, k| acc + offsets[edge_ids[k]].rotate(orients[k]))
}

// ─────────────────────────────────────────────────────────────────────────────
// Signed variable references
// ─────────────────────────────────────────────────────────────────────────────

/// Reference to one offset component (`2 * edge + axis`) with a sign.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SignedVar {
    var: usize,
    sign: i32,
}

impl SignedVar {
    fn eval(self, offsets: &[GridOffset]) -> i32 {
        self.sign * offsets[self.var / 2].component(self.var % 2)
    }
}

impl Neg for SignedVar {
    type Output = Self;
    fn neg(self) -> Self {
        Self { var: self.var, sign: -self.sign }
    }
}

/// A whole edge offset as seen from some frame: which component lands on
/// each axis, and with which sign.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SignedPair {
    x: SignedVar,
    y: SignedVar,
}

impl SignedPair {
    fn of_edge(edge: usize) -> Self {
        Self {
            x: SignedVar { var: 2 * edge, sign: 1 },
            y: SignedVar { var: 2 * edge + 1, sign: 1 },
        }
    }

    /// Mirrors [`GridOffset::rotate`] on the references.
    fn rotate(self, rotation: Rot4) -> Self {
        let mut out = self;
        if rotation.is_odd() {
            out = Self { x: -out.y, y: out.x };
        }
        if rotation.value() >= 2 {
            out = Self { x: -out.x, y: -out.y };
        }
        out
    }

    fn flow(self, offsets: &[GridOffset]) -> i32 {
        self.x.eval(offsets) + self.y.eval(offsets)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Flow balancing over singular faces
// ─────────────────────────────────────────────────────────────────────────────

/// Result of [`balance_singular_flow`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowBalance {
    pub target: i32,
    /// Chosen option per singular face.
    pub choices: Vec<usize>,
    pub cost: i32,
}

/// Chooses one option per singular face so that `initial + Σ delta` is the
/// reachable value nearest to zero, at minimum `Σ |delta|`.
///
/// Even targets are preferred since interior seam edits move the flow in
/// steps of two; between `+t` and `-t` the positive value wins.
#[must_use]
pub fn balance_singular_flow(initial: i32, options: &[[i32; 3]]) -> FlowBalance {
    let mut layers: Vec<BTreeMap<i32, (i32, usize)>> = Vec::with_capacity(options.len() + 1);
    layers.push(BTreeMap::from([(initial, (0, 0))]));

    for deltas in options {
        let mut next = BTreeMap::new();
        if let Some(prev) = layers.last() {
            for (&value, &(cost, _)) in prev {
                for (choice, &delta) in deltas.iter().enumerate() {
                    let candidate = (cost + delta.abs(), choice);
                    match next.entry(value + delta) {
                        Entry::Vacant(slot) => {
                            slot.insert(candidate);
                        }
                        Entry::Occupied(mut slot) => {
                            if candidate.0 < slot.get().0 {
                                slot.insert(candidate);
                            }
                        }
                    }
                }
            }
        }
        layers.push(next);
    }

    let reachable = layers.last().map(|layer| layer.keys().copied().collect::<Vec<_>>()).unwrap_or_default();
    let preference = |v: &i32| (v.unsigned_abs(), *v < 0);
    let target = reachable
        .iter()
        .copied()
        .filter(|v| v % 2 == 0)
        .min_by_key(preference)
        .or_else(|| reachable.iter().copied().min_by_key(preference))
        .unwrap_or(initial);

    let cost = layers.last().and_then(|layer| layer.get(&target)).map_or(0, |entry| entry.0);
    let mut choices = vec![0; options.len()];
    let mut remain = target;
    for i in (0..options.len()).rev() {
        let Some(&(_, choice)) = layers[i + 1].get(&remain) else {
            break;
        };
        choices[i] = choice;
        remain -= options[i][choice];
    }

    FlowBalance { target, choices, cost }
}

// ─────────────────────────────────────────────────────────────────────────────
// Solver
// ─────────────────────────────────────────────────────────────────────────────

type EdgeSlots = Vec<[Option<(usize, Rot4)>; 2]>;

/// Unit change of one offset component and the change of the global flow
/// it causes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SeamEdit {
    var: usize,
    delta: i32,
    flow: i32,
}

/// Applies `edits` in order, skipping any that would move the flow away from
/// zero or past it. Returns the number applied and the flow left over.
fn apply_seam_edits(target: i32, edits: &[SeamEdit], offsets: &mut [GridOffset]) -> (usize, i32) {
    let mut remaining = target;
    let mut applied = 0;
    for edit in edits {
        if remaining == 0 {
            break;
        }
        if edit.flow.signum() != -remaining.signum() || edit.flow.abs() > remaining.abs() {
            continue;
        }
        *offsets[edit.var / 2].component_mut(edit.var % 2) += edit.delta;
        remaining += edit.flow;
        applied += 1;
    }
    (applied, remaining)
}

/// Builds and balances the per-face constraint system.
///
/// `encoded.offsets` is modified in place by the seam edits; `seed` makes the
/// choice of edited seams reproducible.
pub fn solve_integer_constraints(
    field: &FieldMesh,
    singularities: &Singularities,
    encoded: &mut EncodedEdges,
    seed: u64,
) -> Result<ConstraintSolution, ConstraintError> {
    let faces = &field.mesh.faces;
    let face_count = faces.len();
    let (q, n) = (&field.orientations, &field.normals);
    let is_singular = |f: usize| singularities.is_orientation_singular(f);

    // Per-face edge orients and signed references, edge -> face slots.
    // Slot 0 holds the face walking the edge from low to high vertex.
    let mut face_orients = vec![[Rot4::IDENTITY; 3]; face_count];
    let mut refs = vec![[SignedPair::of_edge(0); 3]; face_count];
    let mut slots: EdgeSlots = vec![[None; 2]; encoded.edge_count()];

    for (f, v) in faces.iter().enumerate() {
        let ids = encoded.face_edge_ids[f];
        let rank = |other: usize| {
            let (a, b) = orientation_index_pair(q[v[0]], n[v[0]], q[other], n[other]);
            a - b
        };
        let (rank1, rank2) = (rank(v[1]), rank(v[2]));

        let orients = [
            if v[1] < v[0] { rank1 + Rot4::HALF } else { Rot4::IDENTITY },
            if v[2] < v[1] { rank2 + Rot4::HALF } else { rank1 },
            if v[2] < v[0] { rank2 } else { Rot4::HALF },
        ];
        for k in 0..3 {
            refs[f][k] = SignedPair::of_edge(ids[k]).rotate(orients[k]);
            let slot = usize::from(v[k] > v[(k + 1) % 3]);
            slots[ids[k]][slot] = Some((f, orients[k]));
        }
        face_orients[f] = orients;
    }

    let mut tree = OrientTree::new(face_count);
    for edge_slots in &slots {
        if let [Some((f0, o0)), Some((f1, o1))] = *edge_slots {
            if !is_singular(f0) && !is_singular(f1) {
                join_across(&mut tree, f0, o0, f1, o1)?;
            }
        }
    }

    for (f, face_refs) in refs.iter_mut().enumerate() {
        let t = tree.orient(f);
        for r in face_refs.iter_mut() {
            *r = r.rotate(t);
        }
    }

    let offsets = &encoded.offsets;
    let initial_flow: i32 = (0..face_count)
        .filter(|&f| !is_singular(f))
        .map(|f| refs[f].iter().map(|r| r.flow(offsets)).sum::<i32>())
        .sum();

    // Three absorption options per singular face: edge `j` takes the
    // singularity's rotation, the whole face follows its neighbour across
    // edge `j + 1`.
    let mut options = Vec::with_capacity(singularities.orientation.len());
    let mut option_rotations = Vec::with_capacity(singularities.orientation.len());
    for (&f, &index) in &singularities.orientation {
        let ids = encoded.face_edge_ids[f];
        let mut deltas = [0; 3];
        let mut rotations = [Rot4::IDENTITY; 3];
        for j in 0..3 {
            let follow = match slots[ids[(j + 1) % 3]] {
                [Some((f0, o0)), Some((f1, o1))] => {
                    let p0 = tree.orient(f0) + o0;
                    let p1 = tree.orient(f1) + o1;
                    if f1 == f { p0 - p1 + Rot4::HALF } else { p1 - p0 + Rot4::HALF }
                }
                _ => Rot4::IDENTITY,
            };
            rotations[j] = follow;
            deltas[j] = (0..3)
                .map(|l| {
                    let extra = if l == j { index } else { Rot4::IDENTITY };
                    refs[f][l].rotate(follow + extra).flow(offsets)
                })
                .sum();
        }
        options.push(deltas);
        option_rotations.push(rotations);
    }

    let balance = balance_singular_flow(initial_flow, &options);
    log::debug!(
        "flow balance: initial {}, target {}, absorption cost {} over {} singular faces",
        initial_flow,
        balance.target,
        balance.cost,
        options.len()
    );

    for (((&f, &index), &choice), rotations) in singularities
        .orientation
        .iter()
        .zip(&balance.choices)
        .zip(&option_rotations)
    {
        let v = faces[f];
        let ids = encoded.face_edge_ids[f];
        let follow = rotations[choice];
        for l in 0..3 {
            let t = if l == choice { follow + index } else { follow };
            face_orients[f][l] += t;
            refs[f][l] = refs[f][l].rotate(t);
            let slot = usize::from(v[l] > v[(l + 1) % 3]);
            slots[ids[l]][slot] = Some((f, face_orients[f][l]));
        }
        if let [Some((f0, o0)), Some((f1, o1))] = slots[ids[(choice + 1) % 3]] {
            join_across(&mut tree, f0, o0, f1, o1)?;
        }
    }

    // Seam detection: a consistent interior edge appears with opposite signs
    // in its two faces. Boundary components appear once and can absorb
    // single units of flow.
    let mut var_sums = vec![0i32; encoded.edge_count() * 2];
    for face_refs in &refs {
        for r in face_refs {
            var_sums[r.x.var] += r.x.sign;
            var_sums[r.y.var] += r.y.sign;
        }
    }
    let is_interior = |edge: usize| slots[edge].iter().all(Option::is_some);

    let mut cuts = BTreeSet::new();
    let mut edits = Vec::new();
    for (var, &sum) in var_sums.iter().enumerate() {
        if sum == 0 {
            continue;
        }
        let edge = var / 2;
        if is_interior(edge) {
            cuts.insert(encoded.edges[edge]);
        }
        if balance.target == 0 {
            continue;
        }
        let delta = -balance.target.signum() * sum.signum();
        if (encoded.offsets[edge].component(var % 2) + delta).abs() <= 1 {
            edits.push(SeamEdit { var, delta, flow: sum * delta });
        }
    }

    let mut rng = StdRng::seed_from_u64(seed);
    edits.shuffle(&mut rng);
    let (applied, unresolved_flow) = apply_seam_edits(balance.target, &edits, &mut encoded.offsets);
    if unresolved_flow != 0 {
        log::warn!(
            "{} seam edits applied, flow {} of target {} left unresolved",
            applied,
            unresolved_flow,
            balance.target
        );
    }

    for (f, orients) in face_orients.iter_mut().enumerate() {
        let t = tree.orient(f);
        for o in orients.iter_mut() {
            *o += t;
        }
    }

    log::debug!("constraints: {} cuts, {} seam edits", cuts.len(), applied);

    Ok(ConstraintSolution {
        face_edge_orients: face_orients,
        cuts,
        initial_flow,
        target_flow: balance.target,
        absorption_cost: balance.cost,
        random_edits: applied,
        unresolved_flow,
    })
}

/// Joins two faces sharing an edge so the edge cancels in the global frame.
/// Faces already in one set are left alone: the loop they close may
/// legitimately carry the holonomy of a singularity.
fn join_across(tree: &mut OrientTree, f0: usize, o0: Rot4, f1: usize, o1: Rot4) -> Result<(), OrientTreeError> {
    if f0 != f1 && !tree.same_set(f0, f1) {
        tree.merge(f0, f1, o0, o1 + Rot4::HALF)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_singular_faces_keeps_initial_flow() {
        let balance = balance_singular_flow(4, &[]);
        assert_eq!(balance.target, 4);
        assert!(balance.choices.is_empty());
        assert_eq!(balance.cost, 0);
    }

    #[test]
    fn prefers_even_target_nearest_zero() {
        let balance = balance_singular_flow(3, &[[1, -1, 3]]);
        assert_eq!(balance.target, 2);
        assert_eq!(balance.choices, vec![1]);
        assert_eq!(balance.cost, 1);

        let balance = balance_singular_flow(1, &[[1, -1, 0]]);
        assert_eq!(balance.target, 0);
        assert_eq!(balance.choices, vec![1]);
    }

    #[test]
    fn ties_break_toward_positive() {
        let balance = balance_singular_flow(0, &[[2, -2, 2]]);
        assert_eq!(balance.target, 2);
        assert_eq!(balance.choices, vec![0]);
    }

    #[test]
    fn backtracking_reproduces_target() {
        let options = [[1, 1, -1], [1, -1, 1], [1, -1, 3]];
        let balance = balance_singular_flow(1, &options);
        let reached: i32 = 1 + balance
            .choices
            .iter()
            .zip(&options)
            .map(|(&c, o)| o[c])
            .sum::<i32>();
        assert_eq!(reached, balance.target);
        assert_eq!(balance.target, 0);
    }

    #[test]
    fn odd_target_with_only_seam_edits_leaves_one_unit() {
        let mut offsets = vec![GridOffset::ZERO; 2];
        let edits = [SeamEdit { var: 0, delta: -1, flow: -2 }, SeamEdit { var: 2, delta: -1, flow: -2 }];
        let (applied, remaining) = apply_seam_edits(3, &edits, &mut offsets);
        assert_eq!(applied, 1);
        assert_eq!(remaining, 1);
        assert_eq!(offsets[0], GridOffset::new(-1, 0));
        assert_eq!(offsets[1], GridOffset::ZERO);
    }

    #[test]
    fn boundary_edit_absorbs_odd_unit() {
        let mut offsets = vec![GridOffset::ZERO; 2];
        let edits = [
            SeamEdit { var: 0, delta: -1, flow: -2 },
            SeamEdit { var: 3, delta: 1, flow: -1 },
            SeamEdit { var: 2, delta: 1, flow: 1 },
        ];
        let (applied, remaining) = apply_seam_edits(3, &edits, &mut offsets);
        assert_eq!(applied, 2);
        assert_eq!(remaining, 0);
        assert_eq!(offsets[1], GridOffset::new(0, 1));
    }

    #[test]
    fn edits_never_overshoot_zero() {
        let mut offsets = vec![GridOffset::ZERO];
        let edits = [SeamEdit { var: 0, delta: -1, flow: -2 }, SeamEdit { var: 1, delta: 1, flow: 1 }];
        let (applied, remaining) = apply_seam_edits(1, &edits, &mut offsets);
        assert_eq!(applied, 0);
        assert_eq!(remaining, 1);
        assert_eq!(offsets[0], GridOffset::ZERO);
    }

    #[test]
    fn signed_pair_rotation_matches_offset_rotation() {
        let offsets = [GridOffset::new(2, -1)];
        for r in Rot4::ALL {
            let pair = SignedPair::of_edge(0).rotate(r);
            let rotated = offsets[0].rotate(r);
            assert_eq!(pair.x.eval(&offsets), rotated.x);
            assert_eq!(pair.y.eval(&offsets), rotated.y);
        }
    }
}
