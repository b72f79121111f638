//! Local repair of flipped and degenerate lattice elements.
//!
//! A [`RepairSession`] owns every mutable structure of the repair: the edge
//! offsets, an [`OrientTree`] over edges that merges edges made coincident by
//! a collapse, the edge -> face sets, a [`VertexTree`] over collapsed vertices
//! and a vertex -> neighbour -> edges map. Moves push the offset of one edge
//! onto the edges around one of its endpoints; a move is kept only if it
//! lowers the negative lattice area of the faces it touches.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use super::disjoint::{OrientTree, OrientTreeError, VertexTree};
use super::edge_encoder::EncodedEdges;
use super::field::FieldMesh;
use super::singularity::Singularities;
use super::{GridOffset, Rot4};

#[derive(Debug, thiserror::Error)]
pub enum RepairError {
    /// Two edges became coincident after a collapse, but their offsets are
    /// not related by any quarter turn.
    #[error(
        "edges {kept} and {merged} coincide after collapse, but no rotation maps {kept_offset:?} onto {merged_offset:?}"
    )]
    IncompatibleEdges { kept: usize, merged: usize, kept_offset: GridOffset, merged_offset: GridOffset },

    #[error("edge merge failed: {0}")]
    Tree(#[from] OrientTreeError),
}

/// Counters collected over a repair run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepairReport {
    pub collapsed_edges: usize,
    pub merged_edges: usize,
    pub accepted_moves: usize,
    pub flipped_faces: usize,
    pub negative_area: i64,
    pub bad_vertices: usize,
    pub healed_vertices: usize,
}

/// Edges of the orientation-singular faces.
#[must_use]
pub fn edges_around_singularities(singularities: &Singularities, encoded: &EncodedEdges) -> BTreeSet<usize> {
    singularities
        .orientation
        .keys()
        .flat_map(|&f| encoded.face_edge_ids[f])
        .collect()
}

/// Mutable state of one flip repair run.
#[derive(Debug)]
pub struct RepairSession<'a> {
    faces: &'a [[usize; 3]],
    endpoints: &'a [super::mesh::EdgeKey],
    face_edge_ids: &'a [[usize; 3]],
    face_edge_orients: &'a [[Rot4; 3]],
    offsets: Vec<GridOffset>,
    edge_tree: OrientTree,
    edge_faces: Vec<BTreeSet<usize>>,
    vertices: VertexTree,
    neighbors: Vec<BTreeMap<usize, Vec<usize>>>,
    boundary: Vec<bool>,
    around_singularities: BTreeSet<usize>,
    edit_radius: i32,
    report: RepairReport,
}

impl<'a> RepairSession<'a> {
    /// Starts a session over the solved offsets in `encoded`.
    #[must_use]
    pub fn new(
        field: &'a FieldMesh,
        encoded: &'a EncodedEdges,
        face_edge_orients: &'a [[Rot4; 3]],
        around_singularities: BTreeSet<usize>,
    ) -> Self {
        let faces = field.mesh.faces.as_slice();
        let edge_count = encoded.edge_count();

        let mut edge_faces = vec![BTreeSet::new(); edge_count];
        let mut neighbors = vec![BTreeMap::<usize, Vec<usize>>::new(); field.vertex_count()];
        for (f, face) in faces.iter().enumerate() {
            for k in 0..3 {
                let e = encoded.face_edge_ids[f][k];
                edge_faces[e].insert(f);
                let (a, b) = (face[k], face[(k + 1) % 3]);
                for (from, to) in [(a, b), (b, a)] {
                    let list = neighbors[from].entry(to).or_default();
                    if !list.contains(&e) {
                        list.push(e);
                    }
                }
            }
        }

        Self {
            faces,
            endpoints: &encoded.edges,
            face_edge_ids: &encoded.face_edge_ids,
            face_edge_orients,
            offsets: encoded.offsets.clone(),
            edge_tree: OrientTree::new(edge_count),
            edge_faces,
            vertices: VertexTree::new(field.vertex_count()),
            neighbors,
            boundary: field.adjacency.boundary.clone(),
            around_singularities,
            edit_radius: 1,
            report: RepairReport::default(),
        }
    }

    /// Runs every repair step, returning the per-edge offsets (merged edges
    /// expressed through their representative) and the counters.
    pub fn run(mut self, max_edit_radius: usize) -> Result<(Vec<GridOffset>, RepairReport), RepairError> {
        self.collapse_zero_edges()?;
        log::debug!("flip repair: {} initial collapses", self.report.collapsed_edges);

        for radius in 1..=max_edit_radius.max(1) {
            self.edit_radius = i32::try_from(radius).unwrap_or(i32::MAX);
            self.relax_edges(radius > 1)?;
            if radius == 1 {
                let mut roots = BTreeSet::new();
                for &e in &self.around_singularities.clone() {
                    roots.insert(self.edge_tree.find(e));
                }
                self.around_singularities = roots;
            }
        }

        self.sweep_flipped_faces()?;
        self.heal_bad_vertices()?;

        let (flipped, area) = self.flip_summary();
        self.report.flipped_faces = flipped;
        self.report.negative_area = area;
        log::debug!(
            "flip repair: {} moves, {} collapses, {} flipped faces left",
            self.report.accepted_moves,
            self.report.collapsed_edges,
            flipped
        );

        let report = self.report;
        Ok((self.into_offsets(), report))
    }

    #[must_use]
    pub fn report(&self) -> RepairReport {
        self.report
    }

    /// Negative lattice area of every flipped face, summed.
    pub fn total_negative_area(&mut self) -> i64 {
        self.flip_summary().1
    }

    /// Representative vertex after collapses.
    pub fn vertex_root(&mut self, v: usize) -> usize {
        self.vertices.find(v)
    }

    /// Current offset of edge `e`, in its own frame.
    pub fn offset(&mut self, e: usize) -> GridOffset {
        let root = self.edge_tree.find(e);
        let orient = self.edge_tree.orient(e);
        self.offsets[root].rotate(orient)
    }

    pub fn into_offsets(mut self) -> Vec<GridOffset> {
        (0..self.offsets.len()).map(|e| self.offset(e)).collect()
    }

    // ── steps ───────────────────────────────────────────────────────────────

    fn collapse_zero_edges(&mut self) -> Result<(), RepairError> {
        for e in 0..self.offsets.len() {
            if self.offsets[e].is_zero() {
                let (a, b) = self.edge_vertices(e);
                self.collapse(a, b)?;
            }
        }
        Ok(())
    }

    fn relax_edges(&mut self, skip_singular: bool) -> Result<(), RepairError> {
        loop {
            let mut updated = false;
            for e in 0..self.offsets.len() {
                if !self.edge_tree.is_root(e) || (skip_singular && self.around_singularities.contains(&e)) {
                    continue;
                }
                let (a, b) = self.edge_vertices(e);
                if a == b {
                    continue;
                }
                if self.try_move(a, e, true)? || self.try_move(b, e, true)? {
                    updated = true;
                }
            }
            if !updated {
                return Ok(());
            }
        }
    }

    fn sweep_flipped_faces(&mut self) -> Result<(), RepairError> {
        for f in 0..self.faces.len() {
            if self.face_area(f) >= 0 {
                continue;
            }
            for j in 0..3 {
                let a = self.vertices.find(self.faces[f][j]);
                let b = self.vertices.find(self.faces[f][(j + 1) % 3]);
                let e = self.edge_tree.find(self.face_edge_ids[f][j]);
                self.try_move(a, e, true)?;
                self.try_move(b, e, true)?;
            }
        }
        Ok(())
    }

    /// Marks vertices with too few axis-aligned neighbours (3 inside, 2 on
    /// the boundary), spreads the mark to neighbours that drop below the
    /// threshold, then tries unconditional moves into healthy neighbours.
    fn heal_bad_vertices(&mut self) -> Result<(), RepairError> {
        let n = self.neighbors.len();
        let mut degree = vec![0usize; n];
        let mut bad = vec![false; n];
        let mut queue = VecDeque::new();
        for v in 0..n {
            if self.vertices.find(v) != v {
                continue;
            }
            degree[v] = self.axis_neighbors(v).len();
            if degree[v] < self.valence_threshold(v) {
                bad[v] = true;
                queue.push_back(v);
            }
        }
        while let Some(v) = queue.pop_front() {
            for nb in self.axis_neighbors(v) {
                if bad[nb] {
                    continue;
                }
                degree[nb] = degree[nb].saturating_sub(1);
                if degree[nb] < self.valence_threshold(nb) {
                    bad[nb] = true;
                    queue.push_back(nb);
                }
            }
        }
        self.report.bad_vertices = bad.iter().filter(|&&b| b).count();

        loop {
            let mut updated = false;
            for v in 0..n {
                if !bad[v] || self.vertices.find(v) != v {
                    continue;
                }
                let candidates: Vec<Vec<usize>> = self.neighbors[v]
                    .iter()
                    .filter(|(nb, _)| **nb != v && !bad[**nb])
                    .map(|(_, edges)| edges.clone())
                    .collect();
                'search: for edges in candidates {
                    for e in edges {
                        let root = self.edge_tree.find(e);
                        if self.try_move(v, root, false)? {
                            bad[v] = false;
                            self.report.healed_vertices += 1;
                            updated = true;
                            break 'search;
                        }
                    }
                }
            }
            if !updated {
                return Ok(());
            }
        }
    }

    // ── moves ───────────────────────────────────────────────────────────────

    /// Zeroes edge `edge` and pushes the resulting imbalance onto edges
    /// around `vertex`. With `check_area`, the move is rolled back unless
    /// the touched faces lose negative area.
    pub fn try_move(&mut self, vertex: usize, edge: usize, check_area: bool) -> Result<bool, RepairError> {
        let Some(changes) = self.extract_edge_set(vertex, edge) else {
            return Ok(false);
        };

        let touched: BTreeSet<usize> = changes
            .iter()
            .flat_map(|(e, _)| self.edge_faces[*e].iter().copied())
            .collect();
        let before = self.negative_area_of(&touched);
        for &(e, delta) in &changes {
            self.offsets[e] -= delta;
        }
        let after = self.negative_area_of(&touched);

        if check_area && after >= before {
            for &(e, delta) in &changes {
                self.offsets[e] += delta;
            }
            return Ok(false);
        }

        self.report.accepted_moves += 1;
        for &(e, _) in &changes {
            if self.offsets[e].is_zero() {
                let (a, b) = self.edge_vertices(e);
                self.collapse(a, b)?;
            }
        }
        Ok(true)
    }

    /// Breadth-first propagation of the change that zeroes `edge`.
    ///
    /// Returns the `(edge, delta)` pairs to subtract, or `None` if a face
    /// cannot be balanced by a single edge around `vertex` within the edit
    /// radius.
    fn extract_edge_set(&mut self, vertex: usize, edge: usize) -> Option<Vec<(usize, GridOffset)>> {
        let mut changes = vec![(edge, self.offsets[edge])];
        let mut pending: BTreeMap<usize, GridOffset> = BTreeMap::from([(edge, self.offsets[edge])]);
        let mut queue: VecDeque<usize> = self.edge_faces[edge].iter().copied().collect();

        while let Some(f) = queue.pop_front() {
            let mut roots = [0; 3];
            let mut orients = [Rot4::IDENTITY; 3];
            let mut total = GridOffset::ZERO;
            for i in 0..3 {
                let (root, orient) = self.face_view(f, i);
                roots[i] = root;
                orients[i] = orient;
                let mut value = self.offsets[root];
                if let Some(delta) = pending.get(&root) {
                    value -= *delta;
                }
                total += value.rotate(orient);
            }
            if total.is_zero() {
                continue;
            }

            let mut receiver = None;
            for i in 0..3 {
                if pending.contains_key(&roots[i]) {
                    continue;
                }
                let (a, b) = self.edge_vertices(roots[i]);
                if a != b && (a == vertex || b == vertex) {
                    receiver = Some(i);
                    break;
                }
            }
            let i = receiver?;
            if (0..3).any(|j| j != i && roots[j] == roots[i]) {
                return None;
            }

            let target = roots[i];
            let delta = total.rotate(-orients[i]);
            if (self.offsets[target] - delta).max_abs() > self.edit_radius {
                return None;
            }
            changes.push((target, delta));
            pending.insert(target, delta);
            queue.extend(self.edge_faces[target].iter().copied().filter(|&nf| nf != f));
        }
        Some(changes)
    }

    /// Contracts the zero edges between `from` and `to`, moving `from`'s
    /// incidences onto `to`.
    fn collapse(&mut self, from: usize, to: usize) -> Result<(), RepairError> {
        if from == to {
            return Ok(());
        }

        let mut collapsed_faces = BTreeSet::new();
        if let Some(edges) = self.neighbors[from].get(&to) {
            for &e in edges {
                if self.offsets[e].is_zero() {
                    collapsed_faces.append(&mut self.edge_faces[e]);
                }
            }
        }

        let moved = std::mem::take(&mut self.neighbors[from]);
        for (nb, edges) in moved {
            let target = if nb == from {
                to
            } else {
                self.neighbors[nb].remove(&from);
                nb
            };
            let kept: Vec<usize> = edges
                .into_iter()
                .filter(|&e| nb != to || !self.offsets[e].is_zero())
                .collect();
            if kept.is_empty() {
                continue;
            }
            push_unique(self.neighbors[to].entry(target).or_default(), &kept);
            if target != to {
                push_unique(self.neighbors[target].entry(to).or_default(), &kept);
            }
        }
        self.vertices.merge_into(from, to);
        self.boundary[to] |= self.boundary[from];
        self.report.collapsed_edges += 1;

        for &f in &collapsed_faces {
            self.merge_coincident_edges(f)?;
        }
        for &f in &collapsed_faces {
            for k in 0..3 {
                let root = self.edge_tree.find(self.face_edge_ids[f][k]);
                self.edge_faces[root].remove(&f);
            }
        }
        Ok(())
    }

    /// After a collapse, the two surviving edges of face `f` join the same
    /// vertices and become one edge.
    fn merge_coincident_edges(&mut self, f: usize) -> Result<(), RepairError> {
        let mut live = Vec::with_capacity(3);
        for j in 0..3 {
            let a = self.vertices.find(self.faces[f][j]);
            let b = self.vertices.find(self.faces[f][(j + 1) % 3]);
            let (root, view) = self.face_view(f, j);
            if a == b && self.offsets[root].is_zero() {
                continue;
            }
            live.push((super::mesh::EdgeKey::new(a, b), root, view));
        }

        for x in 0..live.len() {
            for y in x + 1..live.len() {
                let (key_a, kept, view_a) = live[x];
                let (key_b, merged, view_b) = live[y];
                if key_a != key_b || kept == merged {
                    continue;
                }
                let kept = self.edge_tree.find(kept);
                let merged = self.edge_tree.find(merged);
                if kept == merged || !self.edge_faces[kept].contains(&f) {
                    continue;
                }
                let (kept_offset, merged_offset) = (self.offsets[kept], self.offsets[merged]);
                let preferred = view_a - view_b + Rot4::HALF;
                let rotation = std::iter::once(preferred)
                    .chain(Rot4::ALL)
                    .find(|&r| kept_offset.rotate(r) == merged_offset)
                    .ok_or(RepairError::IncompatibleEdges { kept, merged, kept_offset, merged_offset })?;

                self.edge_tree.attach(merged, kept, rotation)?;
                let faces = std::mem::take(&mut self.edge_faces[merged]);
                self.edge_faces[kept].extend(faces);
                self.edge_faces[kept].remove(&f);
                let super::mesh::EdgeKey(a, b) = key_a;
                for (u, w) in [(a, b), (b, a)] {
                    if let Some(list) = self.neighbors[u].get_mut(&w) {
                        list.retain(|&e| e != merged);
                    }
                }
                self.report.merged_edges += 1;
            }
        }
        Ok(())
    }

    // ── queries ─────────────────────────────────────────────────────────────

    fn edge_vertices(&mut self, e: usize) -> (usize, usize) {
        let key = self.endpoints[e];
        (self.vertices.find(key.0), self.vertices.find(key.1))
    }

    /// Representative of the `k`-th edge of `f` and its rotation into the
    /// face frame.
    fn face_view(&mut self, f: usize, k: usize) -> (usize, Rot4) {
        let e = self.face_edge_ids[f][k];
        let root = self.edge_tree.find(e);
        (root, self.edge_tree.orient(e) + self.face_edge_orients[f][k])
    }

    /// Signed lattice area spanned by edges `0` and `2` of face `f`.
    fn face_area(&mut self, f: usize) -> i64 {
        let (r0, o0) = self.face_view(f, 0);
        let (r2, o2) = self.face_view(f, 2);
        let d0 = self.offsets[r0].rotate(o0);
        let d2 = self.offsets[r2].rotate(o2);
        d2.cross(d0)
    }

    fn negative_area_of(&mut self, faces: &BTreeSet<usize>) -> i64 {
        faces.iter().map(|&f| (-self.face_area(f)).max(0)).sum()
    }

    fn flip_summary(&mut self) -> (usize, i64) {
        let mut count = 0;
        let mut total = 0;
        for f in 0..self.faces.len() {
            let area = self.face_area(f);
            if area < 0 {
                count += 1;
                total -= area;
            }
        }
        (count, total)
    }

    fn axis_neighbors(&self, v: usize) -> Vec<usize> {
        self.neighbors[v]
            .iter()
            .filter(|(nb, edges)| **nb != v && edges.iter().any(|&e| self.offsets[e].is_axis_aligned()))
            .map(|(nb, _)| *nb)
            .collect()
    }

    fn valence_threshold(&self, v: usize) -> usize {
        if self.boundary[v] { 2 } else { 3 }
    }
}

fn push_unique(list: &mut Vec<usize>, edges: &[usize]) {
    for &e in edges {
        if !list.contains(&e) {
            list.push(e);
        }
    }
}
