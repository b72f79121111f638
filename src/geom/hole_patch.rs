//! Closing of holes left between the paired quads.
//!
//! Every directed quad edge without a reversed twin leaves one open
//! half-edge, running against the quad. The open half-edges split into
//! simple cycles; cycles made only of input boundary edges are the mesh
//! border, cycles with none are interior holes, and mixed cycles break into
//! chains that are closed through the input boundary edges no quad covers.
//!
//! Rings of up to four vertices become one quad; longer rings are eaten from
//! the side: the vertex pair three steps apart with the shortest distance
//! spans a quad, and the two vertices between them leave the ring.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use super::Vec3;
use super::mesh::EdgeKey;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HolePatch {
    pub faces: Vec<[usize; 4]>,
    /// Loops fully consumed by patch quads.
    pub patched_loops: usize,
    pub warnings: Vec<String>,
}

/// Vertex rings around the regions no quad covers, ordered against the
/// quads around them and starting at their smallest vertex.
#[must_use]
pub fn boundary_loops(quads: &[[usize; 4]], input_boundary: &BTreeSet<EdgeKey>) -> Vec<Vec<usize>> {
    let mut uncovered: BTreeSet<EdgeKey> = input_boundary.clone();
    for quad in quads {
        for j in 0..4 {
            uncovered.remove(&EdgeKey::new(quad[j], quad[(j + 1) % 4]));
        }
    }

    let mut rings = Vec::new();
    for cycle in open_cycles(quads) {
        let len = cycle.len();
        let on_boundary: Vec<bool> = (0..len)
            .map(|i| input_boundary.contains(&EdgeKey::new(cycle[i], cycle[(i + 1) % len])))
            .collect();

        if !on_boundary.contains(&true) {
            rings.push(cycle);
            continue;
        }
        for mut ring in interior_chains(&cycle, &on_boundary) {
            let (Some(&first), Some(&last)) = (ring.first(), ring.last()) else {
                continue;
            };
            if first == last {
                ring.pop();
            } else if let Some(path) = boundary_path(last, first, &mut uncovered) {
                ring.extend(path);
            } else {
                log::debug!("open chain {:?} follows the input boundary", ring);
                continue;
            }
            if ring.len() < 3 {
                log::debug!("open chain {:?} closes into a sliver", ring);
                continue;
            }
            rings.push(ring);
        }
    }

    for ring in &mut rings {
        if let Some(start) = ring.iter().enumerate().min_by_key(|&(_, v)| *v).map(|(i, _)| i) {
            ring.rotate_left(start);
        }
    }
    rings
}

/// Cycles of open half-edges, as the vertices they leave in order.
///
/// Where several open half-edges leave one vertex, the walk skips the one
/// reached by turning through the quad fan behind the incoming half-edge:
/// that one borders a different hole.
fn open_cycles(quads: &[[usize; 4]]) -> Vec<Vec<usize>> {
    let mut owner: BTreeMap<(usize, usize), (usize, usize)> = BTreeMap::new();
    let mut directed: BTreeMap<(usize, usize), i32> = BTreeMap::new();
    for (q, quad) in quads.iter().enumerate() {
        for j in 0..4 {
            let (a, b) = (quad[j], quad[(j + 1) % 4]);
            if a != b {
                owner.entry((a, b)).or_insert((q, j));
                *directed.entry((a, b)).or_default() += 1;
            }
        }
    }

    let mut open: BTreeMap<(usize, usize), i32> = BTreeMap::new();
    for (&(a, b), &count) in &directed {
        let excess = count - directed.get(&(b, a)).copied().unwrap_or(0);
        if excess > 0 {
            *open.entry((b, a)).or_default() += excess;
        }
    }

    let mut half_edges = Vec::new();
    for (&edge, &count) in &open {
        for _ in 0..count {
            half_edges.push(edge);
        }
    }
    let mut outgoing: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (i, &(from, _)) in half_edges.iter().enumerate() {
        outgoing.entry(from).or_default().push(i);
    }

    let mut used = vec![false; half_edges.len()];
    let mut cycles = Vec::new();
    for start in 0..half_edges.len() {
        if used[start] {
            continue;
        }
        used[start] = true;
        let mut cycle = vec![half_edges[start].0];
        let (mut from, mut at) = half_edges[start];
        loop {
            let mut candidates: Vec<usize> = outgoing
                .get(&at)
                .map(|list| list.iter().copied().filter(|&e| !used[e]).collect())
                .unwrap_or_default();
            if at == half_edges[start].0 {
                candidates.push(start);
            }
            let behind = fan_exit(from, at, &owner, quads);
            let next = if candidates.len() > 1 {
                candidates.iter().copied().find(|&e| Some(half_edges[e].1) != behind)
            } else {
                candidates.first().copied()
            };
            let Some(e) = next else {
                log::debug!("open half-edge walk {:?} stopped at vertex {}", cycle, at);
                break;
            };
            if e == start {
                cycles.push(cycle);
                break;
            }
            used[e] = true;
            cycle.push(at);
            (from, at) = half_edges[e];
        }
    }
    cycles
}

/// Far end of the first open half-edge leaving `v` that is reached by
/// turning from the quad edge `v -> u` through the quads around `v`.
fn fan_exit(
    u: usize,
    v: usize,
    owner: &BTreeMap<(usize, usize), (usize, usize)>,
    quads: &[[usize; 4]],
) -> Option<usize> {
    let mut edge = (v, u);
    for _ in 0..=owner.len() {
        let &(q, j) = owner.get(&edge)?;
        let quad = quads[q];
        let prev = (1..4).map(|s| quad[(j + 4 - s) % 4]).find(|&p| p != v)?;
        if !owner.contains_key(&(v, prev)) {
            return Some(prev);
        }
        edge = (v, prev);
    }
    None
}

/// Maximal runs of `cycle` whose edges are off the input boundary, as vertex
/// chains from the first to the last vertex of the run.
fn interior_chains(cycle: &[usize], on_boundary: &[bool]) -> Vec<Vec<usize>> {
    let len = cycle.len();
    let mut chains = Vec::new();
    for i in 0..len {
        let before = (i + len - 1) % len;
        if !on_boundary[before] || on_boundary[i] {
            continue;
        }
        let mut chain = vec![cycle[i]];
        let mut k = i;
        while !on_boundary[k] {
            k = (k + 1) % len;
            chain.push(cycle[k]);
        }
        chains.push(chain);
    }
    chains
}

/// Shortest walk from `from` to `to` over uncovered input boundary edges,
/// consuming them. Returns the vertices strictly between the two ends.
fn boundary_path(from: usize, to: usize, uncovered: &mut BTreeSet<EdgeKey>) -> Option<Vec<usize>> {
    let mut adjacent: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for &EdgeKey(a, b) in uncovered.iter() {
        adjacent.entry(a).or_default().push(b);
        adjacent.entry(b).or_default().push(a);
    }

    let mut previous: BTreeMap<usize, usize> = BTreeMap::new();
    let mut queue = VecDeque::from([from]);
    while let Some(v) = queue.pop_front() {
        if v == to {
            break;
        }
        for &w in adjacent.get(&v).into_iter().flatten() {
            if w != from && !previous.contains_key(&w) {
                previous.insert(w, v);
                queue.push_back(w);
            }
        }
    }
    if from != to && !previous.contains_key(&to) {
        return None;
    }

    let mut inner = Vec::new();
    let mut v = to;
    while v != from {
        let prev = previous.get(&v).copied()?;
        uncovered.remove(&EdgeKey::new(prev, v));
        if prev != from {
            inner.push(prev);
        }
        v = prev;
    }
    inner.reverse();
    Some(inner)
}

/// Patches every loop of at least three vertices.
#[must_use]
pub fn patch_holes(quads: &[[usize; 4]], positions: &[Vec3], input_boundary: &BTreeSet<EdgeKey>) -> HolePatch {
    let directed: BTreeSet<(usize, usize)> = quads
        .iter()
        .flat_map(|q| (0..4).map(move |j| (q[j], q[(j + 1) % 4])))
        .collect();

    let mut patch = HolePatch::default();
    for mut ring in boundary_loops(quads, input_boundary) {
        if ring.len() < 3 {
            patch
                .warnings
                .push(format!("dropped hole loop of {} vertices", ring.len()));
            continue;
        }

        loop {
            let len = ring.len();
            if len <= 4 {
                let quad = if len == 4 {
                    [ring[0], ring[1], ring[2], ring[3]]
                } else {
                    [ring[0], ring[1], ring[2], ring[2]]
                };
                patch.faces.push(orient_against(quad, &directed));
                break;
            }

            let mut best = 0;
            let mut best_distance = f64::INFINITY;
            for i in 0..len {
                let d = (positions[ring[i]] - positions[ring[(i + 3) % len]]).length();
                if d < best_distance {
                    best_distance = d;
                    best = i;
                }
            }
            let quad = [0, 1, 2, 3].map(|j| ring[(best + j) % len]);
            patch.faces.push(orient_against(quad, &directed));

            let (a, b) = ((best + 1) % len, (best + 2) % len);
            ring.remove(a.max(b));
            ring.remove(a.min(b));
        }
        patch.patched_loops += 1;
    }

    if !patch.faces.is_empty() {
        log::debug!("hole patching: {} quads over {} loops", patch.faces.len(), patch.patched_loops);
    }
    patch
}

/// Reverses `quad` if its first edge already runs the same way in a quad.
fn orient_against(mut quad: [usize; 4], directed: &BTreeSet<(usize, usize)>) -> [usize; 4] {
    if directed.contains(&(quad[0], quad[1])) {
        quad.swap(1, 3);
    }
    quad
}
