//! Disjoint-set forests used by the integer stages.
//!
//! [`OrientTree`] labels every element with a quarter-turn rotation relative
//! to its root, so two elements in the same set always have a well-defined
//! relative frame. [`VertexTree`] is the plain variant used for vertex
//! collapsing, with a compact re-indexing of its classes.

use super::Rot4;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OrientTreeError {
    /// Two already-joined elements were asked to agree on a different
    /// relative rotation than the one the tree records.
    #[error(
        "inconsistent rotation between elements {a} and {b}: tree records {recorded:?}, merge requires {required:?}"
    )]
    InconsistentRotation { a: usize, b: usize, recorded: Rot4, required: Rot4 },

    /// `attach` was called on an element that is not a root.
    #[error("element {0} is not a root")]
    NotRoot(usize),
}

// ─────────────────────────────────────────────────────────────────────────────
// OrientTree
// ─────────────────────────────────────────────────────────────────────────────

/// Union-find whose links carry a [`Rot4`].
///
/// `orient(x)` is the accumulated rotation along the path from `x` to its
/// root. Path compression folds the rotations of the skipped links into the
/// new direct link.
#[derive(Debug, Clone, Default)]
pub struct OrientTree {
    parent: Vec<(usize, Rot4)>,
    rank: Vec<u32>,
}

impl OrientTree {
    #[must_use]
    pub fn new(len: usize) -> Self {
        Self {
            parent: (0..len).map(|i| (i, Rot4::IDENTITY)).collect(),
            rank: vec![1; len],
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.parent.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.parent.is_empty()
    }

    #[must_use]
    pub fn is_root(&self, x: usize) -> bool {
        self.parent[x].0 == x
    }

    /// Root of `x`'s set, compressing the path on the way.
    pub fn find(&mut self, x: usize) -> usize {
        let mut path = Vec::new();
        let mut cur = x;
        while self.parent[cur].0 != cur {
            path.push(cur);
            cur = self.parent[cur].0;
        }
        let root = cur;
        let mut acc = Rot4::IDENTITY;
        for &node in path.iter().rev() {
            acc += self.parent[node].1;
            self.parent[node] = (root, acc);
        }
        root
    }

    /// Rotation of `x` relative to its root.
    pub fn orient(&mut self, x: usize) -> Rot4 {
        let root = self.find(x);
        if root == x { Rot4::IDENTITY } else { self.parent[x].1 }
    }

    pub fn same_set(&mut self, a: usize, b: usize) -> bool {
        self.find(a) == self.find(b)
    }

    /// Joins the sets of `a` and `b` so that afterwards
    /// `orient(a) + rot_a == orient(b) + rot_b`.
    ///
    /// Returns `Ok(true)` if two sets were joined and `Ok(false)` if they were
    /// already joined with a compatible rotation.
    pub fn merge(&mut self, a: usize, b: usize, rot_a: Rot4, rot_b: Rot4) -> Result<bool, OrientTreeError> {
        let root_a = self.find(a);
        let root_b = self.find(b);
        let orient_a = self.orient(a);
        let orient_b = self.orient(b);

        if root_a == root_b {
            let recorded = orient_b - orient_a;
            let required = rot_a - rot_b;
            return if recorded == required {
                Ok(false)
            } else {
                Err(OrientTreeError::InconsistentRotation { a, b, recorded, required })
            };
        }

        if self.rank[root_b] < self.rank[root_a] {
            self.parent[root_b] = (root_a, rot_a - rot_b + orient_a - orient_b);
            self.rank[root_a] += self.rank[root_b];
        } else {
            self.parent[root_a] = (root_b, rot_b - rot_a + orient_b - orient_a);
            self.rank[root_b] += self.rank[root_a];
        }
        Ok(true)
    }

    /// Hangs the root `child` beneath `parent` with the given link rotation,
    /// keeping `parent`'s root as the representative.
    pub fn attach(&mut self, child: usize, parent: usize, rotation: Rot4) -> Result<(), OrientTreeError> {
        if !self.is_root(child) {
            return Err(OrientTreeError::NotRoot(child));
        }
        let root = self.find(parent);
        if root == child {
            return Ok(());
        }
        let link = rotation + self.orient(parent);
        self.parent[child] = (root, link);
        self.rank[root] += self.rank[child];
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// VertexTree
// ─────────────────────────────────────────────────────────────────────────────

/// Union-find over vertices with a dense index over the resulting classes.
#[derive(Debug, Clone, Default)]
pub struct VertexTree {
    parent: Vec<usize>,
    rank: Vec<u32>,
    compact: Vec<usize>,
    compact_count: usize,
}

impl VertexTree {
    #[must_use]
    pub fn new(len: usize) -> Self {
        Self {
            parent: (0..len).collect(),
            rank: vec![1; len],
            compact: Vec::new(),
            compact_count: 0,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.parent.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.parent.is_empty()
    }

    pub fn find(&mut self, x: usize) -> usize {
        let mut root = x;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        let mut cur = x;
        while self.parent[cur] != root {
            let next = self.parent[cur];
            self.parent[cur] = root;
            cur = next;
        }
        root
    }

    /// Union by rank.
    pub fn merge(&mut self, a: usize, b: usize) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra == rb {
            return;
        }
        if self.rank[ra] < self.rank[rb] {
            self.parent[ra] = rb;
            self.rank[rb] += self.rank[ra];
        } else {
            self.parent[rb] = ra;
            self.rank[ra] += self.rank[rb];
        }
    }

    /// Merges `from`'s class into `to`'s class, keeping `to`'s root.
    pub fn merge_into(&mut self, from: usize, to: usize) {
        let rf = self.find(from);
        let rt = self.find(to);
        if rf == rt {
            return;
        }
        self.rank[rt] += self.rank[rf];
        self.parent[rf] = rt;
    }

    /// Numbers the classes in order of their root index.
    pub fn build_compact(&mut self) {
        let mut root_index = vec![usize::MAX; self.parent.len()];
        let mut count = 0;
        for i in 0..self.parent.len() {
            if self.parent[i] == i {
                root_index[i] = count;
                count += 1;
            }
        }
        self.compact = (0..self.parent.len()).map(|i| root_index[self.find(i)]).collect();
        self.compact_count = count;
    }

    /// Compact class index of `x`. Only valid after [`build_compact`](Self::build_compact).
    #[must_use]
    pub fn index(&self, x: usize) -> usize {
        self.compact[x]
    }

    #[must_use]
    pub fn compact_count(&self) -> usize {
        self.compact_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_records_relative_rotation() {
        let mut tree = OrientTree::new(4);
        assert!(tree.merge(0, 1, Rot4::QUARTER, Rot4::IDENTITY).unwrap());
        assert!(tree.merge(1, 2, Rot4::HALF, Rot4::IDENTITY).unwrap());
        assert_eq!(tree.orient(0) + Rot4::QUARTER, tree.orient(1));
        assert_eq!(tree.orient(1) + Rot4::HALF, tree.orient(2));
        assert_eq!(tree.orient(2) - tree.orient(0), Rot4::THREE_QUARTERS);
        assert!(!tree.same_set(0, 3));
    }

    #[test]
    fn consistent_remerge_is_a_no_op() {
        let mut tree = OrientTree::new(3);
        tree.merge(0, 1, Rot4::QUARTER, Rot4::IDENTITY).unwrap();
        tree.merge(1, 2, Rot4::QUARTER, Rot4::IDENTITY).unwrap();
        assert_eq!(tree.merge(0, 2, Rot4::HALF, Rot4::IDENTITY), Ok(false));
    }

    #[test]
    fn inconsistent_merge_is_an_error() {
        let mut tree = OrientTree::new(3);
        tree.merge(0, 1, Rot4::QUARTER, Rot4::IDENTITY).unwrap();
        tree.merge(1, 2, Rot4::QUARTER, Rot4::IDENTITY).unwrap();
        let err = tree.merge(0, 2, Rot4::IDENTITY, Rot4::IDENTITY).unwrap_err();
        assert!(matches!(err, OrientTreeError::InconsistentRotation { a: 0, b: 2, .. }));
    }

    #[test]
    fn path_compression_preserves_orientation() {
        let mut tree = OrientTree::new(6);
        for i in 0..5 {
            tree.attach(i + 1, i, Rot4::QUARTER).unwrap();
        }
        let before: Vec<Rot4> = (0..6).map(|i| tree.orient(i)).collect();
        for i in 0..6 {
            assert_eq!(tree.find(i), 0);
        }
        let after: Vec<Rot4> = (0..6).map(|i| tree.orient(i)).collect();
        assert_eq!(before, after);
        assert_eq!(after[5], Rot4::new(5));
    }

    #[test]
    fn attach_requires_root() {
        let mut tree = OrientTree::new(3);
        tree.attach(1, 0, Rot4::HALF).unwrap();
        assert_eq!(tree.attach(1, 2, Rot4::IDENTITY), Err(OrientTreeError::NotRoot(1)));
    }

    #[test]
    fn vertex_tree_compacts_in_root_order() {
        let mut tree = VertexTree::new(5);
        tree.merge_into(3, 1);
        tree.merge(4, 0);
        tree.build_compact();
        assert_eq!(tree.compact_count(), 3);
        assert_eq!(tree.index(3), tree.index(1));
        assert_eq!(tree.index(4), tree.index(0));
        assert_ne!(tree.index(2), tree.index(1));
        assert_eq!(tree.find(3), 1);
    }
}
