// Octava
// Copyright (c) 2025 The Project Octava Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `comps` module tracks which variables are related by some constraint.
//!
//! The partition is a disjoint-set structure over variable indices paired with a sorted intrusive
//! member list per component, so both union and ordered iteration are cheap. A variable outside
//! every component is unconstrained: its only matrix entries are the zero diagonals. Unions
//! re-parent the smaller member list wholesale, keeping every parent pointer one hop from its
//! root.

use log::trace;
use smallvec::SmallVec;

use crate::hmat::{block_slots, HalfMatrix, INF};

const NONE: u32 = u32::MAX;

/// A scratch member list. Components are usually small.
pub(crate) type MemberVec = SmallVec<[u32; 8]>;

/// Partition of `{0, .., n-1}` into related-variable components.
#[derive(Clone, Debug)]
pub(crate) struct VarPartition {
    /// Component root of each variable; `NONE` for unconstrained variables.
    parent: Vec<u32>,
    /// First (smallest) member of the component; valid at roots.
    head: Vec<u32>,
    /// Intrusive ascending member list; `NONE` terminates.
    next: Vec<u32>,
    /// Component size; valid at roots.
    size: Vec<u32>,
    tracked: usize,
}

impl VarPartition {
    pub(crate) fn new(dim: usize) -> VarPartition {
        VarPartition {
            parent: vec![NONE; dim],
            head: vec![NONE; dim],
            next: vec![NONE; dim],
            size: vec![0; dim],
            tracked: 0,
        }
    }

    pub(crate) fn num_vars(&self) -> usize {
        self.parent.len()
    }

    /// Returns true if no variable is in any component.
    pub(crate) fn is_empty(&self) -> bool {
        self.tracked == 0
    }

    pub(crate) fn contains(&self, v: u32) -> bool {
        self.parent[v as usize] != NONE
    }

    /// The component root of `v`, or `None` if `v` is unconstrained.
    pub(crate) fn find(&self, v: u32) -> Option<u32> {
        let p = self.parent[v as usize];
        if p == NONE {
            None
        }
        else {
            Some(p)
        }
    }

    pub(crate) fn connected(&self, a: u32, b: u32) -> bool {
        match (self.find(a), self.find(b)) {
            (Some(ra), Some(rb)) => ra == rb,
            _ => false,
        }
    }

    /// Track `v` as a singleton component if it is not yet in any component.
    pub(crate) fn insert(&mut self, v: u32) {
        if self.contains(v) {
            return;
        }
        let v = v as usize;
        self.parent[v] = v as u32;
        self.head[v] = v as u32;
        self.next[v] = NONE;
        self.size[v] = 1;
        self.tracked += 1;
    }

    /// Merge the components of `a` and `b`, returning the surviving root. Both variables must
    /// already be tracked.
    pub(crate) fn union(&mut self, a: u32, b: u32) -> u32 {
        let ra = self.parent[a as usize];
        let rb = self.parent[b as usize];
        debug_assert!(ra != NONE && rb != NONE);
        if ra == rb {
            return ra;
        }

        let (keep, lose) =
            if self.size[ra as usize] >= self.size[rb as usize] { (ra, rb) } else { (rb, ra) };

        // Every member of the losing component points directly at its root; re-aim them.
        let mut m = self.head[lose as usize];
        while m != NONE {
            self.parent[m as usize] = keep;
            m = self.next[m as usize];
        }

        // Merge the two ascending member lists.
        let mut ha = self.head[keep as usize];
        let mut hb = self.head[lose as usize];
        let mut merged = NONE;
        let mut tail = NONE;
        while ha != NONE || hb != NONE {
            let take = if hb == NONE || (ha != NONE && ha < hb) {
                let t = ha;
                ha = self.next[ha as usize];
                t
            }
            else {
                let t = hb;
                hb = self.next[hb as usize];
                t
            };

            if merged == NONE {
                merged = take;
            }
            else {
                self.next[tail as usize] = take;
            }
            tail = take;
        }
        self.next[tail as usize] = NONE;

        self.head[keep as usize] = merged;
        self.size[keep as usize] += self.size[lose as usize];
        keep
    }

    /// Iterate the members of the component rooted at `root`, in ascending order.
    pub(crate) fn members(&self, root: u32) -> Members<'_> {
        Members { part: self, cur: self.head[root as usize] }
    }

    /// Iterate component roots in ascending order.
    pub(crate) fn roots(&self) -> impl Iterator<Item = u32> + '_ {
        (0..self.parent.len() as u32).filter(move |&v| self.parent[v as usize] == v)
    }

    /// The members of `v`'s component collected into a scratch list.
    pub(crate) fn component_of(&self, v: u32) -> MemberVec {
        match self.find(v) {
            Some(root) => self.members(root).collect(),
            None => MemberVec::new(),
        }
    }

    /// Untrack `v`, splicing it out of its component.
    pub(crate) fn remove(&mut self, v: u32) {
        if !self.contains(v) {
            return;
        }
        let r = self.parent[v as usize];

        if self.size[r as usize] == 1 {
            self.parent[v as usize] = NONE;
            self.tracked -= 1;
            return;
        }

        let mut prev = NONE;
        let mut cur = self.head[r as usize];
        while cur != v {
            prev = cur;
            cur = self.next[cur as usize];
        }
        if prev == NONE {
            self.head[r as usize] = self.next[v as usize];
        }
        else {
            self.next[prev as usize] = self.next[v as usize];
        }
        self.size[r as usize] -= 1;
        self.parent[v as usize] = NONE;
        self.tracked -= 1;

        if r == v {
            // The removed variable was the root; re-root onto the first remaining member.
            let h = self.head[v as usize];
            let s = self.size[v as usize];
            let mut m = h;
            while m != NONE {
                self.parent[m as usize] = h;
                m = self.next[m as usize];
            }
            self.head[h as usize] = h;
            self.size[h as usize] = s;
        }
    }

    /// Returns true if both partitions carve the variables into the same components.
    pub(crate) fn same_partition(&self, other: &VarPartition) -> bool {
        if self.num_vars() != other.num_vars() {
            return false;
        }
        for v in 0..self.num_vars() as u32 {
            match (self.find(v), other.find(v)) {
                (None, None) => (),
                (Some(ra), Some(rb)) => {
                    // Ascending member lists make the head the canonical representative.
                    if self.head[ra as usize] != other.head[rb as usize] {
                        return false;
                    }
                }
                _ => return false,
            }
        }
        true
    }
}

/// Ascending iterator over one component's members.
pub(crate) struct Members<'a> {
    part: &'a VarPartition,
    cur: u32,
}

impl Iterator for Members<'_> {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        if self.cur == NONE {
            return None;
        }
        let v = self.cur;
        self.cur = self.part.next[v as usize];
        Some(v)
    }
}

/// The coarsest partition refining both operands' components: variables land in the same
/// component iff either operand relates them (transitively).
pub(crate) fn merge_partitions(pa: &VarPartition, pb: &VarPartition) -> VarPartition {
    let mut merged = pa.clone();
    for root in pb.roots() {
        let ms: MemberVec = pb.members(root).collect();
        for &m in &ms {
            merged.insert(m);
        }
        for w in ms.windows(2) {
            merged.union(w[0], w[1]);
        }
    }
    merged
}

/// Rebuild the partition from the matrix: two variables are related iff their block holds a
/// finite off-diagonal entry. This is the dense-to-decomposed conversion scan.
pub(crate) fn rescan(mat: &HalfMatrix) -> VarPartition {
    let dim = mat.dim();
    let mut parts = VarPartition::new(dim);

    for u in 0..dim {
        for v in 0..=u {
            let related = block_slots(u, v).any(|(i, j)| mat.get(i, j) != INF);
            if related {
                parts.insert(u as u32);
                parts.insert(v as u32);
                if u != v {
                    parts.union(u as u32, v as u32);
                }
            }
        }
    }

    trace!("rescan: {} of {} variables constrained", parts.tracked, dim);
    parts
}

/// Reset the block relating `u` and `v` to the no-constraint state: off-diagonal slots `+∞`,
/// diagonal slots zero. Used when materializing entries that were previously implicit.
pub(crate) fn ini_relation(mat: &mut HalfMatrix, u: usize, v: usize) {
    for (i, j) in block_slots(u, v) {
        mat.set(i, j, INF);
    }
    if u == v {
        mat.set(2 * u, 2 * u, 0.0);
        mat.set(2 * u + 1, 2 * u + 1, 0.0);
    }
}

/// Track `v` and materialize its unary block if it is not yet in any component.
pub(crate) fn handle_unary_relation(mat: &mut HalfMatrix, parts: &mut VarPartition, v: usize) {
    if !parts.contains(v as u32) {
        ini_relation(mat, v, v);
        parts.insert(v as u32);
    }
}

/// Prepare the matrix for a fresh constraint relating `u` and `v`: every pair across the two
/// components involved must hold explicit entries before the constraint lands, and the
/// components merge.
pub(crate) fn handle_binary_relation(
    mat: &mut HalfMatrix,
    parts: &mut VarPartition,
    u: usize,
    v: usize,
) {
    if u == v {
        handle_unary_relation(mat, parts, u);
        return;
    }

    let (cu, cv) = (parts.find(u as u32), parts.find(v as u32));
    match (cu, cv) {
        (None, None) => {
            ini_relation(mat, u, u);
            ini_relation(mat, v, v);
            ini_relation(mat, u, v);
            parts.insert(u as u32);
            parts.insert(v as u32);
            parts.union(u as u32, v as u32);
        }
        (Some(_), None) => {
            ini_relation(mat, v, v);
            for m in parts.component_of(u as u32) {
                ini_relation(mat, m as usize, v);
            }
            parts.insert(v as u32);
            parts.union(u as u32, v as u32);
        }
        (None, Some(_)) => {
            ini_relation(mat, u, u);
            for m in parts.component_of(v as u32) {
                ini_relation(mat, m as usize, u);
            }
            parts.insert(u as u32);
            parts.union(u as u32, v as u32);
        }
        (Some(ru), Some(rv)) => {
            if ru == rv {
                return;
            }
            let c1 = parts.component_of(u as u32);
            let c2 = parts.component_of(v as u32);
            for &m1 in &c1 {
                for &m2 in &c2 {
                    ini_relation(mat, m1 as usize, m2 as usize);
                }
            }
            parts.union(u as u32, v as u32);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{rescan, VarPartition};
    use crate::hmat::HalfMatrix;

    #[test]
    fn verify_union_find() {
        let mut p = VarPartition::new(6);
        assert!(p.is_empty());

        p.insert(4);
        p.insert(1);
        p.insert(2);
        p.union(4, 1);
        p.union(1, 2);

        assert!(p.connected(2, 4));
        assert!(!p.connected(0, 1));
        assert!(!p.contains(0));

        // Ordered iteration over the single component.
        let root = p.find(4).unwrap();
        let members: Vec<u32> = p.members(root).collect();
        assert_eq!(members, vec![1, 2, 4]);
        assert_eq!(p.roots().count(), 1);
    }

    #[test]
    fn verify_remove() {
        let mut p = VarPartition::new(5);
        for v in [0, 2, 3] {
            p.insert(v);
        }
        p.union(0, 2);
        p.union(2, 3);

        let root = p.find(0).unwrap();
        p.remove(root);

        assert!(!p.contains(root));
        let survivors: Vec<u32> = p.members(p.find(2).unwrap()).collect();
        assert_eq!(survivors.len(), 2);
        assert!(p.connected(2, 3) || survivors == vec![2, 3]);

        p.remove(2);
        p.remove(3);
        assert!(p.is_empty());
    }

    #[test]
    fn verify_same_partition() {
        let mut a = VarPartition::new(4);
        let mut b = VarPartition::new(4);

        for p in [&mut a, &mut b] {
            p.insert(0);
            p.insert(3);
        }
        a.union(0, 3);

        assert!(!a.same_partition(&b));
        b.union(3, 0);
        assert!(a.same_partition(&b));
    }

    #[test]
    fn verify_rescan() {
        let mut m = HalfMatrix::top(4);
        // Relate x0 and x2 with a single finite bound, and give x3 a unary bound.
        m.set(4, 0, 5.0);
        m.set(7, 6, 2.0);

        let p = rescan(&m);
        assert!(p.connected(0, 2));
        assert!(p.contains(3));
        assert!(!p.contains(1));
        assert_eq!(p.roots().count(), 2);
    }
}
