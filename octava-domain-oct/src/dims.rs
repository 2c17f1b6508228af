// Octava
// Copyright (c) 2025 The Project Octava Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `dims` module adds, removes, relabels, duplicates, folds, and forgets variables.
//!
//! Every structural change is a relocation of blocks through one remap helper: an old-variable
//! to new-variable map drives where each stored entry lands in the reallocated half-matrix, and
//! the partition is carried along so decomposed values keep their component structure.

use octava_core::flags::Flags;

use crate::comps::{rescan, MemberVec};
use crate::hmat::{block_slots, INF};
use crate::oct::{Body, Oct};
use crate::OctManager;

/// Map a signed index onto variable `to` when it belongs to variable `from`.
#[inline]
fn retarget(node: usize, from: usize, to: usize) -> usize {
    if node >> 1 == from {
        2 * to + (node & 1)
    }
    else {
        node
    }
}

/// Relocate a body into `new_dim` variables: old variable `v` becomes `map[v]`, entries of
/// unmapped variables vanish.
fn remap_body(src: &Body, new_dim: usize, map: &[Option<u32>]) -> Body {
    let mut body = Body::top(new_dim);
    body.dense = src.dense;

    let n2 = src.mat.nodes();
    for i in 0..n2 {
        let Some(nu) = map[i >> 1] else { continue };
        let ni = 2 * nu as usize + (i & 1);
        for j in 0..=(i | 1) {
            if i == j {
                continue;
            }
            let Some(nv) = map[j >> 1] else { continue };
            let nj = 2 * nv as usize + (j & 1);
            let val = src.bound(i, j);
            if val != INF {
                body.mat.set(ni, nj, val);
            }
        }
    }

    for root in src.comps.roots() {
        let ms: MemberVec = src.comps.members(root).filter_map(|m| map[m as usize]).collect();
        for &m in &ms {
            body.comps.insert(m);
        }
        for w in ms.windows(2) {
            body.comps.union(w[0], w[1]);
        }
    }

    body
}

/// Drop every constraint on `v`. With `project`, pin `v` to zero afterwards.
pub(crate) fn forget_one(body: &mut Body, v: usize, project: bool) {
    if body.dense {
        let dim = body.mat.dim();
        for w in 0..dim {
            for (i, j) in block_slots(v, w) {
                body.mat.set(i, j, INF);
            }
        }
    }
    else {
        let ms = body.comps.component_of(v as u32);
        for &w in &ms {
            for (i, j) in block_slots(v, w as usize) {
                body.mat.set(i, j, INF);
            }
        }
        body.comps.remove(v as u32);
    }

    if project {
        // x = 0, encoded as x <= 0 and -x <= 0.
        body.mat.set(2 * v, 2 * v + 1, 0.0);
        body.mat.set(2 * v + 1, 2 * v, 0.0);
        if !body.dense {
            body.comps.insert(v as u32);
        }
    }
}

impl OctManager {
    /// Insert one fresh unconstrained dimension before each listed (ascending) position of the
    /// current dimension range.
    pub fn add_dimensions(&mut self, a: &Oct, positions: &[u32]) -> Oct {
        self.begin();
        let dim = a.dim();
        debug_assert!(positions.windows(2).all(|w| w[0] <= w[1]));
        debug_assert!(positions.iter().all(|&p| p as usize <= dim));
        let new_dim = dim + positions.len();

        let Some(body) = a.body() else {
            return Oct::bottom(new_dim);
        };

        let mut map = Vec::with_capacity(dim);
        let mut shift = 0;
        for v in 0..dim {
            while shift < positions.len() && (positions[shift] as usize) <= v {
                shift += 1;
            }
            map.push(Some((v + shift) as u32));
        }

        // Fresh dimensions are unconstrained; closure is unaffected.
        Oct::from_body(new_dim, remap_body(body, new_dim, &map), a.is_closed_state())
    }

    /// Remove the listed (ascending, distinct) dimensions.
    pub fn remove_dimensions(&mut self, a: &mut Oct, dims: &[u32]) -> Oct {
        self.begin();
        let dim = a.dim();
        debug_assert!(dims.windows(2).all(|w| w[0] < w[1]));
        debug_assert!(dims.iter().all(|&d| (d as usize) < dim));
        let new_dim = dim - dims.len();

        // Close first so constraints implied through removed variables survive the cut.
        if !self.ensure_closed(a) {
            return Oct::bottom(new_dim);
        }
        if !a.is_closed_state() {
            self.raise(Flags::INEXACT);
        }

        let body = a.body().unwrap();
        let mut map = vec![None; dim];
        let mut removed = 0;
        for v in 0..dim {
            if removed < dims.len() && dims[removed] as usize == v {
                removed += 1;
            }
            else {
                map[v] = Some((v - removed) as u32);
            }
        }

        Oct::from_body(new_dim, remap_body(body, new_dim, &map), a.is_closed_state())
    }

    /// Relabel dimensions: old dimension `v` becomes `perm[v]`.
    pub fn permute_dimensions(&mut self, a: &Oct, perm: &[u32]) -> Oct {
        self.begin();
        let dim = a.dim();
        assert_eq!(perm.len(), dim, "permutation must cover every dimension");
        debug_assert!({
            let mut seen = vec![false; dim];
            perm.iter().all(|&p| {
                let fresh = (p as usize) < dim && !seen[p as usize];
                if fresh {
                    seen[p as usize] = true;
                }
                fresh
            })
        });

        let Some(body) = a.body() else {
            return Oct::bottom(dim);
        };

        let map: Vec<Option<u32>> = perm.iter().map(|&p| Some(p)).collect();
        Oct::from_body(dim, remap_body(body, dim, &map), a.is_closed_state())
    }

    /// Duplicate `v` into `count` fresh copies appended after the existing dimensions, each
    /// carrying the same constraints as `v`. The copies join `v`'s component.
    pub fn expand_dimension(&mut self, a: &Oct, v: usize, count: usize) -> Oct {
        self.begin();
        let dim = a.dim();
        assert!(v < dim, "expanded dimension out of range");
        let new_dim = dim + count;

        let Some(src) = a.body() else {
            return Oct::bottom(new_dim);
        };

        let map: Vec<Option<u32>> = (0..dim as u32).map(Some).collect();
        let mut body = remap_body(src, new_dim, &map);

        let peers: MemberVec = if src.dense {
            (0..dim as u32).collect()
        }
        else {
            src.comps.component_of(v as u32)
        };
        for c in dim..new_dim {
            // The copy relates to every peer of v exactly as v does; copies stay mutually
            // unrelated until closure derives their relations from the unary bounds.
            for &w in &peers {
                if w as usize == v {
                    continue;
                }
                for (i, j) in block_slots(v, w as usize) {
                    let val = src.bound(i, j);
                    if val != INF {
                        body.mat.set(retarget(i, v, c), retarget(j, v, c), val);
                    }
                }
            }
            for (i, j) in block_slots(v, v) {
                let val = src.bound(i, j);
                if val != INF {
                    body.mat.set(retarget(i, v, c), retarget(j, v, c), val);
                }
            }

            if body.comps.contains(v as u32) {
                body.comps.insert(c as u32);
                body.comps.union(v as u32, c as u32);
            }
        }

        Oct::from_body(new_dim, body, false)
    }

    /// Collapse the listed (ascending, distinct) dimensions into the first by joining their
    /// constraints; the remaining listed dimensions are removed.
    pub fn fold_dimensions(&mut self, a: &mut Oct, dims: &[u32]) -> Oct {
        self.begin();
        let dim = a.dim();
        assert!(!dims.is_empty(), "fold requires at least one dimension");
        debug_assert!(dims.windows(2).all(|w| w[0] < w[1]));
        debug_assert!(dims.iter().all(|&d| (d as usize) < dim));
        let target = dims[0] as usize;
        let new_dim = dim - (dims.len() - 1);

        if !self.ensure_closed(a) {
            return Oct::bottom(new_dim);
        }
        self.raise(Flags::INEXACT);

        let src = a.body().unwrap();
        let mut folded = src.clone();

        let mut in_fold = vec![false; dim];
        for &d in dims {
            in_fold[d as usize] = true;
        }

        for w in 0..dim {
            if in_fold[w] {
                continue;
            }
            for (i, j) in block_slots(target, w) {
                let mut m = src.bound(i, j);
                for &u in &dims[1..] {
                    let (ui, uj) = (retarget(i, target, u as usize), retarget(j, target, u as usize));
                    m = m.max(src.bound(ui, uj));
                }
                folded.mat.set(i, j, m);
            }
        }
        for (i, j) in block_slots(target, target) {
            let mut m = src.bound(i, j);
            for &u in &dims[1..] {
                let (ui, uj) = (retarget(i, target, u as usize), retarget(j, target, u as usize));
                m = m.max(src.bound(ui, uj));
            }
            folded.mat.set(i, j, m);
        }

        // The fold may both create and erase relations on the target; rebuild the partition.
        if !folded.dense {
            folded.comps = rescan(&folded.mat);
        }

        let mut map = vec![None; dim];
        let mut removed = 0;
        for v in 0..dim {
            if v != target && in_fold[v] {
                removed += 1;
            }
            else {
                map[v] = Some((v - removed) as u32);
            }
        }

        Oct::from_body(new_dim, remap_body(&folded, new_dim, &map), false)
    }

    /// Drop every constraint mentioning the listed dimensions. With `project`, pin each to zero
    /// instead of leaving it unconstrained.
    pub fn forget_array(&mut self, a: &mut Oct, dims: &[u32], project: bool) {
        self.begin();
        if !self.ensure_closed(a) {
            return;
        }
        if !a.is_closed_state() {
            self.raise(Flags::INEXACT);
        }

        let dim = a.dim();
        let body = a.body_mut().unwrap();
        for &v in dims {
            if (v as usize) < dim {
                forget_one(body, v as usize, project);
            }
        }
    }

    /// Returns true if no constraint mentions `dim` (out-of-range dimensions are trivially
    /// unconstrained-free and answer false).
    pub fn is_dimension_unconstrained(&mut self, a: &mut Oct, dim: usize) -> bool {
        self.begin();
        if dim >= a.dim() || a.is_bottom_state() {
            return false;
        }

        let body = a.body().unwrap();
        if !body.dense {
            if !body.comps.contains(dim as u32) {
                return true;
            }
            // Tracked but possibly stale: look for a live entry.
            let ms = body.comps.component_of(dim as u32);
            let live = ms.iter().any(|&w| block_slots(dim, w as usize).any(|(i, j)| body.mat.get(i, j) != INF));
            return !live;
        }

        let n = body.mat.dim();
        for w in 0..n {
            if block_slots(dim, w).any(|(i, j)| body.mat.get(i, j) != INF) {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use octava_core::lincons::LinCons;
    use octava_core::linexpr::LinExpr;

    use crate::OctManager;

    fn diff_leq(hi: u32, lo: u32, c: f64) -> LinCons {
        LinCons::leq(LinExpr::constant(-c).with_term(hi, 1.0).with_term(lo, -1.0))
    }

    fn upper(dim: u32, c: f64) -> LinCons {
        LinCons::leq(LinExpr::constant(-c).with_term(dim, 1.0))
    }

    #[test]
    fn verify_add_remove_round_trip() {
        let mut man = OctManager::new();

        let mut a = man.top(2);
        man.meet_lincons_array(&mut a, &[diff_leq(0, 1, 3.0), upper(0, 5.0)]);

        // Insert a fresh dimension in the middle; old x1 becomes x2.
        let mut wide = man.add_dimensions(&a, &[1]);
        assert_eq!(wide.dim(), 3);
        assert!(man.is_dimension_unconstrained(&mut wide, 1));
        assert!(man.sat_lincons(&mut wide, &diff_leq(0, 2, 3.0)));

        let mut back = man.remove_dimensions(&mut wide, &[1]);
        let mut orig = a.clone();
        assert!(man.is_equal(&mut back, &mut orig));
    }

    #[test]
    fn verify_permute() {
        let mut man = OctManager::new();

        let mut a = man.top(3);
        man.meet_lincons_array(&mut a, &[diff_leq(0, 2, 1.0)]);

        // Swap x0 and x2.
        let mut p = man.permute_dimensions(&a, &[2, 1, 0]);
        assert!(man.sat_lincons(&mut p, &diff_leq(2, 0, 1.0)));
        assert!(!man.sat_lincons(&mut p, &diff_leq(0, 2, 1.0)));

        let mut round = man.permute_dimensions(&p, &[2, 1, 0]);
        assert!(man.is_equal(&mut round, &mut a));
    }

    #[test]
    fn verify_expand_copies_relations() {
        let mut man = OctManager::new();

        let mut a = man.top(2);
        man.meet_lincons_array(&mut a, &[diff_leq(0, 1, 2.0), upper(0, 4.0)]);

        let mut e = man.expand_dimension(&a, 0, 1);
        assert_eq!(e.dim(), 3);
        // The copy carries x0's relation to x1 and x0's upper bound.
        assert!(man.sat_lincons(&mut e, &diff_leq(2, 1, 2.0)));
        assert!(man.sat_lincons(&mut e, &upper(2, 4.0)));
    }

    #[test]
    fn verify_fold_joins_members() {
        let mut man = OctManager::new();

        // x0 in [0, 1], x2 in [3, 4]; folding {0, 2} hulls the two ranges.
        let mut a = man.top(3);
        man.meet_lincons_array(
            &mut a,
            &[
                upper(0, 1.0),
                LinCons::leq(LinExpr::constant(0.0).with_term(0, -1.0)),
                upper(2, 4.0),
                LinCons::leq(LinExpr::constant(3.0).with_term(2, -1.0)),
            ],
        );

        let mut f = man.fold_dimensions(&mut a, &[0, 2]);
        assert_eq!(f.dim(), 2);
        let itv = man.bound_dimension(&mut f, 0);
        assert_eq!(itv.lo, 0.0);
        assert_eq!(itv.up, 4.0);
    }

    #[test]
    fn verify_forget() {
        let mut man = OctManager::new();

        let mut a = man.top(2);
        man.meet_lincons_array(&mut a, &[diff_leq(0, 1, 2.0), upper(0, 4.0)]);

        man.forget_array(&mut a, &[0], false);
        assert!(man.is_dimension_unconstrained(&mut a, 0));
        assert!(!man.sat_lincons(&mut a, &upper(0, 4.0)));

        // Projection pins the dimension to zero instead.
        let mut b = man.top(1);
        man.meet_lincons_array(&mut b, &[upper(0, -5.0)]);
        man.forget_array(&mut b, &[0], true);
        let itv = man.bound_dimension(&mut b, 0);
        assert_eq!((itv.lo, itv.up), (0.0, 0.0));
    }
}
