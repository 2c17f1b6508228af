// Octava
// Copyright (c) 2025 The Project Octava Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `lattice` module implements order, meet, join, widening, and narrowing on octagons.
//!
//! Comparisons require closed operands to be exact, so they canonicalize lazily first. Meet is
//! an element-wise minimum whose closure is deferred; join is an element-wise maximum of closed
//! operands and stays closed. In decomposed form, meet works on the merged partition (touched
//! components materialize per the sparsification policy) while join works on the partition
//! refinement: a pair of variables stays related only if both operands relate it.

use hashbrown::hash_map::Entry;
use hashbrown::HashMap;

use octava_core::flags::Flags;

use crate::comps::{handle_binary_relation, handle_unary_relation, merge_partitions, MemberVec};
use crate::hmat::{block_slots, INF};
use crate::oct::{Body, Oct};
use crate::OctManager;

/// True iff the body carries no constraint at all.
fn body_is_top(body: &Body) -> bool {
    let n2 = body.mat.nodes();
    for i in 0..n2 {
        for j in 0..=(i | 1) {
            if i == j {
                if body.mat.get(i, i) != 0.0 {
                    return false;
                }
            }
            else if body.bound(i, j) != INF {
                return false;
            }
        }
    }
    true
}

impl OctManager {
    pub fn is_bottom(&mut self, a: &mut Oct) -> bool {
        self.begin();
        if !self.ensure_closed(a) {
            return true;
        }
        if !a.is_closed_state() {
            self.raise(Flags::INCOMPLETE);
        }
        false
    }

    pub fn is_top(&mut self, a: &mut Oct) -> bool {
        self.begin();
        if !self.ensure_closed(a) {
            return false;
        }
        if !a.is_closed_state() {
            self.raise(Flags::INCOMPLETE);
        }
        body_is_top(a.body().unwrap())
    }

    /// Inclusion test: `γ(a) ⊆ γ(b)`.
    pub fn is_leq(&mut self, a: &mut Oct, b: &mut Oct) -> bool {
        self.begin();
        assert_eq!(a.dim(), b.dim(), "inclusion requires equal dimensions");

        // Only the left operand must be closed.
        if !self.ensure_closed(a) {
            return true;
        }
        if b.is_bottom_state() {
            return false;
        }
        if !a.is_closed_state() {
            self.raise(Flags::INCOMPLETE);
        }

        let ab = a.body().unwrap();
        let bb = b.body().unwrap();
        let n2 = ab.mat.nodes();
        for i in 0..n2 {
            for j in 0..=(i | 1) {
                if i == j {
                    continue;
                }
                let be = bb.bound(i, j);
                if be != INF && !(ab.bound(i, j) <= be) {
                    return false;
                }
            }
        }
        true
    }

    /// Semantic equality of the two octagons.
    pub fn is_equal(&mut self, a: &mut Oct, b: &mut Oct) -> bool {
        self.begin();
        assert_eq!(a.dim(), b.dim(), "equality requires equal dimensions");

        let anon = self.ensure_closed(a);
        let bnon = self.ensure_closed(b);
        if !anon || !bnon {
            return anon == bnon;
        }
        if !a.is_closed_state() || !b.is_closed_state() {
            self.raise(Flags::INCOMPLETE);
        }

        let ab = a.body().unwrap();
        let bb = b.body().unwrap();
        let n2 = ab.mat.nodes();
        for i in 0..n2 {
            for j in 0..=(i | 1) {
                if i != j && ab.bound(i, j) != bb.bound(i, j) {
                    return false;
                }
            }
        }
        true
    }

    /// Greatest lower bound: element-wise minimum. The result is left open; closure is deferred
    /// to whoever needs the canonical form.
    pub fn meet(&mut self, a: &Oct, b: &Oct) -> Oct {
        self.begin();
        assert_eq!(a.dim(), b.dim(), "meet requires equal dimensions");
        let dim = a.dim();

        let (Some(ab), Some(bb)) = (a.body(), b.body()) else {
            return Oct::bottom(dim);
        };

        if ab.dense && bb.dense {
            let mut body = ab.clone();
            let n2 = body.mat.nodes();
            for i in 0..n2 {
                for j in 0..=(i | 1) {
                    body.mat.min_set(i, j, bb.mat.get(i, j));
                }
            }
            return Oct::from_body(dim, body, false);
        }

        let mut body = ab.clone();
        body.to_decomposed();

        // Union in the components touched by the right operand, materializing the cross
        // relations, then lower the explicit entries.
        let bparts = bb.partition();
        for root in bparts.roots() {
            let ms: MemberVec = bparts.members(root).collect();
            if ms.len() == 1 {
                handle_unary_relation(&mut body.mat, &mut body.comps, ms[0] as usize);
            }
            for w in ms.windows(2) {
                let (u, v) = (w[0] as usize, w[1] as usize);
                handle_binary_relation(&mut body.mat, &mut body.comps, u, v);
            }
            for (ui, &u) in ms.iter().enumerate() {
                for &v in &ms[ui..] {
                    for (i, j) in block_slots(u as usize, v as usize) {
                        body.mat.min_set(i, j, bb.bound(i, j));
                    }
                }
            }
        }

        Oct::from_body(dim, body, false)
    }

    /// Least upper bound: element-wise maximum of closed operands. The result of joining two
    /// closed octagons is itself closed.
    pub fn join(&mut self, a: &mut Oct, b: &mut Oct) -> Oct {
        self.begin();
        assert_eq!(a.dim(), b.dim(), "join requires equal dimensions");
        let dim = a.dim();

        if !self.ensure_closed(a) {
            self.ensure_closed(b);
            return b.clone();
        }
        if !self.ensure_closed(b) {
            return a.clone();
        }

        self.raise(Flags::INEXACT);
        let closed = a.is_closed_state() && b.is_closed_state();
        if !closed {
            self.raise(Flags::INCOMPLETE);
        }

        let ab = a.body().unwrap();
        let bb = b.body().unwrap();

        if ab.dense && bb.dense {
            let mut body = ab.clone();
            let n2 = body.mat.nodes();
            for i in 0..n2 {
                for j in 0..=(i | 1) {
                    if i == j {
                        continue;
                    }
                    let m = ab.mat.get(i, j).max(bb.mat.get(i, j));
                    body.mat.set(i, j, m);
                }
            }
            return Oct::from_body(dim, body, closed);
        }

        // Refine the two partitions: a variable pair stays related only if related on both
        // sides; everything else becomes implicitly unconstrained.
        let pa = ab.partition();
        let pb = bb.partition();
        let mut body = Body::top(dim);
        let mut reps: HashMap<(u32, u32), u32> = HashMap::new();
        for v in 0..dim as u32 {
            if let (Some(ra), Some(rb)) = (pa.find(v), pb.find(v)) {
                body.comps.insert(v);
                match reps.entry((ra, rb)) {
                    Entry::Occupied(rep) => {
                        body.comps.union(*rep.get(), v);
                    }
                    Entry::Vacant(slot) => {
                        slot.insert(v);
                    }
                }
            }
        }

        let roots: MemberVec = body.comps.roots().collect();
        for root in roots {
            let ms: MemberVec = body.comps.members(root).collect();
            for (ui, &u) in ms.iter().enumerate() {
                for &v in &ms[ui..] {
                    for (i, j) in block_slots(u as usize, v as usize) {
                        let m = ab.bound(i, j).max(bb.bound(i, j));
                        if m != INF {
                            body.mat.set(i, j, m);
                        }
                    }
                }
            }
        }

        Oct::from_body(dim, body, closed)
    }

    /// Pairwise widening: keep the stable bounds of the previous iterate `a`, drop the rest to
    /// `+∞`. The left operand is deliberately taken as-is; re-closing widening iterates defeats
    /// termination.
    pub fn widening(&mut self, a: &Oct, b: &mut Oct) -> Oct {
        self.widen_impl(a, b, None)
    }

    /// Widening where an escaping bound lands on the smallest threshold above the right-hand
    /// bound instead of `+∞`. `thresholds` must be ascending.
    pub fn widening_thresholds(&mut self, a: &Oct, b: &mut Oct, thresholds: &[f64]) -> Oct {
        self.widen_impl(a, b, Some(thresholds))
    }

    fn widen_impl(&mut self, a: &Oct, b: &mut Oct, thresholds: Option<&[f64]>) -> Oct {
        self.begin();
        assert_eq!(a.dim(), b.dim(), "widening requires equal dimensions");
        let dim = a.dim();

        if !self.ensure_closed(b) {
            return a.clone();
        }
        let Some(ab) = a.body() else {
            return b.clone();
        };
        let bb = b.body().unwrap();
        self.raise(Flags::INEXACT);

        let widen = |ae: f64, be: f64| -> f64 {
            if ae >= be {
                ae
            }
            else if let Some(ts) = thresholds {
                // The smallest threshold that still covers the unstable bound.
                match ts.iter().find(|&&t| t >= be) {
                    Some(&t) => t,
                    None => INF,
                }
            }
            else {
                INF
            }
        };

        if ab.dense || bb.dense {
            let mut body = ab.clone();
            body.to_dense();
            let n2 = body.mat.nodes();
            for i in 0..n2 {
                for j in 0..=(i | 1) {
                    if i == j {
                        continue;
                    }
                    body.mat.set(i, j, widen(ab.bound(i, j), bb.bound(i, j)));
                }
            }
            return Oct::from_body(dim, body, false);
        }

        // Stable entries live inside a's blocks; thresholded entries may appear anywhere the
        // right operand is explicit, so work over the merged partition.
        let merged = merge_partitions(&ab.comps, &bb.comps);
        let mut body = Body::top(dim);
        body.comps = merged;
        let roots: MemberVec = body.comps.roots().collect();
        for root in roots {
            let ms: MemberVec = body.comps.members(root).collect();
            for (ui, &u) in ms.iter().enumerate() {
                for &v in &ms[ui..] {
                    for (i, j) in block_slots(u as usize, v as usize) {
                        let w = widen(ab.bound(i, j), bb.bound(i, j));
                        if w != INF {
                            body.mat.set(i, j, w);
                        }
                    }
                }
            }
        }

        Oct::from_body(dim, body, false)
    }

    /// Pairwise narrowing: refine only the bounds the previous iterate lost to `+∞`.
    pub fn narrowing(&mut self, a: &Oct, b: &Oct) -> Oct {
        self.begin();
        assert_eq!(a.dim(), b.dim(), "narrowing requires equal dimensions");
        let dim = a.dim();

        let (Some(ab), Some(bb)) = (a.body(), b.body()) else {
            return Oct::bottom(dim);
        };
        self.raise(Flags::INEXACT);

        if ab.dense || bb.dense {
            let mut body = ab.clone();
            body.to_dense();
            let n2 = body.mat.nodes();
            for i in 0..n2 {
                for j in 0..=(i | 1) {
                    if i == j {
                        continue;
                    }
                    let ae = ab.bound(i, j);
                    body.mat.set(i, j, if ae == INF { bb.bound(i, j) } else { ae });
                }
            }
            return Oct::from_body(dim, body, false);
        }

        let merged = merge_partitions(&ab.comps, &bb.comps);
        let mut body = Body::top(dim);
        body.comps = merged;
        let roots: MemberVec = body.comps.roots().collect();
        for root in roots {
            let ms: MemberVec = body.comps.members(root).collect();
            for (ui, &u) in ms.iter().enumerate() {
                for &v in &ms[ui..] {
                    for (i, j) in block_slots(u as usize, v as usize) {
                        let ae = ab.bound(i, j);
                        let ne = if ae == INF { bb.bound(i, j) } else { ae };
                        if ne != INF {
                            body.mat.set(i, j, ne);
                        }
                    }
                }
            }
        }

        Oct::from_body(dim, body, false)
    }
}

#[cfg(test)]
mod tests {
    use octava_core::lincons::LinCons;
    use octava_core::linexpr::LinExpr;

    use crate::OctManager;

    // x_dim <= c as a constraint.
    fn upper(dim: u32, c: f64) -> LinCons {
        LinCons::leq(LinExpr::constant(-c).with_term(dim, 1.0))
    }

    // x_dim >= c as a constraint.
    fn lower(dim: u32, c: f64) -> LinCons {
        LinCons::leq(LinExpr::constant(c).with_term(dim, -1.0))
    }

    #[test]
    fn verify_order_basics() {
        let mut man = OctManager::new();

        let mut top = man.top(2);
        let mut bot = man.bottom(2);
        let mut a = man.top(2);
        man.meet_lincons_array(&mut a, &[upper(0, 5.0), lower(0, 1.0)]);

        assert!(man.is_leq(&mut bot, &mut a));
        assert!(man.is_leq(&mut a, &mut top));
        assert!(!man.is_leq(&mut top, &mut a));
        assert!(man.is_top(&mut top));
        assert!(!man.is_top(&mut a));
        assert!(man.is_bottom(&mut bot));
        assert!(!man.is_bottom(&mut a));
    }

    #[test]
    fn verify_meet_join_interval() {
        let mut man = OctManager::new();

        let mut a = man.top(1);
        man.meet_lincons_array(&mut a, &[upper(0, 0.0), lower(0, 0.0)]);
        let mut b = man.top(1);
        man.meet_lincons_array(&mut b, &[upper(0, 2.0), lower(0, 2.0)]);

        // Join of the points 0 and 2 is the interval [0, 2].
        let mut j = man.join(&mut a, &mut b);
        assert_eq!(man.bound_dimension(&mut j, 0).lo, 0.0);
        assert_eq!(man.bound_dimension(&mut j, 0).up, 2.0);

        // Meet of disjoint points is empty.
        let mut m = man.meet(&a, &b);
        assert!(man.is_bottom(&mut m));
    }

    #[test]
    fn verify_join_refines_components() {
        let mut man = OctManager::new();

        // a relates x0 with x1; b leaves x1 unconstrained.
        let mut a = man.top(3);
        man.meet_lincons_array(
            &mut a,
            &[LinCons::leq(LinExpr::constant(-1.0).with_term(0, 1.0).with_term(1, -1.0))],
        );
        let mut b = man.top(3);
        man.meet_lincons_array(&mut b, &[upper(0, 9.0)]);

        let mut j = man.join(&mut a, &mut b);
        assert!(man.is_dimension_unconstrained(&mut j, 1));
        assert!(man.is_dimension_unconstrained(&mut j, 2));
    }

    #[test]
    fn verify_widening_escapes_unstable_bounds() {
        let mut man = OctManager::new();

        let mut a = man.top(1);
        man.meet_lincons_array(&mut a, &[upper(0, 1.0), lower(0, 0.0)]);
        let mut b = man.top(1);
        man.meet_lincons_array(&mut b, &[upper(0, 2.0), lower(0, 0.0)]);

        man.ensure_closed(&mut a);
        let mut w = man.widening(&a, &mut b);
        let itv = man.bound_dimension(&mut w, 0);
        assert_eq!(itv.lo, 0.0);
        assert_eq!(itv.up, f64::INFINITY);

        // With thresholds, the bound lands on the next threshold instead.
        let mut wt = man.widening_thresholds(&a, &mut b, &[4.0, 16.0]);
        let itv = man.bound_dimension(&mut wt, 0);
        assert_eq!(itv.up, 2.0);
    }

    #[test]
    fn verify_narrowing_restores_lost_bounds() {
        let mut man = OctManager::new();

        // a has only a lower bound; b also has an upper bound.
        let mut a = man.top(1);
        man.meet_lincons_array(&mut a, &[lower(0, 0.0)]);
        let mut b = man.top(1);
        man.meet_lincons_array(&mut b, &[upper(0, 7.0), lower(0, 0.0)]);

        let mut n = man.narrowing(&a, &b);
        let itv = man.bound_dimension(&mut n, 0);
        assert_eq!(itv.lo, 0.0);
        assert_eq!(itv.up, 7.0);
    }

    #[test]
    fn verify_lattice_laws_small() {
        let mut man = OctManager::new();

        let mut a = man.top(2);
        man.meet_lincons_array(&mut a, &[upper(0, 4.0), lower(1, -1.0)]);
        let mut b = man.top(2);
        man.meet_lincons_array(
            &mut b,
            &[LinCons::leq(LinExpr::constant(0.0).with_term(0, 1.0).with_term(1, -1.0))],
        );

        let mut ab = man.join(&mut a, &mut b);
        let mut ba = man.join(&mut b, &mut a);
        assert!(man.is_equal(&mut ab, &mut ba));

        let mut m = man.meet(&a, &b);
        assert!(man.is_leq(&mut m, &mut a));
        assert!(man.is_leq(&mut a, &mut ab));

        // Join is idempotent on closed values.
        let mut aa = man.join(&mut a.clone(), &mut a);
        assert!(man.is_equal(&mut aa, &mut a));
    }
}
