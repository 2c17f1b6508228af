// Octava
// Copyright (c) 2025 The Project Octava Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `transfer` module interprets linear expressions and constraints over octagons.
//!
//! A linear expression maps exactly onto the matrix only when it is a constant, a single `±x`,
//! or a `±x ± y` combination; everything else falls back to interval evaluation with a precision
//! loss reported through the flags. Constraint assumption lowers matrix entries and, when the
//! input was closed, restores closure incrementally on the affected component. Assignment
//! special-cases the invertible translation `x := ±x + [l, u]`, which shifts the variable's
//! entries in place; substitution is its dual, realized for the non-invertible shapes as a meet
//! with the equality followed by a forget.

use log::debug;
use smallvec::SmallVec;

use octava_core::flags::Flags;
use octava_core::interval::{add_lo, add_up, Interval};
use octava_core::lincons::{ConsOp, LinCons};
use octava_core::linexpr::LinExpr;

use crate::closure::{close_affected, half, incr_close};
use crate::comps::{handle_binary_relation, handle_unary_relation, MemberVec};
use crate::dims::forget_one;
use crate::hmat::INF;
use crate::oct::{Body, Oct};
use crate::OctManager;

#[derive(Clone, Copy, Debug, PartialEq)]
enum ExprKind {
    /// The constant interval is empty.
    Empty,
    /// No variable terms.
    Zero,
    /// Exactly one variable, coefficient ±1.
    Unary,
    /// Exactly two variables, coefficients ±1.
    Binary,
    /// Anything else; handled through intervals.
    Other,
}

/// A linear expression in octagonal normal form: `±x_i [± x_j] + [lo, up]`.
#[derive(Clone, Copy, Debug)]
struct OctExpr {
    kind: ExprKind,
    i: usize,
    pos_i: bool,
    j: usize,
    pos_j: bool,
    lo: f64,
    up: f64,
}

fn classify(expr: &LinExpr, dim: usize) -> OctExpr {
    let cst = expr.constant_part();
    let mut oe = OctExpr {
        kind: ExprKind::Zero,
        i: 0,
        pos_i: true,
        j: 0,
        pos_j: true,
        lo: cst.lo,
        up: cst.up,
    };

    if cst.is_empty() {
        oe.kind = ExprKind::Empty;
        return oe;
    }

    let terms = expr.terms();
    if terms.len() > 2 {
        oe.kind = ExprKind::Other;
        return oe;
    }
    for t in terms {
        if t.dim as usize >= dim {
            oe.kind = ExprKind::Other;
            return oe;
        }
        let pos = if t.coef == 1.0 {
            true
        }
        else if t.coef == -1.0 {
            false
        }
        else {
            oe.kind = ExprKind::Other;
            return oe;
        };

        match oe.kind {
            ExprKind::Zero => {
                oe.kind = ExprKind::Unary;
                oe.i = t.dim as usize;
                oe.pos_i = pos;
            }
            ExprKind::Unary => {
                oe.kind = ExprKind::Binary;
                oe.j = t.dim as usize;
                oe.pos_j = pos;
            }
            _ => unreachable!(),
        }
    }
    oe
}

/// Lower the matrix entry encoding `t <= b` (or `-t <= b` when `negate`), where `t` is the
/// variable part of `oe`, materializing the touched blocks in decomposed form.
fn meet_atom(body: &mut Body, oe: &OctExpr, negate: bool, b: f64) {
    match oe.kind {
        ExprKind::Unary => {
            if !body.dense {
                handle_unary_relation(&mut body.mat, &mut body.comps, oe.i);
            }
            // ±x <= b is v(p) - v(p^1) <= 2b for the node p carrying the sign.
            let p = if oe.pos_i != negate { 2 * oe.i } else { 2 * oe.i + 1 };
            body.mat.min_set(p ^ 1, p, 2.0 * b);
        }
        ExprKind::Binary => {
            if !body.dense {
                handle_binary_relation(&mut body.mat, &mut body.comps, oe.i, oe.j);
            }
            // t = v(p) - v(q): the bound lands at m[q][p].
            let p = if oe.pos_i != negate { 2 * oe.i } else { 2 * oe.i + 1 };
            let q = if oe.pos_j != negate { 2 * oe.j + 1 } else { 2 * oe.j };
            body.mat.min_set(q, p, b);
        }
        _ => unreachable!(),
    }
}

/// The supremum of the variable part of `oe` (or of its negation) over the octagon.
fn sup_of(body: &Body, oe: &OctExpr, negate: bool, int: bool) -> f64 {
    match oe.kind {
        ExprKind::Unary => {
            let p = if oe.pos_i != negate { 2 * oe.i } else { 2 * oe.i + 1 };
            half(body.bound(p ^ 1, p), int)
        }
        ExprKind::Binary => {
            let p = if oe.pos_i != negate { 2 * oe.i } else { 2 * oe.i + 1 };
            let q = if oe.pos_j != negate { 2 * oe.j + 1 } else { 2 * oe.j };
            let b = body.bound(q, p);
            if int && b != INF {
                b.floor()
            }
            else {
                b
            }
        }
        _ => unreachable!(),
    }
}

/// Per-dimension bounds read off the unary entries. Sound on unclosed matrices, tight on closed
/// ones.
fn box_of(body: &Body, int: bool) -> Vec<Interval> {
    let dim = body.mat.dim();
    (0..dim)
        .map(|v| {
            let up = half(body.bound(2 * v + 1, 2 * v), int);
            let lo = -half(body.bound(2 * v, 2 * v + 1), int);
            Interval::new(lo, up)
        })
        .collect()
}

impl OctManager {
    /// Floor a finite fractional bound in integer mode.
    fn int_bound(&mut self, b: f64) -> f64 {
        if self.is_int() && b.is_finite() && b.fract() != 0.0 {
            self.raise(Flags::CONV);
            b.floor()
        }
        else {
            b
        }
    }

    /// Tighten `t < b` into a non-strict bound. Exact on integers, over-approximate on reals.
    fn strict_bound(&mut self, b: f64) -> f64 {
        if b == INF {
            return INF;
        }
        if self.is_int() {
            if b.fract() == 0.0 {
                b - 1.0
            }
            else {
                b.floor()
            }
        }
        else {
            self.raise(Flags::INEXACT);
            b
        }
    }

    /// Intersect `a` with an array of constraints.
    ///
    /// `=` lands as two inequalities; `!=` and modulo constraints are not representable and are
    /// skipped. When `a` was closed and every constraint was representable, closure is restored
    /// incrementally on the affected components.
    pub fn meet_lincons_array(&mut self, a: &mut Oct, cons: &[LinCons]) {
        self.begin();
        if a.is_bottom_state() {
            return;
        }
        let dim = a.dim();
        let was_closed = a.is_closed_state();
        a.make_open();

        let mut touched: SmallVec<[u32; 4]> = SmallVec::new();
        let mut respect_closure = true;
        let mut empty = false;

        let body = a.body_mut().unwrap();
        for c in cons {
            let oe = classify(&c.expr, dim);
            match (oe.kind, c.op) {
                (ExprKind::Empty, _) => {
                    empty = true;
                    break;
                }
                (_, ConsOp::Neq) | (_, ConsOp::EqMod(_)) => {
                    debug!("skipping unrepresentable constraint: {}", c);
                    self.raise(Flags::INEXACT);
                    respect_closure = false;
                }
                (ExprKind::Zero, op) => {
                    let holds = match op {
                        ConsOp::Leq => oe.lo <= 0.0,
                        ConsOp::Lt => oe.lo < 0.0,
                        ConsOp::Eq => oe.lo <= 0.0 && 0.0 <= oe.up,
                        _ => unreachable!(),
                    };
                    if !holds {
                        empty = true;
                        break;
                    }
                }
                (ExprKind::Unary | ExprKind::Binary, op) => {
                    let mut b = -oe.lo;
                    if op == ConsOp::Lt {
                        b = self.strict_bound(b);
                    }
                    b = self.int_bound(b);
                    if b == f64::NEG_INFINITY {
                        empty = true;
                        break;
                    }
                    if b != INF {
                        meet_atom(body, &oe, false, b);
                    }
                    if op == ConsOp::Eq {
                        let b = self.int_bound(oe.up);
                        if b == f64::NEG_INFINITY {
                            empty = true;
                            break;
                        }
                        if b != INF {
                            meet_atom(body, &oe, true, b);
                        }
                    }

                    touched.push(oe.i as u32);
                    if oe.kind == ExprKind::Binary {
                        touched.push(oe.j as u32);
                    }
                }
                (ExprKind::Other, _) => {
                    // Strict comparisons fall back to their non-strict interval bound.
                    self.raise(Flags::INEXACT);
                    self.fallback_meet(body, c, &oe, &mut touched);
                }
            }
        }

        if empty {
            a.set_bottom();
            return;
        }

        if was_closed && respect_closure {
            if self.no_closure {
                self.raise(Flags::ALGO);
                return;
            }
            let int = self.is_int();
            let body = a.body_mut().unwrap();
            let ok = if body.dense {
                let all: Vec<u32> = (0..dim as u32).collect();
                incr_close(&mut body.mat, &all, &touched, int)
            }
            else {
                let Body { mat, comps, .. } = body;
                close_affected(mat, comps, &touched, int)
            };
            if ok {
                a.make_closed();
            }
            else {
                a.set_bottom();
            }
        }
    }

    /// Interval-linearize an `Other` constraint: bound each variable in turn by the range of the
    /// remaining terms.
    fn fallback_meet(
        &mut self,
        body: &mut Body,
        cons: &LinCons,
        oe: &OctExpr,
        touched: &mut SmallVec<[u32; 4]>,
    ) {
        let int = self.is_int();
        let bx = box_of(body, int);
        let terms: Vec<_> = cons.expr.terms().to_vec();

        // Directions: e <= 0 always; -e <= 0 additionally for equalities.
        let directions: &[bool] = match cons.op {
            ConsOp::Eq => &[false, true],
            _ => &[false],
        };

        for &neg in directions {
            for (k, tk) in terms.iter().enumerate() {
                // Range of the remaining terms.
                let mut rest = Interval::point(0.0);
                for (m, tm) in terms.iter().enumerate() {
                    if m != k {
                        let itv = bx.get(tm.dim as usize).copied().unwrap_or(Interval::TOP);
                        rest = rest.add(&itv.scale(tm.coef));
                    }
                }

                // e <= 0 confines coef · x_k below -lo - rest; the negated direction mirrors it.
                let bound = if neg {
                    add_up(oe.up, rest.up)
                }
                else {
                    add_up(-oe.lo, -rest.lo)
                };
                if !bound.is_finite() {
                    // An unbounded rest cannot constrain; a degenerate -inf is soundly dropped.
                    continue;
                }

                let coef = if neg { -tk.coef } else { tk.coef };
                let ub = self.int_bound(bound / coef.abs());
                let unary = OctExpr {
                    kind: ExprKind::Unary,
                    i: tk.dim as usize,
                    pos_i: coef > 0.0,
                    j: 0,
                    pos_j: true,
                    lo: 0.0,
                    up: 0.0,
                };
                meet_atom(body, &unary, false, ub);
                touched.push(tk.dim as u32);
            }
        }
    }

    /// The forward image of `x_v := expr`.
    pub fn assign_linexpr(&mut self, a: &mut Oct, v: usize, expr: &LinExpr) {
        self.begin();
        if a.is_bottom_state() {
            return;
        }
        let dim = a.dim();
        assert!(v < dim, "assigned dimension out of range");

        let oe = classify(expr, dim);
        match oe.kind {
            ExprKind::Empty => a.set_bottom(),
            ExprKind::Unary if oe.i == v => self.translate(a, v, oe.pos_i, oe.lo, oe.up),
            ExprKind::Zero | ExprKind::Unary => {
                if !self.ensure_closed(a) {
                    return;
                }
                let was_closed = a.is_closed_state();
                a.make_open();

                let body = a.body_mut().unwrap();
                forget_one(body, v, false);

                match oe.kind {
                    ExprKind::Zero => {
                        // x_v lands in [lo, up].
                        let vi = OctExpr { kind: ExprKind::Unary, i: v, pos_i: true, ..oe };
                        let up = self.int_bound(oe.up);
                        if up != INF {
                            meet_atom(body, &vi, false, up);
                        }
                        let lo = self.int_bound(-oe.lo);
                        if lo != INF {
                            meet_atom(body, &vi, true, lo);
                        }
                    }
                    ExprKind::Unary => {
                        // x_v - (±x_i) lands in [lo, up]: two octagonal constraints.
                        let rel = OctExpr {
                            kind: ExprKind::Binary,
                            i: v,
                            pos_i: true,
                            j: oe.i,
                            pos_j: !oe.pos_i,
                            lo: 0.0,
                            up: 0.0,
                        };
                        let up = self.int_bound(oe.up);
                        if up != INF {
                            meet_atom(body, &rel, false, up);
                        }
                        let lo = self.int_bound(-oe.lo);
                        if lo != INF {
                            meet_atom(body, &rel, true, lo);
                        }
                    }
                    _ => unreachable!(),
                }

                if oe.kind == ExprKind::Unary {
                    self.reclose_after(a, was_closed, &[v as u32, oe.i as u32]);
                }
                else {
                    self.reclose_after(a, was_closed, &[v as u32]);
                }
            }
            ExprKind::Binary | ExprKind::Other => {
                // Not invertible in the octagon: evaluate, forget, and bound.
                self.raise(Flags::INEXACT);
                if !self.ensure_closed(a) {
                    return;
                }
                let was_closed = a.is_closed_state();
                a.make_open();

                let int = self.is_int();
                let itv = expr.eval(&box_of(a.body().unwrap(), int));
                if itv.is_empty() {
                    a.set_bottom();
                    return;
                }

                let body = a.body_mut().unwrap();
                forget_one(body, v, false);
                let vi = OctExpr { kind: ExprKind::Unary, i: v, pos_i: true, ..oe };
                let up = self.int_bound(itv.up);
                if up != INF {
                    meet_atom(body, &vi, false, up);
                }
                let lo = self.int_bound(-itv.lo);
                if lo != INF {
                    meet_atom(body, &vi, true, lo);
                }

                self.reclose_after(a, was_closed, &[v as u32]);
            }
        }
    }

    /// The backward image of `x_v := expr`.
    pub fn substitute_linexpr(&mut self, a: &mut Oct, v: usize, expr: &LinExpr) {
        self.begin();
        if a.is_bottom_state() {
            return;
        }
        let dim = a.dim();
        assert!(v < dim, "substituted dimension out of range");

        let oe = classify(expr, dim);
        match oe.kind {
            ExprKind::Empty => a.set_bottom(),
            ExprKind::Unary if oe.i == v => {
                if oe.pos_i {
                    // Inverse of a forward translation: shift by the negated interval.
                    self.translate(a, v, true, -oe.up, -oe.lo);
                }
                else {
                    // x := -x + [l, u] is its own inverse.
                    self.translate(a, v, false, oe.lo, oe.up);
                }
            }
            ExprKind::Zero | ExprKind::Unary => {
                // Meet with x_v = expr, propagate, then drop x_v.
                if !self.ensure_closed(a) {
                    return;
                }
                let was_closed = a.is_closed_state();
                a.make_open();

                let body = a.body_mut().unwrap();
                match oe.kind {
                    ExprKind::Zero => {
                        let vi = OctExpr { kind: ExprKind::Unary, i: v, pos_i: true, ..oe };
                        let up = self.int_bound(oe.up);
                        if up != INF {
                            meet_atom(body, &vi, false, up);
                        }
                        let lo = self.int_bound(-oe.lo);
                        if lo != INF {
                            meet_atom(body, &vi, true, lo);
                        }
                    }
                    ExprKind::Unary => {
                        let rel = OctExpr {
                            kind: ExprKind::Binary,
                            i: v,
                            pos_i: true,
                            j: oe.i,
                            pos_j: !oe.pos_i,
                            lo: 0.0,
                            up: 0.0,
                        };
                        let up = self.int_bound(oe.up);
                        if up != INF {
                            meet_atom(body, &rel, false, up);
                        }
                        let lo = self.int_bound(-oe.lo);
                        if lo != INF {
                            meet_atom(body, &rel, true, lo);
                        }
                    }
                    _ => unreachable!(),
                }

                let mut touched: SmallVec<[u32; 2]> = SmallVec::new();
                touched.push(v as u32);
                if oe.kind == ExprKind::Unary {
                    touched.push(oe.i as u32);
                }

                if was_closed && !self.no_closure {
                    let int = self.is_int();
                    let body = a.body_mut().unwrap();
                    let ok = if body.dense {
                        let all: Vec<u32> = (0..dim as u32).collect();
                        incr_close(&mut body.mat, &all, &touched, int)
                    }
                    else {
                        let Body { mat, comps, .. } = body;
                        close_affected(mat, comps, &touched, int)
                    };
                    if !ok {
                        a.set_bottom();
                        return;
                    }
                    forget_one(a.body_mut().unwrap(), v, false);
                    a.make_closed();
                }
                else {
                    if was_closed {
                        self.raise(Flags::ALGO);
                    }
                    self.raise(Flags::INEXACT);
                    forget_one(a.body_mut().unwrap(), v, false);
                }
            }
            ExprKind::Binary | ExprKind::Other => {
                // Sound fallback: any pre-state agrees with some post-state off x_v.
                self.raise(Flags::INEXACT);
                if !self.ensure_closed(a) {
                    return;
                }
                forget_one(a.body_mut().unwrap(), v, false);
            }
        }
    }

    /// Apply `x_v := ±x_v + [lo, up]` in place: a sign swap when negative, then a shift of every
    /// entry mentioning `x_v`.
    fn translate(&mut self, a: &mut Oct, v: usize, positive: bool, lo: f64, up: f64) {
        let was_closed = a.is_closed_state();
        let exact = lo == up;
        if !exact {
            self.raise(Flags::INEXACT);
        }

        let body = a.body_mut().unwrap();
        let dim = body.mat.dim();
        let partners: MemberVec = if body.dense {
            (0..dim as u32).filter(|&w| w as usize != v).collect()
        }
        else {
            body.comps.component_of(v as u32).into_iter().filter(|&w| w as usize != v).collect()
        };

        if !positive {
            // Exchange the +x and -x nodes of v.
            for &w in &partners {
                for s in 0..2 {
                    let j = 2 * w as usize + s;
                    let x = body.mat.get(2 * v, j);
                    let y = body.mat.get(2 * v + 1, j);
                    body.mat.set(2 * v, j, y);
                    body.mat.set(2 * v + 1, j, x);
                }
            }
            let x = body.mat.get(2 * v, 2 * v + 1);
            let y = body.mat.get(2 * v + 1, 2 * v);
            body.mat.set(2 * v, 2 * v + 1, y);
            body.mat.set(2 * v + 1, 2 * v, x);
        }

        // Shift: entries with +x_v as source lose lo, entries with -x_v as source gain up;
        // coherence keeps the target side in step.
        for &w in &partners {
            for s in 0..2 {
                let j = 2 * w as usize + s;
                let c = body.mat.get(2 * v, j);
                body.mat.set(2 * v, j, add_up(c, -lo));
                let c = body.mat.get(2 * v + 1, j);
                body.mat.set(2 * v + 1, j, add_up(c, up));
            }
        }
        let c = body.mat.get(2 * v, 2 * v + 1);
        body.mat.set(2 * v, 2 * v + 1, add_up(c, -2.0 * lo));
        let c = body.mat.get(2 * v + 1, 2 * v);
        body.mat.set(2 * v + 1, 2 * v, add_up(c, 2.0 * up));

        // An exact shift of a closed matrix is still closed.
        if !(was_closed && exact) {
            a.make_open();
        }
    }

    /// Restore closure of the components touching `vars` after a transfer, when the input was
    /// closed and the options allow.
    fn reclose_after(&mut self, a: &mut Oct, was_closed: bool, vars: &[u32]) {
        if !was_closed {
            return;
        }
        if self.no_closure {
            self.raise(Flags::ALGO);
            return;
        }
        let int = self.is_int();
        let dim = a.dim();
        let body = a.body_mut().unwrap();
        let ok = if body.dense {
            let all: Vec<u32> = (0..dim as u32).collect();
            incr_close(&mut body.mat, &all, vars, int)
        }
        else {
            let Body { mat, comps, .. } = body;
            close_affected(mat, comps, vars, int)
        };
        if ok {
            a.make_closed();
        }
        else {
            a.set_bottom();
        }
    }

    /// Returns true if every point of the octagon satisfies the constraint. A `false` with the
    /// `INCOMPLETE` flag set means the test could not be decided exactly.
    pub fn sat_lincons(&mut self, a: &mut Oct, cons: &LinCons) -> bool {
        self.begin();
        if !self.ensure_closed(a) {
            // Bottom satisfies everything.
            return true;
        }
        if !a.is_closed_state() {
            self.raise(Flags::INCOMPLETE);
        }

        let dim = a.dim();
        let int = self.is_int();
        let oe = classify(&cons.expr, dim);
        let body = a.body().unwrap();

        match oe.kind {
            ExprKind::Empty => false,
            ExprKind::Zero => match cons.op {
                ConsOp::Leq => oe.lo <= 0.0,
                ConsOp::Lt => oe.lo < 0.0,
                ConsOp::Eq => oe.lo <= 0.0 && 0.0 <= oe.up,
                ConsOp::Neq => !(oe.lo == 0.0 && oe.up == 0.0),
                ConsOp::EqMod(_) => {
                    self.raise(Flags::INCOMPLETE);
                    false
                }
            },
            ExprKind::Unary | ExprKind::Binary => {
                let sup = sup_of(body, &oe, false, int);
                let inf = -sup_of(body, &oe, true, int);
                match cons.op {
                    ConsOp::Leq => sup <= -oe.lo,
                    ConsOp::Lt => {
                        let b = -oe.lo;
                        if b == INF {
                            true
                        }
                        else if int {
                            sup <= self.strict_bound(b)
                        }
                        else {
                            sup < b
                        }
                    }
                    ConsOp::Eq => sup <= -oe.lo && inf >= -oe.up,
                    ConsOp::Neq => {
                        if oe.up > oe.lo {
                            // Some input value always dodges the forbidden point.
                            true
                        }
                        else if sup < -oe.lo || inf > -oe.lo {
                            true
                        }
                        else {
                            if int {
                                self.raise(Flags::INCOMPLETE);
                            }
                            false
                        }
                    }
                    ConsOp::EqMod(_) => {
                        self.raise(Flags::INCOMPLETE);
                        false
                    }
                }
            }
            ExprKind::Other => {
                let t = cons.expr.eval_terms(&box_of(body, int));
                match cons.op {
                    ConsOp::Leq => {
                        if add_up(t.up, oe.lo) <= 0.0 {
                            true
                        }
                        else {
                            if !(add_lo(t.lo, oe.lo) > 0.0) {
                                self.raise(Flags::INCOMPLETE);
                            }
                            false
                        }
                    }
                    ConsOp::Lt => {
                        if add_up(t.up, oe.lo) < 0.0 {
                            true
                        }
                        else {
                            if !(add_lo(t.lo, oe.lo) >= 0.0) {
                                self.raise(Flags::INCOMPLETE);
                            }
                            false
                        }
                    }
                    ConsOp::Eq => {
                        if add_up(t.up, oe.lo) <= 0.0 && add_lo(t.lo, oe.up) >= 0.0 {
                            true
                        }
                        else {
                            self.raise(Flags::INCOMPLETE);
                            false
                        }
                    }
                    ConsOp::Neq => {
                        if oe.up > oe.lo || add_up(t.up, oe.up) < 0.0 || add_lo(t.lo, oe.lo) > 0.0
                        {
                            true
                        }
                        else {
                            self.raise(Flags::INCOMPLETE);
                            false
                        }
                    }
                    ConsOp::EqMod(_) => {
                        self.raise(Flags::INCOMPLETE);
                        false
                    }
                }
            }
        }
    }

    /// Returns true if `x_dim` is confined to `itv` over the octagon.
    pub fn sat_interval(&mut self, a: &mut Oct, dim: usize, itv: &Interval) -> bool {
        self.begin();
        if dim >= a.dim() {
            return itv.is_top();
        }
        if !self.ensure_closed(a) {
            return true;
        }
        if !a.is_closed_state() {
            self.raise(Flags::INCOMPLETE);
        }
        let int = self.is_int();
        itv.contains(&dim_interval(a.body().unwrap(), dim, int))
    }

    /// The tightest interval containing `x_dim`; top when the dimension is out of range, empty
    /// on bottom.
    pub fn bound_dimension(&mut self, a: &mut Oct, dim: usize) -> Interval {
        self.begin();
        if dim >= a.dim() {
            return Interval::TOP;
        }
        if !self.ensure_closed(a) {
            return Interval::EMPTY;
        }
        if !a.is_closed_state() {
            self.raise(Flags::INEXACT);
        }
        dim_interval(a.body().unwrap(), dim, self.is_int())
    }

    /// The tightest interval containing `expr` over the octagon. Octagonal shapes read the
    /// matrix directly; others fall back to the box.
    pub fn bound_linexpr(&mut self, a: &mut Oct, expr: &LinExpr) -> Interval {
        self.begin();
        if !self.ensure_closed(a) {
            return Interval::EMPTY;
        }
        if !a.is_closed_state() {
            self.raise(Flags::INEXACT);
        }

        let int = self.is_int();
        let oe = classify(expr, a.dim());
        let body = a.body().unwrap();
        match oe.kind {
            ExprKind::Empty => Interval::EMPTY,
            ExprKind::Zero => Interval::new(oe.lo, oe.up),
            ExprKind::Unary | ExprKind::Binary => {
                let sup = sup_of(body, &oe, false, int);
                let inf = -sup_of(body, &oe, true, int);
                Interval::new(add_lo(inf, oe.lo), add_up(sup, oe.up))
            }
            ExprKind::Other => {
                self.raise(Flags::INEXACT);
                expr.eval(&box_of(body, int))
            }
        }
    }

    /// Per-dimension bounds of the octagon; every interval is empty on bottom.
    pub fn to_box(&mut self, a: &mut Oct) -> Vec<Interval> {
        self.begin();
        let dim = a.dim();
        if !self.ensure_closed(a) {
            return vec![Interval::EMPTY; dim];
        }
        if !a.is_closed_state() {
            self.raise(Flags::INEXACT);
        }
        let int = self.is_int();
        let body = a.body().unwrap();
        (0..dim).map(|v| dim_interval(body, v, int)).collect()
    }

    /// The octagon as an array of constraints, one per finite off-diagonal entry; coherent
    /// mirrors are emitted once. Bottom yields a single unsatisfiable constraint.
    pub fn to_lincons_array(&mut self, a: &mut Oct) -> Vec<LinCons> {
        self.begin();
        let Some(body) = a.body() else {
            return vec![LinCons::unsat()];
        };

        let mut out = Vec::new();
        let n2 = body.mat.nodes();
        for i in 0..n2 {
            for j in 0..=(i | 1) {
                if i == j {
                    continue;
                }
                let c = body.bound(i, j);
                if c == INF {
                    continue;
                }

                if j == (i ^ 1) {
                    let v = (i >> 1) as u32;
                    // Odd i: v(j) - v(i) = 2x_v <= c. Even i: -2x_v <= c.
                    let coef = if i & 1 == 1 { 1.0 } else { -1.0 };
                    out.push(LinCons::leq(
                        LinExpr::constant(-c / 2.0).with_term(v, coef),
                    ));
                }
                else {
                    let tgt = (j >> 1) as u32;
                    let tgt_coef = if j & 1 == 0 { 1.0 } else { -1.0 };
                    let src = (i >> 1) as u32;
                    let src_coef = if i & 1 == 0 { -1.0 } else { 1.0 };
                    out.push(LinCons::leq(
                        LinExpr::constant(-c).with_term(tgt, tgt_coef).with_term(src, src_coef),
                    ));
                }
            }
        }
        out
    }
}

/// Interval of `x_v` read off the closed matrix.
fn dim_interval(body: &Body, v: usize, int: bool) -> Interval {
    let up = half(body.bound(2 * v + 1, 2 * v), int);
    let lo = -half(body.bound(2 * v, 2 * v + 1), int);
    Interval::new(lo, up)
}
