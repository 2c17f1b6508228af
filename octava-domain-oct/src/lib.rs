// Octava
// Copyright (c) 2025 The Project Octava Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The octagon abstract domain: sets of points of `ℝⁿ` (or `ℤⁿ`) described by conjunctions of
//! constraints `±x_i ± x_j <= c`, stored as a difference-bound matrix over signed variable
//! indices with a decomposed-sparse option that confines the cubic closure work to connected
//! components of related variables.

#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]
// The following lints are allowed in all Octava crates. Please see the workspace manifest for
// their justification.
#![allow(clippy::comparison_chain)]
#![allow(clippy::identity_op)]
#![allow(clippy::manual_range_contains)]
#![allow(clippy::needless_range_loop)]

use octava_core::domain::NumericDomain;
use octava_core::flags::Flags;
use octava_core::interval::Interval;
use octava_core::lincons::LinCons;
use octava_core::linexpr::LinExpr;

mod closure;
mod comps;
mod dims;
mod hmat;
mod lattice;
mod oct;
mod print;
mod transfer;

pub use oct::Oct;

/// Manager for octagon values.
///
/// The manager owns the per-domain options (real or integer interpretation of the variables, and
/// whether closures may be skipped) and the ambient precision-flag record. Every public
/// operation clears the flags on entry; [`OctManager::flags`] reports what the most recent
/// operation accumulated.
///
/// Operations never fail: definite emptiness is the bottom value, out-of-range dimensions yield
/// neutral answers, and everything else is a sound over-approximation described by the flags.
#[derive(Debug)]
pub struct OctManager {
    int: bool,
    no_closure: bool,
    flags: Flags,
}

impl OctManager {
    /// Instantiate a manager for octagons over real-valued variables.
    pub fn new() -> OctManager {
        OctManager { int: false, no_closure: false, flags: Flags::empty() }
    }

    /// Instantiate a manager for octagons over integer-valued variables. Closure tightens halved
    /// bounds with a floor.
    pub fn new_int() -> OctManager {
        OctManager { int: true, no_closure: false, flags: Flags::empty() }
    }

    /// When set, operations never trigger strong closure; results stay sound but weaker, and the
    /// `ALGO` flag reports each skip.
    pub fn set_no_closure(&mut self, no_closure: bool) {
        self.no_closure = no_closure;
    }

    pub fn is_int(&self) -> bool {
        self.int
    }

    /// The precision flags of the most recent operation.
    pub fn flags(&self) -> Flags {
        self.flags
    }

    pub(crate) fn begin(&mut self) {
        self.flags = Flags::empty();
    }

    pub(crate) fn raise(&mut self, f: Flags) {
        self.flags |= f;
    }

    // Lifecycle.

    /// The octagon of all points over `dim` variables.
    pub fn top(&mut self, dim: usize) -> Oct {
        self.begin();
        Oct::top(dim)
    }

    /// The empty octagon over `dim` variables.
    pub fn bottom(&mut self, dim: usize) -> Oct {
        self.begin();
        Oct::bottom(dim)
    }
}

impl Default for OctManager {
    fn default() -> Self {
        OctManager::new()
    }
}

impl NumericDomain for OctManager {
    type Value = Oct;

    fn flags(&self) -> Flags {
        OctManager::flags(self)
    }

    fn top(&mut self, dim: usize) -> Oct {
        OctManager::top(self, dim)
    }

    fn bottom(&mut self, dim: usize) -> Oct {
        OctManager::bottom(self, dim)
    }

    fn is_top(&mut self, a: &mut Oct) -> bool {
        OctManager::is_top(self, a)
    }

    fn is_bottom(&mut self, a: &mut Oct) -> bool {
        OctManager::is_bottom(self, a)
    }

    fn is_equal(&mut self, a: &mut Oct, b: &mut Oct) -> bool {
        OctManager::is_equal(self, a, b)
    }

    fn is_leq(&mut self, a: &mut Oct, b: &mut Oct) -> bool {
        OctManager::is_leq(self, a, b)
    }

    fn is_dimension_unconstrained(&mut self, a: &mut Oct, dim: usize) -> bool {
        OctManager::is_dimension_unconstrained(self, a, dim)
    }

    fn sat_lincons(&mut self, a: &mut Oct, cons: &LinCons) -> bool {
        OctManager::sat_lincons(self, a, cons)
    }

    fn sat_interval(&mut self, a: &mut Oct, dim: usize, itv: &Interval) -> bool {
        OctManager::sat_interval(self, a, dim, itv)
    }

    fn bound_dimension(&mut self, a: &mut Oct, dim: usize) -> Interval {
        OctManager::bound_dimension(self, a, dim)
    }

    fn bound_linexpr(&mut self, a: &mut Oct, expr: &LinExpr) -> Interval {
        OctManager::bound_linexpr(self, a, expr)
    }

    fn to_box(&mut self, a: &mut Oct) -> Vec<Interval> {
        OctManager::to_box(self, a)
    }

    fn to_lincons_array(&mut self, a: &mut Oct) -> Vec<LinCons> {
        OctManager::to_lincons_array(self, a)
    }

    fn meet(&mut self, a: &Oct, b: &Oct) -> Oct {
        OctManager::meet(self, a, b)
    }

    fn join(&mut self, a: &mut Oct, b: &mut Oct) -> Oct {
        OctManager::join(self, a, b)
    }

    fn widening(&mut self, a: &Oct, b: &mut Oct) -> Oct {
        OctManager::widening(self, a, b)
    }

    fn widening_thresholds(&mut self, a: &Oct, b: &mut Oct, thresholds: &[f64]) -> Oct {
        OctManager::widening_thresholds(self, a, b, thresholds)
    }

    fn narrowing(&mut self, a: &Oct, b: &Oct) -> Oct {
        OctManager::narrowing(self, a, b)
    }

    fn add_dimensions(&mut self, a: &Oct, positions: &[u32]) -> Oct {
        OctManager::add_dimensions(self, a, positions)
    }

    fn remove_dimensions(&mut self, a: &mut Oct, dims: &[u32]) -> Oct {
        OctManager::remove_dimensions(self, a, dims)
    }

    fn permute_dimensions(&mut self, a: &Oct, perm: &[u32]) -> Oct {
        OctManager::permute_dimensions(self, a, perm)
    }

    fn expand_dimension(&mut self, a: &Oct, dim: usize, count: usize) -> Oct {
        OctManager::expand_dimension(self, a, dim, count)
    }

    fn fold_dimensions(&mut self, a: &mut Oct, dims: &[u32]) -> Oct {
        OctManager::fold_dimensions(self, a, dims)
    }

    fn forget_array(&mut self, a: &mut Oct, dims: &[u32], project: bool) {
        OctManager::forget_array(self, a, dims, project)
    }

    fn meet_lincons_array(&mut self, a: &mut Oct, cons: &[LinCons]) {
        OctManager::meet_lincons_array(self, a, cons)
    }

    fn assign_linexpr(&mut self, a: &mut Oct, dim: usize, expr: &LinExpr) {
        OctManager::assign_linexpr(self, a, dim, expr)
    }

    fn substitute_linexpr(&mut self, a: &mut Oct, dim: usize, expr: &LinExpr) {
        OctManager::substitute_linexpr(self, a, dim, expr)
    }
}
