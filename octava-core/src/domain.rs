// Octava
// Copyright (c) 2025 The Project Octava Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `domain` module defines the trait an analyzer dispatches numerical domains through.
//!
//! A domain is driven by a manager value implementing [`NumericDomain`]. The manager owns the
//! per-domain options and the ambient [`Flags`] record; the abstract values themselves are plain
//! data. Operations that need the value in canonical form take `&mut` so the canonicalization can
//! be performed (and cached) lazily.

use crate::flags::Flags;
use crate::interval::Interval;
use crate::lincons::LinCons;
use crate::linexpr::LinExpr;

/// A numerical abstract domain.
///
/// All operations are total: out-of-range dimensions yield neutral answers (`false` for
/// predicates, top for bounds), unsupported constraints are soundly skipped, and definite
/// failure is the bottom value. Precision losses are reported through [`Flags`].
pub trait NumericDomain {
    /// The abstract value operated on.
    type Value;

    /// The flags accumulated by the most recent operation.
    fn flags(&self) -> Flags;

    // Lifecycle.

    /// The greatest value on `dim` variables.
    fn top(&mut self, dim: usize) -> Self::Value;

    /// The least value on `dim` variables.
    fn bottom(&mut self, dim: usize) -> Self::Value;

    // Queries.

    fn is_top(&mut self, a: &mut Self::Value) -> bool;

    fn is_bottom(&mut self, a: &mut Self::Value) -> bool;

    /// Semantic equality: `γ(a) = γ(b)`.
    fn is_equal(&mut self, a: &mut Self::Value, b: &mut Self::Value) -> bool;

    /// Semantic inclusion: `γ(a) ⊆ γ(b)`.
    fn is_leq(&mut self, a: &mut Self::Value, b: &mut Self::Value) -> bool;

    /// Returns true if no constraint mentions `dim`.
    fn is_dimension_unconstrained(&mut self, a: &mut Self::Value, dim: usize) -> bool;

    /// Returns true if every point of `γ(a)` satisfies the constraint.
    fn sat_lincons(&mut self, a: &mut Self::Value, cons: &LinCons) -> bool;

    /// Returns true if `x_dim` is confined to `itv` on every point of `γ(a)`.
    fn sat_interval(&mut self, a: &mut Self::Value, dim: usize, itv: &Interval) -> bool;

    /// The tightest interval containing `x_dim` over `γ(a)`.
    fn bound_dimension(&mut self, a: &mut Self::Value, dim: usize) -> Interval;

    /// The tightest interval containing `expr` over `γ(a)`.
    fn bound_linexpr(&mut self, a: &mut Self::Value, expr: &LinExpr) -> Interval;

    /// Per-dimension bounds of the value.
    fn to_box(&mut self, a: &mut Self::Value) -> Vec<Interval>;

    /// The value as an array of linear constraints.
    fn to_lincons_array(&mut self, a: &mut Self::Value) -> Vec<LinCons>;

    // Lattice.

    fn meet(&mut self, a: &Self::Value, b: &Self::Value) -> Self::Value;

    fn join(&mut self, a: &mut Self::Value, b: &mut Self::Value) -> Self::Value;

    /// Standard pairwise widening; `a` is the previous iterate.
    fn widening(&mut self, a: &Self::Value, b: &mut Self::Value) -> Self::Value;

    /// Widening bounded by an ascending threshold list.
    fn widening_thresholds(
        &mut self,
        a: &Self::Value,
        b: &mut Self::Value,
        thresholds: &[f64],
    ) -> Self::Value;

    fn narrowing(&mut self, a: &Self::Value, b: &Self::Value) -> Self::Value;

    // Dimension management.

    /// Insert one fresh unconstrained dimension before each listed position.
    fn add_dimensions(&mut self, a: &Self::Value, positions: &[u32]) -> Self::Value;

    /// Remove the listed dimensions.
    fn remove_dimensions(&mut self, a: &mut Self::Value, dims: &[u32]) -> Self::Value;

    /// Relabel dimensions: old dimension `i` becomes `perm[i]`.
    fn permute_dimensions(&mut self, a: &Self::Value, perm: &[u32]) -> Self::Value;

    /// Duplicate `dim` into `count` fresh copies carrying the same constraints.
    fn expand_dimension(&mut self, a: &Self::Value, dim: usize, count: usize) -> Self::Value;

    /// Collapse the listed dimensions into the first by joining their constraints.
    fn fold_dimensions(&mut self, a: &mut Self::Value, dims: &[u32]) -> Self::Value;

    /// Drop every constraint mentioning the listed dimensions; if `project`, constrain each to 0.
    fn forget_array(&mut self, a: &mut Self::Value, dims: &[u32], project: bool);

    // Transfer functions.

    /// Intersect with an array of constraints.
    fn meet_lincons_array(&mut self, a: &mut Self::Value, cons: &[LinCons]);

    /// The forward image of `x_dim := expr`.
    fn assign_linexpr(&mut self, a: &mut Self::Value, dim: usize, expr: &LinExpr);

    /// The backward image of `x_dim := expr`.
    fn substitute_linexpr(&mut self, a: &mut Self::Value, dim: usize, expr: &LinExpr);
}
