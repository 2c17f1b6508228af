// Octava
// Copyright (c) 2025 The Project Octava Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `oct` module defines the octagon abstract value.
//!
//! An octagon over `n` variables represents the points of `ℝⁿ` satisfying a conjunction of
//! constraints `±x_i ± x_j <= c`, encoded in a difference-bound matrix over signed indices. The
//! value is a tagged state: `Bottom` (definitely empty, no matrix), `Open` (a sound matrix that
//! is not known to be canonical), or `Closed` (strongly closed matrix). Strong closure is the
//! canonical form; operations that need it trigger it lazily and cache the transition.
//!
//! In decomposed form, entries relating variables from different components are implicitly `+∞`
//! and the matrix must not be read there without consulting the partition. In dense form the
//! partition is ignored.

use std::mem;

use crate::comps::{rescan, VarPartition};
use crate::hmat::{HalfMatrix, INF};

/// Matrix, partition, and layout flag of a non-bottom octagon.
#[derive(Clone, Debug)]
pub(crate) struct Body {
    pub(crate) mat: HalfMatrix,
    pub(crate) comps: VarPartition,
    pub(crate) dense: bool,
}

impl Body {
    /// The unconstrained body in decomposed form.
    pub(crate) fn top(dim: usize) -> Body {
        Body { mat: HalfMatrix::top(dim), comps: VarPartition::new(dim), dense: false }
    }

    /// The bound on `v(j) - v(i)`, materializing implicit entries of the decomposed form.
    pub(crate) fn bound(&self, i: usize, j: usize) -> f64 {
        if i == j {
            return self.mat.get(i, j);
        }
        if !self.dense {
            let (u, v) = ((i >> 1) as u32, (j >> 1) as u32);
            let explicit = if u == v { self.comps.contains(u) } else { self.comps.connected(u, v) };
            if !explicit {
                return INF;
            }
        }
        self.mat.get(i, j)
    }

    /// Switch to the dense layout, writing the implicit `+∞` entries out.
    pub(crate) fn to_dense(&mut self) {
        if self.dense {
            return;
        }
        for i in 0..self.mat.nodes() {
            for j in 0..=(i | 1) {
                if i != j && self.bound(i, j) == INF {
                    self.mat.set(i, j, INF);
                }
            }
        }
        self.dense = true;
    }

    /// Switch to the decomposed layout, rebuilding the partition from the matrix.
    pub(crate) fn to_decomposed(&mut self) {
        if !self.dense {
            return;
        }
        self.comps = rescan(&self.mat);
        self.dense = false;
    }

    /// The partition of related variables, regardless of layout.
    pub(crate) fn partition(&self) -> VarPartition {
        if self.dense {
            rescan(&self.mat)
        }
        else {
            self.comps.clone()
        }
    }
}

#[derive(Clone, Debug)]
pub(crate) enum State {
    /// Definitely empty; terminal under transfers.
    Bottom,
    /// A sound matrix, not known to be strongly closed.
    Open(Body),
    /// A strongly closed matrix.
    Closed(Body),
}

/// An octagon abstract value over `dim` variables.
///
/// Values are created through an [`OctManager`](crate::OctManager), cloned freely, and dropped
/// when done; the matrix and partition are owned exclusively by the value.
#[derive(Clone, Debug)]
pub struct Oct {
    dim: usize,
    state: State,
}

impl Oct {
    /// The octagon of all points of `ℝⁿ`.
    pub fn top(dim: usize) -> Oct {
        Oct { dim, state: State::Closed(Body::top(dim)) }
    }

    /// The empty octagon.
    pub fn bottom(dim: usize) -> Oct {
        Oct { dim, state: State::Bottom }
    }

    /// The number of variables.
    pub fn dim(&self) -> usize {
        self.dim
    }

    pub(crate) fn state(&self) -> &State {
        &self.state
    }

    pub(crate) fn is_bottom_state(&self) -> bool {
        matches!(self.state, State::Bottom)
    }

    pub(crate) fn is_closed_state(&self) -> bool {
        matches!(self.state, State::Closed(_))
    }

    pub(crate) fn body(&self) -> Option<&Body> {
        match &self.state {
            State::Bottom => None,
            State::Open(b) | State::Closed(b) => Some(b),
        }
    }

    pub(crate) fn body_mut(&mut self) -> Option<&mut Body> {
        match &mut self.state {
            State::Bottom => None,
            State::Open(b) | State::Closed(b) => Some(b),
        }
    }

    pub(crate) fn set_bottom(&mut self) {
        self.state = State::Bottom;
    }

    /// Demote a closed value to open after a closure-breaking mutation.
    pub(crate) fn make_open(&mut self) {
        if let State::Closed(_) = self.state {
            if let State::Closed(b) = mem::replace(&mut self.state, State::Bottom) {
                self.state = State::Open(b);
            }
        }
    }

    /// Promote an open value whose matrix has been strongly closed.
    pub(crate) fn make_closed(&mut self) {
        if let State::Open(_) = self.state {
            if let State::Open(b) = mem::replace(&mut self.state, State::Bottom) {
                self.state = State::Closed(b);
            }
        }
    }

    /// Build a value from parts, choosing the state tag.
    pub(crate) fn from_body(dim: usize, body: Body, closed: bool) -> Oct {
        let state = if closed { State::Closed(body) } else { State::Open(body) };
        Oct { dim, state }
    }

    /// Materialize the implicit entries and switch to the dense layout. No-op on bottom.
    pub fn densify(&mut self) {
        if let Some(body) = self.body_mut() {
            body.to_dense();
        }
    }

    /// Switch to the decomposed layout, rebuilding the component partition from the matrix.
    /// No-op on bottom.
    pub fn sparsify(&mut self) {
        if let Some(body) = self.body_mut() {
            body.to_decomposed();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Oct;
    use crate::hmat::INF;

    #[test]
    fn verify_top_state() {
        let a = Oct::top(3);
        assert!(a.is_closed_state());
        assert_eq!(a.dim(), 3);

        let b = a.body().unwrap();
        assert!(b.comps.is_empty());
        assert_eq!(b.bound(0, 0), 0.0);
        assert_eq!(b.bound(0, 1), INF);
    }

    #[test]
    fn verify_bound_consults_partition() {
        let mut a = Oct::top(2);
        let body = a.body_mut().unwrap();

        // A finite entry the partition does not know about must stay implicit.
        body.mat.set(2, 0, 1.0);
        assert_eq!(body.bound(2, 0), INF);

        body.comps.insert(0);
        body.comps.insert(1);
        body.comps.union(0, 1);
        assert_eq!(body.bound(2, 0), 1.0);

        // The coherent mirror reads the same slot.
        assert_eq!(body.bound(1, 3), 1.0);

        // Dense layout trusts the matrix alone.
        body.dense = true;
        assert_eq!(body.bound(2, 0), 1.0);
    }

    #[test]
    fn verify_layout_round_trip() {
        let mut a = Oct::top(3);
        let body = a.body_mut().unwrap();

        body.comps.insert(0);
        body.comps.insert(2);
        body.comps.union(0, 2);
        body.mat.set(4, 0, 3.0);

        body.to_dense();
        assert!(body.dense);
        assert_eq!(body.mat.get(4, 0), 3.0);

        body.to_decomposed();
        assert!(!body.dense);
        assert!(body.comps.connected(0, 2));
        assert!(!body.comps.contains(1));
    }
}
