// Octava
// Copyright (c) 2025 The Project Octava Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `closure` module restores the canonical (strongly closed) form of a difference-bound
//! matrix.
//!
//! Strong closure is a Floyd–Warshall shortest-path pass over the signed indices followed by the
//! octagonal tightening `m[i][j] <= (m[i][i^1] + m[j^1][j]) / 2`, which propagates the unary
//! bounds into the binary entries. A negative diagonal afterwards means a negative-weight cycle:
//! the octagon is empty.
//!
//! Both the dense and the decomposed variants run through [`close_on`]: components are
//! independent because inter-component entries are implicitly `+∞` and cannot shorten any
//! intra-component path, so per-component closure of a decomposed matrix equals dense closure of
//! its materialization. Incremental closure after a constraint addition restricts the middle
//! index to the touched variables and relies on the input having been closed.

use log::debug;
use smallvec::SmallVec;

use octava_core::flags::Flags;

use crate::comps::{MemberVec, VarPartition};
use crate::hmat::{HalfMatrix, INF};
use crate::oct::{Oct, State};
use crate::OctManager;

type NodeVec = SmallVec<[usize; 16]>;

fn nodes_of(vars: &[u32]) -> NodeVec {
    let mut nodes = NodeVec::with_capacity(2 * vars.len());
    for &v in vars {
        nodes.push(2 * v as usize);
        nodes.push(2 * v as usize + 1);
    }
    nodes
}

/// Halve a bound, flooring in integer mode. `+∞` passes through.
#[inline]
pub(crate) fn half(v: f64, int: bool) -> f64 {
    if v == INF {
        INF
    }
    else if int {
        (v / 2.0).floor()
    }
    else {
        v / 2.0
    }
}

fn shortest_paths(mat: &mut HalfMatrix, mids: &[usize], nodes: &[usize]) {
    for &k in mids {
        for &i in nodes {
            let ik = mat.get(i, k);
            if ik == INF {
                continue;
            }
            for &j in nodes {
                // Stored triangle only; coherence keeps the mirror in step.
                if j > (i | 1) {
                    continue;
                }
                let kj = mat.get(k, j);
                if kj == INF {
                    continue;
                }
                mat.min_set(i, j, ik + kj);
            }
        }
    }
}

fn tighten(mat: &mut HalfMatrix, nodes: &[usize], int: bool) {
    for &i in nodes {
        let ib = mat.get(i, i ^ 1);
        if ib == INF {
            continue;
        }
        for &j in nodes {
            if j > (i | 1) {
                continue;
            }
            let jb = mat.get(j ^ 1, j);
            if jb == INF {
                continue;
            }
            mat.min_set(i, j, half(ib + jb, int));
        }
    }
}

/// Check the diagonal for a negative cycle, pinning it back to zero. Returns false on emptiness.
fn check_diagonal(mat: &mut HalfMatrix, nodes: &[usize]) -> bool {
    for &i in nodes {
        if mat.get(i, i) < 0.0 {
            return false;
        }
        mat.set(i, i, 0.0);
    }
    true
}

/// Strongly close the sub-matrix induced by `vars`. Returns false if the octagon is empty.
///
/// Passing every variable performs the dense closure.
pub(crate) fn close_on(mat: &mut HalfMatrix, vars: &[u32], int: bool) -> bool {
    let nodes = nodes_of(vars);
    shortest_paths(mat, &nodes, &nodes);
    tighten(mat, &nodes, int);
    check_diagonal(mat, &nodes)
}

/// Restore closure after new constraints touching `touched` landed on a previously closed
/// sub-matrix over `vars`. Only paths through the touched variables can have shortened.
pub(crate) fn incr_close(mat: &mut HalfMatrix, vars: &[u32], touched: &[u32], int: bool) -> bool {
    let nodes = nodes_of(vars);
    let mids = nodes_of(touched);
    shortest_paths(mat, &mids, &nodes);
    tighten(mat, &nodes, int);
    check_diagonal(mat, &nodes)
}

/// Close every component containing one of `touched`. Returns false on emptiness.
pub(crate) fn close_affected(
    mat: &mut HalfMatrix,
    comps: &VarPartition,
    touched: &[u32],
    int: bool,
) -> bool {
    let mut done: SmallVec<[u32; 4]> = SmallVec::new();
    for &v in touched {
        let Some(root) = comps.find(v) else { continue };
        if done.contains(&root) {
            continue;
        }
        done.push(root);
        let ms: MemberVec = comps.members(root).collect();
        if !close_on(mat, &ms, int) {
            return false;
        }
    }
    true
}

impl OctManager {
    /// Bring `a` into closed form, lazily. Returns false if `a` is (or turns out to be) bottom.
    pub(crate) fn ensure_closed(&mut self, a: &mut Oct) -> bool {
        match a.state() {
            State::Bottom => false,
            State::Closed(_) => true,
            State::Open(_) => {
                if self.no_closure {
                    self.raise(Flags::ALGO);
                    return true;
                }

                let int = self.is_int();
                let body = a.body_mut().unwrap();
                let nonempty = if body.dense {
                    let all: Vec<u32> = (0..body.mat.dim() as u32).collect();
                    close_on(&mut body.mat, &all, int)
                }
                else {
                    let roots: MemberVec = body.comps.roots().collect();
                    let mut nonempty = true;
                    for root in roots {
                        let ms: MemberVec = body.comps.members(root).collect();
                        if !close_on(&mut body.mat, &ms, int) {
                            nonempty = false;
                            break;
                        }
                    }
                    nonempty
                };

                if nonempty {
                    a.make_closed();
                    true
                }
                else {
                    debug!("strong closure found an empty octagon");
                    a.set_bottom();
                    false
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{close_on, half, incr_close};
    use crate::hmat::{HalfMatrix, INF};

    #[test]
    fn verify_difference_chain() {
        // x0 - x1 <= 3 and x1 - x2 <= 4 entail x0 - x2 <= 7.
        let mut m = HalfMatrix::top(3);
        m.set(2, 0, 3.0);
        m.set(4, 2, 4.0);

        assert!(close_on(&mut m, &[0, 1, 2], false));
        assert_eq!(m.get(4, 0), 7.0);
        // No unary bound can appear out of pure differences.
        assert_eq!(m.get(1, 0), INF);
        assert_eq!(m.get(3, 2), INF);
    }

    #[test]
    fn verify_unary_propagation() {
        // x0 <= 5 and x1 - x0 <= -3 entail x1 <= 2.
        let mut m = HalfMatrix::top(2);
        m.set(1, 0, 10.0);
        m.set(0, 2, -3.0);

        assert!(close_on(&mut m, &[0, 1], false));
        assert_eq!(m.get(3, 2), 4.0);
    }

    #[test]
    fn verify_negative_cycle_empties() {
        // x0 - x1 <= 0, x1 - x2 <= 0, x2 - x0 <= -1: a cycle of weight -1.
        let mut m = HalfMatrix::top(3);
        m.set(2, 0, 0.0);
        m.set(4, 2, 0.0);
        m.set(0, 4, -1.0);

        assert!(!close_on(&mut m, &[0, 1, 2], false));
    }

    #[test]
    fn verify_tightening_halves() {
        // x0 <= 1 and x1 <= 2.5 bound x0 + x1 through tightening.
        let mut m = HalfMatrix::top(2);
        m.set(1, 0, 2.0);
        m.set(3, 2, 5.0);

        let mut mi = m.clone();

        assert!(close_on(&mut m, &[0, 1], false));
        assert_eq!(m.get(3, 0), 3.5);

        // Integer mode floors the halved bound.
        assert!(close_on(&mut mi, &[0, 1], true));
        assert_eq!(mi.get(3, 0), 3.0);
    }

    #[test]
    fn verify_closure_idempotent() {
        let mut m = HalfMatrix::top(3);
        m.set(2, 0, 3.0);
        m.set(1, 0, 4.0);
        m.set(4, 2, -1.0);

        assert!(close_on(&mut m, &[0, 1, 2], false));
        let once = m.clone();
        assert!(close_on(&mut m, &[0, 1, 2], false));
        assert_eq!(m, once);
    }

    #[test]
    fn verify_incremental_matches_full() {
        let mut m = HalfMatrix::top(3);
        m.set(2, 0, 3.0);
        m.set(4, 2, 4.0);
        assert!(close_on(&mut m, &[0, 1, 2], false));

        // Add x2 - x0 <= -2 and restore closure incrementally.
        let mut full = m.clone();
        m.min_set(0, 4, -2.0);
        full.min_set(0, 4, -2.0);

        assert!(incr_close(&mut m, &[0, 1, 2], &[0, 2], false));
        assert!(close_on(&mut full, &[0, 1, 2], false));
        assert_eq!(m, full);
    }

    #[test]
    fn verify_half() {
        assert_eq!(half(INF, true), INF);
        assert_eq!(half(5.0, false), 2.5);
        assert_eq!(half(5.0, true), 2.0);
        assert_eq!(half(-5.0, true), -3.0);
    }
}
