// Octava
// Copyright (c) 2025 The Project Octava Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `print` module renders octagons as text, for diagnostics and cross-implementation
//! comparison.
//!
//! The dense dump is line-oriented: the first line is the number of variables, the following
//! `2n` lines give the full square matrix with `+∞` printed as the literal `inf`. The
//! decomposed dump prints each component's member list followed by the induced block. The
//! `Display` implementation renders the constraint-array form instead.

use std::fmt;
use std::fmt::Write;

use crate::comps::MemberVec;
use crate::hmat::INF;
use crate::oct::Oct;

fn push_val(out: &mut String, v: f64) {
    if v == INF {
        out.push_str("inf");
    }
    else {
        let _ = write!(out, "{}", v);
    }
}

impl Oct {
    /// Dense text dump of the matrix, materializing implicit entries.
    pub fn dump_matrix(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{}", self.dim());

        let Some(body) = self.body() else {
            out.push_str("bottom\n");
            return out;
        };

        let n2 = 2 * self.dim();
        for i in 0..n2 {
            for j in 0..n2 {
                if j > 0 {
                    out.push(' ');
                }
                push_val(&mut out, body.bound(i, j));
            }
            out.push('\n');
        }
        out
    }

    /// Decomposed text dump: each component's member list, then its induced block.
    pub fn dump_decomposed(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{}", self.dim());

        let Some(body) = self.body() else {
            out.push_str("bottom\n");
            return out;
        };

        let parts = body.partition();
        for root in parts.roots() {
            let ms: MemberVec = parts.members(root).collect();

            out.push_str("component:");
            for &m in &ms {
                let _ = write!(out, " {}", m);
            }
            out.push('\n');

            // The induced sub-matrix over the members' signed indices.
            for &u in &ms {
                for s in 0..2 {
                    let i = 2 * u as usize + s;
                    let mut lead = true;
                    for &v in &ms {
                        for t in 0..2 {
                            let j = 2 * v as usize + t;
                            if !lead {
                                out.push(' ');
                            }
                            lead = false;
                            push_val(&mut out, body.bound(i, j));
                        }
                    }
                    out.push('\n');
                }
            }
        }
        out
    }
}

impl fmt::Display for Oct {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(body) = self.body() else {
            return write!(f, "bottom");
        };

        let n2 = 2 * self.dim();
        let mut any = false;
        for i in 0..n2 {
            for j in 0..=(i | 1) {
                if i == j {
                    continue;
                }
                let c = body.bound(i, j);
                if c == INF {
                    continue;
                }
                if any {
                    write!(f, "; ")?;
                }
                any = true;

                if j == (i ^ 1) {
                    // Unary bound on the variable, halved back to x terms.
                    let v = i >> 1;
                    if i & 1 == 1 {
                        write!(f, "x{} <= {}", v, c / 2.0)?;
                    }
                    else {
                        write!(f, "-x{} <= {}", v, c / 2.0)?;
                    }
                }
                else {
                    if j & 1 == 0 {
                        write!(f, "x{}", j >> 1)?;
                    }
                    else {
                        write!(f, "-x{}", j >> 1)?;
                    }
                    if i & 1 == 0 {
                        write!(f, " - x{}", i >> 1)?;
                    }
                    else {
                        write!(f, " + x{}", i >> 1)?;
                    }
                    write!(f, " <= {}", c)?;
                }
            }
        }

        if !any {
            write!(f, "top")?;
        }
        Ok(())
    }
}
