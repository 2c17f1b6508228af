// Octava
// Copyright (c) 2025 The Project Octava Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `linexpr` module defines linear expressions over program variables.
//!
//! An expression is a sum of scalar-coefficient terms plus an interval constant. The interval
//! constant models non-deterministic inputs (`x + [0, 1]`) and is a single point for ordinary
//! arithmetic. Variables are identified by their dimension index in the host's environment.

use std::fmt;

use smallvec::SmallVec;

use crate::interval::Interval;

/// A single `coef · x_dim` term. The coefficient is never zero.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LinTerm {
    pub dim: u32,
    pub coef: f64,
}

/// A linear expression: `Σ coefᵢ · x_dimᵢ + [lo, up]`.
///
/// Terms are kept sorted by dimension with zero coefficients elided, so equality of the term
/// lists is structural equality of the expressions.
#[derive(Clone, Debug, PartialEq)]
pub struct LinExpr {
    terms: SmallVec<[LinTerm; 2]>,
    cst: Interval,
}

impl LinExpr {
    /// Instantiate a constant expression.
    pub fn constant(v: f64) -> LinExpr {
        LinExpr { terms: SmallVec::new(), cst: Interval::point(v) }
    }

    /// Instantiate a constant expression from an interval.
    pub fn interval(lo: f64, up: f64) -> LinExpr {
        LinExpr { terms: SmallVec::new(), cst: Interval::new(lo, up) }
    }

    /// Instantiate the expression `x_dim`.
    pub fn var(dim: u32) -> LinExpr {
        LinExpr::constant(0.0).with_term(dim, 1.0)
    }

    /// Add `coef · x_dim` to the expression, merging with an existing term on the same dimension.
    pub fn with_term(mut self, dim: u32, coef: f64) -> LinExpr {
        match self.terms.binary_search_by_key(&dim, |t| t.dim) {
            Ok(at) => {
                let merged = self.terms[at].coef + coef;
                if merged == 0.0 {
                    self.terms.remove(at);
                }
                else {
                    self.terms[at].coef = merged;
                }
            }
            Err(at) => {
                if coef != 0.0 {
                    self.terms.insert(at, LinTerm { dim, coef });
                }
            }
        }
        self
    }

    /// Replace the constant part of the expression.
    pub fn with_constant(mut self, cst: Interval) -> LinExpr {
        self.cst = cst;
        self
    }

    pub fn terms(&self) -> &[LinTerm] {
        &self.terms
    }

    pub fn constant_part(&self) -> Interval {
        self.cst
    }

    pub fn is_constant(&self) -> bool {
        self.terms.is_empty()
    }

    /// The largest dimension mentioned by the expression, if any.
    pub fn max_dim(&self) -> Option<u32> {
        self.terms.last().map(|t| t.dim)
    }

    /// Evaluate the variable terms over a box of per-dimension bounds, excluding the constant.
    ///
    /// Dimensions outside the box evaluate to top.
    pub fn eval_terms(&self, bounds: &[Interval]) -> Interval {
        let mut acc = Interval::point(0.0);
        for t in &self.terms {
            let itv = bounds.get(t.dim as usize).copied().unwrap_or(Interval::TOP);
            acc = acc.add(&itv.scale(t.coef));
        }
        acc
    }

    /// Evaluate the expression, constant included, over a box of per-dimension bounds.
    pub fn eval(&self, bounds: &[Interval]) -> Interval {
        self.eval_terms(bounds).add(&self.cst)
    }
}

impl fmt::Display for LinExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut lead = true;
        for t in &self.terms {
            if lead {
                if t.coef == 1.0 {
                    write!(f, "x{}", t.dim)?;
                }
                else if t.coef == -1.0 {
                    write!(f, "-x{}", t.dim)?;
                }
                else {
                    write!(f, "{}*x{}", t.coef, t.dim)?;
                }
                lead = false;
            }
            else {
                let (sign, mag) = if t.coef < 0.0 { ('-', -t.coef) } else { ('+', t.coef) };
                if mag == 1.0 {
                    write!(f, " {} x{}", sign, t.dim)?;
                }
                else {
                    write!(f, " {} {}*x{}", sign, mag, t.dim)?;
                }
            }
        }

        let cst = self.cst;
        if lead {
            if cst.is_point() {
                write!(f, "{}", cst.lo)
            }
            else {
                write!(f, "{}", cst)
            }
        }
        else if cst.is_point() {
            if cst.lo < 0.0 {
                write!(f, " - {}", -cst.lo)
            }
            else if cst.lo > 0.0 {
                write!(f, " + {}", cst.lo)
            }
            else {
                Ok(())
            }
        }
        else {
            write!(f, " + {}", cst)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::LinExpr;
    use crate::interval::Interval;

    #[test]
    fn verify_term_merging() {
        let e = LinExpr::var(1).with_term(0, -1.0).with_term(1, 2.0);

        assert_eq!(e.terms().len(), 2);
        assert_eq!(e.terms()[0].dim, 0);
        assert_eq!(e.terms()[1].coef, 3.0);

        // Cancelling a term removes it entirely.
        let e = e.with_term(1, -3.0);
        assert_eq!(e.terms().len(), 1);
        assert_eq!(e.max_dim(), Some(0));
    }

    #[test]
    fn verify_eval() {
        let bounds = [Interval::new(0.0, 1.0), Interval::new(-2.0, 2.0)];
        let e = LinExpr::constant(1.0).with_term(0, 2.0).with_term(1, -1.0);

        assert_eq!(e.eval(&bounds), Interval::new(-1.0, 5.0));

        // An unbounded dimension makes the whole range unbounded.
        let e = e.with_term(2, 1.0);
        assert!(e.eval(&bounds).is_top());
    }

    #[test]
    fn verify_display() {
        let e = LinExpr::constant(-3.0).with_term(0, 1.0).with_term(1, -1.0);
        assert_eq!(e.to_string(), "x0 - x1 - 3");

        let e = LinExpr::interval(0.0, 1.0).with_term(2, 2.0);
        assert_eq!(e.to_string(), "2*x2 + [0, 1]");
    }
}
