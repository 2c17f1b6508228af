// Octava
// Copyright (c) 2025 The Project Octava Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `flags` module defines the precision flags accumulated by domain operations.
//!
//! Domains never raise recoverable errors: definite failure is the bottom value, and everything
//! else is a sound over-approximation whose quality is reported through these flags. A manager
//! clears its ambient flag record at the start of every public operation and or-accumulates into
//! it while the operation runs.

use bitflags::bitflags;

bitflags! {
    /// Precision flags for a single domain operation.
    ///
    /// An empty set means the operation was exact and complete.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct Flags: u8 {
        /// The result is sound but may not be the tightest representable one.
        const INEXACT = 1 << 0;
        /// A definite answer could not be reached on the rationals.
        const INCOMPLETE = 1 << 1;
        /// A numeric conversion rounded, e.g. integer mode floored a fractional bound.
        const CONV = 1 << 2;
        /// A closure was skipped by option; the result may be weaker than usual.
        const ALGO = 1 << 3;
    }
}

impl Flags {
    /// Returns true if the operation that reported these flags was exact.
    pub fn is_exact(&self) -> bool {
        !self.intersects(Flags::INEXACT | Flags::INCOMPLETE | Flags::CONV)
    }
}

#[cfg(test)]
mod tests {
    use super::Flags;

    #[test]
    fn verify_exactness() {
        assert!(Flags::empty().is_exact());
        assert!(Flags::ALGO.is_exact());
        assert!(!(Flags::ALGO | Flags::INEXACT).is_exact());
        assert!(!Flags::CONV.is_exact());
    }
}
