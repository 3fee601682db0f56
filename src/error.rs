// dist_fft2d - A distributed two-dimensional real-to-complex FFT engine
// Copyright (C) 2021 Julian Jeggle, Raphael Wittkowski

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as
// published by the Free Software Foundation, either version 3 of the
// License, or (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Error type for the distributed FFT engine

use std::error::Error as StdError;
use std::fmt;

/// Errors raised by [`crate::Engine`] and its collaborators.
#[derive(Debug, Clone, PartialEq)]
pub enum FftError {
    /// Dimensions or communication scheme rejected at `initialize` time,
    /// e.g. `Nx mod P != 0` or an unknown `CommScheme`.
    Configuration(String),
    /// The local FFT backend refused to build a plan.
    Planning(String),
    /// The collective substrate reported a failure, or a generation /
    /// basename mismatch was detected at a rendezvous.
    Collective(String),
    /// `execute()` was called on an engine whose row-tile had already
    /// been consumed and not replaced. The shipped [`crate::Engine`]
    /// retains ownership across calls, so this variant exists for
    /// completeness of the error taxonomy rather than being reachable
    /// in normal use.
    Reexecution,
}

impl fmt::Display for FftError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FftError::Configuration(msg) => write!(f, "configuration error: {}", msg),
            FftError::Planning(msg) => write!(f, "backend planning failure: {}", msg),
            FftError::Collective(msg) => write!(f, "collective failure: {}", msg),
            FftError::Reexecution => write!(f, "execute() called with no row-tile present"),
        }
    }
}

impl StdError for FftError {}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, FftError>;
