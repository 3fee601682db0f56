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

//! Configuration accepted by the core at [`crate::Engine::initialize`]

/// The two collective schemes the engine can use to realise the global
/// transpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommScheme {
    /// One named communicator per root locality, `P` scatter calls per
    /// transpose.
    Scatter,
    /// A single shared communicator, one all-to-all call per transpose.
    AllToAll,
}

/// Plan quality forwarded verbatim to the local FFT backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanQuality {
    Estimate,
    Measure,
    Patient,
    Exhaustive,
}

/// Engine configuration: locality identity, communication scheme, backend
/// plan quality and the size of the intra-locality worker pool.
#[derive(Debug, Clone)]
pub struct Config {
    pub(crate) num_localities: usize,
    pub(crate) this_locality: usize,
    pub(crate) comm_scheme: CommScheme,
    pub(crate) plan_quality: PlanQuality,
    pub(crate) num_threads: usize,
}

impl Config {
    /// Create a configuration for a locality among `num_localities` peers.
    ///
    /// `num_threads` defaults to 1 (serial stages); use
    /// [`Config::with_num_threads`] to enable the intra-locality scheduler.
    pub fn new(
        num_localities: usize,
        this_locality: usize,
        comm_scheme: CommScheme,
        plan_quality: PlanQuality,
    ) -> Self {
        Self {
            num_localities,
            this_locality,
            comm_scheme,
            plan_quality,
            num_threads: 1,
        }
    }

    /// Set the number of worker threads used for the intra-locality
    /// parallel-for stages. `0` is treated as `1`.
    pub fn with_num_threads(mut self, num_threads: usize) -> Self {
        self.num_threads = num_threads.max(1);
        self
    }

    pub fn num_localities(&self) -> usize {
        self.num_localities
    }

    pub fn this_locality(&self) -> usize {
        self.this_locality
    }

    pub fn comm_scheme(&self) -> CommScheme {
        self.comm_scheme
    }

    pub fn plan_quality(&self) -> PlanQuality {
        self.plan_quality
    }

    pub fn num_threads(&self) -> usize {
        self.num_threads
    }
}
