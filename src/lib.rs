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

//! A distributed two-dimensional real-to-complex FFT engine.
//!
//! A real `Nx × Ny` matrix is partitioned row-wise across `P`
//! localities. [`Engine::execute`] runs the full forward transform:
//! local row FFTs, a pack/transpose-driven global redistribution, local
//! column FFTs, and a second pack/transpose back to the original
//! row-wise layout. The engine does not implement the collective
//! transport itself beyond the bundled in-process reference
//! ([`ThreadCommunicator`], for simulating multiple localities as
//! threads in one process); a real deployment wires [`Communicator`] to
//! whatever collective library (MPI, HPX, ...) the surrounding driver
//! uses.
//!
//! Usage
//! -----
//! ```
//! use dist_fft2d::{CommScheme, CommunicatorRegistry, Config, Engine, PlanQuality, RowTile};
//!
//! // Single locality, Nx=4, Ny=8.
//! let tile = RowTile::zeros(4, 8);
//! let registry = CommunicatorRegistry::new(1);
//! let config = Config::new(1, 0, CommScheme::AllToAll, PlanQuality::Estimate);
//! let mut engine = Engine::initialize(tile, 4, config, &registry).unwrap();
//! let spectrum = engine.execute().unwrap();
//! assert_eq!(spectrum.nx_local(), 4);
//! ```

mod backend;
mod communicator;
mod config;
mod disjoint;
mod engine;
mod error;
mod pack;
mod scheduler;
mod tile;

pub use backend::{FftBackend, RustfftBackend};
pub use communicator::{Communicator, CommunicatorRegistry, ThreadCommunicator};
pub use config::{CommScheme, Config, PlanQuality};
pub use engine::Engine;
pub use error::{FftError, Result};
pub use tile::{ColumnTile, RowTile};
