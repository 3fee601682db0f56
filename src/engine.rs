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

//! The distributed 2D R2C engine: lifecycle and the six-stage pipeline
//! wiring together the local backend, the pack/transpose kernels and
//! the collective transport.

use std::sync::{Arc, Mutex};

use scoped_threadpool::Pool;

use crate::backend::{FftBackend, RustfftBackend};
use crate::communicator::{Communicator, CommunicatorRegistry, ThreadCommunicator};
use crate::config::{CommScheme, Config};
use crate::error::{FftError, Result};
use crate::pack::{split_x, split_y, transpose_x_to_y, transpose_y_to_x};
use crate::scheduler::parallel_for_mut;
use crate::tile::{ColumnTile, RowTile};

enum Transport {
    Scatter(Vec<ThreadCommunicator>),
    AllToAll(ThreadCommunicator),
}

/// A fully initialized distributed FFT engine for one locality.
///
/// `execute()` keeps the original input tile untouched and recomputes
/// the pipeline from it each call, copying rather than moving on
/// return, so it may be called any number of times without
/// re-initializing.
pub struct Engine {
    config: Config,
    backend: Arc<dyn FftBackend>,
    pool: Pool,
    transport: Transport,
    input: RowTile,
    ny: usize,
    cx: usize,
    chunk_y: usize,
    chunk_x: usize,
    ny_local: usize,
    generation: u64,
}

impl Engine {
    /// Build the engine for this locality. `nx_global` is `Nx`, the
    /// total (not per-locality) row count of the input matrix; `input`
    /// must already hold exactly `nx_global / P` rows. `registry` is
    /// shared across every locality participating in the run.
    pub fn initialize(
        input: RowTile,
        nx_global: usize,
        config: Config,
        registry: &CommunicatorRegistry,
    ) -> Result<Self> {
        let p = config.num_localities();
        if p == 0 {
            return Err(FftError::Configuration("num_localities must be positive".into()));
        }
        if nx_global % p != 0 {
            return Err(FftError::Configuration(format!(
                "Nx ({}) is not divisible by P ({})",
                nx_global, p
            )));
        }
        let nx_local = nx_global / p;
        if input.nx_local() != nx_local {
            return Err(FftError::Configuration(format!(
                "input tile has {} rows, expected Nx/P = {}",
                input.nx_local(),
                nx_local
            )));
        }
        let cy = input.cy();
        if cy % p != 0 {
            return Err(FftError::Configuration(format!(
                "Cy ({}) is not divisible by P ({})",
                cy, p
            )));
        }
        if config.this_locality() >= p {
            return Err(FftError::Configuration(format!(
                "this_locality ({}) out of range for P ({})",
                config.this_locality(),
                p
            )));
        }

        let ny = 2 * (cy - 1);
        let cx = nx_global;
        let chunk_y = 2 * cy / p;
        let chunk_x = 2 * cx / p;
        let ny_local = cy / p;

        log::debug!(
            "locality {}/{}: initializing engine (Nx={}, Ny={}, Cy={}, Cx={}, scheme={:?})",
            config.this_locality(),
            p,
            nx_global,
            ny,
            cy,
            cx,
            config.comm_scheme()
        );

        let backend: Arc<dyn FftBackend> = Arc::new(RustfftBackend::new(ny, cx, config.plan_quality())?);
        let pool = Pool::new(config.num_threads() as u32);

        let transport = match config.comm_scheme() {
            CommScheme::Scatter => {
                let comms = (0..p)
                    .map(|root| registry.scatter_communicator(root, config.this_locality()))
                    .collect();
                Transport::Scatter(comms)
            }
            CommScheme::AllToAll => Transport::AllToAll(registry.all_to_all_communicator(config.this_locality())),
        };

        Ok(Self {
            config,
            backend,
            pool,
            transport,
            input,
            ny,
            cx,
            chunk_y,
            chunk_x,
            ny_local,
            generation: 0,
        })
    }

    /// Run one forward distributed 2D R2C transform and return the
    /// result as a freshly allocated row-tile.
    pub fn execute(&mut self) -> Result<RowTile> {
        let p = self.config.num_localities();
        let nx_local = self.input.nx_local();
        let mut working = self.input.clone();

        let backend = self.backend.clone();
        run_stage_mut(&mut self.pool, working.rows_mut(), |row| backend.r2c_in_place(row))?;

        let mut send_y = vec![vec![0.0; nx_local * self.chunk_y]; p];
        split_y(&mut self.pool, &working, self.chunk_y, &mut send_y);

        self.generation += 1;
        let recv_y = self.exchange(send_y, self.generation)?;

        let mut columns = ColumnTile::zeros(self.ny_local, self.cx);
        transpose_y_to_x(&mut self.pool, &recv_y, self.chunk_y, nx_local, &mut columns);

        let backend = self.backend.clone();
        run_stage_mut(&mut self.pool, columns.rows_mut(), |row| backend.c2c_in_place(row))?;

        let mut send_x = vec![vec![0.0; self.ny_local * self.chunk_x]; p];
        split_x(&mut self.pool, &columns, self.chunk_x, &mut send_x);

        self.generation += 1;
        let recv_x = self.exchange(send_x, self.generation)?;

        let mut result = RowTile::zeros(nx_local, self.ny);
        transpose_x_to_y(&mut self.pool, &recv_x, self.chunk_x, self.ny_local, &mut result);

        log::debug!(
            "locality {}: execute() complete at generation {}",
            self.config.this_locality(),
            self.generation
        );
        Ok(result)
    }

    /// The generation counter's current value (advances by exactly two
    /// per `execute()` call).
    pub fn generation(&self) -> u64 {
        self.generation
    }

    fn exchange(&self, payload: Vec<Vec<f64>>, generation: u64) -> Result<Vec<Vec<f64>>> {
        match &self.transport {
            Transport::Scatter(comms) => {
                let mut payload = Some(payload);
                let mut recv = Vec::with_capacity(comms.len());
                for (i, comm) in comms.iter().enumerate() {
                    if self.config.this_locality() == i {
                        let own_payload = payload
                            .take()
                            .expect("root's own pack buffer set is consumed exactly once");
                        recv.push(comm.scatter_to(own_payload, generation)?);
                    } else {
                        recv.push(comm.scatter_from(generation)?);
                    }
                }
                Ok(recv)
            }
            Transport::AllToAll(comm) => comm.all_to_all(payload, generation),
        }
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        log::debug!("locality {}: tearing down engine", self.config.this_locality());
    }
}

/// Run `f(row)` over every element of `rows` on `pool`, propagating the
/// first error any work item raises (backend calls are the only
/// fallible stage body). Each worker gets disjoint rows via
/// [`parallel_for_mut`]'s `chunks_mut` split, so no locking is needed
/// for the rows themselves; only the shared error slot is guarded.
fn run_stage_mut(pool: &mut Pool, rows: &mut [Vec<f64>], f: impl Fn(&mut Vec<f64>) -> Result<()> + Sync) -> Result<()> {
    let error: Mutex<Option<FftError>> = Mutex::new(None);
    parallel_for_mut(pool, rows, |_, row| {
        if error.lock().unwrap().is_some() {
            return;
        }
        if let Err(e) = f(row) {
            let mut guard = error.lock().unwrap();
            if guard.is_none() {
                *guard = Some(e);
            }
        }
    });
    match error.into_inner().unwrap() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlanQuality;
    use std::thread;

    fn row_tile_from(rows: Vec<Vec<f64>>, ny: usize) -> RowTile {
        RowTile::new(rows, ny).unwrap()
    }

    #[test]
    fn divisibility_guard_rejects_bad_nx() {
        // P=3, Nx=4: 4 % 3 != 0.
        let registry = CommunicatorRegistry::new(3);
        let tile = RowTile::zeros(1, 8);
        let config = Config::new(3, 0, CommScheme::Scatter, PlanQuality::Estimate);
        assert!(Engine::initialize(tile, 4, config, &registry).is_err());
    }

    #[test]
    fn accepts_p3_nx6_ny4() {
        let registry = CommunicatorRegistry::new(3);
        let tile = RowTile::zeros(2, 4);
        let config = Config::new(3, 0, CommScheme::Scatter, PlanQuality::Estimate);
        assert!(Engine::initialize(tile, 6, config, &registry).is_ok());
    }

    #[test]
    fn single_locality_impulse_response_is_flat() {
        // P=1, Nx=4, Ny=8, impulse at (0,0): spectrum must be all-ones.
        let registry = CommunicatorRegistry::new(1);
        let mut rows = vec![vec![0.0; 10]; 4]; // Cy = 8/2+1 = 5, padded len 10
        rows[0][0] = 1.0;
        let tile = row_tile_from(rows, 8);
        let config = Config::new(1, 0, CommScheme::AllToAll, PlanQuality::Estimate);
        let mut engine = Engine::initialize(tile, 4, config, &registry).unwrap();
        let result = engine.execute().unwrap();
        assert_eq!(engine.generation(), 2);
        for i in 0..result.nx_local() {
            for c in result.row(i).chunks(2) {
                assert!((c[0] - 1.0).abs() < 1e-9, "re={}", c[0]);
                assert!(c[1].abs() < 1e-9, "im={}", c[1]);
            }
        }
    }

    #[test]
    fn all_zero_input_stays_zero_across_localities() {
        // P=4, Nx=8, Ny=8, all-zero input, scatter scheme.
        let _ = env_logger::try_init();
        let p = 4;
        let registry = Arc::new(CommunicatorRegistry::new(p));
        let mut handles = Vec::new();
        for site in 0..p {
            let registry = registry.clone();
            handles.push(thread::spawn(move || {
                let tile = RowTile::zeros(2, 8); // nx_local = 8/4
                let config = Config::new(p, site, CommScheme::Scatter, PlanQuality::Estimate);
                let mut engine = Engine::initialize(tile, 8, config, &registry).unwrap();
                engine.execute().unwrap()
            }));
        }
        for h in handles {
            let result = h.join().unwrap();
            for i in 0..result.nx_local() {
                assert!(result.row(i).iter().all(|&v| v.abs() < 1e-9));
            }
        }
    }

    #[test]
    fn scatter_and_all_to_all_agree_bit_for_bit() {
        // P=2, Nx=8, Ny=14, row i = [0..14) padded.
        fn run(scheme: CommScheme) -> Vec<Vec<f64>> {
            let p = 2;
            let registry = Arc::new(CommunicatorRegistry::new(p));
            let mut handles = Vec::new();
            for site in 0..p {
                let registry = registry.clone();
                handles.push(thread::spawn(move || {
                    let mut rows = Vec::new();
                    for r in 0..4 {
                        let mut row = vec![0.0; 16]; // Cy = 14/2+1 = 8, padded 16
                        for v in 0..14 {
                            row[v] = (r * 14 + v) as f64;
                        }
                        rows.push(row);
                    }
                    let tile = row_tile_from(rows, 14);
                    let config = Config::new(p, site, scheme, PlanQuality::Estimate);
                    let mut engine = Engine::initialize(tile, 8, config, &registry).unwrap();
                    engine.execute().unwrap().into_rows()
                }));
            }
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        }

        let scatter: Vec<Vec<Vec<f64>>> = run(CommScheme::Scatter);
        let all_to_all: Vec<Vec<Vec<f64>>> = run(CommScheme::AllToAll);
        assert_eq!(scatter, all_to_all);
    }

    /// Plain serial 2D R2C over the full (undistributed) matrix, built
    /// from the same backend the engine uses: R2C every row, transpose
    /// in full (not chunked), forward C2C every resulting column, then
    /// transpose back into row-major layout. This is the reference the
    /// distributed result is checked against.
    fn serial_reference_r2c(nx: usize, ny: usize, rows: &[Vec<f64>]) -> Vec<Vec<f64>> {
        use crate::backend::{as_complex, as_complex_mut, FftBackend, RustfftBackend};

        let cy = ny / 2 + 1;
        let backend = RustfftBackend::new(ny, nx, PlanQuality::Estimate).unwrap();

        let mut row_spectra = rows.to_vec();
        for row in row_spectra.iter_mut() {
            backend.r2c_in_place(row).unwrap();
        }

        let mut columns = vec![vec![0.0; 2 * nx]; cy];
        for (i, row) in row_spectra.iter().enumerate() {
            let row_c = as_complex(row);
            for k in 0..cy {
                let c = row_c[k];
                columns[k][2 * i] = c.re;
                columns[k][2 * i + 1] = c.im;
            }
        }
        for col in columns.iter_mut() {
            backend.c2c_in_place(col).unwrap();
        }

        let mut result = vec![vec![0.0; 2 * cy]; nx];
        for (k, col) in columns.iter().enumerate() {
            let col_c = as_complex(col);
            for (kx, row) in result.iter_mut().enumerate() {
                let out = as_complex_mut(row);
                out[k] = col_c[kx];
            }
        }
        result
    }

    fn run_distributed(p: usize, nx_global: usize, ny: usize, scheme: CommScheme, rows: Vec<Vec<Vec<f64>>>) -> Vec<Vec<f64>> {
        let registry = Arc::new(CommunicatorRegistry::new(p));
        let mut handles = Vec::new();
        for (site, site_rows) in rows.into_iter().enumerate() {
            let registry = registry.clone();
            handles.push(thread::spawn(move || {
                let tile = row_tile_from(site_rows, ny);
                let config = Config::new(p, site, scheme, PlanQuality::Estimate);
                let mut engine = Engine::initialize(tile, nx_global, config, &registry).unwrap();
                engine.execute().unwrap().into_rows()
            }));
        }
        handles.into_iter().flat_map(|h| h.join().unwrap()).collect()
    }

    fn ramp_matrix(nx: usize, ny: usize) -> Vec<Vec<f64>> {
        let cy = ny / 2 + 1;
        (0..nx)
            .map(|r| {
                let mut row = vec![0.0; 2 * cy];
                for v in 0..ny {
                    row[v] = (r * ny + v) as f64;
                }
                row
            })
            .collect()
    }

    // P=2, Nx=8, Ny=14.
    #[test]
    fn distributed_result_matches_serial_reference_p2() {
        let p = 2;
        let nx = 8;
        let ny = 14;
        let full = ramp_matrix(nx, ny);
        let nx_local = nx / p;
        let per_site: Vec<Vec<Vec<f64>>> = full.chunks(nx_local).map(|c| c.to_vec()).collect();

        for &scheme in &[CommScheme::Scatter, CommScheme::AllToAll] {
            let distributed = run_distributed(p, nx, ny, scheme, per_site.clone());
            let reference = serial_reference_r2c(nx, ny, &full);
            assert_eq!(distributed.len(), reference.len());
            for (d, r) in distributed.iter().zip(reference.iter()) {
                for (a, b) in d.iter().zip(r.iter()) {
                    assert!((a - b).abs() <= 1e-9 * (nx * ny) as f64, "a={} b={}", a, b);
                }
            }
        }
    }

    // P=3, Nx=6, Ny=4.
    #[test]
    fn distributed_result_matches_serial_reference_p3() {
        let p = 3;
        let nx = 6;
        let ny = 4;
        let full = ramp_matrix(nx, ny);
        let nx_local = nx / p;
        let per_site: Vec<Vec<Vec<f64>>> = full.chunks(nx_local).map(|c| c.to_vec()).collect();

        let distributed = run_distributed(p, nx, ny, CommScheme::Scatter, per_site);
        let reference = serial_reference_r2c(nx, ny, &full);
        for (d, r) in distributed.iter().zip(reference.iter()) {
            for (a, b) in d.iter().zip(r.iter()) {
                assert!((a - b).abs() <= 1e-9 * (nx * ny) as f64, "a={} b={}", a, b);
            }
        }
    }

    #[test]
    fn teardown_without_execute_does_not_panic() {
        // Dropping an engine that was never executed must release its
        // plans/communicators cleanly.
        let registry = CommunicatorRegistry::new(1);
        let tile = RowTile::zeros(2, 8);
        let config = Config::new(1, 0, CommScheme::AllToAll, PlanQuality::Estimate);
        let engine = Engine::initialize(tile, 2, config, &registry).unwrap();
        drop(engine);
    }
}
