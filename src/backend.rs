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

//! Local 1D FFT backend contract and the `rustfft`/`realfft`
//! implementation of it.

use std::sync::Arc;

use num_complex::Complex64;
use realfft::{RealFftPlanner, RealToComplex};
use rustfft::{Fft, FftDirection, FftPlanner};

use crate::config::PlanQuality;
use crate::error::{FftError, Result};

/// Reinterpret an even-length `[f64]` as a `[Complex64]` of half the
/// length, the same "address memory as reals, stride 2" view the wire
/// layout and pack kernels use.
///
/// # Safety invariant
/// `Complex64` is `#[repr(C)]` with fields `(re: f64, im: f64)`, so it
/// has the same size and alignment as `[f64; 2]`; an even-length
/// `&mut [f64]` and the corresponding `&mut [Complex64]` denote the same
/// memory.
pub(crate) fn as_complex_mut(buf: &mut [f64]) -> &mut [Complex64] {
    debug_assert_eq!(buf.len() % 2, 0);
    unsafe { std::slice::from_raw_parts_mut(buf.as_mut_ptr() as *mut Complex64, buf.len() / 2) }
}

pub(crate) fn as_complex(buf: &[f64]) -> &[Complex64] {
    debug_assert_eq!(buf.len() % 2, 0);
    unsafe { std::slice::from_raw_parts(buf.as_ptr() as *const Complex64, buf.len() / 2) }
}

/// Local 1D FFT backend contract: plan creation up front, execute a
/// prepared plan in place any number of times, teardown via `Drop`.
pub trait FftBackend: Send + Sync {
    /// `Ny`, the real row length the R2C plan was built for.
    fn row_len_real(&self) -> usize;
    /// `Cy = Ny/2 + 1`, the complex row length R2C produces.
    fn row_len_complex(&self) -> usize;
    /// `Cx`, the length of the forward C2C plan (number of columns).
    fn col_len(&self) -> usize;

    /// Run the prepared R2C plan on `row`, which holds `Ny` reals on
    /// entry and `Cy` complex values (as `2*Cy` reals) on return. `row`
    /// must have length `2 * row_len_complex()`.
    fn r2c_in_place(&self, row: &mut [f64]) -> Result<()>;

    /// Run the prepared forward C2C plan on `row`, which holds `Cx`
    /// complex values (as `2*Cx` reals) both on entry and on return.
    fn c2c_in_place(&self, row: &mut [f64]) -> Result<()>;
}

/// `rustfft` + `realfft`-backed implementation of [`FftBackend`].
///
/// `realfft`'s safe API requires distinct input/output buffers for the
/// real-to-complex transform (unlike FFTW's native in-place r2c), so the
/// R2C stage here copies through a scratch buffer; the row's own storage
/// is still what holds the result afterwards, and its capacity is never
/// reallocated.
pub struct RustfftBackend {
    ny: usize,
    cy: usize,
    cx: usize,
    r2c: Arc<dyn RealToComplex<f64>>,
    c2c_fwd: Arc<dyn Fft<f64>>,
}

impl RustfftBackend {
    /// Build the R2C plan (length `ny`) and the forward C2C plan (length
    /// `cx`). `quality` is accepted for interface parity with the
    /// backend contract; `rustfft`/`realfft` do not expose FFTW-style
    /// planning effort levels, so every quality level plans the same
    /// way here (logged once at `debug` so callers can tell).
    pub fn new(ny: usize, cx: usize, quality: PlanQuality) -> Result<Self> {
        if ny == 0 || ny % 2 != 0 {
            return Err(FftError::Configuration(format!(
                "Ny must be a positive even number, got {}",
                ny
            )));
        }
        if cx == 0 {
            return Err(FftError::Configuration("Cx must be positive".into()));
        }
        log::debug!(
            "planning R2C(len={}) and C2C(len={}) at quality {:?} (rustfft/realfft ignore plan quality)",
            ny,
            cx,
            quality
        );
        let cy = ny / 2 + 1;
        let mut real_planner = RealFftPlanner::<f64>::new();
        let r2c = real_planner.plan_fft_forward(ny);
        let mut planner = FftPlanner::<f64>::new();
        let c2c_fwd = planner.plan_fft(cx, FftDirection::Forward);
        Ok(Self {
            ny,
            cy,
            cx,
            r2c,
            c2c_fwd,
        })
    }
}

impl FftBackend for RustfftBackend {
    fn row_len_real(&self) -> usize {
        self.ny
    }

    fn row_len_complex(&self) -> usize {
        self.cy
    }

    fn col_len(&self) -> usize {
        self.cx
    }

    fn r2c_in_place(&self, row: &mut [f64]) -> Result<()> {
        debug_assert_eq!(row.len(), 2 * self.cy);
        let mut input = row[..self.ny].to_vec();
        let mut output = vec![Complex64::new(0.0, 0.0); self.cy];
        self.r2c
            .process(&mut input, &mut output)
            .map_err(|e| FftError::Planning(format!("{:?}", e)))?;
        as_complex_mut(row).copy_from_slice(&output);
        Ok(())
    }

    fn c2c_in_place(&self, row: &mut [f64]) -> Result<()> {
        debug_assert_eq!(row.len(), 2 * self.cx);
        let complex = as_complex_mut(row);
        let mut scratch = vec![Complex64::new(0.0, 0.0); self.c2c_fwd.get_inplace_scratch_len()];
        self.c2c_fwd.process_with_scratch(complex, &mut scratch);
        Ok(())
    }
}
