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

//! Row-tile and column-tile: the locally owned slices of the global
//! matrix and of its post-row-FFT transpose.

use crate::error::{FftError, Result};

/// The locally owned contiguous subset of rows of the global real matrix.
///
/// Each row is stored padded to `Ny + 2` reals (`Cy = Ny/2 + 1` complex
/// slots) so it can hold either the original real row or the in-place
/// R2C result. Capacity is fixed for the tile's lifetime; rows are never
/// reallocated between transforms.
#[derive(Clone)]
pub struct RowTile {
    rows: Vec<Vec<f64>>,
    cy: usize,
}

impl RowTile {
    /// Build a row-tile from caller-supplied rows, validating that every
    /// row has the padded capacity implied by `ny` (`Ny` real samples).
    pub fn new(rows: Vec<Vec<f64>>, ny: usize) -> Result<Self> {
        let cy = ny / 2 + 1;
        let expected_len = 2 * cy;
        for (i, row) in rows.iter().enumerate() {
            if row.len() != expected_len {
                return Err(FftError::Configuration(format!(
                    "row {} has length {}, expected {} (Ny={} padded to 2*Cy)",
                    i,
                    row.len(),
                    expected_len,
                    ny
                )));
            }
        }
        Ok(Self { rows, cy })
    }

    /// Allocate an all-zero tile of `nx_local` rows sized for `ny` real
    /// samples per row.
    pub fn zeros(nx_local: usize, ny: usize) -> Self {
        let cy = ny / 2 + 1;
        Self {
            rows: vec![vec![0.0; 2 * cy]; nx_local],
            cy,
        }
    }

    pub fn nx_local(&self) -> usize {
        self.rows.len()
    }

    /// `Cy = Ny/2 + 1`, the number of complex slots per row.
    pub fn cy(&self) -> usize {
        self.cy
    }

    pub fn row(&self, i: usize) -> &[f64] {
        &self.rows[i]
    }

    pub fn row_mut(&mut self, i: usize) -> &mut [f64] {
        &mut self.rows[i]
    }

    pub(crate) fn rows_mut(&mut self) -> &mut [Vec<f64>] {
        &mut self.rows
    }

    pub(crate) fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Vec<f64>> {
        self.rows
    }
}

/// The locally owned contiguous subset of rows of the logically
/// transposed (post-row-FFT) spectrum. Exists only between the two
/// global transposes of one `execute()` call.
#[derive(Clone)]
pub struct ColumnTile {
    rows: Vec<Vec<f64>>,
    cx: usize,
}

impl ColumnTile {
    /// Allocate an all-zero column-tile of `ny_local` rows, each sized
    /// for `cx` complex slots (`2*cx` reals).
    pub fn zeros(ny_local: usize, cx: usize) -> Self {
        Self {
            rows: vec![vec![0.0; 2 * cx]; ny_local],
            cx,
        }
    }

    pub fn ny_local(&self) -> usize {
        self.rows.len()
    }

    pub fn cx(&self) -> usize {
        self.cx
    }

    pub fn row(&self, i: usize) -> &[f64] {
        &self.rows[i]
    }

    pub fn row_mut(&mut self, i: usize) -> &mut [f64] {
        &mut self.rows[i]
    }

    pub(crate) fn rows_mut(&mut self) -> &mut [Vec<f64>] {
        &mut self.rows
    }

    pub(crate) fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_mismatched_row_length() {
        let rows = vec![vec![0.0; 5]];
        assert!(RowTile::new(rows, 14).is_err());
    }

    #[test]
    fn accepts_correctly_padded_rows() {
        // Ny=14 -> Cy=8 -> padded length 16
        let rows = vec![vec![0.0; 16]; 4];
        let tile = RowTile::new(rows, 14).unwrap();
        assert_eq!(tile.nx_local(), 4);
        assert_eq!(tile.cy(), 8);
    }
}
