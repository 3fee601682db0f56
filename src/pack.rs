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

//! Pack/unpack index kernels: the rearrangement between a locally-owned
//! tile and the `P` per-destination buffers a transpose collective
//! sends or receives, and the interleave that turns a received set of
//! per-source buffers back into a tile.
//!
//! `transpose_y_to_x`/`transpose_x_to_y` are parallelised over the
//! *output* row index `k` rather than the source index `i`: the body is
//! independent for every `(k, i)` pair, so running the `i`/`jj` loops
//! serially inside a per-`k` task is equivalent and lets the scheduler
//! use plain `chunks_mut` instead of the unsafe disjoint-write helper
//! the split kernels need.

use scoped_threadpool::Pool;

use crate::disjoint::DisjointSlice;
use crate::scheduler::{parallel_for, parallel_for_mut};
use crate::tile::{ColumnTile, RowTile};

/// `split_Y`: regroup every row of `tile` into `P` pack buffers, one per
/// destination locality, each already sized `nx_local * chunk_y`.
pub(crate) fn split_y(pool: &mut Pool, tile: &RowTile, chunk_y: usize, buffers: &mut [Vec<f64>]) {
    let p = buffers.len();
    let nx_local = tile.nx_local();
    let handles: Vec<DisjointSlice> = buffers.iter_mut().map(|b| DisjointSlice::new(b)).collect();
    parallel_for(pool, nx_local, |i| {
        let row = tile.row(i);
        for j in 0..p {
            let src = &row[j * chunk_y..(j + 1) * chunk_y];
            // SAFETY: each row index `i` writes to a disjoint region
            // `[i*chunk_y, (i+1)*chunk_y)` of buffer `j`; no two
            // concurrent calls ever touch the same region.
            let dst = unsafe { handles[j].slice_mut(i * chunk_y, chunk_y) };
            dst.copy_from_slice(src);
        }
    });
}

/// `split_X`: mirror of [`split_y`] over the column-tile.
pub(crate) fn split_x(pool: &mut Pool, tile: &ColumnTile, chunk_x: usize, buffers: &mut [Vec<f64>]) {
    let p = buffers.len();
    let ny_local = tile.ny_local();
    let handles: Vec<DisjointSlice> = buffers.iter_mut().map(|b| DisjointSlice::new(b)).collect();
    parallel_for(pool, ny_local, |i| {
        let row = tile.row(i);
        for j in 0..p {
            let src = &row[j * chunk_x..(j + 1) * chunk_x];
            // SAFETY: see split_y.
            let dst = unsafe { handles[j].slice_mut(i * chunk_x, chunk_x) };
            dst.copy_from_slice(src);
        }
    });
}

/// `transpose_Y_to_X`: interleave the receive set from transpose #1 into
/// `dest`, a freshly allocated column-tile of `ny_local` rows. `recv[i]`
/// holds `nx_local * chunk_y` reals contributed by source `i`.
pub(crate) fn transpose_y_to_x(pool: &mut Pool, recv: &[Vec<f64>], chunk_y: usize, nx_local: usize, dest: &mut ColumnTile) {
    let p = recv.len();
    parallel_for_mut(pool, dest.rows_mut(), |k, trans_row| {
        for i in 0..p {
            let source = &recv[i];
            for jj in 0..nx_local {
                let index_in = chunk_y * jj + 2 * k;
                let index_out = 2 * p * jj + 2 * i;
                trans_row[index_out] = source[index_in];
                trans_row[index_out + 1] = source[index_in + 1];
            }
        }
    });
}

/// `transpose_X_to_Y`: mirror of [`transpose_y_to_x`], returning data to
/// the row-wise distribution. `recv[i]` holds `ny_local * chunk_x` reals
/// contributed by source `i`.
pub(crate) fn transpose_x_to_y(pool: &mut Pool, recv: &[Vec<f64>], chunk_x: usize, ny_local: usize, dest: &mut RowTile) {
    let p = recv.len();
    parallel_for_mut(pool, dest.rows_mut(), |k, row| {
        for i in 0..p {
            let source = &recv[i];
            for jj in 0..ny_local {
                let index_in = chunk_x * jj + 2 * k;
                let index_out = 2 * p * jj + 2 * i;
                row[index_out] = source[index_in];
                row[index_out + 1] = source[index_in + 1];
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tile::RowTile;

    // P=2, nx_local=2, Ny=4 -> Cy=3 -> row padded to 2*Cy=6 reals,
    // chunk_y = 2*Cy/P = 3.
    #[test]
    fn split_y_groups_contributions_by_destination() {
        let rows = vec![
            vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0],
            vec![10.0, 11.0, 12.0, 13.0, 14.0, 15.0],
        ];
        let tile = RowTile::new(rows, 4).unwrap();
        let mut pool = Pool::new(1);
        let mut buffers = vec![vec![0.0; 2 * 3]; 2];
        split_y(&mut pool, &tile, 3, &mut buffers);
        assert_eq!(buffers[0], vec![0.0, 1.0, 2.0, 10.0, 11.0, 12.0]);
        assert_eq!(buffers[1], vec![3.0, 4.0, 5.0, 13.0, 14.0, 15.0]);
    }

    #[test]
    fn split_then_transpose_round_trips_single_locality() {
        // P=1: split is a no-op reshuffle and transpose must reproduce
        // the original row data transposed row-for-row (ny_local == Cy).
        let rows = vec![vec![1.0, 2.0, 3.0, 4.0]];
        let tile = RowTile::new(rows, 2).unwrap();
        let mut pool = Pool::new(1);
        let chunk_y = 2 * tile.cy() / 1;
        let mut buffers = vec![vec![0.0; tile.nx_local() * chunk_y]; 1];
        split_y(&mut pool, &tile, chunk_y, &mut buffers);
        let mut dest = ColumnTile::zeros(tile.cy(), tile.nx_local());
        transpose_y_to_x(&mut pool, &buffers, chunk_y, tile.nx_local(), &mut dest);
        assert_eq!(dest.row(0), &[1.0, 2.0]);
        assert_eq!(dest.row(1), &[3.0, 4.0]);
    }
}
