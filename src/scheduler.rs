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

//! Intra-locality task-parallel scheduler: bounded parallel-for over a
//! scoped thread pool, with implicit barriers between stages (every
//! `parallel_for*` call returns only once all of its work items have
//! completed).

// Calculates ceil(x/y)
pub(crate) fn ceil_div(x: usize, y: usize) -> usize {
    if x == 0 {
        0
    } else {
        1 + (x - 1) / y
    }
}

/// Run `f(i)` for every `i` in `0..n`, splitting the range into
/// contiguous chunks across the pool's workers. Falls back to a serial
/// loop when the pool has fewer than two threads.
pub(crate) fn parallel_for(pool: &mut scoped_threadpool::Pool, n: usize, f: impl Fn(usize) + Sync) {
    if n == 0 {
        return;
    }
    let num_threads = pool.thread_count() as usize;
    if num_threads < 2 {
        for i in 0..n {
            f(i);
        }
        return;
    }
    let chunk = ceil_div(n, num_threads);
    pool.scoped(|s| {
        let mut start = 0;
        while start < n {
            let end = (start + chunk).min(n);
            let f = &f;
            s.execute(move || {
                for i in start..end {
                    f(i);
                }
            });
            start = end;
        }
    });
}

/// Run `f(i, item)` for every element of `items`, handing each task a
/// disjoint, exclusively-owned sub-slice (via `chunks_mut`) so no
/// locking is required between workers.
pub(crate) fn parallel_for_mut<T: Send>(
    pool: &mut scoped_threadpool::Pool,
    items: &mut [T],
    f: impl Fn(usize, &mut T) + Sync,
) {
    let n = items.len();
    if n == 0 {
        return;
    }
    let num_threads = pool.thread_count() as usize;
    if num_threads < 2 {
        for (i, item) in items.iter_mut().enumerate() {
            f(i, item);
        }
        return;
    }
    let chunk = ceil_div(n, num_threads);
    pool.scoped(|s| {
        for (t, group) in items.chunks_mut(chunk).enumerate() {
            let base = t * chunk;
            let f = &f;
            s.execute(move || {
                for (off, item) in group.iter_mut().enumerate() {
                    f(base + off, item);
                }
            });
        }
    });
}
