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

//! A raw-pointer handle to a `[f64]` buffer for the one case (packing)
//! where the natural parallel work-item (a source row) writes into
//! several *other* buffers at once, so `chunks_mut` on a single buffer
//! cannot express the disjointness the scheduler relies on.

/// A pointer to a `[f64]` buffer that the caller has partitioned into
/// non-overlapping regions, one per work item, indexed by the packing
/// stride. Cloning just copies the pointer/len, not the data.
#[derive(Clone, Copy)]
pub(crate) struct DisjointSlice {
    ptr: *mut f64,
    len: usize,
}

// SAFETY: `DisjointSlice` is handed out to multiple worker threads, each
// of which only ever calls `slice_mut` with a region disjoint from every
// other thread's region for the lifetime of one parallel-for stage. That
// invariant is established by the packing index arithmetic in `pack.rs`
// (distinct source-row indices map to non-overlapping byte ranges), not
// by anything in this type itself.
unsafe impl Send for DisjointSlice {}
unsafe impl Sync for DisjointSlice {}

impl DisjointSlice {
    pub(crate) fn new(buf: &mut [f64]) -> Self {
        Self {
            ptr: buf.as_mut_ptr(),
            len: buf.len(),
        }
    }

    /// Returns a mutable view of `buf[start..start+len]`.
    ///
    /// # Safety
    /// The caller must ensure that no other live call to `slice_mut` on
    /// this same `DisjointSlice` (from any thread) overlaps
    /// `start..start+len`.
    pub(crate) unsafe fn slice_mut(&self, start: usize, len: usize) -> &mut [f64] {
        debug_assert!(start + len <= self.len);
        std::slice::from_raw_parts_mut(self.ptr.add(start), len)
    }
}
