//! Sequential and parallel materialization of windowed delayed arrays.
//!
//! The loader decomposes a shape into border regions, filled from the
//! bounds-aware base function, and the window interior, filled from the
//! window function. Ranks 1 and 2 are hand-specialized; higher ranks peel
//! the outer axis and recurse, so the 2-D interior kernel is always the
//! innermost loop. Every cell is written exactly once.
//!
//! Parallel loads submit one task per subregion. Tasks write disjoint
//! linear-index ranges of the shared buffer, so the final contents are
//! independent of the schedule; no locks are involved.

use std::ops::Range;

use crate::array::{ComputeMode, WindowedArray};
use crate::scheduler::{with_scheduler, Scope};
use crate::shape::Shape;
use crate::unroll::unroll_and_jam;
use crate::{LoadError, Result};

/// A raw pointer wrapper that is `Send` + `Sync`.
///
/// # Safety
///
/// The caller must guarantee that the pointed-to data is valid for the
/// lifetime of any parallel operation and that no data races occur: tasks
/// sharing one `SendPtr` must write to disjoint index ranges.
pub struct SendPtr<T>(*mut T);

impl<T> Clone for SendPtr<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for SendPtr<T> {}

unsafe impl<T> Send for SendPtr<T> {}
unsafe impl<T> Sync for SendPtr<T> {}

impl<T> SendPtr<T> {
    /// Wrap a raw pointer.
    pub fn new(ptr: *mut T) -> Self {
        Self(ptr)
    }

    /// Offset the pointer by `offset` elements.
    ///
    /// # Safety
    ///
    /// The offset pointer must stay within the same allocation.
    pub unsafe fn add(self, offset: usize) -> Self {
        Self(self.0.add(offset))
    }

    /// Write `value` at element offset `offset`.
    ///
    /// # Safety
    ///
    /// `offset` must be within the allocation and no other thread may touch
    /// that slot concurrently.
    pub unsafe fn write(self, offset: usize, value: T) {
        self.0.add(offset).write(value);
    }
}

/// Rank-specialized fill kernels behind the public load entry points.
///
/// Implemented for [`Ix1`](crate::Ix1)..[`Ix5`](crate::Ix5): ranks 1 and 2
/// directly, ranks 3 and above by recursion over the outer axis.
pub trait Fill: Shape {
    /// Fill `dst` on the calling thread.
    ///
    /// # Safety
    ///
    /// `dst` must be valid for writes of `wd.size().total_elem()` elements.
    unsafe fn fill_seq<T, F, G>(wd: &WindowedArray<Self, F, G>, dst: SendPtr<T>)
    where
        T: Copy,
        F: Fn(Self) -> T,
        G: Fn(Self) -> T;

    /// Submit fill tasks for every subregion to `scope`.
    ///
    /// # Safety
    ///
    /// `dst` must be valid for writes of `wd.size().total_elem()` elements
    /// until the scope joins.
    unsafe fn fill_par<'scope, T, F, G>(
        scope: &Scope<'_, 'scope>,
        wd: &'scope WindowedArray<Self, F, G>,
        dst: SendPtr<T>,
    ) where
        T: Copy + Send + 'scope,
        F: Fn(Self) -> T + Sync,
        G: Fn(Self) -> T + Sync;
}

// ============================================================================
// Entry points
// ============================================================================

/// Materialize `wd` into `out` on the calling thread.
pub fn load_seq<T, D, F, G>(wd: &WindowedArray<D, F, G>, out: &mut [T]) -> Result<()>
where
    D: Fill,
    T: Copy,
    F: Fn(D) -> T,
    G: Fn(D) -> T,
{
    ensure_buffer(wd.size().total_elem(), out.len())?;
    unsafe { D::fill_seq(wd, SendPtr::new(out.as_mut_ptr())) };
    Ok(())
}

/// Materialize `wd` into `out` across a private worker pool.
///
/// One worker is created per entry of `worker_ids`; an empty list uses all
/// available cores. The pool lives for the duration of the call. On failure
/// the cells already written stay in `out`, which is then invalid as a whole.
pub fn load_par<T, D, F, G>(
    worker_ids: &[usize],
    wd: &WindowedArray<D, F, G>,
    out: &mut [T],
) -> Result<()>
where
    D: Fill,
    T: Copy + Send,
    F: Fn(D) -> T + Sync,
    G: Fn(D) -> T + Sync,
{
    ensure_buffer(wd.size().total_elem(), out.len())?;
    let dst = SendPtr::new(out.as_mut_ptr());
    with_scheduler(worker_ids, |scope| {
        unsafe { D::fill_par(scope, wd, dst) };
        Ok(())
    })
}

/// Materialize `wd` into `out`, dispatching on its [`ComputeMode`].
pub fn load<T, D, F, G>(wd: &WindowedArray<D, F, G>, out: &mut [T]) -> Result<()>
where
    D: Fill,
    T: Copy + Send,
    F: Fn(D) -> T + Sync,
    G: Fn(D) -> T + Sync,
{
    match wd.comp() {
        ComputeMode::Sequential => load_seq(wd, out),
        ComputeMode::Parallel { workers } => load_par(workers, wd, out),
    }
}

fn ensure_buffer(expected: usize, actual: usize) -> Result<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(LoadError::BufferSize { expected, actual })
    }
}

// ============================================================================
// Shared region kernels
// ============================================================================

/// Write `at` over a rectangle of a rank-2 row-major buffer with row
/// stride `n`.
///
/// # Safety
///
/// Every `i * n + j` for the rectangle must be a valid write offset of `dst`.
unsafe fn fill_rect<T, F>(at: &F, n: usize, rows: Range<usize>, cols: Range<usize>, dst: SendPtr<T>)
where
    T: Copy,
    F: Fn([usize; 2]) -> T,
{
    for i in rows {
        for j in cols.clone() {
            dst.write(i * n + j, at([i, j]));
        }
    }
}

/// Write `at` over whole outer-coordinate slabs of a rank >= 2 array.
///
/// A slab spans the full inner shape, so its cells occupy one contiguous
/// linear range and row-major index iteration matches the write cursor.
///
/// # Safety
///
/// Every linear offset of the slabs must be a valid write offset of `dst`.
unsafe fn fill_slabs<T, D, F>(at: &F, inner_shape: D::Lower, outers: Range<usize>, dst: SendPtr<T>)
where
    T: Copy,
    D: Shape,
    F: Fn(D) -> T,
{
    let inner_stride = inner_shape.total_elem();
    for i in outers {
        let mut cursor = i * inner_stride;
        <D::Lower as Shape>::for_each(<D::Lower as Shape>::zero(), inner_shape, &mut |tail| {
            unsafe { dst.write(cursor, at(D::cons(i, tail))) };
            cursor += 1;
        });
    }
}

// ============================================================================
// Rank 1
// ============================================================================

impl Fill for [usize; 1] {
    unsafe fn fill_seq<T, F, G>(wd: &WindowedArray<Self, F, G>, dst: SendPtr<T>)
    where
        T: Copy,
        F: Fn(Self) -> T,
        G: Fn(Self) -> T,
    {
        let [n] = wd.size();
        let [win_start] = wd.win_start();
        let [win_size] = wd.win_size();
        let win_end = win_start + win_size;

        for i in 0..win_start {
            dst.write(i, (wd.base.at)([i]));
        }
        for i in win_start..win_end {
            dst.write(i, (wd.win_at)([i]));
        }
        for i in win_end..n {
            dst.write(i, (wd.base.at)([i]));
        }
    }

    unsafe fn fill_par<'scope, T, F, G>(
        scope: &Scope<'_, 'scope>,
        wd: &'scope WindowedArray<Self, F, G>,
        dst: SendPtr<T>,
    ) where
        T: Copy + Send + 'scope,
        F: Fn(Self) -> T + Sync,
        G: Fn(Self) -> T + Sync,
    {
        let [n] = wd.size();
        let [win_start] = wd.win_start();
        let [win_size] = wd.win_size();
        let win_end = win_start + win_size;

        if win_start > 0 {
            scope.schedule(move |_| {
                for i in 0..win_start {
                    unsafe { dst.write(i, (wd.base.at)([i])) };
                }
                Ok(())
            });
        }
        if win_end < n {
            scope.schedule(move |_| {
                for i in win_end..n {
                    unsafe { dst.write(i, (wd.base.at)([i])) };
                }
                Ok(())
            });
        }

        let workers = scope.num_workers();
        let chunk = win_size / workers;
        if chunk > 0 {
            for worker in 0..workers {
                let lo = win_start + worker * chunk;
                let hi = lo + chunk;
                scope.schedule(move |_| {
                    for i in lo..hi {
                        unsafe { dst.write(i, (wd.win_at)([i])) };
                    }
                    Ok(())
                });
            }
        }
        let slack_start = win_start + workers * chunk;
        if slack_start < win_end {
            scope.schedule(move |_| {
                for i in slack_start..win_end {
                    unsafe { dst.write(i, (wd.win_at)([i])) };
                }
                Ok(())
            });
        }
    }
}

// ============================================================================
// Rank 2
// ============================================================================

impl Fill for [usize; 2] {
    unsafe fn fill_seq<T, F, G>(wd: &WindowedArray<Self, F, G>, dst: SendPtr<T>)
    where
        T: Copy,
        F: Fn(Self) -> T,
        G: Fn(Self) -> T,
    {
        let [m, n] = wd.size();
        let [row_start, col_start] = wd.win_start();
        let [win_rows, win_cols] = wd.win_size();
        let row_end = row_start + win_rows;
        let col_end = col_start + win_cols;

        // Top and bottom strips at full width, then the side bands.
        fill_rect(&wd.base.at, n, 0..row_start, 0..n, dst);
        fill_rect(&wd.base.at, n, row_end..m, 0..n, dst);
        fill_rect(&wd.base.at, n, row_start..row_end, 0..col_start, dst);
        fill_rect(&wd.base.at, n, row_start..row_end, col_end..n, dst);

        unroll_and_jam(
            wd.unroll_hint(),
            row_start..row_end,
            col_start..col_end,
            |i, j| unsafe { dst.write(i * n + j, (wd.win_at)([i, j])) },
        );
    }

    unsafe fn fill_par<'scope, T, F, G>(
        scope: &Scope<'_, 'scope>,
        wd: &'scope WindowedArray<Self, F, G>,
        dst: SendPtr<T>,
    ) where
        T: Copy + Send + 'scope,
        F: Fn(Self) -> T + Sync,
        G: Fn(Self) -> T + Sync,
    {
        let [m, n] = wd.size();
        let [row_start, col_start] = wd.win_start();
        let [win_rows, win_cols] = wd.win_size();
        let row_end = row_start + win_rows;
        let col_end = col_start + win_cols;

        let borders = [
            (0..row_start, 0..n),
            (row_end..m, 0..n),
            (row_start..row_end, 0..col_start),
            (row_start..row_end, col_end..n),
        ];
        for (rows, cols) in borders {
            if !rows.is_empty() && !cols.is_empty() {
                scope.schedule(move |_| {
                    unsafe { fill_rect(&wd.base.at, n, rows, cols, dst) };
                    Ok(())
                });
            }
        }

        // The interior splits by row blocks: the inner axis is contiguous in
        // memory, so each task writes a dense run of linear indices per row.
        let h = wd.unroll_hint();
        let workers = scope.num_workers();
        let chunk_height = win_rows / workers;
        if chunk_height > 0 {
            for worker in 0..workers {
                let top = row_start + worker * chunk_height;
                let rows = top..top + chunk_height;
                scope.schedule(move |_| {
                    unroll_and_jam(h, rows, col_start..col_end, |i, j| unsafe {
                        dst.write(i * n + j, (wd.win_at)([i, j]))
                    });
                    Ok(())
                });
            }
        }
        let slack_top = row_start + workers * chunk_height;
        if slack_top < row_end {
            scope.schedule(move |_| {
                unroll_and_jam(h, slack_top..row_end, col_start..col_end, |i, j| unsafe {
                    dst.write(i * n + j, (wd.win_at)([i, j]))
                });
                Ok(())
            });
        }
    }
}

// ============================================================================
// Ranks 3 and above
// ============================================================================

macro_rules! impl_fill_recursive {
    ($($n:literal => $m:literal),+ $(,)?) => {$(
        impl Fill for [usize; $n] {
            unsafe fn fill_seq<T, F, G>(wd: &WindowedArray<Self, F, G>, dst: SendPtr<T>)
            where
                T: Copy,
                F: Fn(Self) -> T,
                G: Fn(Self) -> T,
            {
                let (outer, inner_shape) = wd.size().uncons();
                let inner_stride = inner_shape.total_elem();
                let (win_start, _) = wd.win_start().uncons();
                let (win_size, _) = wd.win_size().uncons();

                fill_slabs::<T, Self, F>(&wd.base.at, inner_shape, 0..win_start, dst);
                fill_slabs::<T, Self, F>(&wd.base.at, inner_shape, win_start + win_size..outer, dst);

                for i in win_start..win_start + win_size {
                    let slice = wd.slice_outer(i);
                    <[usize; $m] as Fill>::fill_seq(&slice, dst.add(i * inner_stride));
                }
            }

            unsafe fn fill_par<'scope, T, F, G>(
                scope: &Scope<'_, 'scope>,
                wd: &'scope WindowedArray<Self, F, G>,
                dst: SendPtr<T>,
            ) where
                T: Copy + Send + 'scope,
                F: Fn(Self) -> T + Sync,
                G: Fn(Self) -> T + Sync,
            {
                let (outer, inner_shape) = wd.size().uncons();
                let inner_stride = inner_shape.total_elem();
                let (win_start, _) = wd.win_start().uncons();
                let (win_size, _) = wd.win_size().uncons();
                let win_end = win_start + win_size;

                if win_start > 0 {
                    scope.schedule(move |_| {
                        unsafe {
                            fill_slabs::<T, Self, F>(&wd.base.at, inner_shape, 0..win_start, dst)
                        };
                        Ok(())
                    });
                }
                if win_end < outer {
                    scope.schedule(move |_| {
                        unsafe {
                            fill_slabs::<T, Self, F>(&wd.base.at, inner_shape, win_end..outer, dst)
                        };
                        Ok(())
                    });
                }

                // Parallelism is harvested over the outer window axis; each
                // slice loads sequentially on its worker.
                for i in win_start..win_end {
                    scope.schedule(move |_| {
                        let slice = wd.slice_outer(i);
                        unsafe {
                            <[usize; $m] as Fill>::fill_seq(&slice, dst.add(i * inner_stride))
                        };
                        Ok(())
                    });
                }
            }
        }
    )+};
}

impl_fill_recursive!(3 => 2, 4 => 3, 5 => 4);
