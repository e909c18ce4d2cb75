//! Row-block unroll-and-jam for the 2-D interior kernel.
//!
//! Stencil-style access patterns touch vertically adjacent rows, so jamming
//! several rows into the inner column loop lets the compiler keep shared
//! reads in registers. Each jam width gets its own monomorphized kernel; the
//! per-iteration row calls are a compile-time-fixed straight-line sequence.

use std::ops::Range;

use crate::loops::loop_from;
use crate::MAX_UNROLL_ROWS;

/// Invoke `body(i, j)` for every cell of `rows x cols`, iterating rows in
/// blocks of `h` (clamped to `1..=MAX_UNROLL_ROWS`).
///
/// Within a block the inner loop over columns performs the block's row calls
/// back to back; the `rows % h` tail runs a scalar remainder loop. The set
/// of visited `(i, j)` pairs is exactly that of the scalar nested loop.
#[inline]
pub fn unroll_and_jam(
    h: usize,
    rows: Range<usize>,
    cols: Range<usize>,
    mut body: impl FnMut(usize, usize),
) {
    match h.clamp(1, MAX_UNROLL_ROWS) {
        1 => jam::<1>(rows, cols, &mut body),
        2 => jam::<2>(rows, cols, &mut body),
        3 => jam::<3>(rows, cols, &mut body),
        4 => jam::<4>(rows, cols, &mut body),
        5 => jam::<5>(rows, cols, &mut body),
        6 => jam::<6>(rows, cols, &mut body),
        _ => jam::<7>(rows, cols, &mut body),
    }
}

#[inline]
fn jam<const H: usize>(rows: Range<usize>, cols: Range<usize>, body: &mut impl FnMut(usize, usize)) {
    let tail_start = loop_from(
        rows.start,
        |i| i + H <= rows.end,
        |i| i + H,
        rows.start,
        |_, i| {
            for j in cols.clone() {
                for k in 0..H {
                    body(i + k, j);
                }
            }
            i + H
        },
    );
    for i in tail_start..rows.end {
        for j in cols.clone() {
            body(i, j);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scalar_cells(rows: Range<usize>, cols: Range<usize>) -> Vec<(usize, usize)> {
        let mut cells = Vec::new();
        for i in rows {
            for j in cols.clone() {
                cells.push((i, j));
            }
        }
        cells
    }

    #[test]
    fn test_visits_same_cells_as_scalar_loop() {
        for h in 0..=9 {
            for (rows, cols) in [
                (0..0, 0..5),
                (2..3, 1..4),
                (0..7, 0..3),
                (3..17, 2..9),
                (5..5, 0..0),
            ] {
                let mut visited = Vec::new();
                unroll_and_jam(h, rows.clone(), cols.clone(), |i, j| visited.push((i, j)));
                visited.sort_unstable();
                assert_eq!(
                    visited,
                    scalar_cells(rows.clone(), cols.clone()),
                    "h={h}, rows={rows:?}, cols={cols:?}"
                );
            }
        }
    }

    #[test]
    fn test_each_cell_exactly_once() {
        let mut counts = std::collections::HashMap::new();
        unroll_and_jam(3, 0..10, 0..4, |i, j| {
            *counts.entry((i, j)).or_insert(0usize) += 1;
        });
        assert_eq!(counts.len(), 40);
        assert!(counts.values().all(|&c| c == 1));
    }

    #[test]
    fn test_block_order_keeps_rows_jammed() {
        // With h = 2 and 2 full rows, the first two calls are the two rows of
        // column 0, not two columns of row 0.
        let mut visited = Vec::new();
        unroll_and_jam(2, 0..2, 0..2, |i, j| visited.push((i, j)));
        assert_eq!(visited, vec![(0, 0), (1, 0), (0, 1), (1, 1)]);
    }

    #[test]
    fn test_tail_rows_scalar() {
        // 5 rows with h = 3: one jammed block plus a 2-row scalar tail.
        let mut visited = Vec::new();
        unroll_and_jam(3, 0..5, 0..1, |i, j| visited.push((i, j)));
        assert_eq!(visited, vec![(0, 0), (1, 0), (2, 0), (3, 0), (4, 0)]);
    }

    #[test]
    fn test_oversized_factor_clamps() {
        // h beyond the cap behaves like the cap, not like a skipped block.
        let mut count = 0;
        unroll_and_jam(100, 0..20, 0..2, |_, _| count += 1);
        assert_eq!(count, 40);
    }
}
