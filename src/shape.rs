//! Index algebra for fixed-rank row-major shapes.
//!
//! Shapes and indices share one family of types: `[usize; N]`, aliased as
//! [`Ix1`]..[`Ix5`]. Component 0 is the outermost (slowest-varying) axis and
//! component `N - 1` the innermost, contiguous axis. The [`Shape`] trait ties
//! the family together through its `Lower` associated type, so rank-generic
//! code recurses from rank N to rank N - 1 with every operation monomorphic
//! per rank.
//!
//! Dimension selectors (`get_dim` and friends) are 1-based and count from the
//! innermost axis: dim 1 is the contiguous axis, dim `RANK` the outermost.
//! An out-of-range selector yields `None`, never a panic.

use std::fmt::Debug;
use std::hash::Hash;

use crate::loops::loop_from;

/// Rank-0 index, the recursion base of the family.
///
/// Its structural operations (`cons`, `uncons`, `snoc`, `unsnoc`) are
/// degenerate; rank-generic algorithms bottom out before calling them.
pub type Ix0 = [usize; 0];
/// Rank-1 index/shape.
pub type Ix1 = [usize; 1];
/// Rank-2 index/shape.
pub type Ix2 = [usize; 2];
/// Rank-3 index/shape.
pub type Ix3 = [usize; 3];
/// Rank-4 index/shape.
pub type Ix4 = [usize; 4];
/// Rank-5 index/shape.
pub type Ix5 = [usize; 5];

/// Fixed-rank row-major index and shape operations.
pub trait Shape: Copy + Debug + Eq + Hash + Send + Sync + 'static {
    /// The same family at rank `RANK - 1`.
    type Lower: Shape;

    /// Number of axes.
    const RANK: usize;

    /// Replicate `value` across all axes.
    fn splat(value: usize) -> Self;

    /// The all-zero index.
    fn zero() -> Self {
        Self::splat(0)
    }

    /// Number of axes, as a method.
    fn rank(&self) -> usize {
        Self::RANK
    }

    /// Product of all components; the element count when `self` is a shape.
    fn total_elem(&self) -> usize;

    /// Components as a `Vec`, outermost first. Used for error reporting.
    fn to_dims(&self) -> Vec<usize>;

    /// Prepend a component on the outer axis.
    fn cons(outer: usize, tail: Self::Lower) -> Self;

    /// Split off the outer axis component.
    fn uncons(self) -> (usize, Self::Lower);

    /// Append a component on the inner axis.
    fn snoc(init: Self::Lower, inner: usize) -> Self;

    /// Split off the inner axis component.
    fn unsnoc(self) -> (Self::Lower, usize);

    /// Componentwise binary map.
    fn lift2(self, other: Self, f: impl Fn(usize, usize) -> usize) -> Self;

    /// Component at `dim`, or `None` when `dim` is outside `1..=RANK`.
    fn get_dim(&self, dim: usize) -> Option<usize>;

    /// Replace the component at `dim`.
    fn set_dim(self, dim: usize, value: usize) -> Option<Self>;

    /// Remove the component at `dim`, lowering the rank by one.
    fn drop_dim(self, dim: usize) -> Option<Self::Lower>;

    /// Insert `value` at `dim` into a rank `RANK - 1` index, raising the rank.
    fn insert_dim(lower: Self::Lower, dim: usize, value: usize) -> Option<Self>;

    /// Extract the component at `dim` together with the remaining index.
    fn pull_out_dim(self, dim: usize) -> Option<(usize, Self::Lower)> {
        Some((self.get_dim(dim)?, self.drop_dim(dim)?))
    }

    /// Componentwise `ix < self`, with `self` as the shape.
    fn is_safe_index(&self, ix: Self) -> bool;

    /// Row-major linear offset of `ix` within the shape `self`.
    ///
    /// For a safe index the result is `< total_elem()`.
    fn to_linear(&self, ix: Self) -> usize;

    /// Inverse of [`to_linear`](Shape::to_linear); requires
    /// `linear < total_elem()`.
    fn from_linear(&self, linear: usize) -> Self;

    /// Row-major iteration over the boxed region `[start, end)`, outermost
    /// axis as the outer loop.
    fn for_each(start: Self, end: Self, body: &mut impl FnMut(Self));

    /// Like [`for_each`](Shape::for_each) with an independent per-axis step.
    ///
    /// Every step component must be nonzero.
    fn for_each_stepped(start: Self, end: Self, step: Self, body: &mut impl FnMut(Self));
}

impl Shape for Ix0 {
    type Lower = Ix0;

    const RANK: usize = 0;

    fn splat(_value: usize) -> Self {
        []
    }

    fn total_elem(&self) -> usize {
        1
    }

    fn to_dims(&self) -> Vec<usize> {
        Vec::new()
    }

    fn cons(_outer: usize, _tail: Ix0) -> Self {
        []
    }

    fn uncons(self) -> (usize, Ix0) {
        (0, [])
    }

    fn snoc(_init: Ix0, _inner: usize) -> Self {
        []
    }

    fn unsnoc(self) -> (Ix0, usize) {
        ([], 0)
    }

    fn lift2(self, _other: Self, _f: impl Fn(usize, usize) -> usize) -> Self {
        []
    }

    fn get_dim(&self, _dim: usize) -> Option<usize> {
        None
    }

    fn set_dim(self, _dim: usize, _value: usize) -> Option<Self> {
        None
    }

    fn drop_dim(self, _dim: usize) -> Option<Ix0> {
        None
    }

    fn insert_dim(_lower: Ix0, _dim: usize, _value: usize) -> Option<Self> {
        None
    }

    fn is_safe_index(&self, _ix: Self) -> bool {
        true
    }

    fn to_linear(&self, _ix: Self) -> usize {
        0
    }

    fn from_linear(&self, _linear: usize) -> Self {
        []
    }

    fn for_each(start: Self, _end: Self, body: &mut impl FnMut(Self)) {
        body(start);
    }

    fn for_each_stepped(start: Self, _end: Self, _step: Self, body: &mut impl FnMut(Self)) {
        body(start);
    }
}

macro_rules! impl_shape {
    ($($n:literal => $m:literal),+ $(,)?) => {$(
        impl Shape for [usize; $n] {
            type Lower = [usize; $m];

            const RANK: usize = $n;

            fn splat(value: usize) -> Self {
                [value; $n]
            }

            fn total_elem(&self) -> usize {
                self.iter().product()
            }

            fn to_dims(&self) -> Vec<usize> {
                self.to_vec()
            }

            fn cons(outer: usize, tail: Self::Lower) -> Self {
                let mut out = [0usize; $n];
                out[0] = outer;
                out[1..].copy_from_slice(&tail);
                out
            }

            fn uncons(self) -> (usize, Self::Lower) {
                let mut tail = [0usize; $m];
                tail.copy_from_slice(&self[1..]);
                (self[0], tail)
            }

            fn snoc(init: Self::Lower, inner: usize) -> Self {
                let mut out = [0usize; $n];
                out[..$m].copy_from_slice(&init);
                out[$m] = inner;
                out
            }

            fn unsnoc(self) -> (Self::Lower, usize) {
                let mut init = [0usize; $m];
                init.copy_from_slice(&self[..$m]);
                (init, self[$m])
            }

            fn lift2(self, other: Self, f: impl Fn(usize, usize) -> usize) -> Self {
                let mut out = [0usize; $n];
                for d in 0..$n {
                    out[d] = f(self[d], other[d]);
                }
                out
            }

            fn get_dim(&self, dim: usize) -> Option<usize> {
                if (1..=$n).contains(&dim) {
                    Some(self[$n - dim])
                } else {
                    None
                }
            }

            fn set_dim(self, dim: usize, value: usize) -> Option<Self> {
                if !(1..=$n).contains(&dim) {
                    return None;
                }
                let mut out = self;
                out[$n - dim] = value;
                Some(out)
            }

            fn drop_dim(self, dim: usize) -> Option<Self::Lower> {
                if !(1..=$n).contains(&dim) {
                    return None;
                }
                let pos = $n - dim;
                let mut out = [0usize; $m];
                out[..pos].copy_from_slice(&self[..pos]);
                out[pos..].copy_from_slice(&self[pos + 1..]);
                Some(out)
            }

            fn insert_dim(lower: Self::Lower, dim: usize, value: usize) -> Option<Self> {
                if !(1..=$n).contains(&dim) {
                    return None;
                }
                let pos = $n - dim;
                let mut out = [0usize; $n];
                out[..pos].copy_from_slice(&lower[..pos]);
                out[pos] = value;
                out[pos + 1..].copy_from_slice(&lower[pos..]);
                Some(out)
            }

            fn is_safe_index(&self, ix: Self) -> bool {
                ix.iter().zip(self.iter()).all(|(&i, &n)| i < n)
            }

            fn to_linear(&self, ix: Self) -> usize {
                let (shape_init, shape_inner) = self.unsnoc();
                let (ix_init, ix_inner) = ix.unsnoc();
                shape_init.to_linear(ix_init) * shape_inner + ix_inner
            }

            fn from_linear(&self, linear: usize) -> Self {
                let (shape_init, shape_inner) = self.unsnoc();
                Self::snoc(shape_init.from_linear(linear / shape_inner), linear % shape_inner)
            }

            fn for_each(start: Self, end: Self, body: &mut impl FnMut(Self)) {
                let (start_outer, start_tail) = start.uncons();
                let (end_outer, end_tail) = end.uncons();
                for i in start_outer..end_outer {
                    <Self::Lower as Shape>::for_each(start_tail, end_tail, &mut |tail| {
                        body(Self::cons(i, tail))
                    });
                }
            }

            fn for_each_stepped(start: Self, end: Self, step: Self, body: &mut impl FnMut(Self)) {
                let (start_outer, start_tail) = start.uncons();
                let (end_outer, end_tail) = end.uncons();
                let (step_outer, step_tail) = step.uncons();
                loop_from(start_outer, |i| i < end_outer, |i| i + step_outer, (), |(), i| {
                    <Self::Lower as Shape>::for_each_stepped(start_tail, end_tail, step_tail, &mut |tail| {
                        body(Self::cons(i, tail))
                    });
                });
            }
        }
    )+};
}

impl_shape!(1 => 0, 2 => 1, 3 => 2, 4 => 3, 5 => 4);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_elem() {
        assert_eq!([7usize].total_elem(), 7);
        assert_eq!([3usize, 4].total_elem(), 12);
        assert_eq!([2usize, 3, 4, 5, 6].total_elem(), 720);
        assert_eq!([2usize, 0, 4].total_elem(), 0);
    }

    #[test]
    fn test_linear_round_trip() {
        let shape = [3usize, 4, 5];
        for k in 0..shape.total_elem() {
            let ix = shape.from_linear(k);
            assert!(shape.is_safe_index(ix));
            assert_eq!(shape.to_linear(ix), k);
        }
    }

    #[test]
    fn test_linear_round_trip_rank5() {
        let shape = [2usize, 3, 2, 3, 2];
        for k in 0..shape.total_elem() {
            assert_eq!(shape.to_linear(shape.from_linear(k)), k);
        }
    }

    #[test]
    fn test_to_linear_row_major() {
        // Innermost axis is contiguous.
        let shape = [4usize, 3];
        assert_eq!(shape.to_linear([0, 0]), 0);
        assert_eq!(shape.to_linear([0, 1]), 1);
        assert_eq!(shape.to_linear([1, 0]), 3);
        assert_eq!(shape.to_linear([2, 1]), 7);

        let shape3 = [3usize, 3, 3];
        assert_eq!(shape3.to_linear([1, 1, 1]), 13);
    }

    #[test]
    fn test_cons_uncons_inverse() {
        let ix = [5usize, 6, 7];
        let (outer, tail) = ix.uncons();
        assert_eq!(outer, 5);
        assert_eq!(tail, [6, 7]);
        assert_eq!(<[usize; 3]>::cons(outer, tail), ix);

        // The isomorphism holds at every rank of the family.
        let ix2 = [5usize, 6];
        let (o, t) = ix2.uncons();
        assert_eq!(<[usize; 2]>::cons(o, t), ix2);
        let ix5 = [1usize, 2, 3, 4, 5];
        let (o, t) = ix5.uncons();
        assert_eq!(<[usize; 5]>::cons(o, t), ix5);
        let (init, inner) = ix5.unsnoc();
        assert_eq!(<[usize; 5]>::snoc(init, inner), ix5);
    }

    #[test]
    fn test_snoc_unsnoc_inverse() {
        let ix = [5usize, 6, 7, 8];
        let (init, inner) = ix.unsnoc();
        assert_eq!(init, [5, 6, 7]);
        assert_eq!(inner, 8);
        assert_eq!(<[usize; 4]>::snoc(init, inner), ix);
    }

    #[test]
    fn test_dim_selectors() {
        // dim 1 is the innermost axis.
        let ix = [10usize, 20, 30];
        assert_eq!(ix.get_dim(1), Some(30));
        assert_eq!(ix.get_dim(3), Some(10));
        assert_eq!(ix.get_dim(0), None);
        assert_eq!(ix.get_dim(4), None);

        assert_eq!(ix.set_dim(2, 99), Some([10, 99, 30]));
        assert_eq!(ix.set_dim(6, 99), None);

        assert_eq!(ix.drop_dim(1), Some([10, 20]));
        assert_eq!(ix.drop_dim(3), Some([20, 30]));
        assert_eq!(ix.drop_dim(0), None);

        assert_eq!(<[usize; 3]>::insert_dim([10, 30], 2, 20), Some([10, 20, 30]));
        assert_eq!(<[usize; 3]>::insert_dim([10, 30], 9, 20), None);

        assert_eq!(ix.pull_out_dim(3), Some((10, [20, 30])));
        assert_eq!(ix.pull_out_dim(0), None);
    }

    #[test]
    fn test_insert_drop_inverse() {
        let ix = [1usize, 2, 3, 4];
        for dim in 1..=4 {
            let (v, rest) = ix.pull_out_dim(dim).unwrap();
            assert_eq!(<[usize; 4]>::insert_dim(rest, dim, v), Some(ix));
        }
    }

    #[test]
    fn test_lift2_and_splat() {
        let a = [1usize, 2, 3];
        let b = [10usize, 20, 30];
        assert_eq!(a.lift2(b, |x, y| x + y), [11, 22, 33]);
        assert_eq!(<[usize; 3]>::splat(4), [4, 4, 4]);
        assert_eq!(<[usize; 2]>::zero(), [0, 0]);
    }

    #[test]
    fn test_is_safe_index() {
        let shape = [3usize, 4];
        assert!(shape.is_safe_index([0, 0]));
        assert!(shape.is_safe_index([2, 3]));
        assert!(!shape.is_safe_index([3, 0]));
        assert!(!shape.is_safe_index([0, 4]));
    }

    #[test]
    fn test_for_each_row_major_order() {
        let mut seen = Vec::new();
        <[usize; 2]>::for_each([0, 0], [2, 3], &mut |ix| seen.push(ix));
        assert_eq!(
            seen,
            vec![[0, 0], [0, 1], [0, 2], [1, 0], [1, 1], [1, 2]]
        );
    }

    #[test]
    fn test_for_each_matches_linear_order() {
        let shape = [2usize, 3, 2];
        let mut k = 0;
        <[usize; 3]>::for_each([0, 0, 0], shape, &mut |ix| {
            assert_eq!(shape.to_linear(ix), k);
            k += 1;
        });
        assert_eq!(k, shape.total_elem());
    }

    #[test]
    fn test_for_each_boxed_region() {
        let mut seen = Vec::new();
        <[usize; 2]>::for_each([1, 1], [3, 3], &mut |ix| seen.push(ix));
        assert_eq!(seen, vec![[1, 1], [1, 2], [2, 1], [2, 2]]);
    }

    #[test]
    fn test_for_each_empty_region() {
        let mut count = 0;
        <[usize; 2]>::for_each([2, 0], [2, 5], &mut |_| count += 1);
        assert_eq!(count, 0);
    }

    #[test]
    fn test_for_each_stepped() {
        let mut seen = Vec::new();
        <[usize; 2]>::for_each_stepped([0, 0], [5, 4], [2, 3], &mut |ix| seen.push(ix));
        assert_eq!(
            seen,
            vec![[0, 0], [0, 3], [2, 0], [2, 3], [4, 0], [4, 3]]
        );
    }

    #[test]
    fn test_rank1_base_case() {
        let shape = [9usize];
        assert_eq!(shape.to_linear([4]), 4);
        assert_eq!(shape.from_linear(4), [4]);
        assert_eq!(shape.rank(), 1);
    }
}
