//! Bounded loop primitives.
//!
//! These are the control-flow vocabulary of the index iteration and of the
//! unroll-and-jam block loop: a counter loop parameterized by a continuation
//! predicate and an arbitrary step function, in a pure and a fallible
//! variant. No unit stride is assumed anywhere.

use crate::Result;

/// Run `body` over the counter values produced by `step`, threading an
/// accumulator, for as long as `cont` holds.
#[inline]
pub fn loop_from<A, C, S, B>(start: usize, cont: C, step: S, init: A, mut body: B) -> A
where
    C: Fn(usize) -> bool,
    S: Fn(usize) -> usize,
    B: FnMut(A, usize) -> A,
{
    let mut acc = init;
    let mut i = start;
    while cont(i) {
        acc = body(acc, i);
        i = step(i);
    }
    acc
}

/// Fallible variant of [`loop_from`]; stops at the first error.
#[inline]
pub fn try_loop_from<A, C, S, B>(start: usize, cont: C, step: S, init: A, mut body: B) -> Result<A>
where
    C: Fn(usize) -> bool,
    S: Fn(usize) -> usize,
    B: FnMut(A, usize) -> Result<A>,
{
    let mut acc = init;
    let mut i = start;
    while cont(i) {
        acc = body(acc, i)?;
        i = step(i);
    }
    Ok(acc)
}
