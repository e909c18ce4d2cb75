//! Parallel materialization kernels for delayed multidimensional arrays.
//!
//! A *delayed* array is a shape plus a pure `index -> element` function; it
//! has no storage of its own. This crate materializes delayed arrays into
//! contiguous row-major buffers, sequentially or across a pool of worker
//! threads, writing every element exactly once.
//!
//! The central type is the *windowed* delayed array: a delayed array with a
//! distinguished interior rectangle evaluated by a separate, typically
//! cheaper, indexing function. The loader fills the border from the
//! bounds-aware base function and the interior from the window function, so
//! the hot inner loop of a stencil kernel never branches on array edges.
//!
//! # Core Types
//!
//! - [`DelayedArray`]: shape + element function + parallelism hint
//! - [`WindowedArray`]: a delayed array with an interior window and an
//!   optional stencil footprint hint that selects the row unroll factor
//! - [`Shape`] and the fixed-rank index aliases [`Ix1`]..[`Ix5`]
//! - [`Scheduler`] / [`Scope`]: a scoped worker pool, also exported for
//!   upstream kernels that want to share a pool with the loader
//!
//! # Loading
//!
//! - [`load_seq`]: materialize on the calling thread
//! - [`load_par`]: materialize across a private worker pool
//! - [`load`]: dispatch on the array's [`ComputeMode`]
//!
//! # Example
//!
//! ```rust
//! use delayed_rs::{load_seq, DelayedArray, WindowedArray};
//!
//! // A 1-D array that is -1 on the border and the index inside the window.
//! let base = DelayedArray::new([10], |_ix: [usize; 1]| -1i64);
//! let wd = WindowedArray::new(base, [2], [5], |ix: [usize; 1]| ix[0] as i64).unwrap();
//!
//! let mut out = vec![0i64; 10];
//! load_seq(&wd, &mut out).unwrap();
//! assert_eq!(out, [-1, -1, 2, 3, 4, 5, 6, -1, -1, -1]);
//! ```

mod array;
mod fill;
mod loops;
mod scheduler;
mod shape;
mod unroll;

// ============================================================================
// Arrays
// ============================================================================
pub use array::{ComputeMode, DelayedArray, WindowedArray};

// ============================================================================
// Index algebra
// ============================================================================
pub use shape::{Ix0, Ix1, Ix2, Ix3, Ix4, Ix5, Shape};

// ============================================================================
// Loading
// ============================================================================
pub use fill::{load, load_par, load_seq, Fill, SendPtr};

// ============================================================================
// Scheduler
// ============================================================================
pub use scheduler::{with_scheduler, Scheduler, Scope};

// ============================================================================
// Loop primitives
// ============================================================================
pub use loops::{loop_from, try_loop_from};
pub use unroll::unroll_and_jam;

// ============================================================================
// Constants
// ============================================================================

/// Upper bound on the row unroll factor of the 2-D interior kernel.
///
/// Jamming more than this many rows into the inner loop raises register
/// pressure past what mainstream ISAs tolerate; stencil footprints larger
/// than this are clamped.
pub const MAX_UNROLL_ROWS: usize = 7;

// ============================================================================
// Error types
// ============================================================================

/// Errors that can occur while constructing or loading a delayed array.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// The window does not fit inside the array shape.
    #[error("window out of bounds: start {start:?} + size {size:?} exceeds shape {shape:?}")]
    WindowOutOfBounds {
        start: Vec<usize>,
        size: Vec<usize>,
        shape: Vec<usize>,
    },

    /// The output buffer length does not match the array's element count.
    #[error("buffer length mismatch: expected {expected}, got {actual}")]
    BufferSize { expected: usize, actual: usize },

    /// The worker pool could not be constructed.
    #[error("scheduler: {0}")]
    Scheduler(String),

    /// A scheduled task reported a failure.
    #[error("task failed: {0}")]
    TaskFailed(String),
}

/// Result type for delayed array operations.
pub type Result<T> = std::result::Result<T, LoadError>;
