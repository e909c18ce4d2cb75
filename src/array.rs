//! Delayed and windowed delayed arrays.
//!
//! A [`DelayedArray`] is a shape plus a pure indexing function; a
//! [`WindowedArray`] adds an interior window with its own, typically
//! non-bounds-checked, indexing function. Both are immutable values; the
//! indexing functions are stored generically so the load kernels inline them
//! without dynamic dispatch.

use crate::shape::Shape;
use crate::{LoadError, Result};

/// How a load should be executed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ComputeMode {
    /// Run on the calling thread; no task submission.
    Sequential,
    /// Run on a worker pool, one worker per listed identity.
    ///
    /// An empty list means "use all available cores".
    Parallel { workers: Vec<usize> },
}

/// A shape plus a total indexing function; no storage.
///
/// `at` must be defined for every index that is safe in `shape`; behavior
/// outside the shape is the caller's concern.
pub struct DelayedArray<D, F> {
    pub(crate) comp: ComputeMode,
    pub(crate) shape: D,
    pub(crate) at: F,
}

impl<D: Shape, F> DelayedArray<D, F> {
    /// Wrap a shape and an indexing function; defaults to sequential loads.
    pub fn new(shape: D, at: F) -> Self {
        Self {
            comp: ComputeMode::Sequential,
            shape,
            at,
        }
    }

    /// Array shape.
    pub fn shape(&self) -> D {
        self.shape
    }

    /// Parallelism hint.
    pub fn comp(&self) -> &ComputeMode {
        &self.comp
    }

    /// Replace the parallelism hint.
    pub fn set_comp(&mut self, comp: ComputeMode) {
        self.comp = comp;
    }

    /// Evaluate the element at `ix`.
    pub fn at<T>(&self, ix: D) -> T
    where
        F: Fn(D) -> T,
    {
        (self.at)(ix)
    }
}

/// A delayed array with an interior window.
///
/// Cells inside `[win_start, win_start + win_size)` are evaluated by
/// `win_at`; everything else falls back to the base function. The optional
/// stencil footprint records the shape of the access pattern that produced
/// the window; its row-axis extent selects the unroll factor of the 2-D
/// interior kernel.
pub struct WindowedArray<D, F, G> {
    pub(crate) base: DelayedArray<D, F>,
    pub(crate) stencil: Option<D>,
    pub(crate) win_start: D,
    pub(crate) win_size: D,
    pub(crate) win_at: G,
}

impl<D: std::fmt::Debug, F, G> std::fmt::Debug for WindowedArray<D, F, G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WindowedArray")
            .field("shape", &self.base.shape)
            .field("comp", &self.base.comp)
            .field("stencil", &self.stencil)
            .field("win_start", &self.win_start)
            .field("win_size", &self.win_size)
            .finish()
    }
}

impl<D: Shape, F> WindowedArray<D, F, F> {
    /// The trivial windowing of a delayed array: an empty window at the
    /// origin, with the base function doubling as the window function.
    pub fn from_delayed(base: DelayedArray<D, F>) -> Self
    where
        F: Clone,
    {
        let win_at = base.at.clone();
        Self {
            base,
            stencil: None,
            win_start: D::zero(),
            win_size: D::zero(),
            win_at,
        }
    }
}

impl<D: Shape, F, G> WindowedArray<D, F, G> {
    /// Attach a window to a delayed array.
    ///
    /// The window must fit inside the shape: componentwise
    /// `win_start + win_size <= shape`. An empty window may sit anywhere on
    /// the shape boundary. A window that does not fit is a caller bug and is
    /// reported with the offending extents.
    pub fn new(base: DelayedArray<D, F>, win_start: D, win_size: D, win_at: G) -> Result<Self> {
        let start = win_start.to_dims();
        let size = win_size.to_dims();
        let shape = base.shape.to_dims();
        let fits = start
            .iter()
            .zip(&size)
            .zip(&shape)
            .all(|((&s, &w), &n)| s.checked_add(w).is_some_and(|end| end <= n));
        if !fits {
            return Err(LoadError::WindowOutOfBounds { start, size, shape });
        }
        Ok(Self {
            base,
            stencil: None,
            win_start,
            win_size,
            win_at,
        })
    }

    /// Record the stencil footprint that produced this window.
    ///
    /// Only the last two components are consulted; the row-axis extent picks
    /// the unroll factor of the 2-D interior kernel.
    pub fn with_stencil(mut self, stencil: D) -> Self {
        self.stencil = Some(stencil);
        self
    }

    /// The stencil footprint hint, if any.
    pub fn stencil(&self) -> Option<D> {
        self.stencil
    }

    /// Array shape.
    pub fn size(&self) -> D {
        self.base.shape
    }

    /// Window start index.
    pub fn win_start(&self) -> D {
        self.win_start
    }

    /// Window extents.
    pub fn win_size(&self) -> D {
        self.win_size
    }

    /// Parallelism hint of the underlying array.
    pub fn comp(&self) -> &ComputeMode {
        self.base.comp()
    }

    /// Replace the parallelism hint.
    pub fn set_comp(&mut self, comp: ComputeMode) {
        self.base.set_comp(comp);
    }

    /// Evaluate the border (base) function at `ix`.
    pub fn at<T>(&self, ix: D) -> T
    where
        F: Fn(D) -> T,
    {
        (self.base.at)(ix)
    }

    /// Evaluate the window function at `ix`.
    pub fn win_at<T>(&self, ix: D) -> T
    where
        G: Fn(D) -> T,
    {
        (self.win_at)(ix)
    }

    /// Row unroll factor implied by the stencil hint, before clamping.
    pub fn unroll_hint(&self) -> usize {
        self.stencil
            .and_then(|stencil| stencil.get_dim(2))
            .unwrap_or(1)
    }

    /// Compose `f` over both the base and the window function.
    pub fn map<T, U, H>(
        self,
        f: H,
    ) -> WindowedArray<D, impl Fn(D) -> U, impl Fn(D) -> U>
    where
        F: Fn(D) -> T,
        G: Fn(D) -> T,
        H: Fn(T) -> U + Clone,
    {
        let DelayedArray { comp, shape, at } = self.base;
        let win_at = self.win_at;
        let f_win = f.clone();
        WindowedArray {
            base: DelayedArray {
                comp,
                shape,
                at: move |ix| f(at(ix)),
            },
            stencil: self.stencil,
            win_start: self.win_start,
            win_size: self.win_size,
            win_at: move |ix| f_win(win_at(ix)),
        }
    }

    /// The rank-lowered slice at outer coordinate `outer`.
    ///
    /// Both indexing functions are composed with `cons(outer, _)`, the window
    /// extents keep their inner components, and the stencil loses its outer
    /// component. Slices always load sequentially: a parallel load harvests
    /// its parallelism over the outer window axis before slicing.
    pub(crate) fn slice_outer<T>(
        &self,
        outer: usize,
    ) -> WindowedArray<D::Lower, impl Fn(D::Lower) -> T + '_, impl Fn(D::Lower) -> T + '_>
    where
        F: Fn(D) -> T,
        G: Fn(D) -> T,
    {
        let (_, inner_shape) = self.base.shape.uncons();
        let at = &self.base.at;
        let win_at = &self.win_at;
        WindowedArray {
            base: DelayedArray {
                comp: ComputeMode::Sequential,
                shape: inner_shape,
                at: move |ix| at(D::cons(outer, ix)),
            },
            stencil: self.stencil.map(|stencil| stencil.uncons().1),
            win_start: self.win_start.uncons().1,
            win_size: self.win_size.uncons().1,
            win_at: move |ix| win_at(D::cons(outer, ix)),
        }
    }
}
