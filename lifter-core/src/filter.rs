//! Fixed-window moving average used to smooth time-of-flight range samples.
//!
//! The window lives inline in the struct, so the filter is usable from
//! `no_std` targets without an allocator. The caller is responsible for never
//! feeding timed-out or otherwise invalid samples into the window.

/// Moving average over the last `N` samples.
///
/// Until `N` samples have been seen the output is the mean of the samples
/// written so far; the unused slots never bias the result toward zero.
#[derive(Clone, Debug, PartialEq)]
pub struct SmoothingFilter<const N: usize> {
    samples: [f32; N],
    cursor: usize,
    filled: usize,
    output: f32,
}

impl<const N: usize> SmoothingFilter<N> {
    /// Number of samples averaged once the window is full.
    pub const CAPACITY: usize = N;

    /// Creates an empty filter.
    #[must_use]
    pub const fn new() -> Self {
        const { assert!(N > 0, "smoothing window must hold at least one sample") };
        Self {
            samples: [0.0; N],
            cursor: 0,
            filled: 0,
            output: 0.0,
        }
    }

    /// Inserts `sample`, overwriting the oldest entry once the window is
    /// full, and returns the updated mean.
    pub fn process(&mut self, sample: f32) -> f32 {
        self.samples[self.cursor] = sample;
        self.cursor = (self.cursor + 1) % N;
        if self.filled < N {
            self.filled += 1;
        }

        let sum: f32 = self.samples[..self.filled].iter().sum();
        #[allow(clippy::cast_precision_loss)]
        let count = self.filled as f32;
        self.output = sum / count;
        self.output
    }

    /// Last value returned by [`process`](Self::process), or `0.0` before any sample.
    #[must_use]
    pub const fn output(&self) -> f32 {
        self.output
    }

    /// Number of live samples in the window.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.filled
    }

    /// Returns `true` before the first sample.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.filled == 0
    }

    /// Returns `true` once the window holds `N` samples.
    #[must_use]
    pub const fn is_full(&self) -> bool {
        self.filled == N
    }

    /// Drops every sample.
    pub fn reset(&mut self) {
        self.samples = [0.0; N];
        self.cursor = 0;
        self.filled = 0;
        self.output = 0.0;
    }
}

impl<const N: usize> Default for SmoothingFilter<N> {
    fn default() -> Self {
        Self::new()
    }
}
