//! Adaptive outlier-rejecting median filter.
//!
//! Each call compares the new sample with the most recently written slot and
//! substitutes the previous value when the jump exceeds `σ × T`, where σ is
//! the population standard deviation of the current window. The reported
//! value is the median of the window, computed on a scratch copy so the live
//! ring buffer keeps its write order.
//!
//! Slot 0 is compared against slot N-1. The only uncompared insertion is
//! the first one after seeding. A flat window (σ = 0) therefore holds its
//! level against any jump; gradual trends that stay inside the noise band
//! are tracked, and `reset` re-seeds after a deliberate level change.

use crate::error::PolarError;

#[derive(Debug, Clone)]
pub struct AdaptiveMedianFilter {
    buf: Vec<f32>,
    // Preallocated copy used for order statistics.
    scratch: Vec<f32>,
    cursor: usize,
    initialized: bool,
    // Set by seeding, cleared by the first insertion after it.
    awaiting_first: bool,
    threshold_factor: f32,
    last_threshold: f32,
    rejected: u64,
}

impl AdaptiveMedianFilter {
    /// Create a filter with window `window` (N >= 1) and outlier factor `threshold_factor` (T >= 0).
    pub fn new(window: usize, threshold_factor: f32) -> Result<Self, PolarError> {
        if window < 1 {
            return Err(PolarError::InvalidConfiguration(
                "filter window must be >= 1".into(),
            ));
        }
        if !threshold_factor.is_finite() || threshold_factor < 0.0 {
            return Err(PolarError::InvalidConfiguration(format!(
                "outlier threshold must be finite and >= 0, got {threshold_factor}"
            )));
        }
        Ok(Self {
            buf: vec![0.0; window],
            scratch: Vec::with_capacity(window),
            cursor: 0,
            initialized: false,
            awaiting_first: false,
            threshold_factor,
            last_threshold: 0.0,
            rejected: 0,
        })
    }

    pub fn window(&self) -> usize {
        self.buf.len()
    }

    /// Current window contents in slot order (not sorted).
    pub fn values(&self) -> &[f32] {
        &self.buf
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Rejection cutoff used by the most recent call.
    pub fn last_threshold(&self) -> f32 {
        self.last_threshold
    }

    /// Number of samples replaced by their predecessor so far.
    pub fn rejected(&self) -> u64 {
        self.rejected
    }

    /// Forget all history; the next sample re-seeds the window.
    pub fn reset(&mut self) {
        self.buf.iter_mut().for_each(|v| *v = 0.0);
        self.cursor = 0;
        self.initialized = false;
        self.awaiting_first = false;
        self.last_threshold = 0.0;
    }

    /// Feed one sample and return the smoothed value.
    ///
    /// Non-finite samples are treated as outliers once the window is seeded;
    /// before that they are returned unchanged and do not seed the window.
    pub fn filter(&mut self, sample: f32) -> f32 {
        let n = self.buf.len();
        let threshold = self.std_dev() * self.threshold_factor;
        self.last_threshold = threshold;

        if !self.initialized {
            if !sample.is_finite() {
                return sample;
            }
            self.buf.fill(sample);
            self.initialized = true;
            self.awaiting_first = true;
            return self.median();
        }

        let mut value = sample;
        let previous = self.buf[(self.cursor + n - 1) % n];
        // The first finite insertion after seeding has no written predecessor.
        let compare = !self.awaiting_first || !value.is_finite();
        if compare && (!value.is_finite() || (value - previous).abs() > threshold) {
            tracing::trace!(sample, previous, threshold, "outlier replaced");
            self.rejected = self.rejected.saturating_add(1);
            value = previous;
        }
        self.awaiting_first = false;

        self.buf[self.cursor] = value;
        self.cursor = (self.cursor + 1) % n;
        debug_assert!(self.cursor < n);

        self.median()
    }

    /// Population standard deviation of the window (0 until seeded).
    fn std_dev(&self) -> f32 {
        if !self.initialized {
            return 0.0;
        }
        let n = self.buf.len() as f64;
        let mean = self.buf.iter().map(|&v| f64::from(v)).sum::<f64>() / n;
        let var = self
            .buf
            .iter()
            .map(|&v| {
                let d = f64::from(v) - mean;
                d * d
            })
            .sum::<f64>()
            / n;
        var.sqrt() as f32
    }

    fn median(&mut self) -> f32 {
        self.scratch.clear();
        self.scratch.extend_from_slice(&self.buf);
        let n = self.scratch.len();
        let mid = n / 2;
        if n % 2 == 1 {
            let (_, m, _) = self.scratch.select_nth_unstable_by(mid, f32::total_cmp);
            *m
        } else {
            self.scratch.sort_unstable_by(f32::total_cmp);
            (self.scratch[mid - 1] + self.scratch[mid]) / 2.0
        }
    }
}
