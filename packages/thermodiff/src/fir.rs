//! Direct-form FIR filter over a fixed sliding window.
//!
//! The window holds the last K raw readings (K = number of taps). Until it
//! has been filled once the filter only reports fill progress; afterwards
//! every push evicts the oldest reading and yields a filtered value.

use crate::error::{AcquisitionError, Result};
use crate::types::FilterResult;

#[derive(Debug, Clone)]
pub struct FirFilter {
    coefficients: Vec<f64>,
    window: Vec<f64>,
    /// Next write position; once full this is also the oldest entry
    pos: usize,
    filled: usize,
}

impl FirFilter {
    pub fn new(coefficients: Vec<f64>) -> Result<Self> {
        if coefficients.is_empty() {
            return Err(AcquisitionError::InvalidConfig(
                "FIR filter needs at least one coefficient".to_string(),
            ));
        }

        Ok(Self {
            window: vec![0.0; coefficients.len()],
            coefficients,
            pos: 0,
            filled: 0,
        })
    }

    /// Number of taps (K)
    pub fn num_taps(&self) -> usize {
        self.coefficients.len()
    }

    pub fn is_ready(&self) -> bool {
        self.filled == self.num_taps()
    }

    /// Append a raw value and return either the fill progress or the
    /// filtered output.
    ///
    /// The caller is responsible for rejecting non-finite input.
    pub fn push_and_maybe_filter(&mut self, raw: f64) -> FilterResult {
        let k = self.num_taps();

        self.window[self.pos] = raw;
        self.pos = (self.pos + 1) % k;
        if self.filled < k {
            self.filled += 1;
        }

        if self.filled < k {
            return FilterResult::Filling(100.0 * self.filled as f64 / k as f64);
        }

        FilterResult::Ready(self.convolve())
    }

    /// Σ window[i] * coeffs[i] with window[0] the oldest reading.
    #[inline]
    fn convolve(&self) -> f64 {
        let k = self.num_taps();
        self.coefficients
            .iter()
            .enumerate()
            .map(|(i, &c)| c * self.window[(self.pos + i) % k])
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_coefficients_rejected() {
        assert!(FirFilter::new(vec![]).is_err());
    }

    #[test]
    fn test_fill_progress_until_k() {
        let mut filter = FirFilter::new(vec![0.25; 4]).unwrap();

        assert_eq!(filter.push_and_maybe_filter(1.0), FilterResult::Filling(25.0));
        assert_eq!(filter.push_and_maybe_filter(1.0), FilterResult::Filling(50.0));
        assert_eq!(filter.push_and_maybe_filter(1.0), FilterResult::Filling(75.0));
        assert_eq!(filter.push_and_maybe_filter(1.0), FilterResult::Ready(1.0));
        assert!(filter.is_ready());
    }

    #[test]
    fn test_single_tap_is_ready_immediately() {
        let mut filter = FirFilter::new(vec![2.0]).unwrap();
        assert_eq!(filter.push_and_maybe_filter(3.0), FilterResult::Ready(6.0));
        assert_eq!(filter.push_and_maybe_filter(-1.0), FilterResult::Ready(-2.0));
    }

    #[test]
    fn test_window_order_matches_coefficients() {
        // Oldest reading pairs with coeffs[0]
        let mut filter = FirFilter::new(vec![1.0, 10.0, 100.0]).unwrap();
        filter.push_and_maybe_filter(1.0);
        filter.push_and_maybe_filter(2.0);
        assert_eq!(filter.push_and_maybe_filter(3.0), FilterResult::Ready(321.0));

        // Slide: window is now [2, 3, 4]
        assert_eq!(filter.push_and_maybe_filter(4.0), FilterResult::Ready(432.0));
    }

    #[test]
    fn test_never_refills_after_threshold() {
        let mut filter = FirFilter::new(vec![0.5, 0.5]).unwrap();
        filter.push_and_maybe_filter(0.0);
        filter.push_and_maybe_filter(0.0);
        for i in 0..50 {
            assert!(matches!(
                filter.push_and_maybe_filter(i as f64),
                FilterResult::Ready(_)
            ));
        }
    }

    #[test]
    fn test_step_response_settles() {
        let mut filter = FirFilter::new(crate::DEFAULT_COEFFICIENTS.to_vec()).unwrap();
        let mut last = FilterResult::Filling(0.0);
        for _ in 0..filter.num_taps() {
            filter.push_and_maybe_filter(0.0);
        }
        for _ in 0..filter.num_taps() {
            last = filter.push_and_maybe_filter(1.0);
        }
        match last {
            FilterResult::Ready(y) => assert!((y - 1.0).abs() < 1e-9),
            other => panic!("expected Ready, got {:?}", other),
        }
    }
}
