//! Stateful recursive filter, one sample in, one sample out.

use crate::design::FilterCoefficients;

/// Direct Form II Transposed IIR filter carrying its delay line between calls.
#[derive(Debug, Clone)]
pub struct IirFilter {
    coeffs: FilterCoefficients,
    state: Vec<f64>,
}

impl IirFilter {
    /// Starts in the steady state for a constant unit input, so a signal that
    /// begins near 1.0 produces no start-up transient.
    pub fn new(coeffs: FilterCoefficients) -> Self {
        let state = coeffs.steady_state();
        Self { coeffs, state }
    }

    pub fn run(&mut self, x: f64) -> f64 {
        let b = self.coeffs.b();
        let a = self.coeffs.a();
        let n = self.state.len();

        let y = b[0] * x + self.state.first().copied().unwrap_or(0.0);
        if n > 0 {
            for i in 0..n - 1 {
                self.state[i] = self.state[i + 1] + b[i + 1] * x - a[i + 1] * y;
            }
            self.state[n - 1] = b[n] * x - a[n] * y;
        }
        y
    }

    pub fn state(&self) -> &[f64] {
        &self.state
    }
}
