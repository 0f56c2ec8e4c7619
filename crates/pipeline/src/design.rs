//! Digital filter design.
//!
//! Coefficients are produced as transfer-function polynomials
//! `H(z) = (b0 + b1 z^-1 + ... + bn z^-n) / (1 + a1 z^-1 + ... + an z^-n)`.
//! Butterworth sections follow the classic route: analog prototype poles, a
//! low-pass or high-pass frequency transform, then the bilinear transform with
//! frequency pre-warping.

use std::f64::consts::PI;

use num_complex::Complex64;

use crate::error::{FilterError, FilterResult};

/// Numerator/denominator pair for one recursive stage.
///
/// Both vectors have the same length (`order + 1`) and `a[0] == 1`.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterCoefficients {
    b: Vec<f64>,
    a: Vec<f64>,
}

impl FilterCoefficients {
    /// Normalizes by `a[0]` and zero-pads the shorter polynomial.
    pub fn new(mut b: Vec<f64>, mut a: Vec<f64>) -> FilterResult<Self> {
        if b.is_empty() || a.is_empty() {
            return Err(FilterError::BadCoefficients("empty polynomial".into()));
        }
        let a0 = a[0];
        if a0 == 0.0 || !a0.is_finite() {
            return Err(FilterError::BadCoefficients(format!("a[0] = {a0}")));
        }
        if b.iter().chain(a.iter()).any(|c| !c.is_finite()) {
            return Err(FilterError::BadCoefficients("non-finite coefficient".into()));
        }

        let len = b.len().max(a.len());
        b.resize(len, 0.0);
        a.resize(len, 0.0);
        b.iter_mut().for_each(|c| *c /= a0);
        a.iter_mut().for_each(|c| *c /= a0);

        Ok(Self { b, a })
    }

    pub fn b(&self) -> &[f64] {
        &self.b
    }

    pub fn a(&self) -> &[f64] {
        &self.a
    }

    /// Number of delay elements a direct-form implementation needs.
    pub fn order(&self) -> usize {
        self.b.len() - 1
    }

    /// Delay-line contents that make the filter output its DC gain immediately
    /// when driven by a constant unit input.
    ///
    /// For the transposed direct form this is `zi[i] = sum_{k>i} (b[k] - a[k] * G)`
    /// with `G = sum(b) / sum(a)`.
    pub fn steady_state(&self) -> Vec<f64> {
        let sum_a: f64 = self.a.iter().sum();
        let dc_gain = if sum_a.abs() > f64::EPSILON {
            self.b.iter().sum::<f64>() / sum_a
        } else {
            0.0
        };

        let mut zi = vec![0.0; self.order()];
        let mut acc = 0.0;
        for k in (1..=self.order()).rev() {
            acc += self.b[k] - self.a[k] * dc_gain;
            zi[k - 1] = acc;
        }
        zi
    }

    /// Magnitude response at `freq_hz`.
    pub fn gain_at(&self, freq_hz: f64, sample_rate_hz: f64) -> f64 {
        let w = 2.0 * PI * freq_hz / sample_rate_hz;
        let eval = |poly: &[f64]| -> Complex64 {
            poly.iter()
                .enumerate()
                .map(|(k, c)| Complex64::from_polar(*c, -w * k as f64))
                .sum()
        };
        (eval(&self.b) / eval(&self.a)).norm()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassKind {
    LowPass,
    HighPass,
}

impl PassKind {
    fn label(self) -> &'static str {
        match self {
            PassKind::LowPass => "low-pass",
            PassKind::HighPass => "high-pass",
        }
    }
}

fn check_sample_rate(sample_rate_hz: f64) -> FilterResult<f64> {
    if sample_rate_hz > 0.0 && sample_rate_hz.is_finite() {
        Ok(0.5 * sample_rate_hz)
    } else {
        Err(FilterError::InvalidSampleRate(sample_rate_hz))
    }
}

/// Second-order IIR notch centred on `freq_hz` with quality factor `q`.
///
/// The -3 dB rejection bandwidth is `freq_hz / q`, so a larger `q` rejects a
/// narrower band.
pub fn design_notch(freq_hz: f64, sample_rate_hz: f64, q: f64) -> FilterResult<FilterCoefficients> {
    let nyquist = check_sample_rate(sample_rate_hz)?;
    if !(freq_hz > 0.0 && freq_hz < nyquist) {
        return Err(FilterError::InvalidCutoff {
            stage: "notch",
            cutoff_hz: freq_hz,
            nyquist_hz: nyquist,
        });
    }
    if !(q > 0.0 && q.is_finite()) {
        return Err(FilterError::InvalidQuality(q));
    }

    let w0 = PI * freq_hz / nyquist;
    let bw = w0 / q;
    let beta = (bw / 2.0).tan();
    let gain = 1.0 / (1.0 + beta);
    let cos_w0 = w0.cos();

    FilterCoefficients::new(
        vec![gain, -2.0 * gain * cos_w0, gain],
        vec![1.0, -2.0 * gain * cos_w0, 2.0 * gain - 1.0],
    )
}

/// Digital Butterworth low-pass or high-pass of the given order.
pub fn design_butterworth(
    kind: PassKind,
    order: usize,
    cutoff_hz: f64,
    sample_rate_hz: f64,
) -> FilterResult<FilterCoefficients> {
    let nyquist = check_sample_rate(sample_rate_hz)?;
    if order == 0 {
        return Err(FilterError::InvalidOrder);
    }
    if !(cutoff_hz > 0.0 && cutoff_hz < nyquist) {
        return Err(FilterError::InvalidCutoff {
            stage: kind.label(),
            cutoff_hz,
            nyquist_hz: nyquist,
        });
    }

    // Work in normalized units where Nyquist == 1 and the bilinear sample rate is 2.
    const FS: f64 = 2.0;
    let normalized = cutoff_hz / nyquist;
    let warped = 2.0 * FS * (PI * normalized / FS).tan();

    let n = order as f64;
    let prototype: Vec<Complex64> = (0..order)
        .map(|i| {
            let m = -n + 1.0 + 2.0 * i as f64;
            -Complex64::from_polar(1.0, PI * m / (2.0 * n))
        })
        .collect();

    let (zeros, poles, gain) = match kind {
        PassKind::LowPass => {
            let poles: Vec<Complex64> = prototype.iter().map(|p| *p * warped).collect();
            (Vec::new(), poles, warped.powi(order as i32))
        }
        PassKind::HighPass => {
            let poles: Vec<Complex64> = prototype
                .iter()
                .map(|p| Complex64::from(warped) / *p)
                .collect();
            let prod_neg: Complex64 = prototype.iter().map(|p| -*p).product();
            (vec![Complex64::new(0.0, 0.0); order], poles, prod_neg.inv().re)
        }
    };

    let (zeros, poles, gain) = bilinear(&zeros, &poles, gain, FS);
    let b: Vec<f64> = poly(&zeros).iter().map(|c| c.re * gain).collect();
    let a: Vec<f64> = poly(&poles).iter().map(|c| c.re).collect();
    FilterCoefficients::new(b, a)
}

/// Low-pass and high-pass Butterworth sections that together band-limit the
/// signal. A low-pass cutoff at or above Nyquist is pulled down to 0.99 of
/// Nyquist instead of failing.
pub fn design_band_cascade(
    low_pass_hz: f64,
    high_pass_hz: f64,
    sample_rate_hz: f64,
    order: usize,
) -> FilterResult<(FilterCoefficients, FilterCoefficients)> {
    let nyquist = check_sample_rate(sample_rate_hz)?;
    let low_pass_hz = if low_pass_hz >= nyquist {
        0.99 * nyquist
    } else {
        low_pass_hz
    };

    let low = design_butterworth(PassKind::LowPass, order, low_pass_hz, sample_rate_hz)?;
    let high = design_butterworth(PassKind::HighPass, order, high_pass_hz, sample_rate_hz)?;
    Ok((low, high))
}

/// Maps s-plane zeros/poles/gain to the z-plane; surplus poles get zeros at z = -1.
fn bilinear(
    zeros: &[Complex64],
    poles: &[Complex64],
    gain: f64,
    fs: f64,
) -> (Vec<Complex64>, Vec<Complex64>, f64) {
    let fs2 = Complex64::new(2.0 * fs, 0.0);
    let map = |s: &Complex64| (fs2 + *s) / (fs2 - *s);

    let mut z_zeros: Vec<Complex64> = zeros.iter().map(map).collect();
    let z_poles: Vec<Complex64> = poles.iter().map(map).collect();
    z_zeros.resize(poles.len().max(zeros.len()), Complex64::new(-1.0, 0.0));

    let num: Complex64 = zeros.iter().map(|z| fs2 - *z).product();
    let den: Complex64 = poles.iter().map(|p| fs2 - *p).product();
    (z_zeros, z_poles, gain * (num / den).re)
}

/// Monic polynomial with the given roots, highest power first.
fn poly(roots: &[Complex64]) -> Vec<Complex64> {
    let mut coeffs = vec![Complex64::new(1.0, 0.0)];
    for root in roots {
        let mut next = vec![Complex64::new(0.0, 0.0); coeffs.len() + 1];
        for (i, c) in coeffs.iter().enumerate() {
            next[i] += *c;
            next[i + 1] -= *c * *root;
        }
        coeffs = next;
    }
    coeffs
}
