//! Edge tapers applied before zero padding.
//!
//! Appending zeros next to a non-zero sample creates a step that later
//! filtering turns into ringing. The samples adjacent to the padded edge are
//! therefore weighted with half of a Kaiser window (beta = 14) first.

/// Kaiser shape parameter used for edge tapers.
pub const TAPER_BETA: f64 = 14.0;

/// Default number of samples tapered next to a padded edge.
pub const DEFAULT_TAPER_SAMPLES: usize = 20;

/// Edge of a series.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Edge {
    Front,
    End,
}

impl Edge {
    pub fn as_str(self) -> &'static str {
        match self {
            Edge::Front => "front",
            Edge::End => "end",
        }
    }
}

/// Compute the zeroth-order modified Bessel function of the first kind, I_0(x).
///
/// Uses the polynomial approximation for efficiency.
fn bessel_i0(x: f64) -> f64 {
    let ax = x.abs();

    if ax < 3.75 {
        let t = (x / 3.75).powi(2);
        1.0 + t * (3.5156229
            + t * (3.0899424
                + t * (1.2067492
                    + t * (0.2659732
                        + t * (0.0360768 + t * 0.0045813)))))
    } else {
        let t = 3.75 / ax;
        (ax.exp() / ax.sqrt())
            * (0.39894228
                + t * (0.01328592
                    + t * (0.00225319
                        + t * (-0.00157565
                            + t * (0.00916281
                                + t * (-0.02057706
                                    + t * (0.02635537
                                        + t * (-0.01647633 + t * 0.00392377))))))))
    }
}

/// Symmetric Kaiser window of `length` points, normalized to 1 at the center.
pub fn kaiser_window(length: usize, beta: f64) -> Vec<f64> {
    match length {
        0 => Vec::new(),
        1 => vec![1.0],
        _ => {
            let n = length as f64;
            let denom = bessel_i0(beta);
            (0..length)
                .map(|i| {
                    let x = 2.0 * i as f64 / (n - 1.0) - 1.0; // Range [-1, 1]
                    let arg = beta * (1.0 - x * x).max(0.0).sqrt();
                    bessel_i0(arg) / denom
                })
                .collect()
        }
    }
}

/// Weight the `m + 1` samples nearest to `edge` with half a Kaiser window of
/// length `2m + 1`, rising from the front or falling towards the end.
///
/// Series shorter than the taper are weighted with the part of the half
/// window that overlaps them.
pub fn apply_taper(data: &mut [f64], edge: Edge, m: usize) {
    if m == 0 || data.is_empty() {
        return;
    }

    let window = kaiser_window(2 * m + 1, TAPER_BETA);
    let n = data.len();
    match edge {
        Edge::Front => {
            for (sample, w) in data.iter_mut().zip(&window[..=m]) {
                *sample *= w;
            }
        }
        Edge::End => {
            for (sample, w) in data.iter_mut().rev().zip(window[m..].iter().rev()) {
                *sample *= w;
            }
        }
    }
    tracing::trace!("Tapered {} of {} samples at the {}", (m + 1).min(n), n, edge.as_str());
}
