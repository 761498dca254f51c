//! Butterworth low/high/band-pass filtering.
//!
//! Filters are designed from the analog Butterworth prototype, mapped to the
//! digital domain with a pre-warped bilinear transform and realised as a
//! cascade of second-order sections (biquads) for numerical stability.
//!
//! Application is forward-backward ([`SosFilter::filtfilt`]), so the output
//! has no phase shift relative to the input and the magnitude response is the
//! square of the designed one. Edge transients are suppressed with odd
//! extension of the signal and steady-state initial conditions per section.

use crate::error::{DspError, DspResult};
use lib_types::station::Station;
use lib_types::timeseries::Timeseries;
use lib_types::units::Hertz;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fmt;

/// Default filter order used by the processing pipeline.
pub const DEFAULT_ORDER: usize = 4;

/// Filter family. Only Butterworth is supported.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterFamily {
    #[default]
    #[serde(alias = "butter")]
    Butterworth,
}

/// Band type of a filter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BandType {
    Lowpass,
    Highpass,
    Bandpass,
}

impl fmt::Display for BandType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BandType::Lowpass => "lowpass",
            BandType::Highpass => "highpass",
            BandType::Bandpass => "bandpass",
        };
        f.write_str(name)
    }
}

/// Full description of a filter to apply to a series.
///
/// `fmax` is the cutoff of a lowpass, `fmin` the cutoff of a highpass, and a
/// bandpass uses both. The ripple and stop-band attenuation only matter for
/// equiripple families and are ignored by Butterworth designs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FilterSpec {
    #[serde(default)]
    pub family: FilterFamily,
    pub btype: BandType,
    #[serde(default)]
    pub fmin: Hertz,
    #[serde(default)]
    pub fmax: Hertz,
    #[serde(default = "default_order")]
    pub order: usize,
    #[serde(default)]
    pub ripple_db: Option<f64>,
    #[serde(default)]
    pub stopband_atten_db: Option<f64>,
}

fn default_order() -> usize {
    DEFAULT_ORDER
}

impl FilterSpec {
    pub fn lowpass(fmax: Hertz, order: usize) -> Self {
        Self::butterworth(BandType::Lowpass, Hertz::ZERO, fmax, order)
    }

    pub fn highpass(fmin: Hertz, order: usize) -> Self {
        Self::butterworth(BandType::Highpass, fmin, Hertz::ZERO, order)
    }

    pub fn bandpass(fmin: Hertz, fmax: Hertz, order: usize) -> Self {
        Self::butterworth(BandType::Bandpass, fmin, fmax, order)
    }

    fn butterworth(btype: BandType, fmin: Hertz, fmax: Hertz, order: usize) -> Self {
        Self {
            family: FilterFamily::Butterworth,
            btype,
            fmin,
            fmax,
            order,
            ripple_db: None,
            stopband_atten_db: None,
        }
    }
}

/// Frequency band requested by the caller for final filtering.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FilterBand {
    Lowpass(Hertz),
    Highpass(Hertz),
    Bandpass(Hertz, Hertz),
}

impl FilterBand {
    /// One frequency selects a lowpass, two ascending frequencies a bandpass.
    pub fn from_frequencies(frequencies: &[f64]) -> DspResult<Self> {
        match *frequencies {
            [fmax] => Ok(Self::Lowpass(Hertz(fmax))),
            [fmin, fmax] if fmin < fmax => Ok(Self::Bandpass(Hertz(fmin), Hertz(fmax))),
            [fmin, fmax] => Err(DspError::InvalidConfig(format!(
                "filter frequencies must be ascending, got {} and {}",
                fmin, fmax
            ))),
            _ => Err(DspError::InvalidConfig(format!(
                "expected one or two filter frequencies, got {}",
                frequencies.len()
            ))),
        }
    }

    /// Band from optional lower/upper bounds; `None` when neither is set.
    pub fn from_bounds(lowf: Option<f64>, highf: Option<f64>) -> DspResult<Option<Self>> {
        match (lowf, highf) {
            (None, None) => Ok(None),
            (None, Some(high)) => Ok(Some(Self::Lowpass(Hertz(high)))),
            (Some(low), None) => Ok(Some(Self::Highpass(Hertz(low)))),
            (Some(low), Some(high)) => Self::from_frequencies(&[low, high]).map(Some),
        }
    }

    /// Filter description of this band at the given order.
    pub fn spec(&self, order: usize) -> FilterSpec {
        match *self {
            FilterBand::Lowpass(fmax) => FilterSpec::lowpass(fmax, order),
            FilterBand::Highpass(fmin) => FilterSpec::highpass(fmin, order),
            FilterBand::Bandpass(fmin, fmax) => FilterSpec::bandpass(fmin, fmax, order),
        }
    }
}

impl fmt::Display for FilterBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterBand::Lowpass(fmax) => write!(f, "0.0-{:.1}Hz", fmax.0),
            FilterBand::Highpass(fmin) => write!(f, "{:.1}Hz-", fmin.0),
            FilterBand::Bandpass(fmin, fmax) => write!(f, "{:.1}-{:.1}Hz", fmin.0, fmax.0),
        }
    }
}

/// Second-order section.
///
/// Transfer function: H(z) = (b0 + b1*z^-1 + b2*z^-2) / (1 + a1*z^-1 + a2*z^-2)
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Biquad {
    pub b: [f64; 3],
    pub a1: f64,
    pub a2: f64,
}

impl Biquad {
    /// Frequency response at digital frequency `omega` (rad/sample).
    fn response(&self, omega: f64) -> Complex64 {
        let z1 = Complex64::from_polar(1.0, -omega);
        let z2 = z1 * z1;
        let num = self.b[0] + z1 * self.b[1] + z2 * self.b[2];
        let den = 1.0 + z1 * self.a1 + z2 * self.a2;
        num / den
    }

    /// State (z1, z2) that makes the section output constant for a constant
    /// input of value `level`.
    fn steady_state(&self, level: f64) -> (f64, f64) {
        let dc_gain = (self.b[0] + self.b[1] + self.b[2]) / (1.0 + self.a1 + self.a2);
        let z2 = (self.b[2] - self.a2 * dc_gain) * level;
        let z1 = (self.b[1] - self.a1 * dc_gain) * level + z2;
        (z1, z2)
    }

    /// Run the section over a signal in place (Direct Form II Transposed).
    fn process_in_place(&self, signal: &mut [f64]) {
        let Some(&first) = signal.first() else {
            return;
        };
        let (mut z1, mut z2) = self.steady_state(first);
        let [b0, b1, b2] = self.b;
        for x in signal.iter_mut() {
            let input = *x;
            let output = b0 * input + z1;
            z1 = b1 * input - self.a1 * output + z2;
            z2 = b2 * input - self.a2 * output;
            *x = output;
        }
    }

    /// Whether both poles lie strictly inside the unit circle.
    pub fn is_stable(&self) -> bool {
        self.a2.abs() < 1.0 && self.a1.abs() < 1.0 + self.a2
    }
}

/// Cascade of second-order sections with unit overall gain at its reference
/// frequency.
#[derive(Clone, Debug)]
pub struct SosFilter {
    sections: Vec<Biquad>,
}

impl SosFilter {
    pub fn sections(&self) -> &[Biquad] {
        &self.sections
    }

    /// Magnitude response at a frequency for the given sample rate.
    pub fn magnitude(&self, freq: Hertz, sample_rate: f64) -> f64 {
        self.response(2.0 * PI * freq.0 / sample_rate).norm()
    }

    fn response(&self, omega: f64) -> Complex64 {
        self.sections
            .iter()
            .fold(Complex64::new(1.0, 0.0), |acc, s| acc * s.response(omega))
    }

    /// Causal single pass with steady-state initial conditions.
    fn forward_in_place(&self, signal: &mut [f64]) {
        for section in &self.sections {
            section.process_in_place(signal);
        }
    }

    /// Zero-phase forward-backward application.
    pub fn filtfilt(&self, signal: &[f64]) -> Vec<f64> {
        let n = signal.len();
        if n == 0 {
            return Vec::new();
        }

        let padlen = (3 * (2 * self.sections.len() + 1)).min(n - 1);
        let mut ext = odd_extend(signal, padlen);

        self.forward_in_place(&mut ext);
        ext.reverse();
        self.forward_in_place(&mut ext);
        ext.reverse();

        ext[padlen..padlen + n].to_vec()
    }
}

/// Extend a signal at both ends by point reflection about its end samples.
fn odd_extend(signal: &[f64], padlen: usize) -> Vec<f64> {
    let n = signal.len();
    let first = signal[0];
    let last = signal[n - 1];

    let mut ext = Vec::with_capacity(n + 2 * padlen);
    ext.extend((1..=padlen).rev().map(|i| 2.0 * first - signal[i]));
    ext.extend_from_slice(signal);
    ext.extend((1..=padlen).map(|i| 2.0 * last - signal[n - 1 - i]));
    ext
}

/// Check cutoffs against the band type and Nyquist frequency.
fn validate_cutoffs(btype: BandType, fmin: f64, fmax: f64, sample_rate: f64) -> DspResult<()> {
    let nyquist = sample_rate / 2.0;
    let in_range = |f: f64| f.is_finite() && f > 0.0 && f < nyquist;
    let ok = match btype {
        BandType::Lowpass => in_range(fmax),
        BandType::Highpass => in_range(fmin),
        BandType::Bandpass => in_range(fmin) && in_range(fmax) && fmin < fmax,
    };
    if ok {
        Ok(())
    } else {
        Err(DspError::InvalidFrequencyRange { fmin, fmax, nyquist })
    }
}

/// Design a digital Butterworth filter as second-order sections.
///
/// Cutoffs are in Hz; `fmin` is ignored for a lowpass and `fmax` for a
/// highpass. A bandpass of order N has 2N poles (N sections).
pub fn design_butterworth(
    btype: BandType,
    fmin: Hertz,
    fmax: Hertz,
    sample_rate: f64,
    order: usize,
) -> DspResult<SosFilter> {
    if order == 0 {
        return Err(DspError::InvalidConfig("filter order must be at least 1".into()));
    }
    validate_cutoffs(btype, fmin.0, fmax.0, sample_rate)?;

    // Pre-warp so the digital cutoffs land exactly where requested
    let fs2 = 2.0 * sample_rate;
    let warp = |f: f64| fs2 * (PI * f / sample_rate).tan();

    let n = order as f64;
    let prototype: Vec<Complex64> = (0..order)
        .map(|k| Complex64::from_polar(1.0, PI * (2.0 * k as f64 + n + 1.0) / (2.0 * n)))
        .collect();

    let (analog_poles, zeros, reference_omega) = match btype {
        BandType::Lowpass => {
            let wc = warp(fmax.0);
            let poles: Vec<Complex64> = prototype.iter().map(|p| *p * wc).collect();
            (poles, vec![-1.0; order], 0.0)
        }
        BandType::Highpass => {
            let wc = warp(fmin.0);
            let poles: Vec<Complex64> = prototype.iter().map(|p| wc / *p).collect();
            (poles, vec![1.0; order], PI)
        }
        BandType::Bandpass => {
            let w1 = warp(fmin.0);
            let w2 = warp(fmax.0);
            let w0 = (w1 * w2).sqrt();
            let bw = w2 - w1;
            let mut poles = Vec::with_capacity(2 * order);
            for p in &prototype {
                let scaled = *p * (bw / 2.0);
                let offset = (scaled * scaled - w0 * w0).sqrt();
                poles.push(scaled + offset);
                poles.push(scaled - offset);
            }
            let zeros = (0..2 * order)
                .map(|i| if i % 2 == 0 { 1.0 } else { -1.0 })
                .collect();
            (poles, zeros, 2.0 * (w0 / fs2).atan())
        }
    };

    // Bilinear transform
    let digital_poles: Vec<Complex64> = analog_poles
        .iter()
        .map(|s| (fs2 + *s) / (fs2 - *s))
        .collect();

    let mut sos = SosFilter { sections: build_sections(&digital_poles, &zeros) };

    let magnitude = sos.response(reference_omega).norm();
    if !(magnitude > 0.0 && magnitude.is_finite()) {
        return Err(DspError::InvalidConfig(format!(
            "degenerate {} design at {} Hz sample rate",
            btype, sample_rate
        )));
    }
    if let Some(first) = sos.sections.first_mut() {
        for b in first.b.iter_mut() {
            *b /= magnitude;
        }
    }

    Ok(sos)
}

/// Group poles into conjugate pairs (or pairs of real poles) and attach the
/// next zeros to each section.
fn build_sections(poles: &[Complex64], zeros: &[f64]) -> Vec<Biquad> {
    const IMAG_TOL: f64 = 1e-10;

    let mut pole_groups: Vec<Vec<Complex64>> = Vec::new();
    let mut reals: Vec<f64> = Vec::new();

    for p in poles {
        if p.im.abs() <= IMAG_TOL * p.norm().max(1.0) {
            reals.push(p.re);
        } else if p.im > 0.0 {
            pole_groups.push(vec![*p, p.conj()]);
        }
    }
    for pair in reals.chunks(2) {
        pole_groups.push(pair.iter().map(|&r| Complex64::new(r, 0.0)).collect());
    }

    let mut zeros = zeros.iter().copied();
    pole_groups
        .into_iter()
        .map(|group| {
            let (a1, a2) = match group.as_slice() {
                [p, q] => ((-(p + q)).re, (p * q).re),
                [p] => (-p.re, 0.0),
                _ => (0.0, 0.0),
            };
            let section_zeros: Vec<f64> = zeros.by_ref().take(group.len()).collect();
            let b = match section_zeros.as_slice() {
                [z1, z2] => [1.0, -(z1 + z2), z1 * z2],
                [z1] => [1.0, -z1, 0.0],
                _ => [1.0, 0.0, 0.0],
            };
            Biquad { b, a1, a2 }
        })
        .collect()
}

/// Filter a series according to `spec`, without time shift.
///
/// Output keeps the input's `dt` and sample count.
pub fn filter(series: &Timeseries, spec: &FilterSpec) -> DspResult<Timeseries> {
    if spec.ripple_db.is_some() || spec.stopband_atten_db.is_some() {
        tracing::debug!("Butterworth design ignores ripple and stop-band attenuation");
    }

    let sos = design_butterworth(spec.btype, spec.fmin, spec.fmax, series.sample_rate(), spec.order)?;

    tracing::trace!(
        "{} filter: fmin={} Hz, fmax={} Hz, order={}, {} sections",
        spec.btype,
        spec.fmin.0,
        spec.fmax.0,
        spec.order,
        sos.sections().len()
    );

    Ok(Timeseries::new(sos.filtfilt(&series.data), series.dt))
}

/// Filter every channel of a station.
pub fn filter_station(station: Station, spec: &FilterSpec) -> DspResult<Station> {
    station.try_map_channels(|_, ts| filter(&ts, spec))
}

#[cfg(test)]
mod tests {
    use super::*;
    use lib_types::units::Seconds;

    fn sine(freq: f64, dt: f64, n: usize) -> Vec<f64> {
        (0..n).map(|i| (2.0 * PI * freq * i as f64 * dt).sin()).collect()
    }

    fn rms(values: &[f64]) -> f64 {
        (values.iter().map(|v| v * v).sum::<f64>() / values.len() as f64).sqrt()
    }

    fn distance(a: &[f64], b: &[f64]) -> f64 {
        a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum::<f64>().sqrt()
    }

    #[test]
    fn test_sections_are_stable() {
        for btype in [BandType::Lowpass, BandType::Highpass, BandType::Bandpass] {
            for order in 1..=6 {
                let sos = design_butterworth(btype, Hertz(0.5), Hertz(10.0), 100.0, order).unwrap();
                assert!(sos.sections().iter().all(Biquad::is_stable), "{} order {}", btype, order);
            }
        }
    }

    #[test]
    fn test_section_counts() {
        let lp = design_butterworth(BandType::Lowpass, Hertz::ZERO, Hertz(5.0), 100.0, 4).unwrap();
        assert_eq!(lp.sections().len(), 2);

        let odd = design_butterworth(BandType::Lowpass, Hertz::ZERO, Hertz(5.0), 100.0, 3).unwrap();
        assert_eq!(odd.sections().len(), 2);

        let bp = design_butterworth(BandType::Bandpass, Hertz(1.0), Hertz(5.0), 100.0, 4).unwrap();
        assert_eq!(bp.sections().len(), 4);
    }

    #[test]
    fn test_cutoff_is_half_power() {
        let fs = 100.0;
        let lp = design_butterworth(BandType::Lowpass, Hertz::ZERO, Hertz(10.0), fs, 4).unwrap();
        assert!((lp.magnitude(Hertz(0.0), fs) - 1.0).abs() < 1e-9);
        assert!((lp.magnitude(Hertz(10.0), fs) - 0.5_f64.sqrt()).abs() < 1e-6);

        let hp = design_butterworth(BandType::Highpass, Hertz(2.0), Hertz::ZERO, fs, 4).unwrap();
        assert!((hp.magnitude(Hertz(2.0), fs) - 0.5_f64.sqrt()).abs() < 1e-6);
        assert!(hp.magnitude(Hertz(0.0), fs) < 1e-9);

        let bp = design_butterworth(BandType::Bandpass, Hertz(1.0), Hertz(5.0), fs, 4).unwrap();
        assert!((bp.magnitude(Hertz(1.0), fs) - 0.5_f64.sqrt()).abs() < 1e-6);
        assert!((bp.magnitude(Hertz(5.0), fs) - 0.5_f64.sqrt()).abs() < 1e-6);
    }

    #[test]
    fn test_lowpass_passes_dc() {
        let ts = Timeseries::new(vec![1.0; 500], Seconds(0.01));
        let out = filter(&ts, &FilterSpec::lowpass(Hertz(5.0), 4)).unwrap();

        assert_eq!(out.samples(), 500);
        assert!(out.data.iter().all(|v| (v - 1.0).abs() < 1e-6));
    }

    #[test]
    fn test_highpass_removes_dc() {
        let ts = Timeseries::new(vec![3.0; 500], Seconds(0.01));
        let out = filter(&ts, &FilterSpec::highpass(Hertz(1.0), 4)).unwrap();
        assert!(out.max_abs() < 1e-6);
    }

    #[test]
    fn test_zero_phase_in_passband() {
        let dt = 0.01;
        let data = sine(1.0, dt, 1000);
        let ts = Timeseries::new(data.clone(), Seconds(dt));
        let out = filter(&ts, &FilterSpec::lowpass(Hertz(10.0), 4)).unwrap();

        // No lag: the filtered sine overlays the input away from the edges
        for i in 100..900 {
            assert!((out.data[i] - data[i]).abs() < 1e-2, "sample {}", i);
        }
    }

    #[test]
    fn test_bandpass_selects_band() {
        let dt = 0.01;
        let ts_in = Timeseries::new(sine(2.5, dt, 2000), Seconds(dt));
        let ts_out = Timeseries::new(sine(20.0, dt, 2000), Seconds(dt));
        let spec = FilterSpec::bandpass(Hertz(1.0), Hertz(5.0), 4);

        let kept = filter(&ts_in, &spec).unwrap();
        let removed = filter(&ts_out, &spec).unwrap();

        let mid = 200..1800;
        assert!(rms(&kept.data[mid.clone()]) / rms(&ts_in.data[mid.clone()]) > 0.95);
        assert!(rms(&removed.data[mid.clone()]) / rms(&ts_out.data[mid]) < 1e-2);
    }

    #[test]
    fn test_second_pass_changes_less_than_first() {
        let dt = 0.01;
        let data: Vec<f64> = sine(2.5, dt, 1000)
            .iter()
            .zip(sine(20.0, dt, 1000))
            .map(|(a, b)| a + b)
            .collect();
        let ts = Timeseries::new(data, Seconds(dt));
        let spec = FilterSpec::bandpass(Hertz(1.0), Hertz(5.0), 4);

        let once = filter(&ts, &spec).unwrap();
        let twice = filter(&once, &spec).unwrap();

        assert!(distance(&twice.data, &once.data) < distance(&once.data, &ts.data));
    }

    #[test]
    fn test_invalid_ranges() {
        let ts = Timeseries::new(vec![0.0; 100], Seconds(0.01));

        let above_nyquist = filter(&ts, &FilterSpec::lowpass(Hertz(60.0), 4));
        assert!(matches!(above_nyquist, Err(DspError::InvalidFrequencyRange { .. })));

        let inverted = filter(&ts, &FilterSpec::bandpass(Hertz(5.0), Hertz(1.0), 4));
        assert!(matches!(inverted, Err(DspError::InvalidFrequencyRange { .. })));

        let zero_order = filter(&ts, &FilterSpec::lowpass(Hertz(5.0), 0));
        assert!(matches!(zero_order, Err(DspError::InvalidConfig(_))));
    }

    #[test]
    fn test_band_from_frequencies() {
        assert_eq!(FilterBand::from_frequencies(&[5.0]).unwrap(), FilterBand::Lowpass(Hertz(5.0)));
        assert_eq!(
            FilterBand::from_frequencies(&[0.1, 5.0]).unwrap(),
            FilterBand::Bandpass(Hertz(0.1), Hertz(5.0))
        );
        assert!(FilterBand::from_frequencies(&[5.0, 0.1]).is_err());
        assert!(FilterBand::from_frequencies(&[]).is_err());
        assert!(FilterBand::from_frequencies(&[0.1, 1.0, 5.0]).is_err());
    }

    #[test]
    fn test_band_from_bounds() {
        assert_eq!(FilterBand::from_bounds(None, None).unwrap(), None);
        assert_eq!(
            FilterBand::from_bounds(Some(0.5), None).unwrap(),
            Some(FilterBand::Highpass(Hertz(0.5)))
        );
        assert_eq!(
            FilterBand::from_bounds(None, Some(4.0)).unwrap(),
            Some(FilterBand::Lowpass(Hertz(4.0)))
        );
        assert_eq!(FilterBand::Bandpass(Hertz(0.1), Hertz(5.0)).to_string(), "0.1-5.0Hz");
    }
}
