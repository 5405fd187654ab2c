//! # FIR decimating filters
//!
//! Every stage of the receive chain is a [`DecimatingFilter`]. Each
//! filter performs up to three operations per input sample:
//!
//! 1. Frequency translation (optional): the input sample is mixed
//!    with a local [`Oscillator`] to shift the spectrum.
//!
//! 2. Sliding window: the mixed sample is shifted onto a
//!    [`Window`] of sample history. The oldest sample ages off.
//!
//! 3. Multiply-accumulate: every `decimation`th sample, the window
//!    is multiplied element-wise with the filter coefficients
//!    ([`FilterCoeff`]). The sum is the output.
//!
//! Skipped samples are not an error. They are the normal tick of a
//! decimator, and [`DecimatingFilter::compute()`] reports them as
//! `None`.
//!
//! ## Filter design
//!
//! Coefficients are the ideal (unwindowed) lowpass or highpass
//! impulse response, truncated to an odd number of taps. For tap
//! `t` of `N`, let `k = t - (N-1)/2` and `ωc = 2π·fc/fs`:
//!
//! ```txt
//! lowpass:   h[k] = sin(ωc·k) / (π·k)        h[0] = ωc/π
//! highpass:  h[k] = -sin(ωc·k) / (π·k)       h[0] = 1 - ωc/π
//! ```
//!
//! The tap count may be given directly or estimated from a
//! transition width and stopband attenuation with the *Harris
//! approximation*,
//!
//! ```txt
//! N ≈ atten_dB / (22 · Δf/fs)
//! ```
//!
//! which is then forced to an odd number.
//!
//! * F. J. Harris, *Multirate Signal Processing for Communication
//!   Systems*, 2004. §3.3

use std::collections::VecDeque;
use std::convert::AsRef;
use std::ops::{AddAssign, Mul};

use nalgebra::base::Scalar;
use nalgebra::DVector;
use num_traits::Zero;

use crate::error::ConfigError;
use crate::oscillator::{Cisoid, Oscillator};

/// A sample type which may be filtered
///
/// Implemented for `f32` and `Complex<f32>`. Filter coefficients
/// are always real.
pub trait Sample:
    Copy + Scalar + Zero + Cisoid + Mul<Output = Self> + Mul<f32, Output = Self> + AddAssign
{
}

impl<T> Sample for T where
    T: Copy + Scalar + Zero + Cisoid + Mul<Output = Self> + Mul<f32, Output = Self> + AddAssign
{
}

/// Filter response
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FilterKind {
    /// Pass frequencies below the cutoff
    Lowpass,

    /// Pass frequencies above the cutoff
    Highpass,
}

/// How many taps a filter should have
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TapSpec {
    /// Exactly this many taps, which must be odd
    Count(usize),

    /// Estimate with the Harris approximation
    ///
    /// `transition_hz` is the width of the transition band, and
    /// `attenuation_db` is the desired stopband attenuation.
    Harris {
        /// Transition band width (Hz)
        transition_hz: u32,
        /// Stopband attenuation (dB)
        attenuation_db: u32,
    },
}

impl TapSpec {
    /// Number of taps for the given sampling rate
    ///
    /// The result is always odd.
    pub fn tap_count(&self, sample_rate: u32) -> Result<usize, ConfigError> {
        match *self {
            TapSpec::Count(n) if n % 2 == 1 => Ok(n),
            TapSpec::Count(n) => Err(ConfigError::EvenTapCount(n)),
            TapSpec::Harris {
                transition_hz,
                attenuation_db,
            } => {
                if sample_rate == 0 {
                    return Err(ConfigError::SampleRateZero);
                }
                if transition_hz == 0 {
                    return Err(ConfigError::TransitionWidthZero);
                }
                if attenuation_db == 0 {
                    return Err(ConfigError::AttenuationZero);
                }

                let normalized_transition = transition_hz as f64 / sample_rate as f64;
                let est = attenuation_db as f64 / (22.0f64 * normalized_transition);

                // round up, and if that's even, round down instead
                let n = f64::ceil(est) as usize;
                Ok(if n % 2 == 0 { n - 1 } else { n })
            }
        }
    }
}

/// Configuration for one [`DecimatingFilter`]
///
/// ```
/// use sensor345::{FilterConfig, TapSpec};
///
/// let cfg = FilterConfig::lowpass(20_000, TapSpec::Count(11))
///     .with_sample_rate(200_000)
///     .with_decimation(4)
///     .with_translation(-70_000);
/// assert_eq!(Some(-70_000), cfg.translation_hz());
/// assert_eq!(50_000, cfg.output_rate());
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FilterConfig {
    kind: FilterKind,
    taps: TapSpec,
    sample_rate: u32,
    decimation: u32,
    cutoff_hz: u32,
    translation_hz: Option<i32>,
}

impl FilterConfig {
    /// Lowpass filter with cutoff `cutoff_hz`
    ///
    /// The sampling rate must be set before use. The filter does
    /// not decimate or translate until configured to.
    pub fn lowpass(cutoff_hz: u32, taps: TapSpec) -> Self {
        Self::new(FilterKind::Lowpass, cutoff_hz, taps)
    }

    /// Highpass filter with cutoff `cutoff_hz`
    pub fn highpass(cutoff_hz: u32, taps: TapSpec) -> Self {
        Self::new(FilterKind::Highpass, cutoff_hz, taps)
    }

    /// New filter configuration
    pub fn new(kind: FilterKind, cutoff_hz: u32, taps: TapSpec) -> Self {
        Self {
            kind,
            taps,
            sample_rate: 0,
            decimation: 1,
            cutoff_hz,
            translation_hz: None,
        }
    }

    /// Input sampling rate (Hz)
    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    /// Keep only every `decimation`th output
    pub fn with_decimation(mut self, decimation: u32) -> Self {
        self.decimation = decimation;
        self
    }

    /// Translate the input by `translation_hz` before filtering
    pub fn with_translation(mut self, translation_hz: i32) -> Self {
        self.translation_hz = Some(translation_hz);
        self
    }

    /// Filter response
    pub fn kind(&self) -> FilterKind {
        self.kind
    }

    /// Tap count specification
    pub fn taps(&self) -> TapSpec {
        self.taps
    }

    /// Input sampling rate (Hz)
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Decimation factor
    pub fn decimation(&self) -> u32 {
        self.decimation
    }

    /// Cutoff frequency (Hz)
    pub fn cutoff_hz(&self) -> u32 {
        self.cutoff_hz
    }

    /// Frequency translation (Hz), if any
    pub fn translation_hz(&self) -> Option<i32> {
        self.translation_hz
    }

    /// Output sampling rate (Hz), after decimation
    pub fn output_rate(&self) -> u32 {
        self.sample_rate / u32::max(self.decimation, 1)
    }
}

/// FIR filter with frequency translation and decimation
///
/// `T` may be real (`f32`) or complex (`Complex<f32>`). All memory
/// is allocated when the filter is created.
///
/// ```
/// use sensor345::{DecimatingFilter, FilterConfig, TapSpec};
///
/// let cfg = FilterConfig::lowpass(1000, TapSpec::Count(5))
///     .with_sample_rate(8000)
///     .with_decimation(2);
/// let mut filt = DecimatingFilter::<f32>::new(&cfg).expect("bad filter");
/// assert_eq!(None, filt.compute(1.0));
/// assert!(filt.compute(1.0).is_some());
/// ```
#[derive(Clone, Debug)]
pub struct DecimatingFilter<T>
where
    T: Sample,
{
    coeff: FilterCoeff<f32>,
    history: Window<T>,
    decimation: u32,
    decimation_counter: u32,
    oscillator: Option<Oscillator<T>>,
}

impl<T> DecimatingFilter<T>
where
    T: Sample,
{
    /// Design a filter
    ///
    /// Fails if the configuration cannot be realized.
    pub fn new(config: &FilterConfig) -> Result<Self, ConfigError> {
        if config.sample_rate() == 0 {
            return Err(ConfigError::SampleRateZero);
        }
        if config.decimation() == 0 {
            return Err(ConfigError::DecimationZero);
        }

        let num_taps = config.taps().tap_count(config.sample_rate())?;
        let taps = design_taps(
            config.kind(),
            num_taps,
            config.sample_rate(),
            config.cutoff_hz(),
        );

        let oscillator = match config.translation_hz() {
            Some(freq) if freq != 0 => Some(Oscillator::new(config.sample_rate(), freq)?),
            _ => None,
        };

        Ok(Self {
            coeff: FilterCoeff::from_slice(taps),
            history: Window::new(num_taps),
            decimation: config.decimation(),
            decimation_counter: 0,
            oscillator,
        })
    }

    /// Filter one input sample
    ///
    /// Returns the filtered output on every `decimation`th call and
    /// `None` otherwise.
    #[inline]
    pub fn compute(&mut self, sample: T) -> Option<T> {
        let sample = match self.oscillator.as_mut() {
            Some(lo) => sample * lo.next_sample(),
            None => sample,
        };
        self.history.push_scalar(sample);

        self.decimation_counter += 1;
        if self.decimation_counter < self.decimation {
            return None;
        }
        self.decimation_counter = 0;

        Some(self.coeff.filter(&self.history))
    }

    /// Reset to zero initial conditions
    pub fn reset(&mut self) {
        self.history.reset();
        self.decimation_counter = 0;
        if let Some(lo) = self.oscillator.as_mut() {
            lo.reset();
        }
    }

    /// Number of filter taps
    pub fn num_taps(&self) -> usize {
        self.coeff.len()
    }

    /// Decimation factor
    pub fn decimation(&self) -> u32 {
        self.decimation
    }

    /// Filter coefficients
    pub fn taps(&self) -> &[f32] {
        self.coeff.as_slice()
    }
}

/// FIR filter coefficients
///
/// The zeroth coefficient multiplies the most recent sample.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterCoeff<T>(DVector<T>)
where
    T: Copy + Scalar + Zero;

impl<T> FilterCoeff<T>
where
    T: Copy + Scalar + Zero,
{
    /// Create from slice
    ///
    /// Creates FIR filter coefficients with the specified impulse
    /// response `h`. The coefficients `h` use the same representation
    /// as GNU Octave's `filter()` function.
    pub fn from_slice<S>(h: S) -> Self
    where
        S: AsRef<[T]>,
    {
        let inp = h.as_ref();
        FilterCoeff(DVector::from_iterator(inp.len(), inp.iter().copied()))
    }

    /// Number of filter coefficients
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Perform FIR filtering with the given sample history
    ///
    /// `history` must output the oldest sample first and the
    /// newest sample last. The newest sample is used for lag 0.
    /// If `history` is shorter than the filter, the missing
    /// samples are treated as zeros.
    pub fn filter<W, In, Out>(&self, history: W) -> Out
    where
        W: IntoIterator<Item = In>,
        W::IntoIter: DoubleEndedIterator,
        In: Copy + Scalar + Mul<T, Output = Out>,
        Out: Copy + Scalar + Zero + AddAssign,
    {
        multiply_accumulate(history, self.as_slice())
    }

    /// Return filter coefficients as slice
    #[inline]
    pub fn as_slice(&self) -> &[T] {
        self.0.as_slice()
    }
}

impl<T> AsRef<[T]> for FilterCoeff<T>
where
    T: Copy + Scalar + Zero,
{
    #[inline]
    fn as_ref(&self) -> &[T] {
        self.as_slice()
    }
}

/// Filter window
///
/// Implements a fixed-size lookback window. The window starts
/// full of zeros and never changes size.
#[derive(Clone, Debug)]
pub struct Window<T>(VecDeque<T>)
where
    T: Copy + Scalar + Zero;

impl<T> Window<T>
where
    T: Copy + Scalar + Zero,
{
    /// Create window of the given `len`gth, filled with zeros
    pub fn new(len: usize) -> Self {
        let mut q = VecDeque::with_capacity(len);
        q.resize(len, T::zero());
        Self(q)
    }

    /// Reset to zero initial conditions
    pub fn reset(&mut self) {
        for s in &mut self.0 {
            *s = T::zero()
        }
    }

    /// Window length
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Append a scalar to the sample window
    ///
    /// The `input` becomes the most recent sample. Returns the
    /// sample which was formerly the oldest.
    #[inline]
    pub fn push_scalar(&mut self, input: T) -> T {
        let out = self.0.pop_front().unwrap_or(T::zero());
        self.0.push_back(input);
        out
    }

    /// Iterator over window contents, least recent first
    pub fn iter(&self) -> <&Window<T> as IntoIterator>::IntoIter {
        self.into_iter()
    }

    /// Copy window contents to a vector, least recent first
    pub fn to_vec(&self) -> Vec<T> {
        self.iter().collect()
    }
}

impl<'a, T> IntoIterator for &'a Window<T>
where
    T: Copy + Scalar + Zero,
{
    type Item = T;

    type IntoIter = std::iter::Copied<std::collections::vec_deque::Iter<'a, T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter().copied()
    }
}

// Ideal lowpass or highpass impulse response
//
// `num_taps` must be odd so that the center tap lands on
// offset zero.
fn design_taps(kind: FilterKind, num_taps: usize, sample_rate: u32, cutoff_hz: u32) -> Vec<f32> {
    use std::f64::consts::PI;

    let wc = 2.0f64 * PI * cutoff_hz as f64 / sample_rate as f64;
    let center = (num_taps as f64 - 1.0f64) / 2.0f64;

    (0..num_taps)
        .map(|tap| {
            let offset = tap as f64 - center;
            let lowpass = if offset == 0.0 {
                wc / PI
            } else {
                f64::sin(wc * offset) / (PI * offset)
            };
            let out = match (kind, offset == 0.0) {
                (FilterKind::Lowpass, _) => lowpass,
                (FilterKind::Highpass, true) => 1.0f64 - lowpass,
                (FilterKind::Highpass, false) => -lowpass,
            };
            out as f32
        })
        .collect()
}

// Multiply-accumulate operation
//
// Calculates the sum of the element-wise multiplication,
//
// ```txt
// out = Σ history[N-1-i] * coeff[i]
// ```
//
// `history` is ordered oldest first. Its newest sample meets
// `coeff[0]`. The two inputs need not be the same length.
fn multiply_accumulate<W, In, Coeff, Out>(history: W, coeff: &[Coeff]) -> Out
where
    W: IntoIterator<Item = In>,
    W::IntoIter: DoubleEndedIterator,
    In: Copy + Scalar + Mul<Coeff, Output = Out>,
    Coeff: Copy + Scalar,
    Out: Copy + Scalar + Zero + AddAssign,
{
    let history = history.into_iter();
    let mut out = Out::zero();
    for (hi, co) in history.rev().zip(coeff.iter()) {
        out += hi * *co;
    }
    out
}
