//! Lookup-table local oscillator
//!
//! The [`Oscillator`] generates a sinusoid for digital frequency
//! translation. Rather than evaluate `cos()` and `sin()` for every
//! sample, it precomputes exactly one period of the *sampled*
//! waveform and then walks the table.
//!
//! A sampled sinusoid at `f` Hz only repeats itself after `N`
//! samples when `N·|f|` is a whole multiple of the sampling rate.
//! The table length is the smallest such `N`, so the output stays
//! phase-continuous when the index wraps around.

use num_complex::Complex;

use crate::error::ConfigError;

/// A value which can be produced by the oscillator
///
/// Real oscillators emit `cos(φ)`. Complex oscillators emit the
/// full cisoid `cos(φ) + j·sin(φ)`.
pub trait Cisoid: Copy {
    /// Value of the oscillator at phase `phase` (radians)
    fn cisoid(phase: f32) -> Self;
}

impl Cisoid for f32 {
    #[inline]
    fn cisoid(phase: f32) -> Self {
        phase.cos()
    }
}

impl Cisoid for Complex<f32> {
    #[inline]
    fn cisoid(phase: f32) -> Self {
        Complex::new(phase.cos(), phase.sin())
    }
}

/// Phase-continuous lookup-table oscillator
#[derive(Clone, Debug)]
pub struct Oscillator<T>
where
    T: Cisoid,
{
    table: Vec<T>,
    index: usize,
}

impl<T> Oscillator<T>
where
    T: Cisoid,
{
    /// Create oscillator
    ///
    /// Generates `frequency` Hz (which may be negative) at the
    /// given `sample_rate`. Fails if the frequency is above the
    /// Nyquist rate or if no period shorter than
    /// [`MAX_TABLE_LEN`](Self::MAX_TABLE_LEN) samples exists.
    pub fn new(sample_rate: u32, frequency: i32) -> Result<Self, ConfigError> {
        if sample_rate == 0 {
            return Err(ConfigError::SampleRateZero);
        }

        if frequency.unsigned_abs() > sample_rate / 2 {
            return Err(ConfigError::InsufficientSampleRate {
                frequency,
                sample_rate,
            });
        }

        let len = period_len(sample_rate, frequency).ok_or(ConfigError::PhaseDiscontinuity {
            frequency,
            sample_rate,
        })?;

        let rad_per_sa =
            2.0f64 * std::f64::consts::PI * frequency as f64 / sample_rate as f64;
        let table = (0..len)
            .map(|step| {
                // reduce in double precision; f32 loses the phase
                // quickly for long tables
                let phase = (rad_per_sa * step as f64) % (2.0f64 * std::f64::consts::PI);
                T::cisoid(phase as f32)
            })
            .collect();

        Ok(Self { table, index: 0 })
    }

    /// Next oscillator output
    ///
    /// Returns the current table entry and advances the phase.
    #[inline]
    pub fn next_sample(&mut self) -> T {
        let out = self.table[self.index];
        self.index = (self.index + 1) % self.table.len();
        out
    }

    /// Samples per period of the lookup table
    pub fn period(&self) -> usize {
        self.table.len()
    }

    /// Reset phase to zero
    pub fn reset(&mut self) {
        self.index = 0;
    }

    /// Longest lookup table we are willing to build
    pub const MAX_TABLE_LEN: u64 = 65536;
}

// Smallest N > 0 with N·|f| ≡ 0 (mod fs), if it is short enough
fn period_len(sample_rate: u32, frequency: i32) -> Option<usize> {
    let fs = sample_rate as u64;
    let freq = frequency.unsigned_abs() as u64;
    (1..=Oscillator::<f32>::MAX_TABLE_LEN)
        .find(|n| (freq * n) % fs == 0)
        .map(|n| n as usize)
}
