//! Receiver configuration errors

use thiserror::Error;

/// Error constructing part of the receive chain
///
/// These errors are raised only when a filter, oscillator, or
/// complete receiver is *built*. Once a receiver exists, no
/// decoding condition will ever produce one.
#[derive(Error, Clone, Debug, PartialEq)]
pub enum ConfigError {
    /// A filter or oscillator was given a sampling rate of zero
    #[error("sampling rate must be nonzero")]
    SampleRateZero,

    /// A Harris filter design was given a transition width of zero
    #[error("filter transition width must be nonzero")]
    TransitionWidthZero,

    /// A Harris filter design was given an attenuation of zero
    #[error("filter attenuation must be nonzero")]
    AttenuationZero,

    /// An explicit tap count was zero or even
    ///
    /// Only odd-length (type 1) filters are supported.
    #[error("filter tap count must be odd, got {0}")]
    EvenTapCount(usize),

    /// A decimation factor of zero was requested
    #[error("decimation factor must be at least one")]
    DecimationZero,

    /// The oscillator frequency exceeds the Nyquist rate
    #[error("cannot generate {frequency} Hz at a sampling rate of {sample_rate} Hz")]
    InsufficientSampleRate {
        /// Requested frequency (Hz)
        frequency: i32,
        /// Sampling rate (Hz)
        sample_rate: u32,
    },

    /// No phase-continuous lookup table of reasonable length exists
    #[error("no phase-continuous period for {frequency} Hz at {sample_rate} Hz")]
    PhaseDiscontinuity {
        /// Requested frequency (Hz)
        frequency: i32,
        /// Sampling rate (Hz)
        sample_rate: u32,
    },

    /// Too many baseband filter stages were requested
    #[error("at most {0} baseband filter stages are supported")]
    TooManyStages(usize),

    /// The pulse width is too short for the final sampling rate
    ///
    /// Every symbol must span at least one sample after all
    /// decimation stages.
    #[error("estimated {0} samples per symbol; need at least one")]
    SymbolTooShort(f32),
}
