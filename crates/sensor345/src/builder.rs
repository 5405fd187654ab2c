use std::convert::TryFrom;

use crate::error::ConfigError;
use crate::filter::{FilterConfig, TapSpec};
use crate::framing::ManchesterPolicy;
use crate::protocol::PULSE_WIDTH;
use crate::receiver::SensorReceiver;

/// Builds a sensor receiver
///
/// The builder comes with a sensible set of default options for
/// a complex baseband capture at 200 kSa/s, tuned 70 kHz below
/// 345 MHz. All you really need to provide is the input sampling
/// rate and the offset of the sensor band from the center of the
/// capture.
///
/// The default chain is:
///
/// 1. IF stage: translate by −70 kHz and lowpass at 20 kHz with
///    11 taps, decimating by four.
/// 2. Magnitude-squared detection.
/// 3. Baseband highpass at 1530 Hz with 15 taps, which removes
///    the mean signal power.
/// 4. Baseband lowpass at 9800 Hz with 5 taps, decimating by two.
/// 5. Slicing on the sign of the result.
///
/// Filter cutoffs and tap counts are given as [`FilterConfig`].
/// Their sampling rates are filled in by the builder: each stage
/// runs at the output rate of the stage before it.
///
/// The API specified by the builder is part of this crate's
/// API. The actual default values are *not*, however, and
/// are subject to revision in any minor release. If you
/// care very strongly about a setting, be sure to configure
/// it here.
#[derive(Clone, Debug, PartialEq)]
pub struct SensorReceiverBuilder {
    input_rate: u32,
    translation_hz: i32,
    if_filter: FilterConfig,
    baseband: Vec<FilterConfig>,
    pulse_width: f32,
    manchester_policy: ManchesterPolicy,
}

impl SensorReceiverBuilder {
    /// New receiver chain with "sensible" defaults
    ///
    /// The only mandatory parameter is the input sampling rate,
    /// in Hz. The default filters were designed for 200 kSa/s.
    /// If you change the rate, you may need to change the
    /// filters too.
    pub fn new(input_rate: u32) -> Self {
        Self {
            input_rate,
            translation_hz: -70_000,
            if_filter: FilterConfig::lowpass(20_000, TapSpec::Count(11)).with_decimation(4),
            baseband: vec![
                FilterConfig::highpass(1530, TapSpec::Count(15)),
                FilterConfig::lowpass(9800, TapSpec::Count(5)).with_decimation(2),
            ],
            pulse_width: PULSE_WIDTH,
            manchester_policy: ManchesterPolicy::default(),
        }
    }

    /// Build a receiver chain
    ///
    /// Once built, the receiver chain is immediately ready to
    /// process samples. Fails if any filter cannot be designed or
    /// if a symbol would be shorter than one sample after all
    /// decimation.
    pub fn build(&self) -> Result<SensorReceiver, ConfigError> {
        SensorReceiver::try_from(self)
    }

    /// Frequency translation (Hz)
    ///
    /// The input is shifted by `hz` before the IF filter. Set this
    /// to the negative of the sensor band's offset from the
    /// center of the capture. Zero disables translation.
    pub fn with_translation(&mut self, hz: i32) -> &mut Self {
        self.translation_hz = hz;
        self
    }

    /// IF filter
    ///
    /// The IF filter operates on complex samples at the input
    /// rate, before detection. Its sampling rate and translation
    /// are set by the builder.
    pub fn with_if_filter(&mut self, cfg: FilterConfig) -> &mut Self {
        self.if_filter = cfg;
        self
    }

    /// Baseband filters, in order
    ///
    /// Baseband filters operate on detected power. At most
    /// [`MAX_BASEBAND_STAGES`](crate::MAX_BASEBAND_STAGES) are
    /// permitted. An empty list slices the detected power
    /// directly, which is rarely what you want.
    pub fn with_baseband_stages(&mut self, stages: &[FilterConfig]) -> &mut Self {
        self.baseband = stages.to_vec();
        self
    }

    /// Nominal symbol duration (s)
    ///
    /// Used to estimate the number of samples per symbol until
    /// each frame's sync pattern is measured.
    pub fn with_pulse_width(&mut self, secs: f32) -> &mut Self {
        self.pulse_width = secs;
        self
    }

    /// Action on invalid Manchester pairs
    pub fn with_manchester_policy(&mut self, policy: ManchesterPolicy) -> &mut Self {
        self.manchester_policy = policy;
        self
    }

    /// Input sampling rate (Hz)
    pub fn input_rate(&self) -> u32 {
        self.input_rate
    }

    /// Frequency translation (Hz)
    pub fn translation_hz(&self) -> i32 {
        self.translation_hz
    }

    /// IF filter configuration, as given
    pub fn if_filter(&self) -> &FilterConfig {
        &self.if_filter
    }

    /// Baseband filter configurations, as given
    pub fn baseband_stages(&self) -> &[FilterConfig] {
        &self.baseband
    }

    /// Nominal symbol duration (s)
    pub fn pulse_width(&self) -> f32 {
        self.pulse_width
    }

    /// Action on invalid Manchester pairs
    pub fn manchester_policy(&self) -> ManchesterPolicy {
        self.manchester_policy
    }

    /// Sampling rate at the slicer (Hz)
    ///
    /// The input rate after every decimation stage. Rates are
    /// divided with integer division.
    pub fn output_rate(&self) -> u32 {
        self.baseband.iter().fold(
            self.if_filter.with_sample_rate(self.input_rate).output_rate(),
            |rate, stage| stage.with_sample_rate(rate).output_rate(),
        )
    }

    /// Nominal samples per symbol at the slicer
    pub fn symbol_estimate(&self) -> f32 {
        self.pulse_width * self.output_rate() as f32
    }
}

impl std::default::Default for SensorReceiverBuilder {
    fn default() -> Self {
        Self::new(200_000)
    }
}
