//! Full receiver chain

#[cfg(not(test))]
use log::{debug, info};

#[cfg(test)]
use std::println as debug;
#[cfg(test)]
use std::println as info;

use std::convert::TryFrom;
use std::iter::{IntoIterator, Iterator};

use arrayvec::ArrayVec;
use num_complex::Complex;

use crate::builder::SensorReceiverBuilder;
use crate::error::ConfigError;
use crate::filter::DecimatingFilter;
use crate::framing::{FrameStats, ProtocolReceiver, ProtocolState};
use crate::message::SensorMessage;

/// Maximum number of baseband filter stages
pub const MAX_BASEBAND_STAGES: usize = 4;

/// A complete 345 MHz sensor receiver chain
///
/// The receive chain takes complex `f32` samples and
/// performs the following operations:
///
/// 1. Frequency translation, lowpass filtering, and decimation
///    of the complex input. This is the *IF* stage.
/// 2. On-off keying detection by magnitude squared.
/// 3. One or more *baseband* filters, which remove the mean
///    signal power and smooth the result.
/// 4. Slicing: non-negative samples are high, and negative
///    samples are low.
/// 5. Symbol-rate recovery, Manchester decoding, framing, and
///    CRC checks.
///
/// To create the receiver, first create its Builder:
///
/// ```
/// use sensor345::SensorReceiverBuilder;
///
/// let receiver = SensorReceiverBuilder::default()
///     .build()
///     .expect("bad receiver config");
/// assert_eq!(receiver.input_rate(), 200000);
/// ```
///
/// See [module documentation](index.html) for details.
#[derive(Clone, Debug)]
pub struct SensorReceiver {
    if_filter: DecimatingFilter<Complex<f32>>,
    baseband: ArrayVec<DecimatingFilter<f32>, MAX_BASEBAND_STAGES>,
    protocol: ProtocolReceiver,
    input_rate: u32,
    output_rate: u32,
    input_sample_counter: u64,
}

impl SensorReceiver {
    /// Receive sensor messages from a source of IQ samples
    ///
    /// Bind an iterator which will consume the `input` and
    /// produce validated [`SensorMessage`]s.
    ///
    /// The `input` must be complex baseband samples at the
    /// [`input_rate()`](#method.input_rate) for this receiver.
    /// Software radios commonly emit interleaved `i8` or `u8`
    /// samples. You must perform the conversion to
    /// floating-point yourself, if needed. Scaling does not
    /// matter; only the sign of the filtered power is used.
    ///
    /// The iterator will consume as many samples of `input`
    /// that are required to produce the next message. It will
    /// return `None` if the input is exhausted and there
    /// are no new messages.
    #[must_use = "iterators are lazy and do nothing unless consumed"]
    pub fn iter<'rx, I, T>(&'rx mut self, input: I) -> SourceIter<'rx, T>
    where
        I: IntoIterator<Item = Complex<f32>> + IntoIterator<IntoIter = T>,
        T: Iterator<Item = Complex<f32>>,
    {
        SourceIter {
            source: input.into_iter(),
            receiver: self,
        }
    }

    /// Process one input sample
    ///
    /// Returns a message if the sample completes one. Most
    /// samples are absorbed by decimation and never reach the
    /// framer.
    #[inline]
    pub fn process(&mut self, input: Complex<f32>) -> Option<SensorMessage> {
        self.input_sample_counter = self.input_sample_counter.wrapping_add(1);

        let if_out = self.if_filter.compute(input)?;
        let mut baseband = if_out.norm_sqr();
        for stage in &mut self.baseband {
            baseband = stage.compute(baseband)?;
        }

        self.protocol.push(!baseband.is_sign_negative())
    }

    /// Input sampling rate
    ///
    /// Returns sampling rate expected by the
    /// [`process()`](#method.process) method.
    pub fn input_rate(&self) -> u32 {
        self.input_rate
    }

    /// Sampling rate at the slicer
    pub fn output_rate(&self) -> u32 {
        self.output_rate
    }

    /// Lifetime total input sample counter
    ///
    /// Reports the lifetime total of input samples which
    /// have been processed.
    pub fn input_sample_counter(&self) -> u64 {
        self.input_sample_counter
    }

    /// Framer state
    pub fn protocol_state(&self) -> ProtocolState {
        self.protocol.state()
    }

    /// Lifetime frame statistics
    pub fn stats(&self) -> &FrameStats {
        self.protocol.stats()
    }

    /// Clear all DSP states and reset to zero initial conditions
    ///
    /// All buffers and states are cleared.
    pub fn reset(&mut self) {
        self.if_filter.reset();
        for stage in &mut self.baseband {
            stage.reset();
        }
        self.protocol.reset();
        self.input_sample_counter = 0;
    }

    /// Flush the DSP buffers and emit any leftover messages
    ///
    /// The filters impose delay on the input, and the framer
    /// only decodes a run of samples once the run has ended.
    /// When processing recordings that have been "close cut"
    /// to the extents of a transmission, the `SensorReceiver`
    /// might not emit the final message.
    ///
    /// This method flushes the input with enough zeros to push
    /// every buffered sample through the filters and then ends
    /// the final run. Returns the last `SensorMessage`
    /// generated, if any.
    ///
    /// You probably want to [`reset()`](#method.reset) after
    /// calling this method.
    pub fn flush(&mut self) -> Option<SensorMessage> {
        let zeros = std::iter::repeat(Complex::new(0.0f32, 0.0f32)).take(self.flush_len());
        let mut out = None;
        for msg in self.iter(zeros) {
            out = Some(msg);
        }
        if let Some(msg) = self.protocol.flush() {
            info!(
                "receiver [{:<14}]: {}",
                self.input_sample_counter(),
                msg
            );
            out = Some(msg);
        }
        out
    }

    // Input samples needed to fill every filter with zeros
    //
    // Each stage's window is scaled by the decimation ahead of
    // it, plus one output sample of margin.
    fn flush_len(&self) -> usize {
        let mut ratio = 1usize;
        let mut len = 0usize;
        for (taps, decimation) in std::iter::once(&self.if_filter)
            .map(|f| (f.num_taps(), f.decimation()))
            .chain(self.baseband.iter().map(|f| (f.num_taps(), f.decimation())))
        {
            len += taps * ratio;
            ratio *= decimation as usize;
        }
        len + ratio
    }
}

impl TryFrom<&SensorReceiverBuilder> for SensorReceiver {
    type Error = ConfigError;

    /// Create the sensor receiver from its Builder
    fn try_from(cfg: &SensorReceiverBuilder) -> Result<Self, Self::Error> {
        let input_rate = cfg.input_rate();
        if input_rate == 0 {
            return Err(ConfigError::SampleRateZero);
        }

        let if_cfg = cfg
            .if_filter()
            .with_sample_rate(input_rate)
            .with_translation(cfg.translation_hz());
        let if_filter = DecimatingFilter::new(&if_cfg)?;

        let mut rate = if_cfg.output_rate();
        let mut baseband = ArrayVec::new();
        for stage in cfg.baseband_stages() {
            let stage = stage.with_sample_rate(rate);
            baseband
                .try_push(DecimatingFilter::new(&stage)?)
                .map_err(|_| ConfigError::TooManyStages(MAX_BASEBAND_STAGES))?;
            rate = stage.output_rate();
        }

        let symbol_estimate = cfg.pulse_width() * rate as f32;
        if !(symbol_estimate >= 1.0f32) {
            return Err(ConfigError::SymbolTooShort(symbol_estimate));
        }

        debug!(
            "receiver: {} Hz input, {} Hz at slicer, {:.2} samples per symbol",
            input_rate, rate, symbol_estimate
        );

        Ok(Self {
            if_filter,
            baseband,
            protocol: ProtocolReceiver::new(symbol_estimate, cfg.manchester_policy()),
            input_rate,
            output_rate: rate,
            input_sample_counter: 0,
        })
    }
}

/// Sample source iterator
///
/// This iterator is bound to a source of complex IQ
/// samples. Calling the `next()` method will return the
/// next [`SensorMessage`] from the receiver or `None` if
/// the available samples have been consumed without any
/// new messages.
#[derive(Debug)]
pub struct SourceIter<'rx, I>
where
    I: Iterator<Item = Complex<f32>>,
{
    source: I,
    receiver: &'rx mut SensorReceiver,
}

impl<'rx, I> Iterator for SourceIter<'rx, I>
where
    I: Iterator<Item = Complex<f32>>,
{
    type Item = SensorMessage;

    fn next(&mut self) -> Option<Self::Item> {
        for sa in &mut self.source {
            if let Some(msg) = self.receiver.process(sa) {
                info!(
                    "receiver [{:<14}]: {}",
                    self.receiver.input_sample_counter(),
                    msg
                );
                return Some(msg);
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::filter::{FilterConfig, TapSpec};
    use crate::protocol::Vendor;
    use crate::waveform;

    const INPUT_RATE: u32 = 200_000;
    const CARRIER_HZ: f32 = 70_000.0;

    // 130 µs at 200 kSa/s
    const INPUT_SPS: usize = 26;

    fn default_receiver() -> SensorReceiver {
        SensorReceiverBuilder::default()
            .build()
            .expect("bad receiver config")
    }

    fn iq_frame(channel: u8, fields: &[(u64, u32)], sps: usize) -> Vec<Complex<f32>> {
        let levels = waveform::frame_with_crc(channel, fields);
        waveform::modulate(&waveform::render(&levels, sps, 400), INPUT_RATE, CARRIER_HZ)
    }

    #[test]
    fn test_build() {
        let rx = default_receiver();
        assert_eq!(INPUT_RATE, rx.input_rate());
        assert_eq!(25_000, rx.output_rate());
        assert_eq!(2, rx.baseband.len());
        assert_eq!(11 + 15 * 4 + 5 * 4 + 8, rx.flush_len());
        assert_eq!(ProtocolState::Sync, rx.protocol_state());
    }

    #[test]
    fn test_build_errors() {
        let mut builder = SensorReceiverBuilder::default();
        builder.with_baseband_stages(&[FilterConfig::lowpass(1000, TapSpec::Count(3)); 5]);
        assert_eq!(
            Err(ConfigError::TooManyStages(MAX_BASEBAND_STAGES)),
            builder.build().map(|_| ())
        );

        let mut builder = SensorReceiverBuilder::default();
        builder.with_pulse_width(10.0e-6);
        assert!(matches!(
            builder.build(),
            Err(ConfigError::SymbolTooShort(_))
        ));

        let builder = SensorReceiverBuilder::new(0);
        assert_eq!(Err(ConfigError::SampleRateZero), builder.build().map(|_| ()));

        let mut builder = SensorReceiverBuilder::default();
        builder.with_translation(150_000);
        assert!(matches!(
            builder.build(),
            Err(ConfigError::InsufficientSampleRate { .. })
        ));

        let mut builder = SensorReceiverBuilder::default();
        builder.with_baseband_stages(&[FilterConfig::highpass(1530, TapSpec::Count(14))]);
        assert_eq!(Err(ConfigError::EvenTapCount(14)), builder.build().map(|_| ()));
    }

    #[test]
    fn test_decode_iq() {
        let mut rx = default_receiver();
        let iq = iq_frame(8, &[(0x12345, 20), (0x80, 8)], INPUT_SPS);
        let out: Vec<SensorMessage> = rx.iter(iq.iter().copied()).collect();

        assert_eq!(1, out.len());
        assert_eq!(Vendor::Honeywell, out[0].vendor());
        assert_eq!(0x12345, out[0].txid());
        assert_eq!(0x80, out[0].state());
        assert_eq!(iq.len() as u64, rx.input_sample_counter());
        assert_eq!(1, rx.stats().messages);
    }

    #[test]
    fn test_decode_iq_off_nominal() {
        for sps in [23, 29] {
            let mut rx = default_receiver();
            let iq = iq_frame(2, &[(0xabcde, 20), (0x24, 8)], sps);
            let out: Vec<SensorMessage> = rx.iter(iq).collect();
            assert_eq!(1, out.len());
            assert_eq!(Vendor::TwoGig, out[0].vendor());
            assert_eq!(0xabcde, out[0].txid());
        }
    }

    #[test]
    fn test_flush_and_reset() {
        let mut rx = default_receiver();
        let levels = waveform::frame_with_crc(8, &[(0x12345, 20), (0x80, 8)]);
        let mut samples = waveform::render(&levels, INPUT_SPS, 400);
        samples.truncate(samples.len() - 400);
        let iq = waveform::modulate(&samples, INPUT_RATE, CARRIER_HZ);

        assert_eq!(0, rx.iter(iq).count());
        let msg = rx.flush().expect("expected message");
        assert_eq!(0x12345, msg.txid());

        rx.reset();
        assert_eq!(0, rx.input_sample_counter());
        assert_eq!(ProtocolState::Sync, rx.protocol_state());
        assert_eq!(0, rx.stats().messages);
    }
}
