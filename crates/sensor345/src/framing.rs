//! Sensor frame assembly

#[cfg(not(test))]
use log::{debug, info, trace, warn};

#[cfg(test)]
use std::println as debug;
#[cfg(test)]
use std::println as info;
#[cfg(test)]
use std::println as trace;
#[cfg(test)]
use std::println as warn;

use crate::crc::Crc16;
use crate::manchester::ManchesterDecoder;
use crate::message::SensorMessage;
use crate::protocol::{Field, FieldKind, Vendor, CHANNEL_BITS, SYNC_MASK, SYNC_WORD};
use crate::symrate::SymbolRateTracker;

// Longest run, in symbols, which may occur inside a frame
//
// Manchester coding never holds a level for more than two
// symbols. A much longer run means the transmission has ended.
const MAX_RUN_SYMBOLS: f32 = 4.0;

/// What to do with an invalid Manchester pair
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ManchesterPolicy {
    /// Drop the newer half-symbol and keep decoding
    ///
    /// The CRC decides whether the frame survives.
    #[default]
    SkipHalfSymbol,

    /// Discard the frame and search for sync
    AbortFrame,
}

/// Which part of a frame the receiver is waiting for
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ProtocolState {
    /// Searching for the sync pattern
    Sync,

    /// Reading the channel number
    Channel,

    /// Reading a vendor header
    Header,

    /// Reading a device identifier
    DeviceId,

    /// Reading (part of) the transmitter ID
    Txid,

    /// Reading sensor state bits
    SensorState,

    /// Reading the CRC
    Crc,
}

/// Frame statistics
///
/// Lifetime counts since the receiver was created or last
/// [reset](ProtocolReceiver::reset).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct FrameStats {
    /// Sync patterns found
    pub syncs: u64,

    /// Messages which passed the CRC
    pub messages: u64,

    /// Frames which failed the CRC
    pub crc_errors: u64,

    /// Frames with an all-zero transmitter ID
    pub zero_txids: u64,

    /// Frames with an out-of-range channel
    pub bad_channels: u64,

    /// Invalid Manchester pairs
    pub invalid_pairs: u64,

    /// Frames cut short by a long run or the end of input
    pub truncated: u64,
}

/// Sensor frame receiver
///
/// The `ProtocolReceiver` accepts one sliced sample at a time,
/// as a level. `true` is high. It measures how long each level
/// is held and converts the run into one or two half-symbols.
/// Half-symbols are searched for the sync pattern. Once sync is
/// found, they are Manchester decoded into the channel number
/// and then into the fields of the channel's vendor.
///
/// A message is emitted only when its CRC matches. Invalid
/// channels, all-zero transmitter IDs, and CRC failures discard
/// the frame and return to sync search. None of these are
/// errors; they are the normal result of listening to noise.
#[derive(Clone, Debug)]
pub struct ProtocolReceiver {
    // level of the current run
    level: bool,

    // most recent half-symbols, newest in the LSB
    sync_register: u32,

    tracker: SymbolRateTracker,
    decoder: ManchesterDecoder,
    crc: Crc16,
    state: State,
    policy: ManchesterPolicy,
    stats: FrameStats,
}

impl ProtocolReceiver {
    /// New receiver
    ///
    /// `symbol_estimate` is the nominal number of samples per
    /// symbol. Each frame's sync pattern refines it.
    pub fn new(symbol_estimate: f32, policy: ManchesterPolicy) -> Self {
        Self {
            level: false,
            sync_register: 0,
            tracker: SymbolRateTracker::new(symbol_estimate),
            decoder: ManchesterDecoder::new(),
            crc: Crc16::new(0, 0),
            state: State::Sync,
            policy,
            stats: FrameStats::default(),
        }
    }

    /// Process one sliced sample
    ///
    /// Returns a message when the last bit of a valid frame is
    /// decoded. Because runs are only measured when they end, a
    /// message is reported on the first level change after its
    /// final half-symbol.
    pub fn push(&mut self, level: bool) -> Option<SensorMessage> {
        if level == self.level {
            self.tracker.extend();
            return None;
        }

        let previous = self.level;
        let mut out = None;
        for _i in 0..self.tracker.current_symbol_count() {
            out = self.process_half_symbol(previous);
            if out.is_some() {
                break;
            }
        }

        if out.is_none()
            && self.in_frame()
            && self.tracker.current_run_symbols() > MAX_RUN_SYMBOLS
        {
            info!(
                "frame: {:?} interrupted by a {}-sample run; aborting",
                self.state(),
                self.tracker.current_run()
            );
            self.stats.truncated += 1;
            self.reset_to_sync();
        }

        self.tracker.start_new_symbol();
        self.level = level;
        out
    }

    /// End the current run
    ///
    /// Runs are only decoded when they end. If the input stops
    /// in the middle of the final half-symbol of a frame, call
    /// this method to decode it. Returns the message, if any.
    ///
    /// A frame which is still incomplete afterwards is discarded,
    /// and the receiver returns to sync search.
    pub fn flush(&mut self) -> Option<SensorMessage> {
        let opposite = !self.level;
        let out = self.push(opposite);
        if out.is_none() && self.in_frame() {
            info!("frame: input ended in {:?}; discarding", self.state());
            self.stats.truncated += 1;
            self.reset_to_sync();
        }
        out
    }

    /// Reset to zero initial conditions
    ///
    /// Discards any partial frame and the statistics.
    pub fn reset(&mut self) {
        self.level = false;
        self.tracker = SymbolRateTracker::new(self.tracker.estimate());
        self.stats = FrameStats::default();
        self.reset_to_sync();
    }

    /// Current receiver state
    pub fn state(&self) -> ProtocolState {
        match &self.state {
            State::Sync => ProtocolState::Sync,
            State::Channel => ProtocolState::Channel,
            State::Field(frame) => match frame.field().kind {
                FieldKind::Header => ProtocolState::Header,
                FieldKind::DeviceId => ProtocolState::DeviceId,
                FieldKind::Txid => ProtocolState::Txid,
                FieldKind::SensorState => ProtocolState::SensorState,
                FieldKind::Crc => ProtocolState::Crc,
            },
        }
    }

    /// Samples per symbol in use for the current frame
    pub fn symbol_average(&self) -> f32 {
        self.tracker.average()
    }

    /// Manchester failure policy
    pub fn policy(&self) -> ManchesterPolicy {
        self.policy
    }

    /// Lifetime frame statistics
    pub fn stats(&self) -> &FrameStats {
        &self.stats
    }

    // handle one half-symbol
    fn process_half_symbol(&mut self, level: bool) -> Option<SensorMessage> {
        if let State::Sync = self.state {
            self.sync_register = (self.sync_register << 1) | level as u32;
            if self.sync_register & SYNC_MASK == SYNC_WORD & SYNC_MASK {
                self.tracker.lock_average();
                self.decoder.reset();
                self.stats.syncs += 1;
                self.state = State::Channel;
                debug!(
                    "frame: sync: {:.2} samples per symbol",
                    self.tracker.average()
                );
            }
            return None;
        }

        if let Err(err) = self.decoder.add(level) {
            self.stats.invalid_pairs += 1;
            match self.policy {
                ManchesterPolicy::SkipHalfSymbol => {
                    trace!("frame: {}; skipping", err);
                    return None;
                }
                ManchesterPolicy::AbortFrame => {
                    info!("frame: {}; aborting", err);
                    self.reset_to_sync();
                    return None;
                }
            }
        }

        let want = match &self.state {
            State::Channel => CHANNEL_BITS,
            State::Field(frame) => frame.field().bits,
            State::Sync => unreachable!("{}", Self::PANIC_UNEXPECTED_SYNC),
        };
        if self.decoder.size() < want {
            return None;
        }

        let (value, bits) = self.decoder.pop_all();
        match std::mem::replace(&mut self.state, State::Sync) {
            State::Channel => {
                self.start_frame(value as u8);
                None
            }
            State::Field(frame) => self.finish_field(frame, value, bits),
            State::Sync => unreachable!("{}", Self::PANIC_UNEXPECTED_SYNC),
        }
    }

    // channel number has been read
    fn start_frame(&mut self, channel: u8) {
        let vendor = match Vendor::from_channel(channel) {
            Some(vendor) => vendor,
            None => {
                warn!("frame: invalid channel {}; aborting", channel);
                self.stats.bad_channels += 1;
                self.reset_to_sync();
                return;
            }
        };

        if vendor.is_known() {
            debug!("frame: channel {}: {}", channel, vendor);
        } else {
            info!(
                "frame: channel {}: unknown vendor; may cause CRC failure",
                channel
            );
        }

        let profile = vendor.profile();
        self.crc.reset();
        self.crc.configure(profile.poly, profile.final_xor);
        self.crc.push(channel as u64, CHANNEL_BITS);

        self.state = State::Field(Frame {
            message: SensorMessage::new(vendor, channel),
            plan: profile.fields,
            position: 0,
        });
    }

    // a field of the vendor's plan has been read
    fn finish_field(&mut self, mut frame: Frame, value: u64, bits: u32) -> Option<SensorMessage> {
        let field = frame.field();
        trace!("frame: {:?}: {:#x} ({} bits)", field.kind, value, bits);

        match field.kind {
            FieldKind::Header => {
                frame.message.set_header(value as u32);
                self.crc.push(value, bits);
            }
            FieldKind::DeviceId => {
                frame.message.set_device_id(value as u8);
                self.crc.push(value, bits);
            }
            FieldKind::SensorState => {
                frame.message.set_state(value as u8);
                self.crc.push(value, bits);
            }
            FieldKind::Txid => {
                let txid = (frame.message.txid() as u64).checked_shl(bits).unwrap_or(0) | value;
                frame.message.set_txid(txid as u32);
                self.crc.push(value, bits);

                if txid == 0 && frame.is_last_txid() {
                    info!("frame: transmitter ID is zero; discarding");
                    self.stats.zero_txids += 1;
                    self.reset_to_sync();
                    return None;
                }
            }
            FieldKind::Crc => {
                let expect = self.crc.peek();
                let out = if value as u16 == expect {
                    frame.message.set_valid();
                    self.stats.messages += 1;
                    debug!("frame: accepted: {}", frame.message);
                    Some(frame.message)
                } else {
                    info!(
                        "frame: CRC mismatch: received {:#06x}, computed {:#06x}, data {:#x}",
                        value,
                        expect,
                        self.crc.accumulated()
                    );
                    self.stats.crc_errors += 1;
                    None
                };
                self.reset_to_sync();
                return out;
            }
        }

        frame.position += 1;
        self.state = State::Field(frame);
        None
    }

    // true once sync has been found
    fn in_frame(&self) -> bool {
        !matches!(self.state, State::Sync)
    }

    // abandon the frame, if any, and search for sync
    fn reset_to_sync(&mut self) {
        self.tracker.reset_average();
        self.decoder.reset();
        self.sync_register = 0;
        self.state = State::Sync;
    }

    const PANIC_UNEXPECTED_SYNC: &'static str = "sync search does not decode data bits";
}

// Receiver state
#[derive(Clone, Debug)]
enum State {
    // Search for the sync pattern
    Sync,

    // Read the channel number
    Channel,

    // Read the vendor's fields, in order
    Field(Frame),
}

// A frame in progress
#[derive(Clone, Debug)]
struct Frame {
    message: SensorMessage,
    plan: &'static [Field],
    position: usize,
}

impl Frame {
    // field being read
    fn field(&self) -> Field {
        *self
            .plan
            .get(self.position)
            .expect(Self::PANIC_PLAN_OVERRUN)
    }

    // true if no transmitter ID segments follow this field
    fn is_last_txid(&self) -> bool {
        !self.plan[self.position + 1..]
            .iter()
            .any(|f| f.kind == FieldKind::Txid)
    }

    const PANIC_PLAN_OVERRUN: &'static str = "field plan must end with a CRC";
}

#[cfg(test)]
mod tests {
    use super::*;

    use assert_approx_eq::assert_approx_eq;

    use crate::waveform;

    const SPS: usize = 8;
    const IDLE: usize = 50;

    fn receive(rx: &mut ProtocolReceiver, samples: &[bool]) -> Vec<SensorMessage> {
        samples.iter().filter_map(|lvl| rx.push(*lvl)).collect()
    }

    fn honeywell_levels() -> Vec<bool> {
        waveform::frame_levels(8, &[(0x12345, 20), (0x80, 8), (0x8b86, 16)])
    }

    #[test]
    fn test_honeywell() {
        let mut rx = ProtocolReceiver::new(SPS as f32, ManchesterPolicy::default());
        let samples = waveform::render(&honeywell_levels(), SPS, IDLE);
        let out = receive(&mut rx, &samples);

        assert_eq!(1, out.len());
        let msg = &out[0];
        assert_eq!(Vendor::Honeywell, msg.vendor());
        assert_eq!(8, msg.channel());
        assert_eq!(0x12345, msg.txid());
        assert_eq!(0x80, msg.state());
        assert_eq!(None, msg.header());
        assert!(msg.is_valid());

        assert_eq!(ProtocolState::Sync, rx.state());
        assert_eq!(1, rx.stats().syncs);
        assert_eq!(1, rx.stats().messages);
        assert_approx_eq!(SPS as f32, rx.symbol_average());
    }

    #[test]
    fn test_twogig() {
        let mut rx = ProtocolReceiver::new(SPS as f32, ManchesterPolicy::default());
        let levels = waveform::frame_levels(2, &[(0xabcde, 20), (0x24, 8), (0x3350, 16)]);
        let out = receive(&mut rx, &waveform::render(&levels, SPS, IDLE));

        assert_eq!(1, out.len());
        assert_eq!(Vendor::TwoGig, out[0].vendor());
        assert_eq!(0xabcde, out[0].txid());
        assert_eq!(0x24, out[0].state());
    }

    #[test]
    fn test_back_to_back() {
        let mut rx = ProtocolReceiver::new(SPS as f32, ManchesterPolicy::default());
        let mut samples = waveform::render(&honeywell_levels(), SPS, IDLE);
        samples.extend(waveform::render(&honeywell_levels(), SPS, IDLE));
        samples.extend(waveform::render(&honeywell_levels(), SPS, IDLE));
        assert_eq!(3, receive(&mut rx, &samples).len());
    }

    #[test]
    fn test_crc_bit_errors() {
        let good = honeywell_levels();
        let crc_start = good.len() - 32;

        for bit in 0..16 {
            let mut rx = ProtocolReceiver::new(SPS as f32, ManchesterPolicy::default());
            let mut levels = good.clone();

            // invert both halves of one CRC bit
            let idx = crc_start + 2 * bit;
            levels[idx] = !levels[idx];
            levels[idx + 1] = !levels[idx + 1];

            let out = receive(&mut rx, &waveform::render(&levels, SPS, IDLE));
            assert!(out.is_empty());
            assert_eq!(ProtocolState::Sync, rx.state());
            assert_eq!(1, rx.stats().crc_errors);
        }
    }

    #[test]
    fn test_symbol_rate_tolerance() {
        for sps in [6, 7, 8, 9, 10, 11] {
            let mut rx = ProtocolReceiver::new(8.0, ManchesterPolicy::default());
            let out = receive(&mut rx, &waveform::render(&honeywell_levels(), sps, IDLE));
            assert_eq!(1, out.len());
            assert_eq!(0x12345, out[0].txid());
        }
    }

    #[test]
    fn test_average_locks_on_sync() {
        let mut rx = ProtocolReceiver::new(8.0, ManchesterPolicy::default());
        receive(&mut rx, &waveform::render(&waveform::sync_levels(), 11, IDLE));
        assert_eq!(ProtocolState::Channel, rx.state());
        assert_approx_eq!(11.0f32, rx.symbol_average());
    }

    #[test]
    fn test_state_progress() {
        let levels = honeywell_levels();

        // sync, channel, txid
        let mut rx = ProtocolReceiver::new(SPS as f32, ManchesterPolicy::default());
        receive(&mut rx, &waveform::render(&levels[0..78], SPS, IDLE));
        assert_eq!(ProtocolState::SensorState, rx.state());

        // everything but half the CRC
        let mut rx = ProtocolReceiver::new(SPS as f32, ManchesterPolicy::default());
        receive(&mut rx, &waveform::render(&levels[0..levels.len() - 16], SPS, IDLE));
        assert_eq!(ProtocolState::Crc, rx.state());

        rx.reset();
        assert_eq!(ProtocolState::Sync, rx.state());
        assert_eq!(FrameStats::default(), *rx.stats());
    }

    #[test]
    fn test_vivint() {
        let fields = [(0x12345, 20), (0xabcde, 20), (0x24, 8), (0x123, 12)];
        let levels = waveform::frame_with_crc(7, &fields);
        let mut rx = ProtocolReceiver::new(SPS as f32, ManchesterPolicy::default());
        let out = receive(&mut rx, &waveform::render(&levels, SPS, IDLE));

        assert_eq!(1, out.len());
        assert_eq!(Vendor::Vivint, out[0].vendor());
        assert_eq!(Some(0x12345), out[0].header());
        assert_eq!(None, out[0].device_id());
        assert_eq!(0xabcde123, out[0].txid());
        assert_eq!(0x24, out[0].state());
    }

    #[test]
    fn test_vivint_init() {
        let fields = [(0xabc, 12), (0x5a, 8), (0x00001, 20), (0x80, 8), (0x001, 12)];
        let levels = waveform::frame_with_crc(13, &fields);
        let mut rx = ProtocolReceiver::new(SPS as f32, ManchesterPolicy::default());
        let out = receive(&mut rx, &waveform::render(&levels, SPS, IDLE));

        assert_eq!(1, out.len());
        assert_eq!(Vendor::VivintInit, out[0].vendor());
        assert_eq!(Some(0xabc), out[0].header());
        assert_eq!(Some(0x5a), out[0].device_id());
        assert_eq!(0x0000_1001, out[0].txid());
        assert_eq!(0x80, out[0].state());
    }

    #[test]
    fn test_unknown_vendor() {
        let levels = waveform::frame_with_crc(0, &[(0x54321, 20), (0x01, 8)]);
        let mut rx = ProtocolReceiver::new(SPS as f32, ManchesterPolicy::default());
        let out = receive(&mut rx, &waveform::render(&levels, SPS, IDLE));

        assert_eq!(1, out.len());
        assert_eq!(Vendor::Unknown, out[0].vendor());
        assert_eq!(0x54321, out[0].txid());
    }

    #[test]
    fn test_zero_txid() {
        let levels = waveform::frame_with_crc(8, &[(0, 20), (0x80, 8)]);
        let mut rx = ProtocolReceiver::new(SPS as f32, ManchesterPolicy::default());
        let out = receive(&mut rx, &waveform::render(&levels, SPS, IDLE));
        assert!(out.is_empty());
        assert_eq!(1, rx.stats().zero_txids);
        assert_eq!(ProtocolState::Sync, rx.state());

        // only the complete ID must be nonzero
        let levels = waveform::frame_with_crc(7, &[(0x1, 20), (0, 20), (0x80, 8), (0x1, 12)]);
        let out = receive(&mut rx, &waveform::render(&levels, SPS, IDLE));
        assert_eq!(1, out.len());
        assert_eq!(0x0000_0001, out[0].txid());
    }

    #[test]
    fn test_manchester_policy() {
        // stretch the first half of the first txid bit into a
        // second, invalid, half-symbol
        let mut levels = honeywell_levels();
        assert!(levels[38]);
        assert!(!levels[37]);
        levels.insert(39, true);
        let samples = waveform::render(&levels, SPS, IDLE);

        let mut rx = ProtocolReceiver::new(SPS as f32, ManchesterPolicy::SkipHalfSymbol);
        let out = receive(&mut rx, &samples);
        assert_eq!(1, out.len());
        assert_eq!(0x12345, out[0].txid());
        assert_eq!(1, rx.stats().invalid_pairs);

        let mut rx = ProtocolReceiver::new(SPS as f32, ManchesterPolicy::AbortFrame);
        assert_eq!(ManchesterPolicy::AbortFrame, rx.policy());
        let out = receive(&mut rx, &samples);
        assert!(out.is_empty());
        assert_eq!(1, rx.stats().invalid_pairs);
        assert_eq!(ProtocolState::Sync, rx.state());
    }

    #[test]
    fn test_flush() {
        let levels = honeywell_levels();
        let mut samples = waveform::render(&levels, SPS, IDLE);
        samples.truncate(samples.len() - IDLE);

        let mut rx = ProtocolReceiver::new(SPS as f32, ManchesterPolicy::default());
        assert!(receive(&mut rx, &samples).is_empty());
        assert_eq!(ProtocolState::Crc, rx.state());

        let msg = rx.flush().expect("expected message");
        assert_eq!(0x12345, msg.txid());
        assert_eq!(ProtocolState::Sync, rx.state());
    }

    #[test]
    fn test_corrupt_crc_level() {
        let good = honeywell_levels();
        let crc_start = good.len() - 32;
        let next = waveform::frame_with_crc(2, &[(0xabcde, 20), (0x24, 8)]);

        for i in 0..32 {
            // one bad half-symbol leaves the frame short
            let mut levels = good.clone();
            levels[crc_start + i] = !levels[crc_start + i];

            // the next frame must not be swallowed
            let mut samples = waveform::render(&levels, SPS, IDLE);
            samples.extend(waveform::render(&next, SPS, IDLE));
            let mut rx = ProtocolReceiver::new(SPS as f32, ManchesterPolicy::default());
            let out = receive(&mut rx, &samples);
            let last = out.last().expect("expected message");
            assert_eq!(Vendor::TwoGig, last.vendor());
            assert_eq!(0xabcde, last.txid());

            // end of input never leaves a frame open
            let mut rx = ProtocolReceiver::new(SPS as f32, ManchesterPolicy::default());
            receive(&mut rx, &waveform::render(&levels, SPS, IDLE));
            rx.flush();
            assert_eq!(ProtocolState::Sync, rx.state());
        }
    }

    #[test]
    fn test_flush_discards_partial_frame() {
        let levels = honeywell_levels();
        let mut rx = ProtocolReceiver::new(SPS as f32, ManchesterPolicy::default());
        receive(&mut rx, &waveform::render(&levels[0..78], SPS, IDLE));
        assert_eq!(ProtocolState::SensorState, rx.state());

        assert!(rx.flush().is_none());
        assert_eq!(ProtocolState::Sync, rx.state());
        assert_eq!(1, rx.stats().truncated);
    }

    #[test]
    fn test_noise_only() {
        // a long run of alternating levels never looks like sync
        let levels: Vec<bool> = (0..200).map(|i| i % 3 == 0).collect();
        let mut rx = ProtocolReceiver::new(SPS as f32, ManchesterPolicy::default());
        assert!(receive(&mut rx, &waveform::render(&levels, SPS, IDLE)).is_empty());
        assert_eq!(0, rx.stats().syncs);
    }
}
