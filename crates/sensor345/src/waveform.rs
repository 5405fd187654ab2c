//! Test waveform synthesis
//!
//! Builds sensor frames as half-symbol levels and renders them as
//! sample streams for the framer or as on-off keyed IQ for the
//! complete receiver.

use num_complex::Complex;

use crate::crc::Crc16;
use crate::manchester;
use crate::protocol::{Vendor, CHANNEL_BITS, SYNC_LEVELS, SYNC_WORD};

/// Levels of the sync pattern, oldest first
pub fn sync_levels() -> Vec<bool> {
    (0..SYNC_LEVELS)
        .rev()
        .map(|i| (SYNC_WORD >> i) & 1 == 1)
        .collect()
}

/// Manchester-encode `bits` bits of `data`, MSB first
pub fn field_levels(data: u64, bits: u32) -> Vec<bool> {
    (0..bits)
        .rev()
        .flat_map(|i| manchester::encode((data >> i) & 1 == 1))
        .collect()
}

/// Sync, channel, and then each `(value, bits)` field in order
pub fn frame_levels(channel: u8, fields: &[(u64, u32)]) -> Vec<bool> {
    let mut out = sync_levels();
    out.extend(field_levels(channel as u64, CHANNEL_BITS));
    for (value, bits) in fields {
        out.extend(field_levels(*value, *bits));
    }
    out
}

/// CRC for the channel and `fields`, as the vendor computes it
pub fn frame_crc(channel: u8, fields: &[(u64, u32)]) -> u16 {
    let vendor = Vendor::from_channel(channel).unwrap_or(Vendor::Unknown);
    let profile = vendor.profile();
    let mut crc = Crc16::new(profile.poly, profile.final_xor);
    crc.push(channel as u64, CHANNEL_BITS);
    for (value, bits) in fields {
        crc.push(*value, *bits);
    }
    crc.peek()
}

/// Complete frame with a correct CRC appended
pub fn frame_with_crc(channel: u8, fields: &[(u64, u32)]) -> Vec<bool> {
    let mut all = fields.to_vec();
    all.push((frame_crc(channel, fields) as u64, 16));
    frame_levels(channel, &all)
}

/// Render levels at `sps` samples per symbol
///
/// The line idles high for `idle` samples before the frame and
/// idles at the opposite of the final level for `idle` samples
/// after it.
pub fn render(levels: &[bool], sps: usize, idle: usize) -> Vec<bool> {
    let last = levels.last().copied().unwrap_or(false);
    let mut out = vec![true; idle];
    for level in levels {
        out.extend(std::iter::repeat(*level).take(sps));
    }
    out.extend(std::iter::repeat(!last).take(idle));
    out
}

/// On-off key rendered levels onto a carrier
///
/// Each level becomes a complex tone at `carrier_hz` (when high)
/// or silence (when low), at the given `sample_rate`.
pub fn modulate(samples: &[bool], sample_rate: u32, carrier_hz: f32) -> Vec<Complex<f32>> {
    let rad_per_sa = 2.0f64 * std::f64::consts::PI * carrier_hz as f64 / sample_rate as f64;
    samples
        .iter()
        .enumerate()
        .map(|(n, high)| {
            if *high {
                let phase = (rad_per_sa * n as f64) % (2.0f64 * std::f64::consts::PI);
                Complex::new(phase.cos() as f32, phase.sin() as f32)
            } else {
                Complex::new(0.0f32, 0.0f32)
            }
        })
        .collect()
}
