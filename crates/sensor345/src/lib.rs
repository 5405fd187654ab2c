//! # sensor345: 345 MHz Security Sensor Decoding
//!
//! This crate provides a digital receiver and decoder for the
//! wireless security sensors which transmit at 345 MHz: door and
//! window contacts, motion detectors, smoke detectors, and key
//! fobs from several alarm vendors. It recovers each sensor's
//! transmitter ID and state bits from a complex baseband capture
//! and reports them to the caller.
//!
//! ## Disclaimer
//!
//! This crate has not been certified for any purpose. Do not use
//! it as a substitute for an alarm panel. Everything it decodes
//! is sent in the clear by the sensors themselves.
//!
//! ## Example
//!
//! You will first need to capture *complex baseband* samples with
//! a software-defined radio tuned near 345 MHz. Obtaining the
//! samples is beyond the scope of this crate. With the default
//! settings, the receiver expects 200 kSa/s with the sensor band
//! 70 kHz above the center frequency.
//!
//! ```
//! use num_complex::Complex;
//! use sensor345::SensorReceiverBuilder;
//!
//! # let some_iq_source_iterator = || std::iter::once(Complex::new(0.0f32, 0.0f32));
//! #
//! // create a SensorReceiver with your sampling rate
//! let mut rx = SensorReceiverBuilder::new(200_000)
//!     .with_translation(-70_000)     // move the sensor band to 0 Hz
//!     .with_pulse_width(130.0e-6)    // nominal symbol length, in seconds
//!     .build()
//!     .expect("bad receiver configuration");
//!
//! // let iqsrc be an iterator which outputs complex samples,
//! // such as a BufReader bound to stdin or a file, at the
//! // sampling rate (here 200 kSa/s)
//! let iqsrc = some_iq_source_iterator();
//! for msg in rx.iter(iqsrc) {
//!     println!("{}: transmitter {} state {:#04x}", msg.vendor(), msg.txid_str(), msg.state());
//! }
//! ```
//!
//! The receiver is created via a
//! [builder](struct.SensorReceiverBuilder.html). Building fails
//! with a [`ConfigError`] if the filters cannot be designed.
//!
//! The [`SensorReceiver`](struct.SensorReceiver.html) binds by
//! iterator to any source of `Complex<f32>` samples. The iterator
//! consumes as many samples as possible until the next valid
//! [`SensorMessage`]. Frames which fail the CRC are never
//! reported.
//!
//! ## Background
//!
//! The sensors use on-off keying with Manchester line coding at
//! roughly 3.8 kbit/s. Each frame is:
//!
//! ```txt
//! preamble and sync | channel (4) | vendor fields | CRC-16
//! ```
//!
//! The four-bit channel number selects the vendor, which in turn
//! selects the layout of the remaining fields and the CRC
//! polynomial. See the [`protocol`] module for the tables.
//!
//! Transmitters disagree slightly on the symbol rate, so the
//! receiver measures the symbol length from each frame's sync
//! pattern and uses that measurement for the rest of the frame.

mod builder;
mod crc;
mod error;
mod filter;
mod framing;
pub mod manchester;
mod message;
mod oscillator;
pub mod protocol;
mod receiver;
mod symrate;

#[cfg(test)]
mod waveform;

pub use builder::SensorReceiverBuilder;
pub use crc::Crc16;
pub use error::ConfigError;
pub use filter::{DecimatingFilter, FilterConfig, FilterKind, Sample, TapSpec};
pub use framing::{FrameStats, ManchesterPolicy, ProtocolReceiver, ProtocolState};
pub use manchester::{InvalidManchesterPair, ManchesterDecoder};
pub use message::{format_txid, SensorMessage};
pub use oscillator::{Cisoid, Oscillator};
pub use protocol::{Vendor, VendorProfile};
pub use receiver::{SensorReceiver, SourceIter, MAX_BASEBAND_STAGES};
pub use symrate::SymbolRateTracker;
