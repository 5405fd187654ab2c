//! Decoded sensor messages

use std::fmt;

use crate::protocol::Vendor;

/// A decoded sensor transmission
///
/// Security sensors (door and window contacts, motion detectors,
/// smoke detectors, key fobs) transmit a short frame whenever
/// their state changes and periodically as a "supervision"
/// check-in. Each frame carries:
///
/// * a channel number, which identifies the [`Vendor`];
/// * a transmitter ID, which is usually printed on the sensor;
/// * eight bits of sensor state, like tamper or low battery.
///
/// Some vendors add a header or a device identifier.
///
/// The receiver only emits messages which pass the CRC, so
/// [`is_valid()`](SensorMessage::is_valid) is true for every
/// message a client sees. `SensorMessage` implements `Display`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SensorMessage {
    vendor: Vendor,
    channel: u8,
    header: Option<u32>,
    device_id: Option<u8>,
    txid: u32,
    state: u8,
    valid: bool,
}

impl SensorMessage {
    /// Start a new message for the given channel
    pub(crate) fn new(vendor: Vendor, channel: u8) -> Self {
        Self {
            vendor,
            channel,
            header: None,
            device_id: None,
            txid: 0,
            state: 0,
            valid: false,
        }
    }

    /// Sensor vendor
    pub fn vendor(&self) -> Vendor {
        self.vendor
    }

    /// Channel number, from 0 to 15
    pub fn channel(&self) -> u8 {
        self.channel
    }

    /// Vendor-specific header, if the vendor sends one
    pub fn header(&self) -> Option<u32> {
        self.header
    }

    /// Device identifier, if the vendor sends one
    pub fn device_id(&self) -> Option<u8> {
        self.device_id
    }

    /// Transmitter ID
    ///
    /// Twenty bits for most vendors and thirty-two bits for
    /// extended-format frames.
    pub fn txid(&self) -> u32 {
        self.txid
    }

    /// Transmitter ID as printed on the sensor
    ///
    /// The decimal ID is split into two groups, like
    /// "`074-5573`."
    pub fn txid_str(&self) -> String {
        format_txid(self.txid)
    }

    /// Sensor state bits
    pub fn state(&self) -> u8 {
        self.state
    }

    /// True if the CRC matched
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub(crate) fn set_header(&mut self, header: u32) {
        self.header = Some(header);
    }

    pub(crate) fn set_device_id(&mut self, device_id: u8) {
        self.device_id = Some(device_id);
    }

    pub(crate) fn set_txid(&mut self, txid: u32) {
        self.txid = txid;
    }

    pub(crate) fn set_state(&mut self, state: u8) {
        self.state = state;
    }

    pub(crate) fn set_valid(&mut self) {
        self.valid = true;
    }
}

impl fmt::Display for SensorMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (ch {:2}) txid {} state {:#04x}",
            self.vendor,
            self.channel,
            self.txid_str(),
            self.state
        )?;
        if let Some(header) = self.header {
            write!(f, " header {:#x}", header)?;
        }
        if let Some(device_id) = self.device_id {
            write!(f, " device {:#04x}", device_id)?;
        }
        Ok(())
    }
}

/// Format a transmitter ID as printed on the sensor
///
/// ```
/// assert_eq!("074-5573", sensor345::format_txid(745573));
/// assert_eq!("000-0042", sensor345::format_txid(42));
/// ```
pub fn format_txid(txid: u32) -> String {
    format!("{:03}-{:04}", txid / 10000, txid % 10000)
}
