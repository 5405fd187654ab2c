//! Over-the-air frame format
//!
//! Every frame begins with the same preamble and sync pattern,
//! followed by a four-bit *channel* number. The channel selects
//! the vendor, and the vendor selects everything that follows:
//! which fields are present, how wide they are, and the CRC
//! polynomial which protects them.
//!
//! ```txt
//! sync (30 levels) | channel (4) | vendor fields ... | crc (16)
//! ```
//!
//! All fields are Manchester coded and sent most significant bit
//! first. The tables in this module are fixed at compile time.

use std::fmt;
use std::str::FromStr;

use strum::EnumMessage;

/// Sync pattern, as half-symbol levels
///
/// The last [`SYNC_LEVELS`] half-symbols of the preamble, most
/// recent in the least significant bit. This is the level pair
/// `01` fourteen times, followed by the pair `10`.
pub const SYNC_WORD: u32 = 0x5555_5556;

/// Significant bits of [`SYNC_WORD`]
///
/// The first few levels of the preamble are unreliable on some
/// transmitters and are ignored.
pub const SYNC_MASK: u32 = 0x3fff_ffff;

/// Number of half-symbol levels in the sync pattern
pub const SYNC_LEVELS: u32 = 30;

/// Nominal duration of one symbol (s)
pub const PULSE_WIDTH: f32 = 130.0e-6;

/// Channel field width (bits)
pub const CHANNEL_BITS: u32 = 4;

/// Number of distinct channels
pub const NUM_CHANNELS: usize = 1 << CHANNEL_BITS;

/// Header field width (bits)
pub const HEADER_BITS: u32 = 20;

/// Header field width for power-on frames (bits)
pub const INIT_HEADER_BITS: u32 = 12;

/// Device identifier width (bits)
pub const DEVICE_ID_BITS: u32 = 8;

/// Standard transmitter ID width (bits)
pub const TXID_BITS: u32 = 20;

/// Width of the transmitter ID continuation which follows the
/// sensor state on extended-format frames (bits)
pub const TXID_EXT_BITS: u32 = 12;

/// Sensor state width (bits)
pub const SENSOR_STATE_BITS: u32 = 8;

/// CRC width (bits)
pub const CRC_BITS: u32 = 16;

/// Sensor vendor
///
/// Selected by the channel number. Vendors may be parsed
/// `from_str()` their short names, like "`honeywell`" or
/// "`2gig`." Using them via `Display` shows a human-readable
/// name.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, strum_macros::EnumMessage, strum_macros::EnumString,
)]
#[strum(ascii_case_insensitive)]
pub enum Vendor {
    /// Channel is not assigned to any known vendor
    ///
    /// Frames on these channels are decoded with the standard
    /// field plan, which may cause CRC failure.
    #[strum(serialize = "unknown", detailed_message = "Unknown vendor")]
    Unknown,

    /// Honeywell 5800-series
    #[strum(serialize = "honeywell", detailed_message = "Honeywell")]
    Honeywell,

    /// 2GIG
    #[strum(serialize = "2gig", detailed_message = "2GIG")]
    TwoGig,

    /// Vivint
    #[strum(serialize = "vivint", detailed_message = "Vivint")]
    Vivint,

    /// Vivint, power-on / pairing frame
    #[strum(serialize = "vivint-init", detailed_message = "Vivint (init)")]
    VivintInit,
}

/// What a field of the frame carries
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FieldKind {
    /// Vendor-specific header
    Header,

    /// Device identifier
    DeviceId,

    /// Transmitter ID, or the next segment of it
    Txid,

    /// Sensor state bits
    SensorState,

    /// CRC over every preceding field, including the channel
    Crc,
}

/// One field of a frame
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Field {
    /// Field contents
    pub kind: FieldKind,

    /// Width (bits)
    pub bits: u32,
}

impl Field {
    const fn new(kind: FieldKind, bits: u32) -> Self {
        Self { kind, bits }
    }
}

/// How a vendor's frames are laid out and protected
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct VendorProfile {
    /// CRC generator polynomial
    pub poly: u16,

    /// CRC final XOR
    pub final_xor: u16,

    /// Fields which follow the channel, in transmission order
    ///
    /// The last field is always the CRC.
    pub fields: &'static [Field],
}

impl VendorProfile {
    /// Total width of the transmitter ID (bits)
    pub fn txid_bits(&self) -> u32 {
        self.fields
            .iter()
            .filter(|f| f.kind == FieldKind::Txid)
            .map(|f| f.bits)
            .sum()
    }
}

impl Vendor {
    /// Vendor assigned to the given channel
    ///
    /// Returns `None` if the channel number is out of range.
    pub fn from_channel(channel: u8) -> Option<Vendor> {
        CHANNEL_VENDORS.get(channel as usize).copied()
    }

    /// Frame layout and CRC parameters
    pub fn profile(&self) -> &'static VendorProfile {
        match self {
            Vendor::Unknown => &UNKNOWN_PROFILE,
            Vendor::Honeywell => &HONEYWELL_PROFILE,
            Vendor::TwoGig => &TWOGIG_PROFILE,
            Vendor::Vivint => &VIVINT_PROFILE,
            Vendor::VivintInit => &VIVINT_INIT_PROFILE,
        }
    }

    /// Human-readable string representation
    ///
    /// Converts to a human-readable string, like "`Honeywell`."
    pub fn as_display_str(&self) -> &'static str {
        self.get_detailed_message().expect("missing definition")
    }

    /// Short name, like "`2gig`"
    pub fn as_str(&self) -> &'static str {
        self.get_serializations()[0]
    }

    /// True if this vendor is known
    pub fn is_known(&self) -> bool {
        *self != Vendor::Unknown
    }

    /// Vendor by short name, case-insensitive
    ///
    /// Unrecognized names are `Vendor::Unknown`. Use
    /// [`str::parse`] to reject them instead.
    pub fn from_name(s: &str) -> Vendor {
        Vendor::from_str(s).unwrap_or(Vendor::Unknown)
    }
}

impl AsRef<str> for Vendor {
    fn as_ref(&self) -> &'static str {
        self.as_str()
    }
}

impl fmt::Display for Vendor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.as_display_str().fmt(f)
    }
}

// channel number → vendor
const CHANNEL_VENDORS: [Vendor; NUM_CHANNELS] = [
    Vendor::Unknown,
    Vendor::Unknown,
    Vendor::TwoGig,
    Vendor::Unknown,
    Vendor::Unknown,
    Vendor::Unknown,
    Vendor::Unknown,
    Vendor::Vivint,
    Vendor::Honeywell,
    Vendor::TwoGig,
    Vendor::TwoGig,
    Vendor::Unknown,
    Vendor::Unknown,
    Vendor::VivintInit,
    Vendor::Unknown,
    Vendor::Unknown,
];

const POLY_8005: u16 = 0x8005;
const POLY_8050: u16 = 0x8050;

const STANDARD_FIELDS: &[Field] = &[
    Field::new(FieldKind::Txid, TXID_BITS),
    Field::new(FieldKind::SensorState, SENSOR_STATE_BITS),
    Field::new(FieldKind::Crc, CRC_BITS),
];

const VIVINT_FIELDS: &[Field] = &[
    Field::new(FieldKind::Header, HEADER_BITS),
    Field::new(FieldKind::Txid, TXID_BITS),
    Field::new(FieldKind::SensorState, SENSOR_STATE_BITS),
    Field::new(FieldKind::Txid, TXID_EXT_BITS),
    Field::new(FieldKind::Crc, CRC_BITS),
];

const VIVINT_INIT_FIELDS: &[Field] = &[
    Field::new(FieldKind::Header, INIT_HEADER_BITS),
    Field::new(FieldKind::DeviceId, DEVICE_ID_BITS),
    Field::new(FieldKind::Txid, TXID_BITS),
    Field::new(FieldKind::SensorState, SENSOR_STATE_BITS),
    Field::new(FieldKind::Txid, TXID_EXT_BITS),
    Field::new(FieldKind::Crc, CRC_BITS),
];

const UNKNOWN_PROFILE: VendorProfile = VendorProfile {
    poly: POLY_8005,
    final_xor: 0,
    fields: STANDARD_FIELDS,
};

const HONEYWELL_PROFILE: VendorProfile = VendorProfile {
    poly: POLY_8005,
    final_xor: 0,
    fields: STANDARD_FIELDS,
};

const TWOGIG_PROFILE: VendorProfile = VendorProfile {
    poly: POLY_8050,
    final_xor: 0,
    fields: STANDARD_FIELDS,
};

// TODO: the Vivint layouts have not been checked against a
// live capture
const VIVINT_PROFILE: VendorProfile = VendorProfile {
    poly: POLY_8005,
    final_xor: 0,
    fields: VIVINT_FIELDS,
};

const VIVINT_INIT_PROFILE: VendorProfile = VendorProfile {
    poly: POLY_8005,
    final_xor: 0,
    fields: VIVINT_INIT_FIELDS,
};
