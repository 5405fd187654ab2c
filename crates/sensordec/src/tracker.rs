//! In-memory sensor bookkeeping
//!
//! The tracker remembers every transmitter seen since the
//! program started, how many times it has been heard, and each
//! change to its state bits. Nothing is persisted: the history
//! is printed as a summary when the input ends.

use std::collections::BTreeMap;
use std::fmt;
use std::io::{self, Write};

use chrono::{DateTime, Utc};
use sensor345::{format_txid, SensorMessage, Vendor};

/// Meaning of one sensor state bit
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StatusBit {
    /// Bit name
    pub name: &'static str,

    /// Description when the bit is clear
    pub clear: &'static str,

    /// Description when the bit is set
    pub set: &'static str,
}

impl StatusBit {
    const fn new(name: &'static str, clear: &'static str, set: &'static str) -> Self {
        Self { name, clear, set }
    }

    /// Description of the bit's value
    pub fn describe(&self, value: bool) -> &'static str {
        if value {
            self.set
        } else {
            self.clear
        }
    }
}

/// Sensor state bits, most significant first
pub const STATUS_BITS: [StatusBit; 8] = [
    StatusBit::new("LOOP ONE", "CLOSED", "OPEN"),
    StatusBit::new("TAMPER", "NORM", "TRIP"),
    StatusBit::new("LOOP TWO", "CLOSED", "OPEN"),
    StatusBit::new("UNKb4", "FALSE", "TRUE"),
    StatusBit::new("BATTERY", "NORM", "LOW"),
    StatusBit::new("TRIGGER", "EVENT", "PERIODIC"),
    StatusBit::new("PAIR", "FALSE", "TRUE"),
    StatusBit::new("UNKb0", "FALSE", "TRUE"),
];

/// Every tracked transmitter, by transmitter ID
#[derive(Clone, Debug, Default)]
pub struct SensorTracker {
    sensors: BTreeMap<u32, SensorHistory>,
}

/// History of one transmitter
#[derive(Clone, Debug)]
pub struct SensorHistory {
    vendor: Vendor,
    seen: u32,

    // first state, then every change
    history: Vec<(u8, DateTime<Utc>)>,
}

/// What a new message did to the tracker
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Update {
    /// First message from this transmitter
    Added {
        /// Transmitter ID
        txid: u32,
        /// Reported state
        state: u8,
        /// Time of receipt
        at: DateTime<Utc>,
    },

    /// Repeat message from a known transmitter
    ///
    /// `old_state` and `new_state` are equal if nothing
    /// changed.
    Updated {
        /// Transmitter ID
        txid: u32,
        /// Number of messages received, including this one
        seen: u32,
        /// Previous state
        old_state: u8,
        /// Reported state
        new_state: u8,
        /// Time of receipt
        at: DateTime<Utc>,
    },
}

impl SensorTracker {
    /// Empty tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a message received at time `at`
    pub fn push(&mut self, msg: &SensorMessage, at: DateTime<Utc>) -> Update {
        self.record(msg.txid(), msg.vendor(), msg.state(), at)
    }

    /// Record a `state` report from transmitter `txid`
    pub fn record(&mut self, txid: u32, vendor: Vendor, state: u8, at: DateTime<Utc>) -> Update {
        match self.sensors.get_mut(&txid) {
            Some(sensor) => {
                let old_state = sensor.state();
                sensor.update(state, at);
                Update::Updated {
                    txid,
                    seen: sensor.seen(),
                    old_state,
                    new_state: state,
                    at,
                }
            }
            None => {
                self.sensors
                    .insert(txid, SensorHistory::new(vendor, state, at));
                Update::Added { txid, state, at }
            }
        }
    }

    /// True if no transmitters have been seen
    pub fn is_empty(&self) -> bool {
        self.sensors.is_empty()
    }

    /// History of the given transmitter, if seen
    pub fn get(&self, txid: u32) -> Option<&SensorHistory> {
        self.sensors.get(&txid)
    }

    /// Write a summary of every transmitter
    pub fn write_summary<W: Write>(&self, out: &mut W) -> io::Result<()> {
        writeln!(out)?;
        writeln!(out, "## SENSOR SUMMARY ##")?;
        if self.sensors.is_empty() {
            writeln!(out, "NO SENSORS FOUND")?;
            return Ok(());
        }

        for (txid, sensor) in &self.sensors {
            writeln!(out, "TXID {} ({})", format_txid(*txid), sensor.vendor)?;
            writeln!(out, "SEEN {} TIMES", sensor.seen)?;
            for pair in sensor.history.windows(2) {
                let (old, _) = pair[0];
                let (new, at) = pair[1];
                writeln!(out, "# {}", format_time(&at))?;
                for line in describe_change(old, new) {
                    writeln!(out, "{}", line)?;
                }
            }
            writeln!(out)?;
        }
        Ok(())
    }
}

impl SensorHistory {
    fn new(vendor: Vendor, state: u8, at: DateTime<Utc>) -> Self {
        Self {
            vendor,
            seen: 1,
            history: vec![(state, at)],
        }
    }

    // count a message, and remember the state if it changed
    fn update(&mut self, state: u8, at: DateTime<Utc>) {
        self.seen = self.seen.saturating_add(1);
        if self.state() != state {
            self.history.push((state, at));
        }
    }

    /// Vendor of the first message
    pub fn vendor(&self) -> Vendor {
        self.vendor
    }

    /// Number of messages received
    pub fn seen(&self) -> u32 {
        self.seen
    }

    /// Most recent state
    pub fn state(&self) -> u8 {
        self.history.last().map(|(state, _)| *state).unwrap_or(0)
    }

    /// Number of distinct state changes
    pub fn changes(&self) -> usize {
        self.history.len().saturating_sub(1)
    }
}

impl fmt::Display for Update {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Update::Added { txid, state, at } => {
                writeln!(f, "## ADD SENSOR {} ##", format_txid(*txid))?;
                write!(f, "SEEN 1 TIMES, NOW {}", format_time(at))?;
                for line in describe_state(*state) {
                    write!(f, "\n{}", line)?;
                }
            }
            Update::Updated {
                txid,
                seen,
                old_state,
                new_state,
                at,
            } => {
                writeln!(f, "## UPDATE SENSOR {} ##", format_txid(*txid))?;
                write!(f, "SEEN {} TIMES, NOW {}", seen, format_time(at))?;
                for line in describe_change(*old_state, *new_state) {
                    write!(f, "\n{}", line)?;
                }
            }
        }
        Ok(())
    }
}

/// Describe every state bit, like "`TAMPER: NORM`"
pub fn describe_state(state: u8) -> Vec<String> {
    STATUS_BITS
        .iter()
        .enumerate()
        .map(|(i, bit)| format!("{}: {}", bit.name, bit.describe(state_bit(state, i))))
        .collect()
}

/// Describe each bit which changed, like "`TAMPER: NORM->TRIP`"
pub fn describe_change(old: u8, new: u8) -> Vec<String> {
    STATUS_BITS
        .iter()
        .enumerate()
        .filter(|(i, _)| state_bit(old, *i) != state_bit(new, *i))
        .map(|(i, bit)| {
            format!(
                "{}: {}->{}",
                bit.name,
                bit.describe(state_bit(old, i)),
                bit.describe(state_bit(new, i))
            )
        })
        .collect()
}

/// Timestamp format for reports
pub fn format_time(at: &DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

// bit `i` of `state`, counting from the MSB
fn state_bit(state: u8, i: usize) -> bool {
    (state >> (STATUS_BITS.len() - 1 - i)) & 0x1 == 1
}
