//! Manchester line decoding
//!
//! Each data bit is sent as two half-symbols of opposite level.
//! A rising pair (low, high) is a `1`, and a falling pair
//! (high, low) is a `0`. The two remaining pairs never come from
//! a working transmitter.

use thiserror::Error;

/// Two half-symbols of equal level
///
/// The newer half-symbol has been discarded. The first half is
/// still buffered and will be paired with the next level.
#[derive(Error, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[error("invalid Manchester pair: half-symbol level {level} repeated")]
pub struct InvalidManchesterPair {
    /// Level of both half-symbols
    pub level: bool,
}

/// Manchester decoder
///
/// Decoded bits are shifted into a word, most significant bit
/// first. At most 64 bits are held; older bits are shifted out.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ManchesterDecoder {
    first_half: Option<bool>,
    word: u64,
    bits: u32,
}

impl ManchesterDecoder {
    /// New, empty decoder
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one half-symbol level
    ///
    /// `true` is high. Every second successful call decodes one
    /// bit.
    pub fn add(&mut self, level: bool) -> Result<(), InvalidManchesterPair> {
        match self.first_half {
            None => {
                self.first_half = Some(level);
                Ok(())
            }
            Some(first) if first == level => Err(InvalidManchesterPair { level }),
            Some(_) => {
                // the second half of a valid pair carries the bit
                self.word = (self.word << 1) | level as u64;
                self.bits = self.bits.saturating_add(1);
                self.first_half = None;
                Ok(())
            }
        }
    }

    /// Number of decoded bits waiting
    pub fn size(&self) -> u32 {
        self.bits
    }

    /// Take all decoded bits
    ///
    /// Returns the decoded word and the number of bits in it. The
    /// decoder is left empty.
    pub fn pop_all(&mut self) -> (u64, u32) {
        let out = (self.word, self.bits);
        self.reset();
        out
    }

    /// Discard all state, including any buffered half-symbol
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Manchester-encode one bit into half-symbol levels
///
/// ```
/// use sensor345::manchester;
///
/// assert_eq!([false, true], manchester::encode(true));
/// assert_eq!([true, false], manchester::encode(false));
/// ```
pub fn encode(bit: bool) -> [bool; 2] {
    [!bit, bit]
}
