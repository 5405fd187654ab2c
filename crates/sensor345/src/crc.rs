//! Bitwise CRC-16
//!
//! Sensor frames are protected by a 16-bit CRC with a
//! vendor-specific generator polynomial. Bits arrive one field
//! at a time, so the [`Crc16`] is updated incrementally with
//! fields of arbitrary width and may be finalized at any point
//! without disturbing the running register.

/// Incremental CRC-16 engine
///
/// The register starts at zero and is not reflected. Data is
/// shifted in most significant bit first and is "augmented" with
/// sixteen zero bits when the CRC is read out.
///
/// ```
/// use sensor345::Crc16;
///
/// let mut crc = Crc16::new(0x8005, 0x0000);
/// for byte in b"123456789" {
///     crc.push(*byte as u64, 8);
/// }
/// assert_eq!(0xfee8, crc.peek());
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Crc16 {
    register: u16,
    poly: u16,
    final_xor: u16,
    accumulator: u64,
}

impl Crc16 {
    /// New CRC with the given generator polynomial and final XOR
    pub fn new(poly: u16, final_xor: u16) -> Self {
        Self {
            register: 0,
            poly,
            final_xor,
            accumulator: 0,
        }
    }

    /// Select a new polynomial and final XOR
    ///
    /// The running register is not reset.
    pub fn configure(&mut self, poly: u16, final_xor: u16) {
        self.poly = poly;
        self.final_xor = final_xor;
    }

    /// Push the low `bits` bits of `data`, most significant first
    ///
    /// The bits are also recorded in the diagnostic
    /// [accumulator](Self::accumulated).
    pub fn push(&mut self, data: u64, bits: u32) {
        self.push_bits(data, bits, true);
    }

    /// Current CRC value
    ///
    /// Augments a copy of the register with sixteen zero bits and
    /// applies the final XOR. Neither the register nor the
    /// accumulator is changed, so this may be called at any time
    /// and as often as desired.
    #[doc(alias = "finalize")]
    pub fn peek(&mut self) -> u16 {
        let saved = self.register;
        self.push_bits(0, 16, false);
        let out = self.register ^ self.final_xor;
        self.register = saved;
        out
    }

    /// Zero the register and the accumulator
    pub fn reset(&mut self) {
        self.register = 0;
        self.accumulator = 0;
    }

    /// Every bit pushed since the last reset
    ///
    /// Only the most recent 64 bits are kept. Useful for logging
    /// frames which fail the CRC.
    pub fn accumulated(&self) -> u64 {
        self.accumulator
    }

    /// Generator polynomial
    pub fn poly(&self) -> u16 {
        self.poly
    }

    /// Final XOR
    pub fn final_xor(&self) -> u16 {
        self.final_xor
    }

    fn push_bits(&mut self, data: u64, bits: u32, accumulate: bool) {
        for i in (0..bits).rev() {
            let overflow = self.register & 0x8000 != 0;
            self.register = (self.register << 1) | ((data >> i) & 0x1) as u16;
            if overflow {
                self.register ^= self.poly;
            }
        }

        if accumulate {
            let mask = 1u64.checked_shl(bits).map_or(u64::MAX, |m| m - 1);
            self.accumulator = self.accumulator.checked_shl(bits).unwrap_or(0) | (data & mask);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(poly: u16, channel: u64, txid: u64, state: u64) -> Crc16 {
        let mut crc = Crc16::new(poly, 0);
        crc.push(channel, 4);
        crc.push(txid, 20);
        crc.push(state, 8);
        crc
    }

    #[test]
    fn test_check_string() {
        let mut crc = Crc16::new(0x8005, 0);
        for byte in b"123456789" {
            crc.push(*byte as u64, 8);
        }
        assert_eq!(0xfee8, crc.peek());

        let mut crc = Crc16::new(0x8050, 0);
        for byte in b"123456789" {
            crc.push(*byte as u64, 8);
        }
        assert_eq!(0xda60, crc.peek());
    }

    #[test]
    fn test_sensor_fields() {
        assert_eq!(0x8b86, fields(0x8005, 8, 0x12345, 0x80).peek());
        assert_eq!(0x2eb0, fields(0x8050, 8, 0x12345, 0x80).peek());
        assert_eq!(0xc5e8, fields(0x8005, 2, 0xabcde, 0x24).peek());
        assert_eq!(0x3350, fields(0x8050, 2, 0xabcde, 0x24).peek());
    }

    #[test]
    fn test_peek_is_repeatable() {
        let mut crc = fields(0x8005, 8, 0x12345, 0x80);
        let before = crc.clone();
        assert_eq!(crc.peek(), crc.peek());
        assert_eq!(before, crc);

        // pushing after a peek is the same as never peeking
        crc.push(0x8b86, 16);
        let mut other = before;
        other.push(0x8b86, 16);
        assert_eq!(other.peek(), crc.peek());

        // a frame followed by its own CRC leaves a zero remainder
        assert_eq!(0, crc.peek());
    }

    #[test]
    fn test_accumulator() {
        let mut crc = fields(0x8050, 2, 0xabcde, 0x24);
        assert_eq!(0x2_abcde_24, crc.accumulated());
        crc.peek();
        assert_eq!(0x2_abcde_24, crc.accumulated());

        crc.push(u64::MAX, 64);
        assert_eq!(u64::MAX, crc.accumulated());

        crc.reset();
        assert_eq!(0, crc.accumulated());
        assert_eq!(Crc16::new(0x8050, 0), crc);

        // bits above the pushed width are ignored
        crc.push(0x8, 4);
        crc.push(0x1_0005, 4);
        assert_eq!(0x85, crc.accumulated());
        let mut clean = Crc16::new(0x8050, 0);
        clean.push(0x85, 8);
        assert_eq!(clean.peek(), crc.peek());
    }

    #[test]
    fn test_final_xor() {
        let mut plain = fields(0x8005, 8, 0x12345, 0x80);
        let mut xored = plain.clone();
        xored.configure(0x8005, 0xffff);
        assert_eq!(0xffff, xored.final_xor());
        assert_eq!(plain.peek() ^ 0xffff, xored.peek());
    }
}
