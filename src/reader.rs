//! Little-endian primitive readers shared by all decoders.

use crate::error::{ProtocolError, Result};

/// Interpret three little-endian bytes as a 24-bit two's-complement integer.
///
/// Bit 7 of the third byte is the sign bit:
///
/// ```
/// # use polar_h10::reader::sign_extend_24;
/// assert_eq!(sign_extend_24([0xFF, 0xFF, 0xFF]), -1);
/// assert_eq!(sign_extend_24([0x00, 0x00, 0x80]), -8_388_608);
/// assert_eq!(sign_extend_24([0xFF, 0xFF, 0x7F]), 8_388_607);
/// ```
pub fn sign_extend_24(bytes: [u8; 3]) -> i32 {
    // Place the value in the top 24 bits, then shift back arithmetically.
    i32::from_le_bytes([0, bytes[0], bytes[1], bytes[2]]) >> 8
}

/// Forward-only cursor over a notification payload.
///
/// Reads never panic: a read past the end returns
/// [`ProtocolError::TruncatedBuffer`] and leaves the cursor where it was.
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Current offset from the start of the buffer.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Number of unread bytes.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// All unread bytes, without advancing.
    pub fn rest(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }

    /// Consume exactly `n` bytes.
    pub fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if n > self.remaining() {
            return Err(ProtocolError::TruncatedBuffer {
                needed: n,
                available: self.remaining(),
            });
        }
        let out = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take_array::<1>()?[0])
    }

    pub fn read_u16_le(&mut self) -> Result<u16> {
        self.take_array().map(u16::from_le_bytes)
    }

    pub fn read_i16_le(&mut self) -> Result<i16> {
        self.take_array().map(i16::from_le_bytes)
    }

    pub fn read_u64_le(&mut self) -> Result<u64> {
        self.take_array().map(u64::from_le_bytes)
    }

    /// Read a 24-bit little-endian two's-complement value (see [`sign_extend_24`]).
    pub fn read_i24_le(&mut self) -> Result<i32> {
        self.take_array().map(sign_extend_24)
    }
}
