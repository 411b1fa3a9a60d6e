use byteorder::{BigEndian, WriteBytesExt};
use std::io::Write;

use crate::{Dictionary, Error};

/// The hard ceiling on the size of a single OMAPI PDU, enforced on both
/// encode ([`OutBuffer`]) and decode ([`InBuffer`](crate::InBuffer)).
pub const SIZE_LIMIT: usize = 65536;

/// An append-only byte accumulator used to build the wire form of OMAPI
/// messages, bounded by [`SIZE_LIMIT`].
///
/// Every `add_*` method returns `&mut Self` so calls can be chained, and
/// every method fails with [`Error::SizeLimit`] if appending its bytes
/// would push the accumulated length past the ceiling. On that error the
/// buffer retains exactly the bytes from the last successful write.
#[derive(Debug, Clone, Default)]
pub struct OutBuffer {
    buf: Vec<u8>,
}

impl OutBuffer {
    /// Construct an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append raw bytes.
    pub fn add(&mut self, data: &[u8]) -> Result<&mut Self, Error> {
        if self.buf.len() + data.len() > SIZE_LIMIT {
            return Err(Error::SizeLimit);
        }
        self.buf.write_all(data).expect("writes to a Vec never fail");
        Ok(self)
    }

    /// Append `value` as 4 bytes, big-endian.
    pub fn add_net32int(&mut self, value: u32) -> Result<&mut Self, Error> {
        let mut tmp = [0u8; 4];
        (&mut tmp[..]).write_u32::<BigEndian>(value)?;
        self.add(&tmp)
    }

    /// Append `value` as 2 bytes, big-endian.
    pub fn add_net16int(&mut self, value: u16) -> Result<&mut Self, Error> {
        let mut tmp = [0u8; 2];
        (&mut tmp[..]).write_u16::<BigEndian>(value)?;
        self.add(&tmp)
    }

    /// Append a 4-byte big-endian length prefix followed by `s`.
    ///
    /// Fails with [`Error::ValueOutOfRange`] if `s` is too long to fit a
    /// 32-bit length.
    pub fn add_net32string(&mut self, s: &[u8]) -> Result<&mut Self, Error> {
        let len: u32 = s
            .len()
            .try_into()
            .map_err(|_| Error::ValueOutOfRange(32))?;
        self.add_net32int(len)?;
        self.add(s)
    }

    /// Append a 2-byte big-endian length prefix followed by `s`.
    ///
    /// Fails with [`Error::ValueOutOfRange`] if `s` is too long to fit a
    /// 16-bit length.
    pub fn add_net16string(&mut self, s: &[u8]) -> Result<&mut Self, Error> {
        let len: u16 = s
            .len()
            .try_into()
            .map_err(|_| Error::ValueOutOfRange(16))?;
        self.add_net16int(len)?;
        self.add(s)
    }

    /// Encode `dict` as `entry* 0x00 0x00`, each entry a net16string key
    /// followed by a net32string value.
    pub fn add_bindict(&mut self, dict: &Dictionary) -> Result<&mut Self, Error> {
        for (key, value) in dict.iter() {
            self.add_net16string(key)?;
            self.add_net32string(value)?;
        }
        self.add(&[0, 0])
    }

    /// Return the accumulated bytes.
    pub fn getvalue(&self) -> &[u8] {
        &self.buf
    }

    /// Consume (drop) the first `n` bytes, shifting the remainder to the
    /// front. Used when this buffer is reused as a ring.
    pub fn consume(&mut self, n: usize) -> &mut Self {
        self.buf.drain(..n.min(self.buf.len()));
        self
    }
}
