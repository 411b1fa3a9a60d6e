use byteorder::{BigEndian, ByteOrder};

use crate::{out_buffer::SIZE_LIMIT, Dictionary, Error, Message};

/// An incrementally-fed pull-parser over bytes arriving from a transport.
///
/// Callers [`feed`](InBuffer::feed) bytes as they arrive, then attempt a
/// `parse_*` method. Every `parse_*` method is resumable: if the buffer
/// does not yet hold enough bytes to complete the value it is trying to
/// parse, it returns `Ok(None)` and leaves the buffer untouched so the
/// caller can feed more data and retry. On success it returns `Ok(Some(value))`
/// and consumes exactly the bytes that made up `value`.
///
/// `totalsize` tracks bytes fed since the last [`resetsize`](InBuffer::resetsize)
/// call; exceeding [`SIZE_LIMIT`] is a fatal [`Error::SizeLimit`]. Callers
/// should call `resetsize()` after each complete PDU is parsed so the
/// meter re-baselines to the bytes still unparsed, bounding memory across a
/// long-lived connection while allowing any single PDU up to the limit.
#[derive(Debug, Default)]
pub struct InBuffer {
    buf: Vec<u8>,
    totalsize: usize,
}

impl InBuffer {
    /// Construct an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append bytes received from the transport.
    pub fn feed(&mut self, data: &[u8]) -> Result<(), Error> {
        self.buf.extend_from_slice(data);
        self.totalsize += data.len();
        if self.totalsize > SIZE_LIMIT {
            return Err(Error::SizeLimit);
        }
        Ok(())
    }

    /// Re-baseline the size meter to the number of bytes currently
    /// buffered but not yet parsed. Call this after each complete PDU.
    pub fn resetsize(&mut self) {
        self.totalsize = self.buf.len();
    }

    fn take(&mut self, consumed: usize) {
        self.buf.drain(..consumed);
    }

    /// Parse a big-endian `u16`.
    pub fn parse_net16int(&mut self) -> Result<Option<u16>, Error> {
        match parse_net16int(&self.buf) {
            Some((v, n)) => {
                self.take(n);
                Ok(Some(v))
            }
            None => Ok(None),
        }
    }

    /// Parse a big-endian `u32`.
    pub fn parse_net32int(&mut self) -> Result<Option<u32>, Error> {
        match parse_net32int(&self.buf) {
            Some((v, n)) => {
                self.take(n);
                Ok(Some(v))
            }
            None => Ok(None),
        }
    }

    /// Parse a `u16`-length-prefixed byte string.
    pub fn parse_net16string(&mut self) -> Result<Option<Vec<u8>>, Error> {
        match parse_net16string(&self.buf) {
            Some((v, n)) => {
                self.take(n);
                Ok(Some(v))
            }
            None => Ok(None),
        }
    }

    /// Parse a `u32`-length-prefixed byte string.
    pub fn parse_net32string(&mut self) -> Result<Option<Vec<u8>>, Error> {
        match parse_net32string(&self.buf) {
            Some((v, n)) => {
                self.take(n);
                Ok(Some(v))
            }
            None => Ok(None),
        }
    }

    /// Parse a bindict: repeated `(net16string key, net32string value)`
    /// entries terminated by a zero-length key.
    pub fn parse_bindict(&mut self) -> Result<Option<Dictionary>, Error> {
        match parse_bindict(&self.buf)? {
            Some((v, n)) => {
                self.take(n);
                Ok(Some(v))
            }
            None => Ok(None),
        }
    }

    /// Parse the startup frame `(protocol_version, header_size)`.
    pub fn parse_startup_message(&mut self) -> Result<Option<(u32, u32)>, Error> {
        let buf = &self.buf;
        if buf.len() < 8 {
            return Ok(None);
        }
        let version = BigEndian::read_u32(&buf[0..4]);
        let header_size = BigEndian::read_u32(&buf[4..8]);
        self.take(8);
        Ok(Some((version, header_size)))
    }

    /// Parse one complete OMAPI message: the 6-field header, the `message`
    /// and `obj` dictionaries, then exactly `authlen` bytes of signature.
    pub fn parse_message(&mut self) -> Result<Option<Message>, Error> {
        match parse_message(&self.buf)? {
            Some((msg, n)) => {
                self.take(n);
                Ok(Some(msg))
            }
            None => Ok(None),
        }
    }
}

fn parse_net16int(buf: &[u8]) -> Option<(u16, usize)> {
    if buf.len() < 2 {
        return None;
    }
    Some((BigEndian::read_u16(&buf[..2]), 2))
}

fn parse_net32int(buf: &[u8]) -> Option<(u32, usize)> {
    if buf.len() < 4 {
        return None;
    }
    Some((BigEndian::read_u32(&buf[..4]), 4))
}

fn parse_net16string(buf: &[u8]) -> Option<(Vec<u8>, usize)> {
    let (len, hdr) = parse_net16int(buf)?;
    let len = len as usize;
    if buf.len() < hdr + len {
        return None;
    }
    Some((buf[hdr..hdr + len].to_vec(), hdr + len))
}

fn parse_net32string(buf: &[u8]) -> Option<(Vec<u8>, usize)> {
    let (len, hdr) = parse_net32int(buf)?;
    let len = len as usize;
    if buf.len() < hdr + len {
        return None;
    }
    Some((buf[hdr..hdr + len].to_vec(), hdr + len))
}

fn parse_bindict(buf: &[u8]) -> Result<Option<(Dictionary, usize)>, Error> {
    let mut pos = 0;
    let mut dict = Dictionary::new();

    loop {
        let (key, key_len) = match parse_net16string(&buf[pos..]) {
            Some(v) => v,
            None => return Ok(None),
        };

        if key.is_empty() {
            pos += key_len;
            return Ok(Some((dict, pos)));
        }

        let (value, value_len) = match parse_net32string(&buf[pos + key_len..]) {
            Some(v) => v,
            None => return Ok(None),
        };

        dict.push(key, value);
        pos += key_len + value_len;
    }
}

fn parse_message(buf: &[u8]) -> Result<Option<(Message, usize)>, Error> {
    let mut pos = 0;

    macro_rules! field {
        () => {{
            match parse_net32int(&buf[pos..]) {
                Some((v, n)) => {
                    pos += n;
                    v
                }
                None => return Ok(None),
            }
        }};
    }

    let authid = field!();
    let authlen = field!();
    let opcode = field!();
    let handle = field!();
    let tid = field!();
    let rid = field!();

    let (message, n) = match parse_bindict(&buf[pos..])? {
        Some(v) => v,
        None => return Ok(None),
    };
    pos += n;

    let (obj, n) = match parse_bindict(&buf[pos..])? {
        Some(v) => v,
        None => return Ok(None),
    };
    pos += n;

    let authlen = authlen as usize;
    if buf[pos..].len() < authlen {
        return Ok(None);
    }
    let signature = buf[pos..pos + authlen].to_vec();
    pos += authlen;

    let msg = Message::from_wire_fields(authid, opcode, handle, tid, rid, message, obj, signature)?;

    Ok(Some((msg, pos)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_feed_over_size_limit() {
        let mut buf = InBuffer::new();
        let chunk = vec![0u8; SIZE_LIMIT + 1];
        assert_eq!(buf.feed(&chunk).unwrap_err(), Error::SizeLimit);
    }

    #[test]
    fn test_resumable_net32int_across_feeds() {
        let mut buf = InBuffer::new();
        buf.feed(&[0x00, 0x01]).unwrap();
        assert_eq!(buf.parse_net32int().unwrap(), None);

        buf.feed(&[0x02, 0x03]).unwrap();
        assert_eq!(buf.parse_net32int().unwrap(), Some(0x00010203));
    }

    #[test]
    fn test_parse_bindict_round_trip() {
        let mut dict = Dictionary::new();
        dict.push(*b"foo", *b"bar");

        let mut out = crate::OutBuffer::new();
        out.add_bindict(&dict).unwrap();

        let mut inbuf = InBuffer::new();
        inbuf.feed(out.getvalue()).unwrap();

        let got = inbuf.parse_bindict().unwrap().unwrap();
        assert_eq!(got, dict);
    }

    #[test]
    fn test_parse_bindict_needs_more_data() {
        let mut dict = Dictionary::new();
        dict.push(*b"foo", *b"bar");

        let mut out = crate::OutBuffer::new();
        out.add_bindict(&dict).unwrap();
        let encoded = out.getvalue().to_vec();

        let mut inbuf = InBuffer::new();
        inbuf.feed(&encoded[..encoded.len() - 1]).unwrap();
        assert_eq!(inbuf.parse_bindict().unwrap(), None);

        inbuf.feed(&encoded[encoded.len() - 1..]).unwrap();
        assert_eq!(inbuf.parse_bindict().unwrap(), Some(dict));
    }

    #[test]
    fn test_resetsize_rebaselines_across_pdus() {
        let mut buf = InBuffer::new();

        // First PDU: fill close to the limit, parse it, then reset.
        let first = vec![0xAB; SIZE_LIMIT - 10];
        buf.feed(&first).unwrap();
        // Consume it directly to simulate "parsed".
        buf.take(first.len());
        buf.resetsize();

        // A second, smaller PDU must not trip the limit post-reset even
        // though the cumulative bytes fed across both exceeds it.
        let second = vec![0xCD; 100];
        buf.feed(&second).unwrap();
    }

    #[test]
    fn test_net16int_boundary_values() {
        for v in [0u16, u16::MAX] {
            let mut out = crate::OutBuffer::new();
            out.add_net16int(v).unwrap();

            let mut inbuf = InBuffer::new();
            inbuf.feed(out.getvalue()).unwrap();
            assert_eq!(inbuf.parse_net16int().unwrap(), Some(v));
        }
    }

    #[test]
    fn test_net32int_boundary_values() {
        for v in [0u32, u32::MAX] {
            let mut out = crate::OutBuffer::new();
            out.add_net32int(v).unwrap();

            let mut inbuf = InBuffer::new();
            inbuf.feed(out.getvalue()).unwrap();
            assert_eq!(inbuf.parse_net32int().unwrap(), Some(v));
        }
    }

    #[test]
    fn test_bindict_with_largest_key_that_fits_size_limit() {
        // A net16string key's length prefix alone permits up to 65535
        // bytes, but the whole-PDU SIZE_LIMIT is the tighter bound in
        // practice: an entry's key, value, their length prefixes, and the
        // dictionary terminator must together fit in 65536 bytes. This
        // picks the largest single-entry key that still fits exactly at
        // that ceiling.
        let key_len = SIZE_LIMIT - 2 - 4 - 1 - 2;
        let mut dict = Dictionary::new();
        dict.push(vec![b'k'; key_len], b"v".to_vec());

        let mut out = crate::OutBuffer::new();
        out.add_bindict(&dict).unwrap();
        assert_eq!(out.getvalue().len(), SIZE_LIMIT);

        let mut inbuf = InBuffer::new();
        inbuf.feed(out.getvalue()).unwrap();
        assert_eq!(inbuf.parse_bindict().unwrap(), Some(dict));
    }

    proptest! {
        /// Decoding the n-bit big-endian encoding of any value in range
        /// yields that value back - P2, for the 16-bit wire integers.
        #[test]
        fn prop_net16int_round_trip(v in any::<u16>()) {
            let mut out = crate::OutBuffer::new();
            out.add_net16int(v).unwrap();

            let mut inbuf = InBuffer::new();
            inbuf.feed(out.getvalue()).unwrap();
            prop_assert_eq!(inbuf.parse_net16int().unwrap(), Some(v));
        }

        /// As above, for the 32-bit wire integers.
        #[test]
        fn prop_net32int_round_trip(v in any::<u32>()) {
            let mut out = crate::OutBuffer::new();
            out.add_net32int(v).unwrap();

            let mut inbuf = InBuffer::new();
            inbuf.feed(out.getvalue()).unwrap();
            prop_assert_eq!(inbuf.parse_net32int().unwrap(), Some(v));
        }

        /// `parse_bindict(encode_bindict(D)) == D` for arbitrary
        /// dictionaries, including ones with duplicate keys - P1, exercised
        /// over the wire rather than just in memory.
        #[test]
        fn prop_bindict_wire_round_trip(
            pairs in prop::collection::vec(
                (prop::collection::vec(any::<u8>(), 1..16), prop::collection::vec(any::<u8>(), 0..32)),
                0..8,
            )
        ) {
            let mut dict = Dictionary::new();
            for (k, v) in &pairs {
                dict.push(k.clone(), v.clone());
            }

            let mut out = crate::OutBuffer::new();
            out.add_bindict(&dict).unwrap();

            let mut inbuf = InBuffer::new();
            inbuf.feed(out.getvalue()).unwrap();
            prop_assert_eq!(inbuf.parse_bindict().unwrap(), Some(dict));
        }
    }
}
