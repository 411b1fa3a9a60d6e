use crate::Error;

/// Convert a dotted-quad IPv4 address string to its 4-byte network-order
/// representation.
pub fn pack_ip(s: &str) -> Result<[u8; 4], Error> {
    let parts: Vec<&str> = s.split('.').collect();
    if parts.len() != 4 {
        return Err(Error::InvalidAddress(
            "ip address must have exactly 4 dot-separated octets".into(),
        ));
    }

    let mut out = [0u8; 4];
    for (i, part) in parts.iter().enumerate() {
        out[i] = part
            .parse::<u8>()
            .map_err(|_| Error::InvalidAddress(format!("invalid ip octet {part:?}")))?;
    }
    Ok(out)
}

/// Convert a 4-byte network-order IPv4 address to dotted-quad notation.
pub fn unpack_ip(bytes: &[u8]) -> Result<String, Error> {
    let bytes: &[u8; 4] = bytes
        .try_into()
        .map_err(|_| Error::InvalidAddress("ip address must be exactly 4 bytes".into()))?;
    Ok(format!("{}.{}.{}.{}", bytes[0], bytes[1], bytes[2], bytes[3]))
}

/// Convert a colon-delimited hex MAC address string to its 6-byte
/// network-order representation.
pub fn pack_mac(s: &str) -> Result<[u8; 6], Error> {
    let parts: Vec<&str> = s.split(':').collect();
    if parts.len() != 6 {
        return Err(Error::InvalidAddress(
            "mac address must have exactly 6 colon-separated octets".into(),
        ));
    }

    let mut out = [0u8; 6];
    for (i, part) in parts.iter().enumerate() {
        out[i] = u8::from_str_radix(part, 16)
            .map_err(|_| Error::InvalidAddress(format!("invalid mac octet {part:?}")))?;
    }
    Ok(out)
}

/// Convert a 6-byte network-order MAC address to lowercase colon-hex
/// notation.
pub fn unpack_mac(bytes: &[u8]) -> Result<String, Error> {
    let bytes: &[u8; 6] = bytes
        .try_into()
        .map_err(|_| Error::InvalidAddress("mac address must be exactly 6 bytes".into()))?;
    Ok(bytes
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(":"))
}
