//! Argument parsing for the add-address-cache-entry request.
//!
//! The request arrives as three text fields and nothing is sent to the
//! NCP until all of them parse. `ncpctl` runs the same parser before
//! connecting, the daemon runs it again at the boundary.

use std::net::Ipv6Addr;

use crate::error::AddressParseError;

/// Parsed and validated cache-entry arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// Full 16-byte address.
    pub address: [u8; 16],
    /// 8-byte interface identifier.
    pub iid: [u8; 8],
    /// 16-bit mesh locator.
    pub rloc16: u16,
}

impl CacheEntry {
    /// Parse all three fields, failing before anything is sent.
    pub fn parse(address: &str, iid: &str, rloc16: &str) -> Result<Self, AddressParseError> {
        Ok(CacheEntry {
            address: parse_address(address)?,
            iid: parse_iid(iid)?,
            rloc16: parse_rloc16(rloc16)?,
        })
    }

    /// Wire form for the address-cache insert: address, iid, locator in
    /// network byte order.
    pub fn encode(&self) -> Vec<u8> {
        let mut value = Vec::with_capacity(26);
        value.extend_from_slice(&self.address);
        value.extend_from_slice(&self.iid);
        value.extend_from_slice(&self.rloc16.to_be_bytes());
        value
    }
}

/// Parse an address field.
///
/// Text containing a `:` is taken as a textual IPv6 address; anything
/// else must be raw hex for exactly 16 bytes.
pub fn parse_address(text: &str) -> Result<[u8; 16], AddressParseError> {
    if text.contains(':') {
        let addr: Ipv6Addr = text
            .parse()
            .map_err(|_| AddressParseError::InvalidAddress(text.to_string()))?;
        Ok(addr.octets())
    } else {
        parse_hex_exact(text)
    }
}

/// Parse an interface identifier: raw hex, exactly 8 bytes.
pub fn parse_iid(text: &str) -> Result<[u8; 8], AddressParseError> {
    parse_hex_exact(text)
}

/// Parse a mesh locator: raw hex, exactly 2 bytes, leading byte high.
pub fn parse_rloc16(text: &str) -> Result<u16, AddressParseError> {
    let bytes: [u8; 2] = parse_hex_exact(text)?;
    Ok(u16::from(bytes[0]) << 8 | u16::from(bytes[1]))
}

/// Raw hex with an optional `0x` prefix and `:`/`-`/`.`/space
/// separators, decoding to exactly `N` bytes.
fn parse_hex_exact<const N: usize>(text: &str) -> Result<[u8; N], AddressParseError> {
    let stripped = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text);
    let cleaned: String = stripped
        .chars()
        .filter(|c| !matches!(c, ':' | '-' | '.' | ' '))
        .collect();
    let bytes =
        hex::decode(&cleaned).map_err(|_| AddressParseError::InvalidHex(text.to_string()))?;
    let actual = bytes.len();
    bytes
        .try_into()
        .map_err(|_| AddressParseError::WrongLength {
            expected: N,
            actual,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_textual_ipv6_address() {
        let address = parse_address("2001:db8::1").unwrap();
        assert_eq!(address[0], 0x20);
        assert_eq!(address[1], 0x01);
        assert_eq!(address[2], 0x0d);
        assert_eq!(address[3], 0xb8);
        assert_eq!(address[15], 0x01);
        assert!(address[4..15].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_raw_hex_address_matches_textual_form() {
        let textual = parse_address("2001:db8::1").unwrap();
        let raw = parse_address("20010db8000000000000000000000001").unwrap();
        assert_eq!(textual, raw);
    }

    #[test]
    fn test_address_wrong_length_rejected() {
        match parse_address("20010db8") {
            Err(AddressParseError::WrongLength { expected, actual }) => {
                assert_eq!(expected, 16);
                assert_eq!(actual, 4);
            }
            other => panic!("Expected WrongLength, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_ipv6_rejected() {
        assert!(matches!(
            parse_address("2001:zz8::1"),
            Err(AddressParseError::InvalidAddress(_))
        ));
    }

    #[test]
    fn test_bad_hex_digits_rejected() {
        assert!(matches!(
            parse_iid("11223344556677gg"),
            Err(AddressParseError::InvalidHex(_))
        ));
    }

    #[test]
    fn test_iid_with_prefix_and_separators() {
        let plain = parse_iid("1122334455667788").unwrap();
        assert_eq!(plain, [0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88]);
        assert_eq!(parse_iid("0x11-22-33-44-55-66-77-88").unwrap(), plain);
        assert_eq!(parse_iid("11.22.33.44.55.66.77.88").unwrap(), plain);
        assert_eq!(parse_iid("11 22 33 44 55 66 77 88").unwrap(), plain);
    }

    #[test]
    fn test_locator_reassembly() {
        assert_eq!(parse_rloc16("ab12").unwrap(), 0xAB12);
        assert_eq!(parse_rloc16("0xab12").unwrap(), 0xAB12);
        assert_eq!(parse_rloc16("0400").unwrap(), 0x0400);
    }

    #[test]
    fn test_locator_wrong_length_rejected() {
        assert!(matches!(
            parse_rloc16("ab"),
            Err(AddressParseError::WrongLength {
                expected: 2,
                actual: 1,
            })
        ));
        assert!(matches!(
            parse_rloc16("ab1234"),
            Err(AddressParseError::WrongLength {
                expected: 2,
                actual: 3,
            })
        ));
    }

    #[test]
    fn test_cache_entry_wire_form() {
        let entry = CacheEntry::parse("2001:db8::1", "1122334455667788", "0xab12").unwrap();
        let wire = entry.encode();

        assert_eq!(wire.len(), 26);
        assert_eq!(&wire[..16], &entry.address);
        assert_eq!(&wire[16..24], &entry.iid);
        // Locator travels leading byte first.
        assert_eq!(&wire[24..], &[0xAB, 0x12]);
    }

    #[test]
    fn test_cache_entry_fails_on_first_bad_field() {
        assert!(CacheEntry::parse("not-hex", "1122334455667788", "ab12").is_err());
        assert!(CacheEntry::parse("2001:db8::1", "112233", "ab12").is_err());
        assert!(CacheEntry::parse("2001:db8::1", "1122334455667788", "whoops").is_err());
    }
}
