//! Minimal DER reader for the `RouteOriginAttestation` content of a ROA.
//!
//! This performs no cryptographic verification: it trusts that whatever
//! handed it these bytes already validated the ROA's signature chain
//! (`rpkid` does this upstream in the system this crate reimplements; see
//! `RoaDecoder`'s docs). It expects the bytes to already be the
//! `RouteOriginAttestation` SEQUENCE itself, not the surrounding CMS
//! `SignedData` envelope — unwrapping that envelope is part of the
//! cryptographic-validation step this crate does not perform.
//!
//! ```text
//! RouteOriginAttestation ::= SEQUENCE {
//!     version   [0] EXPLICIT INTEGER DEFAULT 0,
//!     asID          ASId,
//!     ipAddrBlocks  SEQUENCE OF ROAIPAddressFamily }
//!
//! ROAIPAddressFamily ::= SEQUENCE {
//!     addressFamily OCTET STRING,
//!     addresses     SEQUENCE OF ROAIPAddress }
//!
//! ROAIPAddress ::= SEQUENCE {
//!     address    BIT STRING,
//!     maxLength  INTEGER OPTIONAL }
//! ```

use crate::error::RoaError;
use crate::wire::Afi;

use super::{DecodedRoa, RoaDecoder, RoaPrefix};

mod tag {
    pub const INTEGER: u8 = 0x02;
    pub const BIT_STRING: u8 = 0x03;
    pub const OCTET_STRING: u8 = 0x04;
    pub const SEQUENCE: u8 = 0x30;
    pub const CONTEXT_0: u8 = 0xA0;
}

/// One decoded tag-length-value: `value` is the exact content bytes, not
/// including the tag or length octets.
struct Tlv<'a> {
    tag: u8,
    value: &'a [u8],
    next: usize,
}

fn read_tlv(buf: &[u8], pos: usize) -> Result<Tlv<'_>, RoaError> {
    if pos >= buf.len() {
        return Err(RoaError::Truncated(pos));
    }
    let der_tag = buf[pos];
    let len_pos = pos + 1;
    if len_pos >= buf.len() {
        return Err(RoaError::Truncated(len_pos));
    }
    let first_len_byte = buf[len_pos];
    let (length, len_octets) = if first_len_byte & 0x80 == 0 {
        (first_len_byte as usize, 1)
    } else {
        let num_bytes = (first_len_byte & 0x7f) as usize;
        let start = len_pos + 1;
        let end = start + num_bytes;
        if end > buf.len() {
            return Err(RoaError::Truncated(start));
        }
        let mut length = 0usize;
        for &b in &buf[start..end] {
            length = (length << 8) | b as usize;
        }
        (length, 1 + num_bytes)
    };
    let value_start = len_pos + len_octets;
    let value_end = value_start + length;
    if value_end > buf.len() {
        return Err(RoaError::Truncated(value_start));
    }
    Ok(Tlv { tag: der_tag, value: &buf[value_start..value_end], next: value_end })
}

fn expect_tag(tlv: &Tlv<'_>, expected: u8, offset: usize) -> Result<(), RoaError> {
    if tlv.tag != expected {
        return Err(RoaError::UnexpectedTag { tag: tlv.tag, offset, expected });
    }
    Ok(())
}

/// Parse a DER INTEGER's content as an unsigned value, stripping a leading
/// sign-avoidance zero byte if present.
fn integer_to_u32(value: &[u8]) -> u32 {
    let trimmed = match value {
        [0, rest @ ..] if value.len() > 1 => rest,
        other => other,
    };
    let mut out = 0u32;
    for &b in trimmed {
        out = (out << 8) | b as u32;
    }
    out
}

fn parse_roa_ip_address(buf: &[u8]) -> Result<RoaPrefix, RoaError> {
    let address = read_tlv(buf, 0)?;
    expect_tag(&address, tag::BIT_STRING, 0)?;
    let (unused_bits, bits) = address
        .value
        .split_first()
        .ok_or(RoaError::Truncated(0))?;
    let prefixlen = (bits.len() as u32 * 8).saturating_sub(*unused_bits as u32) as u8;

    let max_prefixlen = if address.next < buf.len() {
        let max_len = read_tlv(buf, address.next)?;
        expect_tag(&max_len, tag::INTEGER, address.next)?;
        Some(integer_to_u32(max_len.value) as u8)
    } else {
        None
    };

    Ok(RoaPrefix { bitstring: bits.to_vec(), prefixlen, max_prefixlen })
}

fn parse_roa_ip_address_family(buf: &[u8]) -> Result<(Afi, Vec<RoaPrefix>), RoaError> {
    let family = read_tlv(buf, 0)?;
    expect_tag(&family, tag::OCTET_STRING, 0)?;
    if family.value.len() < 2 {
        return Err(RoaError::Truncated(0));
    }
    let afi_number = u16::from_be_bytes([family.value[0], family.value[1]]);
    let afi = match afi_number {
        1 => Afi::Ipv4,
        2 => Afi::Ipv6,
        other => return Err(RoaError::UnknownAfi(other)),
    };

    let addresses = read_tlv(buf, family.next)?;
    expect_tag(&addresses, tag::SEQUENCE, family.next)?;

    let mut prefixes = Vec::new();
    let mut pos = 0;
    while pos < addresses.value.len() {
        let entry = read_tlv(addresses.value, pos)?;
        expect_tag(&entry, tag::SEQUENCE, pos)?;
        prefixes.push(parse_roa_ip_address(entry.value)?);
        pos = entry.next;
    }

    Ok((afi, prefixes))
}

fn decode_attestation(der: &[u8]) -> Result<DecodedRoa, RoaError> {
    let outer = read_tlv(der, 0)?;
    expect_tag(&outer, tag::SEQUENCE, 0)?;
    let content = outer.value;

    let mut pos = 0;
    let first = read_tlv(content, pos)?;
    let version = if first.tag == tag::CONTEXT_0 {
        let version_int = read_tlv(first.value, 0)?;
        expect_tag(&version_int, tag::INTEGER, 0)?;
        pos = first.next;
        integer_to_u32(version_int.value) as u8
    } else {
        0
    };
    if version != 0 {
        return Err(RoaError::UnsupportedVersion(version));
    }

    let as_id = read_tlv(content, pos)?;
    expect_tag(&as_id, tag::INTEGER, pos)?;
    let asn = integer_to_u32(as_id.value);
    pos = as_id.next;

    let ip_addr_blocks = read_tlv(content, pos)?;
    expect_tag(&ip_addr_blocks, tag::SEQUENCE, pos)?;

    let mut afi_addrs = Vec::new();
    let mut block_pos = 0;
    while block_pos < ip_addr_blocks.value.len() {
        let family = read_tlv(ip_addr_blocks.value, block_pos)?;
        expect_tag(&family, tag::SEQUENCE, block_pos)?;
        afi_addrs.push(parse_roa_ip_address_family(family.value)?);
        block_pos = family.next;
    }

    Ok(DecodedRoa { version, asn, afi_addrs })
}

/// Default, non-cryptographic [`RoaDecoder`].
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuralRoaDecoder;

impl RoaDecoder for StructuralRoaDecoder {
    fn decode(&self, der: &[u8]) -> Result<DecodedRoa, RoaError> {
        decode_attestation(der)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Hand-builds the DER bytes for a one-prefix ROA:
    /// AS 65001, 192.0.2.0/24, maxlen 24.
    fn sample_roa_der() -> Vec<u8> {
        // address BIT STRING: 0 unused bits, then 192.0.2 (the /24 prefix).
        let address = vec![tag::BIT_STRING, 4, 0x00, 192, 0, 2];
        let max_length = vec![tag::INTEGER, 1, 24];
        let mut roa_ip_address = vec![tag::SEQUENCE, (address.len() + max_length.len()) as u8];
        roa_ip_address.extend(address);
        roa_ip_address.extend(max_length);

        let mut addresses = vec![tag::SEQUENCE, roa_ip_address.len() as u8];
        addresses.extend(roa_ip_address);

        let address_family = vec![tag::OCTET_STRING, 2, 0x00, 0x01];
        let mut roa_ip_address_family =
            vec![tag::SEQUENCE, (address_family.len() + addresses.len()) as u8];
        roa_ip_address_family.extend(address_family);
        roa_ip_address_family.extend(addresses);

        let mut ip_addr_blocks = vec![tag::SEQUENCE, roa_ip_address_family.len() as u8];
        ip_addr_blocks.extend(roa_ip_address_family);

        let as_id = vec![tag::INTEGER, 3, 0x00, 0xFD, 0xE9]; // 65001, sign byte + 2 bytes

        let mut content = Vec::new();
        content.extend(as_id);
        content.extend(ip_addr_blocks);

        let mut out = vec![tag::SEQUENCE, content.len() as u8];
        out.extend(content);
        out
    }

    #[test]
    fn decodes_the_literal_scenario_roa() {
        let der = sample_roa_der();
        let decoded = StructuralRoaDecoder.decode(&der).unwrap();
        assert_eq!(decoded.version, 0);
        assert_eq!(decoded.asn, 65001);
        assert_eq!(decoded.afi_addrs.len(), 1);
        let (afi, prefixes) = &decoded.afi_addrs[0];
        assert_eq!(*afi, Afi::Ipv4);
        assert_eq!(prefixes.len(), 1);
        assert_eq!(prefixes[0].prefixlen, 24);
        assert_eq!(prefixes[0].max_prefixlen, Some(24));
        assert_eq!(prefixes[0].bitstring, vec![192, 0, 2]);
    }

    #[test]
    fn rejects_truncated_input() {
        let err = StructuralRoaDecoder.decode(&[tag::SEQUENCE, 5, 0, 0]).unwrap_err();
        assert!(matches!(err, RoaError::Truncated(_)));
    }
}
