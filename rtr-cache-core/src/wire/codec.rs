//! Stateless encoder and streaming decoder for wire version 0.
//!
//! The decoder is deliberately *not* modeled as an explicit "need N bytes,
//! then call this handler" state machine the way the protocol this crate
//! reimplements does it. Instead [`Decoder::poll`] re-examines the buffer
//! from the front on every call and only consumes bytes once a whole PDU
//! is present. That keeps the parser a pure function of its buffer
//! contents, with the transport adapter the only code that knows about a
//! reactor (see `transport::framed`).

use bytes::{Buf, BytesMut};

use super::address::AddressValue;
use super::pdu::{errno as errno_codes, kind, Pdu, PrefixRecord, PROTOCOL_VERSION};
use crate::error::WireError;

/// Encode a single PDU to its wire representation.
pub fn encode(pdu: &Pdu) -> Vec<u8> {
    let mut out = Vec::new();
    out.push(PROTOCOL_VERSION);
    out.push(pdu.kind());
    match pdu {
        Pdu::SerialNotify { serial } | Pdu::SerialQuery { serial } | Pdu::EndOfData { serial } => {
            out.extend_from_slice(&0u16.to_be_bytes());
            out.extend_from_slice(&serial.to_be_bytes());
        }
        Pdu::ResetQuery | Pdu::CacheResponse | Pdu::CacheReset => {
            out.extend_from_slice(&0u16.to_be_bytes());
        }
        Pdu::Prefix(p) => {
            out.extend_from_slice(&p.color.to_be_bytes());
            out.push(p.announce as u8);
            out.push(p.prefixlen);
            out.push(p.max_prefixlen);
            out.push(PrefixRecord::SOURCE);
            out.extend_from_slice(&p.addr.to_bytes());
            out.extend_from_slice(&p.asn.to_be_bytes());
        }
        Pdu::ErrorReport { errno, erroneous_pdu, message } => {
            out.extend_from_slice(&errno.to_be_bytes());
            out.extend_from_slice(&(erroneous_pdu.len() as u16).to_be_bytes());
            out.extend_from_slice(&(message.len() as u16).to_be_bytes());
            out.extend_from_slice(erroneous_pdu);
            out.extend_from_slice(message.as_bytes());
        }
    }
    out
}

/// Build an `error-report` PDU for a protocol violation, capping the
/// offending bytes at a reasonable size so a malicious or corrupt peer
/// cannot make the report itself unbounded.
pub fn error_report(code: u16, offending: &[u8], message: impl Into<String>) -> Pdu {
    const MAX_ERRONEOUS_PDU: usize = 512;
    Pdu::ErrorReport {
        errno: code,
        erroneous_pdu: offending[..offending.len().min(MAX_ERRONEOUS_PDU)].to_vec(),
        message: message.into(),
    }
}

pub fn internal_error(offending: &[u8], message: impl Into<String>) -> Pdu {
    error_report(errno_codes::INTERNAL_ERROR, offending, message)
}

pub fn no_data_available(offending: &[u8]) -> Pdu {
    error_report(errno_codes::NO_DATA_AVAILABLE, offending, "no data available")
}

/// Try to decode exactly one PDU from the front of `buf`.
///
/// Returns `Ok(None)` when `buf` doesn't yet hold a whole PDU — the caller
/// must not treat this as an error, only as "wait for more bytes". Never
/// reads past the PDU's declared length.
fn decode_one(buf: &[u8]) -> Result<Option<(usize, Pdu)>, WireError> {
    const HEADER_LEN: usize = 2;
    if buf.len() < HEADER_LEN {
        return Ok(None);
    }
    let version = buf[0];
    if version != PROTOCOL_VERSION {
        return Err(WireError::VersionMismatch(version));
    }
    let pdu_kind = buf[1];

    match pdu_kind {
        kind::SERIAL_NOTIFY | kind::SERIAL_QUERY | kind::END_OF_DATA => {
            let need = HEADER_LEN + 2 + 4;
            if buf.len() < need {
                return Ok(None);
            }
            let reserved = u16::from_be_bytes([buf[2], buf[3]]);
            if reserved != 0 {
                return Err(WireError::ReservedNonZero(reserved));
            }
            let serial = u32::from_be_bytes(buf[4..8].try_into().unwrap());
            let pdu = match pdu_kind {
                kind::SERIAL_NOTIFY => Pdu::SerialNotify { serial },
                kind::SERIAL_QUERY => Pdu::SerialQuery { serial },
                kind::END_OF_DATA => Pdu::EndOfData { serial },
                _ => unreachable!(),
            };
            Ok(Some((need, pdu)))
        }
        kind::RESET_QUERY | kind::CACHE_RESPONSE | kind::CACHE_RESET => {
            let need = HEADER_LEN + 2;
            if buf.len() < need {
                return Ok(None);
            }
            let reserved = u16::from_be_bytes([buf[2], buf[3]]);
            if reserved != 0 {
                return Err(WireError::ReservedNonZero(reserved));
            }
            let pdu = match pdu_kind {
                kind::RESET_QUERY => Pdu::ResetQuery,
                kind::CACHE_RESPONSE => Pdu::CacheResponse,
                kind::CACHE_RESET => Pdu::CacheReset,
                _ => unreachable!(),
            };
            Ok(Some((need, pdu)))
        }
        kind::IPV4_PREFIX | kind::IPV6_PREFIX => {
            let addr_len = if pdu_kind == kind::IPV4_PREFIX { 4 } else { 16 };
            let need = HEADER_LEN + 6 + addr_len + 4;
            if buf.len() < need {
                return Ok(None);
            }
            let color = u16::from_be_bytes([buf[2], buf[3]]);
            let announce = buf[4] != 0;
            let prefixlen = buf[5];
            let max_prefixlen = buf[6];
            // buf[7] is `source`, always 0 on the wire; not validated, only preserved.
            let addr_start = 8;
            let asn_start = addr_start + addr_len;
            let addr = if addr_len == 4 {
                AddressValue::from_v4_bytes(buf[addr_start..asn_start].try_into().unwrap())
            } else {
                AddressValue::from_v6_bytes(buf[addr_start..asn_start].try_into().unwrap())
            };
            let asn = u32::from_be_bytes(buf[asn_start..asn_start + 4].try_into().unwrap());
            let record = PrefixRecord { color, announce, prefixlen, max_prefixlen, addr, asn };
            record.check()?;
            Ok(Some((need, Pdu::Prefix(record))))
        }
        kind::ERROR_REPORT => {
            let fixed_need = HEADER_LEN + 2 + 2 + 2;
            if buf.len() < fixed_need {
                return Ok(None);
            }
            let report_errno = u16::from_be_bytes([buf[2], buf[3]]);
            let pdu_len = u16::from_be_bytes([buf[4], buf[5]]) as usize;
            let msg_len = u16::from_be_bytes([buf[6], buf[7]]) as usize;
            let need = fixed_need + pdu_len + msg_len;
            if buf.len() < need {
                return Ok(None);
            }
            let erroneous_pdu = buf[fixed_need..fixed_need + pdu_len].to_vec();
            let message =
                std::str::from_utf8(&buf[fixed_need + pdu_len..need])?.to_string();
            Ok(Some((need, Pdu::ErrorReport { errno: report_errno, erroneous_pdu, message })))
        }
        other => Err(WireError::UnknownKind(other)),
    }
}

/// Incremental decoder fed arbitrary byte chunks from a stream.
#[derive(Debug, Default)]
pub struct Decoder {
    buf: BytesMut,
}

impl Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append newly arrived bytes.
    pub fn feed(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Yield the next complete PDU, if one is ready.
    ///
    /// Must be called repeatedly after each `feed` until it returns
    /// `Ok(None)`: more than one PDU may have arrived in a single read.
    pub fn poll(&mut self) -> Result<Option<Pdu>, WireError> {
        match decode_one(&self.buf) {
            Ok(Some((consumed, pdu))) => {
                self.buf.advance(consumed);
                Ok(Some(pdu))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::address::{Afi, AddressValue};

    fn sample_v4_prefix() -> Pdu {
        Pdu::Prefix(PrefixRecord {
            color: 0,
            announce: true,
            prefixlen: 24,
            max_prefixlen: 24,
            addr: AddressValue::V4([192, 0, 2, 0]),
            asn: 65001,
        })
    }

    #[test]
    fn encodes_the_literal_scenario_from_the_protocol_description() {
        let bytes = encode(&sample_v4_prefix());
        assert_eq!(
            bytes,
            vec![0x00, 0x04, 0x00, 0x00, 0x01, 0x18, 0x18, 0x00, 0xC0, 0x00, 0x02, 0x00, 0x00, 0x00, 0xFD, 0xE9]
        );
    }

    #[test]
    fn round_trips_every_kind() {
        let pdus = vec![
            Pdu::SerialNotify { serial: 7 },
            Pdu::SerialQuery { serial: 7 },
            Pdu::ResetQuery,
            Pdu::CacheResponse,
            sample_v4_prefix(),
            Pdu::Prefix(PrefixRecord {
                color: 9,
                announce: false,
                prefixlen: 48,
                max_prefixlen: 64,
                addr: AddressValue::V6([0x20, 0x01, 0x0d, 0xb8, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]),
                asn: 64512,
            }),
            Pdu::EndOfData { serial: 7 },
            Pdu::CacheReset,
            Pdu::ErrorReport { errno: 1, erroneous_pdu: vec![1, 2, 3], message: "boom".into() },
        ];
        for pdu in pdus {
            let bytes = encode(&pdu);
            let mut dec = Decoder::new();
            dec.feed(&bytes);
            let decoded = dec.poll().unwrap().unwrap();
            assert_eq!(decoded, pdu);
            assert!(dec.is_empty());
        }
    }

    #[test]
    fn framing_survives_arbitrary_chunking() {
        let pdus = vec![
            Pdu::ResetQuery,
            sample_v4_prefix(),
            Pdu::EndOfData { serial: 42 },
            Pdu::CacheReset,
        ];
        let mut all_bytes = Vec::new();
        for p in &pdus {
            all_bytes.extend(encode(p));
        }

        for chunk_size in [1usize, 2, 3, 5, 7, 16, 1024] {
            let mut dec = Decoder::new();
            let mut decoded = Vec::new();
            for chunk in all_bytes.chunks(chunk_size) {
                dec.feed(chunk);
                while let Some(pdu) = dec.poll().unwrap() {
                    decoded.push(pdu);
                }
            }
            assert_eq!(decoded, pdus, "chunk size {chunk_size}");
        }
    }

    #[test]
    fn partial_header_suspends_without_consuming() {
        let mut dec = Decoder::new();
        dec.feed(&[0x00]);
        assert_eq!(dec.poll().unwrap(), None);
        dec.feed(&[kind::RESET_QUERY, 0x00, 0x00]);
        assert_eq!(dec.poll().unwrap(), Some(Pdu::ResetQuery));
    }

    #[test]
    fn rejects_version_mismatch() {
        let mut dec = Decoder::new();
        dec.feed(&[1, kind::RESET_QUERY, 0, 0]);
        assert_eq!(dec.poll(), Err(WireError::VersionMismatch(1)));
    }

    #[test]
    fn rejects_unknown_kind() {
        let mut dec = Decoder::new();
        dec.feed(&[0, 200, 0, 0]);
        assert_eq!(dec.poll(), Err(WireError::UnknownKind(200)));
    }

    #[test]
    fn extra_bytes_remain_buffered() {
        let mut dec = Decoder::new();
        let mut bytes = encode(&Pdu::ResetQuery);
        bytes.extend_from_slice(&[0xAA]);
        dec.feed(&bytes);
        assert_eq!(dec.poll().unwrap(), Some(Pdu::ResetQuery));
        assert_eq!(dec.poll().unwrap(), None);
        assert!(!dec.is_empty());
    }
}
