use super::address::{Afi, AddressValue};

/// PDU kind tags, matching the wire table in the protocol description.
pub mod kind {
    pub const SERIAL_NOTIFY: u8 = 0;
    pub const SERIAL_QUERY: u8 = 1;
    pub const RESET_QUERY: u8 = 2;
    pub const CACHE_RESPONSE: u8 = 3;
    pub const IPV4_PREFIX: u8 = 4;
    pub const IPV6_PREFIX: u8 = 6;
    pub const END_OF_DATA: u8 = 7;
    pub const CACHE_RESET: u8 = 8;
    pub const ERROR_REPORT: u8 = 10;
}

/// `error-report` error codes.
pub mod errno {
    pub const INTERNAL_ERROR: u16 = 1;
    pub const NO_DATA_AVAILABLE: u16 = 2;
}

/// The only wire version this implementation understands.
pub const PROTOCOL_VERSION: u8 = 0;

/// A single authorized (origin-AS, address-prefix, max-length) record as it
/// travels on the wire, tagged with the announce/withdraw flag and the
/// request/response `color`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefixRecord {
    pub color: u16,
    pub announce: bool,
    pub prefixlen: u8,
    pub max_prefixlen: u8,
    pub addr: AddressValue,
    pub asn: u32,
}

impl PrefixRecord {
    /// `source` is always 0 (derived from RPKI); the field is preserved on
    /// the wire but never meaningfully varies in this implementation.
    pub const SOURCE: u8 = 0;

    pub fn afi(&self) -> Afi {
        self.addr.afi()
    }

    /// `prefixlen ≤ max_prefixlen ≤ family_bits`.
    pub fn check(&self) -> Result<(), crate::error::WireError> {
        if self.prefixlen > self.max_prefixlen {
            return Err(crate::error::WireError::PrefixLenOutOfRange {
                prefixlen: self.prefixlen,
                max_prefixlen: self.max_prefixlen,
            });
        }
        let family_bits = self.afi().family_bits();
        if self.max_prefixlen > family_bits {
            return Err(crate::error::WireError::MaxLenOutOfRange {
                max_prefixlen: self.max_prefixlen,
                family_bits,
            });
        }
        Ok(())
    }
}

/// A tagged union over the PDU kinds understood by wire version 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pdu {
    SerialNotify { serial: u32 },
    SerialQuery { serial: u32 },
    ResetQuery,
    CacheResponse,
    Prefix(PrefixRecord),
    EndOfData { serial: u32 },
    CacheReset,
    ErrorReport {
        errno: u16,
        erroneous_pdu: Vec<u8>,
        message: String,
    },
}

impl Pdu {
    pub fn kind(&self) -> u8 {
        match self {
            Pdu::SerialNotify { .. } => kind::SERIAL_NOTIFY,
            Pdu::SerialQuery { .. } => kind::SERIAL_QUERY,
            Pdu::ResetQuery => kind::RESET_QUERY,
            Pdu::CacheResponse => kind::CACHE_RESPONSE,
            Pdu::Prefix(p) => match p.afi() {
                Afi::Ipv4 => kind::IPV4_PREFIX,
                Afi::Ipv6 => kind::IPV6_PREFIX,
            },
            Pdu::EndOfData { .. } => kind::END_OF_DATA,
            Pdu::CacheReset => kind::CACHE_RESET,
            Pdu::ErrorReport { .. } => kind::ERROR_REPORT,
        }
    }
}
