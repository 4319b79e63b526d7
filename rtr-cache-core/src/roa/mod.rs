mod structural;

pub use structural::StructuralRoaDecoder;

use crate::error::RoaError;
use crate::wire::{Afi, AddressValue, PrefixRecord};

/// One `(bitstring, maxlen)` pair from a ROA's `ipAddrBlocks`, before it is
/// turned into a prefix record: `bitstring` is the BIT STRING content
/// exactly as the ROA encodes it (high-order bits first, not yet
/// left-justified into a fixed-width address).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoaPrefix {
    pub bitstring: Vec<u8>,
    pub prefixlen: u8,
    pub max_prefixlen: Option<u8>,
}

/// The structural content of a validated ROA, in the same shape an
/// external cryptographic validator would hand back:
/// `(version, asID, [(addressFamily, [(bitstring, maxlen)])])`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedRoa {
    pub version: u8,
    pub asn: u32,
    pub afi_addrs: Vec<(Afi, Vec<RoaPrefix>)>,
}

/// The boundary between this crate and ROA/X.509 parsing, which is
/// deliberately kept out of the core: a `RoaDecoder` is handed bytes
/// already validated by an upstream cryptographic validator and returns
/// their structural content, performing no signature checks of its own.
///
/// Production deployments may supply their own implementation (backed by
/// whatever validator produced the tree of `.roa` files); this crate
/// ships [`StructuralRoaDecoder`] as a working default.
pub trait RoaDecoder {
    fn decode(&self, der: &[u8]) -> Result<DecodedRoa, RoaError>;
}

/// Expand one decoded ROA into the prefix records it authorizes: one
/// record per `(AFI, bitstring, maxlen)` triple, `prefixlen` taken from
/// the bitstring's own length, `max_prefixlen` defaulting to `prefixlen`
/// when the ROA left it unset, `announce = 1`, `color = 0`.
pub fn roa_to_records(roa: &DecodedRoa) -> Vec<PrefixRecord> {
    let mut out = Vec::new();
    for (afi, prefixes) in &roa.afi_addrs {
        for p in prefixes {
            let addr = AddressValue::from_left_justified(*afi, &p.bitstring, p.prefixlen);
            out.push(PrefixRecord {
                color: 0,
                announce: true,
                prefixlen: p.prefixlen,
                max_prefixlen: p.max_prefixlen.unwrap_or(p.prefixlen),
                addr,
                asn: roa.asn,
            });
        }
    }
    out
}

#[cfg(test)]
mod record_tests {
    use super::*;

    #[test]
    fn defaults_max_prefixlen_to_prefixlen() {
        let roa = DecodedRoa {
            version: 0,
            asn: 65001,
            afi_addrs: vec![(
                Afi::Ipv4,
                vec![RoaPrefix { bitstring: vec![192, 0, 2], prefixlen: 24, max_prefixlen: None }],
            )],
        };
        let records = roa_to_records(&roa);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].max_prefixlen, 24);
        assert_eq!(records[0].addr, AddressValue::V4([192, 0, 2, 0]));
    }
}
