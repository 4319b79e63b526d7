use crate::error::WireError;
use crate::wire::{Decoder, Pdu, PrefixRecord};

use super::Serial;

/// A canonical AXFR: an ordered, deduplicated set of advertise-only prefix
/// records tagged with a monotone serial.
///
/// Two canonical sets built from the same multiset of input records
/// produce the same byte image regardless of input order
/// (`canonicalize` is idempotent).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefixSet {
    pub serial: Serial,
    records: Vec<PrefixRecord>,
}

impl PrefixSet {
    /// Sort by the records' on-wire byte order and collapse adjacent
    /// equals. Address host bits are masked before comparison, so two
    /// records differing only in bits below `prefixlen` collapse together
    /// (see the dedup note on masked host bits).
    pub fn canonicalize(serial: Serial, records: Vec<PrefixRecord>) -> Self {
        let mut records: Vec<PrefixRecord> = records
            .into_iter()
            .map(|mut r| {
                r.announce = true;
                r.addr = r.addr.masked(r.prefixlen);
                r
            })
            .collect();
        records.sort_by(|a, b| a.wire_bytes().cmp(&b.wire_bytes()));
        records.dedup_by(|a, b| a.wire_bytes() == b.wire_bytes());
        PrefixSet { serial, records }
    }

    pub fn records(&self) -> &[PrefixRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The concatenation of each record's wire bytes, replayable through
    /// [`crate::wire::Decoder`].
    pub fn to_wire_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for r in &self.records {
            out.extend(r.wire_bytes());
        }
        out
    }

    /// Parse a buffer of concatenated prefix PDUs, as found in a `.ax`
    /// snapshot file. Every PDU must be a prefix PDU; anything else is a
    /// store-level corruption.
    pub fn from_wire_bytes(serial: Serial, bytes: &[u8]) -> Result<Self, WireError> {
        let mut decoder = Decoder::new();
        decoder.feed(bytes);
        let mut records = Vec::new();
        while let Some(pdu) = decoder.poll()? {
            match pdu {
                Pdu::Prefix(p) => records.push(p),
                other => {
                    return Err(WireError::UnknownKind(other.kind()));
                }
            }
        }
        Ok(PrefixSet { serial, records })
    }
}

impl PrefixRecord {
    /// This record's wire encoding, used as the canonical sort/dedup key.
    pub fn wire_bytes(&self) -> Vec<u8> {
        crate::wire::encode(&Pdu::Prefix(self.clone()))
    }
}
