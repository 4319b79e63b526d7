use crate::wire::PrefixRecord;

use super::PrefixSet;

/// An IXFR: the sorted-merge difference between two AXFRs. Withdraw
/// records (`announce = false`) are present only in `from`; advertise
/// records are present only in `to`. Records in both are omitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delta {
    pub from_serial: u32,
    pub to_serial: u32,
    records: Vec<PrefixRecord>,
}

impl Delta {
    pub fn records(&self) -> &[PrefixRecord] {
        &self.records
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn to_wire_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for r in &self.records {
            out.extend(r.wire_bytes());
        }
        out
    }
}

/// Classic two-pointer merge over two already-sorted AXFRs: entries equal
/// in both are skipped, entries only in `from` become withdraws, entries
/// only in `to` become advertises, and whichever side has records left
/// once the other is exhausted is drained in full.
pub fn diff(from: &PrefixSet, to: &PrefixSet) -> Delta {
    let old = from.records();
    let new = to.records();
    let mut records = Vec::new();
    let (mut i, mut j) = (0, 0);

    while i < old.len() && j < new.len() {
        let old_key = old[i].wire_bytes();
        let new_key = new[j].wire_bytes();
        match old_key.cmp(&new_key) {
            std::cmp::Ordering::Equal => {
                i += 1;
                j += 1;
            }
            std::cmp::Ordering::Less => {
                let mut withdraw = old[i].clone();
                withdraw.announce = false;
                records.push(withdraw);
                i += 1;
            }
            std::cmp::Ordering::Greater => {
                records.push(new[j].clone());
                j += 1;
            }
        }
    }
    while i < old.len() {
        let mut withdraw = old[i].clone();
        withdraw.announce = false;
        records.push(withdraw);
        i += 1;
    }
    while j < new.len() {
        records.push(new[j].clone());
        j += 1;
    }

    Delta { from_serial: from.serial, to_serial: to.serial, records }
}

/// Apply a delta to a copy of `base`'s records: add announces, remove
/// withdraws. Used by tests to check the delta law, and by the client
/// session to maintain its local database.
pub fn apply(base: &[PrefixRecord], delta: &Delta) -> Vec<PrefixRecord> {
    let mut out = base.to_vec();
    for r in &delta.records {
        apply_one(&mut out, r);
    }
    out
}

/// Apply a single announce/withdraw record to `records` in place, keyed
/// on the advertised form of its wire bytes so announce/withdraw pairs
/// for the same prefix always match regardless of which flag they carry.
pub fn apply_one(records: &mut Vec<PrefixRecord>, r: &PrefixRecord) {
    let key = {
        let mut advertised = r.clone();
        advertised.announce = true;
        advertised.wire_bytes()
    };
    if r.announce {
        let already_present = records.iter().any(|existing| {
            let mut e = existing.clone();
            e.announce = true;
            e.wire_bytes() == key
        });
        if !already_present {
            records.push(r.clone());
        }
    } else {
        records.retain(|existing| {
            let mut e = existing.clone();
            e.announce = true;
            e.wire_bytes() != key
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::AddressValue;

    fn rec(asn: u32, addr: [u8; 4], prefixlen: u8) -> PrefixRecord {
        PrefixRecord {
            color: 0,
            announce: true,
            prefixlen,
            max_prefixlen: prefixlen,
            addr: AddressValue::V4(addr),
            asn,
        }
    }

    #[test]
    fn empty_delta_for_identical_sets() {
        let a = PrefixSet::canonicalize(1, vec![rec(1, [1, 0, 0, 0], 8)]);
        let b = PrefixSet::canonicalize(2, vec![rec(1, [1, 0, 0, 0], 8)]);
        let delta = diff(&a, &b);
        assert!(delta.is_empty());
    }

    #[test]
    fn withdraws_and_advertises() {
        let a = PrefixSet::canonicalize(1, vec![rec(1, [1, 0, 0, 0], 8), rec(2, [2, 0, 0, 0], 8)]);
        let b = PrefixSet::canonicalize(2, vec![rec(2, [2, 0, 0, 0], 8), rec(3, [3, 0, 0, 0], 8)]);
        let delta = diff(&a, &b);
        assert_eq!(delta.records().len(), 2);
        assert!(delta.records().iter().any(|r| r.asn == 1 && !r.announce));
        assert!(delta.records().iter().any(|r| r.asn == 3 && r.announce));
    }

    #[test]
    fn delta_law_holds_for_random_like_sets() {
        let a = PrefixSet::canonicalize(
            1,
            vec![rec(1, [1, 0, 0, 0], 8), rec(2, [2, 0, 0, 0], 8), rec(3, [3, 0, 0, 0], 8)],
        );
        let b = PrefixSet::canonicalize(
            2,
            vec![rec(2, [2, 0, 0, 0], 8), rec(4, [4, 0, 0, 0], 8), rec(5, [5, 0, 0, 0], 16)],
        );
        let delta = diff(&a, &b);
        let applied = apply(a.records(), &delta);

        let mut applied_keys: Vec<_> = applied.iter().map(|r| r.wire_bytes()).collect();
        let mut expected_keys: Vec<_> = b.records().iter().map(|r| r.wire_bytes()).collect();
        applied_keys.sort();
        expected_keys.sort();
        assert_eq!(applied_keys, expected_keys);
    }
}
