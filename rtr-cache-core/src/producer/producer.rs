use std::fs;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::error::ProducerError;
use crate::prefixset::{diff, PrefixSet, Serial};
use crate::roa::{roa_to_records, RoaDecoder};
use crate::store::Store;

/// How long a snapshot survives before the next producer run deletes it.
/// Expressed in the same units as the serial (seconds), since serials are
/// UNIX timestamps.
#[derive(Debug, Clone, Copy)]
pub struct RetentionPolicy {
    pub window_seconds: u32,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        RetentionPolicy { window_seconds: 24 * 60 * 60 }
    }
}

/// What a producer run actually did, so the binary can log and choose an
/// exit code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProducerOutcome {
    /// The validator tree held no ROAs; `current` was left untouched.
    Empty,
    Published { serial: Serial, record_count: usize, snapshots_retained: usize },
}

fn walk_roa_files(root: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
            } else if path.extension().is_some_and(|ext| ext == "roa") {
                out.push(path);
            }
        }
    }
    Ok(out)
}

/// Run one producer cycle: traverse `validator_tree` for `*.roa` files,
/// decode each with `decoder`, build the new AXFR, write it alongside
/// deltas against every surviving prior snapshot, publish `current`, and
/// perform retention cleanup.
///
/// `serial` is the caller-supplied UNIX timestamp for the new snapshot —
/// kept as a parameter rather than read from the clock so this function
/// stays a pure, deterministically testable transformation of the
/// filesystem.
pub fn run_once(
    validator_tree: &Path,
    store: &Store,
    decoder: &dyn RoaDecoder,
    retention: RetentionPolicy,
    serial: Serial,
) -> Result<ProducerOutcome, ProducerError> {
    if !validator_tree.is_dir() {
        return Err(ProducerError::MissingTree(validator_tree.to_path_buf()));
    }

    let roa_paths = walk_roa_files(validator_tree)?;
    let mut records = Vec::new();
    for path in &roa_paths {
        let bytes = match fs::read(path) {
            Ok(b) => b,
            Err(e) => {
                warn!(?path, error = %e, "failed to read ROA file, skipping");
                continue;
            }
        };
        match decoder.decode(&bytes) {
            Ok(decoded) => records.extend(roa_to_records(&decoded)),
            Err(e) => warn!(?path, error = %e, "failed to decode ROA, skipping"),
        }
    }

    if records.is_empty() {
        return Ok(ProducerOutcome::Empty);
    }

    store.ensure_dir()?;

    // Mark existing deltas for deletion once the new snapshot is live.
    let stale_deltas = store.list_delta_files()?;

    // Snapshots older than the retention window are removed; what's left
    // gets a fresh delta against the new snapshot.
    let cutoff = serial.saturating_sub(retention.window_seconds);
    let mut surviving_serials = Vec::new();
    for old_serial in store.list_snapshot_serials()? {
        if old_serial < cutoff {
            store.delete_snapshot(old_serial)?;
        } else {
            surviving_serials.push(old_serial);
        }
    }

    let new_set = PrefixSet::canonicalize(serial, records);
    store.write_snapshot(&new_set)?;

    for old_serial in &surviving_serials {
        let old_bytes = store.read_snapshot_bytes(*old_serial)?;
        let old_set = PrefixSet::from_wire_bytes(*old_serial, &old_bytes).map_err(|e| {
            crate::error::StoreError::Wire { path: store.snapshot_display_path(*old_serial), source: e }
        })?;
        let delta = diff(&old_set, &new_set);
        store.write_delta(&delta)?;
    }

    // Current is rewritten last so readers never observe a serial whose
    // snapshot is missing.
    store.publish_current(serial)?;

    for (path, _, _) in stale_deltas {
        store.delete_path(&path)?;
    }

    Ok(ProducerOutcome::Published {
        serial,
        record_count: new_set.len(),
        snapshots_retained: surviving_serials.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roa::StructuralRoaDecoder;
    use std::fs;

    fn write_sample_roa(path: &Path) {
        // AS 65001, 192.0.2.0/24, maxlen 24 — same structure exercised in
        // `roa::structural`'s tests.
        let address = vec![0x03, 4, 0x00, 192, 0, 2];
        let max_length = vec![0x02, 1, 24];
        let mut roa_ip_address = vec![0x30, (address.len() + max_length.len()) as u8];
        roa_ip_address.extend(address);
        roa_ip_address.extend(max_length);
        let mut addresses = vec![0x30, roa_ip_address.len() as u8];
        addresses.extend(roa_ip_address);
        let address_family = vec![0x04, 2, 0x00, 0x01];
        let mut family = vec![0x30, (address_family.len() + addresses.len()) as u8];
        family.extend(address_family);
        family.extend(addresses);
        let mut ip_addr_blocks = vec![0x30, family.len() as u8];
        ip_addr_blocks.extend(family);
        let as_id = vec![0x02, 3, 0x00, 0xFD, 0xE9];
        let mut content = as_id;
        content.extend(ip_addr_blocks);
        let mut der = vec![0x30, content.len() as u8];
        der.extend(content);
        fs::write(path, der).unwrap();
    }

    #[test]
    fn empty_tree_produces_no_snapshot_and_leaves_current_untouched() {
        let validator_dir = tempfile::tempdir().unwrap();
        let store_dir = tempfile::tempdir().unwrap();
        let store = Store::new(store_dir.path());
        store.ensure_dir().unwrap();
        store.publish_current(100).unwrap();

        let outcome = run_once(
            validator_dir.path(),
            &store,
            &StructuralRoaDecoder,
            RetentionPolicy::default(),
            200,
        )
        .unwrap();

        assert_eq!(outcome, ProducerOutcome::Empty);
        assert_eq!(store.current_serial(), Some(100));
    }

    #[test]
    fn missing_tree_is_an_error() {
        let store_dir = tempfile::tempdir().unwrap();
        let store = Store::new(store_dir.path());
        let err = run_once(
            Path::new("/nonexistent/validator/tree"),
            &store,
            &StructuralRoaDecoder,
            RetentionPolicy::default(),
            1,
        )
        .unwrap_err();
        assert!(matches!(err, ProducerError::MissingTree(_)));
    }

    #[test]
    fn single_roa_produces_the_literal_wire_bytes() {
        let validator_dir = tempfile::tempdir().unwrap();
        write_sample_roa(&validator_dir.path().join("one.roa"));
        let store_dir = tempfile::tempdir().unwrap();
        let store = Store::new(store_dir.path());

        let outcome = run_once(
            validator_dir.path(),
            &store,
            &StructuralRoaDecoder,
            RetentionPolicy::default(),
            1_700_000_000,
        )
        .unwrap();

        assert_eq!(
            outcome,
            ProducerOutcome::Published {
                serial: 1_700_000_000,
                record_count: 1,
                snapshots_retained: 0
            }
        );
        let bytes = store.read_snapshot_bytes(1_700_000_000).unwrap();
        assert_eq!(
            bytes,
            vec![0x00, 0x04, 0x00, 0x00, 0x01, 0x18, 0x18, 0x00, 0xC0, 0x00, 0x02, 0x00, 0x00, 0x00, 0xFD, 0xE9]
        );
        assert_eq!(store.current_serial(), Some(1_700_000_000));
    }

    #[test]
    fn second_run_writes_a_delta_against_the_first() {
        let validator_dir = tempfile::tempdir().unwrap();
        write_sample_roa(&validator_dir.path().join("one.roa"));
        let store_dir = tempfile::tempdir().unwrap();
        let store = Store::new(store_dir.path());

        run_once(validator_dir.path(), &store, &StructuralRoaDecoder, RetentionPolicy::default(), 1000).unwrap();

        write_sample_roa(&validator_dir.path().join("two.roa"));
        let outcome =
            run_once(validator_dir.path(), &store, &StructuralRoaDecoder, RetentionPolicy::default(), 2000)
                .unwrap();

        assert_eq!(
            outcome,
            ProducerOutcome::Published { serial: 2000, record_count: 1, snapshots_retained: 1 }
        );
        assert!(store.has_delta(2000, 1000));
    }

    #[test]
    fn retention_window_deletes_old_snapshots_and_their_deltas() {
        let validator_dir = tempfile::tempdir().unwrap();
        write_sample_roa(&validator_dir.path().join("one.roa"));
        let store_dir = tempfile::tempdir().unwrap();
        let store = Store::new(store_dir.path());
        let short_retention = RetentionPolicy { window_seconds: 10 };

        run_once(validator_dir.path(), &store, &StructuralRoaDecoder, short_retention, 1000).unwrap();
        run_once(validator_dir.path(), &store, &StructuralRoaDecoder, short_retention, 1020).unwrap();

        assert_eq!(store.list_snapshot_serials().unwrap(), vec![1020]);
        assert!(store.list_delta_files().unwrap().is_empty());
    }
}
