use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::StoreError;
use crate::prefixset::{Delta, PrefixSet, Serial};

/// Filesystem-backed repository of AXFR snapshots (`<serial>.ax`), IXFR
/// deltas (`<to>.ix.<from>`), and the `current` pointer.
///
/// The producer is the sole writer; servers are read-only consumers. The
/// only synchronization primitive is the atomic rename on `current` —
/// callers must re-open it on every poll rather than caching a handle
/// (see [`Store::current_serial`]).
#[derive(Debug, Clone)]
pub struct Store {
    dir: PathBuf,
}

fn io_err(path: &Path, source: std::io::Error) -> StoreError {
    StoreError::Io { path: path.to_path_buf(), source }
}

impl Store {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Store { dir: dir.into() }
    }

    pub fn ensure_dir(&self) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir).map_err(|e| io_err(&self.dir, e))
    }

    fn current_path(&self) -> PathBuf {
        self.dir.join("current")
    }

    fn snapshot_path(&self, serial: Serial) -> PathBuf {
        self.dir.join(format!("{serial}.ax"))
    }

    /// The on-disk path for `serial`'s snapshot, exposed for error
    /// messages that need to name a file this `Store` doesn't otherwise
    /// return a handle to.
    pub fn snapshot_display_path(&self, serial: Serial) -> PathBuf {
        self.snapshot_path(serial)
    }

    fn delta_path(&self, to: Serial, from: Serial) -> PathBuf {
        self.dir.join(format!("{to}.ix.{from}"))
    }

    /// The serial of the latest published AXFR, or `None` if `current` is
    /// absent or its contents can't be parsed — callers must treat both
    /// as "no data available yet", never as a crash.
    pub fn current_serial(&self) -> Option<Serial> {
        fs::read_to_string(self.current_path())
            .ok()
            .and_then(|s| s.trim().parse().ok())
    }

    /// Write `<serial>.ax` as the concatenation of each record's wire
    /// bytes.
    pub fn write_snapshot(&self, set: &PrefixSet) -> Result<(), StoreError> {
        let path = self.snapshot_path(set.serial);
        fs::write(&path, set.to_wire_bytes()).map_err(|e| io_err(&path, e))
    }

    pub fn write_delta(&self, delta: &Delta) -> Result<(), StoreError> {
        let path = self.delta_path(delta.to_serial, delta.from_serial);
        fs::write(&path, delta.to_wire_bytes()).map_err(|e| io_err(&path, e))
    }

    /// Atomically publish `serial` as current: write to a pid-scoped
    /// temporary file, then rename into place. A reader racing this call
    /// observes either the old or the new serial, never a partial write.
    pub fn publish_current(&self, serial: Serial) -> Result<(), StoreError> {
        let tmp = self.dir.join(format!("current.{}.tmp", std::process::id()));
        fs::write(&tmp, format!("{serial}\n")).map_err(|e| io_err(&tmp, e))?;
        fs::rename(&tmp, self.current_path()).map_err(|e| io_err(&tmp, e))
    }

    pub fn read_snapshot_bytes(&self, serial: Serial) -> Result<Vec<u8>, StoreError> {
        let path = self.snapshot_path(serial);
        fs::read(&path).map_err(|e| io_err(&path, e))
    }

    /// `None` when the delta file doesn't exist — the server's cue to
    /// fall back to `cache-reset` rather than an error.
    pub fn read_delta_bytes(&self, to: Serial, from: Serial) -> Option<Vec<u8>> {
        fs::read(self.delta_path(to, from)).ok()
    }

    pub fn has_delta(&self, to: Serial, from: Serial) -> bool {
        self.delta_path(to, from).is_file()
    }

    /// All snapshot serials currently on disk, ascending.
    pub fn list_snapshot_serials(&self) -> Result<Vec<Serial>, StoreError> {
        let mut serials = Vec::new();
        for entry in fs::read_dir(&self.dir).map_err(|e| io_err(&self.dir, e))? {
            let entry = entry.map_err(|e| io_err(&self.dir, e))?;
            if let Some(name) = entry.file_name().to_str() {
                if let Some(serial_str) = name.strip_suffix(".ax") {
                    if let Ok(serial) = serial_str.parse() {
                        serials.push(serial);
                    }
                }
            }
        }
        serials.sort_unstable();
        Ok(serials)
    }

    /// All delta files currently on disk, as `(path, to, from)`.
    pub fn list_delta_files(&self) -> Result<Vec<(PathBuf, Serial, Serial)>, StoreError> {
        let mut deltas = Vec::new();
        for entry in fs::read_dir(&self.dir).map_err(|e| io_err(&self.dir, e))? {
            let entry = entry.map_err(|e| io_err(&self.dir, e))?;
            if let Some(name) = entry.file_name().to_str() {
                if let Some((to_str, from_str)) = name.split_once(".ix.") {
                    if let (Ok(to), Ok(from)) = (to_str.parse(), from_str.parse()) {
                        deltas.push((entry.path(), to, from));
                    }
                }
            }
        }
        Ok(deltas)
    }

    pub fn delete_snapshot(&self, serial: Serial) -> Result<(), StoreError> {
        let path = self.snapshot_path(serial);
        debug!(serial, ?path, "deleting stale snapshot");
        fs::remove_file(&path).map_err(|e| io_err(&path, e))
    }

    pub fn delete_path(&self, path: &Path) -> Result<(), StoreError> {
        debug!(?path, "deleting stale delta");
        fs::remove_file(path).map_err(|e| io_err(path, e))
    }
}
