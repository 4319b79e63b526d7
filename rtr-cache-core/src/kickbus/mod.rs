//! Local notification channel used to wake server sessions the moment a
//! producer run publishes a new `current` serial, instead of waiting for
//! the next poll tick.
//!
//! Each server process listens on one endpoint at `<kickme_dir>/<pid>.sock`
//! (mode `0660`); the producer discovers every endpoint in `kickme_dir` and
//! sends a single empty datagram to each, best-effort. A send failing for
//! one endpoint never stops the broadcast to the others.

use std::fs;
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use tokio::net::UnixDatagram;
use tracing::{debug, warn};

const SOCKET_MODE: u32 = 0o660;

/// A server's receiving half of the kick bus.
pub struct KickEndpoint {
    socket: UnixDatagram,
    path: PathBuf,
}

impl KickEndpoint {
    /// Bind `<kickme_dir>/<pid>.sock`, unlinking a stale socket left behind
    /// by a previous run with the same pid first.
    pub fn bind(kickme_dir: &Path) -> io::Result<Self> {
        fs::create_dir_all(kickme_dir)?;
        let path = kickme_dir.join(format!("{}.sock", std::process::id()));
        if path.exists() {
            fs::remove_file(&path)?;
        }
        let socket = UnixDatagram::bind(&path)?;
        fs::set_permissions(&path, fs::Permissions::from_mode(SOCKET_MODE))?;
        Ok(KickEndpoint { socket, path })
    }

    /// Resolve once a kick datagram arrives. The payload is never
    /// inspected — receipt alone is the signal.
    pub async fn recv(&self) -> io::Result<()> {
        let mut buf = [0u8; 1];
        self.socket.recv(&mut buf).await?;
        Ok(())
    }
}

impl Drop for KickEndpoint {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            if e.kind() != io::ErrorKind::NotFound {
                warn!(path = ?self.path, error = %e, "failed to unlink kick-bus endpoint");
            }
        }
    }
}

/// Broadcast one empty datagram to every `*.sock` endpoint under
/// `kickme_dir`. Unreachable endpoints (a server that crashed without
/// cleaning up its socket file) are logged and skipped.
pub async fn broadcast(kickme_dir: &Path) -> io::Result<usize> {
    let sender = UnixDatagram::unbound()?;
    let mut delivered = 0;
    let entries = match fs::read_dir(kickme_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e),
    };
    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "sock") {
            match sender.send_to(&[0u8], &path).await {
                Ok(_) => delivered += 1,
                Err(e) => warn!(?path, error = %e, "failed to kick endpoint"),
            }
        }
    }
    debug!(delivered, ?kickme_dir, "kick broadcast complete");
    Ok(delivered)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bind_then_broadcast_delivers_one_datagram() {
        let dir = tempfile::tempdir().unwrap();
        let endpoint = KickEndpoint::bind(dir.path()).unwrap();

        let delivered = broadcast(dir.path()).await.unwrap();
        assert_eq!(delivered, 1);

        endpoint.recv().await.unwrap();
    }

    #[tokio::test]
    async fn broadcast_against_missing_dir_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("does-not-exist");
        assert_eq!(broadcast(&missing).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn bind_unlinks_a_stale_socket_with_the_same_pid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(format!("{}.sock", std::process::id()));
        fs::write(&path, b"stale, not actually a socket").unwrap();

        let _endpoint = KickEndpoint::bind(dir.path()).unwrap();
        assert!(path.exists());
    }

    #[tokio::test]
    async fn drop_unlinks_the_endpoint() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(format!("{}.sock", std::process::id()));
        {
            let _endpoint = KickEndpoint::bind(dir.path()).unwrap();
            assert!(path.exists());
        }
        assert!(!path.exists());
    }
}
