use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::kickbus::KickEndpoint;
use crate::session::{ServerAction, ServerEvent, ServerSession};
use crate::store::Store;
use crate::wire::{encode, Decoder};

/// Bound accept loop plus its background task, returned so a binary can
/// hold onto it and await a clean shutdown.
pub struct ServerHandle {
    task: JoinHandle<std::io::Result<()>>,
}

impl ServerHandle {
    pub async fn join(self) -> std::io::Result<()> {
        match self.task.await {
            Ok(result) => result,
            Err(e) => Err(std::io::Error::other(e)),
        }
    }
}

/// Bind `config.listen` and `config.kickme_dir`'s endpoint, then serve
/// router sessions until `shutdown` fires.
///
/// Grounded on the accept-loop shape of a `tokio::select!` between the
/// listener's accept future and a shutdown watch — the same structure
/// used to race connection acceptance against shutdown elsewhere in this
/// codebase, generalized here with a third arm for kick-bus wakeups.
pub async fn run_server(
    config: Arc<Config>,
    store: Arc<Store>,
    mut shutdown: watch::Receiver<bool>,
) -> std::io::Result<ServerHandle> {
    let listener = TcpListener::bind(config.listen).await?;
    let kick_endpoint = KickEndpoint::bind(&config.kickme_dir)?;
    let (kick_tx, kick_rx) = watch::channel(());
    let active = Arc::new(AtomicUsize::new(0));

    info!(listen = %config.listen, "rtr cache server listening");

    let task = tokio::spawn(async move {
        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(pair) => pair,
                        Err(e) => {
                            warn!(error = %e, "failed to accept connection");
                            continue;
                        }
                    };
                    active.fetch_add(1, Ordering::Relaxed);
                    info!(%peer, current = active.load(Ordering::Relaxed), "accepted router connection");
                    let store = store.clone();
                    let active = active.clone();
                    let kick_rx = kick_rx.clone();
                    tokio::spawn(async move {
                        if let Err(e) = serve_connection(stream, store.as_ref(), kick_rx).await {
                            warn!(%peer, error = %e, "session ended with error");
                        }
                        active.fetch_sub(1, Ordering::Relaxed);
                    });
                }
                Ok(()) = kick_endpoint.recv() => {
                    if kick_tx.send(()).is_err() {
                        debug!("kick received but no sessions are listening");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_ok() && *shutdown.borrow() {
                        info!("shutdown signal received, stopping accept loop");
                        break;
                    }
                }
            }
        }
        drop(kick_endpoint);
        Ok(())
    });

    Ok(ServerHandle { task })
}

async fn serve_connection(
    mut stream: TcpStream,
    store: &Store,
    mut kick_rx: watch::Receiver<()>,
) -> std::io::Result<()> {
    let mut session = ServerSession::new(store);
    let mut decoder = Decoder::new();
    let mut read_buf = [0u8; 4096];

    loop {
        tokio::select! {
            read = stream.read(&mut read_buf) => {
                let n = read?;
                if n == 0 {
                    dispatch(&mut session, &mut stream, ServerEvent::PeerClosed).await?;
                    return Ok(());
                }
                decoder.feed(&read_buf[..n]);
                loop {
                    match decoder.poll() {
                        Ok(Some(pdu)) => dispatch(&mut session, &mut stream, ServerEvent::Pdu(pdu)).await?,
                        Ok(None) => break,
                        Err(e) => {
                            let offending = read_buf[..n].to_vec();
                            dispatch(&mut session, &mut stream, ServerEvent::DecodeError { error: e, offending }).await?;
                            return Ok(());
                        }
                    }
                }
            }
            changed = kick_rx.changed() => {
                if changed.is_err() {
                    continue;
                }
                dispatch(&mut session, &mut stream, ServerEvent::Kick).await?;
            }
        }
    }
}

async fn dispatch(
    session: &mut ServerSession<'_>,
    stream: &mut TcpStream,
    event: ServerEvent,
) -> std::io::Result<()> {
    for action in session.handle(event) {
        match action {
            ServerAction::SendPdu(pdu) => stream.write_all(&encode(&pdu)).await?,
            ServerAction::SendBytes(bytes) => stream.write_all(&bytes).await?,
            ServerAction::Close => {
                stream.shutdown().await?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prefixset::PrefixSet;
    use crate::wire::{AddressValue, Pdu, PrefixRecord};
    use std::net::SocketAddr;
    use tokio::net::TcpStream as ClientTcpStream;

    fn rec() -> PrefixRecord {
        PrefixRecord {
            color: 0,
            announce: true,
            prefixlen: 24,
            max_prefixlen: 24,
            addr: AddressValue::V4([192, 0, 2, 0]),
            asn: 65001,
        }
    }

    #[tokio::test]
    async fn reset_query_over_a_real_socket_returns_the_snapshot() {
        let store_dir = tempfile::tempdir().unwrap();
        let store = Arc::new(Store::new(store_dir.path()));
        let set = PrefixSet::canonicalize(7, vec![rec()]);
        store.write_snapshot(&set).unwrap();
        store.publish_current(7).unwrap();

        let kickme_dir = tempfile::tempdir().unwrap();
        let config = Arc::new(Config {
            listen: "127.0.0.1:0".parse::<SocketAddr>().unwrap(),
            data_dir: store_dir.path().to_path_buf(),
            retention_days: 1,
            poll_interval_seconds: 600,
            kickme_dir: kickme_dir.path().to_path_buf(),
        });

        // bind on an ephemeral port, then discover it before starting the loop
        let listener = TcpListener::bind(config.listen).await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let config = Arc::new(Config { listen: addr, ..(*config).clone() });

        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = run_server(config, store, shutdown_rx).await.unwrap();

        let mut client = ClientTcpStream::connect(addr).await.unwrap();
        client.write_all(&encode(&Pdu::ResetQuery)).await.unwrap();

        let mut decoder = Decoder::new();
        let mut buf = [0u8; 4096];
        let mut pdus = Vec::new();
        while pdus.len() < 3 {
            let n = client.read(&mut buf).await.unwrap();
            decoder.feed(&buf[..n]);
            while let Some(pdu) = decoder.poll().unwrap() {
                pdus.push(pdu);
            }
        }

        assert_eq!(pdus[0], Pdu::CacheResponse);
        assert_eq!(pdus[1], Pdu::Prefix(rec()));
        assert_eq!(pdus[2], Pdu::EndOfData { serial: 7 });

        drop(client);
        handle.task.abort();
    }

    #[tokio::test]
    async fn version_mismatch_gets_an_error_report_then_the_connection_closes() {
        let store_dir = tempfile::tempdir().unwrap();
        let store = Arc::new(Store::new(store_dir.path()));

        let kickme_dir = tempfile::tempdir().unwrap();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let config = Arc::new(Config {
            listen: addr,
            data_dir: store_dir.path().to_path_buf(),
            retention_days: 1,
            poll_interval_seconds: 600,
            kickme_dir: kickme_dir.path().to_path_buf(),
        });

        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = run_server(config, store, shutdown_rx).await.unwrap();

        let mut client = ClientTcpStream::connect(addr).await.unwrap();
        // version 1, reset-query kind, zero reserved field: a well-formed
        // header with the wrong wire version.
        client.write_all(&[1, 2, 0, 0]).await.unwrap();

        let mut decoder = Decoder::new();
        let mut buf = [0u8; 4096];
        let mut pdus = Vec::new();
        loop {
            let n = client.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            decoder.feed(&buf[..n]);
            while let Some(pdu) = decoder.poll().unwrap() {
                pdus.push(pdu);
            }
        }

        assert_eq!(pdus.len(), 1);
        assert!(matches!(pdus[0], Pdu::ErrorReport { .. }));

        handle.task.abort();
    }
}
