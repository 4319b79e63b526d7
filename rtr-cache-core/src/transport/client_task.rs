use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::interval;
use tracing::info;

use crate::session::{ClientAction, ClientEvent, ClientSession, ClientState};
use crate::wire::{encode, Decoder};

/// Connect to `addr` and drive a [`ClientSession`] until the peer closes
/// the connection or sends a fatal error-report.
///
/// The poll timer is a plain `tokio::time::interval`, reset on every
/// successful response cycle (an `EndOfData`) so a chatty cache doesn't
/// also get hit by the idle poll a moment later.
pub async fn run_client(addr: SocketAddr, poll_interval: Duration) -> std::io::Result<ClientSession> {
    let mut stream = TcpStream::connect(addr).await?;
    let mut session = ClientSession::new();
    let mut decoder = Decoder::new();
    let mut poll_timer = interval(poll_interval);
    poll_timer.tick().await; // first tick fires immediately; consume it

    for action in session.handle(ClientEvent::Connected) {
        send(&mut stream, action).await?;
    }

    let mut read_buf = [0u8; 4096];
    loop {
        tokio::select! {
            read = stream.read(&mut read_buf) => {
                let n = read?;
                if n == 0 {
                    info!("cache closed the connection");
                    return Ok(session);
                }
                decoder.feed(&read_buf[..n]);
                while let Some(pdu) = decoder.poll().map_err(std::io::Error::other)? {
                    let was_await = session.state() == ClientState::AwaitResponse;
                    for action in session.handle(ClientEvent::Pdu(pdu)) {
                        if matches!(action, ClientAction::Disconnect) {
                            return Ok(session);
                        }
                        send(&mut stream, action).await?;
                    }
                    if was_await && session.state() == ClientState::Idle {
                        poll_timer.reset();
                    }
                }
            }
            _ = poll_timer.tick() => {
                for action in session.handle(ClientEvent::TimerFired) {
                    send(&mut stream, action).await?;
                }
            }
        }
    }
}

async fn send(stream: &mut TcpStream, action: ClientAction) -> std::io::Result<()> {
    match action {
        ClientAction::SendPdu(pdu) => stream.write_all(&encode(&pdu)).await,
        ClientAction::Disconnect => stream.shutdown().await,
    }
}
