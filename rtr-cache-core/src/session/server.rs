use crate::error::WireError;
use crate::prefixset::Serial;
use crate::store::Store;
use crate::wire::{encode, internal_error, no_data_available, Pdu};

/// The server session only ever has one observable state: it answers
/// queries and pushes notifies from `IDLE`, synchronously, before
/// returning to `IDLE`. `TERMINAL` is reached once the peer closes the
/// transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Idle,
    Terminal,
}

/// Everything that can happen to a server session.
#[derive(Debug, Clone)]
pub enum ServerEvent {
    Pdu(Pdu),
    /// A decode error from the peer's byte stream — not a structurally
    /// valid PDU, so there's no `Pdu` to wrap. Carries the raw bytes that
    /// failed to parse (capped by the transport) for the error report.
    DecodeError { error: WireError, offending: Vec<u8> },
    /// The local kick-bus endpoint woke the session up.
    Kick,
    PeerClosed,
}

/// What the transport adapter should do in response to an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerAction {
    SendPdu(Pdu),
    /// Raw, already-encoded bytes — a stored snapshot or delta file's
    /// contents, streamed verbatim rather than re-encoded.
    SendBytes(Vec<u8>),
    Close,
}

/// Per-router session state machine (protocol description §4.5).
///
/// Reads are synchronous filesystem calls through [`Store`]; the session
/// has no transport awareness of its own — see `transport::server_task`
/// for the `tokio` adapter that drives this from a real connection.
pub struct ServerSession<'s> {
    store: &'s Store,
    state: ServerState,
    last_known_current: Option<Serial>,
}

impl<'s> ServerSession<'s> {
    pub fn new(store: &'s Store) -> Self {
        let last_known_current = store.current_serial();
        ServerSession { store, state: ServerState::Idle, last_known_current }
    }

    pub fn state(&self) -> ServerState {
        self.state
    }

    pub fn handle(&mut self, event: ServerEvent) -> Vec<ServerAction> {
        if self.state == ServerState::Terminal {
            return Vec::new();
        }
        match event {
            ServerEvent::Pdu(Pdu::SerialQuery { serial }) => self.on_serial_query(serial),
            ServerEvent::Pdu(Pdu::ResetQuery) => self.on_reset_query(),
            ServerEvent::Pdu(other) => {
                // Routers never legitimately send anything else; treat it
                // the same as a decode error rather than special-casing
                // every illegal-but-well-formed PDU.
                let offending = encode(&other);
                vec![ServerAction::SendPdu(internal_error(
                    &offending,
                    format!("unexpected PDU kind {} from router", other.kind()),
                ))]
            }
            ServerEvent::DecodeError { error, offending } => {
                self.state = ServerState::Terminal;
                vec![
                    ServerAction::SendPdu(internal_error(&offending, error.to_string())),
                    ServerAction::Close,
                ]
            }
            ServerEvent::Kick => self.on_kick(),
            ServerEvent::PeerClosed => {
                self.state = ServerState::Terminal;
                vec![ServerAction::Close]
            }
        }
    }

    fn on_serial_query(&mut self, requested: Serial) -> Vec<ServerAction> {
        let triggering = encode(&Pdu::SerialQuery { serial: requested });
        let Some(current) = self.store.current_serial() else {
            return vec![ServerAction::SendPdu(no_data_available(&triggering))];
        };
        if requested == current {
            return vec![
                ServerAction::SendPdu(Pdu::CacheResponse),
                ServerAction::SendPdu(Pdu::EndOfData { serial: current }),
            ];
        }
        if let Some(bytes) = self.store.read_delta_bytes(current, requested) {
            vec![
                ServerAction::SendPdu(Pdu::CacheResponse),
                ServerAction::SendBytes(bytes),
                ServerAction::SendPdu(Pdu::EndOfData { serial: current }),
            ]
        } else {
            vec![ServerAction::SendPdu(Pdu::CacheReset)]
        }
    }

    fn on_reset_query(&mut self) -> Vec<ServerAction> {
        let triggering = encode(&Pdu::ResetQuery);
        let Some(current) = self.store.current_serial() else {
            return vec![ServerAction::SendPdu(no_data_available(&triggering))];
        };
        match self.store.read_snapshot_bytes(current) {
            Ok(bytes) => vec![
                ServerAction::SendPdu(Pdu::CacheResponse),
                ServerAction::SendBytes(bytes),
                ServerAction::SendPdu(Pdu::EndOfData { serial: current }),
            ],
            Err(e) => vec![ServerAction::SendPdu(internal_error(
                &triggering,
                format!("snapshot for serial {current} is unreadable: {e}"),
            ))],
        }
    }

    fn on_kick(&mut self) -> Vec<ServerAction> {
        let current = self.store.current_serial();
        if current == self.last_known_current {
            return Vec::new();
        }
        self.last_known_current = current;
        match current {
            Some(serial) => vec![ServerAction::SendPdu(Pdu::SerialNotify { serial })],
            None => Vec::new(),
        }
    }
}
