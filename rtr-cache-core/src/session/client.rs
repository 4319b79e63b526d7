use crate::prefixset::{diff, Serial};
use crate::wire::{errno, Pdu, PrefixRecord};

/// Client-side protocol description states (§4.6). `Start` and
/// `AwaitResponse` correspond directly; `Idle` covers both "waiting on the
/// poll timer" and "waiting on a serial-notify" since both are handled the
/// same way. `Terminal` is reached on a fatal error-report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    Start,
    AwaitResponse,
    Idle,
    Terminal,
}

#[derive(Debug, Clone)]
pub enum ClientEvent {
    Connected,
    Pdu(Pdu),
    TimerFired,
}

/// A query the session wants sent, or a signal that it has given up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientAction {
    SendPdu(Pdu),
    Disconnect,
}

/// Any error-report whose code isn't one of the two defined in this
/// protocol (internal-error, no-data-available) is treated as fatal —
/// the protocol description only says "fatal codes terminate the
/// session" without enumerating them, and both defined codes are
/// documented as non-fatal from the sender's perspective.
fn is_fatal(code: u16) -> bool {
    code != errno::INTERNAL_ERROR && code != errno::NO_DATA_AVAILABLE
}

/// Router-side session state machine driving one cache connection.
///
/// Maintains the locally held prefix table by applying `Prefix` PDUs the
/// same way [`crate::prefixset::diff::apply`] applies a stored delta —
/// this struct just doesn't require the PDUs to have arrived packaged as
/// a [`crate::prefixset::Delta`].
pub struct ClientSession {
    state: ClientState,
    current_serial: Option<Serial>,
    pending_serial: Option<Serial>,
    records: Vec<PrefixRecord>,
}

impl Default for ClientSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientSession {
    pub fn new() -> Self {
        ClientSession {
            state: ClientState::Start,
            current_serial: None,
            pending_serial: None,
            records: Vec::new(),
        }
    }

    pub fn state(&self) -> ClientState {
        self.state
    }

    pub fn current_serial(&self) -> Option<Serial> {
        self.current_serial
    }

    pub fn records(&self) -> &[PrefixRecord] {
        &self.records
    }

    pub fn handle(&mut self, event: ClientEvent) -> Vec<ClientAction> {
        if self.state == ClientState::Terminal {
            return Vec::new();
        }
        match event {
            ClientEvent::Connected => self.on_connected(),
            ClientEvent::Pdu(pdu) => self.on_pdu(pdu),
            ClientEvent::TimerFired => self.on_timer(),
        }
    }

    fn on_connected(&mut self) -> Vec<ClientAction> {
        self.state = ClientState::AwaitResponse;
        vec![ClientAction::SendPdu(Pdu::ResetQuery)]
    }

    fn on_timer(&mut self) -> Vec<ClientAction> {
        if self.state != ClientState::Idle {
            return Vec::new();
        }
        self.state = ClientState::AwaitResponse;
        match self.current_serial {
            Some(serial) => vec![ClientAction::SendPdu(Pdu::SerialQuery { serial })],
            None => vec![ClientAction::SendPdu(Pdu::ResetQuery)],
        }
    }

    fn on_pdu(&mut self, pdu: Pdu) -> Vec<ClientAction> {
        match pdu {
            Pdu::ErrorReport { errno: code, message, .. } => {
                if is_fatal(code) {
                    self.state = ClientState::Terminal;
                    vec![ClientAction::Disconnect]
                } else {
                    tracing::warn!(errno = code, %message, "non-fatal error-report from cache");
                    Vec::new()
                }
            }
            Pdu::CacheResponse if self.state == ClientState::AwaitResponse => {
                self.records.clear();
                Vec::new()
            }
            Pdu::Prefix(record) if self.state == ClientState::AwaitResponse => {
                diff::apply_one(&mut self.records, &record);
                Vec::new()
            }
            Pdu::EndOfData { serial } if self.state == ClientState::AwaitResponse => {
                if let Some(expected) = self.pending_serial {
                    if serial != expected {
                        tracing::warn!(
                            serial,
                            expected,
                            "end-of-data serial does not match the notify that triggered this query"
                        );
                    }
                }
                self.current_serial = Some(serial);
                self.pending_serial = None;
                self.state = ClientState::Idle;
                Vec::new()
            }
            Pdu::CacheReset if self.state == ClientState::AwaitResponse => {
                self.records.clear();
                vec![ClientAction::SendPdu(Pdu::ResetQuery)]
            }
            Pdu::SerialNotify { serial } if self.state == ClientState::Idle => {
                if self.current_serial == Some(serial) {
                    return Vec::new();
                }
                self.pending_serial = Some(serial);
                self.state = ClientState::AwaitResponse;
                match self.current_serial {
                    Some(current) => vec![ClientAction::SendPdu(Pdu::SerialQuery { serial: current })],
                    None => vec![ClientAction::SendPdu(Pdu::ResetQuery)],
                }
            }
            other => {
                tracing::debug!(?other, state = ?self.state, "ignoring PDU not valid in current state");
                Vec::new()
            }
        }
    }
}
