#![forbid(unsafe_code)]

//! Core library behind the RPKI-to-router-protocol cache: a wire codec
//! for protocol version 0, a canonical prefix-set/delta model, a
//! filesystem-backed snapshot store, a periodic producer that turns a
//! validated ROA tree into snapshots and deltas, pure server/client
//! session state machines, the `tokio` transport that drives them over
//! real sockets, and the local kick-bus notification channel.

pub mod config;
pub mod error;
pub mod kickbus;
pub mod prefixset;
pub mod producer;
pub mod roa;
pub mod session;
pub mod store;
pub mod transport;
pub mod wire;

pub use config::{load_from_path, Config, ConfigError};
pub use error::{ProducerError, RoaError, SessionError, StoreError, WireError};
pub use store::Store;
