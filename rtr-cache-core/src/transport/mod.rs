//! `tokio` adapters that drive the pure session state machines in
//! [`crate::session`] from real sockets. Kept separate from `session` so
//! the protocol logic stays testable without spinning up an event loop
//! (see the module doc on `wire::codec` for the same split applied one
//! layer down).

mod client_task;
mod server_task;

pub use client_task::run_client;
pub use server_task::{run_server, ServerHandle};
