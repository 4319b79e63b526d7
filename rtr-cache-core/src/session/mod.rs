pub mod client;
pub mod server;

pub use client::{ClientAction, ClientEvent, ClientSession, ClientState};
pub use server::{ServerAction, ServerEvent, ServerSession, ServerState};
