pub mod address;
pub mod codec;
pub mod pdu;

pub use address::{Afi, AddressValue};
pub use codec::{encode, error_report, internal_error, no_data_available, Decoder};
pub use pdu::{errno, kind, Pdu, PrefixRecord, PROTOCOL_VERSION};
