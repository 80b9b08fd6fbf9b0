//! # Transport
//!
//! UDP link to a single AR peer.
//!
//! - [`codec`]: JSON envelope encoding/decoding
//! - [`table`]: latest-value buffer, one slot per message kind
//! - [`udp`]: socket lifecycle, best-effort send, background receive task
//!
//! Delivery is best-effort: nothing is retried, and only the newest message
//! of each kind is observable.

pub mod codec;
mod error;
pub mod table;
mod udp;

pub use codec::{decode, encode, MAX_DATAGRAM_SIZE};
pub use error::TransportError;
pub use table::LatestTable;
pub use udp::{TransportConfig, UdpTransport};
