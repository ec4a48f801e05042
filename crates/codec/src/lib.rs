//! ## Wamble wire protocol
//!
//! The wire protocol is a length-prefixed (by the UDP datagram boundary
//! itself) binary frame with a fixed 33-byte header followed by a variable
//! UCI move field and a control-code-specific payload. This crate owns frame
//! encode/decode, the control code enumeration, and the per-peer session
//! bookkeeping (sequence numbers, ACK waiting, duplicate suppression) needed
//! to give the otherwise unreliable UDP transport the reliability semantics
//! described by the runtime.

pub mod control;
pub mod error;
pub mod frame;
pub mod reliability;
pub mod session;

pub use control::Control;
pub use error::Error;
pub use frame::{Flags, Frame, MAX_UCI_LENGTH, UciBytes};
pub use reliability::{AckWaiters, ReliabilityConfig};
pub use session::{PeerKey, PeerSession, PeerSessionTable};

/// Protocol version this build of the server speaks.
pub const SERVER_VERSION: u8 = 1;

/// Capability bits (the flags high nibble) this build understands. A
/// CLIENT_HELLO's requested capabilities are intersected against this mask
/// before being echoed back in SERVER_HELLO.
pub const SUPPORTED_CAPABILITIES: u8 = 0x0F;
