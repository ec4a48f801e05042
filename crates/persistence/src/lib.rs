//! ## Persistence intent buffer
//!
//! A write-through journal of state-changing operations: handlers append
//! [`Intent`]s to a per-thread [`IntentBuffer`] instead of calling a
//! database directly, and [`apply_intents`] drains the buffer against a
//! [`StorageDriver`] out of band, retrying anything that fails.

pub mod driver;
pub mod error;
pub mod intent;

pub use driver::{BoardRecord, MemoryDriver, MoveRecord, NullDriver, SessionRecord, StorageDriver};
pub use error::DriverError;
pub use intent::{apply_intents, Intent, IntentBuffer, Status, Token};
