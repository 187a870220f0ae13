//! Oracle TNS session core
//!
//! The connection- and statement-level finite-state machines that drive a
//! single Oracle database session over TNS (Transparent Network
//! Substrate). The four machines in [`core`] are pure logic: they consume
//! already-parsed backend messages and user requests and emit actions for
//! an I/O layer to perform — they never touch a socket themselves.
//!
//! `protocol` is the wire layer those actions and events are expressed in
//! terms of: packet framing, O5LOGON crypto, and column/value decoding.
//! An I/O driver built on top of this crate would read bytes with
//! `protocol`, turn them into [`core::event`] values, feed those into
//! [`core::ConnectionCore`], and execute whatever [`core::ConnectionAction`]
//! comes back.
//!
//! # Example
//!
//! ```
//! use oracle_tns_core::core::{ConnectionCore, ConnectionAction};
//!
//! let mut session = ConnectionCore::new();
//! match session.connected() {
//!     ConnectionAction::SendConnect => { /* write the CONNECT packet */ }
//!     _ => unreachable!("a fresh session always starts the handshake"),
//! }
//! ```

pub mod core;
pub mod error;
pub mod protocol;

pub use core::{ConnectionAction, ConnectionCore, StatementAction, StatementCore};
pub use error::{Error, Result};
pub use protocol::connect::ConnectParams;
pub use protocol::types::{Column as WireColumn, ColumnInfo, ColumnMetadata, OracleType, OracleValue, Row};
