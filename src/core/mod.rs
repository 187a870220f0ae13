//! Pure state-machine core: the session/statement finite-state machines
//! that drive a single Oracle TNS connection, decoupled from all I/O.
//!
//! Four cooperating machines live here (see each submodule's docs):
//! [`connection::ConnectionCore`], [`statement::StatementCore`],
//! [`row_stream::RowStreamCore`], and [`auth::AuthCore`]. None of them touch
//! a socket; they consume already-parsed inbound [`event`] values and
//! produce outbound [`action`] values for an I/O layer to execute.

pub mod action;
pub mod auth;
pub mod connection;
pub mod event;
pub mod model;
pub mod row_stream;
pub mod statement;

pub use action::{AuthAction, ConnectionAction, RowStreamAction, StatementAction};
pub use auth::AuthCore;
pub use connection::ConnectionCore;
pub use event::{Capabilities, ConnectionEvent};
pub use row_stream::RowStreamCore;
pub use statement::StatementCore;
