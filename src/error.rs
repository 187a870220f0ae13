//! Error types for the Oracle thin client.
//!
//! `Error` is the single taxonomy shared by the wire layer (`protocol/`) and
//! the session/statement state machines (`core/`). The state machines never
//! construct an `io::Error` or touch a socket themselves; they receive
//! already-classified errors from the I/O layer via `errorHappened` and
//! `errorReceived` entry points and only need to know how to route an
//! `Error` once they have one (§7 of the governing spec).

use std::io;
use std::panic::Location;
use thiserror::Error;

/// Result type alias for Oracle operations.
pub type Result<T> = std::result::Result<T, Error>;

/// A server-reported error or warning attached to an end-of-call response.
///
/// Mirrors `protocol::response::ErrorInfo` but is the shape the state
/// machines reason about: it additionally distinguishes warnings from
/// errors and carries the optional last-row-id and batch-errors the core
/// needs to thread through `ForwardStreamComplete`/`ForwardStreamError`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BackendError {
    /// Oracle error number; 0 means success/no error.
    pub number: u32,
    /// Cursor ID this error is scoped to, if any.
    pub cursor_id: Option<u16>,
    /// Error position within the statement text.
    pub position: u32,
    /// Row count carried by the terminating response, if any.
    pub row_count: Option<u64>,
    /// Whether this is a warning rather than a hard error.
    pub is_warning: bool,
    /// Human-readable message, if any.
    pub message: Option<String>,
    /// ROWID of the last affected row, if the server reported one.
    pub row_id: Option<String>,
    /// Per-row errors from a batch DML operation.
    pub batch_errors: Vec<BackendError>,
}

impl BackendError {
    /// Sentinel: ORA-01403, normal end-of-fetch.
    pub const NO_DATA_FOUND: u32 = 1403;
    /// Sentinel: batch DML completed with per-row errors; also end-of-fetch.
    pub const ARRAY_DML_ERRORS: u32 = 24381;
    /// Sentinel: a column named in a re-describe no longer exists in the select list.
    pub const VAR_NOT_IN_SELECT_LIST: u32 = 1007;
    /// Sentinel: server's acknowledgment of a client cancel marker.
    pub const USER_CANCELLED: u32 = 1013;
    /// Connection-closed family: used by `Error::is_connection_fatal`.
    pub const CONNECTION_CLOSED_28: u32 = 28;
    /// Connection-closed family: used by `Error::is_connection_fatal`.
    pub const CONNECTION_CLOSED_600: u32 = 600;

    /// True for the sentinel numbers that signal a normal end of fetch
    /// rather than a real failure.
    pub fn is_end_of_fetch(&self) -> bool {
        matches!(self.number, Self::NO_DATA_FOUND | Self::ARRAY_DML_ERRORS)
    }

    /// True for the server's acknowledgment that a cancel marker completed.
    pub fn is_cancel_ack(&self) -> bool {
        self.number == Self::USER_CANCELLED
    }
}

/// The exception class a `Server` error is classified into, used to decide
/// whether a cursor-id should be suppressed when forwarding a stream error
/// (§4.2: "suppress the cursor-id... when the exception class is 'integrity'").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExceptionClass {
    /// Unique/foreign-key/check-constraint violations and similar.
    Integrity,
    /// Anything not otherwise classified.
    Other,
}

/// Error type for Oracle thin client operations.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error during network communication.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Connection refused by the server.
    #[error("Connection refused: {message}")]
    ConnectionRefused { message: String },

    /// Invalid service name.
    #[error("Invalid service name: {service_name}")]
    InvalidServiceName { service_name: String },

    /// Invalid SID.
    #[error("Invalid SID: {sid}")]
    InvalidSid { sid: String },

    /// A SID the server does not support (§7 `SIDUnsupported`).
    #[error("SID not supported: {sid}")]
    SidUnsupported { sid: String },

    /// Server version not supported.
    #[error("Server version not supported (minimum required: {min_version})")]
    ServerVersionNotSupported { min_version: u16 },

    /// Authentication failed.
    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    /// Unsupported verifier type.
    #[error("Unsupported verifier type: {verifier_type:#x}")]
    UnsupportedVerifierType { verifier_type: u32 },

    /// Invalid server response during authentication.
    #[error("Invalid server response during authentication")]
    InvalidServerResponse,

    /// Protocol error.
    #[error("Protocol error: {message}")]
    Protocol { message: String },

    /// Unexpected packet type received.
    #[error("Unexpected packet type: expected {expected}, got {actual}")]
    UnexpectedPacketType { expected: u8, actual: u8 },

    /// A backend message arrived in a state that does not accept it (§7
    /// `UnexpectedBackendMessage`).
    #[error("Unexpected backend message in this state: {kind}")]
    UnexpectedBackendMessage { kind: &'static str },

    /// Message decoding failed below the core (§7 `MessageDecodingFailure`).
    #[error("Message decoding failure: {message}")]
    MessageDecodingFailure { message: String },

    /// Connection closed.
    #[error("Connection closed")]
    ConnectionClosed,

    /// The transport failed outright (socket reset, broken pipe reported by
    /// the I/O layer as a classified failure rather than a raw `io::Error`).
    #[error("Transport failed: {message}")]
    TransportFailed { message: String },

    /// TLS handshake setup failed.
    #[error("TLS setup failed: {message}")]
    TlsSetupFailed { message: String },

    /// TLS certificate/identity verification failed.
    #[error("TLS verification failed: {message}")]
    TlsVerificationFailed { message: String },

    /// The channel went away without a clean log-off handshake.
    #[error("Unclean shutdown")]
    UncleanShutdown,

    /// A required parameter was missing from a server response.
    #[error("Missing parameter: {name}")]
    MissingParameter { name: &'static str },

    /// A statement was referenced that the session does not have.
    #[error("Missing statement")]
    MissingStatement,

    /// The session's national character set is not supported.
    #[error("National character set not supported")]
    NationalCharsetUnsupported,

    /// The client cancelled a statement stream.
    #[error("Statement cancelled")]
    StatementCancelled,

    /// A task was rejected because the client already closed the session.
    #[error("Client closed connection")]
    ClientClosedConnection,

    /// The client is in the process of closing the connection.
    #[error("Client closes connection")]
    ClientClosesConnection,

    /// Oracle database error (simple display-only form; the core uses
    /// [`Error::Server`] which carries the full [`BackendError`]).
    #[error("ORA-{code:05}: {message}")]
    Oracle { code: u32, message: String },

    /// A server-reported error or warning, as seen by the state machines.
    #[error("ORA-{:05}: {}", .0.number, .0.message.as_deref().unwrap_or(""))]
    Server(BackendError),

    /// Type conversion error.
    #[error("Type conversion error: {message}")]
    TypeConversion { message: String },

    /// Column not found.
    #[error("Column not found: {name}")]
    ColumnNotFound { name: String },

    /// Column index out of bounds.
    #[error("Column index {index} out of bounds (columns: {count})")]
    ColumnIndexOutOfBounds { index: usize, count: usize },

    /// Null value error.
    #[error("Unexpected NULL value in column {column}")]
    NullValue { column: String },

    /// Buffer too small.
    #[error("Buffer too small: need {needed} bytes, have {available} filed at {location}")]
    BufferTooSmall {
        needed: usize,
        available: usize,
        location: &'static Location<'static>,
    },

    /// Invalid connect string.
    #[error("Invalid connect string: {message}")]
    InvalidConnectString { message: String },

    /// Unsupported Oracle data type.
    #[error("Unsupported Oracle data type: {type_num}")]
    UnsupportedType { type_num: u8 },

    /// Connection timed out during TCP connect.
    #[error("Connection to {host}:{port} timed out after {timeout:?}")]
    ConnectionTimeout {
        host: String,
        port: u16,
        timeout: std::time::Duration,
    },

    /// DNS resolution failed.
    #[error("Failed to resolve hostname '{hostname}': {message}")]
    DnsResolutionFailed { hostname: String, message: String },
}

impl Error {
    /// Create a protocol error.
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Create an Oracle database error.
    pub fn oracle(code: u32, message: impl Into<String>) -> Self {
        Self::Oracle {
            code,
            message: message.into(),
        }
    }

    /// Create a type conversion error.
    pub fn type_conversion(message: impl Into<String>) -> Self {
        Self::TypeConversion {
            message: message.into(),
        }
    }

    /// Build a `Server` error from a `BackendError`, choosing `Oracle` vs
    /// `Server` is left to the caller — the core always uses this form so
    /// cursor-id and row-count survive into `fail-statement`/`fail-ping`.
    pub fn server(err: BackendError) -> Self {
        Self::Server(err)
    }

    /// Connection-fatality classification (§4.3 `shouldCloseConnection`).
    ///
    /// Pure client-side close errors ([`Error::ClientClosedConnection`],
    /// [`Error::ClientClosesConnection`]) must never reach this — that is a
    /// precondition of the spec, not something this method defends against.
    pub fn is_connection_fatal(&self) -> bool {
        match self {
            Error::TransportFailed { .. }
            | Error::TlsSetupFailed { .. }
            | Error::TlsVerificationFailed { .. }
            | Error::MessageDecodingFailure { .. }
            | Error::UnexpectedBackendMessage { .. }
            | Error::ServerVersionNotSupported { .. }
            | Error::SidUnsupported { .. }
            | Error::UncleanShutdown
            | Error::UnsupportedType { .. }
            | Error::Io(_) => true,
            Error::Server(be) => {
                matches!(
                    be.number,
                    BackendError::CONNECTION_CLOSED_28 | BackendError::CONNECTION_CLOSED_600
                )
            }
            Error::StatementCancelled | Error::NationalCharsetUnsupported | Error::MissingStatement => {
                false
            }
            _ => false,
        }
    }

    /// Whether a fatal classification should surface as "fire channel
    /// inactive" (unclean shutdown family) instead of a clean
    /// close-connection action.
    pub fn is_unclean_shutdown(&self) -> bool {
        matches!(self, Error::UncleanShutdown)
    }
}
