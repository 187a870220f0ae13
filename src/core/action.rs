//! Outbound action vocabulary (§6 "Outbound actions").
//!
//! Every core entry point returns exactly one of these. The core never
//! performs the action itself; it hands the value back to the caller, which
//! is expected to be the I/O layer driving the socket.

use crate::error::Error;
use crate::core::model::{
    AuthContextMode, CleanUpContext, LobOpContext, Promise, StatementContext, StatementOutcome,
};

/// Actions emitted by [`crate::core::row_stream::RowStreamCore`] (§4.1).
#[derive(Debug)]
pub enum RowStreamAction {
    /// Hand the caller a completed batch of rows to forward downstream.
    Rows(Vec<crate::core::model::DataRow>),
    /// Ask the I/O layer to issue a network read.
    Read,
    /// No read is currently needed; the core is waiting on consumer demand.
    Wait,
}

/// Actions emitted by [`crate::core::auth::AuthCore`] (§4.4).
#[derive(Debug)]
pub enum AuthAction {
    SendFastAuth,
    SendAuthPhaseOne,
    SendAuthPhaseTwo,
    /// Authentication succeeded; `params` is the server parameter map the
    /// session should retain.
    Authenticated(crate::core::model::Parameters),
    Fail(Error),
    /// No action required yet; more inbound events are expected first.
    None,
}

/// Actions emitted by [`crate::core::statement::StatementCore`] (§4.2).
pub enum StatementAction {
    SendExecute {
        describe: bool,
        cursor_id: Option<u32>,
        requires_define: bool,
        no_prefetch: bool,
    },
    SendReexecute {
        cleanup: CleanUpContext,
        cursor_id: Option<u32>,
        requires_define: bool,
    },
    SendFetch {
        cursor_id: Option<u32>,
    },
    SendFlushOutBinds,
    SendMarker {
        read: bool,
    },
    SucceedStatement {
        promise: Promise<StatementOutcome>,
        result: StatementOutcome,
    },
    FailStatement {
        promise: Promise<StatementOutcome>,
        err: Error,
        cleanup: Option<CleanUpContext>,
    },
    ForwardRows(Vec<crate::core::model::DataRow>),
    ForwardStreamComplete {
        rows: Vec<crate::core::model::DataRow>,
        cursor_id: u32,
        affected_rows: u64,
        last_row_id: Option<String>,
    },
    ForwardStreamError {
        err: Error,
        read: bool,
        cursor_id: Option<u16>,
        client_cancelled: bool,
    },
    Read,
    Wait,
    None,
}

impl std::fmt::Debug for StatementAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StatementAction::SendExecute { describe, cursor_id, requires_define, no_prefetch } => f
                .debug_struct("SendExecute")
                .field("describe", describe)
                .field("cursor_id", cursor_id)
                .field("requires_define", requires_define)
                .field("no_prefetch", no_prefetch)
                .finish(),
            StatementAction::SendReexecute { cursor_id, requires_define, .. } => f
                .debug_struct("SendReexecute")
                .field("cursor_id", cursor_id)
                .field("requires_define", requires_define)
                .finish(),
            StatementAction::SendFetch { cursor_id } => {
                f.debug_struct("SendFetch").field("cursor_id", cursor_id).finish()
            }
            StatementAction::SendFlushOutBinds => write!(f, "SendFlushOutBinds"),
            StatementAction::SendMarker { read } => {
                f.debug_struct("SendMarker").field("read", read).finish()
            }
            StatementAction::SucceedStatement { result, .. } => {
                f.debug_struct("SucceedStatement").field("result", result).finish()
            }
            StatementAction::FailStatement { err, cleanup, .. } => f
                .debug_struct("FailStatement")
                .field("err", err)
                .field("has_cleanup", &cleanup.is_some())
                .finish(),
            StatementAction::ForwardRows(rows) => {
                f.debug_tuple("ForwardRows").field(&rows.len()).finish()
            }
            StatementAction::ForwardStreamComplete { cursor_id, affected_rows, .. } => f
                .debug_struct("ForwardStreamComplete")
                .field("cursor_id", cursor_id)
                .field("affected_rows", affected_rows)
                .finish(),
            StatementAction::ForwardStreamError { err, read, cursor_id, client_cancelled } => f
                .debug_struct("ForwardStreamError")
                .field("err", err)
                .field("read", read)
                .field("cursor_id", cursor_id)
                .field("client_cancelled", client_cancelled)
                .finish(),
            StatementAction::Read => write!(f, "Read"),
            StatementAction::Wait => write!(f, "Wait"),
            StatementAction::None => write!(f, "None"),
        }
    }
}

/// Actions emitted by [`crate::core::connection::ConnectionCore`] (§4.3).
pub enum ConnectionAction {
    Read,
    Wait,
    LogoffConnection(Option<Promise<()>>),
    CloseConnection(Option<Promise<()>>),
    FireChannelInactive,
    FireEventReadyForStatement,
    CloseAndCleanup(CleanUpContext),

    SendConnect,
    SendOobCheck,
    SendProtocol,
    SendDataTypes,
    SendMarker { read: bool },

    ProvideAuthenticationContext(AuthContextMode),
    SendFastAuth(Box<StatementContext>),
    SendAuthPhaseOne(Box<StatementContext>),
    SendAuthPhaseTwo(Box<StatementContext>, crate::core::model::Parameters),
    Authenticated(crate::core::model::Parameters),

    SendPing,
    SucceedPing(Promise<()>),
    FailPing(Promise<()>, Error),
    SendCommit,
    SucceedCommit(Promise<()>),
    FailCommit(Promise<()>, Error),
    SendRollback,
    SucceedRollback(Promise<()>),
    FailRollback(Promise<()>, Error),

    SendLobOp(Box<LobOpContext>),
    SucceedLobOp(Box<LobOpContext>),
    FailLobOp(Promise<()>, Error),

    /// A statement action passed through unchanged from the active
    /// `StatementCore` (§4.3 "Action forwarding").
    Statement(StatementAction),
}

impl std::fmt::Debug for ConnectionAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ConnectionAction::Read => "Read",
            ConnectionAction::Wait => "Wait",
            ConnectionAction::LogoffConnection(_) => "LogoffConnection",
            ConnectionAction::CloseConnection(_) => "CloseConnection",
            ConnectionAction::FireChannelInactive => "FireChannelInactive",
            ConnectionAction::FireEventReadyForStatement => "FireEventReadyForStatement",
            ConnectionAction::CloseAndCleanup(_) => "CloseAndCleanup",
            ConnectionAction::SendConnect => "SendConnect",
            ConnectionAction::SendOobCheck => "SendOobCheck",
            ConnectionAction::SendProtocol => "SendProtocol",
            ConnectionAction::SendDataTypes => "SendDataTypes",
            ConnectionAction::SendMarker { .. } => "SendMarker",
            ConnectionAction::ProvideAuthenticationContext(_) => "ProvideAuthenticationContext",
            ConnectionAction::SendFastAuth(_) => "SendFastAuth",
            ConnectionAction::SendAuthPhaseOne(_) => "SendAuthPhaseOne",
            ConnectionAction::SendAuthPhaseTwo(_, _) => "SendAuthPhaseTwo",
            ConnectionAction::Authenticated(_) => "Authenticated",
            ConnectionAction::SendPing => "SendPing",
            ConnectionAction::SucceedPing(_) => "SucceedPing",
            ConnectionAction::FailPing(_, _) => "FailPing",
            ConnectionAction::SendCommit => "SendCommit",
            ConnectionAction::SucceedCommit(_) => "SucceedCommit",
            ConnectionAction::FailCommit(_, _) => "FailCommit",
            ConnectionAction::SendRollback => "SendRollback",
            ConnectionAction::SucceedRollback(_) => "SucceedRollback",
            ConnectionAction::FailRollback(_, _) => "FailRollback",
            ConnectionAction::SendLobOp(_) => "SendLobOp",
            ConnectionAction::SucceedLobOp(_) => "SucceedLobOp",
            ConnectionAction::FailLobOp(_, _) => "FailLobOp",
            ConnectionAction::Statement(a) => return write!(f, "Statement({:?})", a),
        };
        write!(f, "{name}")
    }
}
