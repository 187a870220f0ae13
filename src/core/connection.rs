//! `ConnectionCore` (§4.3): sequences session phases and dispatches
//! incoming messages and queued tasks. No I/O — owns the task queue,
//! marker state, quiescing state, and the active sub-machine by value.

use std::collections::VecDeque;

use crate::core::action::{AuthAction, ConnectionAction, StatementAction};
use crate::core::auth::AuthCore;
use crate::core::event::{Capabilities, ConnectionEvent};
use crate::core::model::{
    AuthContextMode, Bind, BindDirection, CleanUpContext, Column, DataRow, LobOpContext,
    MarkerState, Parameters, Promise, QuiescingState, RowHeader, StatementContext, StatementOutcome,
    Task,
};
use crate::core::statement::StatementCore;
use crate::error::{BackendError, Error};
use tracing::{debug, trace, warn};

/// Minimum TNS protocol version that advertises OOB break support
/// (`protocol::constants`'s version family; the teacher only tracks the
/// negotiated version as a raw `u16`, so the threshold is named here).
const MIN_OOB_CHECK_VERSION: u16 = 315;

enum State {
    Initialized,
    ConnectMessageSent,
    OobCheckInProgress { fast_auth_hint: bool },
    ProtocolMessageSent,
    DataTypesMessageSent,
    WaitingToStartAuthentication { fast_auth: bool },
    Authenticating(AuthCore),
    ReadyForStatement,
    Statement(StatementCore),
    Ping(Promise<()>),
    Commit(Promise<()>),
    Rollback(Promise<()>),
    LobOperation(LobOpContext),
    LoggingOff(Option<Promise<()>>),
    Closing,
    Closed,
    RenegotiatingTls,
}

pub struct ConnectionCore {
    state: State,
    tasks: VecDeque<Task>,
    marker: MarkerState,
    quiescing: QuiescingState,
}

impl ConnectionCore {
    pub fn new() -> Self {
        Self {
            state: State::Initialized,
            tasks: VecDeque::new(),
            marker: MarkerState::NoneSent,
            quiescing: QuiescingState::NotQuiescing,
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.state, State::Closed)
    }

    fn is_terminal_or_quiescing(&self) -> bool {
        matches!(self.state, State::Closed) || self.quiescing.is_quiescing()
    }

    // ---- handshake -----------------------------------------------------

    /// §4.3 "connected()".
    pub fn connected(&mut self) -> ConnectionAction {
        if matches!(self.state, State::Initialized) {
            self.state = State::ConnectMessageSent;
            trace!("Initialized + connected -> ConnectMessageSent / SendConnect");
            ConnectionAction::SendConnect
        } else {
            ConnectionAction::Wait
        }
    }

    /// §4.3 "accept(caps)".
    pub fn accept(&mut self, caps: Capabilities) -> ConnectionAction {
        if !matches!(self.state, State::ConnectMessageSent) {
            return ConnectionAction::Wait;
        }
        self.branch_after_connect(caps.supports_oob, caps.protocol_version, caps.supports_fast_auth)
    }

    fn branch_after_connect(&mut self, supports_oob: bool, protocol_version: u16, fast_auth: bool) -> ConnectionAction {
        if supports_oob && protocol_version >= MIN_OOB_CHECK_VERSION {
            self.state = State::OobCheckInProgress { fast_auth_hint: fast_auth };
            trace!(protocol_version, fast_auth, "accept -> OobCheckInProgress / SendOobCheck");
            ConnectionAction::SendOobCheck
        } else if fast_auth {
            self.state = State::WaitingToStartAuthentication { fast_auth: true };
            trace!("accept -> WaitingToStartAuthentication(fast_auth) / ProvideAuthenticationContext(Allowed)");
            ConnectionAction::ProvideAuthenticationContext(AuthContextMode::Allowed)
        } else {
            self.state = State::ProtocolMessageSent;
            trace!("accept -> ProtocolMessageSent / SendProtocol");
            ConnectionAction::SendProtocol
        }
    }

    /// §4.3 "oob-check-complete()/marker-received while oob-check-in-progress".
    pub fn oob_check_complete(&mut self) -> ConnectionAction {
        self.advance_past_oob_check()
    }

    /// Shared branching for `oob-check-complete()`/`marker-received` while
    /// `OobCheckInProgress` (§4.3: "same branching as above").
    fn advance_past_oob_check(&mut self) -> ConnectionAction {
        match self.state {
            State::OobCheckInProgress { fast_auth_hint } => {
                if fast_auth_hint {
                    self.state = State::WaitingToStartAuthentication { fast_auth: true };
                    ConnectionAction::ProvideAuthenticationContext(AuthContextMode::Allowed)
                } else {
                    self.state = State::ProtocolMessageSent;
                    ConnectionAction::SendProtocol
                }
            }
            _ => ConnectionAction::Wait,
        }
    }

    /// §4.3 "protocol-received".
    pub fn protocol_received(&mut self) -> ConnectionAction {
        match &mut self.state {
            State::ProtocolMessageSent => {
                self.state = State::DataTypesMessageSent;
                ConnectionAction::SendDataTypes
            }
            State::Authenticating(auth) => {
                let action = auth.protocol_received();
                self.handle_auth_action(action)
            }
            _ => ConnectionAction::Wait,
        }
    }

    /// §4.3 "data-types-received".
    pub fn data_types_received(&mut self) -> ConnectionAction {
        match &mut self.state {
            State::DataTypesMessageSent => {
                self.state = State::WaitingToStartAuthentication { fast_auth: false };
                ConnectionAction::ProvideAuthenticationContext(AuthContextMode::Denied)
            }
            State::Authenticating(auth) => {
                let action = auth.data_types_received();
                self.handle_auth_action(action)
            }
            _ => ConnectionAction::Wait,
        }
    }

    /// §4.3 "provide-authentication-context(ctx, fast-auth)".
    pub fn provide_authentication_context(&mut self) -> ConnectionAction {
        let fast_auth = match self.state {
            State::WaitingToStartAuthentication { fast_auth } => fast_auth,
            _ => return ConnectionAction::Wait,
        };
        let mut auth = AuthCore::new(fast_auth);
        let start_action = auth.start();
        self.state = State::Authenticating(auth);
        self.handle_auth_action(start_action)
    }

    /// §4.3 "parameter-received".
    pub fn parameter_received(&mut self, params: Parameters) -> ConnectionAction {
        match &mut self.state {
            State::Authenticating(auth) => {
                let action = auth.parameter_received(params);
                if let AuthAction::Authenticated(params) = &action {
                    let params = params.clone();
                    self.state = State::ReadyForStatement;
                    return ConnectionAction::Authenticated(params);
                }
                self.handle_auth_action(action)
            }
            _ => ConnectionAction::Wait,
        }
    }

    /// Maps a non-terminal `AuthAction` 1:1 to a `ConnectionAction`
    /// (§4.3 "Action forwarding"); `Fail` instead escalates straight into
    /// the cleanup pipeline ("ReportAuthenticationError triggers cleanup").
    fn handle_auth_action(&mut self, action: AuthAction) -> ConnectionAction {
        match action {
            AuthAction::Fail(err) => {
                debug!(error = %err, "authentication failed, entering cleanup pipeline");
                self.run_cleanup(err)
            }
            other => map_auth_action(other),
        }
    }

    /// §4.3 "tlsEstablished()".
    pub fn tls_established(&mut self) -> ConnectionAction {
        match self.state {
            State::RenegotiatingTls => {
                self.state = State::ConnectMessageSent;
                ConnectionAction::SendConnect
            }
            _ => ConnectionAction::Wait,
        }
    }

    /// TLS renegotiation entry (§4.3 "TLS renegotiation").
    pub fn tls_initiated(&mut self) -> ConnectionAction {
        self.state = State::RenegotiatingTls;
        ConnectionAction::Wait
    }

    // ---- request/response -----------------------------------------------

    /// §4.3 "status-received".
    pub fn status_received(&mut self, status: BackendError) -> ConnectionAction {
        let success = status.number == 0;
        trace!(status_number = status.number, success, "status-received");
        match std::mem::replace(&mut self.state, State::ReadyForStatement) {
            State::Ping(promise) => {
                self.state = State::ReadyForStatement;
                if success {
                    ConnectionAction::SucceedPing(promise)
                } else {
                    ConnectionAction::FailPing(promise, Error::server(status))
                }
            }
            State::Commit(promise) => {
                self.state = State::ReadyForStatement;
                if success {
                    ConnectionAction::SucceedCommit(promise)
                } else {
                    ConnectionAction::FailCommit(promise, Error::server(status))
                }
            }
            State::Rollback(promise) => {
                self.state = State::ReadyForStatement;
                if success {
                    ConnectionAction::SucceedRollback(promise)
                } else {
                    ConnectionAction::FailRollback(promise, Error::server(status))
                }
            }
            State::LoggingOff(promise) => {
                self.state = State::Closing;
                ConnectionAction::CloseConnection(promise)
            }
            other => {
                self.state = other;
                self.run_cleanup(Error::UnexpectedBackendMessage { kind: "status-received" })
            }
        }
    }

    /// §4.3 "marker-received" (at-most-one in-flight cancel marker).
    ///
    /// A marker arriving while the OOB check is outstanding is the same
    /// signal `oob-check-complete()` reacts to (§4.3: "same branching as
    /// above") — without this, a marker received during
    /// `OobCheckInProgress` would be absorbed as a generic cancel-marker
    /// echo and the connection would never advance out of that state.
    pub fn marker_received(&mut self) -> ConnectionAction {
        if matches!(self.state, State::OobCheckInProgress { .. }) {
            return self.advance_past_oob_check();
        }
        match self.marker {
            MarkerState::NoneSent => {
                self.marker = MarkerState::OneSent;
                ConnectionAction::SendMarker { read: false }
            }
            MarkerState::OneSent => {
                self.marker = MarkerState::NoneSent;
                ConnectionAction::Wait
            }
        }
    }

    /// §4.3 "readyForStatement": after statement/ping/commit/rollback/LOB-op
    /// completes, dispatch the next queued task, close if quiescing, or
    /// fire the ready-for-statement event.
    pub fn ready_for_statement(&mut self) -> ConnectionAction {
        if !matches!(self.state, State::ReadyForStatement) {
            return ConnectionAction::Wait;
        }
        if let QuiescingState::Quiescing(_) = &mut self.quiescing {
            let promise = self.quiescing.take_close_promise();
            self.state = State::LoggingOff(None);
            return ConnectionAction::LogoffConnection(promise);
        }
        match self.tasks.pop_front() {
            Some(task) => self.dispatch(task),
            None => {
                trace!("ready-for-statement -> FireEventReadyForStatement");
                ConnectionAction::FireEventReadyForStatement
            }
        }
    }

    fn dispatch(&mut self, task: Task) -> ConnectionAction {
        match task {
            Task::Statement(ctx) => {
                let (core, action) = StatementCore::start(ctx);
                self.state = State::Statement(core);
                map_statement_action(action)
            }
            Task::Ping(promise) => {
                self.state = State::Ping(promise);
                ConnectionAction::SendPing
            }
            Task::Commit(promise) => {
                self.state = State::Commit(promise);
                ConnectionAction::SendCommit
            }
            Task::Rollback(promise) => {
                self.state = State::Rollback(promise);
                ConnectionAction::SendRollback
            }
            Task::LobOp(ctx) => {
                let echo = LobOpContext {
                    locator: ctx.locator.clone(),
                    operation: ctx.operation,
                    promise: None,
                };
                self.state = State::LobOperation(ctx);
                ConnectionAction::SendLobOp(Box::new(echo))
            }
        }
    }

    /// §4.3 "enqueue(task)".
    pub fn enqueue(&mut self, task: Task) -> ConnectionAction {
        if self.is_terminal_or_quiescing() {
            task.fail(Error::ClientClosedConnection);
            return ConnectionAction::Wait;
        }
        if matches!(self.state, State::ReadyForStatement) {
            self.dispatch(task)
        } else {
            self.tasks.push_back(task);
            ConnectionAction::Wait
        }
    }

    // ---- statement forwarding --------------------------------------------

    pub fn describe_info_received(&mut self, columns: Vec<Column>) -> ConnectionAction {
        self.forward_statement(|s| s.describe_info_received(columns))
    }

    pub fn row_header_received(&mut self, header: RowHeader) -> ConnectionAction {
        self.forward_statement(|s| s.row_header_received(header))
    }

    pub fn row_data_received(&mut self, row: DataRow) -> ConnectionAction {
        self.forward_statement(|s| s.row_data_received(row))
    }

    pub fn bit_vector_received(&mut self, bits: Vec<u8>) -> ConnectionAction {
        self.forward_statement(|s| s.bit_vector_received(bits))
    }

    pub fn query_parameter_received(&mut self, row_counts: Option<Vec<u64>>) -> ConnectionAction {
        self.forward_statement(|s| s.query_parameter_received(row_counts))
    }

    pub fn in_out_vector_received(&mut self, entry_count: usize) -> ConnectionAction {
        self.forward_statement(|s| s.in_out_vector_received(entry_count))
    }

    pub fn flush_out_binds_received(&mut self) -> ConnectionAction {
        self.forward_statement(|s| s.flush_out_binds_received())
    }

    pub fn channel_read_complete(&mut self) -> ConnectionAction {
        self.forward_statement(|s| s.channel_read_complete())
    }

    pub fn read_event_caught(&mut self) -> ConnectionAction {
        match &mut self.state {
            State::Statement(stmt) => {
                let action = stmt.read_event();
                if stmt.is_complete() {
                    self.state = State::ReadyForStatement;
                }
                map_statement_action(action)
            }
            _ => ConnectionAction::Read,
        }
    }

    pub fn backend_error_received(&mut self, err: BackendError) -> ConnectionAction {
        self.forward_statement(|s| s.backend_error_received(err))
    }

    pub fn cancel_statement_stream(&mut self) -> ConnectionAction {
        self.forward_statement(|s| s.cancel())
    }

    /// §6 "request-statement-rows": consumer backpressure demand.
    pub fn request_statement_rows(&mut self) -> ConnectionAction {
        self.forward_statement(|s| s.request_rows())
    }

    /// Forwards to the active statement and, if that call leaves it
    /// complete, brings the connection back to `ReadyForStatement` so a
    /// subsequent `ready_for_statement()` (the wire-level "readyForStatement"
    /// event) can dispatch whatever is queued behind it (§4.3
    /// "readyForStatement: after statement/ping/commit/rollback/LOB-op
    /// completes...") — unless the statement failed with a connection-fatal
    /// error (§4.3 "EvaluateErrorAtConnectionLevel consults
    /// shouldCloseConnection"), in which case the connection closes instead
    /// of being handed the next queued task over a dead session.
    fn forward_statement(&mut self, f: impl FnOnce(&mut StatementCore) -> StatementAction) -> ConnectionAction {
        match &mut self.state {
            State::Statement(stmt) => {
                let action = f(stmt);
                let complete = stmt.is_complete();
                match action {
                    StatementAction::FailStatement { promise, err, cleanup } if err.is_connection_fatal() => {
                        self.escalate_statement_failure(promise, err, cleanup)
                    }
                    other => {
                        if complete {
                            self.state = State::ReadyForStatement;
                        }
                        map_statement_action(other)
                    }
                }
            }
            _ => ConnectionAction::Wait,
        }
    }

    /// A statement failed with an error that also condemns the connection
    /// (§4.3 `shouldCloseConnection`, e.g. server errors 28/600 or an
    /// unexpected backend message). The statement's own `FailStatement`
    /// still reaches the caller so the statement's promise resolves with the
    /// real error, but the connection closes instead of returning to
    /// `ReadyForStatement` — carrying the queued tasks, marker-drain flag,
    /// and any pending quiescing close-promise in the failure's own
    /// `cleanup` slot (§4.3 "carry cleanup-context into the failure"), the
    /// same mechanism `run_cleanup`'s `State::Statement` arm uses.
    fn escalate_statement_failure(
        &mut self,
        promise: Promise<StatementOutcome>,
        err: Error,
        cleanup: Option<CleanUpContext>,
    ) -> ConnectionAction {
        warn!(error = %err, "connection-fatal error on active statement, closing connection");
        let cleanup = cleanup.unwrap_or_else(|| {
            let read = matches!(self.marker, MarkerState::OneSent);
            let close_promise = self.quiescing.take_close_promise();
            let tasks = std::mem::take(&mut self.tasks).into_iter().collect();
            CleanUpContext { tasks, error: clone_error(&err), read, close_promise }
        });
        self.state = State::Closed;
        ConnectionAction::Statement(StatementAction::FailStatement { promise, err, cleanup: Some(cleanup) })
    }

    /// Single entry point routing a [`ConnectionEvent`] to its dedicated
    /// handler (§6 "Inbound events"). The per-event methods above remain
    /// the primary API for callers that already know which event they
    /// have in hand; this exists for I/O layers that prefer to funnel
    /// everything through one parsed-event value.
    pub fn dispatch_event(&mut self, event: ConnectionEvent) -> ConnectionAction {
        match event {
            ConnectionEvent::Connected => self.connected(),
            ConnectionEvent::OobCheckComplete => self.oob_check_complete(),
            ConnectionEvent::TlsEstablished => self.tls_established(),
            ConnectionEvent::Accept { capabilities } => self.accept(capabilities),
            ConnectionEvent::ProtocolReceived => self.protocol_received(),
            ConnectionEvent::DataTypesReceived => self.data_types_received(),
            ConnectionEvent::MarkerReceived => self.marker_received(),
            ConnectionEvent::ParameterReceived { params } => self.parameter_received(params),
            ConnectionEvent::StatusReceived { status } => self.status_received(status),
            ConnectionEvent::DescribeInfoReceived { columns } => self.describe_info_received(columns),
            ConnectionEvent::RowHeaderReceived { header } => self.row_header_received(header),
            ConnectionEvent::RowDataReceived { row } => self.row_data_received(row),
            ConnectionEvent::BitVectorReceived { bits } => self.bit_vector_received(bits),
            ConnectionEvent::QueryParameterReceived { row_counts } => {
                self.query_parameter_received(row_counts)
            }
            ConnectionEvent::InOutVectorReceived { entry_count } => {
                self.in_out_vector_received(entry_count)
            }
            ConnectionEvent::FlushOutBindsReceived => self.flush_out_binds_received(),
            ConnectionEvent::BackendErrorReceived { err } => self.backend_error_received(err),
            ConnectionEvent::ChannelReadComplete => self.channel_read_complete(),
            ConnectionEvent::ReadEventCaught => self.read_event_caught(),
            ConnectionEvent::ErrorHappened { err } => self.error_happened(err),
            ConnectionEvent::Closed => self.closed(),
            ConnectionEvent::RenegotiatingTls => self.tls_initiated(),
            ConnectionEvent::CancelStatementStream => self.cancel_statement_stream(),
            // Acknowledgement that the consumer has disposed of the
            // cancelled stream; the cancel-ack path (backend-error-received
            // with is_cancel_ack) already drives CommandComplete, so this
            // is absorbed without a further state change.
            ConnectionEvent::StatementStreamCancelled => ConnectionAction::Wait,
            ConnectionEvent::RequestStatementRows => self.request_statement_rows(),
            ConnectionEvent::ReadyForStatementReceived => self.ready_for_statement(),
        }
    }

    // ---- close/cleanup --------------------------------------------------

    /// §4.3 "close(promise)".
    pub fn close(&mut self, promise: Option<Promise<()>>) -> ConnectionAction {
        trace!("close() requested, entering quiescing state");
        if let Some(p) = promise {
            self.quiescing = QuiescingState::Quiescing(Some(p));
        } else {
            self.quiescing = QuiescingState::Quiescing(None);
        }
        self.run_cleanup(Error::ClientClosedConnection)
    }

    /// §4.3 "errorHappened(err)".
    pub fn error_happened(&mut self, err: Error) -> ConnectionAction {
        debug!(error = %err, "error-happened");
        let auth_action = match &mut self.state {
            State::Authenticating(auth) if !auth.is_complete() => Some(auth.error_happened(err)),
            State::Statement(stmt) if !stmt.is_complete() => {
                let action = stmt.fail(err);
                if stmt.is_complete() {
                    self.state = State::ReadyForStatement;
                }
                return map_statement_action(action);
            }
            _ => None,
        };
        match auth_action {
            Some(action) => self.handle_auth_action(action),
            None => self.run_cleanup(err),
        }
    }

    /// §4.3 "closed() (channel inactive)".
    pub fn closed(&mut self) -> ConnectionAction {
        match self.state {
            State::LoggingOff(_) | State::Closing => {
                self.state = State::Closed;
                ConnectionAction::FireChannelInactive
            }
            State::Closed => ConnectionAction::Wait,
            _ => {
                warn!("channel closed outside logging-off/closing, treating as unclean shutdown");
                self.run_cleanup(Error::UncleanShutdown)
            }
        }
    }

    /// §4.3 "Cleanup pipeline (closeConnectionAndCleanup)".
    fn run_cleanup(&mut self, err: Error) -> ConnectionAction {
        debug!(error = %err, "running cleanup pipeline");
        let read = matches!(self.marker, MarkerState::OneSent);
        let close_promise = self.quiescing.take_close_promise();

        match std::mem::replace(&mut self.state, State::Closed) {
            State::Ping(promise) | State::Commit(promise) | State::Rollback(promise) => {
                let err_clone = clone_error(&err);
                self.fire_cleanup(promise, err, read, close_promise, err_clone)
            }
            State::LobOperation(mut ctx) => {
                let promise = ctx.promise.take();
                let err_clone = clone_error(&err);
                match promise {
                    Some(p) => self.fire_cleanup(p, err, read, close_promise, err_clone),
                    None => self.finish_cleanup(Vec::new(), err, read, close_promise),
                }
            }
            State::Authenticating(mut auth) => {
                if !auth.is_complete() {
                    let _ = auth.error_happened(clone_error(&err));
                }
                self.finish_cleanup(Vec::new(), err, read, close_promise)
            }
            State::Statement(mut stmt) => {
                if stmt.is_complete() {
                    return self.finish_cleanup(Vec::new(), err, read, close_promise);
                }
                match stmt.fail(clone_error(&err)) {
                    StatementAction::FailStatement { promise, err: stmt_err, .. } => {
                        let cleanup = CleanUpContext {
                            tasks: std::mem::take(&mut self.tasks).into_iter().collect(),
                            error: err,
                            read,
                            close_promise,
                        };
                        ConnectionAction::Statement(StatementAction::FailStatement {
                            promise,
                            err: stmt_err,
                            cleanup: Some(cleanup),
                        })
                    }
                    other => {
                        for task in std::mem::take(&mut self.tasks) {
                            task.fail(clone_error(&err));
                        }
                        if let Some(p) = close_promise {
                            let _ = p.send(Ok(()));
                        }
                        map_statement_action(other)
                    }
                }
            }
            State::LoggingOff(_) | State::Closing | State::Closed => {
                self.state = State::Closed;
                ConnectionAction::Wait
            }
            _ => self.finish_cleanup(Vec::new(), err, read, close_promise),
        }
    }

    fn fire_cleanup(
        &mut self,
        promise: Promise<()>,
        err: Error,
        read: bool,
        close_promise: Option<Promise<()>>,
        err_for_cleanup: Error,
    ) -> ConnectionAction {
        let _ = promise.send(Err(err));
        self.finish_cleanup(Vec::new(), err_for_cleanup, read, close_promise)
    }

    fn finish_cleanup(
        &mut self,
        mut tasks: Vec<Task>,
        err: Error,
        read: bool,
        close_promise: Option<Promise<()>>,
    ) -> ConnectionAction {
        tasks.extend(std::mem::take(&mut self.tasks));
        let unclean = err.is_unclean_shutdown();
        let cleanup = CleanUpContext { tasks, error: err, read, close_promise };
        self.state = State::Closed;
        if unclean {
            ConnectionAction::FireChannelInactive
        } else {
            ConnectionAction::CloseAndCleanup(cleanup)
        }
    }
}

impl Default for ConnectionCore {
    fn default() -> Self {
        Self::new()
    }
}

fn clone_error(err: &Error) -> Error {
    match err {
        Error::ClientClosedConnection => Error::ClientClosedConnection,
        Error::ClientClosesConnection => Error::ClientClosesConnection,
        Error::UncleanShutdown => Error::UncleanShutdown,
        Error::Server(be) => Error::Server(be.clone()),
        other => Error::protocol(other.to_string()),
    }
}

fn map_auth_action(action: AuthAction) -> ConnectionAction {
    match action {
        AuthAction::SendFastAuth => ConnectionAction::SendFastAuth(Box::new(placeholder_ctx())),
        AuthAction::SendAuthPhaseOne => ConnectionAction::SendAuthPhaseOne(Box::new(placeholder_ctx())),
        AuthAction::SendAuthPhaseTwo => {
            ConnectionAction::SendAuthPhaseTwo(Box::new(placeholder_ctx()), Parameters::new())
        }
        AuthAction::Authenticated(params) => ConnectionAction::Authenticated(params),
        AuthAction::Fail(err) => ConnectionAction::CloseAndCleanup(CleanUpContext {
            tasks: Vec::new(),
            error: err,
            read: false,
            close_promise: None,
        }),
        AuthAction::None => ConnectionAction::Wait,
    }
}

/// Authentication send-actions carry the statement-free credential context;
/// the core does not construct wire payloads (§1), so the placeholder here
/// simply marks "no SQL attached" for the I/O layer's auth request builder.
fn placeholder_ctx() -> StatementContext {
    let (tx, _rx) = tokio::sync::oneshot::channel();
    StatementContext::new(String::new(), crate::core::model::StatementKind::Plain, tx)
}

fn map_statement_action(action: StatementAction) -> ConnectionAction {
    ConnectionAction::Statement(action)
}

#[allow(dead_code)]
fn unused_type_reference(_: Bind, _: BindDirection) {}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps(oob: bool, version: u16, fast_auth: bool) -> Capabilities {
        Capabilities { supports_oob: oob, protocol_version: version, supports_fast_auth: fast_auth }
    }

    #[test]
    fn connected_sends_connect() {
        let mut core = ConnectionCore::new();
        assert!(matches!(core.connected(), ConnectionAction::SendConnect));
        assert!(matches!(core.state, State::ConnectMessageSent));
    }

    #[test]
    fn accept_with_oob_support_sends_oob_check() {
        let mut core = ConnectionCore::new();
        core.connected();
        let action = core.accept(caps(true, 320, true));
        assert!(matches!(action, ConnectionAction::SendOobCheck));
        assert!(matches!(core.state, State::OobCheckInProgress { fast_auth_hint: true }));
    }

    #[test]
    fn accept_with_fast_auth_only_provides_context() {
        let mut core = ConnectionCore::new();
        core.connected();
        let action = core.accept(caps(false, 300, true));
        assert!(matches!(
            action,
            ConnectionAction::ProvideAuthenticationContext(AuthContextMode::Allowed)
        ));
    }

    #[test]
    fn accept_without_oob_or_fast_auth_sends_protocol() {
        let mut core = ConnectionCore::new();
        core.connected();
        let action = core.accept(caps(false, 300, false));
        assert!(matches!(action, ConnectionAction::SendProtocol));
        assert!(matches!(core.state, State::ProtocolMessageSent));
    }

    #[test]
    fn full_classic_handshake_reaches_ready_for_statement() {
        let mut core = ConnectionCore::new();
        core.connected();
        core.accept(caps(false, 300, false));
        core.protocol_received();
        core.data_types_received();
        core.provide_authentication_context();
        let action = core.parameter_received(Parameters::new());
        assert!(matches!(action, ConnectionAction::Authenticated(_)));
        assert!(matches!(core.state, State::ReadyForStatement));
    }

    #[test]
    fn dispatch_event_routes_connected_through_single_entry_point() {
        let mut core = ConnectionCore::new();
        let action = core.dispatch_event(crate::core::event::ConnectionEvent::Connected);
        assert!(matches!(action, ConnectionAction::SendConnect));
    }

    #[test]
    fn marker_received_sends_once_then_absorbs() {
        let mut core = ConnectionCore::new();
        assert!(matches!(core.marker_received(), ConnectionAction::SendMarker { read: false }));
        assert!(matches!(core.marker_received(), ConnectionAction::Wait));
        assert!(matches!(core.marker, MarkerState::NoneSent));
    }

    #[test]
    fn enqueue_while_closed_fails_task_immediately() {
        let mut core = ConnectionCore::new();
        core.state = State::Closed;
        let (tx, rx) = tokio::sync::oneshot::channel();
        core.enqueue(Task::Ping(tx));
        assert!(matches!(rx.try_recv(), Ok(Err(Error::ClientClosedConnection))));
    }

    #[test]
    fn ready_for_statement_dispatches_queued_ping() {
        let mut core = ConnectionCore::new();
        core.state = State::ReadyForStatement;
        let (tx, _rx) = tokio::sync::oneshot::channel();
        core.tasks.push_back(Task::Ping(tx));
        let action = core.ready_for_statement();
        assert!(matches!(action, ConnectionAction::SendPing));
        assert!(matches!(core.state, State::Ping(_)));
    }

    #[test]
    fn ready_for_statement_with_empty_queue_fires_event() {
        let mut core = ConnectionCore::new();
        core.state = State::ReadyForStatement;
        let action = core.ready_for_statement();
        assert!(matches!(action, ConnectionAction::FireEventReadyForStatement));
    }

    #[test]
    fn status_received_succeeds_active_ping() {
        let mut core = ConnectionCore::new();
        let (tx, rx) = tokio::sync::oneshot::channel();
        core.state = State::Ping(tx);
        let action = core.status_received(BackendError::default());
        assert!(matches!(action, ConnectionAction::SucceedPing(_)));
        if let ConnectionAction::SucceedPing(p) = action {
            let _ = p.send(Ok(()));
        }
        assert!(matches!(rx.try_recv(), Ok(Ok(()))));
        assert!(matches!(core.state, State::ReadyForStatement));
    }

    #[test]
    fn close_enters_cleanup_pipeline() {
        let mut core = ConnectionCore::new();
        core.state = State::ReadyForStatement;
        let action = core.close(None);
        assert!(matches!(action, ConnectionAction::CloseAndCleanup(_)));
        assert!(core.is_closed());
    }

    #[test]
    fn closed_from_logging_off_fires_channel_inactive() {
        let mut core = ConnectionCore::new();
        core.state = State::LoggingOff(None);
        let action = core.closed();
        assert!(matches!(action, ConnectionAction::FireChannelInactive));
        assert!(core.is_closed());
    }

    #[test]
    fn closed_from_ready_for_statement_is_unclean_shutdown() {
        let mut core = ConnectionCore::new();
        core.state = State::ReadyForStatement;
        let action = core.closed();
        assert!(matches!(action, ConnectionAction::FireChannelInactive));
        assert!(core.is_closed());
    }

    #[test]
    fn tls_established_outside_renegotiating_is_noop() {
        let mut core = ConnectionCore::new();
        let action = core.tls_established();
        assert!(matches!(action, ConnectionAction::Wait));
    }

    #[test]
    fn tls_established_during_renegotiation_reissues_connect() {
        let mut core = ConnectionCore::new();
        core.tls_initiated();
        let action = core.tls_established();
        assert!(matches!(action, ConnectionAction::SendConnect));
    }
}
