//! `StatementCore` (§4.2): drives one statement end-to-end — execute,
//! describe, fetch, and cancel. No I/O; only already-parsed messages in,
//! actions out.

use crate::core::action::StatementAction;
use crate::core::model::{
    BindDirection, Column, DataRow, DescribeInfo, NoRowsResult, RowHeader, StatementContext,
    StatementKind, StatementOutcome,
};
use crate::core::row_stream::RowStreamCore;
use crate::error::{BackendError, Error, ExceptionClass};
use tracing::{debug, trace};

/// Oracle integrity-constraint error numbers (unique/foreign-key/check),
/// used to decide whether a forwarded stream error should suppress its
/// cursor-id (§4.2 "suppress the cursor-id... when integrity class").
fn classify(number: u32) -> ExceptionClass {
    match number {
        1 | 1400 | 1407 | 2290 | 2291 | 2292 | 2293 => ExceptionClass::Integrity,
        _ => ExceptionClass::Other,
    }
}

enum State {
    Initialized,
    RowCountsReceived { row_counts: Vec<u64> },
    DescribeInfoReceived,
    Streaming { stream: RowStreamCore },
    /// Entered on client cancellation; holds the describe columns purely
    /// for diagnostics, subsequent row/header events are discarded.
    Drain,
    CommandComplete,
    Error,
}

pub struct StatementCore {
    ctx: StatementContext,
    state: State,
    describe: Option<DescribeInfo>,
    row_header: RowHeader,
    cancelled: bool,
    /// Becomes true the first time the statement's promise is surrendered
    /// via `SucceedStatement`/`FailStatement` (§4.2 "at most once").
    promise_settled: bool,
}

impl StatementCore {
    /// §4.2 "Start".
    pub fn start(mut ctx: StatementContext) -> (Self, StatementAction) {
        let (state, describe) = match std::mem::replace(&mut ctx.kind, StatementKind::Plain) {
            StatementKind::Cursor(describe) => {
                ctx.kind = StatementKind::Cursor(describe.clone());
                (State::DescribeInfoReceived, Some(describe))
            }
            other => {
                ctx.kind = other;
                (State::Initialized, None)
            }
        };
        let action = StatementAction::SendExecute {
            describe: false,
            cursor_id: Some(ctx.cursor_id).filter(|&id| id != 0),
            requires_define: ctx.requires_define,
            no_prefetch: ctx.no_prefetch,
        };
        trace!(cursor_id = ctx.cursor_id, "statement start -> {:?}", action);
        (
            Self {
                ctx,
                state,
                describe,
                row_header: RowHeader::default(),
                cancelled: false,
                promise_settled: false,
            },
            action,
        )
    }

    pub fn is_complete(&self) -> bool {
        matches!(self.state, State::CommandComplete | State::Error)
    }

    fn stream_mut(&mut self) -> Option<&mut RowStreamCore> {
        match &mut self.state {
            State::Streaming { stream } => Some(stream),
            _ => None,
        }
    }

    fn take_promise(&mut self) -> Option<crate::core::model::Promise<StatementOutcome>> {
        if self.promise_settled {
            return None;
        }
        self.promise_settled = true;
        self.ctx.promise.take()
    }

    fn succeed_with(&mut self, result: StatementOutcome) -> StatementAction {
        match self.take_promise() {
            Some(promise) => StatementAction::SucceedStatement { promise, result },
            None => StatementAction::None,
        }
    }

    fn fail_with(&mut self, err: Error) -> StatementAction {
        debug!(error = %err, "statement failed");
        self.state = State::Error;
        match self.take_promise() {
            Some(promise) => StatementAction::FailStatement { promise, err, cleanup: None },
            None => StatementAction::None,
        }
    }

    /// §4.2 "describe-info(d)": valid only in Initialized.
    pub fn describe_info_received(&mut self, columns: Vec<Column>) -> StatementAction {
        if matches!(self.state, State::Initialized) {
            self.describe = Some(DescribeInfo::new(columns));
            self.state = State::DescribeInfoReceived;
        }
        StatementAction::Wait
    }

    /// §4.2 "row-header(rh)".
    pub fn row_header_received(&mut self, header: RowHeader) -> StatementAction {
        match &mut self.state {
            State::DescribeInfoReceived => {
                let describe = self.describe.clone().unwrap_or_default();
                self.row_header = header;
                self.state = State::Streaming { stream: RowStreamCore::new() };
                self.succeed_with(StatementOutcome::Describe(describe))
            }
            State::Streaming { .. } => {
                if self.row_header.bit_vector.is_none() {
                    self.row_header = header;
                }
                StatementAction::Wait
            }
            _ => StatementAction::Wait,
        }
    }

    /// §4.2 "row-data(row)".
    pub fn row_data_received(&mut self, mut row: DataRow) -> StatementAction {
        match &mut self.state {
            State::Initialized if self.has_out_binds() => {
                self.write_out_bind_row(row);
                StatementAction::Wait
            }
            State::Streaming { stream } => {
                for (index, column) in row.columns.iter_mut().enumerate() {
                    if self.row_header.is_duplicate(index) {
                        *column = stream.receive_duplicate(index);
                    }
                }
                self.row_header.bit_vector = None;
                stream.receive_row(row);
                StatementAction::Wait
            }
            State::Drain => StatementAction::Wait,
            _ => StatementAction::Wait,
        }
    }

    fn has_out_binds(&self) -> bool {
        self.ctx
            .binds
            .iter()
            .any(|b| matches!(b.direction, Some(BindDirection::Out | BindDirection::InOut)))
    }

    /// Writes a "returning into" row into the first out/in-out bind,
    /// supporting the multi-row case (§4.2 "handling returning-into
    /// multi-row case").
    fn write_out_bind_row(&mut self, row: DataRow) {
        if let Some(bind) = self
            .ctx
            .binds
            .iter_mut()
            .find(|b| matches!(b.direction, Some(BindDirection::Out | BindDirection::InOut)))
        {
            for column in row.columns.into_iter().flatten() {
                bind.out_rows.push(column);
            }
        }
    }

    /// §4.2 "bit-vector(bv)".
    pub fn bit_vector_received(&mut self, bits: Vec<u8>) -> StatementAction {
        if matches!(self.state, State::Streaming { .. }) {
            self.row_header.bit_vector = Some(bits);
        }
        StatementAction::Wait
    }

    /// §4.2 "query-parameter(qp)".
    pub fn query_parameter_received(&mut self, row_counts: Option<Vec<u64>>) -> StatementAction {
        if let Some(row_counts) = row_counts {
            self.state = State::RowCountsReceived { row_counts };
        }
        StatementAction::Wait
    }

    /// §4.2 "in-out-vector(v)".
    pub fn in_out_vector_received(&mut self, entry_count: usize) -> StatementAction {
        if entry_count != self.ctx.binds.len() {
            return self.fail_with(Error::UnexpectedBackendMessage { kind: "in-out-vector" });
        }
        StatementAction::Wait
    }

    /// §4.2 "flush-out-binds".
    pub fn flush_out_binds_received(&mut self) -> StatementAction {
        StatementAction::SendFlushOutBinds
    }

    /// §4.2 "channel-read-complete".
    pub fn channel_read_complete(&mut self) -> StatementAction {
        match self.stream_mut() {
            Some(stream) => match stream.batch_complete() {
                Some(rows) => StatementAction::ForwardRows(rows),
                None => StatementAction::Wait,
            },
            None => StatementAction::Wait,
        }
    }

    /// §4.2 "read-event".
    pub fn read_event(&mut self) -> StatementAction {
        match self.stream_mut() {
            Some(stream) => match stream.read_signal() {
                crate::core::action::RowStreamAction::Read => StatementAction::Read,
                crate::core::action::RowStreamAction::Wait => StatementAction::Wait,
                crate::core::action::RowStreamAction::Rows(rows) => StatementAction::ForwardRows(rows),
            },
            None => StatementAction::Read,
        }
    }

    /// §6 "request-statement-rows": the row consumer is asking for more
    /// rows (backpressure demand signal forwarded into the active stream).
    pub fn request_rows(&mut self) -> StatementAction {
        match self.stream_mut() {
            Some(stream) => match stream.demand_more() {
                crate::core::action::RowStreamAction::Read => StatementAction::Read,
                crate::core::action::RowStreamAction::Wait => StatementAction::Wait,
                crate::core::action::RowStreamAction::Rows(rows) => StatementAction::ForwardRows(rows),
            },
            None => StatementAction::Wait,
        }
    }

    /// §4.2 server-error decision table.
    pub fn backend_error_received(&mut self, err: BackendError) -> StatementAction {
        trace!(number = err.number, cursor_id = ?err.cursor_id, "statement backend-error-received");
        // Learn the server-assigned cursor id the first time it is reported
        // (§4.2, §9: sticky once set, reused across fetch/re-execute).
        if let Some(cursor_id) = err.cursor_id {
            if cursor_id != 0 {
                self.ctx.cursor_id = cursor_id as u32;
            }
        }
        if err.is_cancel_ack() && self.cancelled {
            self.state = State::CommandComplete;
            return StatementAction::ForwardStreamError {
                err: Error::server(err),
                read: false,
                cursor_id: None,
                client_cancelled: true,
            };
        }

        if err.is_end_of_fetch() {
            return self.handle_end_of_fetch(err);
        }

        if err.number == BackendError::VAR_NOT_IN_SELECT_LIST && err.cursor_id.is_some() {
            return match self.state {
                State::Initialized => self.fail_with(Error::server(err)),
                _ => {
                    let cursor_id = err.cursor_id;
                    StatementAction::ForwardStreamError {
                        err: Error::server(err),
                        read: false,
                        cursor_id,
                        client_cancelled: false,
                    }
                }
            };
        }

        if err.number != 0 && err.cursor_id.is_some() {
            let suppress_cursor = classify(err.number) == ExceptionClass::Integrity;
            let cursor_id = if suppress_cursor { None } else { err.cursor_id };
            return StatementAction::ForwardStreamError {
                err: Error::server(err),
                read: false,
                cursor_id,
                client_cancelled: false,
            };
        }

        if err.number == 0 && matches!(self.state, State::DescribeInfoReceived) {
            return self.handle_redescribe();
        }

        // A post-cancellation fetch continuation (number=0, a cursor still
        // open) while draining: keep pulling from the same cursor rather
        // than treating it as end-of-fetch (§8 S4).
        if err.number == 0 && matches!(self.state, State::Drain) {
            return StatementAction::SendFetch {
                cursor_id: Some(self.ctx.cursor_id).filter(|&id| id != 0),
            };
        }

        if err.number != 0
            && err.cursor_id.is_none()
            && !matches!(self.state, State::Drain | State::CommandComplete)
        {
            return self.fail_with(Error::server(err));
        }

        StatementAction::Wait
    }

    fn handle_end_of_fetch(&mut self, err: BackendError) -> StatementAction {
        match &mut self.state {
            State::Initialized | State::DescribeInfoReceived | State::RowCountsReceived { .. } => {
                let row_counts = match std::mem::replace(&mut self.state, State::CommandComplete) {
                    State::RowCountsReceived { row_counts } => Some(row_counts),
                    _ => None,
                };
                let result = NoRowsResult {
                    affected_rows: err.row_count.unwrap_or(0),
                    row_counts,
                    batch_errors: err.batch_errors.clone(),
                };
                self.succeed_with(StatementOutcome::NoRows(result))
            }
            State::Streaming { stream } => {
                let rows = stream.batch_complete().unwrap_or_default();
                self.state = State::CommandComplete;
                StatementAction::ForwardStreamComplete {
                    rows,
                    cursor_id: self.ctx.cursor_id,
                    affected_rows: err.row_count.unwrap_or(0),
                    last_row_id: err.row_id,
                }
            }
            State::Drain | State::CommandComplete | State::Error => StatementAction::Wait,
        }
    }

    fn handle_redescribe(&mut self) -> StatementAction {
        let needs_rewrite = self
            .describe
            .as_ref()
            .map(DescribeInfo::has_lob_json_or_vector_column)
            .unwrap_or(false);
        if needs_rewrite && !self.ctx.options.fetch_lobs {
            if let Some(describe) = &mut self.describe {
                describe.rewrite_lobs_as_longs();
            }
            self.ctx.requires_define = true;
            self.ctx.no_prefetch = true;
            StatementAction::SendExecute {
                describe: true,
                cursor_id: Some(self.ctx.cursor_id).filter(|&id| id != 0),
                requires_define: true,
                no_prefetch: true,
            }
        } else {
            StatementAction::SendFetch {
                cursor_id: Some(self.ctx.cursor_id).filter(|&id| id != 0),
            }
        }
    }

    /// Connection-level error forwarding (§4.3 cleanup pipeline: "ask
    /// StatementCore to fail"). Distinct from the backend-error decision
    /// table (`backend_error_received`), which only ever interprets
    /// server-reported error *numbers* — this path carries an
    /// already-classified [`Error`] from the connection/transport layer
    /// (e.g. a transport failure or unclean shutdown) and must settle the
    /// statement's promise or stream exactly as that table's terminal
    /// branches do, regardless of which state the statement is parked in.
    pub fn fail(&mut self, err: Error) -> StatementAction {
        match &mut self.state {
            State::Streaming { stream } => {
                let read_needed = stream.fail();
                self.state = State::Drain;
                StatementAction::ForwardStreamError {
                    err,
                    read: read_needed,
                    cursor_id: None,
                    client_cancelled: false,
                }
            }
            State::Drain | State::CommandComplete | State::Error => StatementAction::Wait,
            State::Initialized | State::RowCountsReceived { .. } | State::DescribeInfoReceived => {
                self.fail_with(err)
            }
        }
    }

    /// §4.2 "cancel()". Idempotent after the first call.
    pub fn cancel(&mut self) -> StatementAction {
        if self.cancelled {
            return StatementAction::Wait;
        }
        trace!("statement cancel()");
        self.cancelled = true;

        match &mut self.state {
            State::RowCountsReceived { .. } | State::DescribeInfoReceived => {
                self.fail_with(Error::StatementCancelled)
            }
            State::Streaming { stream } => {
                let read_needed = stream.fail();
                self.state = State::Drain;
                StatementAction::ForwardStreamError {
                    err: Error::StatementCancelled,
                    read: read_needed,
                    cursor_id: None,
                    client_cancelled: true,
                }
            }
            State::Initialized | State::Drain | State::CommandComplete | State::Error => {
                StatementAction::Wait
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::{Bind, Parameters, StatementOptions};
    use tokio::sync::oneshot;

    fn ctx(kind: StatementKind) -> StatementContext {
        let (tx, _rx) = oneshot::channel();
        StatementContext::new("select 1 from dual", kind, tx)
    }

    #[test]
    fn start_plain_statement_sends_execute_without_describe() {
        let (_core, action) = StatementCore::start(ctx(StatementKind::Query));
        assert!(matches!(
            action,
            StatementAction::SendExecute { describe: false, cursor_id: None, .. }
        ));
    }

    #[test]
    fn start_reusable_cursor_enters_describe_info_received() {
        let describe = DescribeInfo::new(vec![]);
        let (core, _action) = StatementCore::start(ctx(StatementKind::Cursor(describe)));
        assert!(matches!(core.state, State::DescribeInfoReceived));
    }

    #[test]
    fn row_header_in_describe_info_received_succeeds_statement_once() {
        let (mut core, _) = StatementCore::start(ctx(StatementKind::Query));
        core.describe_info_received(vec![]);
        let action = core.row_header_received(RowHeader::default());
        assert!(matches!(action, StatementAction::SucceedStatement { .. }));
        assert!(matches!(core.state, State::Streaming { .. }));

        // second row-header in Streaming must not re-succeed.
        let action2 = core.row_header_received(RowHeader::default());
        assert!(matches!(action2, StatementAction::Wait));
    }

    #[test]
    fn end_of_fetch_in_initialized_succeeds_no_rows() {
        let (mut core, _) = StatementCore::start(ctx(StatementKind::Dml));
        let action = core.backend_error_received(BackendError {
            number: BackendError::NO_DATA_FOUND,
            row_count: Some(3),
            ..Default::default()
        });
        assert!(matches!(
            action,
            StatementAction::SucceedStatement {
                result: StatementOutcome::NoRows(NoRowsResult { affected_rows: 3, .. }),
                ..
            }
        ));
        assert!(core.is_complete());
    }

    #[test]
    fn end_of_fetch_while_streaming_forwards_stream_complete() {
        let (mut core, _) = StatementCore::start(ctx(StatementKind::Query));
        core.describe_info_received(vec![]);
        core.row_header_received(RowHeader::default());
        core.row_data_received(DataRow::new(vec![Some(b"x".to_vec())]));
        let action = core.backend_error_received(BackendError {
            number: BackendError::NO_DATA_FOUND,
            row_count: Some(1),
            ..Default::default()
        });
        assert!(matches!(
            action,
            StatementAction::ForwardStreamComplete { affected_rows: 1, .. }
        ));
        assert!(core.is_complete());
    }

    #[test]
    fn cancel_while_streaming_drains_and_forwards_client_cancelled() {
        let (mut core, _) = StatementCore::start(ctx(StatementKind::Query));
        core.describe_info_received(vec![]);
        core.row_header_received(RowHeader::default());
        let action = core.cancel();
        assert!(matches!(
            action,
            StatementAction::ForwardStreamError { client_cancelled: true, .. }
        ));
        assert!(matches!(core.state, State::Drain));

        // idempotent
        assert!(matches!(core.cancel(), StatementAction::Wait));
    }

    #[test]
    fn cancel_ack_after_cancellation_completes_command() {
        let (mut core, _) = StatementCore::start(ctx(StatementKind::Query));
        core.describe_info_received(vec![]);
        core.row_header_received(RowHeader::default());
        core.cancel();
        let action = core.backend_error_received(BackendError {
            number: BackendError::USER_CANCELLED,
            ..Default::default()
        });
        assert!(matches!(
            action,
            StatementAction::ForwardStreamError { client_cancelled: true, .. }
        ));
        assert!(core.is_complete());
    }

    #[test]
    fn var_not_in_select_list_in_initialized_fails_statement() {
        let (mut core, _) = StatementCore::start(ctx(StatementKind::Query));
        let action = core.backend_error_received(BackendError {
            number: BackendError::VAR_NOT_IN_SELECT_LIST,
            cursor_id: Some(5),
            ..Default::default()
        });
        assert!(matches!(action, StatementAction::FailStatement { .. }));
        assert!(core.is_complete());
    }

    #[test]
    fn integrity_error_suppresses_cursor_id() {
        let (mut core, _) = StatementCore::start(ctx(StatementKind::Query));
        core.describe_info_received(vec![]);
        core.row_header_received(RowHeader::default());
        let action = core.backend_error_received(BackendError {
            number: 1,
            cursor_id: Some(7),
            ..Default::default()
        });
        match action {
            StatementAction::ForwardStreamError { cursor_id, .. } => assert_eq!(cursor_id, None),
            other => panic!("unexpected action: {other:?}"),
        }
    }

    #[test]
    fn redescribe_with_lob_column_and_no_fetch_lobs_rewrites_and_reexecutes() {
        let (mut core, _) = StatementCore::start(ctx(StatementKind::Query));
        core.describe_info_received(vec![Column {
            name: "B".into(),
            oracle_type: crate::protocol::constants::ORA_TYPE_NUM_BLOB,
            precision: 0,
            scale: 0,
            buffer_size: 0,
            nullable: true,
            vector_metadata: None,
            type_scheme: None,
            type_name: None,
            annotations: vec![],
        }]);
        let action = core.backend_error_received(BackendError::default());
        assert!(matches!(
            action,
            StatementAction::SendExecute { requires_define: true, no_prefetch: true, .. }
        ));
        assert_eq!(
            core.describe.as_ref().unwrap().columns[0].oracle_type,
            crate::protocol::constants::ORA_TYPE_NUM_LONG_RAW
        );
    }

    #[test]
    fn redescribe_without_lob_columns_sends_fetch() {
        let (mut core, _) = StatementCore::start(ctx(StatementKind::Query));
        core.describe_info_received(vec![]);
        let action = core.backend_error_received(BackendError::default());
        assert!(matches!(action, StatementAction::SendFetch { .. }));
    }

    #[test]
    fn out_bind_rows_accumulate_in_initialized() {
        let mut context = ctx(StatementKind::PlSql);
        context.binds.push(Bind {
            direction: Some(BindDirection::Out),
            value: None,
            out_rows: vec![],
        });
        let (mut core, _) = StatementCore::start(context);
        core.row_data_received(DataRow::new(vec![Some(b"row1".to_vec())]));
        assert_eq!(core.ctx.binds[0].out_rows, vec![b"row1".to_vec()]);
    }

    #[allow(dead_code)]
    fn unused_parameters_type_reference(_: Parameters, _: StatementOptions) {}
}
