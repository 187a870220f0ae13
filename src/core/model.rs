//! Shared data model for the session/statement state machines (§3).
//!
//! Nothing in this module performs I/O. Types here are the currency the
//! core trades in: they are built from already-parsed backend messages by
//! the I/O layer and handed to `ConnectionCore`/`StatementCore` entry
//! points, and handed back out again inside emitted [`crate::core::action`]
//! values.

use std::collections::HashMap;

use crate::protocol::constants::{
    ORA_TYPE_NUM_BLOB, ORA_TYPE_NUM_CLOB, ORA_TYPE_NUM_JSON, ORA_TYPE_NUM_LONG,
    ORA_TYPE_NUM_LONG_NVARCHAR, ORA_TYPE_NUM_LONG_RAW, ORA_TYPE_NUM_NCLOB, ORA_TYPE_NUM_VECTOR,
};

pub use crate::error::{BackendError, ExceptionClass};

/// Single-fulfillment completion channel. The core owns the sender side
/// until it surrenders it as part of an emitted action (§3 "Ownership").
pub type Promise<T> = tokio::sync::oneshot::Sender<crate::error::Result<T>>;

/// Key/value parameters sent by the server (§3 "Parameter").
pub type Parameters = HashMap<String, String>;

/// Vector column metadata (dimensions/format/flags), present on 23.4+ wire
/// versions for VECTOR columns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VectorMetadata {
    pub dimensions: u32,
    pub format: u8,
    pub flags: u8,
}

/// A single column descriptor, as the core sees it (§3 "DescribeInfo").
///
/// This is a superset of `protocol::types::ColumnMetadata`: it adds the
/// fields the core needs to reason about LOB/JSON/vector re-describe
/// (§4.2) that the wire-decode layer does not need to carry.
#[derive(Debug, Clone)]
pub struct Column {
    pub name: String,
    pub oracle_type: u16,
    pub precision: i8,
    pub scale: i8,
    pub buffer_size: u32,
    pub nullable: bool,
    pub vector_metadata: Option<VectorMetadata>,
    pub type_scheme: Option<String>,
    pub type_name: Option<String>,
    pub annotations: Vec<(String, String)>,
}

impl Column {
    /// LOB, JSON, or VECTOR columns trigger the §4.2 re-describe dance when
    /// the session does not want LOB objects back.
    pub fn is_lob_json_or_vector(&self) -> bool {
        matches!(
            self.oracle_type,
            ORA_TYPE_NUM_BLOB | ORA_TYPE_NUM_CLOB | ORA_TYPE_NUM_NCLOB | ORA_TYPE_NUM_JSON
        ) || self.oracle_type == ORA_TYPE_NUM_VECTOR
    }

    /// Rewrite this column in place per §4.2: BLOB→LONG_RAW, CLOB→LONG,
    /// NCLOB→LONG_NVARCHAR, recomputing the buffer size from the new
    /// type's default size and a length factor. Columns that are not
    /// LOB/JSON/vector, or have no defined LONG-family substitute (JSON,
    /// VECTOR), are left untouched — the caller decides via
    /// `is_lob_json_or_vector` whether rewriting is even attempted, and
    /// only BLOB/CLOB/NCLOB actually have a substitute type in the source
    /// protocol.
    pub fn rewrite_as_long(&mut self) {
        const LONG_DEFAULT_SIZE: u32 = 2 * 1024 * 1024 * 1024 - 1;
        const LONG_RAW_DEFAULT_SIZE: u32 = 2 * 1024 * 1024 * 1024 - 1;
        const LONG_NVARCHAR_DEFAULT_SIZE: u32 = 2 * 1024 * 1024 * 1024 - 1;

        match self.oracle_type {
            ORA_TYPE_NUM_BLOB => {
                self.oracle_type = ORA_TYPE_NUM_LONG_RAW;
                self.buffer_size = LONG_RAW_DEFAULT_SIZE;
            }
            ORA_TYPE_NUM_CLOB => {
                self.oracle_type = ORA_TYPE_NUM_LONG;
                self.buffer_size = LONG_DEFAULT_SIZE;
            }
            ORA_TYPE_NUM_NCLOB => {
                self.oracle_type = ORA_TYPE_NUM_LONG_NVARCHAR;
                self.buffer_size = LONG_NVARCHAR_DEFAULT_SIZE;
            }
            _ => {}
        }
    }
}

/// Column metadata for a result set (§3 "DescribeInfo"). Immutable after
/// initial receipt except for the in-place LOB→LONG rewrite of §4.2.
#[derive(Debug, Clone, Default)]
pub struct DescribeInfo {
    pub columns: Vec<Column>,
}

impl DescribeInfo {
    pub fn new(columns: Vec<Column>) -> Self {
        Self { columns }
    }

    /// Whether any column needs the LOB/JSON/vector re-describe treatment.
    pub fn has_lob_json_or_vector_column(&self) -> bool {
        self.columns.iter().any(Column::is_lob_json_or_vector)
    }

    /// Rewrite every BLOB/CLOB/NCLOB column to its LONG-family substitute.
    /// Columns with no LONG substitute (JSON, VECTOR) are left as-is; the
    /// caller still sets `requires_define`/`no_prefetch` regardless, since
    /// those columns still need client-side define handling.
    pub fn rewrite_lobs_as_longs(&mut self) {
        for column in &mut self.columns {
            if column.is_lob_json_or_vector() {
                column.rewrite_as_long();
            }
        }
    }
}

/// Per-row-batch metadata (§3 "RowHeader").
///
/// A non-nil bit-vector persists across rows within one batch until a new
/// `RowHeader` with a non-nil bit-vector replaces it (§4.2), and is cleared
/// after being consumed by a full row.
#[derive(Debug, Clone, Default)]
pub struct RowHeader {
    /// Bit `i` clear (0) means column `i` duplicates the previous row's
    /// value and was omitted on the wire.
    pub bit_vector: Option<Vec<u8>>,
}

impl RowHeader {
    pub fn new(bit_vector: Option<Vec<u8>>) -> Self {
        Self { bit_vector }
    }

    /// True if bit `index` is clear, i.e. column `index` duplicates the
    /// previous row's value in this batch.
    pub fn is_duplicate(&self, index: usize) -> bool {
        match &self.bit_vector {
            None => false,
            Some(bits) => {
                let byte = index / 8;
                let bit = index % 8;
                match bits.get(byte) {
                    Some(b) => b & (1 << bit) == 0,
                    None => false,
                }
            }
        }
    }
}

/// A single column value's wire bytes, with the length-prefix framing
/// already interpreted: `None` means the column was null (§6 wire-format
/// notes — a single 0x00 length byte).
pub type ColumnSlice = Option<Vec<u8>>;

/// An ordered sequence of opaque column byte slices (§3 "DataRow").
#[derive(Debug, Clone, Default)]
pub struct DataRow {
    pub columns: Vec<ColumnSlice>,
}

impl DataRow {
    pub fn new(columns: Vec<ColumnSlice>) -> Self {
        Self { columns }
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// The kind of SQL a statement carries, determining how its completion is
/// reported (§3 "StatementContext").
#[derive(Debug, Clone, PartialEq)]
pub enum StatementKind {
    Ddl,
    Dml,
    PlSql,
    Query,
    /// A reusable ref-cursor: carries the describe-info the caller already
    /// has, so `StatementCore::start` can skip straight to
    /// `DescribeInfoReceived` (§4.2 "Start").
    Cursor(DescribeInfo),
    Plain,
}

/// Bind direction, used to decide how `in-out-vector`/`row-data` events are
/// applied to a bind (§3 "StatementContext" — "bind set"; §4.2 "Out-binds
/// with returning into").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindDirection {
    In,
    Out,
    InOut,
}

/// A single bind value. Encoding/decoding of the opaque payload is out of
/// scope for the core (§1); `out_rows` accumulates the rows a
/// "returning into" out-bind produces as `row-data` events arrive while
/// still `Initialized` (§4.2).
#[derive(Debug, Clone, Default)]
pub struct Bind {
    pub direction: Option<BindDirection>,
    pub value: Option<Vec<u8>>,
    pub out_rows: Vec<Vec<u8>>,
}

/// Per-statement execution options (§3 "StatementContext").
#[derive(Debug, Clone, Copy, Default)]
pub struct StatementOptions {
    pub fetch_lobs: bool,
    pub array_size: u32,
    pub batch_errors: bool,
    pub array_dml_row_counts: bool,
}

/// Outcome of a statement that did not produce a row stream (§7 "Statement
/// promises").
#[derive(Debug, Clone, Default)]
pub struct NoRowsResult {
    pub affected_rows: u64,
    pub row_counts: Option<Vec<u64>>,
    pub batch_errors: Vec<BackendError>,
}

/// What a statement promise is ultimately completed with (§7 "Statement
/// promises").
#[derive(Debug, Clone)]
pub enum StatementOutcome {
    Describe(DescribeInfo),
    NoRows(NoRowsResult),
}

/// The SQL text, binds, and mutable execution flags for one statement
/// (§3 "StatementContext").
pub struct StatementContext {
    pub sql: String,
    pub binds: Vec<Bind>,
    pub kind: StatementKind,
    /// Server-assigned cursor id; 0 until the server assigns one. Sticky
    /// once non-zero, carried across re-execute (§4.2, §9).
    pub cursor_id: u32,
    /// Sticky once set by a server-triggered re-describe (§4.2, §9).
    pub requires_define: bool,
    /// Sticky once set by a server-triggered re-describe (§4.2, §9).
    pub no_prefetch: bool,
    pub options: StatementOptions,
    pub promise: Option<Promise<StatementOutcome>>,
    pub span: tracing::Span,
}

impl std::fmt::Debug for StatementContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatementContext")
            .field("sql", &self.sql)
            .field("kind", &self.kind)
            .field("cursor_id", &self.cursor_id)
            .field("requires_define", &self.requires_define)
            .field("no_prefetch", &self.no_prefetch)
            .finish_non_exhaustive()
    }
}

impl StatementContext {
    pub fn new(sql: impl Into<String>, kind: StatementKind, promise: Promise<StatementOutcome>) -> Self {
        let sql = sql.into();
        let span = tracing::info_span!("statement", sql = %sql);
        Self {
            sql,
            binds: Vec::new(),
            kind,
            cursor_id: 0,
            requires_define: false,
            no_prefetch: false,
            options: StatementOptions::default(),
            promise: Some(promise),
            span,
        }
    }

    /// Whether this statement produces rows (a `Query` or reusable
    /// `Cursor`), as opposed to DDL/DML/PL-SQL which complete with just a
    /// row count.
    pub fn is_row_producing(&self) -> bool {
        matches!(self.kind, StatementKind::Query | StatementKind::Cursor(_))
    }
}

/// LOB operation context (§2 "LOB-op"). Payload encoding is out of scope
/// (§1); only enough is modeled here to route the request/response.
#[derive(Debug)]
pub struct LobOpContext {
    pub locator: Vec<u8>,
    pub operation: u32,
    pub promise: Option<Promise<()>>,
}

/// A unit of work a session can be asked to perform (§3 "Task").
pub enum Task {
    Statement(StatementContext),
    Ping(Promise<()>),
    Commit(Promise<()>),
    Rollback(Promise<()>),
    LobOp(LobOpContext),
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Task::Statement(ctx) => f.debug_tuple("Statement").field(&ctx.sql).finish(),
            Task::Ping(_) => write!(f, "Ping"),
            Task::Commit(_) => write!(f, "Commit"),
            Task::Rollback(_) => write!(f, "Rollback"),
            Task::LobOp(_) => write!(f, "LobOp"),
        }
    }
}

impl Task {
    /// Fail this task's promise with `err` (used by the enqueue-while-closed
    /// and cleanup paths of §4.3).
    pub fn fail(self, err: crate::error::Error) {
        match self {
            Task::Statement(mut ctx) => {
                if let Some(promise) = ctx.promise.take() {
                    let _ = promise.send(Err(err));
                }
            }
            Task::Ping(promise) | Task::Commit(promise) | Task::Rollback(promise) => {
                let _ = promise.send(Err(err));
            }
            Task::LobOp(mut ctx) => {
                if let Some(promise) = ctx.promise.take() {
                    let _ = promise.send(Err(err));
                }
            }
        }
    }
}

/// Out-of-band cancel-marker state (§3 "Marker state").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MarkerState {
    #[default]
    NoneSent,
    OneSent,
}

/// Half-closed mode: no new tasks accepted, session closes once the
/// current one completes (§3 "Quiescing state").
#[derive(Debug, Default)]
pub enum QuiescingState {
    #[default]
    NotQuiescing,
    Quiescing(Option<Promise<()>>),
}

impl QuiescingState {
    pub fn is_quiescing(&self) -> bool {
        matches!(self, QuiescingState::Quiescing(_))
    }

    /// Take the close-promise carried by a quiescing state, if any,
    /// consuming it (used once when the cleanup pipeline cascades it into
    /// a `CleanUpContext`).
    pub fn take_close_promise(&mut self) -> Option<Promise<()>> {
        match self {
            QuiescingState::Quiescing(p) => p.take(),
            QuiescingState::NotQuiescing => None,
        }
    }
}

/// Context handed to the I/O layer when a cleanup pipeline runs (§4.3
/// "Cleanup pipeline").
pub struct CleanUpContext {
    pub tasks: Vec<Task>,
    pub error: crate::error::Error,
    pub read: bool,
    pub close_promise: Option<Promise<()>>,
}

impl std::fmt::Debug for CleanUpContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CleanUpContext")
            .field("tasks", &self.tasks)
            .field("error", &self.error)
            .field("read", &self.read)
            .field("has_close_promise", &self.close_promise.is_some())
            .finish()
    }
}

/// Whether fast-auth (allowed) or classic two-phase auth (denied) should be
/// used, as decided by `ConnectionCore::accept` (§4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthContextMode {
    Allowed,
    Denied,
}
