//! `RowStreamCore` (§4.1): mediates producer (network) and consumer (row
//! iterator) demand for a single statement's row stream. No I/O.

use crate::core::action::RowStreamAction;
use crate::core::model::DataRow;

/// Internal state of the row-stream machine (§4.1).
enum State {
    WaitingForRows,
    WaitingForReadOrDemand,
    WaitingForRead,
    WaitingForDemand,
    Failed,
}

/// Coordinates row buffering and read/demand signals for one statement's
/// active fetch loop.
pub struct RowStreamCore {
    state: State,
    buf: Vec<DataRow>,
    /// The last row of the most recently handed-off batch, preserved so
    /// `receive-duplicate` can resolve against it when the current buffer
    /// is still empty (§4.1 "receive-duplicate").
    previous_tail: Option<DataRow>,
}

impl RowStreamCore {
    pub fn new() -> Self {
        Self {
            state: State::WaitingForRows,
            buf: Vec::new(),
            previous_tail: None,
        }
    }

    /// §4.1 "receive-row": appends to the buffer in any non-failed state.
    /// Rows may arrive unsolicited (early server close); they are buffered
    /// regardless of which waiting state is active.
    pub fn receive_row(&mut self, row: DataRow) {
        if matches!(self.state, State::Failed) {
            panic!("RowStreamCore::receive_row called after fail()");
        }
        self.buf.push(row);
    }

    /// §4.1 "receive-duplicate": resolves column `index` against the last
    /// row in the buffer, or the preserved previous-batch tail if the
    /// buffer is still empty. Returns `None` if the source column was
    /// null, matching the wire null convention (§6).
    pub fn receive_duplicate(&self, index: usize) -> Option<Vec<u8>> {
        let source = self.buf.last().or(self.previous_tail.as_ref())?;
        source.columns.get(index).cloned().flatten()
    }

    /// §4.1 "batch-complete": empties the buffer into the caller, updates
    /// the preserved tail, and moves the demand state forward.
    pub fn batch_complete(&mut self) -> Option<Vec<DataRow>> {
        if matches!(self.state, State::Failed) {
            panic!("RowStreamCore::batch_complete called after fail()");
        }
        if self.buf.is_empty() {
            self.state = State::WaitingForRead;
            return None;
        }
        self.previous_tail = self.buf.last().cloned();
        let capacity = self.buf.capacity();
        let batch = std::mem::replace(&mut self.buf, Vec::with_capacity(capacity));
        self.state = State::WaitingForReadOrDemand;
        Some(batch)
    }

    /// §4.1 "demand-more": consumer is asking for more rows.
    pub fn demand_more(&mut self) -> RowStreamAction {
        match self.state {
            State::WaitingForDemand => {
                self.state = State::WaitingForRows;
                RowStreamAction::Read
            }
            State::WaitingForReadOrDemand => {
                self.state = State::WaitingForRead;
                RowStreamAction::Wait
            }
            State::WaitingForRows | State::WaitingForRead => RowStreamAction::Wait,
            State::Failed => panic!("RowStreamCore::demand_more called after fail()"),
        }
    }

    /// §4.1 "read-signal": the I/O layer has bytes ready to read.
    pub fn read_signal(&mut self) -> RowStreamAction {
        match self.state {
            State::WaitingForRead => {
                self.state = State::WaitingForRows;
                RowStreamAction::Read
            }
            State::WaitingForReadOrDemand => {
                self.state = State::WaitingForDemand;
                RowStreamAction::Wait
            }
            State::WaitingForRows => RowStreamAction::Read,
            State::WaitingForDemand => RowStreamAction::Wait,
            State::Failed => panic!("RowStreamCore::read_signal called after fail()"),
        }
    }

    /// §4.1 "fail": terminal. Returns whether the caller still needs to
    /// drain an outstanding read.
    pub fn fail(&mut self) -> bool {
        let read_needed = matches!(
            self.state,
            State::WaitingForRows | State::WaitingForReadOrDemand
        );
        self.state = State::Failed;
        tracing::debug!(read_needed, "row stream failed");
        read_needed
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.state, State::Failed)
    }
}

impl Default for RowStreamCore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cols: &[Option<&[u8]>]) -> DataRow {
        DataRow::new(cols.iter().map(|c| c.map(|b| b.to_vec())).collect())
    }

    #[test]
    fn batch_complete_on_empty_buffer_waits_for_read() {
        let mut core = RowStreamCore::new();
        assert!(core.batch_complete().is_none());
        assert!(matches!(core.state, State::WaitingForRead));
    }

    #[test]
    fn batch_complete_hands_off_buffer_and_preserves_tail() {
        let mut core = RowStreamCore::new();
        core.receive_row(row(&[Some(b"a")]));
        core.receive_row(row(&[Some(b"b")]));
        let batch = core.batch_complete().expect("non-empty batch");
        assert_eq!(batch.len(), 2);
        assert!(matches!(core.state, State::WaitingForReadOrDemand));
        assert_eq!(core.previous_tail.as_ref().unwrap().columns[0], Some(b"b".to_vec()));
    }

    #[test]
    fn receive_duplicate_resolves_against_previous_tail_when_buffer_empty() {
        let mut core = RowStreamCore::new();
        core.receive_row(row(&[Some(b"x"), None]));
        core.batch_complete();
        assert_eq!(core.receive_duplicate(0), Some(b"x".to_vec()));
        assert_eq!(core.receive_duplicate(1), None);
    }

    #[test]
    fn demand_more_from_waiting_for_demand_requests_read() {
        let mut core = RowStreamCore::new();
        core.state = State::WaitingForDemand;
        assert!(matches!(core.demand_more(), RowStreamAction::Read));
        assert!(matches!(core.state, State::WaitingForRows));
    }

    #[test]
    fn demand_more_from_waiting_for_read_or_demand_waits() {
        let mut core = RowStreamCore::new();
        core.state = State::WaitingForReadOrDemand;
        assert!(matches!(core.demand_more(), RowStreamAction::Wait));
        assert!(matches!(core.state, State::WaitingForRead));
    }

    #[test]
    fn read_signal_from_waiting_for_read_requests_read() {
        let mut core = RowStreamCore::new();
        core.state = State::WaitingForRead;
        assert!(matches!(core.read_signal(), RowStreamAction::Read));
        assert!(matches!(core.state, State::WaitingForRows));
    }

    #[test]
    fn read_signal_from_waiting_for_read_or_demand_waits_for_demand() {
        let mut core = RowStreamCore::new();
        core.state = State::WaitingForReadOrDemand;
        assert!(matches!(core.read_signal(), RowStreamAction::Wait));
        assert!(matches!(core.state, State::WaitingForDemand));
    }

    #[test]
    fn fail_reports_read_needed_from_producer_states() {
        let mut core = RowStreamCore::new();
        assert!(core.fail());
        assert!(core.is_failed());

        let mut core = RowStreamCore::new();
        core.state = State::WaitingForDemand;
        assert!(!core.fail());
    }

    #[test]
    #[should_panic]
    fn receive_row_after_fail_panics() {
        let mut core = RowStreamCore::new();
        core.fail();
        core.receive_row(row(&[None]));
    }
}
