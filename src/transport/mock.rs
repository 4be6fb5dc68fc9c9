//! In-memory [Transport] used by tests. Records every submission, accounts for
//! every allocation and release, and can be told to fail at chosen points.
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
};

use tokio::sync::mpsc;

use super::{
    BufferId, Completion, Direction, EndpointDescriptor, Pipe, TransferId, TransferStatus,
    TransferType, Transport, TransportError,
};

/// Interrupt IN endpoint advertised by the mock by default
pub const ENDPOINT_IN: EndpointDescriptor = EndpointDescriptor {
    address: 0x81,
    transfer_type: TransferType::Interrupt,
    direction: Direction::In,
    interval: 1,
};

/// Interrupt OUT endpoint advertised by the mock by default
pub const ENDPOINT_OUT: EndpointDescriptor = EndpointDescriptor {
    address: 0x02,
    transfer_type: TransferType::Interrupt,
    direction: Direction::Out,
    interval: 1,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    Read { transfer: TransferId, length: usize },
    Write { transfer: TransferId, data: Vec<u8> },
}

#[derive(Debug, Default)]
struct MockState {
    next_id: u32,
    allocations: usize,
    fail_allocation: Option<usize>,
    fail_submit: bool,
    buffers: HashMap<BufferId, usize>,
    transfers: HashMap<TransferId, Direction>,
    buffer_releases: HashMap<BufferId, usize>,
    transfer_releases: HashMap<TransferId, usize>,
    endpoints: Vec<EndpointDescriptor>,
    submissions: Vec<Submission>,
    killed: Vec<TransferId>,
}

#[derive(Debug, Clone)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
    completions: mpsc::UnboundedSender<Completion>,
}

impl MockTransport {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Completion>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let state = MockState {
            endpoints: vec![ENDPOINT_IN, ENDPOINT_OUT],
            ..Default::default()
        };
        let transport = Self {
            state: Arc::new(Mutex::new(state)),
            completions: tx,
        };
        (transport, rx)
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    /// Fail the allocation with the given zero-based index
    pub fn fail_allocation_at(&self, index: usize) {
        self.state().fail_allocation = Some(index);
    }

    pub fn fail_submissions(&self, fail: bool) {
        self.state().fail_submit = fail;
    }

    pub fn set_endpoints(&self, endpoints: Vec<EndpointDescriptor>) {
        self.state().endpoints = endpoints;
    }

    pub fn submissions(&self) -> Vec<Submission> {
        self.state().submissions.clone()
    }

    /// Payloads of all submitted writes in order
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.state()
            .submissions
            .iter()
            .filter_map(|s| match s {
                Submission::Write { data, .. } => Some(data.clone()),
                Submission::Read { .. } => None,
            })
            .collect()
    }

    pub fn read_count(&self) -> usize {
        self.state()
            .submissions
            .iter()
            .filter(|s| matches!(s, Submission::Read { .. }))
            .count()
    }

    pub fn killed(&self) -> Vec<TransferId> {
        self.state().killed.clone()
    }

    /// Number of allocations that succeeded
    pub fn allocated(&self) -> usize {
        let state = self.state();
        state.buffers.len() + state.transfers.len()
    }

    /// Number of allocations that have not been released yet
    pub fn outstanding(&self) -> usize {
        let state = self.state();
        let buffers = state
            .buffers
            .keys()
            .filter(|id| !state.buffer_releases.contains_key(id))
            .count();
        let transfers = state
            .transfers
            .keys()
            .filter(|id| !state.transfer_releases.contains_key(id))
            .count();
        buffers + transfers
    }

    /// True if any resource was released more than once, or released without
    /// ever having been allocated
    pub fn has_double_release(&self) -> bool {
        let state = self.state();
        let buffers = state
            .buffer_releases
            .iter()
            .any(|(id, count)| *count > 1 || !state.buffers.contains_key(id));
        let transfers = state
            .transfer_releases
            .iter()
            .any(|(id, count)| *count > 1 || !state.transfers.contains_key(id));
        buffers || transfers
    }

    /// Transfer id of the last submitted write
    pub fn last_write_transfer(&self) -> Option<TransferId> {
        self.state().submissions.iter().rev().find_map(|s| match s {
            Submission::Write { transfer, .. } => Some(*transfer),
            Submission::Read { .. } => None,
        })
    }

    /// Transfer id of the last submitted read
    pub fn last_read_transfer(&self) -> Option<TransferId> {
        self.state().submissions.iter().rev().find_map(|s| match s {
            Submission::Read { transfer, .. } => Some(*transfer),
            Submission::Write { .. } => None,
        })
    }

    /// Deliver a completion for the last submitted write
    pub fn complete_write(&self, status: TransferStatus) -> Completion {
        let transfer = self.last_write_transfer().unwrap();
        let completion = Completion::outbound(transfer, status);
        let _ = self.completions.send(completion.clone());
        completion
    }

    /// Deliver a completion for the last submitted read
    pub fn complete_read(&self, status: TransferStatus, data: &[u8]) -> Completion {
        let transfer = self.last_read_transfer().unwrap();
        let completion = Completion::inbound(transfer, status, data.to_vec());
        let _ = self.completions.send(completion.clone());
        completion
    }

    fn allocate(&self) -> Result<u32, TransportError> {
        let mut state = self.state();
        let index = state.allocations;
        state.allocations += 1;
        if state.fail_allocation == Some(index) {
            return Err(TransportError::OutOfMemory);
        }
        state.next_id += 1;
        Ok(state.next_id)
    }
}

impl Transport for MockTransport {
    fn endpoints(&self) -> Result<Vec<EndpointDescriptor>, TransportError> {
        Ok(self.state().endpoints.clone())
    }

    fn alloc_buffer(&self, _direction: Direction, size: usize) -> Result<BufferId, TransportError> {
        let id = BufferId(self.allocate()?);
        self.state().buffers.insert(id, size);
        Ok(id)
    }

    fn free_buffer(&self, buffer: BufferId) {
        *self.state().buffer_releases.entry(buffer).or_default() += 1;
    }

    fn alloc_transfer(&self, direction: Direction) -> Result<TransferId, TransportError> {
        let id = TransferId(self.allocate()?);
        self.state().transfers.insert(id, direction);
        Ok(id)
    }

    fn free_transfer(&self, transfer: TransferId) {
        *self.state().transfer_releases.entry(transfer).or_default() += 1;
    }

    fn submit_read(
        &self,
        transfer: TransferId,
        _pipe: Pipe,
        length: usize,
    ) -> Result<(), TransportError> {
        let mut state = self.state();
        if state.fail_submit {
            return Err(TransportError::Rejected("injected failure".into()));
        }
        state.submissions.push(Submission::Read { transfer, length });
        Ok(())
    }

    fn submit_write(
        &self,
        transfer: TransferId,
        _pipe: Pipe,
        data: &[u8],
    ) -> Result<(), TransportError> {
        let mut state = self.state();
        if state.fail_submit {
            return Err(TransportError::Rejected("injected failure".into()));
        }
        state.submissions.push(Submission::Write {
            transfer,
            data: data.to_vec(),
        });
        Ok(())
    }

    fn kill(&self, transfer: TransferId) {
        self.state().killed.push(transfer);
    }
}
