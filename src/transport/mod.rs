//! Boundary between the gamepad logic and the host's USB stack. A [Transport]
//! hands out buffers and transfer objects, accepts fire-and-forget interrupt
//! transfers and reports their results as [Completion] messages.
pub mod anchor;
#[cfg(test)]
pub mod mock;
pub mod resource;
pub mod usb;

use std::io;

use thiserror::Error;

/// Represents all possible errors raised by a [Transport]
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Out of memory")]
    OutOfMemory,
    #[error("Device I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Device is disconnected")]
    Disconnected,
    #[error("Transfer rejected: {0}")]
    Rejected(String),
}

/// Direction of a transfer, as seen from the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    In,
    Out,
}

/// USB endpoint transfer types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferType {
    Control,
    Isochronous,
    Bulk,
    Interrupt,
}

/// An endpoint as advertised by the device's active configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointDescriptor {
    pub address: u8,
    pub transfer_type: TransferType,
    pub direction: Direction,
    /// Polling interval in frames
    pub interval: u8,
}

impl EndpointDescriptor {
    pub fn is_interrupt(&self) -> bool {
        self.transfer_type == TransferType::Interrupt
    }
}

/// Endpoint a transfer object is bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pipe {
    pub endpoint: u8,
    pub interval: u8,
}

impl From<&EndpointDescriptor> for Pipe {
    fn from(desc: &EndpointDescriptor) -> Self {
        Self {
            endpoint: desc.address,
            interval: desc.interval,
        }
    }
}

/// Handle to a transfer buffer allocated by the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferId(pub u32);

/// Handle to a transfer object allocated by the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransferId(pub u32);

/// Final status of a submitted transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferStatus {
    Completed,
    Cancelled,
    Disconnected,
    Failed,
}

impl TransferStatus {
    pub fn is_ok(&self) -> bool {
        *self == TransferStatus::Completed
    }
}

/// Result of a finished transfer
#[derive(Debug, Clone)]
pub struct Completion {
    pub transfer: TransferId,
    pub direction: Direction,
    pub status: TransferStatus,
    /// Received bytes for inbound transfers, empty otherwise
    pub data: Vec<u8>,
}

impl Completion {
    pub fn inbound(transfer: TransferId, status: TransferStatus, data: Vec<u8>) -> Self {
        Self {
            transfer,
            direction: Direction::In,
            status,
            data,
        }
    }

    pub fn outbound(transfer: TransferId, status: TransferStatus) -> Self {
        Self {
            transfer,
            direction: Direction::Out,
            status,
            data: Vec::new(),
        }
    }
}

/// Asynchronous interrupt-transfer transport for a single physical device.
///
/// Submissions never block: the result of every accepted transfer is delivered
/// later as a [Completion] on the channel the transport was created with.
/// Implementations must not deliver a completion from inside a submit call.
pub trait Transport: Send + Sync {
    /// Endpoints advertised by the bound interface
    fn endpoints(&self) -> Result<Vec<EndpointDescriptor>, TransportError>;

    fn alloc_buffer(&self, direction: Direction, size: usize) -> Result<BufferId, TransportError>;
    fn free_buffer(&self, buffer: BufferId);

    fn alloc_transfer(&self, direction: Direction) -> Result<TransferId, TransportError>;
    fn free_transfer(&self, transfer: TransferId);

    /// Queue a read of up to `length` bytes from the given pipe
    fn submit_read(
        &self,
        transfer: TransferId,
        pipe: Pipe,
        length: usize,
    ) -> Result<(), TransportError>;

    /// Queue a write of `data` to the given pipe
    fn submit_write(&self, transfer: TransferId, pipe: Pipe, data: &[u8])
        -> Result<(), TransportError>;

    /// Cancel the given transfer if it is still in flight. A cancelled transfer
    /// still reports a completion with [TransferStatus::Cancelled].
    fn kill(&self, transfer: TransferId);
}
