//! RAII guards for transport-owned resources. Each guard returns its resource
//! to the transport exactly once, when it is dropped.
use std::{
    ops::{Deref, DerefMut},
    sync::Arc,
};

use super::{BufferId, Direction, Transport, TransportError, TransferId};

/// Transfer buffer shared between the host and the device
pub struct DmaBuffer {
    transport: Arc<dyn Transport>,
    id: BufferId,
    data: Vec<u8>,
}

impl DmaBuffer {
    pub fn allocate(
        transport: &Arc<dyn Transport>,
        direction: Direction,
        size: usize,
    ) -> Result<Self, TransportError> {
        let id = transport.alloc_buffer(direction, size)?;
        Ok(Self {
            transport: transport.clone(),
            id,
            data: vec![0; size],
        })
    }

    pub fn id(&self) -> BufferId {
        self.id
    }
}

impl Deref for DmaBuffer {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.data
    }
}

impl DerefMut for DmaBuffer {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.data
    }
}

impl Drop for DmaBuffer {
    fn drop(&mut self) {
        log::trace!("Freeing buffer {:?}", self.id);
        self.transport.free_buffer(self.id);
    }
}

impl std::fmt::Debug for DmaBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DmaBuffer")
            .field("id", &self.id)
            .field("len", &self.data.len())
            .finish()
    }
}

/// Transfer object used to submit requests on one pipe
pub struct TransferHandle {
    transport: Arc<dyn Transport>,
    id: TransferId,
}

impl TransferHandle {
    pub fn allocate(
        transport: &Arc<dyn Transport>,
        direction: Direction,
    ) -> Result<Self, TransportError> {
        let id = transport.alloc_transfer(direction)?;
        Ok(Self {
            transport: transport.clone(),
            id,
        })
    }

    pub fn id(&self) -> TransferId {
        self.id
    }
}

impl Drop for TransferHandle {
    fn drop(&mut self) {
        log::trace!("Freeing transfer {:?}", self.id);
        self.transport.free_transfer(self.id);
    }
}

impl std::fmt::Debug for TransferHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransferHandle").field("id", &self.id).finish()
    }
}
