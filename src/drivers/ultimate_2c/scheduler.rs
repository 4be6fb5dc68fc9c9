use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
    time::Duration,
};

use packed_struct::PackedStruct;

use crate::transport::{
    anchor::Anchor,
    resource::{DmaBuffer, TransferHandle},
    Completion, Direction, Pipe, TransferId, Transport, TransportError,
};

use super::{
    driver::PACKET_SIZE,
    hid_report::{RumbleOutputReport, WelcomeOutputReport},
};

/// What happened to an outbound message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// The message was handed to the transport
    Submitted,
    /// The channel was busy. A stop will be sent when the channel frees up.
    Deferred,
    /// The channel was busy and the message was discarded
    Dropped,
    /// The session is not active or the channel is not set up
    Inactive,
    /// The transport rejected the message
    Failed,
}

#[derive(Debug, Default)]
struct InboundChannel {
    buffer: Option<DmaBuffer>,
    transfer: Option<TransferHandle>,
    pipe: Option<Pipe>,
}

#[derive(Debug, Default)]
struct OutboundChannel {
    /// A transfer is in flight
    busy: bool,
    /// A rumble stop was dropped while busy and must be sent later
    rumble_off_pending: bool,
    buffer: Option<DmaBuffer>,
    transfer: Option<TransferHandle>,
    pipe: Option<Pipe>,
    /// Length of the frame in the buffer
    length: usize,
}

/// Owns the transfers of one gamepad. Inbound reads are re-armed by the
/// session after each completion while the session is active. Only one
/// outbound transfer is in flight at a time.
pub struct TransferScheduler {
    transport: Arc<dyn Transport>,
    active: Arc<AtomicBool>,
    anchor: Anchor,
    inbound: Mutex<InboundChannel>,
    outbound: Mutex<OutboundChannel>,
}

impl TransferScheduler {
    pub fn new(transport: Arc<dyn Transport>, active: Arc<AtomicBool>) -> Self {
        Self {
            transport,
            active,
            anchor: Anchor::new(),
            inbound: Mutex::new(InboundChannel::default()),
            outbound: Mutex::new(OutboundChannel::default()),
        }
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Outbound transfers that are currently in flight
    pub fn anchor(&self) -> &Anchor {
        &self.anchor
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Allocate the transfer buffer for the given direction
    pub fn allocate_buffer(&self, direction: Direction) -> Result<(), TransportError> {
        let buffer = DmaBuffer::allocate(&self.transport, direction, PACKET_SIZE)?;
        match direction {
            Direction::In => lock(&self.inbound).buffer = Some(buffer),
            Direction::Out => lock(&self.outbound).buffer = Some(buffer),
        }
        Ok(())
    }

    /// Allocate the transfer object for the given direction
    pub fn allocate_transfer(&self, direction: Direction) -> Result<(), TransportError> {
        let transfer = TransferHandle::allocate(&self.transport, direction)?;
        match direction {
            Direction::In => lock(&self.inbound).transfer = Some(transfer),
            Direction::Out => lock(&self.outbound).transfer = Some(transfer),
        }
        Ok(())
    }

    /// Bind the transfer objects to their endpoints
    pub fn connect(&self, inbound: Pipe, outbound: Pipe) {
        lock(&self.inbound).pipe = Some(inbound);
        lock(&self.outbound).pipe = Some(outbound);
    }

    pub fn inbound_transfer(&self) -> Option<TransferId> {
        lock(&self.inbound).transfer.as_ref().map(TransferHandle::id)
    }

    pub fn outbound_transfer(&self) -> Option<TransferId> {
        lock(&self.outbound).transfer.as_ref().map(TransferHandle::id)
    }

    pub fn is_busy(&self) -> bool {
        lock(&self.outbound).busy
    }

    pub fn is_rumble_off_pending(&self) -> bool {
        lock(&self.outbound).rumble_off_pending
    }

    /// Submit a read of one packet. Does nothing once the session is no
    /// longer active. Returns true if the read was submitted.
    pub fn submit_read(&self) -> bool {
        if !self.is_active() {
            return false;
        }

        let inbound = lock(&self.inbound);
        let (Some(transfer), Some(pipe)) = (inbound.transfer.as_ref(), inbound.pipe) else {
            log::debug!("Inbound channel is not connected");
            return false;
        };

        if let Err(e) = self.transport.submit_read(transfer.id(), pipe, PACKET_SIZE) {
            log::warn!("Failed to submit read: {e:?}");
            return false;
        }

        true
    }

    /// Copy the data of a finished read into the inbound buffer and return
    /// the packet. Returns `None` if the completion is not for the inbound
    /// transfer or carries no data.
    pub fn receive(&self, completion: &Completion) -> Option<[u8; PACKET_SIZE]> {
        if self.inbound_transfer() != Some(completion.transfer) {
            log::debug!("Ignoring completion of unknown transfer {:?}", completion.transfer);
            return None;
        }
        let mut inbound = lock(&self.inbound);
        let buffer = inbound.buffer.as_mut()?;

        let length = completion.data.len().min(buffer.len());
        if length == 0 {
            return None;
        }
        buffer.fill(0);
        buffer[..length].copy_from_slice(&completion.data[..length]);

        let mut packet = [0; PACKET_SIZE];
        let size = buffer.len().min(PACKET_SIZE);
        packet[..size].copy_from_slice(&buffer[..size]);

        Some(packet)
    }

    /// Send a rumble report. A stop (both magnitudes zero) that cannot be sent
    /// right away is remembered and sent once the in-flight transfer is done.
    pub fn send_rumble(&self, weak: u16, strong: u16) -> SendOutcome {
        let stop = weak == 0 && strong == 0;
        let report = RumbleOutputReport::new(weak, strong);
        let frame = match report.pack() {
            Ok(frame) => frame,
            Err(e) => {
                log::error!("Failed to pack rumble report: {e:?}");
                return SendOutcome::Failed;
            }
        };
        self.send(&frame, stop)
    }

    /// Send the welcome message. Dropped if the channel is busy.
    pub fn send_welcome(&self) -> SendOutcome {
        let frame = match WelcomeOutputReport::default().pack() {
            Ok(frame) => frame,
            Err(e) => {
                log::error!("Failed to pack welcome report: {e:?}");
                return SendOutcome::Failed;
            }
        };
        self.send(&frame, false)
    }

    fn send(&self, frame: &[u8], stop: bool) -> SendOutcome {
        if !self.is_active() {
            return SendOutcome::Inactive;
        }

        let mut guard = lock(&self.outbound);
        let outbound = &mut *guard;
        if outbound.busy {
            if stop {
                outbound.rumble_off_pending = true;
                return SendOutcome::Deferred;
            }
            return SendOutcome::Dropped;
        }

        let (Some(buffer), Some(transfer), Some(pipe)) = (
            outbound.buffer.as_mut(),
            outbound.transfer.as_ref(),
            outbound.pipe,
        ) else {
            log::debug!("Outbound channel is not connected");
            return SendOutcome::Inactive;
        };

        let length = frame.len().min(buffer.len());
        buffer[..length].copy_from_slice(&frame[..length]);
        outbound.length = length;
        outbound.busy = true;
        if stop {
            outbound.rumble_off_pending = false;
        }

        let id = transfer.id();
        self.anchor.anchor(id);
        if let Err(e) = self.transport.submit_write(id, pipe, &buffer[..length]) {
            log::warn!("Failed to submit write: {e:?}");
            self.anchor.unanchor(id);
            outbound.busy = false;
            return SendOutcome::Failed;
        }

        SendOutcome::Submitted
    }

    /// Handle a finished write. Frees the channel and sends a stop that was
    /// deferred while the write was in flight.
    pub fn on_outbound_complete(&self, completion: &Completion) {
        let pending = {
            let mut outbound = lock(&self.outbound);
            let id = outbound.transfer.as_ref().map(TransferHandle::id);
            if id != Some(completion.transfer) {
                log::debug!("Ignoring completion of unknown transfer {:?}", completion.transfer);
                return;
            }
            if !completion.status.is_ok() {
                log::debug!("Write finished with status {:?}", completion.status);
            }
            outbound.busy = false;
            self.anchor.unanchor(completion.transfer);
            outbound.rumble_off_pending
        };

        if pending {
            log::debug!("Sending deferred rumble stop");
            self.send_rumble(0, 0);
        }
    }

    /// Wait for the in-flight write to finish. Kills it if the timeout
    /// elapses first.
    pub async fn drain(&self, timeout: Duration) {
        if self.anchor.is_empty() {
            return;
        }
        if self.anchor.wait_empty(timeout).await {
            return;
        }
        log::debug!("Outbound transfer did not finish within {timeout:?}, killing it");
        self.anchor.kill_anchored(self.transport.as_ref());
    }

    /// Release the transfer objects, then the buffers. Each resource is only
    /// released once, no matter how often this is called.
    pub fn release(&self) {
        let (in_transfer, in_buffer) = {
            let mut inbound = lock(&self.inbound);
            inbound.pipe = None;
            (inbound.transfer.take(), inbound.buffer.take())
        };
        let (out_transfer, out_buffer) = {
            let mut outbound = lock(&self.outbound);
            outbound.pipe = None;
            outbound.busy = false;
            outbound.rumble_off_pending = false;
            (outbound.transfer.take(), outbound.buffer.take())
        };

        drop(in_transfer);
        drop(out_transfer);
        drop(in_buffer);
        drop(out_buffer);
    }
}

impl std::fmt::Debug for TransferScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransferScheduler")
            .field("active", &self.is_active())
            .field("anchored", &self.anchor.len())
            .finish()
    }
}

/// Completion handlers cannot propagate a poisoned lock
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
