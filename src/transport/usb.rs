//! [Transport] implementation on top of nusb. The interface of the gamepad is
//! claimed from the kernel and interrupt transfers are submitted on the
//! endpoint addresses of the pipes they are bound to.
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU32, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
};

use nusb::transfer::{RequestBuffer, TransferError};
use tokio::{
    runtime::Handle,
    sync::{mpsc, oneshot},
};

use crate::udev::device::{UdevDevice, UsbInterface};

use super::{
    BufferId, Completion, Direction, EndpointDescriptor, Pipe, TransferId, TransferStatus,
    Transport, TransportError,
};

/// Transfer memory owned by the transport. A buffer is lent to one transfer
/// at a time and returned when the transfer completes.
#[derive(Debug)]
struct BufferSlot {
    direction: Direction,
    data: Option<Vec<u8>>,
}

type BufferTable = Mutex<HashMap<BufferId, BufferSlot>>;

/// Transfers that are in flight, with the means to cancel them
type TransferTable = Mutex<HashMap<TransferId, oneshot::Sender<()>>>;

pub struct UsbTransport {
    interface: nusb::Interface,
    endpoints: Vec<EndpointDescriptor>,
    completions: mpsc::UnboundedSender<Completion>,
    runtime: Handle,
    buffers: Arc<BufferTable>,
    transfers: Arc<TransferTable>,
    next_id: AtomicU32,
}

impl UsbTransport {
    /// Open the given USB device and claim `interface`, detaching any kernel
    /// driver bound to it. Completions of every transfer submitted through
    /// this transport are sent to `completions`.
    pub fn open(
        udevice: &UdevDevice,
        interface: &UsbInterface,
        vendor_id: u16,
        product_id: u16,
        completions: mpsc::UnboundedSender<Completion>,
    ) -> Result<Self, TransportError> {
        let busnum = udevice.busnum();
        let devnum = udevice.devnum();
        let Some(info) = nusb::list_devices()?
            .find(|info| info.bus_number() == busnum && info.device_address() == devnum)
        else {
            return Err(TransportError::Disconnected);
        };
        if info.vendor_id() != vendor_id || info.product_id() != product_id {
            return Err(TransportError::Rejected(format!(
                "Device {busnum:03}/{devnum:03} is not a {vendor_id:04x}:{product_id:04x} device"
            )));
        }

        let runtime = Handle::try_current().map_err(|e| {
            TransportError::Rejected(format!("No async runtime to run transfers on: {e}"))
        })?;

        let device = info.open()?;
        let claimed = device.detach_and_claim_interface(interface.number)?;
        log::debug!(
            "Claimed interface {} of USB device {busnum:03}/{devnum:03}",
            interface.number
        );

        let endpoints = interface.endpoints();
        log::debug!("Found endpoints: {endpoints:?}");

        Ok(Self {
            interface: claimed,
            endpoints,
            completions,
            runtime,
            buffers: Arc::new(Mutex::new(HashMap::new())),
            transfers: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU32::new(1),
        })
    }

    fn next_id(&self) -> u32 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Reserve the transfer for a new submission. The returned receiver
    /// fires when the transfer is killed.
    fn begin(&self, transfer: TransferId) -> Result<oneshot::Receiver<()>, TransportError> {
        let mut transfers = lock(&self.transfers);
        if transfers.contains_key(&transfer) {
            return Err(TransportError::Rejected(format!(
                "Transfer {transfer:?} is already in flight"
            )));
        }
        let (tx, rx) = oneshot::channel();
        transfers.insert(transfer, tx);
        Ok(rx)
    }

    /// Lend a free buffer of the given direction to a transfer
    fn take_buffer(&self, direction: Direction) -> Result<(BufferId, Vec<u8>), TransportError> {
        let mut buffers = lock(&self.buffers);
        buffers
            .iter_mut()
            .filter(|(_, slot)| slot.direction == direction)
            .find_map(|(id, slot)| slot.data.take().map(|data| (*id, data)))
            .ok_or(TransportError::OutOfMemory)
    }
}

/// Give a lent buffer back. Buffers freed while lent are dropped here.
fn return_buffer(buffers: &BufferTable, id: BufferId, data: Vec<u8>) {
    if let Some(slot) = lock(buffers).get_mut(&id) {
        slot.data = Some(data);
    }
}

/// Finish the transfer and hand its completion to the owner
fn finish(
    transfers: &TransferTable,
    completions: &mpsc::UnboundedSender<Completion>,
    completion: Completion,
) {
    lock(transfers).remove(&completion.transfer);
    if completions.send(completion).is_err() {
        log::trace!("Completion receiver is gone");
    }
}

pub fn transfer_status(result: &Result<(), TransferError>) -> TransferStatus {
    match result {
        Ok(()) => TransferStatus::Completed,
        Err(TransferError::Cancelled) => TransferStatus::Cancelled,
        Err(TransferError::Disconnected) => TransferStatus::Disconnected,
        Err(e) => {
            log::debug!("Transfer failed: {e}");
            TransferStatus::Failed
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Transport for UsbTransport {
    fn endpoints(&self) -> Result<Vec<EndpointDescriptor>, TransportError> {
        Ok(self.endpoints.clone())
    }

    fn alloc_buffer(&self, direction: Direction, size: usize) -> Result<BufferId, TransportError> {
        let mut data = Vec::new();
        data.try_reserve_exact(size)
            .map_err(|_| TransportError::OutOfMemory)?;
        data.resize(size, 0);

        let id = BufferId(self.next_id());
        let slot = BufferSlot {
            direction,
            data: Some(data),
        };
        lock(&self.buffers).insert(id, slot);
        log::trace!("Allocated {direction:?} buffer {id:?} of {size} bytes");
        Ok(id)
    }

    fn free_buffer(&self, buffer: BufferId) {
        lock(&self.buffers).remove(&buffer);
        log::trace!("Released buffer {buffer:?}");
    }

    fn alloc_transfer(&self, direction: Direction) -> Result<TransferId, TransportError> {
        let id = TransferId(self.next_id());
        log::trace!("Allocated {direction:?} transfer {id:?}");
        Ok(id)
    }

    fn free_transfer(&self, transfer: TransferId) {
        self.kill(transfer);
        log::trace!("Released transfer {transfer:?}");
    }

    fn submit_read(
        &self,
        transfer: TransferId,
        pipe: Pipe,
        length: usize,
    ) -> Result<(), TransportError> {
        let (buffer, data) = self.take_buffer(Direction::In)?;
        let killed = match self.begin(transfer) {
            Ok(killed) => killed,
            Err(e) => {
                return_buffer(&self.buffers, buffer, data);
                return Err(e);
            }
        };
        log::trace!("Reading {length} bytes from endpoint {:#04x}", pipe.endpoint);

        let request = self
            .interface
            .interrupt_in(pipe.endpoint, RequestBuffer::reuse(data, length));
        let buffers = self.buffers.clone();
        let transfers = self.transfers.clone();
        let completions = self.completions.clone();
        self.runtime.spawn(async move {
            // Dropping the request cancels it
            let completion = tokio::select! {
                result = request => {
                    let status = transfer_status(&result.status);
                    let data = if status.is_ok() { result.data.clone() } else { vec![] };
                    return_buffer(&buffers, buffer, result.data);
                    Completion::inbound(transfer, status, data)
                }
                _ = killed => Completion::inbound(transfer, TransferStatus::Cancelled, vec![]),
            };
            finish(&transfers, &completions, completion);
        });

        Ok(())
    }

    fn submit_write(
        &self,
        transfer: TransferId,
        pipe: Pipe,
        data: &[u8],
    ) -> Result<(), TransportError> {
        let (buffer, mut frame) = self.take_buffer(Direction::Out)?;
        let killed = match self.begin(transfer) {
            Ok(killed) => killed,
            Err(e) => {
                return_buffer(&self.buffers, buffer, frame);
                return Err(e);
            }
        };
        log::trace!("Writing {data:02x?} to endpoint {:#04x}", pipe.endpoint);

        frame.clear();
        frame.extend_from_slice(data);
        let request = self.interface.interrupt_out(pipe.endpoint, frame);
        let buffers = self.buffers.clone();
        let transfers = self.transfers.clone();
        let completions = self.completions.clone();
        self.runtime.spawn(async move {
            let status = tokio::select! {
                result = request => {
                    return_buffer(&buffers, buffer, result.data.reuse());
                    transfer_status(&result.status)
                }
                _ = killed => TransferStatus::Cancelled,
            };
            finish(&transfers, &completions, Completion::outbound(transfer, status));
        });

        Ok(())
    }

    fn kill(&self, transfer: TransferId) {
        if let Some(killed) = lock(&self.transfers).remove(&transfer) {
            let _ = killed.send(());
        }
    }
}

impl Drop for UsbTransport {
    fn drop(&mut self) {
        // Cancels everything still in flight
        lock(&self.transfers).clear();
    }
}

impl std::fmt::Debug for UsbTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UsbTransport")
            .field("endpoints", &self.endpoints)
            .finish()
    }
}
