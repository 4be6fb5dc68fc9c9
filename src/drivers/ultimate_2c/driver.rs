use std::{error::Error, sync::Arc, time::Duration};

use tokio::sync::mpsc;

use crate::{
    config::Config,
    constants::{DRIVER_NAME, GAMEPAD_NAME, VERSION},
    input::target::{gamepad::EvdevGamepad, VirtualDeviceInfo},
    transport::{usb::UsbTransport, TransportError},
    udev::device::{UdevDevice, UsbInterface},
};

use super::session::{Session, SessionOptions};

pub const VID: u16 = 0x2dc8;
pub const PID: u16 = 0x310a;

// Input and output report size
pub const PACKET_SIZE: usize = 32;

// Grace period for a pending outbound transfer on disconnect
pub const TEARDOWN_TIMEOUT: Duration = Duration::from_millis(200);

// Class of the interface carrying the gamepad's interrupt endpoints
pub const VENDOR_INTERFACE_CLASS: u8 = 0xff;

/// Returns true if the given ids belong to an Ultimate 2C in wired mode
pub fn matches(vendor_id: u16, product_id: u16) -> bool {
    vendor_id == VID && product_id == PID
}

/// Returns the first vendor-specific interface. The gamepad exchanges its
/// reports over the interrupt endpoints of this interface.
pub fn vendor_interface(interfaces: Vec<UsbInterface>) -> Option<UsbInterface> {
    interfaces
        .into_iter()
        .find(|interface| interface.class == VENDOR_INTERFACE_CLASS)
}

/// Attach the gamepad behind the given USB device node and create its
/// virtual gamepad
pub async fn attach(
    udevice: &UdevDevice,
    config: &Config,
) -> Result<Session, Box<dyn Error + Send + Sync>> {
    log::info!("Initialize gamepad {GAMEPAD_NAME} (Driver {DRIVER_NAME} {VERSION})");

    let (tx, rx) = mpsc::unbounded_channel();
    let Some(interface) = vendor_interface(udevice.usb_interfaces()) else {
        log::error!("No vendor interface found on {}", udevice.devnode());
        return Err(TransportError::Disconnected.into());
    };
    let transport = UsbTransport::open(udevice, &interface, VID, PID, tx)?;

    let info = VirtualDeviceInfo {
        name: config.name.clone(),
        phys: format!("{}/input0", udevice.usb_path()),
        vendor_id: udevice.id_vendor(),
        product_id: udevice.id_product(),
        version: udevice.id_version(),
    };
    let mut options = SessionOptions::new(info);
    options.force_feedback = config.rumble;
    options.teardown_timeout = config.teardown_timeout();

    let session = Session::attach(
        Arc::new(transport),
        rx,
        Box::new(EvdevGamepad::new()),
        options,
    )
    .await
    .map_err(|e| {
        log::error!("Failed to attach {}: {e} ({})", udevice.devnode(), e.errno());
        e
    })?;

    Ok(session)
}
