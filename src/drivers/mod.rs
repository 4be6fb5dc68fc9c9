//! Registry of supported devices. Each entry pairs an identification
//! predicate with the function that attaches a session to a matching device.
pub mod ultimate_2c;


use std::error::Error;

use futures::future::BoxFuture;

use crate::{config::Config, udev::device::UdevDevice};

use self::ultimate_2c::session::Session;

/// Future returned when attaching a device
pub type AttachFuture<'a> = BoxFuture<'a, Result<Session, Box<dyn Error + Send + Sync>>>;

/// A supported device
#[derive(Clone, Copy)]
pub struct DriverEntry {
    pub name: &'static str,
    pub vendor_id: u16,
    pub product_id: u16,
    /// Returns true if the driver handles the given vendor and product ids
    pub matches: fn(u16, u16) -> bool,
    pub attach: for<'a> fn(&'a UdevDevice, &'a Config) -> AttachFuture<'a>,
}

impl std::fmt::Debug for DriverEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriverEntry")
            .field("name", &self.name)
            .field("vendor_id", &format_args!("{:04x}", self.vendor_id))
            .field("product_id", &format_args!("{:04x}", self.product_id))
            .finish()
    }
}

fn attach_ultimate_2c<'a>(udevice: &'a UdevDevice, config: &'a Config) -> AttachFuture<'a> {
    Box::pin(ultimate_2c::driver::attach(udevice, config))
}

/// All supported devices
pub static DRIVERS: [DriverEntry; 1] = [DriverEntry {
    name: "8BitDo Ultimate 2C",
    vendor_id: ultimate_2c::driver::VID,
    product_id: ultimate_2c::driver::PID,
    matches: ultimate_2c::driver::matches,
    attach: attach_ultimate_2c,
}];

/// Returns the driver for the given vendor and product ids
pub fn find_driver(vendor_id: u16, product_id: u16) -> Option<&'static DriverEntry> {
    DRIVERS
        .iter()
        .find(|driver| (driver.matches)(vendor_id, product_id))
}
