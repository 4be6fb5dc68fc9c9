//! Virtual input devices that decoded gamepad state is reported to.
use std::{io, sync::Arc};

use thiserror::Error;

use crate::drivers::ultimate_2c::event::InputReport;

pub mod gamepad;
#[cfg(test)]
mod gamepad_test;
#[cfg(test)]
pub mod recording;

/// Called with the weak and strong magnitudes whenever the host plays or
/// stops a rumble effect
pub type RumbleHandler = Arc<dyn Fn(u16, u16) + Send + Sync>;

/// Possible errors of an [EventEmitter]
#[derive(Debug, Error)]
pub enum EmitterError {
    #[error("Virtual device error: {0}")]
    Io(#[from] io::Error),
    #[error("Virtual device is not registered")]
    NotRegistered,
    #[error("Unsupported: {0}")]
    Unsupported(String),
}

/// Identity of the virtual device as presented to the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualDeviceInfo {
    pub name: String,
    /// Physical path, e.g. "usb-0000:00:14.0-2/input0"
    pub phys: String,
    pub vendor_id: u16,
    pub product_id: u16,
    pub version: u16,
}

/// Reports gamepad state to the host's input subsystem.
///
/// Setting up a virtual device happens in steps that are undone
/// differently depending on how far they got. Once [EventEmitter::register]
/// succeeded, [EventEmitter::unregister] releases everything. Before that,
/// [EventEmitter::destroy_force_feedback] and [EventEmitter::free] release
/// the force feedback capability and the device object separately.
pub trait EventEmitter: Send {
    /// Create the device object
    fn allocate(&mut self, info: &VirtualDeviceInfo) -> Result<(), EmitterError>;
    /// Add a rumble capability. The handler is called for every rumble
    /// request from the host.
    fn create_force_feedback(&mut self, handler: RumbleHandler) -> Result<(), EmitterError>;
    /// Make the device visible to the host
    fn register(&mut self) -> Result<(), EmitterError>;
    /// Report one complete gamepad state, followed by a sync
    fn report(&mut self, report: &InputReport) -> Result<(), EmitterError>;
    fn unregister(&mut self);
    fn destroy_force_feedback(&mut self);
    fn free(&mut self);
}
