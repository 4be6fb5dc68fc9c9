
pub mod device;

use std::error::Error;

use udev::Enumerator;

use self::device::UdevDevice;

/// Returns a list of devices in the given subsystem that have a devnode property.
pub fn discover_devices(subsystem: &str) -> Result<Vec<UdevDevice>, Box<dyn Error + Send + Sync>> {
    let mut enumerator = Enumerator::new()?;
    enumerator.match_subsystem(subsystem)?;

    log::debug!("Started udev {subsystem} enumerator.");

    Ok(enumerator
        .scan_devices()?
        .into_iter()
        .filter(|device| device.devnode().is_some())
        .map(UdevDevice::from)
        .collect())
}
