use std::error::Error;

use tabled::settings::{Panel, Style};
use tabled::{Table, Tabled};

use crate::{drivers::find_driver, udev::discover_devices};

#[derive(Tabled)]
struct DeviceRow {
    path: String,
    name: String,
    id: String,
    driver: String,
}

pub fn handle_devices() -> Result<(), Box<dyn Error + Send + Sync>> {
    let mut devices = discover_devices("usb")?;
    devices.sort_by_key(|device| device.devnode());

    let rows: Vec<DeviceRow> = devices
        .into_iter()
        .filter_map(|device| {
            let vendor_id = device.id_vendor();
            let product_id = device.id_product();
            let driver = find_driver(vendor_id, product_id)?;
            let name = format!("{} {}", device.manufacturer(), device.product());
            Some(DeviceRow {
                path: device.devnode(),
                name: name.trim().to_string(),
                id: format!("{vendor_id:04x}:{product_id:04x}"),
                driver: driver.name.to_string(),
            })
        })
        .collect();
    let count = rows.len();

    let mut table = Table::new(rows);
    table
        .with(Style::modern_rounded())
        .with(Panel::header("Gamepads"));
    println!("{table}");
    println!("Found {count} gamepad(s)");

    Ok(())
}
