use std::{error::Error, path::PathBuf};

use crate::{
    drivers::ultimate_2c::driver::{matches, vendor_interface, PID, VID},
    udev::device::UsbInterface,
};

fn interface(number: u8, class: u8) -> UsbInterface {
    UsbInterface {
        number,
        class,
        path: PathBuf::from(format!("/sys/bus/usb/devices/1-2:1.{number}")),
    }
}

#[test]
fn test_matches() -> Result<(), Box<dyn Error>> {
    assert!(matches(VID, PID));
    assert!(matches(0x2dc8, 0x310a));
    assert!(!matches(VID, 0x3106));
    assert!(!matches(0x045e, PID));

    Ok(())
}

#[test]
fn test_vendor_interface() -> Result<(), Box<dyn Error>> {
    // HID and audio interfaces are skipped
    let interfaces = vec![interface(0, 0x03), interface(1, 0xff), interface(2, 0xff)];
    let found = vendor_interface(interfaces).ok_or("no interface")?;
    assert_eq!(found.number, 1);

    assert!(vendor_interface(vec![interface(0, 0x03)]).is_none());
    assert!(vendor_interface(vec![]).is_none());

    Ok(())
}
