use std::error::Error;

use packed_struct::PackedStruct;

use crate::drivers::ultimate_2c::hid_report::{
    PackedInputDataReport, RumbleOutputReport, WelcomeOutputReport,
};

#[test]
fn test_rumble_report() -> Result<(), Box<dyn Error>> {
    let report = RumbleOutputReport::new(0x4000, 0x8000);
    assert_eq!(report.pack()?, [0x00, 0x08, 0x00, 0x80, 0x40, 0x00, 0x00, 0x00]);

    // Only the high byte of each magnitude is sent
    let report = RumbleOutputReport::new(0x00ff, 0xffff);
    assert_eq!(report.pack()?, [0x00, 0x08, 0x00, 0xff, 0x00, 0x00, 0x00, 0x00]);

    let report = RumbleOutputReport::new(0, 0);
    assert_eq!(report.pack()?, [0x00, 0x08, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00]);

    Ok(())
}

#[test]
fn test_welcome_report() -> Result<(), Box<dyn Error>> {
    let report = WelcomeOutputReport::default();
    assert_eq!(report.pack()?, [0x01, 0x03, 0x00]);

    Ok(())
}

#[test]
fn test_input_data_report() -> Result<(), Box<dyn Error>> {
    let mut buf = [0; 32];
    buf[2] = 0b1000_0001; // rs_click, dpad_up
    buf[3] = 0b0100_0010; // x, rb
    buf[4] = 0x20;
    buf[5] = 0xfe;
    buf[6..8].copy_from_slice(&1234_i16.to_le_bytes());
    buf[8..10].copy_from_slice(&(-1234_i16).to_le_bytes());
    buf[10..12].copy_from_slice(&i16::MAX.to_le_bytes());
    buf[12..14].copy_from_slice(&i16::MIN.to_le_bytes());

    let report = PackedInputDataReport::unpack(&buf)?;
    println!("{report:?}");
    assert!(report.is_input_data());
    assert!(report.rs_click);
    assert!(report.dpad_up);
    assert!(!report.ls_click);
    assert!(!report.dpad_right);
    assert!(report.x);
    assert!(report.rb);
    assert!(!report.y);
    assert!(!report.lb);
    assert_eq!(report.lt_analog, 0x20);
    assert_eq!(report.rt_analog, 0xfe);
    assert_eq!(report.joystick_l_x, 1234);
    assert_eq!(report.joystick_l_y, -1234);
    assert_eq!(report.joystick_r_x, i16::MAX);
    assert_eq!(report.joystick_r_y, i16::MIN);

    buf[0] = 0x01;
    let report = PackedInputDataReport::unpack(&buf)?;
    assert!(!report.is_input_data());

    Ok(())
}
