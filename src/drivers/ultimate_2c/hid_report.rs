//! Wire format of the 8BitDo Ultimate 2C in wired mode. The input report
//! follows the Xbox 360 wired layout.
use packed_struct::prelude::*;

/// Different report types. Inbound and outbound reports share the numbering.
pub enum ReportType {
    /// Input data from the device, rumble to the device
    Data = 0x00,
    /// LED pattern to the device
    Led = 0x01,
}

impl ReportType {
    pub fn to_u8(&self) -> u8 {
        match self {
            ReportType::Data => ReportType::Data as u8,
            ReportType::Led => ReportType::Led as u8,
        }
    }
}

// Input report layout:
// byte 0     report type, 0x00 for input data
// byte 2     dpad up/down/left/right, plus, minus, stick clicks (lsb first)
// byte 3     lb, rb, menu, reserved, a, b, x, y (lsb first)
// bytes 4-5  left/right trigger
// bytes 6-13 left x/y, right x/y as little endian i16

/// Input data report. Only the first 14 bytes carry data.
#[derive(PackedStruct, Debug, Copy, Clone, PartialEq, Default)]
#[packed_struct(bit_numbering = "msb0", size_bytes = "32")]
pub struct PackedInputDataReport {
    // byte 0
    #[packed_field(bytes = "0")]
    pub report_type: u8,

    // byte 2
    #[packed_field(bits = "16")]
    pub rs_click: bool,
    #[packed_field(bits = "17")]
    pub ls_click: bool,
    #[packed_field(bits = "18")]
    pub minus: bool,
    #[packed_field(bits = "19")]
    pub plus: bool,
    #[packed_field(bits = "20")]
    pub dpad_right: bool,
    #[packed_field(bits = "21")]
    pub dpad_left: bool,
    #[packed_field(bits = "22")]
    pub dpad_down: bool,
    #[packed_field(bits = "23")]
    pub dpad_up: bool,

    // byte 3
    #[packed_field(bits = "24")]
    pub y: bool,
    #[packed_field(bits = "25")]
    pub x: bool,
    #[packed_field(bits = "26")]
    pub b: bool,
    #[packed_field(bits = "27")]
    pub a: bool,
    #[packed_field(bits = "28")]
    pub _reserved: bool,
    #[packed_field(bits = "29")]
    pub menu: bool,
    #[packed_field(bits = "30")]
    pub rb: bool,
    #[packed_field(bits = "31")]
    pub lb: bool,

    // bytes 4-5
    #[packed_field(bytes = "4")]
    pub lt_analog: u8,
    #[packed_field(bytes = "5")]
    pub rt_analog: u8,

    // bytes 6-13
    #[packed_field(bytes = "6..=7", endian = "lsb")]
    pub joystick_l_x: i16,
    #[packed_field(bytes = "8..=9", endian = "lsb")]
    pub joystick_l_y: i16,
    #[packed_field(bytes = "10..=11", endian = "lsb")]
    pub joystick_r_x: i16,
    #[packed_field(bytes = "12..=13", endian = "lsb")]
    pub joystick_r_y: i16,
}

impl PackedInputDataReport {
    pub fn is_input_data(&self) -> bool {
        self.report_type == ReportType::Data.to_u8()
    }
}

/// Rumble output report. The left motor carries the heavy weight.
#[derive(PackedStruct, Debug, Copy, Clone, PartialEq)]
#[packed_struct(bit_numbering = "msb0", size_bytes = "8")]
pub struct RumbleOutputReport {
    // byte 0
    #[packed_field(bytes = "0")]
    pub report_type: u8,
    // byte 1
    #[packed_field(bytes = "1")]
    pub length: u8,
    // byte 3
    #[packed_field(bytes = "3")]
    pub left_motor: u8,
    // byte 4
    #[packed_field(bytes = "4")]
    pub right_motor: u8,
}

impl Default for RumbleOutputReport {
    fn default() -> Self {
        Self {
            report_type: ReportType::Data.to_u8(),
            length: 0x08,
            left_motor: 0,
            right_motor: 0,
        }
    }
}

impl RumbleOutputReport {
    /// Build a rumble report from force feedback magnitudes. The motors only
    /// have 8 bits of resolution, so the low byte of each magnitude is dropped.
    pub fn new(weak: u16, strong: u16) -> Self {
        Self {
            left_motor: (strong >> 8) as u8,
            right_motor: (weak >> 8) as u8,
            ..Default::default()
        }
    }
}

/// LED report of the Xbox protocol. The gamepad has no programmable LED but
/// will not send any input reports until it has received this.
#[derive(PackedStruct, Debug, Copy, Clone, PartialEq)]
#[packed_struct(bit_numbering = "msb0", size_bytes = "3")]
pub struct WelcomeOutputReport {
    #[packed_field(bytes = "0")]
    pub report_type: u8,
    #[packed_field(bytes = "1")]
    pub length: u8,
    #[packed_field(bytes = "2")]
    pub pattern: u8,
}

impl Default for WelcomeOutputReport {
    fn default() -> Self {
        Self {
            report_type: ReportType::Led.to_u8(),
            length: 0x03,
            pattern: 0x00,
        }
    }
}
