use packed_struct::{PackedStruct, PackingError};

use super::{driver::PACKET_SIZE, hid_report::PackedInputDataReport};

/// Triggers below this raw value read as released
pub const TRIGGER_RELEASE_THRESHOLD: u8 = 16;
/// Triggers above this raw value read as pressed
pub const TRIGGER_PRESS_THRESHOLD: u8 = 32;

/// Button, trigger and axis state of the gamepad. Button names follow the
/// labels printed on the device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GamepadState {
    // Face buttons
    pub a: bool,
    pub b: bool,
    pub x: bool,
    pub y: bool,

    // Middle buttons
    pub plus: bool,
    pub minus: bool,
    pub menu: bool,

    // Shoulder buttons
    pub lb: bool,
    pub rb: bool,
    /// Experimental, only set through a button chord
    pub l4: bool,
    /// Experimental, only set through a button chord
    pub r4: bool,

    // Stick buttons
    pub ls_click: bool,
    pub rs_click: bool,

    // DPad
    pub dpad_up: bool,
    pub dpad_down: bool,
    pub dpad_left: bool,
    pub dpad_right: bool,

    // Triggers
    pub lt_analog: u8,
    pub rt_analog: u8,
    pub lt_button: bool,
    pub rt_button: bool,

    // Sticks
    pub joystick_l_x: i16,
    pub joystick_l_y: i16,
    pub joystick_r_x: i16,
    pub joystick_r_y: i16,
}

impl GamepadState {
    /// Decode the given input report. Returns `None` if the report does not
    /// carry input data. The trigger buttons of `previous` are kept while the
    /// trigger sits between the release and press thresholds.
    pub fn decode(
        buf: &[u8; PACKET_SIZE],
        previous: &GamepadState,
    ) -> Result<Option<GamepadState>, PackingError> {
        let report = PackedInputDataReport::unpack(buf)?;
        if !report.is_input_data() {
            log::trace!("Ignoring report type {:#04x}", report.report_type);
            return Ok(None);
        }

        Ok(Some(Self::from_report(&report, previous)))
    }

    fn from_report(report: &PackedInputDataReport, previous: &GamepadState) -> Self {
        Self {
            a: report.a,
            b: report.b,
            x: report.x,
            y: report.y,
            plus: report.plus,
            minus: report.minus,
            menu: report.menu,
            lb: report.lb,
            rb: report.rb,
            l4: false,
            r4: false,
            ls_click: report.ls_click,
            rs_click: report.rs_click,
            dpad_up: report.dpad_up,
            dpad_down: report.dpad_down,
            dpad_left: report.dpad_left,
            dpad_right: report.dpad_right,
            lt_analog: report.lt_analog,
            rt_analog: report.rt_analog,
            lt_button: trigger_button(report.lt_analog, previous.lt_button),
            rt_button: trigger_button(report.rt_analog, previous.rt_button),
            joystick_l_x: report.joystick_l_x,
            joystick_l_y: report.joystick_l_y,
            joystick_r_x: report.joystick_r_x,
            joystick_r_y: report.joystick_r_y,
        }
    }
}

/// Digital value of an analog trigger. The two thresholds leave a band in
/// which the previous value is kept so the button does not chatter.
pub fn trigger_button(value: u8, previous: bool) -> bool {
    if value < TRIGGER_RELEASE_THRESHOLD {
        false
    } else if value > TRIGGER_PRESS_THRESHOLD {
        true
    } else {
        previous
    }
}
