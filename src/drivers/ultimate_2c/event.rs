use super::state::GamepadState;

/// Buttons reported to the host, named after the host's gamepad layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Button {
    A,
    B,
    X,
    Y,
    /// Left shoulder button
    LB,
    /// Right shoulder button
    RB,
    /// Left trigger, reported as a button
    LT,
    /// Right trigger, reported as a button
    RT,
    /// Left stick click
    ThumbL,
    /// Right stick click
    ThumbR,
    L4,
    R4,
    Start,
    Select,
    Mode,
}

/// Absolute axes reported to the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    LeftStickX,
    LeftStickY,
    RightStickX,
    RightStickY,
    /// DPad left (-1) to right (1)
    DPadX,
    /// DPad up (-1) to down (1)
    DPadY,
}

/// Every button the virtual gamepad exposes
pub const BUTTONS: [Button; 15] = [
    Button::A,
    Button::B,
    Button::X,
    Button::Y,
    Button::Start,
    Button::Select,
    Button::Mode,
    Button::LB,
    Button::RB,
    Button::LT,
    Button::RT,
    Button::ThumbL,
    Button::ThumbR,
    Button::L4,
    Button::R4,
];

/// Every axis the virtual gamepad exposes
pub const AXES: [Axis; 6] = [
    Axis::DPadX,
    Axis::DPadY,
    Axis::LeftStickX,
    Axis::LeftStickY,
    Axis::RightStickX,
    Axis::RightStickY,
];

/// Snapshot of the gamepad as the host sees it. One report is emitted for
/// every input data report received.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InputReport {
    pub a: bool,
    pub b: bool,
    pub x: bool,
    pub y: bool,
    pub lb: bool,
    pub rb: bool,
    pub lt: bool,
    pub rt: bool,
    pub thumb_l: bool,
    pub thumb_r: bool,
    pub l4: bool,
    pub r4: bool,
    pub start: bool,
    pub select: bool,
    pub mode: bool,
    pub dpad_x: i8,
    pub dpad_y: i8,
    pub left_x: i16,
    pub left_y: i16,
    pub right_x: i16,
    pub right_y: i16,
}

impl InputReport {
    pub fn button(&self, button: Button) -> bool {
        match button {
            Button::A => self.a,
            Button::B => self.b,
            Button::X => self.x,
            Button::Y => self.y,
            Button::LB => self.lb,
            Button::RB => self.rb,
            Button::LT => self.lt,
            Button::RT => self.rt,
            Button::ThumbL => self.thumb_l,
            Button::ThumbR => self.thumb_r,
            Button::L4 => self.l4,
            Button::R4 => self.r4,
            Button::Start => self.start,
            Button::Select => self.select,
            Button::Mode => self.mode,
        }
    }

    pub fn axis(&self, axis: Axis) -> i32 {
        match axis {
            Axis::LeftStickX => self.left_x.into(),
            Axis::LeftStickY => self.left_y.into(),
            Axis::RightStickX => self.right_x.into(),
            Axis::RightStickY => self.right_y.into(),
            Axis::DPadX => self.dpad_x.into(),
            Axis::DPadY => self.dpad_y.into(),
        }
    }
}

impl From<&GamepadState> for InputReport {
    fn from(state: &GamepadState) -> Self {
        Self {
            a: state.a,
            b: state.b,
            // X and Y are swapped on the host's layout
            x: state.y,
            y: state.x,
            lb: state.lb,
            rb: state.rb,
            lt: state.lt_button,
            rt: state.rt_button,
            thumb_l: state.ls_click,
            thumb_r: state.rs_click,
            l4: state.l4,
            r4: state.r4,
            start: state.plus,
            select: state.minus,
            mode: state.menu,
            dpad_x: dpad_axis(state.dpad_left, state.dpad_right),
            dpad_y: dpad_axis(state.dpad_up, state.dpad_down),
            left_x: state.joystick_l_x,
            // The device reports up as negative
            left_y: state.joystick_l_y.saturating_neg(),
            right_x: state.joystick_r_x,
            right_y: state.joystick_r_y.saturating_neg(),
        }
    }
}

fn dpad_axis(negative: bool, positive: bool) -> i8 {
    i8::from(positive) - i8::from(negative)
}
