//! Virtual buttons built from button chords.
//!
//! The gamepad has no L4/R4 buttons of its own. Holding both stick buttons
//! together with minus or plus reports L4 or R4 instead, and the buttons that
//! formed the chord are not reported for that cycle. The chord can be put on
//! the back buttons with the vendor's macro feature.
use super::state::GamepadState;

/// Apply the L4/R4 chords to a freshly decoded state
pub fn apply(mut state: GamepadState) -> GamepadState {
    let sticks = state.ls_click && state.rs_click;

    state.l4 = sticks && state.minus;
    state.r4 = sticks && state.plus;

    // The chord is consumed
    if state.l4 || state.r4 {
        state.ls_click = false;
        state.rs_click = false;
        state.plus = false;
        state.minus = false;
    }

    state
}

/// Detects the L + R + Plus + Minus chord, used to check from the log that
/// the driver still receives input.
#[derive(Debug, Default)]
pub struct Heartbeat {
    held: bool,
}

impl Heartbeat {
    /// Returns true once when the chord is first seen, and again only after
    /// it has been released.
    pub fn update(&mut self, state: &GamepadState) -> bool {
        let chord = state.plus && state.minus && state.lb && state.rb;
        let fired = chord && !self.held;
        self.held = chord;
        fired
    }
}
