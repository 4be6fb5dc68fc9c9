use std::error::Error;

use crate::drivers::ultimate_2c::state::{trigger_button, GamepadState};

#[test]
fn test_decode_other_report() -> Result<(), Box<dyn Error>> {
    let previous = GamepadState::default();
    for report_type in [0x01, 0x02, 0x11, 0xff] {
        let mut buf = [0xff; 32];
        buf[0] = report_type;
        assert_eq!(GamepadState::decode(&buf, &previous)?, None);
    }

    Ok(())
}

#[test]
fn test_decode() -> Result<(), Box<dyn Error>> {
    let mut buf = [0; 32];
    buf[2] = 0b0011_0000; // minus, plus
    buf[3] = 0b1001_0100; // y, a, menu
    buf[6..8].copy_from_slice(&(-300_i16).to_le_bytes());
    buf[12..14].copy_from_slice(&0x1234_i16.to_le_bytes());

    let state = GamepadState::decode(&buf, &GamepadState::default())?.ok_or("no state")?;
    assert!(state.minus);
    assert!(state.plus);
    assert!(state.y);
    assert!(state.a);
    assert!(state.menu);
    assert!(!state.x);
    assert!(!state.b);
    assert!(!state.l4);
    assert!(!state.r4);
    assert_eq!(state.joystick_l_x, -300);
    assert_eq!(state.joystick_l_y, 0);
    assert_eq!(state.joystick_r_x, 0);
    assert_eq!(state.joystick_r_y, 0x1234);

    // Decoding the same packet from the same state gives the same result
    let again = GamepadState::decode(&buf, &GamepadState::default())?.ok_or("no state")?;
    assert_eq!(state, again);

    Ok(())
}

#[test]
fn test_trigger_hysteresis() -> Result<(), Box<dyn Error>> {
    for previous in [false, true] {
        assert!(!trigger_button(0, previous));
        assert!(!trigger_button(15, previous));
        assert!(trigger_button(33, previous));
        assert!(trigger_button(255, previous));
        // The band in between keeps the previous value
        assert_eq!(trigger_button(16, previous), previous);
        assert_eq!(trigger_button(24, previous), previous);
        assert_eq!(trigger_button(32, previous), previous);
    }

    Ok(())
}

#[test]
fn test_decode_triggers() -> Result<(), Box<dyn Error>> {
    let mut buf = [0; 32];
    buf[4] = 24;
    buf[5] = 24;

    // Released stays released
    let state = GamepadState::decode(&buf, &GamepadState::default())?.ok_or("no state")?;
    assert!(!state.lt_button);
    assert!(!state.rt_button);
    assert_eq!(state.lt_analog, 24);

    // Pressed stays pressed
    let previous = GamepadState {
        lt_button: true,
        ..Default::default()
    };
    let state = GamepadState::decode(&buf, &previous)?.ok_or("no state")?;
    assert!(state.lt_button);
    assert!(!state.rt_button);

    buf[4] = 33;
    buf[5] = 15;
    let state = GamepadState::decode(&buf, &GamepadState::default())?.ok_or("no state")?;
    assert!(state.lt_button);
    assert!(!state.rt_button);

    Ok(())
}
