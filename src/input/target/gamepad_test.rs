use std::{
    error::Error,
    time::{Duration, Instant},
};

use evdev::{AbsoluteAxisCode, KeyCode};

use crate::{
    drivers::ultimate_2c::event::{Axis, Button},
    input::target::gamepad::{abs_code, key_code, RumblePlayer},
};

fn ms(value: u64) -> Duration {
    Duration::from_millis(value)
}

#[test]
fn test_rumble_stops_after_replay_length() -> Result<(), Box<dyn Error>> {
    let start = Instant::now();
    let mut player = RumblePlayer::new();
    player.upload(0, 0x4000, 0x8000, 0, 100);

    // Uploading alone does not play anything
    assert_eq!(player.update(start), None);

    assert!(player.play(0, 1, start));
    assert_eq!(player.update(start), Some((0x4000, 0x8000)));
    assert_eq!(player.update(start + ms(50)), None);

    // The host never sends a stop, the length ends the effect
    assert_eq!(player.update(start + ms(100)), Some((0, 0)));
    assert_eq!(player.update(start + ms(500)), None);

    Ok(())
}

#[test]
fn test_rumble_waits_for_replay_delay() -> Result<(), Box<dyn Error>> {
    let start = Instant::now();
    let mut player = RumblePlayer::new();
    player.upload(3, 0xffff, 0xffff, 50, 100);
    player.play(3, 1, start);

    assert_eq!(player.update(start + ms(10)), None);
    assert_eq!(player.update(start + ms(50)), Some((0xffff, 0xffff)));
    assert_eq!(player.update(start + ms(150)), Some((0, 0)));

    Ok(())
}

#[test]
fn test_rumble_repeat_count() -> Result<(), Box<dyn Error>> {
    let start = Instant::now();
    let mut player = RumblePlayer::new();
    player.upload(1, 0, 0x8000, 20, 30);
    player.play(1, 2, start);

    let mut changes = vec![];
    for step in 0..=20 {
        if let Some(output) = player.update(start + ms(step * 5)) {
            changes.push((step * 5, output));
        }
    }

    // Two cycles of 20ms silence followed by 30ms of rumble
    assert_eq!(
        changes,
        vec![
            (20, (0, 0x8000)),
            (50, (0, 0)),
            (70, (0, 0x8000)),
            (100, (0, 0)),
        ]
    );

    Ok(())
}

#[test]
fn test_rumble_zero_length_plays_until_stopped() -> Result<(), Box<dyn Error>> {
    let start = Instant::now();
    let mut player = RumblePlayer::new();
    player.upload(0, 0x1000, 0x2000, 0, 0);
    player.play(0, 1, start);

    assert_eq!(player.update(start), Some((0x1000, 0x2000)));
    assert_eq!(player.update(start + Duration::from_secs(60)), None);

    // A play with a count of zero stops the effect
    player.play(0, 0, start + Duration::from_secs(61));
    assert_eq!(player.update(start + Duration::from_secs(61)), Some((0, 0)));

    Ok(())
}

#[test]
fn test_rumble_gain() -> Result<(), Box<dyn Error>> {
    let start = Instant::now();
    let mut player = RumblePlayer::new();
    player.upload(0, 0xffff, 0x8000, 0, 0);
    player.play(0, 1, start);
    assert_eq!(player.update(start), Some((0xffff, 0x8000)));

    player.set_gain(0x8000);
    let (weak, strong) = player.update(start).ok_or("no output")?;
    assert_eq!(weak, 0x8000);
    assert_eq!(strong, 0x4000);

    player.set_gain(0);
    assert_eq!(player.update(start), Some((0, 0)));

    Ok(())
}

#[test]
fn test_rumble_effects_are_combined() -> Result<(), Box<dyn Error>> {
    let start = Instant::now();
    let mut player = RumblePlayer::new();
    player.upload(0, 0x9000, 0x1000, 0, 0);
    player.upload(1, 0x9000, 0x2000, 0, 0);
    player.play(0, 1, start);
    player.play(1, 1, start);

    // Magnitudes saturate instead of wrapping
    assert_eq!(player.update(start), Some((0xffff, 0x3000)));

    // Erasing a playing effect removes its share
    assert!(player.erase(1));
    assert_eq!(player.update(start), Some((0x9000, 0x1000)));
    assert!(!player.erase(1));

    Ok(())
}

#[test]
fn test_rumble_unknown_effect() -> Result<(), Box<dyn Error>> {
    let mut player = RumblePlayer::new();
    assert!(!player.play(7, 1, Instant::now()));
    assert_eq!(player.update(Instant::now()), None);

    Ok(())
}

#[test]
fn test_event_codes() -> Result<(), Box<dyn Error>> {
    assert_eq!(key_code(Button::A), KeyCode::BTN_SOUTH);
    assert_eq!(key_code(Button::Y), KeyCode::BTN_WEST);
    assert_eq!(key_code(Button::L4), KeyCode::BTN_TRIGGER_HAPPY1);
    // Stick clicks
    assert_eq!(key_code(Button::ThumbL), KeyCode::BTN_THUMBL);
    assert_eq!(key_code(Button::ThumbR), KeyCode::BTN_THUMBR);
    assert_eq!(abs_code(Axis::RightStickY), AbsoluteAxisCode::ABS_RY);
    assert_eq!(abs_code(Axis::DPadX), AbsoluteAxisCode::ABS_HAT0X);

    Ok(())
}
