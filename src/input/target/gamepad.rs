//! Virtual gamepad created through uinput. Buttons and axes follow the
//! Xbox 360 layout, rumble requests from the host are forwarded to the
//! physical gamepad.
use std::{
    collections::HashMap,
    error::Error,
    io,
    ops::DerefMut,
    os::fd::AsRawFd,
    sync::{Arc, Mutex},
    thread,
    time::{Duration, Instant},
};

use evdev::{
    uinput::{VirtualDevice, VirtualDeviceBuilder},
    AbsInfo, AbsoluteAxisCode, AttributeSet, BusType, EventSummary, EventType, FFEffectCode,
    FFEffectKind, InputEvent, InputId, KeyCode, UInputCode, UinputAbsSetup,
};
use nix::fcntl::{FcntlArg, OFlag};

use crate::drivers::ultimate_2c::event::{Axis, Button, InputReport, AXES, BUTTONS};

use super::{EmitterError, EventEmitter, RumbleHandler, VirtualDeviceInfo};

/// How long to sleep before polling for force feedback events
const POLL_RATE: Duration = Duration::from_micros(1666);

/// [EventEmitter] backed by a uinput virtual device
#[derive(Default)]
pub struct EvdevGamepad {
    info: Option<VirtualDeviceInfo>,
    rumble: Option<RumbleHandler>,
    device: Option<Arc<Mutex<VirtualDevice>>>,
}

impl EvdevGamepad {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the virtual device to emulate
    fn create_virtual_device(
        info: &VirtualDeviceInfo,
        force_feedback: bool,
    ) -> Result<VirtualDevice, io::Error> {
        // Setup Key inputs
        let mut keys = AttributeSet::<KeyCode>::new();
        for button in BUTTONS {
            keys.insert(key_code(button));
        }

        // Setup ABS inputs
        let joystick_setup = AbsInfo::new(0, -32768, 32767, 16, 128, 0);
        let abs_x = UinputAbsSetup::new(AbsoluteAxisCode::ABS_X, joystick_setup);
        let abs_y = UinputAbsSetup::new(AbsoluteAxisCode::ABS_Y, joystick_setup);
        let abs_rx = UinputAbsSetup::new(AbsoluteAxisCode::ABS_RX, joystick_setup);
        let abs_ry = UinputAbsSetup::new(AbsoluteAxisCode::ABS_RY, joystick_setup);
        let dpad_setup = AbsInfo::new(0, -1, 1, 0, 0, 0);
        let abs_hat0x = UinputAbsSetup::new(AbsoluteAxisCode::ABS_HAT0X, dpad_setup);
        let abs_hat0y = UinputAbsSetup::new(AbsoluteAxisCode::ABS_HAT0Y, dpad_setup);

        // Identify to the kernel with the ids of the physical device
        let id = InputId::new(BusType(3), info.vendor_id, info.product_id, info.version);

        let mut builder = VirtualDeviceBuilder::new()?
            .name(info.name.as_str())
            .input_id(id)
            .with_keys(&keys)?
            .with_absolute_axis(&abs_x)?
            .with_absolute_axis(&abs_y)?
            .with_absolute_axis(&abs_rx)?
            .with_absolute_axis(&abs_ry)?
            .with_absolute_axis(&abs_hat0x)?
            .with_absolute_axis(&abs_hat0y)?;

        // Setup Force Feedback
        if force_feedback {
            let mut ff = AttributeSet::<FFEffectCode>::new();
            ff.insert(FFEffectCode::FF_RUMBLE);
            ff.insert(FFEffectCode::FF_GAIN);
            builder = builder.with_ff(&ff)?;
        }

        let device = builder.build()?;

        // Set the device to do non-blocking reads so the force feedback
        // thread never holds the device lock while waiting
        let raw_fd = device.as_raw_fd();
        nix::fcntl::fcntl(raw_fd, FcntlArg::F_SETFL(OFlag::O_NONBLOCK)).map_err(io::Error::from)?;

        Ok(device)
    }

    /// Spawns the force-feedback handler thread
    fn spawn_ff_thread(device: Arc<Mutex<VirtualDevice>>, rumble: RumbleHandler) {
        tokio::task::spawn_blocking(move || {
            let mut player = RumblePlayer::new();
            loop {
                // The device was unregistered when this thread holds the only
                // reference to it
                if Arc::strong_count(&device) == 1 {
                    log::debug!("Virtual device stopped. Stopping FF handler thread.");
                    break;
                }

                if let Err(e) = process_ff(&device, &mut player) {
                    log::warn!("Error processing FF events: {e:?}");
                }
                if let Some((weak, strong)) = player.update(Instant::now()) {
                    log::trace!("Rumble weak={weak} strong={strong}");
                    rumble(weak, strong);
                }

                thread::sleep(POLL_RATE);
            }
        });
    }
}

impl EventEmitter for EvdevGamepad {
    fn allocate(&mut self, info: &VirtualDeviceInfo) -> Result<(), EmitterError> {
        log::debug!("Creating virtual gamepad {} at {}", info.name, info.phys);
        self.info = Some(info.clone());
        Ok(())
    }

    fn create_force_feedback(&mut self, handler: RumbleHandler) -> Result<(), EmitterError> {
        if self.info.is_none() {
            return Err(EmitterError::NotRegistered);
        }
        self.rumble = Some(handler);
        Ok(())
    }

    fn register(&mut self) -> Result<(), EmitterError> {
        let Some(info) = self.info.as_ref() else {
            return Err(EmitterError::NotRegistered);
        };
        let device = Self::create_virtual_device(info, self.rumble.is_some())?;
        let device = Arc::new(Mutex::new(device));

        if let Some(rumble) = self.rumble.clone() {
            Self::spawn_ff_thread(device.clone(), rumble);
        }

        self.device = Some(device);
        log::debug!("Registered virtual gamepad");
        Ok(())
    }

    fn report(&mut self, report: &InputReport) -> Result<(), EmitterError> {
        let Some(device) = self.device.as_ref() else {
            return Err(EmitterError::NotRegistered);
        };

        let mut events = Vec::with_capacity(BUTTONS.len() + AXES.len());
        for button in BUTTONS {
            let value = i32::from(report.button(button));
            events.push(InputEvent::new(EventType::KEY.0, key_code(button).0, value));
        }
        for axis in AXES {
            let value = report.axis(axis);
            events.push(InputEvent::new(
                EventType::ABSOLUTE.0,
                abs_code(axis).0,
                value,
            ));
        }

        // emit() terminates the batch with a SYN_REPORT
        let mut device = device
            .lock()
            .map_err(|e| io::Error::other(e.to_string()))?;
        device.emit(events.as_slice())?;

        Ok(())
    }

    fn unregister(&mut self) {
        // Dropping the last reference destroys the uinput device
        if self.device.take().is_some() {
            log::debug!("Unregistered virtual gamepad");
        }
        self.rumble = None;
        self.info = None;
    }

    fn destroy_force_feedback(&mut self) {
        self.rumble = None;
    }

    fn free(&mut self) {
        self.device = None;
        self.info = None;
    }
}

/// Key code of the given button
pub fn key_code(button: Button) -> KeyCode {
    match button {
        Button::A => KeyCode::BTN_SOUTH,
        Button::B => KeyCode::BTN_EAST,
        Button::X => KeyCode::BTN_NORTH,
        Button::Y => KeyCode::BTN_WEST,
        Button::LB => KeyCode::BTN_TL,
        Button::RB => KeyCode::BTN_TR,
        Button::LT => KeyCode::BTN_TL2,
        Button::RT => KeyCode::BTN_TR2,
        Button::ThumbL => KeyCode::BTN_THUMBL,
        Button::ThumbR => KeyCode::BTN_THUMBR,
        Button::L4 => KeyCode::BTN_TRIGGER_HAPPY1,
        Button::R4 => KeyCode::BTN_TRIGGER_HAPPY2,
        Button::Start => KeyCode::BTN_START,
        Button::Select => KeyCode::BTN_SELECT,
        Button::Mode => KeyCode::BTN_MODE,
    }
}

/// Absolute axis code of the given axis
pub fn abs_code(axis: Axis) -> AbsoluteAxisCode {
    match axis {
        Axis::LeftStickX => AbsoluteAxisCode::ABS_X,
        Axis::LeftStickY => AbsoluteAxisCode::ABS_Y,
        Axis::RightStickX => AbsoluteAxisCode::ABS_RX,
        Axis::RightStickY => AbsoluteAxisCode::ABS_RY,
        Axis::DPadX => AbsoluteAxisCode::ABS_HAT0X,
        Axis::DPadY => AbsoluteAxisCode::ABS_HAT0Y,
    }
}

/// A rumble effect uploaded by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RumbleEffect {
    weak: u16,
    strong: u16,
    delay: Duration,
    /// Zero plays the effect until it is stopped
    length: Duration,
    playing: Option<Playback>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Playback {
    started: Instant,
    count: u32,
}

impl RumbleEffect {
    /// Magnitudes of the effect at the given time, or `None` while it is
    /// silent
    fn magnitudes(&self, now: Instant) -> Option<(u16, u16)> {
        let playback = self.playing?;
        let elapsed = now.saturating_duration_since(playback.started);
        if self.length.is_zero() {
            return (elapsed >= self.delay).then_some((self.weak, self.strong));
        }

        let cycle = self.delay + self.length;
        let offset = Duration::from_nanos((elapsed.as_nanos() % cycle.as_nanos()) as u64);
        (offset >= self.delay).then_some((self.weak, self.strong))
    }

    fn is_finished(&self, now: Instant) -> bool {
        let Some(playback) = self.playing else {
            return true;
        };
        if self.length.is_zero() {
            return false;
        }
        let cycle = self.delay + self.length;
        now.saturating_duration_since(playback.started) >= cycle * playback.count
    }
}

/// Plays uploaded rumble effects the way the kernel does for devices without
/// effect memory. Effects run for their replay length after their delay and
/// are repeated as often as the host asked. All playing effects are summed
/// and scaled by the device gain.
#[derive(Debug)]
pub struct RumblePlayer {
    effects: HashMap<i16, RumbleEffect>,
    gain: u16,
    /// Last magnitudes handed to the physical gamepad
    output: (u16, u16),
}

impl Default for RumblePlayer {
    fn default() -> Self {
        Self {
            effects: HashMap::new(),
            gain: u16::MAX,
            output: (0, 0),
        }
    }
}

impl RumblePlayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an uploaded effect. Updating a playing effect keeps it playing.
    pub fn upload(&mut self, id: i16, weak: u16, strong: u16, delay_ms: u16, length_ms: u16) {
        let playing = self.effects.get(&id).and_then(|effect| effect.playing);
        let effect = RumbleEffect {
            weak,
            strong,
            delay: Duration::from_millis(u64::from(delay_ms)),
            length: Duration::from_millis(u64::from(length_ms)),
            playing,
        };
        self.effects.insert(id, effect);
    }

    pub fn erase(&mut self, id: i16) -> bool {
        self.effects.remove(&id).is_some()
    }

    /// Start the effect `count` times in a row, or stop it if `count` is zero
    pub fn play(&mut self, id: i16, count: i32, now: Instant) -> bool {
        let Some(effect) = self.effects.get_mut(&id) else {
            return false;
        };
        effect.playing = match u32::try_from(count) {
            Ok(0) | Err(_) => None,
            Ok(count) => Some(Playback {
                started: now,
                count,
            }),
        };
        true
    }

    pub fn set_gain(&mut self, gain: u16) {
        self.gain = gain;
    }

    /// Advance playback to the given time. Returns the new magnitudes if they
    /// differ from the last ones returned.
    pub fn update(&mut self, now: Instant) -> Option<(u16, u16)> {
        let mut weak: u32 = 0;
        let mut strong: u32 = 0;
        for effect in self.effects.values_mut() {
            if effect.playing.is_some() && effect.is_finished(now) {
                effect.playing = None;
            }
            if let Some((w, s)) = effect.magnitudes(now) {
                weak += u32::from(w);
                strong += u32::from(s);
            }
        }

        let scale = |value: u32| {
            let value = value.min(u32::from(u16::MAX));
            (value * u32::from(self.gain) / u32::from(u16::MAX)) as u16
        };
        let output = (scale(weak), scale(strong));
        if output == self.output {
            return None;
        }
        self.output = output;
        Some(output)
    }
}

/// Process force feedback events from the given device and feed them to the
/// rumble player.
fn process_ff(
    device: &Arc<Mutex<VirtualDevice>>,
    player: &mut RumblePlayer,
) -> Result<(), Box<dyn Error>> {
    let events: Vec<InputEvent> = {
        let mut dev = device.lock().map_err(|e| e.to_string())?;
        let events = match dev.deref_mut().fetch_events() {
            Ok(events) => events.collect(),
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => vec![],
            Err(err) => return Err(err.into()),
        };
        events
    };

    for event in events {
        match event.destructure() {
            EventSummary::UInput(event, UInputCode::UI_FF_UPLOAD, ..) => {
                let mut event = device
                    .lock()
                    .map_err(|e| e.to_string())?
                    .process_ff_upload(event)?;
                let effect_id = event.effect_id();
                let effect = event.effect();
                match effect.kind {
                    FFEffectKind::Rumble {
                        strong_magnitude,
                        weak_magnitude,
                    } => {
                        log::debug!(
                            "Upload rumble effect {effect_id} ({}ms after {}ms)",
                            effect.replay.length,
                            effect.replay.delay
                        );
                        player.upload(
                            effect_id,
                            weak_magnitude,
                            strong_magnitude,
                            effect.replay.delay,
                            effect.replay.length,
                        );
                        event.set_retval(0);
                    }
                    kind => {
                        log::debug!("Ignoring unsupported effect: {kind:?}");
                        event.set_retval(-1);
                    }
                }
            }
            EventSummary::UInput(event, UInputCode::UI_FF_ERASE, ..) => {
                let event = device
                    .lock()
                    .map_err(|e| e.to_string())?
                    .process_ff_erase(event)?;
                let effect_id = event.effect_id() as i16;
                log::debug!("Erase effect {effect_id}");
                player.erase(effect_id);
            }
            EventSummary::ForceFeedback(_, FFEffectCode::FF_GAIN, value) => {
                log::debug!("Set rumble gain to {value}");
                player.set_gain(value.clamp(0, i32::from(u16::MAX)) as u16);
            }
            EventSummary::ForceFeedback(_, code, value) => {
                let effect_id = code.0 as i16;
                if !player.play(effect_id, value, Instant::now()) {
                    log::debug!("No effect id found: {effect_id}");
                }
            }
            _ => {
                log::trace!("Unhandled event: {event:?}");
            }
        }
    }

    Ok(())
}
