use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, MutexGuard, PoisonError, Weak,
    },
    time::Duration,
};

use nix::errno::Errno;
use thiserror::Error;
use tokio::{sync::mpsc, task::JoinHandle};

use crate::{
    input::target::{EmitterError, EventEmitter, RumbleHandler, VirtualDeviceInfo},
    transport::{Completion, Direction, EndpointDescriptor, Pipe, Transport, TransportError},
};

use super::{
    driver::{PACKET_SIZE, TEARDOWN_TIMEOUT},
    event::InputReport,
    macros::{self, Heartbeat},
    scheduler::{SendOutcome, TransferScheduler},
    state::GamepadState,
};

/// Possible errors while attaching a gamepad
#[derive(Debug, Error)]
pub enum AttachError {
    #[error("Out of memory")]
    OutOfMemory,
    #[error("No such device")]
    NoSuchDevice,
    #[error("Failed to register virtual device: {0}")]
    Registration(#[from] EmitterError),
}

impl AttachError {
    pub fn errno(&self) -> Errno {
        match self {
            AttachError::OutOfMemory => Errno::ENOMEM,
            AttachError::NoSuchDevice => Errno::ENODEV,
            AttachError::Registration(EmitterError::Io(e)) => e
                .raw_os_error()
                .map(Errno::from_raw)
                .unwrap_or(Errno::EIO),
            AttachError::Registration(_) => Errno::EINVAL,
        }
    }
}

impl From<TransportError> for AttachError {
    fn from(err: TransportError) -> Self {
        log::debug!("Transport error during attach: {err}");
        match err {
            TransportError::Disconnected => AttachError::NoSuchDevice,
            _ => AttachError::OutOfMemory,
        }
    }
}

/// Lifecycle of a [Session]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Attaching,
    Active,
    Detaching,
    Freed,
}

/// Settings for one session
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub info: VirtualDeviceInfo,
    /// Advertise a rumble capability on the virtual device
    pub force_feedback: bool,
    /// How long to wait for an outbound transfer during teardown
    pub teardown_timeout: Duration,
}

impl SessionOptions {
    pub fn new(info: VirtualDeviceInfo) -> Self {
        Self {
            info,
            force_feedback: true,
            teardown_timeout: TEARDOWN_TIMEOUT,
        }
    }
}

/// How far the virtual device got during registration
#[derive(Debug, Default, Clone, Copy)]
struct Registration {
    allocated: bool,
    force_feedback: bool,
    registered: bool,
}

/// Shared state of one attached gamepad. Completions are dispatched to it
/// from the reactor task, rumble requests from the emitter.
pub struct SessionCore {
    /// Gate for every resubmission and every outbound message. Cleared first
    /// on teardown.
    active: Arc<AtomicBool>,
    state: Mutex<SessionState>,
    scheduler: TransferScheduler,
    emitter: Mutex<Box<dyn EventEmitter>>,
    registration: Mutex<Registration>,
    gamepad: Mutex<GamepadState>,
    heartbeat: Mutex<Heartbeat>,
    options: SessionOptions,
}

impl SessionCore {
    fn new(
        transport: Arc<dyn Transport>,
        emitter: Box<dyn EventEmitter>,
        options: SessionOptions,
    ) -> Self {
        let active = Arc::new(AtomicBool::new(false));
        Self {
            scheduler: TransferScheduler::new(transport, active.clone()),
            active,
            state: Mutex::new(SessionState::Attaching),
            emitter: Mutex::new(emitter),
            registration: Mutex::new(Registration::default()),
            gamepad: Mutex::new(GamepadState::default()),
            heartbeat: Mutex::new(Heartbeat::default()),
            options,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> SessionState {
        *lock(&self.state)
    }

    fn set_state(&self, state: SessionState) {
        *lock(&self.state) = state;
    }

    pub fn scheduler(&self) -> &TransferScheduler {
        &self.scheduler
    }

    /// Last decoded gamepad state
    pub fn gamepad(&self) -> GamepadState {
        *lock(&self.gamepad)
    }

    /// Acquire every resource of the session, greet the gamepad and register
    /// the virtual device. Whatever was acquired before a failure is
    /// released by [SessionCore::teardown].
    fn setup(&self, session: Weak<SessionCore>) -> Result<(), AttachError> {
        // Allow the welcome message to be sent
        self.active.store(true, Ordering::SeqCst);

        self.scheduler.allocate_buffer(Direction::In)?;
        self.scheduler.allocate_buffer(Direction::Out)?;
        self.scheduler.allocate_transfer(Direction::In)?;
        self.scheduler.allocate_transfer(Direction::Out)?;

        let endpoints = self.scheduler.transport().endpoints().map_err(|e| {
            log::error!("Failed to read endpoints: {e}");
            AttachError::NoSuchDevice
        })?;
        let Some((inbound, outbound)) = find_endpoints(&endpoints) else {
            log::error!("Gamepad does not have exactly one interrupt endpoint per direction");
            return Err(AttachError::NoSuchDevice);
        };
        self.scheduler.connect(inbound, outbound);

        let outcome = self.scheduler.send_welcome();
        log::debug!("Welcome message: {outcome:?}");

        self.register_emitter(session)?;

        self.set_state(SessionState::Active);
        log::info!("Gamepad connected successfully");

        self.scheduler.submit_read();
        Ok(())
    }

    fn register_emitter(&self, session: Weak<SessionCore>) -> Result<(), EmitterError> {
        let mut emitter = lock(&self.emitter);
        let mut registration = lock(&self.registration);

        emitter.allocate(&self.options.info)?;
        registration.allocated = true;

        if self.options.force_feedback {
            let handler: RumbleHandler = Arc::new(move |weak, strong| {
                if let Some(core) = session.upgrade() {
                    core.rumble(weak, strong);
                }
            });
            emitter.create_force_feedback(handler)?;
            registration.force_feedback = true;
        }

        emitter.register()?;
        registration.registered = true;

        Ok(())
    }

    /// Undo the registration. A registered device is released as a whole,
    /// otherwise the steps that succeeded are undone one by one.
    fn unregister_emitter(&self) {
        let mut emitter = lock(&self.emitter);
        let mut registration = lock(&self.registration);

        if registration.registered {
            emitter.unregister();
        } else {
            if registration.force_feedback {
                emitter.destroy_force_feedback();
            }
            if registration.allocated {
                emitter.free();
            }
        }
        *registration = Registration::default();
    }

    /// Clears the activation flag and moves to [SessionState::Detaching].
    /// Returns false if teardown already started.
    fn begin_teardown(&self) -> bool {
        self.active.store(false, Ordering::SeqCst);

        let mut state = lock(&self.state);
        if matches!(*state, SessionState::Detaching | SessionState::Freed) {
            return false;
        }
        *state = SessionState::Detaching;
        true
    }

    /// Release everything acquired by [SessionCore::setup]. Safe to call at
    /// any point and more than once.
    pub async fn teardown(&self) {
        if !self.begin_teardown() {
            return;
        }

        self.unregister_emitter();
        self.scheduler.drain(self.options.teardown_timeout).await;
        self.scheduler.release();

        self.set_state(SessionState::Freed);
    }

    /// Same as [SessionCore::teardown] without the grace period for the
    /// outbound transfer
    fn teardown_now(&self) {
        if !self.begin_teardown() {
            return;
        }

        self.unregister_emitter();
        self.scheduler.anchor().kill_anchored(self.scheduler.transport().as_ref());
        self.scheduler.release();

        self.set_state(SessionState::Freed);
    }

    /// Dispatch a finished transfer
    pub fn on_completion(&self, completion: &Completion) {
        match completion.direction {
            Direction::In => self.on_inbound_complete(completion),
            Direction::Out => self.scheduler.on_outbound_complete(completion),
        }
    }

    fn on_inbound_complete(&self, completion: &Completion) {
        if !self.is_active() {
            log::trace!("Ignoring inbound completion of inactive gamepad");
            return;
        }

        // A failed read ends the inbound loop
        if !completion.status.is_ok() {
            log::debug!("Read finished with status {:?}", completion.status);
            return;
        }

        if let Some(packet) = self.scheduler.receive(completion) {
            self.process_packet(&packet);
        }

        if self.is_active() {
            self.scheduler.submit_read();
        }
    }

    /// Decode the given packet and report it. Returns the report that was
    /// emitted, if any.
    pub fn process_packet(&self, packet: &[u8; PACKET_SIZE]) -> Option<InputReport> {
        let state = {
            let mut gamepad = lock(&self.gamepad);
            let state = match GamepadState::decode(packet, &gamepad) {
                Ok(Some(state)) => state,
                Ok(None) => return None,
                Err(e) => {
                    log::debug!("Failed to decode packet: {e:?}");
                    return None;
                }
            };
            let state = macros::apply(state);
            *gamepad = state;
            state
        };
        log::trace!("Gamepad state: {state:?}");

        if lock(&self.heartbeat).update(&state) {
            log::info!("Heartbeat! (L + R + Plus + Minus)");
        }

        let report = InputReport::from(&state);
        if let Err(e) = lock(&self.emitter).report(&report) {
            log::warn!("Failed to report gamepad state: {e}");
        }

        Some(report)
    }

    /// Forward a rumble request from the host to the gamepad
    pub fn rumble(&self, weak: u16, strong: u16) -> SendOutcome {
        let outcome = self.scheduler.send_rumble(weak, strong);
        log::trace!("Rumble weak={weak} strong={strong}: {outcome:?}");
        outcome
    }
}

/// One attached gamepad. Completions from the transport are processed on a
/// reactor task for as long as the session lives.
pub struct Session {
    core: Arc<SessionCore>,
    reactor: Option<JoinHandle<()>>,
}

impl Session {
    /// Attach a gamepad. On failure, everything acquired so far is released
    /// before the error is returned.
    pub async fn attach(
        transport: Arc<dyn Transport>,
        completions: mpsc::UnboundedReceiver<Completion>,
        emitter: Box<dyn EventEmitter>,
        options: SessionOptions,
    ) -> Result<Self, AttachError> {
        let core = Arc::new(SessionCore::new(transport, emitter, options));
        let reactor = tokio::spawn(run_reactor(Arc::downgrade(&core), completions));
        let session = Self {
            core,
            reactor: Some(reactor),
        };

        if let Err(e) = session.core.setup(Arc::downgrade(&session.core)) {
            log::debug!("Attach failed, releasing resources: {e}");
            session.core.teardown().await;
            return Err(e);
        }

        Ok(session)
    }

    pub fn core(&self) -> &Arc<SessionCore> {
        &self.core
    }

    pub fn state(&self) -> SessionState {
        self.core.state()
    }

    pub fn is_active(&self) -> bool {
        self.core.is_active()
    }

    pub fn rumble(&self, weak: u16, strong: u16) -> SendOutcome {
        self.core.rumble(weak, strong)
    }

    /// Tear the session down. Safe to call more than once.
    pub async fn detach(&mut self) {
        self.core.teardown().await;
        if let Some(reactor) = self.reactor.take() {
            reactor.abort();
        }
        log::info!("Gamepad disconnected");
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.core.teardown_now();
        if let Some(reactor) = self.reactor.take() {
            reactor.abort();
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state())
            .field("scheduler", &self.core.scheduler)
            .finish()
    }
}

/// Dispatch completions until the channel closes or the session is gone
async fn run_reactor(core: Weak<SessionCore>, mut completions: mpsc::UnboundedReceiver<Completion>) {
    while let Some(completion) = completions.recv().await {
        let Some(core) = core.upgrade() else {
            break;
        };
        core.on_completion(&completion);
    }
    log::debug!("Completion reactor stopped");
}

/// Find the interrupt endpoints to talk to the gamepad. The interface must
/// have exactly one in each direction.
pub fn find_endpoints(endpoints: &[EndpointDescriptor]) -> Option<(Pipe, Pipe)> {
    let interrupts = || endpoints.iter().filter(|ep| ep.is_interrupt());
    let inbound: Vec<_> = interrupts().filter(|ep| ep.direction == Direction::In).collect();
    let outbound: Vec<_> = interrupts().filter(|ep| ep.direction == Direction::Out).collect();
    if inbound.len() != 1 || outbound.len() != 1 {
        return None;
    }

    Some((Pipe::from(inbound[0]), Pipe::from(outbound[0])))
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
