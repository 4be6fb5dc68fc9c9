//! [EventEmitter] used by tests. Records every call and every report and can
//! be told to fail at a chosen step.
use std::sync::{Arc, Mutex, MutexGuard};

use crate::drivers::ultimate_2c::event::InputReport;

use super::{EmitterError, EventEmitter, RumbleHandler, VirtualDeviceInfo};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitterCall {
    Allocate,
    CreateForceFeedback,
    Register,
    Report,
    Unregister,
    DestroyForceFeedback,
    Free,
}

#[derive(Default)]
struct Recording {
    calls: Vec<EmitterCall>,
    reports: Vec<InputReport>,
    fail_at: Option<EmitterCall>,
    rumble: Option<RumbleHandler>,
    info: Option<VirtualDeviceInfo>,
}

/// Cloning shares the recording, so a test can keep a handle while the
/// session owns the emitter
#[derive(Clone, Default)]
pub struct RecordingEmitter {
    recording: Arc<Mutex<Recording>>,
}

impl RecordingEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the first call of the given step
    pub fn fail_at(&self, call: EmitterCall) {
        self.recording().fail_at = Some(call);
    }

    pub fn calls(&self) -> Vec<EmitterCall> {
        self.recording().calls.clone()
    }

    pub fn reports(&self) -> Vec<InputReport> {
        self.recording().reports.clone()
    }

    pub fn info(&self) -> Option<VirtualDeviceInfo> {
        self.recording().info.clone()
    }

    /// Handler passed to create_force_feedback, if any
    pub fn rumble_handler(&self) -> Option<RumbleHandler> {
        self.recording().rumble.clone()
    }

    fn recording(&self) -> MutexGuard<'_, Recording> {
        self.recording.lock().unwrap()
    }

    fn record(&self, call: EmitterCall) -> Result<(), EmitterError> {
        let mut recording = self.recording();
        recording.calls.push(call);
        if recording.fail_at == Some(call) {
            recording.fail_at = None;
            return Err(EmitterError::Unsupported(format!("{call:?} failed")));
        }
        Ok(())
    }
}

impl EventEmitter for RecordingEmitter {
    fn allocate(&mut self, info: &VirtualDeviceInfo) -> Result<(), EmitterError> {
        self.record(EmitterCall::Allocate)?;
        self.recording().info = Some(info.clone());
        Ok(())
    }

    fn create_force_feedback(&mut self, handler: RumbleHandler) -> Result<(), EmitterError> {
        self.record(EmitterCall::CreateForceFeedback)?;
        self.recording().rumble = Some(handler);
        Ok(())
    }

    fn register(&mut self) -> Result<(), EmitterError> {
        self.record(EmitterCall::Register)
    }

    fn report(&mut self, report: &InputReport) -> Result<(), EmitterError> {
        self.record(EmitterCall::Report)?;
        self.recording().reports.push(*report);
        Ok(())
    }

    fn unregister(&mut self) {
        let _ = self.record(EmitterCall::Unregister);
        self.recording().rumble = None;
    }

    fn destroy_force_feedback(&mut self) {
        let _ = self.record(EmitterCall::DestroyForceFeedback);
        self.recording().rumble = None;
    }

    fn free(&mut self) {
        let _ = self.record(EmitterCall::Free);
    }
}
