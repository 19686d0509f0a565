//! Shared session context.
//!
//! One explicit state object replaces free-floating UI globals: capture flag,
//! per-source cycle state, the displayed results, and the single user-visible
//! error slot. Anyone may read a snapshot; only the capture manager and the
//! scheduler mutate it (the mutators are crate-private).
//!
//! Live results are tagged with the capture epoch they were sampled under.
//! A result whose epoch is no longer current belongs to a stopped stream and
//! is refused at commit time.

use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::detect::Detection;
use crate::frame::VisualFrame;
use crate::input::SourceKind;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CaptureState {
    Inactive,
    Active,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CycleState {
    Idle,
    InFlight,
}

/// The committed upload: set once per successful upload cycle, replaced by the next.
#[derive(Clone, Debug)]
pub struct UploadedVisual {
    pub frame: VisualFrame,
    pub filename: String,
    pub width: u32,
    pub height: u32,
}

/// Read-only copy of the session state.
#[derive(Clone, Debug)]
pub struct SessionSnapshot {
    pub capture: CaptureState,
    pub live_cycle: CycleState,
    pub upload_cycle: CycleState,
    /// Frame the live detections were computed from.
    pub live_frame: Option<VisualFrame>,
    pub live_detections: Vec<Detection>,
    pub uploaded: Option<UploadedVisual>,
    pub upload_detections: Vec<Detection>,
    pub error: Option<String>,
    pub consecutive_live_failures: u32,
}

#[derive(Debug)]
struct SessionState {
    capture: CaptureState,
    capture_epoch: u64,
    live_cycle: CycleState,
    upload_cycle: CycleState,
    live_frame: Option<VisualFrame>,
    live_detections: Vec<Detection>,
    uploaded: Option<UploadedVisual>,
    upload_detections: Vec<Detection>,
    error: Option<String>,
    consecutive_live_failures: u32,
}

impl SessionState {
    fn cycle_mut(&mut self, kind: SourceKind) -> &mut CycleState {
        match kind {
            SourceKind::Live => &mut self.live_cycle,
            SourceKind::Upload => &mut self.upload_cycle,
        }
    }

    fn live_is_current(&self, epoch: u64) -> bool {
        self.capture == CaptureState::Active && self.capture_epoch == epoch
    }
}

pub struct SessionContext {
    state: Mutex<SessionState>,
    cycle_done: Condvar,
}

impl SessionContext {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SessionState {
                capture: CaptureState::Inactive,
                capture_epoch: 0,
                live_cycle: CycleState::Idle,
                upload_cycle: CycleState::Idle,
                live_frame: None,
                live_detections: Vec::new(),
                uploaded: None,
                upload_detections: Vec::new(),
                error: None,
                consecutive_live_failures: 0,
            }),
            cycle_done: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let state = self.lock();
        SessionSnapshot {
            capture: state.capture,
            live_cycle: state.live_cycle,
            upload_cycle: state.upload_cycle,
            live_frame: state.live_frame.clone(),
            live_detections: state.live_detections.clone(),
            uploaded: state.uploaded.clone(),
            upload_detections: state.upload_detections.clone(),
            error: state.error.clone(),
            consecutive_live_failures: state.consecutive_live_failures,
        }
    }

    pub fn capture_state(&self) -> CaptureState {
        self.lock().capture
    }

    pub fn cycle_state(&self, kind: SourceKind) -> CycleState {
        *self.lock().cycle_mut(kind)
    }

    pub fn error(&self) -> Option<String> {
        self.lock().error.clone()
    }

    /// Block until `kind` is Idle or the timeout passes. Returns true when Idle.
    pub fn wait_idle(&self, kind: SourceKind, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.lock();
        loop {
            if *state.cycle_mut(kind) == CycleState::Idle {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            state = match self.cycle_done.wait_timeout(state, deadline - now) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
    }

    // ------------------------------------------------------------------
    // Capture manager mutations
    // ------------------------------------------------------------------

    /// Inactive -> Active. Returns the new capture epoch.
    pub(crate) fn activate_capture(&self) -> u64 {
        let mut state = self.lock();
        state.capture_epoch += 1;
        state.capture = CaptureState::Active;
        state.consecutive_live_failures = 0;
        state.error = None;
        state.capture_epoch
    }

    /// Active -> Inactive. Returns false when already Inactive.
    pub(crate) fn deactivate_capture(&self) -> bool {
        let mut state = self.lock();
        if state.capture == CaptureState::Inactive {
            return false;
        }
        state.capture = CaptureState::Inactive;
        true
    }

    pub(crate) fn report_capture_error(&self, message: String) {
        self.lock().error = Some(message);
    }

    /// Epoch of the running capture, if any.
    pub(crate) fn active_epoch(&self) -> Option<u64> {
        let state = self.lock();
        (state.capture == CaptureState::Active).then_some(state.capture_epoch)
    }

    // ------------------------------------------------------------------
    // Scheduler mutations
    // ------------------------------------------------------------------

    /// Idle -> InFlight for `kind`. `None` when a cycle is already running.
    pub(crate) fn try_begin_cycle(self: &Arc<Self>, kind: SourceKind) -> Option<CycleGuard> {
        let mut state = self.lock();
        let cycle = state.cycle_mut(kind);
        if *cycle == CycleState::InFlight {
            return None;
        }
        *cycle = CycleState::InFlight;
        Some(CycleGuard {
            session: Arc::clone(self),
            kind,
        })
    }

    fn end_cycle(&self, kind: SourceKind) {
        let mut state = self.lock();
        *state.cycle_mut(kind) = CycleState::Idle;
        drop(state);
        self.cycle_done.notify_all();
    }

    /// Replace live results wholesale and hand them to `present` before any
    /// stop can interleave. Refused when `epoch` is stale.
    pub(crate) fn commit_live(
        &self,
        epoch: u64,
        frame: VisualFrame,
        detections: Vec<Detection>,
        present: impl FnOnce(&VisualFrame, &[Detection]),
    ) -> bool {
        let mut state = self.lock();
        if !state.live_is_current(epoch) {
            return false;
        }
        present(&frame, &detections);
        state.live_frame = Some(frame);
        state.live_detections = detections;
        state.consecutive_live_failures = 0;
        state.error = None;
        true
    }

    /// Record a live failure; prior live results stay. Refused when `epoch` is stale.
    pub(crate) fn fail_live(&self, epoch: u64, message: String) -> bool {
        let mut state = self.lock();
        if !state.live_is_current(epoch) {
            return false;
        }
        state.consecutive_live_failures = state.consecutive_live_failures.saturating_add(1);
        state.error = Some(message);
        true
    }

    /// Supersede the uploaded visual and its detections.
    pub(crate) fn commit_upload(
        &self,
        visual: UploadedVisual,
        detections: Vec<Detection>,
        present: impl FnOnce(&VisualFrame, &[Detection]),
    ) {
        let mut state = self.lock();
        present(&visual.frame, &detections);
        state.uploaded = Some(visual);
        state.upload_detections = detections;
        state.error = None;
    }

    /// Record an upload failure; the displayed upload is untouched.
    pub(crate) fn fail_upload(&self, message: String) {
        self.lock().error = Some(message);
    }
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Holds a source InFlight; dropping it returns the source to Idle.
pub struct CycleGuard {
    session: Arc<SessionContext>,
    kind: SourceKind,
}

impl CycleGuard {
    pub fn kind(&self) -> SourceKind {
        self.kind
    }
}

impl Drop for CycleGuard {
    fn drop(&mut self) {
        self.session.end_cycle(self.kind);
    }
}
