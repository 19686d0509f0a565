//! Wiring of capture, detection, scheduling and presentation.
//!
//! `Pipeline` is what a front end drives: start/stop the camera, trigger a
//! live detection by hand, submit uploads, and read the session. Starting
//! the camera starts the live timer; stopping it tears the timer down first
//! and only then releases the device.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::capture::{CaptureDevice, CaptureManager, StreamHandle};
use crate::detect::DetectionService;
use crate::error::CaptureError;
use crate::input::LiveInput;
use crate::render::{OverlayRenderer, OverlayStyle, Presenter, Surface};
use crate::scheduler::{CycleOutcome, PollingHandle, PollingScheduler, LIVE_POLL_INTERVAL};
use crate::session::{SessionContext, SessionSnapshot};

pub struct Pipeline<S: Surface + 'static> {
    session: Arc<SessionContext>,
    capture: Arc<CaptureManager>,
    scheduler: Arc<PollingScheduler>,
    live: Arc<OverlayRenderer<S>>,
    upload: Arc<OverlayRenderer<S>>,
    poller: Mutex<Option<PollingHandle>>,
    poll_period: Duration,
}

impl<S: Surface + 'static> Pipeline<S> {
    pub fn new(
        device: Box<dyn CaptureDevice>,
        service: Arc<dyn DetectionService>,
        live_surface: S,
        upload_surface: S,
    ) -> Self {
        let session = Arc::new(SessionContext::new());
        let capture = Arc::new(CaptureManager::new(device, Arc::clone(&session)));
        let live = Arc::new(OverlayRenderer::new(live_surface, OverlayStyle::LIVE));
        let upload = Arc::new(OverlayRenderer::new(upload_surface, OverlayStyle::UPLOAD));
        let scheduler = Arc::new(PollingScheduler::new(
            Arc::clone(&session),
            service,
            Arc::clone(&live) as Arc<dyn Presenter>,
            Arc::clone(&upload) as Arc<dyn Presenter>,
        ));
        Self {
            session,
            capture,
            scheduler,
            live,
            upload,
            poller: Mutex::new(None),
            poll_period: LIVE_POLL_INTERVAL,
        }
    }

    /// Override the live timer period. Takes effect on the next camera start.
    pub fn with_poll_period(mut self, period: Duration) -> Self {
        self.poll_period = period;
        self
    }

    fn poller(&self) -> MutexGuard<'_, Option<PollingHandle>> {
        self.poller.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn session(&self) -> &Arc<SessionContext> {
        &self.session
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.session.snapshot()
    }

    pub fn capture(&self) -> &Arc<CaptureManager> {
        &self.capture
    }

    pub fn live_renderer(&self) -> &Arc<OverlayRenderer<S>> {
        &self.live
    }

    pub fn upload_renderer(&self) -> &Arc<OverlayRenderer<S>> {
        &self.upload
    }

    /// Start the camera and its live timer. On failure the error is already
    /// in the session and state stays Inactive.
    pub fn start_camera(&self) -> Result<StreamHandle, CaptureError> {
        let mut poller = self.poller();
        let handle = self.capture.start_live_capture()?;
        if poller.is_none() {
            *poller = Some(
                self.scheduler
                    .start_polling_every(Arc::clone(&self.capture), self.poll_period),
            );
        }
        Ok(handle)
    }

    /// Stop the live timer, then release the camera. Idempotent.
    pub fn stop_camera(&self) {
        let mut poller = self.poller();
        if let Some(handle) = poller.take() {
            if let Err(err) = handle.stop() {
                log::error!("{}", err);
            }
        }
        self.capture.stop_live_capture();
    }

    /// Run a live detection now. Skipped when one is already in flight.
    pub fn detect_now(&self) -> CycleOutcome {
        self.scheduler
            .trigger(&LiveInput::new(Arc::clone(&self.capture)))
    }

    /// Validate and detect an uploaded file.
    pub fn upload(&self, bytes: Vec<u8>, mime: &str, filename: &str) -> CycleOutcome {
        self.scheduler.submit_upload(bytes, mime, filename)
    }

    /// Stop everything. Also runs on drop.
    pub fn dispose(&self) {
        self.stop_camera();
    }
}

impl<S: Surface + 'static> Drop for Pipeline<S> {
    fn drop(&mut self) {
        self.dispose();
    }
}
