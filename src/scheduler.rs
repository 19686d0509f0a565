//! Detection cycle scheduling.
//!
//! One cycle: snapshot the source, call the detection service, then either
//! commit `(frame, detections)` and present it, or record the error.
//!
//! Per source the state is Idle or InFlight and at most one cycle runs at a
//! time. Timer ticks that find the live source InFlight are dropped, never
//! queued; the next tick is the next chance. Manual triggers follow the same
//! guard.
//!
//! The polling timer is a ticker thread owned by `PollingHandle`. Stopping
//! the handle joins the ticker, so no tick fires afterwards. A cycle already
//! in flight is left to finish; its result is refused at commit time when
//! the capture it was sampled from is gone.

use anyhow::{anyhow, Result};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::capture::CaptureManager;
use crate::detect::{DetectionReply, DetectionService};
use crate::error::CaptureError;
use crate::input::{InputSource, LiveInput, SourceKind, UploadInput};
use crate::render::Presenter;
use crate::session::{CaptureState, CycleGuard, SessionContext, UploadedVisual};

/// Live detection period.
pub const LIVE_POLL_INTERVAL: Duration = Duration::from_millis(2000);

/// What happened to one trigger.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Results committed and presented.
    Completed { frame_id: u64, detections: usize },
    /// Error recorded in the session; prior results untouched.
    Failed(String),
    /// Upload refused before any request was sent.
    Rejected(String),
    /// Another cycle for this source is in flight.
    Skipped,
    /// Live capture is not running.
    Inactive,
    /// Capture stopped or restarted while in flight; result dropped.
    Discarded,
}

pub struct PollingScheduler {
    session: Arc<SessionContext>,
    service: Arc<dyn DetectionService>,
    live: Arc<dyn Presenter>,
    upload: Arc<dyn Presenter>,
}

impl PollingScheduler {
    pub fn new(
        session: Arc<SessionContext>,
        service: Arc<dyn DetectionService>,
        live: Arc<dyn Presenter>,
        upload: Arc<dyn Presenter>,
    ) -> Self {
        Self {
            session,
            service,
            live,
            upload,
        }
    }

    pub fn session(&self) -> &Arc<SessionContext> {
        &self.session
    }

    /// Run one cycle now on the calling thread.
    pub fn trigger<I: InputSource>(&self, input: &I) -> CycleOutcome {
        match self.session.try_begin_cycle(input.kind()) {
            Some(guard) => self.run_cycle(input, guard),
            None => {
                log::debug!("{} trigger skipped: cycle in flight", input.kind());
                CycleOutcome::Skipped
            }
        }
    }

    /// Validate an upload and, if it is an image, run its detection cycle.
    pub fn submit_upload(&self, bytes: Vec<u8>, mime: &str, filename: &str) -> CycleOutcome {
        match CaptureManager::accept_upload(bytes, mime) {
            Ok(frame) => self.trigger(&UploadInput::new(frame, filename)),
            Err(err) => {
                let message = err.to_string();
                log::warn!("upload '{}' rejected: {}", filename, message);
                self.session.fail_upload(message.clone());
                CycleOutcome::Rejected(message)
            }
        }
    }

    fn run_cycle<I: InputSource>(&self, input: &I, guard: CycleGuard) -> CycleOutcome {
        let outcome = match guard.kind() {
            SourceKind::Live => self.run_live(input),
            SourceKind::Upload => self.run_upload(input),
        };
        drop(guard);
        outcome
    }

    fn run_live<I: InputSource>(&self, input: &I) -> CycleOutcome {
        let Some(epoch) = self.session.active_epoch() else {
            return CycleOutcome::Inactive;
        };
        let frame = match input.current_frame() {
            Ok(frame) => frame,
            Err(CaptureError::Inactive) => return CycleOutcome::Discarded,
            Err(err) => return self.live_failure(epoch, err.to_string()),
        };
        match self.service.detect(&frame, &input.submission()) {
            Ok(DetectionReply { detections, .. }) => {
                let count = detections.len();
                let frame_id = frame.id();
                let age = frame.age();
                let live = &self.live;
                let committed = self.session.commit_live(epoch, frame, detections, |f, d| {
                    live.present(f, d)
                });
                if committed {
                    log::info!(
                        "live frame {}: {} detection(s) in {}ms",
                        frame_id,
                        count,
                        age.as_millis()
                    );
                    CycleOutcome::Completed {
                        frame_id,
                        detections: count,
                    }
                } else {
                    log::debug!("live frame {} discarded: capture no longer active", frame_id);
                    CycleOutcome::Discarded
                }
            }
            Err(err) => self.live_failure(epoch, err.to_string()),
        }
    }

    fn live_failure(&self, epoch: u64, message: String) -> CycleOutcome {
        if self.session.fail_live(epoch, message.clone()) {
            log::warn!("live detection failed: {}", message);
            CycleOutcome::Failed(message)
        } else {
            log::debug!("live failure after stop ignored: {}", message);
            CycleOutcome::Discarded
        }
    }

    fn run_upload<I: InputSource>(&self, input: &I) -> CycleOutcome {
        let frame = match input.current_frame() {
            Ok(frame) => frame,
            Err(err) => {
                let message = err.to_string();
                self.session.fail_upload(message.clone());
                return CycleOutcome::Failed(message);
            }
        };
        match self.service.detect(&frame, &input.submission()) {
            Ok(reply) => {
                let filename = input
                    .filename()
                    .map(str::to_string)
                    .or_else(|| reply.image_info.as_ref().and_then(|i| i.filename.clone()))
                    .unwrap_or_default();
                if let Some(info) = &reply.image_info {
                    if (info.width, info.height) != (frame.width(), frame.height()) {
                        log::warn!(
                            "service saw '{}' as {}x{}, decoded locally as {}x{}",
                            filename,
                            info.width,
                            info.height,
                            frame.width(),
                            frame.height()
                        );
                    }
                }
                let count = reply.detections.len();
                let frame_id = frame.id();
                let visual = UploadedVisual {
                    width: frame.width(),
                    height: frame.height(),
                    frame,
                    filename: filename.clone(),
                };
                let upload = &self.upload;
                self.session
                    .commit_upload(visual, reply.detections, |f, d| upload.present(f, d));
                log::info!("upload '{}': {} detection(s)", filename, count);
                CycleOutcome::Completed {
                    frame_id,
                    detections: count,
                }
            }
            Err(err) => {
                let message = err.to_string();
                log::warn!("upload detection failed: {}", message);
                self.session.fail_upload(message.clone());
                CycleOutcome::Failed(message)
            }
        }
    }

    /// Start the live timer at `LIVE_POLL_INTERVAL`.
    pub fn start_polling(self: &Arc<Self>, capture: Arc<CaptureManager>) -> PollingHandle {
        self.start_polling_every(capture, LIVE_POLL_INTERVAL)
    }

    /// Start the live timer with an explicit period.
    pub fn start_polling_every(
        self: &Arc<Self>,
        capture: Arc<CaptureManager>,
        period: Duration,
    ) -> PollingHandle {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let scheduler = Arc::clone(self);
        let input = LiveInput::new(capture);
        let join = std::thread::spawn(move || loop {
            match stop_rx.recv_timeout(period) {
                Err(RecvTimeoutError::Timeout) => {}
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
            if scheduler.session.capture_state() != CaptureState::Active {
                continue;
            }
            let Some(guard) = scheduler.session.try_begin_cycle(SourceKind::Live) else {
                log::debug!("live tick skipped: cycle in flight");
                continue;
            };
            let worker = Arc::clone(&scheduler);
            let input = input.clone();
            std::thread::spawn(move || {
                worker.run_cycle(&input, guard);
            });
        });
        log::debug!("live polling started every {}ms", period.as_millis());
        PollingHandle {
            stop: Some(stop_tx),
            join: Some(join),
        }
    }
}

/// Owns the live ticker. Stopping (or dropping) it halts ticks before returning.
#[derive(Debug)]
pub struct PollingHandle {
    stop: Option<Sender<()>>,
    join: Option<JoinHandle<()>>,
}

impl PollingHandle {
    pub fn stop(mut self) -> Result<()> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<()> {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(join) = self.join.take() {
            join.join()
                .map_err(|_| anyhow!("live polling thread panicked"))?;
            log::debug!("live polling stopped");
        }
        Ok(())
    }
}

impl Drop for PollingHandle {
    fn drop(&mut self) {
        if let Err(err) = self.shutdown() {
            log::error!("{}", err);
        }
    }
}
