use std::future::Future;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use anyhow::Error;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use crate::config::config::CaptureConfig;
use crate::error::{CaptureError, ConfigError};
use crate::modules::detector::{FrameSource, LandmarkDetector};
use crate::pipeline::pipeline::{CaptureSession, CaptureSnapshot, CaptureStatus, FaceAnalysisResult, FrameOutcome};

/// One frame per display refresh at 60 Hz.
pub const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_millis(16);

/// CaptureRunner schedules a [`CaptureSession`] on a fixed frame interval and
/// publishes a snapshot after every frame.
///
/// `stop`, `reset` and `shutdown` may be called from any task while `run` is
/// pending; the loop observes them before the next detector call.
pub struct CaptureRunner<D: LandmarkDetector> {
    session: Mutex<CaptureSession<D>>,
    snapshots: watch::Sender<CaptureSnapshot>,
    cancel: watch::Sender<u64>,
    frame_interval: Duration,
}

impl<D: LandmarkDetector> CaptureRunner<D> {

    pub fn new(config: CaptureConfig) -> Result<Self, ConfigError> {
        Ok(CaptureRunner::from_session(CaptureSession::new(config)?))
    }

    pub fn with_detector(config: CaptureConfig, detector: D) -> Result<Self, ConfigError> {
        Ok(CaptureRunner::from_session(CaptureSession::with_detector(config, detector)?))
    }

    fn from_session(session: CaptureSession<D>) -> Self {
        let (snapshots, _) = watch::channel(session.snapshot());
        let (cancel, _) = watch::channel(0);
        CaptureRunner {
            session: Mutex::new(session),
            snapshots,
            cancel,
            frame_interval: DEFAULT_FRAME_INTERVAL,
        }
    }

    pub fn with_frame_interval(mut self, frame_interval: Duration) -> Self {
        // tokio intervals must not be zero
        self.frame_interval = frame_interval.max(Duration::from_millis(1));
        self
    }

    /// initialize loads the detector through `loader`. The session is not
    /// locked while the loader runs.
    pub async fn initialize<F>(&self, loader: F) -> Result<(), CaptureError>
    where
        F: Future<Output = Result<D, Error>>,
    {
        self.lock().begin_initialization()?;
        self.publish();

        let loaded = loader.await;

        let result = self.lock().finish_initialization(loaded);
        self.publish();
        result
    }

    /// subscribe returns a receiver of the live snapshots.
    pub fn subscribe(&self) -> watch::Receiver<CaptureSnapshot> {
        self.snapshots.subscribe()
    }

    pub fn snapshot(&self) -> CaptureSnapshot {
        self.lock().snapshot()
    }

    pub fn status(&self) -> CaptureStatus {
        self.lock().status()
    }

    /// start begins a new capture without driving it. See [`run`].
    ///
    /// [`run`]: CaptureRunner::run
    pub fn start(&self) -> Result<(), CaptureError> {
        self.lock().start_capture(Instant::now())?;
        self.publish();
        Ok(())
    }

    /// run drives the frame loop until the capture finishes or is
    /// interrupted.
    ///
    /// # Arguments
    /// * `source` - camera frames, polled once per tick
    ///
    /// # Returns
    /// * `CaptureSnapshot` - the state once the loop exits
    pub async fn run<S>(&self, source: &mut S) -> CaptureSnapshot
    where
        S: FrameSource<Frame = D::Frame>,
    {
        let mut cancel_rx = self.cancel.subscribe();
        let mut ticker = interval(self.frame_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut frames: u64 = 0;
        loop {
            tokio::select! {
                biased;
                _ = cancel_rx.changed() => {
                    debug!(frames, "frame loop interrupted");
                    break;
                }
                _ = ticker.tick() => {}
            }

            let frame = source.next_frame();
            let (outcome, snapshot) = {
                let mut session = self.lock();
                let outcome = session.process_frame(frame.as_ref(), Instant::now());
                (outcome, session.snapshot())
            };

            match outcome {
                FrameOutcome::Continue => {
                    frames += 1;
                    self.snapshots.send_replace(snapshot);
                }
                FrameOutcome::Finished => {
                    info!(frames, status = %snapshot.status, "frame loop finished");
                    self.snapshots.send_replace(snapshot);
                    break;
                }
                FrameOutcome::Inactive => break,
            }
        }

        self.snapshot()
    }

    /// capture starts a new capture and drives it to the end.
    ///
    /// # Returns
    /// * `Result<FaceAnalysisResult, CaptureError>` - the session error when
    ///   the capture did not succeed, `Cancelled` when it was reset
    pub async fn capture<S>(&self, source: &mut S) -> Result<FaceAnalysisResult, CaptureError>
    where
        S: FrameSource<Frame = D::Frame>,
    {
        self.start()?;
        self.run(source).await;

        let session = self.lock();
        if session.status() == CaptureStatus::Success {
            if let Some(result) = session.result() {
                return Ok(result.clone());
            }
        }
        Err(session.error().cloned().unwrap_or(CaptureError::Cancelled))
    }

    pub fn stop(&self) {
        self.lock().stop_capture();
        self.interrupt();
        self.publish();
    }

    pub fn reset(&self) -> Result<(), CaptureError> {
        self.interrupt();
        let result = self.lock().reset();
        self.publish();
        result
    }

    /// shutdown interrupts any running loop and releases the detector.
    pub fn shutdown(&self) {
        self.interrupt();
        self.lock().teardown();
        self.publish();
    }

    fn interrupt(&self) {
        self.cancel.send_modify(|epoch| *epoch = epoch.wrapping_add(1));
    }

    fn publish(&self) {
        let snapshot = self.snapshot();
        self.snapshots.send_replace(snapshot);
    }

    fn lock(&self) -> MutexGuard<'_, CaptureSession<D>> {
        self.session.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
