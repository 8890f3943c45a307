//! The tracking session: lifecycle plus the per-frame scheduling loop.
//!
//! All state is mutated from `tick()`. Detection and asset loading run on the
//! blocking pool and hand their results back through channels, so nothing
//! here needs a lock. `tick()` must be called from inside a tokio runtime.

use api::{
    AssetLoader, CaptureSource, FaceShapeCategory, LandmarkFrame, LandmarkSource, Pose, Renderer,
};
use common::{classify, FaceShapeVote, GeometryExtractor, PoseSmoother, TryOnConfig};
use log::{debug, error, info, trace, warn};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot};
use tokio::time::MissedTickBehavior;

use crate::error::SessionError;
use crate::overlay::{LoadTicket, OverlayModelManager};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Initializing,
    Tracking,
    Stopped,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlCommand {
    SetModel(String),
    Stop,
}

/// Cloneable handle for steering a running session from other tasks or threads.
#[derive(Debug, Clone)]
pub struct OverlayControl {
    tx: mpsc::UnboundedSender<ControlCommand>,
}

impl OverlayControl {
    /// Returns `false` if the session is gone.
    pub fn set_model(&self, path: impl Into<String>) -> bool {
        self.tx.send(ControlCommand::SetModel(path.into())).is_ok()
    }

    pub fn stop(&self) -> bool {
        self.tx.send(ControlCommand::Stop).is_ok()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub ticks: u64,
    pub frames_submitted: u64,
    pub detections_completed: u64,
    /// Completed detections that produced no usable face.
    pub faces_missing: u64,
    pub renders: u64,
}

struct DetectionDone<D> {
    detector: D,
    result: anyhow::Result<Option<LandmarkFrame>>,
}

type FaceShapeCallback = Box<dyn FnMut(FaceShapeCategory) + Send>;

pub struct TrackingSession<C, D, R>
where
    C: CaptureSource,
    D: LandmarkSource,
    R: Renderer,
{
    config: TryOnConfig,
    state: SessionState,
    capture: Option<C>,
    capture_open: bool,
    // Moved into the detection task while a request is outstanding.
    detector: Option<D>,
    detector_ready: bool,
    in_flight: Option<oneshot::Receiver<DetectionDone<D>>>,
    renderer: R,
    extractor: GeometryExtractor,
    smoother: PoseSmoother,
    vote: FaceShapeVote,
    face_shape: Option<FaceShapeCategory>,
    subscribers: Vec<FaceShapeCallback>,
    overlay: OverlayModelManager,
    control_tx: mpsc::UnboundedSender<ControlCommand>,
    control_rx: mpsc::UnboundedReceiver<ControlCommand>,
    stop_requested: bool,
    stats: SessionStats,
}

impl<C, D, R> TrackingSession<C, D, R>
where
    C: CaptureSource,
    D: LandmarkSource,
    R: Renderer,
{
    /// Fails with `InvalidConfig` if `config` does not pass validation.
    pub fn new(
        config: TryOnConfig,
        capture: C,
        detector: D,
        renderer: R,
        loader: Arc<dyn AssetLoader>,
    ) -> Result<Self, SessionError> {
        config
            .validate()
            .map_err(|e| SessionError::InvalidConfig(format!("{:#}", e)))?;

        let (control_tx, control_rx) = mpsc::unbounded_channel();
        Ok(Self {
            extractor: GeometryExtractor::new(&config),
            smoother: PoseSmoother::new(&config.smoothing),
            vote: FaceShapeVote::new(config.face_shape.vote_window),
            overlay: OverlayModelManager::new(loader, &config.model),
            config,
            state: SessionState::Uninitialized,
            capture: Some(capture),
            capture_open: false,
            detector: Some(detector),
            detector_ready: false,
            in_flight: None,
            renderer,
            face_shape: None,
            subscribers: Vec::new(),
            control_tx,
            control_rx,
            stop_requested: false,
            stats: SessionStats::default(),
        })
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    pub fn config(&self) -> &TryOnConfig {
        &self.config
    }

    /// The smoothed pose, or `None` until the first usable detection.
    pub fn displayed_pose(&self) -> Option<Pose> {
        self.smoother.displayed()
    }

    pub fn face_shape(&self) -> Option<FaceShapeCategory> {
        self.face_shape
    }

    pub fn detection_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn overlay(&self) -> &OverlayModelManager {
        &self.overlay
    }

    pub fn overlay_mut(&mut self) -> &mut OverlayModelManager {
        &mut self.overlay
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn control(&self) -> OverlayControl {
        OverlayControl {
            tx: self.control_tx.clone(),
        }
    }

    pub fn subscribe_face_shape<F>(&mut self, callback: F)
    where
        F: FnMut(FaceShapeCategory) + Send + 'static,
    {
        self.subscribers.push(Box::new(callback));
    }

    /// Swap the displayed model. The load runs in the background; the newest
    /// request wins regardless of completion order.
    pub fn set_model(&mut self, path: &str) -> Result<LoadTicket, SessionError> {
        if !matches!(self.state, SessionState::Initializing | SessionState::Tracking) {
            return Err(SessionError::InvalidState {
                action: "set_model",
                state: self.state,
            });
        }
        info!("Loading overlay model {:?}", path);
        self.overlay.request_model(path)
    }

    /// Acquire the capture device and the landmark source. Also valid after a
    /// fatal error, which is how a caller retries.
    pub async fn init(&mut self) -> Result<(), SessionError> {
        if !matches!(self.state, SessionState::Uninitialized | SessionState::Error) {
            return Err(SessionError::InvalidState {
                action: "init",
                state: self.state,
            });
        }

        self.state = SessionState::Initializing;
        info!("Initializing tracking session...");
        self.settle_in_flight().await;

        if let Err(e) = self.acquire().await {
            error!("✗ Session initialization failed: {}", e);
            self.state = SessionState::Error;
            return Err(e);
        }

        self.state = SessionState::Tracking;
        info!("✓ Tracking started");

        if self.overlay.active().is_none() && self.overlay.pending_loads() == 0 {
            if let Some(path) = self.config.model.initial_model.clone() {
                if let Err(e) = self.set_model(&path) {
                    warn!("Initial model not loaded: {}", e);
                }
            }
        }
        Ok(())
    }

    async fn acquire(&mut self) -> Result<(), SessionError> {
        // Retrying after a fatal error: let go of whatever is still held first.
        self.release_handles();

        let mut capture = self.capture.take().ok_or_else(|| {
            SessionError::CaptureUnavailable("capture source was lost".to_string())
        })?;
        let (capture, opened) = tokio::task::spawn_blocking(move || {
            let opened = capture.open();
            (capture, opened)
        })
        .await
        .map_err(|e| SessionError::CaptureUnavailable(e.to_string()))?;
        self.capture = Some(capture);
        opened.map_err(|e| SessionError::CaptureUnavailable(format!("{:#}", e)))?;
        self.capture_open = true;
        debug!("Capture source opened");

        let mut detector = self.detector.take().ok_or_else(|| {
            SessionError::DetectorInitFailure("landmark source was lost".to_string())
        })?;
        let options = self.config.detector.clone();
        let (detector, initialized) = tokio::task::spawn_blocking(move || {
            let initialized = detector.initialize(&options);
            (detector, initialized)
        })
        .await
        .map_err(|e| SessionError::DetectorInitFailure(e.to_string()))?;
        self.detector = Some(detector);

        if let Err(e) = initialized {
            self.release_handles();
            return Err(SessionError::DetectorInitFailure(format!("{:#}", e)));
        }
        self.detector_ready = true;
        debug!("Landmark source initialized with {:?}", self.config.detector);
        Ok(())
    }

    /// One scheduling iteration. Never blocks; renders exactly once.
    ///
    /// Returns the fatal error that moved the session into `Error`, on the
    /// tick where that happened.
    pub fn tick(&mut self) -> Result<(), SessionError> {
        if !matches!(self.state, SessionState::Tracking | SessionState::Error) {
            return Ok(());
        }
        self.stats.ticks += 1;

        self.drain_control();
        self.apply_loads();

        let outcome = self.step_detection();
        if let Err(e) = &outcome {
            error!("✗ Tracking failed: {}", e);
            self.state = SessionState::Error;
        }

        if let Some(pose) = self.smoother.displayed() {
            self.overlay.apply_pose(&pose);
        }
        self.render();

        outcome
    }

    /// Drive `tick()` at the configured rate until stopped or a fatal error.
    pub async fn run(&mut self) -> Result<(), SessionError> {
        if self.state == SessionState::Uninitialized {
            self.init().await?;
        }
        if self.state != SessionState::Tracking {
            return Err(SessionError::InvalidState {
                action: "run",
                state: self.state,
            });
        }

        let period = Duration::from_secs_f32(1.0 / self.config.session.max_fps);
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!("Entering tracking loop ({:.0} FPS target)", self.config.session.max_fps);
        let mut throughput = Throughput::new();

        loop {
            interval.tick().await;
            let ticked = self.tick();

            if self.stop_requested {
                self.stop().await?;
                return ticked;
            }
            ticked?;

            throughput.record(self.stats.detections_completed);
        }
    }

    /// Release capture, detector and every overlay model. An outstanding
    /// detection is allowed to finish and its result dropped; model loads
    /// still running are released as they complete.
    pub async fn stop(&mut self) -> Result<(), SessionError> {
        match self.state {
            SessionState::Tracking | SessionState::Error => {}
            SessionState::Stopped => return Ok(()),
            state => {
                return Err(SessionError::InvalidState {
                    action: "stop",
                    state,
                })
            }
        }

        info!("Stopping tracking session...");
        self.settle_in_flight().await;
        self.release_handles();
        self.overlay.shutdown();

        self.stop_requested = false;
        self.state = SessionState::Stopped;
        info!(
            "Session stopped after {} ticks, {} detections",
            self.stats.ticks, self.stats.detections_completed
        );
        Ok(())
    }

    /// Close the capture device and the landmark source if they are held open.
    fn release_handles(&mut self) {
        if self.capture_open {
            if let Some(capture) = self.capture.as_mut() {
                capture.close();
            }
            self.capture_open = false;
        }
        if self.detector_ready {
            if let Some(detector) = self.detector.as_mut() {
                detector.close();
            }
            self.detector_ready = false;
        }
    }

    async fn settle_in_flight(&mut self) {
        if let Some(rx) = self.in_flight.take() {
            match rx.await {
                Ok(done) => {
                    debug!("Discarding detection that finished during shutdown");
                    self.detector = Some(done.detector);
                }
                Err(_) => warn!("Detection task ended without returning the landmark source"),
            }
        }
    }

    fn drain_control(&mut self) {
        while let Ok(command) = self.control_rx.try_recv() {
            match command {
                ControlCommand::SetModel(path) => {
                    if let Err(e) = self.set_model(&path) {
                        warn!("Ignoring model request: {}", e);
                    }
                }
                ControlCommand::Stop => self.stop_requested = true,
            }
        }
    }

    fn apply_loads(&mut self) {
        for outcome in self.overlay.poll_completions() {
            if let Err(e) = outcome {
                warn!("Keeping previous overlay model: {}", e);
            }
        }
    }

    fn step_detection(&mut self) -> Result<(), SessionError> {
        if self.state != SessionState::Tracking {
            return Ok(());
        }
        self.collect_detection()?;
        if self.in_flight.is_none() {
            self.submit_frame()?;
        }
        Ok(())
    }

    fn collect_detection(&mut self) -> Result<(), SessionError> {
        let Some(rx) = self.in_flight.as_mut() else {
            return Ok(());
        };
        let done = match rx.try_recv() {
            Ok(done) => done,
            Err(oneshot::error::TryRecvError::Empty) => return Ok(()),
            Err(oneshot::error::TryRecvError::Closed) => {
                self.in_flight = None;
                return Err(SessionError::DetectorFailed(
                    "detection task ended without a result".to_string(),
                ));
            }
        };

        self.in_flight = None;
        self.detector = Some(done.detector);
        self.stats.detections_completed += 1;

        match done.result {
            Ok(Some(frame)) => self.consume_landmarks(&frame),
            Ok(None) => {
                self.stats.faces_missing += 1;
                trace!("No face detected");
            }
            Err(e) => return Err(SessionError::DetectorFailed(format!("{:#}", e))),
        }
        Ok(())
    }

    fn consume_landmarks(&mut self, frame: &LandmarkFrame) {
        let extraction = match self.extractor.extract(frame) {
            Ok(extraction) => extraction,
            Err(e) => {
                self.stats.faces_missing += 1;
                debug!("Skipping pose update: {}", e);
                return;
            }
        };

        #[cfg(feature = "xtralog")]
        trace!(
            "Pose target {:?}, ratios {:?}",
            extraction.target,
            extraction.ratios
        );

        self.smoother.update(Some(&extraction.target));

        let category = self
            .vote
            .push(classify(&extraction.ratios, &self.config.face_shape));
        if self.face_shape != Some(category) {
            debug!("Face shape: {}", category);
        }
        self.face_shape = Some(category);
        for subscriber in &mut self.subscribers {
            subscriber(category);
        }
    }

    fn submit_frame(&mut self) -> Result<(), SessionError> {
        let Some(capture) = self.capture.as_mut() else {
            return Ok(());
        };
        let image = match capture.frame() {
            Ok(Some(image)) => image,
            Ok(None) => return Ok(()),
            Err(e) => return Err(SessionError::CaptureLost(format!("{:#}", e))),
        };
        let Some(mut detector) = self.detector.take() else {
            return Ok(());
        };

        let (tx, rx) = oneshot::channel();
        tokio::task::spawn_blocking(move || {
            let result = detector.detect(&image);
            let _ = tx.send(DetectionDone { detector, result });
        });

        self.in_flight = Some(rx);
        self.stats.frames_submitted += 1;
        Ok(())
    }

    fn render(&mut self) {
        let overlay = self.overlay.active().map(|model| model.asset());
        if let Err(e) = self.renderer.render(overlay) {
            warn!("Render failed: {:#}", e);
        }
        self.stats.renders += 1;
    }
}

/// Periodic "frames processed" log whose interval grows with the count.
struct Throughput {
    logged_at: u64,
    log_interval: u64,
    last_log: Instant,
}

impl Throughput {
    fn new() -> Self {
        Self {
            logged_at: 0,
            log_interval: 100,
            last_log: Instant::now(),
        }
    }

    fn record(&mut self, detections: u64) {
        if detections < self.logged_at + self.log_interval {
            return;
        }

        let elapsed = self.last_log.elapsed().as_secs_f32();
        let fps = (detections - self.logged_at) as f32 / elapsed.max(f32::EPSILON);
        info!(
            "Tracking active: processed {} detections (approx {:.1} FPS)",
            detections, fps
        );
        self.logged_at = detections;
        self.last_log = Instant::now();

        if detections >= 100_000 {
            self.log_interval = 100_000;
        } else if detections >= 10_000 {
            self.log_interval = 10_000;
        } else if detections >= 1_000 {
            self.log_interval = 1_000;
        }
    }
}
