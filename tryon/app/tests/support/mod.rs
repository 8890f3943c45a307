#![allow(dead_code)]

use anyhow::{anyhow, bail, Result};
use api::landmarks::{self, FACE_MESH_POINTS};
use api::{
    AssetLoader, CaptureSource, DetectorOptions, ImageFrame, LandmarkFrame, LandmarkSource, Pose,
    Renderer, SceneAsset,
};
use glam::Vec3;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub fn frontal_face() -> LandmarkFrame {
    let mut points = vec![Vec3::new(0.5, 0.5, 0.0); FACE_MESH_POINTS];
    points[landmarks::LEFT_EYE_CORNER] = Vec3::new(0.45, 0.4, 0.0);
    points[landmarks::RIGHT_EYE_CORNER] = Vec3::new(0.55, 0.4, 0.0);
    points[landmarks::NOSE_BRIDGE] = Vec3::new(0.5, 0.42, 0.0);
    points[landmarks::CHIN] = Vec3::new(0.5, 0.8, 0.0);
    points[landmarks::FOREHEAD] = Vec3::new(0.5, 0.2, 0.0);
    points[landmarks::LEFT_TEMPLE] = Vec3::new(0.3, 0.4, 0.0);
    points[landmarks::RIGHT_TEMPLE] = Vec3::new(0.7, 0.4, 0.0);
    points[landmarks::LEFT_JAW] = Vec3::new(0.35, 0.7, 0.0);
    points[landmarks::RIGHT_JAW] = Vec3::new(0.65, 0.7, 0.0);
    LandmarkFrame::new(points)
}

// Capture

#[derive(Debug, Default)]
pub struct CaptureProbe {
    pub opened: AtomicUsize,
    pub closed: AtomicUsize,
    pub frames: AtomicU64,
    /// Every `frame()` call fails once set.
    pub fail_frames: AtomicBool,
}

pub struct MockCapture {
    pub probe: Arc<CaptureProbe>,
    fail_open: bool,
}

impl MockCapture {
    pub fn new() -> (Self, Arc<CaptureProbe>) {
        let probe = Arc::new(CaptureProbe::default());
        (
            Self {
                probe: probe.clone(),
                fail_open: false,
            },
            probe,
        )
    }

    pub fn failing_open() -> (Self, Arc<CaptureProbe>) {
        let (mut capture, probe) = Self::new();
        capture.fail_open = true;
        (capture, probe)
    }
}

impl CaptureSource for MockCapture {
    fn open(&mut self) -> Result<()> {
        if self.fail_open {
            bail!("permission denied");
        }
        self.probe.opened.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn frame(&mut self) -> Result<Option<ImageFrame>> {
        if self.probe.fail_frames.load(Ordering::SeqCst) {
            bail!("device unplugged");
        }
        let sequence = self.probe.frames.fetch_add(1, Ordering::SeqCst);
        Ok(Some(ImageFrame {
            width: 4,
            height: 4,
            sequence,
            data: vec![0; 16],
        }))
    }

    fn close(&mut self) {
        self.probe.closed.fetch_add(1, Ordering::SeqCst);
    }
}

// Detector

#[derive(Debug, Clone)]
pub enum Reply {
    Face(LandmarkFrame),
    NoFace,
    Fail,
}

#[derive(Debug)]
pub struct DetectorProbe {
    pub initialized: AtomicUsize,
    pub closed: AtomicUsize,
    pub calls: AtomicUsize,
    pub active: AtomicUsize,
    pub max_active: AtomicUsize,
    /// While set, `detect()` blocks before answering.
    pub hold: AtomicBool,
    pub script: Mutex<VecDeque<Reply>>,
    /// Answer used once the script runs out.
    pub fallback: Mutex<Reply>,
}

impl DetectorProbe {
    pub fn push(&self, reply: Reply) {
        self.script.lock().unwrap().push_back(reply);
    }

    pub fn set_fallback(&self, reply: Reply) {
        *self.fallback.lock().unwrap() = reply;
    }

    pub fn release_hold(&self) {
        self.hold.store(false, Ordering::SeqCst);
    }
}

pub struct MockDetector {
    pub probe: Arc<DetectorProbe>,
    fail_init: bool,
}

impl MockDetector {
    pub fn new() -> (Self, Arc<DetectorProbe>) {
        let probe = Arc::new(DetectorProbe {
            initialized: AtomicUsize::new(0),
            closed: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
            hold: AtomicBool::new(false),
            script: Mutex::new(VecDeque::new()),
            fallback: Mutex::new(Reply::Face(frontal_face())),
        });
        (
            Self {
                probe: probe.clone(),
                fail_init: false,
            },
            probe,
        )
    }

    pub fn failing_init() -> (Self, Arc<DetectorProbe>) {
        let (mut detector, probe) = Self::new();
        detector.fail_init = true;
        (detector, probe)
    }
}

impl LandmarkSource for MockDetector {
    fn initialize(&mut self, _options: &DetectorOptions) -> Result<()> {
        if self.fail_init {
            bail!("model file not found");
        }
        self.probe.initialized.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn detect(&mut self, _image: &ImageFrame) -> Result<Option<LandmarkFrame>> {
        let probe = &self.probe;
        probe.calls.fetch_add(1, Ordering::SeqCst);
        let active = probe.active.fetch_add(1, Ordering::SeqCst) + 1;
        probe.max_active.fetch_max(active, Ordering::SeqCst);

        while probe.hold.load(Ordering::SeqCst) {
            std::thread::sleep(Duration::from_millis(1));
        }

        let reply = probe
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| probe.fallback.lock().unwrap().clone());
        probe.active.fetch_sub(1, Ordering::SeqCst);

        match reply {
            Reply::Face(frame) => Ok(Some(frame)),
            Reply::NoFace => Ok(None),
            Reply::Fail => Err(anyhow!("inference crashed")),
        }
    }

    fn close(&mut self) {
        self.probe.closed.fetch_add(1, Ordering::SeqCst);
    }
}

// Assets

#[derive(Debug, Default)]
pub struct LoaderProbe {
    /// While set, `load()` blocks before producing the asset.
    pub hold: AtomicBool,
    pub loads: AtomicUsize,
    pub live: AtomicUsize,
    pub released: AtomicUsize,
}

/// Loads succeed unless the path contains "missing".
pub struct CountingLoader {
    pub probe: Arc<LoaderProbe>,
}

impl CountingLoader {
    pub fn new() -> (Arc<Self>, Arc<LoaderProbe>) {
        let probe = Arc::new(LoaderProbe::default());
        (
            Arc::new(Self {
                probe: probe.clone(),
            }),
            probe,
        )
    }
}

impl AssetLoader for CountingLoader {
    fn load(&self, path: &str) -> Result<Box<dyn SceneAsset>> {
        self.probe.loads.fetch_add(1, Ordering::SeqCst);
        while self.probe.hold.load(Ordering::SeqCst) {
            std::thread::sleep(Duration::from_millis(1));
        }
        if path.contains("missing") {
            bail!("404 for {}", path);
        }
        self.probe.live.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockAsset::new(path, self.probe.clone())))
    }
}

pub struct MockAsset {
    pub name: String,
    probe: Arc<LoaderProbe>,
    transform: Pose,
    depth_test: bool,
}

impl MockAsset {
    pub fn new(name: &str, probe: Arc<LoaderProbe>) -> Self {
        Self {
            name: name.to_string(),
            probe,
            transform: Pose::default(),
            depth_test: true,
        }
    }
}

impl SceneAsset for MockAsset {
    fn transform(&self) -> Pose {
        self.transform
    }

    fn set_transform(&mut self, pose: &Pose) {
        self.transform = *pose;
    }

    fn depth_test(&self) -> bool {
        self.depth_test
    }

    fn set_depth_test(&mut self, enabled: bool) {
        self.depth_test = enabled;
    }

    fn release(&mut self) {
        self.probe.live.fetch_sub(1, Ordering::SeqCst);
        self.probe.released.fetch_add(1, Ordering::SeqCst);
    }

    fn byte_size(&self) -> usize {
        1024
    }
}

/// Sleep-poll until `done` holds, without ticking anything.
pub async fn wait_for(done: impl Fn() -> bool) -> bool {
    for _ in 0..1000 {
        if done() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    false
}

// Renderer

#[derive(Debug, Default)]
pub struct RecordingRenderer {
    pub frames: usize,
    pub with_overlay: usize,
    pub last_transform: Option<Pose>,
}

impl Renderer for RecordingRenderer {
    fn render(&mut self, overlay: Option<&dyn SceneAsset>) -> Result<()> {
        self.frames += 1;
        if let Some(asset) = overlay {
            self.with_overlay += 1;
            self.last_transform = Some(asset.transform());
        }
        Ok(())
    }
}
