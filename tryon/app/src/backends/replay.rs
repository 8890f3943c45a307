use anyhow::{bail, Context, Result};
use api::{CaptureSource, DetectorOptions, ImageFrame, LandmarkFrame, LandmarkSource};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

/// Recorded detector output, one entry per captured frame. `null` entries are
/// frames in which no face was found.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LandmarkRecording {
    pub frames: Vec<Option<LandmarkFrame>>,
}

impl LandmarkRecording {
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Failed to open recording {:?}", path))?;
        let recording: Self = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("Failed to parse recording {:?}", path))?;
        info!("Loaded {} recorded frames from {:?}", recording.frames.len(), path);
        Ok(recording)
    }
}

/// Capture half and detector half of one recording.
pub fn replay_pair(recording: LandmarkRecording, looping: bool) -> (ReplayCapture, ReplayDetector) {
    let frames = Arc::new(recording.frames);
    (
        ReplayCapture {
            len: frames.len() as u64,
            cursor: 0,
            looping,
            opened: false,
        },
        ReplayDetector {
            frames,
            options: None,
        },
    )
}

/// Emits empty images whose sequence numbers index into the recording.
#[derive(Debug)]
pub struct ReplayCapture {
    len: u64,
    cursor: u64,
    looping: bool,
    opened: bool,
}

impl CaptureSource for ReplayCapture {
    fn open(&mut self) -> Result<()> {
        if self.len == 0 {
            bail!("recording contains no frames");
        }
        self.opened = true;
        self.cursor = 0;
        Ok(())
    }

    fn frame(&mut self) -> Result<Option<ImageFrame>> {
        if !self.opened {
            bail!("capture is not open");
        }
        if self.cursor >= self.len {
            if !self.looping {
                return Ok(None);
            }
            debug!("Recording finished, starting over");
            self.cursor = 0;
        }

        let frame = ImageFrame {
            sequence: self.cursor,
            ..Default::default()
        };
        self.cursor += 1;
        Ok(Some(frame))
    }

    fn close(&mut self) {
        self.opened = false;
    }
}

#[derive(Debug)]
pub struct ReplayDetector {
    frames: Arc<Vec<Option<LandmarkFrame>>>,
    options: Option<DetectorOptions>,
}

impl LandmarkSource for ReplayDetector {
    fn initialize(&mut self, options: &DetectorOptions) -> Result<()> {
        if options.max_faces != 1 {
            bail!("replay supports a single face, asked for {}", options.max_faces);
        }
        self.options = Some(options.clone());
        Ok(())
    }

    fn detect(&mut self, image: &ImageFrame) -> Result<Option<LandmarkFrame>> {
        if self.options.is_none() {
            bail!("detector used before initialization");
        }
        let index = usize::try_from(image.sequence).context("frame sequence out of range")?;
        match self.frames.get(index) {
            Some(frame) => Ok(frame.clone()),
            None => bail!("no recorded frame #{}", image.sequence),
        }
    }

    fn close(&mut self) {
        self.options = None;
    }
}
