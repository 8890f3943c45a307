use anyhow::{Context, Result};
use common::TryOnConfig;
use log::{debug, error, info, trace, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tryon::backends::{replay_pair, FileAssetLoader, LandmarkRecording, LogRenderer};
use tryon::TrackingSession;

const DEFAULT_CONFIG: &str = "config.json";

struct Args {
    config: PathBuf,
    recording: Option<PathBuf>,
    model: Option<String>,
}

impl Args {
    fn parse() -> Result<Self> {
        let mut args = Args {
            config: PathBuf::from(DEFAULT_CONFIG),
            recording: None,
            model: None,
        };

        let mut iter = std::env::args().skip(1);
        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--config" => args.config = iter.next().context("--config needs a path")?.into(),
                "--recording" => {
                    args.recording = Some(iter.next().context("--recording needs a path")?.into())
                }
                "--model" => args.model = Some(iter.next().context("--model needs a path")?),
                other => warn!("Ignoring unknown argument {:?}", other),
            }
        }
        Ok(args)
    }
}

fn load_config(path: &Path) -> TryOnConfig {
    match TryOnConfig::load_or_create(path) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load config from {:?}: {:#}. Using defaults.", path, e);
            TryOnConfig::default()
        }
    }
}

fn main() -> Result<()> {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info");
    }
    env_logger::init();

    info!("Starting...");
    debug!("Debug logging is active");
    trace!("Trace logging is active");

    let args = Args::parse()?;
    let mut config = load_config(&args.config);
    if let Some(model) = args.model {
        config.model.initial_model = Some(model);
    }

    let recording_path = args
        .recording
        .context("--recording <file> is required to drive the session")?;
    let recording = LandmarkRecording::load(&recording_path)?;

    let asset_root = std::env::current_dir().context("Failed to resolve working directory")?;
    let (capture, detector) = replay_pair(recording, true);
    let loader = Arc::new(FileAssetLoader::new(asset_root));

    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    runtime.block_on(async move {
        let mut session =
            TrackingSession::new(config, capture, detector, LogRenderer::default(), loader)?;

        let control = session.control();
        ctrlc::set_handler(move || {
            info!("Received Ctrl+C, shutting down...");
            control.stop();
        })
        .context("Error setting Ctrl-C handler")?;

        let mut last_shape = None;
        session.subscribe_face_shape(move |shape| {
            if last_shape != Some(shape) {
                info!("Face shape: {}", shape);
                last_shape = Some(shape);
            }
        });

        if let Err(e) = session.run().await {
            error!("✗ Session ended with error: {}", e);
            if let Err(stop_err) = session.stop().await {
                warn!("Cleanup after failure was incomplete: {}", stop_err);
            }
            return Err(anyhow::Error::from(e));
        }

        info!("Rendered {} frames, exiting", session.renderer().frames());
        Ok::<(), anyhow::Error>(())
    })
}
