//! detect_overlay - object detection overlays for a camera or an image file
//!
//! Subcommands:
//! - `live`: start a camera, detect every two seconds, write the latest
//!   overlay to a PNG until Ctrl-C, `--seconds` or `--frames`
//! - `upload`: detect one image file and write its overlay
//! - `status`: query the detection service health endpoint

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::time::{Duration, Instant};

use detect_overlay::capture::{mime_for_path, open_device};
use detect_overlay::ui::{Ui, UiMode};
use detect_overlay::{AppConfig, CycleOutcome, DetectionClient, Pipeline, RasterSurface};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Detection service base URL (overrides DETECT_API_URL and the config file).
    #[arg(long)]
    api_url: Option<String>,
    /// Progress output: auto, plain or pretty.
    #[arg(long, default_value = "auto")]
    ui: UiMode,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Detect on a live camera.
    Live {
        /// Camera: stub://name[?WxH], http(s) snapshot URL, or /dev/videoN.
        #[arg(long, env = "DETECT_CAMERA", default_value = "stub://camera?640x480")]
        camera: String,
        /// Overlay output path, rewritten after every result.
        #[arg(long, default_value = "live_overlay.png")]
        out: PathBuf,
        /// Detection period in milliseconds.
        #[arg(long, default_value_t = 2000)]
        interval_ms: u64,
        /// Stop after this many committed results.
        #[arg(long)]
        frames: Option<u64>,
        /// Stop after this many seconds.
        #[arg(long)]
        seconds: Option<u64>,
    },
    /// Detect on an image file.
    Upload {
        path: PathBuf,
        /// MIME type; guessed from the extension when omitted.
        #[arg(long)]
        mime: Option<String>,
        #[arg(long, default_value = "upload_overlay.png")]
        out: PathBuf,
    },
    /// Check the detection service.
    Status,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let ui = Ui::new(args.ui, std::io::stderr().is_terminal());

    let mut config = AppConfig::load()?;
    if let Some(url) = args.api_url {
        config.api_base_url = url.trim_end_matches('/').to_string();
    }
    log::info!("detection service at {}", config.api_base_url);
    let client = DetectionClient::from_config(&config);

    match args.command {
        Command::Status => run_status(&ui, &client),
        Command::Upload { path, mime, out } => run_upload(&ui, client, &path, mime, &out),
        Command::Live {
            camera,
            out,
            interval_ms,
            frames,
            seconds,
        } => {
            if interval_ms == 0 {
                return Err(anyhow!("interval-ms must be >= 1"));
            }
            run_live(
                &ui,
                client,
                &camera,
                &out,
                Duration::from_millis(interval_ms),
                frames,
                seconds.map(Duration::from_secs),
            )
        }
    }
}

fn run_status(ui: &Ui, client: &DetectionClient) -> Result<()> {
    let stage = ui.stage("query detection service");
    match client.status() {
        Ok(status) => {
            drop(stage);
            println!("status: {}", status.status);
            if let Some(model) = status.model {
                println!("model: {}", model);
            }
            if let Some(message) = status.message {
                println!("message: {}", message);
            }
            Ok(())
        }
        Err(err) => {
            stage.fail(&err.to_string());
            Err(err.into())
        }
    }
}

fn run_upload(
    ui: &Ui,
    client: DetectionClient,
    path: &Path,
    mime: Option<String>,
    out: &Path,
) -> Result<()> {
    let bytes = std::fs::read(path).with_context(|| format!("read {}", path.display()))?;
    let mime = mime.unwrap_or_else(|| mime_for_path(path));
    let filename = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("upload")
        .to_string();

    let pipeline = Pipeline::new(
        open_device("stub://unused")?,
        Arc::new(client),
        RasterSurface::new(),
        RasterSurface::new(),
    );

    let stage = ui.stage(&format!("detect {}", filename));
    match pipeline.upload(bytes, &mime, &filename) {
        CycleOutcome::Completed { .. } => drop(stage),
        CycleOutcome::Rejected(message) | CycleOutcome::Failed(message) => {
            stage.fail(&message);
            return Err(anyhow!(message));
        }
        other => {
            stage.fail("not run");
            return Err(anyhow!("upload not processed: {:?}", other));
        }
    }

    let snapshot = pipeline.snapshot();
    ui.detections(&filename, &snapshot.upload_detections);
    pipeline.upload_renderer().save_png(out)?;
    log::info!("overlay written to {}", out.display());
    Ok(())
}

fn run_live(
    ui: &Ui,
    client: DetectionClient,
    camera: &str,
    out: &Path,
    period: Duration,
    frames: Option<u64>,
    run_for: Option<Duration>,
) -> Result<()> {
    let pipeline = Pipeline::new(
        open_device(camera)?,
        Arc::new(client),
        RasterSurface::new(),
        RasterSurface::new(),
    )
    .with_poll_period(period);

    {
        let stage = ui.stage(&format!("start camera {}", camera));
        if let Err(err) = pipeline.start_camera() {
            stage.fail(&err.to_string());
            return Err(err.into());
        }
    }

    let (tx, rx) = mpsc::channel();
    ctrlc::set_handler(move || {
        let _ = tx.send(());
    })
    .context("set Ctrl-C handler")?;
    log::info!("live detection running; Ctrl-C to stop");

    let deadline = run_for.map(|limit| Instant::now() + limit);
    let renderer = Arc::clone(pipeline.live_renderer());
    let mut shown_frame = None;
    let mut shown_error: Option<String> = None;
    let mut results = 0u64;
    loop {
        match rx.recv_timeout(Duration::from_millis(200)) {
            Err(RecvTimeoutError::Timeout) => {}
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
        if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            break;
        }

        let snapshot = pipeline.snapshot();
        if snapshot.error != shown_error {
            if let Some(error) = &snapshot.error {
                log::warn!("{}", error);
            }
            shown_error = snapshot.error.clone();
        }

        let current = snapshot.live_frame.as_ref().map(|frame| frame.id());
        if current.is_some() && current != shown_frame {
            shown_frame = current;
            results += 1;
            renderer.save_png(out)?;
            ui.detections("live", &snapshot.live_detections);
            if frames.is_some_and(|limit| results >= limit) {
                break;
            }
        }
    }

    let _stage = ui.stage("stop camera");
    pipeline.dispose();
    Ok(())
}
