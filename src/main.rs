use anyhow::{bail, Context, Result};
use clap::{ArgGroup, Parser};
use opencv::{
    core::{Mat, Point, Scalar, Size},
    highgui, imgproc,
    prelude::*,
    videoio,
};
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    fs::File,
    io::{BufRead, BufReader, BufWriter, Write},
    path::{Path, PathBuf},
    time::Instant,
};

use ppmark::{
    FrameAnnotator, IdentityLabels, PersonObservation, PresenceTracker, ReidStatus, RenderConfig,
    SkeletonOverlay, SkeletonRenderer,
};

#[derive(Parser, Debug)]
#[command(name = "ppmark", about = "Overlay annotator demo for people-tracking pipelines")]
#[command(group(ArgGroup::new("input").required(true).args(["file", "rtsp"])))]
struct Args {
    #[arg(long, value_name = "PATH", conflicts_with = "rtsp")]
    file: Option<PathBuf>,
    #[arg(long, value_name = "URL", conflicts_with = "file")]
    rtsp: Option<String>,
    /// JSONL produced by the detect/track/reid stages: one
    /// {"frame", "people", "reid_active", "dedup_active"} object per line,
    /// frame indices starting at 1
    #[arg(long, value_name = "PATH")]
    observations: PathBuf,
    /// JSON RenderConfig; overrides the individual --show-* flags
    #[arg(long, value_name = "PATH")]
    render_config: Option<PathBuf>,
    #[arg(long)]
    show_box: bool,
    #[arg(long)]
    show_repspoint: bool,
    #[arg(long)]
    show_skeleton: bool,
    #[arg(long)]
    limb_lines: bool,
    #[arg(long, default_value_t = 5)]
    keypoint_radius: i32,
    #[arg(long)]
    show_track_id: bool,
    #[arg(long)]
    show_reid: bool,
    #[arg(long)]
    show_face: bool,
    #[arg(long)]
    headless: bool,
    /// Save the annotated video here
    #[arg(long, value_name = "PATH")]
    output: Option<PathBuf>,
    #[arg(long, value_name = "PATH")]
    log_json: Option<PathBuf>,
    #[arg(long, default_value_t = 5)]
    log_interval_seconds: u64,
}

/// One line of the observation file: everything the external pipeline
/// reported for one frame.
#[derive(Debug, Deserialize)]
struct FrameObservations {
    frame: u64,
    #[serde(default)]
    people: Vec<PersonObservation>,
    #[serde(default)]
    reid_active: usize,
    #[serde(default)]
    dedup_active: usize,
}

#[derive(Serialize)]
struct SessionLog<'a> {
    event: &'static str,
    timestamp: String,
    source: String,
    observations: String,
    config: &'a RenderConfig,
}

#[derive(Serialize)]
struct FrameLog {
    event: &'static str,
    timestamp: String,
    frame_index: u64,
    people: usize,
    tracked_identities: usize,
    reid_active: usize,
    dedup_active: usize,
}

#[derive(Serialize)]
struct PresenceEntry {
    identity: String,
    first_seen: f64,
    last_seen: f64,
    label: String,
}

#[derive(Serialize)]
struct PresenceSummaryLog {
    event: &'static str,
    timestamp: String,
    frame_index: u64,
    interval_seconds: u64,
    identities: Vec<PresenceEntry>,
}

struct JsonLogger {
    writer: BufWriter<File>,
}

impl JsonLogger {
    fn new(path: &Path) -> Result<Self> {
        let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
        Ok(Self {
            writer: BufWriter::new(file),
        })
    }

    fn write_event<T: Serialize>(&mut self, event: &T) -> Result<()> {
        serde_json::to_writer(&mut self.writer, event)?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_target(false).init();
    let args = Args::parse();
    run(args)
}

fn run(args: Args) -> Result<()> {
    let source = if let Some(file) = &args.file {
        file.to_string_lossy().to_string()
    } else if let Some(rtsp) = &args.rtsp {
        rtsp.clone()
    } else {
        bail!("Provide --file or --rtsp");
    };

    let observations = load_observations(&args.observations)?;
    if observations.is_empty() {
        tracing::warn!("{} contains no observation records", args.observations.display());
    }
    let base_config = resolve_render_config(&args)?;

    let mut capture =
        videoio::VideoCapture::from_file(&source, videoio::CAP_ANY).with_context(|| {
            format!("Failed to open input source: {}", source)
        })?;
    if !capture.is_opened()? {
        bail!("Failed to open input source: {}", source);
    }
    let _ = capture.set(videoio::CAP_PROP_BUFFERSIZE, 1.0);

    let mut writer = match args.output.as_ref() {
        Some(path) => {
            let fps = capture.get(videoio::CAP_PROP_FPS)?;
            let fps = if fps > 0.0 { fps } else { 30.0 };
            let width = capture.get(videoio::CAP_PROP_FRAME_WIDTH)? as i32;
            let height = capture.get(videoio::CAP_PROP_FRAME_HEIGHT)? as i32;
            let fourcc = videoio::VideoWriter::fourcc('m', 'p', '4', 'v')?;
            Some(videoio::VideoWriter::new(
                path.to_str().context("Output path is not valid UTF-8")?,
                fourcc,
                fps,
                Size::new(width, height),
                true,
            )?)
        }
        None => None,
    };

    let mut json_logger = match args.log_json.as_ref() {
        Some(path) => Some(JsonLogger::new(path)?),
        None => None,
    };
    if let Some(logger) = json_logger.as_mut() {
        let session = SessionLog {
            event: "session_start",
            timestamp: timestamp_now(),
            source: source.clone(),
            observations: args.observations.display().to_string(),
            config: &base_config,
        };
        logger.write_event(&session)?;
        logger.flush()?;
    }

    let mut display_enabled = !args.headless;
    let window_name = "ppmark";
    if display_enabled {
        if let Err(err) = highgui::named_window(window_name, highgui::WINDOW_AUTOSIZE) {
            tracing::warn!("Failed to open display window: {}. Running headless.", err);
            display_enabled = false;
        }
    }

    let annotator = FrameAnnotator::new(Some(SkeletonRenderer::new()));
    let mut presence = PresenceTracker::new();
    let empty: Vec<PersonObservation> = Vec::new();

    let start_time = Instant::now();
    let mut last_summary = Instant::now();
    let mut frame_index: u64 = 0;
    let mut frame = Mat::default();

    loop {
        if !capture.read(&mut frame)? {
            break;
        }
        if frame.empty() {
            break;
        }
        frame_index += 1;
        let now = start_time.elapsed().as_secs_f64();

        let mut config = base_config.clone();
        let people = match observations.get(&frame_index) {
            Some(entry) => {
                config.reid_status = ReidStatus {
                    reid_active: entry.reid_active,
                    dedup_active: entry.dedup_active,
                };
                &entry.people
            }
            None => &empty,
        };

        presence.update(people, now);
        annotator
            .annotate(&mut frame, people, &presence, now, &config)
            .with_context(|| format!("Failed to annotate frame {}", frame_index))?;
        draw_hud(&mut frame, people.len(), presence.len(), start_time, frame_index)?;

        if let Some(writer) = writer.as_mut() {
            writer.write(&frame)?;
        }
        if display_enabled {
            highgui::imshow(window_name, &frame)?;
            let key = highgui::wait_key(1)?;
            if key == 27 || key == 113 {
                break;
            }
        }

        if let Some(logger) = json_logger.as_mut() {
            let frame_log = FrameLog {
                event: "frame",
                timestamp: timestamp_now(),
                frame_index,
                people: people.len(),
                tracked_identities: presence.len(),
                reid_active: config.reid_status.reid_active,
                dedup_active: config.reid_status.dedup_active,
            };
            logger.write_event(&frame_log)?;
        }

        if last_summary.elapsed().as_secs() >= args.log_interval_seconds {
            let mut identities: Vec<PresenceEntry> = presence
                .iter()
                .map(|(identity, record)| PresenceEntry {
                    identity: identity.to_string(),
                    first_seen: record.first_seen,
                    last_seen: record.last_seen,
                    label: presence.elapsed_label(identity, now),
                })
                .collect();
            identities.sort_by(|a, b| a.identity.cmp(&b.identity));
            tracing::info!(
                "frames={} people={} tracked_identities={}",
                frame_index,
                people.len(),
                identities.len()
            );
            if let Some(logger) = json_logger.as_mut() {
                let summary = PresenceSummaryLog {
                    event: "presence",
                    timestamp: timestamp_now(),
                    frame_index,
                    interval_seconds: args.log_interval_seconds,
                    identities,
                };
                logger.write_event(&summary)?;
                logger.flush()?;
            }
            last_summary = Instant::now();
        }
    }

    if let Some(logger) = json_logger.as_mut() {
        logger.flush()?;
    }
    Ok(())
}

fn load_observations(path: &Path) -> Result<HashMap<u64, FrameObservations>> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let mut frames = HashMap::new();
    for (line_no, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let entry: FrameObservations = serde_json::from_str(&line)
            .with_context(|| format!("{}:{}: bad observation record", path.display(), line_no + 1))?;
        frames.insert(entry.frame, entry);
    }
    Ok(frames)
}

fn resolve_render_config(args: &Args) -> Result<RenderConfig> {
    if let Some(path) = &args.render_config {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config = serde_json::from_str(&raw)
            .with_context(|| format!("{}: invalid render config", path.display()))?;
        return Ok(config);
    }
    Ok(RenderConfig {
        show_box: args.show_box,
        show_repspoint: args.show_repspoint,
        skeleton: SkeletonOverlay {
            enabled: args.show_skeleton,
            limb_lines: args.limb_lines,
            keypoint_radius: args.keypoint_radius,
        },
        ids: IdentityLabels {
            track_id: args.show_track_id,
            reid_identity: args.show_reid,
            face_identity: args.show_face,
        },
        reid_status: ReidStatus::default(),
    })
}

fn draw_hud(
    frame: &mut Mat,
    people: usize,
    tracked_identities: usize,
    start_time: Instant,
    frame_index: u64,
) -> Result<()> {
    let elapsed = start_time.elapsed().as_secs_f64();
    let fps = if elapsed > 0.0 {
        frame_index as f64 / elapsed
    } else {
        0.0
    };

    let color = Scalar::new(0.0, 255.0, 0.0, 0.0);
    let text = format!(
        "People: {} | Tracked: {} | FPS: {:.1}",
        people, tracked_identities, fps
    );
    imgproc::put_text(
        frame,
        &text,
        Point::new(10, 24),
        imgproc::FONT_HERSHEY_SIMPLEX,
        0.6,
        color,
        2,
        imgproc::LINE_8,
        false,
    )?;
    Ok(())
}

fn timestamp_now() -> String {
    chrono::Utc::now().to_rfc3339()
}
