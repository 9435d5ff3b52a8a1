//! sonoview-export - render a WAV file's waveform to a PPM image
//!
//! ```text
//! sonoview-export <file.wav> [--out PATH] [--height N] [--zoom N] [--config PATH]
//! ```
//!
//! The whole file is rendered at one zoom level (frames per pixel) with a
//! time ruler on top. Set RUST_LOG=debug for per-chunk progress.

use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};

use sonoview_core::config::{default_config_path, load_config, ViewConfig};
use sonoview_core::model::{Model, RangeSummarisable, WaveFileModel};
use sonoview_core::zoom::RoundingDirection;
use sonoview_core::ZoomLevel;
use sonoview_widgets::context::ViewContext;
use sonoview_widgets::pane::Pane;
use sonoview_widgets::render::render_to_bitmap;

const USAGE: &str =
    "usage: sonoview-export <file.wav> [--out PATH] [--height N] [--zoom N] [--config PATH]";

/// Width of the pane the image is rendered through, one chunk at a time
const PANE_WIDTH: i32 = 800;
const DEFAULT_HEIGHT: i32 = 200;

#[derive(Debug)]
struct Args {
    input: PathBuf,
    out: Option<PathBuf>,
    height: i32,
    zoom: Option<ZoomLevel>,
    config: Option<PathBuf>,
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Args> {
    let mut input = None;
    let mut out = None;
    let mut height = DEFAULT_HEIGHT;
    let mut zoom = None;
    let mut config = None;

    while let Some(arg) = args.next() {
        let mut value = |flag: &str| {
            args.next()
                .with_context(|| format!("{} needs a value\n{}", flag, USAGE))
        };
        match arg.as_str() {
            "--out" => out = Some(PathBuf::from(value("--out")?)),
            "--height" => {
                height = value("--height")?
                    .parse()
                    .context("--height must be a number of pixels")?;
            }
            "--zoom" => {
                zoom = Some(
                    value("--zoom")?
                        .parse()
                        .context("--zoom must be a number of frames per pixel")?,
                );
            }
            "--config" => config = Some(PathBuf::from(value("--config")?)),
            "-h" | "--help" => bail!("{}", USAGE),
            flag if flag.starts_with("--") => bail!("unknown option {}\n{}", flag, USAGE),
            path if input.is_none() => input = Some(PathBuf::from(path)),
            extra => bail!("unexpected argument {}\n{}", extra, USAGE),
        }
    }

    let Some(input) = input else {
        bail!("{}", USAGE);
    };
    if height < 1 {
        bail!("--height must be at least 1");
    }
    Ok(Args {
        input,
        out,
        height,
        zoom,
        config,
    })
}

fn main() -> Result<()> {
    // Set RUST_LOG=debug for verbose output
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args = parse_args(std::env::args().skip(1))?;

    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| default_config_path("config.yaml"));
    let config: ViewConfig = load_config(&config_path);
    let poll = Duration::from_millis(config.fill_poll_interval_ms.max(1));

    let model = WaveFileModel::open(&args.input)
        .with_context(|| format!("failed to open {}", args.input.display()))?;
    log::info!(
        "{}: {} frames, {} channel(s) at {} Hz",
        args.input.display(),
        model.end_frame(),
        model.channel_count(),
        model.sample_rate()
    );

    while !model.wait_for_fill(poll) {
        log::debug!("summarising: {}%", model.readiness().completion);
    }
    if let Some(error) = model.last_error() {
        bail!("failed to read {}: {}", args.input.display(), error);
    }

    let model = Arc::new(model);
    let end_frame = model.end_frame();

    let mut pane = Pane::new(ViewContext::shared(config), PANE_WIDTH, args.height);
    for name in ["waveform", "time-ruler"] {
        pane.add_transform_layer(name, &model);
    }
    let view = pane.view_mut();

    let requested = args
        .zoom
        .unwrap_or(view.context().config.default_zoom_level);
    let zoom = view.negotiate_zoom(requested, RoundingDirection::RoundNearest);
    if zoom != requested {
        log::info!("zoom {} snapped to {}", requested, zoom);
    }
    view.set_zoom_level(zoom);

    let cancel = AtomicBool::new(false);
    let image = render_to_bitmap(view, 0, end_frame, &cancel, |percent| {
        log::debug!("rendering: {}%", percent);
    })?;

    let out = args
        .out
        .unwrap_or_else(|| args.input.with_extension("ppm"));
    image
        .write_ppm(&out)
        .with_context(|| format!("failed to write {}", out.display()))?;

    let (w, h) = image.size();
    log::info!("wrote {}x{} image to {}", w, h, out.display());
    Ok(())
}
