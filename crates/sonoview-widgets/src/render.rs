//! Offscreen rendering of a frame range
//!
//! Renders `f0..f1` of a view into one bitmap as wide as the range needs at
//! the view's zoom level, painting a view-width chunk at a time. The view's
//! centre frame moves while rendering and is put back afterwards, also when
//! the render is cancelled.

use std::sync::atomic::{AtomicBool, Ordering};

use sonoview_core::FrameIndex;
use thiserror::Error;

use crate::canvas::{Bitmap, Canvas, Rect};
use crate::view::View;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RenderError {
    #[error("render cancelled")]
    Cancelled,

    #[error("frame range {start}..{end} is narrower than one pixel")]
    EmptyRange { start: FrameIndex, end: FrameIndex },
}

pub type RenderResult<T> = Result<T, RenderError>;

/// Render frames `f0..f1` of `view`
///
/// `progress` receives a percentage before each chunk. Setting `cancel`
/// stops at the next chunk boundary.
pub fn render_to_bitmap(
    view: &mut View,
    f0: FrameIndex,
    f1: FrameIndex,
    cancel: &AtomicBool,
    mut progress: impl FnMut(u8),
) -> RenderResult<Bitmap> {
    let zoom = view.zoom_level() as FrameIndex;
    let x0 = f0.div_euclid(zoom);
    let x1 = f1.div_euclid(zoom);
    let w = (x1 - x0).min(i32::MAX as FrameIndex) as i32;
    if w <= 0 {
        return Err(RenderError::EmptyRange { start: f0, end: f1 });
    }

    let chunk_width = view.width().max(1);
    let height = view.height();
    let background = view.context().palette.background;

    let incomplete = view
        .layers()
        .iter()
        .filter_map(|l| l.model())
        .filter(|m| !m.is_ready())
        .count();
    if incomplete > 0 {
        log::warn!("rendering with {} model(s) still loading", incomplete);
    }

    log::info!(
        "rendering frames {}..{} at zoom {}: {}x{} px",
        f0,
        f1,
        zoom,
        w,
        height
    );

    let original_centre = view.centre_frame();
    let mut out = Bitmap::new(w, height, background);
    let mut chunk = Bitmap::new(chunk_width, height, background);
    let chunk_rect = Rect::from_size(chunk_width, height);

    let mut x = 0;
    while x < w {
        progress((x as i64 * 100 / w as i64) as u8);
        if cancel.load(Ordering::Relaxed) {
            log::info!("render cancelled at column {}", x);
            view.set_centre_frame(original_centre, false);
            return Err(RenderError::Cancelled);
        }

        let centre = f0 + (x + chunk_width / 2) as FrameIndex * zoom;
        view.set_centre_frame(centre, false);
        let geometry = view.geometry();

        chunk.fill_rect(chunk_rect, background);
        for layer in view.layers().iter().filter(|l| !l.is_dormant()) {
            layer.paint(&geometry, view.context(), &mut chunk, chunk_rect);
        }

        let width = (w - x).min(chunk_width);
        out.draw_image_region(&chunk, Rect::new(0, 0, width, height), x, 0);
        x += chunk_width;
    }

    view.set_centre_frame(original_centre, false);
    progress(100);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::Color;
    use crate::context::ViewContext;
    use crate::layer::Layer;
    use sonoview_core::model::WaveFileModel;
    use std::sync::Arc;
    use std::time::Duration;

    fn view() -> View {
        let samples: Vec<f32> = (0..100_000)
            .map(|i| ((i as f32) * 0.01).sin() * 0.8)
            .collect();
        let model = WaveFileModel::from_samples(8000, samples).unwrap();
        assert!(model.wait_for_fill(Duration::from_secs(10)));

        let mut view = View::new(ViewContext::shared(Default::default()), 100, 40);
        view.add_layer(Layer::waveform(Arc::new(model)));
        view.add_layer(Layer::time_ruler(8000));
        view.set_zoom_level(10);
        view.set_centre_frame(77_777, false);
        view
    }

    fn columns(bitmap: &Bitmap, from: i32, to: i32) -> Vec<Vec<Color>> {
        (from..to).map(|x| bitmap.column(x)).collect()
    }

    #[test]
    fn test_render_matches_screen_chunks() {
        let mut view = view();
        let cancel = AtomicBool::new(false);
        let mut seen = Vec::new();
        let out = render_to_bitmap(&mut view, 0, 2000, &cancel, |p| seen.push(p)).unwrap();
        assert_eq!(out.size(), (200, 40));
        assert_eq!(seen, vec![0, 50, 100]);
        assert_eq!(view.centre_frame(), 77_777);

        for (centre, from) in [(500, 0), (1500, 100)] {
            view.set_centre_frame(centre, false);
            let mut screen = Bitmap::new(100, 40, Color::TRANSPARENT);
            view.paint(&mut screen, Rect::from_size(100, 40));
            assert_eq!(columns(&out, from, from + 100), columns(&screen, 0, 100));
        }
    }

    #[test]
    fn test_partial_last_chunk() {
        let mut view = view();
        let cancel = AtomicBool::new(false);
        let out = render_to_bitmap(&mut view, 1000, 2500, &cancel, |_| {}).unwrap();
        assert_eq!(out.size(), (150, 40));
    }

    #[test]
    fn test_cancel_restores_centre() {
        let mut view = view();
        let cancel = AtomicBool::new(false);
        let result = render_to_bitmap(&mut view, 0, 5000, &cancel, |p| {
            if p > 0 {
                cancel.store(true, Ordering::Relaxed);
            }
        });
        assert_eq!(result, Err(RenderError::Cancelled));
        assert_eq!(view.centre_frame(), 77_777);
    }

    #[test]
    fn test_render_wav_file_to_ppm() {
        let dir = tempfile::tempdir().unwrap();
        let wav = dir.path().join("tone.wav");
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&wav, spec).unwrap();
        for i in 0..16_000 {
            let s = ((i as f32 * 0.05).sin() * 16_000.0) as i16;
            writer.write_sample(s).unwrap();
            writer.write_sample(-s).unwrap();
        }
        writer.finalize().unwrap();

        let model = WaveFileModel::open(&wav).unwrap();
        assert!(model.wait_for_fill(Duration::from_secs(10)));
        let mut view = View::new(ViewContext::shared(Default::default()), 64, 30);
        view.add_layer(Layer::waveform(Arc::new(model)));
        view.set_zoom_level(128);

        let cancel = AtomicBool::new(false);
        let out = render_to_bitmap(&mut view, 0, 16_000, &cancel, |_| {}).unwrap();
        assert_eq!(out.size(), (125, 30));

        let background = view.context().palette.background;
        assert!(out.pixels().iter().any(|&c| c != background));

        let ppm = dir.path().join("tone.ppm");
        out.write_ppm(&ppm).unwrap();
        let bytes = std::fs::read(&ppm).unwrap();
        assert!(bytes.starts_with(b"P6\n125 30\n255\n"));
    }

    #[test]
    fn test_empty_range() {
        let mut view = view();
        let cancel = AtomicBool::new(false);
        assert_eq!(
            render_to_bitmap(&mut view, 100, 105, &cancel, |_| {}),
            Err(RenderError::EmptyRange { start: 100, end: 105 })
        );
    }
}
