//! Waveform layer
//!
//! Draws one vertical min/max line per pixel column from the model's range
//! summaries, with connecting strokes between neighbouring columns, an
//! optional absolute-mean band and a red pen for clipped peaks.
//!
//! Every column reads exactly the same summary blocks no matter which
//! rect is being painted: column frames are snapped down to the model's
//! summary block size, and the painted span starts one column early and
//! ends one column late so the connecting strokes at the rect edges come
//! out identical to a full repaint. Views rely on this when they shift
//! their cache and repaint only the exposed strip.

use std::sync::Arc;

use sonoview_core::model::{Model, RangeSummarisable, RangeSummary, WaveFileModel};
use sonoview_core::{FrameIndex, ZoomLevel};

use crate::canvas::{Canvas, Color, Rect};
use crate::context::ViewContext;
use crate::geometry::ViewGeometry;
use crate::theme::CLIP_COLOR;

/// How multi-channel audio is laid out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelMode {
    /// One lane per channel
    #[default]
    Separate,
    /// Average of the first two channels in one lane
    Mix,
    /// First channel above the midline, second mirrored below
    Merge,
}

/// Vertical scale of the waveform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WaveformScale {
    #[default]
    Linear,
    /// Level in dB from -50 to 0, measured up from the lane bottom
    Decibel,
}

pub struct WaveformLayer {
    model: Arc<WaveFileModel>,
    /// Show only this channel
    channel: Option<usize>,
    channel_mode: ChannelMode,
    scale: WaveformScale,
    gain: f32,
    auto_normalize: bool,
    show_means: bool,
    colour: Option<Color>,
}

struct ChannelArrangement {
    min: usize,
    max: usize,
    lanes: usize,
    merging: bool,
    mixing: bool,
}

impl WaveformLayer {
    pub fn new(model: Arc<WaveFileModel>) -> Self {
        Self {
            model,
            channel: None,
            channel_mode: ChannelMode::default(),
            scale: WaveformScale::default(),
            gain: 1.0,
            auto_normalize: false,
            show_means: true,
            colour: None,
        }
    }

    pub fn model(&self) -> &Arc<WaveFileModel> {
        &self.model
    }

    pub fn channel(&self) -> Option<usize> {
        self.channel
    }

    pub fn set_channel(&mut self, channel: Option<usize>) {
        self.channel = channel;
    }

    pub fn channel_mode(&self) -> ChannelMode {
        self.channel_mode
    }

    pub fn set_channel_mode(&mut self, mode: ChannelMode) {
        self.channel_mode = mode;
    }

    pub fn scale(&self) -> WaveformScale {
        self.scale
    }

    pub fn set_scale(&mut self, scale: WaveformScale) {
        self.scale = scale;
    }

    pub fn gain(&self) -> f32 {
        self.gain
    }

    pub fn set_gain(&mut self, gain: f32) {
        self.gain = gain.max(0.0);
    }

    pub fn auto_normalize(&self) -> bool {
        self.auto_normalize
    }

    /// Scale each channel to fill its lane over the visible range
    pub fn set_auto_normalize(&mut self, auto_normalize: bool) {
        self.auto_normalize = auto_normalize;
    }

    pub fn set_show_means(&mut self, show_means: bool) {
        self.show_means = show_means;
    }

    pub fn set_colour(&mut self, colour: Option<Color>) {
        self.colour = colour;
    }

    fn arrangement(&self) -> Option<ChannelArrangement> {
        if !self.model.is_ok() {
            return None;
        }
        let channels = self.model.channel_count();
        if channels == 0 {
            return None;
        }

        let combine = matches!(self.channel_mode, ChannelMode::Merge | ChannelMode::Mix);
        let (min, max, lanes, raw) = match self.channel {
            Some(c) if c < channels => (c, c, 1, 1),
            Some(_) => return None,
            None if combine => (0, 0, 1, channels),
            None => (0, channels - 1, channels, channels),
        };

        Some(ChannelArrangement {
            min,
            max,
            lanes,
            merging: self.channel_mode == ChannelMode::Merge && raw > 1,
            mixing: self.channel_mode == ChannelMode::Mix && raw > 1,
        })
    }

    /// Summary-aligned frames `[f0, f1)` drawn by column `x`, and whether
    /// the column has any data
    fn source_frames_for_x(
        &self,
        geometry: &ViewGeometry,
        x: i32,
        model_zoom: FrameIndex,
    ) -> (FrameIndex, FrameIndex, bool) {
        let view_frame = geometry.frame_for_x(x);
        if view_frame < 0 {
            return (0, 0, false);
        }
        let f0 = view_frame / model_zoom * model_zoom;
        let f1 = geometry.frame_for_x(x + 1) / model_zoom * model_zoom;
        (f0, f1, f0 < self.model.end_frame())
    }

    /// Gain that makes the loudest visible sample of `channel` full scale
    pub fn normalize_gain(&self, geometry: &ViewGeometry, channel: usize) -> f32 {
        let model_start = self.model.start_frame();
        let model_end = self.model.end_frame();

        let range_start = geometry.start_frame().max(model_start);
        let range_end = geometry.end_frame().clamp(0, model_end.max(0)).max(range_start);

        let mut range = self
            .model
            .summary(channel, range_start, range_end - range_start);

        if let Some(arr) = self.arrangement() {
            if arr.merging || arr.mixing {
                let other = self.model.summary(1, range_start, range_end - range_start);
                range.max = range.max.max(other.max);
                range.min = range.min.min(other.min);
            }
        }

        let peak = range.max.abs().max(range.min.abs());
        if peak > 0.0 {
            1.0 / peak
        } else {
            1.0
        }
    }

    pub fn paint(
        &self,
        geometry: &ViewGeometry,
        context: &ViewContext,
        canvas: &mut dyn Canvas,
        rect: Rect,
    ) {
        let Some(arr) = self.arrangement() else {
            return;
        };

        let h = geometry.height;
        let palette = &context.palette;
        let ready = self.model.is_ready();
        let base = self.colour.unwrap_or_else(|| palette.channel_color(0));
        let mid = palette.mid_color(base);

        // One column beyond the rect on each side, so the connecting
        // strokes into the rect's edge columns are drawn too
        let x0 = rect.x - 1;
        let x1 = rect.right();
        let y0 = rect.y;
        let y1 = rect.bottom() - 1;

        let model_zoom = self.model.summary_block_size(geometry.zoom).max(1) as FrameIndex;
        let (frame0, _, _) = self.source_frames_for_x(geometry, x0, model_zoom);
        // summaries start at the model's first frame, not before it
        let model_start = self.model.start_frame();
        let frame0 = if frame0 < model_start {
            (model_start + model_zoom - 1).div_euclid(model_zoom) * model_zoom
        } else {
            frame0
        };
        let (_, frame1, _) = self.source_frames_for_x(geometry, x1, model_zoom);

        log::trace!(
            "waveform paint x {}..={} frames {}..{} model zoom {}",
            x0,
            x1,
            frame0,
            frame1,
            model_zoom
        );

        let lanes = arr.lanes as i32;

        for ch in arr.min..=arr.max {
            let gain = if self.auto_normalize {
                self.normalize_gain(geometry, ch)
            } else {
                self.gain
            };

            let lane = (ch - arr.min) as i32;
            let mut m = (h / lanes) / 2;
            let mut my = m + (lane * h) / lanes;

            if my - m > y1 || my + m < y0 {
                continue;
            }

            if self.scale == WaveformScale::Decibel && self.channel_mode != ChannelMode::Merge {
                m = h / lanes;
                my = m + (lane * h) / lanes;
            }

            canvas.draw_line(x0, my, x1, my, palette.guide);

            let count = frame1 - frame0;
            let ranges = self
                .model
                .summaries(ch, frame0, count, model_zoom as ZoomLevel)
                .ranges;
            let other: Option<Vec<RangeSummary>> = if arr.merging || arr.mixing {
                if self.model.channel_count() > 1 {
                    Some(
                        self.model
                            .summaries(1, frame0, count, model_zoom as ZoomLevel)
                            .ranges,
                    )
                } else {
                    Some(ranges.clone())
                }
            } else {
                None
            };

            let mut prev: Option<(i32, i32)> = None;

            for x in x0..=x1 {
                let (f0, f1, valid) = self.source_frames_for_x(geometry, x, model_zoom);
                if !valid || f0 < frame0 {
                    continue;
                }
                let f1 = f1 - 1;

                let i0 = ((f0 - frame0) / model_zoom) as usize;
                let i1 = ((f1 - frame0).max(0) / model_zoom) as usize;

                let Some(first) = ranges.get(i0) else {
                    continue;
                };
                let mut range = *first;
                if i1 > i0 {
                    if let Some(next) = ranges.get(i1) {
                        range.max = range.max.max(next.max);
                        range.min = range.min.min(next.min);
                        range.absmean = (range.absmean + next.absmean) / 2.0;
                    }
                }

                if let Some(other) = &other {
                    if let Some(o) = other.get(i0) {
                        if arr.merging {
                            range.max = range.max.abs();
                            range.min = -o.max.abs();
                            range.absmean = (range.absmean + o.absmean) / 2.0;
                            if i1 > i0 {
                                if let Some(on) = other.get(i1) {
                                    range.min = range.min.min(-on.max.abs());
                                }
                            }
                        } else {
                            range.max = (range.max + o.max) / 2.0;
                            range.min = (range.min + o.min) / 2.0;
                            range.absmean = (range.absmean + o.absmean) / 2.0;
                        }
                    }
                }

                let (bottom, top, mbottom, mtop) =
                    self.scaled_extents(&range, gain, m, arr.merging, arr.mixing);

                let mut range_bottom = my - bottom;
                let mut range_top = my - top;
                let mut mean_bottom = my - mbottom;
                let mut mean_top = my - mtop;

                range_top = range_top.clamp(my - m, my + m);
                range_bottom = range_bottom.clamp(my - m, my + m);

                let clipped = range.max <= -1.0 || range.max >= 1.0;

                if mean_bottom > range_bottom {
                    mean_bottom = range_bottom;
                }
                if mean_top < range_top {
                    mean_top = range_top;
                }

                let mut draw_mean = self.show_means;
                if mean_top == range_top {
                    if mean_top < mean_bottom {
                        mean_top += 1;
                    } else {
                        draw_mean = false;
                    }
                }
                if mean_bottom == range_bottom && self.scale == WaveformScale::Linear {
                    if mean_bottom > mean_top {
                        mean_bottom -= 1;
                    } else {
                        draw_mean = false;
                    }
                }

                if x != x0 {
                    if let Some((prev_bottom, prev_top)) = prev {
                        if prev_bottom > range_bottom + 1 && prev_top > range_bottom + 1 {
                            canvas.draw_line(x - 1, prev_top, x, range_bottom + 1, base);
                            canvas.draw_point(x - 1, prev_top, base);
                        } else if prev_bottom < range_top - 1 && prev_top < range_top - 1 {
                            canvas.draw_line(x - 1, prev_bottom, x, range_top - 1, base);
                            canvas.draw_point(x - 1, prev_bottom, base);
                        }
                    }
                }

                let pen = match (ready, clipped) {
                    (true, true) => CLIP_COLOR,
                    (true, false) => base,
                    (false, _) => mid,
                };

                if range_top == range_bottom {
                    canvas.draw_point(x, range_top, pen);
                } else {
                    canvas.draw_line(x, range_bottom, x, range_top, pen);
                }

                if draw_mean {
                    canvas.draw_line(x, mean_bottom, x, mean_top, mid);
                }

                prev = Some((range_bottom, range_top));
            }
        }
    }

    /// Offsets from the lane midline: (range bottom, range top, mean bottom, mean top)
    fn scaled_extents(
        &self,
        range: &RangeSummary,
        gain: f32,
        m: i32,
        merging: bool,
        mixing: bool,
    ) -> (i32, i32, i32, i32) {
        match self.scale {
            WaveformScale::Linear => {
                let m = m as f64;
                let gain = gain as f64;
                (
                    (m * range.min as f64 * gain) as i32,
                    (m * range.max as f64 * gain) as i32,
                    (-m * range.absmean as f64 * gain) as i32,
                    (m * range.absmean as f64 * gain) as i32,
                )
            }
            WaveformScale::Decibel if !merging => {
                let db0 = db_scale(range.min * gain, m);
                let db1 = db_scale(range.max * gain, m);
                let top = db0.max(db1);
                let mean_top = db0.min(db1);
                let bottom = if mixing {
                    mean_top
                } else {
                    db_scale(range.absmean * gain, m)
                };
                (bottom, top, bottom, mean_top)
            }
            WaveformScale::Decibel => (
                -db_scale(range.min * gain, m),
                db_scale(range.max * gain, m),
                -db_scale(range.absmean * gain, m),
                db_scale(range.absmean * gain, m),
            ),
        }
    }
}

/// Pixel height of `sample` on a -50..0 dB scale of `m` pixels
fn db_scale(sample: f32, m: i32) -> i32 {
    let sample = sample.abs() as f64;
    if sample <= 0.0 {
        return 0;
    }
    let db = 20.0 * sample.log10();
    if db < -50.0 {
        return 0;
    }
    if db > 0.0 {
        return m;
    }
    ((db + 50.0) * m as f64 / 50.0 + 0.1) as i32
}
