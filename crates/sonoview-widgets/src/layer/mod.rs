//! Layers drawn by views
//!
//! A [`Layer`] pairs one of the closed set of [`LayerKind`]s with the view-
//! independent state every layer has (identity, dormancy). The view never
//! looks inside a kind; it asks the layer whether it scrolls, whether it
//! hides what is behind it, which zoom constraint it imposes, and tells it
//! to paint a rect.

mod flexi_note;
mod spectrogram;
mod time_ruler;
mod time_value;
mod waveform;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use sonoview_core::model::{
    DenseColumnModel, Model, ModelError, ModelResult, NoteModel, SparseTimeValueModel,
    WaveFileModel,
};
use sonoview_core::zoom::ZoomConstraint;
use sonoview_core::{FrameIndex, ModelId, SampleRate};

use crate::canvas::{Canvas, Rect};
use crate::context::ViewContext;
use crate::geometry::ViewGeometry;

pub use flexi_note::FlexiNoteLayer;
pub use spectrogram::SpectrogramLayer;
pub use time_ruler::TimeRulerLayer;
pub use time_value::{PlotStyle, TimeValueLayer};
pub use waveform::{ChannelMode, WaveformLayer, WaveformScale};

/// Process-unique layer identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LayerId(pub u64);

impl LayerId {
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        LayerId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// The kinds of layer a view can hold
pub enum LayerKind {
    Waveform(WaveformLayer),
    Spectrogram(SpectrogramLayer),
    TimeValue(TimeValueLayer),
    FlexiNote(FlexiNoteLayer),
    TimeRuler(TimeRulerLayer),
}

/// Completion and error state of a layer's model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerProgress {
    pub layer: LayerId,
    /// Percentage (0-100)
    pub completion: u8,
    pub error: Option<String>,
}

pub struct Layer {
    id: LayerId,
    kind: LayerKind,
    dormant: bool,
}

impl Layer {
    pub fn new(kind: LayerKind) -> Self {
        Self {
            id: LayerId::next(),
            kind,
            dormant: false,
        }
    }

    pub fn waveform(model: Arc<WaveFileModel>) -> Self {
        Self::new(LayerKind::Waveform(WaveformLayer::new(model)))
    }

    pub fn spectrogram(model: Arc<DenseColumnModel>) -> Self {
        Self::new(LayerKind::Spectrogram(SpectrogramLayer::new(model)))
    }

    pub fn time_value(model: Arc<SparseTimeValueModel>) -> Self {
        Self::new(LayerKind::TimeValue(TimeValueLayer::new(model)))
    }

    pub fn flexi_note(model: Arc<NoteModel>) -> Self {
        Self::new(LayerKind::FlexiNote(FlexiNoteLayer::new(model)))
    }

    pub fn time_ruler(sample_rate: SampleRate) -> Self {
        Self::new(LayerKind::TimeRuler(TimeRulerLayer::new(sample_rate)))
    }

    /// Layer produced by a named transform of an audio model
    ///
    /// Only transforms computed in-process exist; anything else (an
    /// analysis plugin, say) is reported as unavailable.
    pub fn from_transform(name: &str, model: &Arc<WaveFileModel>) -> ModelResult<Self> {
        match name {
            "waveform" => Ok(Self::waveform(Arc::clone(model))),
            "time-ruler" => Ok(Self::time_ruler(model.sample_rate())),
            _ => Err(ModelError::TransformUnavailable {
                name: name.to_string(),
            }),
        }
    }

    pub fn id(&self) -> LayerId {
        self.id
    }

    pub fn kind(&self) -> &LayerKind {
        &self.kind
    }

    pub fn kind_mut(&mut self) -> &mut LayerKind {
        &mut self.kind
    }

    pub fn name(&self) -> &'static str {
        match self.kind {
            LayerKind::Waveform(_) => "Waveform",
            LayerKind::Spectrogram(_) => "Spectrogram",
            LayerKind::TimeValue(_) => "Time Values",
            LayerKind::FlexiNote(_) => "Notes",
            LayerKind::TimeRuler(_) => "Ruler",
        }
    }

    pub fn is_dormant(&self) -> bool {
        self.dormant
    }

    pub fn set_dormant(&mut self, dormant: bool) {
        self.dormant = dormant;
    }

    pub fn is_time_ruler(&self) -> bool {
        matches!(self.kind, LayerKind::TimeRuler(_))
    }

    pub fn is_waveform(&self) -> bool {
        matches!(self.kind, LayerKind::Waveform(_))
    }

    pub fn model(&self) -> Option<&dyn Model> {
        match &self.kind {
            LayerKind::Waveform(l) => Some(l.model().as_ref() as &dyn Model),
            LayerKind::Spectrogram(l) => Some(l.model().as_ref() as &dyn Model),
            LayerKind::TimeValue(l) => Some(l.model().as_ref() as &dyn Model),
            LayerKind::FlexiNote(l) => Some(l.model().as_ref() as &dyn Model),
            LayerKind::TimeRuler(_) => None,
        }
    }

    /// Audio model filled in the background, for waveform layers
    pub fn wave_model(&self) -> Option<&Arc<WaveFileModel>> {
        match &self.kind {
            LayerKind::Waveform(l) => Some(l.model()),
            _ => None,
        }
    }

    pub fn model_id(&self) -> Option<ModelId> {
        self.model().map(|m| m.id())
    }

    /// Model that loaded successfully, if any
    pub fn usable_model(&self) -> Option<&dyn Model> {
        self.model().filter(|m| m.is_ok())
    }

    pub fn zoom_constraint(&self) -> Option<&dyn ZoomConstraint> {
        self.model().and_then(|m| m.zoom_constraint())
    }

    /// False when the layer can only be viewed at its constraint's steps
    pub fn supports_other_zoom_levels(&self) -> bool {
        !matches!(
            self.kind,
            LayerKind::Waveform(_) | LayerKind::Spectrogram(_)
        )
    }

    /// Whether a view may cache this layer's pixels and shift them on scroll
    pub fn is_scrollable(&self) -> bool {
        match &self.kind {
            LayerKind::Waveform(l) => !l.auto_normalize(),
            LayerKind::Spectrogram(_) => false,
            LayerKind::TimeValue(_) | LayerKind::FlexiNote(_) | LayerKind::TimeRuler(_) => true,
        }
    }

    /// Whether the layer covers everything behind it
    pub fn is_opaque(&self) -> bool {
        matches!(self.kind, LayerKind::Spectrogram(_))
    }

    /// Paint the part of the layer inside `rect`
    pub fn paint(
        &self,
        geometry: &ViewGeometry,
        context: &ViewContext,
        canvas: &mut dyn Canvas,
        rect: Rect,
    ) {
        if self.dormant {
            return;
        }
        match &self.kind {
            LayerKind::Waveform(l) => l.paint(geometry, context, canvas, rect),
            LayerKind::Spectrogram(l) => l.paint(geometry, context, canvas, rect),
            LayerKind::TimeValue(l) => l.paint(geometry, context, canvas, rect),
            LayerKind::FlexiNote(l) => l.paint(geometry, context, canvas, rect),
            LayerKind::TimeRuler(l) => l.paint(geometry, context, canvas, rect),
        }
    }

    pub fn progress(&self) -> LayerProgress {
        let (completion, error) = match self.model() {
            Some(m) => (m.readiness().completion, m.last_error()),
            None => (100, None),
        };
        LayerProgress {
            layer: self.id,
            completion,
            error,
        }
    }

    /// Value range of the layer's data, for vertical zoom-to-region
    pub fn value_extents(&self) -> Option<(f32, f32)> {
        match &self.kind {
            LayerKind::TimeValue(l) => l.display_extents(),
            LayerKind::FlexiNote(l) => l.display_extents(),
            _ => None,
        }
    }

    /// Restrict the displayed value range; ignored by layers without one
    pub fn set_display_extents(&mut self, min: f32, max: f32) -> bool {
        match &mut self.kind {
            LayerKind::TimeValue(l) => {
                l.set_display_extents(min, max);
                true
            }
            LayerKind::FlexiNote(l) => {
                l.set_display_extents(min, max);
                true
            }
            _ => false,
        }
    }
}

impl std::fmt::Debug for Layer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Layer")
            .field("id", &self.id)
            .field("kind", &self.name())
            .field("dormant", &self.dormant)
            .finish()
    }
}

/// Map `value` in `[min, max]` onto `[height - 1, 0]`
pub(crate) fn y_for_value(value: f32, min: f32, max: f32, height: i32) -> i32 {
    if max <= min {
        return height / 2;
    }
    let h = (height - 1).max(0) as f32;
    (h - (value - min) / (max - min) * h).round() as i32
}

/// Frame span covering pixel columns `x0..=x1`, padded by `pad` columns
pub(crate) fn frame_span(geometry: &ViewGeometry, x0: i32, x1: i32, pad: i32) -> (FrameIndex, FrameIndex) {
    (
        geometry.frame_for_x(x0 - pad),
        geometry.frame_for_x(x1 + 1 + pad),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wave() -> Arc<WaveFileModel> {
        Arc::new(WaveFileModel::from_samples(8000, vec![0.0; 1000]).unwrap())
    }

    #[test]
    fn test_scrollability_and_opacity() {
        let waveform = Layer::waveform(wave());
        assert!(waveform.is_scrollable());
        assert!(!waveform.is_opaque());

        let spectrogram = Layer::spectrogram(Arc::new(DenseColumnModel::new(8000, 256, 16)));
        assert!(!spectrogram.is_scrollable());
        assert!(spectrogram.is_opaque());

        let ruler = Layer::time_ruler(8000);
        assert!(ruler.is_scrollable());
        assert!(ruler.model().is_none());
        assert!(ruler.zoom_constraint().is_none());
    }

    #[test]
    fn test_auto_normalising_waveform_is_not_scrollable() {
        let mut layer = Layer::waveform(wave());
        if let LayerKind::Waveform(w) = layer.kind_mut() {
            w.set_auto_normalize(true);
        }
        assert!(!layer.is_scrollable());
    }

    #[test]
    fn test_waveform_layer_exposes_model_constraint() {
        let layer = Layer::waveform(wave());
        let constraint = layer.zoom_constraint().unwrap();
        assert_eq!(
            constraint.nearest_block_size(300, sonoview_core::zoom::RoundingDirection::RoundDown),
            256
        );
    }

    #[test]
    fn test_progress_reports_model_completion() {
        let model = Arc::new(SparseTimeValueModel::new(8000, 1));
        model.set_completion(40);
        let layer = Layer::time_value(Arc::clone(&model));
        let progress = layer.progress();
        assert_eq!(progress.completion, 40);
        assert_eq!(progress.error, None);
    }

    #[test]
    fn test_unknown_transform_is_unavailable() {
        let model = wave();
        let layer = Layer::from_transform("waveform", &model).unwrap();
        assert!(layer.is_waveform());
        assert!(Layer::from_transform("time-ruler", &model).unwrap().is_time_ruler());

        match Layer::from_transform("vamp:qm-vamp-plugins:qm-onsetdetector", &model) {
            Err(ModelError::TransformUnavailable { name }) => assert!(name.ends_with("onsetdetector")),
            other => panic!("unexpected {:?}", other.map(|l| l.name())),
        }
    }

    #[test]
    fn test_y_for_value() {
        assert_eq!(y_for_value(0.0, 0.0, 1.0, 101), 100);
        assert_eq!(y_for_value(1.0, 0.0, 1.0, 101), 0);
        assert_eq!(y_for_value(5.0, 5.0, 5.0, 100), 50);
    }
}
