//! Per-stack drawing context
//!
//! Replaces process-wide preferences: every view gets the configuration and
//! palette it draws with through a shared [`ViewContext`].

use std::sync::Arc;

use sonoview_core::config::ViewConfig;

use crate::canvas::TextMetrics;
use crate::theme::Palette;

#[derive(Debug, Clone, Default)]
pub struct ViewContext {
    pub config: ViewConfig,
    pub palette: Palette,
}

impl ViewContext {
    pub fn new(config: ViewConfig) -> Self {
        let palette = Palette::from_config(&config);
        Self { config, palette }
    }

    pub fn shared(config: ViewConfig) -> Arc<Self> {
        Arc::new(Self::new(config))
    }

    pub fn text_metrics(&self) -> TextMetrics {
        TextMetrics::for_font_size(self.config.font_size)
    }
}
