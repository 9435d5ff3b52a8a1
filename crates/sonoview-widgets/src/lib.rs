//! Sonoview widgets - headless views, panes and the overview
//!
//! Everything draws onto a [`canvas::Canvas`]; the bundled [`canvas::Bitmap`]
//! is an in-memory RGBA target that can be written out as PPM.
//!
//! ## Architecture
//!
//! - **Layers**: waveform, spectrogram, time-value points, notes and the
//!   time ruler, each painting a rect for a given [`geometry::ViewGeometry`]
//! - **View**: a layer stack over one frame axis with a scroll cache
//! - **Pane**: a view plus mouse, wheel and thumbwheel navigation and the
//!   centre line overlay
//! - **Overview**: a view fitted to the whole of its models, outlining
//!   what the other views show
//! - **ViewManager**: shared centre, zoom, playback and selections, with an
//!   event queue the [`stack::PaneStack`] drains and dispatches
//!
//! Views never reference each other. A view reports a change to the
//! manager, and the stack hands the resulting event to everyone else.

pub mod canvas;
pub mod context;
pub mod geometry;
pub mod layer;
pub mod overview;
pub mod pane;
pub mod render;
pub mod stack;
pub mod theme;
pub mod view;
pub mod view_manager;

// Re-export commonly used items
pub use canvas::{Bitmap, Canvas, Color, Rect, TextMetrics};
pub use context::ViewContext;
pub use geometry::ViewGeometry;
pub use layer::{Layer, LayerId, LayerKind, LayerProgress};
pub use overview::{Overview, ViewExtent};
pub use pane::{DragMode, Modifiers, Pane, ToolMode};
pub use render::{render_to_bitmap, RenderError, RenderResult};
pub use stack::PaneStack;
pub use theme::Palette;
pub use view::{CacheState, PaintReport, View};
pub use view_manager::{ViewEvent, ViewId, ViewManager};
