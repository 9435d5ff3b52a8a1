//! Sonoview Core - models, range summaries and zoom constraints
//!
//! Everything here is independent of any drawing surface. The widgets crate
//! builds views, panes and the overview on top of these types.

pub mod audio_file;
pub mod config;
pub mod model;
pub mod real_time;
pub mod selection;
pub mod types;
pub mod zoom;

pub use types::*;
