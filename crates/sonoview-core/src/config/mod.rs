//! Shared configuration for sonoview views
//!
//! - Generic YAML config loading/saving
//! - Config file path utilities
//! - View display configuration
//!
//! # Usage
//!
//! ```ignore
//! use sonoview_core::config::{default_config_path, load_config, save_config, ViewConfig};
//!
//! let path = default_config_path("config.yaml");
//! let config: ViewConfig = load_config(&path);
//! save_config(&config, &path)?;
//! ```

mod io;
mod paths;
mod view;

pub use io::{load_config, save_config};
pub use paths::{default_config_dir, default_config_path};
pub use view::ViewConfig;
