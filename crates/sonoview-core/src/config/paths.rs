//! Standard locations for sonoview configuration files

use std::path::PathBuf;

/// `<platform config dir>/sonoview`, falling back to `./.sonoview`
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .map(|dir| dir.join("sonoview"))
        .unwrap_or_else(|| PathBuf::from(".sonoview"))
}

/// `<config dir>/{filename}`
pub fn default_config_path(filename: &str) -> PathBuf {
    default_config_dir().join(filename)
}
