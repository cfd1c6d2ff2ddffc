use directories::ProjectDirs;
use std::path::PathBuf;

pub const CONFIG_FILE: &str = "engine.json";

pub fn config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "sieve-dom").map(|d| d.config_dir().to_path_buf())
}

/// Default location of the engine config file.
pub fn config_file() -> Option<PathBuf> {
    config_dir().map(|d| d.join(CONFIG_FILE))
}
