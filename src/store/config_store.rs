use std::fs;
use std::path::Path;

use crate::config::{paths, EngineConfig};
use crate::sieve::error::Result;

/// Loads the engine config from the platform config dir. A missing or
/// unreadable file yields the defaults.
pub fn load_config() -> EngineConfig {
    let Some(path) = paths::config_file() else {
        return EngineConfig::default();
    };
    if !path.exists() {
        return EngineConfig::default();
    }
    match load_config_from(&path) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "ignoring unreadable config");
            EngineConfig::default()
        }
    }
}

pub fn load_config_from(path: &Path) -> Result<EngineConfig> {
    let data = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&data)?)
}

pub fn save_config_to(config: &EngineConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serde_json::to_string_pretty(config)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LineEnding;
    use crate::sieve::error::Error;

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir()
            .join(format!("sieve-dom-test-{}", std::process::id()))
            .join(name)
    }

    #[test]
    fn test_save_and_load() {
        let path = temp_path("engine.json");
        let config = EngineConfig {
            disabled_extensions: vec!["reject".to_string()],
            line_ending: LineEnding::Lf,
        };
        save_config_to(&config, &path).unwrap();
        assert_eq!(load_config_from(&path).unwrap(), config);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_load_errors() {
        assert!(matches!(
            load_config_from(&temp_path("missing.json")),
            Err(Error::Io(_))
        ));
        let path = temp_path("broken.json");
        save_config_to(&EngineConfig::default(), &path).unwrap();
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(load_config_from(&path), Err(Error::Config(_))));
        let _ = fs::remove_file(&path);
    }
}
