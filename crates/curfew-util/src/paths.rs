//! Default paths for curfew components
//!
//! - Config: `$XDG_CONFIG_HOME/curfew/config.toml` or `~/.config/curfew/config.toml`

use std::path::{Path, PathBuf};

/// Application subdirectory name
const APP_DIR: &str = "curfew";

/// Config filename within the config directory
const CONFIG_FILENAME: &str = "config.toml";

/// Get the default config file path.
///
/// Order of precedence:
/// 1. `$XDG_CONFIG_HOME/curfew/config.toml` (if XDG_CONFIG_HOME is set)
/// 2. `~/.config/curfew/config.toml`
/// 3. `./config.toml` (last resort)
///
/// `$CURFEW_CONFIG` is handled by the CLI layer.
pub fn default_config_path() -> PathBuf {
    if let Ok(config_home) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(config_home).join(APP_DIR).join(CONFIG_FILENAME);
    }

    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home)
            .join(".config")
            .join(APP_DIR)
            .join(CONFIG_FILENAME);
    }

    PathBuf::from(CONFIG_FILENAME)
}

/// Resolve `path` against `base` unless it is already absolute.
pub fn resolve_path(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_path_contains_curfew() {
        let path = default_config_path();
        let rendered = path.to_string_lossy();
        assert!(rendered.ends_with("config.toml"));
    }

    #[test]
    fn resolve_relative_and_absolute() {
        let base = Path::new("/srv/bot");
        assert_eq!(
            resolve_path(base, Path::new("EULA.md")),
            PathBuf::from("/srv/bot/EULA.md")
        );
        assert_eq!(
            resolve_path(base, Path::new("/etc/curfew/EULA.md")),
            PathBuf::from("/etc/curfew/EULA.md")
        );
    }
}
