// src/infra/paths.rs — XDG-compliant path management
//
// FORESIGHT_HOME overrides everything: config and data both live under it.
// Otherwise config uses ~/.foresight/ and data uses XDG_DATA_HOME/foresight.

use directories::{BaseDirs, ProjectDirs};
use std::path::PathBuf;
use std::sync::OnceLock;

static PROJECT_DIRS: OnceLock<Option<ProjectDirs>> = OnceLock::new();

fn project_dirs() -> Option<&'static ProjectDirs> {
    PROJECT_DIRS
        .get_or_init(|| ProjectDirs::from("", "", "foresight"))
        .as_ref()
}

/// Returns the FORESIGHT_HOME override, if set.
fn foresight_home() -> Option<PathBuf> {
    std::env::var_os("FORESIGHT_HOME").map(PathBuf::from)
}

/// Home directory, or the working directory when none can be determined.
pub fn dirs_home() -> PathBuf {
    BaseDirs::new()
        .map(|b| b.home_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Configuration directory: $FORESIGHT_HOME/ or ~/.foresight/
pub fn config_dir() -> PathBuf {
    if let Some(home) = foresight_home() {
        return home;
    }
    dirs_home().join(".foresight")
}

/// Data directory: $FORESIGHT_HOME/data/ or ~/.local/share/foresight/
pub fn data_dir() -> PathBuf {
    if let Some(home) = foresight_home() {
        return home.join("data");
    }
    match project_dirs() {
        Some(dirs) => dirs.data_local_dir().to_path_buf(),
        None => config_dir().join("data"),
    }
}

/// Default database path
pub fn db_path() -> PathBuf {
    data_dir().join("foresight.db")
}

/// Config file path
pub fn config_file_path() -> PathBuf {
    config_dir().join("config.toml")
}

/// Ensure the config and data directories exist.
pub fn ensure_dirs() -> std::io::Result<()> {
    for dir in [config_dir(), data_dir()] {
        std::fs::create_dir_all(dir)?;
    }
    Ok(())
}
