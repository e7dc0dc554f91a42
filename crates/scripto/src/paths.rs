//! Standard paths used by a script

use std::path::PathBuf;

/// Per-script directories
pub struct Paths {
    /// Config directory (~/.config/<script>)
    pub config: PathBuf,
    /// Data directory (~/.local/share/<script>)
    pub data: PathBuf,
}

impl Paths {
    pub fn for_script(name: &str) -> Self {
        let config = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join(name);

        let data = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("~/.local/share"))
            .join(name);

        Self { config, data }
    }

    /// Interactive shell settings
    pub fn shell_config(&self) -> PathBuf {
        self.config.join("shell.toml")
    }

    /// Interactive shell line history
    pub fn history(&self) -> PathBuf {
        self.data.join("history.txt")
    }
}
