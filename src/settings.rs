use crate::board::Category;
use crate::persist::DEFAULT_TASKS_FILE;
use crate::rollover::TICK_INTERVAL_SECS;
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const SETTINGS_FILENAME: &str = "settings.json";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Where the board is saved, relative to the working directory.
    pub tasks_file: PathBuf,
    /// Tabs on the board, in any order.
    pub categories: Vec<Category>,
    /// How often the rollover check runs.
    pub tick_interval_secs: u64,
    /// `tracing` filter directive, e.g. "info" or "txxt_lists=debug".
    pub log_level: String,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            tasks_file: PathBuf::from(DEFAULT_TASKS_FILE),
            categories: Category::ALL.to_vec(),
            tick_interval_secs: TICK_INTERVAL_SECS,
            log_level: "info".to_string(),
        }
    }
}

impl Settings {
    /// Read `settings.json` from the working directory.
    pub fn load() -> Result<Settings, SettingsError> {
        Self::load_from(Path::new(SETTINGS_FILENAME))
    }

    /// A missing file means defaults; anything else wrong with it is an error.
    pub fn load_from(path: &Path) -> Result<Settings, SettingsError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Settings::default()),
            Err(source) => {
                return Err(SettingsError::Read { path: path.to_path_buf(), source })
            }
        };
        let settings: Settings = serde_json::from_str(&content)
            .map_err(|source| SettingsError::Parse { path: path.to_path_buf(), source })?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_secs)
    }

    fn validate(&self) -> Result<(), SettingsError> {
        if self.categories.is_empty() {
            return Err(SettingsError::Invalid("at least one category is required".into()));
        }
        let mut seen = HashSet::new();
        if let Some(dup) = self.categories.iter().find(|c| !seen.insert(**c)) {
            return Err(SettingsError::Invalid(format!("category {dup} listed twice")));
        }
        if self.tick_interval_secs == 0 {
            return Err(SettingsError::Invalid("tick_interval_secs must be positive".into()));
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("cannot read settings file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cannot parse settings file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid settings: {0}")]
    Invalid(String),
}
