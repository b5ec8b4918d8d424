use std::collections::BTreeMap;
use std::env;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use dirs::home_dir;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::domain::Period;

use super::ConfigError;

const DEFAULT_DIR_NAME: &str = ".family_budget";
const HOME_VAR: &str = "FAMILY_BUDGET_HOME";
const FILE_NAME: &str = "preferences.json";
const TMP_SUFFIX: &str = "tmp";

pub const DASHBOARD_FILTERS_KEY: &str = "dashboard.filters";
pub const THEME_KEY: &str = "ui.theme";

/// Base directory for client-side state. `FAMILY_BUDGET_HOME` overrides it.
pub fn app_data_dir() -> PathBuf {
    if let Some(custom) = env::var_os(HOME_VAR) {
        return PathBuf::from(custom);
    }
    home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(DEFAULT_DIR_NAME)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Theme {
    Light,
    Dark,
    #[default]
    System,
}

/// Last dashboard selection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DashboardFilters {
    #[serde(default)]
    pub period: Option<Period>,
    #[serde(default)]
    pub member_id: Option<Uuid>,
    #[serde(default)]
    pub category_id: Option<Uuid>,
    #[serde(default)]
    pub show_subcategories: bool,
}

/// String-keyed JSON cache. Never authoritative: unreadable content is
/// treated as empty.
#[derive(Debug, Clone)]
pub struct PreferenceStore {
    path: PathBuf,
}

impl PreferenceStore {
    pub fn new() -> Self {
        Self::in_dir(app_data_dir())
    }

    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(FILE_NAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.read_all().remove(key)?;
        match serde_json::from_value(value) {
            Ok(parsed) => Some(parsed),
            Err(err) => {
                tracing::warn!(%key, error = %err, "ignoring unreadable preference");
                None
            }
        }
    }

    pub fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<(), ConfigError> {
        let mut entries = self.read_all();
        entries.insert(key.to_string(), serde_json::to_value(value)?);
        self.write_all(&entries)
    }

    pub fn remove(&self, key: &str) -> Result<(), ConfigError> {
        let mut entries = self.read_all();
        if entries.remove(key).is_some() {
            self.write_all(&entries)?;
        }
        Ok(())
    }

    pub fn dashboard_filters(&self) -> DashboardFilters {
        self.get(DASHBOARD_FILTERS_KEY).unwrap_or_default()
    }

    pub fn save_dashboard_filters(&self, filters: &DashboardFilters) -> Result<(), ConfigError> {
        self.set(DASHBOARD_FILTERS_KEY, filters)
    }

    pub fn theme(&self) -> Theme {
        self.get(THEME_KEY).unwrap_or_default()
    }

    pub fn save_theme(&self, theme: Theme) -> Result<(), ConfigError> {
        self.set(THEME_KEY, &theme)
    }

    fn read_all(&self) -> BTreeMap<String, Value> {
        let data = match fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return BTreeMap::new(),
            Err(err) => {
                tracing::warn!(path = %self.path.display(), error = %err, "preferences unreadable");
                return BTreeMap::new();
            }
        };
        serde_json::from_str(&data).unwrap_or_else(|err| {
            tracing::warn!(path = %self.path.display(), error = %err, "preferences corrupt, using defaults");
            BTreeMap::new()
        })
    }

    fn write_all(&self, entries: &BTreeMap<String, Value>) -> Result<(), ConfigError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(entries)?;
        let tmp = tmp_path(&self.path);
        let mut file = File::create(&tmp)?;
        file.write_all(json.as_bytes())?;
        file.flush()?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl Default for PreferenceStore {
    fn default() -> Self {
        Self::new()
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut tmp = path.to_path_buf();
    let ext = match path.extension().and_then(|ext| ext.to_str()) {
        Some(existing) => format!("{existing}.{TMP_SUFFIX}"),
        None => TMP_SUFFIX.to_string(),
    };
    tmp.set_extension(ext);
    tmp
}
