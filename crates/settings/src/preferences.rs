use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

const PREFERENCES_VERSION: u32 = 1;
const MIN_DEBOUNCE_MS: u64 = 50;
const MAX_DEBOUNCE_MS: u64 = 10_000;

#[derive(Debug, Error)]
pub enum PreferencesError {
    #[error("failed to read preferences {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse preferences {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to serialize preferences {path}: {source}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to write preferences {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to prepare directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// User preferences for the editing session.
/// 編輯工作階段的使用者偏好設定。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub editor: EditorPreferences,
    #[serde(default)]
    pub files: FilePreferences,
    #[serde(default)]
    pub logging: LoggingPreferences,
}

fn default_version() -> u32 {
    PREFERENCES_VERSION
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            version: PREFERENCES_VERSION,
            editor: EditorPreferences::default(),
            files: FilePreferences::default(),
            logging: LoggingPreferences::default(),
        }
    }
}

impl Preferences {
    pub fn sanitize(&mut self) {
        if self.version == 0 {
            self.version = PREFERENCES_VERSION;
        }
        self.editor.sanitize();
        self.files.sanitize();
        self.logging.sanitize();
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditorPreferences {
    #[serde(default = "default_debounce_ms")]
    pub dirty_check_debounce_ms: u64,
    #[serde(default = "default_true")]
    pub watch_active_file: bool,
}

fn default_true() -> bool {
    true
}

fn default_debounce_ms() -> u64 {
    500
}

impl Default for EditorPreferences {
    fn default() -> Self {
        Self {
            dirty_check_debounce_ms: default_debounce_ms(),
            watch_active_file: true,
        }
    }
}

impl EditorPreferences {
    /// Debounce interval as a [`Duration`].
    /// 防抖間隔。
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.dirty_check_debounce_ms)
    }

    fn sanitize(&mut self) {
        self.dirty_check_debounce_ms = self
            .dirty_check_debounce_ms
            .clamp(MIN_DEBOUNCE_MS, MAX_DEBOUNCE_MS);
    }
}

/// One entry of the save dialog's filter list.
/// 儲存對話框的檔案類型篩選。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveFilterPreference {
    pub name: String,
    #[serde(default)]
    pub extensions: Vec<String>,
}

impl SaveFilterPreference {
    fn new(name: &str, extensions: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            extensions: extensions.iter().map(|ext| ext.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilePreferences {
    #[serde(default = "default_save_name")]
    pub default_save_name: String,
    #[serde(default = "default_save_filters")]
    pub save_filters: Vec<SaveFilterPreference>,
}

fn default_save_name() -> String {
    "untitled".to_string()
}

fn default_save_filters() -> Vec<SaveFilterPreference> {
    vec![
        SaveFilterPreference::new("Markdown", &["md", "markdown"]),
        SaveFilterPreference::new("Text File", &["txt"]),
    ]
}

impl Default for FilePreferences {
    fn default() -> Self {
        Self {
            default_save_name: default_save_name(),
            save_filters: default_save_filters(),
        }
    }
}

impl FilePreferences {
    fn sanitize(&mut self) {
        if self.default_save_name.trim().is_empty() {
            self.default_save_name = default_save_name();
        }
        for filter in &mut self.save_filters {
            filter.extensions.retain(|ext| !ext.trim().is_empty());
            for ext in &mut filter.extensions {
                *ext = ext.trim().trim_start_matches('.').to_string();
            }
        }
        self.save_filters
            .retain(|filter| !filter.name.trim().is_empty() && !filter.extensions.is_empty());
        if self.save_filters.is_empty() {
            self.save_filters = default_save_filters();
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingPreferences {
    /// `env_logger` filter used when `RUST_LOG` is unset.
    #[serde(default = "default_filter")]
    pub filter: String,
}

fn default_filter() -> String {
    "info".to_string()
}

impl Default for LoggingPreferences {
    fn default() -> Self {
        Self {
            filter: default_filter(),
        }
    }
}

impl LoggingPreferences {
    fn sanitize(&mut self) {
        if self.filter.trim().is_empty() {
            self.filter = default_filter();
        }
    }
}

#[derive(Debug)]
pub struct PreferencesStore {
    path: PathBuf,
    data: Preferences,
}

impl PreferencesStore {
    pub fn new(path: impl Into<PathBuf>, preferences: Preferences) -> Self {
        Self {
            path: path.into(),
            data: preferences,
        }
    }

    /// Loads preferences, falling back to defaults when the file is absent.
    /// 載入偏好設定；檔案不存在時使用預設值。
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PreferencesError> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            debug!("no preferences at {}; using defaults", path.display());
            let mut data = Preferences::default();
            data.sanitize();
            return Ok(Self { path, data });
        }

        let contents = fs::read_to_string(&path).map_err(|source| PreferencesError::Read {
            path: path.clone(),
            source,
        })?;
        let mut data: Preferences =
            serde_json::from_str(&contents).map_err(|source| PreferencesError::Parse {
                path: path.clone(),
                source,
            })?;
        let before = data.clone();
        data.sanitize();
        if data != before {
            warn!("preferences {} contained out-of-range values", path.display());
        }
        Ok(Self { path, data })
    }

    pub fn preferences(&self) -> &Preferences {
        &self.data
    }

    pub fn update<F>(&mut self, mut op: F) -> Result<(), PreferencesError>
    where
        F: FnMut(&mut Preferences),
    {
        op(&mut self.data);
        self.data.sanitize();
        self.save()
    }

    pub fn save(&self) -> Result<(), PreferencesError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| PreferencesError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let payload = serde_json::to_string_pretty(&self.data).map_err(|source| {
            PreferencesError::Serialize {
                path: self.path.clone(),
                source,
            }
        })?;

        let tmp_path = self.path.with_extension("tmp");
        fs::write(&tmp_path, payload.as_bytes()).map_err(|source| PreferencesError::Write {
            path: tmp_path.clone(),
            source,
        })?;
        fs::rename(&tmp_path, &self.path).map_err(|source| PreferencesError::Write {
            path: self.path.clone(),
            source,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debounce_is_clamped() {
        let mut prefs = Preferences::default();
        prefs.editor.dirty_check_debounce_ms = 1;
        prefs.sanitize();
        assert_eq!(prefs.editor.debounce(), Duration::from_millis(50));

        prefs.editor.dirty_check_debounce_ms = 60_000;
        prefs.sanitize();
        assert_eq!(prefs.editor.dirty_check_debounce_ms, 10_000);
    }

    #[test]
    fn empty_filters_fall_back_to_defaults() {
        let mut prefs = Preferences::default();
        prefs.files.save_filters = vec![SaveFilterPreference {
            name: "Nothing".into(),
            extensions: vec!["  ".into()],
        }];
        prefs.sanitize();
        assert_eq!(prefs.files.save_filters, default_save_filters());
    }

    #[test]
    fn leading_dots_are_stripped_from_extensions() {
        let mut prefs = Preferences::default();
        prefs.files.save_filters = vec![SaveFilterPreference {
            name: "Rust".into(),
            extensions: vec![".rs".into()],
        }];
        prefs.sanitize();
        assert_eq!(prefs.files.save_filters[0].extensions, vec!["rs"]);
    }
}
