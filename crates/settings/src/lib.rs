pub mod preferences;

pub use preferences::{
    EditorPreferences, FilePreferences, LoggingPreferences, Preferences, PreferencesError,
    PreferencesStore, SaveFilterPreference,
};
