//! Settings model and persistence.
//!
//! The settings surface owns editing; the engine reads a snapshot and only
//! writes back through the `SetCurrentAsHome` and `ToggleStickyAffordance`
//! commands. Every field has a default so older or partial files load.

use std::path::{Path, PathBuf};

use fs_err as fs;
use serde::{Deserialize, Serialize};

use crate::error::{HomeError, Result};
use crate::types::{FormFactor, HomeDescriptor, NewTabMode, OpeningMode, ViewConfiguration};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HomeSettings {
    pub primary: HomeDescriptor,
    /// Used instead of `primary` on the mobile form factor when set.
    pub mobile: Option<HomeDescriptor>,
    pub open_on_startup: bool,
    pub startup_mode: OpeningMode,
    pub manual_mode: OpeningMode,
    pub new_tab_mode: NewTabMode,
    pub sticky: StickySettings,
    pub view: ViewConfiguration,
    pub post_open_command: Option<String>,
    /// Close the release-notes tab too when replacing the whole layout.
    pub always_hide_release_notes: bool,
}

impl Default for HomeSettings {
    fn default() -> Self {
        Self {
            primary: HomeDescriptor::default(),
            mobile: None,
            open_on_startup: true,
            startup_mode: OpeningMode::ReplaceAll,
            manual_mode: OpeningMode::Retain,
            new_tab_mode: NewTabMode::Never,
            sticky: StickySettings::default(),
            view: ViewConfiguration::default(),
            post_open_command: None,
            always_hide_release_notes: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StickySettings {
    /// Show the persistent home affordance in the tab bar.
    pub enabled: bool,
    /// Pin the home tab, making it the ghost tab.
    pub pin: bool,
    /// Hide the ghost tab's own header.
    pub hide_header: bool,
    /// Affordance click replaces the active tab instead of opening a new one.
    pub replace_active_on_click: bool,
}

impl Default for StickySettings {
    fn default() -> Self {
        Self {
            enabled: false,
            pin: true,
            hide_header: false,
            replace_active_on_click: false,
        }
    }
}

impl HomeSettings {
    /// Descriptor in effect for the given form factor.
    pub fn active_descriptor(&self, form_factor: FormFactor) -> &HomeDescriptor {
        match (form_factor, &self.mobile) {
            (FormFactor::Mobile, Some(mobile)) => mobile,
            _ => &self.primary,
        }
    }

    /// Ghost-tab semantics apply: affordance on, pinning on, stable target.
    pub fn ghost_tabs_enabled(&self, descriptor: &HomeDescriptor) -> bool {
        self.sticky.enabled && self.sticky.pin && descriptor.is_pin_eligible()
    }

    pub fn post_open_command(&self) -> Option<&str> {
        self.post_open_command
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Persistence
// ═══════════════════════════════════════════════════════════════════════════════

/// Location of the settings file.
///
/// Production code uses `SettingsPaths::from_system()`; tests use
/// `SettingsPaths::with_root(temp_dir)`.
#[derive(Debug, Clone)]
pub struct SettingsPaths {
    root: PathBuf,
}

impl SettingsPaths {
    pub fn from_system() -> Result<Self> {
        let config = dirs::config_dir().ok_or(HomeError::SettingsDirNotFound)?;
        Ok(Self {
            root: config.join("home-core"),
        })
    }

    pub fn with_root(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn settings_file(&self) -> PathBuf {
        self.root.join("settings.json")
    }
}

/// Loads settings, returning defaults when the file doesn't exist.
pub fn load_settings(path: &Path) -> Result<HomeSettings> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Ok(HomeSettings::default())
        }
        Err(source) => {
            return Err(HomeError::Io {
                context: "reading settings".to_string(),
                source,
            })
        }
    };

    serde_json::from_str(&content).map_err(|source| HomeError::SettingsMalformed {
        path: path.to_path_buf(),
        source,
    })
}

/// Saves settings atomically (temp file + rename).
pub fn save_settings(path: &Path, settings: &HomeSettings) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| HomeError::Io {
            context: "creating settings directory".to_string(),
            source,
        })?;
    }

    let payload = serde_json::to_vec_pretty(settings).map_err(|source| HomeError::Json {
        context: "serializing settings".to_string(),
        source,
    })?;
    let tmp_path = path.with_extension("tmp");
    fs::write(&tmp_path, payload).map_err(|source| HomeError::Io {
        context: "writing settings".to_string(),
        source,
    })?;
    fs::rename(&tmp_path, path).map_err(|source| HomeError::Io {
        context: "committing settings".to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Period;

    #[test]
    fn test_missing_file_loads_defaults() {
        let temp = tempfile::tempdir().unwrap();
        let paths = SettingsPaths::with_root(temp.path().to_path_buf());
        let settings = load_settings(&paths.settings_file()).unwrap();
        assert_eq!(settings, HomeSettings::default());
    }

    #[test]
    fn test_round_trip_through_disk() {
        let temp = tempfile::tempdir().unwrap();
        let paths = SettingsPaths::with_root(temp.path().join("nested"));
        let settings = HomeSettings {
            primary: HomeDescriptor::RecurringPeriodic(Period::Week),
            new_tab_mode: NewTabMode::Always,
            ..Default::default()
        };

        save_settings(&paths.settings_file(), &settings).unwrap();
        assert_eq!(load_settings(&paths.settings_file()).unwrap(), settings);
        assert!(!paths.settings_file().with_extension("tmp").exists());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("settings.json");
        fs::write(&path, r#"{"manual_mode":"replace_last","sticky":{"enabled":true}}"#).unwrap();

        let settings = load_settings(&path).unwrap();
        assert_eq!(settings.manual_mode, OpeningMode::ReplaceLast);
        assert!(settings.sticky.enabled);
        assert!(settings.sticky.pin);
        assert_eq!(settings.startup_mode, OpeningMode::ReplaceAll);
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("settings.json");
        fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            load_settings(&path),
            Err(HomeError::SettingsMalformed { .. })
        ));
    }

    #[test]
    fn test_mobile_descriptor_only_on_mobile() {
        let settings = HomeSettings {
            mobile: Some(HomeDescriptor::GraphView),
            ..Default::default()
        };
        assert_eq!(settings.active_descriptor(FormFactor::Mobile), &HomeDescriptor::GraphView);
        assert_eq!(settings.active_descriptor(FormFactor::Desktop), &settings.primary);
    }

    #[test]
    fn test_blank_post_open_command_is_ignored() {
        let settings = HomeSettings {
            post_open_command: Some("  ".into()),
            ..Default::default()
        };
        assert_eq!(settings.post_open_command(), None);
    }
}
