//! Player settings
//!
//! Handles loading/saving of the player's XML settings file.

use quick_xml::de::from_str;
use quick_xml::se::to_string;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::telemetry::LogConfig;

/// Settings for the AV1 player
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename = "Av1PlayerSettings")]
pub struct PlayerSettings {
    /// Candidate locations of the dav1dfile library, tried in order.
    /// Empty means the platform's default library names.
    #[serde(rename = "libraryPath", default)]
    pub library_paths: Vec<String>,

    /// Frames the decoder advances per displayed frame (>= 1)
    #[serde(rename = "framesPerTick", default = "default_frames_per_tick")]
    pub frames_per_tick: i32,

    /// Rewind to the first frame once the stream is exhausted
    #[serde(rename = "loopPlayback", default)]
    pub loop_playback: bool,

    /// Default log filter when no environment override is set
    #[serde(rename = "logLevel", default = "default_log_level")]
    pub log_level: String,
}

fn default_frames_per_tick() -> i32 {
    1
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            library_paths: Vec::new(),
            frames_per_tick: default_frames_per_tick(),
            loop_playback: false,
            log_level: default_log_level(),
        }
    }
}

impl PlayerSettings {
    /// Keep the per-tick frame advance positive
    pub fn clamp_frames_per_tick(&mut self) {
        self.frames_per_tick = self.frames_per_tick.max(1);
    }

    /// Library paths as filesystem paths
    pub fn library_paths(&self) -> Vec<PathBuf> {
        self.library_paths.iter().map(PathBuf::from).collect()
    }

    /// Logging configuration derived from these settings
    pub fn log_config(&self) -> LogConfig {
        LogConfig {
            default_level: self.log_level.clone(),
            ..LogConfig::default()
        }
    }

    /// Parse settings from XML text
    pub fn from_xml(xml: &str) -> Result<Self, SettingsError> {
        let mut settings: Self = from_str(xml).map_err(SettingsError::XmlParse)?;
        settings.clamp_frames_per_tick();
        Ok(settings)
    }

    /// Load settings from an XML file
    pub fn load_from_file(path: &Path) -> Result<Self, SettingsError> {
        let contents = fs::read_to_string(path).map_err(SettingsError::Io)?;
        Self::from_xml(&contents)
    }

    /// Save settings to an XML file
    pub fn save_to_file(&self, path: &Path) -> Result<(), SettingsError> {
        let xml = to_string(self).map_err(SettingsError::XmlWrite)?;
        let formatted = format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n{}", xml);

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(SettingsError::Io)?;
        }
        fs::write(path, formatted).map_err(SettingsError::Io)?;
        Ok(())
    }

    /// Default settings file location
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|mut p| {
            p.push("Av1Player");
            p.push("settings.xml");
            p
        })
    }

    /// Load from the default location, falling back to defaults
    pub fn load() -> Self {
        let Some(path) = Self::default_path() else {
            return Self::default();
        };

        if !path.exists() {
            return Self::default();
        }

        match Self::load_from_file(&path) {
            Ok(settings) => settings,
            Err(e) => {
                tracing::warn!("Ignoring unreadable settings at {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Save to the default location
    pub fn save(&self) -> Result<(), SettingsError> {
        let path = Self::default_path().ok_or(SettingsError::NoConfigDir)?;
        self.save_to_file(&path)
    }
}

/// Settings-related errors
#[derive(Debug)]
pub enum SettingsError {
    Io(std::io::Error),
    XmlParse(quick_xml::DeError),
    XmlWrite(quick_xml::SeError),
    NoConfigDir,
}

impl std::fmt::Display for SettingsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SettingsError::Io(e) => write!(f, "IO error: {}", e),
            SettingsError::XmlParse(e) => write!(f, "XML parse error: {}", e),
            SettingsError::XmlWrite(e) => write!(f, "XML write error: {}", e),
            SettingsError::NoConfigDir => write!(f, "Could not find config directory"),
        }
    }
}

impl std::error::Error for SettingsError {}
