use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{ReconcileError, Result};

/// Application configuration.
///
/// Every fixed path, row index, label string and marker the processing
/// stages depend on lives here and is passed in explicitly, so tests can run
/// the stages against synthetic layouts. All sections have full defaults
/// matching the production workbook layout; a `config.toml` may override any
/// subset of them.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub cleanup: CleanupConfig,
    pub report: ReportConfig,
    pub roster: RosterConfig,
    pub sheet: SheetConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: 5000 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Primary results folder, served via the download endpoint.
    pub results_dir: PathBuf,
    /// Publicly servable mirror of the results folder.
    pub public_results_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            results_dir: PathBuf::from("results"),
            public_results_dir: PathBuf::from("static/results"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CleanupConfig {
    /// Seconds a result file lives before the janitor removes it.
    pub delay_secs: u64,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self { delay_secs: 60 }
    }
}

/// Section markers of the participation report.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Line prefix that opens the participant section.
    pub participants_marker: String,
    /// Line prefix that opens the next section and ends the participant rows.
    pub activities_marker: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            participants_marker: "2. 참가자".to_string(),
            activities_marker: "3. 모임 내 활동".to_string(),
        }
    }
}

/// Column labels of the roster export.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RosterConfig {
    pub name_column: String,
    pub status_column: String,
    /// Status value that marks a row as present.
    pub present_value: String,
}

impl Default for RosterConfig {
    fn default() -> Self {
        Self {
            name_column: "이름".to_string(),
            status_column: "출석여부".to_string(),
            present_value: "출석".to_string(),
        }
    }
}

/// Layout of the attendance workbook and result naming.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SheetConfig {
    pub sheet_name: String,
    /// Header row holding the name and interim-status labels (1-based).
    pub label_header_row: u32,
    /// Header row holding the three session-timing labels (1-based).
    pub timing_header_row: u32,
    /// First data row (1-based).
    pub data_start_row: u32,
    pub name_label: String,
    pub interim_label: String,
    pub login_label: String,
    pub logout_label: String,
    pub duration_label: String,
    /// Value written into the interim-status cell for present attendees.
    pub present_marker: String,
    /// ARGB/RGB hex of the solid fill applied to changed cells.
    pub highlight_color: String,
    /// Prefix of generated result filenames.
    pub result_prefix: String,
    /// Local offset from UTC, in hours, used for result timestamps.
    pub utc_offset_hours: i64,
}

impl Default for SheetConfig {
    fn default() -> Self {
        Self {
            sheet_name: "출결정보".to_string(),
            label_header_row: 5,
            timing_header_row: 6,
            data_start_row: 7,
            name_label: "성명".to_string(),
            interim_label: "중간출결".to_string(),
            login_label: "접속시작시간".to_string(),
            logout_label: "접속종료시간".to_string(),
            duration_label: "활용시간".to_string(),
            present_marker: "O".to_string(),
            highlight_color: "FFB366".to_string(),
            result_prefix: "updated_".to_string(),
            utc_offset_hours: 9,
        }
    }
}

impl SheetConfig {
    /// Render an instant in the configured local offset as `yyyyMMdd_HHmmss`.
    pub fn local_stamp(&self, now: DateTime<Utc>) -> String {
        self.local_time(now).format("%Y%m%d_%H%M%S").to_string()
    }

    /// Shift an instant into the configured local offset.
    pub fn local_time(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now + Duration::hours(self.utc_offset_hours)
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            ReconcileError::Storage(format!(
                "failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        toml::from_str(&content)
            .map_err(|e| ReconcileError::Format(format!("invalid config file: {e}")))
    }

    /// Load `path` if it exists, otherwise fall back to the defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            debug!("no config file at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }
}
