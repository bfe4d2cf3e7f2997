use std::collections::HashMap;
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};
use umya_spreadsheet::{reader, writer, Spreadsheet, Worksheet};

use crate::config::{SheetConfig, StorageConfig};
use crate::error::{ReconcileError, Result};
use crate::types::{AttendanceSet, Participant, UpdateCounters};

/// Physical column indices resolved from the workbook header rows.
///
/// The name and interim-status columns are mandatory; each timing column is
/// optional and its updates are simply skipped when the workbook does not
/// carry it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMap {
    pub name: u32,
    pub interim: u32,
    pub login: Option<u32>,
    pub logout: Option<u32>,
    pub duration: Option<u32>,
}

/// Scan one header row for the given labels.
///
/// Returns the 1-based column index of each label that was found (first
/// occurrence wins) together with the labels that were not present.
pub fn locate_columns(
    sheet: &Worksheet,
    row: u32,
    labels: &[&str],
) -> (HashMap<String, u32>, Vec<String>) {
    let (max_col, _) = sheet.get_highest_column_and_row();
    let mut found: HashMap<String, u32> = HashMap::new();
    for col in 1..=max_col {
        let value = sheet.get_value((col, row));
        if labels.contains(&value.as_str()) {
            found.entry(value).or_insert(col);
        }
    }
    let missing = labels
        .iter()
        .filter(|label| !found.contains_key(**label))
        .map(|label| label.to_string())
        .collect();
    (found, missing)
}

impl ColumnMap {
    /// Resolve the logical columns from the two fixed header rows.
    pub fn resolve(sheet: &Worksheet, config: &SheetConfig) -> Result<Self> {
        let (timing, missing_timing) = locate_columns(
            sheet,
            config.timing_header_row,
            &[
                config.login_label.as_str(),
                config.logout_label.as_str(),
                config.duration_label.as_str(),
            ],
        );
        if !missing_timing.is_empty() {
            warn!(
                "timing column(s) absent, their updates will be skipped: {}",
                missing_timing.join(", ")
            );
        }

        let (keys, missing_keys) = locate_columns(
            sheet,
            config.label_header_row,
            &[config.name_label.as_str(), config.interim_label.as_str()],
        );
        if !missing_keys.is_empty() {
            return Err(ReconcileError::Layout(format!(
                "required columns not found: {}",
                missing_keys.join(", ")
            )));
        }

        Ok(ColumnMap {
            name: keys[&config.name_label],
            interim: keys[&config.interim_label],
            login: timing.get(&config.login_label).copied(),
            logout: timing.get(&config.logout_label).copied(),
            duration: timing.get(&config.duration_label).copied(),
        })
    }
}

/// Write `value` into the cell if it differs from what is already there,
/// highlighting the cell on change. Returns whether the cell was touched.
fn update_cell(sheet: &mut Worksheet, col: u32, row: u32, value: &str, highlight: &str) -> bool {
    let current = sheet.get_value((col, row));
    if current == value {
        return false;
    }
    sheet.get_cell_mut((col, row)).set_value_string(value);
    sheet
        .get_style_mut((col, row))
        .set_background_color(highlight);
    true
}

/// Merge the attendance set and the participant records into the sheet.
///
/// For every data row with a non-empty name cell:
/// - names in the attendance set get the present marker in the
///   interim-status column, unless it is already there;
/// - the first participant record whose trimmed name equals the trimmed row
///   name supplies the three timing cells (first-match-wins; the roster side
///   is deliberately last-row-wins, see `parse_roster`).
///
/// Each touched cell receives the solid highlight fill; untouched cells and
/// all other styling are left exactly as loaded.
pub fn merge(
    sheet: &mut Worksheet,
    config: &SheetConfig,
    columns: &ColumnMap,
    attendance: &AttendanceSet,
    participants: &[Participant],
) -> UpdateCounters {
    let mut updates = UpdateCounters::default();
    let (_, max_row) = sheet.get_highest_column_and_row();

    for row in config.data_start_row..=max_row {
        let name = sheet.get_value((columns.name, row));
        if name.is_empty() {
            continue;
        }

        if attendance.contains_key(&name) {
            let marked = update_cell(
                sheet,
                columns.interim,
                row,
                &config.present_marker,
                &config.highlight_color,
            );
            if marked {
                updates.attendance += 1;
            }
        }

        let record = participants
            .iter()
            .find(|p| p.name.trim() == name.trim());
        if let Some(participant) = record {
            if let Some(col) = columns.login {
                if update_cell(sheet, col, row, &participant.first_join, &config.highlight_color) {
                    updates.login_time += 1;
                }
            }
            if let Some(col) = columns.logout {
                if update_cell(sheet, col, row, &participant.last_leave, &config.highlight_color) {
                    updates.logout_time += 1;
                }
            }
            if let Some(col) = columns.duration {
                if update_cell(sheet, col, row, &participant.duration, &config.highlight_color) {
                    updates.duration += 1;
                }
            }
        }
    }

    updates
}

/// Result of one workbook reconciliation.
#[derive(Debug, Clone, Serialize)]
pub struct ReconcileOutcome {
    pub updates: UpdateCounters,
    pub result_filename: String,
    pub result_path: PathBuf,
    pub mirror_path: PathBuf,
}

/// Load the uploaded workbook, merge the two attendance sources into it and
/// save the result to the primary results folder and the public mirror.
///
/// The result filename is the configured prefix, the processing instant
/// rendered in the configured local offset, and the original filename. The
/// caller supplies `now` so the stage itself is clock-free.
///
/// Saving is not transactional: a failure between the two writes leaves the
/// primary copy in place.
pub fn reconcile_workbook(
    storage: &StorageConfig,
    config: &SheetConfig,
    workbook_bytes: &[u8],
    original_filename: &str,
    attendance: &AttendanceSet,
    participants: &[Participant],
    now: DateTime<Utc>,
) -> Result<ReconcileOutcome> {
    let mut book: Spreadsheet = reader::xlsx::read_reader(Cursor::new(workbook_bytes), true)
        .map_err(|e| ReconcileError::Storage(format!("failed to load workbook: {e}")))?;

    let updates = {
        let sheet = book
            .get_sheet_by_name_mut(&config.sheet_name)
            .ok_or_else(|| {
                ReconcileError::Layout(format!(
                    "sheet '{}' not found in workbook",
                    config.sheet_name
                ))
            })?;
        let columns = ColumnMap::resolve(sheet, config)?;
        merge(sheet, config, &columns, attendance, participants)
    };

    let basename = Path::new(original_filename)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "workbook.xlsx".to_string());
    let result_filename = format!(
        "{}{}_{}",
        config.result_prefix,
        config.local_stamp(now),
        basename
    );

    fs::create_dir_all(&storage.results_dir)?;
    fs::create_dir_all(&storage.public_results_dir)?;
    let result_path = storage.results_dir.join(&result_filename);
    let mirror_path = storage.public_results_dir.join(&result_filename);

    writer::xlsx::write(&book, &result_path).map_err(|e| {
        ReconcileError::Storage(format!(
            "failed to save result '{}': {}",
            result_path.display(),
            e
        ))
    })?;
    writer::xlsx::write(&book, &mirror_path).map_err(|e| {
        ReconcileError::Storage(format!(
            "failed to save mirror '{}': {}",
            mirror_path.display(),
            e
        ))
    })?;

    info!(
        "reconciled workbook: {} cell(s) changed, saved as {}",
        updates.total(),
        result_filename
    );

    Ok(ReconcileOutcome {
        updates,
        result_filename,
        result_path,
        mirror_path,
    })
}
