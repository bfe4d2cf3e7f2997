use csv::ReaderBuilder;
use tracing::info;

use crate::config::RosterConfig;
use crate::error::{ReconcileError, Result};
use crate::types::AttendanceSet;

/// Build the set of present names from a roster export.
///
/// The roster is a UTF-8 CSV with a header row; only the configured name and
/// status columns matter. Rows whose status exactly equals the presence
/// sentinel are kept; everything else is ignored. When a name appears on
/// several present rows the later row wins.
///
/// Note the encoding asymmetry with the participation report: the report is
/// UTF-16LE, the roster plain UTF-8. Both exports really arrive that way.
pub fn parse_roster(config: &RosterConfig, bytes: &[u8]) -> Result<AttendanceSet> {
    let mut reader = ReaderBuilder::new().flexible(true).from_reader(bytes);

    let headers = reader
        .headers()
        .map_err(|e| ReconcileError::Format(format!("unreadable roster header: {e}")))?
        .clone();
    let name_idx = headers.iter().position(|h| h == config.name_column);
    let status_idx = headers.iter().position(|h| h == config.status_column);
    let (name_idx, status_idx) = match (name_idx, status_idx) {
        (Some(n), Some(s)) => (n, s),
        _ => {
            return Err(ReconcileError::Format(format!(
                "roster is missing the '{}' or '{}' column",
                config.name_column, config.status_column
            )))
        }
    };

    let mut present = AttendanceSet::new();
    for record in reader.records() {
        let record =
            record.map_err(|e| ReconcileError::Format(format!("unreadable roster row: {e}")))?;
        let name = match record.get(name_idx) {
            Some(v) => v,
            None => continue,
        };
        let status = match record.get(status_idx) {
            Some(v) => v,
            None => continue,
        };
        if status == config.present_value {
            present.insert(name.to_string(), status.to_string());
        }
    }

    info!("roster lists {} name(s) as present", present.len());
    Ok(present)
}
