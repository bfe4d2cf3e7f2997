use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;

use crate::config::AppConfig;
use crate::error::{ReconcileError, Result};
use crate::reconciler;
use crate::report;
use crate::roster;
use crate::types::UpdateCounters;

/// One uploaded submission: the three artifacts as raw bytes.
#[derive(Debug)]
pub struct SubmissionParams {
    pub report_bytes: Vec<u8>,
    pub roster_bytes: Vec<u8>,
    pub workbook_bytes: Vec<u8>,
    /// Original filename of the uploaded workbook, kept in the result name.
    pub workbook_filename: String,
}

/// Outcome of a processed submission, returned over the HTTP boundary.
#[derive(Debug, Clone, Serialize)]
pub struct SubmissionSummary {
    pub updates: UpdateCounters,
    pub participants_parsed: usize,
    pub present_names: usize,
    pub result_filename: String,
    pub result_path: PathBuf,
    pub mirror_path: PathBuf,
}

/// Run the three conversion stages and the merge for one submission.
///
/// Stage order: roster, then report, then reconcile. A report from which no
/// participant could be extracted aborts the submission before the workbook
/// is touched. All entities built here are request-scoped; nothing persists
/// past the returned summary except the two result files.
pub fn run_submission(
    config: &AppConfig,
    params: &SubmissionParams,
    now: DateTime<Utc>,
) -> Result<SubmissionSummary> {
    let attendance = roster::parse_roster(&config.roster, &params.roster_bytes)?;
    let participants = report::parse_report(&config.report, &params.report_bytes)?;
    if participants.is_empty() {
        return Err(ReconcileError::Format(
            "no participant records found in report".to_string(),
        ));
    }

    let outcome = reconciler::reconcile_workbook(
        &config.storage,
        &config.sheet,
        &params.workbook_bytes,
        &params.workbook_filename,
        &attendance,
        &participants,
        now,
    )?;

    info!(
        "submission done: {} participant(s), {} present, {} cell(s) updated",
        participants.len(),
        attendance.len(),
        outcome.updates.total()
    );

    Ok(SubmissionSummary {
        updates: outcome.updates,
        participants_parsed: participants.len(),
        present_names: attendance.len(),
        result_filename: outcome.result_filename,
        result_path: outcome.result_path,
        mirror_path: outcome.mirror_path,
    })
}
