use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One attendee line from the participation report.
///
/// Fields are kept as the raw text of the export; timestamps are never
/// reinterpreted, only copied into the workbook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub name: String,
    pub first_join: String,
    pub last_leave: String,
    pub duration: String,
}

/// Names marked present in the roster, keyed by the human-entered name.
///
/// Mapping semantics: when the roster lists the same name twice, the later
/// row wins.
pub type AttendanceSet = HashMap<String, String>;

/// Cells actually mutated during a merge, partitioned by category.
///
/// A counter only moves when the written value differs from what the cell
/// already held, so re-running a merge on its own output yields all zeros.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateCounters {
    pub attendance: usize,
    pub login_time: usize,
    pub logout_time: usize,
    pub duration: usize,
}

impl UpdateCounters {
    pub fn total(&self) -> usize {
        self.attendance + self.login_time + self.logout_time + self.duration
    }
}
