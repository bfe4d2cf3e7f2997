use encoding_rs::UTF_16LE;
use tracing::{debug, info};

use crate::config::ReportConfig;
use crate::error::{ReconcileError, Result};
use crate::types::Participant;

/// A data row must at least carry name, first join, last leave and duration.
const MIN_FIELDS: usize = 4;

/// Extract attendee session records from a participation report export.
///
/// The export is UTF-16LE text split into numbered sections. The participant
/// section opens with a line starting with the configured marker; the line
/// after it is a tab-delimited header, and every following non-blank line up
/// to the activity-section marker (or end of input) is one attendee row.
///
/// The header labels are logged but never used for field alignment: the
/// first four fields of each row are taken positionally. Rows with fewer
/// than four fields are dropped silently. Duplicate names are kept in source
/// order; pairing them against the workbook happens in the merge stage.
pub fn parse_report(config: &ReportConfig, bytes: &[u8]) -> Result<Vec<Participant>> {
    let (text, _, had_errors) = UTF_16LE.decode(bytes);
    if had_errors {
        return Err(ReconcileError::Format(
            "participation report is not valid UTF-16LE text".to_string(),
        ));
    }

    let lines: Vec<&str> = text.lines().collect();
    let section_start = lines
        .iter()
        .position(|line| line.starts_with(&config.participants_marker))
        .ok_or_else(|| {
            ReconcileError::Format(format!(
                "participant section '{}' not found in report",
                config.participants_marker
            ))
        })?;

    if let Some(header) = lines.get(section_start + 1) {
        debug!("report participant header: {}", header);
    }

    let mut participants = Vec::new();
    for line in lines.iter().skip(section_start + 2) {
        if line.starts_with(&config.activities_marker) {
            break;
        }
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < MIN_FIELDS {
            debug!("dropping report row with {} field(s)", fields.len());
            continue;
        }
        participants.push(Participant {
            name: fields[0].to_string(),
            first_join: fields[1].to_string(),
            last_leave: fields[2].to_string(),
            duration: fields[3].to_string(),
        });
    }

    info!("parsed {} participant record(s) from report", participants.len());
    Ok(participants)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utf16le(text: &str) -> Vec<u8> {
        text.encode_utf16().flat_map(|u| u.to_le_bytes()).collect()
    }

    fn sample_report() -> Vec<u8> {
        utf16le(
            "1. 요약\n\
             모임 제목\t주간 수업\n\
             \n\
             2. 참가자\n\
             이름\t처음 들어온 시간\t마지막 나간 시간\t모임 참여 시간\n\
             김철수\t09:00:00\t10:00:00\t1:00:00\n\
             이영희\t09:05:12\t09:55:40\t0:50:28\n\
             \n\
             3. 모임 내 활동\n\
             활동\t시작\t종료\n",
        )
    }

    #[test]
    fn parses_participant_section() {
        let config = ReportConfig::default();
        let participants = parse_report(&config, &sample_report()).unwrap();
        assert_eq!(participants.len(), 2);
        assert_eq!(
            participants[0],
            Participant {
                name: "김철수".to_string(),
                first_join: "09:00:00".to_string(),
                last_leave: "10:00:00".to_string(),
                duration: "1:00:00".to_string(),
            }
        );
        assert_eq!(participants[1].name, "이영희");
    }

    #[test]
    fn stops_at_activity_section() {
        let config = ReportConfig::default();
        let participants = parse_report(&config, &sample_report()).unwrap();
        assert!(participants.iter().all(|p| p.name != "활동"));
    }

    #[test]
    fn tolerates_missing_activity_section() {
        let config = ReportConfig::default();
        let bytes = utf16le("2. 참가자\n이름\t들어옴\t나감\t참여\n김철수\t1\t2\t3\n");
        let participants = parse_report(&config, &bytes).unwrap();
        assert_eq!(participants.len(), 1);
    }

    #[test]
    fn missing_section_is_a_format_error() {
        let config = ReportConfig::default();
        let bytes = utf16le("1. 요약\n아무 내용\n");
        let err = parse_report(&config, &bytes).unwrap_err();
        assert!(matches!(err, ReconcileError::Format(_)));
    }

    #[test]
    fn short_rows_are_dropped_silently() {
        let config = ReportConfig::default();
        let bytes = utf16le(
            "2. 참가자\n헤더\n김철수\t09:00:00\t10:00:00\t1:00:00\n박민수\t09:10:00\n",
        );
        let participants = parse_report(&config, &bytes).unwrap();
        assert_eq!(participants.len(), 1);
        assert_eq!(participants[0].name, "김철수");
    }

    #[test]
    fn blank_lines_are_skipped() {
        let config = ReportConfig::default();
        let bytes = utf16le("2. 참가자\n헤더\n\n  \n김철수\ta\tb\tc\n");
        let participants = parse_report(&config, &bytes).unwrap();
        assert_eq!(participants.len(), 1);
    }

    #[test]
    fn duplicates_are_kept_in_source_order() {
        let config = ReportConfig::default();
        let bytes = utf16le(
            "2. 참가자\n헤더\n김철수\t09:00\t09:30\t0:30\n김철수\t09:40\t10:00\t0:20\n",
        );
        let participants = parse_report(&config, &bytes).unwrap();
        assert_eq!(participants.len(), 2);
        assert_eq!(participants[0].first_join, "09:00");
        assert_eq!(participants[1].first_join, "09:40");
    }

    #[test]
    fn parsing_is_idempotent_over_identical_bytes() {
        let config = ReportConfig::default();
        let bytes = sample_report();
        let first = parse_report(&config, &bytes).unwrap();
        let second = parse_report(&config, &bytes).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn leading_bom_is_tolerated() {
        let config = ReportConfig::default();
        let mut bytes = vec![0xFF, 0xFE];
        bytes.extend(utf16le("2. 참가자\n헤더\n김철수\ta\tb\tc\n"));
        let participants = parse_report(&config, &bytes).unwrap();
        assert_eq!(participants.len(), 1);
    }

    #[test]
    fn non_utf16_bytes_are_a_format_error() {
        let config = ReportConfig::default();
        // Odd byte count cannot be UTF-16.
        let err = parse_report(&config, &[0x41, 0x00, 0x42]).unwrap_err();
        assert!(matches!(err, ReconcileError::Format(_)));
    }
}
