use crate::summary::ExtractionSummary;

/// Format a run summary as JSON.
pub fn format_summary(summary: &ExtractionSummary, compact: bool) -> serde_json::Result<String> {
    if compact {
        serde_json::to_string(summary)
    } else {
        serde_json::to_string_pretty(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::summary::tests::sample_summary;

    #[test]
    fn test_format_summary_valid_json() {
        let json = format_summary(&sample_summary(false, true), false).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).expect("should be valid JSON");
        assert_eq!(parsed["files"]["execution"], 3);
        assert_eq!(parsed["files"]["solution"], 2);
        assert_eq!(parsed["diagnostics"], 4);
        assert_eq!(parsed["interrupted"], false);
        assert_eq!(parsed["started_at"], "2024-05-01T12:00:00Z");
        assert_eq!(parsed["records"]["attempts"], 0);
        assert!(parsed["failures"][0]["reason"]
            .as_str()
            .unwrap()
            .contains("not of the form"));
    }

    #[test]
    fn test_format_summary_compact_is_single_line() {
        let json = format_summary(&sample_summary(true, false), true).unwrap();
        assert!(!json.contains('\n'), "compact JSON should be single line");
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["interrupted"], true);
    }

    #[test]
    fn test_format_summary_pretty_is_multiline() {
        let json = format_summary(&sample_summary(false, false), false).unwrap();
        assert!(json.contains('\n'));
    }
}
