//! Report projector: a pure function from a [`WipeLogRecord`] to a
//! structured report object and a plain-text document. No I/O, no side
//! effects — everything it needs is already on the record.
//!
//! Grounded in `report_generator.py`'s `generate_wipe_report` /
//! `_generate_smart_table`: the same fixed attribute list drives the
//! before/after SMART comparison, translated from the original's German
//! labels into English since this crate has no other localized text.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::{format_size_human, WipeLogRecord, WipeStatus};

/// `(json key, display label)`, in display order. A row is omitted from
/// the comparison if both snapshots lack the key entirely.
const SMART_COMPARISON_ATTRIBUTES: &[(&str, &str)] = &[
    ("model", "Model"),
    ("serial", "Serial Number"),
    ("smart_status", "SMART Status"),
    ("health_status", "Health Status"),
    ("power_on_hours", "Power-On Hours"),
    ("power_cycle_count", "Power Cycle Count"),
    ("temperature", "Temperature (°C)"),
    ("wear", "Wear"),
    ("read_errors", "Read Errors"),
    ("write_errors", "Write Errors"),
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmartComparisonRow {
    pub label: String,
    pub before: Option<Value>,
    pub after: Option<Value>,
    pub changed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WipeReport {
    pub report_type: &'static str,
    pub id: String,
    pub status: WipeStatus,
    pub device_path: String,
    pub model: String,
    pub serial_number: String,
    pub size_bytes: u64,
    pub size_human: String,
    pub method: String,
    pub passes: u32,
    pub start_time: chrono::DateTime<chrono::Utc>,
    pub end_time: Option<chrono::DateTime<chrono::Utc>>,
    pub duration_seconds: Option<i64>,
    pub verified: bool,
    pub verification_data: Option<Value>,
    /// `true` only for `fast_clear`: the wipe completed and (if requested)
    /// verified its own edge-overwrite, but that is not a cryptographic or
    /// forensic guarantee and must not be read as one.
    pub verification_is_non_cryptographic: bool,
    pub error_message: Option<String>,
    pub smart_comparison: Vec<SmartComparisonRow>,
}

/// Build the structured report. Never fails — every field already lives on
/// `log` or is derived from it.
pub fn build_report(log: &WipeLogRecord) -> WipeReport {
    let verification_is_non_cryptographic = log
        .verification_data
        .as_ref()
        .and_then(|v| v.get("verification_kind"))
        .and_then(|v| v.as_str())
        == Some("non-cryptographic");

    WipeReport {
        report_type: "Disk Wipe Report",
        id: log.id.clone(),
        status: log.status,
        device_path: log.device_path.clone(),
        model: log.model.clone(),
        serial_number: log.serial_number.clone(),
        size_bytes: log.size_bytes,
        size_human: format_size_human(log.size_bytes),
        method: log.method.as_str().to_string(),
        passes: log.passes,
        start_time: log.start_time,
        end_time: log.end_time,
        duration_seconds: log.duration_seconds,
        verified: log.verified,
        verification_data: log.verification_data.clone(),
        verification_is_non_cryptographic,
        error_message: log.error_message.clone(),
        smart_comparison: smart_comparison(
            log.smart_snapshot_before.as_ref(),
            log.smart_snapshot_after.as_ref(),
        ),
    }
}

fn smart_comparison(before: Option<&Value>, after: Option<&Value>) -> Vec<SmartComparisonRow> {
    SMART_COMPARISON_ATTRIBUTES
        .iter()
        .filter_map(|(key, label)| {
            let value_before = before.and_then(|v| v.get(key)).cloned();
            let value_after = after.and_then(|v| v.get(key)).cloned();
            if value_before.is_none() && value_after.is_none() {
                return None;
            }
            let changed = match (&value_before, &value_after) {
                (Some(b), Some(a)) => b != a,
                _ => false,
            };
            Some(SmartComparisonRow {
                label: label.to_string(),
                before: value_before,
                after: value_after,
                changed,
            })
        })
        .collect()
}

/// Render the plain-text document a human operator reads: identity,
/// timing, method, verification, an optional error block, and the SMART
/// comparison table.
pub fn render_text(report: &WipeReport) -> String {
    let mut out = String::new();
    out.push_str(&format!("{}\n", report.report_type));
    out.push_str(&"=".repeat(report.report_type.len()));
    out.push('\n');

    out.push_str("\n-- Identity --\n");
    out.push_str(&format!("Log ID:        {}\n", report.id));
    out.push_str(&format!("Status:        {:?}\n", report.status));
    out.push_str(&format!("Device:        {}\n", report.device_path));
    out.push_str(&format!("Model:         {}\n", report.model));
    out.push_str(&format!("Serial:        {}\n", report.serial_number));
    out.push_str(&format!("Size:          {}\n", report.size_human));

    out.push_str("\n-- Timing --\n");
    out.push_str(&format!("Start:         {}\n", report.start_time.to_rfc3339()));
    out.push_str(&format!(
        "End:           {}\n",
        report
            .end_time
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "n/a".to_string())
    ));
    out.push_str(&format!(
        "Duration:      {}\n",
        report
            .duration_seconds
            .map(|s| format!("{s}s"))
            .unwrap_or_else(|| "n/a".to_string())
    ));

    out.push_str("\n-- Method --\n");
    out.push_str(&format!("Method:        {}\n", report.method));
    out.push_str(&format!("Passes:        {}\n", report.passes));

    out.push_str("\n-- Verification --\n");
    out.push_str(&format!("Verified:      {}\n", report.verified));
    if report.verification_is_non_cryptographic {
        out.push_str(
            "Note:          fast_clear only discards/overwrites edges; this is NOT a\n               cryptographically or forensically verified erasure.\n",
        );
    }
    if let Some(data) = &report.verification_data {
        out.push_str(&format!("Details:       {data}\n"));
    }

    if let Some(error) = &report.error_message {
        out.push_str("\n-- Error --\n");
        out.push_str(&format!("{error}\n"));
    }

    if !report.smart_comparison.is_empty() {
        out.push_str("\n-- SMART comparison (before -> after) --\n");
        for row in &report.smart_comparison {
            let marker = if row.changed { " *" } else { "" };
            out.push_str(&format!(
                "{:<20} {} -> {}{}\n",
                row.label,
                row.before.as_ref().map(|v| v.to_string()).unwrap_or_else(|| "-".to_string()),
                row.after.as_ref().map(|v| v.to_string()).unwrap_or_else(|| "-".to_string()),
                marker
            ));
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::WipeMethod;
    use chrono::Utc;

    fn base_log() -> WipeLogRecord {
        WipeLogRecord {
            id: "log-1".to_string(),
            disk_id: "disk-1".to_string(),
            device_path: "/dev/sdb".to_string(),
            model: "Test Disk".to_string(),
            serial_number: "SERIAL-1".to_string(),
            size_bytes: 1024,
            smart_snapshot_before: Some(serde_json::json!({"smart_status": "PASSED", "temperature": 30})),
            smart_snapshot_after: Some(serde_json::json!({"smart_status": "PASSED", "temperature": 34})),
            method: WipeMethod::Zeros,
            passes: 1,
            status: WipeStatus::Completed,
            start_time: Utc::now(),
            end_time: Some(Utc::now()),
            duration_seconds: Some(12),
            progress_percent: 100.0,
            error_message: None,
            verified: true,
            verification_data: None,
        }
    }

    #[test]
    fn flags_changed_smart_attributes() {
        let log = base_log();
        let report = build_report(&log);
        let temp_row = report
            .smart_comparison
            .iter()
            .find(|r| r.label == "Temperature (°C)")
            .unwrap();
        assert!(temp_row.changed);
        let status_row = report
            .smart_comparison
            .iter()
            .find(|r| r.label == "SMART Status")
            .unwrap();
        assert!(!status_row.changed);
    }

    #[test]
    fn omits_attributes_absent_from_both_snapshots() {
        let log = base_log();
        let report = build_report(&log);
        assert!(!report
            .smart_comparison
            .iter()
            .any(|r| r.label == "Wear"));
    }

    #[test]
    fn annotates_fast_clear_as_non_cryptographic() {
        let mut log = base_log();
        log.method = WipeMethod::FastClear;
        log.verification_data = Some(serde_json::json!({"verification_kind": "non-cryptographic"}));
        let report = build_report(&log);
        assert!(report.verification_is_non_cryptographic);
        let text = render_text(&report);
        assert!(text.contains("NOT a"));
    }

    #[test]
    fn plain_render_includes_error_block_when_failed() {
        let mut log = base_log();
        log.status = WipeStatus::Failed;
        log.verified = false;
        log.error_message = Some("write failed: permission denied".to_string());
        let report = build_report(&log);
        let text = render_text(&report);
        assert!(text.contains("-- Error --"));
        assert!(text.contains("permission denied"));
    }
}
