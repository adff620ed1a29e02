use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A physically distinct disk ever seen by the inventory service.
///
/// `serial_number` is the identity key across scans; `device_path` is
/// advisory and may move between reboots (a USB enclosure re-enumerating,
/// a SATA controller renumbering ports, ...).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub id: String,
    pub serial_number: String,
    pub device_path: String,
    pub model: String,
    pub size_bytes: u64,
    pub size_human: String,
    /// Last-observed classification. Advisory only — the boot-disk guard
    /// always re-derives this from the platform probe before a destructive
    /// write; this field is never trusted on its own.
    pub is_boot_disk: bool,
    pub smart_status: SmartStatus,
    pub smart_snapshot: Option<Value>,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

impl DeviceRecord {
    /// True if `serial_number` is a synthetic identifier derived from the
    /// device path because the platform could not report a real serial.
    pub fn has_synthetic_serial(&self) -> bool {
        self.serial_number.starts_with("UNKNOWN_")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SmartStatus {
    Passed,
    Failed,
    Unknown,
}

impl Default for SmartStatus {
    fn default() -> Self {
        SmartStatus::Unknown
    }
}

/// Overwrite strategy for a wipe. `Ones` is internal-only: the request
/// coordinator never accepts it directly, but `Dod` dispatches through it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WipeMethod {
    Zeros,
    Ones,
    Random,
    Dod,
    Bsi,
    FastClear,
}

impl WipeMethod {
    /// Methods a caller may name in a destructive command. `Ones` is
    /// deliberately absent: it only appears as a `Dod` sub-pass.
    pub fn parse_external(s: &str) -> Option<Self> {
        match s {
            "zeros" => Some(WipeMethod::Zeros),
            "random" => Some(WipeMethod::Random),
            "dod" => Some(WipeMethod::Dod),
            "bsi" => Some(WipeMethod::Bsi),
            "fast_clear" => Some(WipeMethod::FastClear),
            _ => None,
        }
    }

    /// Whether this method ignores a caller-supplied pass count and picks
    /// its own (dod: 3 fixed passes, bsi: device-class-dependent, fast_clear: n/a).
    pub fn ignores_passes(&self) -> bool {
        matches!(self, WipeMethod::Dod | WipeMethod::Bsi | WipeMethod::FastClear)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WipeMethod::Zeros => "zeros",
            WipeMethod::Ones => "ones",
            WipeMethod::Random => "random",
            WipeMethod::Dod => "dod",
            WipeMethod::Bsi => "bsi",
            WipeMethod::FastClear => "fast_clear",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WipeStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl WipeStatus {
    /// Legal forward transitions. No regressions, ever.
    pub fn can_transition_to(self, next: WipeStatus) -> bool {
        matches!(
            (self, next),
            (WipeStatus::Pending, WipeStatus::InProgress)
                | (WipeStatus::InProgress, WipeStatus::Completed)
                | (WipeStatus::InProgress, WipeStatus::Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, WipeStatus::Completed | WipeStatus::Failed)
    }
}

/// One wipe attempt, append-only once it reaches a terminal status.
///
/// Identity fields (`device_path`, `model`, `serial_number`, `size_bytes`)
/// are frozen copies taken from the device record at start time, so a log
/// remains meaningful even if the device is later reassigned a different path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WipeLogRecord {
    pub id: String,
    pub disk_id: String,

    pub device_path: String,
    pub model: String,
    pub serial_number: String,
    pub size_bytes: u64,

    pub smart_snapshot_before: Option<Value>,
    pub smart_snapshot_after: Option<Value>,

    pub method: WipeMethod,
    pub passes: u32,

    pub status: WipeStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration_seconds: Option<i64>,

    pub progress_percent: f64,
    pub error_message: Option<String>,

    pub verified: bool,
    pub verification_data: Option<Value>,
}

impl WipeLogRecord {
    /// Check the invariants §3 pins to this record. Used by persistence-port
    /// implementations and tests; the engine itself only ever produces
    /// records that already satisfy these by construction.
    pub fn check_invariants(&self) -> std::result::Result<(), &'static str> {
        match self.status {
            WipeStatus::Completed => {
                if self.end_time.is_none() {
                    return Err("completed record missing end_time");
                }
                if (self.progress_percent - 100.0).abs() > f64::EPSILON {
                    return Err("completed record progress_percent != 100");
                }
                if self.error_message.is_some() {
                    return Err("completed record carries an error_message");
                }
            }
            WipeStatus::Failed => {
                if self.end_time.is_none() {
                    return Err("failed record missing end_time");
                }
                if self.error_message.is_none() {
                    return Err("failed record missing error_message");
                }
            }
            WipeStatus::Pending | WipeStatus::InProgress => {
                if self.end_time.is_some() {
                    return Err("non-terminal record carries an end_time");
                }
            }
        }
        Ok(())
    }
}

/// A raw device descriptor as returned by the platform probe, before
/// reconciliation against persisted device records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawDeviceDescriptor {
    pub device_path: String,
    pub model: String,
    pub serial_number: String,
    pub size_bytes: u64,
    pub mounted_partitions: Vec<MountedPartition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MountedPartition {
    pub partition_path: String,
    pub mount_point: Option<String>,
}

pub fn format_size_human(size_bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB", "PB"];
    let mut size = size_bytes as f64;
    let mut unit_index = 0;
    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }
    if unit_index == 0 {
        format!("{} {}", size_bytes, UNITS[unit_index])
    } else {
        format!("{:.2} {}", size, UNITS[unit_index])
    }
}

/// Synthesize the fallback identifier used when the platform probe cannot
/// recover a real serial number for a device.
pub fn synthetic_serial(device_path: &str) -> String {
    format!("UNKNOWN_{}", device_path.replace(['/', '\\', ':', '.'], "_"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_bytes_across_units() {
        assert_eq!(format_size_human(0), "0 B");
        assert_eq!(format_size_human(512), "512 B");
        assert_eq!(format_size_human(1024), "1.00 KB");
        assert_eq!(format_size_human(1024 * 1024 * 3), "3.00 MB");
    }

    #[test]
    fn synthesizes_stable_identifier_from_path() {
        assert_eq!(synthetic_serial("/dev/sda"), "UNKNOWN__dev_sda");
        assert_eq!(
            synthetic_serial("\\\\.\\PHYSICALDRIVE0"),
            "UNKNOWN____PHYSICALDRIVE0"
        );
    }

    #[test]
    fn status_transitions_follow_the_legal_state_machine() {
        use WipeStatus::*;
        assert!(Pending.can_transition_to(InProgress));
        assert!(InProgress.can_transition_to(Completed));
        assert!(InProgress.can_transition_to(Failed));
        assert!(!Pending.can_transition_to(Completed));
        assert!(!Completed.can_transition_to(InProgress));
        assert!(!Failed.can_transition_to(InProgress));
    }

    #[test]
    fn dod_and_bsi_and_fast_clear_ignore_passes() {
        assert!(WipeMethod::Dod.ignores_passes());
        assert!(WipeMethod::Bsi.ignores_passes());
        assert!(WipeMethod::FastClear.ignores_passes());
        assert!(!WipeMethod::Zeros.ignores_passes());
        assert!(!WipeMethod::Random.ignores_passes());
    }

    #[test]
    fn ones_is_not_an_externally_acceptable_method() {
        assert_eq!(WipeMethod::parse_external("ones"), None);
        assert_eq!(WipeMethod::parse_external("zeros"), Some(WipeMethod::Zeros));
    }
}
