//! Windows probe: PowerShell `Get-PhysicalDisk`/`Get-Partition`/`Get-Disk`
//! for enumeration and the boot-disk signals, `Get-StorageReliabilityCounter`
//! for a SMART-equivalent snapshot.
//!
//! Grounded in `disk_manager.py`'s `_get_windows_disks`/`_is_boot_disk_windows`
//! and `smart_reader.py`'s `_get_smart_windows`.

use std::env;
use std::process::Command;

use async_trait::async_trait;
use log::warn;
use serde_json::Value;

use crate::error::{EngineError, Result};
use crate::model::RawDeviceDescriptor;
use crate::ports::{BootMount, PlatformProbePort};

use super::{run_with_timeout, ProbeTimeouts};

fn powershell(script: &str) -> Command {
    let mut cmd = Command::new("powershell");
    cmd.args(["-NoProfile", "-NonInteractive", "-Command", script]);
    cmd
}

/// `Get-PhysicalDisk` doesn't expose a disk number directly comparable to
/// `Get-Partition -DiskNumber`; `DeviceId` is used for both in practice.
fn device_path_for(device_id: &str) -> String {
    format!(r"\\.\PHYSICALDRIVE{device_id}")
}

fn device_id_from_path(device_path: &str) -> Option<&str> {
    device_path.rsplit("PHYSICALDRIVE").next()
}

pub struct WindowsProbe {
    timeouts: ProbeTimeouts,
}

impl WindowsProbe {
    pub fn new(timeouts: ProbeTimeouts) -> Self {
        Self { timeouts }
    }

    fn system_drive_letter() -> char {
        env::var("SystemDrive")
            .ok()
            .and_then(|s| s.chars().next())
            .unwrap_or('C')
    }
}

#[async_trait]
impl PlatformProbePort for WindowsProbe {
    async fn enumerate_disks(&self) -> Result<Vec<RawDeviceDescriptor>> {
        let script = "Get-PhysicalDisk | Select-Object DeviceId, FriendlyName, SerialNumber, Size | ConvertTo-Json";
        let output = run_with_timeout(powershell(script), self.timeouts.metadata)
            .await
            .ok_or_else(|| EngineError::ProbeFailure("PowerShell unavailable or timed out".into()))?;

        if !output.status.success() {
            return Err(EngineError::ProbeFailure(format!(
                "Get-PhysicalDisk exited with {:?}",
                output.status.code()
            )));
        }

        let parsed: Value = serde_json::from_slice(&output.stdout)
            .map_err(|e| EngineError::ProbeFailure(format!("invalid PowerShell JSON: {e}")))?;
        let entries = match parsed {
            Value::Array(items) => items,
            single @ Value::Object(_) => vec![single],
            _ => Vec::new(),
        };

        let mut out = Vec::with_capacity(entries.len());
        for entry in entries {
            let device_id = entry
                .get("DeviceId")
                .map(|v| match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .unwrap_or_default();
            let serial_number = entry
                .get("SerialNumber")
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .trim()
                .to_string();
            let device_path = device_path_for(&device_id);
            let serial_number = if serial_number.is_empty() {
                crate::model::synthetic_serial(&device_path)
            } else {
                serial_number
            };

            out.push(RawDeviceDescriptor {
                device_path,
                model: entry
                    .get("FriendlyName")
                    .and_then(|v| v.as_str())
                    .unwrap_or("Unknown")
                    .to_string(),
                serial_number,
                size_bytes: entry.get("Size").and_then(|v| v.as_u64()).unwrap_or(0),
                mounted_partitions: Vec::new(),
            });
        }
        Ok(out)
    }

    async fn read_smart(&self, device_path: &str) -> Value {
        let Some(device_id) = device_id_from_path(device_path) else {
            return serde_json::json!({"error": "could not parse PHYSICALDRIVE index"});
        };

        let script = format!(
            "Get-StorageReliabilityCounter -PhysicalDisk (Get-PhysicalDisk -DeviceId {device_id}) | ConvertTo-Json"
        );
        let output = match run_with_timeout(powershell(&script), self.timeouts.metadata).await {
            Some(o) if o.status.success() => o,
            _ => return serde_json::json!({"error": "Get-StorageReliabilityCounter unavailable"}),
        };

        let data: Value = match serde_json::from_slice(&output.stdout) {
            Ok(v) => v,
            Err(e) => {
                warn!("windows probe: reliability counter JSON parse failed: {e}");
                return serde_json::json!({"error": format!("failed to parse reliability counters: {e}")});
            }
        };

        serde_json::json!({
            "device": device_path,
            "smart_status": "PASSED",
            "power_on_hours": data.get("PowerOnHours").and_then(|v| v.as_i64()).unwrap_or(0),
            "temperature": data.get("Temperature").and_then(|v| v.as_i64()),
            "read_errors": data.get("ReadErrorsTotal").and_then(|v| v.as_i64()).unwrap_or(0),
            "write_errors": data.get("WriteErrorsTotal").and_then(|v| v.as_i64()).unwrap_or(0),
        })
    }

    async fn list_boot_mounts(&self) -> Result<Vec<BootMount>> {
        // No partition-device-path concept analogous to Linux's /proc/mounts
        // on Windows; the boot signal here comes entirely from
        // `windows_boot_drive_index` and `authoritative_boot_flag` instead.
        Ok(Vec::new())
    }

    async fn is_rotational(&self, device_path: &str) -> Option<bool> {
        let device_id = device_id_from_path(device_path)?;
        let script =
            format!("(Get-PhysicalDisk -DeviceId {device_id}).MediaType");
        let output = run_with_timeout(powershell(&script), self.timeouts.metadata).await?;
        let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Some(text.eq_ignore_ascii_case("HDD"))
    }

    /// Physical drive index 0 is treated as the boot disk regardless of
    /// any other signal, per the original app's conservative fallback.
    async fn windows_boot_drive_index(&self, device_path: &str) -> Option<bool> {
        Some(device_id_from_path(device_path) == Some("0"))
    }

    async fn authoritative_boot_flag(&self, device_path: &str) -> Option<bool> {
        let device_id = device_id_from_path(device_path)?;
        let system_drive = Self::system_drive_letter();

        let partition_script = format!(
            "$p = Get-Partition -DiskNumber {device_id} -ErrorAction SilentlyContinue; \
             if ($p | Where-Object {{$_.DriveLetter -eq '{system_drive}'}}) {{ 'BOOT_DISK' }} else {{ 'NOT_BOOT' }}"
        );
        if let Some(output) = run_with_timeout(powershell(&partition_script), self.timeouts.metadata).await {
            if String::from_utf8_lossy(&output.stdout).contains("BOOT_DISK") {
                return Some(true);
            }
        }

        let disk_script = format!(
            "$d = Get-Disk -Number {device_id} -ErrorAction SilentlyContinue; \
             if ($d.IsBoot -or $d.IsSystem) {{ 'IS_SYSTEM' }}"
        );
        match run_with_timeout(powershell(&disk_script), self.timeouts.metadata).await {
            Some(output) => Some(String::from_utf8_lossy(&output.stdout).contains("IS_SYSTEM")),
            None => None,
        }
    }

    async fn nvme_format(&self, _device_path: &str) -> Result<bool> {
        // nvme-cli is not part of the Windows toolchain; fast_clear on
        // Windows always falls back to the edge-overwrite strategy.
        Ok(false)
    }

    async fn trim_discard(&self, device_path: &str) -> Result<bool> {
        let Some(device_id) = device_id_from_path(device_path) else {
            return Ok(false);
        };
        let script = format!("Optimize-Volume -DriveLetter (Get-Partition -DiskNumber {device_id} | Select -First 1).DriveLetter -ReTrim");
        match run_with_timeout(powershell(&script), self.timeouts.discard).await {
            Some(output) => Ok(output.status.success()),
            None => Ok(false),
        }
    }
}
