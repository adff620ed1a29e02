//! macOS probe: `diskutil list`/`diskutil info` for enumeration and the
//! boot-disk signal.
//!
//! Grounded in `disk_manager.py`'s `_get_macos_disks`/`_get_boot_disk_macos`.
//! `smartctl` is reused for SMART where available (installed via Homebrew);
//! absent that, SMART is reported as unavailable rather than guessed at.

use std::process::Command;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{EngineError, Result};
use crate::model::RawDeviceDescriptor;
use crate::ports::{BootMount, PlatformProbePort};

use super::{run_with_timeout, ProbeTimeouts};

pub struct MacosProbe {
    timeouts: ProbeTimeouts,
}

impl MacosProbe {
    pub fn new(timeouts: ProbeTimeouts) -> Self {
        Self { timeouts }
    }

    fn parse_diskutil_field(output: &str, field_name: &str) -> Option<String> {
        output
            .lines()
            .find(|line| line.contains(field_name))
            .and_then(|line| line.split(':').nth(1))
            .map(|s| s.trim().to_string())
    }

    async fn boot_disk(&self) -> Option<String> {
        let mut cmd = Command::new("diskutil");
        cmd.args(["info", "/"]);
        let output = run_with_timeout(cmd, self.timeouts.metadata).await?;
        let text = String::from_utf8_lossy(&output.stdout);
        Self::parse_diskutil_field(&text, "Part of Whole")
            .map(|whole| format!("/dev/{whole}"))
    }
}

#[async_trait]
impl PlatformProbePort for MacosProbe {
    async fn enumerate_disks(&self) -> Result<Vec<RawDeviceDescriptor>> {
        let mut cmd = Command::new("diskutil");
        cmd.args(["list"]);
        let output = run_with_timeout(cmd, self.timeouts.metadata)
            .await
            .ok_or_else(|| EngineError::ProbeFailure("diskutil unavailable or timed out".into()))?;

        if !output.status.success() {
            return Err(EngineError::ProbeFailure(format!(
                "diskutil list exited with {:?}",
                output.status.code()
            )));
        }

        let listing = String::from_utf8_lossy(&output.stdout);
        let mut out = Vec::new();

        for line in listing.lines() {
            if !line.contains("/dev/disk") || !line.to_lowercase().contains("physical") {
                continue;
            }
            let device_path = match line.split_whitespace().next() {
                Some(p) => p.to_string(),
                None => continue,
            };

            let mut info_cmd = Command::new("diskutil");
            info_cmd.args(["info", &device_path]);
            let info_text = run_with_timeout(info_cmd, self.timeouts.metadata)
                .await
                .map(|o| String::from_utf8_lossy(&o.stdout).to_string())
                .unwrap_or_default();

            let model = Self::parse_diskutil_field(&info_text, "Device / Media Name")
                .unwrap_or_else(|| "Unknown".to_string());
            let serial_number = Self::parse_diskutil_field(&info_text, "Disk / Partition UUID")
                .unwrap_or_else(|| crate::model::synthetic_serial(&device_path));

            out.push(RawDeviceDescriptor {
                device_path,
                model,
                serial_number,
                size_bytes: 0,
                mounted_partitions: Vec::new(),
            });
        }

        Ok(out)
    }

    async fn read_smart(&self, device_path: &str) -> Value {
        let mut which = Command::new("which");
        which.arg("smartctl");
        match run_with_timeout(which, self.timeouts.metadata).await {
            Some(output) if output.status.success() => {}
            _ => return serde_json::json!({"error": "smartctl not installed"}),
        }

        let mut cmd = Command::new("smartctl");
        cmd.args(["-a", "-j", device_path]);
        match run_with_timeout(cmd, self.timeouts.metadata).await {
            Some(output) => serde_json::from_slice(&output.stdout)
                .unwrap_or_else(|e| serde_json::json!({"error": format!("invalid smartctl JSON: {e}")})),
            None => serde_json::json!({"error": "smartctl timed out"}),
        }
    }

    async fn list_boot_mounts(&self) -> Result<Vec<BootMount>> {
        if let Some(device_path) = self.boot_disk().await {
            Ok(vec![BootMount {
                device_path,
                mount_point: "/".to_string(),
            }])
        } else {
            Ok(Vec::new())
        }
    }

    async fn is_rotational(&self, _device_path: &str) -> Option<bool> {
        None
    }

    async fn windows_boot_drive_index(&self, _device_path: &str) -> Option<bool> {
        None
    }

    async fn authoritative_boot_flag(&self, device_path: &str) -> Option<bool> {
        let boot = self.boot_disk().await?;
        Some(boot == device_path)
    }

    async fn nvme_format(&self, _device_path: &str) -> Result<bool> {
        Ok(false)
    }

    async fn trim_discard(&self, device_path: &str) -> Result<bool> {
        let mut cmd = Command::new("diskutil");
        cmd.args(["eraseVolume", "free", "%noformat%", device_path]);
        match run_with_timeout(cmd, self.timeouts.discard).await {
            Some(output) => Ok(output.status.success()),
            None => Ok(false),
        }
    }
}
