//! Linux probe: `lsblk` for enumeration, `/sys/block/*/queue/rotational`
//! for the SSD/HDD split, `smartctl -j` for SMART, `udevadm` as the serial
//! fallback, `/proc/mounts` for boot-mount introspection.
//!
//! Grounded in `disk_manager.py`'s `_get_linux_disks`/`_get_serial_linux`
//! and `smart_reader.py`'s `_get_smart_linux`.

use std::process::Command;

use async_trait::async_trait;
use log::warn;
use serde_json::Value;

use crate::error::{EngineError, Result};
use crate::model::{MountedPartition, RawDeviceDescriptor};
use crate::ports::{BootMount, PlatformProbePort};

use super::{run_with_timeout, ProbeTimeouts};

const BOOT_MOUNT_POINTS: &[&str] = &["/", "/boot", "/boot/efi"];

pub struct LinuxProbe {
    timeouts: ProbeTimeouts,
}

impl LinuxProbe {
    pub fn new(timeouts: ProbeTimeouts) -> Self {
        Self { timeouts }
    }

    async fn lsblk_json(&self) -> Result<Value> {
        let mut cmd = Command::new("lsblk");
        cmd.args(["-J", "-b", "-o", "NAME,SIZE,MODEL,SERIAL,TYPE,MOUNTPOINT"]);
        let output = run_with_timeout(cmd, self.timeouts.metadata)
            .await
            .ok_or_else(|| EngineError::ProbeFailure("lsblk unavailable or timed out".into()))?;

        if !output.status.success() {
            return Err(EngineError::ProbeFailure(format!(
                "lsblk exited with {:?}",
                output.status.code()
            )));
        }
        serde_json::from_slice(&output.stdout)
            .map_err(|e| EngineError::ProbeFailure(format!("lsblk produced invalid JSON: {e}")))
    }

    async fn serial_via_udevadm(&self, device_path: &str) -> Option<String> {
        let mut cmd = Command::new("udevadm");
        cmd.args(["info", "--query=property", &format!("--name={device_path}")]);
        let output = run_with_timeout(cmd, self.timeouts.metadata).await?;
        let text = String::from_utf8_lossy(&output.stdout);
        text.lines().find_map(|line| {
            line.strip_prefix("ID_SERIAL_SHORT=")
                .or_else(|| line.strip_prefix("ID_SERIAL="))
                .map(|s| s.trim().to_string())
        })
    }
}

#[async_trait]
impl PlatformProbePort for LinuxProbe {
    async fn enumerate_disks(&self) -> Result<Vec<RawDeviceDescriptor>> {
        let data = self.lsblk_json().await?;
        let devices = data
            .get("blockdevices")
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default();

        let mut out = Vec::with_capacity(devices.len());
        for device in devices {
            if device.get("type").and_then(|v| v.as_str()) != Some("disk") {
                continue;
            }
            let name = device.get("name").and_then(|v| v.as_str()).unwrap_or("");
            let device_path = format!("/dev/{name}");

            let mounted_partitions = device
                .get("children")
                .and_then(|v| v.as_array())
                .map(|children| {
                    children
                        .iter()
                        .map(|child| MountedPartition {
                            partition_path: format!(
                                "/dev/{}",
                                child.get("name").and_then(|v| v.as_str()).unwrap_or("")
                            ),
                            mount_point: child
                                .get("mountpoint")
                                .and_then(|v| v.as_str())
                                .map(|s| s.to_string()),
                        })
                        .collect()
                })
                .unwrap_or_default();

            let serial_from_lsblk = device
                .get("serial")
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .trim()
                .to_string();
            let serial_number = if !serial_from_lsblk.is_empty() {
                serial_from_lsblk
            } else {
                self.serial_via_udevadm(&device_path)
                    .await
                    .unwrap_or_else(|| crate::model::synthetic_serial(&device_path))
            };

            out.push(RawDeviceDescriptor {
                device_path,
                model: device
                    .get("model")
                    .and_then(|v| v.as_str())
                    .unwrap_or("Unknown")
                    .trim()
                    .to_string(),
                serial_number,
                size_bytes: device.get("size").and_then(|v| v.as_u64()).unwrap_or(0),
                mounted_partitions,
            });
        }
        Ok(out)
    }

    async fn read_smart(&self, device_path: &str) -> Value {
        let mut which = Command::new("which");
        which.arg("smartctl");
        match run_with_timeout(which, self.timeouts.metadata).await {
            Some(output) if output.status.success() => {}
            _ => {
                return serde_json::json!({
                    "error": "smartctl not installed; install smartmontools"
                })
            }
        }

        let mut cmd = Command::new("smartctl");
        cmd.args(["-a", "-j", device_path]);
        let output = match run_with_timeout(cmd, self.timeouts.metadata).await {
            Some(o) => o,
            None => return serde_json::json!({"error": "smartctl timed out"}),
        };

        let data: Value = match serde_json::from_slice(&output.stdout) {
            Ok(v) => v,
            Err(e) => {
                warn!("linux probe: smartctl JSON parse failed for {device_path}: {e}");
                return serde_json::json!({"error": format!("failed to parse smartctl output: {e}")});
            }
        };

        let smart_status = if data
            .pointer("/smart_status/passed")
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
        {
            "PASSED"
        } else {
            "FAILED"
        };

        let mut power_on_hours = 0i64;
        let mut power_cycle_count = 0i64;
        let mut temperature: Option<i64> = None;
        let mut attributes = serde_json::Map::new();

        if let Some(table) = data.pointer("/ata_smart_attributes/table").and_then(|v| v.as_array())
        {
            for attr in table {
                let name = attr.get("name").and_then(|v| v.as_str()).unwrap_or("");
                let raw = attr.pointer("/raw/value").and_then(|v| v.as_i64()).unwrap_or(0);
                attributes.insert(name.to_string(), attr.get("value").cloned().unwrap_or(Value::Null));
                match name {
                    "Power_On_Hours" => power_on_hours = raw,
                    "Power_Cycle_Count" => power_cycle_count = raw,
                    n if n.contains("Temperature") => temperature = Some(raw),
                    _ => {}
                }
            }
        }

        serde_json::json!({
            "device": device_path,
            "model": data.get("model_name").and_then(|v| v.as_str()).unwrap_or("Unknown"),
            "serial": data.get("serial_number").and_then(|v| v.as_str()).unwrap_or("Unknown"),
            "firmware": data.get("firmware_version").and_then(|v| v.as_str()).unwrap_or("Unknown"),
            "smart_status": smart_status,
            "power_on_hours": power_on_hours,
            "power_cycle_count": power_cycle_count,
            "temperature": temperature,
            "attributes": attributes,
        })
    }

    async fn list_boot_mounts(&self) -> Result<Vec<BootMount>> {
        let contents = tokio::fs::read_to_string("/proc/mounts")
            .await
            .map_err(EngineError::Io)?;

        Ok(contents
            .lines()
            .filter_map(|line| {
                let mut fields = line.split_whitespace();
                let device_path = fields.next()?.to_string();
                let mount_point = fields.next()?.to_string();
                if BOOT_MOUNT_POINTS.contains(&mount_point.as_str()) {
                    Some(BootMount {
                        device_path,
                        mount_point,
                    })
                } else {
                    None
                }
            })
            .collect())
    }

    async fn is_rotational(&self, device_path: &str) -> Option<bool> {
        let device_name = device_path.rsplit('/').next()?;
        let path = format!("/sys/block/{device_name}/queue/rotational");
        let contents = tokio::fs::read_to_string(path).await.ok()?;
        Some(contents.trim() == "1")
    }

    async fn windows_boot_drive_index(&self, _device_path: &str) -> Option<bool> {
        None
    }

    async fn authoritative_boot_flag(&self, _device_path: &str) -> Option<bool> {
        None
    }

    async fn nvme_format(&self, device_path: &str) -> Result<bool> {
        let mut cmd = Command::new("nvme");
        cmd.args(["format", device_path, "-s", "1"]);
        match run_with_timeout(cmd, self.timeouts.nvme_format).await {
            Some(output) => Ok(output.status.success()),
            None => Ok(false),
        }
    }

    async fn trim_discard(&self, device_path: &str) -> Result<bool> {
        let mut cmd = Command::new("blkdiscard");
        cmd.arg(device_path);
        match run_with_timeout(cmd, self.timeouts.discard).await {
            Some(output) => Ok(output.status.success()),
            None => Ok(false),
        }
    }
}
