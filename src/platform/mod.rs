//! Concrete [`PlatformProbePort`](crate::ports::PlatformProbePort)
//! implementations. This module, and only this module, is allowed to
//! branch on `target_os` or shell out to a platform tool.
//!
//! Every probe runs its subprocess calls through [`run_with_timeout`], a
//! single chokepoint so a hung `smartctl`/`lsblk`/PowerShell invocation
//! can't wedge the inventory scan or a wipe's SMART readout forever.

#[cfg(target_os = "linux")]
pub mod linux;
#[cfg(target_os = "macos")]
pub mod macos;
#[cfg(target_os = "windows")]
pub mod windows;

use std::process::{Command, Output};
use std::time::Duration;

use log::warn;

/// Per-operation subprocess timeouts a platform probe is constructed with.
/// Differentiated because a metadata read and an `nvme format` have wildly
/// different legitimate run times — sharing one timeout either makes
/// metadata reads sluggish to give up or cuts a real NVMe format short and
/// silently falls back to edge-overwrite.
#[derive(Debug, Clone, Copy)]
pub struct ProbeTimeouts {
    /// `lsblk`, `smartctl`, `/proc/mounts`, PowerShell enumeration/SMART/
    /// boot-flag scripts, `diskutil list`/`info`.
    pub metadata: Duration,
    /// `nvme format`.
    pub nvme_format: Duration,
    /// `blkdiscard`, `Optimize-Volume -ReTrim`, `diskutil eraseVolume`.
    pub discard: Duration,
}

/// Run `command` to completion, giving up after `timeout`.
/// Returns `None` on timeout, on spawn failure (tool not installed, no
/// permission, ...), or on task panic — every caller already treats "the
/// tool isn't there" as a soft failure, not a hard error.
pub(crate) async fn run_with_timeout(mut command: Command, timeout: Duration) -> Option<Output> {
    let program = command.get_program().to_string_lossy().to_string();
    let spawned = tokio::task::spawn_blocking(move || command.output());

    match tokio::time::timeout(timeout, spawned).await {
        Ok(Ok(Ok(output))) => Some(output),
        Ok(Ok(Err(e))) => {
            warn!("platform probe: failed to spawn {program}: {e}");
            None
        }
        Ok(Err(e)) => {
            warn!("platform probe: {program} task panicked: {e}");
            None
        }
        Err(_) => {
            warn!("platform probe: {program} timed out after {timeout:?}");
            None
        }
    }
}

#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
pub mod unsupported {
    use async_trait::async_trait;

    use crate::error::{EngineError, Result};
    use crate::model::RawDeviceDescriptor;
    use crate::ports::{BootMount, PlatformProbePort};

    pub struct UnsupportedProbe;

    #[async_trait]
    impl PlatformProbePort for UnsupportedProbe {
        async fn enumerate_disks(&self) -> Result<Vec<RawDeviceDescriptor>> {
            Err(EngineError::UnsupportedPlatform)
        }
        async fn read_smart(&self, _device_path: &str) -> serde_json::Value {
            serde_json::json!({"error": "unsupported platform"})
        }
        async fn list_boot_mounts(&self) -> Result<Vec<BootMount>> {
            Err(EngineError::UnsupportedPlatform)
        }
        async fn is_rotational(&self, _device_path: &str) -> Option<bool> {
            None
        }
        async fn windows_boot_drive_index(&self, _device_path: &str) -> Option<bool> {
            None
        }
        async fn authoritative_boot_flag(&self, _device_path: &str) -> Option<bool> {
            None
        }
        async fn nvme_format(&self, _device_path: &str) -> Result<bool> {
            Ok(false)
        }
        async fn trim_discard(&self, _device_path: &str) -> Result<bool> {
            Ok(false)
        }
    }
}
