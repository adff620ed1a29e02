use std::sync::Arc;

use log::{info, warn};

use crate::ports::PlatformProbePort;

/// Conservative, fail-closed classifier for "does this device currently
/// host the running operating system".
///
/// This is the single correctness-critical component in the crate: a false
/// negative here can destroy the operator's machine, so every rule below
/// is checked independently and a single `true` from any of them — or any
/// failure to check at all — refuses the device. See §4.2.
pub struct BootDiskGuard {
    probe: Arc<dyn PlatformProbePort>,
}

impl BootDiskGuard {
    pub fn new(probe: Arc<dyn PlatformProbePort>) -> Self {
        Self { probe }
    }

    /// Returns `(safe, reason)`. `safe = true` only if every independent
    /// check below came back negative; any probe failure, any missing
    /// device, or any single positive signal refuses.
    pub async fn verify_not_boot_disk(&self, device_path: &str) -> (bool, String) {
        let descriptors = match self.probe.enumerate_disks().await {
            Ok(d) => d,
            Err(e) => {
                warn!(
                    "boot-disk guard: enumeration failed ({e}), refusing {device_path} fail-closed"
                );
                return (
                    false,
                    format!("could not verify boot status: platform probe failed ({e})"),
                );
            }
        };

        let present = descriptors.iter().any(|d| d.device_path == device_path);
        if !present {
            warn!("boot-disk guard: {device_path} not found in current probe, refusing");
            return (
                false,
                "device could not be verified against the current probe result".to_string(),
            );
        }

        let boot_mounts = match self.probe.list_boot_mounts().await {
            Ok(m) => m,
            Err(e) => {
                warn!("boot-disk guard: boot-mount listing failed ({e}), refusing {device_path}");
                return (
                    false,
                    format!("could not verify boot status: mount introspection failed ({e})"),
                );
            }
        };

        if let Some(descriptor) = descriptors.iter().find(|d| d.device_path == device_path) {
            let mounted_at_root = descriptor.mounted_partitions.iter().any(|p| {
                boot_mounts
                    .iter()
                    .any(|m| m.device_path == p.partition_path)
                    || matches!(
                        p.mount_point.as_deref(),
                        Some("/") | Some("/boot") | Some("/boot/efi")
                    )
            });
            if mounted_at_root {
                info!("boot-disk guard: {device_path} has a root-class mount, refusing");
                return (
                    false,
                    "a partition on this device is mounted at a root-class mount point"
                        .to_string(),
                );
            }
        }

        if let Some(true) = self.probe.authoritative_boot_flag(device_path).await {
            info!("boot-disk guard: platform reports {device_path} as system/boot, refusing");
            return (
                false,
                "the platform reports this device as the system/boot disk".to_string(),
            );
        }

        if let Some(true) = self.probe.windows_boot_drive_index(device_path).await {
            info!("boot-disk guard: {device_path} is physical drive index 0, refusing");
            return (
                false,
                "device index 0 is treated as the boot disk on Windows as a conservative prior"
                    .to_string(),
            );
        }

        (true, "device is safe to wipe".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeProbe;

    #[tokio::test]
    async fn refuses_device_mounted_at_root() {
        let probe = Arc::new(FakeProbe::with_root_mounted_on("/dev/sda"));
        let guard = BootDiskGuard::new(probe);
        let (safe, _) = guard.verify_not_boot_disk("/dev/sda").await;
        assert!(!safe);
    }

    #[tokio::test]
    async fn accepts_device_with_no_boot_signal() {
        let probe = Arc::new(FakeProbe::with_root_mounted_on("/dev/sda"));
        let guard = BootDiskGuard::new(probe);
        let (safe, _) = guard.verify_not_boot_disk("/dev/sdb").await;
        assert!(safe);
    }

    #[tokio::test]
    async fn refuses_when_probe_is_empty() {
        let probe = Arc::new(FakeProbe::empty());
        let guard = BootDiskGuard::new(probe);
        let (safe, _) = guard.verify_not_boot_disk("/dev/sda").await;
        assert!(!safe);
    }

    #[tokio::test]
    async fn refuses_when_probe_errors() {
        let probe = Arc::new(FakeProbe::failing());
        let guard = BootDiskGuard::new(probe);
        let (safe, _) = guard.verify_not_boot_disk("/dev/sda").await;
        assert!(!safe);
    }

    #[tokio::test]
    async fn refuses_on_authoritative_boot_flag() {
        let mut probe = FakeProbe::with_root_mounted_on("/dev/zzz-unused");
        probe.set_authoritative_boot_flag("/dev/sdb", true);
        let guard = BootDiskGuard::new(Arc::new(probe));
        let (safe, _) = guard.verify_not_boot_disk("/dev/sdb").await;
        assert!(!safe);
    }

    #[tokio::test]
    async fn refuses_windows_drive_index_zero() {
        let mut probe = FakeProbe::with_root_mounted_on("/dev/zzz-unused");
        probe.set_windows_index_zero("/dev/sdb");
        let guard = BootDiskGuard::new(Arc::new(probe));
        let (safe, _) = guard.verify_not_boot_disk("/dev/sdb").await;
        assert!(!safe);
    }

    #[tokio::test]
    async fn refuses_device_absent_from_probe_result() {
        let probe = Arc::new(FakeProbe::with_root_mounted_on("/dev/sda"));
        let guard = BootDiskGuard::new(probe);
        let (safe, _) = guard.verify_not_boot_disk("/dev/does-not-exist").await;
        assert!(!safe);
    }
}
