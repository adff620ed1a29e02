//! Device inventory: reconciles a platform probe sweep against persisted
//! [`DeviceRecord`]s by serial number, and refreshes SMART snapshots.
//!
//! Grounded in the original Flask app's disk-listing route, which rebuilds
//! its `Disk` table from a fresh `disk_manager` scan on every inventory
//! request rather than trusting a stale cache.

use std::sync::Arc;

use chrono::Utc;
use log::{debug, info, warn};
use uuid::Uuid;

use crate::error::Result;
use crate::model::{format_size_human, synthetic_serial, DeviceRecord, SmartStatus};
use crate::ports::{PersistencePort, PlatformProbePort};

pub struct InventoryService {
    persistence: Arc<dyn PersistencePort>,
    probe: Arc<dyn PlatformProbePort>,
}

impl InventoryService {
    pub fn new(persistence: Arc<dyn PersistencePort>, probe: Arc<dyn PlatformProbePort>) -> Self {
        Self {
            persistence,
            probe,
        }
    }

    /// Enumerate attached disks and reconcile them against persisted
    /// records, keyed by serial number (or a synthesized stand-in when the
    /// platform can't report one). Returns the full up-to-date set.
    ///
    /// Each device is committed individually as it's reconciled — unlike
    /// the boot-disk guard, which must hold the whole probe result before
    /// deciding anything, inventory reconciliation is per-device and a
    /// failure persisting one record must not discard the rest.
    pub async fn scan(&self) -> Result<Vec<DeviceRecord>> {
        let descriptors = self.probe.enumerate_disks().await?;
        let now = Utc::now();
        let mut out = Vec::with_capacity(descriptors.len());

        for descriptor in descriptors {
            let serial_number = if descriptor.serial_number.trim().is_empty() {
                synthetic_serial(&descriptor.device_path)
            } else {
                descriptor.serial_number.clone()
            };

            let boot_mounts = self.probe.list_boot_mounts().await.unwrap_or_default();
            let mounted_at_root = descriptor.mounted_partitions.iter().any(|p| {
                boot_mounts
                    .iter()
                    .any(|m| m.device_path == p.partition_path)
                    || matches!(
                        p.mount_point.as_deref(),
                        Some("/") | Some("/boot") | Some("/boot/efi")
                    )
            });
            let authoritative = self
                .probe
                .authoritative_boot_flag(&descriptor.device_path)
                .await
                .unwrap_or(false);
            let windows_zero = self
                .probe
                .windows_boot_drive_index(&descriptor.device_path)
                .await
                .unwrap_or(false);
            let is_boot_disk = mounted_at_root || authoritative || windows_zero;

            let existing = self
                .persistence
                .find_device_by_serial(&serial_number)
                .await?;

            let record = match existing {
                Some(mut record) => {
                    record.device_path = descriptor.device_path.clone();
                    record.model = descriptor.model.clone();
                    record.size_bytes = descriptor.size_bytes;
                    record.size_human = format_size_human(descriptor.size_bytes);
                    record.is_boot_disk = is_boot_disk;
                    record.last_seen = now;
                    self.persistence.update_device(record.clone()).await?;
                    debug!("inventory: updated existing device {serial_number}");
                    record
                }
                None => {
                    let record = DeviceRecord {
                        id: Uuid::new_v4().to_string(),
                        serial_number: serial_number.clone(),
                        device_path: descriptor.device_path.clone(),
                        model: descriptor.model.clone(),
                        size_bytes: descriptor.size_bytes,
                        size_human: format_size_human(descriptor.size_bytes),
                        is_boot_disk,
                        smart_status: SmartStatus::Unknown,
                        smart_snapshot: None,
                        first_seen: now,
                        last_seen: now,
                    };
                    self.persistence.insert_device(record.clone()).await?;
                    info!(
                        "inventory: discovered new device {serial_number} at {}",
                        descriptor.device_path
                    );
                    record
                }
            };
            out.push(record);
        }

        Ok(out)
    }

    /// Refresh the SMART snapshot for a single device without re-running a
    /// full probe sweep. Used before and after a wipe.
    pub async fn refresh_smart(&self, device_id: &str) -> Result<DeviceRecord> {
        let mut record = self
            .persistence
            .find_device_by_id(device_id)
            .await?
            .ok_or_else(|| crate::error::EngineError::DeviceNotFound(device_id.to_string()))?;

        let snapshot = self.probe.read_smart(&record.device_path).await;
        record.smart_status = smart_status_from_snapshot(&snapshot);
        record.smart_snapshot = Some(snapshot);
        record.last_seen = Utc::now();

        self.persistence.update_device(record.clone()).await?;
        Ok(record)
    }
}

/// Mirrors the original `smart_reader`'s `smart_status` field: only an
/// explicit `"PASSED"` string counts as passed, anything else (including a
/// read failure, encoded as an `"error"` key) is `Unknown`, never `Failed`
/// unless the platform explicitly reports failure.
fn smart_status_from_snapshot(snapshot: &serde_json::Value) -> SmartStatus {
    match snapshot.get("smart_status").and_then(|v| v.as_str()) {
        Some("PASSED") => SmartStatus::Passed,
        Some("FAILED") => SmartStatus::Failed,
        Some(other) => {
            warn!("inventory: unrecognized smart_status value {other:?}");
            SmartStatus::Unknown
        }
        None => SmartStatus::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakePersistence, FakeProbe};

    #[tokio::test]
    async fn scan_inserts_new_devices_and_marks_the_boot_disk() {
        let persistence = Arc::new(FakePersistence::new());
        let probe = Arc::new(FakeProbe::with_root_mounted_on("/dev/sda"));
        let inventory = InventoryService::new(persistence.clone(), probe);

        let records = inventory.scan().await.unwrap();
        assert_eq!(records.len(), 2);
        let boot = records.iter().find(|r| r.device_path == "/dev/sda").unwrap();
        assert!(boot.is_boot_disk);
        let data = records.iter().find(|r| r.device_path == "/dev/sdb").unwrap();
        assert!(!data.is_boot_disk);
    }

    #[tokio::test]
    async fn rescanning_updates_rather_than_duplicates() {
        let persistence = Arc::new(FakePersistence::new());
        let probe = Arc::new(FakeProbe::with_root_mounted_on("/dev/sda"));
        let inventory = InventoryService::new(persistence.clone(), probe);

        inventory.scan().await.unwrap();
        let second = inventory.scan().await.unwrap();
        assert_eq!(second.len(), 2);
        assert_eq!(persistence.list_devices().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn refresh_smart_updates_status_from_probe() {
        let persistence = Arc::new(FakePersistence::new());
        let probe = Arc::new(FakeProbe::with_root_mounted_on("/dev/sda"));
        let inventory = InventoryService::new(persistence.clone(), probe);

        let records = inventory.scan().await.unwrap();
        let device_id = records[0].id.clone();
        let refreshed = inventory.refresh_smart(&device_id).await.unwrap();
        assert_eq!(refreshed.smart_status, SmartStatus::Passed);
        assert!(refreshed.smart_snapshot.is_some());
    }
}
