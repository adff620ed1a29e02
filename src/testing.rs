//! In-memory fakes for [`crate::ports::PersistencePort`] and
//! [`crate::ports::PlatformProbePort`].
//!
//! Exists so the guard, inventory, engine, and coordinator can be exercised
//! in unit and integration tests without a database connection, root
//! privileges, or a real block device. Not behind `#[cfg(test)]` at the
//! module level so integration tests in `tests/` can import it too.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{EngineError, Result};
use crate::model::{DeviceRecord, MountedPartition, RawDeviceDescriptor, WipeLogRecord};
use crate::ports::{BootMount, PersistencePort, PlatformProbePort, SearchResults};

/// Persistence fake backed by two `HashMap`s behind a `Mutex`. Last write
/// wins; no transactional semantics are modeled because nothing in this
/// crate needs them across this seam.
#[derive(Default)]
pub struct FakePersistence {
    devices: Mutex<HashMap<String, DeviceRecord>>,
    logs: Mutex<HashMap<String, WipeLogRecord>>,
}

impl FakePersistence {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PersistencePort for FakePersistence {
    async fn insert_device(&self, device: DeviceRecord) -> Result<()> {
        self.devices
            .lock()
            .expect("fake persistence poisoned")
            .insert(device.id.clone(), device);
        Ok(())
    }

    async fn find_device_by_serial(&self, serial_number: &str) -> Result<Option<DeviceRecord>> {
        Ok(self
            .devices
            .lock()
            .expect("fake persistence poisoned")
            .values()
            .find(|d| d.serial_number == serial_number)
            .cloned())
    }

    async fn find_device_by_id(&self, id: &str) -> Result<Option<DeviceRecord>> {
        Ok(self
            .devices
            .lock()
            .expect("fake persistence poisoned")
            .get(id)
            .cloned())
    }

    async fn update_device(&self, device: DeviceRecord) -> Result<()> {
        let mut guard = self.devices.lock().expect("fake persistence poisoned");
        if !guard.contains_key(&device.id) {
            return Err(EngineError::DeviceNotFound(device.id));
        }
        guard.insert(device.id.clone(), device);
        Ok(())
    }

    async fn list_devices(&self) -> Result<Vec<DeviceRecord>> {
        Ok(self
            .devices
            .lock()
            .expect("fake persistence poisoned")
            .values()
            .cloned()
            .collect())
    }

    async fn insert_wipe_log(&self, log: WipeLogRecord) -> Result<()> {
        self.logs
            .lock()
            .expect("fake persistence poisoned")
            .insert(log.id.clone(), log);
        Ok(())
    }

    async fn update_wipe_log(&self, log: WipeLogRecord) -> Result<()> {
        let mut guard = self.logs.lock().expect("fake persistence poisoned");
        if !guard.contains_key(&log.id) {
            return Err(EngineError::LogNotFound(log.id));
        }
        guard.insert(log.id.clone(), log);
        Ok(())
    }

    async fn get_wipe_log(&self, id: &str) -> Result<Option<WipeLogRecord>> {
        Ok(self
            .logs
            .lock()
            .expect("fake persistence poisoned")
            .get(id)
            .cloned())
    }

    async fn list_wipe_logs(&self) -> Result<Vec<WipeLogRecord>> {
        Ok(self
            .logs
            .lock()
            .expect("fake persistence poisoned")
            .values()
            .cloned()
            .collect())
    }

    async fn search(&self, query: &str) -> Result<SearchResults> {
        let query = query.to_lowercase();
        let devices = self
            .devices
            .lock()
            .expect("fake persistence poisoned")
            .values()
            .filter(|d| {
                d.model.to_lowercase().contains(&query)
                    || d.serial_number.to_lowercase().contains(&query)
                    || d.device_path.to_lowercase().contains(&query)
            })
            .cloned()
            .collect();
        let wipe_logs = self
            .logs
            .lock()
            .expect("fake persistence poisoned")
            .values()
            .filter(|l| {
                l.model.to_lowercase().contains(&query)
                    || l.serial_number.to_lowercase().contains(&query)
                    || l.device_path.to_lowercase().contains(&query)
            })
            .cloned()
            .collect();
        Ok(SearchResults { devices, wipe_logs })
    }
}

/// Platform probe fake. Seeded with a small set of canned devices; tests
/// add boot-mount, rotational, and index-zero signals explicitly rather
/// than inferring them, so each test exercises exactly one rule.
pub struct FakeProbe {
    descriptors: Vec<RawDeviceDescriptor>,
    boot_mounts: Vec<BootMount>,
    rotational: HashMap<String, bool>,
    windows_index_zero: HashMap<String, bool>,
    authoritative_boot: HashMap<String, bool>,
    enumerate_fails: bool,
    nvme_format_succeeds: bool,
    trim_discard_succeeds: bool,
}

impl FakeProbe {
    pub fn empty() -> Self {
        Self {
            descriptors: Vec::new(),
            boot_mounts: Vec::new(),
            rotational: HashMap::new(),
            windows_index_zero: HashMap::new(),
            authoritative_boot: HashMap::new(),
            enumerate_fails: false,
            nvme_format_succeeds: false,
            trim_discard_succeeds: false,
        }
    }

    pub fn failing() -> Self {
        let mut probe = Self::empty();
        probe.enumerate_fails = true;
        probe
    }

    /// Two devices, `/dev/sda` and `/dev/sdb`; `/dev/sda`'s first partition
    /// is mounted at `/`, `/dev/sdb` carries no mounts at all.
    pub fn with_root_mounted_on(boot_device: &str) -> Self {
        let other = if boot_device == "/dev/sda" {
            "/dev/sdb"
        } else {
            "/dev/sda"
        };
        let descriptors = vec![
            RawDeviceDescriptor {
                device_path: boot_device.to_string(),
                model: "Boot Disk".to_string(),
                serial_number: "SERIAL-BOOT".to_string(),
                size_bytes: 256_000_000_000,
                mounted_partitions: vec![MountedPartition {
                    partition_path: format!("{boot_device}1"),
                    mount_point: Some("/".to_string()),
                }],
            },
            RawDeviceDescriptor {
                device_path: other.to_string(),
                model: "Data Disk".to_string(),
                serial_number: "SERIAL-DATA".to_string(),
                size_bytes: 512_000_000_000,
                mounted_partitions: vec![],
            },
        ];
        Self {
            descriptors,
            boot_mounts: vec![BootMount {
                device_path: format!("{boot_device}1"),
                mount_point: "/".to_string(),
            }],
            rotational: HashMap::new(),
            windows_index_zero: HashMap::new(),
            authoritative_boot: HashMap::new(),
            enumerate_fails: false,
            nvme_format_succeeds: false,
            trim_discard_succeeds: false,
        }
    }

    pub fn set_authoritative_boot_flag(&mut self, device_path: &str, value: bool) {
        self.authoritative_boot
            .insert(device_path.to_string(), value);
    }

    pub fn set_windows_index_zero(&mut self, device_path: &str) {
        self.windows_index_zero
            .insert(device_path.to_string(), true);
    }

    pub fn set_rotational(&mut self, device_path: &str, value: bool) {
        self.rotational.insert(device_path.to_string(), value);
    }

    pub fn set_nvme_format_succeeds(&mut self, value: bool) {
        self.nvme_format_succeeds = value;
    }

    pub fn set_trim_discard_succeeds(&mut self, value: bool) {
        self.trim_discard_succeeds = value;
    }
}

#[async_trait]
impl PlatformProbePort for FakeProbe {
    async fn enumerate_disks(&self) -> Result<Vec<RawDeviceDescriptor>> {
        if self.enumerate_fails {
            return Err(EngineError::ProbeFailure(
                "fake probe configured to fail".to_string(),
            ));
        }
        Ok(self.descriptors.clone())
    }

    async fn read_smart(&self, _device_path: &str) -> serde_json::Value {
        serde_json::json!({"smart_status": "PASSED"})
    }

    async fn list_boot_mounts(&self) -> Result<Vec<BootMount>> {
        Ok(self.boot_mounts.clone())
    }

    async fn is_rotational(&self, device_path: &str) -> Option<bool> {
        self.rotational.get(device_path).copied()
    }

    async fn windows_boot_drive_index(&self, device_path: &str) -> Option<bool> {
        Some(self.windows_index_zero.contains_key(device_path))
    }

    async fn authoritative_boot_flag(&self, device_path: &str) -> Option<bool> {
        self.authoritative_boot.get(device_path).copied()
    }

    async fn nvme_format(&self, _device_path: &str) -> Result<bool> {
        Ok(self.nvme_format_succeeds)
    }

    async fn trim_discard(&self, _device_path: &str) -> Result<bool> {
        Ok(self.trim_discard_succeeds)
    }
}
