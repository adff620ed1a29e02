//! External collaborator contracts.
//!
//! Everything in this module is a trait: the relational persistence driver,
//! the HTTP/JSON presentation layer, and the platform-specific subprocess
//! plumbing all live outside this crate. The core only ever depends on
//! these two seams, which is what lets [`crate::testing`] stand in fakes
//! for both in unit tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::{DeviceRecord, RawDeviceDescriptor, WipeLogRecord};

/// Storage for device and wipe-log records.
///
/// Implementations (a relational database behind an ORM, in practice) must
/// support row-level updates to a wipe log without blocking updates to a
/// different log: the engine expects one worker per active wipe to commit
/// progress independently of every other worker.
#[async_trait]
pub trait PersistencePort: Send + Sync {
    async fn insert_device(&self, device: DeviceRecord) -> Result<()>;
    async fn find_device_by_serial(&self, serial_number: &str) -> Result<Option<DeviceRecord>>;
    async fn find_device_by_id(&self, id: &str) -> Result<Option<DeviceRecord>>;
    async fn update_device(&self, device: DeviceRecord) -> Result<()>;
    async fn list_devices(&self) -> Result<Vec<DeviceRecord>>;

    async fn insert_wipe_log(&self, log: WipeLogRecord) -> Result<()>;
    async fn update_wipe_log(&self, log: WipeLogRecord) -> Result<()>;
    async fn get_wipe_log(&self, id: &str) -> Result<Option<WipeLogRecord>>;
    async fn list_wipe_logs(&self) -> Result<Vec<WipeLogRecord>>;

    /// Free-text search across device and wipe-log identity fields
    /// (model, serial number, device path). Named in the persistence
    /// port contract so presentation layers can expose it directly.
    async fn search(&self, query: &str) -> Result<SearchResults>;
}

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct SearchResults {
    pub devices: Vec<DeviceRecord>,
    pub wipe_logs: Vec<WipeLogRecord>,
}

/// Platform-specific device enumeration, SMART readout, and boot-mount
/// introspection. The only component permitted to branch on `target_os`.
#[async_trait]
pub trait PlatformProbePort: Send + Sync {
    /// Enumerate currently attached block devices. Must never fail by
    /// aborting — a device that cannot be fully characterized is still
    /// returned with best-effort fields; total enumeration failure is
    /// reported via `Err` and the boot-disk guard treats that as "every
    /// device is boot" (fail-closed).
    async fn enumerate_disks(&self) -> Result<Vec<RawDeviceDescriptor>>;

    /// Read a SMART snapshot for one device path. Never returns `Err`:
    /// a failure is encoded as `Value::Object({"error": ...})` inside the
    /// returned document, per §4.1.
    async fn read_smart(&self, device_path: &str) -> serde_json::Value;

    /// Mount points the running OS depends on, keyed by the partition's
    /// backing device path (e.g. `/dev/sda1 -> "/"`).
    async fn list_boot_mounts(&self) -> Result<Vec<BootMount>>;

    /// Whether the device's rotational flag is known, and if so what it
    /// reports (`true` = spinning HDD, `false` = SSD/NVMe).
    async fn is_rotational(&self, device_path: &str) -> Option<bool>;

    /// Windows-only conservative prior: physical drive index 0 is treated
    /// as the boot disk regardless of any other signal. Other platforms
    /// always return `None` (the rule does not apply to them).
    async fn windows_boot_drive_index(&self, device_path: &str) -> Option<bool>;

    /// The platform's authoritative "is system / is boot" disk flag, where
    /// available (Windows' `Get-Disk .IsBoot`/`.IsSystem`, for instance).
    /// `None` means the platform has no such direct signal for this device.
    async fn authoritative_boot_flag(&self, device_path: &str) -> Option<bool>;

    /// Attempt an NVMe namespace format (`nvme format <dev> -s 1`), used by
    /// `fast_clear` on NVMe devices. `Ok(true)` means the format reported
    /// success; `Ok(false)` means the command ran but failed (or the tool
    /// isn't installed), and the caller falls back to edge-overwrite.
    async fn nvme_format(&self, device_path: &str) -> Result<bool>;

    /// Attempt a whole-device TRIM/discard (`blkdiscard` on Linux), used by
    /// `fast_clear` on non-NVMe SSDs. Same success semantics as
    /// [`PlatformProbePort::nvme_format`].
    async fn trim_discard(&self, device_path: &str) -> Result<bool>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BootMount {
    pub device_path: String,
    pub mount_point: String,
}
