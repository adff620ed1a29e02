//! Supervised disk-erasure core.
//!
//! A ports-and-adapters library: [`engine::WipeEngine`] and
//! [`coordinator::RequestCoordinator`] are the entry points a presentation
//! layer (HTTP handler, CLI, test) drives; [`ports::PersistencePort`] and
//! [`ports::PlatformProbePort`] are the only seams this crate depends on to
//! reach a database or the operating system. [`testing`] provides
//! in-memory implementations of both for exercising the rest of the crate
//! without root privileges or a real block device.

pub mod config;
pub mod coordinator;
pub mod engine;
pub mod error;
pub mod guard;
pub mod inventory;
pub mod model;
pub mod platform;
pub mod ports;
pub mod registry;
pub mod report;
pub mod testing;

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::config::EngineConfig;
    use crate::coordinator::RequestCoordinator;
    use crate::engine::WipeEngine;
    use crate::inventory::InventoryService;
    use crate::model::WipeStatus;
    use crate::registry::ActiveWipeRegistry;
    use crate::testing::{FakePersistence, FakeProbe};

    /// A buffer close to the fakes' device sizes (hundreds of GB) so a
    /// simulated dry-run pass finishes in a handful of iterations instead
    /// of millions.
    fn test_config() -> EngineConfig {
        EngineConfig {
            dry_run: true,
            buffer_size_bytes: 100_000_000_000,
            metadata_timeout: std::time::Duration::from_secs(1),
            nvme_format_timeout: std::time::Duration::from_secs(1),
            discard_timeout: std::time::Duration::from_secs(1),
            bsi_sample_count: 4,
            fast_clear_edge_bytes: 4096,
        }
    }

    /// End-to-end: scan finds a device, the coordinator starts a wipe on
    /// it, and the background worker eventually drives the log to
    /// `completed` — all against the in-memory fakes, no real device.
    #[tokio::test]
    async fn full_wipe_lifecycle_against_fakes() {
        let persistence = Arc::new(FakePersistence::new());
        let probe = Arc::new(FakeProbe::with_root_mounted_on("/dev/sda"));

        let inventory = InventoryService::new(persistence.clone(), probe.clone());
        let devices = inventory.scan().await.unwrap();
        let data_disk = devices.iter().find(|d| d.device_path == "/dev/sdb").unwrap();

        let engine = WipeEngine::new(
            persistence.clone(),
            probe.clone(),
            ActiveWipeRegistry::new(),
            test_config(),
        );
        let coordinator = RequestCoordinator::new(&engine);

        let outcome = coordinator
            .start_wipe(&data_disk.id, "zeros", 1)
            .await
            .unwrap();

        let mut log = None;
        for _ in 0..50 {
            let current = coordinator.wipe_status(&outcome.wipe_log_id).await.unwrap();
            if let Some(l) = &current {
                if l.status.is_terminal() {
                    log = current;
                    break;
                }
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }

        let log = log.expect("wipe did not reach a terminal state in time");
        assert_eq!(log.status, WipeStatus::Completed);
        assert!(log.check_invariants().is_ok());
    }

    /// The guard's refusal must reach the coordinator as a `safety` class
    /// error, never as a bare `internal` one a presentation layer might
    /// map to a generic 500.
    #[tokio::test]
    async fn starting_a_wipe_on_the_boot_disk_is_refused_as_a_safety_error() {
        let persistence = Arc::new(FakePersistence::new());
        let probe = Arc::new(FakeProbe::with_root_mounted_on("/dev/sda"));

        let inventory = InventoryService::new(persistence.clone(), probe.clone());
        let devices = inventory.scan().await.unwrap();
        let boot_disk = devices.iter().find(|d| d.device_path == "/dev/sda").unwrap();

        let engine = WipeEngine::new(
            persistence.clone(),
            probe.clone(),
            ActiveWipeRegistry::new(),
            test_config(),
        );
        let coordinator = RequestCoordinator::new(&engine);

        let err = coordinator
            .start_wipe(&boot_disk.id, "zeros", 1)
            .await
            .unwrap_err();
        assert_eq!(err.class, crate::error::ErrorClass::Safety);
    }

    /// A second start request for a device already being wiped must be
    /// rejected synchronously as a conflict, not queued.
    #[tokio::test]
    async fn double_start_on_the_same_device_is_a_conflict() {
        let persistence = Arc::new(FakePersistence::new());
        let probe = Arc::new(FakeProbe::with_root_mounted_on("/dev/sda"));

        let inventory = InventoryService::new(persistence.clone(), probe.clone());
        let devices = inventory.scan().await.unwrap();
        let data_disk = devices.iter().find(|d| d.device_path == "/dev/sdb").unwrap();

        let engine = WipeEngine::new(
            persistence.clone(),
            probe.clone(),
            ActiveWipeRegistry::new(),
            test_config(),
        );
        let coordinator = RequestCoordinator::new(&engine);

        coordinator.start_wipe(&data_disk.id, "zeros", 1).await.unwrap();
        let err = coordinator
            .start_wipe(&data_disk.id, "zeros", 1)
            .await
            .unwrap_err();
        assert_eq!(err.class, crate::error::ErrorClass::Conflict);
    }
}
