//! The wipe engine: starts a supervised, cancellable-in-name-only wipe
//! worker per device, and answers status queries against the persisted log.
//!
//! Grounded in `WipeEngine.start_wipe` / `_perform_wipe` and its per-method
//! dispatch (`_wipe_zeros`, `_wipe_random`, `_wipe_dod`, `_wipe_bsi`,
//! `_wipe_fast_clear`). The class-level `active_wipes` dict and its
//! `threading.Lock` are replaced by an injected [`ActiveWipeRegistry`]
//! rather than reintroduced as a singleton (see the registry module docs).

pub mod patterns;
pub mod verify;

use std::sync::Arc;

use chrono::Utc;
use log::{error, info, warn};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::guard::BootDiskGuard;
use crate::model::{DeviceRecord, WipeLogRecord, WipeMethod, WipeStatus};
use crate::ports::{PersistencePort, PlatformProbePort};
use crate::registry::{ActiveWipeRegistry, RegistryEntry};

use patterns::PatternKind;

pub struct WipeEngine {
    persistence: Arc<dyn PersistencePort>,
    probe: Arc<dyn PlatformProbePort>,
    guard: BootDiskGuard,
    registry: ActiveWipeRegistry,
    config: Arc<EngineConfig>,
}

impl WipeEngine {
    pub fn new(
        persistence: Arc<dyn PersistencePort>,
        probe: Arc<dyn PlatformProbePort>,
        registry: ActiveWipeRegistry,
        config: EngineConfig,
    ) -> Self {
        let guard = BootDiskGuard::new(probe.clone());
        Self {
            persistence,
            probe,
            guard,
            registry,
            config: Arc::new(config),
        }
    }

    pub fn active(&self) -> Vec<(String, RegistryEntry)> {
        self.registry.active()
    }

    pub async fn status(&self, log_id: &str) -> Result<Option<WipeLogRecord>> {
        self.persistence.get_wipe_log(log_id).await
    }

    /// Start a wipe. Returns the new wipe log's id once it has been
    /// persisted in `in_progress` state and the worker has been spawned;
    /// the worker itself runs to completion in the background.
    pub async fn start(&self, device_id: &str, method: WipeMethod, passes: u32) -> Result<String> {
        let device = self
            .persistence
            .find_device_by_id(device_id)
            .await?
            .ok_or_else(|| EngineError::DeviceNotFound(device_id.to_string()))?;

        let (safe, reason) = self.guard.verify_not_boot_disk(&device.device_path).await;
        if !safe {
            return Err(EngineError::SafetyRefusal(reason));
        }

        let log_id = Uuid::new_v4().to_string();
        if !self.registry.try_claim(&device.device_path, &log_id) {
            return Err(EngineError::Conflict(format!(
                "a wipe is already running for {}",
                device.device_path
            )));
        }

        let result = self.start_inner(&device, &log_id, method, passes).await;
        if let Err(e) = &result {
            warn!(
                "engine: start failed for {} after claiming registry: {e}",
                device.device_path
            );
            self.registry.release(&device.device_path);
        }
        result
    }

    async fn start_inner(
        &self,
        device: &DeviceRecord,
        log_id: &str,
        method: WipeMethod,
        passes: u32,
    ) -> Result<String> {
        let smart_before = self.probe.read_smart(&device.device_path).await;
        let now = Utc::now();

        let log = WipeLogRecord {
            id: log_id.to_string(),
            disk_id: device.id.clone(),
            device_path: device.device_path.clone(),
            model: device.model.clone(),
            serial_number: device.serial_number.clone(),
            size_bytes: device.size_bytes,
            smart_snapshot_before: Some(smart_before),
            smart_snapshot_after: None,
            method,
            passes,
            status: WipeStatus::InProgress,
            start_time: now,
            end_time: None,
            duration_seconds: None,
            progress_percent: 0.0,
            error_message: None,
            verified: false,
            verification_data: None,
        };
        self.persistence.insert_wipe_log(log.clone()).await?;

        let worker = WipeWorker {
            persistence: self.persistence.clone(),
            probe: self.probe.clone(),
            guard: BootDiskGuard::new(self.probe.clone()),
            registry: self.registry.clone(),
            config: self.config.clone(),
        };
        tokio::spawn(worker.run(log));

        info!(
            "engine: started {} on {} (log {})",
            method.as_str(),
            device.device_path,
            log_id
        );
        Ok(log_id.to_string())
    }
}

struct WipeWorker {
    persistence: Arc<dyn PersistencePort>,
    probe: Arc<dyn PlatformProbePort>,
    guard: BootDiskGuard,
    registry: ActiveWipeRegistry,
    config: Arc<EngineConfig>,
}

impl WipeWorker {
    async fn run(self, mut log: WipeLogRecord) {
        let device_path = log.device_path.clone();

        let (safe, reason) = self.guard.verify_not_boot_disk(&device_path).await;
        if !safe {
            error!("engine: re-check before write refused {device_path}: {reason}");
            self.fail(&mut log, format!("safety check failed: {reason}")).await;
            self.registry.release(&device_path);
            return;
        }

        self.registry.mark_running(&device_path);

        let outcome = self.dispatch(&mut log).await;

        match outcome {
            Ok(()) => {
                let smart_after = self.probe.read_smart(&device_path).await;
                if smart_after.get("error").is_none() {
                    log.smart_snapshot_after = Some(smart_after);
                }
                let end_time = Utc::now();
                log.status = WipeStatus::Completed;
                log.end_time = Some(end_time);
                log.duration_seconds = Some((end_time - log.start_time).num_seconds());
                log.progress_percent = 100.0;
                log.verified = true;
                if let Err(e) = self.persistence.update_wipe_log(log.clone()).await {
                    error!("engine: failed to persist completion for {device_path}: {e}");
                }
                info!("engine: {device_path} completed");
            }
            Err(e) => {
                self.fail(&mut log, e.to_string()).await;
            }
        }

        self.registry.release(&device_path);
    }

    async fn fail(&self, log: &mut WipeLogRecord, message: String) {
        log.status = WipeStatus::Failed;
        log.error_message = Some(message.clone());
        log.end_time = Some(Utc::now());
        if let Err(e) = self.persistence.update_wipe_log(log.clone()).await {
            error!(
                "engine: failed to persist failure for {} ({message}): {e}",
                log.device_path
            );
        }
        error!("engine: {} failed: {message}", log.device_path);
    }

    async fn dispatch(&self, log: &mut WipeLogRecord) -> std::result::Result<(), String> {
        match log.method {
            WipeMethod::Zeros => self.run_passes(log, PatternKind::Zeros, log.passes).await,
            WipeMethod::Ones => self.run_passes(log, PatternKind::Ones, log.passes).await,
            WipeMethod::Random => self.run_passes(log, PatternKind::Random, log.passes).await,
            WipeMethod::Dod => self.run_dod(log).await,
            WipeMethod::Bsi => self.run_bsi(log).await,
            WipeMethod::FastClear => self.run_fast_clear(log).await,
        }
    }

    /// Drives `passes` sequential pattern-write passes of `kind`, relaying
    /// coalesced progress updates from the blocking writer into persisted
    /// log rows and registry entries as they arrive.
    async fn run_passes(
        &self,
        log: &mut WipeLogRecord,
        kind: PatternKind,
        passes: u32,
    ) -> std::result::Result<(), String> {
        for pass_index in 0..passes {
            self.run_single_pass(log, kind, pass_index, passes).await?;
        }
        Ok(())
    }

    async fn run_single_pass(
        &self,
        log: &mut WipeLogRecord,
        kind: PatternKind,
        pass_index: u32,
        passes: u32,
    ) -> std::result::Result<(), String> {
        let (tx, mut rx) = mpsc::unbounded_channel::<f64>();
        let device_path = log.device_path.clone();
        let size_hint = Some(log.size_bytes);
        let config = self.config.clone();

        let write_task = tokio::task::spawn_blocking(move || {
            patterns::run_pattern_pass(&device_path, kind, pass_index, passes, size_hint, &config, &tx)
        });

        while let Some(percent) = rx.recv().await {
            log.progress_percent = percent;
            self.registry.update_progress(&log.device_path, percent);
            if let Err(e) = self.persistence.update_wipe_log(log.clone()).await {
                warn!("engine: progress commit failed for {}: {e}", log.device_path);
            }
        }

        write_task
            .await
            .map_err(|e| format!("pattern writer panicked: {e}"))?
            .map_err(|e| e.to_string())
    }

    /// DoD 5220.22-M: zeros, then the complement (0xFF), then one random
    /// pass, each run as a single fixed pass regardless of the caller's
    /// requested pass count.
    async fn run_dod(&self, log: &mut WipeLogRecord) -> std::result::Result<(), String> {
        self.run_single_pass(log, PatternKind::Zeros, 0, 3).await?;
        self.run_single_pass(log, PatternKind::Ones, 1, 3).await?;
        self.run_single_pass(log, PatternKind::Random, 2, 3).await?;
        Ok(())
    }

    /// BSI IT-Grundschutz CON.6.A12: one random pass for SSD/NVMe (wear
    /// leveling already scatters old cell contents), two for HDD, followed
    /// by a best-effort sampled verification.
    async fn run_bsi(&self, log: &mut WipeLogRecord) -> std::result::Result<(), String> {
        let is_rotational = self
            .probe
            .is_rotational(&log.device_path)
            .await
            .unwrap_or(false);
        let num_passes: u32 = if is_rotational { 2 } else { 1 };
        let device_type = if is_rotational { "HDD" } else { "SSD/NVMe" };

        log.verification_data = Some(serde_json::json!({
            "bsi_method": "CON.6.A12",
            "device_type": device_type,
            "passes": num_passes,
            "pattern": "random",
            "note": if is_rotational {
                "two passes for elevated protection needs per BSI recommendation"
            } else {
                "one pass is sufficient for SSD/NVMe given wear leveling"
            },
        }));

        for pass_index in 0..num_passes {
            self.run_single_pass(log, PatternKind::Random, pass_index, num_passes)
                .await?;
        }

        let verification = verify::verify_bsi(&log.device_path, log.size_bytes, &self.config);
        if let Some(existing) = log.verification_data.as_mut() {
            if let Ok(verification_value) = serde_json::to_value(&verification) {
                if let (Some(obj), Some(extra)) =
                    (existing.as_object_mut(), verification_value.as_object())
                {
                    for (k, v) in extra {
                        obj.insert(k.clone(), v.clone());
                    }
                }
            }
        }

        Ok(())
    }

    /// Not secure against forensic recovery: namespace format on NVMe,
    /// TRIM+edge-overwrite on SSD, edge-overwrite alone on HDD/fallback.
    /// The caller is expected to surface that caveat; this method only
    /// tags the result as non-cryptographic in `verification_data`.
    async fn run_fast_clear(&self, log: &mut WipeLogRecord) -> std::result::Result<(), String> {
        let (tx, mut rx) = mpsc::unbounded_channel::<f64>();
        let _ = tx.send(5.0);

        let device_path = log.device_path.clone();
        let is_nvme = device_path.to_lowercase().contains("nvme");
        let is_rotational = self.probe.is_rotational(&device_path).await.unwrap_or(true);

        let progress_task = {
            let log_device_path = log.device_path.clone();
            let registry = self.registry.clone();
            let persistence = self.persistence.clone();
            let mut log_clone = log.clone();
            tokio::spawn(async move {
                while let Some(percent) = rx.recv().await {
                    log_clone.progress_percent = percent;
                    registry.update_progress(&log_device_path, percent);
                    let _ = persistence.update_wipe_log(log_clone.clone()).await;
                }
                log_clone
            })
        };

        let result = if is_nvme {
            self.fast_clear_nvme(&device_path, &tx).await
        } else if !is_rotational {
            self.fast_clear_ssd(&device_path, &tx).await
        } else {
            self.fast_clear_fallback(&device_path, &tx).await
        };

        drop(tx);
        if let Ok(final_log) = progress_task.await {
            log.progress_percent = final_log.progress_percent;
        }

        result.map(|_| {
            log.verification_data = Some(serde_json::json!({"verification_kind": "non-cryptographic"}));
        })
    }

    async fn fast_clear_nvme(
        &self,
        device_path: &str,
        tx: &mpsc::UnboundedSender<f64>,
    ) -> std::result::Result<(), String> {
        let _ = tx.send(10.0);
        let _ = tx.send(30.0);

        match self.probe.nvme_format(device_path).await {
            Ok(true) => {
                let _ = tx.send(90.0);
                let _ = tx.send(100.0);
                Ok(())
            }
            Ok(false) => {
                warn!("engine: nvme format reported failure for {device_path}, falling back");
                self.fast_clear_fallback(device_path, tx).await
            }
            Err(e) => {
                warn!("engine: nvme format unavailable for {device_path} ({e}), falling back");
                self.fast_clear_fallback(device_path, tx).await
            }
        }
    }

    async fn fast_clear_ssd(
        &self,
        device_path: &str,
        tx: &mpsc::UnboundedSender<f64>,
    ) -> std::result::Result<(), String> {
        let _ = tx.send(10.0);

        match self.probe.trim_discard(device_path).await {
            Ok(true) => {
                let _ = tx.send(70.0);
                self.overwrite_edges(device_path, tx, 70.0, 100.0).await
            }
            _ => {
                warn!("engine: blkdiscard unavailable or failed for {device_path}, falling back");
                self.fast_clear_fallback(device_path, tx).await
            }
        }
    }

    async fn fast_clear_fallback(
        &self,
        device_path: &str,
        tx: &mpsc::UnboundedSender<f64>,
    ) -> std::result::Result<(), String> {
        self.overwrite_edges(device_path, tx, 10.0, 100.0).await
    }

    async fn overwrite_edges(
        &self,
        device_path: &str,
        tx: &mpsc::UnboundedSender<f64>,
        start_progress: f64,
        end_progress: f64,
    ) -> std::result::Result<(), String> {
        let device_path = device_path.to_string();
        let edge_bytes = self.config.fast_clear_edge_bytes;
        let config = self.config.clone();
        let tx = tx.clone();

        tokio::task::spawn_blocking(move || {
            patterns::overwrite_edges(&device_path, edge_bytes, &config, start_progress, end_progress, &tx)
        })
        .await
        .map_err(|e| format!("edge overwrite task panicked: {e}"))?
        .map_err(|e| format!("edge overwrite failed: {e}"))
    }
}
