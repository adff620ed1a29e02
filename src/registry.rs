use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Status of a single registry entry as seen by the coordinator.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistryStatus {
    Starting,
    Running,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RegistryEntry {
    pub status: RegistryStatus,
    pub progress_percent: f64,
    pub log_id: String,
}

/// Process-local, in-memory set of device paths currently owned by a
/// worker. Not persisted — it exists exactly to enforce "at most one wipe
/// per device path" and is rebuilt empty on every process start.
///
/// Explicitly owned and injected (an `Arc` clone per consumer) rather than
/// a singleton: the engine, the coordinator, and tests each hold their own
/// handle to the same underlying map. The lock is held only across
/// membership tests and insert/remove; it is never held across I/O.
#[derive(Clone, Default)]
pub struct ActiveWipeRegistry {
    inner: Arc<Mutex<HashMap<String, RegistryEntry>>>,
}

impl ActiveWipeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically check-and-insert. Returns `false` (no insert performed)
    /// if `device_path` is already present.
    pub fn try_claim(&self, device_path: &str, log_id: &str) -> bool {
        let mut guard = self.inner.lock().expect("active-wipe registry poisoned");
        if guard.contains_key(device_path) {
            return false;
        }
        guard.insert(
            device_path.to_string(),
            RegistryEntry {
                status: RegistryStatus::Starting,
                progress_percent: 0.0,
                log_id: log_id.to_string(),
            },
        );
        true
    }

    pub fn mark_running(&self, device_path: &str) {
        let mut guard = self.inner.lock().expect("active-wipe registry poisoned");
        if let Some(entry) = guard.get_mut(device_path) {
            entry.status = RegistryStatus::Running;
        }
    }

    pub fn update_progress(&self, device_path: &str, progress_percent: f64) {
        let mut guard = self.inner.lock().expect("active-wipe registry poisoned");
        if let Some(entry) = guard.get_mut(device_path) {
            entry.progress_percent = progress_percent;
        }
    }

    pub fn release(&self, device_path: &str) {
        let mut guard = self.inner.lock().expect("active-wipe registry poisoned");
        guard.remove(device_path);
    }

    pub fn contains(&self, device_path: &str) -> bool {
        let guard = self.inner.lock().expect("active-wipe registry poisoned");
        guard.contains_key(device_path)
    }

    /// Snapshot of every device path currently owned by a worker.
    pub fn active(&self) -> Vec<(String, RegistryEntry)> {
        let guard = self.inner.lock().expect("active-wipe registry poisoned");
        guard.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_claim_on_same_path_is_rejected() {
        let registry = ActiveWipeRegistry::new();
        assert!(registry.try_claim("/dev/sdb", "log-1"));
        assert!(!registry.try_claim("/dev/sdb", "log-2"));
        assert!(registry.contains("/dev/sdb"));
    }

    #[test]
    fn release_frees_the_path_for_a_new_claim() {
        let registry = ActiveWipeRegistry::new();
        assert!(registry.try_claim("/dev/sdb", "log-1"));
        registry.release("/dev/sdb");
        assert!(!registry.contains("/dev/sdb"));
        assert!(registry.try_claim("/dev/sdb", "log-2"));
    }

    #[test]
    fn distinct_paths_are_independent() {
        let registry = ActiveWipeRegistry::new();
        assert!(registry.try_claim("/dev/sda", "log-1"));
        assert!(registry.try_claim("/dev/sdb", "log-2"));
        assert_eq!(registry.active().len(), 2);
    }

    #[test]
    fn cloned_handles_share_the_same_underlying_map() {
        let registry = ActiveWipeRegistry::new();
        let handle = registry.clone();
        assert!(registry.try_claim("/dev/sda", "log-1"));
        assert!(handle.contains("/dev/sda"));
        assert!(!handle.try_claim("/dev/sda", "log-2"));
    }
}
