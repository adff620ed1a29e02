//! Request coordinator: the one place external callers (a CLI, an HTTP
//! handler, a test) are expected to go through to start or inspect a wipe.
//! Validates the operator-facing parameters and translates engine errors
//! into the `{class, message}` shape a presentation layer maps onto status
//! codes.
//!
//! Grounded in the `/api/disks/<id>/wipe` route: method/pass validation
//! happens before the engine is ever touched, matching `wipe_disk`'s
//! early-return checks.

use crate::engine::WipeEngine;
use crate::error::ErrorClass;
use crate::model::{WipeLogRecord, WipeMethod};

const MIN_PASSES: u32 = 1;
const MAX_PASSES: u32 = 10;

#[derive(Debug, Clone)]
pub struct StartOutcome {
    pub wipe_log_id: String,
}

#[derive(Debug, Clone)]
pub struct RequestError {
    pub class: ErrorClass,
    pub message: String,
}

pub struct RequestCoordinator<'a> {
    engine: &'a WipeEngine,
}

impl<'a> RequestCoordinator<'a> {
    pub fn new(engine: &'a WipeEngine) -> Self {
        Self { engine }
    }

    /// Validate `method_str`/`passes`, then delegate to the engine.
    /// `passes` is validated, not clamped: callers that send an
    /// out-of-range value get a `validation` rejection back, not a
    /// silently adjusted wipe.
    pub async fn start_wipe(
        &self,
        device_id: &str,
        method_str: &str,
        passes: u32,
    ) -> Result<StartOutcome, RequestError> {
        let method = WipeMethod::parse_external(method_str).ok_or_else(|| RequestError {
            class: ErrorClass::Validation,
            message: format!("unknown wipe method: {method_str}"),
        })?;

        if !(MIN_PASSES..=MAX_PASSES).contains(&passes) {
            return Err(RequestError {
                class: ErrorClass::Validation,
                message: format!("passes must be between {MIN_PASSES} and {MAX_PASSES}"),
            });
        }

        let effective_passes = if method.ignores_passes() { 1 } else { passes };

        self.engine
            .start(device_id, method, effective_passes)
            .await
            .map(|wipe_log_id| StartOutcome { wipe_log_id })
            .map_err(|e| RequestError {
                class: e.class(),
                message: e.to_string(),
            })
    }

    pub async fn wipe_status(&self, log_id: &str) -> Result<Option<WipeLogRecord>, RequestError> {
        self.engine.status(log_id).await.map_err(|e| RequestError {
            class: e.class(),
            message: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::EngineConfig;
    use crate::registry::ActiveWipeRegistry;
    use crate::testing::{FakePersistence, FakeProbe};

    fn test_config() -> EngineConfig {
        EngineConfig {
            dry_run: true,
            buffer_size_bytes: 4096,
            metadata_timeout: std::time::Duration::from_secs(1),
            nvme_format_timeout: std::time::Duration::from_secs(1),
            discard_timeout: std::time::Duration::from_secs(1),
            bsi_sample_count: 4,
            fast_clear_edge_bytes: 4096,
        }
    }

    #[tokio::test]
    async fn rejects_unknown_method() {
        let persistence = Arc::new(FakePersistence::new());
        let probe = Arc::new(FakeProbe::with_root_mounted_on("/dev/sda"));
        let engine = WipeEngine::new(persistence, probe, ActiveWipeRegistry::new(), test_config());
        let coordinator = RequestCoordinator::new(&engine);

        let err = coordinator
            .start_wipe("whatever-id", "quantum_erase", 1)
            .await
            .unwrap_err();
        assert_eq!(err.class, ErrorClass::Validation);
    }

    #[tokio::test]
    async fn rejects_internal_only_ones_method() {
        let persistence = Arc::new(FakePersistence::new());
        let probe = Arc::new(FakeProbe::with_root_mounted_on("/dev/sda"));
        let engine = WipeEngine::new(persistence, probe, ActiveWipeRegistry::new(), test_config());
        let coordinator = RequestCoordinator::new(&engine);

        let err = coordinator
            .start_wipe("whatever-id", "ones", 1)
            .await
            .unwrap_err();
        assert_eq!(err.class, ErrorClass::Validation);
    }

    #[tokio::test]
    async fn rejects_out_of_range_passes() {
        let persistence = Arc::new(FakePersistence::new());
        let probe = Arc::new(FakeProbe::with_root_mounted_on("/dev/sda"));
        let engine = WipeEngine::new(persistence, probe, ActiveWipeRegistry::new(), test_config());
        let coordinator = RequestCoordinator::new(&engine);

        let err = coordinator
            .start_wipe("whatever-id", "zeros", 11)
            .await
            .unwrap_err();
        assert_eq!(err.class, ErrorClass::Validation);

        let err = coordinator
            .start_wipe("whatever-id", "zeros", 0)
            .await
            .unwrap_err();
        assert_eq!(err.class, ErrorClass::Validation);
    }
}
