//! Shared fixtures for data model integration tests

use std::sync::{Arc, Once};
use tracing_subscriber::{fmt, EnvFilter};

use apptest_model::{EngineConfig, InMemoryProvider, ProviderHandle};

static TRACING: Once = Once::new();

pub fn init_tracing() {
    TRACING.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
        let _ = fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

/// Config with a fixed UTC-5 "local" zone so date tests do not depend on the host
pub fn test_config() -> EngineConfig {
    EngineConfig {
        timeout_ms: 2_000,
        poll_interval_ms: 10,
        local_offset_minutes: Some(-300),
        ..Default::default()
    }
}

pub fn session(config: EngineConfig) -> (Arc<InMemoryProvider>, ProviderHandle) {
    init_tracing();
    let provider = Arc::new(InMemoryProvider::new());
    let handle = ProviderHandle::with_owned_runtime(provider.clone(), config)
        .expect("provider handle");
    (provider, handle)
}
