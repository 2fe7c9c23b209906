use std::sync::Mutex;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

// Initialization is fallible and the recorder is process-global, so the handle is cached behind a
// mutex rather than a `OnceLock`.
static PROMETHEUS_HANDLE: Mutex<Option<PrometheusHandle>> = Mutex::new(None);

/// Installs the global Prometheus recorder once and returns a handle for rendering.
///
/// Later calls return clones of the cached handle, so binaries and tests may call this freely.
/// Rendering is left to the caller; no HTTP listener is started.
pub fn init_metrics_handle() -> Result<PrometheusHandle, BuildError> {
    let mut prometheus_handle = PROMETHEUS_HANDLE
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());

    if let Some(handle) = &*prometheus_handle {
        return Ok(handle.clone());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    *prometheus_handle = Some(handle.clone());

    Ok(handle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_initialization_reuses_the_recorder() {
        let first = init_metrics_handle().unwrap();
        let second = init_metrics_handle().unwrap();

        assert_eq!(first.render(), second.render());
    }
}
