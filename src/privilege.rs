//! Administrator privilege detection.

use std::sync::Arc;

use crate::log_sink::{ChannelId, LogSink};

/// Capability check run before any privileged operation touches the system.
pub trait PrivilegeGate: Send + Sync {
    fn has_privilege(&self) -> bool;
}

#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("elevation query is not available on this platform")]
    Unsupported,
}

/// Check the elevation level of the current process.
#[cfg(windows)]
pub fn probe_elevation() -> Result<bool, ProbeError> {
    // SAFETY: IsUserAnAdmin takes no arguments and only reads the process token.
    let admin = unsafe { windows::Win32::UI::Shell::IsUserAnAdmin() };
    Ok(admin.as_bool())
}

#[cfg(unix)]
pub fn probe_elevation() -> Result<bool, ProbeError> {
    Ok(nix::unistd::geteuid().is_root())
}

#[cfg(not(any(unix, windows)))]
pub fn probe_elevation() -> Result<bool, ProbeError> {
    Err(ProbeError::Unsupported)
}

/// Gate backed by the real platform query.
///
/// A failing probe counts as "not privileged" and is written to the error
/// channel instead of being raised.
#[derive(Debug, Clone)]
pub struct SystemPrivilege {
    sink: Arc<LogSink>,
}

impl SystemPrivilege {
    pub fn new(sink: Arc<LogSink>) -> Self {
        Self { sink }
    }
}

impl PrivilegeGate for SystemPrivilege {
    fn has_privilege(&self) -> bool {
        evaluate(probe_elevation(), &self.sink)
    }
}

fn evaluate(probe: Result<bool, ProbeError>, sink: &LogSink) -> bool {
    match probe {
        Ok(elevated) => elevated,
        Err(e) => {
            tracing::warn!(error = %e, "admin check failed");
            let _ = sink.error(ChannelId::Error, &format!("Admin check failed: {e}"));
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_failure_is_unprivileged_and_logged() {
        let temp_dir = tempfile::tempdir().unwrap();
        let sink = LogSink::new(temp_dir.path());

        assert!(!evaluate(Err(ProbeError::Unsupported), &sink));

        let errors = sink.read(ChannelId::Error).unwrap().unwrap();
        assert!(errors.contains("Admin check failed"));
    }

    #[test]
    fn test_probe_result_passes_through() {
        let temp_dir = tempfile::tempdir().unwrap();
        let sink = LogSink::new(temp_dir.path());

        assert!(evaluate(Ok(true), &sink));
        assert!(!evaluate(Ok(false), &sink));
        assert!(sink.read(ChannelId::Error).unwrap().is_none());
    }

    #[test]
    fn test_system_gate_does_not_panic() {
        let temp_dir = tempfile::tempdir().unwrap();
        let gate = SystemPrivilege::new(Arc::new(LogSink::new(temp_dir.path())));
        let _ = gate.has_privilege();
    }
}
