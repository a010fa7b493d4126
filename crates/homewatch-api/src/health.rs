//! Host health capture.
//!
//! The output is an opaque text blob: whatever the diagnostic script prints.

use async_trait::async_trait;

use crate::error::Error;
use crate::process::run_captured;

/// Default diagnostic script for a Raspberry Pi host.
///
/// Every probe tolerates missing tools so that a partial report is still
/// a successful capture.
pub const DEFAULT_HEALTH_SCRIPT: &str = "\
grep Raspberry /proc/cpuinfo 2>/dev/null; \
echo '===Cpu temperature==='; cat /sys/class/thermal/thermal_zone0/temp 2>/dev/null; \
echo '===Gpu temperature==='; vcgencmd measure_temp 2>/dev/null; \
echo '===Memory Usage==='; free -h 2>/dev/null; \
echo '===Cpu Usage (top processes)==='; ps -eo time,pmem,pcpu,command --sort -pcpu 2>/dev/null | head -8; \
echo '===Voltage condition (expected: 0x0)==='; vcgencmd get_throttled 2>/dev/null; \
echo '===System Messages==='; dmesg 2>/dev/null | grep -E 'voltage|error|fail'; \
exit 0";

/// Captures a diagnostic text report about the host.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn capture(&self) -> Result<String, Error>;
}

/// Runs a shell script through `sh -c` and returns its stdout.
#[derive(Debug, Clone)]
pub struct ShellHealthProbe {
    script: String,
}

impl ShellHealthProbe {
    pub fn new(script: impl Into<String>) -> Self {
        Self {
            script: script.into(),
        }
    }

    pub fn script(&self) -> &str {
        &self.script
    }
}

impl Default for ShellHealthProbe {
    fn default() -> Self {
        Self::new(DEFAULT_HEALTH_SCRIPT)
    }
}

#[async_trait]
impl HealthProbe for ShellHealthProbe {
    async fn capture(&self) -> Result<String, Error> {
        run_captured("sh", &["-c".to_owned(), self.script.clone()]).await
    }
}
