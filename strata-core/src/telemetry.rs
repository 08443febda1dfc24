//! # Telemetry
//!
//! Snapshot types for the control plane plus the host probes: CPU and
//! resident memory through sysinfo, GPU through an external `nvidia-smi`
//! invocation. A missing probe tool reports the feature as unavailable;
//! it is never an error.

use serde::{Deserialize, Serialize};
use std::path::Path;
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};
use tracing::debug;

use crate::job::QueueStats;
use crate::ops::OperationSnapshot;
use crate::storage::CatalogStats;

/// GPU utilization as reported by the external probe
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GpuTelemetry {
    pub available: bool,
    pub utilization_percent: Option<f64>,
    pub vram_used_bytes: Option<u64>,
    pub vram_total_bytes: Option<u64>,
}

impl GpuTelemetry {
    /// The probe tool is absent or failed
    pub fn unavailable() -> Self {
        Self {
            available: false,
            utilization_percent: None,
            vram_used_bytes: None,
            vram_total_bytes: None,
        }
    }
}

/// On-disk sizes of the persisted stores
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageSizes {
    pub catalog_bytes: u64,
    pub vectors_bytes: u64,
    pub jobs_bytes: u64,
}

impl StorageSizes {
    /// Measure the store files; missing files count as zero
    pub fn measure(catalog: &Path, vectors: &Path, jobs: &Path) -> Self {
        Self {
            catalog_bytes: file_size(catalog),
            vectors_bytes: file_size(vectors),
            jobs_bytes: file_size(jobs),
        }
    }
}

fn file_size(path: &Path) -> u64 {
    std::fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}

/// The full rollup served by `GET /telemetry`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    pub cpu_percent: f32,
    pub memory_bytes: u64,
    pub gpu: GpuTelemetry,
    pub catalog: CatalogStats,
    pub queue: QueueStats,
    pub operation: Option<OperationSnapshot>,
    pub storage: StorageSizes,
}

/// CPU and memory probe for this process
pub struct SystemProbe {
    system: System,
    pid: Pid,
}

impl SystemProbe {
    #[must_use]
    pub fn new() -> Self {
        Self {
            system: System::new(),
            pid: Pid::from_u32(std::process::id()),
        }
    }

    /// Refresh and read this process's CPU percent and resident memory
    pub fn sample(&mut self) -> (f32, u64) {
        self.system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[self.pid]),
            true,
            ProcessRefreshKind::nothing().with_cpu().with_memory(),
        );
        match self.system.process(self.pid) {
            Some(process) => (process.cpu_usage(), process.memory()),
            None => (0.0, 0),
        }
    }
}

impl Default for SystemProbe {
    fn default() -> Self {
        Self::new()
    }
}

/// Query the GPU through `nvidia-smi`; absence is reported, not raised
pub async fn probe_gpu() -> GpuTelemetry {
    let output = tokio::process::Command::new("nvidia-smi")
        .args([
            "--query-gpu=utilization.gpu,memory.used,memory.total",
            "--format=csv,noheader,nounits",
        ])
        .output()
        .await;

    let output = match output {
        Ok(output) if output.status.success() => output,
        Ok(_) | Err(_) => {
            debug!("GPU probe unavailable");
            return GpuTelemetry::unavailable();
        }
    };

    let line = String::from_utf8_lossy(&output.stdout);
    parse_gpu_line(line.lines().next().unwrap_or(""))
}

/// Parse one `utilization, used-MiB, total-MiB` CSV line
fn parse_gpu_line(line: &str) -> GpuTelemetry {
    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    if fields.len() != 3 {
        return GpuTelemetry::unavailable();
    }
    let (Ok(utilization), Ok(used), Ok(total)) = (
        fields[0].parse::<f64>(),
        fields[1].parse::<u64>(),
        fields[2].parse::<u64>(),
    ) else {
        return GpuTelemetry::unavailable();
    };
    GpuTelemetry {
        available: true,
        utilization_percent: Some(utilization),
        vram_used_bytes: Some(used * 1024 * 1024),
        vram_total_bytes: Some(total * 1024 * 1024),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_well_formed_probe_line() {
        let gpu = parse_gpu_line("37, 2048, 8192");
        assert!(gpu.available);
        assert_eq!(gpu.utilization_percent, Some(37.0));
        assert_eq!(gpu.vram_used_bytes, Some(2048 * 1024 * 1024));
        assert_eq!(gpu.vram_total_bytes, Some(8192 * 1024 * 1024));
    }

    #[test]
    fn malformed_probe_output_reports_unavailable() {
        assert!(!parse_gpu_line("").available);
        assert!(!parse_gpu_line("N/A, N/A, N/A").available);
        assert!(!parse_gpu_line("1, 2").available);
    }

    #[test]
    fn missing_store_files_measure_as_zero() {
        let sizes = StorageSizes::measure(
            Path::new("/nonexistent/catalog.db"),
            Path::new("/nonexistent/vectors.db"),
            Path::new("/nonexistent/jobs.redb"),
        );
        assert_eq!(sizes.catalog_bytes, 0);
        assert_eq!(sizes.jobs_bytes, 0);
    }
}
