//! GPU capability detection
//!
//! Produces the capability descriptor a node announces at registration and
//! verifies again before it starts taking jobs. NVML is tried first; when the
//! library cannot be loaded the `nvidia-smi` CLI is parsed instead.

use serde::{Deserialize, Serialize};
use std::process::Command;
use tracing::debug;

use crate::{RiosError, RiosResult};

const MIB_PER_GIB: u64 = 1024;
const BYTES_PER_GIB: u64 = 1024 * 1024 * 1024;

/// Accelerator capability of this machine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capability {
    /// Accelerator model name (taken from the first device)
    pub gpu_type: String,
    /// Number of devices
    pub count: u32,
    /// Memory of the first device in whole GiB
    pub memory_gb: u32,
}

impl Capability {
    /// Synthetic descriptor used when hardware checks are skipped
    pub fn mock() -> Self {
        Self {
            gpu_type: "Mock GPU (Testing)".to_string(),
            count: 1,
            memory_gb: 8,
        }
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ({} GPU, {} GB VRAM)",
            self.gpu_type, self.count, self.memory_gb
        )
    }
}

/// Detect the GPU capability of this machine.
///
/// Only NVIDIA devices are supported.
pub fn detect_capability() -> RiosResult<Capability> {
    match detect_with_nvml() {
        Ok(capability) => Ok(capability),
        Err(e) => {
            debug!(error = %e, "NVML unavailable, falling back to nvidia-smi");
            detect_with_nvidia_smi()
        }
    }
}

fn detect_with_nvml() -> RiosResult<Capability> {
    let nvml = nvml_wrapper::Nvml::init()
        .map_err(|e| RiosError::Gpu(format!("Failed to initialize NVML: {}", e)))?;
    let count = nvml
        .device_count()
        .map_err(|e| RiosError::Gpu(format!("Failed to count devices: {}", e)))?;
    if count == 0 {
        return Err(RiosError::Gpu("no NVIDIA GPUs detected".to_string()));
    }

    let device = nvml
        .device_by_index(0)
        .map_err(|e| RiosError::Gpu(format!("Failed to open device 0: {}", e)))?;
    let name = device
        .name()
        .map_err(|e| RiosError::Gpu(format!("Failed to read device name: {}", e)))?;
    let memory = device
        .memory_info()
        .map_err(|e| RiosError::Gpu(format!("Failed to read device memory: {}", e)))?;

    Ok(Capability {
        gpu_type: name,
        count,
        memory_gb: (memory.total / BYTES_PER_GIB) as u32,
    })
}

fn detect_with_nvidia_smi() -> RiosResult<Capability> {
    let output = Command::new("nvidia-smi")
        .arg("--query-gpu=name,memory.total")
        .arg("--format=csv,noheader")
        .output()
        .map_err(|e| {
            RiosError::Gpu(format!(
                "nvidia-smi not found or failed to execute. Please ensure NVIDIA drivers are installed: {}",
                e
            ))
        })?;

    if !output.status.success() {
        return Err(RiosError::Gpu(format!(
            "nvidia-smi exited with {}",
            output.status
        )));
    }

    parse_nvidia_smi(&String::from_utf8_lossy(&output.stdout))
}

/// Parse `nvidia-smi --query-gpu=name,memory.total --format=csv,noheader`.
///
/// One line per device, e.g. `NVIDIA GeForce RTX 4090, 24564 MiB`. Memory
/// that cannot be parsed is reported as 0 GiB.
pub fn parse_nvidia_smi(output: &str) -> RiosResult<Capability> {
    let lines: Vec<&str> = output
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    let first = lines
        .first()
        .ok_or_else(|| RiosError::Gpu("no NVIDIA GPUs detected".to_string()))?;

    let parts: Vec<&str> = first.split(',').collect();
    if parts.len() != 2 {
        return Err(RiosError::Gpu(
            "unexpected nvidia-smi output format".to_string(),
        ));
    }

    let memory_mib = parts[1]
        .trim()
        .trim_end_matches("MiB")
        .trim()
        .parse::<u64>()
        .unwrap_or(0);

    Ok(Capability {
        gpu_type: parts[0].trim().to_string(),
        count: lines.len() as u32,
        memory_gb: (memory_mib / MIB_PER_GIB) as u32,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_single_gpu() {
        let capability = parse_nvidia_smi("NVIDIA GeForce RTX 4090, 24564 MiB\n").unwrap();
        assert_eq!(capability.gpu_type, "NVIDIA GeForce RTX 4090");
        assert_eq!(capability.count, 1);
        assert_eq!(capability.memory_gb, 23);
    }

    #[test]
    fn test_parse_multiple_gpus() {
        let output = "NVIDIA A100-SXM4-80GB, 81920 MiB\nNVIDIA A100-SXM4-80GB, 81920 MiB\n";
        let capability = parse_nvidia_smi(output).unwrap();
        assert_eq!(capability.count, 2);
        assert_eq!(capability.memory_gb, 80);
    }

    #[test]
    fn test_parse_unknown_memory() {
        let capability = parse_nvidia_smi("Tesla T4, [N/A]").unwrap();
        assert_eq!(capability.memory_gb, 0);
    }

    #[test]
    fn test_parse_empty_output() {
        assert!(matches!(parse_nvidia_smi("  \n"), Err(RiosError::Gpu(_))));
    }

    #[test]
    fn test_parse_malformed_output() {
        assert!(parse_nvidia_smi("garbage").is_err());
    }

    #[test]
    fn test_mock_capability_display() {
        assert_eq!(
            Capability::mock().to_string(),
            "Mock GPU (Testing) (1 GPU, 8 GB VRAM)"
        );
    }
}
