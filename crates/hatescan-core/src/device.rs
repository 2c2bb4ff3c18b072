//! Compute device selection

use crate::error::{Error, Result};
use candle_core::Device;
use tracing::warn;

/// Map a device name from configuration to a candle device.
///
/// Accepts `cpu`, `cuda`/`cuda:0` and `metal`/`mps`. Unknown names fall back
/// to the CPU with a warning.
pub fn device_from_str(device: &str) -> Result<Device> {
    match device.trim().to_lowercase().as_str() {
        "cpu" | "" => Ok(Device::Cpu),
        "cuda" | "cuda:0" | "gpu" => Device::new_cuda(0)
            .map_err(|e| Error::config(format!("Failed to initialize CUDA: {}", e))),
        "mps" | "metal" => Device::new_metal(0)
            .map_err(|e| Error::config(format!("Failed to initialize Metal: {}", e))),
        other => {
            warn!("Unknown device '{}', using CPU", other);
            Ok(Device::Cpu)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cpu_device() {
        assert!(device_from_str("cpu").unwrap().is_cpu());
        assert!(device_from_str(" CPU ").unwrap().is_cpu());
    }

    #[test]
    fn test_unknown_device_falls_back_to_cpu() {
        assert!(device_from_str("tpu").unwrap().is_cpu());
    }
}
