use anyhow::{anyhow, Result};
use candle::Device;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DevicePreference {
    /// Use the first CUDA device when one is usable, otherwise the CPU.
    #[default]
    Auto,
    Cpu,
    Cuda(usize),
}

impl DevicePreference {
    /// Accepts `auto`, `cpu`, `cuda` and `cuda:N` (`gpu` is an alias of
    /// `cuda`). Anything else warns and falls back to `Auto`.
    pub fn parse(value: &str) -> Self {
        let trimmed = value.trim();
        let lower = trimmed.to_ascii_lowercase();
        let (kind, ordinal) = match lower.split_once(':') {
            Some((kind, ordinal)) => (kind, Some(ordinal)),
            None => (lower.as_str(), None),
        };
        match (kind, ordinal) {
            ("" | "auto", None) => Self::Auto,
            ("cpu", None) => Self::Cpu,
            ("cuda" | "gpu", None) => Self::Cuda(0),
            ("cuda" | "gpu", Some(ordinal)) => match ordinal.parse::<usize>() {
                Ok(ordinal) => Self::Cuda(ordinal),
                Err(_) => {
                    warn!(
                        "invalid CUDA ordinal in CLAIRE_DEVICE value '{}', defaulting to auto",
                        trimmed
                    );
                    Self::Auto
                }
            },
            _ => {
                warn!(
                    "unrecognized CLAIRE_DEVICE value '{}', defaulting to auto",
                    trimmed
                );
                Self::Auto
            }
        }
    }
}

pub fn build_device(preference: DevicePreference) -> Result<Device> {
    match preference {
        DevicePreference::Cpu => Ok(Device::Cpu),
        DevicePreference::Cuda(ordinal) => Device::new_cuda(ordinal).map_err(|err| {
            anyhow!(
                "requested CUDA device {} but initialization failed ({err}). Build with the \
                 `cuda` feature and ensure CUDA libraries are available.",
                ordinal
            )
        }),
        DevicePreference::Auto => match Device::cuda_if_available(0) {
            Ok(device) => Ok(device),
            Err(err) => {
                warn!("CUDA probe failed ({err}), falling back to CPU");
                Ok(Device::Cpu)
            }
        },
    }
}

pub fn describe(device: &Device) -> String {
    match device {
        Device::Cpu => "cpu".to_string(),
        Device::Cuda(_) => "cuda".to_string(),
        Device::Metal(_) => "metal".to_string(),
    }
}
