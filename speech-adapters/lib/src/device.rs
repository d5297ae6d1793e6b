//! Compute device selection for local inference.
//!
//! A [`Device`] is chosen once when an adapter is constructed and handed to
//! the inference runner as an explicit argument. Device selection never
//! touches process environment variables such as `CUDA_VISIBLE_DEVICES`.

use std::fmt;
use std::path::Path;
use std::process::{Command, Stdio};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The compute context a local model runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Device {
    /// General-purpose CPU inference.
    #[default]
    Cpu,
    /// A specific CUDA accelerator, by ordinal.
    Cuda(u32),
}

impl Device {
    /// Select the accelerator at `gpu_index` if the host has it, otherwise the CPU.
    ///
    /// ## Examples
    ///
    /// ```
    /// use speech_adapters::Device;
    ///
    /// let device = Device::select(0);
    /// assert!(matches!(device, Device::Cpu | Device::Cuda(0)));
    /// ```
    pub fn select(gpu_index: u32) -> Self {
        Self::select_with(gpu_index, cuda_device_present)
    }

    /// Use `explicit` when configured, otherwise [`Device::select`] on the blocking pool.
    ///
    /// Accelerator detection may run `nvidia-smi`, so it never runs on an
    /// async worker thread.
    pub async fn resolve(explicit: Option<Device>, gpu_index: u32) -> Self {
        if let Some(device) = explicit {
            tracing::debug!(device = %device, "Using configured compute device");
            return device;
        }

        match tokio::task::spawn_blocking(move || Self::select(gpu_index)).await {
            Ok(device) => device,
            Err(e) => {
                tracing::warn!(error = %e, "Device detection failed; using CPU");
                Device::Cpu
            }
        }
    }

    /// Select a device using a custom accelerator check.
    pub fn select_with(gpu_index: u32, detect: impl FnOnce(u32) -> bool) -> Self {
        let device = if detect(gpu_index) {
            Device::Cuda(gpu_index)
        } else {
            Device::Cpu
        };
        tracing::debug!(gpu_index, device = %device, "Selected compute device");
        device
    }

    /// Returns `true` for accelerator devices.
    pub fn is_accelerator(&self) -> bool {
        matches!(self, Device::Cuda(_))
    }

    /// The short execution-provider name (`cuda` or `cpu`).
    pub fn provider_name(&self) -> &'static str {
        match self {
            Device::Cpu => "cpu",
            Device::Cuda(_) => "cuda",
        }
    }

    /// The accelerator ordinal, if any.
    pub fn ordinal(&self) -> Option<u32> {
        match self {
            Device::Cpu => None,
            Device::Cuda(index) => Some(*index),
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Cpu => write!(f, "cpu"),
            Device::Cuda(index) => write!(f, "cuda:{index}"),
        }
    }
}

impl FromStr for Device {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        if lower == "cpu" {
            return Ok(Device::Cpu);
        }
        if lower == "cuda" {
            return Ok(Device::Cuda(0));
        }
        match lower.strip_prefix("cuda:") {
            Some(index) => index
                .parse::<u32>()
                .map(Device::Cuda)
                .map_err(|_| format!("invalid CUDA ordinal in '{s}'")),
            None => Err(format!("unknown device '{s}' (expected 'cpu' or 'cuda:N')")),
        }
    }
}

impl From<Device> for String {
    fn from(device: Device) -> Self {
        device.to_string()
    }
}

impl TryFrom<String> for Device {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Check whether the host exposes the CUDA device with the given ordinal.
///
/// Looks for the NVIDIA device node first and falls back to `nvidia-smi -L`.
fn cuda_device_present(index: u32) -> bool {
    if Path::new(&format!("/dev/nvidia{index}")).exists() {
        return true;
    }

    if which::which("nvidia-smi").is_err() {
        return false;
    }

    let prefix = format!("GPU {index}:");
    Command::new("nvidia-smi")
        .arg("-L")
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .output()
        .map(|output| {
            output.status.success()
                && String::from_utf8_lossy(&output.stdout)
                    .lines()
                    .any(|line| line.trim_start().starts_with(&prefix))
        })
        .unwrap_or(false)
}
