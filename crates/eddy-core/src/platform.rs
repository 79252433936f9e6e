//! Execution platforms and the host/device processing context.

use std::fmt;
use std::str::FromStr;

use crate::error::ParseError;

/// Execution back-end of a block, fixed at block construction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum Platform {
    /// Plain per-cell loops on the host.
    #[default]
    CpuScalar,
    /// Lane-chunked loops on the host, batched per dynamics run.
    CpuSimd,
    /// Device-resident storage with explicit host transfers.
    Gpu,
}

impl Platform {
    /// All platforms, in declaration order.
    pub const ALL: [Platform; 3] = [Platform::CpuScalar, Platform::CpuSimd, Platform::Gpu];

    /// Whether the authoritative data lives in host memory.
    pub fn is_host_resident(self) -> bool {
        !matches!(self, Self::Gpu)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CpuScalar => write!(f, "cpu_scalar"),
            Self::CpuSimd => write!(f, "cpu_simd"),
            Self::Gpu => write!(f, "gpu"),
        }
    }
}

impl FromStr for Platform {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cpu_scalar" | "scalar" => Ok(Self::CpuScalar),
            "cpu_simd" | "simd" => Ok(Self::CpuSimd),
            "gpu" => Ok(Self::Gpu),
            other => Err(ParseError::UnknownPlatform(other.to_string())),
        }
    }
}

/// Which side currently owns a consistent copy of device-resident data.
///
/// Host readers (statistics, I/O) must switch to
/// [`ProcessingContext::Evaluation`] before reading fields of a
/// device-resident block, and back to
/// [`ProcessingContext::Simulation`] before the next step.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum ProcessingContext {
    /// Host mirrors are synchronised and safe to read.
    Evaluation,
    /// The execution platform owns the data.
    #[default]
    Simulation,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_gpu_is_device_resident() {
        assert!(Platform::CpuScalar.is_host_resident());
        assert!(Platform::CpuSimd.is_host_resident());
        assert!(!Platform::Gpu.is_host_resident());
    }

    #[test]
    fn platform_names_round_trip() {
        for p in Platform::ALL {
            assert_eq!(p.to_string().parse::<Platform>().unwrap(), p);
        }
        assert_eq!("simd".parse::<Platform>().unwrap(), Platform::CpuSimd);
        assert!("tpu".parse::<Platform>().is_err());
    }
}
