//! Named points in the per-iteration pipeline.

use std::fmt;
use std::str::FromStr;

use crate::error::ParseError;

/// A named point in the per-iteration pipeline at which post-processors
/// run and/or a halo exchange happens.
///
/// The default order within one `collide_and_stream` call is
///
/// ```text
/// collide → PostCollide (populations) → stream → PostStream (populations)
///   → PreCoupling → Coupling → PostCoupling → PostPostProcess
/// ```
///
/// [`Stage::Custom`] stages never run implicitly; drivers execute them
/// explicitly between steps.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Stage {
    /// Between collide and stream. Its communicator carries the
    /// post-collision populations into the halo.
    PostCollide,
    /// Right after streaming. Its communicator refreshes the halo with
    /// the neighbours' post-stream populations before any operator of
    /// this or a later stage reads it.
    PostStream,
    /// First operator stage after streaming (e.g. boundary conditions).
    PreCoupling,
    /// Inter-lattice or inter-field coupling.
    Coupling,
    /// After coupling.
    PostCoupling,
    /// Final communication of fields written during post-processing.
    PostPostProcess,
    /// A driver-defined stage.
    Custom(u16),
}

impl Stage {
    /// Stages executed implicitly by every step, in pipeline order.
    pub const PIPELINE: [Stage; 6] = [
        Stage::PostCollide,
        Stage::PostStream,
        Stage::PreCoupling,
        Stage::Coupling,
        Stage::PostCoupling,
        Stage::PostPostProcess,
    ];

    /// Compact numeric code, used to build message tags.
    pub fn code(self) -> u16 {
        match self {
            Self::PostCollide => 0,
            Self::PostStream => 1,
            Self::PreCoupling => 2,
            Self::Coupling => 3,
            Self::PostCoupling => 4,
            Self::PostPostProcess => 5,
            Self::Custom(n) => 16u16.saturating_add(n),
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PostCollide => write!(f, "post_collide"),
            Self::PostStream => write!(f, "post_stream"),
            Self::PreCoupling => write!(f, "pre_coupling"),
            Self::Coupling => write!(f, "coupling"),
            Self::PostCoupling => write!(f, "post_coupling"),
            Self::PostPostProcess => write!(f, "post_post_process"),
            Self::Custom(n) => write!(f, "custom_{n}"),
        }
    }
}

impl FromStr for Stage {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "post_collide" => Ok(Self::PostCollide),
            "post_stream" => Ok(Self::PostStream),
            "pre_coupling" => Ok(Self::PreCoupling),
            "coupling" => Ok(Self::Coupling),
            "post_coupling" => Ok(Self::PostCoupling),
            "post_post_process" => Ok(Self::PostPostProcess),
            other => other
                .strip_prefix("custom_")
                .and_then(|n| n.parse().ok())
                .map(Self::Custom)
                .ok_or_else(|| ParseError::UnknownStage(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_unique_for_pipeline() {
        let mut codes: Vec<u16> = Stage::PIPELINE.iter().map(|s| s.code()).collect();
        codes.push(Stage::Custom(0).code());
        let n = codes.len();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), n);
    }

    #[test]
    fn display_parses_back() {
        for stage in Stage::PIPELINE.into_iter().chain([Stage::Custom(5)]) {
            assert_eq!(stage.to_string().parse::<Stage>().unwrap(), stage);
        }
    }

    #[test]
    fn unknown_stage_is_rejected() {
        assert!(matches!(
            "sideways".parse::<Stage>(),
            Err(ParseError::UnknownStage(_))
        ));
    }
}
