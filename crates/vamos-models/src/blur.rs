//! Blur transform selection.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Transform used to obscure a region before compositing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BlurMode {
    /// Gaussian blur with an adaptive kernel
    #[default]
    Gaussian,
    /// Box (mean) filter with the same kernel
    Box,
    /// Edge-preserving bilateral smoothing
    Bilateral,
    /// Blocky pixelation
    Mosaic,
}

impl BlurMode {
    pub const ALL: [BlurMode; 4] = [
        BlurMode::Gaussian,
        BlurMode::Box,
        BlurMode::Bilateral,
        BlurMode::Mosaic,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BlurMode::Gaussian => "gaussian",
            BlurMode::Box => "box",
            BlurMode::Bilateral => "bilateral",
            BlurMode::Mosaic => "mosaic",
        }
    }
}

impl fmt::Display for BlurMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Requested blur mode name is not one of the known transforms.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown blur mode '{0}'")]
pub struct UnknownBlurMode(pub String);

impl FromStr for BlurMode {
    type Err = UnknownBlurMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "gaussian" => Ok(BlurMode::Gaussian),
            "box" => Ok(BlurMode::Box),
            "bilateral" => Ok(BlurMode::Bilateral),
            "mosaic" | "pixelate" => Ok(BlurMode::Mosaic),
            _ => Err(UnknownBlurMode(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_modes() {
        for mode in BlurMode::ALL {
            assert_eq!(mode.as_str().parse::<BlurMode>().unwrap(), mode);
        }
        assert_eq!(" Mosaic ".parse::<BlurMode>().unwrap(), BlurMode::Mosaic);
    }

    #[test]
    fn test_parse_unknown_mode() {
        let err = "swirl".parse::<BlurMode>().unwrap_err();
        assert_eq!(err.to_string(), "unknown blur mode 'swirl'");
    }
}
