use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use super::AppError;

/// Resolution tiers offered to the user, lowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Quality {
    P240,
    P360,
    P480,
    P720,
    P1080,
    P1440,
    P2160,
    K4,
}

impl Quality {
    pub const ALL: [Quality; 8] = [
        Quality::P240,
        Quality::P360,
        Quality::P480,
        Quality::P720,
        Quality::P1080,
        Quality::P1440,
        Quality::P2160,
        Quality::K4,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Quality::P240 => "240p",
            Quality::P360 => "360p",
            Quality::P480 => "480p",
            Quality::P720 => "720p",
            Quality::P1080 => "1080p",
            Quality::P1440 => "1440p",
            Quality::P2160 => "2160p",
            Quality::K4 => "4K",
        }
    }
}

impl Default for Quality {
    fn default() -> Self {
        Quality::P720
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Quality {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Quality::ALL
            .into_iter()
            .find(|q| q.label().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| AppError::Config(format!("unknown quality tier '{}'", wanted)))
    }
}

/// Which tiers require a paid plan. Selecting one is refused before any request is sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualityPolicy {
    gated: BTreeSet<Quality>,
}

impl Default for QualityPolicy {
    fn default() -> Self {
        Self::new([Quality::P1080, Quality::P1440, Quality::P2160, Quality::K4])
    }
}

impl QualityPolicy {
    pub fn new(gated: impl IntoIterator<Item = Quality>) -> Self {
        Self {
            gated: gated.into_iter().collect(),
        }
    }

    /// Parse a comma separated tier list such as `"1080p, 4K"`. Empty means nothing is gated.
    pub fn parse(list: &str) -> Result<Self, AppError> {
        let gated = list
            .split(',')
            .filter(|part| !part.trim().is_empty())
            .map(|part| part.parse::<Quality>())
            .collect::<Result<BTreeSet<Quality>, _>>()?;
        Ok(Self { gated })
    }

    pub fn is_gated(&self, quality: Quality) -> bool {
        self.gated.contains(&quality)
    }

    pub fn check(&self, quality: Quality) -> Result<Quality, AppError> {
        if self.is_gated(quality) {
            Err(AppError::GatedQuality(quality))
        } else {
            Ok(quality)
        }
    }

    pub fn options(&self) -> Vec<QualityOption> {
        Quality::ALL
            .into_iter()
            .map(|quality| QualityOption {
                quality,
                gated: self.is_gated(quality),
            })
            .collect()
    }
}

/// A tier as shown in the picker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QualityOption {
    pub quality: Quality,
    pub gated: bool,
}

impl fmt::Display for QualityOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.gated {
            write!(f, "{} (Pro)", self.quality)
        } else {
            write!(f, "{}", self.quality)
        }
    }
}
