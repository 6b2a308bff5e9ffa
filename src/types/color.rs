// ABOUTME: The two parallel environment colors of a blue-green deployment.
// ABOUTME: Provides the opposite-color relation used to pick a deploy target.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    Blue,
    Green,
}

impl Color {
    /// Color assumed live when no traffic selector exists yet.
    pub const DEFAULT_LIVE: Color = Color::Blue;

    pub fn opposite(self) -> Color {
        match self {
            Color::Blue => Color::Green,
            Color::Green => Color::Blue,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Color::Blue => "blue",
            Color::Green => "green",
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown color: {0:?} (expected \"blue\" or \"green\")")]
pub struct ParseColorError(pub String);

impl FromStr for Color {
    type Err = ParseColorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "blue" => Ok(Color::Blue),
            "green" => Ok(Color::Green),
            other => Err(ParseColorError(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opposite_swaps_colors() {
        assert_eq!(Color::Blue.opposite(), Color::Green);
        assert_eq!(Color::Green.opposite(), Color::Blue);
        assert_eq!(Color::Blue.opposite().opposite(), Color::Blue);
    }

    #[test]
    fn parses_lowercase_only() {
        assert_eq!("green".parse::<Color>(), Ok(Color::Green));
        assert!("Blue".parse::<Color>().is_err());
        assert!("".parse::<Color>().is_err());
    }

    #[test]
    fn default_live_color_is_blue() {
        assert_eq!(Color::DEFAULT_LIVE, Color::Blue);
    }
}
