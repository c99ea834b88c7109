use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Deserializer};
use thiserror::Error;

/// Module format a bundle is rendered in when written to disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputFormat {
    Es,
    Cjs,
    Iife,
    Umd,
    Amd,
}

impl OutputFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Es => "es",
            Self::Cjs => "cjs",
            Self::Iife => "iife",
            Self::Umd => "umd",
            Self::Amd => "amd",
        }
    }
}

impl Display for OutputFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum FormatParseError {
    #[error("unknown output format '{0}' (supported: es, cjs, iife, umd, amd)")]
    Unknown(String),
}

impl FromStr for OutputFormat {
    type Err = FormatParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "es" | "esm" | "module" => Ok(Self::Es),
            "cjs" | "commonjs" => Ok(Self::Cjs),
            "iife" => Ok(Self::Iife),
            "umd" => Ok(Self::Umd),
            "amd" => Ok(Self::Amd),
            _ => Err(FormatParseError::Unknown(value.to_string())),
        }
    }
}

impl<'de> Deserialize<'de> for OutputFormat {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
