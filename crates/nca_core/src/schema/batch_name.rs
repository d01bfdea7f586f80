use std::fmt;
use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BatchNameError {
    #[error("too few underscore-separated parts in batch name {0:?}")]
    TooFewParts(String),
    #[error("batch name {0:?} must start with \"batch_\"")]
    MissingPrefix(String),
    #[error("batch name {0:?} must end with \"_ver\" and a two-digit version of at least 01")]
    InvalidVersion(String),
}

/// The parsed form of `batch_<MOC>_<keyword>_ver##`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BatchName {
    pub marc_org_code: String,
    /// May itself contain underscores.
    pub keyword: String,
    pub version: u32,
}

impl BatchName {
    pub fn parse(name: &str) -> Result<Self, BatchNameError> {
        let parts: Vec<&str> = name.split('_').collect();
        if parts.len() < 4 {
            return Err(BatchNameError::TooFewParts(name.to_string()));
        }
        if parts[0] != "batch" {
            return Err(BatchNameError::MissingPrefix(name.to_string()));
        }

        let last = parts[parts.len() - 1];
        let version = last
            .strip_prefix("ver")
            .filter(|digits| digits.len() == 2 && digits.bytes().all(|b| b.is_ascii_digit()))
            .and_then(|digits| digits.parse::<u32>().ok())
            .filter(|version| *version >= 1)
            .ok_or_else(|| BatchNameError::InvalidVersion(name.to_string()))?;

        Ok(BatchName {
            marc_org_code: parts[1].to_string(),
            keyword: parts[2..parts.len() - 1].join("_"),
            version,
        })
    }

    pub fn fullname(&self) -> String {
        format!(
            "batch_{}_{}_ver{:02}",
            self.marc_org_code, self.keyword, self.version
        )
    }
}

impl FromStr for BatchName {
    type Err = BatchNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BatchName::parse(s)
    }
}

impl fmt::Display for BatchName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.fullname())
    }
}
