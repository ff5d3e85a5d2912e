//! Content-extraction endpoint selector.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// Kind of structured content to extract from a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum ExtractKind {
    /// News or blog article.
    Article,
    /// Product page.
    Product,
    /// Forum thread or comment section.
    Discussion,
    /// Image page.
    Image,
}

impl ExtractKind {
    /// Every supported kind.
    pub const ALL: [Self; 4] = [Self::Article, Self::Product, Self::Discussion, Self::Image];

    /// Path segment under `/diffbot/`.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Article => "article",
            Self::Product => "product",
            Self::Discussion => "discussion",
            Self::Image => "image",
        }
    }
}

impl fmt::Display for ExtractKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExtractKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::InvalidInput(format!("unknown extraction kind '{s}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_parse_case_insensitively() {
        assert_eq!("Article".parse::<ExtractKind>().unwrap(), ExtractKind::Article);
        assert_eq!(" image ".parse::<ExtractKind>().unwrap(), ExtractKind::Image);
    }

    #[test]
    fn unknown_kind_is_invalid_input() {
        let err = "video".parse::<ExtractKind>().unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }
}
