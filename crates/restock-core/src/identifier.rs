//! Canonical product identifiers and normalization from raw input.
//!
//! A raw batch line may carry a bare identifier, a product URL, or free
//! text pasted from a spreadsheet. [`Identifier::parse`] reduces all of
//! them to the canonical uppercase 10-character key or rejects the input.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Whole-string canonical form: `B` followed by nine uppercase alphanumerics.
static CANONICAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^B[A-Z0-9]{9}$").expect("hard-coded pattern compiles"));

/// Known URL shapes, tried in order. Matching is case-insensitive; the
/// captured identifier is uppercased on extraction.
static URL_SHAPES: LazyLock<[Regex; 3]> = LazyLock::new(|| {
    [
        Regex::new(r"(?i)/dp/(B[A-Z0-9]{9})(?:[/?#]|$)").expect("hard-coded pattern compiles"),
        Regex::new(r"(?i)/gp/product/(B[A-Z0-9]{9})(?:[/?#]|$)")
            .expect("hard-coded pattern compiles"),
        Regex::new(r"(?i)[?&]asin=(B[A-Z0-9]{9})(?:[&#]|$)").expect("hard-coded pattern compiles"),
    ]
});

/// Last-resort bare token anywhere in the input (e.g. a spreadsheet cell
/// that reads `"B0ABC12345 - wireless charger"`).
static BARE_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(B[A-Z0-9]{9})\b").expect("hard-coded pattern compiles"));

/// Canonical 10-character product key.
///
/// Invariant: the inner string always matches `^B[A-Z0-9]{9}$`. The only
/// constructors are [`Identifier::parse`] (normalizing) and the strict
/// [`FromStr`] impl used when reading back persisted values.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identifier(String);

/// Error for the strict [`FromStr`] path.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("not a canonical product identifier: {0:?}")]
pub struct InvalidIdentifier(pub String);

impl Identifier {
    /// Normalizes raw input into a canonical identifier.
    ///
    /// Resolution order:
    /// 1. trimmed + uppercased input already in canonical form;
    /// 2. URL shapes `/dp/<id>`, `/gp/product/<id>`, `?asin=<id>`;
    /// 3. a bare identifier token anywhere in the input.
    ///
    /// Returns `None` when none of the shapes match.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }

        let upper = trimmed.to_uppercase();
        if CANONICAL.is_match(&upper) {
            return Some(Self(upper));
        }

        for shape in URL_SHAPES.iter() {
            if let Some(caps) = shape.captures(trimmed) {
                return Some(Self(caps[1].to_uppercase()));
            }
        }

        BARE_TOKEN
            .captures(trimmed)
            .map(|caps| Self(caps[1].to_uppercase()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Identifier {
    type Err = InvalidIdentifier;

    /// Strict parse: accepts only the canonical form, no normalization.
    /// Use this when the value is expected to already be canonical (e.g.
    /// a persisted row) so corruption surfaces as an error.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if CANONICAL.is_match(s) {
            Ok(Self(s.to_owned()))
        } else {
            Err(InvalidIdentifier(s.to_owned()))
        }
    }
}
